//! The profile root: owner of every entity store and the interning
//! factories.

use std::collections::BTreeMap;

use costgraph_types::{CostVector, Mapping};
use tracing::trace;

use crate::call::Call;
use crate::function::{Function, FunctionKind};
use crate::group::{Class, File, GroupCycle, Object};
use crate::instr::{Instr, InstrCall, InstrJump};
use crate::item::{
    CallId, ClassId, CostKind, DynamicCost, FileId, FunctionId, InstrCallId,
    InstrId, InstrJumpId, ItemRef, LineCallId, LineId, LineJumpId, ObjectId,
    PartId, SourceId,
};
use crate::line::{FunctionSource, Line, LineCall, LineJump};
use crate::part::Part;

/// Profiling data of one traced command, merged from one or more parts.
///
/// `Data` owns every entity of the graph in flat stores addressed by typed
/// ids; all cross references between entities are ids into these stores, so
/// ownership stays acyclic even though the call graph is not. Interning
/// maps are key-ordered (`BTreeMap`), which fixes the canonical enumeration
/// order queries and the search tie-break rely on.
#[derive(Debug)]
pub struct Data {
    pub(crate) mapping: Mapping,
    pub(crate) parts: Vec<Part>,

    pub(crate) objects: Vec<Object>,
    pub(crate) files: Vec<File>,
    pub(crate) classes: Vec<Class>,
    pub(crate) functions: Vec<Function>,
    pub(crate) sources: Vec<FunctionSource>,
    pub(crate) lines: Vec<Line>,
    pub(crate) instrs: Vec<Instr>,
    pub(crate) calls: Vec<Call>,
    pub(crate) line_calls: Vec<LineCall>,
    pub(crate) instr_calls: Vec<InstrCall>,
    pub(crate) line_jumps: Vec<LineJump>,
    pub(crate) instr_jumps: Vec<InstrJump>,

    pub(crate) object_map: BTreeMap<String, ObjectId>,
    pub(crate) file_map: BTreeMap<String, FileId>,
    pub(crate) class_map: BTreeMap<String, ClassId>,
    pub(crate) function_map: BTreeMap<String, Vec<FunctionId>>,

    pub(crate) function_cycles: Vec<FunctionId>,
    pub(crate) function_cycle_count: u32,
    pub(crate) in_function_cycle_update: bool,
    pub(crate) object_cycles: Vec<GroupCycle<ObjectId>>,
    pub(crate) class_cycles: Vec<GroupCycle<ClassId>>,
    pub(crate) file_cycles: Vec<GroupCycle<FileId>>,

    // Index→entity tables for the compressed trace format.
    pub(crate) object_index: Vec<Option<ObjectId>>,
    pub(crate) file_index: Vec<Option<FileId>>,
    pub(crate) function_index: Vec<Option<FunctionId>>,

    pub(crate) totals: CostVector,
    pub(crate) dynamic: DynamicCost,

    pub(crate) command: String,
    pub(crate) trace_name: String,
    pub(crate) max_thread_id: i32,
    pub(crate) max_part_number: i32,
}

impl Default for Data {
    fn default() -> Self {
        Data::new()
    }
}

impl Data {
    /// Creates an empty profile.
    #[must_use]
    pub fn new() -> Self {
        Data {
            mapping: Mapping::new(),
            parts: Vec::new(),
            objects: Vec::new(),
            files: Vec::new(),
            classes: Vec::new(),
            functions: Vec::new(),
            sources: Vec::new(),
            lines: Vec::new(),
            instrs: Vec::new(),
            calls: Vec::new(),
            line_calls: Vec::new(),
            instr_calls: Vec::new(),
            line_jumps: Vec::new(),
            instr_jumps: Vec::new(),
            object_map: BTreeMap::new(),
            file_map: BTreeMap::new(),
            class_map: BTreeMap::new(),
            function_map: BTreeMap::new(),
            function_cycles: Vec::new(),
            function_cycle_count: 0,
            in_function_cycle_update: false,
            object_cycles: Vec::new(),
            class_cycles: Vec::new(),
            file_cycles: Vec::new(),
            object_index: Vec::new(),
            file_index: Vec::new(),
            function_index: Vec::new(),
            totals: CostVector::new(),
            dynamic: DynamicCost::new(),
            command: String::new(),
            trace_name: String::new(),
            max_thread_id: 0,
            max_part_number: 0,
        }
    }

    // ---- registries -----------------------------------------------------

    /// The event-type registry of this profile.
    #[must_use]
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Mutable access to the event-type registry (ingestion only).
    pub fn mapping_mut(&mut self) -> &mut Mapping {
        &mut self.mapping
    }

    /// All parts, in load order.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Ids of all parts, in load order.
    pub fn part_ids(&self) -> impl Iterator<Item = PartId> {
        (0..self.parts.len()).map(PartId::new)
    }

    /// Looks up a part by file path or basename.
    #[must_use]
    pub fn part_by_name(&self, name: &str) -> Option<PartId> {
        self.parts
            .iter()
            .position(|p| p.name() == name || p.short_name() == name)
            .map(PartId::new)
    }

    /// The part at `id`.
    #[must_use]
    pub fn part(&self, id: PartId) -> &Part {
        &self.parts[id.index()]
    }

    /// Mutable part access (ingestion only).
    pub fn part_mut(&mut self, id: PartId) -> &mut Part {
        &mut self.parts[id.index()]
    }

    // ---- entity accessors ----------------------------------------------

    /// The object at `id`.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id.index()]
    }

    /// The file at `id`.
    #[must_use]
    pub fn file(&self, id: FileId) -> &File {
        &self.files[id.index()]
    }

    /// Mutable file access, for directory overrides.
    pub fn file_mut(&mut self, id: FileId) -> &mut File {
        &mut self.files[id.index()]
    }

    /// The class at `id`.
    #[must_use]
    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.index()]
    }

    /// The function at `id`.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    /// The function-source holder at `id`.
    #[must_use]
    pub fn source(&self, id: SourceId) -> &FunctionSource {
        &self.sources[id.index()]
    }

    /// The line at `id`.
    #[must_use]
    pub fn line(&self, id: LineId) -> &Line {
        &self.lines[id.index()]
    }

    /// The instruction at `id`.
    #[must_use]
    pub fn instr(&self, id: InstrId) -> &Instr {
        &self.instrs[id.index()]
    }

    /// The call edge at `id`.
    #[must_use]
    pub fn call(&self, id: CallId) -> &Call {
        &self.calls[id.index()]
    }

    /// The line call at `id`.
    #[must_use]
    pub fn line_call(&self, id: LineCallId) -> &LineCall {
        &self.line_calls[id.index()]
    }

    /// The instruction call at `id`.
    #[must_use]
    pub fn instr_call(&self, id: InstrCallId) -> &InstrCall {
        &self.instr_calls[id.index()]
    }

    /// The line jump at `id`.
    #[must_use]
    pub fn line_jump(&self, id: LineJumpId) -> &LineJump {
        &self.line_jumps[id.index()]
    }

    /// The instruction jump at `id`.
    #[must_use]
    pub fn instr_jump(&self, id: InstrJumpId) -> &InstrJump {
        &self.instr_jumps[id.index()]
    }

    // ---- enumerations ---------------------------------------------------

    /// Name-keyed object enumeration.
    #[must_use]
    pub fn object_map(&self) -> &BTreeMap<String, ObjectId> {
        &self.object_map
    }

    /// Name-keyed file enumeration.
    #[must_use]
    pub fn file_map(&self) -> &BTreeMap<String, FileId> {
        &self.file_map
    }

    /// Name-keyed class enumeration.
    #[must_use]
    pub fn class_map(&self) -> &BTreeMap<String, ClassId> {
        &self.class_map
    }

    /// Name-keyed function enumeration. Several functions may share a name
    /// when they live in different files or objects; cycle nodes are never
    /// listed here.
    #[must_use]
    pub fn function_map(&self) -> &BTreeMap<String, Vec<FunctionId>> {
        &self.function_map
    }

    /// The synthesized cycle nodes of the last
    /// [`update_function_cycles`](Data::update_function_cycles) run.
    #[must_use]
    pub fn function_cycles(&self) -> &[FunctionId] {
        &self.function_cycles
    }

    /// Object cycles of the last detection run.
    #[must_use]
    pub fn object_cycles(&self) -> &[GroupCycle<ObjectId>] {
        &self.object_cycles
    }

    /// Class cycles of the last detection run.
    #[must_use]
    pub fn class_cycles(&self) -> &[GroupCycle<ClassId>] {
        &self.class_cycles
    }

    /// File cycles of the last detection run.
    #[must_use]
    pub fn file_cycles(&self) -> &[GroupCycle<FileId>] {
        &self.file_cycles
    }

    // ---- metadata -------------------------------------------------------

    /// The all-parts totals row, independent of activation.
    #[must_use]
    pub fn totals(&self) -> &CostVector {
        &self.totals
    }

    /// The traced command line.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Sets the traced command line.
    pub fn set_command(&mut self, command: &str) {
        self.command = command.to_string();
    }

    /// The trace base name, with path.
    #[must_use]
    pub fn trace_name(&self) -> &str {
        &self.trace_name
    }

    /// Sets the trace base name.
    pub fn set_trace_name(&mut self, name: &str) {
        self.trace_name = name.to_string();
    }

    /// The trace base name without path.
    #[must_use]
    pub fn short_trace_name(&self) -> &str {
        self.trace_name.rsplit('/').next().unwrap_or(&self.trace_name)
    }

    /// Highest thread id seen across parts.
    #[must_use]
    pub fn max_thread_id(&self) -> i32 {
        self.max_thread_id
    }

    /// Highest part number seen across parts.
    #[must_use]
    pub fn max_part_number(&self) -> i32 {
        self.max_part_number
    }

    /// Drops every manually set file directory override.
    pub fn reset_source_dirs(&mut self) {
        for f in &mut self.files {
            f.reset_directory();
        }
    }

    // ---- interning factories -------------------------------------------

    /// Returns the object with the given name, creating it if needed.
    pub fn intern_object(&mut self, name: &str) -> ObjectId {
        if let Some(&id) = self.object_map.get(name) {
            return id;
        }
        let id = ObjectId::new(self.objects.len());
        self.objects.push(Object::new(name));
        self.object_map.insert(name.to_string(), id);
        trace!(name, "new object");
        id
    }

    /// Returns the file with the given name, creating it if needed.
    pub fn intern_file(&mut self, name: &str) -> FileId {
        if let Some(&id) = self.file_map.get(name) {
            return id;
        }
        let id = FileId::new(self.files.len());
        self.files.push(File::new(name));
        self.file_map.insert(name.to_string(), id);
        trace!(name, "new file");
        id
    }

    /// Returns the class with the given name, creating it if needed.
    pub fn intern_class(&mut self, name: &str) -> ClassId {
        if let Some(&id) = self.class_map.get(name) {
            return id;
        }
        let id = ClassId::new(self.classes.len());
        self.classes.push(Class::new(name));
        self.class_map.insert(name.to_string(), id);
        id
    }

    /// Returns the function with the given name, file, and object,
    /// creating it if needed.
    ///
    /// The class is derived from the symbol prefix before `::` (before any
    /// argument list); symbols without one are filed under `(global)`. The
    /// full name including the signature is the map key, so overloads stay
    /// distinct; same-named functions in different files or objects stay
    /// distinct through the (file, object) match.
    pub fn intern_function(
        &mut self,
        name: &str,
        file: FileId,
        object: ObjectId,
    ) -> FunctionId {
        if let Some(candidates) = self.function_map.get(name) {
            for &id in candidates {
                let f = &self.functions[id.index()];
                if f.file == file && f.object == object {
                    return id;
                }
            }
        }
        let class = self.intern_class(class_name_of(name));
        let id = FunctionId::new(self.functions.len());
        self.functions.push(Function::new(name, class, file, object));
        self.function_map
            .entry(name.to_string())
            .or_default()
            .push(id);
        self.classes[class.index()].functions.push(id);
        self.files[file.index()].functions.push(id);
        self.objects[object.index()].functions.push(id);
        trace!(name, "new function");
        id
    }

    /// Returns the line holder of `function` for `file`, creating it if
    /// needed.
    pub fn intern_source(
        &mut self,
        function: FunctionId,
        file: FileId,
    ) -> SourceId {
        if let Some(&id) = self.functions[function.index()]
            .sources
            .iter()
            .find(|&&s| self.sources[s.index()].file == file)
        {
            return id;
        }
        let id = SourceId::new(self.sources.len());
        self.sources.push(FunctionSource::new(function, file));
        self.functions[function.index()].sources.push(id);
        self.files[file.index()].sources.push(id);
        id
    }

    /// Returns the line `lineno` of `source`, creating it if needed.
    pub fn intern_line(&mut self, source: SourceId, lineno: u32) -> LineId {
        if let Some(&id) = self.sources[source.index()].lines.get(&lineno) {
            return id;
        }
        let id = LineId::new(self.lines.len());
        self.lines.push(Line::new(source, lineno));
        self.sources[source.index()].lines.insert(lineno, id);
        id
    }

    /// Returns the instruction at `addr` of `function`, creating it if
    /// needed.
    pub fn intern_instr(
        &mut self,
        function: FunctionId,
        addr: u64,
    ) -> InstrId {
        if let Some(&id) =
            self.functions[function.index()].instr_map.get(&addr)
        {
            return id;
        }
        let id = InstrId::new(self.instrs.len());
        self.instrs.push(Instr::new(function, addr));
        self.functions[function.index()].instr_map.insert(addr, id);
        id
    }

    /// Returns the call edge `caller`→`called`, creating it if needed and
    /// installing the back reference on the callee.
    pub fn intern_call(
        &mut self,
        caller: FunctionId,
        called: FunctionId,
    ) -> CallId {
        if let Some(&id) = self.functions[caller.index()]
            .callings
            .iter()
            .find(|&&c| self.calls[c.index()].called == called)
        {
            return id;
        }
        let id = CallId::new(self.calls.len());
        self.calls.push(Call::new(caller, called));
        self.functions[caller.index()].callings.push(id);
        self.functions[called.index()].callers.push(id);
        id
    }

    /// Returns the line-granular site of `call` at `line`, creating it if
    /// needed.
    pub fn intern_line_call(
        &mut self,
        call: CallId,
        line: LineId,
    ) -> LineCallId {
        if let Some(&id) = self.calls[call.index()]
            .line_calls
            .iter()
            .find(|&&lc| self.line_calls[lc.index()].line == line)
        {
            return id;
        }
        let id = LineCallId::new(self.line_calls.len());
        self.line_calls.push(LineCall::new(call, line));
        self.calls[call.index()].line_calls.push(id);
        self.lines[line.index()].line_calls.push(id);
        id
    }

    /// Returns the instruction-granular site of `call` at `instr`,
    /// creating it if needed.
    pub fn intern_instr_call(
        &mut self,
        call: CallId,
        instr: InstrId,
    ) -> InstrCallId {
        if let Some(&id) = self.calls[call.index()]
            .instr_calls
            .iter()
            .find(|&&ic| self.instr_calls[ic.index()].instr == instr)
        {
            return id;
        }
        let id = InstrCallId::new(self.instr_calls.len());
        self.instr_calls.push(InstrCall::new(call, instr));
        self.calls[call.index()].instr_calls.push(id);
        self.instrs[instr.index()].instr_calls.push(id);
        id
    }

    /// Returns the jump `from`→`to`, creating it if needed.
    pub fn intern_line_jump(
        &mut self,
        from: LineId,
        to: LineId,
        cond: bool,
    ) -> LineJumpId {
        if let Some(&id) =
            self.lines[from.index()].line_jumps.iter().find(|&&j| {
                let jump = &self.line_jumps[j.index()];
                jump.to == to && jump.cond == cond
            })
        {
            return id;
        }
        let id = LineJumpId::new(self.line_jumps.len());
        self.line_jumps.push(LineJump::new(from, to, cond));
        self.lines[from.index()].line_jumps.push(id);
        id
    }

    /// Returns the instruction jump `from`→`to`, creating it if needed.
    pub fn intern_instr_jump(
        &mut self,
        from: InstrId,
        to: InstrId,
        cond: bool,
    ) -> InstrJumpId {
        if let Some(&id) =
            self.instrs[from.index()].instr_jumps.iter().find(|&&j| {
                let jump = &self.instr_jumps[j.index()];
                jump.to == to && jump.cond == cond
            })
        {
            return id;
        }
        let id = InstrJumpId::new(self.instr_jumps.len());
        self.instr_jumps.push(InstrJump::new(from, to, cond));
        self.instrs[from.index()].instr_jumps.push(id);
        id
    }

    // ---- naming ---------------------------------------------------------

    /// The runtime kind of an item.
    #[must_use]
    pub fn kind_of(&self, item: ItemRef) -> CostKind {
        match item {
            ItemRef::Instr(_) => CostKind::Instr,
            ItemRef::Line(_) => CostKind::Line,
            ItemRef::InstrJump(_) => CostKind::InstrJump,
            ItemRef::LineJump(_) => CostKind::LineJump,
            ItemRef::InstrCall(_) => CostKind::InstrCall,
            ItemRef::LineCall(_) => CostKind::LineCall,
            ItemRef::Call(_) => CostKind::Call,
            ItemRef::Source(_) => CostKind::FunctionSource,
            ItemRef::Function(id) => {
                if self.functions[id.index()].is_cycle() {
                    CostKind::FunctionCycle
                } else {
                    CostKind::Function
                }
            }
            ItemRef::Class(_) => CostKind::Class,
            ItemRef::File(_) => CostKind::File,
            ItemRef::Object(_) => CostKind::Object,
            ItemRef::Part(_) => CostKind::Part,
            ItemRef::Data => CostKind::Data,
        }
    }

    /// Canonical name of an item.
    #[must_use]
    pub fn name_of(&self, item: ItemRef) -> String {
        match item {
            ItemRef::Instr(id) => self.instr(id).name(),
            ItemRef::Line(id) => self.line(id).lineno().to_string(),
            ItemRef::InstrJump(id) => {
                let j = self.instr_jump(id);
                format!(
                    "{} => {}",
                    self.instr(j.from).name(),
                    self.instr(j.to).name()
                )
            }
            ItemRef::LineJump(id) => {
                let j = self.line_jump(id);
                format!(
                    "{} => {}",
                    self.line(j.from).lineno(),
                    self.line(j.to).lineno()
                )
            }
            ItemRef::InstrCall(id) => {
                self.name_of(ItemRef::Call(self.instr_call(id).call))
            }
            ItemRef::LineCall(id) => {
                self.name_of(ItemRef::Call(self.line_call(id).call))
            }
            ItemRef::Call(id) => {
                self.function(self.call(id).called).name().to_string()
            }
            ItemRef::Source(id) => {
                self.file(self.source(id).file).name().to_string()
            }
            ItemRef::Function(id) => self.function(id).name().to_string(),
            ItemRef::Class(id) => self.class(id).name().to_string(),
            ItemRef::File(id) => self.file(id).name().to_string(),
            ItemRef::Object(id) => self.object(id).name().to_string(),
            ItemRef::Part(id) => self.part(id).name().to_string(),
            ItemRef::Data => self.trace_name.clone(),
        }
    }

    /// Human label of an item.
    #[must_use]
    pub fn pretty_name(&self, item: ItemRef) -> String {
        match item {
            ItemRef::Function(id) => self.function_pretty_name(id),
            ItemRef::Call(id) => {
                let c = self.call(id);
                format!(
                    "{} => {}",
                    self.function_pretty_name(c.caller),
                    self.function_pretty_name(c.called)
                )
            }
            ItemRef::Line(id) => {
                let l = self.line(id);
                let file = self.file(self.source(l.source).file);
                format!("{}:{}", file.short_name(), l.lineno())
            }
            ItemRef::Class(id) => self.class(id).pretty_name().to_string(),
            ItemRef::File(id) => self.file(id).short_name().to_string(),
            ItemRef::Object(id) => self.object(id).short_name().to_string(),
            ItemRef::Part(id) => self.part(id).pretty_name().to_string(),
            ItemRef::Data => self.short_trace_name().to_string(),
            other => self.name_of(other),
        }
    }

    /// Human label of a function: `<cycle N>` for cycle nodes, otherwise
    /// the name with the signature suffix dropped when the bare name is
    /// unambiguous in the function map.
    #[must_use]
    pub fn function_pretty_name(&self, id: FunctionId) -> String {
        let f = &self.functions[id.index()];
        if let FunctionKind::Cycle { number, .. } = f.kind {
            return format!("<cycle {number}>");
        }
        let Some(paren) = f.name.find('(') else {
            return f.name.clone();
        };
        let base = f.name[..paren].trim_end();
        if base.is_empty() {
            return f.name.clone();
        }
        let mut hits = 0usize;
        for (key, ids) in self.function_map.range(base.to_string()..) {
            if !key.starts_with(base) {
                break;
            }
            hits += ids.len();
            if hits > 1 {
                return f.name.clone();
            }
        }
        base.to_string()
    }
}

/// Derives the class name from a function symbol: the prefix before the
/// last `::` of the part preceding any argument list, or `(global)`.
pub(crate) fn class_name_of(function_name: &str) -> &str {
    let paren = function_name.find('(').unwrap_or(function_name.len());
    match function_name[..paren].rfind("::") {
        Some(pos) if pos > 0 => &function_name[..pos],
        _ => "(global)",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_derivation() {
        assert_eq!(class_name_of("main"), "(global)");
        assert_eq!(class_name_of("Foo::bar(int)"), "Foo");
        assert_eq!(class_name_of("ns::Foo::bar(std::string)"), "ns::Foo");
        assert_eq!(class_name_of("::anon"), "(global)");
    }

    #[test]
    fn test_interning_is_idempotent() {
        let mut data = Data::new();
        let obj = data.intern_object("/bin/app");
        let file = data.intern_file("main.c");
        let f1 = data.intern_function("main", file, obj);
        let f2 = data.intern_function("main", file, obj);
        assert_eq!(f1, f2);
        assert_eq!(data.function_map().len(), 1);
        assert_eq!(data.class_map().len(), 1);
        assert!(data.class_map().contains_key("(global)"));
    }

    #[test]
    fn test_same_name_different_object_stays_distinct() {
        let mut data = Data::new();
        let obj1 = data.intern_object("a.so");
        let obj2 = data.intern_object("b.so");
        let file = data.intern_file("shared.c");
        let f1 = data.intern_function("process", file, obj1);
        let f2 = data.intern_function("process", file, obj2);
        assert_ne!(f1, f2);
        assert_eq!(data.function_map()["process"].len(), 2);
    }

    #[test]
    fn test_call_interning_installs_back_reference() {
        let mut data = Data::new();
        let obj = data.intern_object("app");
        let file = data.intern_file("main.c");
        let main = data.intern_function("main", file, obj);
        let helper = data.intern_function("helper", file, obj);
        let c1 = data.intern_call(main, helper);
        let c2 = data.intern_call(main, helper);
        assert_eq!(c1, c2);
        assert_eq!(data.function(main).callings(), &[c1]);
        assert_eq!(data.function(helper).callers(), &[c1]);
    }

    #[test]
    fn test_pretty_name_strips_unique_signature() {
        let mut data = Data::new();
        let obj = data.intern_object("app");
        let file = data.intern_file("main.c");
        let unique = data.intern_function("solo(int)", file, obj);
        let over1 = data.intern_function("twice(int)", file, obj);
        let over2 = data.intern_function("twice(char)", file, obj);
        assert_eq!(data.function_pretty_name(unique), "solo");
        assert_eq!(data.function_pretty_name(over1), "twice(int)");
        assert_eq!(data.function_pretty_name(over2), "twice(char)");
    }
}
