//! The ingestion interface.
//!
//! The trace-file parser is an external collaborator; it drives this
//! narrow surface with (part, entity-key, row) records. Rows are
//! whitespace-separated ASCII decimal lists matching the part's
//! sub-mapping. A record that fails to apply yields a [`ParseError`] and is
//! skipped; ingestion continues.
//!
//! Fixed per-part sums (function self cost, group costs, part totals)
//! accumulate eagerly here, because the rows are immutable once ingestion
//! finishes; only the active-part aggregation on top of them stays lazy.

use costgraph_types::{CostVector, SubCost};
use tracing::debug;

use crate::data::Data;
use crate::error::{ParseError, ParseErrorKind};
use crate::function::PartFunction;
use crate::item::{
    part_call_mut, part_cost_mut, part_jump_mut, FileId, FunctionId,
    ItemRef, ObjectId, PartId,
};
use crate::part::Part;

/// Position of a cost record inside a function: an instruction address, a
/// source line, or both.
#[derive(Debug, Clone, Copy, Default)]
pub struct Position {
    /// Instruction address, when the trace carries instruction detail.
    pub addr: Option<u64>,
    /// Source line number; 0 is the unknown-line bucket.
    pub lineno: Option<u32>,
}

impl Position {
    /// Position at a source line.
    #[must_use]
    pub fn line(lineno: u32) -> Self {
        Position {
            addr: None,
            lineno: Some(lineno),
        }
    }

    /// Position at an instruction address.
    #[must_use]
    pub fn instr(addr: u64) -> Self {
        Position {
            addr: Some(addr),
            lineno: None,
        }
    }

    /// Position carrying both granularities.
    #[must_use]
    pub fn both(addr: u64, lineno: u32) -> Self {
        Position {
            addr: Some(addr),
            lineno: Some(lineno),
        }
    }
}

impl Data {
    /// Registers a new part for one trace file. Parts start active.
    pub fn add_part(&mut self, name: &str) -> PartId {
        let id = PartId::new(self.parts.len());
        self.parts.push(Part::new(name));
        debug!(name, "part added");
        id
    }

    /// Sets a part's sequence number, tracking the profile-wide maximum.
    pub fn set_part_number(&mut self, part: PartId, number: i32) {
        self.parts[part.index()].number = number;
        self.max_part_number = self.max_part_number.max(number);
    }

    /// Sets a part's thread id, tracking the profile-wide maximum.
    pub fn set_part_thread_id(&mut self, part: PartId, tid: i32) {
        self.parts[part.index()].thread_id = tid;
        self.max_thread_id = self.max_thread_id.max(tid);
    }

    /// Sets a part's process id.
    pub fn set_part_process_id(&mut self, part: PartId, pid: i32) {
        self.parts[part.index()].process_id = pid;
    }

    /// Derives the part's sub-mapping from its `events:` header line.
    /// Unknown names allocate new real types.
    pub fn set_part_events(&mut self, part: PartId, events: &str) {
        let sub = self.mapping.sub_mapping(events);
        self.parts[part.index()].sub_mapping = sub;
    }

    /// Strict variant of [`set_part_events`](Data::set_part_events): every
    /// name must already be registered or be a known real type.
    pub fn set_part_events_strict(
        &mut self,
        part: PartId,
        events: &str,
    ) -> Result<(), ParseError> {
        for name in events.split_whitespace() {
            if self.mapping.real_index(name).is_none()
                && costgraph_types::known_real_type(name).is_none()
            {
                return Err(ParseError::unknown_event(name));
            }
        }
        self.set_part_events(part, events);
        Ok(())
    }

    /// Replaces a part's totals row from the trace's summary line and
    /// recomputes the all-parts totals.
    pub fn set_part_totals(
        &mut self,
        part: PartId,
        row: &str,
    ) -> Result<(), ParseError> {
        let sub = self.parts[part.index()].sub_mapping.clone();
        let mut totals = CostVector::new();
        if totals.set_row(&sub, row) == 0 {
            return Err(ParseError::bad_row(row));
        }
        self.parts[part.index()].totals = totals;
        self.recompute_totals();
        self.invalidate(ItemRef::Data);
        Ok(())
    }

    fn recompute_totals(&mut self) {
        let mut totals = CostVector::new();
        for p in &self.parts {
            totals.add(p.totals());
        }
        self.totals = totals;
    }

    /// Applies one cost record: the row lands on the line and/or
    /// instruction named by `pos`, and accumulates into the function's
    /// per-part row, its groups, and the part totals.
    ///
    /// `file` is the source file of the position (it differs from the
    /// function's home file for inlined code).
    pub fn add_cost(
        &mut self,
        part: PartId,
        function: FunctionId,
        file: FileId,
        pos: Position,
        row: &str,
    ) -> Result<(), ParseError> {
        let sub = self.parts[part.index()].sub_mapping.clone();
        let mut v = CostVector::new();
        if v.set_row(&sub, row) == 0 {
            return Err(ParseError::bad_row(row));
        }

        let mut line = None;
        if let Some(lineno) = pos.lineno {
            let source = self.intern_source(function, file);
            let l = self.intern_line(source, lineno);
            part_cost_mut(&mut self.lines[l.index()].parts, part)
                .cost
                .add(&v);
            self.invalidate(ItemRef::Line(l));
            line = Some(l);
        }
        if let Some(addr) = pos.addr {
            let i = self.intern_instr(function, addr);
            if self.instrs[i.index()].line.is_none() {
                self.instrs[i.index()].line = line;
            }
            part_cost_mut(&mut self.instrs[i.index()].parts, part)
                .cost
                .add(&v);
            self.invalidate(ItemRef::Instr(i));
        }
        if pos.lineno.is_none() && pos.addr.is_none() {
            return Err(ParseError::new(ParseErrorKind::BadRow {
                context: "record without position".to_string(),
            }));
        }

        self.part_function_mut(function, part).self_cost.add(&v);
        self.add_group_cost(function, part, &v);
        self.parts[part.index()].totals.add(&v);
        self.totals.add(&v);
        self.invalidate(ItemRef::Function(function));
        self.invalidate(ItemRef::Data);
        Ok(())
    }

    /// Applies one call record: `count` calls from `pos` in `caller` to
    /// `called`, with the callee's inclusive cost contribution in `row`.
    pub fn add_call(
        &mut self,
        part: PartId,
        caller: FunctionId,
        called: FunctionId,
        file: FileId,
        pos: Position,
        count: SubCost,
        row: &str,
    ) -> Result<(), ParseError> {
        let sub = self.parts[part.index()].sub_mapping.clone();
        let mut v = CostVector::new();
        if v.set_row(&sub, row) == 0 {
            return Err(ParseError::bad_row(row));
        }

        let call = self.intern_call(caller, called);
        {
            let row = part_call_mut(&mut self.calls[call.index()].parts, part);
            row.call_count += count;
            row.cost.add(&v);
        }
        self.invalidate(ItemRef::Call(call));

        if let Some(lineno) = pos.lineno {
            let source = self.intern_source(caller, file);
            let line = self.intern_line(source, lineno);
            let lc = self.intern_line_call(call, line);
            let row =
                part_call_mut(&mut self.line_calls[lc.index()].parts, part);
            row.call_count += count;
            row.cost.add(&v);
            self.invalidate(ItemRef::LineCall(lc));
        }
        if let Some(addr) = pos.addr {
            let instr = self.intern_instr(caller, addr);
            let ic = self.intern_instr_call(call, instr);
            let row =
                part_call_mut(&mut self.instr_calls[ic.index()].parts, part);
            row.call_count += count;
            row.cost.add(&v);
            self.invalidate(ItemRef::InstrCall(ic));
        }

        self.part_function_mut(caller, part).calling_count += count;
        self.part_function_mut(called, part).called_count += count;
        self.invalidate(ItemRef::Function(caller));
        self.invalidate(ItemRef::Function(called));
        Ok(())
    }

    /// Applies one jump record between two positions of `function`.
    ///
    /// `followed` counts the taken subset of `executed`; unconditional
    /// jumps pass `cond = false` and `followed == executed`.
    #[expect(
        clippy::too_many_arguments,
        reason = "mirrors the jump record of the trace format field by field"
    )]
    pub fn add_jump(
        &mut self,
        part: PartId,
        function: FunctionId,
        from_file: FileId,
        from: Position,
        to_file: FileId,
        to: Position,
        executed: SubCost,
        followed: SubCost,
        cond: bool,
    ) -> Result<(), ParseError> {
        let mut applied = false;

        if let (Some(from_line), Some(to_line)) = (from.lineno, to.lineno) {
            let from_source = self.intern_source(function, from_file);
            let from_id = self.intern_line(from_source, from_line);
            let to_source = self.intern_source(function, to_file);
            let to_id = self.intern_line(to_source, to_line);
            let j = self.intern_line_jump(from_id, to_id, cond);
            let row =
                part_jump_mut(&mut self.line_jumps[j.index()].parts, part);
            row.executed += executed;
            row.followed += followed;
            self.invalidate(ItemRef::LineJump(j));
            applied = true;
        }
        if let (Some(from_addr), Some(to_addr)) = (from.addr, to.addr) {
            let from_id = self.intern_instr(function, from_addr);
            let to_id = self.intern_instr(function, to_addr);
            let j = self.intern_instr_jump(from_id, to_id, cond);
            let row =
                part_jump_mut(&mut self.instr_jumps[j.index()].parts, part);
            row.executed += executed;
            row.followed += followed;
            self.invalidate(ItemRef::InstrJump(j));
            applied = true;
        }

        if applied {
            Ok(())
        } else {
            Err(ParseError::new(ParseErrorKind::BadRow {
                context: "jump without positions".to_string(),
            }))
        }
    }

    // ---- compressed format ----------------------------------------------

    /// Object reference of the compressed trace format: a declaration
    /// carries the name, later references only the id.
    pub fn compressed_object(
        &mut self,
        index: usize,
        name: Option<&str>,
    ) -> Result<ObjectId, ParseError> {
        match name {
            Some(name) => {
                let id = self.intern_object(name);
                grow_slot(&mut self.object_index, index, id);
                Ok(id)
            }
            None => self
                .object_index
                .get(index)
                .copied()
                .flatten()
                .ok_or_else(|| ParseError::unknown_id("object", index)),
        }
    }

    /// File reference of the compressed trace format.
    pub fn compressed_file(
        &mut self,
        index: usize,
        name: Option<&str>,
    ) -> Result<FileId, ParseError> {
        match name {
            Some(name) => {
                let id = self.intern_file(name);
                grow_slot(&mut self.file_index, index, id);
                Ok(id)
            }
            None => self
                .file_index
                .get(index)
                .copied()
                .flatten()
                .ok_or_else(|| ParseError::unknown_id("file", index)),
        }
    }

    /// Function reference of the compressed trace format.
    pub fn compressed_function(
        &mut self,
        index: usize,
        name: Option<&str>,
        file: FileId,
        object: ObjectId,
    ) -> Result<FunctionId, ParseError> {
        match name {
            Some(name) => {
                let id = self.intern_function(name, file, object);
                grow_slot(&mut self.function_index, index, id);
                Ok(id)
            }
            None => self
                .function_index
                .get(index)
                .copied()
                .flatten()
                .ok_or_else(|| ParseError::unknown_id("function", index)),
        }
    }

    // ---- row plumbing ---------------------------------------------------

    fn part_function_mut(
        &mut self,
        function: FunctionId,
        part: PartId,
    ) -> &mut PartFunction {
        let rows = &mut self.functions[function.index()].parts;
        let pos = match rows.last() {
            Some(last) if last.part == part => Some(rows.len() - 1),
            _ => rows.iter().position(|r| r.part == part),
        };
        match pos {
            Some(i) => &mut rows[i],
            None => {
                rows.push(PartFunction::new(part));
                rows.last_mut().expect("row just pushed")
            }
        }
    }

    fn add_group_cost(
        &mut self,
        function: FunctionId,
        part: PartId,
        v: &CostVector,
    ) {
        let f = &self.functions[function.index()];
        let (class, file, object) = (f.class, f.file, f.object);
        part_cost_mut(&mut self.classes[class.index()].parts, part)
            .cost
            .add(v);
        part_cost_mut(&mut self.files[file.index()].parts, part)
            .cost
            .add(v);
        part_cost_mut(&mut self.objects[object.index()].parts, part)
            .cost
            .add(v);
        self.invalidate(ItemRef::Class(class));
        self.invalidate(ItemRef::File(file));
        self.invalidate(ItemRef::Object(object));
    }
}

fn grow_slot<T: Copy>(table: &mut Vec<Option<T>>, index: usize, value: T) {
    if table.len() <= index {
        table.resize(index + 1, None);
    }
    table[index] = Some(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_profile() -> (Data, PartId, FunctionId, FileId) {
        let mut data = Data::new();
        let part = data.add_part("callgrind.out.1");
        data.set_part_events(part, "Ir Dr");
        let obj = data.intern_object("app");
        let file = data.intern_file("main.c");
        let main = data.intern_function("main", file, obj);
        (data, part, main, file)
    }

    #[test]
    fn test_add_cost_accumulates_everywhere() {
        let (mut data, part, main, file) = small_profile();
        data.add_cost(part, main, file, Position::line(10), "100 4")
            .unwrap();
        data.add_cost(part, main, file, Position::line(10), "50 1")
            .unwrap();

        let f = data.function(main);
        assert_eq!(f.parts().len(), 1);
        assert_eq!(f.parts()[0].self_cost().subcost(0), SubCost(150));
        assert_eq!(data.part(part).totals().subcost(0), SubCost(150));
        assert_eq!(data.totals().subcost(0), SubCost(150));
        assert_eq!(data.totals().subcost(1), SubCost(5));
    }

    #[test]
    fn test_bad_row_is_reported_and_skipped() {
        let (mut data, part, main, file) = small_profile();
        let err = data
            .add_cost(part, main, file, Position::line(10), "bogus")
            .unwrap_err();
        assert!(err.is_bad_row());
        assert_eq!(data.totals().subcost(0), SubCost::ZERO);

        let err = data
            .add_cost(part, main, file, Position::default(), "1 2")
            .unwrap_err();
        assert!(err.is_bad_row());
    }

    #[test]
    fn test_strict_events_reject_unknown_names() {
        let mut data = Data::new();
        let part = data.add_part("p");
        let err =
            data.set_part_events_strict(part, "Ir NotAnEvent").unwrap_err();
        assert!(err.is_unknown_event());
        assert!(data.set_part_events_strict(part, "Ir Dr Dw").is_ok());
    }

    #[test]
    fn test_set_part_totals_overrides_accumulation() {
        let (mut data, part, main, file) = small_profile();
        data.add_cost(part, main, file, Position::line(1), "7 0")
            .unwrap();
        data.set_part_totals(part, "100 20").unwrap();
        assert_eq!(data.part(part).totals().subcost(0), SubCost(100));
        assert_eq!(data.totals().subcost(0), SubCost(100));
    }

    #[test]
    fn test_compressed_references() {
        let mut data = Data::new();
        let obj = data.compressed_object(1, Some("/bin/app")).unwrap();
        assert_eq!(data.compressed_object(1, None).unwrap(), obj);
        assert!(data
            .compressed_object(2, None)
            .unwrap_err()
            .is_unknown_id());

        let file = data.compressed_file(1, Some("main.c")).unwrap();
        let f = data
            .compressed_function(4, Some("main"), file, obj)
            .unwrap();
        assert_eq!(data.compressed_function(4, None, file, obj).unwrap(), f);
        assert!(data
            .compressed_function(5, None, file, obj)
            .unwrap_err()
            .is_unknown_id());
    }

    #[test]
    fn test_instr_cost_links_line() {
        let (mut data, part, main, file) = small_profile();
        data.add_cost(part, main, file, Position::both(0x1000, 3), "9 0")
            .unwrap();
        let instr_id = *data.function(main).instr_map().get(&0x1000).unwrap();
        let line = data.instr(instr_id).line().unwrap();
        assert_eq!(data.line(line).lineno(), 3);
        assert_eq!(data.instr(instr_id).parts()[0].cost().subcost(0), SubCost(9));
    }
}
