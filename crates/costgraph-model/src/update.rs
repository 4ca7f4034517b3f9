//! The lazy update protocol.
//!
//! Every dynamic item carries a dirty flag; queries funnel through
//! [`Data::subcost`] / [`Data::cost_vector`], which recompute an item iff
//! its flag is set. Recomputation sums the item's fixed per-part rows over
//! the *active* parts (or lower-level aggregates, recursively). Toggling
//! part activation never touches cached values directly; the caller follows
//! with [`Data::invalidate_dynamic_cost`], a structural walk that only
//! marks flags.

use costgraph_types::{CostVector, SubCost};
use tracing::debug;

use crate::data::Data;
use crate::function::FunctionKind;
use crate::item::{
    CallId, DynamicCost, FunctionId, InstrCallId, InstrId, InstrJumpId,
    ItemRef, LineCallId, LineId, LineJumpId, SourceId,
};

impl Data {
    // ---- queries --------------------------------------------------------

    /// Evaluates the event type at mapping index `ty` against an item's
    /// aggregate cost, updating the item first when it is stale.
    ///
    /// The last (type, value) pair per item is memoized; presentation
    /// layers ask the same type for the same item many times in a row.
    pub fn subcost(&mut self, item: ItemRef, ty: usize) -> SubCost {
        self.ensure_updated(item);
        if let Some(holder) = self.dynamic_of(item) {
            if holder.cached_type == Some(ty) {
                return holder.cached_value;
            }
        }
        let v = self.current_vector(item);
        let value = self.mapping.subcost(ty, &v);
        if let Some(holder) = self.dynamic_of_mut(item) {
            holder.cached_type = Some(ty);
            holder.cached_value = value;
        }
        value
    }

    /// Returns an item's aggregate cost vector, updating it first when it
    /// is stale. Jump items have no vector and yield an empty one.
    pub fn cost_vector(&mut self, item: ItemRef) -> CostVector {
        self.ensure_updated(item);
        self.current_vector(item)
    }

    /// True iff the item has a non-zero count for the given type.
    pub fn has_cost(&mut self, item: ItemRef, ty: usize) -> bool {
        self.subcost(item, ty) != SubCost::ZERO
    }

    /// The item's count for `ty`, formatted in digit groups.
    pub fn pretty_subcost(&mut self, item: ItemRef, ty: usize) -> String {
        self.subcost(item, ty).pretty()
    }

    // ---- function metrics ----------------------------------------------

    /// Inclusive cost: the function plus everything it transitively calls.
    ///
    /// Recursive calls and calls whose callee sits in the same cycle are
    /// excluded, so traversal terminates even on recursive programs.
    pub fn function_cumulative(&mut self, f: FunctionId) -> CostVector {
        self.ensure_updated(ItemRef::Function(f));
        self.functions[f.index()].dynamic.cumulative
    }

    /// How often the function was called, over active parts.
    pub fn function_called_count(&mut self, f: FunctionId) -> SubCost {
        self.ensure_updated(ItemRef::Function(f));
        self.functions[f.index()].dynamic.called_count
    }

    /// How often the function called out, over active parts.
    pub fn function_calling_count(&mut self, f: FunctionId) -> SubCost {
        self.ensure_updated(ItemRef::Function(f));
        self.functions[f.index()].dynamic.calling_count
    }

    /// Number of distinct incoming call edges with activity.
    pub fn function_called_contexts(&mut self, f: FunctionId) -> u32 {
        self.ensure_updated(ItemRef::Function(f));
        self.functions[f.index()].dynamic.called_contexts
    }

    /// Number of distinct outgoing call edges with activity.
    pub fn function_calling_contexts(&mut self, f: FunctionId) -> u32 {
        self.ensure_updated(ItemRef::Function(f));
        self.functions[f.index()].dynamic.calling_contexts
    }

    // ---- call and jump metrics -----------------------------------------

    /// Number of calls over this edge, over active parts.
    pub fn call_count(&mut self, c: CallId) -> SubCost {
        self.ensure_updated(ItemRef::Call(c));
        self.calls[c.index()].dynamic.call_count
    }

    /// Number of calls from this line site, over active parts.
    pub fn line_call_count(&mut self, lc: LineCallId) -> SubCost {
        self.ensure_updated(ItemRef::LineCall(lc));
        self.line_calls[lc.index()].dynamic.call_count
    }

    /// Number of calls from this instruction site, over active parts.
    pub fn instr_call_count(&mut self, ic: InstrCallId) -> SubCost {
        self.ensure_updated(ItemRef::InstrCall(ic));
        self.instr_calls[ic.index()].dynamic.call_count
    }

    /// Executed count of a line jump, over active parts.
    pub fn line_jump_executed(&mut self, j: LineJumpId) -> SubCost {
        self.ensure_updated(ItemRef::LineJump(j));
        self.line_jumps[j.index()].dynamic.executed
    }

    /// Followed (taken) count of a line jump, over active parts.
    pub fn line_jump_followed(&mut self, j: LineJumpId) -> SubCost {
        self.ensure_updated(ItemRef::LineJump(j));
        self.line_jumps[j.index()].dynamic.followed
    }

    /// Executed count of an instruction jump, over active parts.
    pub fn instr_jump_executed(&mut self, j: InstrJumpId) -> SubCost {
        self.ensure_updated(ItemRef::InstrJump(j));
        self.instr_jumps[j.index()].dynamic.executed
    }

    /// Followed (taken) count of an instruction jump, over active parts.
    pub fn instr_jump_followed(&mut self, j: InstrJumpId) -> SubCost {
        self.ensure_updated(ItemRef::InstrJump(j));
        self.instr_jumps[j.index()].dynamic.followed
    }

    // ---- invalidation ---------------------------------------------------

    /// Marks every dynamic aggregate stale.
    ///
    /// Call after any change to part activation. This walk is structural:
    /// it flips flags and clears memos, it never recomputes.
    pub fn invalidate_dynamic_cost(&mut self) {
        for l in &mut self.lines {
            l.dynamic.invalidate();
        }
        for s in &mut self.sources {
            s.dynamic.invalidate();
        }
        for i in &mut self.instrs {
            i.dynamic.invalidate();
        }
        for c in &mut self.calls {
            c.dynamic.cost.invalidate();
        }
        for lc in &mut self.line_calls {
            lc.dynamic.cost.invalidate();
        }
        for ic in &mut self.instr_calls {
            ic.dynamic.cost.invalidate();
        }
        for j in &mut self.line_jumps {
            j.dynamic.dirty = true;
        }
        for j in &mut self.instr_jumps {
            j.dynamic.dirty = true;
        }
        for f in &mut self.functions {
            f.dynamic.cost.invalidate();
        }
        for o in &mut self.objects {
            o.dynamic.invalidate();
        }
        for f in &mut self.files {
            f.dynamic.invalidate();
        }
        for c in &mut self.classes {
            c.dynamic.invalidate();
        }
        self.dynamic.invalidate();
        debug!("dynamic costs invalidated");
    }

    /// Marks one item stale and forwards along its dependant chain.
    ///
    /// Items with a single downstream consumer (a line feeding its source
    /// holder, a holder feeding its function) carry a dependant pointer so
    /// a point invalidation stays cheap; wide fan-in goes through
    /// [`invalidate_dynamic_cost`](Data::invalidate_dynamic_cost) instead.
    pub fn invalidate(&mut self, item: ItemRef) {
        let mut cur = Some(item);
        while let Some(item) = cur {
            cur = match item {
                ItemRef::Line(id) => {
                    self.lines[id.index()].dynamic.invalidate();
                    self.lines[id.index()].dependant
                }
                ItemRef::Source(id) => {
                    self.sources[id.index()].dynamic.invalidate();
                    self.sources[id.index()].dependant
                }
                ItemRef::Instr(id) => {
                    self.instrs[id.index()].dynamic.invalidate();
                    None
                }
                ItemRef::Call(id) => {
                    self.calls[id.index()].dynamic.cost.invalidate();
                    None
                }
                ItemRef::LineCall(id) => {
                    self.line_calls[id.index()].dynamic.cost.invalidate();
                    None
                }
                ItemRef::InstrCall(id) => {
                    self.instr_calls[id.index()].dynamic.cost.invalidate();
                    None
                }
                ItemRef::LineJump(id) => {
                    self.line_jumps[id.index()].dynamic.dirty = true;
                    None
                }
                ItemRef::InstrJump(id) => {
                    self.instr_jumps[id.index()].dynamic.dirty = true;
                    None
                }
                ItemRef::Function(id) => {
                    self.functions[id.index()].dynamic.cost.invalidate();
                    None
                }
                ItemRef::Class(id) => {
                    self.classes[id.index()].dynamic.invalidate();
                    None
                }
                ItemRef::File(id) => {
                    self.files[id.index()].dynamic.invalidate();
                    None
                }
                ItemRef::Object(id) => {
                    self.objects[id.index()].dynamic.invalidate();
                    None
                }
                ItemRef::Part(_) => None,
                ItemRef::Data => {
                    self.dynamic.invalidate();
                    None
                }
            };
        }
    }

    // ---- update walks ---------------------------------------------------

    pub(crate) fn ensure_updated(&mut self, item: ItemRef) {
        match item {
            ItemRef::Line(id) => self.update_line(id),
            ItemRef::Source(id) => self.update_source(id),
            ItemRef::Instr(id) => self.update_instr(id),
            ItemRef::Call(id) => self.update_call(id),
            ItemRef::LineCall(id) => self.update_line_call(id),
            ItemRef::InstrCall(id) => self.update_instr_call(id),
            ItemRef::LineJump(id) => self.update_line_jump(id),
            ItemRef::InstrJump(id) => self.update_instr_jump(id),
            ItemRef::Function(id) => self.update_function(id),
            ItemRef::Class(id) => self.update_class(id),
            ItemRef::File(id) => self.update_file(id),
            ItemRef::Object(id) => self.update_object(id),
            ItemRef::Part(_) => {}
            ItemRef::Data => self.update_data(),
        }
    }

    fn update_line(&mut self, id: LineId) {
        if !self.lines[id.index()].dynamic.dirty {
            return;
        }
        let mut cost = CostVector::new();
        for row in &self.lines[id.index()].parts {
            if self.parts[row.part.index()].is_active() {
                cost.add(&row.cost);
            }
        }
        let dynamic = &mut self.lines[id.index()].dynamic;
        dynamic.cost = cost;
        dynamic.dirty = false;
    }

    fn update_source(&mut self, id: SourceId) {
        if !self.sources[id.index()].dynamic.dirty {
            return;
        }
        let line_ids: Vec<LineId> =
            self.sources[id.index()].lines.values().copied().collect();
        let mut cost = CostVector::new();
        for l in line_ids {
            self.update_line(l);
            cost.add(&self.lines[l.index()].dynamic.cost);
        }
        let dynamic = &mut self.sources[id.index()].dynamic;
        dynamic.cost = cost;
        dynamic.dirty = false;
    }

    fn update_instr(&mut self, id: InstrId) {
        if !self.instrs[id.index()].dynamic.dirty {
            return;
        }
        let mut cost = CostVector::new();
        for row in &self.instrs[id.index()].parts {
            if self.parts[row.part.index()].is_active() {
                cost.add(&row.cost);
            }
        }
        let dynamic = &mut self.instrs[id.index()].dynamic;
        dynamic.cost = cost;
        dynamic.dirty = false;
    }

    fn update_call(&mut self, id: CallId) {
        if !self.calls[id.index()].dynamic.cost.dirty {
            return;
        }
        let mut cost = CostVector::new();
        let mut count = SubCost::ZERO;
        for row in &self.calls[id.index()].parts {
            if self.parts[row.part.index()].is_active() {
                cost.add(&row.cost);
                count += row.call_count;
            }
        }
        let dynamic = &mut self.calls[id.index()].dynamic;
        dynamic.cost.cost = cost;
        dynamic.cost.dirty = false;
        dynamic.call_count = count;
    }

    fn update_line_call(&mut self, id: LineCallId) {
        if !self.line_calls[id.index()].dynamic.cost.dirty {
            return;
        }
        let mut cost = CostVector::new();
        let mut count = SubCost::ZERO;
        for row in &self.line_calls[id.index()].parts {
            if self.parts[row.part.index()].is_active() {
                cost.add(&row.cost);
                count += row.call_count;
            }
        }
        let dynamic = &mut self.line_calls[id.index()].dynamic;
        dynamic.cost.cost = cost;
        dynamic.cost.dirty = false;
        dynamic.call_count = count;
    }

    fn update_instr_call(&mut self, id: InstrCallId) {
        if !self.instr_calls[id.index()].dynamic.cost.dirty {
            return;
        }
        let mut cost = CostVector::new();
        let mut count = SubCost::ZERO;
        for row in &self.instr_calls[id.index()].parts {
            if self.parts[row.part.index()].is_active() {
                cost.add(&row.cost);
                count += row.call_count;
            }
        }
        let dynamic = &mut self.instr_calls[id.index()].dynamic;
        dynamic.cost.cost = cost;
        dynamic.cost.dirty = false;
        dynamic.call_count = count;
    }

    fn update_line_jump(&mut self, id: LineJumpId) {
        if !self.line_jumps[id.index()].dynamic.dirty {
            return;
        }
        let mut executed = SubCost::ZERO;
        let mut followed = SubCost::ZERO;
        for row in &self.line_jumps[id.index()].parts {
            if self.parts[row.part.index()].is_active() {
                executed += row.executed;
                followed += row.followed;
            }
        }
        let dynamic = &mut self.line_jumps[id.index()].dynamic;
        dynamic.executed = executed;
        dynamic.followed = followed;
        dynamic.dirty = false;
    }

    fn update_instr_jump(&mut self, id: InstrJumpId) {
        if !self.instr_jumps[id.index()].dynamic.dirty {
            return;
        }
        let mut executed = SubCost::ZERO;
        let mut followed = SubCost::ZERO;
        for row in &self.instr_jumps[id.index()].parts {
            if self.parts[row.part.index()].is_active() {
                executed += row.executed;
                followed += row.followed;
            }
        }
        let dynamic = &mut self.instr_jumps[id.index()].dynamic;
        dynamic.executed = executed;
        dynamic.followed = followed;
        dynamic.dirty = false;
    }

    fn update_function(&mut self, id: FunctionId) {
        if !self.functions[id.index()].dynamic.cost.dirty {
            return;
        }
        match self.functions[id.index()].kind {
            FunctionKind::Normal => self.update_normal_function(id),
            FunctionKind::Cycle { .. } => self.update_cycle_function(id),
        }
    }

    fn update_normal_function(&mut self, id: FunctionId) {
        let mut cost = CostVector::new();
        let mut called = SubCost::ZERO;
        let mut calling = SubCost::ZERO;
        for row in &self.functions[id.index()].parts {
            if self.parts[row.part.index()].is_active() {
                cost.add(&row.self_cost);
                called += row.called_count;
                calling += row.calling_count;
            }
        }

        // Inclusive cost: call rows already carry the callee's inclusive
        // contribution, so one level of outgoing edges suffices. Recursive
        // and intra-cycle edges are skipped to keep the sum bounded.
        let mut cumulative = cost;
        let callings = self.functions[id.index()].callings.clone();
        let mut calling_contexts = 0;
        for c in &callings {
            self.update_call(*c);
            let call = &self.calls[c.index()];
            if call.dynamic.call_count != SubCost::ZERO {
                calling_contexts += 1;
            }
            if call.is_recursion() || self.call_in_cycle(*c).is_some() {
                continue;
            }
            cumulative.add(&self.calls[c.index()].dynamic.cost.cost);
        }

        let callers = self.functions[id.index()].callers.clone();
        let mut called_contexts = 0;
        for c in &callers {
            self.update_call(*c);
            if self.calls[c.index()].dynamic.call_count != SubCost::ZERO {
                called_contexts += 1;
            }
        }

        let dynamic = &mut self.functions[id.index()].dynamic;
        dynamic.cost.cost = cost;
        dynamic.cost.dirty = false;
        dynamic.cumulative = cumulative;
        dynamic.called_count = called;
        dynamic.calling_count = calling;
        dynamic.called_contexts = called_contexts;
        dynamic.calling_contexts = calling_contexts;
    }

    fn update_cycle_function(&mut self, id: FunctionId) {
        // A cycle node sums its members' exclusive costs; its external
        // view (callers/callings) was collected at cycle setup.
        let members = self.functions[id.index()].cycle_members().to_vec();
        let mut cost = CostVector::new();
        for m in &members {
            let mut member_cost = CostVector::new();
            for row in &self.functions[m.index()].parts {
                if self.parts[row.part.index()].is_active() {
                    member_cost.add(&row.self_cost);
                }
            }
            cost.add(&member_cost);
        }

        let mut cumulative = cost;
        let callings = self.functions[id.index()].callings.clone();
        let mut calling = SubCost::ZERO;
        let mut calling_contexts = 0;
        for c in &callings {
            self.update_call(*c);
            let dynamic = &self.calls[c.index()].dynamic;
            calling += dynamic.call_count;
            if dynamic.call_count != SubCost::ZERO {
                calling_contexts += 1;
            }
            cumulative.add(&dynamic.cost.cost);
        }

        let callers = self.functions[id.index()].callers.clone();
        let mut called = SubCost::ZERO;
        let mut called_contexts = 0;
        for c in &callers {
            self.update_call(*c);
            let dynamic = &self.calls[c.index()].dynamic;
            called += dynamic.call_count;
            if dynamic.call_count != SubCost::ZERO {
                called_contexts += 1;
            }
        }

        let dynamic = &mut self.functions[id.index()].dynamic;
        dynamic.cost.cost = cost;
        dynamic.cost.dirty = false;
        dynamic.cumulative = cumulative;
        dynamic.called_count = called;
        dynamic.calling_count = calling;
        dynamic.called_contexts = called_contexts;
        dynamic.calling_contexts = calling_contexts;
    }

    fn update_class(&mut self, id: crate::item::ClassId) {
        if !self.classes[id.index()].dynamic.dirty {
            return;
        }
        let mut cost = CostVector::new();
        for row in &self.classes[id.index()].parts {
            if self.parts[row.part.index()].is_active() {
                cost.add(&row.cost);
            }
        }
        let dynamic = &mut self.classes[id.index()].dynamic;
        dynamic.cost = cost;
        dynamic.dirty = false;
    }

    fn update_file(&mut self, id: crate::item::FileId) {
        if !self.files[id.index()].dynamic.dirty {
            return;
        }
        let mut cost = CostVector::new();
        for row in &self.files[id.index()].parts {
            if self.parts[row.part.index()].is_active() {
                cost.add(&row.cost);
            }
        }
        let dynamic = &mut self.files[id.index()].dynamic;
        dynamic.cost = cost;
        dynamic.dirty = false;
    }

    fn update_object(&mut self, id: crate::item::ObjectId) {
        if !self.objects[id.index()].dynamic.dirty {
            return;
        }
        let mut cost = CostVector::new();
        for row in &self.objects[id.index()].parts {
            if self.parts[row.part.index()].is_active() {
                cost.add(&row.cost);
            }
        }
        let dynamic = &mut self.objects[id.index()].dynamic;
        dynamic.cost = cost;
        dynamic.dirty = false;
    }

    fn update_data(&mut self) {
        if !self.dynamic.dirty {
            return;
        }
        let mut cost = CostVector::new();
        for p in &self.parts {
            if p.is_active() {
                cost.add(p.totals());
            }
        }
        self.dynamic.cost = cost;
        self.dynamic.dirty = false;
    }

    // ---- holder plumbing ------------------------------------------------

    /// The already-updated vector of an item; jumps yield an empty vector.
    fn current_vector(&self, item: ItemRef) -> CostVector {
        match item {
            ItemRef::Line(id) => self.lines[id.index()].dynamic.cost,
            ItemRef::Source(id) => self.sources[id.index()].dynamic.cost,
            ItemRef::Instr(id) => self.instrs[id.index()].dynamic.cost,
            ItemRef::Call(id) => self.calls[id.index()].dynamic.cost.cost,
            ItemRef::LineCall(id) => {
                self.line_calls[id.index()].dynamic.cost.cost
            }
            ItemRef::InstrCall(id) => {
                self.instr_calls[id.index()].dynamic.cost.cost
            }
            ItemRef::Function(id) => {
                self.functions[id.index()].dynamic.cost.cost
            }
            ItemRef::Class(id) => self.classes[id.index()].dynamic.cost,
            ItemRef::File(id) => self.files[id.index()].dynamic.cost,
            ItemRef::Object(id) => self.objects[id.index()].dynamic.cost,
            ItemRef::Part(id) => *self.parts[id.index()].totals(),
            ItemRef::Data => self.dynamic.cost,
            ItemRef::LineJump(_) | ItemRef::InstrJump(_) => {
                CostVector::new()
            }
        }
    }

    fn dynamic_of(&self, item: ItemRef) -> Option<&DynamicCost> {
        match item {
            ItemRef::Line(id) => Some(&self.lines[id.index()].dynamic),
            ItemRef::Source(id) => Some(&self.sources[id.index()].dynamic),
            ItemRef::Instr(id) => Some(&self.instrs[id.index()].dynamic),
            ItemRef::Call(id) => Some(&self.calls[id.index()].dynamic.cost),
            ItemRef::LineCall(id) => {
                Some(&self.line_calls[id.index()].dynamic.cost)
            }
            ItemRef::InstrCall(id) => {
                Some(&self.instr_calls[id.index()].dynamic.cost)
            }
            ItemRef::Function(id) => {
                Some(&self.functions[id.index()].dynamic.cost)
            }
            ItemRef::Class(id) => Some(&self.classes[id.index()].dynamic),
            ItemRef::File(id) => Some(&self.files[id.index()].dynamic),
            ItemRef::Object(id) => Some(&self.objects[id.index()].dynamic),
            ItemRef::Data => Some(&self.dynamic),
            ItemRef::Part(_)
            | ItemRef::LineJump(_)
            | ItemRef::InstrJump(_) => None,
        }
    }

    fn dynamic_of_mut(&mut self, item: ItemRef) -> Option<&mut DynamicCost> {
        match item {
            ItemRef::Line(id) => Some(&mut self.lines[id.index()].dynamic),
            ItemRef::Source(id) => {
                Some(&mut self.sources[id.index()].dynamic)
            }
            ItemRef::Instr(id) => Some(&mut self.instrs[id.index()].dynamic),
            ItemRef::Call(id) => {
                Some(&mut self.calls[id.index()].dynamic.cost)
            }
            ItemRef::LineCall(id) => {
                Some(&mut self.line_calls[id.index()].dynamic.cost)
            }
            ItemRef::InstrCall(id) => {
                Some(&mut self.instr_calls[id.index()].dynamic.cost)
            }
            ItemRef::Function(id) => {
                Some(&mut self.functions[id.index()].dynamic.cost)
            }
            ItemRef::Class(id) => Some(&mut self.classes[id.index()].dynamic),
            ItemRef::File(id) => Some(&mut self.files[id.index()].dynamic),
            ItemRef::Object(id) => {
                Some(&mut self.objects[id.index()].dynamic)
            }
            ItemRef::Data => Some(&mut self.dynamic),
            ItemRef::Part(_)
            | ItemRef::LineJump(_)
            | ItemRef::InstrJump(_) => None,
        }
    }
}
