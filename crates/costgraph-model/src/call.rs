//! Call edges between functions.

use crate::item::{
    CallDynamic, FunctionId, InstrCallId, LineCallId, PartCall,
};

/// A caller→callee edge in the call graph.
///
/// The endpoints are stable references fixed at construction; cycle logic
/// never rewrites them, it only substitutes the cycle node in the
/// skip-cycle views
/// ([`Data::call_caller`](crate::Data::call_caller) /
/// [`Data::call_called`](crate::Data::call_called)). The call owns its
/// line- and instruction-granular children and one fixed row per part.
#[derive(Debug)]
pub struct Call {
    pub(crate) caller: FunctionId,
    pub(crate) called: FunctionId,
    pub(crate) line_calls: Vec<LineCallId>,
    pub(crate) instr_calls: Vec<InstrCallId>,
    pub(crate) parts: Vec<PartCall>,
    pub(crate) dynamic: CallDynamic,
}

impl Call {
    pub(crate) fn new(caller: FunctionId, called: FunctionId) -> Self {
        Call {
            caller,
            called,
            line_calls: Vec::new(),
            instr_calls: Vec::new(),
            parts: Vec::new(),
            dynamic: CallDynamic::new(),
        }
    }

    /// The calling function.
    #[must_use]
    pub fn caller(&self) -> FunctionId {
        self.caller
    }

    /// The called function.
    #[must_use]
    pub fn called(&self) -> FunctionId {
        self.called
    }

    /// True iff the function calls itself.
    #[must_use]
    pub fn is_recursion(&self) -> bool {
        self.caller == self.called
    }

    /// Line-granular call sites of this edge.
    #[must_use]
    pub fn line_calls(&self) -> &[LineCallId] {
        &self.line_calls
    }

    /// Instruction-granular call sites of this edge.
    #[must_use]
    pub fn instr_calls(&self) -> &[InstrCallId] {
        &self.instr_calls
    }

    /// Fixed per-part rows.
    #[must_use]
    pub fn parts(&self) -> &[PartCall] {
        &self.parts
    }
}
