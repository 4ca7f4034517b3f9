//! Instruction-level entities; present only when the trace carries
//! instruction detail.

use crate::item::{
    CallDynamic, CallId, DynamicCost, FunctionId, InstrCallId, InstrId,
    InstrJumpId, JumpDynamic, LineId, PartCall, PartCost, PartJump,
};

/// A code instruction address of the program.
#[derive(Debug)]
pub struct Instr {
    pub(crate) function: FunctionId,
    pub(crate) addr: u64,
    pub(crate) line: Option<LineId>,
    pub(crate) parts: Vec<PartCost>,
    pub(crate) instr_calls: Vec<InstrCallId>,
    pub(crate) instr_jumps: Vec<InstrJumpId>,
    pub(crate) dynamic: DynamicCost,
}

impl Instr {
    pub(crate) fn new(function: FunctionId, addr: u64) -> Self {
        Instr {
            function,
            addr,
            line: None,
            parts: Vec::new(),
            instr_calls: Vec::new(),
            instr_jumps: Vec::new(),
            dynamic: DynamicCost::new(),
        }
    }

    /// The function this address belongs to.
    #[must_use]
    pub fn function(&self) -> FunctionId {
        self.function
    }

    /// The memory address.
    #[must_use]
    pub fn addr(&self) -> u64 {
        self.addr
    }

    /// The source line this address maps to, when known.
    #[must_use]
    pub fn line(&self) -> Option<LineId> {
        self.line
    }

    /// Canonical name: the address in hex.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{:#x}", self.addr)
    }

    /// Fixed per-part rows.
    #[must_use]
    pub fn parts(&self) -> &[PartCost] {
        &self.parts
    }

    /// Calls leaving from this address.
    #[must_use]
    pub fn instr_calls(&self) -> &[InstrCallId] {
        &self.instr_calls
    }

    /// Jumps leaving from this address.
    #[must_use]
    pub fn instr_jumps(&self) -> &[InstrJumpId] {
        &self.instr_jumps
    }
}

/// A call from an instruction of one function to another function.
#[derive(Debug)]
pub struct InstrCall {
    pub(crate) call: CallId,
    pub(crate) instr: InstrId,
    pub(crate) parts: Vec<PartCall>,
    pub(crate) dynamic: CallDynamic,
}

impl InstrCall {
    pub(crate) fn new(call: CallId, instr: InstrId) -> Self {
        InstrCall {
            call,
            instr,
            parts: Vec::new(),
            dynamic: CallDynamic::new(),
        }
    }

    /// The call edge this site belongs to.
    #[must_use]
    pub fn call(&self) -> CallId {
        self.call
    }

    /// The instruction the call leaves from.
    #[must_use]
    pub fn instr(&self) -> InstrId {
        self.instr
    }

    /// Fixed per-part rows.
    #[must_use]
    pub fn parts(&self) -> &[PartCall] {
        &self.parts
    }
}

/// A jump between two instructions inside a function.
#[derive(Debug)]
pub struct InstrJump {
    pub(crate) from: InstrId,
    pub(crate) to: InstrId,
    pub(crate) cond: bool,
    pub(crate) parts: Vec<PartJump>,
    pub(crate) dynamic: JumpDynamic,
}

impl InstrJump {
    pub(crate) fn new(from: InstrId, to: InstrId, cond: bool) -> Self {
        InstrJump {
            from,
            to,
            cond,
            parts: Vec::new(),
            dynamic: JumpDynamic::new(),
        }
    }

    /// Source instruction of the jump.
    #[must_use]
    pub fn instr_from(&self) -> InstrId {
        self.from
    }

    /// Target instruction of the jump.
    #[must_use]
    pub fn instr_to(&self) -> InstrId {
        self.to
    }

    /// True for conditional jumps.
    #[must_use]
    pub fn is_cond_jump(&self) -> bool {
        self.cond
    }

    /// Fixed per-part rows.
    #[must_use]
    pub fn parts(&self) -> &[PartJump] {
        &self.parts
    }
}
