//! Source lines, per-source-file line holders, and line-granular call and
//! jump sites.

use std::collections::BTreeMap;

use crate::item::{
    CallDynamic, CallId, DynamicCost, FileId, FunctionId, ItemRef,
    JumpDynamic, LineCallId, LineId, LineJumpId, PartCall, PartCost,
    PartJump, SourceId,
};

/// The lines of one function within one source file.
///
/// With inlining, lines of the same function can come from different source
/// files; one holder exists per (function, file) pair and owns that file's
/// line map. Line number 0 collects costs the trace could not attribute to
/// a line.
#[derive(Debug)]
pub struct FunctionSource {
    pub(crate) function: FunctionId,
    pub(crate) file: FileId,
    pub(crate) lines: BTreeMap<u32, LineId>,
    pub(crate) dynamic: DynamicCost,
    pub(crate) dependant: Option<ItemRef>,
}

impl FunctionSource {
    pub(crate) fn new(function: FunctionId, file: FileId) -> Self {
        FunctionSource {
            function,
            file,
            lines: BTreeMap::new(),
            dynamic: DynamicCost::new(),
            dependant: Some(ItemRef::Function(function)),
        }
    }

    /// The function these lines belong to.
    #[must_use]
    pub fn function(&self) -> FunctionId {
        self.function
    }

    /// The source file the lines come from.
    #[must_use]
    pub fn file(&self) -> FileId {
        self.file
    }

    /// Line-number-keyed map of lines.
    #[must_use]
    pub fn line_map(&self) -> &BTreeMap<u32, LineId> {
        &self.lines
    }

    /// Lowest attributed line number (line 0 does not count).
    #[must_use]
    pub fn first_lineno(&self) -> Option<u32> {
        self.lines.keys().find(|&&l| l != 0).copied()
    }

    /// Highest attributed line number.
    #[must_use]
    pub fn last_lineno(&self) -> Option<u32> {
        self.lines.keys().next_back().filter(|&&l| l != 0).copied()
    }
}

/// A source line of the program.
#[derive(Debug)]
pub struct Line {
    pub(crate) source: SourceId,
    pub(crate) lineno: u32,
    pub(crate) parts: Vec<PartCost>,
    pub(crate) line_calls: Vec<LineCallId>,
    pub(crate) line_jumps: Vec<LineJumpId>,
    pub(crate) dynamic: DynamicCost,
    pub(crate) dependant: Option<ItemRef>,
}

impl Line {
    pub(crate) fn new(source: SourceId, lineno: u32) -> Self {
        Line {
            source,
            lineno,
            parts: Vec::new(),
            line_calls: Vec::new(),
            line_jumps: Vec::new(),
            dynamic: DynamicCost::new(),
            dependant: Some(ItemRef::Source(source)),
        }
    }

    /// The holder this line belongs to.
    #[must_use]
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// The line number within the source file.
    #[must_use]
    pub fn lineno(&self) -> u32 {
        self.lineno
    }

    /// Fixed per-part rows.
    #[must_use]
    pub fn parts(&self) -> &[PartCost] {
        &self.parts
    }

    /// Calls leaving from this line.
    #[must_use]
    pub fn line_calls(&self) -> &[LineCallId] {
        &self.line_calls
    }

    /// Jumps leaving from this line.
    #[must_use]
    pub fn line_jumps(&self) -> &[LineJumpId] {
        &self.line_jumps
    }
}

/// A call from a line of one function to another function.
#[derive(Debug)]
pub struct LineCall {
    pub(crate) call: CallId,
    pub(crate) line: LineId,
    pub(crate) parts: Vec<PartCall>,
    pub(crate) dynamic: CallDynamic,
}

impl LineCall {
    pub(crate) fn new(call: CallId, line: LineId) -> Self {
        LineCall {
            call,
            line,
            parts: Vec::new(),
            dynamic: CallDynamic::new(),
        }
    }

    /// The call edge this site belongs to.
    #[must_use]
    pub fn call(&self) -> CallId {
        self.call
    }

    /// The line the call leaves from.
    #[must_use]
    pub fn line(&self) -> LineId {
        self.line
    }

    /// Fixed per-part rows.
    #[must_use]
    pub fn parts(&self) -> &[PartCall] {
        &self.parts
    }
}

/// A jump from one line to another inside a function.
#[derive(Debug)]
pub struct LineJump {
    pub(crate) from: LineId,
    pub(crate) to: LineId,
    pub(crate) cond: bool,
    pub(crate) parts: Vec<PartJump>,
    pub(crate) dynamic: JumpDynamic,
}

impl LineJump {
    pub(crate) fn new(from: LineId, to: LineId, cond: bool) -> Self {
        LineJump {
            from,
            to,
            cond,
            parts: Vec::new(),
            dynamic: JumpDynamic::new(),
        }
    }

    /// Source line of the jump.
    #[must_use]
    pub fn line_from(&self) -> LineId {
        self.from
    }

    /// Target line of the jump.
    #[must_use]
    pub fn line_to(&self) -> LineId {
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

/// Sort order for jump lists, selected by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpSort {
    /// Order by the jump's source position.
    BySource,
    /// Order by the jump's target position.
    ByTarget,
}

impl crate::Data {
    /// The jumps leaving `line`, ordered by source or target line number.
    #[must_use]
    pub fn line_jumps_sorted(
        &self,
        line: LineId,
        sort: JumpSort,
    ) -> Vec<LineJumpId> {
        let mut jumps = self.line(line).line_jumps().to_vec();
        jumps.sort_by_key(|&j| {
            let jump = self.line_jump(j);
            match sort {
                JumpSort::BySource => self.line(jump.from).lineno(),
                JumpSort::ByTarget => self.line(jump.to).lineno(),
            }
        });
        jumps
    }

    /// The jumps leaving `instr`, ordered by source or target address.
    #[must_use]
    pub fn instr_jumps_sorted(
        &self,
        instr: crate::item::InstrId,
        sort: JumpSort,
    ) -> Vec<crate::item::InstrJumpId> {
        let mut jumps = self.instr(instr).instr_jumps().to_vec();
        jumps.sort_by_key(|&j| {
            let jump = self.instr_jump(j);
            match sort {
                JumpSort::BySource => self.instr(jump.from).addr(),
                JumpSort::ByTarget => self.instr(jump.to).addr(),
            }
        });
        jumps
    }
}
