//! Item kinds, typed ids, and the holders shared by all cost items.
//!
//! The original design this model descends from used a deep inheritance
//! tree with a virtual `type()` discriminator. Here every entity lives in a
//! store on [`Data`](crate::Data), addressed by a typed id; the runtime
//! discriminator is the [`CostKind`] tag carried by an [`ItemRef`], and the
//! shared cost behaviour is composed from small holder structs
//! ([`DynamicCost`], [`CallDynamic`], [`JumpDynamic`]) plus the fixed
//! per-part rows ([`PartCost`], [`PartCall`], [`PartJump`]).

use costgraph_types::{CostVector, SubCost};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
        )]
        pub struct $name(u32);

        impl $name {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "entity counts stay far below 2^32"
            )]
            pub(crate) fn new(index: usize) -> Self {
                Self(index as u32)
            }

            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(
    /// Index of a [`Part`](crate::Part) in the data's part list.
    PartId
);
define_id!(
    /// Index of an [`Object`](crate::Object) in the data's object store.
    ObjectId
);
define_id!(
    /// Index of a [`File`](crate::File) in the data's file store.
    FileId
);
define_id!(
    /// Index of a [`Class`](crate::Class) in the data's class store.
    ClassId
);
define_id!(
    /// Index of a [`Function`](crate::Function) (or synthesized function
    /// cycle) in the data's function store.
    FunctionId
);
define_id!(
    /// Index of a [`FunctionSource`](crate::FunctionSource).
    SourceId
);
define_id!(
    /// Index of a [`Line`](crate::Line).
    LineId
);
define_id!(
    /// Index of an [`Instr`](crate::Instr).
    InstrId
);
define_id!(
    /// Index of a [`Call`](crate::Call) edge.
    CallId
);
define_id!(
    /// Index of a [`LineCall`](crate::LineCall).
    LineCallId
);
define_id!(
    /// Index of an [`InstrCall`](crate::InstrCall).
    InstrCallId
);
define_id!(
    /// Index of a [`LineJump`](crate::LineJump).
    LineJumpId
);
define_id!(
    /// Index of an [`InstrJump`](crate::InstrJump).
    InstrJumpId
);

/// Runtime discriminator for cost-item kinds.
///
/// [`type_name`](CostKind::type_name) is locale-independent and stable, fit
/// for persisted configuration; [`display_name`](CostKind::display_name) is
/// the human label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostKind {
    /// A code address inside a function.
    Instr,
    /// A source line inside a function source.
    Line,
    /// An intra-function branch between two instructions.
    InstrJump,
    /// An intra-function branch between two lines.
    LineJump,
    /// A call site at instruction granularity.
    InstrCall,
    /// A call site at line granularity.
    LineCall,
    /// A caller→callee edge in the call graph.
    Call,
    /// The lines of one function within one source file.
    FunctionSource,
    /// A profiled function.
    Function,
    /// A synthesized node for a recursive call cluster.
    FunctionCycle,
    /// A class / namespace grouping of functions.
    Class,
    /// A source file grouping of functions.
    File,
    /// A binary object (executable or shared library).
    Object,
    /// All data of one trace part.
    Part,
    /// The whole profile.
    Data,
}

impl CostKind {
    /// All kinds, in declaration order.
    pub const ALL: [CostKind; 15] = [
        CostKind::Instr,
        CostKind::Line,
        CostKind::InstrJump,
        CostKind::LineJump,
        CostKind::InstrCall,
        CostKind::LineCall,
        CostKind::Call,
        CostKind::FunctionSource,
        CostKind::Function,
        CostKind::FunctionCycle,
        CostKind::Class,
        CostKind::File,
        CostKind::Object,
        CostKind::Part,
        CostKind::Data,
    ];

    /// Locale-independent tag, stable across releases.
    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            CostKind::Instr => "Instr",
            CostKind::Line => "Line",
            CostKind::InstrJump => "InstrJump",
            CostKind::LineJump => "LineJump",
            CostKind::InstrCall => "InstrCall",
            CostKind::LineCall => "LineCall",
            CostKind::Call => "Call",
            CostKind::FunctionSource => "FunctionSource",
            CostKind::Function => "Function",
            CostKind::FunctionCycle => "FunctionCycle",
            CostKind::Class => "Class",
            CostKind::File => "File",
            CostKind::Object => "Object",
            CostKind::Part => "Part",
            CostKind::Data => "Data",
        }
    }

    /// Parses a [`type_name`](CostKind::type_name) tag back to a kind.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<CostKind> {
        CostKind::ALL.into_iter().find(|k| k.type_name() == name)
    }

    /// Human-readable kind label.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            CostKind::Instr => "Instruction",
            CostKind::Line => "Source Line",
            CostKind::InstrJump => "Instruction Jump",
            CostKind::LineJump => "Line Jump",
            CostKind::InstrCall => "Instruction Call",
            CostKind::LineCall => "Line Call",
            CostKind::Call => "Call",
            CostKind::FunctionSource => "Function Source",
            CostKind::Function => "Function",
            CostKind::FunctionCycle => "Function Cycle",
            CostKind::Class => "Class",
            CostKind::File => "File",
            CostKind::Object => "Object",
            CostKind::Part => "Trace Part",
            CostKind::Data => "Trace Data",
        }
    }
}

/// Reference to any cost item in a [`Data`](crate::Data).
///
/// This is what queries and search results are expressed in; pair it with
/// the owning data to reach the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[expect(missing_docs, reason = "variants mirror the id types they carry")]
pub enum ItemRef {
    Instr(InstrId),
    Line(LineId),
    InstrJump(InstrJumpId),
    LineJump(LineJumpId),
    InstrCall(InstrCallId),
    LineCall(LineCallId),
    Call(CallId),
    Source(SourceId),
    Function(FunctionId),
    Class(ClassId),
    File(FileId),
    Object(ObjectId),
    Part(PartId),
    Data,
}

/// Cached aggregate vector of a dynamic cost item.
///
/// `dirty` is the lazy-update flag: queries recompute the vector iff it is
/// set and the item sums only active parts since the last recompute. The
/// `cached_type`/`cached_value` pair memoizes the last event-type
/// evaluation, which presentation layers repeat heavily.
#[derive(Debug, Clone)]
pub(crate) struct DynamicCost {
    pub(crate) cost: CostVector,
    pub(crate) dirty: bool,
    pub(crate) cached_type: Option<usize>,
    pub(crate) cached_value: SubCost,
}

impl DynamicCost {
    pub(crate) fn new() -> Self {
        DynamicCost {
            cost: CostVector::new(),
            dirty: true,
            cached_type: None,
            cached_value: SubCost::ZERO,
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.dirty = true;
        self.cached_type = None;
    }
}

/// Dynamic cost plus the call-count metric of call-like items.
#[derive(Debug, Clone)]
pub(crate) struct CallDynamic {
    pub(crate) cost: DynamicCost,
    pub(crate) call_count: SubCost,
}

impl CallDynamic {
    pub(crate) fn new() -> Self {
        CallDynamic {
            cost: DynamicCost::new(),
            call_count: SubCost::ZERO,
        }
    }
}

/// Cached executed/followed counts of a dynamic jump item.
#[derive(Debug, Clone)]
pub(crate) struct JumpDynamic {
    pub(crate) executed: SubCost,
    pub(crate) followed: SubCost,
    pub(crate) dirty: bool,
}

impl JumpDynamic {
    pub(crate) fn new() -> Self {
        JumpDynamic {
            executed: SubCost::ZERO,
            followed: SubCost::ZERO,
            dirty: true,
        }
    }
}

/// Fixed per-part cost row, immutable once ingestion finishes.
#[derive(Debug, Clone)]
pub struct PartCost {
    pub(crate) part: PartId,
    pub(crate) cost: CostVector,
}

impl PartCost {
    /// The part this row was read from.
    #[must_use]
    pub fn part(&self) -> PartId {
        self.part
    }

    /// The fixed cost vector.
    #[must_use]
    pub fn cost(&self) -> &CostVector {
        &self.cost
    }
}

/// Fixed per-part call row: cost plus call count.
#[derive(Debug, Clone)]
pub struct PartCall {
    pub(crate) part: PartId,
    pub(crate) call_count: SubCost,
    pub(crate) cost: CostVector,
}

impl PartCall {
    /// The part this row was read from.
    #[must_use]
    pub fn part(&self) -> PartId {
        self.part
    }

    /// Number of calls recorded by this part.
    #[must_use]
    pub fn call_count(&self) -> SubCost {
        self.call_count
    }

    /// Inclusive cost contributed by the calls of this part.
    #[must_use]
    pub fn cost(&self) -> &CostVector {
        &self.cost
    }
}

/// Fixed per-part jump row: executed and followed branch counts.
///
/// `followed` counts the taken subset of `executed`.
#[derive(Debug, Clone)]
pub struct PartJump {
    pub(crate) part: PartId,
    pub(crate) executed: SubCost,
    pub(crate) followed: SubCost,
}

impl PartJump {
    /// The part this row was read from.
    #[must_use]
    pub fn part(&self) -> PartId {
        self.part
    }

    /// How often the jump site was executed.
    #[must_use]
    pub fn executed(&self) -> SubCost {
        self.executed
    }

    /// How often the jump was taken.
    #[must_use]
    pub fn followed(&self) -> SubCost {
        self.followed
    }
}

/// Get-or-append the row for `part`, checking the last row first: ingestion
/// walks part by part, so the row being filled is almost always the tail.
pub(crate) fn part_cost_mut(
    rows: &mut Vec<PartCost>,
    part: PartId,
) -> &mut PartCost {
    row_for(rows, part, |r| r.part, |part| PartCost {
        part,
        cost: CostVector::new(),
    })
}

/// Get-or-append the call row for `part`; see [`part_cost_mut`].
pub(crate) fn part_call_mut(
    rows: &mut Vec<PartCall>,
    part: PartId,
) -> &mut PartCall {
    row_for(rows, part, |r| r.part, |part| PartCall {
        part,
        call_count: SubCost::ZERO,
        cost: CostVector::new(),
    })
}

/// Get-or-append the jump row for `part`; see [`part_cost_mut`].
pub(crate) fn part_jump_mut(
    rows: &mut Vec<PartJump>,
    part: PartId,
) -> &mut PartJump {
    row_for(rows, part, |r| r.part, |part| PartJump {
        part,
        executed: SubCost::ZERO,
        followed: SubCost::ZERO,
    })
}

fn row_for<T>(
    rows: &mut Vec<T>,
    part: PartId,
    part_of: impl Fn(&T) -> PartId,
    make: impl FnOnce(PartId) -> T,
) -> &mut T {
    let pos = match rows.last() {
        Some(last) if part_of(last) == part => Some(rows.len() - 1),
        _ => rows.iter().position(|r| part_of(r) == part),
    };
    match pos {
        Some(i) => &mut rows[i],
        None => {
            rows.push(make(part));
            rows.last_mut().expect("row just pushed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_roundtrip() {
        for kind in CostKind::ALL {
            assert_eq!(CostKind::from_type_name(kind.type_name()), Some(kind));
        }
        assert_eq!(CostKind::from_type_name("NoSuchKind"), None);
    }

    #[test]
    fn test_part_row_reuse() {
        let mut rows: Vec<PartCost> = Vec::new();
        let p0 = PartId::new(0);
        let p1 = PartId::new(1);
        part_cost_mut(&mut rows, p0).cost.add_at(0, SubCost(1));
        part_cost_mut(&mut rows, p0).cost.add_at(0, SubCost(2));
        part_cost_mut(&mut rows, p1).cost.add_at(0, SubCost(5));
        // Returning to an earlier part falls back to the linear scan.
        part_cost_mut(&mut rows, p0).cost.add_at(0, SubCost(4));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cost().subcost(0), SubCost(7));
        assert_eq!(rows[1].cost().subcost(0), SubCost(5));
    }
}
