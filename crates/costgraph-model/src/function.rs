//! Functions, their per-part rows, and synthesized function cycles.

use std::collections::BTreeMap;

use costgraph_types::{CostVector, SubCost};

use crate::assoc::Association;
use crate::item::{
    CallId, ClassId, DynamicCost, FileId, FunctionId, InstrId, ObjectId,
    PartId, SourceId,
};

/// Distinguishes profiled functions from synthesized cycle nodes.
#[derive(Debug)]
pub enum FunctionKind {
    /// A function read from the trace.
    Normal,
    /// A synthesized node standing for a cluster of recursive calls.
    ///
    /// Cycle nodes appear uniformly in call-graph views but are never in
    /// the name-keyed function map; they are enumerated via
    /// [`Data::function_cycles`](crate::Data::function_cycles).
    Cycle {
        /// Cycle number, starting at 1 per detection run.
        number: u32,
        /// The member the detection run popped last (the cycle head).
        base: FunctionId,
        /// All member functions; closed under intra-cycle calls.
        members: Vec<FunctionId>,
    },
}

/// Fixed per-part sums of one function, accumulated during ingestion.
#[derive(Debug, Clone)]
pub struct PartFunction {
    pub(crate) part: PartId,
    pub(crate) self_cost: CostVector,
    pub(crate) called_count: SubCost,
    pub(crate) calling_count: SubCost,
}

impl PartFunction {
    pub(crate) fn new(part: PartId) -> Self {
        PartFunction {
            part,
            self_cost: CostVector::new(),
            called_count: SubCost::ZERO,
            calling_count: SubCost::ZERO,
        }
    }

    /// The part these sums were read from.
    #[must_use]
    pub fn part(&self) -> PartId {
        self.part
    }

    /// Exclusive cost of the function within this part.
    #[must_use]
    pub fn self_cost(&self) -> &CostVector {
        &self.self_cost
    }

    /// How often this part saw the function being called.
    #[must_use]
    pub fn called_count(&self) -> SubCost {
        self.called_count
    }

    /// How often this part saw the function calling out.
    #[must_use]
    pub fn calling_count(&self) -> SubCost {
        self.calling_count
    }
}

/// Cached dynamic metrics of a function.
#[derive(Debug)]
pub(crate) struct FunctionDynamic {
    pub(crate) cost: DynamicCost,
    pub(crate) cumulative: CostVector,
    pub(crate) called_count: SubCost,
    pub(crate) calling_count: SubCost,
    pub(crate) called_contexts: u32,
    pub(crate) calling_contexts: u32,
}

impl FunctionDynamic {
    pub(crate) fn new() -> Self {
        FunctionDynamic {
            cost: DynamicCost::new(),
            cumulative: CostVector::new(),
            called_count: SubCost::ZERO,
            calling_count: SubCost::ZERO,
            called_contexts: 0,
            calling_contexts: 0,
        }
    }
}

/// A profiled function (or a synthesized cycle node).
///
/// The function owns its outgoing calls, its per-source-file line holders,
/// and its instruction map; incoming calls are non-owning back references
/// installed by the callee-side factory.
#[derive(Debug)]
pub struct Function {
    pub(crate) name: String,
    pub(crate) kind: FunctionKind,
    pub(crate) class: ClassId,
    pub(crate) file: FileId,
    pub(crate) object: ObjectId,
    pub(crate) callers: Vec<CallId>,
    pub(crate) callings: Vec<CallId>,
    pub(crate) sources: Vec<SourceId>,
    pub(crate) instr_map: BTreeMap<u64, InstrId>,
    pub(crate) parts: Vec<PartFunction>,
    pub(crate) cycle: Option<FunctionId>,
    pub(crate) assocs: Vec<Box<dyn Association>>,
    pub(crate) dynamic: FunctionDynamic,
}

impl Function {
    pub(crate) fn new(
        name: &str,
        class: ClassId,
        file: FileId,
        object: ObjectId,
    ) -> Self {
        Function {
            name: name.to_string(),
            kind: FunctionKind::Normal,
            class,
            file,
            object,
            callers: Vec::new(),
            callings: Vec::new(),
            sources: Vec::new(),
            instr_map: BTreeMap::new(),
            parts: Vec::new(),
            cycle: None,
            assocs: Vec::new(),
            dynamic: FunctionDynamic::new(),
        }
    }

    /// Canonical name: the full symbol text including the signature, which
    /// is what disambiguates overloads in the function map.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind tag.
    #[must_use]
    pub fn kind(&self) -> &FunctionKind {
        &self.kind
    }

    /// True for synthesized cycle nodes.
    #[must_use]
    pub fn is_cycle(&self) -> bool {
        matches!(self.kind, FunctionKind::Cycle { .. })
    }

    /// True iff this function belongs to a detected cycle.
    #[must_use]
    pub fn is_cycle_member(&self) -> bool {
        self.cycle.is_some()
    }

    /// The cycle node this function belongs to, if any.
    #[must_use]
    pub fn cycle(&self) -> Option<FunctionId> {
        self.cycle
    }

    /// Cycle number for cycle nodes, `None` otherwise.
    #[must_use]
    pub fn cycle_number(&self) -> Option<u32> {
        match self.kind {
            FunctionKind::Cycle { number, .. } => Some(number),
            FunctionKind::Normal => None,
        }
    }

    /// Members of a cycle node; empty for normal functions.
    #[must_use]
    pub fn cycle_members(&self) -> &[FunctionId] {
        match &self.kind {
            FunctionKind::Cycle { members, .. } => members,
            FunctionKind::Normal => &[],
        }
    }

    /// The class this function was filed under.
    #[must_use]
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// The source file the function was declared in.
    #[must_use]
    pub fn file(&self) -> FileId {
        self.file
    }

    /// The binary object the function lives in.
    #[must_use]
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// Incoming call edges. For a cycle node, the members' external
    /// callers collected by cycle setup.
    #[must_use]
    pub fn callers(&self) -> &[CallId] {
        &self.callers
    }

    /// Outgoing call edges, in insertion order. The cycle detector depends
    /// on this order being stable across reruns.
    #[must_use]
    pub fn callings(&self) -> &[CallId] {
        &self.callings
    }

    /// Per-source-file line holders.
    #[must_use]
    pub fn sources(&self) -> &[SourceId] {
        &self.sources
    }

    /// Address-keyed instruction map; empty when the trace carries no
    /// instruction detail.
    #[must_use]
    pub fn instr_map(&self) -> &BTreeMap<u64, InstrId> {
        &self.instr_map
    }

    /// Fixed per-part rows.
    #[must_use]
    pub fn parts(&self) -> &[PartFunction] {
        &self.parts
    }

    /// Lowest mapped instruction address, when instruction detail exists.
    #[must_use]
    pub fn first_address(&self) -> Option<u64> {
        self.instr_map.keys().next().copied()
    }

    /// Highest mapped instruction address.
    #[must_use]
    pub fn last_address(&self) -> Option<u64> {
        self.instr_map.keys().next_back().copied()
    }
}
