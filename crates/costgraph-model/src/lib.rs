//! In-memory cost graph over multi-part profiling traces.
//!
//! A profiling run of one command produces one or more trace files
//! ("parts", time slices of the run). This crate models their combined
//! data as a graph of cost-bearing entities that interactive tools query:
//! browsers, call-graph renderers, source annotators. See [`Data`] first.
//!
//! ## Fixed and dynamic costs
//!
//! Costs read from a trace file are *fixed*: one immutable row per part,
//! accumulated during ingestion. Everything the user actually looks at is
//! *dynamic*: a sum over the currently active parts, recomputed lazily
//! when queried and marked stale en masse when the active set changes.
//!
//! | Item               | Kind    | Summed from                            |
//! |--------------------|---------|----------------------------------------|
//! | part rows          | fixed   | trace file                             |
//! | [`Line`]           | dynamic | its part rows                          |
//! | [`FunctionSource`] | dynamic | its lines                              |
//! | [`Instr`]          | dynamic | its part rows                          |
//! | [`LineCall`]       | dynamic | its part rows                          |
//! | [`Call`]           | dynamic | its part rows                          |
//! | [`Function`]       | dynamic | its part rows (+ calls for inclusive)  |
//! | [`Class`]/[`File`]/[`Object`] | dynamic | their part rows             |
//! | [`Data`]           | dynamic | the parts' totals                      |
//!
//! ## Ownership
//!
//! [`Data`] owns every entity in flat stores addressed by typed ids
//! ([`FunctionId`], [`CallId`], …). A function owns its outgoing calls,
//! its source holders, and its instruction map; a call owns its line- and
//! instruction-granular sites; everything else is a non-owning id
//! reference, so ownership stays acyclic although the call graph is not.
//!
//! ## Cycles
//!
//! Recursive call clusters are collapsed on demand behind synthesized
//! cycle nodes ([`Data::update_function_cycles`]) so call-graph traversal
//! terminates; inclusive costs exclude intra-cycle edges.

mod assoc;
mod call;
mod cycle;
mod data;
mod error;
mod function;
mod group;
mod ingest;
mod instr;
mod item;
mod line;
mod part;
mod search;
mod update;

pub mod export;
pub mod report;

#[doc(inline)]
pub use crate::assoc::Association;
#[doc(inline)]
pub use crate::call::Call;
#[doc(inline)]
pub use crate::data::Data;
#[doc(inline)]
pub use crate::error::ParseError;
#[doc(inline)]
pub use crate::function::{Function, FunctionKind, PartFunction};
#[doc(inline)]
pub use crate::group::{Class, File, GroupCycle, Object};
#[doc(inline)]
pub use crate::ingest::Position;
#[doc(inline)]
pub use crate::instr::{Instr, InstrCall, InstrJump};
#[doc(inline)]
pub use crate::item::{
    CallId, ClassId, CostKind, FileId, FunctionId, InstrCallId, InstrId,
    InstrJumpId, ItemRef, LineCallId, LineId, LineJumpId, ObjectId, PartCall,
    PartCost, PartId, PartJump, SourceId,
};
#[doc(inline)]
pub use crate::line::{FunctionSource, JumpSort, Line, LineCall, LineJump};
#[doc(inline)]
pub use crate::part::Part;
