//! Value-level cost model shared by all costgraph crates.
//!
//! A profiling run counts *events* (instruction fetches, cache misses, …)
//! per instruction, line, and call. This crate defines the vocabulary those
//! counts are expressed in:
//!
//! - [`SubCost`]: a single 64-bit event counter with ASCII parsing and
//!   grouped pretty-printing.
//! - [`CostVector`]: a fixed-capacity array of counters. The semantic
//!   meaning of each slot lives outside the vector, in a [`Mapping`].
//! - [`EventType`]: a named event, either *real* (counted by the tracer) or
//!   *virtual* (computed from reals by an integer-linear formula).
//! - [`Mapping`]: the registry of event types for one profile, assigning
//!   canonical slot indices to reals and virtuals.
//! - [`SubMapping`]: the per-trace-part column order, resolving a part's
//!   `events:` header to canonical real indices.
//! - [`known`]: the process-wide registry of well-known event types.
//!
//! Formula handling (parsing, coefficient folding, cycle detection) is in
//! [`formula`]; failures surface as [`FormulaError`] and leave the type
//! evaluating to zero rather than aborting.

mod event;
mod formula;
mod known;
mod mapping;
mod subcost;
mod vector;

#[doc(inline)]
pub use event::EventType;
#[doc(inline)]
pub use formula::{Coefficients, FormulaError};
#[doc(inline)]
pub use known::{
    init_known_types, known_real_type, known_type, known_type_count,
    known_virtual_type, KnownTypeDef,
};
#[doc(inline)]
pub use mapping::{Mapping, SubMapping};
#[doc(inline)]
pub use subcost::{strip_u64, SubCost};
#[doc(inline)]
pub use vector::{CostVector, MAX_REAL};
