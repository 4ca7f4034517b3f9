//! Named event types, real and virtual.

use std::cell::Cell;

use crate::formula::Coefficients;
use crate::mapping::Mapping;
use crate::subcost::SubCost;
use crate::vector::CostVector;

/// Resolution state of a virtual type's formula.
///
/// `InParsing` marks a type currently being resolved; seeing it again
/// during recursive resolution is how reference cycles are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParseState {
    Unparsed,
    InParsing,
    Parsed(Coefficients),
}

/// A named event type, e.g. `"l1rm"` / `"L1 Read Miss"`.
///
/// A type is *real* iff its formula is empty: its values come straight from
/// the trace, at a fixed slot of every [`CostVector`]. A *virtual* type is
/// computed from reals by an integer-linear formula; once resolved, the
/// coefficient array is cached and evaluation is a dot product.
#[derive(Debug)]
pub struct EventType {
    name: String,
    long_name: String,
    formula: String,
    real_index: Option<usize>,
    parse: Cell<ParseState>,
}

impl EventType {
    /// Creates a real type at the given canonical slot.
    #[must_use]
    pub fn real(name: &str, long_name: &str, index: usize) -> Self {
        EventType {
            name: name.to_string(),
            long_name: long_name.to_string(),
            formula: String::new(),
            real_index: Some(index),
            parse: Cell::new(ParseState::Unparsed),
        }
    }

    /// Creates a virtual type from a formula over short type names.
    ///
    /// The formula is resolved lazily, against the [`Mapping`] the type is
    /// added to; see [`Mapping::parse_formula`].
    #[must_use]
    pub fn with_formula(name: &str, long_name: &str, formula: &str) -> Self {
        EventType {
            name: name.to_string(),
            long_name: long_name.to_string(),
            formula: formula.to_string(),
            real_index: None,
            parse: Cell::new(ParseState::Unparsed),
        }
    }

    /// Short locale-independent identifier, e.g. `"l1rm"`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Long human-readable label, e.g. `"L1 Read Miss"`.
    #[must_use]
    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    /// The formula text; empty for real types.
    #[must_use]
    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// True iff the type's values come straight from the trace.
    #[must_use]
    pub fn is_real(&self) -> bool {
        self.formula.is_empty()
    }

    /// Canonical slot for a real type, `None` for virtual types.
    #[must_use]
    pub fn real_index(&self) -> Option<usize> {
        self.real_index
    }

    /// Resolved coefficients, if the formula has been parsed successfully.
    #[must_use]
    pub fn coefficients(&self) -> Option<Coefficients> {
        match self.parse.get() {
            ParseState::Parsed(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn parse_state(&self) -> ParseState {
        self.parse.get()
    }

    pub(crate) fn set_parse_state(&self, state: ParseState) {
        self.parse.set(state);
    }

    /// Evaluates this type against a cost vector.
    ///
    /// Real types read their slot directly. Virtual types resolve their
    /// formula on first use; an unresolvable formula makes the type
    /// evaluate to zero from then on, per the recover-locally error policy.
    #[must_use]
    pub fn subcost(&self, mapping: &Mapping, v: &CostVector) -> SubCost {
        if let Some(i) = self.real_index {
            return v.subcost(i);
        }
        match self.parse.get() {
            ParseState::Parsed(c) => c.apply(v),
            _ => match mapping.resolve_type(self) {
                Ok(c) => c.apply(v),
                Err(_) => SubCost::ZERO,
            },
        }
    }
}
