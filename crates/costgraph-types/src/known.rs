//! Process-wide registry of well-known event types.
//!
//! The registry maps short names to descriptive definitions and is shared
//! by every profile loaded in the process. It is initialised once, before
//! any profile data exists, and never torn down; [`init_known_types`] lets
//! an embedding application replace the built-in cache-simulator set.

use std::sync::OnceLock;

use indexmap::IndexMap;

/// Definition of a well-known event type.
///
/// A definition with no formula describes a real type; with a formula, a
/// virtual type that profiles may register via
/// [`Mapping::add_known_virtual_types`](crate::Mapping::add_known_virtual_types).
#[derive(Debug, Clone)]
pub struct KnownTypeDef {
    /// Short locale-independent identifier, e.g. `"Ir"`.
    pub name: String,
    /// Long human-readable label, e.g. `"Instruction Fetch"`.
    pub long_name: String,
    /// Formula over short names for virtual types, `None` for reals.
    pub formula: Option<String>,
}

impl KnownTypeDef {
    fn real(name: &str, long_name: &str) -> Self {
        KnownTypeDef {
            name: name.to_string(),
            long_name: long_name.to_string(),
            formula: None,
        }
    }

    fn with_formula(name: &str, long_name: &str, formula: &str) -> Self {
        KnownTypeDef {
            name: name.to_string(),
            long_name: long_name.to_string(),
            formula: Some(formula.to_string()),
        }
    }

    /// True iff this definition describes a real type.
    #[must_use]
    pub fn is_real(&self) -> bool {
        self.formula.is_none()
    }
}

static KNOWN: OnceLock<IndexMap<String, KnownTypeDef>> = OnceLock::new();

/// The built-in cache-simulator event set.
fn defaults() -> IndexMap<String, KnownTypeDef> {
    let defs = [
        KnownTypeDef::real("Ir", "Instruction Fetch"),
        KnownTypeDef::real("Dr", "Data Read Access"),
        KnownTypeDef::real("Dw", "Data Write Access"),
        KnownTypeDef::real("I1mr", "L1 Instr. Fetch Miss"),
        KnownTypeDef::real("D1mr", "L1 Data Read Miss"),
        KnownTypeDef::real("D1mw", "L1 Data Write Miss"),
        KnownTypeDef::real("I2mr", "L2 Instr. Fetch Miss"),
        KnownTypeDef::real("D2mr", "L2 Data Read Miss"),
        KnownTypeDef::real("D2mw", "L2 Data Write Miss"),
        KnownTypeDef::with_formula("L1m", "L1 Miss Sum", "I1mr + D1mr + D1mw"),
        KnownTypeDef::with_formula("L2m", "L2 Miss Sum", "I2mr + D2mr + D2mw"),
        KnownTypeDef::with_formula(
            "CEst",
            "Cycle Estimation",
            "Ir + 10*L1m + 100*L2m",
        ),
    ];
    defs.into_iter().map(|d| (d.name.clone(), d)).collect()
}

fn registry() -> &'static IndexMap<String, KnownTypeDef> {
    KNOWN.get_or_init(defaults)
}

/// Installs the process-wide known-type set.
///
/// Must run before any lookup; returns false (and changes nothing) when the
/// registry is already initialised.
pub fn init_known_types(defs: Vec<KnownTypeDef>) -> bool {
    let map: IndexMap<String, KnownTypeDef> =
        defs.into_iter().map(|d| (d.name.clone(), d)).collect();
    KNOWN.set(map).is_ok()
}

/// Looks up a known real type by short name.
#[must_use]
pub fn known_real_type(name: &str) -> Option<&'static KnownTypeDef> {
    registry().get(name).filter(|d| d.is_real())
}

/// Looks up a known virtual type by short name.
#[must_use]
pub fn known_virtual_type(name: &str) -> Option<&'static KnownTypeDef> {
    registry().get(name).filter(|d| !d.is_real())
}

/// Returns the known type at a registration index.
#[must_use]
pub fn known_type(index: usize) -> Option<&'static KnownTypeDef> {
    registry().get_index(index).map(|(_, d)| d)
}

/// Number of registered known types.
#[must_use]
pub fn known_type_count() -> usize {
    registry().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_present() {
        assert!(known_type_count() >= 12);
        assert!(known_real_type("Ir").is_some());
        assert!(known_real_type("L1m").is_none());
        assert!(known_virtual_type("L1m").is_some());
        assert!(known_virtual_type("Ir").is_none());
    }

    #[test]
    fn test_indexed_access_is_registration_order() {
        let first = known_type(0).unwrap();
        assert_eq!(first.name, "Ir");
        assert!(known_type(known_type_count()).is_none());
    }

    #[test]
    fn test_init_after_first_use_is_rejected() {
        // Force initialisation, then verify a late install is refused.
        let _ = known_type_count();
        assert!(!init_known_types(Vec::new()));
    }
}
