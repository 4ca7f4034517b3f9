//! Event-type registries: the per-profile [`Mapping`] and the per-part
//! [`SubMapping`].

use crate::event::{EventType, ParseState};
use crate::formula::{parse_terms, Coefficients, FormulaError};
use crate::subcost::SubCost;
use crate::vector::{CostVector, MAX_REAL};

/// The set of event types of one profile.
///
/// Two parallel fixed-capacity tables assign indices: real types occupy
/// `0..MAX_REAL`, virtual types `MAX_REAL..2 * MAX_REAL`. Every real index
/// used by any [`SubMapping`] of the profile resolves to a type here.
#[derive(Debug, Default)]
pub struct Mapping {
    reals: Vec<EventType>,
    virtuals: Vec<EventType>,
}

impl Mapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Mapping::default()
    }

    /// Number of real types.
    #[must_use]
    pub fn real_count(&self) -> usize {
        self.reals.len()
    }

    /// Number of virtual types.
    #[must_use]
    pub fn virtual_count(&self) -> usize {
        self.virtuals.len()
    }

    /// First index of the virtual range.
    #[must_use]
    pub const fn min_virtual_index() -> usize {
        MAX_REAL
    }

    /// Registers a real type by short name, reusing the existing index if
    /// the name is already present.
    ///
    /// The long name is taken from the known-type registry when the name is
    /// known there. Returns `None` once all `MAX_REAL` slots are taken.
    pub fn add_real(&mut self, name: &str) -> Option<usize> {
        if let Some(i) = self.reals.iter().position(|t| t.name() == name) {
            return Some(i);
        }
        if self.reals.len() == MAX_REAL {
            return None;
        }
        let index = self.reals.len();
        let long_name = crate::known::known_real_type(name)
            .map_or(name, |def| def.long_name.as_str());
        self.reals.push(EventType::real(name, long_name, index));
        Some(index)
    }

    /// Registers a virtual type, reusing the existing index if a type of
    /// the same short name is already present.
    ///
    /// Returns the type's index in the virtual range, or `None` when the
    /// type is real or the virtual table is full. The formula is resolved
    /// lazily on first evaluation or via [`Mapping::parse_formula`].
    pub fn add_virtual(&mut self, ty: EventType) -> Option<usize> {
        if ty.is_real() {
            return None;
        }
        if let Some(i) =
            self.virtuals.iter().position(|t| t.name() == ty.name())
        {
            return Some(MAX_REAL + i);
        }
        if self.virtuals.len() == MAX_REAL {
            return None;
        }
        self.virtuals.push(ty);
        Some(MAX_REAL + self.virtuals.len() - 1)
    }

    /// Registers every known virtual type whose formula resolves against
    /// the currently registered reals. Returns how many were added.
    pub fn add_known_virtual_types(&mut self) -> usize {
        let mut added = 0;
        for i in 0..crate::known::known_type_count() {
            let Some(def) = crate::known::known_type(i) else { break };
            let Some(formula) = def.formula.as_deref() else {
                continue;
            };
            if self.type_by_name(&def.name).is_some() {
                continue;
            }
            let Some(index) = self.add_virtual(EventType::with_formula(
                &def.name,
                &def.long_name,
                formula,
            )) else {
                continue;
            };
            if self.parse_formula(index).is_ok() {
                added += 1;
            } else {
                self.virtuals.pop();
            }
        }
        added
    }

    /// Looks up a type by index, real or virtual range.
    #[must_use]
    pub fn type_at(&self, index: usize) -> Option<&EventType> {
        if index < MAX_REAL {
            self.reals.get(index)
        } else {
            self.virtuals.get(index - MAX_REAL)
        }
    }

    /// Looks up a real type by position in the real table.
    #[must_use]
    pub fn real_type(&self, index: usize) -> Option<&EventType> {
        self.reals.get(index)
    }

    /// Looks up a virtual type by position in the virtual table.
    #[must_use]
    pub fn virtual_type(&self, index: usize) -> Option<&EventType> {
        self.virtuals.get(index)
    }

    /// Looks up a type by short name, reals first.
    #[must_use]
    pub fn type_by_name(&self, name: &str) -> Option<&EventType> {
        self.reals
            .iter()
            .chain(self.virtuals.iter())
            .find(|t| t.name() == name)
    }

    /// Looks up a type by long name.
    #[must_use]
    pub fn type_by_long_name(&self, long_name: &str) -> Option<&EventType> {
        self.reals
            .iter()
            .chain(self.virtuals.iter())
            .find(|t| t.long_name() == long_name)
    }

    /// Returns the index of the type with the given short name.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        if let Some(i) = self.reals.iter().position(|t| t.name() == name) {
            return Some(i);
        }
        self.virtuals
            .iter()
            .position(|t| t.name() == name)
            .map(|i| MAX_REAL + i)
    }

    /// Returns the real index for a short name, `None` for virtual or
    /// unknown names.
    #[must_use]
    pub fn real_index(&self, name: &str) -> Option<usize> {
        self.reals.iter().position(|t| t.name() == name)
    }

    /// Evaluates the type at `index` against a cost vector; zero for an
    /// unknown index.
    #[must_use]
    pub fn subcost(&self, index: usize, v: &CostVector) -> SubCost {
        self.type_at(index)
            .map_or(SubCost::ZERO, |t| t.subcost(self, v))
    }

    /// Resolves the formula of the type at `index`.
    ///
    /// Real types and unknown indices resolve trivially. A failed virtual
    /// formula leaves the type evaluating to zero; the error says why.
    pub fn parse_formula(&self, index: usize) -> Result<(), FormulaError> {
        match self.type_at(index) {
            Some(ty) if !ty.is_real() => self.resolve_type(ty).map(drop),
            _ => Ok(()),
        }
    }

    /// Renders the resolved formula of the type at `index` back to text in
    /// canonical term order, e.g. `"2*Ir + 10*Dr - 1"`.
    #[must_use]
    pub fn parsed_formula(&self, index: usize) -> Option<String> {
        let ty = self.type_at(index)?;
        if ty.is_real() {
            return None;
        }
        if ty.coefficients().is_none() {
            self.resolve_type(ty).ok()?;
        }
        let c = ty.coefficients()?;
        let mut out = String::new();
        for i in 0..=MAX_REAL {
            let coeff = c.get(i);
            if coeff == 0 {
                continue;
            }
            if out.is_empty() {
                if coeff < 0 {
                    out.push('-');
                }
            } else {
                out.push_str(if coeff < 0 { " - " } else { " + " });
            }
            let magnitude = coeff.unsigned_abs();
            if i == MAX_REAL {
                out.push_str(&magnitude.to_string());
            } else {
                if magnitude != 1 {
                    out.push_str(&magnitude.to_string());
                    out.push('*');
                }
                if let Some(real) = self.reals.get(i) {
                    out.push_str(real.name());
                }
            }
        }
        if out.is_empty() {
            out.push('0');
        }
        Some(out)
    }

    /// Resolves a type's coefficients, recursing through referenced
    /// virtual types.
    ///
    /// Each type is flagged while its formula is being folded; meeting the
    /// flag again means the reference chain looped back.
    pub(crate) fn resolve_type(
        &self,
        ty: &EventType,
    ) -> Result<Coefficients, FormulaError> {
        if let Some(i) = ty.real_index() {
            let mut c = Coefficients::default();
            c.add_at(i, 1);
            return Ok(c);
        }
        match ty.parse_state() {
            ParseState::Parsed(c) => return Ok(c),
            ParseState::InParsing => {
                return Err(FormulaError::cycle(ty.name().to_string()))
            }
            ParseState::Unparsed => {}
        }

        ty.set_parse_state(ParseState::InParsing);
        let result = self.fold_terms(ty.formula());
        match result {
            Ok(c) => {
                ty.set_parse_state(ParseState::Parsed(c));
                Ok(c)
            }
            Err(e) => {
                ty.set_parse_state(ParseState::Unparsed);
                Err(e)
            }
        }
    }

    /// Folds a formula's terms into a coefficient array over the reals.
    fn fold_terms(&self, formula: &str) -> Result<Coefficients, FormulaError> {
        let mut c = Coefficients::default();
        for term in parse_terms(formula)? {
            let signed = term.sign.wrapping_mul(term.coeff);
            match term.name {
                None => c.add_at(MAX_REAL, signed),
                Some(name) => match self.type_by_name(&name) {
                    None => return Err(FormulaError::unresolved(name)),
                    Some(referenced) => {
                        let sub = self.resolve_type(referenced)?;
                        c.add_scaled(signed, &sub);
                    }
                },
            }
        }
        Ok(c)
    }

    /// Builds a sub-mapping from a whitespace-separated list of short
    /// names, the `events:` line of a part header.
    ///
    /// Unknown names allocate new real indices; names beyond the real
    /// table's capacity stay unmapped (their row columns are consumed and
    /// dropped during ingestion).
    pub fn sub_mapping(&mut self, names: &str) -> SubMapping {
        let indices: Vec<Option<usize>> =
            names.split_whitespace().map(|n| self.add_real(n)).collect();
        SubMapping::build(indices)
    }
}

/// A per-part reindexing from the part's column order to canonical real
/// indices.
///
/// Built by appending the short names of a part header in order. Also keeps
/// the ordered list of real indices *not* used by this part, so ingestion
/// can zero-fill the columns the part does not carry, and an identity flag
/// enabling a direct path that skips the indirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubMapping {
    indices: Vec<Option<usize>>,
    unused: Vec<usize>,
    is_identity: bool,
}

impl SubMapping {
    /// An empty sub-mapping; every real index is unused.
    #[must_use]
    pub fn empty() -> Self {
        SubMapping::build(Vec::new())
    }

    pub(crate) fn build(indices: Vec<Option<usize>>) -> Self {
        let mut used = [false; MAX_REAL];
        let mut is_identity = true;
        for (i, slot) in indices.iter().enumerate() {
            match slot {
                Some(r) => {
                    used[*r] = true;
                    if *r != i {
                        is_identity = false;
                    }
                }
                None => is_identity = false,
            }
        }
        let unused =
            (0..MAX_REAL).filter(|&i| !used[i]).collect::<Vec<usize>>();
        SubMapping {
            indices,
            unused,
            is_identity,
        }
    }

    /// Number of columns this part carries.
    #[must_use]
    pub fn count(&self) -> usize {
        self.indices.len()
    }

    /// True iff the `i`-th column maps to real index `i` for every column.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.is_identity
    }

    /// Canonical real index of the `i`-th column, `None` when the column is
    /// out of range or unmapped.
    #[must_use]
    pub fn real_index(&self, i: usize) -> Option<usize> {
        self.indices.get(i).copied().flatten()
    }

    /// Real indices not used by this sub-mapping, in increasing order.
    #[must_use]
    pub fn unused(&self) -> &[usize] {
        &self.unused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_real_is_idempotent() {
        let mut m = Mapping::new();
        assert_eq!(m.add_real("Ir"), Some(0));
        assert_eq!(m.add_real("Dr"), Some(1));
        assert_eq!(m.add_real("Ir"), Some(0));
        assert_eq!(m.real_count(), 2);
    }

    #[test]
    fn test_add_real_capacity() {
        let mut m = Mapping::new();
        for i in 0..MAX_REAL {
            assert_eq!(m.add_real(&format!("e{i}")), Some(i));
        }
        assert_eq!(m.add_real("overflow"), None);
        assert_eq!(m.add_real("e3"), Some(3));
    }

    #[test]
    fn test_virtual_index_range() {
        let mut m = Mapping::new();
        m.add_real("Ir");
        let idx = m
            .add_virtual(EventType::with_formula("Twice", "Twice Ir", "2*Ir"))
            .unwrap();
        assert_eq!(idx, MAX_REAL);
        assert_eq!(m.index_of("Twice"), Some(MAX_REAL));
        assert!(m.type_at(idx).is_some());
        assert_eq!(m.virtual_type(0).unwrap().name(), "Twice");
    }

    #[test]
    fn test_lookup_by_long_name() {
        let mut m = Mapping::new();
        m.add_real("Ir");
        let ty = m.type_by_long_name("Instruction Fetch").unwrap();
        assert_eq!(ty.name(), "Ir");
    }

    #[test]
    fn test_virtual_formula_evaluates() {
        let mut m = Mapping::new();
        m.sub_mapping("l1rm l2rm");
        let idx = m
            .add_virtual(EventType::with_formula(
                "RM",
                "Read Miss Sum",
                "l1rm + l2rm",
            ))
            .unwrap();
        let mut v = CostVector::new();
        v.add_at(0, SubCost(3));
        v.add_at(1, SubCost(7));
        assert_eq!(m.subcost(idx, &v), SubCost(10));
    }

    #[test]
    fn test_unresolved_reference_yields_zero() {
        let mut m = Mapping::new();
        m.add_real("l1rm");
        let idx = m
            .add_virtual(EventType::with_formula(
                "RM",
                "Read Miss Sum",
                "l1rm + foo",
            ))
            .unwrap();
        let err = m.parse_formula(idx).unwrap_err();
        assert!(err.is_unresolved());

        let mut v = CostVector::new();
        v.add_at(0, SubCost(3));
        assert_eq!(m.subcost(idx, &v), SubCost::ZERO);
    }

    #[test]
    fn test_formula_cycle_detected() {
        let mut m = Mapping::new();
        let a = m
            .add_virtual(EventType::with_formula("A", "A", "B + 1"))
            .unwrap();
        m.add_virtual(EventType::with_formula("B", "B", "A")).unwrap();
        let err = m.parse_formula(a).unwrap_err();
        assert!(err.is_cycle());
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut m = Mapping::new();
        let idx = m
            .add_virtual(EventType::with_formula("S", "S", "S + 1"))
            .unwrap();
        assert!(m.parse_formula(idx).unwrap_err().is_cycle());
    }

    #[test]
    fn test_virtual_referencing_virtual_folds() {
        let mut m = Mapping::new();
        m.sub_mapping("Ir Dr");
        m.add_virtual(EventType::with_formula("Sum", "Sum", "Ir + Dr"))
            .unwrap();
        let idx = m
            .add_virtual(EventType::with_formula("Double", "Double", "2*Sum"))
            .unwrap();
        let mut v = CostVector::new();
        v.add_at(0, SubCost(5));
        v.add_at(1, SubCost(6));
        assert_eq!(m.subcost(idx, &v), SubCost(22));
        assert_eq!(m.parsed_formula(idx).unwrap(), "2*Ir + 2*Dr");
    }

    #[test]
    fn test_add_known_virtual_types() {
        let mut m = Mapping::new();
        m.sub_mapping("Ir Dr Dw I1mr D1mr D1mw I2mr D2mr D2mw");
        let added = m.add_known_virtual_types();
        assert!(added >= 3);
        assert!(m.type_by_name("L1m").is_some());
        assert!(m.type_by_name("L2m").is_some());
        assert!(m.type_by_name("CEst").is_some());
    }

    #[test]
    fn test_sub_mapping_allocates_new_reals() {
        let mut m = Mapping::new();
        let sm1 = m.sub_mapping("Event1 Cost1 Cost2");
        assert_eq!(
            (0..sm1.count())
                .map(|i| sm1.real_index(i))
                .collect::<Vec<_>>(),
            vec![Some(0), Some(1), Some(2)]
        );
        let sm2 = m.sub_mapping("Event2 Cost3 Event1");
        assert_eq!(
            (0..sm2.count())
                .map(|i| sm2.real_index(i))
                .collect::<Vec<_>>(),
            vec![Some(3), Some(4), Some(0)]
        );
        assert!(sm1.is_identity());
        assert!(!sm2.is_identity());
    }

    #[test]
    fn test_sub_mapping_unused_list() {
        let mut m = Mapping::new();
        m.sub_mapping("Ir Dr Dw");
        let sub = m.sub_mapping("Dw");
        assert_eq!(sub.real_index(0), Some(2));
        assert!(sub.unused().starts_with(&[0, 1, 3]));
        assert_eq!(sub.unused().len(), MAX_REAL - 1);
    }
}
