//! Formula parsing for virtual event types.
//!
//! A formula is a sum of signed integer-coefficient terms, where each term
//! is either a short type name or an integer constant:
//!
//! ```text
//! l1rm + l2rm
//! 2*Ir + 10*Dr - 1
//! ```
//!
//! Parsing happens in two stages: this module tokenizes the text into
//! [`Term`]s, and [`Mapping`](crate::Mapping) resolves the referenced names
//! into a [`Coefficients`] array over the canonical real indices, with the
//! constant folded into slot [`MAX_REAL`]. Name resolution recurses through
//! referenced virtual types; an `in_parsing` marker on each type turns
//! re-entry into a [`FormulaError`] instead of an infinite descent.

use std::backtrace::Backtrace;
use std::fmt;

use crate::subcost::SubCost;
use crate::vector::{CostVector, MAX_REAL};

/// Integer coefficients of a resolved formula.
///
/// Slot `i < MAX_REAL` multiplies real index `i`; slot `MAX_REAL` is the
/// constant term. Evaluation against a [`CostVector`] is a dot product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coefficients {
    coeff: [i64; MAX_REAL + 1],
}

impl Default for Coefficients {
    fn default() -> Self {
        Coefficients {
            coeff: [0; MAX_REAL + 1],
        }
    }
}

impl Coefficients {
    /// Returns the coefficient for a real index, or the constant term for
    /// `index == MAX_REAL`. Zero when out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> i64 {
        self.coeff.get(index).copied().unwrap_or(0)
    }

    /// Adds `factor` times `other` into `self` (used when a referenced
    /// virtual type folds into the referencing formula).
    pub(crate) fn add_scaled(&mut self, factor: i64, other: &Coefficients) {
        for (c, o) in self.coeff.iter_mut().zip(other.coeff.iter()) {
            *c = c.wrapping_add(factor.wrapping_mul(*o));
        }
    }

    /// Adds `value` to the coefficient at `index`.
    pub(crate) fn add_at(&mut self, index: usize, value: i64) {
        if index <= MAX_REAL {
            self.coeff[index] = self.coeff[index].wrapping_add(value);
        }
    }

    /// Evaluates the dot product against a cost vector.
    ///
    /// A negative result clamps to zero: subtraction formulas model
    /// exclusions, and an exclusion larger than the base count means the
    /// counters disagree, not that the event count is negative.
    #[must_use]
    pub fn apply(&self, v: &CostVector) -> SubCost {
        let mut acc = i128::from(self.coeff[MAX_REAL]);
        for i in 0..MAX_REAL {
            acc += i128::from(self.coeff[i]) * i128::from(v.subcost(i).value());
        }
        SubCost(u64::try_from(acc).unwrap_or(if acc < 0 { 0 } else { u64::MAX }))
    }
}

/// One parsed formula term: `sign * coeff * name`, or a constant when
/// `name` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Term {
    pub sign: i64,
    pub coeff: i64,
    pub name: Option<String>,
}

/// Tokenizes a formula into terms.
///
/// Grammar: `formula := [sign] term { sign term }` with
/// `term := int [ '*' name ] | name`. Whitespace is insignificant.
pub(crate) fn parse_terms(formula: &str) -> Result<Vec<Term>, FormulaError> {
    let mut terms = Vec::new();
    let mut rest = formula.trim();
    let mut sign: i64 = 1;
    let mut first = true;

    while !rest.is_empty() {
        if !first {
            let Some(op) = rest.chars().next() else { break };
            sign = match op {
                '+' => 1,
                '-' => -1,
                _ => {
                    return Err(FormulaError::syntax(format!(
                        "expected '+' or '-' before {rest:?}"
                    )))
                }
            };
            rest = rest[1..].trim_start();
        } else if let Some(r) = rest.strip_prefix('-') {
            sign = -1;
            rest = r.trim_start();
        } else if let Some(r) = rest.strip_prefix('+') {
            rest = r.trim_start();
        }
        first = false;

        let (term, r) = parse_term(rest, sign)?;
        terms.push(term);
        rest = r.trim_start();
        sign = 1;
    }

    if terms.is_empty() {
        return Err(FormulaError::syntax("empty formula".to_string()));
    }
    Ok(terms)
}

/// Parses one term from the front of `rest`.
fn parse_term(rest: &str, sign: i64) -> Result<(Term, &str), FormulaError> {
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        let end = rest
            .bytes()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(rest.len());
        let coeff: i64 = rest[..end].parse().map_err(|_| {
            FormulaError::syntax(format!("coefficient out of range in {rest:?}"))
        })?;
        let after = rest[end..].trim_start();
        if let Some(after_star) = after.strip_prefix('*') {
            let (name, r) = parse_name(after_star.trim_start())?;
            return Ok((
                Term {
                    sign,
                    coeff,
                    name: Some(name),
                },
                r,
            ));
        }
        return Ok((
            Term {
                sign,
                coeff,
                name: None,
            },
            after,
        ));
    }

    let (name, r) = parse_name(rest)?;
    Ok((
        Term {
            sign,
            coeff: 1,
            name: Some(name),
        },
        r,
    ))
}

/// Parses a type name (alphanumeric or underscore) from the front of `rest`.
fn parse_name(rest: &str) -> Result<(String, &str), FormulaError> {
    let end = rest
        .bytes()
        .position(|b| !(b.is_ascii_alphanumeric() || b == b'_'))
        .unwrap_or(rest.len());
    if end == 0 || rest.as_bytes()[0].is_ascii_digit() {
        return Err(FormulaError::syntax(format!(
            "expected type name at {rest:?}"
        )));
    }
    Ok((rest[..end].to_string(), &rest[end..]))
}

/// Error raised when a virtual type's formula cannot be resolved.
///
/// A failed formula never aborts analysis: the type is marked unparseable
/// and evaluates to zero. The error itself is returned from the explicit
/// parse entry points so ingestion can report it.
#[derive(Debug)]
pub struct FormulaError {
    kind: FormulaErrorKind,
    backtrace: Backtrace,
}

/// Internal error variants. Not exposed publicly; use the `is_xxx()`
/// methods.
#[derive(Debug)]
enum FormulaErrorKind {
    /// The formula text does not match the grammar.
    Syntax(String),
    /// A referenced type name is not defined in the mapping.
    Unresolved(String),
    /// The formula references itself, directly or through other virtual
    /// types.
    Cycle(String),
}

impl FormulaError {
    pub(crate) fn syntax(detail: String) -> Self {
        FormulaError {
            kind: FormulaErrorKind::Syntax(detail),
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn unresolved(name: String) -> Self {
        FormulaError {
            kind: FormulaErrorKind::Unresolved(name),
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn cycle(name: String) -> Self {
        FormulaError {
            kind: FormulaErrorKind::Cycle(name),
            backtrace: Backtrace::capture(),
        }
    }

    /// Returns true if the formula text failed to tokenize.
    #[must_use]
    pub fn is_syntax(&self) -> bool {
        matches!(self.kind, FormulaErrorKind::Syntax(_))
    }

    /// Returns true if a referenced name could not be resolved.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        matches!(self.kind, FormulaErrorKind::Unresolved(_))
    }

    /// Returns true if resolution re-entered a type already being parsed.
    #[must_use]
    pub fn is_cycle(&self) -> bool {
        matches!(self.kind, FormulaErrorKind::Cycle(_))
    }

    /// Returns the backtrace captured when this error was created.
    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for FormulaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FormulaErrorKind::Syntax(detail) => {
                write!(f, "formula syntax error: {detail}")
            }
            FormulaErrorKind::Unresolved(name) => {
                write!(f, "formula references unknown type {name:?}")
            }
            FormulaErrorKind::Cycle(name) => {
                write!(f, "formula cycle through type {name:?}")
            }
        }
    }
}

impl std::error::Error for FormulaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_sum() {
        let terms = parse_terms("l1rm + l2rm").unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].name.as_deref(), Some("l1rm"));
        assert_eq!(terms[0].sign, 1);
        assert_eq!(terms[1].name.as_deref(), Some("l2rm"));
    }

    #[test]
    fn test_parse_coefficients_and_constant() {
        let terms = parse_terms("2*Ir + 10*Dr - 1").unwrap();
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[0].coeff, 2);
        assert_eq!(terms[1].coeff, 10);
        assert_eq!(terms[2].name, None);
        assert_eq!(terms[2].coeff, 1);
        assert_eq!(terms[2].sign, -1);
    }

    #[test]
    fn test_parse_leading_sign() {
        let terms = parse_terms("-Ir + 5").unwrap();
        assert_eq!(terms[0].sign, -1);
        assert_eq!(terms[1].sign, 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_terms("").unwrap_err().is_syntax());
        assert!(parse_terms("Ir Dr").unwrap_err().is_syntax());
        assert!(parse_terms("2 ** Ir").unwrap_err().is_syntax());
    }

    #[test]
    fn test_apply_clamps_negative() {
        let mut c = Coefficients::default();
        c.add_at(0, 1);
        c.add_at(MAX_REAL, -100);
        let mut v = CostVector::new();
        v.add_at(0, SubCost(10));
        assert_eq!(c.apply(&v), SubCost::ZERO);
    }

    #[test]
    fn test_apply_dot_product() {
        let mut c = Coefficients::default();
        c.add_at(0, 2);
        c.add_at(1, 10);
        c.add_at(MAX_REAL, -1);
        let mut v = CostVector::new();
        v.add_at(0, SubCost(3));
        v.add_at(1, SubCost(4));
        assert_eq!(c.apply(&v), SubCost(2 * 3 + 10 * 4 - 1));
    }
}
