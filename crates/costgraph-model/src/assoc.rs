//! Opaque per-function user data for layered analyses.
//!
//! Tools like coverage overlays need to attach ephemeral data to functions
//! without widening the core types. An association is a boxed trait object
//! tagged with a small integer `rtti`; batch operations take `rtti == 0` to
//! mean "all tags".

use std::any::Any;
use std::fmt::Debug;

use crate::data::Data;
use crate::item::FunctionId;

/// Opaque user data attachable to a function.
///
/// Implementors pick a non-zero `rtti` tag identifying their analysis and
/// downcast through [`as_any`](Association::as_any) on retrieval.
pub trait Association: Any + Debug {
    /// Tag identifying the owning analysis; must not be 0.
    fn rtti(&self) -> u32;

    /// Marks the attached data stale. Default: no-op.
    fn invalidate(&mut self) {}

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

fn matches(rtti: u32, assoc_rtti: u32) -> bool {
    rtti == 0 || rtti == assoc_rtti
}

impl Data {
    /// Attaches an association to a function.
    pub fn add_association(
        &mut self,
        f: FunctionId,
        assoc: Box<dyn Association>,
    ) {
        self.functions[f.index()].assocs.push(assoc);
    }

    /// First association with the given tag (0 = any).
    #[must_use]
    pub fn association(
        &self,
        f: FunctionId,
        rtti: u32,
    ) -> Option<&dyn Association> {
        self.functions[f.index()]
            .assocs
            .iter()
            .find(|a| matches(rtti, a.rtti()))
            .map(AsRef::as_ref)
    }

    /// Mutable access to the first association with the given tag.
    pub fn association_mut(
        &mut self,
        f: FunctionId,
        rtti: u32,
    ) -> Option<&mut Box<dyn Association>> {
        self.functions[f.index()]
            .assocs
            .iter_mut()
            .find(|a| matches(rtti, a.rtti()))
    }

    /// Detaches and returns the first association with the given tag,
    /// handing ownership back to the caller instead of dropping it.
    pub fn take_association(
        &mut self,
        f: FunctionId,
        rtti: u32,
    ) -> Option<Box<dyn Association>> {
        let assocs = &mut self.functions[f.index()].assocs;
        let pos = assocs.iter().position(|a| matches(rtti, a.rtti()))?;
        Some(assocs.remove(pos))
    }

    /// Drops every association with the given tag (0 = all) from one
    /// function.
    pub fn remove_associations(&mut self, f: FunctionId, rtti: u32) {
        self.functions[f.index()]
            .assocs
            .retain(|a| !matches(rtti, a.rtti()));
    }

    /// Invalidates every association with the given tag on one function.
    pub fn invalidate_association(&mut self, f: FunctionId, rtti: u32) {
        for a in &mut self.functions[f.index()].assocs {
            if matches(rtti, a.rtti()) {
                a.invalidate();
            }
        }
    }

    /// Drops associations with the given tag (0 = all) from every
    /// function.
    pub fn clear_associations(&mut self, rtti: u32) {
        for f in &mut self.functions {
            f.assocs.retain(|a| !matches(rtti, a.rtti()));
        }
    }

    /// Invalidates associations with the given tag on every function.
    pub fn invalidate_associations(&mut self, rtti: u32) {
        for f in &mut self.functions {
            for a in &mut f.assocs {
                if matches(rtti, a.rtti()) {
                    a.invalidate();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Coverage {
        rtti: u32,
        valid: bool,
    }

    impl Association for Coverage {
        fn rtti(&self) -> u32 {
            self.rtti
        }

        fn invalidate(&mut self) {
            self.valid = false;
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn fixture() -> (Data, FunctionId) {
        let mut data = Data::new();
        let obj = data.intern_object("app");
        let file = data.intern_file("main.c");
        let f = data.intern_function("main", file, obj);
        (data, f)
    }

    #[test]
    fn test_lookup_by_rtti() {
        let (mut data, f) = fixture();
        data.add_association(f, Box::new(Coverage { rtti: 1, valid: true }));
        data.add_association(f, Box::new(Coverage { rtti: 2, valid: true }));

        assert_eq!(data.association(f, 1).unwrap().rtti(), 1);
        assert_eq!(data.association(f, 2).unwrap().rtti(), 2);
        // rtti 0 means any.
        assert_eq!(data.association(f, 0).unwrap().rtti(), 1);
        assert!(data.association(f, 9).is_none());

        let cov = data
            .association(f, 2)
            .unwrap()
            .as_any()
            .downcast_ref::<Coverage>()
            .unwrap();
        assert!(cov.valid);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (mut data, f) = fixture();
        data.add_association(f, Box::new(Coverage { rtti: 1, valid: true }));
        data.add_association(f, Box::new(Coverage { rtti: 2, valid: true }));

        data.invalidate_associations(1);
        let cov1 = data
            .association(f, 1)
            .unwrap()
            .as_any()
            .downcast_ref::<Coverage>()
            .unwrap();
        assert!(!cov1.valid);
        let cov2 = data
            .association(f, 2)
            .unwrap()
            .as_any()
            .downcast_ref::<Coverage>()
            .unwrap();
        assert!(cov2.valid);

        data.clear_associations(1);
        assert!(data.association(f, 1).is_none());
        assert!(data.association(f, 2).is_some());

        // rtti 0 clears everything.
        data.clear_associations(0);
        assert!(data.association(f, 0).is_none());
    }

    #[test]
    fn test_take_returns_ownership() {
        let (mut data, f) = fixture();
        data.add_association(f, Box::new(Coverage { rtti: 3, valid: true }));
        let taken = data.take_association(f, 3).unwrap();
        assert_eq!(taken.rtti(), 3);
        assert!(data.association(f, 3).is_none());
        assert!(data.take_association(f, 3).is_none());
    }
}
