//! Name search across the graph.

use costgraph_types::SubCost;

use crate::data::Data;
use crate::item::{CostKind, FunctionId, ItemRef};

impl Data {
    /// Finds the entity of `kind` with the given name and the highest
    /// count of `ty` (any match when `ty` is `None`).
    ///
    /// `Instr`, `Line`, and `Call` are not globally indexed: they require a
    /// `Function` parent and yield `None` without one. For `Function`, a
    /// parent of kind `Object`, `File`, or `Class` restricts the search.
    /// Ties resolve to the first candidate in canonical (name-sorted, then
    /// insertion) order.
    pub fn search(
        &mut self,
        kind: CostKind,
        name: &str,
        ty: Option<usize>,
        parent: Option<ItemRef>,
    ) -> Option<ItemRef> {
        match kind {
            CostKind::Object => {
                self.object_map.get(name).map(|&id| ItemRef::Object(id))
            }
            CostKind::File => {
                self.file_map.get(name).map(|&id| ItemRef::File(id))
            }
            CostKind::Class => {
                self.class_map.get(name).map(|&id| ItemRef::Class(id))
            }
            CostKind::Part => self.part_by_name(name).map(ItemRef::Part),
            CostKind::Function => {
                let candidates: Vec<ItemRef> = self
                    .function_map
                    .get(name)?
                    .iter()
                    .copied()
                    .filter(|&f| self.function_matches_parent(f, parent))
                    .map(ItemRef::Function)
                    .collect();
                self.pick_best(&candidates, ty)
            }
            CostKind::FunctionCycle => self
                .function_cycles
                .iter()
                .copied()
                .find(|&id| self.functions[id.index()].name() == name)
                .map(ItemRef::Function),
            CostKind::Line => {
                let function = require_function(parent)?;
                let lineno: u32 = name.parse().ok()?;
                let mut candidates = Vec::new();
                for &s in self.functions[function.index()].sources() {
                    if let Some(&l) = self.sources[s.index()].lines.get(&lineno)
                    {
                        candidates.push(ItemRef::Line(l));
                    }
                }
                self.pick_best(&candidates, ty)
            }
            CostKind::Instr => {
                let function = require_function(parent)?;
                let addr = parse_addr(name)?;
                let id = self.functions[function.index()]
                    .instr_map()
                    .get(&addr)
                    .copied()?;
                Some(ItemRef::Instr(id))
            }
            CostKind::Call => {
                let function = require_function(parent)?;
                let candidates: Vec<ItemRef> = self.functions
                    [function.index()]
                .callings()
                .iter()
                .copied()
                .filter(|&c| {
                    self.functions[self.calls[c.index()].called.index()]
                        .name()
                        == name
                })
                .map(ItemRef::Call)
                .collect();
                self.pick_best(&candidates, ty)
            }
            _ => None,
        }
    }

    fn function_matches_parent(
        &self,
        f: FunctionId,
        parent: Option<ItemRef>,
    ) -> bool {
        let function = &self.functions[f.index()];
        match parent {
            Some(ItemRef::Object(o)) => function.object() == o,
            Some(ItemRef::File(fl)) => function.file() == fl,
            Some(ItemRef::Class(c)) => function.class() == c,
            _ => true,
        }
    }

    /// First candidate without a type; the strict maximum with one, so
    /// ties keep the earliest candidate.
    fn pick_best(
        &mut self,
        candidates: &[ItemRef],
        ty: Option<usize>,
    ) -> Option<ItemRef> {
        let Some(ty) = ty else {
            return candidates.first().copied();
        };
        let mut best: Option<(ItemRef, SubCost)> = None;
        for &item in candidates {
            let cost = self.subcost(item, ty);
            match best {
                Some((_, best_cost)) if cost <= best_cost => {}
                _ => best = Some((item, cost)),
            }
        }
        best.map(|(item, _)| item)
    }
}

fn require_function(parent: Option<ItemRef>) -> Option<FunctionId> {
    match parent {
        Some(ItemRef::Function(f)) => Some(f),
        _ => None,
    }
}

/// Parses an instruction address: hex digits with an optional `0x` prefix,
/// matching [`Instr::name`](crate::Instr::name).
fn parse_addr(name: &str) -> Option<u64> {
    let digits = name.strip_prefix("0x").unwrap_or(name);
    u64::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_addr() {
        assert_eq!(parse_addr("0x1a2b"), Some(0x1a2b));
        assert_eq!(parse_addr("ff"), Some(0xff));
        assert_eq!(parse_addr("zz"), None);
    }

    #[test]
    fn test_scoped_kinds_need_function_parent() {
        let mut data = Data::new();
        assert_eq!(data.search(CostKind::Line, "10", None, None), None);
        assert_eq!(data.search(CostKind::Instr, "0x10", None, None), None);
        assert_eq!(data.search(CostKind::Call, "f", None, None), None);
    }

    #[test]
    fn test_group_search_is_exact() {
        let mut data = Data::new();
        let obj = data.intern_object("/bin/app");
        assert_eq!(
            data.search(CostKind::Object, "/bin/app", None, None),
            Some(ItemRef::Object(obj))
        );
        assert_eq!(data.search(CostKind::Object, "app", None, None), None);
    }
}
