//! End-to-end query scenarios: virtual formulas over ingested data, search
//! with and without parent scoping, and call-count consistency across the
//! granularity levels.

use costgraph_model::{
    CostKind, Data, FileId, ItemRef, PartId, Position,
};
use costgraph_types::{EventType, SubCost};
use proptest::prelude::*;

#[test]
fn virtual_formula_over_ingested_costs() {
    let mut data = Data::new();
    let part = data.add_part("callgrind.out.1");
    data.set_part_events(part, "l1rm l2rm");
    let obj = data.intern_object("app");
    let file = data.intern_file("main.c");
    let f = data.intern_function("f", file, obj);
    data.add_cost(part, f, file, Position::line(5), "3 7").unwrap();

    let rm = data
        .mapping_mut()
        .add_virtual(EventType::with_formula("RM", "Read Miss Sum", "l1rm + l2rm"))
        .unwrap();
    assert_eq!(data.subcost(ItemRef::Function(f), rm), SubCost(10));

    // A formula with an unresolved reference is an error and the type
    // evaluates to zero, without disturbing anything else.
    let bad = data
        .mapping_mut()
        .add_virtual(EventType::with_formula("RMbad", "Broken", "l1rm + foo"))
        .unwrap();
    assert!(data.mapping().parse_formula(bad).unwrap_err().is_unresolved());
    assert_eq!(data.subcost(ItemRef::Function(f), bad), SubCost::ZERO);
    assert_eq!(data.subcost(ItemRef::Function(f), rm), SubCost(10));
}

#[test]
fn search_prefers_highest_cost_and_respects_parent() {
    let mut data = Data::new();
    let part = data.add_part("callgrind.out.1");
    data.set_part_events(part, "Ir");
    let obj1 = data.intern_object("first.so");
    let obj2 = data.intern_object("second.so");
    let file = data.intern_file("shared.c");
    let p1 = data.intern_function("process", file, obj1);
    let p2 = data.intern_function("process", file, obj2);
    data.add_cost(part, p1, file, Position::line(1), "100").unwrap();
    data.add_cost(part, p2, file, Position::line(1), "250").unwrap();

    let ir = data.mapping().index_of("Ir").unwrap();

    // Unscoped: the more expensive overload wins.
    assert_eq!(
        data.search(CostKind::Function, "process", Some(ir), None),
        Some(ItemRef::Function(p2))
    );

    // Scoped to the first object: the cheaper one is the only candidate.
    assert_eq!(
        data.search(
            CostKind::Function,
            "process",
            Some(ir),
            Some(ItemRef::Object(obj1)),
        ),
        Some(ItemRef::Function(p1))
    );

    // Without a cost type the first candidate in canonical order wins.
    assert_eq!(
        data.search(CostKind::Function, "process", None, None),
        Some(ItemRef::Function(p1))
    );

    assert_eq!(data.search(CostKind::Function, "absent", Some(ir), None), None);
}

fn call_profile() -> (Data, PartId, FileId) {
    let mut data = Data::new();
    let part_a = data.add_part("callgrind.out.1");
    data.set_part_events(part_a, "Ir");
    let part_b = data.add_part("callgrind.out.2");
    data.set_part_events(part_b, "Ir");
    let file = data.intern_file("main.c");
    (data, part_b, file)
}

#[test]
fn call_counts_agree_across_levels() {
    let (mut data, part_b, file) = call_profile();
    let part_a = data.part_ids().next().unwrap();
    let obj = data.intern_object("app");
    let main = data.intern_function("main", file, obj);
    let helper = data.intern_function("helper", file, obj);

    // Calls from two lines of main, in both parts.
    data.add_call(part_a, main, helper, file, Position::line(3), SubCost(4), "20")
        .unwrap();
    data.add_call(part_a, main, helper, file, Position::line(8), SubCost(1), "5")
        .unwrap();
    data.add_call(part_b, main, helper, file, Position::line(3), SubCost(2), "10")
        .unwrap();

    let call = data.function(main).callings()[0];

    let total = data.call_count(call);
    assert_eq!(total, SubCost(7));

    let line_sum: SubCost = data
        .call(call)
        .line_calls()
        .to_vec()
        .into_iter()
        .map(|lc| data.line_call_count(lc))
        .sum();
    assert_eq!(line_sum, total);

    let part_sum: SubCost = data
        .call(call)
        .parts()
        .iter()
        .filter(|row| data.part(row.part()).is_active())
        .map(costgraph_model::PartCall::call_count)
        .sum();
    assert_eq!(part_sum, total);

    assert_eq!(data.function_called_count(helper), SubCost(7));
    assert_eq!(data.function_calling_count(main), SubCost(7));
    assert_eq!(data.function_called_contexts(helper), 1);

    // Deactivating one part keeps all three levels consistent.
    data.activate_part(part_a, false);
    data.invalidate_dynamic_cost();

    let total = data.call_count(call);
    assert_eq!(total, SubCost(2));
    let line_sum: SubCost = data
        .call(call)
        .line_calls()
        .to_vec()
        .into_iter()
        .map(|lc| data.line_call_count(lc))
        .sum();
    assert_eq!(line_sum, total);
    assert_eq!(data.function_called_count(helper), SubCost(2));
}

#[test]
fn search_call_within_function() {
    let (mut data, _, file) = call_profile();
    let part = data.part_ids().next().unwrap();
    let obj = data.intern_object("app");
    let main = data.intern_function("main", file, obj);
    let helper = data.intern_function("helper", file, obj);
    let other = data.intern_function("other", file, obj);
    data.add_call(part, main, helper, file, Position::line(3), SubCost(1), "5")
        .unwrap();
    data.add_call(part, main, other, file, Position::line(4), SubCost(1), "9")
        .unwrap();

    let ir = data.mapping().index_of("Ir").unwrap();
    let hit = data
        .search(
            CostKind::Call,
            "helper",
            Some(ir),
            Some(ItemRef::Function(main)),
        )
        .unwrap();
    let ItemRef::Call(call) = hit else {
        panic!("expected a call, got {hit:?}");
    };
    assert_eq!(data.call_called(call, false), helper);

    // Without the function parent the scoped search yields nothing.
    assert_eq!(data.search(CostKind::Call, "helper", Some(ir), None), None);
}

#[test]
fn jumps_aggregate_and_sort() {
    let (mut data, _, file) = call_profile();
    let part = data.part_ids().next().unwrap();
    let obj = data.intern_object("app");
    let f = data.intern_function("loop", file, obj);

    // A conditional branch at line 12, taken 30 of 100 times, plus an
    // unconditional one at the same line.
    data.add_jump(
        part,
        f,
        file,
        Position::line(12),
        file,
        Position::line(20),
        SubCost(100),
        SubCost(30),
        true,
    )
    .unwrap();
    data.add_jump(
        part,
        f,
        file,
        Position::line(12),
        file,
        Position::line(4),
        SubCost(8),
        SubCost(8),
        false,
    )
    .unwrap();

    let source = data.function(f).sources()[0];
    let line = *data.source(source).line_map().get(&12).unwrap();
    let jumps = data.line_jumps_sorted(line, costgraph_model::JumpSort::ByTarget);
    assert_eq!(jumps.len(), 2);
    let first_target = data.line(data.line_jump(jumps[0]).line_to()).lineno();
    let second_target = data.line(data.line_jump(jumps[1]).line_to()).lineno();
    assert!(first_target < second_target);

    let cond = jumps
        .into_iter()
        .find(|&j| data.line_jump(j).is_cond_jump())
        .unwrap();
    assert_eq!(data.line_jump_executed(cond), SubCost(100));
    assert_eq!(data.line_jump_followed(cond), SubCost(30));
}

proptest! {
    /// Row round trip: a part whose header permutes the canonical event
    /// order produces the same canonical cost vector as an identity part
    /// fed the same values in canonical order.
    #[test]
    fn permuted_rows_match_identity_rows(
        values in proptest::collection::vec(0u64..1_000_000, 1..6),
        seed in any::<u64>(),
    ) {
        let names: Vec<String> =
            (0..values.len()).map(|i| format!("Ev{i}")).collect();

        // Deterministic permutation from the seed.
        let mut order: Vec<usize> = (0..values.len()).collect();
        let mut state = seed | 1;
        for i in (1..order.len()).rev() {
            state = state.wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            #[expect(clippy::cast_possible_truncation, reason = "modulo keeps the value small")]
            let j = (state % (i as u64 + 1)) as usize;
            order.swap(i, j);
        }

        let mut data = Data::new();
        let identity = data.add_part("identity");
        data.set_part_events(identity, &names.join(" "));
        let permuted = data.add_part("permuted");
        let shuffled: Vec<&str> =
            order.iter().map(|&i| names[i].as_str()).collect();
        data.set_part_events(permuted, &shuffled.join(" "));

        let obj = data.intern_object("app");
        let file = data.intern_file("main.c");
        let f = data.intern_function("f", file, obj);

        let identity_row = values
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        let permuted_row = order
            .iter()
            .map(|&i| values[i].to_string())
            .collect::<Vec<_>>()
            .join(" ");
        data.add_cost(identity, f, file, Position::line(1), &identity_row)
            .unwrap();
        data.add_cost(permuted, f, file, Position::line(2), &permuted_row)
            .unwrap();

        prop_assert_eq!(
            *data.part(identity).totals(),
            *data.part(permuted).totals()
        );
    }
}
