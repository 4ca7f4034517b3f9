//! Cycle detection over ingested call data: self recursion, mutual
//! recursion, skip-cycle views, and inclusive costs staying bounded.

use costgraph_model::{Data, FileId, FunctionId, ItemRef, PartId, Position};
use costgraph_types::SubCost;

fn profile() -> (Data, PartId, FileId) {
    // Detection logs its runs; surface them with RUST_LOG=debug.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let mut data = Data::new();
    let part = data.add_part("callgrind.out.1");
    data.set_part_events(part, "Ir");
    let file = data.intern_file("main.c");
    (data, part, file)
}

fn function(data: &mut Data, name: &str, file: FileId) -> FunctionId {
    let obj = data.intern_object("app");
    data.intern_function(name, file, obj)
}

#[test]
fn self_recursion_forms_cycle_one() {
    let (mut data, part, file) = profile();
    let main = function(&mut data, "main", file);
    data.add_cost(part, main, file, Position::line(1), "100").unwrap();
    data.add_call(part, main, main, file, Position::line(2), SubCost(5), "40")
        .unwrap();

    data.update_function_cycles();

    assert_eq!(data.function_cycles().len(), 1);
    let cycle = data.function_cycles()[0];
    assert_eq!(data.function(cycle).cycle_number(), Some(1));
    assert!(data.function(main).cycle().is_some());

    let call = data.function(main).callings()[0];
    assert_eq!(data.call_in_cycle(call), Some(1));

    // The recursive edge must not inflate the inclusive cost.
    let ir = data.mapping().index_of("Ir").unwrap();
    let cumulative = data.function_cumulative(main);
    assert_eq!(data.mapping().subcost(ir, &cumulative), SubCost(100));
}

#[test]
fn mutual_recursion_collapses_and_keeps_external_callee() {
    let (mut data, part, file) = profile();
    let a = function(&mut data, "a", file);
    let b = function(&mut data, "b", file);
    let c = function(&mut data, "c", file);
    let d = function(&mut data, "d", file);

    for (f, cost) in [(a, "10"), (b, "20"), (c, "30"), (d, "40")] {
        data.add_cost(part, f, file, Position::line(1), cost).unwrap();
    }
    data.add_call(part, a, b, file, Position::line(2), SubCost(1), "90").unwrap();
    data.add_call(part, b, c, file, Position::line(2), SubCost(1), "70").unwrap();
    data.add_call(part, c, a, file, Position::line(2), SubCost(1), "60").unwrap();
    data.add_call(part, a, d, file, Position::line(3), SubCost(1), "40").unwrap();

    data.update_function_cycles();

    assert_eq!(data.function_cycles().len(), 1);
    let cycle = data.function_cycles()[0];
    let mut members = data.function(cycle).cycle_members().to_vec();
    members.sort();
    assert_eq!(members, vec![a, b, c]);
    assert!(!data.function(d).is_cycle_member());

    // External view: the cycle node calls d, and the skip-cycle caller of
    // that edge is the cycle node itself.
    let callings = data.function(cycle).callings().to_vec();
    assert_eq!(callings.len(), 1);
    let to_d = callings[0];
    assert_eq!(data.call_called(to_d, false), d);
    assert_eq!(data.call_caller(to_d, false), a);
    assert_eq!(data.call_caller(to_d, true), cycle);

    // Intra-cycle edges report the cycle number; the external one none.
    let a_to_b = data
        .function(a)
        .callings()
        .iter()
        .copied()
        .find(|&cl| data.call_called(cl, false) == b)
        .unwrap();
    assert_eq!(data.call_in_cycle(a_to_b), Some(1));
    assert_eq!(data.call_in_cycle(to_d), None);

    // Cycle-node cost: members' exclusive costs; inclusive adds d's
    // contribution through the external edge only.
    let ir = data.mapping().index_of("Ir").unwrap();
    assert_eq!(data.subcost(ItemRef::Function(cycle), ir), SubCost(60));
    let cumulative = data.function_cumulative(cycle);
    assert_eq!(data.mapping().subcost(ir, &cumulative), SubCost(100));
}

#[test]
fn rerun_reproduces_membership_and_numbering() {
    let (mut data, part, file) = profile();
    let a = function(&mut data, "a", file);
    let b = function(&mut data, "b", file);
    let c = function(&mut data, "c", file);
    let d = function(&mut data, "d", file);

    data.add_call(part, a, b, file, Position::line(1), SubCost(1), "1").unwrap();
    data.add_call(part, b, a, file, Position::line(1), SubCost(1), "1").unwrap();
    data.add_call(part, c, d, file, Position::line(1), SubCost(1), "1").unwrap();
    data.add_call(part, d, c, file, Position::line(1), SubCost(1), "1").unwrap();

    data.update_function_cycles();
    let snapshot = |data: &Data| -> Vec<(u32, Vec<FunctionId>)> {
        data.function_cycles()
            .iter()
            .map(|&id| {
                (
                    data.function(id).cycle_number().unwrap(),
                    data.function(id).cycle_members().to_vec(),
                )
            })
            .collect()
    };
    let first = snapshot(&data);
    assert_eq!(first.len(), 2);

    data.update_function_cycles();
    assert_eq!(snapshot(&data), first);

    // Members map to the latest cycle nodes after the rerun.
    for &id in data.function_cycles() {
        for &m in data.function(id).cycle_members() {
            assert_eq!(data.function(m).cycle(), Some(id));
        }
    }
}

#[test]
fn cumulative_not_below_self_outside_cycles() {
    let (mut data, part, file) = profile();
    let main = function(&mut data, "main", file);
    let helper = function(&mut data, "helper", file);
    data.add_cost(part, main, file, Position::line(1), "100").unwrap();
    data.add_cost(part, helper, file, Position::line(9), "30").unwrap();
    data.add_call(part, main, helper, file, Position::line(2), SubCost(3), "30")
        .unwrap();

    data.update_function_cycles();
    assert!(data.function_cycles().is_empty());

    let ir = data.mapping().index_of("Ir").unwrap();
    for f in [main, helper] {
        let own = data.subcost(ItemRef::Function(f), ir);
        let cumulative = data.function_cumulative(f);
        assert!(data.mapping().subcost(ir, &cumulative) >= own);
    }
    let cumulative = data.function_cumulative(main);
    assert_eq!(data.mapping().subcost(ir, &cumulative), SubCost(130));
}

#[test]
fn reentrancy_guard_reports_state() {
    let (data, _, _) = {
        let (mut data, part, file) = profile();
        let main = function(&mut data, "main", file);
        data.add_call(part, main, main, file, Position::line(1), SubCost(1), "1")
            .unwrap();
        data.update_function_cycles();
        (data, part, file)
    };
    assert!(!data.in_function_cycle_update());
}
