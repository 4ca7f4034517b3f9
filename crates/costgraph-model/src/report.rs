//! Plain-text profile summaries.
//!
//! Writes human-readable tables to any [`Write`] sink: header metadata,
//! a per-part table, the top functions by a chosen event type, and the
//! detected cycles. The presentation layers proper (browsers, annotators)
//! live outside this crate; this is the terminal-and-log view.

use std::io::{self, Write};

use costgraph_types::{CostVector, Mapping};
use itertools::Itertools;

use crate::data::Data;
use crate::item::{FunctionId, ItemRef};

/// Formats all real metrics of a vector, e.g. `"Ir=1 234 Dr=56"`.
#[must_use]
pub fn cost_string(mapping: &Mapping, v: &CostVector) -> String {
    (0..mapping.real_count())
        .filter_map(|i| {
            mapping
                .real_type(i)
                .map(|t| format!("{}={}", t.name(), v.subcost(i).pretty()))
        })
        .join(" ")
}

/// Writes a profile summary: metadata, parts, the `top` most expensive
/// functions by the event type at mapping index `ty`, and cycles.
pub fn write_summary(
    data: &mut Data,
    ty: usize,
    top: usize,
    mut w: impl Write,
) -> io::Result<()> {
    let ty_name = data
        .mapping()
        .type_at(ty)
        .map_or_else(|| format!("#{ty}"), |t| t.name().to_string());

    writeln!(w, "Command:      {}", data.command())?;
    writeln!(w, "Trace:        {}", data.short_trace_name())?;
    writeln!(
        w,
        "Events:       {}",
        (0..data.mapping().real_count())
            .filter_map(|i| data.mapping().real_type(i))
            .map(costgraph_types::EventType::name)
            .join(" ")
    )?;
    writeln!(w, "Active parts: {}", data.active_part_range())?;

    // Per-part table.
    writeln!(w, "\n{:<28} {:>6} {:>7} {:>15}", "Part", "Number", "Active", ty_name)?;
    writeln!(w, "{}", "-".repeat(60))?;
    let part_ids: Vec<_> = data.part_ids().collect();
    for p in part_ids {
        let total = data.mapping().subcost(ty, data.part(p).totals());
        let part = data.part(p);
        writeln!(
            w,
            "{:<28} {:>6} {:>7} {:>15}",
            part.short_name(),
            part.part_number(),
            if part.is_active() { "yes" } else { "no" },
            total.pretty(),
        )?;
    }

    // Top functions, by exclusive cost of the chosen type, descending;
    // ties keep canonical (name-sorted) order.
    let ids: Vec<FunctionId> = data
        .function_map()
        .values()
        .flat_map(|v| v.iter().copied())
        .collect();
    let mut ranked: Vec<(FunctionId, u64, u64)> = ids
        .into_iter()
        .map(|f| {
            let self_cost = data.subcost(ItemRef::Function(f), ty).value();
            let cumulative = data.function_cumulative(f);
            let cumulative = data.mapping().subcost(ty, &cumulative);
            (f, self_cost, cumulative.value())
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(top);

    writeln!(w, "\n{:<40} {:>15} {:>15}", "Function", "Self", "Inclusive")?;
    writeln!(w, "{}", "-".repeat(72))?;
    for (f, self_cost, cumulative) in ranked {
        writeln!(
            w,
            "{:<40} {:>15} {:>15}",
            data.function_pretty_name(f),
            costgraph_types::SubCost(self_cost).pretty(),
            costgraph_types::SubCost(cumulative).pretty(),
        )?;
    }

    // Cycles, when detection has run.
    let cycles = data.function_cycles().to_vec();
    if !cycles.is_empty() {
        writeln!(w, "\nCycles:")?;
        for c in cycles {
            let members = data
                .function(c)
                .cycle_members()
                .iter()
                .map(|&m| data.function_pretty_name(m))
                .join(", ");
            writeln!(w, "  {}: {}", data.function_pretty_name(c), members)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use costgraph_types::SubCost;

    use super::*;
    use crate::ingest::Position;

    #[test]
    fn test_cost_string_lists_reals() {
        let mut mapping = Mapping::new();
        mapping.sub_mapping("Ir Dr");
        let mut v = CostVector::new();
        v.add_at(0, SubCost(1234));
        v.add_at(1, SubCost(5));
        assert_eq!(cost_string(&mapping, &v), "Ir=1 234 Dr=5");
    }

    #[test]
    fn test_summary_mentions_parts_and_functions() {
        let mut data = Data::new();
        data.set_command("./app --fast");
        let part = data.add_part("callgrind.out.1");
        data.set_part_events(part, "Ir");
        let obj = data.intern_object("app");
        let file = data.intern_file("main.c");
        let main = data.intern_function("main", file, obj);
        data.add_cost(part, main, file, Position::line(1), "42").unwrap();

        let mut out = Vec::new();
        write_summary(&mut data, 0, 10, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("./app --fast"));
        assert!(text.contains("callgrind.out.1"));
        assert!(text.contains("main"));
        assert!(text.contains("42"));
    }
}
