//! JSON export for external viewers.
//!
//! Serializes a flat summary of the profile — event types, parts, function
//! costs, cycles — for presentation layers that live outside this process.
//! This is an export of *query results*; the graph itself is never
//! persisted.

use std::io::{self, Write};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::data::Data;
use crate::item::{FunctionId, ItemRef};

/// One event type of the profile.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EventInfo {
    /// Short locale-independent identifier.
    pub name: String,
    /// Long human-readable label.
    pub long_name: String,
    /// Formula over short names; absent for real types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

/// One trace part and its total for the exported event type.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PartInfo {
    /// File name of the part, without directory.
    pub name: String,
    /// Part sequence number.
    pub number: i32,
    /// Whether the part was active at export time.
    pub active: bool,
    /// The part's total for the exported event type.
    pub total: u64,
}

/// Cost summary of one function over the active parts.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FunctionCost {
    /// Canonical name including the signature.
    pub name: String,
    /// Human label (signature stripped when unambiguous).
    pub pretty_name: String,
    /// Containing object, by short name.
    pub object: String,
    /// Containing file, by short name.
    pub file: String,
    /// Containing class.
    pub class: String,
    /// Exclusive cost for the exported event type.
    pub self_cost: u64,
    /// Inclusive cost for the exported event type.
    pub cumulative: u64,
    /// How often the function was called.
    pub called: u64,
    /// Number of the cycle the function belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<u32>,
}

/// One detected function cycle.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CycleInfo {
    /// Cycle number.
    pub number: u32,
    /// Display name, `<cycle N>`.
    pub name: String,
    /// Member function names.
    pub members: Vec<String>,
}

/// Flat profile summary for one event type.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProfileSummary {
    /// The traced command line.
    pub command: String,
    /// Trace base name.
    pub trace_name: String,
    /// Short name of the event type the costs below are expressed in.
    pub event: String,
    /// All event types of the profile.
    pub events: Vec<EventInfo>,
    /// All parts, in load order.
    pub parts: Vec<PartInfo>,
    /// Per-function costs over the active parts, in canonical order.
    pub functions: Vec<FunctionCost>,
    /// Detected cycles, when detection has run.
    pub cycles: Vec<CycleInfo>,
}

/// Builds the summary for the event type at mapping index `ty`.
pub fn profile_summary(data: &mut Data, ty: usize) -> ProfileSummary {
    let event = data
        .mapping()
        .type_at(ty)
        .map_or_else(|| format!("#{ty}"), |t| t.name().to_string());

    let mut events = Vec::new();
    for i in 0..data.mapping().real_count() {
        if let Some(t) = data.mapping().real_type(i) {
            events.push(EventInfo {
                name: t.name().to_string(),
                long_name: t.long_name().to_string(),
                formula: None,
            });
        }
    }
    for i in 0..data.mapping().virtual_count() {
        if let Some(t) = data.mapping().virtual_type(i) {
            events.push(EventInfo {
                name: t.name().to_string(),
                long_name: t.long_name().to_string(),
                formula: Some(t.formula().to_string()),
            });
        }
    }

    let parts = data
        .part_ids()
        .map(|p| {
            let total = data.mapping().subcost(ty, data.part(p).totals());
            let part = data.part(p);
            PartInfo {
                name: part.short_name().to_string(),
                number: part.part_number(),
                active: part.is_active(),
                total: total.value(),
            }
        })
        .collect();

    let ids: Vec<FunctionId> = data
        .function_map()
        .values()
        .flat_map(|v| v.iter().copied())
        .collect();
    let functions = ids
        .into_iter()
        .map(|f| {
            let self_cost = data.subcost(ItemRef::Function(f), ty).value();
            let cumulative = data.function_cumulative(f);
            let cumulative = data.mapping().subcost(ty, &cumulative).value();
            let called = data.function_called_count(f).value();
            let function = data.function(f);
            let cycle = function
                .cycle()
                .and_then(|c| data.function(c).cycle_number());
            FunctionCost {
                name: function.name().to_string(),
                pretty_name: data.function_pretty_name(f),
                object: data
                    .object(data.function(f).object())
                    .short_name()
                    .to_string(),
                file: data.file(data.function(f).file()).short_name().to_string(),
                class: data.class(data.function(f).class()).name().to_string(),
                self_cost,
                cumulative,
                called,
                cycle,
            }
        })
        .collect();

    let cycles = data
        .function_cycles()
        .to_vec()
        .into_iter()
        .map(|c| {
            let node = data.function(c);
            CycleInfo {
                number: node.cycle_number().unwrap_or(0),
                name: data.function_pretty_name(c),
                members: node
                    .cycle_members()
                    .iter()
                    .map(|&m| data.function(m).name().to_string())
                    .collect(),
            }
        })
        .collect();

    ProfileSummary {
        command: data.command().to_string(),
        trace_name: data.trace_name().to_string(),
        event,
        events,
        parts,
        functions,
        cycles,
    }
}

/// Writes the summary as pretty-printed JSON.
pub fn write_json(
    data: &mut Data,
    ty: usize,
    mut w: impl Write,
) -> io::Result<()> {
    let summary = profile_summary(data, ty);
    serde_json::to_writer_pretty(&mut w, &summary)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(w)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Position;

    #[test]
    fn test_summary_roundtrips_through_json() {
        let mut data = Data::new();
        data.set_command("./app");
        data.set_trace_name("/tmp/callgrind.out");
        let part = data.add_part("callgrind.out.1");
        data.set_part_events(part, "Ir");
        let obj = data.intern_object("app");
        let file = data.intern_file("main.c");
        let main = data.intern_function("main", file, obj);
        data.add_cost(part, main, file, Position::line(1), "10").unwrap();

        let mut out = Vec::new();
        write_json(&mut data, 0, &mut out).unwrap();
        let parsed: ProfileSummary = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.event, "Ir");
        assert_eq!(parsed.parts.len(), 1);
        assert_eq!(parsed.functions.len(), 1);
        assert_eq!(parsed.functions[0].self_cost, 10);
        assert_eq!(parsed.functions[0].object, "app");
    }
}
