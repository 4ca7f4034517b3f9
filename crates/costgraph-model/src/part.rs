//! Trace parts: the data of one trace file, a time slice of the traced run.

use costgraph_types::{CostVector, SubMapping};
use tracing::debug;

use crate::data::Data;
use crate::item::PartId;

/// All data read from one trace file.
///
/// A part carries the descriptive header fields of its file, the
/// [`SubMapping`] resolving its column order, its fixed totals row, and the
/// `active` flag driving every dynamic aggregate of the profile.
#[derive(Debug)]
pub struct Part {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) trigger: String,
    pub(crate) timeframe: String,
    pub(crate) version: String,
    pub(crate) number: i32,
    pub(crate) thread_id: i32,
    pub(crate) process_id: i32,
    pub(crate) sub_mapping: SubMapping,
    pub(crate) active: bool,
    pub(crate) totals: CostVector,
}

impl Part {
    pub(crate) fn new(name: &str) -> Self {
        Part {
            name: name.to_string(),
            description: String::new(),
            trigger: String::new(),
            timeframe: String::new(),
            version: String::new(),
            number: 0,
            thread_id: 0,
            process_id: 0,
            sub_mapping: SubMapping::empty(),
            active: true,
            totals: CostVector::new(),
        }
    }

    /// Trace file path this part was read from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name without the directory prefix.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Human label: the short name.
    #[must_use]
    pub fn pretty_name(&self) -> &str {
        self.short_name()
    }

    /// Free-form description from the trace header.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Sets the free-form description.
    pub fn set_description(&mut self, d: &str) {
        self.description = d.to_string();
    }

    /// Sets the dump trigger.
    pub fn set_trigger(&mut self, t: &str) {
        self.trigger = t.to_string();
    }

    /// Sets the covered timeframe.
    pub fn set_timeframe(&mut self, t: &str) {
        self.timeframe = t.to_string();
    }

    /// Sets the trace format version.
    pub fn set_version(&mut self, v: &str) {
        self.version = v.to_string();
    }

    /// What triggered the dump of this part.
    #[must_use]
    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    /// Covered timeframe as reported by the tracer.
    #[must_use]
    pub fn timeframe(&self) -> &str {
        &self.timeframe
    }

    /// Trace format version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Sequence number of this part within the run.
    #[must_use]
    pub fn part_number(&self) -> i32 {
        self.number
    }

    /// Thread id the part was recorded for.
    #[must_use]
    pub fn thread_id(&self) -> i32 {
        self.thread_id
    }

    /// Process id the part was recorded for.
    #[must_use]
    pub fn process_id(&self) -> i32 {
        self.process_id
    }

    /// The column order of this part's event rows.
    #[must_use]
    pub fn sub_mapping(&self) -> &SubMapping {
        &self.sub_mapping
    }

    /// The part's fixed totals row.
    #[must_use]
    pub fn totals(&self) -> &CostVector {
        &self.totals
    }

    /// Whether this part contributes to dynamic aggregates.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Sets the active flag; returns true iff it changed.
    ///
    /// Flipping the flag does not touch any cached aggregate; the caller
    /// follows up with
    /// [`Data::invalidate_dynamic_cost`](crate::Data::invalidate_dynamic_cost).
    pub fn activate(&mut self, active: bool) -> bool {
        if self.active == active {
            return false;
        }
        self.active = active;
        true
    }
}

impl Data {
    /// Sets one part's active flag; returns true iff it changed.
    ///
    /// Like every activation entry point, this leaves cached aggregates
    /// untouched; follow a true return with
    /// [`invalidate_dynamic_cost`](Data::invalidate_dynamic_cost).
    pub fn activate_part(&mut self, part: PartId, active: bool) -> bool {
        let changed = self.parts[part.index()].activate(active);
        if changed {
            debug!(
                part = self.parts[part.index()].short_name(),
                active, "part activation changed"
            );
        }
        changed
    }

    /// Sets the active flag on a batch of parts; true iff any changed.
    pub fn activate_parts(&mut self, parts: &[PartId], active: bool) -> bool {
        let mut changed = false;
        for &p in parts {
            changed |= self.parts[p.index()].activate(active);
        }
        changed
    }

    /// Sets the active flag on every part; true iff any changed.
    pub fn activate_all(&mut self, active: bool) -> bool {
        let mut changed = false;
        for p in &mut self.parts {
            changed |= p.activate(active);
        }
        changed
    }

    /// Describes the active subset as a part-number range string,
    /// e.g. `"1-3, 5"`. Empty when no part is active.
    #[must_use]
    pub fn active_part_range(&self) -> String {
        let mut numbers: Vec<i32> = self
            .parts
            .iter()
            .filter(|p| p.is_active())
            .map(Part::part_number)
            .collect();
        numbers.sort_unstable();
        numbers.dedup();

        let mut ranges: Vec<String> = Vec::new();
        let mut i = 0;
        while i < numbers.len() {
            let start = numbers[i];
            let mut end = start;
            while i + 1 < numbers.len() && numbers[i + 1] == end + 1 {
                i += 1;
                end = numbers[i];
            }
            if start == end {
                ranges.push(start.to_string());
            } else {
                ranges.push(format!("{start}-{end}"));
            }
            i += 1;
        }
        ranges.join(", ")
    }
}
