//! Attaches geographic and direction metadata to raw measure rows.

use crate::types::{Direction, JoinedRow, MeasureRecord};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoEntry {
    pub display_name: String,
    pub region_name: Option<String>,
}

/// Area code to region/display name lookup.
#[derive(Debug, Clone, Default)]
pub struct GeoReference {
    by_code: HashMap<String, GeoEntry>,
    region_by_name: HashMap<String, String>,
}

impl GeoReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, area_code: &str, display_name: &str, region_name: Option<&str>) {
        if let Some(region) = region_name {
            self.region_by_name
                .insert(display_name.to_string(), region.to_string());
        }
        self.by_code.insert(
            area_code.to_string(),
            GeoEntry {
                display_name: display_name.to_string(),
                region_name: region_name.map(str::to_string),
            },
        );
    }

    pub fn get(&self, area_code: &str) -> Option<&GeoEntry> {
        self.by_code.get(area_code)
    }

    /// Region of an area looked up by its display name.
    pub fn region_of_name(&self, area_name: &str) -> Option<&str> {
        self.region_by_name.get(area_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// Measure group description to better-direction lookup.
#[derive(Debug, Clone, Default)]
pub struct DirectionRules {
    rules: HashMap<String, Direction>,
}

impl DirectionRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previously registered direction when it differs.
    pub fn insert(&mut self, measure_group_description: &str, direction: Direction) -> Option<Direction> {
        self.rules
            .insert(measure_group_description.to_string(), direction)
            .filter(|previous| *previous != direction)
    }

    pub fn get(&self, measure_group_description: &str) -> Option<Direction> {
        self.rules.get(measure_group_description).copied()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Keys the join could not resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    pub unmatched_areas: BTreeSet<String>,
    pub unmatched_measures: BTreeSet<String>,
}

pub fn join(
    rows: &[MeasureRecord],
    geo: &GeoReference,
    rules: &DirectionRules,
) -> (Vec<JoinedRow>, JoinReport) {
    let mut report = JoinReport::default();
    let joined = rows
        .iter()
        .map(|record| {
            let (display_name, region_name) = match geo.get(&record.area_code) {
                Some(entry) => (entry.display_name.clone(), entry.region_name.clone()),
                None => {
                    report.unmatched_areas.insert(record.area_code.clone());
                    (record.area_name.clone(), None)
                }
            };
            let direction = rules.get(&record.measure_group_description);
            if direction.is_none() {
                report
                    .unmatched_measures
                    .insert(record.measure_group_description.clone());
            }
            JoinedRow {
                record: record.clone(),
                display_name,
                region_name,
                direction,
            }
        })
        .collect();
    (joined, report)
}
