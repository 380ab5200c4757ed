use crate::util::{format_number, format_optional_number, format_percentile};
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

// Raw CSV shapes. Every column is optional so a ragged or partially blank
// export still deserializes; validation happens in the loader.

#[derive(Debug, Deserialize)]
pub struct RawMeasureRow {
    #[serde(rename = "ONS Code")]
    pub ons_code: Option<String>,
    #[serde(rename = "Geographical Description")]
    pub geographical_description: Option<String>,
    #[serde(rename = "Geographical Level")]
    pub geographical_level: Option<String>,
    #[serde(rename = "Measure Group")]
    pub measure_group: Option<String>,
    #[serde(rename = "Measure Group Description")]
    pub measure_group_description: Option<String>,
    #[serde(rename = "Disaggregation Level")]
    pub disaggregation_level: Option<String>,
    #[serde(rename = "Measure Type")]
    pub measure_type: Option<String>,
    #[serde(rename = "Measure_Value")]
    pub measure_value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawGeoRow {
    #[serde(rename = "ONS Area Code")]
    pub ons_area_code: Option<String>,
    #[serde(rename = "ONS Area Name")]
    pub ons_area_name: Option<String>,
    #[serde(rename = "Council region")]
    pub council_region: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawDirectionRow {
    #[serde(rename = "Measure Group Description")]
    pub measure_group_description: Option<String>,
    #[serde(rename = "Direction")]
    pub direction: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawTrendRow {
    #[serde(rename = "Geographical Description")]
    pub geographical_description: Option<String>,
    #[serde(rename = "Measure Group Description")]
    pub measure_group_description: Option<String>,
    #[serde(rename = "Year")]
    pub year: Option<String>,
    #[serde(rename = "Measure_Value")]
    pub measure_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeographicLevel {
    Country,
    Region,
    Council,
    Other(String),
}

impl GeographicLevel {
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            l if l.eq_ignore_ascii_case("country") => GeographicLevel::Country,
            l if l.eq_ignore_ascii_case("region") => GeographicLevel::Region,
            l if l.eq_ignore_ascii_case("council") => GeographicLevel::Council,
            other => GeographicLevel::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasureType {
    Outcome,
    Other(String),
}

impl MeasureType {
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case("outcome") {
            MeasureType::Outcome
        } else {
            MeasureType::Other(label.to_string())
        }
    }
}

/// Which end of a measure's scale counts as good performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "Higher is better")]
    HigherIsBetter,
    #[serde(rename = "Lower is better")]
    LowerIsBetter,
}

impl Direction {
    /// Accepts the labels used in the direction table, case-insensitively.
    pub fn parse(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "higher is better" | "higher" => Some(Direction::HigherIsBetter),
            "lower is better" | "lower" => Some(Direction::LowerIsBetter),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::HigherIsBetter => "Higher is better",
            Direction::LowerIsBetter => "Lower is better",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One raw observation from the measures table.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureRecord {
    pub area_code: String,
    pub area_name: String,
    pub geographic_level: GeographicLevel,
    pub measure_group_id: String,
    pub measure_group_description: String,
    pub disaggregation_level: Option<String>,
    pub value: Option<f64>,
    pub measure_type: MeasureType,
}

/// A raw observation with its reference metadata attached.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub record: MeasureRecord,
    /// Canonical area name from the geo reference, or the raw name.
    pub display_name: String,
    pub region_name: Option<String>,
    pub direction: Option<Direction>,
}

/// Mean of every numeric observation sharing a grouping key.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedObservation {
    pub area_code: String,
    pub area_name: String,
    pub geographic_level: GeographicLevel,
    pub region_name: Option<String>,
    pub measure_group_id: String,
    pub measure_group_description: String,
    pub disaggregation_level: Option<String>,
    pub direction: Option<Direction>,
    pub value: f64,
}

impl From<&AggregatedObservation> for JoinedRow {
    fn from(obs: &AggregatedObservation) -> Self {
        JoinedRow {
            record: MeasureRecord {
                area_code: obs.area_code.clone(),
                area_name: obs.area_name.clone(),
                geographic_level: obs.geographic_level.clone(),
                measure_group_id: obs.measure_group_id.clone(),
                measure_group_description: obs.measure_group_description.clone(),
                disaggregation_level: obs.disaggregation_level.clone(),
                value: Some(obs.value),
                measure_type: MeasureType::Outcome,
            },
            display_name: obs.area_name.clone(),
            region_name: obs.region_name.clone(),
            direction: obs.direction,
        }
    }
}

/// An aggregated observation with its national and regional ranks.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedObservation {
    pub observation: AggregatedObservation,
    pub national_percentile: Option<f64>,
    pub regional_percentile: Option<f64>,
    pub national_median: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendRecord {
    pub area_name: String,
    pub measure_group_description: String,
    pub year: i32,
    pub value: Option<f64>,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct ParetoRow {
    #[tabled(rename = "Area")]
    pub area_name: String,
    #[tabled(rename = "Value", display_with = "display_value")]
    pub value: f64,
    #[tabled(rename = "Percentile", display_with = "display_percentile")]
    pub percentile: Option<f64>,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct AreaOutcome {
    #[tabled(rename = "Area")]
    pub area_name: String,
    #[tabled(rename = "Measure")]
    pub measure_group_id: String,
    #[tabled(rename = "Description")]
    pub measure_group_description: String,
    #[tabled(rename = "Disaggregation", display_with = "display_label")]
    pub disaggregation_level: Option<String>,
    #[tabled(rename = "Value", display_with = "display_value")]
    pub value: f64,
    #[tabled(rename = "National", display_with = "display_percentile")]
    pub national_percentile: Option<f64>,
    #[tabled(rename = "Regional", display_with = "display_percentile")]
    pub regional_percentile: Option<f64>,
    #[tabled(rename = "NationalMedian", display_with = "display_optional")]
    pub national_median: Option<f64>,
    #[tabled(rename = "BetterDirection", display_with = "display_direction")]
    pub direction: Option<Direction>,
}

impl From<&RankedObservation> for AreaOutcome {
    fn from(ranked: &RankedObservation) -> Self {
        let obs = &ranked.observation;
        AreaOutcome {
            area_name: obs.area_name.clone(),
            measure_group_id: obs.measure_group_id.clone(),
            measure_group_description: obs.measure_group_description.clone(),
            disaggregation_level: obs.disaggregation_level.clone(),
            value: obs.value,
            national_percentile: ranked.national_percentile,
            regional_percentile: ranked.regional_percentile,
            national_median: ranked.national_median,
            direction: obs.direction,
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct YearlyPoint {
    #[tabled(rename = "Year")]
    pub year: i32,
    #[tabled(rename = "Value", display_with = "display_value")]
    pub value: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TrendSeries {
    pub measure_group: String,
    pub national: Vec<YearlyPoint>,
    pub area_name: Option<String>,
    pub area: Option<Vec<YearlyPoint>>,
    pub region_name: Option<String>,
    pub region: Option<Vec<YearlyPoint>>,
}

fn display_value(v: &f64) -> String {
    format_number(*v, 2)
}

fn display_optional(v: &Option<f64>) -> String {
    format_optional_number(*v, 2)
}

fn display_percentile(v: &Option<f64>) -> String {
    format_percentile(*v)
}

fn display_label(v: &Option<String>) -> String {
    v.clone().unwrap_or_else(|| "-".to_string())
}

fn display_direction(v: &Option<Direction>) -> String {
    v.map(|d| d.label().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_labels_parse_case_insensitively() {
        assert_eq!(Direction::parse("Lower is better"), Some(Direction::LowerIsBetter));
        assert_eq!(Direction::parse(" HIGHER IS BETTER "), Some(Direction::HigherIsBetter));
        assert_eq!(Direction::parse("sideways"), None);
    }

    #[test]
    fn direction_serializes_with_source_labels() {
        let json = serde_json::to_string(&Direction::LowerIsBetter).unwrap();
        assert_eq!(json, "\"Lower is better\"");
    }

    #[test]
    fn geographic_level_keeps_unknown_labels() {
        assert_eq!(GeographicLevel::from_label("council"), GeographicLevel::Council);
        assert_eq!(
            GeographicLevel::from_label("Combined Authority"),
            GeographicLevel::Other("Combined Authority".into())
        );
    }
}
