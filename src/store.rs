//! The loaded outcome snapshot and the read-only queries over it.
//!
//! An [`OutcomeStore`] is built once from the four input tables and never
//! mutated afterwards, so it can be shared across threads by reference.

use crate::aggregate::{aggregate, GroupingPolicy};
use crate::config::Config;
use crate::error::{QueryError, Result};
use crate::join::{join, DirectionRules, GeoReference, JoinReport};
use crate::loader::{self, LoadReport};
use crate::percentile::CohortIndex;
use crate::trend;
use crate::types::{
    AreaOutcome, GeographicLevel, JoinedRow, MeasureRecord, MeasureType, ParetoRow,
    RankedObservation, TrendRecord, TrendSeries,
};
use crate::util::format_int;
use std::collections::{BTreeMap, BTreeSet};

/// Knobs that change how the snapshot is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Area name of the country-level aggregate rows.
    pub country_area: String,
    pub policy: GroupingPolicy,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            country_area: "England".to_string(),
            policy: GroupingPolicy::default(),
        }
    }
}

#[derive(Debug)]
pub struct OutcomeStore {
    settings: StoreSettings,
    geo: GeoReference,
    /// Council-level outcome rows, joined but not aggregated.
    joined: Vec<JoinedRow>,
    /// Council-level observations ranked within their own cohorts.
    ranked: Vec<RankedObservation>,
    /// Other-level observations ranked against the council cohorts.
    fallback: Vec<RankedObservation>,
    index: CohortIndex,
    trends: Option<Vec<TrendRecord>>,
}

impl OutcomeStore {
    /// Load every table named in `config` and build the snapshot.
    pub fn load(config: &Config) -> Result<Self> {
        let geo = loader::load_geo_reference(&config.geo_path)?;
        let rules = loader::load_direction_rules(&config.directions_path)?;
        log::info!(
            "loaded {} area references and {} direction rules",
            format_int(geo.len()),
            format_int(rules.len())
        );

        let (records, report) = loader::load_measures(&config.measures_path)?;
        log_load_report("measures", &report);

        let trends = match &config.trends_path {
            Some(path) => {
                let (trends, report) = loader::load_trends(path)?;
                log_load_report("trends", &report);
                Some(trends)
            }
            None => None,
        };

        Ok(Self::build(records, geo, &rules, trends, config.settings.clone()))
    }

    /// Build the snapshot from already loaded tables.
    pub fn build(
        records: Vec<MeasureRecord>,
        geo: GeoReference,
        rules: &DirectionRules,
        trends: Option<Vec<TrendRecord>>,
        settings: StoreSettings,
    ) -> Self {
        let (council, other): (Vec<MeasureRecord>, Vec<MeasureRecord>) = records
            .into_iter()
            .filter(|r| r.measure_type == MeasureType::Outcome)
            .partition(|r| r.geographic_level == GeographicLevel::Council);

        let (joined, council_report) = join(&council, &geo, rules);
        warn_unmatched(&council_report, true);
        let (other_joined, other_report) = join(&other, &geo, rules);
        warn_unmatched(&other_report, false);

        let observations = aggregate(&joined, settings.policy);
        let index = CohortIndex::build(&observations);
        let ranked = index.rank_all(observations);
        let fallback = index.rank_all(aggregate(&other_joined, settings.policy));
        log::info!(
            "ranked {} council observations across {} cohorts ({} other-level observations)",
            format_int(ranked.len()),
            format_int(index.national_len()),
            format_int(fallback.len())
        );

        OutcomeStore {
            settings,
            geo,
            joined,
            ranked,
            fallback,
            index,
            trends,
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn cohort_index(&self) -> &CohortIndex {
        &self.index
    }

    fn valued_rows(&self) -> impl Iterator<Item = &JoinedRow> {
        self.joined.iter().filter(|r| r.record.value.is_some())
    }

    pub fn list_measure_groups(&self) -> Vec<String> {
        distinct(
            self.valued_rows()
                .map(|r| r.record.measure_group_description.as_str()),
        )
    }

    pub fn list_regions(&self) -> Vec<String> {
        distinct(self.valued_rows().filter_map(|r| r.region_name.as_deref()))
    }

    /// Disaggregation levels offered for a measure, or across all measures.
    pub fn list_disaggregations(&self, measure_group: Option<&str>) -> Vec<String> {
        let measure_group = measure_group.filter(|m| !m.is_empty());
        distinct(
            self.valued_rows()
                .filter(|r| {
                    measure_group.map_or(true, |m| r.record.measure_group_description == m)
                })
                .filter_map(|r| r.record.disaggregation_level.as_deref()),
        )
    }

    /// The level a selector should start on: `Total` when offered, otherwise
    /// the first option.
    pub fn default_disaggregation(&self, measure_group: &str) -> Option<String> {
        let options = self.list_disaggregations(Some(measure_group));
        if options.iter().any(|o| o == "Total") {
            return Some("Total".to_string());
        }
        options.into_iter().next()
    }

    /// Summed value per area for one measure, largest first.
    ///
    /// Duplicate observations are first collapsed to their mean per
    /// disaggregation level; the remaining values of an area are then summed.
    pub fn pareto_data(
        &self,
        measure_group: Option<&str>,
        regions: &[String],
        disaggregation: Option<&str>,
    ) -> std::result::Result<Vec<ParetoRow>, QueryError> {
        let measure = measure_group
            .filter(|m| !m.trim().is_empty())
            .ok_or(QueryError::MissingMeasure)?;
        let disaggregation = disaggregation.filter(|d| !d.is_empty());

        let filtered: Vec<JoinedRow> = self
            .joined
            .iter()
            .filter(|r| r.record.measure_group_description == measure)
            .filter(|r| {
                regions.is_empty()
                    || r.region_name
                        .as_ref()
                        .is_some_and(|region| regions.contains(region))
            })
            .filter(|r| {
                disaggregation.map_or(true, |d| r.record.disaggregation_level.as_deref() == Some(d))
            })
            .cloned()
            .collect();

        let mut sums: BTreeMap<String, (String, f64)> = BTreeMap::new();
        for obs in aggregate(&filtered, GroupingPolicy::AreaMeasureDisaggregation) {
            let e = sums
                .entry(obs.area_code)
                .or_insert_with(|| (obs.area_name, 0.0));
            e.1 += obs.value;
        }

        let mut rows: Vec<ParetoRow> = sums
            .into_iter()
            .map(|(code, (area_name, value))| ParetoRow {
                percentile: self.pareto_percentile(&code, measure, disaggregation),
                area_name,
                value,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.value
                .total_cmp(&a.value)
                .then_with(|| a.area_name.cmp(&b.area_name))
        });
        Ok(rows)
    }

    // National percentile for a Pareto bar, when the filters pin it to a
    // single ranked observation. A merged observation has no level, so it
    // never stands in for one filtered level.
    fn pareto_percentile(&self, area_code: &str, measure: &str, disaggregation: Option<&str>) -> Option<f64> {
        let mut matches = self.ranked.iter().filter(|r| {
            let obs = &r.observation;
            obs.area_code == area_code
                && obs.measure_group_description == measure
                && match (disaggregation, obs.disaggregation_level.as_deref()) {
                    (Some(d), Some(level)) => d == level,
                    (Some(_), None) => false,
                    (None, _) => true,
                }
        });
        let first = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        first.national_percentile
    }

    /// Ranked outcomes for one area, or for the country when no area is
    /// given.
    ///
    /// Areas without council-level rows (the country itself, regions) are
    /// ranked against the council cohorts without being members of them.
    pub fn area_outcomes(&self, area_name: Option<&str>) -> Vec<AreaOutcome> {
        let area = area_name
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(self.settings.country_area.as_str());

        let mut rows: Vec<AreaOutcome> = self
            .ranked
            .iter()
            .filter(|r| r.observation.area_name == area)
            .map(AreaOutcome::from)
            .collect();
        if rows.is_empty() {
            rows = self
                .fallback
                .iter()
                .filter(|r| r.observation.area_name == area)
                .map(AreaOutcome::from)
                .collect();
        }
        rows.sort_by(|a, b| {
            a.measure_group_id
                .cmp(&b.measure_group_id)
                .then_with(|| a.disaggregation_level.cmp(&b.disaggregation_level))
        });
        rows
    }

    pub fn trend(
        &self,
        measure_group: Option<&str>,
        area_name: Option<&str>,
    ) -> std::result::Result<TrendSeries, QueryError> {
        let measure = measure_group
            .filter(|m| !m.trim().is_empty())
            .ok_or(QueryError::MissingMeasure)?;
        let series = self.trends.as_deref().ok_or(QueryError::NoTrendData)?;
        Ok(trend::trend(
            series,
            &self.geo,
            measure,
            area_name,
            &self.settings.country_area,
        ))
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn log_load_report(table: &str, report: &LoadReport) {
    log::info!(
        "{table}: {} rows read, {} kept",
        format_int(report.total_rows),
        format_int(report.kept_rows)
    );
    if report.parse_errors + report.incomplete_rows > 0 {
        log::warn!(
            "{table}: skipped {} unreadable and {} incomplete rows",
            format_int(report.parse_errors),
            format_int(report.incomplete_rows)
        );
    }
    if report.non_numeric_values > 0 {
        log::info!(
            "{table}: {} rows have no numeric value",
            format_int(report.non_numeric_values)
        );
    }
}

// Council rows are expected to resolve; country and region rows usually
// are not in the area reference.
fn warn_unmatched(report: &JoinReport, expect_areas: bool) {
    for code in &report.unmatched_areas {
        if expect_areas {
            log::warn!("area {code} is not in the geo reference; regional rank unavailable");
        } else {
            log::debug!("area {code} is not in the geo reference");
        }
    }
    for measure in &report.unmatched_measures {
        log::warn!("no direction rule for {measure:?}; rank unavailable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use pretty_assertions::assert_eq;

    fn rec(code: &str, name: &str, level: GeographicLevel, disagg: &str, value: Option<f64>) -> MeasureRecord {
        MeasureRecord {
            area_code: code.into(),
            area_name: name.into(),
            geographic_level: level,
            measure_group_id: "M1".into(),
            measure_group_description: "M".into(),
            disaggregation_level: Some(disagg.into()),
            value,
            measure_type: MeasureType::Outcome,
        }
    }

    fn council(code: &str, value: f64) -> MeasureRecord {
        rec(code, code, GeographicLevel::Council, "Total", Some(value))
    }

    fn geo() -> GeoReference {
        let mut geo = GeoReference::new();
        geo.insert("A", "A", Some("North"));
        geo.insert("B", "B", Some("South"));
        geo.insert("C", "C", Some("North"));
        geo
    }

    fn rules() -> DirectionRules {
        let mut rules = DirectionRules::new();
        rules.insert("M", Direction::HigherIsBetter);
        rules
    }

    fn store(records: Vec<MeasureRecord>) -> OutcomeStore {
        OutcomeStore::build(records, geo(), &rules(), None, StoreSettings::default())
    }

    #[test]
    fn pareto_filters_by_region_and_sorts_descending() {
        let s = store(vec![council("A", 5.0), council("B", 3.0), council("C", 7.0)]);
        let rows = s
            .pareto_data(Some("M"), &["North".to_string()], None)
            .unwrap();
        let pairs: Vec<(&str, f64)> = rows.iter().map(|r| (r.area_name.as_str(), r.value)).collect();
        assert_eq!(pairs, vec![("C", 7.0), ("A", 5.0)]);
        assert_eq!(rows[0].percentile, Some(100.0));
    }

    #[test]
    fn pareto_sums_disaggregations_but_averages_duplicates() {
        let s = store(vec![
            rec("A", "A", GeographicLevel::Council, "18-64", Some(2.0)),
            rec("A", "A", GeographicLevel::Council, "18-64", Some(4.0)),
            rec("A", "A", GeographicLevel::Council, "65+", Some(10.0)),
        ]);
        let rows = s.pareto_data(Some("M"), &[], None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 13.0);
        // Two ranked observations match, so no single percentile applies.
        assert_eq!(rows[0].percentile, None);

        let rows = s.pareto_data(Some("M"), &[], Some("65+")).unwrap();
        assert_eq!(rows[0].value, 10.0);
        assert_eq!(rows[0].percentile, Some(100.0));
    }

    #[test]
    fn pareto_percentile_is_empty_for_filtered_merged_levels() {
        let merged = StoreSettings {
            policy: GroupingPolicy::AreaMeasure,
            ..StoreSettings::default()
        };
        let s = OutcomeStore::build(
            vec![
                rec("A", "A", GeographicLevel::Council, "18-64", Some(1.0)),
                rec("A", "A", GeographicLevel::Council, "65+", Some(100.0)),
                rec("B", "B", GeographicLevel::Council, "18-64", Some(200.0)),
                rec("B", "B", GeographicLevel::Council, "65+", Some(10.0)),
            ],
            geo(),
            &rules(),
            None,
            merged,
        );

        let rows = s.pareto_data(Some("M"), &[], Some("65+")).unwrap();
        let pairs: Vec<(&str, f64, Option<f64>)> = rows
            .iter()
            .map(|r| (r.area_name.as_str(), r.value, r.percentile))
            .collect();
        assert_eq!(pairs, vec![("A", 100.0, None), ("B", 10.0, None)]);

        // Unfiltered, each area is one merged observation: means 50.5 and 105.
        let rows = s.pareto_data(Some("M"), &[], None).unwrap();
        let pairs: Vec<(&str, f64, Option<f64>)> = rows
            .iter()
            .map(|r| (r.area_name.as_str(), r.value, r.percentile))
            .collect();
        assert_eq!(pairs, vec![("B", 210.0, Some(100.0)), ("A", 101.0, Some(50.0))]);
    }

    #[test]
    fn pareto_requires_a_measure_and_tolerates_no_matches() {
        let s = store(vec![council("A", 5.0)]);
        assert_eq!(s.pareto_data(None, &[], None), Err(QueryError::MissingMeasure));
        assert_eq!(s.pareto_data(Some(""), &[], None), Err(QueryError::MissingMeasure));
        assert_eq!(s.pareto_data(Some("Unknown"), &[], None), Ok(vec![]));
    }

    #[test]
    fn selectors_are_distinct_and_sorted() {
        let s = store(vec![
            council("C", 1.0),
            council("A", 2.0),
            rec("B", "B", GeographicLevel::Council, "65+", Some(1.0)),
            rec("A", "A", GeographicLevel::Council, "18-64", None),
        ]);
        assert_eq!(s.list_measure_groups(), vec!["M".to_string()]);
        assert_eq!(s.list_regions(), vec!["North".to_string(), "South".to_string()]);
        assert_eq!(
            s.list_disaggregations(None),
            vec!["65+".to_string(), "Total".to_string()]
        );
        assert_eq!(s.list_disaggregations(Some("Unknown")), Vec::<String>::new());
        assert_eq!(s.default_disaggregation("M"), Some("Total".to_string()));
        assert_eq!(s.default_disaggregation("Unknown"), None);
    }

    #[test]
    fn area_outcomes_carry_both_percentiles() {
        let s = store(vec![council("A", 5.0), council("B", 3.0), council("C", 7.0)]);
        let rows = s.area_outcomes(Some("A"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].national_percentile, Some(2.0 / 3.0 * 100.0));
        assert_eq!(rows[0].regional_percentile, Some(50.0));
        assert_eq!(rows[0].national_median, Some(5.0));
        assert_eq!(rows[0].direction, Some(Direction::HigherIsBetter));
    }

    #[test]
    fn country_outcomes_fall_back_to_council_cohort() {
        let s = store(vec![
            council("A", 5.0),
            council("B", 3.0),
            council("C", 7.0),
            rec("E92000001", "England", GeographicLevel::Country, "Total", Some(6.0)),
        ]);
        let rows = s.area_outcomes(None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].area_name, "England");
        assert_eq!(rows[0].national_percentile, Some(2.0 / 3.0 * 100.0));
        assert_eq!(rows[0].regional_percentile, None);
        // The country row is not a cohort member.
        assert_eq!(s.cohort_index().national_len(), 1);
        assert_eq!(s.pareto_data(Some("M"), &[], None).unwrap().len(), 3);
    }

    #[test]
    fn non_numeric_rows_never_get_a_rank() {
        let s = store(vec![
            council("A", 5.0),
            rec("B", "B", GeographicLevel::Council, "Total", None),
        ]);
        assert!(s.area_outcomes(Some("B")).is_empty());
        assert_eq!(s.area_outcomes(Some("A"))[0].national_percentile, Some(100.0));
    }

    #[test]
    fn unknown_area_yields_empty_result() {
        let s = store(vec![council("A", 5.0)]);
        assert!(s.area_outcomes(Some("Atlantis")).is_empty());
    }

    #[test]
    fn trend_query_requires_loaded_table() {
        let s = store(vec![council("A", 5.0)]);
        assert_eq!(s.trend(Some("M"), None), Err(QueryError::NoTrendData));
        assert_eq!(s.trend(None, None), Err(QueryError::MissingMeasure));
    }

    #[test]
    fn store_is_shareable_across_threads() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<OutcomeStore>();

        let s = store(vec![council("A", 5.0), council("C", 7.0)]);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| s.area_outcomes(Some("C"))))
                .collect();
            for h in handles {
                assert_eq!(h.join().unwrap()[0].national_percentile, Some(100.0));
            }
        });
    }
}
