use crate::types::{AggregatedObservation, JoinedRow};
use crate::util::average;
use std::collections::BTreeMap;

/// Which columns identify "the same observation".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupingPolicy {
    /// One value per area and measure group.
    AreaMeasure,
    /// One value per area, measure group and disaggregation level.
    #[default]
    AreaMeasureDisaggregation,
}

impl GroupingPolicy {
    fn key_level(&self, row: &JoinedRow) -> Option<String> {
        match self {
            GroupingPolicy::AreaMeasure => None,
            GroupingPolicy::AreaMeasureDisaggregation => row.record.disaggregation_level.clone(),
        }
    }
}

type GroupKey = (String, String, Option<String>);

/// Collapse duplicate observations into their arithmetic mean.
///
/// Rows without a numeric value are left out of the mean. A key whose rows
/// are all non-numeric produces no observation at all. Output is ordered by
/// `(area_code, measure_group_id, disaggregation_level)`.
pub fn aggregate(rows: &[JoinedRow], policy: GroupingPolicy) -> Vec<AggregatedObservation> {
    struct Acc<'a> {
        first: &'a JoinedRow,
        values: Vec<f64>,
    }

    let mut map: BTreeMap<GroupKey, Acc> = BTreeMap::new();
    for row in rows {
        let key = (
            row.record.area_code.clone(),
            row.record.measure_group_id.clone(),
            policy.key_level(row),
        );
        let e = map.entry(key).or_insert_with(|| Acc {
            first: row,
            values: vec![],
        });
        if let Some(v) = row.record.value {
            e.values.push(v);
        }
    }

    map.into_iter()
        .filter_map(|((area_code, measure_group_id, disaggregation_level), acc)| {
            let value = average(&acc.values)?;
            let first = acc.first;
            Some(AggregatedObservation {
                area_code,
                area_name: first.display_name.clone(),
                geographic_level: first.record.geographic_level.clone(),
                region_name: first.region_name.clone(),
                measure_group_id,
                measure_group_description: first.record.measure_group_description.clone(),
                disaggregation_level,
                direction: first.direction,
                value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, GeographicLevel, MeasureRecord, MeasureType};
    use pretty_assertions::assert_eq;

    fn row(code: &str, disagg: &str, value: Option<f64>) -> JoinedRow {
        JoinedRow {
            record: MeasureRecord {
                area_code: code.into(),
                area_name: code.into(),
                geographic_level: GeographicLevel::Council,
                measure_group_id: "2A".into(),
                measure_group_description: "Admissions to care homes".into(),
                disaggregation_level: Some(disagg.into()),
                value,
                measure_type: MeasureType::Outcome,
            },
            display_name: format!("{code} council"),
            region_name: Some("London".into()),
            direction: Some(Direction::LowerIsBetter),
        }
    }

    #[test]
    fn duplicates_collapse_to_their_mean() {
        let rows = vec![
            row("A", "Total", Some(10.0)),
            row("A", "Total", Some(20.0)),
            row("B", "Total", Some(5.0)),
        ];
        let out = aggregate(&rows, GroupingPolicy::AreaMeasureDisaggregation);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].area_code, "A");
        assert_eq!(out[0].value, 15.0);
        assert_eq!(out[0].area_name, "A council");
        assert_eq!(out[0].disaggregation_level.as_deref(), Some("Total"));
        assert_eq!(out[1].value, 5.0);
    }

    #[test]
    fn non_numeric_values_are_excluded_not_zeroed() {
        let rows = vec![
            row("A", "Total", Some(10.0)),
            row("A", "Total", None),
            row("B", "Total", None),
            row("B", "Total", None),
        ];
        let out = aggregate(&rows, GroupingPolicy::AreaMeasureDisaggregation);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].area_code, "A");
        assert_eq!(out[0].value, 10.0);
    }

    #[test]
    fn policy_controls_disaggregation_split() {
        let rows = vec![
            row("A", "18-64", Some(2.0)),
            row("A", "65+", Some(4.0)),
        ];
        let split = aggregate(&rows, GroupingPolicy::AreaMeasureDisaggregation);
        assert_eq!(split.len(), 2);

        let merged = aggregate(&rows, GroupingPolicy::AreaMeasure);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, 3.0);
        assert_eq!(merged[0].disaggregation_level, None);
    }

    #[test]
    fn aggregating_own_output_is_a_no_op() {
        let rows = vec![
            row("A", "Total", Some(1.0)),
            row("A", "Total", Some(2.0)),
            row("A", "65+", Some(7.0)),
            row("C", "Total", Some(3.5)),
            row("C", "Total", None),
        ];
        for policy in [GroupingPolicy::AreaMeasure, GroupingPolicy::AreaMeasureDisaggregation] {
            let once = aggregate(&rows, policy);
            let replay: Vec<JoinedRow> = once.iter().map(JoinedRow::from).collect();
            let twice = aggregate(&replay, policy);
            assert_eq!(once, twice);
        }
    }
}
