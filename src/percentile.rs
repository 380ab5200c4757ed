//! Percentile ranks of observations within their measure cohort.
//!
//! A cohort is every aggregated council observation sharing a measure group,
//! optionally narrowed to one region. When disaggregation levels are kept,
//! each level contributes its own value to the same cohort. Cohort values
//! are sorted once when the [`CohortIndex`] is built; a rank is then a binary
//! search instead of a scan over the whole dataset.
//!
//! The rank rule depends on the measure's direction:
//!
//! - higher is better: share of cohort values `<=` the subject, so a value
//!   tied with the maximum is the 100th percentile;
//! - lower is better: share of cohort values strictly `<` the subject, so
//!   tied values sit at the bottom of their tie.

use crate::error::RankError;
use crate::types::{AggregatedObservation, Direction, RankedObservation};
use crate::util::median_sorted;
use rayon::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CohortKey {
    pub measure_group_id: String,
}

impl CohortKey {
    pub fn of(obs: &AggregatedObservation) -> Self {
        CohortKey {
            measure_group_id: obs.measure_group_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CohortScope<'a> {
    National,
    Regional(&'a str),
}

/// Rank `value` within `sorted` (ascending). `None` for an empty cohort or a
/// non-finite subject.
pub fn percentile_of(sorted: &[f64], value: f64, direction: Direction) -> Option<f64> {
    if sorted.is_empty() || !value.is_finite() {
        return None;
    }
    let below = match direction {
        Direction::LowerIsBetter => sorted.partition_point(|v| *v < value),
        Direction::HigherIsBetter => sorted.partition_point(|v| *v <= value),
    };
    Some(below as f64 / sorted.len() as f64 * 100.0)
}

#[derive(Debug, Clone, Default)]
pub struct Cohort {
    values: Vec<f64>,
}

impl Cohort {
    fn from_unsorted(mut values: Vec<f64>) -> Self {
        values.sort_by(f64::total_cmp);
        Cohort { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn percentile(&self, value: f64, direction: Direction) -> Option<f64> {
        percentile_of(&self.values, value, direction)
    }

    pub fn median(&self) -> Option<f64> {
        median_sorted(&self.values)
    }
}

/// Sorted cohort values keyed by measure (and region).
#[derive(Debug, Clone, Default)]
pub struct CohortIndex {
    national: HashMap<CohortKey, Cohort>,
    regional: HashMap<(CohortKey, String), Cohort>,
}

impl CohortIndex {
    pub fn build(members: &[AggregatedObservation]) -> Self {
        let mut national: HashMap<CohortKey, Vec<f64>> = HashMap::new();
        let mut regional: HashMap<(CohortKey, String), Vec<f64>> = HashMap::new();
        for obs in members.iter().filter(|o| o.value.is_finite()) {
            let key = CohortKey::of(obs);
            if let Some(region) = obs.region_name.as_ref() {
                regional
                    .entry((key.clone(), region.clone()))
                    .or_default()
                    .push(obs.value);
            }
            national.entry(key).or_default().push(obs.value);
        }
        let index = CohortIndex {
            national: national
                .into_iter()
                .map(|(k, v)| (k, Cohort::from_unsorted(v)))
                .collect(),
            regional: regional
                .into_iter()
                .map(|(k, v)| (k, Cohort::from_unsorted(v)))
                .collect(),
        };
        log::debug!(
            "cohort index built: {} national cohorts, {} regional cohorts",
            index.national.len(),
            index.regional.len()
        );
        index
    }

    pub fn cohort(&self, key: &CohortKey, scope: CohortScope<'_>) -> Result<Option<&Cohort>, RankError> {
        match scope {
            CohortScope::National => Ok(self.national.get(key)),
            CohortScope::Regional(region) => {
                if region.trim().is_empty() {
                    return Err(RankError::InvalidScope("empty region name".to_string()));
                }
                Ok(self.regional.get(&(key.clone(), region.to_string())))
            }
        }
    }

    /// Rank a subject value against a cohort.
    ///
    /// The subject does not have to be a member: this is also how a
    /// country-level aggregate is ranked against the council cohort.
    pub fn rank_value(
        &self,
        key: &CohortKey,
        value: f64,
        direction: Option<Direction>,
        scope: CohortScope<'_>,
    ) -> Result<Option<f64>, RankError> {
        let cohort = self.cohort(key, scope)?;
        Ok(match (cohort, direction) {
            (Some(c), Some(d)) => c.percentile(value, d),
            _ => None,
        })
    }

    pub fn national_median(&self, key: &CohortKey) -> Option<f64> {
        self.national.get(key).and_then(Cohort::median)
    }

    /// National and regional rank of one observation. A missing region or
    /// direction leaves the corresponding percentile empty.
    pub fn rank(&self, obs: AggregatedObservation) -> RankedObservation {
        let key = CohortKey::of(&obs);
        let national_percentile = self
            .rank_value(&key, obs.value, obs.direction, CohortScope::National)
            .ok()
            .flatten();
        let regional_percentile = obs
            .region_name
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .and_then(|region| {
                self.rank_value(&key, obs.value, obs.direction, CohortScope::Regional(region))
                    .ok()
                    .flatten()
            });
        RankedObservation {
            national_median: self.national_median(&key),
            observation: obs,
            national_percentile,
            regional_percentile,
        }
    }

    /// Rank every observation. Order is preserved.
    pub fn rank_all(&self, observations: Vec<AggregatedObservation>) -> Vec<RankedObservation> {
        observations
            .into_par_iter()
            .map(|obs| self.rank(obs))
            .collect()
    }

    pub fn national_len(&self) -> usize {
        self.national.len()
    }
}
