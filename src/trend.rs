use crate::join::GeoReference;
use crate::types::{TrendRecord, TrendSeries, YearlyPoint};
use std::collections::BTreeMap;

/// Mean value per year, ascending by year. Years without a numeric value are
/// left out.
pub fn yearly_means<'a, I>(rows: I) -> Vec<YearlyPoint>
where
    I: IntoIterator<Item = &'a TrendRecord>,
{
    let mut by_year: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for r in rows {
        if let Some(v) = r.value {
            let e = by_year.entry(r.year).or_insert((0.0, 0));
            e.0 += v;
            e.1 += 1;
        }
    }
    by_year
        .into_iter()
        .map(|(year, (sum, count))| YearlyPoint {
            year,
            value: sum / count as f64,
        })
        .collect()
}

/// National, area and regional yearly series for one measure group.
///
/// The national series comes from the rows of `country_area`. When an area
/// is given, its region is resolved through `geo` and the regional series
/// averages every row of every area in that region.
pub fn trend(
    series: &[TrendRecord],
    geo: &GeoReference,
    measure_group: &str,
    area_name: Option<&str>,
    country_area: &str,
) -> TrendSeries {
    let measure_rows: Vec<&TrendRecord> = series
        .iter()
        .filter(|r| r.measure_group_description == measure_group)
        .collect();

    let national = yearly_means(
        measure_rows
            .iter()
            .copied()
            .filter(|r| r.area_name == country_area),
    );

    let area_name = area_name.filter(|a| !a.trim().is_empty());
    let area = area_name.map(|name| {
        yearly_means(measure_rows.iter().copied().filter(|r| r.area_name == name))
    });

    let region_name = area_name.and_then(|name| geo.region_of_name(name));
    let region = region_name.map(|region| {
        yearly_means(
            measure_rows
                .iter()
                .copied()
                .filter(|r| geo.region_of_name(&r.area_name) == Some(region)),
        )
    });

    TrendSeries {
        measure_group: measure_group.to_string(),
        national,
        area_name: area_name.map(str::to_string),
        area,
        region_name: region_name.map(str::to_string),
        region,
    }
}
