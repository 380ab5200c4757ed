use crate::error::{OutcomeError, Result};
use crate::join::{DirectionRules, GeoReference};
use crate::types::{
    Direction, GeographicLevel, MeasureRecord, MeasureType, RawDirectionRow, RawGeoRow,
    RawMeasureRow, RawTrendRow, TrendRecord,
};
use crate::util::{non_blank, parse_f64_safe, parse_year_safe};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    /// Rows the CSV reader could not deserialize.
    pub parse_errors: usize,
    /// Rows missing an identifying column (area, measure group, year).
    pub incomplete_rows: usize,
    /// Kept rows whose value is blank, suppressed or non-numeric.
    pub non_numeric_values: usize,
}

fn reader<R: Read>(rdr: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(rdr)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(OutcomeError::from)
}

pub fn load_measures(path: &Path) -> Result<(Vec<MeasureRecord>, LoadReport)> {
    read_measures(open(path)?)
}

/// Read the raw measures table.
///
/// Data problems never fail the load: unreadable rows and rows missing an
/// identifier are skipped and counted, unusable values become `None`.
pub fn read_measures<R: Read>(rdr: R) -> Result<(Vec<MeasureRecord>, LoadReport)> {
    let mut rdr = reader(rdr);
    let mut report = LoadReport::default();
    let mut records = Vec::new();

    for result in rdr.deserialize::<RawMeasureRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                log::debug!("skipping unreadable measure row: {e}");
                report.parse_errors += 1;
                continue;
            }
        };

        let Some(area_code) = non_blank(row.ons_code) else {
            report.incomplete_rows += 1;
            continue;
        };
        let Some(measure_group_description) = non_blank(row.measure_group_description) else {
            report.incomplete_rows += 1;
            continue;
        };
        let measure_group_id =
            non_blank(row.measure_group).unwrap_or_else(|| measure_group_description.clone());
        let area_name = non_blank(row.geographical_description).unwrap_or_else(|| area_code.clone());
        let geographic_level = non_blank(row.geographical_level)
            .map(|l| GeographicLevel::from_label(&l))
            .unwrap_or_else(|| GeographicLevel::Other("Unknown".to_string()));
        let measure_type = non_blank(row.measure_type)
            .map(|t| MeasureType::from_label(&t))
            .unwrap_or_else(|| MeasureType::Other("Unknown".to_string()));

        let value = parse_f64_safe(row.measure_value.as_deref());
        if value.is_none() {
            report.non_numeric_values += 1;
        }

        records.push(MeasureRecord {
            area_code,
            area_name,
            geographic_level,
            measure_group_id,
            measure_group_description,
            disaggregation_level: non_blank(row.disaggregation_level),
            value,
            measure_type,
        });
    }

    report.kept_rows = records.len();
    Ok((records, report))
}

pub fn load_geo_reference(path: &Path) -> Result<GeoReference> {
    read_geo_reference(open(path)?)
}

/// Read the area code reference. Any unreadable row aborts the load.
pub fn read_geo_reference<R: Read>(rdr: R) -> Result<GeoReference> {
    let mut rdr = reader(rdr);
    let mut geo = GeoReference::new();
    for (idx, result) in rdr.deserialize::<RawGeoRow>().enumerate() {
        let line = idx as u64 + 2;
        let row = result?;
        let Some(code) = non_blank(row.ons_area_code) else {
            return Err(OutcomeError::MalformedReference {
                table: "geo reference",
                line,
                reason: "missing area code".to_string(),
            });
        };
        let name = non_blank(row.ons_area_name).unwrap_or_else(|| code.clone());
        let region = non_blank(row.council_region);
        geo.insert(&code, &name, region.as_deref());
    }
    Ok(geo)
}

pub fn load_direction_rules(path: &Path) -> Result<DirectionRules> {
    read_direction_rules(open(path)?)
}

/// Read the measure direction table. Unknown direction labels and
/// contradicting duplicates abort the load.
pub fn read_direction_rules<R: Read>(rdr: R) -> Result<DirectionRules> {
    let mut rdr = reader(rdr);
    let mut rules = DirectionRules::new();
    for (idx, result) in rdr.deserialize::<RawDirectionRow>().enumerate() {
        let line = idx as u64 + 2;
        let row = result?;
        let malformed = |reason: String| OutcomeError::MalformedReference {
            table: "measure direction",
            line,
            reason,
        };
        let Some(measure) = non_blank(row.measure_group_description) else {
            return Err(malformed("missing measure group description".to_string()));
        };
        let label = non_blank(row.direction).unwrap_or_default();
        let Some(direction) = Direction::parse(&label) else {
            return Err(malformed(format!("unknown direction {label:?} for {measure:?}")));
        };
        if let Some(previous) = rules.insert(&measure, direction) {
            return Err(malformed(format!(
                "{measure:?} is both {previous:?} and {direction:?}"
            )));
        }
    }
    Ok(rules)
}

pub fn load_trends(path: &Path) -> Result<(Vec<TrendRecord>, LoadReport)> {
    read_trends(open(path)?)
}

pub fn read_trends<R: Read>(rdr: R) -> Result<(Vec<TrendRecord>, LoadReport)> {
    let mut rdr = reader(rdr);
    let mut report = LoadReport::default();
    let mut records = Vec::new();

    for result in rdr.deserialize::<RawTrendRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                report.parse_errors += 1;
                continue;
            }
        };
        let (Some(area_name), Some(measure), Some(year)) = (
            non_blank(row.geographical_description),
            non_blank(row.measure_group_description),
            parse_year_safe(row.year.as_deref()),
        ) else {
            report.incomplete_rows += 1;
            continue;
        };
        let value = parse_f64_safe(row.measure_value.as_deref());
        if value.is_none() {
            report.non_numeric_values += 1;
        }
        records.push(TrendRecord {
            area_name,
            measure_group_description: measure,
            year,
            value,
        });
    }

    report.kept_rows = records.len();
    Ok((records, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MEASURES: &str = "\
ONS Code,Geographical Description,Geographical Level,Measure Group,Measure Group Description,Disaggregation Level,Measure Type,Measure_Value
E06000001,Hartlepool,Council,1A,Quality of life,Total,Outcome,19.1
E06000002,Middlesbrough,Council,1A,Quality of life,Total,Outcome,x
E06000003,Redcar,Council,,Quality of life,,Outcome,\"1,204.5\"
,Nowhere,Council,1A,Quality of life,Total,Outcome,3
E92000001,England,Country,1A,Quality of life,Total,Outcome,18.9
";

    #[test]
    fn measures_coerce_bad_values_to_none_and_skip_incomplete_rows() {
        let (records, report) = read_measures(MEASURES.as_bytes()).unwrap();
        assert_eq!(
            report,
            LoadReport {
                total_rows: 5,
                kept_rows: 4,
                parse_errors: 0,
                incomplete_rows: 1,
                non_numeric_values: 1,
            }
        );
        assert_eq!(records[0].value, Some(19.1));
        assert_eq!(records[0].disaggregation_level.as_deref(), Some("Total"));
        assert_eq!(records[1].value, None);
        assert_eq!(records[2].measure_group_id, "Quality of life");
        assert_eq!(records[2].value, Some(1204.5));
        assert_eq!(records[2].disaggregation_level, None);
        assert_eq!(records[3].geographic_level, GeographicLevel::Country);
        assert_eq!(records[3].measure_type, MeasureType::Outcome);
    }

    #[test]
    fn geo_reference_maps_codes_to_regions() {
        let csv = "ONS Area Code,ONS Area Name,Council region\nE06000001,Hartlepool,North East\nE06000053,Isles of Scilly,\n";
        let geo = read_geo_reference(csv.as_bytes()).unwrap();
        assert_eq!(geo.len(), 2);
        assert_eq!(geo.get("E06000001").unwrap().region_name.as_deref(), Some("North East"));
        assert_eq!(geo.get("E06000053").unwrap().region_name, None);
    }

    #[test]
    fn geo_reference_without_code_is_malformed() {
        let csv = "ONS Area Code,ONS Area Name,Council region\n,Hartlepool,North East\n";
        let err = read_geo_reference(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, OutcomeError::MalformedReference { line: 2, .. }));
    }

    #[test]
    fn direction_rules_reject_unknown_and_conflicting_labels() {
        let ok = "Measure Group Description,Direction\nQuality of life,Higher is better\nDelayed transfers,lower is better\n";
        let rules = read_direction_rules(ok.as_bytes()).unwrap();
        assert_eq!(rules.get("Delayed transfers"), Some(Direction::LowerIsBetter));

        let unknown = "Measure Group Description,Direction\nQuality of life,Sideways\n";
        assert!(matches!(
            read_direction_rules(unknown.as_bytes()),
            Err(OutcomeError::MalformedReference { .. })
        ));

        let conflict = "Measure Group Description,Direction\nM,Higher is better\nM,Lower is better\n";
        assert!(matches!(
            read_direction_rules(conflict.as_bytes()),
            Err(OutcomeError::MalformedReference { line: 3, .. })
        ));
    }

    #[test]
    fn trends_parse_financial_years() {
        let csv = "Geographical Description,Measure Group Description,Year,Measure_Value\nEngland,Quality of life,2021/22,18.9\nEngland,Quality of life,unknown,1\nLeeds,Quality of life,2022,c\n";
        let (records, report) = read_trends(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].year, 2021);
        assert_eq!(records[1].value, None);
        assert_eq!(report.incomplete_rows, 1);
        assert_eq!(report.non_numeric_values, 1);
    }
}
