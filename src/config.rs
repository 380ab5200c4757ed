use crate::aggregate::GroupingPolicy;
use crate::store::StoreSettings;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Paths of the input tables plus snapshot settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub measures_path: PathBuf,
    pub geo_path: PathBuf,
    pub directions_path: PathBuf,
    pub trends_path: Option<PathBuf>,
    pub settings: StoreSettings,
}

#[derive(Parser, Debug)]
#[command(
    name = "care-outcomes",
    version,
    about = "Rank council social-care outcome measures against national and regional peers"
)]
pub struct Cli {
    #[command(flatten)]
    pub data: DataArgs,

    /// Print JSON instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    /// Also write the full result to this CSV (records) or JSON (trend) file
    #[arg(long, global = true, value_name = "PATH")]
    pub export: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Raw measures table
    #[arg(long, global = true, default_value = "data/measures.csv")]
    pub measures: PathBuf,

    /// Area code reference (code, name, region)
    #[arg(long, global = true, default_value = "data/ons_codes.csv")]
    pub geo: PathBuf,

    /// Measure direction rules
    #[arg(long, global = true, default_value = "data/measure_direction.csv")]
    pub directions: PathBuf,

    /// Optional year-indexed trend table
    #[arg(long, global = true)]
    pub trends: Option<PathBuf>,

    /// Area name of the country-level rows
    #[arg(long, global = true, default_value = "England")]
    pub country: String,

    /// Collapse disaggregation levels into one value per area and measure
    #[arg(long, global = true)]
    pub merge_disaggregations: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List measure groups
    Measures,
    /// List regions
    Regions,
    /// List disaggregation levels, optionally for one measure
    Disaggregations {
        #[arg(long)]
        measure: Option<String>,
    },
    /// Summed value per council for one measure, largest first
    Pareto {
        #[arg(long)]
        measure: Option<String>,
        /// Restrict to these regions (repeatable)
        #[arg(long = "region")]
        regions: Vec<String>,
        #[arg(long)]
        disaggregation: Option<String>,
    },
    /// Ranked outcomes for one council, or the country when omitted
    Area {
        #[arg(long)]
        name: Option<String>,
    },
    /// Yearly national, council and regional averages for one measure
    Trend {
        #[arg(long)]
        measure: Option<String>,
        #[arg(long)]
        area: Option<String>,
    },
}

impl From<&DataArgs> for Config {
    fn from(args: &DataArgs) -> Self {
        let policy = if args.merge_disaggregations {
            GroupingPolicy::AreaMeasure
        } else {
            GroupingPolicy::AreaMeasureDisaggregation
        };
        Config {
            measures_path: args.measures.clone(),
            geo_path: args.geo.clone(),
            directions_path: args.directions.clone(),
            trends_path: args.trends.clone(),
            settings: StoreSettings {
                country_area: args.country.clone(),
                policy,
            },
        }
    }
}
