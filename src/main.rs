// Entry point and high-level CLI flow.
//
// Every invocation loads the tables once into an immutable snapshot and runs
// a single query against it:
// - `measures`, `regions`, `disaggregations` list selector values.
// - `pareto` ranks councils by summed value for one measure.
// - `area` shows one council's (or the country's) ranked outcomes.
// - `trend` shows yearly averages for the country, a council and its region.
use care_outcomes::config::{Cli, Command};
use care_outcomes::output;
use care_outcomes::util::format_int;
use care_outcomes::{Config, OutcomeStore, Result};
use clap::Parser;
use std::process::ExitCode;

fn handle_pareto(
    store: &OutcomeStore,
    cli: &Cli,
    measure: Option<&str>,
    regions: &[String],
    disaggregation: Option<&str>,
) -> Result<()> {
    let rows = store.pareto_data(measure, regions, disaggregation)?;
    if let Some(path) = &cli.export {
        output::write_csv(path, &rows)?;
    }
    if cli.json {
        return output::print_json(&rows);
    }
    let note = match (regions.is_empty(), disaggregation) {
        (true, None) => "All regions".to_string(),
        (true, Some(d)) => format!("All regions, {}", d),
        (false, None) => regions.join(", "),
        (false, Some(d)) => format!("{}, {}", regions.join(", "), d),
    };
    output::preview_table(measure.unwrap_or_default(), Some(&note), &rows);
    println!("{} councils", format_int(rows.len()));
    Ok(())
}

fn handle_area(store: &OutcomeStore, cli: &Cli, name: Option<&str>) -> Result<()> {
    let rows = store.area_outcomes(name);
    if let Some(path) = &cli.export {
        output::write_csv(path, &rows)?;
    }
    if cli.json {
        return output::print_json(&rows);
    }
    let title = name.unwrap_or(store.settings().country_area.as_str());
    let note = if name.is_some() {
        "Percentiles against all councils and councils in the same region"
    } else {
        "Country values ranked against all councils"
    };
    output::preview_table(title, Some(note), &rows);
    Ok(())
}

fn handle_trend(store: &OutcomeStore, cli: &Cli, measure: Option<&str>, area: Option<&str>) -> Result<()> {
    let series = store.trend(measure, area)?;
    if let Some(path) = &cli.export {
        output::write_json(path, &series)?;
    }
    if cli.json {
        return output::print_json(&series);
    }
    output::preview_table(
        &format!("{} ({})", series.measure_group, store.settings().country_area),
        None,
        &series.national,
    );
    if let (Some(name), Some(points)) = (&series.area_name, &series.area) {
        output::preview_table(name, None, points);
    }
    if let (Some(region), Some(points)) = (&series.region_name, &series.region) {
        output::preview_table(&format!("{} (region)", region), None, points);
    }
    Ok(())
}

fn handle_list(cli: &Cli, title: &str, values: Vec<String>) -> Result<()> {
    if cli.json {
        return output::print_json(&values);
    }
    output::print_list(title, &values);
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::from(&cli.data);
    let store = OutcomeStore::load(&config)?;

    match &cli.command {
        Command::Measures => handle_list(cli, "Measure groups", store.list_measure_groups()),
        Command::Regions => handle_list(cli, "Regions", store.list_regions()),
        Command::Disaggregations { measure } => handle_list(
            cli,
            "Disaggregation levels",
            store.list_disaggregations(measure.as_deref()),
        ),
        Command::Pareto {
            measure,
            regions,
            disaggregation,
        } => handle_pareto(
            &store,
            cli,
            measure.as_deref(),
            regions,
            disaggregation.as_deref(),
        ),
        Command::Area { name } => handle_area(&store, cli, name.as_deref()),
        Command::Trend { measure, area } => {
            handle_trend(&store, cli, measure.as_deref(), area.as_deref())
        }
    }
}

fn main() -> ExitCode {
    // Logs go to stderr so `--json` output stays clean on stdout.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
