//! Outcome aggregation and percentile ranking for council social-care
//! measures.
//!
//! Raw measure rows are joined to area and direction references, duplicate
//! observations are averaged, and every council observation is ranked
//! against its national and regional peers. [`OutcomeStore`] is the
//! immutable snapshot that answers the dashboard queries.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod join;
pub mod loader;
pub mod output;
pub mod percentile;
pub mod store;
pub mod trend;
pub mod types;
pub mod util;

pub use aggregate::GroupingPolicy;
pub use config::Config;
pub use error::{OutcomeError, QueryError, Result};
pub use store::{OutcomeStore, StoreSettings};
pub use types::{AreaOutcome, Direction, ParetoRow, TrendSeries, YearlyPoint};
