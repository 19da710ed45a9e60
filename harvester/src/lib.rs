use sentimind_core::CoreError;
use std::time::Duration;

pub mod cli;
pub mod mock;
pub mod query;
pub mod rows;

#[cfg(test)]
mod tests;

pub use cli::TweetHarvestCli;
pub use mock::{MockCall, MockHarvester, MockResponse};
pub use query::{timeout_budget, SearchQuery};
pub use rows::{parse_rows, RawRow, RawRowSet, REQUIRED_COLUMNS};

/// One bounded invocation of an external search tool.
///
/// Failures are reported as `CoreError::Harvest` (timeout, rejected
/// credential, tool failure, no data) or `CoreError::DataParse` when the
/// tool's output cannot be read.
#[allow(async_fn_in_trait)]
pub trait Harvester {
    async fn fetch(
        &self,
        query: &SearchQuery,
        limit: usize,
        auth_token: &str,
        timeout: Duration,
    ) -> Result<RawRowSet, CoreError>;
}
