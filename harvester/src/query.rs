use chrono::NaiveDate;
use sentimind_core::{ScrapeRequest, DATE_FORMAT};
use std::fmt;
use std::time::Duration;

const SECONDS_PER_ROW: u64 = 5;
const MIN_TIMEOUT_SECS: u64 = 30;
const MAX_TIMEOUT_SECS: u64 = 300;

/// Search expression handed to the harvesting tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: String,
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            since: None,
            until: None,
        }
    }

    pub fn with_range(mut self, since: Option<NaiveDate>, until: Option<NaiveDate>) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    pub fn from_request(request: &ScrapeRequest) -> Self {
        Self::new(request.keyword()).with_range(request.since(), request.until())
    }

    pub fn expression(&self) -> String {
        let mut expression = format!("{} -is:reply", self.keyword);
        if let Some(since) = self.since {
            expression.push_str(&format!(" since:{}", since.format(DATE_FORMAT)));
        }
        if let Some(until) = self.until {
            expression.push_str(&format!(" until:{}", until.format(DATE_FORMAT)));
        }
        expression
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression())
    }
}

/// Wall-clock allowance for one harvester call fetching `limit` rows.
pub fn timeout_budget(limit: usize) -> Duration {
    let seconds = (limit as u64)
        .saturating_mul(SECONDS_PER_ROW)
        .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
    Duration::from_secs(seconds)
}
