use crate::query::SearchQuery;
use crate::rows::{RawRow, RawRowSet};
use crate::Harvester;
use sentimind_core::{CoreError, DataParseError, HarvestError};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockResponse {
    Rows(RawRowSet),
    Harvest(HarvestError),
    Parse(DataParseError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub expression: String,
    pub limit: usize,
    pub timeout: Duration,
}

/// Replays canned batches in order, then reports `NoData`.
#[derive(Debug, Default)]
pub struct MockHarvester {
    responses: Mutex<VecDeque<MockResponse>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockHarvester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch(self, rows: Vec<RawRow>) -> Self {
        self.push(MockResponse::Rows(RawRowSet::from_rows(rows)))
    }

    pub fn with_row_set(self, rows: RawRowSet) -> Self {
        self.push(MockResponse::Rows(rows))
    }

    pub fn with_error(self, error: HarvestError) -> Self {
        self.push(MockResponse::Harvest(error))
    }

    pub fn with_parse_error(self, error: DataParseError) -> Self {
        self.push(MockResponse::Parse(error))
    }

    fn push(self, response: MockResponse) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(response);
        }
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl Harvester for MockHarvester {
    async fn fetch(
        &self,
        query: &SearchQuery,
        limit: usize,
        _auth_token: &str,
        timeout: Duration,
    ) -> Result<RawRowSet, CoreError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockCall {
                expression: query.expression(),
                limit,
                timeout,
            });
        }

        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front());

        match next {
            Some(MockResponse::Rows(rows)) => Ok(rows),
            Some(MockResponse::Harvest(error)) => Err(error.into()),
            Some(MockResponse::Parse(error)) => Err(error.into()),
            None => Err(HarvestError::NoData.into()),
        }
    }
}
