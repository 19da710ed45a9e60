use sentimind_core::DataParseError;
use serde::Deserialize;
use std::io::Read;
use tracing::{debug, warn};

pub const ID_COLUMN: &str = "id_str";

/// Columns every harvested batch is expected to carry.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    ID_COLUMN,
    "tweet_url",
    "full_text",
    "created_at",
    "username",
    "in_reply_to_screen_name",
];

/// One post exactly as the harvesting tool wrote it. Empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawRow {
    pub id_str: Option<String>,
    pub tweet_url: Option<String>,
    pub full_text: Option<String>,
    pub created_at: Option<String>,
    pub username: Option<String>,
    pub in_reply_to_screen_name: Option<String>,
    pub favorite_count: Option<String>,
    pub retweet_count: Option<String>,
    pub reply_count: Option<String>,
    pub quote_count: Option<String>,
    pub user_id_str: Option<String>,
    pub conversation_id_str: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub lang: Option<String>,
    pub quote_url: Option<String>,
    pub cashtags: Option<String>,
}

impl RawRow {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            tweet_url: Some(format!("https://x.com/i/web/status/{}", id)),
            id_str: Some(id),
            full_text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_reply_to(mut self, screen_name: impl Into<String>) -> Self {
        self.in_reply_to_screen_name = Some(screen_name.into());
        self
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.tweet_url = Some(link.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// The post id with surrounding whitespace removed, if present.
    pub fn id(&self) -> Option<&str> {
        self.id_str
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn is_reply(&self) -> bool {
        self.in_reply_to_screen_name
            .as_deref()
            .map(|name| !name.trim().is_empty())
            .unwrap_or(false)
    }
}

/// The rows of one batch plus the header it was read with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRowSet {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawRowSet {
    pub fn from_rows(rows: Vec<RawRow>) -> Self {
        Self {
            columns: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn missing_columns(&self) -> Vec<&'static str> {
        REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|required| !self.columns.iter().any(|c| c == required))
            .collect()
    }

    /// Missing id column fails the batch; other missing columns only warn.
    pub fn validate_columns(&self) -> Result<(), DataParseError> {
        let missing = self.missing_columns();
        if missing.contains(&ID_COLUMN) {
            return Err(DataParseError::MissingColumn {
                column: ID_COLUMN.to_string(),
            });
        }
        if !missing.is_empty() {
            warn!("Batch is missing columns {:?}, continuing without them", missing);
        }
        Ok(())
    }
}

/// Parse the tool's CSV output. Records that fail to decode are skipped.
pub fn parse_rows<R: Read>(reader: R) -> Result<RawRowSet, DataParseError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let columns: Vec<String> = csv_reader
        .headers()
        .map_err(|e| DataParseError::Malformed {
            details: format!("unreadable header: {}", e),
        })?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    if !columns.iter().any(|c| c == ID_COLUMN) {
        return Err(DataParseError::MissingColumn {
            column: ID_COLUMN.to_string(),
        });
    }
    csv_reader.set_headers(csv::StringRecord::from(columns.clone()));

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (index, record) in csv_reader.deserialize::<RawRow>().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                warn!("Skipping undecodable record {}: {}", index + 1, e);
            }
        }
    }

    debug!("Parsed {} rows ({} skipped)", rows.len(), skipped);
    Ok(RawRowSet { columns, rows })
}
