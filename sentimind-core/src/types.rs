use crate::error::ConfigError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date supplied by a user for `field`.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| ConfigError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// A validated, immutable request to harvest posts for one keyword.
#[derive(Clone)]
pub struct ScrapeRequest {
    keyword: String,
    target_count: usize,
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
    batch_size: usize,
    inter_batch_delay: Duration,
    auth_token: String,
}

impl ScrapeRequest {
    pub fn builder(keyword: impl Into<String>, auth_token: impl Into<String>) -> ScrapeRequestBuilder {
        ScrapeRequestBuilder {
            keyword: keyword.into(),
            auth_token: auth_token.into(),
            target_count: 500,
            since: None,
            until: None,
            batch_size: 100,
            inter_batch_delay: Duration::from_secs(60),
        }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn since(&self) -> Option<NaiveDate> {
        self.since
    }

    pub fn until(&self) -> Option<NaiveDate> {
        self.until
    }

    pub fn has_date_range(&self) -> bool {
        self.since.is_some() || self.until.is_some()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn inter_batch_delay(&self) -> Duration {
        self.inter_batch_delay
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Upper bound on batch invocations for this request.
    pub fn max_batches(&self) -> usize {
        self.target_count.div_ceil(self.batch_size)
    }
}

impl fmt::Debug for ScrapeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrapeRequest")
            .field("keyword", &self.keyword)
            .field("target_count", &self.target_count)
            .field("since", &self.since)
            .field("until", &self.until)
            .field("batch_size", &self.batch_size)
            .field("inter_batch_delay", &self.inter_batch_delay)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct ScrapeRequestBuilder {
    keyword: String,
    auth_token: String,
    target_count: usize,
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
    batch_size: usize,
    inter_batch_delay: Duration,
}

impl ScrapeRequestBuilder {
    pub fn target_count(mut self, count: usize) -> Self {
        self.target_count = count;
        self
    }

    pub fn since(mut self, since: Option<NaiveDate>) -> Self {
        self.since = since;
        self
    }

    pub fn until(mut self, until: Option<NaiveDate>) -> Self {
        self.until = until;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay = delay;
        self
    }

    pub fn build(self) -> Result<ScrapeRequest, ConfigError> {
        let keyword = self.keyword.trim().to_string();
        if keyword.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "keyword".to_string(),
                value: self.keyword,
            });
        }
        if self.auth_token.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                name: "harvester auth token".to_string(),
            });
        }
        if self.target_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "target_count".to_string(),
                value: "0".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size".to_string(),
                value: "0".to_string(),
            });
        }
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since > until {
                return Err(ConfigError::InvalidDateRange {
                    since: since.format(DATE_FORMAT).to_string(),
                    until: until.format(DATE_FORMAT).to_string(),
                });
            }
        }

        Ok(ScrapeRequest {
            keyword,
            target_count: self.target_count,
            since: self.since,
            until: self.until,
            batch_size: self.batch_size,
            inter_batch_delay: self.inter_batch_delay,
            auth_token: self.auth_token,
        })
    }
}

/// A deduplicated post as stored by the repository. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalPost {
    pub id: String,
    pub conversation_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub timezone: Option<String>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub place: Option<String>,
    pub text: String,
    pub mentions: Vec<String>,
    pub hashtags: Vec<String>,
    pub cashtags: Option<String>,
    pub photos: Option<String>,
    pub link: Option<String>,
    pub quote_url: Option<String>,
    pub replies_count: i64,
    pub retweets_count: i64,
    pub likes_count: i64,
    pub quote_count: i64,
    pub retweet: bool,
    pub video: bool,
    pub lang: Option<String>,
    pub in_reply_to_screen_name: Option<String>,
    pub keyword_used: String,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
    EmptyText,
    EmptyAfterPreprocessing,
    PredictionError(String),
}

impl SentimentLabel {
    pub const EMPTY_TEXT: &'static str = "Unpredictable (empty text)";
    pub const EMPTY_AFTER_PREPROCESSING: &'static str = "Unpredictable (empty after preprocessing)";
    pub const PREDICTION_ERROR_PREFIX: &'static str = "Prediction error: ";

    /// Maps a trained class name, in English or Indonesian, onto a label.
    pub fn from_class_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "positive" | "positif" => Some(SentimentLabel::Positive),
            "neutral" | "netral" => Some(SentimentLabel::Neutral),
            "negative" | "negatif" => Some(SentimentLabel::Negative),
            _ => None,
        }
    }

    /// Inverse of `Display`, used when reading stored results.
    pub fn from_stored(value: &str) -> Self {
        match value {
            "Positive" => SentimentLabel::Positive,
            "Neutral" => SentimentLabel::Neutral,
            "Negative" => SentimentLabel::Negative,
            Self::EMPTY_TEXT => SentimentLabel::EmptyText,
            Self::EMPTY_AFTER_PREPROCESSING => SentimentLabel::EmptyAfterPreprocessing,
            other => match other.strip_prefix(Self::PREDICTION_ERROR_PREFIX) {
                Some(detail) => SentimentLabel::PredictionError(detail.to_string()),
                None => SentimentLabel::PredictionError(format!("unrecognized label '{}'", other)),
            },
        }
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(
            self,
            SentimentLabel::Positive | SentimentLabel::Neutral | SentimentLabel::Negative
        )
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentLabel::Positive => f.write_str("Positive"),
            SentimentLabel::Neutral => f.write_str("Neutral"),
            SentimentLabel::Negative => f.write_str("Negative"),
            SentimentLabel::EmptyText => f.write_str(Self::EMPTY_TEXT),
            SentimentLabel::EmptyAfterPreprocessing => f.write_str(Self::EMPTY_AFTER_PREPROCESSING),
            SentimentLabel::PredictionError(detail) => {
                write!(f, "{}{}", Self::PREDICTION_ERROR_PREFIX, detail)
            }
        }
    }
}

impl Serialize for SentimentLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentResult {
    pub post_id: String,
    pub label: SentimentLabel,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostWithSentiment {
    pub post: CanonicalPost,
    pub sentiment: Option<SentimentResult>,
}
