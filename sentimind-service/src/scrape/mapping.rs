use chrono::{DateTime, NaiveDateTime, Utc};
use harvester::RawRow;
use once_cell::sync::Lazy;
use regex::Regex;
use sentimind_core::CanonicalPost;
use tracing::warn;

static HASHTAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#(\w+)").expect("valid hashtag pattern"));
static MENTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(\w+)").expect("valid mention pattern"));

const ISO_MILLIS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";
const TWITTER_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Parse a harvested creation timestamp into UTC.
///
/// Accepts RFC 3339 / ISO-8601 (`2024-03-01T10:00:00.000Z`) and the legacy
/// `Fri Mar 01 10:00:00 +0000 2024` form.
pub fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, ISO_MILLIS_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_str(raw, TWITTER_FORMAT)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Lenient engagement counter: blank is 0, `12.0` is 12, garbage is 0 with a warning.
pub fn parse_counter(post_id: &str, field: &str, raw: Option<&str>) -> i64 {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return 0;
    };
    let digits = raw.replace(',', "");
    if let Ok(value) = digits.parse::<i64>() {
        return value;
    }
    match digits.parse::<f64>() {
        Ok(value) if value.is_finite() => value as i64,
        _ => {
            warn!("Post {}: unparseable {} '{}', using 0", post_id, field, raw);
            0
        }
    }
}

pub fn extract_hashtags(text: &str) -> Vec<String> {
    HASHTAG_PATTERN
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

pub fn extract_mentions(text: &str) -> Vec<String> {
    MENTION_PATTERN
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Build the stored form of a harvested row. Rows without an id yield `None`.
pub fn to_canonical(row: &RawRow, keyword: &str, scraped_at: DateTime<Utc>) -> Option<CanonicalPost> {
    let id = row.id()?.to_string();
    let text = row.full_text.clone().unwrap_or_default();

    let created_at = row.created_at.as_deref().and_then(parse_created_at);
    if created_at.is_none() && row.created_at.is_some() {
        warn!("Post {}: unparseable created_at {:?}", id, row.created_at);
    }

    Some(CanonicalPost {
        conversation_id: non_empty(&row.conversation_id_str),
        created_at,
        date: created_at.map(|ts| ts.date_naive()),
        time: created_at.map(|ts| ts.time()),
        timezone: created_at.map(|_| "UTC".to_string()),
        user_id: non_empty(&row.user_id_str),
        username: non_empty(&row.username),
        place: non_empty(&row.location),
        mentions: extract_mentions(&text),
        hashtags: extract_hashtags(&text),
        cashtags: non_empty(&row.cashtags),
        photos: non_empty(&row.image_url),
        link: non_empty(&row.tweet_url),
        quote_url: non_empty(&row.quote_url),
        replies_count: parse_counter(&id, "reply_count", row.reply_count.as_deref()),
        retweets_count: parse_counter(&id, "retweet_count", row.retweet_count.as_deref()),
        likes_count: parse_counter(&id, "favorite_count", row.favorite_count.as_deref()),
        quote_count: parse_counter(&id, "quote_count", row.quote_count.as_deref()),
        retweet: false,
        video: false,
        lang: non_empty(&row.lang),
        in_reply_to_screen_name: non_empty(&row.in_reply_to_screen_name),
        keyword_used: keyword.to_string(),
        scraped_at,
        text,
        id,
    })
}
