use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sentimind_core::{CanonicalPost, PostWithSentiment, SentimentLabel, SentimentResult};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Post columns, qualified with the `p` alias used by every query.
pub(crate) const POST_COLUMNS: &str = "p.id, p.conversation_id, p.created_at, p.date, p.time, \
     p.timezone, p.user_id, p.username, p.place, p.text, p.mentions, p.hashtags, p.cashtags, \
     p.photos, p.link, p.quote_url, p.replies_count, p.retweets_count, p.likes_count, \
     p.quote_count, p.retweet, p.video, p.lang, p.in_reply_to_screen_name, p.keyword_used, \
     p.scraped_at";

/// Comma-joined list, or NULL when there is nothing to store.
pub(crate) fn join_list(items: &[String]) -> Option<String> {
    if items.is_empty() {
        None
    } else {
        Some(items.join(","))
    }
}

pub(crate) fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|joined| {
            joined
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn post_from_row(row: &SqliteRow) -> Result<CanonicalPost, sqlx::Error> {
    Ok(CanonicalPost {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        created_at: row.try_get::<Option<DateTime<Utc>>, _>("created_at")?,
        date: row.try_get::<Option<NaiveDate>, _>("date")?,
        time: row.try_get::<Option<NaiveTime>, _>("time")?,
        timezone: row.try_get("timezone")?,
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        place: row.try_get("place")?,
        text: row.try_get("text")?,
        mentions: split_list(row.try_get("mentions")?),
        hashtags: split_list(row.try_get("hashtags")?),
        cashtags: row.try_get("cashtags")?,
        photos: row.try_get("photos")?,
        link: row.try_get("link")?,
        quote_url: row.try_get("quote_url")?,
        replies_count: row.try_get("replies_count")?,
        retweets_count: row.try_get("retweets_count")?,
        likes_count: row.try_get("likes_count")?,
        quote_count: row.try_get("quote_count")?,
        retweet: row.try_get("retweet")?,
        video: row.try_get("video")?,
        lang: row.try_get("lang")?,
        in_reply_to_screen_name: row.try_get("in_reply_to_screen_name")?,
        keyword_used: row.try_get("keyword_used")?,
        scraped_at: row.try_get::<DateTime<Utc>, _>("scraped_at")?,
    })
}

/// Reads a post joined with the optional `sentiment` / `sentiment_analyzed_at` columns.
pub(crate) fn post_with_sentiment_from_row(
    row: &SqliteRow,
) -> Result<PostWithSentiment, sqlx::Error> {
    let post = post_from_row(row)?;
    let label: Option<String> = row.try_get("sentiment")?;
    let analyzed_at: Option<DateTime<Utc>> = row.try_get("sentiment_analyzed_at")?;

    let sentiment = match (label, analyzed_at) {
        (Some(label), Some(analyzed_at)) => Some(SentimentResult {
            post_id: post.id.clone(),
            label: SentimentLabel::from_stored(&label),
            analyzed_at,
        }),
        _ => None,
    };
    Ok(PostWithSentiment { post, sentiment })
}
