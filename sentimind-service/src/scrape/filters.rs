use super::mapping::parse_created_at;
use chrono::NaiveDate;
use harvester::RawRow;
use std::collections::HashSet;

/// Identity of a row for deduplication: trimmed id plus permalink.
pub type DedupKey = (Option<String>, Option<String>);

pub fn dedup_key(row: &RawRow) -> DedupKey {
    (
        row.id().map(str::to_string),
        row.tweet_url
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
            .map(str::to_string),
    )
}

/// Keep the first row for each key not already in `seen`; returns survivors and the number removed.
pub fn dedup_against(rows: Vec<RawRow>, seen: &mut HashSet<DedupKey>) -> (Vec<RawRow>, usize) {
    let before = rows.len();
    let kept: Vec<RawRow> = rows
        .into_iter()
        .filter(|row| seen.insert(dedup_key(row)))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

pub fn dedup_by_id_link(rows: Vec<RawRow>) -> (Vec<RawRow>, usize) {
    dedup_against(rows, &mut HashSet::new())
}

pub fn drop_replies(rows: Vec<RawRow>) -> (Vec<RawRow>, usize) {
    let before = rows.len();
    let kept: Vec<RawRow> = rows.into_iter().filter(|row| !row.is_reply()).collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Keep rows whose UTC creation date lies in `[since, until]`; unparseable dates are dropped.
pub fn within_date_range(
    rows: Vec<RawRow>,
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
) -> (Vec<RawRow>, usize) {
    let before = rows.len();
    let kept: Vec<RawRow> = rows
        .into_iter()
        .filter(|row| {
            let Some(created) = row.created_at.as_deref().and_then(parse_created_at) else {
                return false;
            };
            let date = created.date_naive();
            since.map_or(true, |since| date >= since) && until.map_or(true, |until| date <= until)
        })
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}
