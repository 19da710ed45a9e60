pub mod filters;
pub mod mapping;
pub mod pacing;

use chrono::{DateTime, Utc};
use database::PostRepository;
use harvester::{timeout_budget, Harvester, RawRow, SearchQuery};
use sentimind_core::{CanonicalPost, CoreError, ErrorExt, HarvestError, ScrapeRequest};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub use pacing::{Pacer, RecordingPacer, TokioPacer};

use filters::{dedup_against, dedup_by_id_link, drop_replies, within_date_range, DedupKey};
use mapping::to_canonical;

pub const PREVIEW_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    BatchLoop,
    Finalizing,
    Completed,
    Aborted,
}

/// Counters describing what a scrape run did, plus a preview of new posts.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    pub run_id: Uuid,
    pub keyword: String,
    pub state: RunState,
    pub batches_attempted: usize,
    pub batches_discarded: usize,
    pub rows_harvested: usize,
    pub batch_duplicates_removed: usize,
    pub batch_replies_removed: usize,
    pub out_of_range_removed: usize,
    pub missing_id_skipped: usize,
    pub already_present: usize,
    pub persisted: usize,
    pub preview: Vec<CanonicalPost>,
}

impl ScrapeReport {
    fn new(run_id: Uuid, keyword: &str) -> Self {
        Self {
            run_id,
            keyword: keyword.to_string(),
            state: RunState::Pending,
            batches_attempted: 0,
            batches_discarded: 0,
            rows_harvested: 0,
            batch_duplicates_removed: 0,
            batch_replies_removed: 0,
            out_of_range_removed: 0,
            missing_id_skipped: 0,
            already_present: 0,
            persisted: 0,
            preview: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum ScrapeOutcome {
    Completed(ScrapeReport),
    Aborted {
        error: CoreError,
        report: ScrapeReport,
    },
}

impl ScrapeOutcome {
    pub fn report(&self) -> &ScrapeReport {
        match self {
            ScrapeOutcome::Completed(report) => report,
            ScrapeOutcome::Aborted { report, .. } => report,
        }
    }

    pub fn error(&self) -> Option<&CoreError> {
        match self {
            ScrapeOutcome::Completed(_) => None,
            ScrapeOutcome::Aborted { error, .. } => Some(error),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ScrapeOutcome::Completed(_))
    }
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Drives batched harvesting for one keyword and persists the surviving posts.
pub struct ScrapeOrchestrator<H, R, P = TokioPacer> {
    harvester: H,
    repository: Arc<R>,
    pacer: P,
    cancel: CancellationToken,
    clock: Clock,
}

impl<H: Harvester, R: PostRepository> ScrapeOrchestrator<H, R, TokioPacer> {
    pub fn new(harvester: H, repository: Arc<R>) -> Self {
        Self::with_pacer(harvester, repository, TokioPacer)
    }
}

impl<H: Harvester, R: PostRepository, P: Pacer> ScrapeOrchestrator<H, R, P> {
    pub fn with_pacer(harvester: H, repository: Arc<R>, pacer: P) -> Self {
        Self {
            harvester,
            repository,
            pacer,
            cancel: CancellationToken::new(),
            clock: Box::new(Utc::now),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn harvester(&self) -> &H {
        &self.harvester
    }

    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, request: &ScrapeRequest) -> ScrapeOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("scrape", %run_id, keyword = request.keyword());
        self.run_inner(run_id, request).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, request: &ScrapeRequest) -> ScrapeOutcome {
        let mut report = ScrapeReport::new(run_id, request.keyword());
        info!(
            "Starting scrape: target {} posts in batches of {} ({:?})",
            request.target_count(),
            request.batch_size(),
            request
        );

        report.state = RunState::BatchLoop;
        let accumulated = match self.batch_loop(request, &mut report).await {
            Ok(rows) => rows,
            Err(error) => return abort(error, report),
        };

        if self.cancel.is_cancelled() {
            return abort(cancelled(), report);
        }

        report.state = RunState::Finalizing;
        let rows = self.finalize_rows(request, accumulated, &mut report);
        if let Err(error) = self.persist(request, rows, &mut report).await {
            return abort(error, report);
        }

        report.state = RunState::Completed;
        info!(
            "Scrape completed: {} new posts, {} already stored, {} batches",
            report.persisted, report.already_present, report.batches_attempted
        );
        ScrapeOutcome::Completed(report)
    }

    async fn batch_loop(
        &self,
        request: &ScrapeRequest,
        report: &mut ScrapeReport,
    ) -> Result<Vec<RawRow>, CoreError> {
        let query = SearchQuery::from_request(request);
        let max_batches = request.max_batches();
        let mut seen: HashSet<DedupKey> = HashSet::new();
        let mut accumulated: Vec<RawRow> = Vec::new();

        for batch_index in 0..max_batches {
            if self.cancel.is_cancelled() {
                return Err(cancelled());
            }
            let remaining = request.target_count().saturating_sub(accumulated.len());
            if remaining == 0 {
                break;
            }

            let limit = request.batch_size().min(remaining);
            let timeout = timeout_budget(limit);
            report.batches_attempted += 1;
            debug!("Batch {}/{}: requesting {} rows", batch_index + 1, max_batches, limit);

            match self
                .harvester
                .fetch(&query, limit, request.auth_token(), timeout)
                .await
            {
                Ok(batch) => match batch.validate_columns() {
                    Ok(()) => {
                        report.rows_harvested += batch.len();
                        let (rows, duplicates) = dedup_against(batch.rows, &mut seen);
                        let (rows, replies) = drop_replies(rows);
                        report.batch_duplicates_removed += duplicates;
                        report.batch_replies_removed += replies;
                        info!(
                            "Batch {}: {} new rows ({} duplicates, {} replies dropped)",
                            batch_index + 1,
                            rows.len(),
                            duplicates,
                            replies
                        );
                        accumulated.extend(rows);
                    }
                    Err(e) => {
                        warn!("Discarding batch {}: {}", batch_index + 1, e);
                        report.batches_discarded += 1;
                    }
                },
                Err(CoreError::Harvest(HarvestError::NoData)) => {
                    info!("Harvester has no more data after {} batches", batch_index);
                    break;
                }
                Err(CoreError::DataParse(e)) => {
                    e.log_warn();
                    report.batches_discarded += 1;
                }
                Err(e) => return Err(e),
            }

            let more_batches = batch_index + 1 < max_batches;
            if accumulated.len() < request.target_count() && more_batches {
                let delay = request.inter_batch_delay();
                debug!("Pausing {:?} before the next batch", delay);
                tokio::select! {
                    _ = self.pacer.pause(delay) => {}
                    _ = self.cancel.cancelled() => return Err(cancelled()),
                }
            }
        }

        Ok(accumulated)
    }

    fn finalize_rows(
        &self,
        request: &ScrapeRequest,
        accumulated: Vec<RawRow>,
        report: &mut ScrapeReport,
    ) -> Vec<RawRow> {
        // Batches are already deduplicated against `seen`; this pass only guards the accumulator
        let (rows, duplicates) = dedup_by_id_link(accumulated);
        let (rows, replies) = drop_replies(rows);
        if duplicates + replies > 0 {
            warn!(
                "Final pass removed {} duplicates and {} replies missed per batch",
                duplicates, replies
            );
        }

        if request.has_date_range() {
            let (rows, out_of_range) = within_date_range(rows, request.since(), request.until());
            report.out_of_range_removed = out_of_range;
            if out_of_range > 0 {
                info!("{} posts fell outside the requested date range", out_of_range);
            }
            rows
        } else {
            rows
        }
    }

    async fn persist(
        &self,
        request: &ScrapeRequest,
        rows: Vec<RawRow>,
        report: &mut ScrapeReport,
    ) -> Result<(), CoreError> {
        let scraped_at = (self.clock)();
        let mut queued: HashSet<String> = HashSet::new();
        let mut candidates: Vec<CanonicalPost> = Vec::with_capacity(rows.len());

        for row in &rows {
            match to_canonical(row, request.keyword(), scraped_at) {
                Some(post) => {
                    if queued.insert(post.id.clone()) {
                        candidates.push(post);
                    } else {
                        debug!("Post {} appears twice with different links, keeping the first", post.id);
                    }
                }
                None => report.missing_id_skipped += 1,
            }
        }

        let ids: Vec<String> = candidates.iter().map(|post| post.id.clone()).collect();
        let existing = self.repository.existing_ids(&ids).await?;
        report.already_present = existing.len();

        let new_posts: Vec<CanonicalPost> = candidates
            .into_iter()
            .filter(|post| !existing.contains(&post.id))
            .collect();

        if new_posts.is_empty() {
            info!("No new posts to store");
            return Ok(());
        }

        report.persisted = self.repository.insert_posts(&new_posts).await?;
        report.preview = new_posts.into_iter().take(PREVIEW_LIMIT).collect();
        Ok(())
    }
}

fn cancelled() -> CoreError {
    CoreError::Cancelled {
        operation: "Scrape run".to_string(),
    }
}

fn abort(error: CoreError, mut report: ScrapeReport) -> ScrapeOutcome {
    report.state = RunState::Aborted;
    warn!(
        "Scrape aborted [{}]: {}",
        error.error_code(),
        error.user_friendly_message()
    );
    ScrapeOutcome::Aborted { error, report }
}
