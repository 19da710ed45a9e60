use chrono::Utc;
use database::PostRepository;
use futures::stream::{self, StreamExt};
use sentiment_engine::{Classifier, LinearPipelineClassifier, SentimentPipeline};
use sentimind_core::{CoreError, SentimentLabel, SentimentResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub limit: usize,
    /// Restrict selection to these posts; `limit` is ignored when set.
    pub post_ids: Option<Vec<String>>,
}

impl AnalysisRequest {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            post_ids: None,
        }
    }

    pub fn for_posts(post_ids: Vec<String>) -> Self {
        Self {
            limit: post_ids.len(),
            post_ids: Some(post_ids),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    pub selected: usize,
    pub analyzed: usize,
    /// Posts that got a sentinel label instead of a sentiment class.
    pub unpredictable: usize,
    /// Prediction errors share one bucket regardless of their detail.
    pub label_counts: BTreeMap<String, usize>,
}

const PREDICTION_ERROR_BUCKET: &str = "Prediction error";

fn count_key(label: &SentimentLabel) -> String {
    match label {
        SentimentLabel::PredictionError(_) => PREDICTION_ERROR_BUCKET.to_string(),
        other => other.to_string(),
    }
}

/// Classifies stored posts that have no sentiment result yet.
pub struct AnalysisRunner<R, C = LinearPipelineClassifier> {
    repository: Arc<R>,
    pipeline: Arc<SentimentPipeline<C>>,
    workers: usize,
}

impl<R, C> AnalysisRunner<R, C>
where
    R: PostRepository,
    C: Classifier + 'static,
{
    pub fn new(repository: Arc<R>, pipeline: Arc<SentimentPipeline<C>>, workers: usize) -> Self {
        Self {
            repository,
            pipeline,
            workers: workers.max(1),
        }
    }

    pub async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisReport, CoreError> {
        let posts = self
            .repository
            .unanalyzed_posts(request.limit, request.post_ids.as_deref())
            .await?;

        let mut report = AnalysisReport {
            selected: posts.len(),
            ..AnalysisReport::default()
        };
        if posts.is_empty() {
            info!("No unanalyzed posts found");
            return Ok(report);
        }
        info!("Analyzing {} posts with {} workers", posts.len(), self.workers);

        let results: Vec<SentimentResult> = stream::iter(posts)
            .map(|post| {
                let pipeline = Arc::clone(&self.pipeline);
                async move {
                    let post_id = post.id;
                    let text = post.text;
                    let label = match tokio::task::spawn_blocking(move || pipeline.predict(&text)).await {
                        Ok(label) => label,
                        Err(e) => {
                            error!("Prediction worker for post {} failed: {}", post_id, e);
                            SentimentLabel::PredictionError(e.to_string())
                        }
                    };
                    debug!("Post {} classified as {}", post_id, label);
                    SentimentResult {
                        post_id,
                        label,
                        analyzed_at: Utc::now(),
                    }
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        for result in &results {
            *report.label_counts.entry(count_key(&result.label)).or_insert(0) += 1;
            if result.label.is_sentinel() {
                report.unpredictable += 1;
            }
        }

        report.analyzed = self.repository.insert_sentiment_results(&results).await?;
        info!(
            "Stored {} sentiment results ({} selected)",
            report.analyzed, report.selected
        );
        Ok(report)
    }
}
