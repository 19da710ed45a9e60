#[cfg(test)]
mod tests {
    use crate::{
        AnalysisRequest, AnalysisRunner, Pacer, RecordingPacer, RunState, ScrapeOrchestrator,
        PREVIEW_LIMIT,
    };
    use chrono::{NaiveDate, TimeZone, Utc};
    use database::{Database, PostRepository};
    use harvester::{timeout_budget, MockHarvester, RawRow, RawRowSet, REQUIRED_COLUMNS};
    use sentiment_engine::{Classifier, ClassifierSpec, Lexicon, ModelArtifacts, SentimentPipeline, WordVectors};
    use sentimind_core::{
        CanonicalPost, ClassificationError, CoreError, DataParseError, DatabaseError, HarvestError,
        PostWithSentiment, ScrapeRequest, SentimentLabel, SentimentResult,
    };
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const TOKEN: &str = "test-bearer-token";

    async fn setup_db() -> Arc<Database> {
        Arc::new(
            Database::in_memory()
                .await
                .expect("Failed to open in-memory database"),
        )
    }

    fn rows(ids: std::ops::Range<usize>) -> Vec<RawRow> {
        ids.map(|i| {
            RawRow::new(i.to_string(), format!("tweet nomor {}", i))
                .with_created_at("2024-03-01T10:00:00.000Z")
                .with_username("ani")
        })
        .collect()
    }

    fn request(keyword: &str, count: usize, batch: usize) -> ScrapeRequest {
        ScrapeRequest::builder(keyword, TOKEN)
            .target_count(count)
            .batch_size(batch)
            .inter_batch_delay(Duration::from_secs(60))
            .build()
            .expect("valid request")
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_single_batch_persists_all_rows() {
        let db = setup_db().await;
        let harvester = MockHarvester::new().with_batch(rows(0..50));
        let orchestrator =
            ScrapeOrchestrator::with_pacer(harvester, Arc::clone(&db), RecordingPacer::new());

        let outcome = orchestrator.run(&request("test", 50, 50)).await;

        assert!(outcome.is_completed(), "unexpected outcome: {:?}", outcome.error());
        let report = outcome.report();
        assert_eq!(report.state, RunState::Completed);
        assert_eq!(report.batches_attempted, 1);
        assert_eq!(report.persisted, 50);
        assert_eq!(report.preview.len(), PREVIEW_LIMIT);
        assert_eq!(db.count_posts().await.unwrap(), 50);

        let calls = orchestrator.harvester().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].expression, "test -is:reply");
        assert_eq!(calls[0].limit, 50);
        assert_eq!(calls[0].timeout, timeout_budget(50));
        assert!(orchestrator.pacer().pauses().is_empty());

        let stored = db.get_post("7").await.unwrap().unwrap();
        assert_eq!(stored.keyword_used, "test");
        assert_eq!(stored.username.as_deref(), Some("ani"));
    }

    #[tokio::test]
    async fn test_replies_are_never_persisted() {
        let db = setup_db().await;
        let batch: Vec<RawRow> = rows(0..50)
            .into_iter()
            .enumerate()
            .map(|(i, row)| if i % 5 == 0 { row.with_reply_to("budi") } else { row })
            .collect();
        let harvester = MockHarvester::new().with_batch(batch);
        let orchestrator =
            ScrapeOrchestrator::with_pacer(harvester, Arc::clone(&db), RecordingPacer::new());

        let outcome = orchestrator.run(&request("test", 50, 50)).await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.report().batch_replies_removed, 10);
        assert_eq!(outcome.report().persisted, 40);
        assert_eq!(db.count_posts().await.unwrap(), 40);
        assert!(!db.post_exists("5").await.unwrap());
        assert!(db.post_exists("6").await.unwrap());
    }

    #[tokio::test]
    async fn test_timeout_aborts_without_persisting() {
        let db = setup_db().await;
        let harvester = MockHarvester::new().with_error(HarvestError::Timeout { seconds: 250 });
        let orchestrator =
            ScrapeOrchestrator::with_pacer(harvester, Arc::clone(&db), RecordingPacer::new());

        let outcome = orchestrator.run(&request("test", 50, 50)).await;

        assert!(!outcome.is_completed());
        assert_eq!(outcome.report().state, RunState::Aborted);
        assert!(matches!(
            outcome.error(),
            Some(CoreError::Harvest(HarvestError::Timeout { seconds: 250 }))
        ));
        assert_eq!(outcome.report().persisted, 0);
        assert_eq!(db.count_posts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_aborts() {
        let db = setup_db().await;
        let harvester = MockHarvester::new().with_error(HarvestError::AuthInvalid {
            details: "Could not authenticate you".to_string(),
        });
        let orchestrator =
            ScrapeOrchestrator::with_pacer(harvester, Arc::clone(&db), RecordingPacer::new());

        let outcome = orchestrator.run(&request("test", 100, 50)).await;

        assert!(matches!(
            outcome.error(),
            Some(CoreError::Harvest(HarvestError::AuthInvalid { .. }))
        ));
        assert_eq!(orchestrator.harvester().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let db = setup_db().await;
        let first = ScrapeOrchestrator::with_pacer(
            MockHarvester::new().with_batch(rows(0..50)),
            Arc::clone(&db),
            RecordingPacer::new(),
        );
        assert_eq!(first.run(&request("test", 50, 50)).await.report().persisted, 50);

        let second = ScrapeOrchestrator::with_pacer(
            MockHarvester::new().with_batch(rows(0..50)),
            Arc::clone(&db),
            RecordingPacer::new(),
        );
        let outcome = second.run(&request("test", 50, 50)).await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.report().persisted, 0);
        assert_eq!(outcome.report().already_present, 50);
        assert!(outcome.report().preview.is_empty());
        assert_eq!(db.count_posts().await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_duplicates_across_batches_are_dropped() {
        let db = setup_db().await;
        let harvester = MockHarvester::new()
            .with_batch(rows(0..30))
            .with_batch(rows(20..50));
        let orchestrator =
            ScrapeOrchestrator::with_pacer(harvester, Arc::clone(&db), RecordingPacer::new());

        let outcome = orchestrator.run(&request("test", 60, 30)).await;

        let report = outcome.report();
        assert!(outcome.is_completed());
        assert_eq!(report.rows_harvested, 60);
        assert_eq!(report.batch_duplicates_removed, 10);
        assert_eq!(report.persisted, 50);
    }

    #[tokio::test]
    async fn test_pauses_between_batches_until_target() {
        let db = setup_db().await;
        let harvester = MockHarvester::new()
            .with_batch(rows(0..50))
            .with_batch(rows(50..100))
            .with_batch(rows(100..150));
        let orchestrator =
            ScrapeOrchestrator::with_pacer(harvester, Arc::clone(&db), RecordingPacer::new());

        let outcome = orchestrator.run(&request("test", 150, 50)).await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.report().batches_attempted, 3);
        assert_eq!(outcome.report().persisted, 150);
        assert_eq!(
            orchestrator.pacer().pauses(),
            vec![Duration::from_secs(60), Duration::from_secs(60)]
        );
    }

    #[tokio::test]
    async fn test_no_data_ends_loop_cleanly() {
        let db = setup_db().await;
        let harvester = MockHarvester::new().with_batch(rows(0..50));
        let orchestrator =
            ScrapeOrchestrator::with_pacer(harvester, Arc::clone(&db), RecordingPacer::new());

        let outcome = orchestrator.run(&request("test", 150, 50)).await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.report().batches_attempted, 2);
        assert_eq!(outcome.report().persisted, 50);
        assert_eq!(orchestrator.harvester().calls().len(), 2);
        assert_eq!(orchestrator.pacer().pauses().len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_batch_is_discarded() {
        let db = setup_db().await;
        let harvester = MockHarvester::new()
            .with_parse_error(DataParseError::Malformed {
                details: "unterminated quote".to_string(),
            })
            .with_batch(rows(0..50));
        let orchestrator =
            ScrapeOrchestrator::with_pacer(harvester, Arc::clone(&db), RecordingPacer::new());

        let outcome = orchestrator.run(&request("test", 100, 50)).await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.report().batches_discarded, 1);
        assert_eq!(outcome.report().persisted, 50);
    }

    #[tokio::test]
    async fn test_batch_without_id_column_is_discarded() {
        let db = setup_db().await;
        let headless = RawRowSet {
            columns: REQUIRED_COLUMNS
                .iter()
                .filter(|column| **column != "id_str")
                .map(|column| column.to_string())
                .collect(),
            rows: rows(100..150),
        };
        let harvester = MockHarvester::new()
            .with_row_set(headless)
            .with_batch(rows(0..50));
        let orchestrator =
            ScrapeOrchestrator::with_pacer(harvester, Arc::clone(&db), RecordingPacer::new());

        let outcome = orchestrator.run(&request("test", 100, 50)).await;

        assert!(outcome.is_completed(), "unexpected outcome: {:?}", outcome.error());
        assert_eq!(outcome.report().batches_attempted, 2);
        assert_eq!(outcome.report().batches_discarded, 1);
        assert_eq!(outcome.report().rows_harvested, 50);
        assert_eq!(outcome.report().persisted, 50);
        assert!(!tokio_test::assert_ok!(db.post_exists("100").await));
        assert!(tokio_test::assert_ok!(db.post_exists("0").await));
    }

    #[tokio::test]
    async fn test_date_range_is_enforced() {
        let db = setup_db().await;
        let batch = vec![
            RawRow::new("1", "terlalu awal").with_created_at("2024-03-01T23:59:00.000Z"),
            RawRow::new("2", "hari pertama").with_created_at("2024-03-02T00:00:00.000Z"),
            RawRow::new("3", "hari terakhir").with_created_at("Sun Mar 03 18:00:00 +0000 2024"),
            RawRow::new("4", "terlambat").with_created_at("2024-03-04T08:00:00.000Z"),
        ];
        let harvester = MockHarvester::new().with_batch(batch);
        let orchestrator =
            ScrapeOrchestrator::with_pacer(harvester, Arc::clone(&db), RecordingPacer::new());
        let request = ScrapeRequest::builder("pemilu", TOKEN)
            .target_count(4)
            .batch_size(4)
            .since(Some(date("2024-03-02")))
            .until(Some(date("2024-03-03")))
            .build()
            .unwrap();

        let outcome = orchestrator.run(&request).await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.report().out_of_range_removed, 2);
        assert_eq!(outcome.report().persisted, 2);
        assert_eq!(
            orchestrator.harvester().calls()[0].expression,
            "pemilu -is:reply since:2024-03-02 until:2024-03-03"
        );
        for id in ["2", "3"] {
            let post = db.get_post(id).await.unwrap().unwrap();
            let day = post.date.unwrap();
            assert!(day >= date("2024-03-02") && day <= date("2024-03-03"));
        }
    }

    #[tokio::test]
    async fn test_scraped_at_comes_from_clock() {
        let db = setup_db().await;
        let captured = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let orchestrator = ScrapeOrchestrator::with_pacer(
            MockHarvester::new().with_batch(rows(0..3)),
            Arc::clone(&db),
            RecordingPacer::new(),
        )
        .with_clock(move || captured);

        orchestrator.run(&request("test", 3, 3)).await;

        assert_eq!(db.get_post("1").await.unwrap().unwrap().scraped_at, captured);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let db = setup_db().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let orchestrator = ScrapeOrchestrator::with_pacer(
            MockHarvester::new().with_batch(rows(0..50)),
            Arc::clone(&db),
            RecordingPacer::new(),
        )
        .with_cancellation(cancel);

        let outcome = orchestrator.run(&request("test", 50, 50)).await;

        assert!(matches!(outcome.error(), Some(CoreError::Cancelled { .. })));
        assert!(orchestrator.harvester().calls().is_empty());
        assert_eq!(db.count_posts().await.unwrap(), 0);
    }

    /// Cancels the run while it waits between batches.
    struct CancellingPacer {
        cancel: CancellationToken,
    }

    impl Pacer for CancellingPacer {
        async fn pause(&self, _duration: Duration) {
            self.cancel.cancel();
            std::future::pending::<()>().await;
        }
    }

    #[tokio::test]
    async fn test_cancelled_during_pause_discards_accumulated_rows() {
        let db = setup_db().await;
        let cancel = CancellationToken::new();
        let orchestrator = ScrapeOrchestrator::with_pacer(
            MockHarvester::new()
                .with_batch(rows(0..50))
                .with_batch(rows(50..100)),
            Arc::clone(&db),
            CancellingPacer {
                cancel: cancel.clone(),
            },
        )
        .with_cancellation(cancel);

        let outcome = orchestrator.run(&request("test", 100, 50)).await;

        assert!(matches!(outcome.error(), Some(CoreError::Cancelled { .. })));
        assert_eq!(outcome.report().batches_attempted, 1);
        assert_eq!(db.count_posts().await.unwrap(), 0);
    }

    /// Reads from a real database but refuses every write.
    struct ReadOnlyRepository {
        inner: Arc<Database>,
    }

    impl PostRepository for ReadOnlyRepository {
        async fn post_exists(&self, id: &str) -> Result<bool, CoreError> {
            self.inner.post_exists(id).await
        }

        async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, CoreError> {
            self.inner.existing_ids(ids).await
        }

        async fn insert_posts(&self, _posts: &[CanonicalPost]) -> Result<usize, CoreError> {
            Err(DatabaseError::TransactionFailed {
                reason: "read-only".to_string(),
            }
            .into())
        }

        async fn get_post(&self, id: &str) -> Result<Option<CanonicalPost>, CoreError> {
            self.inner.get_post(id).await
        }

        async fn count_posts(&self) -> Result<i64, CoreError> {
            self.inner.count_posts().await
        }

        async fn unanalyzed_posts(
            &self,
            limit: usize,
            ids: Option<&[String]>,
        ) -> Result<Vec<CanonicalPost>, CoreError> {
            self.inner.unanalyzed_posts(limit, ids).await
        }

        async fn insert_sentiment_results(
            &self,
            _results: &[SentimentResult],
        ) -> Result<usize, CoreError> {
            Err(DatabaseError::DatabaseLocked.into())
        }

        async fn recent_posts(&self, limit: usize) -> Result<Vec<PostWithSentiment>, CoreError> {
            self.inner.recent_posts(limit).await
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_aborts_run() {
        let db = setup_db().await;
        let repository = Arc::new(ReadOnlyRepository {
            inner: Arc::clone(&db),
        });
        let orchestrator = ScrapeOrchestrator::with_pacer(
            MockHarvester::new().with_batch(rows(0..10)),
            repository,
            RecordingPacer::new(),
        );

        let outcome = orchestrator.run(&request("test", 10, 10)).await;

        assert_eq!(outcome.report().state, RunState::Aborted);
        assert!(matches!(
            outcome.error(),
            Some(CoreError::Database(DatabaseError::TransactionFailed { .. }))
        ));
        assert_eq!(db.count_posts().await.unwrap(), 0);
    }

    // Analysis

    fn analysis_artifacts() -> Arc<ModelArtifacts> {
        let vectors: HashMap<String, Vec<f32>> = [
            ("senang", vec![1.0, 0.0]),
            ("marah", vec![0.0, 1.0]),
            ("rusak", vec![-1.0, -1.0]),
        ]
        .into_iter()
        .map(|(word, vector)| (word.to_string(), vector))
        .collect();
        let idf: HashMap<String, f32> = ["senang", "marah", "rusak"]
            .into_iter()
            .map(|word| (word.to_string(), 1.0))
            .collect();
        let spec = ClassifierSpec {
            labels: vec!["Negatif".into(), "Positif".into()],
            weights: vec![vec![0.0, 1.0], vec![1.0, 0.0]],
            bias: vec![0.0, 0.0],
            scaler: None,
        };
        Arc::new(
            ModelArtifacts::from_parts(
                WordVectors::new(2, vectors).unwrap(),
                idf,
                Lexicon::new(HashMap::new(), HashMap::new(), Lexicon::default_stopwords()),
                spec,
            )
            .unwrap(),
        )
    }

    /// Fails on vectors with negative components.
    struct FragileClassifier;

    impl Classifier for FragileClassifier {
        fn predict(&self, features: &[f32]) -> Result<SentimentLabel, ClassificationError> {
            if features.iter().any(|v| *v < 0.0) {
                return Err(ClassificationError::InferenceFailed {
                    reason: "negative feature".to_string(),
                });
            }
            if features[0] >= features[1] {
                Ok(SentimentLabel::Positive)
            } else {
                Ok(SentimentLabel::Negative)
            }
        }
    }

    struct PanickingClassifier;

    impl Classifier for PanickingClassifier {
        fn predict(&self, features: &[f32]) -> Result<SentimentLabel, ClassificationError> {
            if features.iter().any(|v| *v < 0.0) {
                panic!("classifier blew up");
            }
            Ok(SentimentLabel::Neutral)
        }
    }

    /// Fails every prediction with a message naming the first feature.
    struct AlwaysFailingClassifier;

    impl Classifier for AlwaysFailingClassifier {
        fn predict(&self, features: &[f32]) -> Result<SentimentLabel, ClassificationError> {
            Err(ClassificationError::InferenceFailed {
                reason: format!("bad feature {}", features[0]),
            })
        }
    }

    fn stored_post(id: &str, text: &str) -> CanonicalPost {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        CanonicalPost {
            id: id.to_string(),
            conversation_id: None,
            created_at: Some(created_at),
            date: Some(created_at.date_naive()),
            time: Some(created_at.time()),
            timezone: Some("UTC".to_string()),
            user_id: None,
            username: None,
            place: None,
            text: text.to_string(),
            mentions: Vec::new(),
            hashtags: Vec::new(),
            cashtags: None,
            photos: None,
            link: None,
            quote_url: None,
            replies_count: 0,
            retweets_count: 0,
            likes_count: 0,
            quote_count: 0,
            retweet: false,
            video: false,
            lang: None,
            in_reply_to_screen_name: None,
            keyword_used: "jalan".to_string(),
            scraped_at: created_at,
        }
    }

    async fn seeded_db() -> Arc<Database> {
        let db = setup_db().await;
        db.insert_posts(&[
            stored_post("1", "Senang sekali jalannya mulus"),
            stored_post("2", "Marah, macet lagi"),
            stored_post("3", "jalan rusak parah"),
            stored_post("4", "   "),
            stored_post("5", "@dishub #jalan 2024"),
        ])
        .await
        .unwrap();
        db
    }

    async fn labels_by_id(db: &Database) -> HashMap<String, SentimentLabel> {
        db.recent_posts(10)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|row| row.sentiment.map(|s| (row.post.id, s.label)))
            .collect()
    }

    #[tokio::test]
    async fn test_failing_prediction_only_affects_its_post() {
        let db = seeded_db().await;
        let pipeline = Arc::new(SentimentPipeline::with_classifier(
            analysis_artifacts(),
            FragileClassifier,
        ));
        let runner = AnalysisRunner::new(Arc::clone(&db), pipeline, 3);

        let report = runner.run(&AnalysisRequest::with_limit(100)).await.unwrap();

        assert_eq!(report.selected, 5);
        assert_eq!(report.analyzed, 5);
        let labels = labels_by_id(&db).await;
        assert_eq!(labels["1"], SentimentLabel::Positive);
        assert_eq!(labels["2"], SentimentLabel::Negative);
        assert_eq!(
            labels["3"],
            SentimentLabel::PredictionError("Inference failed: negative feature".to_string())
        );
        assert_eq!(labels["4"], SentimentLabel::EmptyText);
        assert_eq!(labels["5"], SentimentLabel::EmptyAfterPreprocessing);
        assert_eq!(report.label_counts.get("Positive"), Some(&1));
        assert_eq!(report.label_counts.get("Negative"), Some(&1));
        assert_eq!(report.label_counts.get("Prediction error"), Some(&1));
        assert_eq!(report.unpredictable, 3);
    }

    #[tokio::test]
    async fn test_prediction_errors_share_one_count() {
        let db = seeded_db().await;
        let pipeline = Arc::new(SentimentPipeline::with_classifier(
            analysis_artifacts(),
            AlwaysFailingClassifier,
        ));
        let runner = AnalysisRunner::new(Arc::clone(&db), pipeline, 2);

        let report = runner.run(&AnalysisRequest::with_limit(100)).await.unwrap();

        let labels = labels_by_id(&db).await;
        assert_ne!(labels["1"], labels["2"]);
        assert_eq!(report.label_counts.get("Prediction error"), Some(&3));
        assert_eq!(report.label_counts.get(SentimentLabel::EMPTY_TEXT), Some(&1));
        assert_eq!(report.label_counts.len(), 3);
        assert_eq!(report.unpredictable, 5);
    }

    #[tokio::test]
    async fn test_worker_panic_becomes_error_sentinel() {
        let db = seeded_db().await;
        let pipeline = Arc::new(SentimentPipeline::with_classifier(
            analysis_artifacts(),
            PanickingClassifier,
        ));
        let runner = AnalysisRunner::new(Arc::clone(&db), pipeline, 2);

        let report = runner.run(&AnalysisRequest::with_limit(100)).await.unwrap();

        assert_eq!(report.analyzed, 5);
        let labels = labels_by_id(&db).await;
        assert!(matches!(labels["3"], SentimentLabel::PredictionError(_)));
        assert_eq!(labels["1"], SentimentLabel::Neutral);
    }

    #[tokio::test]
    async fn test_analysis_by_ids_and_never_twice() {
        let db = seeded_db().await;
        let pipeline = Arc::new(SentimentPipeline::with_classifier(
            analysis_artifacts(),
            FragileClassifier,
        ));
        let runner = AnalysisRunner::new(Arc::clone(&db), pipeline, 1);

        let first = runner
            .run(&AnalysisRequest::for_posts(vec!["2".to_string()]))
            .await
            .unwrap();
        assert_eq!(first.analyzed, 1);
        assert_eq!(labels_by_id(&db).await.len(), 1);

        let rest = runner.run(&AnalysisRequest::with_limit(100)).await.unwrap();
        assert_eq!(rest.selected, 4);

        let again = runner.run(&AnalysisRequest::with_limit(100)).await.unwrap();
        assert_eq!(again.selected, 0);
        assert_eq!(again.analyzed, 0);
    }

    #[tokio::test]
    async fn test_analysis_write_failure_is_reported() {
        let db = seeded_db().await;
        let repository = Arc::new(ReadOnlyRepository { inner: db });
        let pipeline = Arc::new(SentimentPipeline::with_classifier(
            analysis_artifacts(),
            FragileClassifier,
        ));
        let runner = AnalysisRunner::new(repository, pipeline, 2);

        let result = runner.run(&AnalysisRequest::with_limit(10)).await;
        assert!(matches!(
            result,
            Err(CoreError::Database(DatabaseError::DatabaseLocked))
        ));
    }
}
