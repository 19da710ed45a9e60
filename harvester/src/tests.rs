#[cfg(all(test, unix))]
mod tests {
    use crate::{Harvester, SearchQuery, TweetHarvestCli};
    use sentimind_core::{CoreError, HarvestError, HarvesterConfig};
    use std::time::Duration;

    /// A harvester config running `script` through `sh -c`; `$2` is the output file name.
    fn script_config(script: &str) -> HarvesterConfig {
        HarvesterConfig {
            program: "sh".to_string(),
            base_args: vec!["-c".to_string(), script.to_string(), "harvest".to_string()],
            tab: "LATEST".to_string(),
            work_dir: None,
        }
    }

    fn query() -> SearchQuery {
        SearchQuery::new("banjir")
    }

    #[tokio::test]
    async fn test_successful_batch_is_parsed() {
        let script = r#"mkdir -p tweets-data && printf 'id_str,tweet_url,full_text,created_at,username,in_reply_to_screen_name\n1,https://x.com/a/status/1,hujan deras,2024-03-01T10:00:00.000Z,ani,\n2,https://x.com/b/status/2,banjir lagi,2024-03-01T11:00:00.000Z,budi,\n' > "tweets-data/$2""#;
        let harvester = TweetHarvestCli::new(script_config(script));

        let rows = tokio_test::assert_ok!(
            harvester
                .fetch(&query(), 2, "token", Duration::from_secs(10))
                .await
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.rows[1].username.as_deref(), Some("budi"));
    }

    #[tokio::test]
    async fn test_arguments_follow_tool_contract() {
        // Echo every argument back as one CSV row so the test can inspect them
        let script = r#"mkdir -p tweets-data && printf 'id_str,full_text\n1,"%s"\n' "$*" > "tweets-data/$2""#;
        let harvester = TweetHarvestCli::new(script_config(script));

        let rows = harvester
            .fetch(&query(), 7, "secret", Duration::from_secs(10))
            .await
            .unwrap();
        let args = rows.rows[0].full_text.clone().unwrap();
        assert!(args.starts_with("-o batch_0.csv -s banjir -is:reply --tab LATEST -l 7"));
        assert!(args.ends_with("--token secret"));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let harvester = TweetHarvestCli::new(script_config("sleep 5"));
        let result = harvester
            .fetch(&query(), 1, "token", Duration::from_millis(200))
            .await;
        assert!(matches!(
            result,
            Err(CoreError::Harvest(HarvestError::Timeout { .. }))
        ));
    }

    #[tokio::test]
    async fn test_auth_failure_is_reported() {
        let script = "echo 'Error: Invalid bearer token' >&2; exit 1";
        let harvester = TweetHarvestCli::new(script_config(script));
        let result = harvester
            .fetch(&query(), 1, "expired", Duration::from_secs(10))
            .await;
        assert!(matches!(
            result,
            Err(CoreError::Harvest(HarvestError::AuthInvalid { .. }))
        ));
    }

    #[tokio::test]
    async fn test_silent_success_is_no_data() {
        let harvester = TweetHarvestCli::new(script_config("exit 0"));
        let result = harvester
            .fetch(&query(), 1, "token", Duration::from_secs(10))
            .await;
        assert!(matches!(
            result,
            Err(CoreError::Harvest(HarvestError::NoData))
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_tool_failure() {
        let config = HarvesterConfig {
            program: "sentimind-no-such-program".to_string(),
            ..HarvesterConfig::default()
        };
        let harvester = TweetHarvestCli::new(config);
        let result = harvester
            .fetch(&query(), 1, "token", Duration::from_secs(10))
            .await;
        assert!(matches!(
            result,
            Err(CoreError::Harvest(HarvestError::ToolFailure { .. }))
        ));
    }

    #[tokio::test]
    async fn test_scratch_directories_are_removed() {
        let parent = tempfile::tempdir().unwrap();
        let config = HarvesterConfig {
            work_dir: Some(parent.path().to_path_buf()),
            ..script_config("mkdir -p tweets-data && printf 'id_str\\n1\\n' > \"tweets-data/$2\"")
        };
        let harvester = TweetHarvestCli::new(config);
        let _ = harvester
            .fetch(&query(), 1, "token", Duration::from_secs(10))
            .await;

        let leftovers = std::fs::read_dir(parent.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    /// Runs one batch inside a fresh parent directory and counts what it left there.
    fn leftovers_after(
        script: &str,
        timeout: Duration,
    ) -> (Result<crate::RawRowSet, CoreError>, usize) {
        let parent = tempfile::tempdir().unwrap();
        let config = HarvesterConfig {
            work_dir: Some(parent.path().to_path_buf()),
            ..script_config(script)
        };
        let harvester = TweetHarvestCli::new(config);
        let result = tokio_test::block_on(harvester.fetch(&query(), 1, "token", timeout));
        let leftovers = std::fs::read_dir(parent.path()).unwrap().count();
        (result, leftovers)
    }

    #[test]
    fn test_scratch_directory_removed_after_timeout() {
        let script = "mkdir -p tweets-data && printf 'id_str\\n1\\n' > \"tweets-data/$2\" && sleep 5";
        let (result, leftovers) = leftovers_after(script, Duration::from_millis(500));

        assert!(matches!(
            result,
            Err(CoreError::Harvest(HarvestError::Timeout { .. }))
        ));
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_scratch_directory_removed_after_tool_failure() {
        let script = "mkdir -p tweets-data && printf 'id_str\\n1\\n' > \"tweets-data/$2\"; echo 'browser crashed' >&2; exit 3";
        let (result, leftovers) = leftovers_after(script, Duration::from_secs(10));

        match result {
            Err(CoreError::Harvest(HarvestError::ToolFailure { details })) => {
                assert!(details.contains("browser crashed"))
            }
            other => panic!("expected ToolFailure, got {:?}", other),
        }
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_mock_replays_then_reports_no_data() {
        let mock = crate::MockHarvester::new()
            .with_batch(vec![crate::RawRow::new("1", "halo")])
            .with_error(HarvestError::Timeout { seconds: 30 });

        let first = mock.fetch(&query(), 5, "t", Duration::from_secs(30)).await;
        assert_eq!(first.unwrap().len(), 1);
        let second = mock.fetch(&query(), 5, "t", Duration::from_secs(30)).await;
        assert!(matches!(
            second,
            Err(CoreError::Harvest(HarvestError::Timeout { .. }))
        ));
        let third = mock.fetch(&query(), 5, "t", Duration::from_secs(30)).await;
        assert!(matches!(third, Err(CoreError::Harvest(HarvestError::NoData))));
        assert_eq!(mock.calls().len(), 3);
        assert_eq!(mock.calls()[0].expression, "banjir -is:reply");
    }
}
