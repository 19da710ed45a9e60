use crate::query::SearchQuery;
use crate::rows::{parse_rows, RawRowSet};
use crate::Harvester;
use sentimind_core::{CoreError, HarvestError, HarvesterConfig};
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Directory, relative to the working directory, the tool writes its CSV into.
pub const OUTPUT_DIR: &str = "tweets-data";

const AUTH_FAILURE_MARKERS: [&str; 2] = ["could not authenticate", "invalid bearer token"];

/// Runs the `tweet-harvest` command line tool once per batch.
#[derive(Debug)]
pub struct TweetHarvestCli {
    config: HarvesterConfig,
    batch_counter: AtomicUsize,
}

impl TweetHarvestCli {
    pub fn new(config: HarvesterConfig) -> Self {
        Self {
            config,
            batch_counter: AtomicUsize::new(0),
        }
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir, CoreError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sentimind-batch-");
        let dir = match &self.config.work_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn build_command(
        &self,
        work_dir: &Path,
        output_file: &str,
        query: &SearchQuery,
        limit: usize,
        auth_token: &str,
    ) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.base_args)
            .arg("-o")
            .arg(output_file)
            .arg("-s")
            .arg(query.expression())
            .arg("--tab")
            .arg(&self.config.tab)
            .arg("-l")
            .arg(limit.to_string())
            .arg("--token")
            .arg(auth_token)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl Harvester for TweetHarvestCli {
    async fn fetch(
        &self,
        query: &SearchQuery,
        limit: usize,
        auth_token: &str,
        timeout: Duration,
    ) -> Result<RawRowSet, CoreError> {
        let batch_number = self.batch_counter.fetch_add(1, Ordering::Relaxed);
        let output_file = format!("batch_{}.csv", batch_number);
        // Removed with everything the tool left behind when this guard drops
        let scratch = self.scratch_dir()?;

        info!(
            "Harvesting up to {} posts for '{}' (timeout {:?})",
            limit, query, timeout
        );
        let started = Instant::now();
        let mut command = self.build_command(scratch.path(), &output_file, query, limit, auth_token);

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Err(_) => {
                warn!("Harvester exceeded its {:?} budget", timeout);
                return Err(HarvestError::Timeout {
                    seconds: timeout.as_secs(),
                }
                .into());
            }
            Ok(Err(e)) => {
                return Err(HarvestError::ToolFailure {
                    details: format!("could not start '{}': {}", self.config.program, e),
                }
                .into());
            }
            Ok(Ok(output)) => output,
        };
        debug!("Harvester finished in {:?} with {}", started.elapsed(), output.status);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(classify_failure(&stderr, &stdout).into());
        }

        let path = scratch.path().join(OUTPUT_DIR).join(&output_file);
        read_batch_file(&path).await
    }
}

/// Map a non-zero exit onto the harvest taxonomy using the tool's diagnostics.
pub fn classify_failure(stderr: &str, stdout: &str) -> HarvestError {
    let diagnostics = format!("{}\n{}", stderr.trim(), stdout.trim());
    let lowered = diagnostics.to_lowercase();
    let details = diagnostics.trim().to_string();

    if AUTH_FAILURE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        HarvestError::AuthInvalid { details }
    } else {
        HarvestError::ToolFailure { details }
    }
}

/// Read a batch file the tool produced; absent or empty output means `NoData`.
pub async fn read_batch_file(path: &Path) -> Result<RawRowSet, CoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Harvester wrote no file at {}", path.display());
            return Err(HarvestError::NoData.into());
        }
        Err(e) => return Err(e.into()),
    };
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(HarvestError::NoData.into());
    }

    let rows = parse_rows(bytes.as_slice())?;
    if rows.is_empty() {
        return Err(HarvestError::NoData.into());
    }
    Ok(rows)
}
