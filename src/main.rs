mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use database::{Database, PostRepository};
use harvester::TweetHarvestCli;
use sentiment_engine::SentimentPipeline;
use sentimind_core::{parse_date, AppConfig, CoreError, ErrorExt, ErrorReporter, ScrapeRequest};
use sentimind_service::{AnalysisRequest, AnalysisRunner, ScrapeOrchestrator, ScrapeOutcome};
use serde_json::json;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("sentimind=info,harvester=info,database=info,sentiment_engine=info,sentimind_service=info")
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Scrape {
            keyword,
            count,
            since,
            until,
            batch_size,
            delay,
        } => {
            let since = since.map(|v| parse_date("since", &v)).transpose()?;
            let until = until.map(|v| parse_date("until", &v)).transpose()?;
            let request = ScrapeRequest::builder(keyword, config.require_auth_token()?)
                .target_count(count.unwrap_or(config.scrape.default_limit))
                .since(since)
                .until(until)
                .batch_size(batch_size.unwrap_or(config.scrape.batch_size))
                .inter_batch_delay(
                    delay
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| config.scrape.inter_batch_delay()),
                )
                .build()?;
            scrape(&config, &request).await
        }
        Command::Analyze { limit, ids } => {
            let request = if ids.is_empty() {
                AnalysisRequest::with_limit(limit.unwrap_or(config.analysis.default_limit))
            } else {
                AnalysisRequest::for_posts(ids)
            };
            analyze(&config, &request).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Predict { text } => {
            let pipeline = SentimentPipeline::load(&config.models_dir)?;
            let label = pipeline.predict(&text);
            print_json(&json!({ "text": text, "label": label }))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Recent { limit } => {
            let db = Database::open(&config.database_url).await?;
            let posts = db.recent_posts(limit).await?;
            print_json(&posts)?;
            db.close().await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn scrape(config: &AppConfig, request: &ScrapeRequest) -> Result<ExitCode> {
    let db = Arc::new(Database::open(&config.database_url).await?);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current batch");
            signal_token.cancel();
        }
    });

    let harvester = TweetHarvestCli::new(config.harvester.clone());
    let orchestrator =
        ScrapeOrchestrator::new(harvester, Arc::clone(&db)).with_cancellation(cancel);
    let outcome = orchestrator.run(request).await;

    print_json(outcome.report())?;
    db.close().await;

    match outcome {
        ScrapeOutcome::Completed(_) => Ok(ExitCode::SUCCESS),
        ScrapeOutcome::Aborted { error, .. } => {
            ErrorReporter::new().report_error(&error);
            eprintln!("Scrape aborted: {}", error.user_friendly_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn analyze(config: &AppConfig, request: &AnalysisRequest) -> Result<()> {
    let pipeline = SentimentPipeline::load(&config.models_dir)
        .with_context(|| format!("Failed to load models from {}", config.models_dir.display()))?;
    let db = Arc::new(Database::open(&config.database_url).await?);

    let runner = AnalysisRunner::new(Arc::clone(&db), Arc::new(pipeline), config.analysis.workers);
    let report = runner.run(request).await?;
    print_json(&report)?;
    db.close().await;
    Ok(())
}

fn render_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, CoreError> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CoreError> {
    println!("{}", render_json(value)?);
    Ok(())
}
