//! Orchestration layer: batched scraping into the post store and sentiment
//! analysis of stored posts.

pub mod analysis;
pub mod scrape;

#[cfg(test)]
mod tests;

pub use analysis::{AnalysisReport, AnalysisRequest, AnalysisRunner};
pub use scrape::{
    Pacer, RecordingPacer, RunState, ScrapeOrchestrator, ScrapeOutcome, ScrapeReport, TokioPacer,
    PREVIEW_LIMIT,
};
