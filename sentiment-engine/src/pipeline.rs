use crate::artifacts::ModelArtifacts;
use crate::classifier::{Classifier, LinearPipelineClassifier};
use crate::embed::FeatureEmbedder;
use crate::preprocess::TextPreprocessor;
use sentimind_core::{ClassificationError, ModelLoadError, SentimentLabel};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Preprocess, embed and classify one text. Never fails: problems become sentinel labels.
pub struct SentimentPipeline<C = LinearPipelineClassifier> {
    preprocessor: TextPreprocessor,
    embedder: FeatureEmbedder,
    classifier: C,
}

impl SentimentPipeline<LinearPipelineClassifier> {
    pub fn from_artifacts(artifacts: Arc<ModelArtifacts>) -> Result<Self, ModelLoadError> {
        let classifier = LinearPipelineClassifier::from_spec(&artifacts.classifier)?;
        Ok(Self::with_classifier(artifacts, classifier))
    }

    pub fn load(models_dir: &Path) -> Result<Self, ModelLoadError> {
        let artifacts = Arc::new(ModelArtifacts::load(models_dir)?);
        Self::from_artifacts(artifacts)
    }
}

impl<C: Classifier> SentimentPipeline<C> {
    pub fn with_classifier(artifacts: Arc<ModelArtifacts>, classifier: C) -> Self {
        Self {
            preprocessor: TextPreprocessor::new(Arc::clone(&artifacts)),
            embedder: FeatureEmbedder::new(artifacts),
            classifier,
        }
    }

    pub fn predict(&self, text: &str) -> SentimentLabel {
        if text.trim().is_empty() {
            return SentimentLabel::EmptyText;
        }

        let tokens = self.preprocessor.normalize(text);
        if tokens.is_empty() {
            debug!("Text is empty after preprocessing");
            return SentimentLabel::EmptyAfterPreprocessing;
        }

        match self.classify_tokens(&tokens) {
            Ok(label) => label,
            Err(e) => {
                warn!("Sentiment prediction failed: {}", e);
                SentimentLabel::PredictionError(e.to_string())
            }
        }
    }

    fn classify_tokens(&self, tokens: &[String]) -> Result<SentimentLabel, ClassificationError> {
        let features = self.embedder.embed(tokens);
        self.classifier.predict(&features)
    }

    pub fn preprocessor(&self) -> &TextPreprocessor {
        &self.preprocessor
    }
}
