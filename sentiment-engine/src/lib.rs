pub mod artifacts;
pub mod classifier;
pub mod embed;
pub mod lexicon;
pub mod pipeline;
pub mod preprocess;

pub use artifacts::{ClassifierSpec, ModelArtifacts, ScalerSpec, WordVectors};
pub use classifier::{Classifier, LinearPipelineClassifier};
pub use embed::FeatureEmbedder;
pub use lexicon::Lexicon;
pub use pipeline::SentimentPipeline;
pub use preprocess::TextPreprocessor;
