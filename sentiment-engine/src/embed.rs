use crate::artifacts::ModelArtifacts;
use std::sync::Arc;

/// TF-IDF weighted mean of pretrained word vectors.
#[derive(Debug, Clone)]
pub struct FeatureEmbedder {
    artifacts: Arc<ModelArtifacts>,
}

impl FeatureEmbedder {
    pub fn new(artifacts: Arc<ModelArtifacts>) -> Self {
        Self { artifacts }
    }

    pub fn dim(&self) -> usize {
        self.artifacts.word_vectors.dim()
    }

    /// Tokens missing from either vocabulary are ignored; none left yields zeros.
    pub fn embed<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<f32> {
        let dim = self.dim();
        let mut sum = vec![0.0f32; dim];
        let mut counted = 0usize;

        for token in tokens {
            let token = token.as_ref();
            let (Some(vector), Some(weight)) = (
                self.artifacts.word_vectors.get(token),
                self.artifacts.idf.get(token),
            ) else {
                continue;
            };
            for (acc, value) in sum.iter_mut().zip(vector) {
                *acc += value * weight;
            }
            counted += 1;
        }

        if counted > 0 {
            let n = counted as f32;
            sum.iter_mut().for_each(|v| *v /= n);
        }
        sum
    }
}
