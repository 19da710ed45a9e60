use crate::lexicon::Lexicon;
use sentimind_core::ModelLoadError;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const WORD_VECTORS_FILE: &str = "word_vectors.txt";
pub const IDF_FILE: &str = "tfidf_idf.json";
pub const SLANG_FILE: &str = "slangwords.csv";
pub const LEMMAS_FILE: &str = "lemmas.csv";
pub const STOPWORDS_FILE: &str = "stopwords.txt";

/// Pretrained word embeddings keyed by token.
#[derive(Debug, Clone, PartialEq)]
pub struct WordVectors {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl WordVectors {
    pub fn new(dim: usize, vectors: HashMap<String, Vec<f32>>) -> Result<Self, ModelLoadError> {
        if let Some(bad) = vectors.values().find(|v| v.len() != dim) {
            return Err(ModelLoadError::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }
        Ok(Self { dim, vectors })
    }

    /// Parse the word2vec text format: optional `count dim` header, then `word v1 .. vdim`.
    pub fn parse(contents: &str, path: &str) -> Result<Self, ModelLoadError> {
        let invalid = |details: String| ModelLoadError::InvalidArtifact {
            path: path.to_string(),
            details,
        };

        let mut lines = contents
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line))
            .filter(|(_, line)| !line.trim().is_empty())
            .peekable();
        let mut dim: Option<usize> = None;

        if let Some((_, first)) = lines.peek() {
            let parts: Vec<&str> = first.split_whitespace().collect();
            if parts.len() == 2 && parts.iter().all(|p| p.parse::<usize>().is_ok()) {
                dim = parts[1].parse().ok();
                lines.next();
            }
        }

        let mut vectors = HashMap::new();
        for (line_no, line) in lines {
            let mut parts = line.split_whitespace();
            let word = match parts.next() {
                Some(word) => word.to_string(),
                None => continue,
            };
            let values = parts
                .map(str::parse::<f32>)
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|e| invalid(format!("line {}: {}", line_no, e)))?;

            let expected = *dim.get_or_insert(values.len());
            if values.len() != expected {
                return Err(invalid(format!(
                    "line {}: expected {} values for '{}', found {}",
                    line_no,
                    expected,
                    word,
                    values.len()
                )));
            }
            vectors.insert(word, values);
        }

        match dim {
            Some(dim) if dim > 0 => Ok(Self { dim, vectors }),
            _ => Err(invalid("no vectors found".to_string())),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, word: &str) -> Option<&[f32]> {
        self.vectors.get(word).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScalerSpec {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

/// Exported parameters of a standard-scaler plus linear decision function.
///
/// `weights` holds one row per label, or a single row for a two-label model
/// where a positive score selects the second label.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClassifierSpec {
    pub labels: Vec<String>,
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    #[serde(default)]
    pub scaler: Option<ScalerSpec>,
}

impl ClassifierSpec {
    pub fn input_dim(&self) -> usize {
        self.weights.first().map(Vec::len).unwrap_or(0)
    }
}

/// Everything inference needs, loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub word_vectors: WordVectors,
    pub idf: HashMap<String, f32>,
    pub lexicon: Lexicon,
    pub classifier: ClassifierSpec,
}

impl ModelArtifacts {
    pub fn from_parts(
        word_vectors: WordVectors,
        idf: HashMap<String, f32>,
        lexicon: Lexicon,
        classifier: ClassifierSpec,
    ) -> Result<Self, ModelLoadError> {
        let input_dim = classifier.input_dim();
        if input_dim != word_vectors.dim() {
            return Err(ModelLoadError::DimensionMismatch {
                expected: word_vectors.dim(),
                actual: input_dim,
            });
        }
        Ok(Self {
            word_vectors,
            idf,
            lexicon,
            classifier,
        })
    }

    pub fn load(models_dir: &Path) -> Result<Self, ModelLoadError> {
        info!("Loading model artifacts from {}", models_dir.display());

        let classifier_path = models_dir.join(CLASSIFIER_FILE);
        let classifier: ClassifierSpec =
            serde_json::from_str(&read_required(&classifier_path)?)
                .map_err(|e| invalid_artifact(&classifier_path, e))?;

        let vectors_path = models_dir.join(WORD_VECTORS_FILE);
        let word_vectors = WordVectors::parse(
            &read_required(&vectors_path)?,
            &vectors_path.display().to_string(),
        )?;

        let idf_path = models_dir.join(IDF_FILE);
        let idf: HashMap<String, f32> = serde_json::from_str(&read_required(&idf_path)?)
            .map_err(|e| invalid_artifact(&idf_path, e))?;

        let slang_path = models_dir.join(SLANG_FILE);
        let slang = read_pairs(&slang_path, &read_required(&slang_path)?)?;

        let lemmas_path = models_dir.join(LEMMAS_FILE);
        let lemmas = match read_optional(&lemmas_path)? {
            Some(contents) => read_pairs(&lemmas_path, &contents)?,
            None => {
                warn!("No {} found, lemmatization is a no-op", LEMMAS_FILE);
                HashMap::new()
            }
        };

        let stopwords_path = models_dir.join(STOPWORDS_FILE);
        let stopwords = match read_optional(&stopwords_path)? {
            Some(contents) => parse_stopwords(&contents),
            None => {
                debug!("No {} found, using built-in stopwords", STOPWORDS_FILE);
                Lexicon::default_stopwords()
            }
        };

        let artifacts = Self::from_parts(
            word_vectors,
            idf,
            Lexicon::new(slang, lemmas, stopwords),
            classifier,
        )?;
        info!(
            "Model artifacts ready: {} word vectors (dim {}), {} idf terms, {} slang entries",
            artifacts.word_vectors.len(),
            artifacts.word_vectors.dim(),
            artifacts.idf.len(),
            artifacts.lexicon.slang_len()
        );
        Ok(artifacts)
    }
}

fn invalid_artifact(path: &Path, error: impl std::fmt::Display) -> ModelLoadError {
    ModelLoadError::InvalidArtifact {
        path: path.display().to_string(),
        details: error.to_string(),
    }
}

fn read_required(path: &Path) -> Result<String, ModelLoadError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ModelLoadError::ArtifactNotFound {
                path: path.display().to_string(),
            })
        }
        Err(e) => Err(invalid_artifact(path, e)),
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, ModelLoadError> {
    match read_required(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(ModelLoadError::ArtifactNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Two-column CSV with a header row, e.g. `original,translated`.
fn read_pairs(path: &Path, contents: &str) -> Result<HashMap<String, String>, ModelLoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    let mut pairs = HashMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| invalid_artifact(path, e))?;
        match (record.get(0), record.get(1)) {
            (Some(from), Some(to)) if !from.is_empty() => {
                pairs.insert(from.to_lowercase(), to.to_lowercase());
            }
            _ => debug!("Skipping incomplete row in {}", path.display()),
        }
    }
    Ok(pairs)
}

fn parse_stopwords(contents: &str) -> HashSet<String> {
    contents
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}
