use crate::artifacts::ModelArtifacts;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"http\S+|www\S+|https\S+").expect("valid url pattern"));
static MENTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@\w+").expect("valid mention pattern"));
static HASHTAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\w+").expect("valid hashtag pattern"));
static DIGIT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid digit pattern"));
static PUNCTUATION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid punctuation pattern"));

/// Turns raw post text into the token sequence the embedder expects.
///
/// Stages run in a fixed order: casefold, strip noise, whitespace split,
/// slang substitution, profanity removal, lemmatize and drop stopwords on
/// the rejoined string, final whitespace split.
#[derive(Debug, Clone)]
pub struct TextPreprocessor {
    artifacts: Arc<ModelArtifacts>,
}

impl TextPreprocessor {
    pub fn new(artifacts: Arc<ModelArtifacts>) -> Self {
        Self { artifacts }
    }

    pub fn normalize(&self, text: &str) -> Vec<String> {
        let lexicon = &self.artifacts.lexicon;

        let lowered = text.to_lowercase();
        let cleaned = strip_noise(&lowered);

        let kept: Vec<&str> = cleaned
            .split_whitespace()
            .map(|token| lexicon.normalize_slang(token))
            .filter(|token| !lexicon.is_profane(token))
            .collect();
        let joined = kept.join(" ");

        let lemmatized = lexicon.lemmatize(&joined);
        let filtered = lexicon.remove_stopwords(&lemmatized);

        filtered.split_whitespace().map(str::to_string).collect()
    }
}

/// Remove URLs, mentions, hashtags, digits and punctuation, in that order.
pub fn strip_noise(text: &str) -> String {
    let text = URL_PATTERN.replace_all(text, "");
    let text = MENTION_PATTERN.replace_all(&text, "");
    let text = HASHTAG_PATTERN.replace_all(&text, "");
    let text = DIGIT_PATTERN.replace_all(&text, "");
    PUNCTUATION_PATTERN.replace_all(&text, "").into_owned()
}
