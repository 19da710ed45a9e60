use std::collections::{HashMap, HashSet};

/// Profanity removed from every text before lemmatization.
pub const SWEAR_WORDS: &[&str] = &[
    "anjing", "bajingan", "keparat", "bangsat", "tolol", "babi", "kontol", "sialan", "memek",
    "perek", "tai", "goblok", "kampret", "parah", "celaka", "gila", "mampus", "pukimak", "setan",
    "banci", "jancok", "brengsek", "asu", "bego", "bodoh", "dongo", "ngentot", "ngeselin",
    "bacot", "jembut", "titid", "bencong", "cacat", "edan", "idiot", "kurap", "lonte", "ngewe",
    "peler", "sampah", "syalan",
];

/// Indonesian function words used when no stopword file is supplied.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "ada", "adalah", "agar", "akan", "aku", "amat", "anda", "antara", "apa", "apabila", "atau",
    "bagai", "bagaimana", "bagi", "bahkan", "bahwa", "banyak", "begitu", "belum", "berapa",
    "bisa", "boleh", "dalam", "dan", "dari", "daripada", "dengan", "di", "dia", "dulu", "hal",
    "hampir", "hanya", "harus", "hingga", "ia", "ialah", "ini", "itu", "jadi", "jika", "juga",
    "kalau", "kami", "kamu", "kan", "karena", "ke", "kemudian", "kenapa", "kepada", "ketika",
    "kita", "lagi", "lah", "lalu", "maka", "masih", "mereka", "mungkin", "nya", "oleh", "pada",
    "para", "pula", "saat", "saja", "sambil", "sampai", "sang", "saya", "se", "sebagai",
    "sebelum", "sedang", "sedangkan", "sehingga", "sejak", "selain", "semua", "sendiri",
    "seperti", "serta", "setelah", "sudah", "supaya", "tadi", "tapi", "telah", "tentang",
    "tersebut", "tetapi", "toh", "untuk", "walau", "yaitu", "yakni", "yang",
];

/// Dictionaries for the word-level stages of normalization.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    slang: HashMap<String, String>,
    lemmas: HashMap<String, String>,
    stopwords: HashSet<String>,
    swear_words: HashSet<String>,
}

impl Lexicon {
    pub fn new(
        slang: HashMap<String, String>,
        lemmas: HashMap<String, String>,
        stopwords: HashSet<String>,
    ) -> Self {
        Self {
            slang,
            lemmas,
            stopwords,
            swear_words: SWEAR_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    pub fn default_stopwords() -> HashSet<String> {
        DEFAULT_STOPWORDS.iter().map(|w| w.to_string()).collect()
    }

    /// Replace a slang token with its normal form; unknown tokens pass through.
    pub fn normalize_slang<'a>(&'a self, token: &'a str) -> &'a str {
        self.slang.get(token).map(String::as_str).unwrap_or(token)
    }

    pub fn is_profane(&self, token: &str) -> bool {
        self.swear_words.contains(token)
    }

    pub fn lemmatize(&self, text: &str) -> String {
        text.split_whitespace()
            .map(|word| self.lemmas.get(word).map(String::as_str).unwrap_or(word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn remove_stopwords(&self, text: &str) -> String {
        text.split_whitespace()
            .filter(|word| !self.stopwords.contains(*word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn slang_len(&self) -> usize {
        self.slang.len()
    }
}
