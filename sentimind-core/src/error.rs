use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Harvest error: {0}")]
    Harvest(#[from] HarvestError),

    #[error("Data parse error: {0}")]
    DataParse(#[from] DataParseError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Model load error: {0}")]
    ModelLoad(#[from] ModelLoadError),

    #[error("Classification error: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },
}

/// Failures reported by the external harvesting tool for a single batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HarvestError {
    #[error("Harvester timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Harvester rejected the credential: {details}")]
    AuthInvalid { details: String },

    #[error("Harvester failed: {details}")]
    ToolFailure { details: String },

    #[error("Harvester produced no data")]
    NoData,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataParseError {
    #[error("Malformed batch output: {details}")]
    Malformed { details: String },

    #[error("Required column missing: {column}")]
    MissingColumn { column: String },
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {migration}")]
    MigrationFailed { migration: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Constraint violation: {constraint}")]
    ConstraintViolation { constraint: String },

    #[error("Database locked")]
    DatabaseLocked,

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Model artifact not found: {path}")]
    ArtifactNotFound { path: String },

    #[error("Model artifact {path} is invalid: {details}")]
    InvalidArtifact { path: String, details: String },

    #[error("Unknown sentiment label in classifier: {label}")]
    UnknownLabel { label: String },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Inference failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("Classifier returned class index {index} outside {classes} labels")]
    LabelOutOfRange { index: usize, classes: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing credential: {name}")]
    MissingCredential { name: String },

    #[error("Invalid date range: since {since} is after until {until}")]
    InvalidDateRange { since: String, until: String },

    #[error("Invalid date for {field}: {value} (expected YYYY-MM-DD)")]
    InvalidDate { field: String, value: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
