//! Error types for bank loading, configuration and response handling.

/// Fatal problems detected while loading an item bank or validating a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("item bank is empty")]
    EmptyBank,

    #[error("duplicate item id {item_id}")]
    DuplicateItem { item_id: u32 },

    #[error("item {item_id}: category count must be at least 2, got {category_count}")]
    CategoryCount { item_id: u32, category_count: usize },

    #[error("item {item_id}: expected {expected} thresholds, got {actual}")]
    ThresholdCount {
        item_id: u32,
        expected: usize,
        actual: usize,
    },

    #[error("item {item_id}: thresholds must be finite and strictly increasing")]
    ThresholdOrder { item_id: u32 },

    #[error("item {item_id}: discrimination must be finite and positive, got {value}")]
    Discrimination { item_id: u32, value: f64 },

    #[error("min_items must be at least 1")]
    MinItems,

    #[error("min_items ({min_items}) exceeds max_items ({max_items})")]
    ItemLimits { min_items: usize, max_items: usize },

    #[error("min_sem must be finite and positive, got {value}")]
    MinSem { value: f64 },

    #[error("exposure control top_k must be at least 1")]
    TopK,

    #[error("simulated population is empty")]
    EmptyPopulation,

    #[error("failed to parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },

    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Recoverable per-response rejections. The session is left untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("category {category} is outside 1..={category_count} for item {item_id}")]
    CategoryOutOfRange {
        item_id: u32,
        category: u32,
        category_count: usize,
    },

    #[error("item {item_id} is not awaiting a response (pending: {pending:?})")]
    UnexpectedItem { item_id: u32, pending: Option<u32> },

    #[error("response addressed to session {received}, this is session {expected}")]
    WrongSession { expected: String, received: String },
}

/// MAP optimisation failures. Callers fall back to EAP; never surfaced as fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EstimationError {
    #[error("MAP did not converge within {iterations} iterations")]
    IterationLimit { iterations: usize },

    #[error("log-posterior is not concave at theta {theta}")]
    NonConcave { theta: f64 },

    #[error("line search could not improve the log-posterior at theta {theta}")]
    LineSearch { theta: f64 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("session {session_id} has already finished with status {status}")]
    SessionFinished { session_id: String, status: String },
}

pub type CatResult<T> = Result<T, CatError>;
