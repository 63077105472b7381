use thiserror::Error;

#[derive(Error, Debug)]
pub enum CortexError {
    // Validation errors
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // Collection errors
    #[error("collection not found: {name}")]
    CollectionNotFound { name: String },

    #[error("collection already exists: {name}")]
    CollectionAlreadyExists { name: String },

    // Record errors
    #[error("vector not found: {id}")]
    VectorNotFound { id: u64 },

    // Recovery errors
    #[error("corrupt log: {0}")]
    CorruptLog(String),

    // Index errors
    #[error("index integrity violated: {0}")]
    IndexIntegrity(String),

    // Serialization errors
    #[error("bincode serialization error: {0}")]
    Bincode(String),

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    // IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Box<bincode::ErrorKind>> for CortexError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        CortexError::Bincode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CortexError>;
