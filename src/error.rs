use thiserror::Error;

/// Errors raised while loading input tables or computing statistics.
///
/// There is deliberately no recovery path: a malformed input terminates the
/// run with one of these.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {path} line {line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("Distance matrix is not square: {0}")]
    MatrixShape(String),

    #[error("Sample not found: {0}")]
    UnknownSample(String),

    #[error("Missing column '{column}' in {path}")]
    MissingColumn { path: String, column: String },

    #[error("{locations} unique collection locations but {names} site names; counts must match")]
    SiteCountMismatch { locations: usize, names: usize },

    #[error("{sites} sites exceed the {palette} available marker/colour pairs")]
    PaletteExhausted { sites: usize, palette: usize },

    #[error("Site '{0}' has a single sample; within-site distance is undefined")]
    SingletonSite(String),

    #[error("No samples outside site '{0}' to compare against")]
    NoComplement(String),

    #[error("PCoA failed: {0}")]
    Pcoa(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
