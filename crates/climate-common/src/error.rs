//! Error types for climate-shock services.

use thiserror::Error;

/// Result type alias using ClimateError.
pub type ClimateResult<T> = Result<T, ClimateError>;

/// Primary error type for climate data operations.
#[derive(Debug, Error)]
pub enum ClimateError {
    // === Input Errors ===
    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Unsupported scenario: {0}")]
    InvalidScenario(String),

    #[error("Unsupported threshold basis: {0}")]
    InvalidBasis(String),

    #[error("Unknown region code: {0}")]
    UnknownRegion(String),

    // === Data Errors ===
    #[error("Cannot resolve latitude/longitude coordinates: {0}")]
    MissingCoordinate(String),

    #[error("Cannot resolve data variable: {0}")]
    MissingVariable(String),

    #[error("No time samples in requested period: {0}")]
    EmptyWindow(String),

    #[error("No usable data: {context}; first errors: {errors:?}")]
    NoUsableData {
        context: String,
        errors: Vec<String>,
    },

    #[error("Reference map not built: {0}")]
    MissingReferenceMap(String),

    #[error("Country mask not built: {0}")]
    MaskNotBuilt(String),

    #[error("Mask grid does not match canonical grid: {0}")]
    AlignmentMismatch(String),

    #[error("Catalog not found: {0}")]
    CatalogNotFound(String),

    #[error("Invalid NetCDF data: {0}")]
    NetCdfError(String),

    // === Storage Errors ===
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    // === Infrastructure Errors ===
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ClimateError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            ClimateError::InvalidParameter { .. }
            | ClimateError::InvalidScenario(_)
            | ClimateError::InvalidBasis(_) => 400,

            ClimateError::UnknownRegion(_)
            | ClimateError::CatalogNotFound(_)
            | ClimateError::MaskNotBuilt(_)
            | ClimateError::MissingReferenceMap(_) => 404,

            ClimateError::NoUsableData { .. } | ClimateError::EmptyWindow(_) => 422,

            ClimateError::AlignmentMismatch(_) => 409,

            _ => 500,
        }
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create a NoUsableData error, keeping at most the first five
    /// underlying member errors for diagnosis.
    pub fn no_usable_data(context: impl Into<String>, errors: &[String]) -> Self {
        Self::NoUsableData {
            context: context.into(),
            errors: errors.iter().take(5).cloned().collect(),
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for ClimateError {
    fn from(err: std::io::Error) -> Self {
        ClimateError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for ClimateError {
    fn from(err: serde_json::Error) -> Self {
        ClimateError::InternalError(format!("JSON error: {}", err))
    }
}
