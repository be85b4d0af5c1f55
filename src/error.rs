use thiserror::Error;

/// Exporter error types
#[derive(Debug, Error)]
pub enum ExporterError {
    /// Malformed duration configuration (startup-fatal)
    #[error("Invalid window format '{input}': {reason}")]
    InvalidWindowFormat { input: String, reason: String },

    /// Datastore still failing after all retry attempts
    #[error("Data source unavailable after {attempts} attempt(s): {source}")]
    DataSourceUnavailable {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    /// A query result did not match its typed row record
    #[error("Failed to decode '{query}' row: {source}")]
    Decode {
        query: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExporterError {
    /// Short machine-friendly name used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidWindowFormat { .. } => "invalid_window_format",
            Self::DataSourceUnavailable { .. } => "data_source_unavailable",
            Self::Decode { .. } => "decode_error",
            Self::Config(_) => "config_error",
        }
    }
}

/// Whether a sqlx error comes from decoding a row rather than reaching or
/// querying the datastore
pub fn is_decode_error(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. }
    )
}
