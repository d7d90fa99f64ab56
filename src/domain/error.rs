//! Domain error types.

/// Top-level error type for siegfried.
#[derive(Debug, thiserror::Error)]
pub enum SiegfriedError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("{ticker}: no {statement} label matches field {field} (available: {})", .available.join(", "))]
    FieldNotFound {
        ticker: String,
        field: String,
        statement: String,
        available: Vec<String>,
    },

    #[error("data source error for {ticker}: {reason}")]
    DataSource { ticker: String, reason: String },

    #[error("universe unavailable: {reason}")]
    UniverseUnavailable { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SiegfriedError {
    pub fn data_source(ticker: &str, reason: impl Into<String>) -> Self {
        SiegfriedError::DataSource {
            ticker: ticker.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        SiegfriedError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether a retry has any chance of producing a different outcome.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SiegfriedError::DataSource { .. } | SiegfriedError::Database { .. }
        )
    }
}

impl From<&SiegfriedError> for std::process::ExitCode {
    fn from(err: &SiegfriedError) -> Self {
        let code: u8 = match err {
            SiegfriedError::Io(_) | SiegfriedError::Csv(_) => 1,
            SiegfriedError::ConfigParse { .. }
            | SiegfriedError::ConfigMissing { .. }
            | SiegfriedError::ConfigInvalid { .. } => 2,
            SiegfriedError::FieldNotFound { .. }
            | SiegfriedError::DataSource { .. }
            | SiegfriedError::Database { .. } => 3,
            SiegfriedError::UniverseUnavailable { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_not_found_lists_available_labels() {
        let err = SiegfriedError::FieldNotFound {
            ticker: "AAPL".into(),
            field: "total_debt".into(),
            statement: "balance".into(),
            available: vec!["TotalAssets".into(), "TotalLiabilities".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("AAPL"));
        assert!(msg.contains("total_debt"));
        assert!(msg.contains("TotalAssets, TotalLiabilities"));
    }

    #[test]
    fn only_source_errors_are_transient() {
        assert!(SiegfriedError::data_source("X", "timeout").is_transient());
        assert!(!SiegfriedError::invalid("screen", "tax_rate", "bad").is_transient());
        assert!(
            !SiegfriedError::UniverseUnavailable {
                reason: "gone".into()
            }
            .is_transient()
        );
    }
}
