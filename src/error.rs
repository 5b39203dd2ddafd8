use thiserror::Error;

/// Result alias used throughout the analysis pipeline
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors produced by the analysis core.
///
/// None of these are transient. Callers never retry; they either skip the
/// affected section or surface the error.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("model fit failed: {0}")]
    ModelFit(String),

    #[error("unknown state: {0}")]
    UnknownState(String),

    #[error("no data available for {month}/{year}")]
    NoData { year: i32, month: u32 },

    #[error("invalid record on line {line}: {reason}")]
    Data { line: u64, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl AnalysisError {
    /// Errors after which a dashboard section is silently skipped
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            AnalysisError::InsufficientData { .. } | AnalysisError::UnknownState(_)
        )
    }

    pub(crate) fn model_fit(msg: impl Into<String>) -> Self {
        AnalysisError::ModelFit(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skippable_policy() {
        assert!(AnalysisError::InsufficientData { needed: 14, got: 3 }.is_skippable());
        assert!(AnalysisError::UnknownState("Goa".into()).is_skippable());
        assert!(!AnalysisError::model_fit("NaN").is_skippable());
        assert!(!AnalysisError::NoData { year: 2025, month: 7 }.is_skippable());
    }

    #[test]
    fn test_error_messages() {
        let err = AnalysisError::InsufficientData { needed: 14, got: 3 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 14 observations, got 3"
        );
        let err = AnalysisError::NoData { year: 2025, month: 7 };
        assert_eq!(err.to_string(), "no data available for 7/2025");
    }
}
