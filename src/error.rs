//! Error taxonomy shared by the loader, pipeline stages and credential store.

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Unsupported file type: {0}. Upload a .csv, .txt, .xlsx, .xls, .xlsm, .xlsb or .ods file")]
    UnsupportedFormat(String),

    #[error("No common columns found to merge sheets '{primary}' and '{secondary}'")]
    NoCommonColumn { primary: String, secondary: String },

    #[error("Invalid age bins: {0}")]
    InvalidBinSpec(String),

    #[error("Invalid username or password")]
    Authentication,

    #[error("Username '{0}' already exists. Choose a different one")]
    DuplicateUsername(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Error processing data: {0}")]
    Processing(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;

impl DashboardError {
    /// Credential errors are shown inline on the login/sign-up form; everything else
    /// halts rendering of the dashboard for the current interaction.
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication | Self::DuplicateUsername(_) | Self::PasswordMismatch
        )
    }
}

impl From<PolarsError> for DashboardError {
    fn from(err: PolarsError) -> Self {
        Self::Processing(crate::error_display::user_message_from_polars(&err))
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> Self {
        Self::Processing(crate::error_display::user_message_from_io(&err, None))
    }
}

impl From<calamine::Error> for DashboardError {
    fn from(err: calamine::Error) -> Self {
        Self::Processing(format!("Spreadsheet: {}", err))
    }
}

impl From<rusqlite::Error> for DashboardError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Processing(format!("Credential store: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_are_classified() {
        assert!(DashboardError::Authentication.is_credential_error());
        assert!(DashboardError::PasswordMismatch.is_credential_error());
        assert!(DashboardError::DuplicateUsername("alice".into()).is_credential_error());
        assert!(!DashboardError::InvalidBinSpec("x".into()).is_credential_error());
        assert!(!DashboardError::Processing("x".into()).is_credential_error());
    }

    #[test]
    fn polars_errors_become_processing_errors() {
        let err: DashboardError = PolarsError::ColumnNotFound("amount".into()).into();
        match err {
            DashboardError::Processing(msg) => assert!(msg.contains("amount")),
            other => panic!("expected Processing, got {other:?}"),
        }
    }
}
