use std::fmt;

pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_INTERNAL: u16 = 500;

const DEFAULT_MESSAGE: &str = "An error occurred while processing your request";

/// A failure that is safe to show to whoever asked for the chart.
///
/// `message` is what the user sees. `internal` carries diagnostic detail for
/// the log only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicError {
    pub status: u16,
    pub message: String,
    pub internal: Option<String>,
}

impl PublicError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            internal: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(STATUS_NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(STATUS_BAD_REQUEST, message)
    }

    /// Wraps an unexpected error: generic message, detail kept internal.
    pub fn from_internal(err: impl fmt::Display) -> Self {
        Self {
            status: STATUS_INTERNAL,
            message: DEFAULT_MESSAGE.to_string(),
            internal: Some(err.to_string()),
        }
    }

    pub fn with_internal(mut self, detail: impl Into<String>) -> Self {
        self.internal = Some(detail.into());
        self
    }

    /// Logs the internal detail and returns the text to show the user.
    pub fn report(&self) -> &str {
        match &self.internal {
            Some(detail) => log::error!("[{}] {}: {detail}", self.status, self.message),
            None => log::info!("[{}] {}", self.status, self.message),
        }
        &self.message
    }

    /// Converts any error into a `PublicError`, keeping one if it already is.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<PublicError>() {
            Ok(public) => public,
            Err(other) => Self::from_internal(format!("{other:#}")),
        }
    }
}

impl fmt::Display for PublicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PublicError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_get_generic_message() {
        let err = PublicError::from_internal("connection reset by peer");
        assert_eq!(err.status, 500);
        assert_eq!(err.to_string(), DEFAULT_MESSAGE);
        assert_eq!(err.internal.as_deref(), Some("connection reset by peer"));
    }

    #[test]
    fn public_message_is_kept() {
        let err = PublicError::not_found("No active sprints were found");
        assert_eq!(err.status, 404);
        assert_eq!(err.report(), "No active sprints were found");
    }

    #[test]
    fn report_never_returns_internal_detail() {
        let err = PublicError::bad_request("bad size").with_internal("secret stack");
        assert!(!err.report().contains("secret"));
    }

    #[test]
    fn anyhow_keeps_public_errors() {
        let public = PublicError::not_found("gone");
        let converted = PublicError::from_anyhow(anyhow::Error::new(public.clone()));
        assert_eq!(converted, public);
    }

    #[test]
    fn anyhow_wraps_other_errors() {
        let converted = PublicError::from_anyhow(anyhow::anyhow!("boom"));
        assert_eq!(converted.status, 500);
        assert_eq!(converted.internal.as_deref(), Some("boom"));
    }
}
