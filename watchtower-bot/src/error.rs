use reqwest::StatusCode;
use thiserror::Error;

/// Why an alert did not reach the webhook. Never retried.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("webhook rejected the alert with {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}
