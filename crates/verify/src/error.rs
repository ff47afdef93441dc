//! Error types for UI verification

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("expected text {text:?} to be visible within {}ms ({attempts} probes)", timeout.as_millis())]
    Assertion {
        text: String,
        timeout: Duration,
        attempts: usize,
    },

    #[error("click on text {text:?} failed: {reason}")]
    Click { text: String, reason: String },

    #[error("screenshot to {} failed: {reason}", path.display())]
    Capture { path: PathBuf, reason: String },

    /// The diagnostic screenshot taken after a failed run could not be written.
    #[error("failure screenshot could not be captured after \"{original}\": {source}")]
    FailureCapture {
        original: String,
        #[source]
        source: Box<VerifyError>,
    },

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Playwright driver error: {0}")]
    Driver(String),

    #[error("invalid verification plan: {0}")]
    Plan(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type VerifyResult<T> = Result<T, VerifyError>;
