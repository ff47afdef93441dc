//! Browser page capability consumed by the runner

use std::path::Path;

use async_trait::async_trait;

use crate::error::VerifyResult;

/// One browser tab, exclusively owned by whoever drives it.
///
/// Implementations report step failures as the matching [`VerifyError`]
/// variant (`Navigation`, `Click`, `Capture`) so the runner can print them
/// verbatim. `close` consumes the page, which makes releasing it twice a
/// compile error; implementations should still clean up in `Drop` when a page
/// is dropped without being closed.
///
/// [`VerifyError`]: crate::error::VerifyError
#[async_trait]
pub trait BrowserPage: Send + Sized {
    /// Load `url` and wait for the page to finish loading.
    async fn navigate(&mut self, url: &str) -> VerifyResult<()>;

    /// Single probe: is any element matching `text` visible right now?
    ///
    /// Must not wait. Transient errors (for example a navigation in flight)
    /// are reported as `Ok(false)`.
    async fn is_text_visible(&mut self, text: &str) -> VerifyResult<bool>;

    /// Click the element matching `text`.
    async fn click(&mut self, text: &str) -> VerifyResult<()>;

    /// Write a screenshot to `path`, replacing any existing file.
    async fn screenshot(&mut self, path: &Path, full_page: bool) -> VerifyResult<()>;

    /// Release the page and the browser behind it.
    async fn close(self) -> VerifyResult<()>;
}
