//! Events UI verification
//!
//! Drives a headless browser through the events site and checks that a
//! listing and its detail page render the expected text:
//! - Loads the index and asserts the listing is visible
//! - Clicks through to the detail view and asserts every detail field
//! - Captures index and detail screenshots, or a failure screenshot
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  VerificationRunner                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  run(page, stdout) -> Outcome                               │
//! │    ├── verify(page): plan.steps() in order                  │
//! │    │     ├── navigate { path }                              │
//! │    │     ├── assert_visible { text }  (poll with timeout)   │
//! │    │     ├── click { text }                                 │
//! │    │     └── screenshot { capture }                         │
//! │    ├── on failure: print, failure screenshot                │
//! │    └── page.close()  (every path)                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserPage (trait)                                        │
//! │    └── PlaywrightPage: node driver, JSON lines on stdio     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifact;
pub mod error;
pub mod page;
pub mod plan;
pub mod playwright;
pub mod poll;
pub mod runner;
pub mod target;

pub use error::{VerifyError, VerifyResult};
pub use page::BrowserPage;
pub use plan::{Capture, Step, VerificationPlan};
pub use runner::{Outcome, RunnerConfig, VerificationRunner};
