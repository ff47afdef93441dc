//! Declarative verification plan
//!
//! The plan describes the events-site check as data: which listing to find on
//! the index page, which fields the detail page must show, and where the
//! captures go. It compiles into the ordered [`Step`] list the runner walks.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{VerifyError, VerifyResult};

/// A verification plan, usually the built-in one, optionally loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerificationPlan {
    /// Name used in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Path of the index page relative to the base URL; empty is the base
    /// URL itself
    #[serde(default = "default_index_path")]
    pub index_path: String,

    /// Text of the listing that must appear on the index and is clicked
    #[serde(default = "default_listing")]
    pub listing: String,

    /// Text fragments the detail page must show
    #[serde(default = "default_detail_fields")]
    pub detail_fields: Vec<String>,

    /// Capture file names inside the artifact directory
    #[serde(default)]
    pub captures: CaptureNames,

    /// Capture the full scrollable page instead of the viewport
    #[serde(default = "default_full_page")]
    pub full_page: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureNames {
    #[serde(default = "default_index_capture")]
    pub index: String,
    #[serde(default = "default_detail_capture")]
    pub detail: String,
    #[serde(default = "default_failure_capture")]
    pub failure: String,
}

impl Default for CaptureNames {
    fn default() -> Self {
        Self {
            index: default_index_capture(),
            detail: default_detail_capture(),
            failure: default_failure_capture(),
        }
    }
}

fn default_name() -> String {
    "event-detail".to_string()
}

fn default_index_path() -> String {
    String::new()
}

fn default_listing() -> String {
    "Test Event 1".to_string()
}

fn default_detail_fields() -> Vec<String> {
    [
        "Categories",
        "Music",
        "Child Friendly",
        "Ages",
        "21+",
        "Price",
        "$15",
        "Source",
        "Somerville Theatre",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_index_capture() -> String {
    "index.png".to_string()
}

fn default_detail_capture() -> String {
    "detail.png".to_string()
}

fn default_failure_capture() -> String {
    "failure.png".to_string()
}

fn default_full_page() -> bool {
    true
}

impl Default for VerificationPlan {
    fn default() -> Self {
        Self {
            name: default_name(),
            index_path: default_index_path(),
            listing: default_listing(),
            detail_fields: default_detail_fields(),
            captures: CaptureNames::default(),
            full_page: default_full_page(),
        }
    }
}

/// Which capture a screenshot step produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    Index,
    Detail,
    Failure,
}

/// A single step of the compiled procedure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Load the index page (path relative to the base URL)
    Navigate { path: String },
    /// Poll until the text is visible
    AssertVisible { text: String },
    /// Click the element matching the text
    Click { text: String },
    /// Write a screenshot
    Screenshot { capture: Capture, full_page: bool },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Navigate { path } => write!(f, "navigate:{}", path),
            Step::AssertVisible { text } => write!(f, "assert-visible:{}", text),
            Step::Click { text } => write!(f, "click:{}", text),
            Step::Screenshot { capture, .. } => write!(f, "screenshot:{:?}", capture),
        }
    }
}

impl VerificationPlan {
    /// Parse a plan from a YAML string
    pub fn from_yaml(yaml: &str) -> VerifyResult<Self> {
        let plan: Self = serde_yaml::from_str(yaml)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Parse a plan from a YAML file
    pub fn from_file(path: &Path) -> VerifyResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> VerifyResult<()> {
        if self.listing.trim().is_empty() {
            return Err(VerifyError::Plan("listing must not be empty".into()));
        }
        if self.detail_fields.is_empty() {
            return Err(VerifyError::Plan("detail_fields must not be empty".into()));
        }
        if let Some(i) = self.detail_fields.iter().position(|f| f.trim().is_empty()) {
            return Err(VerifyError::Plan(format!("detail_fields[{}] is blank", i)));
        }

        let names = [
            &self.captures.index,
            &self.captures.detail,
            &self.captures.failure,
        ];
        for name in names {
            let bare = Path::new(name.as_str())
                .file_name()
                .map(|f| f == name.as_str())
                .unwrap_or(false);
            if !bare || !name.ends_with(".png") {
                return Err(VerifyError::Plan(format!(
                    "capture name {:?} must be a bare file name ending in .png",
                    name
                )));
            }
        }
        if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
            return Err(VerifyError::Plan("capture names must be distinct".into()));
        }

        Ok(())
    }

    /// Compile the plan into its ordered step list
    pub fn steps(&self) -> Vec<Step> {
        let mut steps = vec![
            Step::Navigate {
                path: self.index_path.clone(),
            },
            Step::AssertVisible {
                text: self.listing.clone(),
            },
            Step::Screenshot {
                capture: Capture::Index,
                full_page: self.full_page,
            },
            // No wait after the click: the following assertions poll.
            Step::Click {
                text: self.listing.clone(),
            },
        ];
        steps.extend(
            self.detail_fields
                .iter()
                .map(|text| Step::AssertVisible { text: text.clone() }),
        );
        steps.push(Step::Screenshot {
            capture: Capture::Detail,
            full_page: self.full_page,
        });
        steps
    }

    /// File name for a capture
    pub fn capture_name(&self, capture: Capture) -> &str {
        match capture {
            Capture::Index => &self.captures.index,
            Capture::Detail => &self.captures.detail,
            Capture::Failure => &self.captures.failure,
        }
    }
}
