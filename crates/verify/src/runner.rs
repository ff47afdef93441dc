//! Verification runner: walks the plan against one page and reports the verdict

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use reqwest::Url;
use tracing::{debug, error, info, warn};

use crate::artifact::ArtifactDir;
use crate::error::{VerifyError, VerifyResult};
use crate::page::BrowserPage;
use crate::plan::{Capture, Step, VerificationPlan};
use crate::poll::{wait_until_visible, PollPolicy};
use crate::target;

pub const SUCCESS_MESSAGE: &str = "Verification successful!";
pub const FAILURE_PREFIX: &str = "Verification failed:";

/// Verdict of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed { message: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    /// The line printed on stdout
    pub fn console_line(&self) -> String {
        match self {
            Outcome::Passed => SUCCESS_MESSAGE.to_string(),
            Outcome::Failed { message } => format!("{} {}", FAILURE_PREFIX, message),
        }
    }
}

/// Configuration for the runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_url: Url,
    pub artifact_dir: PathBuf,
    pub plan: VerificationPlan,
    pub poll: PollPolicy,
    /// Probe the index URL over HTTP before navigating
    pub wait_for_target: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:8080/").expect("static URL parses"),
            artifact_dir: PathBuf::from("verification"),
            plan: VerificationPlan::default(),
            poll: PollPolicy::default(),
            wait_for_target: None,
        }
    }
}

/// Runs the verification plan against a single page
pub struct VerificationRunner {
    config: RunnerConfig,
    artifacts: ArtifactDir,
}

impl VerificationRunner {
    pub fn new(config: RunnerConfig) -> VerifyResult<Self> {
        config.plan.validate()?;
        let artifacts = ArtifactDir::new(config.artifact_dir.clone(), &config.plan);
        Ok(Self { config, artifacts })
    }

    /// Run the plan, print the verdict to `out` and release the page.
    ///
    /// Step failures become [`Outcome::Failed`] after a failure screenshot.
    /// An error is returned only when the run itself breaks down: the failure
    /// screenshot could not be written, the console could not be written, or
    /// the page did not close cleanly. The page is closed exactly once on
    /// every path.
    pub async fn run<P, W>(&self, mut page: P, out: &mut W) -> VerifyResult<Outcome>
    where
        P: BrowserPage,
        W: Write,
    {
        let result = self.report(&mut page, out).await;

        let closed = page.close().await;
        if let Err(e) = &closed {
            warn!("Releasing the page failed: {}", e);
        }

        let outcome = result?;
        closed?;
        Ok(outcome)
    }

    async fn report<P, W>(&self, page: &mut P, out: &mut W) -> VerifyResult<Outcome>
    where
        P: BrowserPage,
        W: Write,
    {
        let start = Instant::now();

        let outcome = match self.verify(page).await {
            Ok(()) => Outcome::Passed,
            Err(e) => {
                error!("{} failed: {}", self.config.plan.name, e);
                Outcome::Failed {
                    message: e.to_string(),
                }
            }
        };

        writeln!(out, "{}", outcome.console_line())?;
        out.flush()?;

        if let Outcome::Failed { message } = &outcome {
            let path = self.artifacts.path(Capture::Failure);
            page.screenshot(path, self.config.plan.full_page)
                .await
                .map_err(|e| VerifyError::FailureCapture {
                    original: message.clone(),
                    source: Box::new(e),
                })?;
            self.artifacts.record(Capture::Failure);
        }

        info!(
            "{} {} in {} ms",
            self.config.plan.name,
            if outcome.is_success() { "passed" } else { "failed" },
            start.elapsed().as_millis()
        );
        Ok(outcome)
    }

    /// Execute every step in order, stopping at the first failure
    pub async fn verify<P: BrowserPage>(&self, page: &mut P) -> VerifyResult<()> {
        self.artifacts.prepare()?;

        let steps = self.config.plan.steps();
        info!(
            "Running {} ({} steps) against {}",
            self.config.plan.name,
            steps.len(),
            self.config.base_url
        );

        for (i, step) in steps.iter().enumerate() {
            let start = Instant::now();
            debug!("Step {}/{}: {}", i + 1, steps.len(), step);

            self.execute(page, step).await?;

            info!("✓ {} ({} ms)", step, start.elapsed().as_millis());
        }

        Ok(())
    }

    async fn execute<P: BrowserPage>(&self, page: &mut P, step: &Step) -> VerifyResult<()> {
        match step {
            Step::Navigate { path } => {
                let url = target::resolve(&self.config.base_url, path)?;
                if let Some(window) = self.config.wait_for_target {
                    target::wait_for_target(&url, window).await?;
                }
                page.navigate(&url).await
            }
            Step::AssertVisible { text } => wait_until_visible(page, text, self.config.poll).await,
            Step::Click { text } => page.click(text).await,
            Step::Screenshot { capture, full_page } => {
                page.screenshot(self.artifacts.path(*capture), *full_page)
                    .await?;
                self.artifacts.record(*capture);
                Ok(())
            }
        }
    }
}
