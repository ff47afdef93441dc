//! events-ui-verify entry point
//!
//! Prints `Verification successful!` or `Verification failed: ...` on stdout.
//! Logs go to stderr. Exits 0 whenever the run completes, pass or fail, and
//! 2 when the run itself breaks down.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use events_ui_verify::playwright::{Browser, PlaywrightConfig, PlaywrightPage};
use events_ui_verify::poll::PollPolicy;
use events_ui_verify::runner::{RunnerConfig, VerificationRunner};
use events_ui_verify::target::parse_base_url;
use events_ui_verify::{Outcome, VerificationPlan, VerifyResult};

#[derive(Parser, Debug)]
#[command(name = "events-ui-verify")]
#[command(author, version, about = "Headless browser check of the events listing and detail pages")]
struct Args {
    /// Base URL of the running events site
    #[arg(long, env = "EVENTS_VERIFY_BASE_URL", default_value = "http://localhost:8080/")]
    base_url: String,

    /// Directory for the index, detail and failure screenshots
    #[arg(long, env = "EVENTS_VERIFY_ARTIFACT_DIR", default_value = "verification")]
    artifact_dir: PathBuf,

    /// YAML plan overriding the built-in listing, fields and capture names
    #[arg(long, env = "EVENTS_VERIFY_PLAN")]
    plan: Option<PathBuf>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, env = "EVENTS_VERIFY_BROWSER", default_value = "chromium")]
    browser: Browser,

    /// Run the browser without a window
    #[arg(long, env = "EVENTS_VERIFY_HEADLESS", default_value_t = true, action = clap::ArgAction::Set)]
    headless: bool,

    /// Viewport width
    #[arg(long, default_value = "1280")]
    viewport_width: u32,

    /// Viewport height
    #[arg(long, default_value = "720")]
    viewport_height: u32,

    /// How long an assertion keeps polling for its text
    #[arg(long, env = "EVENTS_VERIFY_ASSERT_TIMEOUT_MS", default_value = "5000")]
    assert_timeout_ms: u64,

    /// Delay between visibility probes
    #[arg(long, default_value = "100")]
    poll_interval_ms: u64,

    /// Page load timeout
    #[arg(long, default_value = "30000")]
    navigation_timeout_ms: u64,

    /// Click and screenshot timeout
    #[arg(long, default_value = "30000")]
    action_timeout_ms: u64,

    /// Poll the index URL over HTTP for this long before navigating
    #[arg(long, env = "EVENTS_VERIFY_WAIT_FOR_TARGET_MS")]
    wait_for_target_ms: Option<u64>,

    /// node executable used to run Playwright
    #[arg(long, env = "EVENTS_VERIFY_NODE", default_value = "node")]
    node: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(outcome) => {
            info!("Run complete (success: {})", outcome.is_success());
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> VerifyResult<Outcome> {
    let plan = match &args.plan {
        Some(path) => VerificationPlan::from_file(path)?,
        None => VerificationPlan::default(),
    };

    let config = RunnerConfig {
        base_url: parse_base_url(&args.base_url)?,
        artifact_dir: args.artifact_dir,
        plan,
        poll: PollPolicy {
            timeout: Duration::from_millis(args.assert_timeout_ms),
            interval: Duration::from_millis(args.poll_interval_ms),
        },
        wait_for_target: args.wait_for_target_ms.map(Duration::from_millis),
    };
    let runner = VerificationRunner::new(config)?;

    let playwright = PlaywrightConfig {
        browser: args.browser,
        headless: args.headless,
        viewport_width: args.viewport_width,
        viewport_height: args.viewport_height,
        navigation_timeout: Duration::from_millis(args.navigation_timeout_ms),
        action_timeout: Duration::from_millis(args.action_timeout_ms),
        node_binary: args.node,
        ..Default::default()
    };
    let page = PlaywrightPage::launch(&playwright).await?;

    let mut stdout = std::io::stdout();
    runner.run(page, &mut stdout).await
}
