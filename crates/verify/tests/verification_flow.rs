//! Runner behaviour against a simulated events site
//!
//! `FakePage` stands in for the browser: it renders an index view and a
//! detail view as lists of visible strings and writes a small file for each
//! screenshot.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use test_case::test_case;

use events_ui_verify::poll::PollPolicy;
use events_ui_verify::runner::FAILURE_PREFIX;
use events_ui_verify::target::parse_base_url;
use events_ui_verify::{
    BrowserPage, Outcome, RunnerConfig, VerificationPlan, VerificationRunner, VerifyError,
    VerifyResult,
};

const DETAIL_FIELDS: [&str; 9] = [
    "Categories",
    "Music",
    "Child Friendly",
    "Ages",
    "21+",
    "Price",
    "$15",
    "Source",
    "Somerville Theatre",
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum View {
    Blank,
    Index,
    Detail,
}

/// What the simulated site serves
#[derive(Clone)]
struct Site {
    reachable: bool,
    index: Vec<String>,
    detail: Vec<String>,
    /// Probes answered "not visible" right after the click
    click_latency_probes: usize,
    /// Screenshot file names that fail to write
    broken_captures: Vec<String>,
}

impl Site {
    fn healthy() -> Self {
        let mut detail = vec!["Test Event 1".to_string()];
        detail.extend(DETAIL_FIELDS.iter().map(|s| s.to_string()));
        Self {
            reachable: true,
            index: vec!["Upcoming events".into(), "Test Event 1".into(), "Test Event 2".into()],
            detail,
            click_latency_probes: 0,
            broken_captures: Vec::new(),
        }
    }

    fn without_detail_field(mut self, field: &str) -> Self {
        self.detail.retain(|f| f != field);
        self
    }
}

#[derive(Default)]
struct Observed {
    calls: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl Observed {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct FakePage {
    site: Site,
    view: View,
    pending_latency: usize,
    observed: Arc<Observed>,
}

impl FakePage {
    fn new(site: Site) -> (Self, Arc<Observed>) {
        let observed = Arc::new(Observed::default());
        let page = Self {
            site,
            view: View::Blank,
            pending_latency: 0,
            observed: observed.clone(),
        };
        (page, observed)
    }

    fn log(&self, call: String) {
        self.observed.calls.lock().unwrap().push(call);
    }

    fn visible(&self) -> &[String] {
        match self.view {
            View::Blank => &[],
            View::Index => &self.site.index,
            View::Detail => &self.site.detail,
        }
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn navigate(&mut self, url: &str) -> VerifyResult<()> {
        self.log(format!("navigate:{}", url));
        if !self.site.reachable {
            return Err(VerifyError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_REFUSED".into(),
            });
        }
        self.view = View::Index;
        Ok(())
    }

    async fn is_text_visible(&mut self, text: &str) -> VerifyResult<bool> {
        self.log(format!("probe:{}", text));
        if self.pending_latency > 0 {
            self.pending_latency -= 1;
            return Ok(false);
        }
        Ok(self.visible().iter().any(|t| t.contains(text)))
    }

    async fn click(&mut self, text: &str) -> VerifyResult<()> {
        self.log(format!("click:{}", text));
        if self.view == View::Index && self.visible().iter().any(|t| t == text) {
            self.view = View::Detail;
            self.pending_latency = self.site.click_latency_probes;
            Ok(())
        } else {
            Err(VerifyError::Click {
                text: text.to_string(),
                reason: "no element matches".into(),
            })
        }
    }

    async fn screenshot(&mut self, path: &Path, _full_page: bool) -> VerifyResult<()> {
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        self.log(format!("screenshot:{}", name));
        if self.site.broken_captures.contains(&name) {
            return Err(VerifyError::Capture {
                path: path.to_path_buf(),
                reason: "disk full".into(),
            });
        }
        std::fs::write(path, format!("{:?}", self.view))?;
        Ok(())
    }

    async fn close(self) -> VerifyResult<()> {
        self.observed.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    _tmp: TempDir,
    dir: PathBuf,
    runner: VerificationRunner,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(adjust: impl FnOnce(&mut RunnerConfig)) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("verification");
        let mut config = RunnerConfig {
            artifact_dir: dir.clone(),
            poll: PollPolicy {
                timeout: Duration::from_millis(50),
                interval: Duration::from_millis(1),
            },
            ..Default::default()
        };
        adjust(&mut config);
        let runner = VerificationRunner::new(config).unwrap();
        Self {
            _tmp: tmp,
            dir,
            runner,
        }
    }

    async fn run(&self, site: Site) -> (VerifyResult<Outcome>, String, Arc<Observed>) {
        let (page, observed) = FakePage::new(site);
        let mut out = Vec::new();
        let result = self.runner.run(page, &mut out).await;
        (result, String::from_utf8(out).unwrap(), observed)
    }

    fn exists(&self, name: &str) -> bool {
        self.dir.join(name).exists()
    }
}

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(fut)
}

#[tokio::test]
async fn test_happy_path_passes_with_two_captures() {
    let harness = Harness::new();
    let (result, out, observed) = harness.run(Site::healthy()).await;

    assert_eq!(result.unwrap(), Outcome::Passed);
    assert_eq!(out, "Verification successful!\n");
    assert!(harness.exists("index.png"));
    assert!(harness.exists("detail.png"));
    assert!(!harness.exists("failure.png"));
    assert_eq!(observed.closes(), 1);

    assert_eq!(
        std::fs::read_to_string(harness.dir.join("detail.png")).unwrap(),
        "Detail"
    );
}

#[tokio::test]
async fn test_steps_run_in_order() {
    let harness = Harness::new();
    let (result, _, observed) = harness.run(Site::healthy()).await;
    assert!(result.unwrap().is_success());

    let mut expected = vec![
        "navigate:http://localhost:8080/".to_string(),
        "probe:Test Event 1".to_string(),
        "screenshot:index.png".to_string(),
        "click:Test Event 1".to_string(),
    ];
    expected.extend(DETAIL_FIELDS.iter().map(|f| format!("probe:{}", f)));
    expected.push("screenshot:detail.png".to_string());

    assert_eq!(observed.calls(), expected);
}

#[tokio::test]
async fn test_missing_listing_fails_at_index() {
    let harness = Harness::new();
    let mut site = Site::healthy();
    site.index.retain(|t| t != "Test Event 1");

    let (result, out, observed) = harness.run(site).await;

    let outcome = result.unwrap();
    assert!(!outcome.is_success());
    assert!(out.starts_with(FAILURE_PREFIX));
    assert!(out.contains("\"Test Event 1\""));
    assert!(harness.exists("failure.png"));
    assert!(!harness.exists("index.png"));
    assert!(!harness.exists("detail.png"));
    assert_eq!(observed.closes(), 1);

    let calls = observed.calls();
    assert!(!calls.iter().any(|c| c.starts_with("click:")));
    assert_eq!(calls.last().unwrap(), "screenshot:failure.png");
}

#[tokio::test]
async fn test_missing_price_fails_at_detail() {
    let harness = Harness::new();
    let (result, out, observed) = harness
        .run(Site::healthy().without_detail_field("$15"))
        .await;

    match result.unwrap() {
        Outcome::Failed { message } => {
            assert!(message.contains("\"$15\""));
            assert_eq!(out, format!("Verification failed: {}\n", message));
        }
        Outcome::Passed => panic!("expected failure"),
    }
    assert!(harness.exists("index.png"));
    assert!(harness.exists("failure.png"));
    assert!(!harness.exists("detail.png"));

    // First failing assertion aborts the rest
    let calls = observed.calls();
    assert!(calls.contains(&"probe:Price".to_string()));
    assert!(!calls.contains(&"probe:Source".to_string()));
    assert!(!calls.contains(&"probe:Somerville Theatre".to_string()));
}

#[tokio::test]
async fn test_unreachable_target_fails_at_navigation() {
    let harness = Harness::new();
    let mut site = Site::healthy();
    site.reachable = false;

    let (result, out, observed) = harness.run(site).await;

    assert!(!result.unwrap().is_success());
    assert_eq!(
        out,
        "Verification failed: navigation to http://localhost:8080/ failed: net::ERR_CONNECTION_REFUSED\n"
    );
    assert!(harness.exists("failure.png"));
    assert!(!harness.exists("index.png"));
    assert!(!harness.exists("detail.png"));
    assert_eq!(observed.closes(), 1);
}

#[tokio::test]
async fn test_polling_absorbs_latency_after_click() {
    let harness = Harness::new();
    let mut site = Site::healthy();
    site.click_latency_probes = 5;

    let (result, _, observed) = harness.run(site).await;

    assert_eq!(result.unwrap(), Outcome::Passed);
    let categories_probes = observed
        .calls()
        .iter()
        .filter(|c| c.as_str() == "probe:Categories")
        .count();
    assert_eq!(categories_probes, 6);
}

#[tokio::test]
async fn test_latency_longer_than_timeout_fails() {
    let harness = Harness::with_config(|c| {
        c.poll = PollPolicy {
            timeout: Duration::from_millis(0),
            interval: Duration::from_millis(1),
        };
    });
    let mut site = Site::healthy();
    site.click_latency_probes = 1;

    let (result, out, _) = harness.run(site).await;

    assert!(!result.unwrap().is_success());
    assert!(out.contains("\"Categories\""));
}

#[tokio::test]
async fn test_failure_capture_error_propagates_after_release() {
    let harness = Harness::new();
    let mut site = Site::healthy().without_detail_field("Ages");
    site.broken_captures.push("failure.png".into());

    let (result, out, observed) = harness.run(site).await;

    match result {
        Err(VerifyError::FailureCapture { original, source }) => {
            assert!(original.contains("\"Ages\""));
            assert!(matches!(*source, VerifyError::Capture { .. }));
        }
        other => panic!("expected failure capture error, got {:?}", other),
    }
    // The verdict is printed before the diagnostic capture is attempted
    assert!(out.starts_with("Verification failed:"));
    assert_eq!(observed.closes(), 1);
}

#[tokio::test]
async fn test_broken_index_capture_is_a_step_failure() {
    let harness = Harness::new();
    let mut site = Site::healthy();
    site.broken_captures.push("index.png".into());

    let (result, out, observed) = harness.run(site).await;

    assert!(!result.unwrap().is_success());
    assert!(out.contains("index.png failed: disk full"));
    assert!(harness.exists("failure.png"));
    assert!(!observed.calls().iter().any(|c| c.starts_with("click:")));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let harness = Harness::new();

    let (first, first_out, _) = harness.run(Site::healthy()).await;
    let first_index = std::fs::read(harness.dir.join("index.png")).unwrap();
    let (second, second_out, _) = harness.run(Site::healthy()).await;
    let second_index = std::fs::read(harness.dir.join("index.png")).unwrap();

    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(first_out, second_out);
    assert_eq!(first_index, second_index);
}

#[tokio::test]
async fn test_custom_plan_and_base_url() {
    let plan = VerificationPlan::from_yaml(
        r#"
index_path: /events
listing: Jazz Night
detail_fields: [Price, Free]
captures:
  index: list.png
  detail: jazz.png
"#,
    )
    .unwrap();
    let harness = Harness::with_config(|c| {
        c.base_url = "https://staging.example.org/app/".parse().unwrap();
        c.plan = plan;
    });
    let site = Site {
        index: vec!["Jazz Night".into()],
        detail: vec!["Price".into(), "Free".into()],
        ..Site::healthy()
    };

    let (result, _, observed) = harness.run(site).await;

    assert_eq!(result.unwrap(), Outcome::Passed);
    assert_eq!(
        observed.calls()[0],
        "navigate:https://staging.example.org/app/events"
    );
    assert!(harness.exists("list.png"));
    assert!(harness.exists("jazz.png"));
}

#[tokio::test]
async fn test_default_plan_navigates_to_base_url_under_prefix() {
    let harness = Harness::with_config(|c| {
        c.base_url = parse_base_url("http://host:8080/events-site/").unwrap();
    });

    let (result, _, observed) = harness.run(Site::healthy()).await;

    assert_eq!(result.unwrap(), Outcome::Passed);
    assert_eq!(observed.calls()[0], "navigate:http://host:8080/events-site/");
}

#[tokio::test]
async fn test_failing_rerun_leaves_only_its_own_captures() {
    let harness = Harness::new();

    let (first, _, _) = harness.run(Site::healthy()).await;
    assert_eq!(first.unwrap(), Outcome::Passed);
    assert!(harness.exists("index.png"));
    assert!(harness.exists("detail.png"));

    let mut site = Site::healthy();
    site.index.retain(|t| t != "Test Event 1");
    let (second, _, _) = harness.run(site).await;

    assert!(!second.unwrap().is_success());
    assert!(harness.exists("failure.png"));
    assert!(!harness.exists("index.png"));
    assert!(!harness.exists("detail.png"));

    let (third, _, _) = harness.run(Site::healthy()).await;
    assert_eq!(third.unwrap(), Outcome::Passed);
    assert!(!harness.exists("failure.png"));
}

#[tokio::test]
async fn test_readiness_probe_failure_skips_browser_navigation() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let harness = Harness::with_config(|c| {
        c.base_url = format!("http://127.0.0.1:{}/", port).parse().unwrap();
        c.wait_for_target = Some(Duration::from_millis(200));
    });

    let (result, out, observed) = harness.run(Site::healthy()).await;

    assert!(!result.unwrap().is_success());
    assert!(out.contains("target not reachable"));
    assert!(!observed.calls().iter().any(|c| c.starts_with("navigate:")));
    assert!(harness.exists("failure.png"));
}

#[test_case("Categories")]
#[test_case("Child Friendly")]
#[test_case("21+")]
#[test_case("Somerville Theatre")]
fn test_each_missing_field_is_reported(field: &str) {
    let harness = Harness::new();
    let (result, out, _) = block_on(harness.run(Site::healthy().without_detail_field(field)));

    assert!(!result.unwrap().is_success());
    assert!(out.contains(&format!("{:?}", field)));
    assert!(!harness.exists("detail.png"));
}

#[test]
fn test_invalid_plan_is_rejected_up_front() {
    let mut plan = VerificationPlan::default();
    plan.detail_fields.clear();
    let config = RunnerConfig {
        plan,
        ..Default::default()
    };
    assert!(matches!(
        VerificationRunner::new(config),
        Err(VerifyError::Plan(_))
    ));
}
