//! Playwright browser automation
//!
//! A [`PlaywrightPage`] owns one `node` process running a generated driver
//! script. The script launches the browser, opens a single page and then
//! serves one JSON command per stdin line, answering with one JSON line on
//! stdout. Keeping the process alive for the whole run keeps the page state
//! (current URL, client-side navigation) between steps.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{VerifyError, VerifyResult};
use crate::page::BrowserPage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(VerifyError::Config(format!("unknown browser {:?}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Playwright's default navigation timeout for `goto`
    pub navigation_timeout: Duration,
    /// Playwright's default timeout for clicks and screenshots
    pub action_timeout: Duration,
    /// How long to wait for the browser to come up
    pub launch_timeout: Duration,
    /// `node` executable
    pub node_binary: PathBuf,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            navigation_timeout: Duration::from_secs(30),
            action_timeout: Duration::from_secs(30),
            launch_timeout: Duration::from_secs(60),
            node_binary: PathBuf::from("node"),
        }
    }
}

impl PlaywrightConfig {
    /// Upper bound for one driver round trip. Playwright enforces the real
    /// timeouts; this only catches a wedged driver.
    fn reply_timeout(&self) -> Duration {
        self.navigation_timeout.max(self.action_timeout) + Duration::from_secs(10)
    }
}

/// Commands understood by the driver script
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverCommand<'a> {
    Navigate { url: &'a str },
    ProbeText { text: &'a str },
    Click { text: &'a str },
    Screenshot { path: &'a Path, full_page: bool },
    Close,
}

#[derive(Debug, Serialize)]
struct DriverRequest<'a> {
    id: u64,
    #[serde(flatten)]
    command: DriverCommand<'a>,
}

/// One line written by the driver script
#[derive(Debug, Deserialize)]
struct DriverReply {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    visible: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

/// A browser page driven through Playwright
pub struct PlaywrightPage {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    reply_timeout: Duration,
    closed: bool,
    /// Holds the driver script for the lifetime of the process
    _script_dir: tempfile::TempDir,
}

impl PlaywrightPage {
    /// Launch the browser and open a page
    pub async fn launch(config: &PlaywrightConfig) -> VerifyResult<Self> {
        check_playwright_installed()?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, build_driver_script(config))?;

        debug!("Starting Playwright driver: {}", script_path.display());

        // Runs in the caller's directory so `require('playwright')` resolves
        // against the project's node_modules.
        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                VerifyError::BrowserLaunch(format!(
                    "failed to spawn {}: {}",
                    config.node_binary.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VerifyError::BrowserLaunch("driver stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VerifyError::BrowserLaunch("driver stdout unavailable".into()))?;

        let mut page = Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            reply_timeout: config.reply_timeout(),
            closed: false,
            _script_dir: script_dir,
        };

        match timeout(config.launch_timeout, page.wait_ready()).await {
            Ok(Ok(())) => {
                info!(
                    "Launched {} (headless: {}, viewport {}x{})",
                    config.browser.as_str(),
                    config.headless,
                    config.viewport_width,
                    config.viewport_height
                );
                Ok(page)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(VerifyError::BrowserLaunch(format!(
                "browser not ready after {}s",
                config.launch_timeout.as_secs()
            ))),
        }
    }

    async fn wait_ready(&mut self) -> VerifyResult<()> {
        loop {
            let reply = self.read_reply().await.map_err(|e| match e {
                VerifyError::Driver(msg) => VerifyError::BrowserLaunch(msg),
                other => other,
            })?;
            match reply.event.as_deref() {
                Some("ready") => return Ok(()),
                Some("fatal") => {
                    return Err(VerifyError::BrowserLaunch(
                        reply.error.unwrap_or_else(|| "unknown error".into()),
                    ))
                }
                _ => debug!("Ignoring driver output before ready: {:?}", reply),
            }
        }
    }

    /// Read the next JSON line, skipping anything that is not JSON
    async fn read_reply(&mut self) -> VerifyResult<DriverReply> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| VerifyError::Driver("driver exited unexpectedly".into()))?;

            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DriverReply>(&line) {
                Ok(reply) => return Ok(reply),
                Err(_) => debug!("driver: {}", line),
            }
        }
    }

    /// Send one command and wait for its reply
    async fn request(&mut self, command: DriverCommand<'_>) -> VerifyResult<DriverReply> {
        let id = self.next_id;
        self.next_id += 1;

        let mut line = serde_json::to_string(&DriverRequest { id, command })?;
        line.push('\n');

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| VerifyError::Driver("driver input already closed".into()))?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;

        let reply_timeout = self.reply_timeout;
        let wait = async {
            loop {
                let reply = self.read_reply().await?;
                match reply.id {
                    Some(reply_id) if reply_id == id => return Ok::<_, VerifyError>(reply),
                    _ => debug!("Ignoring stale driver reply: {:?}", reply),
                }
            }
        };

        timeout(reply_timeout, wait).await.map_err(|_| {
            VerifyError::Driver(format!(
                "no reply to request {} within {}s",
                id,
                reply_timeout.as_secs()
            ))
        })?
    }

    /// Send a command whose only result is success or an error message
    async fn request_ok(&mut self, command: DriverCommand<'_>) -> VerifyResult<Result<(), String>> {
        let reply = self.request(command).await?;
        if reply.ok {
            Ok(Ok(()))
        } else {
            Ok(Err(reply.error.unwrap_or_else(|| "unknown error".into())))
        }
    }

    /// Terminate the driver without asking it first
    fn terminate(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                // Playwright closes its browsers on SIGTERM
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                    return;
                }
            }
        }

        let _ = self.child.start_kill();
    }
}

#[async_trait]
impl BrowserPage for PlaywrightPage {
    async fn navigate(&mut self, url: &str) -> VerifyResult<()> {
        self.request_ok(DriverCommand::Navigate { url })
            .await?
            .map_err(|reason| VerifyError::Navigation {
                url: url.to_string(),
                reason,
            })
    }

    async fn is_text_visible(&mut self, text: &str) -> VerifyResult<bool> {
        let reply = self.request(DriverCommand::ProbeText { text }).await?;
        if let Some(error) = &reply.error {
            debug!("Probe for {:?} treated as not visible: {}", text, error);
        }
        Ok(reply.visible.unwrap_or(false))
    }

    async fn click(&mut self, text: &str) -> VerifyResult<()> {
        self.request_ok(DriverCommand::Click { text })
            .await?
            .map_err(|reason| VerifyError::Click {
                text: text.to_string(),
                reason,
            })
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> VerifyResult<()> {
        self.request_ok(DriverCommand::Screenshot { path, full_page })
            .await?
            .map_err(|reason| VerifyError::Capture {
                path: path.to_path_buf(),
                reason,
            })
    }

    async fn close(mut self) -> VerifyResult<()> {
        self.closed = true;

        let closed = self.request_ok(DriverCommand::Close).await;

        // EOF on stdin lets the driver exit once the browser is closed
        drop(self.stdin.take());

        match timeout(Duration::from_secs(10), self.child.wait()).await {
            Ok(Ok(status)) => debug!("Playwright driver exited with {}", status),
            Ok(Err(e)) => warn!("Failed to reap Playwright driver: {}", e),
            Err(_) => {
                warn!("Playwright driver did not exit, killing it");
                let _ = self.child.kill().await;
            }
        }

        match closed? {
            Ok(()) => {
                info!("Browser closed");
                Ok(())
            }
            Err(reason) => Err(VerifyError::Driver(format!("browser close failed: {}", reason))),
        }
    }
}

impl Drop for PlaywrightPage {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Playwright page dropped without close, terminating driver");
            self.terminate();
        }
    }
}

/// Check if Playwright is installed
fn check_playwright_installed() -> VerifyResult<()> {
    let output = Command::new("npx")
        .args(["--no-install", "playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match output {
        Ok(status) if status.success() => Ok(()),
        _ => Err(VerifyError::PlaywrightNotFound),
    }
}

/// Build the driver script for a configuration
pub fn build_driver_script(config: &PlaywrightConfig) -> String {
    format!(
        r#"
const readline = require('readline');

function loadPlaywright() {{
  try {{
    return require(require.resolve('playwright', {{ paths: [process.cwd()] }}));
  }} catch (_) {{
    return require('playwright');
  }}
}}

const send = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');

(async () => {{
  let browser = null;
  try {{
    const playwright = loadPlaywright();
    browser = await playwright.{browser}.launch({{ headless: {headless} }});
    const context = await browser.newContext({{
      viewport: {{ width: {width}, height: {height} }}
    }});
    const page = await context.newPage();
    page.setDefaultNavigationTimeout({navigation_timeout});
    page.setDefaultTimeout({action_timeout});
    send({{ event: 'ready' }});

    const rl = readline.createInterface({{ input: process.stdin, terminal: false }});
    for await (const line of rl) {{
      if (!line.trim()) continue;
      const cmd = JSON.parse(line);
      try {{
        switch (cmd.op) {{
          case 'navigate':
            await page.goto(cmd.url);
            send({{ id: cmd.id, ok: true }});
            break;
          case 'probe_text': {{
            let visible = false;
            let error;
            try {{
              visible = (await page.getByText(cmd.text).filter({{ visible: true }}).count()) > 0;
            }} catch (e) {{
              error = e.message;
            }}
            send({{ id: cmd.id, ok: true, visible, error }});
            break;
          }}
          case 'click':
            await page.getByText(cmd.text).filter({{ visible: true }}).first().click();
            send({{ id: cmd.id, ok: true }});
            break;
          case 'screenshot':
            await page.screenshot({{ path: cmd.path, fullPage: cmd.full_page }});
            send({{ id: cmd.id, ok: true }});
            break;
          case 'close':
            await browser.close();
            browser = null;
            send({{ id: cmd.id, ok: true }});
            rl.close();
            break;
          default:
            send({{ id: cmd.id, ok: false, error: 'unknown op ' + cmd.op }});
        }}
      }} catch (error) {{
        send({{ id: cmd.id, ok: false, error: error.message }});
      }}
    }}
  }} catch (error) {{
    send({{ event: 'fatal', error: error.message }});
    process.exitCode = 1;
  }} finally {{
    if (browser) await browser.close();
  }}
}})();
"#,
        browser = config.browser.as_str(),
        headless = config.headless,
        width = config.viewport_width,
        height = config.viewport_height,
        navigation_timeout = config.navigation_timeout.as_millis(),
        action_timeout = config.action_timeout.as_millis(),
    )
}
