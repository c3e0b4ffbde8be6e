//! Playwright browser automation
//!
//! A single Node.js bridge process owns the browser, one context and one page
//! for the whole run. Requests and responses are JSON lines over the bridge's
//! stdin/stdout, so session cookies survive from one step to the next.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, info, warn};

use crate::config::TimingConfig;
use crate::driver::{join_route, ElementHandle, PageDriver, Stability, StabilityWait};
use crate::error::{AcceptanceError, AcceptanceResult};

/// Time allowed for the bridge to launch the browser and report ready
const BRIDGE_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Slack on top of each request's own Playwright timeout
const RESPONSE_GRACE: Duration = Duration::from_secs(5);

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
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

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub kind: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Node executable used to run the bridge
    pub node_binary: String,

    /// Directory whose `node_modules` provides `playwright`
    pub project_dir: PathBuf,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            kind: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_binary: "node".to_string(),
            project_dir: PathBuf::from("."),
        }
    }
}

/// One bridge request. Serialized with an `op` tag; the `id` is added on send.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Goto { url: &'a str, timeout_ms: u64 },
    WaitIdle { timeout_ms: u64 },
    Url,
    Title,
    QueryAll { selector: &'a str },
    Fill { selector: &'a str, value: &'a str, timeout_ms: u64 },
    Click { selector: &'a str, timeout_ms: u64 },
    Screenshot { path: &'a str, full_page: bool },
    Close,
}

impl Request<'_> {
    fn op(&self) -> &'static str {
        match self {
            Request::Goto { .. } => "goto",
            Request::WaitIdle { .. } => "wait_idle",
            Request::Url => "url",
            Request::Title => "title",
            Request::QueryAll { .. } => "query_all",
            Request::Fill { .. } => "fill",
            Request::Click { .. } => "click",
            Request::Screenshot { .. } => "screenshot",
            Request::Close => "close",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// An error reported by the bridge for one request
#[derive(Debug, Clone, PartialEq, Eq)]
struct BridgeFailure {
    kind: String,
    message: String,
}

impl BridgeFailure {
    /// Map to the error taxonomy; a closed page is always fatal
    fn into_error(self, local: impl FnOnce(String) -> AcceptanceError) -> AcceptanceError {
        if self.kind == "closed" {
            AcceptanceError::FatalTransport(self.message)
        } else {
            local(self.message)
        }
    }
}

/// Playwright-backed [`PageDriver`]
pub struct PlaywrightDriver {
    base_url: String,
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    navigation_timeout_ms: u64,
    action_timeout_ms: u64,
    closed: bool,

    /// Holds bridge.js until the driver is dropped
    _script_dir: tempfile::TempDir,
}

impl PlaywrightDriver {
    /// Launch the bridge and wait until the page is ready
    pub async fn launch(
        config: &PlaywrightConfig,
        base_url: &str,
        timing: &TimingConfig,
    ) -> AcceptanceResult<Self> {
        Self::check_playwright_installed(config).await?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, build_bridge_script(config))?;

        info!(
            "Launching {} ({}) via {}",
            config.kind.as_str(),
            if config.headless { "headless" } else { "headed" },
            config.node_binary
        );

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .current_dir(&config.project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AcceptanceError::BridgeStartup(format!(
                    "failed to spawn {}: {}",
                    config.node_binary, e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AcceptanceError::BridgeStartup("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AcceptanceError::BridgeStartup("bridge stdout unavailable".into()))?;

        let mut driver = Self {
            base_url: base_url.to_string(),
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            navigation_timeout_ms: timing.navigation_timeout_ms,
            action_timeout_ms: timing.action_timeout_ms,
            closed: false,
            _script_dir: script_dir,
        };

        match tokio::time::timeout(BRIDGE_STARTUP_TIMEOUT, driver.read_response(0)).await {
            Ok(Ok(Ok(_))) => {
                debug!("Bridge ready");
                Ok(driver)
            }
            Ok(Ok(Err(failure))) => Err(AcceptanceError::BridgeStartup(failure.message)),
            Ok(Err(e)) => Err(AcceptanceError::BridgeStartup(e.to_string())),
            Err(_) => Err(AcceptanceError::BridgeStartup(format!(
                "browser not ready after {}s",
                BRIDGE_STARTUP_TIMEOUT.as_secs()
            ))),
        }
    }

    /// Check if Playwright is installed
    async fn check_playwright_installed(config: &PlaywrightConfig) -> AcceptanceResult<()> {
        let status = TokioCommand::new("npx")
            .args(["playwright", "--version"])
            .current_dir(&config.project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(AcceptanceError::PlaywrightNotFound),
        }
    }

    /// Send one request and wait for its response
    async fn call(
        &mut self,
        request: Request<'_>,
        deadline: Duration,
    ) -> AcceptanceResult<Result<serde_json::Value, BridgeFailure>> {
        if self.closed {
            return Err(AcceptanceError::FatalTransport("browser already closed".into()));
        }

        let id = self.next_id;
        self.next_id += 1;
        let op = request.op();

        let mut payload = serde_json::to_value(&request)?;
        payload["id"] = serde_json::Value::from(id);
        let mut line = serde_json::to_string(&payload)?;
        line.push('\n');

        debug!("bridge <- #{} {}", id, op);
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AcceptanceError::FatalTransport(format!("bridge write failed: {}", e)))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| AcceptanceError::FatalTransport(format!("bridge flush failed: {}", e)))?;

        match tokio::time::timeout(deadline + RESPONSE_GRACE, self.read_response(id)).await {
            Ok(result) => result,
            Err(_) => Err(AcceptanceError::FatalTransport(format!(
                "no response to {} within {} ms",
                op,
                (deadline + RESPONSE_GRACE).as_millis()
            ))),
        }
    }

    /// Read lines until the response for `id` arrives
    async fn read_response(
        &mut self,
        id: u64,
    ) -> AcceptanceResult<Result<serde_json::Value, BridgeFailure>> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await
                .map_err(|e| AcceptanceError::FatalTransport(format!("bridge read failed: {}", e)))?
                .ok_or_else(|| AcceptanceError::FatalTransport("bridge process exited".into()))?;

            let response: Response = match serde_json::from_str(&line) {
                Ok(response) => response,
                Err(_) => {
                    debug!("bridge: {}", line);
                    continue;
                }
            };

            if response.id != id {
                debug!("Discarding stale bridge response #{}", response.id);
                continue;
            }

            return Ok(if response.ok {
                Ok(response.value)
            } else {
                Err(BridgeFailure {
                    kind: response.kind.unwrap_or_else(|| "error".to_string()),
                    message: response.message.unwrap_or_default(),
                })
            });
        }
    }

    fn action_deadline(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    /// SIGTERM first, then kill
    async fn terminate(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && tokio::time::timeout(Duration::from_millis(500), self.child.wait())
                        .await
                        .is_ok()
                {
                    return;
                }
            }
        }

        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill browser bridge: {}", e);
        }
    }
}

#[async_trait]
impl PageDriver for PlaywrightDriver {
    async fn navigate(&mut self, route: &str) -> AcceptanceResult<Option<u16>> {
        let url = join_route(&self.base_url, route);
        let timeout_ms = self.navigation_timeout_ms;
        debug!("Navigating to {}", url);

        match self
            .call(Request::Goto { url: &url, timeout_ms }, Duration::from_millis(timeout_ms))
            .await?
        {
            Ok(value) => Ok(value.as_u64().and_then(|status| u16::try_from(status).ok())),
            Err(failure) => Err(failure.into_error(|reason| AcceptanceError::Navigation {
                route: route.to_string(),
                reason,
            })),
        }
    }

    async fn wait_for_stable(&mut self, wait: StabilityWait) -> AcceptanceResult<Stability> {
        let timeout_ms = wait.idle_timeout.as_millis() as u64;
        let stability = match self
            .call(Request::WaitIdle { timeout_ms }, wait.idle_timeout)
            .await?
        {
            Ok(serde_json::Value::Bool(true)) => Stability::Idle,
            Ok(_) => {
                warn!("Network did not go idle within {} ms, continuing", timeout_ms);
                Stability::TimedOut
            }
            Err(failure) if failure.kind == "closed" => {
                return Err(AcceptanceError::FatalTransport(failure.message));
            }
            Err(failure) => {
                warn!("Idle wait failed ({}), continuing", failure.message);
                Stability::TimedOut
            }
        };

        if !wait.settle.is_zero() {
            tokio::time::sleep(wait.settle).await;
        }
        Ok(stability)
    }

    async fn current_url(&mut self) -> AcceptanceResult<String> {
        let deadline = self.action_deadline();
        match self.call(Request::Url, deadline).await? {
            Ok(value) => Ok(value.as_str().unwrap_or_default().to_string()),
            Err(failure) => Err(failure.into_error(AcceptanceError::Playwright)),
        }
    }

    async fn title(&mut self) -> AcceptanceResult<String> {
        let deadline = self.action_deadline();
        match self.call(Request::Title, deadline).await? {
            Ok(value) => Ok(value.as_str().unwrap_or_default().to_string()),
            Err(failure) => Err(failure.into_error(AcceptanceError::Playwright)),
        }
    }

    async fn query_all(&mut self, selector: &str) -> AcceptanceResult<Vec<ElementHandle>> {
        let deadline = self.action_deadline();
        match self.call(Request::QueryAll { selector }, deadline).await? {
            Ok(value) => {
                let texts: Vec<String> = serde_json::from_value(value)
                    .map_err(|e| AcceptanceError::Playwright(format!("bad query_all reply: {}", e)))?;
                Ok(texts
                    .into_iter()
                    .enumerate()
                    .map(|(index, text)| ElementHandle { index, text })
                    .collect())
            }
            Err(failure) => Err(failure.into_error(|reason| {
                AcceptanceError::AssertionFault(format!("query '{}' failed: {}", selector, reason))
            })),
        }
    }

    async fn fill(&mut self, selector: &str, value: &str) -> AcceptanceResult<()> {
        let timeout_ms = self.action_timeout_ms;
        let deadline = self.action_deadline();
        match self
            .call(Request::Fill { selector, value, timeout_ms }, deadline)
            .await?
        {
            Ok(_) => Ok(()),
            Err(failure) => Err(failure.into_error(|reason| AcceptanceError::Interaction {
                selector: selector.to_string(),
                reason,
            })),
        }
    }

    async fn click(&mut self, selector: &str) -> AcceptanceResult<()> {
        let timeout_ms = self.action_timeout_ms;
        let deadline = self.action_deadline();
        match self
            .call(Request::Click { selector, timeout_ms }, deadline)
            .await?
        {
            Ok(_) => Ok(()),
            Err(failure) => Err(failure.into_error(|reason| AcceptanceError::Interaction {
                selector: selector.to_string(),
                reason,
            })),
        }
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> AcceptanceResult<()> {
        // The bridge runs in project_dir; relative paths must not resolve there
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        let path_str = path.to_string_lossy().to_string();
        let deadline = Duration::from_millis(self.navigation_timeout_ms);
        match self
            .call(Request::Screenshot { path: &path_str, full_page }, deadline)
            .await?
        {
            Ok(_) => Ok(()),
            Err(failure) => Err(failure.into_error(|reason| AcceptanceError::Capture {
                path: path_str.clone(),
                reason,
            })),
        }
    }

    async fn close(&mut self) -> AcceptanceResult<()> {
        if self.closed {
            return Ok(());
        }

        if let Err(e) = self.call(Request::Close, CLOSE_TIMEOUT).await {
            debug!("Close request not acknowledged: {}", e);
        }
        self.closed = true;

        match tokio::time::timeout(CLOSE_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => debug!("Browser bridge exited with {}", status),
            _ => {
                warn!("Browser bridge did not exit, terminating");
                self.terminate().await;
            }
        }

        info!("Browser closed");
        Ok(())
    }
}

impl Drop for PlaywrightDriver {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.child.start_kill();
        }
    }
}

/// Build the Node bridge that owns the browser for the whole run
pub fn build_bridge_script(config: &PlaywrightConfig) -> String {
    format!(
        r#"
const {{ createRequire }} = require('module');
const path = require('path');
const readline = require('readline');

// Resolve playwright from the project directory, not the script's temp dir
const playwright = createRequire(path.join(process.cwd(), 'bridge.js'))('playwright');

function fail(kind, message) {{
  const err = new Error(message);
  err.kind = kind;
  return err;
}}

function classify(err) {{
  if (err && err.kind) return err.kind;
  const message = String((err && err.message) || err);
  if (/has been closed|Target closed|browser has disconnected/i.test(message)) return 'closed';
  if (err && err.name === 'TimeoutError') return 'timeout';
  if (/net::ERR_|NS_ERROR_|Could not connect/i.test(message)) return 'unreachable';
  return 'error';
}}

async function firstMatch(page, selector) {{
  const locator = page.locator(selector);
  let count;
  try {{
    count = await locator.count();
  }} catch (err) {{
    throw fail(classify(err) === 'closed' ? 'closed' : 'selector', err.message);
  }}
  if (count === 0) throw fail('missing', `no element matches ${{selector}}`);
  return locator.first();
}}

async function handle(page, req) {{
  switch (req.op) {{
    case 'goto': {{
      const response = await page.goto(req.url, {{ timeout: req.timeout_ms }});
      return response ? response.status() : null;
    }}
    case 'wait_idle':
      try {{
        await page.waitForLoadState('networkidle', {{ timeout: req.timeout_ms }});
        return true;
      }} catch (err) {{
        if (err.name === 'TimeoutError') return false;
        throw err;
      }}
    case 'url':
      return page.url();
    case 'title':
      return await page.title();
    case 'query_all':
      try {{
        const texts = await page.locator(req.selector).allTextContents();
        return texts.map((text) => (text || '').trim());
      }} catch (err) {{
        throw fail(classify(err) === 'closed' ? 'closed' : 'selector', err.message);
      }}
    case 'fill': {{
      const element = await firstMatch(page, req.selector);
      await element.fill(req.value, {{ timeout: req.timeout_ms }});
      return null;
    }}
    case 'click': {{
      const element = await firstMatch(page, req.selector);
      await element.click({{ timeout: req.timeout_ms }});
      return null;
    }}
    case 'screenshot':
      await page.screenshot({{ path: req.path, fullPage: req.full_page }});
      return req.path;
    case 'close':
      return null;
    default:
      throw fail('protocol', `unknown op ${{req.op}}`);
  }}
}}

(async () => {{
  const browser = await playwright.{browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  const reply = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');
  reply({{ id: 0, ok: true, value: 'ready' }});

  const rl = readline.createInterface({{ input: process.stdin, crlfDelay: Infinity }});
  for await (const line of rl) {{
    if (!line.trim()) continue;
    let req;
    try {{
      req = JSON.parse(line);
    }} catch (err) {{
      continue;
    }}
    try {{
      const value = await handle(page, req);
      reply({{ id: req.id, ok: true, value: value === undefined ? null : value }});
    }} catch (err) {{
      reply({{ id: req.id, ok: false, kind: classify(err), message: String((err && err.message) || err) }});
    }}
    if (req.op === 'close') break;
  }}
  await browser.close();
}})().catch((err) => {{
  process.stdout.write(JSON.stringify({{ id: 0, ok: false, kind: 'startup', message: String((err && err.message) || err) }}) + '\n');
  process.exit(1);
}});
"#,
        browser = config.kind.as_str(),
        headless = config.headless,
        width = config.viewport_width,
        height = config.viewport_height,
    )
}
