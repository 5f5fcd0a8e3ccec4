pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

/// Chromium launch flags sent with every render. Mirrors the flag set that
/// survives anti-bot detection on marketplace search pages.
const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
];

/// Per-request render behavior. Each `content()` call runs in its own
/// isolated browser session on the service side; the session is torn down
/// when the request completes, whether it succeeded, failed, or timed out.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// User agent for this session. None keeps the service default.
    pub user_agent: Option<String>,
    /// Optional `host:port` proxy routed via `--proxy-server`.
    pub proxy: Option<String>,
    /// CSS selector to wait for before the DOM is captured.
    pub wait_for_selector: Option<String>,
    /// Bound on navigation plus selector wait, in milliseconds.
    pub wait_timeout_ms: u64,
    /// Scroll to the bottom and back before capture, so lazy-loaded
    /// results render.
    pub scroll_page: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_agent: Option<&'a str>,
    goto_options: GotoOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for_selector: Option<WaitForSelector<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    scroll_page: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GotoOptions {
    timeout: u64,
    wait_until: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WaitForSelector<'a> {
    selector: &'a str,
    timeout: u64,
}

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    /// Fetch fully-rendered HTML for a URL via the /content endpoint.
    ///
    /// The service launches a fresh browser per request with the stealth
    /// launch flags plus any per-request identity from `opts`, navigates,
    /// honors the wait/scroll options, and returns the captured DOM.
    pub async fn content(&self, url: &str, opts: &RenderOptions) -> Result<String> {
        let endpoint = format!("{}/content", self.base_url);

        let mut args: Vec<String> = LAUNCH_ARGS.iter().map(|a| a.to_string()).collect();
        if let Some(ref proxy) = opts.proxy {
            args.push(format!("--proxy-server={proxy}"));
        }
        let launch = serde_json::json!({ "args": args, "stealth": true });

        let mut query: Vec<(&str, String)> = vec![("launch", launch.to_string())];
        if let Some(ref token) = self.token {
            query.push(("token", token.clone()));
        }

        let timeout = if opts.wait_timeout_ms > 0 {
            opts.wait_timeout_ms
        } else {
            20_000
        };
        let body = ContentRequest {
            url,
            user_agent: opts.user_agent.as_deref(),
            goto_options: GotoOptions {
                timeout,
                wait_until: "networkidle2",
            },
            wait_for_selector: opts.wait_for_selector.as_deref().map(|selector| {
                WaitForSelector {
                    selector,
                    timeout,
                }
            }),
            scroll_page: opts.scroll_page,
        };

        debug!(url, proxy = ?opts.proxy, "Requesting rendered content");

        let resp = self
            .client
            .post(&endpoint)
            .query(&query)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}
