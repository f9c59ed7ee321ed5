// -------------------------
// Browser session
// -------------------------
//
// One Chromium instance, one page, owned by the orchestrator for the whole
// run. Nothing else touches the browser.

use anyhow::{Context, Result, anyhow};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::cookies::SessionCookie;
use crate::telemetry;

pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
}

impl BrowserSession {
    pub async fn launch(headless: bool) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(1280, 900)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking");
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch browser")?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open page")?;

        Ok(Self {
            browser,
            handler_task,
            page,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Restore a cached cookie set into the browser context. A cookie that
    /// fails to apply is skipped; the session falls back to the challenge
    /// gate for whatever access the rest don't cover.
    pub async fn restore_cookies(&self, cookies: &[SessionCookie]) -> Result<()> {
        for cookie in cookies {
            let param = CookieParam::builder()
                .name(&cookie.name)
                .value(&cookie.value)
                .domain(&cookie.domain)
                .path(&cookie.path)
                .http_only(cookie.http_only)
                .secure(cookie.secure)
                .build()
                .map_err(|e| anyhow!("cookie {}: {e}", cookie.name))?;
            if let Err(e) = self.page.set_cookie(param).await {
                telemetry::warning(format!("failed to restore cookie {}: {e}", cookie.name));
            }
        }
        Ok(())
    }

    /// Snapshot the session's current cookies, in browser order.
    pub async fn snapshot_cookies(&self) -> Result<Vec<SessionCookie>> {
        let cookies = self.page.get_cookies().await?;
        Ok(cookies
            .into_iter()
            .map(|c| SessionCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                http_only: c.http_only,
                secure: c.secure,
            })
            .collect())
    }

    /// Tear the session down. The orchestrator calls this exactly once, on
    /// every exit path.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            telemetry::warning(format!("browser close: {e}"));
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}
