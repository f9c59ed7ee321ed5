// -------------------------
// Manual auth bootstrap
// -------------------------
//
// One-off interactive flow: open a visible window, let the operator sign in,
// poll the rendered text until the catalog (recognized by brand keywords)
// shows up, then cache the session cookies for later headless runs.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::time::{sleep, timeout};

use crate::challenge;
use crate::config::{
    AUTH_NAV_TIMEOUT_MS, AUTH_POLL_ATTEMPTS, AUTH_POLL_INTERVAL_MS, DEFAULT_STORE_URL,
};
use crate::cookies::SessionCookieCache;
use crate::extract;
use crate::session::BrowserSession;
use crate::telemetry;

pub async fn run_manual_auth(cache: &SessionCookieCache) -> Result<()> {
    telemetry::auth("Opening a visible session for manual sign-in");
    let session = BrowserSession::launch(false).await?;
    let result = wait_for_sign_in(&session, cache).await;
    session.close().await;
    result
}

async fn wait_for_sign_in(session: &BrowserSession, cache: &SessionCookieCache) -> Result<()> {
    let page = session.page();

    timeout(Duration::from_millis(AUTH_NAV_TIMEOUT_MS), async {
        page.goto(DEFAULT_STORE_URL).await?;
        page.wait_for_navigation().await?;
        Ok::<_, anyhow::Error>(())
    })
    .await
    .context("initial navigation timed out")??;

    telemetry::auth("Complete the sign-in in the browser window");
    for attempt in 1..=AUTH_POLL_ATTEMPTS {
        let text = challenge::page_text(page).await.unwrap_or_default();
        if extract::find_brand(&text).is_some() {
            let cookies = session.snapshot_cookies().await?;
            cache.save(&cookies)?;
            telemetry::auth(format!("Signed in, cached {} session cookies", cookies.len()));
            return Ok(());
        }
        telemetry::auth(format!("Waiting for sign-in ({attempt}/{AUTH_POLL_ATTEMPTS})"));
        sleep(Duration::from_millis(AUTH_POLL_INTERVAL_MS)).await;
    }

    Err(anyhow!(
        "manual authentication timed out after {AUTH_POLL_ATTEMPTS} checks"
    ))
}
