// -------------------------
// Store orchestration
// -------------------------
//
// One browsing session for the whole run; stores strictly in configured
// order. A failed store costs only its own items. Cookies are persisted at
// most once per run, after the first store that actually yields something
// (proof the session is authenticated and worth caching).

use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;

use crate::config::{STORE_DELAY_MS, Store};
use crate::cookies::SessionCookieCache;
use crate::extract::{ExtractMode, Item};
use crate::paginate;
use crate::session::BrowserSession;
use crate::telemetry;

/// Scrape every store against one session. The session closes on every exit
/// path, including an error escaping the store loop.
pub async fn run_stores(
    stores: &[Store],
    mode: ExtractMode,
    headless: bool,
    cache: &SessionCookieCache,
) -> Result<Vec<Item>> {
    let session = BrowserSession::launch(headless).await?;

    if let Some(jar) = cache.load() {
        telemetry::progress(format!("Restoring {} cached session cookies", jar.cookies.len()));
        if let Err(e) = session.restore_cookies(&jar.cookies).await {
            telemetry::warning(format!("cookie restore failed: {e}"));
        }
    } else {
        telemetry::progress("No usable cookie cache, starting a fresh session");
    }

    let result = scrape_in_order(&session, stores, mode, cache).await;
    session.close().await;
    result
}

async fn scrape_in_order(
    session: &BrowserSession,
    stores: &[Store],
    mode: ExtractMode,
    cache: &SessionCookieCache,
) -> Result<Vec<Item>> {
    let mut all: Vec<Item> = Vec::new();
    let mut cookies_saved = false;

    for (idx, store) in stores.iter().enumerate() {
        telemetry::progress(format!(
            "Scraping store {}/{}: {}",
            idx + 1,
            stores.len(),
            store.name
        ));

        let items =
            match paginate::paginate_store(session.page(), &store.name, &store.url, mode).await {
                Ok(items) => items,
                Err(e) => {
                    telemetry::error(format!("{}: store failed: {e}", store.name));
                    Vec::new()
                }
            };

        if !cookies_saved && !items.is_empty() {
            match session.snapshot_cookies().await {
                Ok(cookies) => match cache.save(&cookies) {
                    Ok(()) => {
                        cookies_saved = true;
                        telemetry::progress(format!("Cached {} session cookies", cookies.len()));
                    }
                    Err(e) => telemetry::warning(format!("cookie cache write failed: {e}")),
                },
                Err(e) => telemetry::warning(format!("cookie snapshot failed: {e}")),
            }
        }

        all.extend(items);

        if idx + 1 < stores.len() {
            sleep(Duration::from_millis(STORE_DELAY_MS)).await;
        }
    }

    Ok(all)
}
