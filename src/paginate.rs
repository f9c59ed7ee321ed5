// -------------------------
// Pagination driver
// -------------------------
//
// Walks a store's ?page=N catalog until it runs dry. Page-level failures
// (navigation timeout, extraction error) end the store, never the run. The
// termination rules live in a pure function so the stop conditions are
// testable without a browser.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::Page;
use rand::{Rng, rng};
use tokio::time::{sleep, timeout};
use url::Url;

use crate::challenge;
use crate::config::{
    FULL_PAGE_MIN_ITEMS, HARD_PAGE_CAP, NAV_TIMEOUT_MS, PAGE_DELAY_MS, SETTLE_DELAY_MS,
};
use crate::extract::{self, ExtractMode, Item};
use crate::humanize;
use crate::telemetry::{self, Phase, ScrapeStatus};

/// Decision after a page has been extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVerdict {
    Continue,
    Stop,
}

/// Termination rules, checked in order after every page: an empty or
/// all-duplicate page ends the store; a short page after the first is a
/// trailing partial page.
pub fn page_verdict(page_no: usize, cards_found: usize, new_items: usize) -> PageVerdict {
    if cards_found == 0 || new_items == 0 {
        return PageVerdict::Stop;
    }
    if page_no > 1 && new_items < FULL_PAGE_MIN_ITEMS {
        return PageVerdict::Stop;
    }
    PageVerdict::Continue
}

/// Build the ?page=N variant of a store URL, replacing any existing page
/// parameter.
pub fn page_url(store_url: &str, page_no: usize) -> Result<Url> {
    let base = Url::parse(store_url).context("invalid store url")?;
    let mut out = base.clone();
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    out.query_pairs_mut()
        .clear()
        .extend_pairs(kept.iter().map(|(k, v)| (&**k, &**v)))
        .append_pair("page", &page_no.to_string());
    Ok(out)
}

/// Scrape one store front to back. Returns the store's items in discovery
/// order; the accumulated per-store name set is threaded through every
/// extraction call.
pub async fn paginate_store(
    page: &Page,
    store_name: &str,
    store_url: &str,
    mode: ExtractMode,
) -> Result<Vec<Item>> {
    let mut items: Vec<Item> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut page_no = 1usize;

    while page_no <= HARD_PAGE_CAP {
        let url = page_url(store_url, page_no)?;
        let navigated = timeout(Duration::from_millis(NAV_TIMEOUT_MS), async {
            page.goto(url.as_str()).await?;
            page.wait_for_navigation().await?;
            Ok::<_, anyhow::Error>(())
        })
        .await;
        match navigated {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                telemetry::error(format!(
                    "{store_name}: navigation failed on page {page_no}: {e}"
                ));
                break;
            }
            Err(_) => {
                telemetry::warning(format!(
                    "{store_name}: navigation timed out on page {page_no}"
                ));
                break;
            }
        }

        humanize::act_human(page).await;
        let settle = {
            rng().random_range(SETTLE_DELAY_MS.0..SETTLE_DELAY_MS.1)
        };
        sleep(Duration::from_millis(settle)).await;

        if page_no == 1 && !challenge::pass_gate(page).await? {
            telemetry::error(format!("{store_name}: challenge gate never cleared, skipping store"));
            break;
        }

        let extracted = match extract::extract_page(page, mode, store_name, &mut seen).await {
            Ok(extracted) => extracted,
            Err(e) => {
                telemetry::error(format!(
                    "{store_name}: extraction failed on page {page_no}: {e}"
                ));
                break;
            }
        };
        let new_items = extracted.items.len();
        items.extend(extracted.items);

        ScrapeStatus {
            phase: Phase::Loading,
            current: items.len(),
            total: None,
            message: format!("{store_name} page {page_no}"),
        }
        .emit();
        telemetry::progress(format!(
            "{store_name}: page {page_no} cards={} new={} total={}",
            extracted.cards_found,
            new_items,
            items.len()
        ));

        if page_verdict(page_no, extracted.cards_found, new_items) == PageVerdict::Stop {
            break;
        }

        page_no += 1;
        let delay = {
            rng().random_range(PAGE_DELAY_MS.0..PAGE_DELAY_MS.1)
        };
        sleep(Duration::from_millis(delay)).await;
    }

    ScrapeStatus {
        phase: Phase::Complete,
        current: items.len(),
        total: Some(items.len()),
        message: format!("{store_name} finished"),
    }
    .emit();
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_appends_page_param() {
        let url = page_url("https://www.wtbmarketlist.eu/store/adonio", 3).unwrap();
        assert_eq!(url.as_str(), "https://www.wtbmarketlist.eu/store/adonio?page=3");
    }

    #[test]
    fn page_url_replaces_existing_page_param() {
        let url = page_url("https://x.example/store/a?page=7&sort=new", 2).unwrap();
        assert_eq!(url.as_str(), "https://x.example/store/a?sort=new&page=2");
    }

    #[test]
    fn empty_page_stops() {
        assert_eq!(page_verdict(1, 0, 0), PageVerdict::Stop);
        assert_eq!(page_verdict(4, 0, 0), PageVerdict::Stop);
    }

    #[test]
    fn all_duplicate_page_stops() {
        assert_eq!(page_verdict(2, 25, 0), PageVerdict::Stop);
    }

    #[test]
    fn short_first_page_still_continues() {
        // The partial-page rule only applies after page 1.
        assert_eq!(page_verdict(1, 10, 10), PageVerdict::Continue);
    }

    #[test]
    fn short_later_page_is_a_trailing_partial_page() {
        assert_eq!(page_verdict(2, 19, 19), PageVerdict::Stop);
        assert_eq!(page_verdict(2, 20, 20), PageVerdict::Continue);
    }

    /// Drive the termination rules with per-page yields and report how many
    /// pages were processed and how many items accumulated.
    fn run_pages(yields: &[usize]) -> (usize, usize) {
        let mut total = 0;
        let mut pages = 0;
        for (idx, &new_items) in yields.iter().enumerate() {
            let page_no = idx + 1;
            pages += 1;
            total += new_items;
            if page_verdict(page_no, new_items, new_items) == PageVerdict::Stop {
                break;
            }
        }
        (pages, total)
    }

    #[test]
    fn three_page_catalog_with_trailing_partial_page() {
        let (pages, total) = run_pages(&[25, 25, 10, 99]);
        assert_eq!(pages, 3);
        assert_eq!(total, 60);
    }

    #[test]
    fn stops_on_first_page_with_no_new_items() {
        let (pages, total) = run_pages(&[25, 0, 99]);
        assert_eq!(pages, 2);
        assert_eq!(total, 25);
    }
}
