// -------------------------
// Run configuration
// -------------------------
//
// Every timing bound the scraper uses lives here as a named constant, so the
// pacing profile of a run can be audited in one place.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Store scraped when no URL and no config are given.
pub const DEFAULT_STORE_URL: &str = "https://www.wtbmarketlist.eu/store/adonio";
pub const DEFAULT_STORE_NAME: &str = "adonio";

/// Hard ceiling on catalog pages walked per store.
pub const HARD_PAGE_CAP: usize = 50;

/// A page after the first yielding fewer new items than this is treated as a
/// trailing partial page.
pub const FULL_PAGE_MIN_ITEMS: usize = 20;

/// Per-page navigation deadline.
pub const NAV_TIMEOUT_MS: u64 = 30_000;

/// Settle delay bounds applied after each navigation (ms).
pub const SETTLE_DELAY_MS: (u64, u64) = (500, 1500);

/// Inter-page delay bounds (ms).
pub const PAGE_DELAY_MS: (u64, u64) = (900, 2200);

/// Fixed pacing between stores.
pub const STORE_DELAY_MS: u64 = 5_000;

/// Re-check delay bounds while the challenge gate reports verifying (ms).
pub const CHALLENGE_WAIT_MS: (u64, u64) = (3_000, 6_000);

/// Wait before a full reload after an explicit verification failure.
pub const CHALLENGE_RELOAD_WAIT_MS: u64 = 3_000;

/// Challenge checks before the store is given up.
pub const CHALLENGE_MAX_ATTEMPTS: u32 = 12;

/// Fixed wait for the card detail dialog open animation.
pub const MODAL_OPEN_WAIT_MS: u64 = 1_500;

/// Cookie jar freshness window. Older jars read as absent.
pub const COOKIE_TTL_MS: i128 = 50 * 60 * 1000;

/// Manual-auth bootstrap: initial navigation deadline.
pub const AUTH_NAV_TIMEOUT_MS: u64 = 120_000;

/// Manual-auth bootstrap: sign-in polling schedule.
pub const AUTH_POLL_ATTEMPTS: u32 = 60;
pub const AUTH_POLL_INTERVAL_MS: u64 = 5_000;

/// Known brands, in match priority order. Compound names come before the
/// single-word brands they contain so the more specific label wins.
pub const BRANDS: &[&str] = &[
    "Air Jordan",
    "Jordan",
    "Nike",
    "Yeezy",
    "Adidas",
    "New Balance",
    "Asics",
    "Salomon",
    "Puma",
    "Reebok",
    "Converse",
    "Vans",
    "Ugg",
    "Crocs",
    "Timberland",
    "Birkenstock",
    "Hoka",
    "On Running",
    "Supreme",
    "Off-White",
    "Bape",
];

/// One configured storefront. Read-only to the scraping core.
#[derive(Debug, Clone, Deserialize)]
pub struct Store {
    pub name: String,
    pub url: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct StoresFile {
    #[serde(default)]
    stores: Vec<Store>,
}

/// Load the enabled stores from a stores.json config, in file order.
/// A missing or unparsable file is an error; "run all stores" mode cannot
/// proceed without it.
pub fn load_enabled_stores(path: &Path) -> Result<Vec<Store>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("stores config not found: {}", path.display()))?;
    let parsed: StoresFile = serde_json::from_str(&raw)
        .with_context(|| format!("invalid stores config: {}", path.display()))?;
    Ok(parsed.stores.into_iter().filter(|s| s.enabled).collect())
}
