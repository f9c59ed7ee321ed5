// -------------------------
// Challenge gate
// -------------------------
//
// The storefront fronts the first page load with an anti-automation
// interstitial. The gate reads the rendered text, keeps light pointer noise
// going while the check runs, and gives the store up after a bounded number
// of attempts. Signal classification and the step decision are pure functions
// so the state machine is testable without a browser.

use std::time::Duration;

use anyhow::Result;
use chromiumoxide::Page;
use rand::{Rng, rng};
use tokio::time::sleep;

use crate::config::{CHALLENGE_MAX_ATTEMPTS, CHALLENGE_RELOAD_WAIT_MS, CHALLENGE_WAIT_MS};
use crate::humanize;
use crate::telemetry;

/// Text markers of a challenge page still running its check.
const VERIFYING_MARKERS: &[&str] = &[
    "Verifying",
    "Security Checkpoint",
    "Just a moment",
    "Checking your browser",
];

/// Text markers of an explicit verification failure.
const FAILED_MARKERS: &[&str] = &["Verification failed", "Failed to verify"];

/// What the rendered page text says about the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSignal {
    Verifying,
    Failed,
    Clear,
}

/// Next move for a given signal and attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStep {
    Humanize,
    Reload,
    Pass,
    GiveUp,
}

pub fn classify(page_text: &str) -> GateSignal {
    if FAILED_MARKERS.iter().any(|m| page_text.contains(m)) {
        GateSignal::Failed
    } else if VERIFYING_MARKERS.iter().any(|m| page_text.contains(m)) {
        GateSignal::Verifying
    } else {
        GateSignal::Clear
    }
}

/// Decide the next step. `attempt` counts wait/reload cycles already spent.
pub fn next_step(signal: GateSignal, attempt: u32) -> GateStep {
    match signal {
        GateSignal::Clear => GateStep::Pass,
        _ if attempt >= CHALLENGE_MAX_ATTEMPTS => GateStep::GiveUp,
        GateSignal::Verifying => GateStep::Humanize,
        GateSignal::Failed => GateStep::Reload,
    }
}

/// Wait the gate out on a freshly loaded first page. Returns whether the
/// catalog behind it became reachable. `false` is store-terminal, never
/// run-fatal.
pub async fn pass_gate(page: &Page) -> Result<bool> {
    let mut attempt = 0u32;
    loop {
        let text = page_text(page).await.unwrap_or_default();
        match next_step(classify(&text), attempt) {
            GateStep::Pass => return Ok(true),
            GateStep::GiveUp => {
                telemetry::warning(format!(
                    "challenge gate not cleared after {attempt} attempts"
                ));
                return Ok(false);
            }
            GateStep::Humanize => {
                telemetry::progress(format!("Challenge still verifying (attempt {})", attempt + 1));
                humanize::act_human(page).await;
                let wait = {
                    rng().random_range(CHALLENGE_WAIT_MS.0..CHALLENGE_WAIT_MS.1)
                };
                sleep(Duration::from_millis(wait)).await;
            }
            GateStep::Reload => {
                telemetry::warning("Challenge verification failed, reloading");
                sleep(Duration::from_millis(CHALLENGE_RELOAD_WAIT_MS)).await;
                if let Err(e) = page.reload().await {
                    telemetry::warning(format!("reload failed: {e}"));
                }
            }
        }
        attempt += 1;
    }
}

/// Visible text of the rendered page.
pub async fn page_text(page: &Page) -> Result<String> {
    let value = page
        .evaluate("document.body ? document.body.innerText : ''")
        .await?;
    Ok(value.into_value::<String>().unwrap_or_default())
}
