// -------------------------
// Diagnostics & progress
// -------------------------
//
// All diagnostics go to stderr as tag-prefixed lines; stdout is reserved for
// the final item array. The status line is machine-parsable and consumed by
// the external monitor.

use std::fmt;

pub fn progress(msg: impl fmt::Display) {
    eprintln!("[Progress] {msg}");
}

pub fn warning(msg: impl fmt::Display) {
    eprintln!("[Warning] {msg}");
}

pub fn error(msg: impl fmt::Display) {
    eprintln!("[Error] {msg}");
}

pub fn auth(msg: impl fmt::Display) {
    eprintln!("[Auth] {msg}");
}

pub fn fatal(msg: impl fmt::Display) {
    eprintln!("[Fatal] {msg}");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Loading => f.write_str("loading"),
            Phase::Complete => f.write_str("complete"),
        }
    }
}

/// Ephemeral progress record. Emitted after every page and once per store at
/// the end; never persisted.
#[derive(Debug, Clone)]
pub struct ScrapeStatus {
    pub phase: Phase,
    pub current: usize,
    pub total: Option<usize>,
    pub message: String,
}

impl ScrapeStatus {
    /// `phase=<loading|complete>|current=<int>|total=<int|?>|message=<text>`
    pub fn line(&self) -> String {
        let total = self
            .total
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".to_string());
        format!(
            "phase={}|current={}|total={}|message={}",
            self.phase, self.current, total, self.message
        )
    }

    pub fn emit(&self) {
        eprintln!("{}", self.line());
    }
}
