//! Default URL scrubbing.
//!
//! Path-scrubbing heuristics are an embedder concern — frameworks know
//! their own routing — so the engine takes both functions as injectable
//! options. The defaults here are deliberately blunt: drop or mask
//! everything after `?`.

use std::sync::Arc;

/// An injectable path-scrubbing function.
pub type PathFilter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Marker substituted for filtered query-parameter values.
pub const FILTERED_VALUE: &str = "[FILTERED]";

/// Strip the query string (and fragment) entirely.
#[must_use]
pub fn scrub_path(path: &str) -> String {
    path.split(['?', '#']).next().unwrap_or_default().to_owned()
}

/// Keep query-parameter names, mask their values.
#[must_use]
pub fn scrub_path_params(path: &str) -> String {
    let Some((base, query)) = path.split_once('?') else {
        return path.to_owned();
    };

    let filtered: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) => format!("{key}={FILTERED_VALUE}"),
            None => pair.to_owned(),
        })
        .collect();

    format!("{base}?{}", filtered.join("&"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
