//! Integration catalog (spec.md §4.6): maps a bare app slug to its full
//! `provider:app-slug` address so callers need not know which provider
//! backs a given integration.

use std::collections::HashMap;

/// Static, process-lifetime map from bare slug to full address. Built
/// once at startup; the proxy consults it only when the caller's `app`
/// carries no `:` already.
pub struct IntegrationCatalog {
    entries: HashMap<String, String>,
}

impl IntegrationCatalog {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Translate `app` to a `provider:app-slug` address. Returns `app`
    /// unchanged if it already carries a provider prefix, or if the
    /// catalog has no entry for it (C4 then falls back to its own
    /// default-provider resolution).
    pub fn translate(&self, app: &str) -> String {
        if app.contains(':') {
            return app.to_string();
        }
        self.entries.get(app).cloned().unwrap_or_else(|| app.to_string())
    }
}
