//! Configured metadata sources and their readiness.

use anyhow::Result;

use crate::config::Config;

/// One line of the `rix sources` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    pub name: &'static str,
    pub kind: &'static str,
    pub status: &'static str,
    pub ready: bool,
}

fn row(name: &'static str, kind: &'static str, enabled: bool, credentialed: bool) -> SourceRow {
    let (status, ready) = match (enabled, credentialed) {
        (false, _) => ("DISABLED", false),
        (true, false) => ("NO API KEY", false),
        (true, true) => ("OK", true),
    };
    SourceRow {
        name,
        kind,
        status,
        ready,
    }
}

/// Every source the reconciliation engine knows about, in consultation order.
pub fn source_rows(config: &Config) -> Vec<SourceRow> {
    let providers = &config.providers;
    let engines = config.reconcile.search_engines;
    vec![
        row("local", "local", true, true),
        // The catalog scrape works without a key; only the JSON lookup needs one.
        row("catalog", "primary", providers.catalog.enabled, true),
        row(
            "structured",
            "secondary",
            providers.structured.enabled,
            providers.structured.api_key().is_some(),
        ),
        row(
            "aggregator",
            "tertiary",
            providers.aggregator.enabled,
            providers.aggregator.client_id().is_some(),
        ),
        row("google", "search-engine", engines, true),
        row("yahoo", "search-engine", engines, true),
    ]
}

pub fn list_sources(config: &Config) -> Result<()> {
    println!("{:<16} {:<14} {:<12} READY", "SOURCE", "KIND", "STATUS");
    for r in source_rows(config) {
        println!("{:<16} {:<14} {:<12} {}", r.name, r.kind, r.status, r.ready);
    }
    Ok(())
}
