use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use time::format_description::well_known::Rfc3339;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Run id derived from the effective config and the ordered source list, so the
/// same inputs always map to the same id.
pub fn run_id(config_norm: &str, urls: &[String]) -> String {
    let mut h = Sha256::new();
    h.update(config_norm.as_bytes());
    for url in urls {
        h.update(b"\n");
        h.update(url.as_bytes());
    }
    format!("{:x}", h.finalize())
}
