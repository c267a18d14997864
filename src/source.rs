use crate::{
    company::{self, CompanyId},
    error::ConfigError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// One input URL plus everything derived from it before processing starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// 1-based position in the input list.
    pub position: usize,
    pub url: String,
    pub company: CompanyId,
    /// Collision-free output file name, e.g. `novartis_analysis.txt`.
    pub output_file: String,
}

pub fn load_source_list(path: &Path) -> Result<Vec<String>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::SourceList {
        path: path.to_path_buf(),
        source,
    })?;
    let urls = parse_source_list(&raw);
    if urls.is_empty() {
        return Err(ConfigError::NoSources {
            path: path.to_path_buf(),
        });
    }
    info!("found {} URLs in {}", urls.len(), path.display());
    Ok(urls)
}

/// One URL per line; blank lines and `#` comments are skipped, as are lines that
/// do not look like URLs.
pub fn parse_source_list(raw: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !line.to_ascii_lowercase().starts_with("http") {
            warn!("line {} does not look like a URL, skipping: {}", line_no + 1, line);
            continue;
        }
        urls.push(line.to_string());
    }
    urls
}

/// Identify every URL and assign output names. Names are resolved in list order,
/// so a repeated identifier gets `_2`, `_3`, ... regardless of which source
/// finishes first.
pub fn plan_sources(urls: &[String], file_suffix: &str) -> Vec<Source> {
    let mut taken: HashSet<String> = HashSet::new();
    urls.iter()
        .enumerate()
        .map(|(i, url)| {
            let position = i + 1;
            let company = company::identify(url, position);
            let output_file = unique_name(&company.slug, file_suffix, &mut taken);
            Source {
                position,
                url: url.clone(),
                company,
                output_file,
            }
        })
        .collect()
}

fn unique_name(slug: &str, suffix: &str, taken: &mut HashSet<String>) -> String {
    let mut candidate = format!("{slug}{suffix}");
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{slug}_{n}{suffix}");
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}
