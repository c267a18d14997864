//! Company identification from report URLs.
//!
//! A URL is matched against [`KNOWN_COMPANIES`] first; failing that, the
//! registrable domain label is used. Identification never fails.

use serde::{Deserialize, Serialize};
use url::{Host, Url};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId {
    /// Human-readable name used in reports.
    pub name: String,
    /// Lowercase, filename-safe form of the identifier.
    pub slug: String,
}

/// `(alias, display name, slug)`, checked in order. An alias matches a URL token
/// that starts with it.
pub const KNOWN_COMPANIES: &[(&str, &str, &str)] = &[
    ("novartis", "Novartis", "novartis"),
    ("gsk", "GSK", "gsk"),
    ("takeda", "Takeda", "takeda"),
    ("pfizer", "Pfizer", "pfizer"),
    ("roche", "Roche", "roche"),
    ("jnj", "Johnson & Johnson", "johnson_and_johnson"),
    ("merck", "Merck", "merck"),
    ("abbvie", "AbbVie", "abbvie"),
    ("amgen", "Amgen", "amgen"),
    ("gilead", "Gilead", "gilead"),
    ("astrazeneca", "AstraZeneca", "astrazeneca"),
    ("sanofi", "Sanofi", "sanofi"),
    ("bayer", "Bayer", "bayer"),
    ("lilly", "Eli Lilly", "eli_lilly"),
    ("bms", "Bristol Myers Squibb", "bristol_myers_squibb"),
    ("novonordisk", "Novo Nordisk", "novo_nordisk"),
];

// Public suffixes spanning two labels that show up in investor-relations hosts.
const TWO_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "com.au", "net.au", "co.jp", "ne.jp", "or.jp", "com.br",
    "co.in", "co.kr", "com.cn", "com.hk", "com.sg", "co.nz", "co.za", "com.mx", "com.tr",
];

/// Identify the company behind `url`. `position` is the 1-based place of the
/// URL in its source list and only shows up in the unparseable-URL fallback.
pub fn identify(url: &str, position: usize) -> CompanyId {
    let parsed = match Url::parse(url.trim()) {
        Ok(u) => u,
        Err(_) => return unknown(position),
    };

    let host = match parsed.host() {
        Some(Host::Domain(d)) => d.to_ascii_lowercase(),
        _ => return unknown(position),
    };

    let haystack = format!("{} {}", host, parsed.path().to_ascii_lowercase());
    if let Some(found) = match_alias(&haystack) {
        return found;
    }

    registrable_label(&host)
        .and_then(|label| from_label(&label))
        .unwrap_or_else(|| unknown(position))
}

fn match_alias(haystack: &str) -> Option<CompanyId> {
    let tokens: Vec<&str> = haystack
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    KNOWN_COMPANIES
        .iter()
        .find(|(alias, _, _)| tokens.iter().any(|t| t.starts_with(alias)))
        .map(|(_, name, slug)| CompanyId {
            name: (*name).to_string(),
            slug: (*slug).to_string(),
        })
}

fn registrable_label(host: &str) -> Option<String> {
    let labels: Vec<&str> = host
        .trim_end_matches('.')
        .split('.')
        .filter(|l| !l.is_empty())
        .collect();

    match labels.len() {
        0 => None,
        1 => Some(labels[0].to_string()),
        n => {
            let tail = format!("{}.{}", labels[n - 2], labels[n - 1]);
            let suffix_labels = if n >= 3 && TWO_LABEL_SUFFIXES.contains(&tail.as_str()) {
                2
            } else {
                1
            };
            Some(labels[n - suffix_labels - 1].to_string())
        }
    }
}

fn from_label(label: &str) -> Option<CompanyId> {
    let slug = slugify(label)?;
    let name = slug
        .split('_')
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ");
    Some(CompanyId { name, slug })
}

fn unknown(position: usize) -> CompanyId {
    let label = format!("unknown_source_{position}");
    CompanyId {
        name: label.clone(),
        slug: label,
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercase `s` and collapse every run of non-alphanumerics into one `_`.
/// Returns `None` when nothing alphanumeric is left.
pub fn slugify(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut pending_sep = false;
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() { None } else { Some(out) }
}
