use report_digest::{config::Normalize, error::ConfigError, normalize::Normalizer};

fn normalize(cfg: &Normalize, raw: &str) -> String {
    Normalizer::new(cfg).unwrap().normalize(raw)
}

#[test]
fn removes_repeated_lines() {
    let cfg = Normalize {
        repeated_line_min_occurrences: 3,
        ..Normalize::default()
    };
    let raw = "ANNUAL REPORT 2024\nHello\n\u{000C}ANNUAL REPORT 2024\nWorld\n\u{000C}ANNUAL REPORT 2024\nAgain";

    let out = normalize(&cfg, raw);
    assert!(!out.contains("ANNUAL REPORT"));
    assert_eq!(out, "Hello\n\nWorld\n\nAgain");
}

#[test]
fn keeps_lines_below_repeat_threshold() {
    let out = normalize(&Normalize::default(), "Revenue\nRevenue\nCosts");
    assert_eq!(out, "Revenue\nRevenue\nCosts");
}

#[test]
fn sanitizes_control_chars() {
    let cfg = Normalize {
        collapse_inline_whitespace: false,
        ..Normalize::default()
    };
    let out = normalize(&cfg, "Alpha\u{0002}Beta\u{0084}\nLine\tTabbed\r\nNext");

    assert!(!out.contains('\u{0002}'));
    assert!(!out.contains('\u{0084}'));
    assert!(out.contains("AlphaBeta"));
    assert!(out.contains("Line\tTabbed\nNext"));
}

#[test]
fn drops_page_number_lines() {
    let raw = "Results improved.\n12\nPage 3 of 40\n7 / 40\nOutlook is stable.";
    assert_eq!(
        normalize(&Normalize::default(), raw),
        "Results improved.\nOutlook is stable."
    );
}

#[test]
fn collapses_whitespace_and_blank_runs() {
    let raw = "  \n\nGroup   sales\u{00A0}rose  \n\n\n\n  Operating income fell \n\n";
    assert_eq!(
        normalize(&Normalize::default(), raw),
        "Group sales rose\n\nOperating income fell"
    );
}

#[test]
fn applies_compatibility_normalization() {
    // ligature and full-width digits
    let out = normalize(&Normalize::default(), "\u{FB01}nancial year \u{FF12}\u{FF10}\u{FF12}\u{FF14}");
    assert_eq!(out, "financial year 2024");
}

#[test]
fn nothing_left_is_empty() {
    assert_eq!(normalize(&Normalize::default(), "1\n2\n\u{000C}3\n"), "");
    assert_eq!(normalize(&Normalize::default(), ""), "");
}

#[test]
fn invalid_pattern_is_a_config_error() {
    let mut cfg = Normalize::default();
    cfg.regex.patterns = vec!["(unclosed".into()];
    match Normalizer::new(&cfg) {
        Err(ConfigError::Pattern { pattern, .. }) => assert_eq!(pattern, "(unclosed"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("pattern should not compile"),
    }
}
