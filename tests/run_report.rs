use report_digest::{
    error::FailureKind,
    report::{CompanyReport, FailureRecord, ReportStatus, RunReport, Stage},
    source::plan_sources,
    util::run_id,
};

fn reports() -> Vec<CompanyReport> {
    let urls: Vec<String> = [
        "https://www.roche.com/ar.pdf",
        "https://www.bayer.com/ar.pdf",
        "https://www.amgen.com/ar.pdf",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let sources = plan_sources(&urls, "_analysis.txt");

    let mut complete = CompanyReport::pending(&sources[0]);
    complete.status = ReportStatus::Complete;
    complete.chunks_total = 2;
    complete.chunks_succeeded = 2;
    complete.output_file = Some("out/roche_analysis.txt".into());

    let failed = CompanyReport::pending(&sources[1]).fail(
        Stage::Fetching,
        FailureRecord::new(FailureKind::FetchError, "HTTP 404"),
    );

    let mut partial = CompanyReport::pending(&sources[2]);
    partial.status = ReportStatus::Partial;
    partial.chunks_total = 4;
    partial.chunks_succeeded = 3;
    partial.failures.push(FailureRecord::for_chunk(
        FailureKind::TransientError,
        "transient oracle error: 503",
        2,
    ));
    partial.output_file = Some("out/amgen_analysis.txt".into());

    // deliberately out of order, as concurrent sources finish
    vec![partial, failed, complete]
}

#[test]
fn counts_and_orders_sources() {
    let report = RunReport::new("abc", "gpt-4o-mini", "t0".into(), "t1".into(), reports());
    assert_eq!(report.counts.complete, 1);
    assert_eq!(report.counts.partial, 1);
    assert_eq!(report.counts.failed, 1);
    let companies: Vec<&str> = report.sources.iter().map(|r| r.company.as_str()).collect();
    assert_eq!(companies, vec!["Roche", "Bayer", "Amgen"]);
    assert!(report.any_succeeded());
}

#[test]
fn summary_names_every_source_and_reason() {
    let report = RunReport::new("abc", "gpt-4o-mini", "t0".into(), "t1".into(), reports());
    let text = report.render_summary();

    assert!(text.starts_with("Run summary: 1 complete, 1 partial, 1 failed (3 sources)"));
    assert!(text.contains("[complete] Roche <https://www.roche.com/ar.pdf> -> out/roche_analysis.txt"));
    assert!(text.contains("[failed  ] Bayer"));
    assert!(text.contains("FetchError: HTTP 404"));
    assert!(text.contains("1 of 4 chunks failed (chunk 3)"));
}

#[test]
fn failed_report_drops_output() {
    let r = reports().remove(0).fail(
        Stage::Persisted,
        FailureRecord::new(FailureKind::PersistError, "disk full"),
    );
    assert_eq!(r.status, ReportStatus::Failed);
    assert_eq!(r.failed_stage, Some(Stage::Persisted));
    assert!(r.output_file.is_none());
    assert_eq!(
        r.failure_kinds(),
        vec![FailureKind::TransientError, FailureKind::PersistError]
    );
}

#[test]
fn json_shape() {
    let report = RunReport::new("abc", "gpt-4o-mini", "t0".into(), "t1".into(), reports());
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["sources"][0]["status"], "complete");
    assert_eq!(json["sources"][1]["failed_stage"], "fetching");
    assert_eq!(json["sources"][1]["failures"][0]["kind"], "FetchError");
    assert_eq!(json["sources"][2]["failures"][0]["chunk_index"], 2);
    assert!(json["sources"][0].get("failed_stage").is_none());
}

#[test]
fn nothing_succeeded() {
    let only_failed: Vec<CompanyReport> = reports()
        .into_iter()
        .filter(|r| r.status == ReportStatus::Failed)
        .collect();
    let report = RunReport::new("abc", "m", "t0".into(), "t1".into(), only_failed);
    assert!(!report.any_succeeded());
}

#[test]
fn run_id_depends_on_config_and_sources() {
    let urls = vec!["https://a.example/1.pdf".to_string()];
    let id = run_id("cfg", &urls);
    assert_eq!(id.len(), 64);
    assert_eq!(id, run_id("cfg", &urls));
    assert_ne!(id, run_id("cfg2", &urls));
    assert_ne!(id, run_id("cfg", &["https://a.example/2.pdf".to_string()]));
}
