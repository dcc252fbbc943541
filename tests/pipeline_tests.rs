//! End-to-end pipeline tests over temp CSV files
//!
//! Uses in-process classifiers so no network is involved; the remote client
//! itself is covered by tests/remote_client_tests.rs.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use compliance_mapper::client::Classify;
use compliance_mapper::config::JobConfig;
use compliance_mapper::pipeline::{self, RunSummary};
use compliance_mapper::table::{RecordSource, ResultSink};
use compliance_mapper::types::{Outcome, Row};

const HEADER: &str =
    "name,scan-item,rules,cloud-platform,scan-type,content-description,description";

fn config(batch_size: usize) -> JobConfig {
    toml::from_str(&format!(
        r#"
endpoint = "https://example.com/chat"
framework = "iso"
scope = "aliyun"
prompt_template = "Classify {{name}}"
batch_size = {batch_size}
"#
    ))
    .unwrap()
}

fn input_row(name: &str, platform: &str) -> String {
    format!("{name},scan,deny 22,{platform},config,content,desc")
}

/// Run the pipeline over the given input rows and return the summary plus the
/// output file's lines.
async fn run_job<C: Classify + 'static>(
    config: &JobConfig,
    classifier: Arc<C>,
    rows: &[String],
) -> (RunSummary, Vec<String>) {
    let mut input = tempfile::NamedTempFile::new().unwrap();
    writeln!(input, "{HEADER}").unwrap();
    for row in rows {
        writeln!(input, "{row}").unwrap();
    }
    input.flush().unwrap();

    let output = tempfile::NamedTempFile::new().unwrap();

    let mut source = RecordSource::open(input.path()).unwrap();
    let header = source.header();
    let mut sink = ResultSink::create(output.path(), &header, &config.output_column()).unwrap();

    let summary = pipeline::run(config, classifier, &mut source, &mut sink)
        .await
        .unwrap();

    let written = std::fs::read_to_string(output.path()).unwrap();
    (summary, written.lines().map(str::to_string).collect())
}

/// Always classifies, completing later rows first to scramble completion order.
struct ScrambleClassifier;

#[async_trait]
impl Classify for ScrambleClassifier {
    async fn classify(&self, row: &Row) -> Outcome {
        let delay = 60u64.saturating_sub(row.index() as u64 * 15);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Outcome::Classified(format!("c{}", row.index()))
    }
}

/// Records every dispatched row index.
struct DispatchRecorder {
    seen: Mutex<Vec<usize>>,
}

#[async_trait]
impl Classify for DispatchRecorder {
    async fn classify(&self, row: &Row) -> Outcome {
        self.seen.lock().unwrap().push(row.index());
        Outcome::Classified("X - reason".to_string())
    }
}

/// Fails every row, as if retries were exhausted.
struct AlwaysFailing;

#[async_trait]
impl Classify for AlwaysFailing {
    async fn classify(&self, _row: &Row) -> Outcome {
        Outcome::Failed("request error".to_string())
    }
}

/// Logs start/done events so batch boundaries are observable.
struct EventLog {
    events: Mutex<Vec<String>>,
}

#[async_trait]
impl Classify for EventLog {
    async fn classify(&self, row: &Row) -> Outcome {
        self.events.lock().unwrap().push(format!("start-{}", row.index()));
        // make the first row of the first batch the slowest
        let delay = if row.index() == 0 { 80 } else { 10 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.events.lock().unwrap().push(format!("done-{}", row.index()));
        Outcome::Classified("ok".to_string())
    }
}

#[tokio::test]
async fn test_output_preserves_rows_order_and_adds_one_column() {
    let rows: Vec<String> = (0..5).map(|i| input_row(&format!("r{i}"), "aliyun")).collect();
    let config = config(2);

    let (summary, lines) = run_job(&config, Arc::new(ScrambleClassifier), &rows).await;

    assert_eq!(summary.rows, 5);
    assert_eq!(summary.classified, 5);
    assert_eq!(lines.len(), 6); // header + 5 rows

    assert_eq!(lines[0], format!("{HEADER},isoaliyunStandard"));
    for (i, line) in lines[1..].iter().enumerate() {
        assert!(line.starts_with(&format!("r{i},")), "line out of order: {line}");
        assert!(line.ends_with(&format!(",c{i}")), "outcome misaligned: {line}");
    }
}

#[tokio::test]
async fn test_scope_mismatch_never_dispatched_and_written_with_sentinel() {
    let rows = vec![
        input_row("a", "aliyun"),
        input_row("b", "aws"),
        input_row("c", "aliyun"),
    ];
    let recorder = Arc::new(DispatchRecorder {
        seen: Mutex::new(Vec::new()),
    });
    let config = config(10);

    let (summary, lines) = run_job(&config, Arc::clone(&recorder), &rows).await;

    let mut seen = recorder.seen.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 2], "mismatched row must not reach the classifier");

    assert_eq!(summary.classified, 2);
    assert_eq!(summary.skipped, 1);
    assert!(lines[2].ends_with(",scope mismatch"));
}

#[tokio::test]
async fn test_failed_rows_still_written_and_run_completes() {
    let rows = vec![input_row("a", "aliyun"), input_row("b", "aliyun")];
    let config = config(10);

    let (summary, lines) = run_job(&config, Arc::new(AlwaysFailing), &rows).await;

    assert_eq!(summary.rows, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(lines.len(), 3);
    assert!(lines[1].ends_with(",request error"));
    assert!(lines[2].ends_with(",request error"));
}

#[tokio::test]
async fn test_batch_fully_settles_before_next_batch_dispatches() {
    let rows: Vec<String> = (0..4).map(|i| input_row(&format!("r{i}"), "aliyun")).collect();
    let log = Arc::new(EventLog {
        events: Mutex::new(Vec::new()),
    });
    let config = config(2);

    run_job(&config, Arc::clone(&log), &rows).await;

    let events = log.events.lock().unwrap().clone();
    let pos = |e: &str| events.iter().position(|x| x == e).unwrap();

    // both rows of batch 1 settle before any row of batch 2 starts
    assert!(pos("done-0") < pos("start-2"), "events: {events:?}");
    assert!(pos("done-1") < pos("start-2"), "events: {events:?}");
    assert!(pos("done-0") < pos("start-3"), "events: {events:?}");
}

#[tokio::test]
async fn test_end_to_end_classified_and_skipped_rows() {
    // row A matches scope, row B does not
    let rows = vec![input_row("rowA", "aliyun"), input_row("rowB", "azure")];
    let config = config(20);
    let recorder = Arc::new(DispatchRecorder {
        seen: Mutex::new(Vec::new()),
    });

    let (summary, lines) = run_job(&config, recorder, &rows).await;

    assert_eq!(
        summary,
        RunSummary {
            rows: 2,
            classified: 1,
            skipped: 1,
            failed: 0,
        }
    );
    assert!(lines[1].starts_with("rowA,"));
    assert!(lines[1].ends_with(",X - reason"));
    assert!(lines[2].starts_with("rowB,"));
    assert!(lines[2].ends_with(",scope mismatch"));
}

#[tokio::test]
async fn test_empty_input_produces_header_only() {
    let config = config(20);
    let (summary, lines) = run_job(&config, Arc::new(ScrambleClassifier), &[]).await;

    assert_eq!(summary, RunSummary::default());
    assert_eq!(lines.len(), 1);
}
