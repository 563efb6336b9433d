//! Ingestion integration tests: files on disk through to trajectories.

use std::io::Write;

use depthlab_core::ingest::{load_trajectories, InputFormat, IngestError};

fn write_file(lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

#[test]
fn per_record_file_loads_in_order() {
    // GIVEN: a file with one trajectory per line, one of them unparsable
    let file = write_file(&[
        r#"{"uid": "a", "gold": "12", "steps": [{"ans": "7", "conf": 0.4}, {"ans": "12", "conf": 0.85}]}"#,
        r#"{"uid": "b", "gold": "3", "steps": [{"ans": 3, "conf": 0.9}]"#,
        r#"{"uid": "c", "gold": "5", "steps": [{"ans": "5.0", "conf": 0.7}]}"#,
    ]);

    // WHEN: loading it
    let out = load_trajectories(file.path()).unwrap();

    // THEN: the good records survive in file order and the bad line is reported
    assert_eq!(out.format, InputFormat::TrajectoryPerRecord);
    let ids: Vec<&str> = out.trajectories.iter().map(|t| t.id()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(out.trajectories[1].answer_at(1), "5");
    assert_eq!(out.rejected.len(), 1);
    assert_eq!(out.rejected[0].line(), 2);
}

#[test]
fn flat_file_groups_rows() {
    // GIVEN: flat per-step rows interleaved across examples
    let file = write_file(&[
        r#"{"uid": "q1", "t": 1, "pred_answer": "10", "confidence": 0.3, "gold": "12", "max_new_tokens": 96}"#,
        r#"{"uid": "q2", "t": 1, "pred_answer": "4", "confidence": 0.9, "gold": "4", "max_new_tokens": 96}"#,
        r#"{"uid": "q1", "t": 2, "pred_answer": "12", "confidence": 0.8, "gold": "12", "max_new_tokens": 160}"#,
    ]);

    // WHEN: loading it
    let out = load_trajectories(file.path()).unwrap();

    // THEN: each uid becomes one trajectory ordered by step
    assert_eq!(out.format, InputFormat::FlatSteps);
    assert_eq!(out.trajectories.len(), 2);
    let q1 = &out.trajectories[0];
    assert_eq!(q1.max_depth(), 2);
    assert!(q1.is_correct_at(2));
    assert_eq!(q1.tokens_through(2), 256);
}

#[test]
fn empty_steps_abort_the_load() {
    // GIVEN: a trajectory with an empty step list
    let file = write_file(&[r#"{"uid": "x", "gold": "1", "steps": []}"#]);

    // WHEN / THEN: normalization fails naming the trajectory
    let err = load_trajectories(file.path()).unwrap_err();
    assert!(matches!(err, IngestError::MalformedTrajectory { ref id, .. } if id == "x"));
}
