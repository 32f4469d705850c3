use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use gold_harness::annotation::{AnnotationMatrix, IngestOptions};
use tempfile::tempdir;

struct Row<'a> {
    hit: &'a str,
    worker: &'a str,
    assignment: &'a str,
    status: &'a str,
    minutes: u32,
    answers: &'a [(u32, &'a str)],
    feedback: &'a str,
}

impl<'a> Row<'a> {
    fn new(worker: &'a str, assignment: &'a str, answers: &'a [(u32, &'a str)]) -> Self {
        Self {
            hit: "H1",
            worker,
            assignment,
            status: "Approved",
            minutes: 5,
            answers,
            feedback: "",
        }
    }
}

/// Writes a platform-style export. Every item gets a routing column (`q1`,
/// non-terminal answer) and a leaf column (`q8`) holding the terminal option.
fn write_export(dir: &Path, name: &str, rows: &[Row<'_>]) -> PathBuf {
    let items: BTreeSet<u32> = rows
        .iter()
        .flat_map(|r| r.answers.iter().map(|(item, _)| *item))
        .collect();

    let mut header = vec![
        "hitid".to_string(),
        "workerid".to_string(),
        "assignmentid".to_string(),
        "assignmentaccepttime".to_string(),
        "assignmentsubmittime".to_string(),
        "assignmentstatus".to_string(),
    ];
    for item in &items {
        header.push(format!("Answer.{item}_q1"));
        header.push(format!("Answer.{item}_q8"));
    }
    header.push("Answer.feedback".to_string());

    let mut writer = csv::Writer::from_path(dir.join(name)).unwrap();
    writer.write_record(&header).unwrap();
    for row in rows {
        let mut record = vec![
            row.hit.to_string(),
            row.worker.to_string(),
            row.assignment.to_string(),
            "Tue Apr 19 10:00:00 PDT 2016".to_string(),
            format!("Tue Apr 19 10:{:02}:00 PDT 2016", row.minutes),
            row.status.to_string(),
        ];
        for item in &items {
            match row.answers.iter().find(|(i, _)| i == item) {
                Some((_, label)) => {
                    record.push(format!("{item}_q1_o1_1"));
                    record.push(format!("{item}_q1_o1_1_q8_{label}"));
                }
                None => {
                    record.push(String::new());
                    record.push(String::new());
                }
            }
        }
        record.push(row.feedback.to_string());
        writer.write_record(&record).unwrap();
    }
    writer.flush().unwrap();
    dir.join(name)
}

#[test]
fn item_and_worker_views_hold_the_same_assignments() {
    let dir = tempdir().unwrap();
    let path = write_export(
        dir.path(),
        "batch.csv",
        &[
            Row::new("W1", "A1", &[(1, "o5_1"), (2, "o8_1")]),
            Row::new("W2", "A2", &[(1, "o5_1"), (2, "o9_2")]),
            Row::new("W3", "A3", &[(2, "o8_1")]),
        ],
    );

    let matrix = AnnotationMatrix::ingest(&[path], &IngestOptions::default()).unwrap();
    let by_worker = matrix.derive_worker_view();

    let mut from_items = 0;
    for (item_id, workers) in matrix.item_view() {
        for (worker_id, assignment) in workers {
            from_items += 1;
            let mirrored = by_worker[worker_id.as_str()][item_id];
            assert_eq!(mirrored, assignment);
        }
    }
    let from_workers: usize = by_worker.values().map(|items| items.len()).sum();
    assert_eq!(from_items, 5);
    assert_eq!(from_workers, from_items);
    assert_eq!(matrix.len(), 5);

    for (worker_id, items) in &by_worker {
        for (item_id, assignment) in items {
            assert_eq!(matrix.get(*item_id, worker_id), Some(*assignment));
        }
    }

    assert_eq!(matrix.worker_ids(), vec!["W1", "W2", "W3"]);
    assert_eq!(matrix.item_ids(), vec![1, 2]);
    let a = matrix.get(2, "W2").unwrap();
    assert_eq!(a.label, "o9_2");
    assert_eq!(a.work_seconds(), 300);
}

#[test]
fn same_worker_twice_on_an_item_is_inconsistent() {
    let dir = tempdir().unwrap();
    let mut second = Row::new("W1", "A2", &[(46566, "o5_1")]);
    second.hit = "H2";
    let path = write_export(
        dir.path(),
        "dup.csv",
        &[Row::new("W1", "A1", &[(46566, "o5_1")]), second],
    );

    let err = AnnotationMatrix::ingest(&[path], &IngestOptions::default()).unwrap_err();
    assert_eq!(err.code(), "data_inconsistency");
    assert!(err.to_string().contains("item 46566"), "{err}");
}

#[test]
fn rejected_duplicate_is_dropped() {
    let dir = tempdir().unwrap();
    let mut rejected = Row::new("W1", "A9", &[(7, "o6_1")]);
    rejected.status = "Rejected";

    for (name, rows) in [
        ("rejected_last.csv", vec![Row::new("W1", "A1", &[(7, "o5_1")]), rejected]),
        ("rejected_first.csv", {
            let mut r = Row::new("W1", "A9", &[(7, "o6_1")]);
            r.status = "Rejected";
            vec![r, Row::new("W1", "A1", &[(7, "o5_1")])]
        }),
    ] {
        let path = write_export(dir.path(), name, &rows);
        let matrix = AnnotationMatrix::ingest(&[path], &IngestOptions::default()).unwrap();
        assert_eq!(matrix.len(), 1, "{name}");
        let kept = matrix.get(7, "W1").unwrap();
        assert_eq!(kept.label, "o5_1", "{name}");
        assert_eq!(kept.assignment_id, "A1", "{name}");
        assert!(!kept.rejected);
    }
}

#[test]
fn duplicates_across_files_are_detected() {
    let dir = tempdir().unwrap();
    let a = write_export(dir.path(), "a.csv", &[Row::new("W1", "A1", &[(3, "o7_2")])]);
    let b = write_export(dir.path(), "b.csv", &[Row::new("W1", "A2", &[(3, "o7_3")])]);

    let err = AnnotationMatrix::ingest(&[a, b], &IngestOptions::default()).unwrap_err();
    assert_eq!(err.code(), "data_inconsistency");
}

#[test]
fn pending_rows_are_skipped_unless_accepted() {
    let dir = tempdir().unwrap();
    let mut pending = Row::new("W2", "A2", &[(1, "o9_4")]);
    pending.status = "Submitted";
    let path = write_export(
        dir.path(),
        "pending.csv",
        &[Row::new("W1", "A1", &[(1, "o9_4")]), pending],
    );

    let strict = AnnotationMatrix::ingest(&[&path], &IngestOptions::default()).unwrap();
    assert_eq!(strict.worker_ids(), vec!["W1"]);

    let options = IngestOptions {
        accept_non_final_rows: true,
        ..IngestOptions::default()
    };
    let lenient = AnnotationMatrix::ingest(&[&path], &options).unwrap();
    assert_eq!(lenient.worker_ids(), vec!["W1", "W2"]);
}

#[test]
fn feedback_is_collected_per_worker() {
    let dir = tempdir().unwrap();
    let mut first = Row::new("W1", "A1", &[(1, "o8_4")]);
    first.feedback = "units 3 and 4 were identical";
    let mut second = Row::new("W1", "A2", &[(2, "o8_4")]);
    second.hit = "H2";
    second.feedback = "thanks";
    let path = write_export(
        dir.path(),
        "feedback.csv",
        &[first, second, Row::new("W2", "A3", &[(1, "o8_4")])],
    );

    let matrix = AnnotationMatrix::ingest(&[path], &IngestOptions::default()).unwrap();
    assert_eq!(
        matrix.feedback().get("W1").unwrap(),
        &vec!["units 3 and 4 were identical".to_string(), "thanks".to_string()]
    );
    assert!(!matrix.feedback().contains_key("W2"));
}

#[test]
fn missing_worker_id_is_a_data_error() {
    let dir = tempdir().unwrap();
    let path = write_export(dir.path(), "blank.csv", &[Row::new("", "A1", &[(1, "o5_2")])]);
    let err = AnnotationMatrix::ingest(&[path], &IngestOptions::default()).unwrap_err();
    assert_eq!(err.code(), "data_inconsistency");
    assert!(err.to_string().contains("workerid"));
}

#[test]
fn malformed_timestamp_aborts_ingestion() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad_time.csv");
    std::fs::write(
        &path,
        "hitid,workerid,assignmentid,assignmentaccepttime,assignmentsubmittime,assignmentstatus,Answer.1_q8\n\
         H1,W1,A1,2016-04-19 10:00,Tue Apr 19 10:05:00 PDT 2016,Approved,1_q8_o8_1\n",
    )
    .unwrap();
    let err = AnnotationMatrix::ingest(&[path], &IngestOptions::default()).unwrap_err();
    assert_eq!(err.code(), "malformed");
}

#[test]
fn first_n_keeps_earliest_submissions() {
    let dir = tempdir().unwrap();
    let mut rows = Vec::new();
    let workers = ["W1", "W2", "W3", "W4"];
    let assignments = ["A1", "A2", "A3", "A4"];
    for (i, (w, a)) in workers.iter().zip(assignments.iter()).enumerate() {
        let mut row = Row::new(w, a, &[(1, "o6_2")]);
        row.minutes = 40 - i as u32 * 10;
        rows.push(row);
    }
    let path = write_export(dir.path(), "timed.csv", &rows);
    let matrix = AnnotationMatrix::ingest(&[path], &IngestOptions::default()).unwrap();

    let first = matrix.keep_first_n_per_item(2, false);
    assert_eq!(first.worker_ids(), vec!["W3", "W4"]);
    let last = matrix.keep_first_n_per_item(2, true);
    assert_eq!(last.worker_ids(), vec!["W1", "W2"]);
}

#[test]
fn keeping_no_assignments_leaves_an_empty_matrix() {
    let dir = tempdir().unwrap();
    let rows = [
        Row::new("W1", "A1", &[(1, "o6_2"), (2, "o8_1")]),
        Row::new("W2", "A2", &[(1, "o6_2")]),
    ];
    let path = write_export(dir.path(), "batch.csv", &rows);
    let matrix = AnnotationMatrix::ingest(&[path], &IngestOptions::default()).unwrap();

    let none = matrix.keep_first_n_per_item(0, false);
    assert_eq!(none.len(), 0);
    assert!(none.is_empty());
    assert!(none.item_ids().is_empty());
    assert!(gold_harness::EstimatorInput::from_matrix(&none).rows.is_empty());

    let one = matrix.keep_first_n_per_item(1, false);
    assert_eq!(one.item_ids(), vec![1, 2]);
    assert_eq!(one.len(), 2);
}
