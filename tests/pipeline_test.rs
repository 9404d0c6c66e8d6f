use chrono::NaiveDate;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use yelp_elite_processor::input::find_input_files;
use yelp_elite_processor::output::{write_results, OutputFormat};
use yelp_elite_processor::{
    run_pipeline, JoinPolicy, PipelineError, PipelineInputs, PipelineOptions, ScoringConfig,
};

fn user(id: &str, review_count: i64, fans: i64, elite: &str, since: &str, counters: i64) -> Value {
    json!({
        "user_id": id,
        "review_count": review_count,
        "fans": fans,
        "yelping_since": since,
        "elite": elite,
        "useful": counters, "funny": counters, "cool": counters,
        "compliment_hot": counters, "compliment_cool": counters, "compliment_more": counters,
        "compliment_list": counters, "compliment_cute": counters, "compliment_note": counters,
        "compliment_funny": counters, "compliment_plain": counters, "compliment_photos": counters,
        "compliment_profile": counters, "compliment_writer": counters
    })
}

fn review(user: &str, business: &str, length: i64, stars: f64, useful: i64) -> Value {
    json!({
        "user_id": user,
        "business_id": business,
        "length": length,
        "stars": stars,
        "useful": useful
    })
}

fn write_lines(dir: &Path, name: &str, rows: &[Value]) -> PathBuf {
    let path = dir.join(name);
    let body: String = rows.iter().map(|r| format!("{}\n", r)).collect();
    fs::write(&path, body).unwrap();
    path
}

fn options(strict: bool) -> PipelineOptions {
    PipelineOptions {
        scoring: ScoringConfig::default(),
        join_policy: JoinPolicy { strict },
        reference_date: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    inputs: PipelineInputs,
}

fn fixture(users: &[Value], businesses: &[Value], reviews: &[Value]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let inputs = PipelineInputs {
        user_files: vec![write_lines(dir.path(), "user.json", users)],
        business_files: vec![write_lines(dir.path(), "business.json", businesses)],
        review_files: vec![write_lines(dir.path(), "review.json", reviews)],
    };
    Fixture { dir, inputs }
}

fn standard_fixture() -> Fixture {
    fixture(
        &[
            // Elite user clearing every threshold
            user("alice", 200, 50, "2016,2017,2018", "2010-01-01", 10),
            // Elite user below every threshold
            user("bob", 1, 0, "2018", "2019-01-01", 0),
            user("carol", 2, 1, "", "2018-01-01", 0),
            // No reviews at all
            user("dave", 3, 2, "", "2015-01-01", 1),
        ],
        &[
            // Synthetic rating so alice's average consistency clears 73.14
            json!({"business_id": "b0", "stars": -4000.0}),
            json!({"business_id": "b1", "stars": 3.0}),
            json!({"business_id": "b2", "stars": 4.5}),
        ],
        &[
            review("alice", "b0", 4000, 5.0, 6000),
            review("alice", "b0", 4000, 5.0, 6000),
            review("alice", "b0", 4000, 5.0, 6000),
            review("alice", "b0", 4000, 5.0, 6000),
            review("bob", "b2", 10, 1.0, 0),
            review("carol", "b1", 30, 3.5, 1),
            review("carol", "b2", 50, 4.5, 3),
            review("carol", "closed", 999, 1.0, 99),
        ],
    )
}

#[test]
fn end_to_end_scores_one_row_per_reviewing_user() {
    let fx = standard_fixture();
    let out = run_pipeline(&fx.inputs, &options(false)).unwrap();

    let ids: Vec<_> = out.scoring.rows.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(ids, vec!["alice", "bob", "carol"]);

    assert_eq!(out.summary.reviews_parsed, 8);
    assert_eq!(out.summary.reviews_joined, 7);
    assert_eq!(out.summary.reviews_dropped, 1);
    assert_eq!(out.summary.users_dropped, 1);
    assert_eq!(out.summary.users_scored, 3);
    assert_eq!(out.summary.actual_elite, 2);
}

#[test]
fn unknown_business_review_never_reaches_aggregates() {
    let fx = standard_fixture();
    let out = run_pipeline(&fx.inputs, &options(false)).unwrap();
    let carol = out
        .features
        .iter()
        .find(|f| f.user.user_id == "carol")
        .unwrap();
    // (30 + 50) / 2 and (1 + 3) / 2; the 999-length review is dropped
    assert_eq!(carol.avg_review_length, 40.0);
    assert_eq!(carol.total_useful, 4);
    assert_eq!(carol.avg_useful, 2.0);
    // ((3.5 - 3.0) + (4.5 - 4.5)) / 2
    assert_eq!(carol.avg_consistency, 0.25);
}

#[test]
fn first_rows_follow_the_documented_scenario() {
    let fx = standard_fixture();
    let out = run_pipeline(&fx.inputs, &options(false)).unwrap();

    // avg_useful 24000 / 200 = 120, avg_consistency 4 * 4005 / 200 = 80.1
    let features = &out.features[0];
    assert_eq!(features.avg_useful, 120.0);
    assert!((features.avg_consistency - 80.1).abs() < 1e-9);

    let alice = &out.scoring.rows[0];
    assert_eq!(alice.predicted_label, 1);
    assert_eq!(alice.weights, [1.0; 9]);

    let bob = &out.scoring.rows[1];
    assert_eq!(bob.predicted_label, 0);
    for w in bob.weights {
        assert!((w - 0.9).abs() < 1e-12, "weight {w}");
    }
}

#[test]
fn strict_joins_reject_unknown_business() {
    let fx = standard_fixture();
    let err = run_pipeline(&fx.inputs, &options(true)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::JoinKeyMismatch { .. })
    ));
}

#[test]
fn zero_review_count_aborts_the_run() {
    let fx = fixture(
        &[user("zero", 0, 0, "", "2018-01-01", 0)],
        &[json!({"business_id": "b1", "stars": 3.0})],
        &[review("zero", "b1", 10, 3.0, 0)],
    );
    let err = run_pipeline(&fx.inputs, &options(false)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::DivisionByZero { .. })
    ));
}

#[test]
fn malformed_record_aborts_the_run() {
    let fx = fixture(
        &[user("u1", 1, 0, "", "2018-01-01", 0)],
        &[json!({"stars": 3.0})],
        &[review("u1", "b1", 10, 3.0, 0)],
    );
    let err = run_pipeline(&fx.inputs, &options(false)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::MalformedRecord { field: "business_id", .. })
    ));
}

#[test]
fn rerun_is_deterministic() {
    let fx = standard_fixture();
    let first = run_pipeline(&fx.inputs, &options(false)).unwrap();
    let second = run_pipeline(&fx.inputs, &options(false)).unwrap();
    assert_eq!(first.scoring, second.scoring);
}

#[test]
fn glob_inputs_and_csv_output() {
    let fx = standard_fixture();
    let dir = fx.dir.path();
    let inputs = PipelineInputs {
        user_files: find_input_files(&format!("{}/user*.json", dir.display())).unwrap(),
        business_files: find_input_files(&format!("{}/business*.json", dir.display())).unwrap(),
        review_files: find_input_files(&format!("{}/review*.json", dir.display())).unwrap(),
    };
    let out = run_pipeline(&inputs, &options(false)).unwrap();

    let csv_path = dir.join("elite.csv");
    write_results(&csv_path, &out.scoring.rows, OutputFormat::Csv).unwrap();
    let content = fs::read_to_string(&csv_path).unwrap();
    assert_eq!(content.lines().count(), 4);
    assert!(content.lines().nth(1).unwrap().starts_with("alice,1,"));
}
