mod backend_stub;

use predicates::prelude::*;

use backend_stub::{BackendStub, BackendStubConfig, DOCUMENT};

fn shell(stub: &BackendStub) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("teachassist");
    cmd.env("TEACHASSIST_BASE_URL", &stub.base_url)
        .env("TEACHASSIST_POLL_INITIAL_DELAY_MS", "10")
        .env("TEACHASSIST_POLL_INTERVAL_MS", "20")
        .env_remove("TEACHASSIST_CONFIG")
        .env_remove("RUST_LOG")
        .arg("shell");
    cmd
}

#[test]
fn quiz_round_trip_submits_the_score() {
    let stub = BackendStub::spawn(BackendStubConfig::default());
    shell(&stub)
        .write_stdin("start\nopen ch1.json\ntopic 1\ngenerate quiz\ntake\n1\n3\nanalytics\nback\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("AI Teaching Assistant"))
        .stdout(predicate::str::contains("Topic 1: Geometry"))
        .stdout(predicate::str::contains("Quiz: Fractions"))
        .stdout(predicate::str::contains("Question 2 of 2"))
        .stdout(predicate::str::contains("Score: 2/2 (100%)"))
        .stdout(predicate::str::contains("Passed. Nice work!"))
        .stdout(predicate::str::contains("Proficiency by topic"))
        .stdout(predicate::str::contains("! alert").not());

    let generate = stub.requests_to("/generate/quiz");
    assert_eq!(generate.len(), 1);
    assert_eq!(
        generate[0].json(),
        serde_json::json!({"filename": DOCUMENT, "topic_index": 1})
    );

    let submitted = stub.requests_to("/quiz/submit");
    assert_eq!(submitted.len(), 1);
    let result = submitted[0].json();
    assert_eq!(result["topic"], "Fractions");
    assert_eq!(result["score"], 2);
    assert_eq!(result["total_questions"], 2);
    assert_eq!(result["weak_subtopics"], serde_json::json!([]));
    assert!(result["date"].as_str().is_some_and(|d| d.ends_with('Z')));
}

#[test]
fn deferred_video_is_polled_then_saved() {
    let stub = BackendStub::spawn(BackendStubConfig {
        video_pending_probes: 1,
        ..BackendStubConfig::default()
    });
    let dir = tempfile::TempDir::new().expect("tempdir");
    let script = format!(
        "start\nopen Class 7 Maths\nkind video\ngenerate\nsave {}\nquit\n",
        dir.path().display()
    );

    shell(&stub)
        .write_stdin(script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Short video ready: Video_ch1_0.mp4"))
        .stdout(predicate::str::contains("Saved 4096 bytes"));

    assert!(dir.path().join("Video_ch1_0.mp4").exists());
}

#[test]
fn chat_and_errors_keep_the_session_alive() {
    let stub = BackendStub::spawn(BackendStubConfig::default());
    shell(&stub)
        .write_stdin("open ch1.json\nstart\nopen missing.json\nchat\nwhat is a ratio?\n/exit\nback\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("! alert: no document named \"ch1.json\""))
        .stdout(predicate::str::contains("! alert: no document named \"missing.json\""))
        .stdout(predicate::str::contains("tutor> You asked: what is a ratio?"))
        .stdout(predicate::str::contains("teachassist> "));
}
