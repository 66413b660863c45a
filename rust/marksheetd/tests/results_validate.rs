use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_marksheetd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn marksheetd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

fn scenario_config() -> serde_json::Value {
    json!({
        "gradeBoundaries": [[90, "A", 10], [75, "B", 8], [60, "C", 6], [0, "D", 4]],
        "gpaMode": "simple",
        "allowPartial": false,
        "updateAllowed": false,
        "decimalPrecision": 2
    })
}

fn students() -> serde_json::Value {
    json!([
        { "id": "s1", "name": "Asha Rao", "classId": "10A" },
        { "id": "s2", "name": "Ben Okafor", "classId": "10A" },
        { "id": "s3", "name": "Chen Li", "classId": "9B" }
    ])
}

fn subjects() -> serde_json::Value {
    json!([
        { "id": "eng", "name": "English", "classId": "10A", "maxMarks": 100, "credit": 2 },
        { "id": "math", "name": "Math", "classId": "10A", "maxMarks": 100, "credit": 4 },
        { "id": "sci", "name": "Science", "classId": "10A", "maxMarks": 100, "credit": 3 },
        { "id": "art", "name": "Art", "classId": "9B", "maxMarks": 50 }
    ])
}

fn validate_params(marks: f64, existing: serde_json::Value) -> serde_json::Value {
    json!({
        "entry": { "studentId": "s1", "subjectId": "art", "examId": "final", "obtainedMarks": marks },
        "students": students(),
        "subjects": subjects(),
        "existing": existing
    })
}

#[test]
fn maximum_marks_is_accepted_and_one_more_is_out_of_range() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "config.set",
        json!({ "config": scenario_config() }),
    );

    let mut params = validate_params(100.0, json!([]));
    params["entry"]["subjectId"] = json!("math");
    let at_max = request_ok(&mut stdin, &mut reader, "2", "results.validate", params);
    assert_eq!(at_max.get("status").and_then(|v| v.as_str()), Some("accepted"));
    assert_eq!(at_max.get("action").and_then(|v| v.as_str()), Some("insert"));

    let mut params = validate_params(101.0, json!([]));
    params["entry"]["subjectId"] = json!("math");
    let over = request_ok(&mut stdin, &mut reader, "3", "results.validate", params);
    assert_eq!(over.get("status").and_then(|v| v.as_str()), Some("rejected"));
    assert_eq!(over.get("code").and_then(|v| v.as_str()), Some("out_of_range"));
    assert_eq!(
        over.pointer("/details/maxMarks").and_then(|v| v.as_u64()),
        Some(100)
    );
}

#[test]
fn subject_of_another_class_is_an_unknown_reference() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "config.set",
        json!({ "config": scenario_config() }),
    );
    // art belongs to 9B, s1 is in 10A.
    let value = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "results.validate",
        validate_params(10.0, json!([])),
    );
    assert_eq!(value.get("code").and_then(|v| v.as_str()), Some("unknown_reference"));
}

#[test]
fn existing_entry_is_duplicate_unless_update_is_allowed() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "config.set",
        json!({ "config": scenario_config() }),
    );
    let existing = json!([
        { "studentId": "s3", "subjectId": "art", "examId": "final", "obtainedMarks": 20 }
    ]);
    let mut params = validate_params(35.0, existing);
    params["entry"]["studentId"] = json!("s3");

    let dup = request_ok(&mut stdin, &mut reader, "2", "results.validate", params.clone());
    assert_eq!(dup.get("code").and_then(|v| v.as_str()), Some("duplicate_entry"));

    params["updateAllowed"] = json!(true);
    let upd = request_ok(&mut stdin, &mut reader, "3", "results.validate", params.clone());
    assert_eq!(upd.get("action").and_then(|v| v.as_str()), Some("update"));
    assert_eq!(upd.get("previousMarks").and_then(|v| v.as_f64()), Some(20.0));
    assert_eq!(
        upd.pointer("/entry/obtainedMarks").and_then(|v| v.as_f64()),
        Some(35.0)
    );

    params["updateAllowed"] = json!("yes");
    let bad = request(&mut stdin, &mut reader, "4", "results.validate", params);
    assert_eq!(error_code(&bad), Some("bad_params"));
}

#[test]
fn fractional_marks_follow_the_configured_policy() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let mut cfg = scenario_config();
    cfg["allowFractional"] = json!(false);
    let _ = request_ok(&mut stdin, &mut reader, "1", "config.set", json!({ "config": cfg }));

    let mut params = validate_params(40.5, json!([]));
    params["entry"]["studentId"] = json!("s3");
    let value = request_ok(&mut stdin, &mut reader, "2", "results.validate", params);
    assert_eq!(value.get("code").and_then(|v| v.as_str()), Some("malformed_score"));

    let dup_catalog = request(
        &mut stdin,
        &mut reader,
        "3",
        "results.validate",
        json!({
            "entry": { "studentId": "s1", "subjectId": "math", "examId": "final", "obtainedMarks": 1 },
            "students": [
                { "id": "s1", "name": "A", "classId": "10A" },
                { "id": "s1", "name": "B", "classId": "10A" }
            ],
            "subjects": subjects()
        }),
    );
    assert_eq!(error_code(&dup_catalog), Some("invalid_catalog"));
}
