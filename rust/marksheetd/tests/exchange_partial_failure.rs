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

const FIVE_ROWS: &str = "student_id,subject_id,exam_id,obtained_marks\n\
s1,math,final,95\n\
s1,sci,final,78\n\
s1,eng,final,abc\n\
s2,math,final,40\n\
s2,sci,final,101\n";

fn import_params(text: &str) -> serde_json::Value {
    json!({
        "text": text,
        "students": students(),
        "subjects": subjects()
    })
}

#[test]
fn one_bad_row_does_not_sink_the_batch() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "config.set",
        json!({ "config": scenario_config() }),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "exchange.importCsv",
        import_params(FIVE_ROWS),
    );
    assert!(result
        .get("batchId")
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.is_empty()));

    let outcomes = result.get("outcomes").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    assert_eq!(outcomes.len(), 5);
    let rows: Vec<u64> = outcomes
        .iter()
        .filter_map(|o| o.get("row").and_then(|v| v.as_u64()))
        .collect();
    assert_eq!(rows, vec![1, 2, 3, 4, 5]);
    let statuses: Vec<&str> = outcomes
        .iter()
        .map(|o| {
            o.get("code")
                .or_else(|| o.get("status"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
        })
        .collect();
    assert_eq!(
        statuses,
        vec!["accepted", "accepted", "malformed_row", "accepted", "out_of_range"]
    );
    assert_eq!(outcomes[2].get("line").and_then(|v| v.as_u64()), Some(4));

    let staged = result.get("staged").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    assert_eq!(staged.len(), 3);
    assert_eq!(result.pointer("/summary/rejected").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(
        result
            .pointer("/summary/rejectedByCode/malformed_row")
            .and_then(|v| v.as_u64()),
        Some(1)
    );
}

#[test]
fn repeated_triple_in_one_batch_points_at_the_first_row() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "config.set",
        json!({ "config": scenario_config() }),
    );
    let text = "student_id,subject_id,exam_id,obtained_marks\n\
s1,math,final,95\n\
\n\
s1,math,final,96\n";
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "exchange.importCsv",
        import_params(text),
    );
    let outcomes = result.get("outcomes").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(
        outcomes[1].get("code").and_then(|v| v.as_str()),
        Some("duplicate_in_batch")
    );
    assert_eq!(
        outcomes[1].pointer("/details/firstRow").and_then(|v| v.as_u64()),
        Some(1)
    );
    // Blank line is skipped but still counted as a physical line.
    assert_eq!(outcomes[1].get("line").and_then(|v| v.as_u64()), Some(4));
}

#[test]
fn preview_reports_the_same_outcomes_without_staging() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "config.set",
        json!({ "config": scenario_config() }),
    );
    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "exchange.previewCsv",
        import_params(FIVE_ROWS),
    );
    assert!(preview.get("staged").is_none());
    assert_eq!(preview.pointer("/summary/rowsTotal").and_then(|v| v.as_u64()), Some(5));
    assert_eq!(preview.pointer("/summary/accepted").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(
        preview.get("previewTruncated").and_then(|v| v.as_bool()),
        Some(false)
    );

    let bad_header = request(
        &mut stdin,
        &mut reader,
        "3",
        "exchange.previewCsv",
        import_params("student,subject,exam,marks\ns1,math,final,95\n"),
    );
    assert_eq!(error_code(&bad_header), Some("malformed_row"));
}
