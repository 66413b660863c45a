//! CSV import/export of score entries.
//!
//! Schema (both directions): `student_id,subject_id,exam_id,obtained_marks`
//! with a header row. Every data row yields exactly one [`ImportOutcome`], in
//! input order, whether it parsed, validated, or neither.

use crate::calc::round_off;
use crate::config::ScoreRules;
use crate::error::{CoreError, ErrorKind, Rejection};
use crate::model::{Catalogs, EntryIndex, EntryKey, ScoreEntry};
use crate::validate::{validate, Accepted, EntryAction};
use serde::Serialize;
use serde_json::json;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub const CSV_COLUMNS: [&str; 4] = ["student_id", "subject_id", "exam_id", "obtained_marks"];

/// Quotes a field when a reader would otherwise split it, or trim it.
pub fn csv_quote(s: &str) -> String {
    let needs_quotes = s.contains(',')
        || s.contains('"')
        || s.contains('\n')
        || s.contains('\r')
        || s.trim() != s;
    if needs_quotes {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Splits one record into fields. Unquoted fields are trimmed; quoted fields
/// keep their content exactly, including edge whitespace and line breaks.
fn parse_csv_record(record: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = record.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' if in_quotes => in_quotes = false,
            '"' if !quoted && buf.trim().is_empty() => {
                buf.clear();
                quoted = true;
                in_quotes = true;
            }
            ',' if !in_quotes => {
                out.push(finish_field(std::mem::take(&mut buf), quoted));
                quoted = false;
            }
            // Padding after a closing quote.
            c if quoted && !in_quotes && c.is_whitespace() => {}
            _ => buf.push(ch),
        }
    }
    out.push(finish_field(buf, quoted));
    out
}

fn finish_field(buf: String, quoted: bool) -> String {
    if quoted {
        buf
    } else {
        buf.trim().to_string()
    }
}

/// Cuts text into records at line breaks outside quotes. Each record comes
/// with the physical line it starts on (1-based).
fn split_records(text: &str) -> Vec<(usize, String)> {
    let mut records = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut start = 1usize;
    for ch in text.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                buf.push(ch);
            }
            '\n' if !in_quotes => {
                if buf.ends_with('\r') {
                    buf.pop();
                }
                records.push((start, std::mem::take(&mut buf)));
                line += 1;
                start = line;
            }
            '\n' => {
                buf.push(ch);
                line += 1;
            }
            _ => buf.push(ch),
        }
    }
    if !buf.is_empty() {
        records.push((start, buf));
    }
    records
}

/// One non-blank data record. `row` counts data rows from 1; `line` is the
/// physical line the record starts on (header is line 1).
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub row: usize,
    pub line: usize,
    pub fields: Vec<String>,
}

/// Splits CSV text into raw rows after checking the header.
pub fn read_rows(text: &str) -> Result<Vec<RawRow>, CoreError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = split_records(text)
        .into_iter()
        .filter(|(_, r)| !r.trim().is_empty());

    let Some((_, header)) = records.next() else {
        return Err(CoreError::MalformedRow("missing header row".into()));
    };
    let columns: Vec<String> = parse_csv_record(&header)
        .into_iter()
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if columns != CSV_COLUMNS {
        return Err(CoreError::MalformedRow(format!(
            "header must be {}",
            CSV_COLUMNS.join(",")
        )));
    }

    Ok(records
        .enumerate()
        .map(|(i, (line, record))| RawRow {
            row: i + 1,
            line,
            fields: parse_csv_record(&record),
        })
        .collect())
}

/// Turns a raw row into an entry, or explains why it cannot be read.
pub fn parse_row(raw: &RawRow) -> Result<ScoreEntry, Rejection> {
    if raw.fields.len() != CSV_COLUMNS.len() {
        return Err(Rejection::new(
            ErrorKind::MalformedRow,
            format!(
                "expected {} columns, found {}",
                CSV_COLUMNS.len(),
                raw.fields.len()
            ),
        )
        .with_details(json!({ "columns": raw.fields.len() })));
    }
    let field = |idx: usize| raw.fields[idx].as_str();
    for (idx, name) in CSV_COLUMNS.iter().enumerate().take(3) {
        if field(idx).trim().is_empty() {
            return Err(Rejection::new(ErrorKind::MalformedRow, format!("{} is blank", name)));
        }
    }
    let marks_text = field(3).trim();
    let obtained_marks = match marks_text.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            return Err(Rejection::new(
                ErrorKind::MalformedRow,
                "obtained_marks must be numeric",
            )
            .with_details(json!({ "value": marks_text })));
        }
    };
    Ok(ScoreEntry {
        student_id: field(0).to_string(),
        subject_id: field(1).to_string(),
        exam_id: field(2).to_string(),
        obtained_marks,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub row: usize,
    pub line: usize,
    pub result: Result<Accepted, Rejection>,
}

/// Runs every row through parsing and validation against one snapshot.
///
/// Rows never depend on each other except for in-batch duplicates: the first
/// valid row of a triple claims it and later valid rows for the same triple
/// are rejected as `DuplicateInBatch`. A rejected row stages nothing, so it
/// does not claim the triple; otherwise a typo in the first row would leave
/// the triple with no entry even though a later row is good.
pub fn import_rows(
    rows: &[RawRow],
    catalogs: Catalogs<'_>,
    existing: &EntryIndex,
    rules: ScoreRules,
    update_allowed: bool,
) -> Vec<ImportOutcome> {
    let mut claimed: HashMap<EntryKey, usize> = HashMap::new();
    rows.iter()
        .map(|raw| {
            let result = parse_row(raw)
                .and_then(|entry| validate(&entry, catalogs, existing, rules, update_allowed))
                .and_then(|accepted| match claimed.entry(accepted.entry.key()) {
                    Entry::Occupied(first) => Err(Rejection::new(
                        ErrorKind::DuplicateInBatch,
                        "an earlier row in this batch already targets this student, subject and exam",
                    )
                    .with_details(json!({ "firstRow": first.get() }))),
                    Entry::Vacant(slot) => {
                        slot.insert(raw.row);
                        Ok(accepted)
                    }
                });
            if let Err(r) = &result {
                debug!(row = raw.row, code = r.kind.code(), "row rejected");
            }
            ImportOutcome {
                row: raw.row,
                line: raw.line,
                result,
            }
        })
        .collect()
}

/// Header check plus [`import_rows`]. Only a missing or wrong header fails the
/// whole batch; every other problem is a per-row outcome.
pub fn import_batch(
    text: &str,
    catalogs: Catalogs<'_>,
    existing: &EntryIndex,
    rules: ScoreRules,
    update_allowed: bool,
) -> Result<Vec<ImportOutcome>, CoreError> {
    let rows = read_rows(text)?;
    Ok(import_rows(&rows, catalogs, existing, rules, update_allowed))
}

/// Accepted entries in row order, ready for the store to commit as one unit.
pub fn staged_entries(outcomes: &[ImportOutcome]) -> Vec<ScoreEntry> {
    outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .map(|a| a.entry.clone())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub rows_total: usize,
    pub accepted: usize,
    pub inserted: usize,
    pub updated: usize,
    pub rejected: usize,
    pub rejected_by_code: BTreeMap<&'static str, usize>,
}

impl ImportSummary {
    pub fn of(outcomes: &[ImportOutcome]) -> Self {
        let mut summary = ImportSummary {
            rows_total: outcomes.len(),
            ..Default::default()
        };
        for o in outcomes {
            match &o.result {
                Ok(a) => {
                    summary.accepted += 1;
                    match a.action {
                        EntryAction::Insert => summary.inserted += 1,
                        EntryAction::Update { .. } => summary.updated += 1,
                    }
                }
                Err(r) => {
                    summary.rejected += 1;
                    *summary.rejected_by_code.entry(r.kind.code()).or_insert(0) += 1;
                }
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportBatch {
    pub text: String,
    pub rows: usize,
    pub skipped: usize,
}

/// Fixed-precision marks text, rounded the same way marksheet figures are.
pub fn format_marks(marks: f64, places: u32) -> String {
    format!("{:.*}", places as usize, round_off(marks, places))
}

/// Writes entries sorted by student, subject, then exam. Entries whose student
/// or subject is not in the catalogs are skipped; `class_id` restricts the
/// export to one class's subjects.
pub fn export_batch(
    entries: &[ScoreEntry],
    catalogs: Catalogs<'_>,
    decimal_precision: u32,
    class_id: Option<&str>,
) -> ExportBatch {
    let mut selected: Vec<&ScoreEntry> = Vec::with_capacity(entries.len());
    let mut skipped = 0usize;
    for e in entries {
        let subject = catalogs.subjects.get(&e.subject_id);
        let known = catalogs.students.get(&e.student_id).is_some() && subject.is_some();
        if !known {
            skipped += 1;
            continue;
        }
        if let (Some(class_id), Some(subject)) = (class_id, subject) {
            if subject.class_id != class_id {
                continue;
            }
        }
        selected.push(e);
    }
    selected.sort_by(|a, b| {
        (&a.student_id, &a.subject_id, &a.exam_id).cmp(&(&b.student_id, &b.subject_id, &b.exam_id))
    });

    let mut text = CSV_COLUMNS.join(",");
    text.push('\n');
    for e in &selected {
        text.push_str(&format!(
            "{},{},{},{}\n",
            csv_quote(&e.student_id),
            csv_quote(&e.subject_id),
            csv_quote(&e.exam_id),
            format_marks(e.obtained_marks, decimal_precision)
        ));
    }
    ExportBatch {
        text,
        rows: selected.len(),
        skipped,
    }
}
