use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_MAX_MARKS: u32 = 100;

fn default_max_marks() -> u32 {
    DEFAULT_MAX_MARKS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub class_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub class_id: String,
    #[serde(default = "default_max_marks")]
    pub max_marks: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub student_id: String,
    pub subject_id: String,
    pub exam_id: String,
    pub obtained_marks: f64,
}

impl ScoreEntry {
    pub fn key(&self) -> EntryKey {
        EntryKey {
            student_id: self.student_id.clone(),
            subject_id: self.subject_id.clone(),
            exam_id: self.exam_id.clone(),
        }
    }
}

/// The (student, subject, exam) triple. Field order is the export sort order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    pub student_id: String,
    pub subject_id: String,
    pub exam_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct StudentCatalog {
    by_id: BTreeMap<String, Student>,
}

impl StudentCatalog {
    pub fn new(students: Vec<Student>) -> Result<Self, CoreError> {
        let mut by_id = BTreeMap::new();
        for s in students {
            if s.id.trim().is_empty() {
                return Err(CoreError::InvalidCatalog("student id must not be blank".into()));
            }
            if by_id.contains_key(&s.id) {
                return Err(CoreError::InvalidCatalog(format!(
                    "duplicate student id {}",
                    s.id
                )));
            }
            by_id.insert(s.id.clone(), s);
        }
        Ok(Self { by_id })
    }

    pub fn get(&self, id: &str) -> Option<&Student> {
        self.by_id.get(id)
    }

    pub fn in_class<'a>(&'a self, class_id: &'a str) -> impl Iterator<Item = &'a Student> {
        self.by_id.values().filter(move |s| s.class_id == class_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubjectCatalog {
    by_id: BTreeMap<String, Subject>,
}

impl SubjectCatalog {
    pub fn new(subjects: Vec<Subject>) -> Result<Self, CoreError> {
        let mut by_id = BTreeMap::new();
        for s in subjects {
            if s.id.trim().is_empty() {
                return Err(CoreError::InvalidCatalog("subject id must not be blank".into()));
            }
            if s.max_marks == 0 {
                return Err(CoreError::InvalidCatalog(format!(
                    "subject {} must have positive maxMarks",
                    s.id
                )));
            }
            if let Some(c) = s.credit {
                if !c.is_finite() || c <= 0.0 {
                    return Err(CoreError::InvalidCatalog(format!(
                        "subject {} credit must be a positive number",
                        s.id
                    )));
                }
            }
            if by_id.contains_key(&s.id) {
                return Err(CoreError::InvalidCatalog(format!(
                    "duplicate subject id {}",
                    s.id
                )));
            }
            by_id.insert(s.id.clone(), s);
        }
        Ok(Self { by_id })
    }

    pub fn get(&self, id: &str) -> Option<&Subject> {
        self.by_id.get(id)
    }

    /// Subjects offered to a class, in catalog (id) order.
    pub fn for_class<'a>(&'a self, class_id: &'a str) -> impl Iterator<Item = &'a Subject> {
        self.by_id.values().filter(move |s| s.class_id == class_id)
    }
}

/// Snapshot of already-stored entries, keyed by triple.
#[derive(Debug, Clone, Default)]
pub struct EntryIndex {
    marks_by_key: HashMap<EntryKey, f64>,
}

impl EntryIndex {
    pub fn from_entries(entries: &[ScoreEntry]) -> Self {
        let marks_by_key = entries
            .iter()
            .map(|e| (e.key(), e.obtained_marks))
            .collect();
        Self { marks_by_key }
    }

    pub fn get(&self, key: &EntryKey) -> Option<f64> {
        self.marks_by_key.get(key).copied()
    }
}

/// Borrowed view of both catalogs for a single computation.
#[derive(Debug, Clone, Copy)]
pub struct Catalogs<'a> {
    pub students: &'a StudentCatalog,
    pub subjects: &'a SubjectCatalog,
}
