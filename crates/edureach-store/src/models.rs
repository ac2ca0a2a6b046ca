//! Domain model structs persisted in the local database.
//!
//! Field names serialize in camelCase so they line up with the key paths of
//! the declared secondary indexes (`teacherId`, `courseId`, ...). Timestamps
//! are Unix epoch milliseconds.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::RecordId;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user profile cached for offline use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    pub email: String,
    /// `admin`, `teacher` or `student`.
    pub role: String,
    #[serde(default)]
    pub preferred_language: Option<String>,
}

// ---------------------------------------------------------------------------
// Course
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Indexed.
    pub teacher_id: i64,
    #[serde(default)]
    pub language: Option<String>,
}

// ---------------------------------------------------------------------------
// Quiz
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Indexed.
    pub course_id: i64,
    pub title: String,
    /// Question bodies, opaque to the store.
    #[serde(default)]
    pub questions: Value,
    #[serde(default)]
    pub time_limit_secs: Option<u32>,
    /// Downloaded for offline attempts. Indexed.
    #[serde(default)]
    pub is_offline: bool,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// A student's answers to a quiz, possibly taken offline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub quiz_id: i64,
    pub student_id: i64,
    #[serde(default)]
    pub answers: Value,
    #[serde(default)]
    pub score: Option<f64>,
    pub submitted_at: i64,
    /// Whether the server has acknowledged it. Indexed.
    #[serde(default)]
    pub synced: bool,
}

// ---------------------------------------------------------------------------
// Note
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub course_id: i64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub updated_at: i64,
}

// ---------------------------------------------------------------------------
// Video reference
// ---------------------------------------------------------------------------

/// Pointer to a lecture video, and to its downloaded copy when there is one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub course_id: i64,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub local_path: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<u32>,
}

// ---------------------------------------------------------------------------
// Pending-action entry
// ---------------------------------------------------------------------------

/// One deferred side-effecting call, kept after sync as an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Remote operation, used as the path segment of the sync call.
    pub action: String,
    /// Request body, opaque to the queue.
    pub data: Value,
    /// Creation time. Indexed.
    pub timestamp: i64,
    /// Indexed; the drain scans `synced = false`.
    pub synced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<i64>,
}
