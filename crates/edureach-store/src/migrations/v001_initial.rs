//! v001 -- Initial schema creation.
//!
//! Creates the seven collections of the persisted layout and their first
//! secondary indexes.

use edureach_shared::constants::{
    STORE_COURSES, STORE_NOTES, STORE_OFFLINE_QUEUE, STORE_QUIZZES, STORE_SUBMISSIONS,
    STORE_USERS, STORE_VIDEOS,
};

use super::Migration;
use crate::schema::Step;

pub const MIGRATION: Migration = Migration {
    version: 1,
    name: "v001_initial",
    steps: &[
        Step::Collection(STORE_USERS),
        // ------------------------------------------------------------
        Step::Collection(STORE_COURSES),
        Step::Index {
            collection: STORE_COURSES,
            name: "teacherId",
            key_path: "teacherId",
        },
        // ------------------------------------------------------------
        Step::Collection(STORE_QUIZZES),
        Step::Index {
            collection: STORE_QUIZZES,
            name: "courseId",
            key_path: "courseId",
        },
        Step::Index {
            collection: STORE_QUIZZES,
            name: "isOffline",
            key_path: "isOffline",
        },
        // ------------------------------------------------------------
        Step::Collection(STORE_SUBMISSIONS),
        Step::Index {
            collection: STORE_SUBMISSIONS,
            name: "studentId",
            key_path: "studentId",
        },
        Step::Index {
            collection: STORE_SUBMISSIONS,
            name: "quizId",
            key_path: "quizId",
        },
        Step::Index {
            collection: STORE_SUBMISSIONS,
            name: "synced",
            key_path: "synced",
        },
        // ------------------------------------------------------------
        Step::Collection(STORE_NOTES),
        Step::Index {
            collection: STORE_NOTES,
            name: "courseId",
            key_path: "courseId",
        },
        // ------------------------------------------------------------
        Step::Collection(STORE_VIDEOS),
        Step::Index {
            collection: STORE_VIDEOS,
            name: "courseId",
            key_path: "courseId",
        },
        // ------------------------------------------------------------
        Step::Collection(STORE_OFFLINE_QUEUE),
        Step::Index {
            collection: STORE_OFFLINE_QUEUE,
            name: "timestamp",
            key_path: "timestamp",
        },
    ],
};
