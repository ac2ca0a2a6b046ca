use super::Migration;
use crate::schema::Step;

pub const MIGRATION: Migration = Migration {
    version: 3,
    name: "v003_local_storage",
    steps: &[Step::KeyValue],
};
