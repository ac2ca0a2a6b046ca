//! v002 -- Index the queue by sync status so the drain scan is an index lookup.

use edureach_shared::constants::STORE_OFFLINE_QUEUE;

use super::Migration;
use crate::schema::Step;

pub const MIGRATION: Migration = Migration {
    version: 2,
    name: "v002_queue_synced_index",
    steps: &[Step::Index {
        collection: STORE_OFFLINE_QUEUE,
        name: "synced",
        key_path: "synced",
    }],
};
