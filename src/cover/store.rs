//! Cover POST content store.
//!
//! Maps boundary ids to pre-built multipart POST bodies destined for the
//! cover origin. A plugin inserts an entry when it serves an upload form;
//! the request rewriter consumes the entry when the matching POST arrives,
//! possibly on a different connection. Entries are single-use.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Shared, single-use store of cover POST bodies keyed by boundary id.
#[derive(Default)]
pub struct PostStore {
    posts: Mutex<HashMap<String, Vec<u8>>>,
}

impl PostStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a POST body under the given boundary id.
    pub fn put(&self, id: impl Into<String>, body: Vec<u8>) {
        self.posts.lock().insert(id.into(), body);
    }

    /// Remove and return the body for `id`; `None` if absent or already
    /// taken.
    pub fn take(&self, id: &str) -> Option<Vec<u8>> {
        self.posts.lock().remove(id)
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.posts.lock().len()
    }

    /// Is the store empty?
    pub fn is_empty(&self) -> bool {
        self.posts.lock().is_empty()
    }
}
