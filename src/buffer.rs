//! Bounded per-user check-in history
//!
//! Each user keeps at most [`HISTORY_CAPACITY`] check-ins; inserting beyond
//! capacity evicts the oldest entry first. The buffer exclusively owns all
//! history state - callers only ever receive cloned snapshots. Mutation is
//! serialized per user; different users do not contend.

use crate::types::CheckIn;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

/// Retained check-ins per user
pub const HISTORY_CAPACITY: usize = 3;

type UserHistory = Arc<Mutex<VecDeque<CheckIn>>>;

/// Fixed-capacity FIFO buffer of recent check-ins, keyed by user
#[derive(Debug)]
pub struct CheckInBuffer {
    users: RwLock<HashMap<String, UserHistory>>,
    capacity: usize,
}

impl Default for CheckInBuffer {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl CheckInBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Append a check-in to the user's history, evicting the oldest entry
    /// when over capacity. Returns the post-insert snapshot.
    pub fn record(&self, checkin: CheckIn) -> Vec<CheckIn> {
        let history = self.user_entry(&checkin.user_id);
        // Poisoning only happens if a panic occurred mid-push; the deque is
        // still structurally valid either way
        let mut history = history.lock().unwrap_or_else(|e| e.into_inner());
        history.push_back(checkin);
        while history.len() > self.capacity {
            history.pop_front();
        }
        history.iter().cloned().collect()
    }

    /// Current ordered history for a user; unknown users yield an empty vec
    pub fn history(&self, user_id: &str) -> Vec<CheckIn> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        match users.get(user_id) {
            Some(history) => {
                let history = history.lock().unwrap_or_else(|e| e.into_inner());
                history.iter().cloned().collect()
            }
            None => Vec::new(),
        }
    }

    fn user_entry(&self, user_id: &str) -> UserHistory {
        {
            let users = self.users.read().unwrap_or_else(|e| e.into_inner());
            if let Some(history) = users.get(user_id) {
                return Arc::clone(history);
            }
        }
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            users
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(VecDeque::with_capacity(self.capacity)))),
        )
    }
}
