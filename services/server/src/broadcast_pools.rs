//! §4.6 — one concurrent map per year group, values are bounded send
//! queues. `broadcast` attempts a non-blocking enqueue to each recipient;
//! a full queue drops the message for that recipient and logs a warning.

use cca_protocol::YearGroup;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::warn;

pub struct BroadcastPools {
    y9: DashMap<String, mpsc::Sender<String>>,
    y10: DashMap<String, mpsc::Sender<String>>,
    y11: DashMap<String, mpsc::Sender<String>>,
    y12: DashMap<String, mpsc::Sender<String>>,
}

impl BroadcastPools {
    pub fn new() -> Self {
        Self {
            y9: DashMap::new(),
            y10: DashMap::new(),
            y11: DashMap::new(),
            y12: DashMap::new(),
        }
    }

    fn pool(&self, yg: YearGroup) -> Option<&DashMap<String, mpsc::Sender<String>>> {
        match yg {
            YearGroup::Y9 => Some(&self.y9),
            YearGroup::Y10 => Some(&self.y10),
            YearGroup::Y11 => Some(&self.y11),
            YearGroup::Y12 => Some(&self.y12),
            YearGroup::Staff => None,
        }
    }

    pub fn register(&self, yg: YearGroup, user_id: &str, tx: mpsc::Sender<String>) {
        if let Some(pool) = self.pool(yg) {
            pool.insert(user_id.to_owned(), tx);
        }
    }

    pub fn unregister(&self, yg: YearGroup, user_id: &str) {
        if let Some(pool) = self.pool(yg) {
            pool.remove(user_id);
        }
    }

    /// Non-blocking fan-out to every registered sender in the year group.
    pub fn broadcast(&self, yg: YearGroup, msg: &str) {
        let Some(pool) = self.pool(yg) else { return };
        for entry in pool.iter() {
            if entry.value().try_send(msg.to_owned()).is_err() {
                warn!(user_id = %entry.key(), year_group = %yg, "broadcast queue full, dropping message");
            }
        }
    }
}

impl Default for BroadcastPools {
    fn default() -> Self {
        Self::new()
    }
}
