//! Operator notices.
//!
//! Trade outcomes are reported through a [`NoticeSink`]. The console keeps
//! the most recent notices in a bounded [`NoticeBoard`].

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::types::Notice;

pub const DEFAULT_NOTICE_CAPACITY: usize = 50;

pub trait NoticeSink: Send + Sync {
    fn publish(&self, notice: Notice);
}

pub struct NoticeBoard {
    recent: Mutex<VecDeque<Notice>>,
    capacity: usize,
}

impl NoticeBoard {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<Notice> {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_CAPACITY)
    }
}

impl NoticeSink for NoticeBoard {
    fn publish(&self, notice: Notice) {
        debug!(level = ?notice.level, description = %notice.description, "Notice");

        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent.push_back(notice);
        while recent.len() > self.capacity {
            recent.pop_front();
        }
    }
}
