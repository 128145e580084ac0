//! Ordered navigation history of the application's screens.
//!
//! [`ScreenStack`] keeps one record per screen identity, oldest at the
//! bottom and the most recently activated screen on top. Records hold the
//! screen weakly so the platform can reclaim a closed screen; records whose
//! screen is gone are skipped by every read and dropped by every mutation.

use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::platform::Screen;

/// Tracker-assigned key of one stack record.
///
/// Keys grow monotonically, so a re-activated screen gets a fresh key and
/// stale keys never alias a newer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScreenKey(u64);

/// A change applied to the stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackEvent {
    /// A screen was pushed on top.
    Pushed { key: ScreenKey, identity: String },
    /// A record was removed, either as a stale duplicate or because its
    /// screen was reclaimed.
    Removed { key: ScreenKey, identity: String },
    /// The whole stack was cleared.
    Cleared,
}

struct ScreenRecord {
    key: ScreenKey,
    identity: String,
    screen: Weak<dyn Screen>,
}

impl ScreenRecord {
    fn is_live(&self) -> bool {
        self.screen.strong_count() > 0
    }
}

/// LIFO history of activated screens.
#[derive(Default)]
pub struct ScreenStack {
    records: Vec<ScreenRecord>,
    next_key: u64,
}

impl ScreenStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `screen` on top without any duplicate check.
    pub fn push(&mut self, screen: &Arc<dyn Screen>) -> StackEvent {
        let key = ScreenKey(self.next_key);
        self.next_key += 1;
        let identity = screen.identity();
        self.records.push(ScreenRecord {
            key,
            identity: identity.clone(),
            screen: Arc::downgrade(screen),
        });
        StackEvent::Pushed { key, identity }
    }

    /// Records that `screen` became active.
    ///
    /// Any earlier record for the same identity is removed first, so a
    /// screen navigated back to moves to the top instead of appearing
    /// twice. A screen that is already finishing is not pushed.
    pub fn record_activation(&mut self, screen: &Arc<dyn Screen>) -> Vec<StackEvent> {
        let identity = screen.identity();
        let mut events = if self.contains_identity(&identity) {
            self.remove_identity(&identity)
        } else {
            Vec::new()
        };
        if !screen.is_finishing() {
            events.push(self.push(screen));
        }
        events
    }

    /// Removes the record for `identity` along with every reclaimed record.
    pub fn remove_identity(&mut self, identity: &str) -> Vec<StackEvent> {
        let mut events = Vec::new();
        self.records.retain(|record| {
            let keep = record.is_live() && record.identity != identity;
            if !keep {
                events.push(StackEvent::Removed {
                    key: record.key,
                    identity: record.identity.clone(),
                });
            }
            keep
        });
        events
    }

    pub fn contains_identity(&self, identity: &str) -> bool {
        self.records.iter().any(|r| r.identity == identity)
    }

    /// The top screen, or `None` when the stack is empty or the top screen
    /// has been reclaimed.
    pub fn top(&self) -> Option<Arc<dyn Screen>> {
        self.records.last().and_then(|r| r.screen.upgrade())
    }

    /// Identity of the top record, live or not.
    pub fn top_identity(&self) -> Option<&str> {
        self.records.last().map(|r| r.identity.as_str())
    }

    /// Whether the stack is non-empty and its top screen is still alive.
    pub fn has_live_top(&self) -> bool {
        self.records.last().is_some_and(ScreenRecord::is_live)
    }

    /// Live screens, oldest activation first.
    pub fn live_screens(&self) -> Vec<Arc<dyn Screen>> {
        self.records.iter().filter_map(|r| r.screen.upgrade()).collect()
    }

    /// Identities of all records, oldest first.
    pub fn identities(&self) -> Vec<String> {
        self.records.iter().map(|r| r.identity.clone()).collect()
    }

    /// True when no record refers to a live screen.
    pub fn is_empty(&self) -> bool {
        !self.records.iter().any(ScreenRecord::is_live)
    }

    /// Number of records, including ones whose screen was reclaimed.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn clear(&mut self) -> StackEvent {
        self.records.clear();
        StackEvent::Cleared
    }
}

impl std::fmt::Debug for ScreenStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenStack")
            .field("identities", &self.identities())
            .field("next_key", &self.next_key)
            .finish()
    }
}
