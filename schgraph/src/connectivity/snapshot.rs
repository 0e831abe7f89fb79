//! Publication of completed graphs to concurrent readers.
//!
//! Writers take a [`Ticket`] before recalculating and publish afterwards. A
//! result is accepted only if no newer ticket has been published already, so
//! a slow recalculation cannot overwrite a faster, more recent one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::graph::ConnectionGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
struct Published {
    ticket: Option<Ticket>,
    graph: Option<Arc<ConnectionGraph>>,
}

#[derive(Debug, Default)]
pub struct GraphSnapshots {
    next: AtomicU64,
    published: RwLock<Published>,
}

impl GraphSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a ticket for a recalculation about to start.
    pub fn begin(&self) -> Ticket {
        Ticket(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Publish `graph` under `ticket`. Returns false when a newer result is
    /// already visible and this one was discarded.
    pub fn publish(&self, ticket: Ticket, graph: impl Into<Arc<ConnectionGraph>>) -> bool {
        let mut published = match self.published.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if published.ticket.is_some_and(|current| current > ticket) {
            tracing::debug!(?ticket, "discarding stale graph snapshot");
            return false;
        }
        published.ticket = Some(ticket);
        published.graph = Some(graph.into());
        true
    }

    /// Most recently published graph.
    pub fn latest(&self) -> Option<Arc<ConnectionGraph>> {
        let published = match self.published.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        published.graph.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GraphOptions;

    #[test]
    fn test_latest_is_empty_until_published() {
        let snapshots = GraphSnapshots::new();
        assert!(snapshots.latest().is_none());
        let ticket = snapshots.begin();
        assert!(snapshots.publish(ticket, ConnectionGraph::new(GraphOptions::default())));
        assert!(snapshots.latest().is_some());
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let snapshots = GraphSnapshots::new();
        let slow = snapshots.begin();
        let fast = snapshots.begin();
        assert!(slow < fast);

        let newer = Arc::new(ConnectionGraph::new(GraphOptions::default()));
        assert!(snapshots.publish(fast, newer.clone()));
        assert!(!snapshots.publish(slow, ConnectionGraph::new(GraphOptions::default())));

        let latest = snapshots.latest().unwrap();
        assert!(Arc::ptr_eq(&latest, &newer));
    }

    #[test]
    fn test_concurrent_publishers_keep_newest() {
        let snapshots = Arc::new(GraphSnapshots::new());
        let tickets: Vec<Ticket> = (0..8).map(|_| snapshots.begin()).collect();
        let newest = *tickets.last().unwrap();

        std::thread::scope(|scope| {
            for ticket in tickets.iter().rev().copied() {
                let snapshots = Arc::clone(&snapshots);
                scope.spawn(move || {
                    snapshots.publish(ticket, ConnectionGraph::new(GraphOptions::default()));
                });
            }
        });

        let published = snapshots.published.read().unwrap();
        assert_eq!(published.ticket, Some(newest));
    }
}
