//! Role continuity queue
//!
//! When a deleted role is recreated under a new ID, its former members are
//! owed the new role. Grants are queued per member and drained a few at a
//! time so a large role does not flood the platform.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, VecDeque};
use tokio::sync::Mutex;
use warden_types::{GuildId, RoleId, UserId};

/// Roles still owed to one member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleContinuityEntry {
    pub guild_id: GuildId,
    pub member_id: UserId,
    pub pending_role_ids: BTreeSet<RoleId>,
}

#[derive(Debug, Default)]
struct QueueInner {
    /// Members in order of first enqueue
    order: VecDeque<UserId>,
    entries: HashMap<UserId, RoleContinuityEntry>,
}

/// FIFO of continuity entries keyed by member
#[derive(Debug, Default)]
pub struct ContinuityQueue {
    inner: Mutex<QueueInner>,
}

impl ContinuityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Owe `role_id` to `member_id`, merging with any pending entry
    pub async fn enqueue(&self, guild_id: GuildId, member_id: UserId, role_id: RoleId) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        match inner.entries.get_mut(&member_id) {
            Some(entry) => {
                entry.pending_role_ids.insert(role_id);
            }
            None => {
                inner.entries.insert(
                    member_id,
                    RoleContinuityEntry {
                        guild_id,
                        member_id,
                        pending_role_ids: BTreeSet::from([role_id]),
                    },
                );
                inner.order.push_back(member_id);
            }
        }
    }

    /// Copies of the oldest `limit` entries; the queue is left unchanged
    pub async fn peek_batch(&self, limit: usize) -> Vec<RoleContinuityEntry> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|member| inner.entries.get(member))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Settle `processed` role IDs for a member. Roles merged in after the
    /// batch was peeked stay pending; the entry goes away once empty.
    pub async fn complete(&self, member_id: UserId, processed: &BTreeSet<RoleId>) {
        let mut inner = self.inner.lock().await;
        let emptied = match inner.entries.get_mut(&member_id) {
            Some(entry) => {
                entry.pending_role_ids.retain(|role| !processed.contains(role));
                entry.pending_role_ids.is_empty()
            }
            None => false,
        };
        if emptied {
            inner.entries.remove(&member_id);
            inner.order.retain(|m| *m != member_id);
        }
    }

    /// Send a member's entry, untouched, to the back of the queue so later
    /// entries get their turn
    pub async fn defer(&self, member_id: UserId) {
        let mut inner = self.inner.lock().await;
        if !inner.entries.contains_key(&member_id) {
            return;
        }
        inner.order.retain(|m| *m != member_id);
        inner.order.push_back(member_id);
    }

    /// Remove a member's entry outright
    pub async fn drop_entry(&self, member_id: UserId) -> Option<RoleContinuityEntry> {
        let mut inner = self.inner.lock().await;
        let entry = inner.entries.remove(&member_id)?;
        inner.order.retain(|m| *m != member_id);
        Some(entry)
    }

    pub async fn get(&self, member_id: UserId) -> Option<RoleContinuityEntry> {
        self.inner.lock().await.entries.get(&member_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = GuildId::new(1);

    #[tokio::test]
    async fn test_repeat_enqueue_merges() {
        let queue = ContinuityQueue::new();
        queue.enqueue(GUILD, UserId::new(5), RoleId::new(10)).await;
        queue.enqueue(GUILD, UserId::new(6), RoleId::new(10)).await;
        queue.enqueue(GUILD, UserId::new(5), RoleId::new(11)).await;

        assert_eq!(queue.len().await, 2);
        let batch = queue.peek_batch(10).await;
        assert_eq!(batch[0].member_id, UserId::new(5));
        assert_eq!(
            batch[0].pending_role_ids,
            BTreeSet::from([RoleId::new(10), RoleId::new(11)])
        );
        assert_eq!(batch[1].member_id, UserId::new(6));
    }

    #[tokio::test]
    async fn test_complete_keeps_late_merges() {
        let queue = ContinuityQueue::new();
        queue.enqueue(GUILD, UserId::new(5), RoleId::new(10)).await;

        let batch = queue.peek_batch(5).await;
        queue.enqueue(GUILD, UserId::new(5), RoleId::new(12)).await;
        queue
            .complete(UserId::new(5), &batch[0].pending_role_ids)
            .await;

        let entry = queue.get(UserId::new(5)).await.unwrap();
        assert_eq!(entry.pending_role_ids, BTreeSet::from([RoleId::new(12)]));

        queue
            .complete(UserId::new(5), &entry.pending_role_ids)
            .await;
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_deferred_entry_moves_to_back() {
        let queue = ContinuityQueue::new();
        for member in 1..=3 {
            queue.enqueue(GUILD, UserId::new(member), RoleId::new(10)).await;
        }

        queue.defer(UserId::new(1)).await;
        queue.defer(UserId::new(9)).await;

        let members: Vec<_> = queue
            .peek_batch(5)
            .await
            .iter()
            .map(|e| e.member_id.get())
            .collect();
        assert_eq!(members, vec![2, 3, 1]);
        assert_eq!(
            queue.get(UserId::new(1)).await.map(|e| e.pending_role_ids.len()),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_batch_is_fifo_and_bounded() {
        let queue = ContinuityQueue::new();
        for member in 1..=7 {
            queue.enqueue(GUILD, UserId::new(member), RoleId::new(10)).await;
        }

        let batch = queue.peek_batch(5).await;
        let members: Vec<_> = batch.iter().map(|e| e.member_id.get()).collect();
        assert_eq!(members, vec![1, 2, 3, 4, 5]);

        queue.drop_entry(UserId::new(1)).await;
        let batch = queue.peek_batch(5).await;
        assert_eq!(batch.first().map(|e| e.member_id), Some(UserId::new(2)));
        assert_eq!(queue.len().await, 6);
    }
}
