use std::collections::HashSet;

use parking_lot::RwLock;

use crate::clock::Clock;
use crate::node::{Node, Value};

/// A hash-slot holding a chain of [`Node`]s under one reader-writer lock.
///
/// Represented as a locked `Vec<Node>` rather than an intrusive linked
/// chain: spec.md's design notes explicitly allow either representation,
/// and a plain vector needs no unsafe cursor juggling to splice nodes
/// during migration. Moving a node between buckets moves the `Node`
/// value itself (and therefore its owned `Value` payload) without
/// cloning any payload bytes — only the surrounding vectors are
/// shifted.
#[derive(Default)]
pub(crate) struct Bucket {
    nodes: RwLock<Vec<Node>>,
}

impl Bucket {
    /// Find-or-append and set the value. Fixes `value`'s shape on first
    /// insert and on every overwrite; does not change the node's
    /// position in the chain or its cached `hash`.
    pub(crate) fn save(&self, key: &str, hash: u32, value: Value, ttl: Option<i64>, clock: &dyn Clock) {
        let expiration = Node::expiration_for(ttl, clock);
        let mut guard = self.nodes.write();
        if let Some(node) = guard.iter_mut().find(|n| &*n.key == key) {
            node.value = value;
            node.expiration = expiration;
        } else {
            guard.push(Node::new(key, hash, value, expiration));
        }
    }

    /// Tombstone the node for `key`, if present. A missing key is a
    /// no-op, not an error: delete is idempotent.
    pub(crate) fn delete(&self, key: &str) {
        let mut guard = self.nodes.write();
        if let Some(node) = guard.iter_mut().find(|n| &*n.key == key) {
            node.tombstone();
        }
    }

    /// The keys of alive nodes, in chain order. Allocates a fresh
    /// snapshot; does not pin the lock past this call.
    pub(crate) fn keys(&self, clock: &dyn Clock) -> Vec<String> {
        let guard = self.nodes.read();
        guard
            .iter()
            .filter(|n| n.is_alive(clock))
            .map(|n| n.key.to_string())
            .collect()
    }

    /// The value stored for `key`, if it exists and is alive.
    pub(crate) fn lookup(&self, key: &str, clock: &dyn Clock) -> Option<Value> {
        let guard = self.nodes.read();
        guard
            .iter()
            .find(|n| &*n.key == key && n.is_alive(clock))
            .map(|n| n.value.clone())
    }

    /// Move every alive node from `src` that both (a) isn't already
    /// shadowed by a fresher write that landed in `self` since growth
    /// was published, and (b) hashes into `dest_index` under
    /// `dest_mask`, out of `src` and into `self`. Returns the count
    /// moved.
    ///
    /// Both buckets' locks are held for the duration, in a fixed
    /// `self` (destination, new generation) before `src` (old
    /// generation) order — the only order migration ever uses, so this
    /// can never deadlock against itself.
    pub(crate) fn migrate_from(
        &self,
        src: &Bucket,
        dest_mask: u32,
        dest_index: u32,
        clock: &dyn Clock,
    ) -> usize {
        let mut dest = self.nodes.write();
        let present: HashSet<Box<str>> = dest.iter().map(|n| n.key.clone()).collect();

        let mut src_guard = src.nodes.write();
        let mut moved = 0;
        let mut i = 0;
        while i < src_guard.len() {
            let should_move = {
                let n = &src_guard[i];
                !present.contains(&n.key) && (n.hash & dest_mask) == dest_index && n.is_alive(clock)
            };

            if should_move {
                let node = src_guard.remove(i);
                dest.push(node);
                moved += 1;
                // `remove` shifted everything after `i` down by one; stay put.
            } else {
                i += 1;
            }
        }

        moved
    }
}
