use std::sync::atomic::{AtomicI64, Ordering};

use crate::bucket::Bucket;
use crate::clock::Clock;
use crate::hash::hash_key;
use crate::node::Value;

/// A fixed-size power-of-two array of [`Bucket`]s plus growth counters.
///
/// `writes` is the drain indicator the growth protocol waits on: it is
/// incremented before a bucket mutation and decremented after, so once
/// a `Store` stops receiving new writes (because `head` has moved on to
/// a newer generation) its `writes` counter is monotone non-increasing
/// and reaches zero in bounded time. `nodes` is an approximate
/// live-insert count (it doesn't account for deletes or overwrites) —
/// it exists only to trigger growth.
pub(crate) struct Store {
    buckets: Vec<Bucket>,
    mask: u32,
    grow_threshold: i64,
    writes: AtomicI64,
    nodes: AtomicI64,
}

impl Store {
    pub(crate) fn new(bucket_count: usize, grow_factor: i64) -> Self {
        debug_assert!(bucket_count.is_power_of_two(), "bucket count must be a power of two");
        Store {
            buckets: (0..bucket_count).map(|_| Bucket::default()).collect(),
            mask: (bucket_count - 1) as u32,
            grow_threshold: bucket_count as i64 * grow_factor,
            writes: AtomicI64::new(0),
            nodes: AtomicI64::new(0),
        }
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn mask(&self) -> u32 {
        self.mask
    }

    fn bucket_for(&self, hash: u32) -> &Bucket {
        &self.buckets[(hash & self.mask) as usize]
    }

    /// Write `value` for `key`. Returns `true` if the live-insert count
    /// has reached `grow_threshold`, signaling the caller to arm a
    /// growth.
    pub(crate) fn write(&self, key: &str, value: Value, ttl: Option<i64>, clock: &dyn Clock) -> bool {
        self.writes.fetch_add(1, Ordering::AcqRel);
        let hash = hash_key(key.as_bytes());
        self.bucket_for(hash).save(key, hash, value, ttl, clock);
        let nodes = self.nodes.fetch_add(1, Ordering::AcqRel) + 1;
        self.writes.fetch_sub(1, Ordering::Release);
        nodes >= self.grow_threshold
    }

    pub(crate) fn delete(&self, key: &str) {
        self.writes.fetch_add(1, Ordering::AcqRel);
        let hash = hash_key(key.as_bytes());
        self.bucket_for(hash).delete(key);
        self.writes.fetch_sub(1, Ordering::Release);
    }

    pub(crate) fn read(&self, key: &str, clock: &dyn Clock) -> Option<Value> {
        let hash = hash_key(key.as_bytes());
        self.bucket_for(hash).lookup(key, clock)
    }

    pub(crate) fn keys(&self, clock: &dyn Clock) -> Vec<String> {
        self.buckets.iter().flat_map(|b| b.keys(clock)).collect()
    }

    /// Spin/condvar-free drain wait: block until no write is in flight
    /// against this (now-retired-from-`head`) store.
    pub(crate) fn drain(&self) {
        while self.writes.load(Ordering::Acquire) != 0 {
            std::hint::spin_loop();
        }
    }

    pub(crate) fn bucket(&self, index: usize) -> &Bucket {
        &self.buckets[index]
    }

    pub(crate) fn add_migrated_nodes(&self, count: i64) {
        self.nodes.fetch_add(count, Ordering::AcqRel);
    }
}
