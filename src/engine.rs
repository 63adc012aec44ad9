use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::Mutex;
use slog::{Drain, Logger};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::Error;
use crate::node::Value;
use crate::store::Store;

/// The two-generation holder and growth protocol.
///
/// `Engine` is the crate's main entry point: a caller writes/reads/
/// deletes keys through it, and it transparently grows its internal
/// table online, without ever blocking a reader or writer on the
/// migration.
///
/// Cloning an `Engine` is cheap — it shares one inner `Arc` — so the
/// usual way to hand it to multiple threads is to clone it, not to wrap
/// it in an `Arc` yourself.
#[derive(Clone)]
pub struct Engine(Arc<Inner>);

struct Inner {
    /// All writes go here. Never absent once constructed.
    head: ArcSwap<Store>,
    /// The generation being migrated away from. Absent outside growth.
    tail: ArcSwapOption<Store>,
    /// A one-shot, CAS-guarded latch: at most one growth is ever
    /// scheduled at a time, re-armed when the growth worker finishes.
    growing: AtomicBool,
    /// Serializes the body of the growth routine itself (there is only
    /// ever one growth worker, but this also protects against any
    /// accidental re-entrancy).
    migration_mu: Mutex<()>,
    config: EngineConfig,
    clock: Box<dyn Clock>,
    log: Logger,
}

impl Engine {
    /// A new engine: default configuration, the system clock, a
    /// terminal logger.
    pub fn new() -> Self {
        Self::with_parts(EngineConfig::default(), Box::new(SystemClock), default_logger())
    }

    /// A new engine with caller-supplied configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_parts(config, Box::new(SystemClock), default_logger())
    }

    /// A new engine with a caller-supplied logger. Tests typically pass
    /// `slog::Logger::root(slog::Discard, slog::o!())` to stay quiet.
    pub fn with_logger(log: Logger) -> Self {
        Self::with_parts(EngineConfig::default(), Box::new(SystemClock), log)
    }

    /// The full constructor. Exposed so tests can inject a deterministic
    /// [`Clock`] and exercise TTL behavior without sleeping in real time.
    pub fn with_parts(config: EngineConfig, clock: Box<dyn Clock>, log: Logger) -> Self {
        config.assert_valid();
        let head = Store::new(config.initial_buckets, config.grow_factor);
        Engine(Arc::new(Inner {
            head: ArcSwap::from_pointee(head),
            tail: ArcSwapOption::empty(),
            growing: AtomicBool::new(false),
            migration_mu: Mutex::new(()),
            config,
            clock,
            log,
        }))
    }

    fn reject_empty(key: &str) -> crate::Result<()> {
        if key.is_empty() {
            Err(Error::EmptyKey)
        } else {
            Ok(())
        }
    }

    /// Write an opaque byte-string.
    pub fn write_bytes(&self, key: &str, bytes: Vec<u8>, ttl: Option<i64>) -> crate::Result<()> {
        self.write(key, Value::Bytes(bytes), ttl)
    }

    /// Write an ordered list of strings.
    pub fn write_list(&self, key: &str, list: Vec<String>, ttl: Option<i64>) -> crate::Result<()> {
        self.write(key, Value::List(list), ttl)
    }

    /// Write a string-to-string dictionary.
    pub fn write_dict(&self, key: &str, dict: HashMap<String, String>, ttl: Option<i64>) -> crate::Result<()> {
        self.write(key, Value::Dict(dict), ttl)
    }

    fn write(&self, key: &str, value: Value, ttl: Option<i64>) -> crate::Result<()> {
        Self::reject_empty(key)?;
        let should_grow = self.0.head.load().write(key, value, ttl, self.0.clock.as_ref());
        if should_grow {
            self.maybe_trigger_growth();
        }
        Ok(())
    }

    /// Tombstone `key`. A no-op, not an error, if `key` is already
    /// absent.
    pub fn delete(&self, key: &str) -> crate::Result<()> {
        Self::reject_empty(key)?;
        self.0.head.load().delete(key);
        Ok(())
    }

    /// All keys currently alive on the head generation.
    ///
    /// During an in-flight growth, a key that hasn't yet migrated is
    /// still reachable via [`Engine::read_bytes`] et al. through the
    /// tail, but it will not appear here — an intentional weakening,
    /// not a bug (see the crate's growth-protocol documentation).
    pub fn keys(&self) -> Vec<String> {
        self.0.head.load().keys(self.0.clock.as_ref())
    }

    fn read_value(&self, key: &str) -> crate::Result<Value> {
        if let Some(value) = self.0.head.load().read(key, self.0.clock.as_ref()) {
            return Ok(value);
        }
        if let Some(tail) = self.0.tail.load_full() {
            if let Some(value) = tail.read(key, self.0.clock.as_ref()) {
                return Ok(value);
            }
        }
        Err(Error::NotFound)
    }

    /// Read a key stored as an opaque byte-string.
    pub fn read_bytes(&self, key: &str) -> crate::Result<Vec<u8>> {
        match self.read_value(key)? {
            Value::Bytes(b) => Ok(b),
            _ => Err(Error::InvalidType),
        }
    }

    /// Read a key stored as a list.
    pub fn read_list(&self, key: &str) -> crate::Result<Vec<String>> {
        match self.read_value(key)? {
            Value::List(l) => Ok(l),
            _ => Err(Error::InvalidType),
        }
    }

    /// Read element `index` of a key stored as a list. A negative index
    /// is rejected as `InvalidIndex`, the same as an out-of-range one.
    pub fn read_list_index(&self, key: &str, index: i64) -> crate::Result<Vec<u8>> {
        let list = self.read_list(key)?;
        if index < 0 {
            return Err(Error::InvalidIndex);
        }
        list.get(index as usize)
            .map(|s| s.clone().into_bytes())
            .ok_or(Error::InvalidIndex)
    }

    /// Read a key stored as a dict.
    pub fn read_dict(&self, key: &str) -> crate::Result<HashMap<String, String>> {
        match self.read_value(key)? {
            Value::Dict(d) => Ok(d),
            _ => Err(Error::InvalidType),
        }
    }

    /// Read field `field` of a key stored as a dict.
    pub fn read_dict_index(&self, key: &str, field: &str) -> crate::Result<Vec<u8>> {
        let dict = self.read_dict(key)?;
        dict.get(field).map(|v| v.clone().into_bytes()).ok_or(Error::InvalidIndex)
    }

    /// Whether `key` names a live node of any shape.
    pub fn exists(&self, key: &str) -> bool {
        self.read_value(key).is_ok()
    }

    /// The bucket count of the current head generation. Exposed mainly
    /// for tests asserting growth actually doubled the table.
    pub fn bucket_count(&self) -> usize {
        self.0.head.load().bucket_count()
    }

    /// Block until no growth is in flight. Growth runs on a background
    /// thread; tests that want to assert post-growth invariants call
    /// this first instead of racing the worker.
    pub fn wait_for_growth_to_settle(&self) {
        while self.0.growing.load(Ordering::Acquire) {
            std::hint::spin_loop();
        }
    }

    fn maybe_trigger_growth(&self) {
        if self
            .0
            .growing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let inner = Arc::clone(&self.0);
            let spawned = thread::Builder::new()
                .name("shardkv-grow".to_string())
                .spawn(move || grow(&inner));
            if let Err(err) = spawned {
                slog::error!(self.0.log, "failed to spawn growth worker"; "error" => %err);
                self.0.growing.store(false, Ordering::Release);
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

/// The growth protocol: publish a larger head generation, drain the
/// retiring generation's in-flight writes, migrate its nodes bucket by
/// bucket, then retire it.
///
/// Runs on its own thread (mirroring the original implementation's
/// `go db.grow()`), serialized against any other invocation by
/// `migration_mu` — though the one-shot latch in practice means only
/// one ever runs at a time.
fn grow(inner: &Inner) {
    let _guard = inner.migration_mu.lock();

    let old = inner.head.load_full();
    let new_bucket_count = old.bucket_count() * inner.config.growth_mult;
    let new_store = Arc::new(Store::new(new_bucket_count, inner.config.grow_factor));

    slog::info!(inner.log, "growth started";
        "old_buckets" => old.bucket_count(), "new_buckets" => new_store.bucket_count());

    // `ArcSwap::store` is release-ordered: any reader that observes the
    // new head also observes this tail.
    inner.tail.store(Some(Arc::clone(&old)));
    inner.head.store(Arc::clone(&new_store));

    old.drain();
    slog::debug!(inner.log, "drain complete");

    for index in 0..new_store.bucket_count() {
        let src_index = (index as u32 & old.mask()) as usize;
        let moved = new_store.bucket(index).migrate_from(
            old.bucket(src_index),
            new_store.mask(),
            index as u32,
            inner.clock.as_ref(),
        );
        if moved > 0 {
            new_store.add_migrated_nodes(moved as i64);
        }
    }

    inner.tail.store(None);
    inner.growing.store(false, Ordering::Release);

    slog::info!(inner.log, "growth complete");
}

fn default_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, slog::o!("component" => "shardkv"))
}
