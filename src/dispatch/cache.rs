use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use crossbeam::sync::ShardedLock;
use log::{debug, warn};

use super::ConcreteFunction;
use crate::{error::TraceError, signature::Signature};

/// Counters of a [`DispatchCache`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls served by an existing unit.
    pub hits: u64,
    /// Calls that had to compile.
    pub misses: u64,
    pub compilations: u64,
    pub failed_compilations: u64,
    pub evictions: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    compilations: AtomicU64,
    failed_compilations: AtomicU64,
    evictions: AtomicU64,
}

/// One signature's entry: empty until its unit is compiled.
#[derive(Default)]
struct CacheSlot {
    unit: ShardedLock<Option<Arc<ConcreteFunction>>>,
    compile_lock: Mutex<()>,
    last_used: AtomicU64,
}

impl CacheSlot {
    fn unit(&self) -> Option<Arc<ConcreteFunction>> {
        match self.unit.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store(&self, unit: Arc<ConcreteFunction>) {
        match self.unit.write() {
            Ok(mut guard) => *guard = Some(unit),
            Err(poisoned) => *poisoned.into_inner() = Some(unit),
        }
    }
}

/// Signature-keyed store of compiled units.
///
/// Hits only take the map's read lock. A miss compiles under its slot's own
/// lock, so concurrent first calls with one signature compile once while
/// other signatures proceed independently. Units are handed out as `Arc`s
/// and stay alive for callers running them even after eviction or `clear`.
pub struct DispatchCache {
    slots: ShardedLock<HashMap<Signature, Arc<CacheSlot>>>,
    capacity: Option<usize>,
    clock: AtomicU64,
    counters: Counters,
}

impl DispatchCache {
    /// `capacity` bounds the number of compiled units; `None` is unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        DispatchCache {
            slots: ShardedLock::new(HashMap::new()),
            capacity,
            clock: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn slot(&self, signature: &Signature) -> Option<Arc<CacheSlot>> {
        match self.slots.read() {
            Ok(slots) => slots.get(signature).cloned(),
            Err(poisoned) => poisoned.into_inner().get(signature).cloned(),
        }
    }

    fn slot_or_insert(&self, signature: &Signature) -> Arc<CacheSlot> {
        let mut slots = match self.slots.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots
            .entry(signature.clone())
            .or_insert_with(|| Arc::new(CacheSlot::default()))
            .clone()
    }

    /// Remove `slot` if it is still the uncompiled entry for `signature`.
    fn discard(&self, signature: &Signature, slot: &Arc<CacheSlot>) {
        let mut slots = match self.slots.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let stale = slots
            .get(signature)
            .map_or(false, |current| Arc::ptr_eq(current, slot) && current.unit().is_none());
        if stale {
            slots.remove(signature);
        }
    }

    /// Put a freshly compiled `slot` back in the map if a failed compile
    /// removed it while this one waited.
    fn install(&self, signature: &Signature, slot: &Arc<CacheSlot>) {
        let mut slots = match self.slots.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let present = slots
            .get(signature)
            .map_or(false, |current| Arc::ptr_eq(current, slot) || current.unit().is_some());
        if !present {
            slots.insert(signature.clone(), slot.clone());
        }
    }

    fn hit(&self, slot: &CacheSlot, unit: Arc<ConcreteFunction>) -> Arc<ConcreteFunction> {
        slot.last_used.store(self.tick(), Ordering::Relaxed);
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        unit
    }

    /// Compiled unit for `signature`.
    pub fn get(&self, signature: &Signature) -> Option<Arc<ConcreteFunction>> {
        self.slot(signature).and_then(|slot| slot.unit())
    }

    /// Return the unit for `signature`, running `compile` if there is none.
    /// A failed compile leaves the signature uncompiled.
    pub fn resolve<F>(&self, signature: &Signature, compile: F) -> Result<Arc<ConcreteFunction>, TraceError>
    where
        F: FnOnce() -> Result<ConcreteFunction, TraceError>,
    {
        if let Some(slot) = self.slot(signature) {
            if let Some(unit) = slot.unit() {
                return Ok(self.hit(&slot, unit));
            }
        }
        let slot = self.slot_or_insert(signature);
        let _compiling = slot
            .compile_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(unit) = slot.unit() {
            debug!("Signature {} was compiled while waiting", signature);
            return Ok(self.hit(&slot, unit));
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let unit = match compile() {
            Ok(unit) => Arc::new(unit),
            Err(error) => {
                self.counters
                    .failed_compilations
                    .fetch_add(1, Ordering::Relaxed);
                self.discard(signature, &slot);
                return Err(error);
            }
        };
        slot.store(unit.clone());
        slot.last_used.store(self.tick(), Ordering::Relaxed);
        self.install(signature, &slot);
        self.counters.compilations.fetch_add(1, Ordering::Relaxed);
        self.evict(signature);
        Ok(unit)
    }

    /// Drop least recently used units until the capacity holds, never the
    /// one just compiled for `keep`.
    fn evict(&self, keep: &Signature) {
        let capacity = match self.capacity {
            Some(capacity) => capacity,
            None => return,
        };
        let mut slots = match self.slots.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        loop {
            let compiled: Vec<(&Signature, u64)> = slots
                .iter()
                .filter(|(_, slot)| slot.unit().is_some())
                .map(|(signature, slot)| (signature, slot.last_used.load(Ordering::Relaxed)))
                .collect();
            if compiled.len() <= capacity {
                return;
            }
            let victim = compiled
                .into_iter()
                .filter(|(signature, _)| *signature != keep)
                .min_by_key(|(_, last_used)| *last_used)
                .map(|(signature, _)| signature.clone());
            match victim {
                Some(victim) => {
                    warn!("Evicting compiled unit for {}", victim);
                    slots.remove(&victim);
                    self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => return,
            }
        }
    }

    /// Number of compiled units.
    pub fn len(&self) -> usize {
        self.signatures().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn signatures(&self) -> Vec<Signature> {
        let slots = match self.slots.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots
            .iter()
            .filter(|(_, slot)| slot.unit().is_some())
            .map(|(signature, _)| signature.clone())
            .collect()
    }

    pub fn clear(&self) {
        let mut slots = match self.slots.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        debug!("Clearing {} cache slots", slots.len());
        slots.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            compilations: self.counters.compilations.load(Ordering::Relaxed),
            failed_compilations: self.counters.failed_compilations.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }
}
