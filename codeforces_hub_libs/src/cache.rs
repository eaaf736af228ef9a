use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::{
    sync::OnceCell,
    time::{Duration, Instant},
};

struct Slot<V> {
    created_at: Instant,
    value: OnceCell<(V, Instant)>,
}

impl<V> Slot<V> {
    fn new(now: Instant) -> Self {
        Self {
            created_at: now,
            value: OnceCell::new(),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.value.get(), Some((_, expires_at)) if *expires_at <= now)
    }
}

// An empty slot still referenced outside the map has a load in flight.
fn is_evictable<V>(slot: &Arc<Slot<V>>) -> bool {
    slot.value.initialized() || Arc::strong_count(slot) == 1
}

/// Bounded read-through cache whose entries expire `ttl` after they were loaded.
///
/// Concurrent misses on the same key share a single load: the first caller runs the
/// loader while the others wait for its outcome. Failed loads are not cached, so the
/// next caller tries again.
pub struct TtlCache<K, V> {
    ttl: Duration,
    capacity: usize,
    slots: Mutex<HashMap<K, Arc<Slot<V>>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.get_or_try_insert_with_if(key, load, |_| true).await
    }

    /// Like [`TtlCache::get_or_try_insert_with`], but drops the loaded entry when `keep`
    /// rejects it. Callers waiting on the same load still receive the value.
    ///
    /// Only the entry this call observed is dropped; a newer load of the same key is left alone.
    pub async fn get_or_try_insert_with_if<F, Fut, E, P>(
        &self,
        key: K,
        load: F,
        keep: P,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        P: FnOnce(&V) -> bool,
    {
        let slot = self.slot(key.clone());
        let ttl = self.ttl;
        let (value, _) = slot
            .value
            .get_or_try_init(|| async move {
                let value = load().await?;
                Ok((value, Instant::now() + ttl))
            })
            .await?;

        if !keep(value) {
            self.remove_slot(&key, &slot);
        }

        Ok(value.clone())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        slots
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .and_then(|slot| slot.value.get())
            .map(|(value, _)| value.clone())
    }

    fn remove_slot(&self, key: &K, slot: &Arc<Slot<V>>) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(key)
            .map_or(false, |current| Arc::ptr_eq(current, slot))
        {
            slots.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: K) -> Arc<Slot<V>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        if let Some(slot) = slots.get(&key) {
            if !slot.is_expired(now) {
                return Arc::clone(slot);
            }
        }

        if !slots.contains_key(&key) && slots.len() >= self.capacity {
            Self::evict(&mut slots, now);
        }

        let slot = Arc::new(Slot::new(now));
        slots.insert(key, Arc::clone(&slot));
        slot
    }

    /// Drops expired entries, or the oldest one when nothing has expired yet.
    ///
    /// Slots with a load in flight are never picked, so the cache may briefly hold more
    /// than `capacity` entries.
    fn evict(slots: &mut HashMap<K, Arc<Slot<V>>>, now: Instant) {
        let before = slots.len();
        slots.retain(|_, slot| !slot.is_expired(now));
        if slots.len() < before {
            return;
        }

        let oldest = slots
            .iter()
            .filter(|(_, slot)| is_evictable(slot))
            .min_by_key(|(_, slot)| slot.created_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            slots.remove(&key);
        }
    }
}
