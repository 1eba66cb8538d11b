//! Identifier -> bound value map shared by every thread.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;

pub(crate) type BoundValue = Arc<dyn Any + Send + Sync>;

/// Lookups happen on every dynamic read, so `load` takes the shared lock and
/// concurrent loads never block each other. `store`/`delete` run once per
/// scope and take the exclusive lock. A poisoned lock means a panic inside
/// one of these short critical sections, which leaves the map in an unknown
/// state; failing loudly beats handing out a stale binding.
pub(crate) struct BindingStore {
    map: RwLock<HashMap<u64, BoundValue>>,
}

impl BindingStore {
    fn new() -> Self {
        BindingStore {
            map: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn store(&self, id: u64, value: BoundValue) {
        self.map
            .write()
            .expect("binding store poisoned")
            .insert(id, value);
    }

    pub(crate) fn load(&self, id: u64) -> Option<BoundValue> {
        self.map
            .read()
            .expect("binding store poisoned")
            .get(&id)
            .cloned()
    }

    pub(crate) fn delete(&self, id: u64) {
        self.map
            .write()
            .expect("binding store poisoned")
            .remove(&id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map.read().expect("binding store poisoned").len()
    }
}

pub(crate) fn global() -> &'static BindingStore {
    static STORE: OnceCell<BindingStore> = OnceCell::new();
    STORE.get_or_init(BindingStore::new)
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use super::*;

    #[test]
    fn store_load_delete() {
        let store = BindingStore::new();
        assert!(store.load(7).is_none());

        store.store(7, Arc::new("seven"));
        let got = store.load(7).expect("stored entry");
        assert_eq!(*got.downcast::<&str>().unwrap(), "seven");

        store.delete(7);
        assert!(store.load(7).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn overwrite_replaces_value() {
        let store = BindingStore::new();
        store.store(1, Arc::new(10u32));
        store.store(1, Arc::new(20u32));
        let got = store.load(1).expect("entry");
        assert_eq!(*got.downcast::<u32>().unwrap(), 20);
    }

    #[test]
    fn delete_missing_key_is_a_no_op() {
        let store = BindingStore::new();
        store.store(1, Arc::new(1u64));
        store.delete(99);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_disjoint_keys_do_not_interfere() {
        let store = Arc::new(BindingStore::new());
        let threads = 16;
        let rounds = 200u64;
        let barrier = Arc::new(Barrier::new(threads));

        std::thread::scope(|s| {
            for t in 0..threads as u64 {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                s.spawn(move || {
                    barrier.wait();
                    for i in 0..rounds {
                        let key = t * rounds + i;
                        store.store(key, Arc::new(key));
                        let got = store.load(key).expect("own entry");
                        assert_eq!(*got.downcast::<u64>().unwrap(), key);
                        store.delete(key);
                        assert!(store.load(key).is_none());
                    }
                });
            }
        });

        assert_eq!(store.len(), 0);
    }

    #[test]
    fn concurrent_loads_observe_a_stable_entry() {
        let store = Arc::new(BindingStore::new());
        store.store(42, Arc::new(1234u64));
        let barrier = Arc::new(Barrier::new(8));

        std::thread::scope(|s| {
            for _ in 0..8 {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                s.spawn(move || {
                    barrier.wait();
                    for _ in 0..10_000 {
                        let got = store.load(42).expect("entry stays put");
                        assert_eq!(*got.downcast::<u64>().unwrap(), 1234);
                    }
                });
            }
        });
    }
}
