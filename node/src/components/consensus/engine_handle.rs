//! A shared, swappable reference to the running consensus engine.
//!
//! Callers take an `EngineHandle` as an explicit dependency instead of reaching for a global. The
//! handle is cheap to clone; all clones share the same slot.

use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

use arc_swap::ArcSwapOption;
use tracing::debug;

/// A slot holding the current engine, if any.
///
/// Reads never block. Writers replace the whole engine atomically, so readers see either the old
/// engine or the new one, never a partially constructed one.
pub struct EngineHandle<E> {
    slot: Arc<ArcSwapOption<E>>,
}

impl<E> EngineHandle<E> {
    /// Creates an empty handle.
    pub fn new() -> Self {
        EngineHandle {
            slot: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// Creates a handle holding `engine`.
    pub fn with(engine: Arc<E>) -> Self {
        EngineHandle {
            slot: Arc::new(ArcSwapOption::new(Some(engine))),
        }
    }

    /// Returns the current engine, if any.
    pub fn get(&self) -> Option<Arc<E>> {
        self.slot.load_full()
    }

    /// Returns whether an engine is set.
    pub fn is_set(&self) -> bool {
        self.slot.load().is_some()
    }

    /// Replaces the engine, returning the previous one. The last writer wins.
    pub fn set(&self, engine: Arc<E>) -> Option<Arc<E>> {
        self.slot.swap(Some(engine))
    }

    /// Removes the engine, returning it.
    pub fn clear(&self) -> Option<Arc<E>> {
        self.slot.swap(None)
    }

    /// Calls `f` with the current engine, or returns `fallback` if there is none.
    pub fn with_engine<R, F>(&self, f: F, fallback: R) -> R
    where
        F: FnOnce(&E) -> R,
    {
        match &*self.slot.load() {
            Some(engine) => f(&**engine),
            None => {
                debug!("no consensus engine available; using fallback");
                fallback
            }
        }
    }
}

impl<E> Clone for EngineHandle<E> {
    fn clone(&self) -> Self {
        EngineHandle {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<E> Default for EngineHandle<E> {
    fn default() -> Self {
        EngineHandle::new()
    }
}

impl<E> Debug for EngineHandle<E> {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "EngineHandle {{ is_set: {} }}", self.is_set())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
    };

    use super::*;

    /// An engine whose two fields are always written together.
    #[derive(Debug)]
    struct Engine {
        id: u64,
        id_squared: u64,
    }

    impl Engine {
        fn new(id: u64) -> Arc<Self> {
            Arc::new(Engine {
                id,
                id_squared: id * id,
            })
        }
    }

    #[test]
    fn should_fall_back_when_empty() {
        let handle: EngineHandle<Engine> = EngineHandle::new();
        assert!(handle.get().is_none());
        assert_eq!(handle.with_engine(|engine| engine.id, 42), 42);
    }

    #[test]
    fn should_share_slot_between_clones() {
        let handle = EngineHandle::new();
        let clone = handle.clone();
        assert!(handle.set(Engine::new(1)).is_none());
        assert_eq!(clone.with_engine(|engine| engine.id, 0), 1);

        let previous = clone.set(Engine::new(2)).expect("engine was set");
        assert_eq!(previous.id, 1);
        assert_eq!(handle.get().map(|engine| engine.id), Some(2));

        assert_eq!(handle.clear().map(|engine| engine.id), Some(2));
        assert!(!clone.is_set());
        assert_eq!(clone.with_engine(|engine| engine.id, 0), 0);
    }

    #[test]
    fn readers_never_see_half_built_engines() {
        let handle = EngineHandle::with(Engine::new(0));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut observed = 0;
                    while !done.load(Ordering::SeqCst) {
                        let consistent = handle.with_engine(
                            |engine| engine.id * engine.id == engine.id_squared,
                            true,
                        );
                        assert!(consistent);
                        observed += 1;
                    }
                    observed
                })
            })
            .collect();

        for id in 1..1000 {
            if id % 10 == 0 {
                handle.clear();
            } else {
                handle.set(Engine::new(id));
            }
        }
        done.store(true, Ordering::SeqCst);
        for reader in readers {
            reader.join().expect("reader should not panic");
        }
        assert_eq!(handle.get().map(|engine| engine.id), Some(999));
    }
}
