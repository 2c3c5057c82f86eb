// Wrapper identity registry: native pointer -> weakly held wrapper.
//
// Repeated lookups of the same native object return the same wrapper for as
// long as some owner keeps it alive. Entries are removed explicitly when a
// wrapper is destroyed so a dead object is never resurrected, and dead weak
// entries are dropped lazily by `purge`.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use menusys_ffi::NativeHandle;

use crate::error::{MenuError, MenuResult};

struct Entry<T> {
    wrapper: Weak<T>,
    generation: u64,
}

pub struct IdentityRegistry<T> {
    entries: HashMap<NativeHandle, Entry<T>>,
    next_generation: u64,
}

impl<T> Default for IdentityRegistry<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_generation: 1,
        }
    }
}

impl<T> IdentityRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live wrapper for `handle`, if any.
    pub fn get(&self, handle: NativeHandle) -> Option<Rc<T>> {
        self.entries.get(&handle).and_then(|e| e.wrapper.upgrade())
    }

    /// Return the live wrapper for `handle`, or build one with `factory` and
    /// record it. The factory must not touch this registry.
    pub fn get_or_create(
        &mut self,
        handle: NativeHandle,
        factory: impl FnOnce(NativeHandle) -> MenuResult<Rc<T>>,
    ) -> MenuResult<Rc<T>> {
        if handle.is_null() {
            return Err(MenuError::InvalidHandle("cannot wrap a null native object"));
        }
        if let Some(existing) = self.get(handle) {
            return Ok(existing);
        }
        let wrapper = factory(handle)?;
        self.insert(handle, &wrapper);
        Ok(wrapper)
    }

    /// Record `wrapper` as the identity of `handle`, replacing any entry.
    pub fn insert(&mut self, handle: NativeHandle, wrapper: &Rc<T>) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.entries.insert(
            handle,
            Entry {
                wrapper: Rc::downgrade(wrapper),
                generation,
            },
        );
    }

    /// Remove the entry for `handle`. Returns whether one existed.
    pub fn remove(&mut self, handle: NativeHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    /// Remove the entry for `handle` only if it still refers to `wrapper`.
    ///
    /// A native object can be freed and its address reused for a new object
    /// with its own wrapper; late teardown of the old wrapper must not evict
    /// the new one.
    pub fn remove_wrapper(&mut self, handle: NativeHandle, wrapper: *const T) -> bool {
        let matches = self
            .entries
            .get(&handle)
            .is_some_and(|e| std::ptr::eq(e.wrapper.as_ptr(), wrapper));
        if matches {
            self.entries.remove(&handle);
        }
        matches
    }

    /// Stamp of the current entry for `handle`. A re-wrapped handle always
    /// carries a larger stamp than any earlier wrapper of it.
    pub fn generation(&self, handle: NativeHandle) -> Option<u64> {
        self.entries.get(&handle).map(|e| e.generation)
    }

    /// Drop entries whose wrapper has died. Returns how many were dropped.
    pub fn purge(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.wrapper.strong_count() > 0);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries, dead or alive.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live wrappers, in no particular order.
    pub fn live(&self) -> Vec<Rc<T>> {
        self.entries.values().filter_map(|e| e.wrapper.upgrade()).collect()
    }
}
