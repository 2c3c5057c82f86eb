// Callback bridge: maps opaque tokens to host closures for native callbacks.
//
// The native module stores a token as the pointer-sized user-data of each
// callback-bearing menu item and hands it back verbatim on selection. A token
// stays resolvable across any number of invocations and is reclaimed only by
// an explicit release, never after a single call.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::num::NonZeroU64;

/// Opaque, non-zero key into a [`CallbackBridge`].
///
/// Layout: high 32 bits are the owning bridge's id, low 32 bits a per-bridge
/// sequence number. Sequence numbers are never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackToken(NonZeroU64);

impl CallbackToken {
    pub fn new(bridge_id: u32, sequence: u32) -> Option<Self> {
        NonZeroU64::new(((bridge_id as u64) << 32) | sequence as u64).map(Self)
    }

    #[inline]
    pub fn bridge_id(self) -> u32 {
        (self.0.get() >> 32) as u32
    }

    #[inline]
    pub fn sequence(self) -> u32 {
        self.0.get() as u32
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0.get()
    }

    /// The token as the user-data pointer handed to the native module.
    #[inline]
    pub fn as_user_data(self) -> *mut c_void {
        self.0.get() as usize as *mut c_void
    }

    /// Recover a token from native user-data. Null yields `None`.
    #[inline]
    pub fn from_user_data(data: *mut c_void) -> Option<Self> {
        NonZeroU64::new(data as usize as u64).map(Self)
    }
}

impl fmt::Debug for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallbackToken({}:{})", self.bridge_id(), self.sequence())
    }
}

type Callback<O, A> = Box<dyn FnMut(&O, &A)>;

struct Entry<O, A> {
    owner: O,
    // None while the callback is executing (take-execute-replace).
    callback: Option<Callback<O, A>>,
}

/// Token table pinning `(callback, owner)` pairs.
pub struct CallbackBridge<O, A> {
    id: u32,
    next_sequence: Cell<u32>,
    entries: RefCell<HashMap<CallbackToken, Entry<O, A>>>,
}

impl<O, A> CallbackBridge<O, A> {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            next_sequence: Cell::new(1),
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Pin `callback` together with `owner`. Returns `None` only when the
    /// sequence space of this bridge is exhausted.
    pub fn register(
        &self,
        owner: O,
        callback: impl FnMut(&O, &A) + 'static,
    ) -> Option<CallbackToken> {
        let sequence = self.next_sequence.get();
        let next = sequence.checked_add(1)?;
        let token = CallbackToken::new(self.id, sequence)?;
        self.next_sequence.set(next);
        self.entries.borrow_mut().insert(
            token,
            Entry {
                owner,
                callback: Some(Box::new(callback)),
            },
        );
        Some(token)
    }

    pub fn is_registered(&self, token: CallbackToken) -> bool {
        self.entries.borrow().contains_key(&token)
    }

    /// The owner pinned by `token`.
    pub fn owner(&self, token: CallbackToken) -> Option<O>
    where
        O: Clone,
    {
        self.entries.borrow().get(&token).map(|e| e.owner.clone())
    }

    /// Invoke the callback behind `token`. Returns `false` for an unknown or
    /// released token.
    ///
    /// The callback runs with the table unborrowed, so it may register,
    /// release or invoke other tokens. If its own token is released while it
    /// runs, it is dropped instead of being put back. A re-entrant invocation
    /// of a token whose callback is already running is a no-op.
    pub fn invoke(&self, token: CallbackToken, args: &A) -> bool
    where
        O: Clone,
    {
        // 1. Briefly borrow, take the callback out.
        let (owner, callback) = {
            let mut entries = self.entries.borrow_mut();
            match entries.get_mut(&token) {
                Some(entry) => (entry.owner.clone(), entry.callback.take()),
                None => return false,
            }
        };

        // 2. Execute unborrowed. The guard puts the callback back on return
        //    and on unwind.
        let mut guard = PutBack {
            bridge: self,
            token,
            callback,
        };
        if let Some(f) = guard.callback.as_mut() {
            f(&owner, args);
        }
        true
    }

    /// Release `token`. Returns whether it was registered; releasing twice is
    /// harmless.
    pub fn release(&self, token: CallbackToken) -> bool {
        let removed = self.entries.borrow_mut().remove(&token);
        // `removed` (and the owner it holds) drops after the borrow ends.
        removed.is_some()
    }

    /// Release every token in `tokens`. Returns how many were registered.
    pub fn release_all(&self, tokens: impl IntoIterator<Item = CallbackToken>) -> usize {
        tokens.into_iter().filter(|t| self.release(*t)).count()
    }

    /// Release everything. Returns how many tokens were registered.
    pub fn clear(&self) -> usize {
        let drained = std::mem::take(&mut *self.entries.borrow_mut());
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl<O, A> fmt::Debug for CallbackBridge<O, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackBridge")
            .field("id", &self.id)
            .field("registered", &self.len())
            .finish()
    }
}

struct PutBack<'a, O, A> {
    bridge: &'a CallbackBridge<O, A>,
    token: CallbackToken,
    callback: Option<Callback<O, A>>,
}

impl<O, A> Drop for PutBack<'_, O, A> {
    fn drop(&mut self) {
        let Some(callback) = self.callback.take() else {
            return;
        };
        // Put back only if the entry still exists and is empty. A released
        // entry means the callback is dropped here, after the borrow ends.
        let Ok(mut entries) = self.bridge.entries.try_borrow_mut() else {
            return;
        };
        if let Some(entry) = entries.get_mut(&self.token) {
            if entry.callback.is_none() {
                entry.callback = Some(callback);
                return;
            }
        }
        drop(entries);
        drop(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::rc::Rc;

    type Bridge = CallbackBridge<&'static str, i32>;

    fn recorder() -> (Rc<RefCell<Vec<(&'static str, i32)>>>, impl FnMut(&&'static str, &i32)) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        (log, move |owner: &&'static str, item: &i32| sink.borrow_mut().push((*owner, *item)))
    }

    #[test]
    fn token_round_trips_through_user_data() {
        let token = CallbackToken::new(7, 42).unwrap();
        assert_eq!(token.bridge_id(), 7);
        assert_eq!(token.sequence(), 42);
        assert_eq!(CallbackToken::from_user_data(token.as_user_data()), Some(token));
        assert_eq!(CallbackToken::from_user_data(std::ptr::null_mut()), None);
        assert_eq!(CallbackToken::new(0, 0), None);
    }

    #[test]
    fn token_resolves_for_every_invocation_until_released() {
        let bridge = Bridge::new(1);
        let (log, callback) = recorder();
        let token = bridge.register("menu-a", callback).unwrap();

        for item in 0..5 {
            assert!(bridge.invoke(token, &item));
            assert_eq!(bridge.owner(token), Some("menu-a"));
        }
        assert_eq!(log.borrow().len(), 5);
        assert!(log.borrow().iter().all(|(owner, _)| *owner == "menu-a"));

        assert!(bridge.release(token));
        assert!(!bridge.invoke(token, &9));
        assert_eq!(bridge.owner(token), None);
        assert_eq!(log.borrow().len(), 5);
    }

    #[test]
    fn release_is_idempotent() {
        let bridge = Bridge::new(1);
        let token = bridge.register("menu", |_, _| {}).unwrap();
        assert!(bridge.release(token));
        assert!(!bridge.release(token));
        assert!(bridge.is_empty());
    }

    #[test]
    fn release_all_touches_only_listed_tokens() {
        let bridge = Bridge::new(3);
        let a1 = bridge.register("a", |_, _| {}).unwrap();
        let a2 = bridge.register("a", |_, _| {}).unwrap();
        let b = bridge.register("b", |_, _| {}).unwrap();

        assert_eq!(bridge.release_all([a1, a2, a1]), 2);
        assert!(bridge.is_registered(b));
        assert_eq!(bridge.len(), 1);
    }

    #[test]
    fn callback_may_release_its_own_token() {
        let bridge = Rc::new(Bridge::new(1));
        let slot: Rc<Cell<Option<CallbackToken>>> = Rc::new(Cell::new(None));
        let calls = Rc::new(Cell::new(0));
        let token = {
            let bridge_ref = Rc::downgrade(&bridge);
            let slot = slot.clone();
            let calls = calls.clone();
            bridge
                .register("menu", move |_, _| {
                    calls.set(calls.get() + 1);
                    if let (Some(b), Some(t)) = (bridge_ref.upgrade(), slot.get()) {
                        b.release(t);
                    }
                })
                .unwrap()
        };
        slot.set(Some(token));

        assert!(bridge.invoke(token, &0));
        assert!(!bridge.is_registered(token));
        assert!(!bridge.invoke(token, &0));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn callback_may_register_more_tokens() {
        let bridge = Rc::new(Bridge::new(1));
        let weak = Rc::downgrade(&bridge);
        let token = bridge
            .register("menu", move |_, _| {
                if let Some(b) = weak.upgrade() {
                    b.register("nested", |_, _| {});
                }
            })
            .unwrap();
        assert!(bridge.invoke(token, &0));
        assert!(bridge.invoke(token, &0));
        assert_eq!(bridge.len(), 3);
    }

    #[test]
    fn reentrant_invocation_of_running_token_is_a_no_op() {
        let bridge = Rc::new(Bridge::new(1));
        let depth = Rc::new(Cell::new(0));
        let token_slot: Rc<Cell<Option<CallbackToken>>> = Rc::new(Cell::new(None));
        let token = {
            let weak = Rc::downgrade(&bridge);
            let depth = depth.clone();
            let token_slot = token_slot.clone();
            bridge
                .register("menu", move |_, _| {
                    depth.set(depth.get() + 1);
                    if let (Some(b), Some(t)) = (weak.upgrade(), token_slot.get()) {
                        b.invoke(t, &1);
                    }
                })
                .unwrap()
        };
        token_slot.set(Some(token));
        assert!(bridge.invoke(token, &0));
        assert_eq!(depth.get(), 1);
        // The callback was put back and still works.
        assert!(bridge.invoke(token, &0));
        assert_eq!(depth.get(), 2);
    }

    #[test]
    fn callback_survives_a_panic() {
        let bridge = Bridge::new(1);
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let token = bridge
            .register("menu", move |_, item| {
                counter.set(counter.get() + 1);
                if *item < 0 {
                    panic!("negative item");
                }
            })
            .unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            bridge.invoke(token, &-1);
        }));
        assert!(result.is_err());
        assert!(bridge.invoke(token, &1));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn clear_releases_everything() {
        let bridge = Bridge::new(2);
        let t = bridge.register("a", |_, _| {}).unwrap();
        bridge.register("b", |_, _| {}).unwrap();
        assert_eq!(bridge.clear(), 2);
        assert!(!bridge.invoke(t, &0));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register(u8),
        Release(usize),
        Invoke(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u8>().prop_map(Op::Register),
            any::<usize>().prop_map(Op::Release),
            any::<usize>().prop_map(Op::Invoke),
        ]
    }

    proptest! {
        #[test]
        fn token_table_matches_model(ops in proptest::collection::vec(op(), 1..64)) {
            let bridge = CallbackBridge::<u8, ()>::new(9);
            let hits = Rc::new(RefCell::new(Vec::<(CallbackToken, u8)>::new()));
            let mut issued: Vec<(CallbackToken, u8)> = Vec::new();
            let mut live: HashSet<CallbackToken> = HashSet::new();

            for op in ops {
                match op {
                    Op::Register(owner) => {
                        let sink = hits.clone();
                        let slot: Rc<Cell<Option<CallbackToken>>> = Rc::new(Cell::new(None));
                        let own = slot.clone();
                        let token = bridge
                            .register(owner, move |o, _| {
                                if let Some(t) = own.get() {
                                    sink.borrow_mut().push((t, *o));
                                }
                            })
                            .unwrap();
                        slot.set(Some(token));
                        prop_assert_eq!(token.bridge_id(), 9);
                        prop_assert!(issued.iter().all(|(t, _)| *t != token), "token reused");
                        issued.push((token, owner));
                        live.insert(token);
                    }
                    Op::Release(i) if !issued.is_empty() => {
                        let (token, _) = issued[i % issued.len()];
                        prop_assert_eq!(bridge.release(token), live.remove(&token));
                    }
                    Op::Invoke(i) if !issued.is_empty() => {
                        let (token, owner) = issued[i % issued.len()];
                        let before = hits.borrow().len();
                        let resolved = bridge.invoke(token, &());
                        prop_assert_eq!(resolved, live.contains(&token));
                        if resolved {
                            prop_assert_eq!(hits.borrow().last().copied(), Some((token, owner)));
                        } else {
                            prop_assert_eq!(hits.borrow().len(), before);
                        }
                    }
                    _ => {}
                }
                prop_assert_eq!(bridge.len(), live.len());
            }
        }
    }
}
