// Native -> Rust entry point for item selection.
//
// The native module calls one static trampoline for every callback-bearing
// item. The token in the user-data word names the context (high half) and the
// registration (low half); contexts are found through a thread-local table,
// so a callback that arrives on another thread or after unload does nothing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::rc::{Rc, Weak};

use menusys_ffi::{ItemSelectCallback, NativeHandle, PlayerSlot};
use tracing::trace;

use crate::callback_bridge::CallbackToken;
use crate::context::ContextShared;
use crate::ffi_guard::ffi_boundary;

thread_local! {
    static CONTEXTS: RefCell<HashMap<u32, Weak<ContextShared>>> = RefCell::new(HashMap::new());
}

pub(crate) fn register_context(id: u32, context: Weak<ContextShared>) {
    CONTEXTS.with_borrow_mut(|contexts| {
        contexts.insert(id, context);
    });
}

pub(crate) fn unregister_context(id: u32) {
    // The table may already be gone during thread teardown.
    let _ = CONTEXTS.try_with(|contexts| {
        contexts.borrow_mut().remove(&id);
    });
}

fn find_context(id: u32) -> Option<Rc<ContextShared>> {
    CONTEXTS
        .try_with(|contexts| contexts.borrow().get(&id).and_then(Weak::upgrade))
        .ok()
        .flatten()
}

/// The function pointer handed to `Menu_AddItem` for callback-bearing items.
pub fn item_selected_trampoline() -> ItemSelectCallback {
    on_item_selected
}

extern "C" fn on_item_selected(
    menu: NativeHandle,
    slot: PlayerSlot,
    item: i32,
    item_on_page: u8,
    user_data: *mut c_void,
) {
    ffi_boundary((), || {
        let Some(token) = CallbackToken::from_user_data(user_data) else {
            trace!(%menu, "item selected without a callback token");
            return;
        };
        let Some(context) = find_context(token.bridge_id()) else {
            trace!(?token, "item selected for an unloaded menu context");
            return;
        };
        context.dispatch_selection(menu, token, slot, item, item_on_page);
    })
}
