use std::ffi::c_void;

use crate::handles::{NativeHandle, PlayerSlot};

/// Item-selection handler the native module calls when a player picks an item.
///
/// `user_data` is the value passed as the last argument of `Menu_AddItem`,
/// handed back verbatim on every selection of that item.
pub type ItemSelectCallback = unsafe extern "C" fn(
    menu: NativeHandle,
    slot: PlayerSlot,
    item: i32,
    item_on_page: u8,
    user_data: *mut c_void,
);
