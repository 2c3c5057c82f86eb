// C-linkage exports of the native menu module. Resolved by name at load time;
// each one may be individually absent.

use std::ffi::{c_char, c_void};

use crate::callbacks::ItemSelectCallback;
use crate::flags::{ItemControlFlags, ItemStyleFlags};
use crate::handles::{NativeHandle, PlayerSlot};

/// Zero-argument root getter; returns the `IMenuSystem` instance.
pub type MenuSystemFn = unsafe extern "C" fn() -> NativeHandle;

pub type MenuAddItemFn = unsafe extern "C" fn(
    menu: NativeHandle,
    style: ItemStyleFlags,
    content: *const c_char,
    handler: Option<ItemSelectCallback>,
    data: *mut c_void,
) -> i32;

pub type MenuRemoveItemFn = unsafe extern "C" fn(menu: NativeHandle, item: i32);

pub type MenuGetTitleFn = unsafe extern "C" fn(menu: NativeHandle) -> *const c_char;

pub type MenuSetTitleFn = unsafe extern "C" fn(menu: NativeHandle, title: *const c_char);

pub type MenuGetItemStylesFn = unsafe extern "C" fn(menu: NativeHandle, item: i32) -> ItemStyleFlags;

pub type MenuGetItemContentFn = unsafe extern "C" fn(menu: NativeHandle, item: i32) -> *const c_char;

pub type MenuGetItemControlsFn = unsafe extern "C" fn(menu: NativeHandle) -> ItemControlFlags;

pub type MenuSetItemControlsFn = unsafe extern "C" fn(menu: NativeHandle, controls: ItemControlFlags);

pub type MenuGetCurrentPositionFn = unsafe extern "C" fn(menu: NativeHandle, slot: PlayerSlot) -> i32;

pub type MenuGetPlayerActiveMenuFn =
    unsafe extern "C" fn(system: NativeHandle, slot: PlayerSlot) -> NativeHandle;

// ---------------------------------------------------------------------------
// Symbol names
// ---------------------------------------------------------------------------

pub const SYM_MENU_SYSTEM: &str = "MenuSystem";
pub const SYM_MENU_ADD_ITEM: &str = "Menu_AddItem";
pub const SYM_MENU_REMOVE_ITEM: &str = "Menu_RemoveItem";
pub const SYM_MENU_GET_TITLE: &str = "Menu_GetTitle";
pub const SYM_MENU_SET_TITLE: &str = "Menu_SetTitle";
pub const SYM_MENU_GET_ITEM_STYLES: &str = "Menu_GetItemStyles";
pub const SYM_MENU_GET_ITEM_CONTENT: &str = "Menu_GetItemContent";
pub const SYM_MENU_GET_ITEM_CONTROLS: &str = "Menu_GetItemControls";
pub const SYM_MENU_SET_ITEM_CONTROLS: &str = "Menu_SetItemControls";
pub const SYM_MENU_GET_CURRENT_POSITION: &str = "Menu_GetCurrentPosition";
pub const SYM_MENU_GET_PLAYER_ACTIVE_MENU: &str = "Menu_GetPlayerActiveMenu";

/// Every export the bridge tries to resolve, in resolution order.
pub const EXPORT_SYMBOLS: [&str; 11] = [
    SYM_MENU_SYSTEM,
    SYM_MENU_ADD_ITEM,
    SYM_MENU_REMOVE_ITEM,
    SYM_MENU_GET_TITLE,
    SYM_MENU_SET_TITLE,
    SYM_MENU_GET_ITEM_STYLES,
    SYM_MENU_GET_ITEM_CONTENT,
    SYM_MENU_GET_ITEM_CONTROLS,
    SYM_MENU_SET_ITEM_CONTROLS,
    SYM_MENU_GET_CURRENT_POSITION,
    SYM_MENU_GET_PLAYER_ACTIVE_MENU,
];

/// Default interface version string the plugin host publishes the menu system under.
pub const MENU_SYSTEM_INTERFACE_VERSION: &str = "Menu System v1.0.0";
