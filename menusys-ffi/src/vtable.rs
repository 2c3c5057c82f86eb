// Virtual slot layout of the native objects.
//
// Every native object reached through virtual dispatch is laid out as
// "function-table pointer + data". Slot numbers and signatures below are the
// contract with the native module; there is no runtime type information to
// check them against, so a drift here is undefined behaviour, not an error.

use std::ffi::{c_char, c_void};

use crate::handles::{NativeHandle, PlayerSlot};

/// Build the fn-pointer type of a virtual member function.
///
/// The object pointer is passed as the implicit first argument. On the 64-bit
/// targets the native module ships for (see `contract_tests`), the member-call
/// convention is the C convention with `this` first.
#[macro_export]
macro_rules! virtual_fn {
    (fn($($arg:ty),* $(,)?) -> $ret:ty) => {
        unsafe extern "C" fn($crate::handles::NativeHandle, $($arg),*) -> $ret
    };
    (fn($($arg:ty),* $(,)?)) => {
        unsafe extern "C" fn($crate::handles::NativeHandle, $($arg),*)
    };
}

/// `IMenuProfileSystem` slots.
pub mod profile_system {
    use super::*;

    pub const GET_PROFILE: usize = 0;
    pub const ADD_OR_REPLACE_PROFILE: usize = 1;
    pub const GET_ENTITY_KEY_VALUES_ALLOCATOR: usize = 2;

    pub type GetProfileFn = crate::virtual_fn!(fn(*const c_char) -> NativeHandle);
    pub type AddOrReplaceProfileFn = crate::virtual_fn!(fn(*const c_char, *mut c_void));
    pub type GetEntityKeyValuesAllocatorFn = crate::virtual_fn!(fn() -> NativeHandle);
}

/// `IMenu` slots.
pub mod menu {
    use super::*;

    pub const GET_PROFILE: usize = 0;
    pub const APPLY_PROFILE: usize = 1;
    pub const GET_HANDLER: usize = 2;
    pub const GET_CURRENT_POSITION: usize = 9;

    pub type GetProfileFn = crate::virtual_fn!(fn() -> NativeHandle);
    pub type ApplyProfileFn = crate::virtual_fn!(fn(PlayerSlot, NativeHandle) -> bool);
    pub type GetHandlerFn = crate::virtual_fn!(fn() -> NativeHandle);
    pub type GetCurrentPositionFn = crate::virtual_fn!(fn(PlayerSlot) -> i32);
}

/// `IMenuSystem` slots. Slots 0..=9 belong to the game-system base interface
/// and are never called from Rust.
pub mod menu_system {
    use super::*;

    pub const GET_PLAYER: usize = 10;
    pub const GET_PROFILES: usize = 11;
    pub const CREATE_INSTANCE: usize = 12;
    pub const DISPLAY_INSTANCE_TO_PLAYER: usize = 13;
    pub const CLOSE_INSTANCE: usize = 14;

    pub type GetPlayerFn = crate::virtual_fn!(fn(PlayerSlot) -> NativeHandle);
    pub type GetProfilesFn = crate::virtual_fn!(fn() -> NativeHandle);
    pub type CreateInstanceFn = crate::virtual_fn!(fn(NativeHandle, NativeHandle) -> NativeHandle);
    pub type DisplayInstanceToPlayerFn =
        crate::virtual_fn!(fn(NativeHandle, PlayerSlot, i32, i32) -> bool);
    pub type CloseInstanceFn = crate::virtual_fn!(fn(NativeHandle) -> bool);
}

/// `IMenuSystem::IPlayer` slots.
pub mod player {
    pub const GET_ACTIVE_MENU_INDEX: usize = 0;

    pub type GetActiveMenuIndexFn = crate::virtual_fn!(fn() -> i32);
}
