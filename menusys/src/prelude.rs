// Prelude: one-import access to the menu API.
//
// Usage: `use menusys::prelude::*;`

pub use crate::api::{
    ApiError, ApiResult, MenuHandle, MenuItemSelection, MenuItemStyle, MenuSystemApi, API_VERSION,
};
pub use crate::bridge::MenuBridge;
pub use menusys_runtime::{BridgeConfig, PlayerController, PlayerLookup};

// FFI handles (rarely needed directly, but useful for host integration)
pub use menusys_runtime::{NativeHandle, PlayerSlot};
