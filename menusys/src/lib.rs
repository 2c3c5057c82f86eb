// menusys: User-facing library crate. Plugins depend on this and reach the
// native menu module through `MenuSystemApi` / `MenuHandle`; the host plugin
// owns a `MenuBridge`, which registers the implementation on load and
// withdraws it on unload.

// Re-exports for user access to the lower layers.
pub use menusys_ffi as ffi;
pub use menusys_runtime as runtime;

pub mod api;
pub mod bridge;
pub mod prelude;

pub use api::{
    instance, is_available, register_implementation, unregister_implementation, ApiError,
    ApiResult, MenuHandle, MenuItemSelection, MenuItemStyle, MenuSystemApi, API_VERSION,
};
pub use bridge::MenuBridge;
pub use menusys_runtime::{BridgeConfig, PlayerController, PlayerLookup};
