// menusys-runtime: Safe Rust API over menusys-ffi.
// All unsafe FFI calls are confined to this crate. The public facade crate and
// plugin code interact only with the safe types exported here.
//
// Threading: everything here is driven from the host's main thread. The
// context, facades and registries are built on Rc/RefCell and are !Send, so
// the compiler rejects use from any other thread.

// Re-export the FFI contract crate for callers that need symbol names or slots.
pub use menusys_ffi as ffi;

pub mod error;
pub mod ffi_guard;
pub mod strings;
pub mod binder;
pub mod loader;
pub mod config;
pub mod deferred;
pub mod identity;
pub mod callback_bridge;
pub mod dispatch;
pub mod player;
pub mod profile;
pub mod system;
pub mod menu;
pub mod context;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export the primary public API surface.
pub use error::{MenuError, MenuResult};
pub use ffi_guard::ffi_boundary;
pub use binder::VirtualFunction;
pub use loader::{ExportTable, LoadFailure, ModuleLease, NativeModule};
pub use config::{BridgeConfig, ConfigError, MenusConfig, ModuleConfig};
pub use deferred::DeferredQueue;
pub use identity::IdentityRegistry;
pub use callback_bridge::{CallbackBridge, CallbackToken};
pub use player::{NoPlayers, PlayerController, PlayerLookup};
pub use profile::{Profile, ProfileSystem};
pub use system::MenuSystem;
pub use menu::{ItemSelection, Menu, MenuState};
pub use context::{ContextBuilder, MenuContext};

// Re-export FFI types that appear in the runtime's signatures.
pub use menusys_ffi::{
    ItemControlFlags, ItemSelectCallback, ItemStyleFlags, NativeHandle, PlayerSlot,
    MENU_INVALID_INDEX,
};
