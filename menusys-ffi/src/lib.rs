// menusys-ffi: #[repr(C)] types, handle types, export signatures and vtable slots.
// Zero external dependencies. This crate defines the complete Rust <-> native contract.

pub mod handles;
pub mod flags;
pub mod vtable;
pub mod exports;
pub mod callbacks;

pub use handles::*;
pub use flags::*;
pub use exports::*;
pub use callbacks::*;
