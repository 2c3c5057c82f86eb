// FFI boundary guard: wraps Rust code reached from native callbacks so that a
// panic is caught before it crosses into the native module (which is UB).

use std::any::Any;

/// Execute `f` and catch any panic, returning `default` on failure.
///
/// Every `extern "C"` function the native module calls wraps its body in
/// this guard. The panic payload is logged at `error`.
pub fn ffi_boundary<F, R>(default: R, f: F) -> R
where
    F: FnOnce() -> R + std::panic::UnwindSafe,
{
    match std::panic::catch_unwind(f) {
        Ok(value) => value,
        Err(payload) => {
            tracing::error!("{}", panic_message(payload.as_ref()));
            default
        }
    }
}

/// Extract a human-readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("[menusys] Rust panic in native callback: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("[menusys] Rust panic in native callback: {s}")
    } else {
        "[menusys] Rust panic in native callback (unknown payload)".to_string()
    }
}
