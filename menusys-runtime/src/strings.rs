// String marshalling across the native boundary. Native strings are
// NUL-terminated UTF-8; a null pointer reads as the empty string.

use std::ffi::{c_char, CStr, CString};

use crate::error::{MenuError, MenuResult};

/// Convert a Rust string into a NUL-terminated buffer for a native call.
/// `what` names the argument in the error for an interior NUL.
pub fn to_native(value: &str, what: &str) -> MenuResult<CString> {
    CString::new(value)
        .map_err(|_| MenuError::InvalidArgument(format!("{what} contains an interior NUL byte")))
}

/// Copy a native string into an owned `String`. Invalid UTF-8 is replaced.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of this call.
pub unsafe fn from_native(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}
