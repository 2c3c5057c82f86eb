use std::ffi::c_void;
use std::fmt;

/// Opaque handle to a native-resident object. Rust never dereferences it
/// outside the vtable binder; it is only passed back into native entry points.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NativeHandle(pub *mut c_void);

impl NativeHandle {
    /// The "no object" handle.
    pub const NULL: NativeHandle = NativeHandle(std::ptr::null_mut());

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// `None` for the null handle.
    #[inline]
    pub fn non_null(self) -> Option<NativeHandle> {
        if self.is_null() { None } else { Some(self) }
    }

    #[inline]
    pub fn as_ptr(self) -> *mut c_void {
        self.0
    }

    /// Address as an integer, used as a map key and in log output.
    #[inline]
    pub fn to_addr(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn from_addr(addr: usize) -> Self {
        NativeHandle(addr as *mut c_void)
    }
}

impl Default for NativeHandle {
    fn default() -> Self {
        NativeHandle::NULL
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.to_addr())
    }
}

// Handles are raw FFI identifiers. They can be sent across threads
// (but must only be *used* on the host main thread).
unsafe impl Send for NativeHandle {}
unsafe impl Sync for NativeHandle {}

/// A player slot (0-based client index) as the native module sees it.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct PlayerSlot(pub i32);

impl PlayerSlot {
    #[inline]
    pub fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for PlayerSlot {
    fn from(slot: i32) -> Self {
        PlayerSlot(slot)
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Native "no active menu" index returned by the per-player object.
pub const MENU_INVALID_INDEX: i32 = -1;
