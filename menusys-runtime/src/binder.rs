// Virtual-call binder: typed access to a slot of a native object's function
// table.
//
// Native objects start with a pointer to an array of function pointers. A
// `VirtualFunction<F>` remembers (object, slot) and reads the entry at call
// time, so a module that patches its table after binding is still honoured.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::mem::size_of;

use menusys_ffi::NativeHandle;

use crate::error::{MenuError, MenuResult};

/// A bound virtual member function of signature `F` (an `unsafe extern "C" fn`
/// whose first parameter is the object handle).
pub struct VirtualFunction<F: Copy> {
    this: NativeHandle,
    slot: usize,
    _signature: PhantomData<F>,
}

impl<F: Copy> VirtualFunction<F> {
    /// Bind `slot` of the object behind `this`.
    ///
    /// Fails with `InvalidHandle` when `this` is null. The slot itself is not
    /// validated; there is no runtime type information to check it against.
    pub fn bind(this: NativeHandle, slot: usize) -> MenuResult<Self> {
        const {
            assert!(
                size_of::<F>() == size_of::<*const c_void>(),
                "virtual function signature must be a plain function pointer"
            )
        };
        if this.is_null() {
            return Err(MenuError::InvalidHandle("virtual call target is null"));
        }
        Ok(Self {
            this,
            slot,
            _signature: PhantomData,
        })
    }

    #[inline]
    pub fn this(&self) -> NativeHandle {
        self.this
    }

    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Read the function pointer currently installed in the slot.
    ///
    /// # Safety
    /// The bound object must still be alive, its function table must have more
    /// than `slot` entries, and the entry must have exactly signature `F`.
    pub unsafe fn target(&self) -> F {
        // SAFETY: upheld by the caller; the first word of the object is the
        // table pointer and each entry is one pointer wide.
        unsafe {
            let table = *(self.this.as_ptr() as *const *const *const c_void);
            let entry = *table.add(self.slot);
            std::mem::transmute_copy::<*const c_void, F>(&entry)
        }
    }
}

impl<F: Copy> Clone for VirtualFunction<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F: Copy> Copy for VirtualFunction<F> {}

impl<F: Copy> fmt::Debug for VirtualFunction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualFunction")
            .field("this", &self.this)
            .field("slot", &self.slot)
            .finish()
    }
}
