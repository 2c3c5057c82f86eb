// Profile and ProfileSystem facades.

use std::ffi::c_void;

use menusys_ffi::vtable::profile_system;
use menusys_ffi::NativeHandle;

use crate::binder::VirtualFunction;
use crate::error::{MenuError, MenuResult};
use crate::loader::ModuleLease;
use crate::strings::to_native;

/// A native menu profile (layout and style preset). Owned by the native
/// module; never released by the bridge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    handle: NativeHandle,
    name: Option<String>,
}

impl Profile {
    pub fn from_handle(handle: NativeHandle, name: Option<String>) -> MenuResult<Self> {
        if handle.is_null() {
            return Err(MenuError::InvalidHandle("profile"));
        }
        Ok(Self { handle, name })
    }

    #[inline]
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    /// The name the profile was looked up by, when known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Facade over the native `IMenuProfileSystem`.
#[derive(Clone, Debug)]
pub struct ProfileSystem {
    handle: NativeHandle,
    lease: ModuleLease,
    get_profile: VirtualFunction<profile_system::GetProfileFn>,
    add_or_replace_profile: VirtualFunction<profile_system::AddOrReplaceProfileFn>,
    get_allocator: VirtualFunction<profile_system::GetEntityKeyValuesAllocatorFn>,
}

impl ProfileSystem {
    pub fn new(handle: NativeHandle, lease: ModuleLease) -> MenuResult<Self> {
        Ok(Self {
            handle,
            get_profile: VirtualFunction::bind(handle, profile_system::GET_PROFILE)?,
            add_or_replace_profile: VirtualFunction::bind(
                handle,
                profile_system::ADD_OR_REPLACE_PROFILE,
            )?,
            get_allocator: VirtualFunction::bind(
                handle,
                profile_system::GET_ENTITY_KEY_VALUES_ALLOCATOR,
            )?,
            lease,
        })
    }

    #[inline]
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    /// Look up a profile by name. `Ok(None)` when the module knows no such
    /// profile.
    pub fn profile(&self, name: &str) -> MenuResult<Option<Profile>> {
        let native_name = to_native(name, "profile name")?;
        self.lease.check()?;
        // SAFETY: the object is live while the lease holds; slot layout per
        // menusys_ffi::vtable.
        let handle = unsafe { (self.get_profile.target())(self.handle, native_name.as_ptr()) };
        Ok(handle.non_null().map(|handle| Profile {
            handle,
            name: Some(name.to_string()),
        }))
    }

    /// Register `data` under `name`, replacing any existing profile.
    ///
    /// # Safety
    /// `data` must point to a profile object laid out as the native module
    /// expects; the module takes it over.
    pub unsafe fn add_or_replace_profile(&self, name: &str, data: *mut c_void) -> MenuResult<()> {
        if data.is_null() {
            return Err(MenuError::InvalidHandle("profile data"));
        }
        let native_name = to_native(name, "profile name")?;
        self.lease.check()?;
        unsafe { (self.add_or_replace_profile.target())(self.handle, native_name.as_ptr(), data) };
        Ok(())
    }

    /// The module's entity key-values allocator, passed through untouched.
    pub fn entity_key_values_allocator(&self) -> MenuResult<Option<NativeHandle>> {
        self.lease.check()?;
        // SAFETY: as in `profile`.
        Ok(unsafe { (self.get_allocator.target())(self.handle) }.non_null())
    }
}
