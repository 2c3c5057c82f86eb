// MenuSystem facade: the root native object every other object is reached from.

use menusys_ffi::vtable::{menu_system, player};
use menusys_ffi::{NativeHandle, PlayerSlot, MENU_INVALID_INDEX};
use tracing::trace;

use crate::binder::VirtualFunction;
use crate::error::{MenuError, MenuResult};
use crate::loader::ModuleLease;
use crate::profile::ProfileSystem;

/// Facade over the native `IMenuSystem` root object.
///
/// Menu creation, display and close are driven through [`crate::MenuContext`]
/// and [`crate::Menu`], which keep the wrapper bookkeeping in step with these
/// calls.
#[derive(Clone, Debug)]
pub struct MenuSystem {
    handle: NativeHandle,
    lease: ModuleLease,
    get_player: VirtualFunction<menu_system::GetPlayerFn>,
    get_profiles: VirtualFunction<menu_system::GetProfilesFn>,
    create_instance: VirtualFunction<menu_system::CreateInstanceFn>,
    display_instance: VirtualFunction<menu_system::DisplayInstanceToPlayerFn>,
    close_instance: VirtualFunction<menu_system::CloseInstanceFn>,
}

impl MenuSystem {
    pub fn new(handle: NativeHandle, lease: ModuleLease) -> MenuResult<Self> {
        Ok(Self {
            handle,
            get_player: VirtualFunction::bind(handle, menu_system::GET_PLAYER)?,
            get_profiles: VirtualFunction::bind(handle, menu_system::GET_PROFILES)?,
            create_instance: VirtualFunction::bind(handle, menu_system::CREATE_INSTANCE)?,
            display_instance: VirtualFunction::bind(
                handle,
                menu_system::DISPLAY_INSTANCE_TO_PLAYER,
            )?,
            close_instance: VirtualFunction::bind(handle, menu_system::CLOSE_INSTANCE)?,
            lease,
        })
    }

    #[inline]
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub fn lease(&self) -> &ModuleLease {
        &self.lease
    }

    /// The native per-player menu state object for `slot`.
    pub fn player(&self, slot: PlayerSlot) -> MenuResult<Option<NativeHandle>> {
        self.lease.check()?;
        // SAFETY: the root object is live while the lease holds.
        Ok(unsafe { (self.get_player.target())(self.handle, slot) }.non_null())
    }

    pub fn profiles(&self) -> MenuResult<ProfileSystem> {
        self.lease.check()?;
        let handle = unsafe { (self.get_profiles.target())(self.handle) };
        if handle.is_null() {
            return Err(MenuError::NativeCallFailed("menu system returned no profile system"));
        }
        ProfileSystem::new(handle, self.lease.clone())
    }

    /// Index of the menu `slot` is viewing, or `MENU_INVALID_INDEX` when the
    /// slot has no player state or no active menu.
    pub fn active_menu_index(&self, slot: PlayerSlot) -> MenuResult<i32> {
        let Some(state) = self.player(slot)? else {
            trace!(%slot, "no native player state");
            return Ok(MENU_INVALID_INDEX);
        };
        let get_index =
            VirtualFunction::<player::GetActiveMenuIndexFn>::bind(state, player::GET_ACTIVE_MENU_INDEX)?;
        // SAFETY: `state` was just returned by the live root object.
        Ok(unsafe { (get_index.target())(state) })
    }

    pub(crate) fn create_instance(
        &self,
        profile: NativeHandle,
        handler: NativeHandle,
    ) -> MenuResult<NativeHandle> {
        self.lease.check()?;
        let menu = unsafe { (self.create_instance.target())(self.handle, profile, handler) };
        menu.non_null()
            .ok_or(MenuError::NativeCallFailed("menu system returned no menu instance"))
    }

    pub(crate) fn display_instance(
        &self,
        menu: NativeHandle,
        slot: PlayerSlot,
        start_item: i32,
        display_time: i32,
    ) -> MenuResult<bool> {
        self.lease.check()?;
        Ok(unsafe { (self.display_instance.target())(self.handle, menu, slot, start_item, display_time) })
    }

    pub(crate) fn close_instance(&self, menu: NativeHandle) -> MenuResult<bool> {
        self.lease.check()?;
        Ok(unsafe { (self.close_instance.target())(self.handle, menu) })
    }
}
