// MenuContext: every piece of process-wide bridge state, created at load and
// torn down at unload.
//
// The context owns the native module, the export table, the root menu-system
// facade, the callback token table, the menu identity registry and the
// deferred-work queue. Menus hold only a weak reference back to it.

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU32, Ordering};

use menusys_ffi::{NativeHandle, PlayerSlot, MENU_INVALID_INDEX, SYM_MENU_GET_PLAYER_ACTIVE_MENU};
use tracing::{debug, error, info, trace, warn};

use crate::callback_bridge::{CallbackBridge, CallbackToken};
use crate::config::BridgeConfig;
use crate::deferred::DeferredQueue;
use crate::dispatch;
use crate::error::{MenuError, MenuResult};
use crate::identity::IdentityRegistry;
use crate::loader::{ExportTable, ModuleLease, NativeModule};
use crate::menu::{ItemSelection, Menu, MenuInner, MenuState};
use crate::player::{NoPlayers, PlayerController, PlayerLookup};
use crate::profile::{Profile, ProfileSystem};
use crate::system::MenuSystem;

static NEXT_CONTEXT_ID: AtomicU32 = AtomicU32::new(1);

fn next_context_id() -> u32 {
    loop {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        if id != 0 {
            return id;
        }
    }
}

pub(crate) struct ContextShared {
    pub(crate) id: u32,
    this: Weak<ContextShared>,
    pub(crate) exports: ExportTable,
    pub(crate) lease: ModuleLease,
    system: Option<MenuSystem>,
    default_profile: String,
    pub(crate) bridge: CallbackBridge<Menu, ItemSelection>,
    menus: RefCell<IdentityRegistry<MenuInner>>,
    // Menus whose callback is running, innermost last.
    dispatching: RefCell<Vec<NativeHandle>>,
    deferred: DeferredQueue,
    players: Box<dyn PlayerLookup>,
    module: RefCell<Option<NativeModule>>,
}

impl ContextShared {
    pub(crate) fn system(&self) -> MenuResult<&MenuSystem> {
        self.lease.check()?;
        self.system.as_ref().ok_or(MenuError::Unavailable)
    }

    fn is_dispatching(&self, menu: NativeHandle) -> bool {
        self.dispatching.borrow().contains(&menu)
    }

    fn wrap(&self, handle: NativeHandle) -> MenuResult<Menu> {
        let this = self.this.upgrade().ok_or(MenuError::Unavailable)?;
        let inner = self
            .menus
            .borrow_mut()
            .get_or_create(handle, |h| MenuInner::new(h, &this).map(Rc::new))?;
        Ok(Menu::from_inner(inner))
    }

    pub(crate) fn close_menu(&self, menu: &MenuInner) -> MenuResult<bool> {
        let closed = self.system()?.close_instance(menu.handle())?;
        debug!(menu = %menu.handle(), closed, "closed menu instance");
        menu.state.set(MenuState::Closed);
        self.dispose_menu(menu);
        Ok(closed)
    }

    /// Retire `menu`: drop its registry entry and release its tokens. Token
    /// release waits for the next frame when the menu's own callback is on
    /// the stack.
    pub(crate) fn dispose_menu(&self, menu: &MenuInner) {
        if menu.state.get() == MenuState::Disposed {
            return;
        }
        menu.state.set(MenuState::Disposed);
        self.menus
            .borrow_mut()
            .remove_wrapper(menu.handle(), menu as *const MenuInner);

        let tokens = std::mem::take(&mut *menu.tokens.borrow_mut());
        if tokens.is_empty() {
            return;
        }
        if self.is_dispatching(menu.handle()) {
            debug!(
                menu = %menu.handle(),
                tokens = tokens.len(),
                "menu disposed from its own callback; releasing tokens next frame"
            );
            let context = self.this.clone();
            self.deferred.defer(move || {
                if let Some(context) = context.upgrade() {
                    context.bridge.release_all(tokens);
                }
            });
        } else {
            self.bridge.release_all(tokens);
        }
    }

    pub(crate) fn dispatch_selection(
        &self,
        menu: NativeHandle,
        token: CallbackToken,
        slot: PlayerSlot,
        item: i32,
        item_on_page: u8,
    ) {
        let Some(owner) = self.bridge.owner(token) else {
            trace!(?token, %menu, "selection for a released callback token ignored");
            return;
        };
        if owner.handle() != menu {
            debug!(?token, %menu, owner = %owner.handle(), "callback token fired for another menu");
        }
        let selection = ItemSelection {
            player: self.players.player_from_slot(slot),
            slot,
            item,
            item_on_page,
        };
        let _scope = DispatchScope::enter(&self.dispatching, owner.handle());
        self.bridge.invoke(token, &selection);
    }

    fn shutdown(&self) {
        dispatch::unregister_context(self.id);
        let released = self.bridge.clear();
        self.deferred.clear();
        self.menus.borrow_mut().clear();
        let module = self.module.borrow_mut().take();
        if !self.dispatching.borrow().is_empty() {
            // Native frames of the module are still on the stack; unloading
            // it now would return into unmapped code.
            error!(
                context = self.id,
                "menu context dropped inside a menu callback; leaking the native module"
            );
            std::mem::forget(module);
        } else {
            drop(module);
        }
        info!(context = self.id, released, "menu context shut down");
    }
}

/// Marks `menu` as dispatching for the scope's lifetime, unwind included.
struct DispatchScope<'a> {
    stack: &'a RefCell<Vec<NativeHandle>>,
}

impl<'a> DispatchScope<'a> {
    fn enter(stack: &'a RefCell<Vec<NativeHandle>>, menu: NativeHandle) -> Self {
        stack.borrow_mut().push(menu);
        Self { stack }
    }
}

impl Drop for DispatchScope<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

/// Builder for [`MenuContext`].
pub struct ContextBuilder {
    module: Option<NativeModule>,
    root: Option<NativeHandle>,
    players: Box<dyn PlayerLookup>,
    default_profile: String,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            module: None,
            root: None,
            players: Box::new(NoPlayers),
            default_profile: BridgeConfig::default().menus.default_profile,
        }
    }
}

impl ContextBuilder {
    pub fn module(mut self, module: NativeModule) -> Self {
        self.module = Some(module);
        self
    }

    /// Root menu-system object discovered by the host, used instead of the
    /// module's `MenuSystem` export.
    pub fn root_handle(mut self, root: NativeHandle) -> Self {
        self.root = root.non_null();
        self
    }

    pub fn players(mut self, players: impl PlayerLookup + 'static) -> Self {
        self.players = Box::new(players);
        self
    }

    pub fn default_profile(mut self, name: impl Into<String>) -> Self {
        self.default_profile = name.into();
        self
    }

    pub fn config(self, config: &BridgeConfig) -> Self {
        self.default_profile(config.menus.default_profile.clone())
    }

    pub fn build(self) -> MenuContext {
        let id = next_context_id();
        let module = self
            .module
            .unwrap_or_else(|| NativeModule::from_exports(ExportTable::default()));
        let exports = *module.exports();
        let lease = module.lease();

        let root = self.root.or_else(|| {
            exports
                .menu_system
                // SAFETY: zero-argument getter from the module just loaded.
                .and_then(|menu_system| unsafe { menu_system() }.non_null())
        });
        let system = match root {
            Some(root) => match MenuSystem::new(root, lease.clone()) {
                Ok(system) => Some(system),
                Err(e) => {
                    warn!("menu system root rejected: {e}");
                    None
                }
            },
            None => {
                warn!(context = id, "menu system root is unavailable");
                None
            }
        };

        let shared = Rc::new_cyclic(|this| ContextShared {
            id,
            this: this.clone(),
            exports,
            lease,
            system,
            default_profile: self.default_profile,
            bridge: CallbackBridge::new(id),
            menus: RefCell::new(IdentityRegistry::new()),
            dispatching: RefCell::new(Vec::new()),
            deferred: DeferredQueue::new(),
            players: self.players,
            module: RefCell::new(Some(module)),
        });
        dispatch::register_context(id, Rc::downgrade(&shared));
        debug!(context = id, available = shared.system.is_some(), "menu context created");
        MenuContext { shared }
    }
}

/// All bridge state for one loaded native module.
///
/// Not `Send`: the context and everything created from it belong to the
/// host's main thread. Dropping it releases every callback token, forgets
/// every menu wrapper and unloads the module; wrappers still held elsewhere
/// report `Unavailable` from then on.
pub struct MenuContext {
    shared: Rc<ContextShared>,
}

impl MenuContext {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// Open the module named by `config` under `game_dir`.
    pub fn load(
        config: &BridgeConfig,
        game_dir: impl AsRef<Path>,
        players: impl PlayerLookup + 'static,
    ) -> MenuResult<Self> {
        let module = NativeModule::open(config.library_path(game_dir))?;
        Ok(Self::builder().module(module).config(config).players(players).build())
    }

    /// A context with no module; every operation reports `Unavailable`.
    pub fn unavailable(players: impl PlayerLookup + 'static) -> Self {
        Self::builder().players(players).build()
    }

    pub fn id(&self) -> u32 {
        self.shared.id
    }

    /// True when the module is loaded and the root object was found.
    pub fn is_available(&self) -> bool {
        self.shared.system().is_ok()
    }

    pub fn exports(&self) -> &ExportTable {
        &self.shared.exports
    }

    pub fn system(&self) -> MenuResult<&MenuSystem> {
        self.shared.system()
    }

    pub fn default_profile(&self) -> &str {
        &self.shared.default_profile
    }

    pub fn profiles(&self) -> MenuResult<ProfileSystem> {
        self.system()?.profiles()
    }

    /// Look up a profile by name; an unknown name is `ProfileNotFound`.
    pub fn profile(&self, name: &str) -> MenuResult<Profile> {
        self.profiles()?
            .profile(name)?
            .ok_or_else(|| MenuError::ProfileNotFound(name.to_string()))
    }

    /// Create a native menu instance with `profile` and wrap it.
    pub fn create_menu(&self, profile: &Profile) -> MenuResult<Menu> {
        let handle = self.system()?.create_instance(profile.handle(), NativeHandle::NULL)?;
        debug!(menu = %handle, profile = ?profile.name(), "created menu instance");
        self.shared.wrap(handle)
    }

    /// Create a menu with `title`, using `profile` or the configured default.
    pub fn create_titled_menu(&self, title: &str, profile: Option<&str>) -> MenuResult<Menu> {
        // Validate before any native call.
        crate::strings::to_native(title, "menu title")?;
        let profile = self.profile(profile.unwrap_or(self.default_profile()))?;
        let menu = self.create_menu(&profile)?;
        menu.set_title(title)?;
        Ok(menu)
    }

    pub fn display(
        &self,
        menu: &Menu,
        slot: PlayerSlot,
        start_item: i32,
        display_time: i32,
    ) -> MenuResult<bool> {
        menu.display(slot, start_item, display_time)
    }

    pub fn close(&self, menu: &Menu) -> MenuResult<bool> {
        menu.close()
    }

    /// Index of the menu `slot` is viewing, `MENU_INVALID_INDEX` for none.
    pub fn active_menu_index(&self, slot: PlayerSlot) -> MenuResult<i32> {
        let index = self.system()?.active_menu_index(slot)?;
        Ok(if index < 0 { MENU_INVALID_INDEX } else { index })
    }

    /// The menu `slot` is viewing, wrapped through the identity registry.
    pub fn active_menu(&self, slot: PlayerSlot) -> MenuResult<Option<Menu>> {
        let system = self.system()?;
        let get_active = self
            .shared
            .exports
            .get_player_active_menu
            .ok_or(MenuError::Unsupported(SYM_MENU_GET_PLAYER_ACTIVE_MENU))?;
        // SAFETY: export and root object are live while the lease holds.
        let handle = unsafe { get_active(system.handle(), slot) };
        match handle.non_null() {
            Some(handle) => self.shared.wrap(handle).map(Some),
            None => Ok(None),
        }
    }

    /// The live wrapper for `handle`, if one exists.
    pub fn menu(&self, handle: NativeHandle) -> Option<Menu> {
        self.shared.menus.borrow().get(handle).map(Menu::from_inner)
    }

    /// The wrapper for `handle`, created if none is alive.
    pub fn wrap_menu(&self, handle: NativeHandle) -> MenuResult<Menu> {
        self.shared.lease.check()?;
        self.shared.wrap(handle)
    }

    pub fn player(&self, slot: PlayerSlot) -> Option<PlayerController> {
        self.shared.players.player_from_slot(slot)
    }

    /// Frame-boundary hook: run deferred work and drop dead registry entries.
    /// Returns the number of deferred tasks that ran.
    pub fn run_frame(&self) -> usize {
        let ran = self.shared.deferred.run_pending();
        let purged = self.shared.menus.borrow_mut().purge();
        if ran > 0 || purged > 0 {
            trace!(context = self.id(), ran, purged, "frame maintenance");
        }
        ran
    }

    pub fn pending_deferred(&self) -> usize {
        self.shared.deferred.len()
    }

    /// Registered callback tokens across all menus.
    pub fn callback_count(&self) -> usize {
        self.shared.bridge.len()
    }

    /// Menus with a live wrapper.
    pub fn live_menus(&self) -> Vec<Menu> {
        self.shared
            .menus
            .borrow()
            .live()
            .into_iter()
            .map(Menu::from_inner)
            .collect()
    }

    /// Whether a callback of `menu` is currently running.
    pub fn is_dispatching(&self, menu: &Menu) -> bool {
        self.shared.is_dispatching(menu.handle())
    }
}

impl Drop for MenuContext {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

impl fmt::Debug for MenuContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuContext")
            .field("id", &self.shared.id)
            .field("available", &self.is_available())
            .field("callbacks", &self.shared.bridge.len())
            .field("menus", &self.shared.menus.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_player_lookup, FakeMenuModule};
    use menusys_ffi::{ItemStyleFlags, SYM_MENU_SYSTEM};
    use std::cell::Cell;

    #[test]
    fn unavailable_context_makes_no_native_calls() {
        let fake = FakeMenuModule::install();
        let ctx = MenuContext::unavailable(fake_player_lookup);
        assert!(!ctx.is_available());

        let before = fake.native_calls();
        assert!(matches!(ctx.create_titled_menu("Test", None), Err(MenuError::Unavailable)));
        assert!(matches!(ctx.active_menu_index(PlayerSlot(1)), Err(MenuError::Unavailable)));
        assert!(matches!(ctx.active_menu(PlayerSlot(1)), Err(MenuError::Unavailable)));
        assert!(matches!(ctx.profiles(), Err(MenuError::Unavailable)));
        assert_eq!(fake.native_calls(), before);
    }

    #[test]
    fn missing_root_export_is_unavailable() {
        let fake = FakeMenuModule::install();
        let ctx = fake
            .context_builder()
            .module(NativeModule::from_exports(fake.exports().without(SYM_MENU_SYSTEM)))
            .build();
        assert!(!ctx.is_available());
        assert!(matches!(ctx.create_titled_menu("x", None), Err(MenuError::Unavailable)));
    }

    #[test]
    fn host_supplied_root_replaces_export() {
        let fake = FakeMenuModule::install();
        let ctx = fake
            .context_builder()
            .module(NativeModule::from_exports(fake.exports().without(SYM_MENU_SYSTEM)))
            .root_handle(fake.system_handle())
            .build();
        assert!(ctx.is_available());
        assert_eq!(ctx.system().unwrap().handle(), fake.system_handle());
        let menu = ctx.create_titled_menu("Rooted", None).unwrap();
        assert_eq!(menu.title().unwrap(), "Rooted");
    }

    #[test]
    fn unknown_profile_is_reported() {
        let fake = FakeMenuModule::install();
        let ctx = fake.context();
        let before = fake.menus_created();
        let err = ctx.create_titled_menu("x", Some("missing")).unwrap_err();
        assert!(matches!(err, MenuError::ProfileNotFound(name) if name == "missing"));
        assert_eq!(fake.menus_created(), before);
    }

    #[test]
    fn configured_default_profile_is_used() {
        let fake = FakeMenuModule::install();
        let vip = fake.add_profile("vip");
        let ctx = fake.context_builder().default_profile("vip").build();
        assert_eq!(ctx.default_profile(), "vip");
        let menu = ctx.create_titled_menu("VIP", None).unwrap();
        assert_eq!(menu.profile().unwrap().map(|p| p.handle()), Some(vip));
    }

    #[test]
    fn null_instance_is_native_call_failure() {
        let fake = FakeMenuModule::install();
        fake.fail_create(true);
        let ctx = fake.context();
        assert!(matches!(
            ctx.create_titled_menu("x", None),
            Err(MenuError::NativeCallFailed(_))
        ));
        assert!(ctx.live_menus().is_empty());
    }

    #[test]
    fn active_menu_queries() {
        let fake = FakeMenuModule::install();
        fake.add_player(1);
        fake.add_player(2);
        let ctx = fake.context();

        assert_eq!(ctx.active_menu_index(PlayerSlot(1)).unwrap(), MENU_INVALID_INDEX);
        assert_eq!(ctx.active_menu_index(PlayerSlot(7)).unwrap(), MENU_INVALID_INDEX);
        assert!(ctx.active_menu(PlayerSlot(1)).unwrap().is_none());

        let menu = ctx.create_titled_menu("Active", None).unwrap();
        assert!(ctx.display(&menu, PlayerSlot(1), 0, 0).unwrap());
        assert_eq!(ctx.active_menu_index(PlayerSlot(1)).unwrap(), 0);
        assert_eq!(ctx.active_menu_index(PlayerSlot(2)).unwrap(), MENU_INVALID_INDEX);

        let active = ctx.active_menu(PlayerSlot(1)).unwrap().expect("menu is active");
        assert_eq!(active, menu);

        assert!(ctx.close(&menu).unwrap());
        assert!(ctx.active_menu(PlayerSlot(1)).unwrap().is_none());
    }

    #[test]
    fn repeated_lookup_preserves_identity() {
        let fake = FakeMenuModule::install();
        fake.add_player(1);
        let ctx = fake.context();
        let handle = {
            let menu = ctx.create_titled_menu("Ephemeral", None).unwrap();
            ctx.display(&menu, PlayerSlot(1), 0, 0).unwrap();
            menu.handle()
        };
        // The creating wrapper is gone; lookups build one and then reuse it.
        assert!(ctx.menu(handle).is_none());
        let first = ctx.active_menu(PlayerSlot(1)).unwrap().unwrap();
        let second = ctx.active_menu(PlayerSlot(1)).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.menu(handle), Some(first.clone()));
        assert_eq!(ctx.wrap_menu(handle).unwrap(), first);
    }

    #[test]
    fn closed_menu_is_not_resurrected() {
        let fake = FakeMenuModule::install();
        let ctx = fake.context();
        let menu = ctx.create_titled_menu("Closed", None).unwrap();
        let handle = menu.handle();
        menu.close().unwrap();
        assert!(ctx.menu(handle).is_none());
        let rewrapped = ctx.wrap_menu(handle).unwrap();
        assert_ne!(rewrapped, menu);
        assert_eq!(rewrapped.state(), MenuState::Created);
    }

    #[test]
    fn run_frame_purges_dead_wrappers() {
        let fake = FakeMenuModule::install();
        let ctx = fake.context();
        drop(ctx.create_titled_menu("a", None).unwrap());
        let kept = ctx.create_titled_menu("b", None).unwrap();
        assert_eq!(ctx.shared.menus.borrow().len(), 2);
        assert_eq!(ctx.run_frame(), 0);
        assert_eq!(ctx.shared.menus.borrow().len(), 1);
        assert_eq!(ctx.live_menus(), vec![kept]);
    }

    #[test]
    fn profile_system_passthrough() {
        let fake = FakeMenuModule::install();
        let ctx = fake.context();
        let profiles = ctx.profiles().unwrap();
        assert_eq!(profiles.handle(), fake.profile_system_handle());
        assert!(profiles.profile("nothing").unwrap().is_none());
        assert_eq!(
            profiles.entity_key_values_allocator().unwrap(),
            Some(fake.allocator_handle())
        );

        let mut data = 0u64;
        unsafe {
            profiles
                .add_or_replace_profile("custom", &mut data as *mut u64 as *mut std::ffi::c_void)
                .unwrap();
        }
        let custom = profiles.profile("custom").unwrap().unwrap();
        assert_eq!(custom.name(), Some("custom"));
        assert!(matches!(
            unsafe { profiles.add_or_replace_profile("null", std::ptr::null_mut()) },
            Err(MenuError::InvalidHandle(_))
        ));
    }

    #[test]
    fn system_player_lookup() {
        let fake = FakeMenuModule::install();
        let player = fake.add_player(4);
        let ctx = fake.context();
        assert!(ctx.system().unwrap().player(PlayerSlot(4)).unwrap().is_some());
        assert!(ctx.system().unwrap().player(PlayerSlot(5)).unwrap().is_none());
        assert_eq!(ctx.player(PlayerSlot(4)), Some(player));
    }

    #[test]
    fn teardown_invalidates_outstanding_wrappers() {
        let fake = FakeMenuModule::install();
        let ctx = fake.context();
        let menu = ctx.create_titled_menu("Outlives", None).unwrap();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let item = menu
            .add_item_with_callback("late", ItemStyleFlags::DEFAULT, move |_, _| {
                counter.set(counter.get() + 1)
            })
            .unwrap();
        let system = ctx.system().unwrap().clone();
        drop(ctx);

        let before = fake.native_calls();
        assert!(matches!(menu.title(), Err(MenuError::Unavailable)));
        assert!(matches!(system.profiles(), Err(MenuError::Unavailable)));
        assert_eq!(fake.native_calls(), before);

        // A late native callback finds no context and does nothing.
        assert!(fake.select(menu.handle(), 0, item));
        assert_eq!(calls.get(), 0);

        menu.dispose();
        assert!(menu.is_disposed());
    }

    #[test]
    fn contexts_do_not_share_tokens() {
        let fake = FakeMenuModule::install();
        let first = fake.context();
        let second = fake.context();
        assert_ne!(first.id(), second.id());
        let a = first.create_titled_menu("a", None).unwrap();
        let b = second.create_titled_menu("b", None).unwrap();
        a.add_item_with_callback("a", ItemStyleFlags::DEFAULT, |_, _| {}).unwrap();
        b.add_item_with_callback("b", ItemStyleFlags::DEFAULT, |_, _| {}).unwrap();
        assert_eq!(a.tokens()[0].bridge_id(), first.id());
        assert_eq!(b.tokens()[0].bridge_id(), second.id());
        drop(first);
        assert_eq!(second.callback_count(), 1);
    }

    #[test]
    fn load_reports_missing_library() {
        let config = BridgeConfig::from_str(
            r#"
            [module]
            path = "/nonexistent/menu_system/menu"
            "#,
        )
        .unwrap();
        let err = MenuContext::load(&config, "/", NoPlayers).unwrap_err();
        assert!(matches!(err, MenuError::Load(_)));
        assert!(err.is_unavailable());
    }

    #[test]
    fn dropping_the_context_inside_a_callback_keeps_the_module_loaded() {
        let fake = FakeMenuModule::install();
        let ctx = fake.context();
        let lease = ctx.system().unwrap().lease().clone();
        let menu = ctx.create_titled_menu("Unload", None).unwrap();
        let holder = Rc::new(RefCell::new(Some(ctx)));
        let slot = holder.clone();
        let loaded_inside = Rc::new(Cell::new(None));
        let observed = loaded_inside.clone();
        let callback_lease = lease.clone();
        let item = menu
            .add_item_with_callback("unload", ItemStyleFlags::DEFAULT, move |_, _| {
                drop(slot.borrow_mut().take());
                observed.set(Some(callback_lease.is_loaded()));
            })
            .unwrap();

        assert!(fake.select(menu.handle(), 0, item));
        assert!(holder.borrow().is_none());
        assert_eq!(loaded_inside.get(), Some(true));
        assert!(matches!(menu.title(), Err(MenuError::Unavailable)));
    }
}
