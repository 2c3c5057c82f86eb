// Menu facade: one native menu instance and the callback tokens it owns.
//
// State machine: Created -> Displayed (any number of times) -> Closed ->
// Disposed. Every operation first checks the state, so nothing reaches native
// code once the menu is closed or disposed.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::fmt;
use std::rc::{Rc, Weak};

use menusys_ffi::vtable::menu;
use menusys_ffi::*;
use tracing::{debug, warn};

use crate::binder::VirtualFunction;
use crate::callback_bridge::CallbackToken;
use crate::context::ContextShared;
use crate::error::{MenuError, MenuResult};
use crate::loader::ModuleLease;
use crate::player::PlayerController;
use crate::profile::Profile;
use crate::strings::{from_native, to_native};

/// Lifecycle state of a [`Menu`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MenuState {
    Created,
    Displayed,
    Closed,
    Disposed,
}

impl MenuState {
    /// Whether operations are still allowed.
    #[inline]
    pub fn is_live(self) -> bool {
        matches!(self, MenuState::Created | MenuState::Displayed)
    }
}

/// What the native module reports when a player selects an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemSelection {
    /// The selecting player, if the host still knows the slot.
    pub player: Option<PlayerController>,
    pub slot: PlayerSlot,
    /// Absolute item index in the menu.
    pub item: i32,
    /// Position of the item on the page the player was viewing.
    pub item_on_page: u8,
}

pub(crate) struct MenuInner {
    handle: NativeHandle,
    context: Weak<ContextShared>,
    lease: ModuleLease,
    pub(crate) state: Cell<MenuState>,
    pub(crate) tokens: RefCell<Vec<CallbackToken>>,
    get_profile: VirtualFunction<menu::GetProfileFn>,
    apply_profile: VirtualFunction<menu::ApplyProfileFn>,
    get_handler: VirtualFunction<menu::GetHandlerFn>,
    get_current_position: VirtualFunction<menu::GetCurrentPositionFn>,
}

impl MenuInner {
    pub(crate) fn new(handle: NativeHandle, context: &Rc<ContextShared>) -> MenuResult<Self> {
        Ok(Self {
            handle,
            context: Rc::downgrade(context),
            lease: context.lease.clone(),
            state: Cell::new(MenuState::Created),
            tokens: RefCell::new(Vec::new()),
            get_profile: VirtualFunction::bind(handle, menu::GET_PROFILE)?,
            apply_profile: VirtualFunction::bind(handle, menu::APPLY_PROFILE)?,
            get_handler: VirtualFunction::bind(handle, menu::GET_HANDLER)?,
            get_current_position: VirtualFunction::bind(handle, menu::GET_CURRENT_POSITION)?,
        })
    }

    #[inline]
    pub(crate) fn handle(&self) -> NativeHandle {
        self.handle
    }
}

/// Facade over one native menu instance.
///
/// Cheap to clone; clones share state. Two `Menu`s compare equal when they
/// are the same wrapper, which the identity registry guarantees for repeated
/// lookups of the same native menu.
#[derive(Clone)]
pub struct Menu {
    pub(crate) inner: Rc<MenuInner>,
}

impl Menu {
    pub(crate) fn from_inner(inner: Rc<MenuInner>) -> Self {
        Self { inner }
    }

    #[inline]
    pub fn handle(&self) -> NativeHandle {
        self.inner.handle
    }

    #[inline]
    pub fn state(&self) -> MenuState {
        self.inner.state.get()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.state() == MenuState::Disposed
    }

    /// Tokens currently owned by this menu.
    pub fn tokens(&self) -> Vec<CallbackToken> {
        self.inner.tokens.borrow().clone()
    }

    /// Gate for every operation: state first, then module, then context.
    fn live(&self) -> MenuResult<Rc<ContextShared>> {
        if !self.state().is_live() {
            return Err(MenuError::Disposed);
        }
        self.inner.lease.check()?;
        self.inner.context.upgrade().ok_or(MenuError::Unavailable)
    }

    pub fn title(&self) -> MenuResult<String> {
        let ctx = self.live()?;
        let get_title = ctx.exports.get_title.ok_or(MenuError::Unsupported(SYM_MENU_GET_TITLE))?;
        // SAFETY: the export is live while the lease holds; the returned
        // string is owned by the menu and copied immediately.
        Ok(unsafe { from_native(get_title(self.handle())) })
    }

    pub fn set_title(&self, title: &str) -> MenuResult<()> {
        let ctx = self.live()?;
        let set_title = ctx.exports.set_title.ok_or(MenuError::Unsupported(SYM_MENU_SET_TITLE))?;
        let title = to_native(title, "menu title")?;
        unsafe { set_title(self.handle(), title.as_ptr()) };
        Ok(())
    }

    /// Add an item without a selection callback. Returns the native position;
    /// a negative value means the module refused the item.
    pub fn add_item(&self, content: &str, style: ItemStyleFlags) -> MenuResult<i32> {
        let ctx = self.live()?;
        let add_item = ctx.exports.add_item.ok_or(MenuError::Unsupported(SYM_MENU_ADD_ITEM))?;
        let content = to_native(content, "item content")?;
        Ok(unsafe { add_item(self.handle(), style, content.as_ptr(), None, std::ptr::null_mut()) })
    }

    /// Add an item whose selection invokes `callback`.
    ///
    /// The callback stays registered for the whole life of the menu and may
    /// fire any number of times. If the module refuses the item (negative
    /// position) the registration is released immediately.
    pub fn add_item_with_callback(
        &self,
        content: &str,
        style: ItemStyleFlags,
        callback: impl FnMut(&Menu, &ItemSelection) + 'static,
    ) -> MenuResult<i32> {
        let ctx = self.live()?;
        let add_item = ctx.exports.add_item.ok_or(MenuError::Unsupported(SYM_MENU_ADD_ITEM))?;
        let content = to_native(content, "item content")?;

        let token = ctx
            .bridge
            .register(self.clone(), callback)
            .ok_or(MenuError::TokensExhausted)?;
        self.inner.tokens.borrow_mut().push(token);

        let position = unsafe {
            add_item(
                self.handle(),
                style,
                content.as_ptr(),
                Some(crate::dispatch::item_selected_trampoline()),
                token.as_user_data(),
            )
        };
        if position < 0 {
            warn!(menu = %self.handle(), position, "native module refused menu item");
            self.inner.tokens.borrow_mut().retain(|t| *t != token);
            ctx.bridge.release(token);
        }
        Ok(position)
    }

    /// Add an item with a caller-supplied native handler.
    ///
    /// # Safety
    /// `handler` will be called by the native module with `data` for as long
    /// as the menu exists; both must stay valid that long.
    pub unsafe fn add_raw_item(
        &self,
        content: &str,
        style: ItemStyleFlags,
        handler: Option<ItemSelectCallback>,
        data: *mut c_void,
    ) -> MenuResult<i32> {
        let ctx = self.live()?;
        let add_item = ctx.exports.add_item.ok_or(MenuError::Unsupported(SYM_MENU_ADD_ITEM))?;
        let content = to_native(content, "item content")?;
        Ok(unsafe { add_item(self.handle(), style, content.as_ptr(), handler, data) })
    }

    /// Remove the item at `position`. Tokens of removed items are kept until
    /// the menu is disposed, since the module may still hold them.
    pub fn remove_item(&self, position: i32) -> MenuResult<()> {
        let ctx = self.live()?;
        let remove_item = ctx
            .exports
            .remove_item
            .ok_or(MenuError::Unsupported(SYM_MENU_REMOVE_ITEM))?;
        unsafe { remove_item(self.handle(), position) };
        Ok(())
    }

    pub fn item_styles(&self, position: i32) -> MenuResult<ItemStyleFlags> {
        let ctx = self.live()?;
        let get_styles = ctx
            .exports
            .get_item_styles
            .ok_or(MenuError::Unsupported(SYM_MENU_GET_ITEM_STYLES))?;
        Ok(unsafe { get_styles(self.handle(), position) })
    }

    pub fn item_content(&self, position: i32) -> MenuResult<String> {
        let ctx = self.live()?;
        let get_content = ctx
            .exports
            .get_item_content
            .ok_or(MenuError::Unsupported(SYM_MENU_GET_ITEM_CONTENT))?;
        Ok(unsafe { from_native(get_content(self.handle(), position)) })
    }

    pub fn item_controls(&self) -> MenuResult<ItemControlFlags> {
        let ctx = self.live()?;
        let get_controls = ctx
            .exports
            .get_item_controls
            .ok_or(MenuError::Unsupported(SYM_MENU_GET_ITEM_CONTROLS))?;
        Ok(unsafe { get_controls(self.handle()) })
    }

    pub fn set_item_controls(&self, controls: ItemControlFlags) -> MenuResult<()> {
        let ctx = self.live()?;
        let set_controls = ctx
            .exports
            .set_item_controls
            .ok_or(MenuError::Unsupported(SYM_MENU_SET_ITEM_CONTROLS))?;
        unsafe { set_controls(self.handle(), controls) };
        Ok(())
    }

    /// The item position `slot` is viewing. Uses the export when present and
    /// falls back to the menu's own virtual slot.
    pub fn current_position(&self, slot: PlayerSlot) -> MenuResult<i32> {
        let ctx = self.live()?;
        Ok(match ctx.exports.get_current_position {
            Some(get_position) => unsafe { get_position(self.handle(), slot) },
            None => unsafe { (self.inner.get_current_position.target())(self.handle(), slot) },
        })
    }

    /// The profile the menu was built with.
    pub fn profile(&self) -> MenuResult<Option<Profile>> {
        self.live()?;
        let handle = unsafe { (self.inner.get_profile.target())(self.handle()) };
        match handle.non_null() {
            Some(handle) => Ok(Some(Profile::from_handle(handle, None)?)),
            None => Ok(None),
        }
    }

    /// Apply `profile` to the menu as shown to `slot`.
    pub fn apply_profile(&self, slot: PlayerSlot, profile: &Profile) -> MenuResult<bool> {
        self.live()?;
        Ok(unsafe { (self.inner.apply_profile.target())(self.handle(), slot, profile.handle()) })
    }

    /// The native handler object, passed through untouched.
    pub fn handler(&self) -> MenuResult<Option<NativeHandle>> {
        self.live()?;
        Ok(unsafe { (self.inner.get_handler.target())(self.handle()) }.non_null())
    }

    /// Show the menu to `slot`. `Ok(false)` when the module refuses.
    pub fn display(&self, slot: PlayerSlot, start_item: i32, display_time: i32) -> MenuResult<bool> {
        let ctx = self.live()?;
        let shown = ctx
            .system()?
            .display_instance(self.handle(), slot, start_item, display_time)?;
        if shown {
            self.inner.state.set(MenuState::Displayed);
        } else {
            debug!(menu = %self.handle(), %slot, "native module refused to display menu");
        }
        Ok(shown)
    }

    /// Close the menu natively and dispose the wrapper. Returns the native
    /// result; the wrapper is disposed either way.
    pub fn close(&self) -> MenuResult<bool> {
        let ctx = self.live()?;
        ctx.close_menu(&self.inner)
    }

    /// Release every callback token and retire the wrapper without a native
    /// close. Idempotent.
    pub fn dispose(&self) {
        match self.inner.context.upgrade() {
            Some(ctx) => ctx.dispose_menu(&self.inner),
            None => {
                // Context gone: its bridge already dropped every token.
                self.inner.state.set(MenuState::Disposed);
                self.inner.tokens.borrow_mut().clear();
            }
        }
    }
}

impl PartialEq for Menu {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Menu {}

impl fmt::Debug for Menu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Menu")
            .field("handle", &self.handle())
            .field("state", &self.state())
            .field("tokens", &self.inner.tokens.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMenuModule;
    use crate::{MenuContext, NativeModule};
    use std::cell::Cell;

    fn menu_in(ctx: &MenuContext, title: &str) -> Menu {
        ctx.create_titled_menu(title, None).unwrap()
    }

    #[test]
    fn create_add_display_select_close() {
        let fake = FakeMenuModule::install();
        fake.add_player(1);
        let ctx = fake.context();

        let menu = menu_in(&ctx, "Test");
        let hits = Rc::new(RefCell::new(Vec::new()));
        let sink = hits.clone();
        let a = menu
            .add_item_with_callback("Option A", ItemStyleFlags::DEFAULT, move |_, sel| {
                sink.borrow_mut().push(sel.item)
            })
            .unwrap();
        let b = menu.add_item("Option B", ItemStyleFlags::DEFAULT).unwrap();
        assert!(a >= 0 && b >= 0 && a != b);
        assert_eq!(menu.title().unwrap(), "Test");

        assert!(menu.display(PlayerSlot(1), 0, 0).unwrap());
        assert_eq!(menu.state(), MenuState::Displayed);

        assert!(fake.select(menu.handle(), 1, a));
        assert_eq!(*hits.borrow(), vec![a]);

        assert!(menu.close().unwrap());
        assert!(fake.is_closed(menu.handle()));
        assert_eq!(menu.state(), MenuState::Disposed);
        assert!(matches!(
            menu.add_item("Option C", ItemStyleFlags::DEFAULT),
            Err(MenuError::Disposed)
        ));
    }

    #[test]
    fn callback_fires_on_every_selection() {
        let fake = FakeMenuModule::install();
        fake.add_player(2);
        let ctx = fake.context();
        let menu = menu_in(&ctx, "Repeat");
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        let item = menu
            .add_item_with_callback("Again", ItemStyleFlags::FULL, move |_, _| {
                counter.set(counter.get() + 1)
            })
            .unwrap();

        for _ in 0..4 {
            assert!(fake.select(menu.handle(), 2, item));
        }
        assert_eq!(count.get(), 4);
        assert_eq!(menu.tokens().len(), 1);
    }

    #[test]
    fn callback_receives_player_and_owning_menu() {
        let fake = FakeMenuModule::install();
        let player = fake.add_player(5);
        let ctx = fake.context();
        let menu = menu_in(&ctx, "Who");
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        let expected = menu.clone();
        let item = menu
            .add_item_with_callback("Me", ItemStyleFlags::DEFAULT, move |owner, sel| {
                assert_eq!(*owner, expected);
                *sink.borrow_mut() = Some(*sel);
            })
            .unwrap();

        fake.select(menu.handle(), 5, item);
        let sel = seen.borrow().expect("callback ran");
        assert_eq!(sel.player, Some(player));
        assert_eq!(sel.slot, PlayerSlot(5));
        assert_eq!(sel.item, item);

        // A slot the host does not know still dispatches, without a player.
        fake.select(menu.handle(), 9, item);
        assert_eq!(seen.borrow().unwrap().player, None);
    }

    #[test]
    fn disposed_menu_makes_no_native_calls() {
        let fake = FakeMenuModule::install();
        fake.add_player(1);
        let ctx = fake.context();
        let menu = menu_in(&ctx, "Gone");
        menu.dispose();
        menu.dispose();

        let before = fake.native_calls();
        assert!(matches!(menu.title(), Err(MenuError::Disposed)));
        assert!(matches!(menu.set_title("x"), Err(MenuError::Disposed)));
        assert!(matches!(menu.add_item("x", ItemStyleFlags::DEFAULT), Err(MenuError::Disposed)));
        assert!(matches!(
            menu.add_item_with_callback("x", ItemStyleFlags::DEFAULT, |_, _| {}),
            Err(MenuError::Disposed)
        ));
        assert!(matches!(menu.remove_item(0), Err(MenuError::Disposed)));
        assert!(matches!(menu.item_controls(), Err(MenuError::Disposed)));
        assert!(matches!(menu.current_position(PlayerSlot(1)), Err(MenuError::Disposed)));
        assert!(matches!(menu.profile(), Err(MenuError::Disposed)));
        assert!(matches!(menu.handler(), Err(MenuError::Disposed)));
        assert!(matches!(menu.display(PlayerSlot(1), 0, 0), Err(MenuError::Disposed)));
        assert!(matches!(menu.close(), Err(MenuError::Disposed)));
        assert_eq!(fake.native_calls(), before);
        // Dispose never closes natively.
        assert!(!fake.is_closed(menu.handle()));
    }

    #[test]
    fn dispose_releases_only_own_tokens() {
        let fake = FakeMenuModule::install();
        let ctx = fake.context();
        let first = menu_in(&ctx, "First");
        let second = menu_in(&ctx, "Second");
        for i in 0..3 {
            first
                .add_item_with_callback(&format!("f{i}"), ItemStyleFlags::DEFAULT, |_, _| {})
                .unwrap();
        }
        let kept = second
            .add_item_with_callback("s", ItemStyleFlags::DEFAULT, |_, _| {})
            .unwrap();
        assert_eq!(ctx.callback_count(), 4);

        first.dispose();
        assert_eq!(ctx.callback_count(), 1);
        assert!(first.tokens().is_empty());
        assert_eq!(second.tokens().len(), 1);
        assert!(fake.select(second.handle(), 0, kept));
    }

    #[test]
    fn refused_item_releases_its_token() {
        let fake = FakeMenuModule::install();
        let ctx = fake.context();
        let menu = menu_in(&ctx, "Refuse");
        fake.reject_items(true);
        let position = menu
            .add_item_with_callback("nope", ItemStyleFlags::DEFAULT, |_, _| {})
            .unwrap();
        assert!(position < 0);
        assert!(menu.tokens().is_empty());
        assert_eq!(ctx.callback_count(), 0);
    }

    #[test]
    fn interior_nul_fails_before_native_call() {
        let fake = FakeMenuModule::install();
        let ctx = fake.context();
        let menu = menu_in(&ctx, "Nul");
        let before = fake.native_calls();
        assert!(matches!(
            menu.add_item_with_callback("a\0b", ItemStyleFlags::DEFAULT, |_, _| {}),
            Err(MenuError::InvalidArgument(_))
        ));
        assert!(matches!(menu.set_title("t\0"), Err(MenuError::InvalidArgument(_))));
        assert_eq!(fake.native_calls(), before);
        assert_eq!(ctx.callback_count(), 0);
    }

    #[test]
    fn item_queries_and_removal() {
        let fake = FakeMenuModule::install();
        let ctx = fake.context();
        let menu = menu_in(&ctx, "Items");
        menu.add_item("Alpha", ItemStyleFlags::FULL).unwrap();
        menu.add_item("Beta", ItemStyleFlags::DISABLED).unwrap();

        assert_eq!(menu.item_content(0).unwrap(), "Alpha");
        assert_eq!(menu.item_styles(0).unwrap(), ItemStyleFlags::FULL);
        assert_eq!(menu.item_styles(1).unwrap(), ItemStyleFlags::DISABLED);

        menu.remove_item(0).unwrap();
        assert_eq!(fake.item_count(menu.handle()), 1);
        assert_eq!(menu.item_content(0).unwrap(), "Beta");
        // Out-of-range content reads as empty.
        assert_eq!(menu.item_content(7).unwrap(), "");

        menu.set_item_controls(ItemControlFlags::BACK | ItemControlFlags::EXIT).unwrap();
        let controls = menu.item_controls().unwrap();
        assert!(controls.contains(ItemControlFlags::EXIT));
        assert!(!controls.contains(ItemControlFlags::NEXT));
    }

    #[test]
    fn missing_export_is_unsupported() {
        let fake = FakeMenuModule::install();
        let ctx = fake
            .context_builder()
            .module(NativeModule::from_exports(
                fake.exports().without(SYM_MENU_REMOVE_ITEM),
            ))
            .build();
        let menu = menu_in(&ctx, "Partial");
        assert!(matches!(
            menu.remove_item(0),
            Err(MenuError::Unsupported(SYM_MENU_REMOVE_ITEM))
        ));
        // Everything else still works.
        assert!(menu.add_item("ok", ItemStyleFlags::DEFAULT).unwrap() >= 0);
    }

    #[test]
    fn current_position_falls_back_to_virtual_slot() {
        let fake = FakeMenuModule::install();
        fake.add_player(3);
        let ctx = fake
            .context_builder()
            .module(NativeModule::from_exports(
                fake.exports().without(SYM_MENU_GET_CURRENT_POSITION),
            ))
            .build();
        let menu = menu_in(&ctx, "Pos");
        assert_eq!(menu.current_position(PlayerSlot(3)).unwrap(), MENU_INVALID_INDEX);
        assert!(menu.display(PlayerSlot(3), 4, 0).unwrap());
        assert_eq!(menu.current_position(PlayerSlot(3)).unwrap(), 4);
    }

    #[test]
    fn profile_apply_and_handler() {
        let fake = FakeMenuModule::install();
        fake.add_player(1);
        let vip = fake.add_profile("vip");
        let ctx = fake.context();
        let menu = menu_in(&ctx, "Profiles");

        let profile = menu.profile().unwrap().expect("menu has a profile");
        assert_eq!(profile.handle(), ctx.profile("default").unwrap().handle());
        assert!(profile.name().is_none());

        let vip_profile = ctx.profile("vip").unwrap();
        assert_eq!(vip_profile.handle(), vip);
        assert!(menu.apply_profile(PlayerSlot(1), &vip_profile).unwrap());
        assert!(!menu.apply_profile(PlayerSlot(2), &vip_profile).unwrap());
        assert_eq!(menu.profile().unwrap().map(|p| p.handle()), Some(vip));

        assert_eq!(menu.handler().unwrap(), None);
    }

    #[test]
    fn refused_display_is_false_not_error() {
        let fake = FakeMenuModule::install();
        fake.add_player(1);
        fake.refuse_display(1);
        let ctx = fake.context();
        let menu = menu_in(&ctx, "Nope");
        assert!(!menu.display(PlayerSlot(1), 0, 0).unwrap());
        assert!(!menu.display(PlayerSlot(2), 0, 0).unwrap());
        assert_eq!(menu.state(), MenuState::Created);
    }

    #[test]
    fn close_from_own_callback_defers_token_release() {
        let fake = FakeMenuModule::install();
        fake.add_player(1);
        let ctx = fake.context();
        let menu = menu_in(&ctx, "Self-closing");
        let closed_inside = Rc::new(Cell::new(None));
        let flag = closed_inside.clone();
        let item = menu
            .add_item_with_callback("Close me", ItemStyleFlags::DEFAULT, move |owner, _| {
                flag.set(Some(owner.close().unwrap()));
                assert_eq!(owner.state(), MenuState::Disposed);
            })
            .unwrap();
        let token = menu.tokens()[0];

        assert!(fake.select(menu.handle(), 1, item));
        assert_eq!(closed_inside.get(), Some(true));
        assert_eq!(menu.state(), MenuState::Disposed);
        assert!(menu.tokens().is_empty());
        // Still pinned until the frame boundary.
        assert_eq!(ctx.callback_count(), 1);
        assert_eq!(ctx.pending_deferred(), 1);

        assert_eq!(ctx.run_frame(), 1);
        assert_eq!(ctx.callback_count(), 0);

        // The native module firing the stale token is a no-op.
        let data = fake.item_user_data(menu.handle(), item).unwrap();
        assert_eq!(crate::CallbackToken::from_user_data(data), Some(token));
        assert!(fake.select(menu.handle(), 1, item));
        assert_eq!(closed_inside.get(), Some(true));
    }

    #[test]
    fn closing_another_menu_from_a_callback_is_immediate() {
        let fake = FakeMenuModule::install();
        let ctx = fake.context();
        let trigger = menu_in(&ctx, "Trigger");
        let victim = menu_in(&ctx, "Victim");
        victim.add_item_with_callback("v", ItemStyleFlags::DEFAULT, |_, _| {}).unwrap();
        let target = victim.clone();
        let item = trigger
            .add_item_with_callback("close other", ItemStyleFlags::DEFAULT, move |_, _| {
                target.close().unwrap();
            })
            .unwrap();

        fake.select(trigger.handle(), 0, item);
        assert_eq!(victim.state(), MenuState::Disposed);
        assert_eq!(ctx.callback_count(), 1);
        assert_eq!(ctx.pending_deferred(), 0);
    }

    #[test]
    fn panicking_callback_is_contained() {
        let fake = FakeMenuModule::install();
        let ctx = fake.context();
        let menu = menu_in(&ctx, "Panics");
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let item = menu
            .add_item_with_callback("boom", ItemStyleFlags::DEFAULT, move |_, _| {
                counter.set(counter.get() + 1);
                panic!("callback failure");
            })
            .unwrap();

        assert!(fake.select(menu.handle(), 0, item));
        assert!(fake.select(menu.handle(), 0, item));
        assert_eq!(calls.get(), 2);
        assert!(!ctx.is_dispatching(&menu));
        assert_eq!(ctx.callback_count(), 1);
    }

    #[test]
    fn raw_item_passes_handler_through() {
        thread_local! {
            static RAW_HITS: Cell<i32> = const { Cell::new(0) };
        }
        unsafe extern "C" fn raw_handler(
            _menu: NativeHandle,
            _slot: PlayerSlot,
            item: i32,
            _item_on_page: u8,
            data: *mut c_void,
        ) {
            RAW_HITS.with(|h| h.set(item + data as usize as i32));
        }

        let fake = FakeMenuModule::install();
        let ctx = fake.context();
        let menu = menu_in(&ctx, "Raw");
        let item = unsafe {
            menu.add_raw_item("raw", ItemStyleFlags::DEFAULT, Some(raw_handler), 100 as *mut c_void)
        }
        .unwrap();
        assert!(fake.select(menu.handle(), 0, item));
        assert_eq!(RAW_HITS.with(Cell::get), 100 + item);
        assert_eq!(ctx.callback_count(), 0);
    }
}
