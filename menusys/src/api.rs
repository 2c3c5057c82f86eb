// Public menu API: the only types plugins see.
//
// Internal wrappers never cross this boundary; every result is re-wrapped in
// `MenuHandle`. The implementation is published through a per-thread
// rendezvous (`register_implementation` / `instance`), since the menu system
// lives on the host's main thread.

use std::cell::RefCell;
use std::fmt;
use std::ops::BitOr;
use std::rc::Rc;

use menusys_ffi::{ItemStyleFlags, PlayerSlot};
use menusys_runtime::{Menu, MenuError, PlayerController};
use thiserror::Error;

/// Version of this API surface. Bumped on any breaking change to
/// `MenuSystemApi` or `MenuHandle`.
pub const API_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("menu system is not available")]
    Unavailable,

    #[error("menu has been closed")]
    Disposed,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid handle: {0}")]
    InvalidHandle(String),
}

impl From<MenuError> for ApiError {
    fn from(err: MenuError) -> Self {
        match err {
            MenuError::Unavailable
            | MenuError::Unsupported(_)
            | MenuError::NativeCallFailed(_)
            | MenuError::Load(_) => ApiError::Unavailable,
            MenuError::Disposed => ApiError::Disposed,
            MenuError::InvalidHandle(what) => ApiError::InvalidHandle(what.to_string()),
            MenuError::ProfileNotFound(name) => {
                ApiError::InvalidArgument(format!("menu profile '{name}' not found"))
            }
            MenuError::InvalidArgument(msg) => ApiError::InvalidArgument(msg),
            MenuError::TokensExhausted => {
                ApiError::InvalidArgument("callback token space exhausted".to_string())
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Style of a menu item.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MenuItemStyle(u8);

impl MenuItemStyle {
    pub const DISABLED: Self = Self(0);
    pub const ACTIVE: Self = Self(1);
    pub const HAS_NUMBER: Self = Self(2);
    pub const CONTROL: Self = Self(4);
    pub const DEFAULT: Self = Self(Self::ACTIVE.0 | Self::HAS_NUMBER.0);
    pub const FULL: Self = Self(Self::DEFAULT.0 | Self::CONTROL.0);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for MenuItemStyle {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitOr for MenuItemStyle {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<MenuItemStyle> for ItemStyleFlags {
    fn from(style: MenuItemStyle) -> Self {
        ItemStyleFlags::from_bits(style.0)
    }
}

impl fmt::Debug for MenuItemStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MenuItemStyle({:#x})", self.0)
    }
}

/// Passed to an item callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MenuItemSelection {
    /// The selecting player, if the host still knows the slot.
    pub player: Option<PlayerController>,
    pub item_index: i32,
}

/// A menu created through the API.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MenuHandle {
    menu: Menu,
}

impl MenuHandle {
    pub(crate) fn new(menu: Menu) -> Self {
        Self { menu }
    }

    pub(crate) fn menu(&self) -> &Menu {
        &self.menu
    }

    pub fn title(&self) -> ApiResult<String> {
        Ok(self.menu.title()?)
    }

    pub fn set_title(&self, title: &str) -> ApiResult<()> {
        Ok(self.menu.set_title(title)?)
    }

    pub fn add_item(&self, content: &str, style: MenuItemStyle) -> ApiResult<i32> {
        Ok(self.menu.add_item(content, style.into())?)
    }

    /// Add an item whose selection calls `callback`, for as long as the menu
    /// stays open.
    pub fn add_item_with_callback(
        &self,
        content: &str,
        style: MenuItemStyle,
        mut callback: impl FnMut(&MenuHandle, &MenuItemSelection) + 'static,
    ) -> ApiResult<i32> {
        let position = self.menu.add_item_with_callback(content, style.into(), move |menu, sel| {
            let handle = MenuHandle::new(menu.clone());
            callback(
                &handle,
                &MenuItemSelection {
                    player: sel.player,
                    item_index: sel.item,
                },
            );
        })?;
        Ok(position)
    }

    /// The item position the player in `slot` is viewing.
    pub fn current_position(&self, slot: i32) -> ApiResult<i32> {
        Ok(self.menu.current_position(PlayerSlot(slot))?)
    }

    /// True once the menu was closed; every other call then fails with
    /// `ApiError::Disposed`.
    pub fn is_closed(&self) -> bool {
        !self.menu.state().is_live()
    }
}

/// The menu system as seen by plugins.
pub trait MenuSystemApi {
    fn api_version(&self) -> u32 {
        API_VERSION
    }

    fn is_available(&self) -> bool;

    /// Create a menu with the configured default profile.
    fn create_menu(&self, title: &str) -> ApiResult<MenuHandle>;

    fn create_menu_with_profile(&self, title: &str, profile: &str) -> ApiResult<MenuHandle>;

    /// Show `menu` to `player`. Usual arguments are `start_item = 0` and
    /// `display_time = 0` (no timeout). False for invalid or bot players,
    /// for a closed menu and whenever the module refuses; check
    /// [`MenuHandle::is_closed`] to tell a closed menu apart.
    fn display_menu(
        &self,
        menu: &MenuHandle,
        player: &PlayerController,
        start_item: i32,
        display_time: i32,
    ) -> bool;

    /// Close `menu`. False when the module refuses or the menu is already
    /// closed.
    fn close_menu(&self, menu: &MenuHandle) -> bool;

    /// Index of the menu `player` is viewing, `-1` for none.
    fn active_menu_index(&self, player: &PlayerController) -> i32;

    fn active_menu(&self, player: &PlayerController) -> Option<MenuHandle>;
}

// ---------------------------------------------------------------------------
// Rendezvous
// ---------------------------------------------------------------------------

thread_local! {
    static INSTANCE: RefCell<Option<Rc<dyn MenuSystemApi>>> = const { RefCell::new(None) };
}

/// Publish `api` as the implementation plugins get from [`instance`].
pub fn register_implementation(api: Rc<dyn MenuSystemApi>) {
    INSTANCE.with_borrow_mut(|slot| *slot = Some(api));
}

/// Withdraw `api` if it is the published implementation.
pub fn unregister_implementation(api: &Rc<dyn MenuSystemApi>) -> bool {
    INSTANCE
        .try_with(|slot| {
            let mut slot = slot.borrow_mut();
            let ours = slot.as_ref().is_some_and(|current| Rc::ptr_eq(current, api));
            if ours {
                *slot = None;
            }
            ours
        })
        .unwrap_or(false)
}

/// The published implementation, if a bridge is loaded.
pub fn instance() -> Option<Rc<dyn MenuSystemApi>> {
    INSTANCE.with_borrow(|slot| slot.clone())
}

/// True when an implementation is published and its module is usable.
pub fn is_available() -> bool {
    instance().is_some_and(|api| api.is_available())
}
