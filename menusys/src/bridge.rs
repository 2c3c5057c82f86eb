// MenuBridge: the host plugin's side of the API. Owns the runtime context for
// one native module and publishes a `MenuSystemApi` over it.

use std::path::Path;
use std::rc::{Rc, Weak};

use menusys_runtime::{
    BridgeConfig, MenuContext, MenuError, MenuResult, NativeModule, PlayerController, PlayerLookup,
    MENU_INVALID_INDEX,
};
use tracing::{debug, error, info, warn};

use crate::api::{self, ApiError, ApiResult, MenuHandle, MenuSystemApi};

/// Owner of the menu runtime for the lifetime of the host plugin.
///
/// Creating one registers its API implementation; dropping it (or calling
/// [`MenuBridge::unload`]) withdraws the implementation and unloads the native
/// module. API handles plugins kept past that point report `Unavailable`.
pub struct MenuBridge {
    api: Rc<dyn MenuSystemApi>,
    context: Rc<MenuContext>,
}

impl MenuBridge {
    /// Open the module named by `config` under `game_dir` and register the
    /// API. A module that cannot be opened is logged and leaves the API
    /// registered but unavailable.
    pub fn load(
        config: &BridgeConfig,
        game_dir: impl AsRef<Path>,
        players: impl PlayerLookup + 'static,
    ) -> Self {
        let builder = MenuContext::builder().config(config).players(players);
        let builder = match NativeModule::open(config.library_path(game_dir)) {
            Ok(module) => builder.module(module),
            Err(e) => {
                error!("menu system unavailable: {e}");
                builder
            }
        };
        Self::from_context(builder.build())
    }

    /// Register the API over an already built context.
    pub fn from_context(context: MenuContext) -> Self {
        let context = Rc::new(context);
        let api: Rc<dyn MenuSystemApi> = Rc::new(BridgeApi {
            context: Rc::downgrade(&context),
        });
        api::register_implementation(api.clone());
        info!(
            context = context.id(),
            available = context.is_available(),
            version = api::API_VERSION,
            "menu API registered"
        );
        Self { api, context }
    }

    pub fn context(&self) -> &MenuContext {
        &self.context
    }

    /// The implementation this bridge registered.
    pub fn api(&self) -> Rc<dyn MenuSystemApi> {
        self.api.clone()
    }

    /// Frame hook: runs work deferred out of menu callbacks.
    pub fn on_frame(&self) -> usize {
        self.context.run_frame()
    }

    pub fn unload(self) {
        // Drop does the work.
    }
}

impl Drop for MenuBridge {
    fn drop(&mut self) {
        if api::unregister_implementation(&self.api) {
            debug!(context = self.context.id(), "menu API unregistered");
        }
    }
}

struct BridgeApi {
    context: Weak<MenuContext>,
}

impl BridgeApi {
    fn context(&self) -> ApiResult<Rc<MenuContext>> {
        self.context.upgrade().ok_or(ApiError::Unavailable)
    }

    /// The refused-player rule shared by display and the active-menu queries.
    fn accepts(player: &PlayerController) -> bool {
        player.is_valid() && !player.is_bot()
    }

    fn with_context<T>(&self, what: &str, fallback: T, f: impl FnOnce(&MenuContext) -> MenuResult<T>) -> T {
        let Ok(context) = self.context() else {
            return fallback;
        };
        f(context.as_ref()).unwrap_or_else(|e: MenuError| {
            match e {
                MenuError::Disposed => warn!("{what} on a closed menu"),
                e => debug!("{what} failed: {e}"),
            }
            fallback
        })
    }
}

impl MenuSystemApi for BridgeApi {
    fn is_available(&self) -> bool {
        self.context().is_ok_and(|c| c.is_available())
    }

    fn create_menu(&self, title: &str) -> ApiResult<MenuHandle> {
        let context = self.context()?;
        Ok(MenuHandle::new(context.create_titled_menu(title, None)?))
    }

    fn create_menu_with_profile(&self, title: &str, profile: &str) -> ApiResult<MenuHandle> {
        let context = self.context()?;
        Ok(MenuHandle::new(context.create_titled_menu(title, Some(profile))?))
    }

    fn display_menu(
        &self,
        menu: &MenuHandle,
        player: &PlayerController,
        start_item: i32,
        display_time: i32,
    ) -> bool {
        if !Self::accepts(player) {
            return false;
        }
        self.with_context("display menu", false, |c| {
            c.display(menu.menu(), player.slot(), start_item, display_time)
        })
    }

    fn close_menu(&self, menu: &MenuHandle) -> bool {
        self.with_context("close menu", false, |c| c.close(menu.menu()))
    }

    fn active_menu_index(&self, player: &PlayerController) -> i32 {
        if !Self::accepts(player) {
            return MENU_INVALID_INDEX;
        }
        self.with_context("active menu index", MENU_INVALID_INDEX, |c| {
            c.active_menu_index(player.slot())
        })
    }

    fn active_menu(&self, player: &PlayerController) -> Option<MenuHandle> {
        if !Self::accepts(player) {
            return None;
        }
        self.with_context("active menu", None, |c| c.active_menu(player.slot()))
            .map(MenuHandle::new)
    }
}
