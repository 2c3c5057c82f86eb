// Native module loading and export resolution.
//
// Exports are resolved one by one: a missing symbol leaves its entry `None`
// and only the operations that need it report `Unsupported`.

use std::cell::Cell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use libloading::Library;
use menusys_ffi::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{MenuError, MenuResult};

/// Failure to open the native module file.
#[derive(Debug, Error)]
pub enum LoadFailure {
    #[error("native menu module not found at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to open native menu module {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
}

/// Resolved entry points of the native module.
///
/// The function pointers are only valid while the module that produced them
/// stays loaded; the runtime keeps the owning [`NativeModule`] next to every
/// copy it hands out.
#[derive(Clone, Copy, Default)]
pub struct ExportTable {
    pub menu_system: Option<MenuSystemFn>,
    pub add_item: Option<MenuAddItemFn>,
    pub remove_item: Option<MenuRemoveItemFn>,
    pub get_title: Option<MenuGetTitleFn>,
    pub set_title: Option<MenuSetTitleFn>,
    pub get_item_styles: Option<MenuGetItemStylesFn>,
    pub get_item_content: Option<MenuGetItemContentFn>,
    pub get_item_controls: Option<MenuGetItemControlsFn>,
    pub set_item_controls: Option<MenuSetItemControlsFn>,
    pub get_current_position: Option<MenuGetCurrentPositionFn>,
    pub get_player_active_menu: Option<MenuGetPlayerActiveMenuFn>,
}

impl ExportTable {
    /// Resolve every known export from `library`.
    ///
    /// # Safety
    /// Each symbol that is present must have the signature declared in
    /// `menusys_ffi::exports`.
    pub unsafe fn resolve(library: &Library) -> Self {
        unsafe {
            Self {
                menu_system: lookup(library, SYM_MENU_SYSTEM),
                add_item: lookup(library, SYM_MENU_ADD_ITEM),
                remove_item: lookup(library, SYM_MENU_REMOVE_ITEM),
                get_title: lookup(library, SYM_MENU_GET_TITLE),
                set_title: lookup(library, SYM_MENU_SET_TITLE),
                get_item_styles: lookup(library, SYM_MENU_GET_ITEM_STYLES),
                get_item_content: lookup(library, SYM_MENU_GET_ITEM_CONTENT),
                get_item_controls: lookup(library, SYM_MENU_GET_ITEM_CONTROLS),
                set_item_controls: lookup(library, SYM_MENU_SET_ITEM_CONTROLS),
                get_current_position: lookup(library, SYM_MENU_GET_CURRENT_POSITION),
                get_player_active_menu: lookup(library, SYM_MENU_GET_PLAYER_ACTIVE_MENU),
            }
        }
    }

    /// Whether the export named `symbol` was resolved. Unknown names are `false`.
    pub fn has(&self, symbol: &str) -> bool {
        match symbol {
            SYM_MENU_SYSTEM => self.menu_system.is_some(),
            SYM_MENU_ADD_ITEM => self.add_item.is_some(),
            SYM_MENU_REMOVE_ITEM => self.remove_item.is_some(),
            SYM_MENU_GET_TITLE => self.get_title.is_some(),
            SYM_MENU_SET_TITLE => self.set_title.is_some(),
            SYM_MENU_GET_ITEM_STYLES => self.get_item_styles.is_some(),
            SYM_MENU_GET_ITEM_CONTENT => self.get_item_content.is_some(),
            SYM_MENU_GET_ITEM_CONTROLS => self.get_item_controls.is_some(),
            SYM_MENU_SET_ITEM_CONTROLS => self.set_item_controls.is_some(),
            SYM_MENU_GET_CURRENT_POSITION => self.get_current_position.is_some(),
            SYM_MENU_GET_PLAYER_ACTIVE_MENU => self.get_player_active_menu.is_some(),
            _ => false,
        }
    }

    /// Names of the exports that could not be resolved.
    pub fn missing(&self) -> Vec<&'static str> {
        EXPORT_SYMBOLS.iter().copied().filter(|s| !self.has(s)).collect()
    }

    /// Clear the entry named `symbol`. Used to simulate partial modules.
    pub fn without(mut self, symbol: &str) -> Self {
        match symbol {
            SYM_MENU_SYSTEM => self.menu_system = None,
            SYM_MENU_ADD_ITEM => self.add_item = None,
            SYM_MENU_REMOVE_ITEM => self.remove_item = None,
            SYM_MENU_GET_TITLE => self.get_title = None,
            SYM_MENU_SET_TITLE => self.set_title = None,
            SYM_MENU_GET_ITEM_STYLES => self.get_item_styles = None,
            SYM_MENU_GET_ITEM_CONTENT => self.get_item_content = None,
            SYM_MENU_GET_ITEM_CONTROLS => self.get_item_controls = None,
            SYM_MENU_SET_ITEM_CONTROLS => self.set_item_controls = None,
            SYM_MENU_GET_CURRENT_POSITION => self.get_current_position = None,
            SYM_MENU_GET_PLAYER_ACTIVE_MENU => self.get_player_active_menu = None,
            _ => {}
        }
        self
    }
}

impl fmt::Debug for ExportTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for symbol in EXPORT_SYMBOLS {
            map.entry(&symbol, &self.has(symbol));
        }
        map.finish()
    }
}

/// Look up one symbol, logging and returning `None` when it is absent.
unsafe fn lookup<T: Copy>(library: &Library, name: &'static str) -> Option<T> {
    let mut symbol = Vec::with_capacity(name.len() + 1);
    symbol.extend_from_slice(name.as_bytes());
    symbol.push(0);
    // SAFETY: the caller vouches for the signature.
    match unsafe { library.get::<T>(&symbol) } {
        Ok(sym) => Some(*sym),
        Err(e) => {
            warn!(symbol = name, "native export missing: {e}");
            None
        }
    }
}

/// Alive flag shared by every facade created from one module.
///
/// Cleared when the module is dropped; facades check it before each native
/// call instead of touching unloaded code.
#[derive(Clone, Debug)]
pub struct ModuleLease {
    loaded: Rc<Cell<bool>>,
}

impl ModuleLease {
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    /// `Err(Unavailable)` once the module is gone.
    #[inline]
    pub fn check(&self) -> MenuResult<()> {
        if self.loaded.get() {
            Ok(())
        } else {
            Err(MenuError::Unavailable)
        }
    }
}

/// A loaded native module together with its resolved exports.
///
/// Dropping it unloads the library, so it must outlive every use of the
/// export table. Leases handed out by [`NativeModule::lease`] flip to
/// "unloaded" first.
pub struct NativeModule {
    path: Option<PathBuf>,
    exports: ExportTable,
    loaded: Rc<Cell<bool>>,
    _library: Option<Library>,
}

impl NativeModule {
    /// Open the shared library at `path` and resolve its exports.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadFailure> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadFailure::NotFound { path: path.to_path_buf() });
        }
        debug!(path = %path.display(), "opening native menu module");
        // SAFETY: loading runs the module's initialisers; the host trusts the
        // module it was configured with.
        let library = unsafe { Library::new(path) }.map_err(|source| LoadFailure::Open {
            path: path.to_path_buf(),
            source,
        })?;
        // SAFETY: the symbol signatures are the contract in menusys_ffi::exports.
        let exports = unsafe { ExportTable::resolve(&library) };
        let missing = exports.missing();
        info!(
            path = %path.display(),
            resolved = EXPORT_SYMBOLS.len() - missing.len(),
            total = EXPORT_SYMBOLS.len(),
            "native menu module loaded"
        );
        Ok(Self {
            path: Some(path.to_path_buf()),
            exports,
            loaded: Rc::new(Cell::new(true)),
            _library: Some(library),
        })
    }

    /// Wrap an export table whose code is already resident (statically
    /// linked, or an in-process fake).
    pub fn from_exports(exports: ExportTable) -> Self {
        Self {
            path: None,
            exports,
            loaded: Rc::new(Cell::new(true)),
            _library: None,
        }
    }

    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    pub fn lease(&self) -> ModuleLease {
        ModuleLease {
            loaded: self.loaded.clone(),
        }
    }

    /// Path the module was opened from, `None` for resident modules.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for NativeModule {
    fn drop(&mut self) {
        self.loaded.set(false);
        if let Some(path) = &self.path {
            debug!(path = %path.display(), "unloading native menu module");
        }
    }
}

impl fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModule")
            .field("path", &self.path)
            .field("exports", &self.exports)
            .finish()
    }
}
