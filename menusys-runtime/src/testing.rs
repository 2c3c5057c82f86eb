// In-process stand-in for the native menu module.
//
// Every object is a real "function-table pointer + data" block whose table is
// filled with `extern "C"` functions from this file, so facades, binder and
// trampolines run through the same raw-pointer paths as with the shipped
// module. State is thread-local; `FakeMenuModule::install` resets it.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ffi::{c_char, c_void, CStr, CString};
use std::marker::PhantomData;

use menusys_ffi::vtable::{menu, menu_system, player, profile_system};
use menusys_ffi::*;

use crate::context::{ContextBuilder, MenuContext};
use crate::loader::{ExportTable, NativeModule};
use crate::player::PlayerController;

#[repr(C)]
struct FakeObject {
    table: *const *const c_void,
    tag: usize,
}

impl FakeObject {
    fn boxed(table: &[*const c_void], tag: usize) -> Box<Self> {
        Box::new(Self {
            table: table.as_ptr(),
            tag,
        })
    }

    fn handle(&self) -> NativeHandle {
        NativeHandle(self as *const Self as *mut c_void)
    }
}

struct FakeItem {
    content: CString,
    style: ItemStyleFlags,
    handler: Option<ItemSelectCallback>,
    data: *mut c_void,
}

struct FakeMenu {
    object: Box<FakeObject>,
    profile: NativeHandle,
    title: CString,
    items: Vec<FakeItem>,
    controls: ItemControlFlags,
    positions: HashMap<i32, i32>,
    closed: bool,
}

struct FakePlayer {
    object: Box<FakeObject>,
    controller: NativeHandle,
    bot: bool,
}

struct FakeState {
    // Only referenced through the objects' table pointers.
    _system_table: Vec<*const c_void>,
    _profile_system_table: Vec<*const c_void>,
    menu_table: Vec<*const c_void>,
    player_table: Vec<*const c_void>,
    system: Box<FakeObject>,
    profile_system: Box<FakeObject>,
    allocator: Box<FakeObject>,
    profiles: Vec<(String, Box<FakeObject>)>,
    menus: Vec<FakeMenu>,
    players: HashMap<i32, FakePlayer>,
    active: HashMap<i32, NativeHandle>,
    refused: HashSet<i32>,
    reject_items: bool,
    fail_create: bool,
    calls: usize,
}

thread_local! {
    static STATE: RefCell<Option<FakeState>> = const { RefCell::new(None) };
}

/// Run `f` on the installed state, counting one native call.
fn native<R>(default: R, f: impl FnOnce(&mut FakeState) -> R) -> R {
    STATE.with_borrow_mut(|state| match state.as_mut() {
        Some(state) => {
            state.calls += 1;
            f(state)
        }
        None => default,
    })
}

fn inspect<R>(f: impl FnOnce(&FakeState) -> R) -> Option<R> {
    STATE.with_borrow(|state| state.as_ref().map(f))
}

impl FakeState {
    fn new() -> Self {
        let mut system_table = vec![std::ptr::null(); menu_system::CLOSE_INSTANCE + 1];
        system_table[menu_system::GET_PLAYER] =
            fake_get_player as menu_system::GetPlayerFn as *const c_void;
        system_table[menu_system::GET_PROFILES] =
            fake_get_profiles as menu_system::GetProfilesFn as *const c_void;
        system_table[menu_system::CREATE_INSTANCE] =
            fake_create_instance as menu_system::CreateInstanceFn as *const c_void;
        system_table[menu_system::DISPLAY_INSTANCE_TO_PLAYER] =
            fake_display_instance as menu_system::DisplayInstanceToPlayerFn as *const c_void;
        system_table[menu_system::CLOSE_INSTANCE] =
            fake_close_instance as menu_system::CloseInstanceFn as *const c_void;

        let profile_system_table = vec![
            fake_get_profile as profile_system::GetProfileFn as *const c_void,
            fake_add_or_replace_profile as profile_system::AddOrReplaceProfileFn as *const c_void,
            fake_get_allocator as profile_system::GetEntityKeyValuesAllocatorFn as *const c_void,
        ];

        let mut menu_table = vec![std::ptr::null(); menu::GET_CURRENT_POSITION + 1];
        menu_table[menu::GET_PROFILE] = fake_menu_profile as menu::GetProfileFn as *const c_void;
        menu_table[menu::APPLY_PROFILE] =
            fake_menu_apply_profile as menu::ApplyProfileFn as *const c_void;
        menu_table[menu::GET_HANDLER] = fake_menu_handler as menu::GetHandlerFn as *const c_void;
        menu_table[menu::GET_CURRENT_POSITION] =
            fake_menu_position as menu::GetCurrentPositionFn as *const c_void;

        let player_table =
            vec![fake_active_menu_index as player::GetActiveMenuIndexFn as *const c_void];

        // The objects point into the tables' heap buffers, which never move.
        let system = FakeObject::boxed(&system_table, 0);
        let profile_system = FakeObject::boxed(&profile_system_table, 0);
        let allocator = FakeObject::boxed(&[], 0);
        let default_profile = FakeObject::boxed(&[], 0);

        Self {
            _system_table: system_table,
            _profile_system_table: profile_system_table,
            menu_table,
            player_table,
            system,
            profile_system,
            allocator,
            profiles: vec![("default".to_string(), default_profile)],
            menus: Vec::new(),
            players: HashMap::new(),
            active: HashMap::new(),
            refused: HashSet::new(),
            reject_items: false,
            fail_create: false,
            calls: 0,
        }
    }

    fn menu(&mut self, handle: NativeHandle) -> Option<&mut FakeMenu> {
        self.menus.iter_mut().find(|m| m.object.handle() == handle)
    }

    fn open_menu(&mut self, handle: NativeHandle) -> Option<&mut FakeMenu> {
        self.menu(handle).filter(|m| !m.closed)
    }

    fn add_profile(&mut self, name: &str) -> NativeHandle {
        let object = FakeObject::boxed(&[], self.profiles.len());
        let handle = object.handle();
        self.profiles.retain(|(n, _)| n != name);
        self.profiles.push((name.to_string(), object));
        handle
    }
}

// ---------------------------------------------------------------------------
// Exports
// ---------------------------------------------------------------------------

unsafe extern "C" fn fake_menu_system() -> NativeHandle {
    native(NativeHandle::NULL, |s| s.system.handle())
}

unsafe extern "C" fn fake_add_item(
    menu: NativeHandle,
    style: ItemStyleFlags,
    content: *const c_char,
    handler: Option<ItemSelectCallback>,
    data: *mut c_void,
) -> i32 {
    let content = unsafe { CStr::from_ptr(content) }.to_owned();
    native(MENU_INVALID_INDEX, |s| {
        if s.reject_items {
            return MENU_INVALID_INDEX;
        }
        match s.open_menu(menu) {
            Some(m) => {
                m.items.push(FakeItem {
                    content,
                    style,
                    handler,
                    data,
                });
                m.items.len() as i32 - 1
            }
            None => MENU_INVALID_INDEX,
        }
    })
}

unsafe extern "C" fn fake_remove_item(menu: NativeHandle, item: i32) {
    native((), |s| {
        if let Some(m) = s.open_menu(menu) {
            if item >= 0 && (item as usize) < m.items.len() {
                m.items.remove(item as usize);
            }
        }
    })
}

unsafe extern "C" fn fake_get_title(menu: NativeHandle) -> *const c_char {
    native(std::ptr::null(), |s| s.menu(menu).map_or(std::ptr::null(), |m| m.title.as_ptr()))
}

unsafe extern "C" fn fake_set_title(menu: NativeHandle, title: *const c_char) {
    let title = unsafe { CStr::from_ptr(title) }.to_owned();
    native((), |s| {
        if let Some(m) = s.open_menu(menu) {
            m.title = title;
        }
    })
}

unsafe extern "C" fn fake_get_item_styles(menu: NativeHandle, item: i32) -> ItemStyleFlags {
    native(ItemStyleFlags::DISABLED, |s| {
        s.menu(menu)
            .and_then(|m| m.items.get(item as usize))
            .map_or(ItemStyleFlags::DISABLED, |i| i.style)
    })
}

unsafe extern "C" fn fake_get_item_content(menu: NativeHandle, item: i32) -> *const c_char {
    native(std::ptr::null(), |s| {
        s.menu(menu)
            .and_then(|m| m.items.get(item as usize))
            .map_or(std::ptr::null(), |i| i.content.as_ptr())
    })
}

unsafe extern "C" fn fake_get_item_controls(menu: NativeHandle) -> ItemControlFlags {
    native(ItemControlFlags::PANEL, |s| {
        s.menu(menu).map_or(ItemControlFlags::PANEL, |m| m.controls)
    })
}

unsafe extern "C" fn fake_set_item_controls(menu: NativeHandle, controls: ItemControlFlags) {
    native((), |s| {
        if let Some(m) = s.open_menu(menu) {
            m.controls = controls;
        }
    })
}

unsafe extern "C" fn fake_get_current_position(menu: NativeHandle, slot: PlayerSlot) -> i32 {
    native(MENU_INVALID_INDEX, |s| {
        s.menu(menu)
            .and_then(|m| m.positions.get(&slot.get()).copied())
            .unwrap_or(MENU_INVALID_INDEX)
    })
}

unsafe extern "C" fn fake_get_player_active_menu(
    _system: NativeHandle,
    slot: PlayerSlot,
) -> NativeHandle {
    native(NativeHandle::NULL, |s| {
        s.active.get(&slot.get()).copied().unwrap_or(NativeHandle::NULL)
    })
}

// ---------------------------------------------------------------------------
// Menu system slots
// ---------------------------------------------------------------------------

unsafe extern "C" fn fake_get_player(_this: NativeHandle, slot: PlayerSlot) -> NativeHandle {
    native(NativeHandle::NULL, |s| {
        s.players.get(&slot.get()).map_or(NativeHandle::NULL, |p| p.object.handle())
    })
}

unsafe extern "C" fn fake_get_profiles(_this: NativeHandle) -> NativeHandle {
    native(NativeHandle::NULL, |s| s.profile_system.handle())
}

unsafe extern "C" fn fake_create_instance(
    _this: NativeHandle,
    profile: NativeHandle,
    _handler: NativeHandle,
) -> NativeHandle {
    native(NativeHandle::NULL, |s| {
        if s.fail_create {
            return NativeHandle::NULL;
        }
        let object = FakeObject::boxed(&s.menu_table, s.menus.len());
        let handle = object.handle();
        s.menus.push(FakeMenu {
            object,
            profile,
            title: CString::default(),
            items: Vec::new(),
            controls: ItemControlFlags::PANEL,
            positions: HashMap::new(),
            closed: false,
        });
        handle
    })
}

unsafe extern "C" fn fake_display_instance(
    _this: NativeHandle,
    menu: NativeHandle,
    slot: PlayerSlot,
    start_item: i32,
    _display_time: i32,
) -> bool {
    native(false, |s| {
        if !s.players.contains_key(&slot.get()) || s.refused.contains(&slot.get()) {
            return false;
        }
        let Some(m) = s.open_menu(menu) else {
            return false;
        };
        m.positions.insert(slot.get(), start_item);
        s.active.insert(slot.get(), menu);
        true
    })
}

unsafe extern "C" fn fake_close_instance(_this: NativeHandle, menu: NativeHandle) -> bool {
    native(false, |s| {
        let Some(m) = s.open_menu(menu) else {
            return false;
        };
        m.closed = true;
        s.active.retain(|_, active| *active != menu);
        true
    })
}

// ---------------------------------------------------------------------------
// Profile system slots
// ---------------------------------------------------------------------------

unsafe extern "C" fn fake_get_profile(_this: NativeHandle, name: *const c_char) -> NativeHandle {
    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned();
    native(NativeHandle::NULL, |s| {
        s.profiles
            .iter()
            .find(|(n, _)| *n == name)
            .map_or(NativeHandle::NULL, |(_, p)| p.handle())
    })
}

unsafe extern "C" fn fake_add_or_replace_profile(
    _this: NativeHandle,
    name: *const c_char,
    _data: *mut c_void,
) {
    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned();
    native((), |s| {
        s.add_profile(&name);
    })
}

unsafe extern "C" fn fake_get_allocator(_this: NativeHandle) -> NativeHandle {
    native(NativeHandle::NULL, |s| s.allocator.handle())
}

// ---------------------------------------------------------------------------
// Menu and player slots
// ---------------------------------------------------------------------------

unsafe extern "C" fn fake_menu_profile(this: NativeHandle) -> NativeHandle {
    native(NativeHandle::NULL, |s| s.menu(this).map_or(NativeHandle::NULL, |m| m.profile))
}

unsafe extern "C" fn fake_menu_apply_profile(
    this: NativeHandle,
    slot: PlayerSlot,
    profile: NativeHandle,
) -> bool {
    native(false, |s| {
        let has_player = s.players.contains_key(&slot.get());
        match s.open_menu(this) {
            Some(m) if has_player && !profile.is_null() => {
                m.profile = profile;
                true
            }
            _ => false,
        }
    })
}

unsafe extern "C" fn fake_menu_handler(_this: NativeHandle) -> NativeHandle {
    native(NativeHandle::NULL, |_| NativeHandle::NULL)
}

unsafe extern "C" fn fake_menu_position(this: NativeHandle, slot: PlayerSlot) -> i32 {
    unsafe { fake_get_current_position(this, slot) }
}

unsafe extern "C" fn fake_active_menu_index(this: NativeHandle) -> i32 {
    let slot = unsafe { (*(this.as_ptr() as *const FakeObject)).tag } as i32;
    native(MENU_INVALID_INDEX, |s| {
        if s.active.contains_key(&slot) { 0 } else { MENU_INVALID_INDEX }
    })
}

// ---------------------------------------------------------------------------
// Test-side handle
// ---------------------------------------------------------------------------

/// Handle to the fake module installed on the current thread.
pub struct FakeMenuModule {
    _not_send: PhantomData<*const ()>,
}

impl FakeMenuModule {
    /// Install a fresh fake on this thread with a single "default" profile
    /// and no players. Handles from a previous install become dangling.
    pub fn install() -> Self {
        STATE.with_borrow_mut(|state| *state = Some(FakeState::new()));
        Self {
            _not_send: PhantomData,
        }
    }

    /// Every export resolved.
    pub fn exports(&self) -> ExportTable {
        ExportTable {
            menu_system: Some(fake_menu_system),
            add_item: Some(fake_add_item),
            remove_item: Some(fake_remove_item),
            get_title: Some(fake_get_title),
            set_title: Some(fake_set_title),
            get_item_styles: Some(fake_get_item_styles),
            get_item_content: Some(fake_get_item_content),
            get_item_controls: Some(fake_get_item_controls),
            set_item_controls: Some(fake_set_item_controls),
            get_current_position: Some(fake_get_current_position),
            get_player_active_menu: Some(fake_get_player_active_menu),
        }
    }

    pub fn native_module(&self) -> NativeModule {
        NativeModule::from_exports(self.exports())
    }

    /// Builder wired to this fake's module and players.
    pub fn context_builder(&self) -> ContextBuilder {
        MenuContext::builder()
            .module(self.native_module())
            .players(fake_player_lookup)
    }

    pub fn context(&self) -> MenuContext {
        self.context_builder().build()
    }

    pub fn system_handle(&self) -> NativeHandle {
        inspect(|s| s.system.handle()).unwrap_or_default()
    }

    /// Connect a human player at `slot`.
    pub fn add_player(&self, slot: i32) -> PlayerController {
        self.connect(slot, false)
    }

    pub fn add_bot(&self, slot: i32) -> PlayerController {
        self.connect(slot, true)
    }

    fn connect(&self, slot: i32, bot: bool) -> PlayerController {
        let controller = NativeHandle::from_addr(0x1000 + slot as usize * 0x10);
        STATE.with_borrow_mut(|state| {
            if let Some(s) = state.as_mut() {
                let object = FakeObject::boxed(&s.player_table, slot as usize);
                s.players.insert(slot, FakePlayer { object, controller, bot });
            }
        });
        PlayerController::new(slot, controller).with_bot(bot)
    }

    /// Disconnect `slot`; its active menu is forgotten.
    pub fn remove_player(&self, slot: i32) {
        STATE.with_borrow_mut(|state| {
            if let Some(s) = state.as_mut() {
                s.players.remove(&slot);
                s.active.remove(&slot);
            }
        });
    }

    pub fn add_profile(&self, name: &str) -> NativeHandle {
        STATE.with_borrow_mut(|state| state.as_mut().map(|s| s.add_profile(name)))
            .unwrap_or_default()
    }

    pub fn profile_system_handle(&self) -> NativeHandle {
        inspect(|s| s.profile_system.handle()).unwrap_or_default()
    }

    pub fn allocator_handle(&self) -> NativeHandle {
        inspect(|s| s.allocator.handle()).unwrap_or_default()
    }

    /// Make display to `slot` fail.
    pub fn refuse_display(&self, slot: i32) {
        STATE.with_borrow_mut(|state| {
            if let Some(s) = state.as_mut() {
                s.refused.insert(slot);
            }
        });
    }

    /// Make `Menu_AddItem` return a negative position.
    pub fn reject_items(&self, reject: bool) {
        STATE.with_borrow_mut(|state| {
            if let Some(s) = state.as_mut() {
                s.reject_items = reject;
            }
        });
    }

    /// Make `createInstance` return null.
    pub fn fail_create(&self, fail: bool) {
        STATE.with_borrow_mut(|state| {
            if let Some(s) = state.as_mut() {
                s.fail_create = fail;
            }
        });
    }

    /// Number of native entry points entered so far.
    pub fn native_calls(&self) -> usize {
        inspect(|s| s.calls).unwrap_or(0)
    }

    /// Simulate `slot` selecting `item` of `menu`: the stored native handler
    /// is called with its user data, as the real module does. Returns false
    /// when the item has no handler.
    pub fn select(&self, menu: NativeHandle, slot: i32, item: i32) -> bool {
        let target = inspect(|s| {
            s.menus
                .iter()
                .find(|m| m.object.handle() == menu)
                .and_then(|m| m.items.get(item as usize))
                .and_then(|i| i.handler.map(|h| (h, i.data)))
        })
        .flatten();
        match target {
            Some((handler, data)) => {
                let item_on_page = (item % 6) as u8;
                unsafe { handler(menu, PlayerSlot(slot), item, item_on_page, data) };
                true
            }
            None => false,
        }
    }

    /// The user data stored with `item` of `menu`.
    pub fn item_user_data(&self, menu: NativeHandle, item: i32) -> Option<*mut c_void> {
        inspect(|s| {
            s.menus
                .iter()
                .find(|m| m.object.handle() == menu)
                .and_then(|m| m.items.get(item as usize))
                .map(|i| i.data)
        })
        .flatten()
    }

    pub fn is_closed(&self, menu: NativeHandle) -> bool {
        inspect(|s| s.menus.iter().any(|m| m.object.handle() == menu && m.closed)).unwrap_or(false)
    }

    pub fn item_count(&self, menu: NativeHandle) -> usize {
        inspect(|s| {
            s.menus
                .iter()
                .find(|m| m.object.handle() == menu)
                .map_or(0, |m| m.items.len())
        })
        .unwrap_or(0)
    }

    pub fn menus_created(&self) -> usize {
        inspect(|s| s.menus.len()).unwrap_or(0)
    }
}

/// `PlayerLookup` over the fake's connected players.
pub fn fake_player_lookup(slot: PlayerSlot) -> Option<PlayerController> {
    inspect(|s| {
        s.players
            .get(&slot.get())
            .map(|p| PlayerController::new(slot, p.controller).with_bot(p.bot))
    })
    .flatten()
}
