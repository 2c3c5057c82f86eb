// Player lookup: the host's player model seen through a narrow trait.

use menusys_ffi::{NativeHandle, PlayerSlot};

/// A host player as the bridge needs to see it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerController {
    slot: PlayerSlot,
    handle: NativeHandle,
    bot: bool,
}

impl PlayerController {
    pub fn new(slot: impl Into<PlayerSlot>, handle: NativeHandle) -> Self {
        Self {
            slot: slot.into(),
            handle,
            bot: false,
        }
    }

    pub fn with_bot(mut self, bot: bool) -> Self {
        self.bot = bot;
        self
    }

    #[inline]
    pub fn slot(&self) -> PlayerSlot {
        self.slot
    }

    /// Opaque host-side controller handle.
    #[inline]
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    #[inline]
    pub fn is_bot(&self) -> bool {
        self.bot
    }

    /// True while the host still has an entity behind this controller.
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.handle.is_null()
    }
}

/// Resolves a player slot to the host's player controller.
pub trait PlayerLookup {
    fn player_from_slot(&self, slot: PlayerSlot) -> Option<PlayerController>;
}

impl<F> PlayerLookup for F
where
    F: Fn(PlayerSlot) -> Option<PlayerController>,
{
    fn player_from_slot(&self, slot: PlayerSlot) -> Option<PlayerController> {
        self(slot)
    }
}

/// Lookup for hosts without a player model; every slot is empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPlayers;

impl PlayerLookup for NoPlayers {
    fn player_from_slot(&self, _slot: PlayerSlot) -> Option<PlayerController> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_follows_handle() {
        let gone = PlayerController::new(3, NativeHandle::NULL);
        assert!(!gone.is_valid());
        let bot = PlayerController::new(4, NativeHandle::from_addr(0x10)).with_bot(true);
        assert!(bot.is_valid());
        assert!(bot.is_bot());
        assert_eq!(bot.slot(), PlayerSlot(4));
    }

    #[test]
    fn closures_are_lookups() {
        let lookup = |slot: PlayerSlot| {
            (slot.get() == 1).then(|| PlayerController::new(slot, NativeHandle::from_addr(0x20)))
        };
        assert!(lookup.player_from_slot(PlayerSlot(1)).is_some());
        assert!(lookup.player_from_slot(PlayerSlot(2)).is_none());
        assert!(NoPlayers.player_from_slot(PlayerSlot(1)).is_none());
    }
}
