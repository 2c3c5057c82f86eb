// Bit-flag newtypes shared with the native module. Widths are fixed by the ABI:
// item styles travel as a byte, item controls as a 32-bit int.

macro_rules! define_flags {
    (
        $(#[$meta:meta])*
        $name:ident: $repr:ty {
            $( $(#[$fmeta:meta])* const $flag:ident = $value:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub $repr);

        impl $name {
            $( $(#[$fmeta])* pub const $flag: $name = $name($value); )*

            #[inline]
            pub const fn bits(self) -> $repr {
                self.0
            }

            #[inline]
            pub const fn from_bits(bits: $repr) -> Self {
                $name(bits)
            }

            /// True if every bit of `other` is set in `self`.
            #[inline]
            pub const fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            #[inline]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            #[inline]
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            #[inline]
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }

        impl std::ops::BitAnd for $name {
            type Output = $name;
            #[inline]
            fn bitand(self, rhs: $name) -> $name {
                $name(self.0 & rhs.0)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.0)
            }
        }
    };
}

define_flags! {
    /// Per-item style flags (`Menu_AddItem` / `Menu_GetItemStyles`).
    ItemStyleFlags: u8 {
        /// Item is shown but cannot be selected.
        const DISABLED = 0;
        /// Item can be selected.
        const ACTIVE = 1 << 0;
        /// Item is prefixed with its number.
        const HAS_NUMBER = 1 << 1;
        /// Item is a control (back/next/exit) item.
        const CONTROL = 1 << 2;
        const DEFAULT = (1 << 0) | (1 << 1);
        const FULL = (1 << 0) | (1 << 1) | (1 << 2);
    }
}

define_flags! {
    /// Control buttons rendered by a menu (`Menu_GetItemControls` / `Menu_SetItemControls`).
    ItemControlFlags: i32 {
        const PANEL = 0;
        const BACK = 1 << 0;
        const NEXT = 1 << 1;
        const EXIT = 1 << 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_styles_match_components() {
        assert_eq!(ItemStyleFlags::DEFAULT, ItemStyleFlags::ACTIVE | ItemStyleFlags::HAS_NUMBER);
        assert_eq!(ItemStyleFlags::FULL, ItemStyleFlags::DEFAULT | ItemStyleFlags::CONTROL);
        assert!(ItemStyleFlags::FULL.contains(ItemStyleFlags::CONTROL));
        assert!(!ItemStyleFlags::DEFAULT.contains(ItemStyleFlags::CONTROL));
        assert!(ItemStyleFlags::DISABLED.is_empty());
    }

    #[test]
    fn control_flags_combine() {
        let mut controls = ItemControlFlags::BACK;
        controls |= ItemControlFlags::EXIT;
        assert_eq!(controls.bits(), 0b101);
        assert!(controls.contains(ItemControlFlags::EXIT));
        assert!(!controls.contains(ItemControlFlags::NEXT));
        assert_eq!(format!("{controls:?}"), "ItemControlFlags(0x5)");
    }
}
