//! What a fired action does. Effects are plain data, built by the const
//! factories below and executed by the engine; they never hold engine
//! state.

use embassy_time::Duration;

use crate::keycode::ModifierCombination;
use crate::mode::Mode;

#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect<'a> {
    /// Press the chosen variant and leave it held.
    Press(u8),
    /// Release the chosen variant.
    Release(u8),
    /// Tap the chosen variant with extra modifiers folded in. The release
    /// goes out on the next scheduler tick. With `wrap_interrupt`, an
    /// interrupting key is re-tapped with the same modifiers instead of
    /// passing through untouched.
    Tap {
        variant: u8,
        modifiers: ModifierCombination,
        wrap_interrupt: bool,
    },
    /// Tap the interrupting key with the given modifiers applied; used for
    /// "hold this key to modify whatever interrupts it".
    ModInterrupt { modifiers: ModifierCombination },
    /// Run `steps` in order with a fixed delay between them. The remaining
    /// steps are abandoned once any event kind in `abort_on` has been seen
    /// on the owning key.
    Sequence {
        steps: &'a [Effect<'a>],
        step_delay: Duration,
        abort_on: Mode,
    },
}

pub const fn press(variant: u8) -> Effect<'static> {
    Effect::Press(variant)
}

pub const fn release(variant: u8) -> Effect<'static> {
    Effect::Release(variant)
}

pub const fn tap(variant: u8) -> Effect<'static> {
    Effect::Tap {
        variant,
        modifiers: ModifierCombination::new(),
        wrap_interrupt: false,
    }
}

pub const fn tap_with(variant: u8, modifiers: ModifierCombination) -> Effect<'static> {
    Effect::Tap {
        variant,
        modifiers,
        wrap_interrupt: false,
    }
}

pub const fn tap_wrapping(variant: u8, modifiers: ModifierCombination) -> Effect<'static> {
    Effect::Tap {
        variant,
        modifiers,
        wrap_interrupt: true,
    }
}

pub const fn mod_interrupt(modifiers: ModifierCombination) -> Effect<'static> {
    Effect::ModInterrupt { modifiers }
}

pub const fn sequence<'a>(
    steps: &'a [Effect<'a>],
    step_delay: Duration,
    abort_on: Mode,
) -> Effect<'a> {
    Effect::Sequence {
        steps,
        step_delay,
        abort_on,
    }
}
