//! Stock action recipes for common flex key behaviors.

use embassy_time::Duration;

use crate::action::Action;
use crate::effect;
use crate::keycode::{Key, KeyCode, ModifierCombination, SHIFT};
use crate::mode;

/// Both shift keys; the usual ignore set for shift-flavored recipes.
pub const SHIFT_KEYS: &[Key] = &[Key::new(KeyCode::LShift), Key::new(KeyCode::RShift)];

/// Sticky key: while held, the next interrupting press is re-tapped with
/// the chosen variant held around it. Retires on its own timeout.
pub const fn one_shot<'a>(
    variant: u8,
    timeout: Duration,
    interrupt_ignore: &'a [Key],
    interrupt_requires: &'a [Key],
) -> Action<'a> {
    Action::new(mode::INTERRUPT, effect::tap_wrapping(variant, ModifierCombination::new()))
        .with_timeout(timeout)
        .with_stop_on(mode::INTERRUPT.union(mode::TIMEOUT))
        .with_interrupt_ignore(interrupt_ignore)
        .with_interrupt_requires(interrupt_requires)
}

/// Tap the variant when the key is released (or interrupted) inside the
/// tap window; anything slower or later is someone else's business.
pub const fn tap_on_release<'a>(
    variant: u8,
    tap_time: Duration,
    modifiers: ModifierCombination,
    ignore: &'a [Key],
) -> Action<'a> {
    Action::new(
        mode::RELEASE.union(mode::INTERRUPT),
        effect::tap_with(variant, modifiers),
    )
    .with_timeout(tap_time)
    .with_stop_on(mode::INTERRUPT.union(mode::RELEASE).union(mode::TIMEOUT))
    .with_ignore(ignore)
    .with_interrupt_ignore(ignore)
}

/// Hold long enough and the variant is tapped with extra modifiers; an
/// interrupting key calls the hold off.
pub const fn hold_auto_mod<'a>(
    variant: u8,
    modifiers: ModifierCombination,
    after: Duration,
    timeout: Duration,
    ignore: &'a [Key],
) -> Action<'a> {
    Action::new(
        mode::TIMEOUT.union(mode::RELEASE),
        effect::tap_with(variant, modifiers),
    )
    .with_after(after)
    .with_timeout(timeout)
    .with_stop_on(mode::INTERRUPT.union(mode::RELEASE))
    .with_ignore(ignore)
}

/// Hold for an automatic shifted tap.
pub const fn auto_shift(variant: u8, timeout: Duration) -> Action<'static> {
    hold_auto_mod(
        variant,
        SHIFT,
        Duration::from_millis(0),
        timeout,
        SHIFT_KEYS,
    )
}

/// Hold this key to modify whatever key interrupts it.
pub const fn mod_interrupt<'a>(
    modifiers: ModifierCombination,
    after: Duration,
    interrupt_ignore: &'a [Key],
) -> Action<'a> {
    Action::new(mode::INTERRUPT, effect::mod_interrupt(modifiers))
        .with_after(after)
        .with_stop_on(mode::RELEASE)
        .with_interrupt_ignore(interrupt_ignore)
}

/// The classic home-row-mod pair: quick release taps the plain variant,
/// holding past the tap window taps it with `modifiers`.
pub const fn home_row_actions<'a>(
    tap_time: Duration,
    hold_timeout: Duration,
    modifiers: ModifierCombination,
    ignore: &'a [Key],
) -> [Action<'a>; 2] {
    [
        tap_on_release(0, tap_time, ModifierCombination::new(), &[]),
        hold_auto_mod(0, modifiers, tap_time, hold_timeout, ignore),
    ]
}
