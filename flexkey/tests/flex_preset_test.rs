pub mod common;

use embassy_time::Duration;
use flexkey::action::{Action, KeyAction};
use flexkey::flex::FlexKey;
use flexkey::keycode::{CTRL, Key, KeyCode, ModifierCombination, SHIFT};
use flexkey::presets::{SHIFT_KEYS, hold_auto_mod, mod_interrupt, one_shot, tap_on_release};
use flexkey::{a, fx, k};

use crate::common::{Harness, KC_LCTRL, KC_LSHIFT};

const TAP_TIME: Duration = Duration::from_millis(20);
const HOLD_TIMEOUT: Duration = Duration::from_millis(100);

// A three-mode key: quick tap types A, long hold types shift-A, and a key
// pressed while it is held comes out ctrl-modified.
static TRIPLE: [Action<'static>; 3] = [
    tap_on_release(0, TAP_TIME, ModifierCombination::new(), &[]),
    hold_auto_mod(0, SHIFT, TAP_TIME, HOLD_TIMEOUT, SHIFT_KEYS),
    mod_interrupt(CTRL, TAP_TIME, &[Key::new(KeyCode::LShift)]),
];
static TRIPLE_KEYS: [FlexKey<'static>; 1] =
    [FlexKey::new("TRI_A", &[Key::new(KeyCode::A)], &TRIPLE)];
static MAP: [[KeyAction; 4]; 1] = [[fx!(0), k!(B), k!(C), a!(No)]];

fn triple_harness() -> Harness<1, 4> {
    Harness::new(&TRIPLE_KEYS, &MAP)
}

#[test]
fn triple_short_tap() {
    let mut h = triple_harness();
    h.run_sequence(&key_sequence![
        [0, 0, true, 10],
        [0, 0, false, 18],
    ]);
    h.settle();
    h.assert_reports(&key_report![
        [0, [kc8!(A), 0, 0, 0, 0, 0]],
        [0, [0, 0, 0, 0, 0, 0]],
    ]);
}

#[test]
fn triple_long_hold_without_interrupt() {
    let mut h = triple_harness();
    h.run_sequence(&key_sequence![
        [0, 0, true, 10],
        [0, 0, false, 120],
    ]);
    h.settle();
    h.assert_reports(&key_report![
        [KC_LSHIFT, [kc8!(A), 0, 0, 0, 0, 0]],
        [0, [0, 0, 0, 0, 0, 0]],
    ]);
}

#[test]
fn triple_interrupted_hold_modifies_the_interrupter() {
    let mut h = triple_harness();
    h.run_sequence(&key_sequence![
        [0, 0, true, 10],
        [0, 1, true, 25], // B arrives once the interrupt action armed
        [0, 1, false, 20],
        [0, 0, false, 95],
    ]);
    h.settle();
    h.assert_reports(&key_report![
        [KC_LCTRL, [kc8!(B), 0, 0, 0, 0, 0]],
        [0, [0, 0, 0, 0, 0, 0]],
    ]);
    assert!(h.engine.is_idle());
}

// The classic auto-mod pair: tap types the letter, holding past the tap
// window types it shifted.
static AUTO_MOD: [Action<'static>; 2] = [
    tap_on_release(0, Duration::from_millis(30), ModifierCombination::new(), &[]),
    hold_auto_mod(
        0,
        SHIFT,
        Duration::from_millis(30),
        Duration::from_millis(100),
        &[],
    ),
];
static AUTO_MOD_KEYS: [FlexKey<'static>; 1] =
    [FlexKey::new("AM_A", &[Key::new(KeyCode::A)], &AUTO_MOD)];

#[test]
fn auto_mod_short_tap() {
    let mut h: Harness<1, 4> = Harness::new(&AUTO_MOD_KEYS, &MAP);
    h.run_sequence(&key_sequence![
        [0, 0, true, 10],
        [0, 0, false, 18],
    ]);
    h.settle();
    h.assert_reports(&key_report![
        [0, [kc8!(A), 0, 0, 0, 0, 0]],
        [0, [0, 0, 0, 0, 0, 0]],
    ]);
}

#[test]
fn auto_mod_long_hold() {
    let mut h: Harness<1, 4> = Harness::new(&AUTO_MOD_KEYS, &MAP);
    h.run_sequence(&key_sequence![
        [0, 0, true, 10],
        [0, 0, false, 200],
    ]);
    h.settle();
    h.assert_reports(&key_report![
        [KC_LSHIFT, [kc8!(A), 0, 0, 0, 0, 0]],
        [0, [0, 0, 0, 0, 0, 0]],
    ]);
}

static ONE_SHOT: [Action<'static>; 1] =
    [one_shot(0, Duration::from_millis(500), &[], &[])];
static ONE_SHOT_KEYS: [FlexKey<'static>; 1] =
    [FlexKey::new("OS_SHIFT", &[Key::new(KeyCode::LShift)], &ONE_SHOT)];

#[test]
fn one_shot_wraps_next_key() {
    let mut h: Harness<1, 4> = Harness::new(&ONE_SHOT_KEYS, &MAP);
    h.run_sequence(&key_sequence![
        [0, 0, true, 10],
        [0, 1, true, 20],
        [0, 1, false, 10],
        [0, 0, false, 10],
    ]);
    h.settle();
    h.assert_reports(&key_report![
        [KC_LSHIFT, [0, 0, 0, 0, 0, 0]],
        [KC_LSHIFT, [kc8!(B), 0, 0, 0, 0, 0]],
        [KC_LSHIFT, [0, 0, 0, 0, 0, 0]],
        [0, [0, 0, 0, 0, 0, 0]],
    ]);
}

#[test]
fn one_shot_expires_on_timeout() {
    let mut h: Harness<1, 4> = Harness::new(&ONE_SHOT_KEYS, &MAP);
    h.run_sequence(&key_sequence![
        [0, 0, true, 10],
        [0, 0, false, 600], // timed out long before release
        [0, 1, true, 10],
        [0, 1, false, 20],
    ]);
    h.settle();
    h.assert_reports(&key_report![
        [0, [kc8!(B), 0, 0, 0, 0, 0]],
        [0, [0, 0, 0, 0, 0, 0]],
    ]);
}
