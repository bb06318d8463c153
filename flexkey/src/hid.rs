//! Held-key state and report assembly.
//!
//! The engine only ever adds, removes and taps logical [`Key`]s through the
//! [`HidSink`] trait; assembling and transmitting the wire-level report is
//! the transport layer's job. [`HidState`] is the reference sink: it keeps
//! the held-key list and queues one 8-byte boot report per state change.

use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use bitfield_struct::bitfield;
use heapless::{Deque, Vec};

use crate::keycode::{Key, KeyCode, ModifierCombination};

/// Modifier byte of the keyboard report.
#[bitfield(u8, order = Lsb, defmt = cfg(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct HidModifiers {
    #[bits(1)]
    pub left_ctrl: bool,
    #[bits(1)]
    pub left_shift: bool,
    #[bits(1)]
    pub left_alt: bool,
    #[bits(1)]
    pub left_gui: bool,
    #[bits(1)]
    pub right_ctrl: bool,
    #[bits(1)]
    pub right_shift: bool,
    #[bits(1)]
    pub right_alt: bool,
    #[bits(1)]
    pub right_gui: bool,
}

impl BitOr for HidModifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() | rhs.into_bits())
    }
}

impl BitAnd for HidModifiers {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() & rhs.into_bits())
    }
}

impl Not for HidModifiers {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::from_bits(!self.into_bits())
    }
}

impl BitOrAssign for HidModifiers {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

impl BitAndAssign for HidModifiers {
    fn bitand_assign(&mut self, rhs: Self) {
        *self = *self & rhs;
    }
}

impl ModifierCombination {
    /// Get modifier hid report bits from modifier combination
    pub const fn to_hid_modifiers(self) -> HidModifiers {
        if !self.right() {
            HidModifiers::new()
                .with_left_ctrl(self.ctrl())
                .with_left_shift(self.shift())
                .with_left_alt(self.alt())
                .with_left_gui(self.gui())
        } else {
            HidModifiers::new()
                .with_right_ctrl(self.ctrl())
                .with_right_shift(self.shift())
                .with_right_alt(self.alt())
                .with_right_gui(self.gui())
        }
    }
}

impl KeyCode {
    /// Report bit of a modifier keycode; empty for anything else.
    pub const fn to_hid_modifiers(self) -> HidModifiers {
        if self.is_modifier() {
            HidModifiers::from_bits(1u8 << (self as u8 - KeyCode::LCtrl as u8))
        } else {
            HidModifiers::new()
        }
    }
}

/// The 8-byte boot keyboard report.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardReport {
    pub modifier: u8,
    pub reserved: u8,
    pub leds: u8,
    pub keycodes: [u8; 6],
}

/// Sink for logical key output. Implementations own the "currently held
/// keys" set the engine's guards are evaluated against.
pub trait HidSink {
    fn add_key(&mut self, key: Key);
    fn remove_key(&mut self, key: Key);
    fn is_held(&self, key: Key) -> bool;

    /// Press and immediately release.
    fn tap_key(&mut self, key: Key) {
        self.add_key(key);
        self.remove_key(key);
    }
}

/// Max keys held at once.
pub const HELD_KEY_MAX_NUM: usize = 16;
const REPORT_QUEUE_SIZE: usize = 32;

/// Reference [`HidSink`]: held-key list plus a queue of report snapshots
/// for the transport layer to drain.
#[derive(Debug, Default)]
pub struct HidState {
    held: Vec<Key, HELD_KEY_MAX_NUM>,
    reports: Deque<KeyboardReport, REPORT_QUEUE_SIZE>,
}

impl HidState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently held, in press order.
    pub fn held_keys(&self) -> &[Key] {
        &self.held
    }

    /// Pop the oldest queued report.
    pub fn next_report(&mut self) -> Option<KeyboardReport> {
        self.reports.pop_front()
    }

    fn push_report(&mut self) {
        let report = self.build_report();
        if self.reports.push_back(report).is_err() {
            error!("report queue overflow, dropping {:?}", report);
        }
    }

    fn build_report(&self) -> KeyboardReport {
        let mut modifier = HidModifiers::new();
        let mut keycodes = [0u8; 6];
        let mut n = 0;
        for key in &self.held {
            modifier |= key.modifiers.to_hid_modifiers();
            if key.code.is_modifier() {
                modifier |= key.code.to_hid_modifiers();
            } else if key.code != KeyCode::No && n < keycodes.len() {
                keycodes[n] = key.code as u8;
                n += 1;
            }
        }
        KeyboardReport {
            modifier: modifier.into_bits(),
            reserved: 0,
            leds: 0,
            keycodes,
        }
    }
}

impl HidSink for HidState {
    fn add_key(&mut self, key: Key) {
        if self.is_held(key) {
            return;
        }
        if self.held.push(key).is_err() {
            error!("held key overflow, dropping {:?}", key);
            return;
        }
        self.push_report();
    }

    fn remove_key(&mut self, key: Key) {
        if let Some(i) = self.held.iter().position(|k| *k == key) {
            self.held.remove(i);
            self.push_report();
        }
    }

    fn is_held(&self, key: Key) -> bool {
        self.held.iter().any(|k| *k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycode::{CTRL, SHIFT};

    #[test]
    fn modifier_mapping() {
        assert_eq!(SHIFT.to_hid_modifiers().into_bits(), 0b0000_0010);
        assert_eq!(
            SHIFT.union(crate::keycode::RIGHT).to_hid_modifiers().into_bits(),
            0b0010_0000
        );
        assert_eq!(KeyCode::LCtrl.to_hid_modifiers().into_bits(), 0b0000_0001);
        assert_eq!(KeyCode::RGui.to_hid_modifiers().into_bits(), 0b1000_0000);
        assert_eq!(KeyCode::A.to_hid_modifiers().into_bits(), 0);
    }

    #[test]
    fn report_folds_held_keys() {
        let mut hid = HidState::new();
        hid.add_key(Key::new(KeyCode::LShift));
        hid.add_key(Key::with_modifiers(KeyCode::A, CTRL));
        let report = hid.build_report();
        assert_eq!(report.modifier, 0b0000_0011);
        assert_eq!(report.keycodes, [KeyCode::A as u8, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn one_report_per_state_change() {
        let mut hid = HidState::new();
        let a = Key::new(KeyCode::A);
        hid.add_key(a);
        hid.add_key(a); // already held
        hid.remove_key(Key::new(KeyCode::B)); // not held
        hid.remove_key(a);
        assert_eq!(
            hid.next_report(),
            Some(KeyboardReport {
                keycodes: [KeyCode::A as u8, 0, 0, 0, 0, 0],
                ..KeyboardReport::default()
            })
        );
        assert_eq!(hid.next_report(), Some(KeyboardReport::default()));
        assert_eq!(hid.next_report(), None);
    }

    #[test]
    fn tap_emits_press_then_release() {
        let mut hid = HidState::new();
        hid.tap_key(Key::with_modifiers(KeyCode::B, SHIFT));
        let pressed = hid.next_report().unwrap();
        assert_eq!(pressed.modifier, 0b0000_0010);
        assert_eq!(pressed.keycodes[0], KeyCode::B as u8);
        assert_eq!(hid.next_report(), Some(KeyboardReport::default()));
        assert!(!hid.is_held(Key::with_modifiers(KeyCode::B, SHIFT)));
    }
}
