#![no_std]

//! Flexkey is a per-key, multi-action race engine for keyboard firmware.
//!
//! A flex key is a physical key whose logical output depends on how long it
//! is held, whether it is released first, or whether another key interrupts
//! it while it is pending (tap for letter, hold for modifier, reassign on
//! rollover). Each flex key carries an ordered list of [`action::Action`]
//! rules; every rule declares the event kinds that fire it, the kinds that
//! cancel it, an optional arming delay, an optional deadline, and held-key
//! guards. The [`flex::Flex`] engine arms, races and resolves those rules
//! on every key transition.
//!
//! The crate is transport-agnostic: matrix scanning feeds
//! [`flex::Flex::process_key`], timers come back through a
//! [`scheduler::Scheduler`] implementation, and output goes to a
//! [`hid::HidSink`]. Report transmission, debouncing and radio stay outside.
//!
//! ## Feature flags
#![doc = document_features::document_features!()]

#[macro_use]
mod fmt;

pub mod action;
pub mod config;
pub mod effect;
pub mod event;
pub mod flag;
pub mod flex;
pub mod hid;
pub mod keycode;
pub mod keymap;
pub mod layout_macro;
pub mod mode;
pub mod presets;
pub mod scheduler;
