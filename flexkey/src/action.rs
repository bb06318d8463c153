//! Declarative rules attached to flex keys, and the pure evaluation that
//! decides what one event does to one rule.

use embassy_time::Duration;

use crate::effect::Effect;
use crate::hid::HidSink;
use crate::keycode::Key;
use crate::mode::{self, Mode};

/// Index of a registered flex key definition.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlexKeyId(pub u8);

/// What a keymap position resolves to: nothing, a plain key, or a flex key.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyAction {
    No,
    Key(Key),
    Flex(FlexKeyId),
}

/// One rule of a flex key. Immutable once constructed; shared across all
/// presses of the key.
///
/// `on` names the event kinds that fire [`Action::effect`]; `stop_on` the
/// kinds that silently retire the rule. `after` delays arming, `timeout`
/// schedules a one-shot deadline event once armed. The guard slices gate
/// firing on the currently held keys: `requires`/`ignore` for press,
/// release and timeout events, `interrupt_requires`/`interrupt_ignore` for
/// interrupt events.
#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Action<'a> {
    pub on: Mode,
    pub effect: Effect<'a>,
    pub after: Option<Duration>,
    pub timeout: Option<Duration>,
    pub stop_on: Mode,
    pub requires: &'a [Key],
    pub ignore: &'a [Key],
    pub interrupt_requires: &'a [Key],
    pub interrupt_ignore: &'a [Key],
}

impl<'a> Action<'a> {
    /// Rule firing on `on`, stopping on release, with no delay, deadline or
    /// guards.
    pub const fn new(on: Mode, effect: Effect<'a>) -> Self {
        Self {
            on,
            effect,
            after: None,
            timeout: None,
            stop_on: mode::RELEASE,
            requires: &[],
            ignore: &[],
            interrupt_requires: &[],
            interrupt_ignore: &[],
        }
    }

    pub const fn with_after(mut self, after: Duration) -> Self {
        self.after = Some(after);
        self
    }

    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub const fn with_stop_on(mut self, stop_on: Mode) -> Self {
        self.stop_on = stop_on;
        self
    }

    pub const fn with_requires(mut self, keys: &'a [Key]) -> Self {
        self.requires = keys;
        self
    }

    pub const fn with_ignore(mut self, keys: &'a [Key]) -> Self {
        self.ignore = keys;
        self
    }

    pub const fn with_interrupt_requires(mut self, keys: &'a [Key]) -> Self {
        self.interrupt_requires = keys;
        self
    }

    pub const fn with_interrupt_ignore(mut self, keys: &'a [Key]) -> Self {
        self.interrupt_ignore = keys;
        self
    }
}

/// Result of delivering one event to one action.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// The effect runs and the action is retired.
    Fire,
    /// The action is retired without running its effect.
    Stop,
    /// The action stays pending, unchanged.
    Ignore,
}

/// Decide what `event` does to `action`, given the currently held keys.
///
/// Interrupt deliveries use the interrupt guard sets instead of the normal
/// ones. A guard miss is the ordinary [`Outcome::Ignore`], not an error.
pub fn evaluate<H: HidSink>(action: &Action, event: Mode, hid: &H, is_interrupt: bool) -> Outcome {
    if action.on.contains(event) {
        let (requires, ignore) = if is_interrupt {
            (action.interrupt_requires, action.interrupt_ignore)
        } else {
            (action.requires, action.ignore)
        };
        if ignore.iter().any(|key| hid.is_held(*key)) {
            return Outcome::Ignore;
        }
        if requires.iter().any(|key| !hid.is_held(*key)) {
            return Outcome::Ignore;
        }
        Outcome::Fire
    } else if action.stop_on.contains(event) {
        Outcome::Stop
    } else {
        Outcome::Ignore
    }
}
