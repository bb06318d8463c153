//! Timer collaborator contract.
//!
//! The engine never blocks; anything that happens later is a one-shot
//! millisecond timer scheduled here and delivered back through
//! [`crate::flex::Flex::on_timer`]. Tasks carry plain identifiers and are
//! resolved against live state when they fire, so a task that outlives its
//! key is a harmless no-op.

use embassy_time::Duration;

use crate::action::FlexKeyId;
use crate::event::KeyPos;
use crate::keycode::Key;

/// Handle of a scheduled one-shot timer. Valid until the timer fires or is
/// cancelled; cancelling a consumed handle is a no-op.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskHandle(pub u32);

/// Deferred engine work.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerTask {
    /// Arming delay elapsed: promote the action from delayed to active.
    Arm {
        key: FlexKeyId,
        pos: KeyPos,
        action: u8,
    },
    /// Deadline elapsed: deliver a timeout event to the action.
    Deadline {
        key: FlexKeyId,
        pos: KeyPos,
        action: u8,
    },
    /// Release a key emitted earlier by a tap effect.
    ReleaseKey { key: Key },
    /// Run the next step of an in-flight chained effect.
    SequenceStep { run: u16 },
}

/// One-shot timer service driven by the firmware main loop. Callbacks run
/// on the same logical thread as key processing, in deadline order, ties in
/// scheduling order.
pub trait Scheduler {
    /// Schedule `task` for delivery to the engine after `delay`.
    fn schedule(&mut self, delay: Duration, task: TimerTask) -> TaskHandle;

    /// Cancel a pending timer. Idempotent.
    fn cancel(&mut self, handle: TaskHandle);
}
