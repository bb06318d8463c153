//! The flex engine: per-key, multi-action race resolution.
//!
//! Every tracked key runs the ordered action list of its definition through
//! a tiny state machine: an action is *delayed* until its arming delay
//! elapses, *active* while it listens for press/release/timeout/interrupt
//! events, and gone once it fired or was stopped. A new physical press runs
//! interrupt resolution against every other tracked key first; if any
//! action fires off it, the press is captured and its normal propagation
//! suppressed for this cycle.

use embassy_time::Duration;
use heapless::Vec;

use crate::action::{Action, FlexKeyId, KeyAction, Outcome, evaluate};
use crate::effect::Effect;
use crate::event::{KeyPos, KeyboardEvent};
use crate::hid::HidSink;
use crate::keycode::Key;
use crate::mode::{self, Mode};
use crate::scheduler::{Scheduler, TaskHandle, TimerTask};

/// Max actions in one flex key definition.
pub const ACTION_MAX_NUM: usize = 8;
/// Max concurrently pressed flex keys.
pub const TRACKED_KEY_MAX_NUM: usize = 8;
/// Max in-flight chained effects.
pub const SEQUENCE_MAX_NUM: usize = 4;
const TASK_MAX_NUM: usize = 2 * ACTION_MAX_NUM;

/// A registered flex key: display name, variant table, ordered rules.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlexKey<'a> {
    pub name: &'a str,
    pub variants: &'a [Key],
    pub actions: &'a [Action<'a>],
}

impl<'a> FlexKey<'a> {
    pub const fn new(name: &'a str, variants: &'a [Key], actions: &'a [Action<'a>]) -> Self {
        Self {
            name,
            variants,
            actions,
        }
    }
}

/// Rejected configurations, detected at registration time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The definition has no actions.
    NoActions { key: u8 },
    TooManyActions { key: u8 },
    /// An effect references a variant index outside the variant table.
    BadVariant { key: u8, action: u8 },
    TooManyKeys,
}

/// Bit set of action indices.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct ActionSet(u8);

impl ActionSet {
    const EMPTY: ActionSet = ActionSet(0);

    fn insert(&mut self, i: u8) {
        self.0 |= 1 << i;
    }

    fn remove(&mut self, i: u8) {
        self.0 &= !(1 << i);
    }

    fn contains(&self, i: u8) -> bool {
        self.0 & (1 << i) != 0
    }

    fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Live state of one pressed flex key, identified by `(id, pos)` so the
/// same logical key at two matrix positions is tracked independently.
///
/// Every action index is in exactly one of `delayed`, `active`, or neither;
/// absence means it already fired or was stopped. `tasks` holds every
/// outstanding timer handle, tagged with the action it belongs to, and is
/// fully cancelled when the state is destroyed.
#[derive(Debug)]
struct KeyState {
    id: FlexKeyId,
    pos: KeyPos,
    active: ActionSet,
    delayed: ActionSet,
    tasks: Vec<(u8, TaskHandle), TASK_MAX_NUM>,
}

/// An in-flight chained effect. A chain is output already in motion, so it
/// survives its key's teardown; it stops through its abort mask instead,
/// fed by the events seen on the owning key.
#[derive(Debug, Copy, Clone)]
struct SequenceRun<'a> {
    id: u16,
    key: FlexKeyId,
    pos: KeyPos,
    steps: &'a [Effect<'a>],
    step_delay: Duration,
    abort_on: Mode,
    next: u8,
    interrupt: Option<Key>,
    seen: Mode,
}

/// The engine. Owns the tracked-key registry; collaborators are passed into
/// each entry point by the firmware main loop.
pub struct Flex<'a> {
    keys: &'a [FlexKey<'a>],
    tracked: Vec<KeyState, TRACKED_KEY_MAX_NUM>,
    sequences: Vec<SequenceRun<'a>, SEQUENCE_MAX_NUM>,
    next_sequence: u16,
}

impl<'a> Flex<'a> {
    /// Validate and register the flex key definitions. Configuration errors
    /// are fatal here and can never surface mid-operation.
    pub fn new(keys: &'a [FlexKey<'a>]) -> Result<Self, ConfigError> {
        if keys.len() > 256 {
            return Err(ConfigError::TooManyKeys);
        }
        for (k, def) in keys.iter().enumerate() {
            let k = k as u8;
            if def.actions.is_empty() {
                return Err(ConfigError::NoActions { key: k });
            }
            if def.actions.len() > ACTION_MAX_NUM {
                return Err(ConfigError::TooManyActions { key: k });
            }
            for (i, action) in def.actions.iter().enumerate() {
                check_effect(def, &action.effect, k, i as u8)?;
            }
        }
        Ok(Self {
            keys,
            tracked: Vec::new(),
            sequences: Vec::new(),
            next_sequence: 0,
        })
    }

    /// No tracked keys and no chains in flight.
    pub fn is_idle(&self) -> bool {
        self.tracked.is_empty() && self.sequences.is_empty()
    }

    /// Process one physical key transition.
    ///
    /// Returns the key to continue normal processing with, or `None` when
    /// the event was fully consumed this cycle (flex keys handle their own
    /// output; captured presses are re-emitted by the capturing effect).
    pub fn process_key<S: Scheduler, H: HidSink>(
        &mut self,
        action: KeyAction,
        event: KeyboardEvent,
        scheduler: &mut S,
        hid: &mut H,
    ) -> Option<Key> {
        if event.pressed {
            let captured = self.deliver_interrupts(action, event, scheduler, hid);
            match action {
                KeyAction::No => None,
                KeyAction::Key(key) => {
                    if captured {
                        debug!("press of {:?} captured", key);
                        None
                    } else {
                        Some(key)
                    }
                }
                KeyAction::Flex(id) => {
                    if captured {
                        debug!("press of flex key {} captured", id.0);
                        None
                    } else {
                        self.on_press(id, event.pos, scheduler, hid)
                    }
                }
            }
        } else {
            match action {
                KeyAction::No => None,
                KeyAction::Key(key) => Some(key),
                KeyAction::Flex(id) => {
                    self.on_release(id, event.pos, scheduler, hid);
                    None
                }
            }
        }
    }

    /// Timer entry point. Tasks racing a state that is already gone are
    /// harmless no-ops.
    pub fn on_timer<S: Scheduler, H: HidSink>(
        &mut self,
        task: TimerTask,
        scheduler: &mut S,
        hid: &mut H,
    ) {
        match task {
            TimerTask::Arm { key, pos, action } => self.on_arm(key, pos, action, scheduler, hid),
            TimerTask::Deadline { key, pos, action } => {
                let Some(t) = self.find(key, pos) else {
                    debug!("deadline for untracked key {}", key.0);
                    return;
                };
                if self.tracked[t].active.contains(action) {
                    self.deliver_to_action(t, action, mode::TIMEOUT, None, scheduler, hid);
                }
            }
            TimerTask::ReleaseKey { key } => hid.remove_key(key),
            TimerTask::SequenceStep { run } => self.on_sequence_step(run, scheduler, hid),
        }
    }

    /// Run interrupt resolution for a new physical press against every
    /// other tracked key, in tracking-insertion order. All tracked keys
    /// receive the delivery; the press is captured if any action fired.
    fn deliver_interrupts<S: Scheduler, H: HidSink>(
        &mut self,
        action: KeyAction,
        event: KeyboardEvent,
        scheduler: &mut S,
        hid: &mut H,
    ) -> bool {
        let interrupt_key = match action {
            KeyAction::Key(key) => Some(key),
            KeyAction::Flex(id) => self
                .definition(id)
                .and_then(|def| def.variants.first().copied()),
            KeyAction::No => None,
        };
        let targets: Vec<(FlexKeyId, KeyPos), TRACKED_KEY_MAX_NUM> = self
            .tracked
            .iter()
            .filter(|st| match action {
                KeyAction::Flex(id) => !(st.id == id && st.pos == event.pos),
                _ => true,
            })
            .map(|st| (st.id, st.pos))
            .collect();
        // chains in flight hear interrupts too, even after their key's
        // state is already gone
        for run in self.sequences.iter_mut() {
            let own =
                matches!(action, KeyAction::Flex(id) if run.key == id && run.pos == event.pos);
            if !own {
                run.seen |= mode::INTERRUPT;
            }
        }
        let mut captured = false;
        for (id, pos) in targets {
            if self.deliver_to_key(id, pos, mode::INTERRUPT, interrupt_key, scheduler, hid) {
                captured = true;
            }
        }
        captured
    }

    /// Track a fresh press of a flex key. Returns a fallback key only when
    /// the key cannot be tracked and should propagate as its primary
    /// variant.
    fn on_press<S: Scheduler, H: HidSink>(
        &mut self,
        id: FlexKeyId,
        pos: KeyPos,
        scheduler: &mut S,
        hid: &mut H,
    ) -> Option<Key> {
        let Some(def) = self.definition(id) else {
            error!("press of unregistered flex key {}", id.0);
            return None;
        };
        debug!("flex key {:?} pressed at {:?}", def.name, pos);
        self.note_event(id, pos, mode::PRESS);

        // A second press without an intervening release is a stray
        // duplicate: tear the old state down before starting over.
        if let Some(t) = self.find(id, pos) {
            debug!("flex key {:?} already tracked, clearing", def.name);
            self.destroy(t, scheduler);
        }

        let state = KeyState {
            id,
            pos,
            active: ActionSet::EMPTY,
            delayed: ActionSet::EMPTY,
            tasks: Vec::new(),
        };
        if self.tracked.push(state).is_err() {
            error!("tracked key overflow, {:?} degrades to its primary variant", def.name);
            return def.variants.first().copied();
        }

        for i in 0..def.actions.len() as u8 {
            // a synchronous fire may already have torn the state down
            let Some(t) = self.find(id, pos) else { break };
            let action = &def.actions[i as usize];
            if let Some(delay) = action.after {
                self.tracked[t].delayed.insert(i);
                let handle = scheduler.schedule(delay, TimerTask::Arm { key: id, pos, action: i });
                self.track_task(t, i, handle);
            } else {
                self.tracked[t].active.insert(i);
                self.deliver_to_action(t, i, mode::PRESS, None, scheduler, hid);
                self.arm_deadline(id, pos, i, scheduler);
            }
        }
        None
    }

    /// Arming delay elapsed: the action becomes active, gets one chance to
    /// react to press semantics, and its deadline starts counting.
    fn on_arm<S: Scheduler, H: HidSink>(
        &mut self,
        id: FlexKeyId,
        pos: KeyPos,
        i: u8,
        scheduler: &mut S,
        hid: &mut H,
    ) {
        let Some(t) = self.find(id, pos) else {
            debug!("arm timer for untracked key {}", id.0);
            return;
        };
        if !self.tracked[t].delayed.contains(i) {
            debug!("action {} resolved before arming", i);
            return;
        }
        self.tracked[t].delayed.remove(i);
        self.tracked[t].active.insert(i);
        self.deliver_to_action(t, i, mode::PRESS, None, scheduler, hid);
        self.arm_deadline(id, pos, i, scheduler);
    }

    /// Release resolves every active action, then unconditionally destroys
    /// the state: nothing may fire for a key that is already up. Actions
    /// still delayed are cancelled without a release evaluation.
    fn on_release<S: Scheduler, H: HidSink>(
        &mut self,
        id: FlexKeyId,
        pos: KeyPos,
        scheduler: &mut S,
        hid: &mut H,
    ) {
        // chains in flight hear the release even when the state is gone
        self.note_event(id, pos, mode::RELEASE);
        if self.find(id, pos).is_none() {
            debug!("release of untracked flex key {}", id.0);
            return;
        }
        let Some(def) = self.definition(id) else { return };
        debug!("flex key {:?} released", def.name);
        for i in 0..def.actions.len() as u8 {
            let Some(t) = self.find(id, pos) else { return };
            if !self.tracked[t].active.contains(i) {
                continue;
            }
            self.deliver_to_action(t, i, mode::RELEASE, None, scheduler, hid);
        }
        if let Some(t) = self.find(id, pos) {
            self.destroy(t, scheduler);
        }
    }

    /// Deliver one event kind to every active action of a tracked key, in
    /// declaration order. Returns whether any action fired.
    fn deliver_to_key<S: Scheduler, H: HidSink>(
        &mut self,
        id: FlexKeyId,
        pos: KeyPos,
        kind: Mode,
        interrupt: Option<Key>,
        scheduler: &mut S,
        hid: &mut H,
    ) -> bool {
        self.note_event(id, pos, kind);
        let Some(def) = self.definition(id) else {
            return false;
        };
        let mut fired_any = false;
        for i in 0..def.actions.len() as u8 {
            let Some(t) = self.find(id, pos) else { break };
            if !self.tracked[t].active.contains(i) {
                continue;
            }
            if self.deliver_to_action(t, i, kind, interrupt, scheduler, hid) {
                fired_any = true;
            }
        }
        fired_any
    }

    /// Evaluate one event against one action and apply the outcome.
    /// Returns whether the action fired. The action is removed before its
    /// effect runs, so an effect can never fire twice.
    fn deliver_to_action<S: Scheduler, H: HidSink>(
        &mut self,
        t: usize,
        i: u8,
        kind: Mode,
        interrupt: Option<Key>,
        scheduler: &mut S,
        hid: &mut H,
    ) -> bool {
        let (id, pos) = (self.tracked[t].id, self.tracked[t].pos);
        let Some(def) = self.definition(id) else {
            return false;
        };
        let action = &def.actions[i as usize];
        let is_interrupt = kind == mode::INTERRUPT;
        match evaluate(action, kind, hid, is_interrupt) {
            Outcome::Fire => {
                debug!("{:?}: action {} fired on {:?}", def.name, i, kind);
                self.remove_action(t, i, scheduler);
                self.run_effect(id, pos, def, &action.effect, interrupt, scheduler, hid);
                true
            }
            Outcome::Stop => {
                debug!("{:?}: action {} stopped on {:?}", def.name, i, kind);
                self.remove_action(t, i, scheduler);
                false
            }
            Outcome::Ignore => false,
        }
    }

    /// Schedule the single-shot deadline of an action that survived arming.
    fn arm_deadline<S: Scheduler>(&mut self, id: FlexKeyId, pos: KeyPos, i: u8, scheduler: &mut S) {
        let Some(def) = self.definition(id) else { return };
        let Some(timeout) = def.actions[i as usize].timeout else {
            return;
        };
        let Some(t) = self.find(id, pos) else { return };
        if !self.tracked[t].active.contains(i) {
            return;
        }
        let handle = scheduler.schedule(timeout, TimerTask::Deadline { key: id, pos, action: i });
        self.track_task(t, i, handle);
    }

    /// Drop an action from the live state, cancelling its outstanding
    /// timers; the whole key state goes with the last action.
    fn remove_action<S: Scheduler>(&mut self, t: usize, i: u8, scheduler: &mut S) {
        let st = &mut self.tracked[t];
        st.active.remove(i);
        st.delayed.remove(i);
        let mut k = 0;
        while k < st.tasks.len() {
            if st.tasks[k].0 == i {
                let (_, handle) = st.tasks.remove(k);
                scheduler.cancel(handle);
            } else {
                k += 1;
            }
        }
        if st.active.is_empty() && st.delayed.is_empty() {
            self.destroy(t, scheduler);
        }
    }

    /// Remove a tracked key, cancelling every timer it still owns, so no
    /// callback can ever run against the stale state.
    fn destroy<S: Scheduler>(&mut self, t: usize, scheduler: &mut S) {
        let state = self.tracked.remove(t);
        for (_, handle) in &state.tasks {
            scheduler.cancel(*handle);
        }
    }

    fn track_task(&mut self, t: usize, i: u8, handle: TaskHandle) {
        if self.tracked[t].tasks.push((i, handle)).is_err() {
            error!("timer list overflow on action {}", i);
        }
    }

    fn find(&self, id: FlexKeyId, pos: KeyPos) -> Option<usize> {
        self.tracked
            .iter()
            .position(|st| st.id == id && st.pos == pos)
    }

    fn definition(&self, id: FlexKeyId) -> Option<&'a FlexKey<'a>> {
        self.keys.get(id.0 as usize)
    }

    /// Feed a physical event kind into the abort masks of the key's
    /// in-flight chains.
    fn note_event(&mut self, id: FlexKeyId, pos: KeyPos, kind: Mode) {
        for run in self
            .sequences
            .iter_mut()
            .filter(|run| run.key == id && run.pos == pos)
        {
            run.seen |= kind;
        }
    }

    /// Execute a fired action's effect against the report sink.
    fn run_effect<S: Scheduler, H: HidSink>(
        &mut self,
        id: FlexKeyId,
        pos: KeyPos,
        def: &'a FlexKey<'a>,
        effect: &Effect<'a>,
        interrupt: Option<Key>,
        scheduler: &mut S,
        hid: &mut H,
    ) {
        match *effect {
            Effect::Press(v) => {
                if let Some(key) = variant(def, v) {
                    hid.add_key(key);
                }
            }
            Effect::Release(v) => {
                if let Some(key) = variant(def, v) {
                    hid.remove_key(key);
                }
            }
            Effect::Tap {
                variant: v,
                modifiers,
                wrap_interrupt,
            } => {
                let Some(key) = variant(def, v) else { return };
                let key = key.add_modifiers(modifiers);
                hid.add_key(key);
                if wrap_interrupt {
                    if let Some(int) = interrupt {
                        hid.tap_key(int.add_modifiers(modifiers));
                    }
                }
                // the tapped key goes back up on the next scheduler tick
                scheduler.schedule(Duration::from_millis(0), TimerTask::ReleaseKey { key });
            }
            Effect::ModInterrupt { modifiers } => match interrupt {
                Some(int) => hid.tap_key(int.add_modifiers(modifiers)),
                None => debug!("mod-interrupt effect fired without an interrupting key"),
            },
            Effect::Sequence {
                steps,
                step_delay,
                abort_on,
            } => self.start_sequence(id, pos, def, steps, step_delay, abort_on, interrupt, scheduler, hid),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn start_sequence<S: Scheduler, H: HidSink>(
        &mut self,
        id: FlexKeyId,
        pos: KeyPos,
        def: &'a FlexKey<'a>,
        steps: &'a [Effect<'a>],
        step_delay: Duration,
        abort_on: Mode,
        interrupt: Option<Key>,
        scheduler: &mut S,
        hid: &mut H,
    ) {
        let Some(first) = steps.first() else { return };
        self.run_effect(id, pos, def, first, interrupt, scheduler, hid);
        if steps.len() == 1 {
            return;
        }
        let run_id = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        let run = SequenceRun {
            id: run_id,
            key: id,
            pos,
            steps,
            step_delay,
            abort_on,
            next: 1,
            interrupt,
            seen: mode::NONE,
        };
        if self.sequences.push(run).is_err() {
            error!("sequence overflow, chain of {:?} dropped", def.name);
            return;
        }
        scheduler.schedule(step_delay, TimerTask::SequenceStep { run: run_id });
    }

    fn on_sequence_step<S: Scheduler, H: HidSink>(
        &mut self,
        run_id: u16,
        scheduler: &mut S,
        hid: &mut H,
    ) {
        let Some(r) = self.sequences.iter().position(|run| run.id == run_id) else {
            debug!("step for finished chain {}", run_id);
            return;
        };
        let run = self.sequences[r];
        if run.abort_on.intersects(run.seen) {
            debug!("chain {} aborted", run_id);
            self.sequences.remove(r);
            return;
        }
        let last = run.next as usize + 1 >= run.steps.len();
        if last {
            self.sequences.remove(r);
        } else {
            self.sequences[r].next += 1;
            scheduler.schedule(run.step_delay, TimerTask::SequenceStep { run: run_id });
        }
        if let Some(step) = run.steps.get(run.next as usize) {
            if let Some(def) = self.definition(run.key) {
                self.run_effect(run.key, run.pos, def, step, run.interrupt, scheduler, hid);
            }
        }
    }
}

fn variant(def: &FlexKey, v: u8) -> Option<Key> {
    let key = def.variants.get(v as usize).copied();
    if key.is_none() {
        error!("{:?}: variant {} missing from table", def.name, v);
    }
    key
}

fn check_effect(def: &FlexKey, effect: &Effect, key: u8, action: u8) -> Result<(), ConfigError> {
    match *effect {
        Effect::Press(v) | Effect::Release(v) | Effect::Tap { variant: v, .. } => {
            if v as usize >= def.variants.len() {
                Err(ConfigError::BadVariant { key, action })
            } else {
                Ok(())
            }
        }
        Effect::ModInterrupt { .. } => Ok(()),
        Effect::Sequence { steps, .. } => {
            for step in steps {
                check_effect(def, step, key, action)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect;
    use crate::keycode::KeyCode;

    const A: Key = Key::new(KeyCode::A);

    #[test]
    fn rejects_empty_definition() {
        let keys = [FlexKey::new("empty", &[A], &[])];
        assert!(matches!(
            Flex::new(&keys),
            Err(ConfigError::NoActions { key: 0 })
        ));
    }

    #[test]
    fn rejects_bad_variant_index() {
        let actions = [crate::action::Action::new(mode::RELEASE, effect::tap(1))];
        let keys = [FlexKey::new("bad", &[A], &actions)];
        assert!(matches!(
            Flex::new(&keys),
            Err(ConfigError::BadVariant { key: 0, action: 0 })
        ));
    }

    #[test]
    fn rejects_bad_variant_inside_sequence() {
        static STEPS: [Effect<'static>; 2] = [effect::press(0), effect::release(3)];
        static SEQ: Effect<'static> = effect::sequence(
            &STEPS,
            Duration::from_millis(10),
            mode::NONE,
        );
        let actions = [crate::action::Action::new(mode::RELEASE, SEQ)];
        let keys = [FlexKey::new("bad", &[A], &actions)];
        assert!(matches!(
            Flex::new(&keys),
            Err(ConfigError::BadVariant { key: 0, action: 0 })
        ));
    }

    #[test]
    fn accepts_valid_definition() {
        let actions = [crate::action::Action::new(mode::RELEASE, effect::tap(0))];
        let keys = [FlexKey::new("ok", &[A], &actions)];
        let engine = Flex::new(&keys).unwrap();
        assert!(engine.is_idle());
    }

    #[test]
    fn action_set_membership() {
        let mut set = ActionSet::EMPTY;
        assert!(set.is_empty());
        set.insert(0);
        set.insert(5);
        assert!(set.contains(0));
        assert!(set.contains(5));
        assert!(!set.contains(3));
        set.remove(0);
        assert!(!set.contains(0));
        assert!(!set.is_empty());
        set.remove(5);
        assert!(set.is_empty());
    }
}
