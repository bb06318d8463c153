pub mod test_macro;

use embassy_time::Duration;
use flexkey::action::KeyAction;
use flexkey::event::KeyboardEvent;
use flexkey::flex::{Flex, FlexKey};
use flexkey::hid::{HidSink, HidState, KeyboardReport};
use flexkey::keymap::KeyMap;
use flexkey::scheduler::{Scheduler, TaskHandle, TimerTask};

// Init logger for tests
#[ctor::ctor]
pub fn init_log() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

pub const KC_LCTRL: u8 = 1 << 0;
pub const KC_LSHIFT: u8 = 1 << 1;
pub const KC_LGUI: u8 = 1 << 3;

#[derive(Debug, Clone)]
pub struct TestKeyPress {
    pub row: u8,
    pub col: u8,
    pub pressed: bool,
    pub delay: u64, // Delay before this key event in milliseconds
}

struct Entry {
    handle: TaskHandle,
    due_ms: u64,
    seq: u32,
    task: TimerTask,
}

/// Deterministic timer queue driven by the harness clock: earliest deadline
/// first, ties in scheduling order.
#[derive(Default)]
pub struct TestScheduler {
    pending: Vec<Entry>,
    now_ms: u64,
    next_handle: u32,
    next_seq: u32,
}

impl Scheduler for TestScheduler {
    fn schedule(&mut self, delay: Duration, task: TimerTask) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Entry {
            handle,
            due_ms: self.now_ms + delay.as_millis(),
            seq,
            task,
        });
        handle
    }

    fn cancel(&mut self, handle: TaskHandle) {
        self.pending.retain(|e| e.handle != handle);
    }
}

impl TestScheduler {
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn pending_timers(&self) -> usize {
        self.pending.len()
    }

    fn pop_due(&mut self, until_ms: u64) -> Option<Entry> {
        let i = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due_ms <= until_ms)
            .min_by_key(|(_, e)| (e.due_ms, e.seq))
            .map(|(i, _)| i)?;
        Some(self.pending.remove(i))
    }
}

/// Engine + scheduler + report sink + keymap, driven on a virtual clock.
pub struct Harness<const ROW: usize, const COL: usize> {
    pub engine: Flex<'static>,
    pub scheduler: TestScheduler,
    pub hid: HidState,
    keymap: KeyMap<'static, ROW, COL>,
}

impl<const ROW: usize, const COL: usize> Harness<ROW, COL> {
    pub fn new(
        keys: &'static [FlexKey<'static>],
        map: &'static [[KeyAction; COL]; ROW],
    ) -> Self {
        Self {
            engine: Flex::new(keys).expect("invalid flex key configuration"),
            scheduler: TestScheduler::default(),
            hid: HidState::new(),
            keymap: KeyMap::new(map),
        }
    }

    /// Advance the virtual clock, firing due timers in order.
    pub fn advance(&mut self, ms: u64) {
        let target = self.scheduler.now_ms + ms;
        while let Some(entry) = self.scheduler.pop_due(target) {
            self.scheduler.now_ms = entry.due_ms;
            self.engine
                .on_timer(entry.task, &mut self.scheduler, &mut self.hid);
        }
        self.scheduler.now_ms = target;
    }

    /// Feed one key transition through keymap and engine; keys the engine
    /// passes through are registered or released like any plain key.
    pub fn dispatch(&mut self, event: KeyboardEvent) {
        let action = self.keymap.get(event.pos);
        let passthrough =
            self.engine
                .process_key(action, event, &mut self.scheduler, &mut self.hid);
        if let Some(key) = passthrough {
            if event.pressed {
                self.hid.add_key(key);
            } else {
                self.hid.remove_key(key);
            }
        }
    }

    pub fn run_sequence(&mut self, sequence: &[TestKeyPress]) {
        for key in sequence {
            self.advance(key.delay);
            self.dispatch(KeyboardEvent::key(key.row, key.col, key.pressed));
        }
    }

    /// Run far enough ahead that every outstanding timer has resolved.
    pub fn settle(&mut self) {
        self.advance(10_000);
    }

    pub fn reports(&mut self) -> Vec<KeyboardReport> {
        std::iter::from_fn(|| self.hid.next_report()).collect()
    }

    pub fn assert_reports(&mut self, expected: &[KeyboardReport]) {
        let actual = self.reports();
        for (i, (e, a)) in expected.iter().zip(actual.iter()).enumerate() {
            assert_eq!(e, a, "on #{} reports, expected left but actually right", i);
        }
        assert_eq!(
            expected.len(),
            actual.len(),
            "report count mismatch, got {:?}",
            actual
        );
    }
}
