use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::machine::{Machine, RunOutcome, StepEffect};
use crate::program::is_visible;

/// Shared cancellation flag for a machine's current run.
///
/// Cloning is cheap and every clone refers to the same flag. The machine
/// checks it before each instruction and clears it when a new run starts.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Suspends a stepped run between visible instructions.
pub trait Pacer {
    fn pause(&mut self, delay: Duration);
}

/// Blocks the calling thread for the delay.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&mut self, delay: Duration) {
        thread::sleep(delay);
    }
}

impl<F: FnMut(Duration)> Pacer for F {
    fn pause(&mut self, delay: Duration) {
        self(delay)
    }
}

impl Machine {
    /// Run one instruction at a time, pausing `delay` after every visible
    /// instruction (`+ - < > .`) so an observer can watch the tape change.
    ///
    /// Brackets and `,` run back to back. A zero delay never calls the
    /// pacer. Returns once the program completes or the run is cancelled
    /// through a [`CancelHandle`]; a cancel request made during a pause is
    /// seen before the next instruction starts, so no further instruction
    /// runs.
    pub fn run_stepped(
        &mut self,
        delay: Duration,
        input: &[u8],
        pacer: &mut impl Pacer,
    ) -> RunOutcome {
        self.start(input);
        debug!(delay_ms = delay.as_millis() as u64, "stepped run started");
        loop {
            let next = self.program().get(self.program_counter());
            if self.step() == StepEffect::Halted {
                break;
            }
            if !delay.is_zero() && next.is_some_and(is_visible) {
                pacer.pause(delay);
            }
        }
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;
    use crate::machine::RunState;
    use crate::observer::Hooks;
    use std::sync::Mutex;
    use std::time::Instant;

    fn machine(source: &str) -> Machine {
        let mut m = Machine::new(MachineConfig::default()).unwrap();
        m.load(source).unwrap();
        m
    }

    #[test]
    fn test_pauses_only_after_visible_instructions() {
        let mut m = machine("++[->+<]>.,");
        let mut pauses = 0usize;
        let outcome = m.run_stepped(Duration::from_millis(5), &[], &mut |d: Duration| {
            assert_eq!(d, Duration::from_millis(5));
            pauses += 1;
        });
        assert_eq!(outcome, RunOutcome::Completed);
        // Visible: `++` (2), two passes of `->+<` (8), `>` and `.` (2).
        assert_eq!(pauses, 12);
        assert_eq!(m.output(), &[2]);
    }

    #[test]
    fn test_zero_delay_never_pauses() {
        let mut m = machine("+++.");
        let mut pauses = 0usize;
        m.run_stepped(Duration::ZERO, &[], &mut |_: Duration| pauses += 1);
        assert_eq!(pauses, 0);
        assert_eq!(m.output(), &[3]);
    }

    #[test]
    fn test_stepped_matches_synchronous_run() {
        let source = ",[>,]<[.<]";
        let input = crate::machine::input_queue("stepped");

        let mut fast = machine(source);
        fast.run(&input);

        let mut slow = machine(source);
        slow.run_stepped(Duration::from_millis(1), &input, &mut |_: Duration| {});

        assert_eq!(fast.output(), slow.output());
        assert_eq!(fast.tape(), slow.tape());
        assert_eq!(fast.steps(), slow.steps());
    }

    #[test]
    fn test_observer_sees_every_step_between_pauses() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut m = Machine::with_observer(
            MachineConfig::default(),
            Hooks::new().with_step(move |v| sink.lock().unwrap().push(v.instruction)),
        )
        .unwrap();
        m.load("+[-]").unwrap();

        let pauses = events.clone();
        m.run_stepped(Duration::from_millis(1), &[], &mut |_: Duration| {
            pauses.lock().unwrap().push(b'|');
        });
        assert_eq!(*events.lock().unwrap(), b"+|[-|]".to_vec());
    }

    #[test]
    fn test_cancel_during_pause_stops_before_next_instruction() {
        let mut m = machine("+[]");
        let handle = m.cancel_handle();
        let outcome = m.run_stepped(Duration::from_millis(1), &[], &mut |_: Duration| {
            handle.cancel();
        });
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(m.steps(), 1);
        assert_eq!(m.state(), RunState::Halted);
        assert_eq!(m.program_counter(), 3);
    }

    #[test]
    fn test_cancel_infinite_loop_from_observer() {
        let mut m = machine("+[]");
        let handle = m.cancel_handle();
        let counter = Arc::new(Mutex::new(0u64));
        let seen = counter.clone();
        m.set_observer(Hooks::new().with_step(move |_| {
            let mut n = seen.lock().unwrap();
            *n += 1;
            if *n == 50 {
                handle.cancel();
            }
        }));

        let outcome = m.run_stepped(Duration::from_millis(1), &[], &mut |_: Duration| {});
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(m.steps(), 50);
        assert_eq!(*counter.lock().unwrap(), 50);
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let mut m = machine("+[]");
        let handle = m.cancel_handle();
        let worker = thread::spawn(move || {
            let outcome = m.run_stepped(Duration::from_millis(1), &[], &mut ThreadPacer);
            (outcome, m)
        });

        thread::sleep(Duration::from_millis(20));
        let requested = Instant::now();
        handle.cancel();
        let (outcome, m) = worker.join().unwrap();

        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(m.state(), RunState::Halted);
        assert!(m.steps() > 1);
        assert!(requested.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_thread_pacer_sleeps() {
        let start = Instant::now();
        ThreadPacer.pause(Duration::from_millis(10));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_handle_clones_share_flag() {
        let a = CancelHandle::new();
        let b = a.clone();
        assert!(!a.is_requested());
        b.cancel();
        b.cancel();
        assert!(a.is_requested());
        a.reset();
        assert!(!b.is_requested());
    }
}
