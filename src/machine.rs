use tracing::{debug, info, trace, warn};

use crate::config::MachineConfig;
use crate::error::{ConfigError, LoadError};
use crate::observer::{NoopObserver, Observer, StepView};
use crate::program::{
    COMMA, DOT, GREATER, LBRACKET, LESS, MINUS, PLUS, Program, RBRACKET,
};
use crate::scheduler::CancelHandle;
use crate::tape::Tape;

/// Lifecycle of a run.
///
/// `start` moves any state straight to `Running`; passing through `Idle`
/// in between is not observable, so it is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Constructed or freshly loaded, no run started.
    Idle,
    Running,
    /// The program counter reached the end, or the run was cancelled.
    Halted,
}

/// What a single call to [`Machine::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEffect {
    /// `>` or `<` ran; the new pointer.
    PointerMoved { pointer: usize },
    /// `+` or `-` ran; the pointer and the cell's new value.
    ValueChanged { pointer: usize, value: u8 },
    /// `.` appended this byte to the output.
    Output(u8),
    /// `,` stored this byte (zero if the input was exhausted).
    Input(u8),
    /// A bracket jumped to the bracket at `to`; execution resumes one past it.
    Jumped { from: usize, to: usize },
    /// A bracket whose condition did not hold.
    FellThrough,
    /// `.` or `,` with I/O disabled.
    IoDisabled,
    /// No instruction ran: the program counter is past the end.
    Halted,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The program counter ran off the end of the program.
    Completed,
    Cancelled,
    /// The step budget ran out first. The machine stays `Running`.
    StepLimit,
}

/// The tape machine: program, memory, I/O queues and run state, owned by
/// one instance.
///
/// Observers are notified from inside [`step`](Machine::step), so every run
/// mode (synchronous, bounded, stepped) reports the same events.
pub struct Machine {
    config: MachineConfig,
    program: Program,
    tape: Tape,
    pc: usize,
    /// Consumed from the tail.
    input: Vec<u8>,
    output: Vec<u8>,
    state: RunState,
    steps: u64,
    cancelled: bool,
    cancel: CancelHandle,
    observer: Box<dyn Observer>,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Result<Self, ConfigError> {
        Self::with_observer(config, NoopObserver)
    }

    pub fn with_observer(
        config: MachineConfig,
        observer: impl Observer + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            program: Program::default(),
            tape: Tape::new(config.tape_size),
            pc: 0,
            input: Vec::new(),
            output: Vec::new(),
            state: RunState::Idle,
            steps: 0,
            cancelled: false,
            cancel: CancelHandle::new(),
            observer: Box::new(observer),
        })
    }

    /// Replace the observer. Takes effect from the next instruction.
    pub fn set_observer(&mut self, observer: impl Observer + 'static) {
        self.observer = Box::new(observer);
    }

    /// Validate `source` and make it the current program.
    ///
    /// On success the tape is zeroed and the machine returns to `Idle`. On
    /// failure nothing changes: the previous program and memory stay.
    pub fn load(&mut self, source: &str) -> Result<(), LoadError> {
        let program = match Program::parse(source) {
            Ok(program) => program,
            Err(e) => {
                warn!(error = %e, "rejected program");
                return Err(e);
            }
        };
        debug!(instructions = program.len(), "program loaded");

        self.program = program;
        self.tape.clear();
        self.pc = 0;
        self.input.clear();
        self.output.clear();
        self.steps = 0;
        self.cancelled = false;
        self.cancel.reset();
        self.state = RunState::Idle;
        Ok(())
    }

    /// Begin a run: rewind the pointer and program counter, queue `input`
    /// and clear the output. The tape keeps its contents; only `load`
    /// zeroes it.
    ///
    /// `input` is popped from its last element, see [`input_queue`] for
    /// turning text into that order.
    pub fn start(&mut self, input: &[u8]) {
        self.tape.rewind();
        self.pc = 0;
        self.input = input.to_vec();
        self.output.clear();
        self.steps = 0;
        self.cancelled = false;
        self.cancel.reset();
        self.state = RunState::Running;
    }

    /// Execute the instruction at the program counter and notify observers.
    ///
    /// Returns [`StepEffect::Halted`] without running anything once the
    /// program counter is past the end or cancellation was requested.
    /// Stepping an `Idle` machine moves it to `Running` without resetting
    /// anything but the cancel flag: requests made while idle are dropped.
    pub fn step(&mut self) -> StepEffect {
        if self.cancel.is_requested() && self.state == RunState::Running {
            self.halt_cancelled();
        }
        if self.pc >= self.program.len() {
            self.state = RunState::Halted;
            return StepEffect::Halted;
        }
        if self.state == RunState::Idle {
            self.cancel.reset();
            self.state = RunState::Running;
        }

        let index = self.pc;
        let instruction = self.program.instructions()[index];
        let effect = match instruction {
            GREATER => {
                let pointer = self.tape.move_right();
                self.observer.on_pointer_shift(pointer);
                StepEffect::PointerMoved { pointer }
            }
            LESS => {
                let pointer = self.tape.move_left();
                self.observer.on_pointer_shift(pointer);
                StepEffect::PointerMoved { pointer }
            }
            PLUS => {
                let value = self.tape.increment();
                let pointer = self.tape.pointer();
                self.observer.on_value_change(pointer, value);
                StepEffect::ValueChanged { pointer, value }
            }
            MINUS => {
                let value = self.tape.decrement();
                let pointer = self.tape.pointer();
                self.observer.on_value_change(pointer, value);
                StepEffect::ValueChanged { pointer, value }
            }
            DOT if self.config.io_enabled => {
                let byte = self.tape.current();
                self.output.push(byte);
                self.observer.on_output(byte);
                StepEffect::Output(byte)
            }
            COMMA if self.config.io_enabled => {
                // An exhausted queue reads as zero.
                let byte = self.input.pop().unwrap_or(0);
                self.tape.set_current(byte);
                StepEffect::Input(byte)
            }
            DOT | COMMA => StepEffect::IoDisabled,
            LBRACKET if self.tape.current() == 0 => self.jump(index),
            RBRACKET if self.tape.current() != 0 => self.jump(index),
            LBRACKET | RBRACKET => StepEffect::FellThrough,
            other => unreachable!("non-instruction byte {other:#04x} in a parsed program"),
        };

        self.pc += 1;
        self.steps += 1;
        trace!(index, instruction = %(instruction as char), ?effect, "step");

        self.observer.on_step(&StepView {
            index,
            instruction,
            effect,
            tape: self.tape.cells(),
            pointer: self.tape.pointer(),
            output: &self.output,
        });
        effect
    }

    fn jump(&mut self, from: usize) -> StepEffect {
        let Some(to) = self.program.jump_target(from) else {
            panic!("bracket at {from} has no jump table entry");
        };
        self.pc = to;
        StepEffect::Jumped { from, to }
    }

    /// Run to completion with no pacing. Observers still fire.
    ///
    /// Only returns `Cancelled` if a [`CancelHandle`] fires from another
    /// thread or from inside an observer; programs that loop forever
    /// otherwise never return, use [`run_bounded`](Machine::run_bounded).
    pub fn run(&mut self, input: &[u8]) -> RunOutcome {
        self.start(input);
        while self.step() != StepEffect::Halted {}
        self.finish()
    }

    /// Like [`run`](Machine::run) but executes at most `step_limit`
    /// instructions.
    pub fn run_bounded(&mut self, input: &[u8], step_limit: u64) -> RunOutcome {
        self.start(input);
        while self.steps < step_limit {
            if self.step() == StepEffect::Halted {
                return self.finish();
            }
        }
        // The last step may have been the final instruction.
        if self.pc >= self.program.len() {
            self.state = RunState::Halted;
            return self.finish();
        }
        debug!(steps = self.steps, "step limit reached");
        RunOutcome::StepLimit
    }

    /// Stop the current run: the program counter jumps to the end and the
    /// machine halts. Does nothing unless a run is in progress.
    pub fn cancel(&mut self) {
        if self.state == RunState::Running {
            self.halt_cancelled();
        }
    }

    fn halt_cancelled(&mut self) {
        self.pc = self.program.len();
        self.state = RunState::Halted;
        self.cancelled = true;
    }

    /// A handle that cancels this machine's current run from anywhere,
    /// including another thread or an observer callback. The request is
    /// seen before the next instruction starts.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub(crate) fn finish(&self) -> RunOutcome {
        if self.cancelled {
            info!(steps = self.steps, "run cancelled");
            RunOutcome::Cancelled
        } else {
            info!(steps = self.steps, output_len = self.output.len(), "run completed");
            RunOutcome::Completed
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn tape(&self) -> &[u8] {
        self.tape.cells()
    }

    pub fn pointer(&self) -> usize {
        self.tape.pointer()
    }

    pub fn program_counter(&self) -> usize {
        self.pc
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Input bytes not yet read, in queue order (the last one is read next).
    pub fn pending_input(&self) -> &[u8] {
        &self.input
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Instructions executed since the current run started.
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("config", &self.config)
            .field("program", &self.program.to_string())
            .field("tape", &self.tape)
            .field("pc", &self.pc)
            .field("state", &self.state)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

/// Turn text into an input queue whose first character is read first.
pub fn input_queue(text: &str) -> Vec<u8> {
    text.bytes().rev().collect()
}
