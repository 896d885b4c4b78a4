use crate::machine::StepEffect;

/// State of the machine right after one instruction ran.
#[derive(Debug, Clone, Copy)]
pub struct StepView<'a> {
    /// Index of the instruction that just ran.
    pub index: usize,
    /// The instruction byte that just ran.
    pub instruction: u8,
    pub effect: StepEffect,
    pub tape: &'a [u8],
    pub pointer: usize,
    pub output: &'a [u8],
}

/// Receives state changes from a running machine.
///
/// Every method is called synchronously from inside `Machine::step`, in
/// program order. For one instruction the specific hook (pointer shift,
/// value change, output) fires first and `on_step` fires last. All methods
/// default to no-ops so implementors only override what they render.
pub trait Observer: Send {
    /// After every instruction, brackets included.
    fn on_step(&mut self, _view: &StepView<'_>) {}

    /// After `>` or `<`, with the new pointer.
    fn on_pointer_shift(&mut self, _pointer: usize) {}

    /// After `+` or `-`, with the pointer and the cell's new value.
    fn on_value_change(&mut self, _pointer: usize, _value: u8) {}

    /// After `.`, with the byte just written.
    fn on_output(&mut self, _byte: u8) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

type StepHook = Box<dyn for<'a> FnMut(&StepView<'a>) + Send>;
type PointerHook = Box<dyn FnMut(usize) + Send>;
type ValueHook = Box<dyn FnMut(usize, u8) + Send>;
type OutputHook = Box<dyn FnMut(u8) + Send>;

/// Closure-backed observer with four independently optional slots.
///
/// ```
/// use tapestep::observer::Hooks;
///
/// let hooks = Hooks::new()
///     .with_output(|byte| print!("{}", byte as char))
///     .with_pointer_shift(|p| eprintln!("pointer -> {p}"));
/// ```
#[derive(Default)]
pub struct Hooks {
    step: Option<StepHook>,
    pointer_shift: Option<PointerHook>,
    value_change: Option<ValueHook>,
    output: Option<OutputHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, f: impl for<'a> FnMut(&StepView<'a>) + Send + 'static) -> Self {
        self.step = Some(Box::new(f));
        self
    }

    pub fn with_pointer_shift(mut self, f: impl FnMut(usize) + Send + 'static) -> Self {
        self.pointer_shift = Some(Box::new(f));
        self
    }

    pub fn with_value_change(mut self, f: impl FnMut(usize, u8) + Send + 'static) -> Self {
        self.value_change = Some(Box::new(f));
        self
    }

    pub fn with_output(mut self, f: impl FnMut(u8) + Send + 'static) -> Self {
        self.output = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("step", &self.step.is_some())
            .field("pointer_shift", &self.pointer_shift.is_some())
            .field("value_change", &self.value_change.is_some())
            .field("output", &self.output.is_some())
            .finish()
    }
}

impl Observer for Hooks {
    fn on_step(&mut self, view: &StepView<'_>) {
        if let Some(f) = self.step.as_mut() {
            f(view);
        }
    }

    fn on_pointer_shift(&mut self, pointer: usize) {
        if let Some(f) = self.pointer_shift.as_mut() {
            f(pointer);
        }
    }

    fn on_value_change(&mut self, pointer: usize, value: u8) {
        if let Some(f) = self.value_change.as_mut() {
            f(pointer, value);
        }
    }

    fn on_output(&mut self, byte: u8) {
        if let Some(f) = self.output.as_mut() {
            f(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn view<'a>(tape: &'a [u8]) -> StepView<'a> {
        StepView {
            index: 0,
            instruction: b'+',
            effect: StepEffect::ValueChanged { pointer: 0, value: 1 },
            tape,
            pointer: 0,
            output: &[],
        }
    }

    #[test]
    fn test_empty_hooks_are_noops() {
        let mut hooks = Hooks::new();
        hooks.on_step(&view(&[1]));
        hooks.on_pointer_shift(3);
        hooks.on_value_change(0, 7);
        hooks.on_output(b'x');
    }

    #[test]
    fn test_each_slot_receives_its_event() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c, d) = (log.clone(), log.clone(), log.clone(), log.clone());
        let mut hooks = Hooks::new()
            .with_step(move |v| a.lock().unwrap().push(format!("step {}", v.tape[0])))
            .with_pointer_shift(move |p| b.lock().unwrap().push(format!("shift {p}")))
            .with_value_change(move |p, v| c.lock().unwrap().push(format!("value {p}={v}")))
            .with_output(move |byte| d.lock().unwrap().push(format!("out {byte}")));

        hooks.on_value_change(0, 1);
        hooks.on_step(&view(&[1]));
        hooks.on_pointer_shift(2);
        hooks.on_output(65);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["value 0=1", "step 1", "shift 2", "out 65"]
        );
    }

    #[test]
    fn test_debug_shows_installed_slots() {
        let hooks = Hooks::new().with_output(|_| {});
        let text = format!("{hooks:?}");
        assert!(text.contains("output: true"));
        assert!(text.contains("step: false"));
    }
}
