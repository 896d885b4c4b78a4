use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rayon::prelude::*;
use tracing::info;

use crate::config::{DEFAULT_TAPE_SIZE, MachineConfig};
use crate::error::ConfigError;
use crate::machine::{Machine, RunOutcome};
use crate::program::{COMMA, DOT, GREATER, LBRACKET, LESS, MINUS, PLUS, RBRACKET};

const OPS: [u8; 8] = [LESS, GREATER, MINUS, PLUS, DOT, COMMA, LBRACKET, RBRACKET];

/// Configuration for a throughput benchmark over random programs.
#[derive(Debug, Clone, Copy)]
pub struct BenchConfig {
    /// Number of programs to generate and run.
    pub programs: usize,
    /// Instructions per program.
    pub program_len: usize,
    /// Maximum steps per program run.
    pub step_limit: u64,
    pub tape_size: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            programs: 1 << 12,
            program_len: 64,
            step_limit: 1 << 13, // 8192
            tape_size: DEFAULT_TAPE_SIZE,
        }
    }
}

/// Totals from one benchmark batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BenchReport {
    pub programs: usize,
    pub total_steps: u64,
    /// Programs that ran off their end within the step limit.
    pub completed: usize,
    /// Programs stopped by the step limit.
    pub step_limited: usize,
}

/// Generate a random program of exactly `len` instructions whose brackets
/// always balance.
///
/// A `[` is only placed when there is room left to close it; once the open
/// depth equals the remaining length every slot is a `]`. Brackets that
/// cannot be placed become `+`.
pub fn random_program(rng: &mut SmallRng, len: usize) -> String {
    let mut code = String::with_capacity(len);
    let mut depth = 0usize;
    for i in 0..len {
        let remaining = len - i;
        let op = if depth == remaining {
            RBRACKET
        } else {
            OPS[rng.gen_range(0..OPS.len())]
        };
        let op = match op {
            LBRACKET if depth + 1 < remaining => {
                depth += 1;
                LBRACKET
            }
            RBRACKET if depth > 0 => {
                depth -= 1;
                RBRACKET
            }
            LBRACKET | RBRACKET => PLUS,
            other => other,
        };
        code.push(op as char);
    }
    code
}

/// Generate `config.programs` random programs from `seed` and run them in
/// parallel, each on its own machine with a random input queue.
///
/// Generation is sequential so a seed always yields the same batch.
pub fn run_batch(config: BenchConfig, seed: u64) -> Result<BenchReport, ConfigError> {
    let machine_config = MachineConfig {
        tape_size: config.tape_size,
        io_enabled: true,
    };
    machine_config.validate()?;

    let mut rng = SmallRng::seed_from_u64(seed);
    let jobs: Vec<(String, Vec<u8>)> = (0..config.programs)
        .map(|_| {
            let source = random_program(&mut rng, config.program_len);
            let mut input = vec![0u8; rng.gen_range(0..16)];
            rng.fill(&mut input[..]);
            (source, input)
        })
        .collect();

    let results: Vec<(u64, RunOutcome)> = jobs
        .par_iter()
        .map(|(source, input)| -> Result<(u64, RunOutcome), ConfigError> {
            let mut machine = Machine::new(machine_config)?;
            machine
                .load(source)
                .unwrap_or_else(|e| unreachable!("generated program failed to load: {e}"));
            let outcome = machine.run_bounded(input, config.step_limit);
            Ok((machine.steps(), outcome))
        })
        .collect::<Result<_, _>>()?;

    let mut report = BenchReport {
        programs: results.len(),
        ..Default::default()
    };
    for (steps, outcome) in results {
        report.total_steps += steps;
        match outcome {
            RunOutcome::StepLimit => report.step_limited += 1,
            _ => report.completed += 1,
        }
    }
    info!(
        programs = report.programs,
        total_steps = report.total_steps,
        step_limited = report.step_limited,
        "benchmark batch finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Program;

    #[test]
    fn test_random_programs_have_exact_length() {
        let mut rng = SmallRng::seed_from_u64(7);
        for len in 0..64 {
            assert_eq!(random_program(&mut rng, len).len(), len);
        }
    }

    #[test]
    fn test_random_programs_always_load() {
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..500 {
            let source = random_program(&mut rng, 32);
            assert!(Program::parse(&source).is_ok(), "{source}");
        }
    }

    #[test]
    fn test_deterministic_batch() {
        let config = BenchConfig {
            programs: 64,
            program_len: 24,
            step_limit: 256,
            ..Default::default()
        };
        let a = run_batch(config, 42).unwrap();
        let b = run_batch(config, 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.programs, 64);
        assert_eq!(a.completed + a.step_limited, 64);
        assert!(a.total_steps <= 64 * 256);
    }

    #[test]
    fn test_zero_tape_rejected() {
        let config = BenchConfig {
            tape_size: 0,
            ..Default::default()
        };
        assert_eq!(run_batch(config, 1), Err(ConfigError::EmptyTape));
    }
}
