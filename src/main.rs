use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tapestep::bench::{BenchConfig, run_batch};
use tapestep::config::{DEFAULT_TAPE_SIZE, GOLF_TAPE_SIZE};
use tapestep::golf::Challenge;
use tapestep::{
    CancelHandle, ConfigError, Hooks, LoadError, Machine, MachineConfig, RunOutcome, StepView, ThreadPacer,
    input_queue,
};
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tapestep", about = "Steppable tape machine for the 8-instruction language")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and run a program.
    Run(RunArgs),
    /// Run a program in golf mode and judge the tape against targets.
    Golf(GolfArgs),
    /// Validate a program and print its disassembly.
    Check(SourceArgs),
    /// Run random programs in parallel and report throughput.
    Bench(BenchArgs),
}

#[derive(Args)]
struct SourceArgs {
    /// Program file. Reads stdin when neither FILE nor --code is given.
    file: Option<PathBuf>,

    /// Program text given inline.
    #[arg(long, conflicts_with = "file")]
    code: Option<String>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Input text; the first character is read first.
    #[arg(long, default_value = "")]
    input: String,

    /// Number of tape cells.
    #[arg(long, default_value_t = DEFAULT_TAPE_SIZE)]
    tape_size: usize,

    /// Treat `.` and `,` as no-ops.
    #[arg(long)]
    no_io: bool,

    /// Pause this long after each visible instruction and print the tape.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Stop after this many instructions.
    #[arg(long)]
    max_steps: Option<u64>,
}

#[derive(Args)]
struct GolfArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Target cell values, comma separated.
    #[arg(long, value_delimiter = ',', required = true)]
    targets: Vec<u8>,

    #[arg(long, default_value_t = GOLF_TAPE_SIZE)]
    tape_size: usize,

    /// Stop after this many instructions.
    #[arg(long, default_value_t = 1 << 20)]
    max_steps: u64,
}

#[derive(Args)]
struct BenchArgs {
    /// Random seed for reproducibility.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of programs per batch.
    #[arg(long, default_value_t = 1 << 12)]
    programs: usize,

    /// Instructions per program.
    #[arg(long, default_value_t = 64)]
    program_len: usize,

    /// Max steps per program run.
    #[arg(long, default_value_t = 1 << 13)]
    step_limit: u64,

    #[arg(long, default_value_t = DEFAULT_TAPE_SIZE)]
    tape_size: usize,

    /// Number of batches to run.
    #[arg(long, default_value_t = 1)]
    batches: u64,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("could not read program: {0}")]
    Io(#[from] io::Error),
    #[error("invalid program: {0}")]
    Load(#[from] LoadError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Golf(args) => golf(args),
        Command::Check(args) => check(args),
        Command::Bench(args) => bench(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn read_source(args: &SourceArgs) -> Result<String, CliError> {
    if let Some(code) = &args.code {
        return Ok(code.clone());
    }
    match &args.file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
    }
}

/// One line per tape state, the active cell bracketed.
fn render_tape(view: &StepView<'_>) -> String {
    let cells: Vec<String> = view
        .tape
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if i == view.pointer {
                format!("[{v:3}]")
            } else {
                format!(" {v:3} ")
            }
        })
        .collect();
    format!("{:04} {} |{}", view.index, view.instruction as char, cells.join(""))
}

/// Output hook that writes each byte through as it is produced. A failed
/// write (closed pipe, full disk) cancels the run instead of spinning on.
fn forward_output<W: Write + Send + 'static>(
    mut out: W,
    handle: CancelHandle,
) -> impl FnMut(u8) + Send + 'static {
    move |byte| {
        if let Err(e) = out.write_all(&[byte]).and_then(|()| out.flush()) {
            warn!(error = %e, "output write failed, cancelling run");
            handle.cancel();
        }
    }
}

fn run(args: RunArgs) -> Result<(), CliError> {
    let source = read_source(&args.source)?;
    let config = MachineConfig {
        tape_size: args.tape_size,
        io_enabled: !args.no_io,
    };
    let input = input_queue(&args.input);

    let Some(delay_ms) = args.delay_ms else {
        let mut machine = Machine::new(config)?;
        machine.load(&source)?;
        let outcome = match args.max_steps {
            Some(limit) => machine.run_bounded(&input, limit),
            None => machine.run(&input),
        };
        io::stdout().write_all(machine.output())?;
        io::stdout().flush()?;
        report(outcome, machine.steps());
        return Ok(());
    };

    let mut machine = Machine::new(config)?;
    let handle = machine.cancel_handle();
    let output_handle = handle.clone();
    let max_steps = args.max_steps;
    let mut steps = 0u64;
    machine.set_observer(
        Hooks::new()
            .with_output(forward_output(io::stdout(), output_handle))
            .with_step(move |view| {
                if tapestep::program::is_visible(view.instruction) {
                    eprintln!("{}", render_tape(view));
                }
                steps += 1;
                if max_steps.is_some_and(|limit| steps >= limit) {
                    handle.cancel();
                }
            }),
    );
    machine.load(&source)?;
    let outcome = machine.run_stepped(Duration::from_millis(delay_ms), &input, &mut ThreadPacer);
    report(outcome, machine.steps());
    Ok(())
}

fn report(outcome: RunOutcome, steps: u64) {
    match outcome {
        RunOutcome::Completed => eprintln!("\nhalted after {steps} steps"),
        RunOutcome::Cancelled => eprintln!("\ncancelled after {steps} steps"),
        RunOutcome::StepLimit => eprintln!("\nstopped at step limit ({steps} steps)"),
    }
}

fn golf(args: GolfArgs) -> Result<(), CliError> {
    let source = read_source(&args.source)?;
    let config = MachineConfig {
        tape_size: args.tape_size,
        ..MachineConfig::golf()
    };
    let mut machine = Machine::new(config)?;
    machine.load(&source)?;
    let outcome = machine.run_bounded(&[], args.max_steps);
    if outcome == RunOutcome::StepLimit {
        eprintln!("stopped at step limit ({} steps)", machine.steps());
    }

    let verdict = Challenge::new(&args.targets).evaluate(&machine);
    if verdict.solved {
        println!("solved");
        println!(
            "Your program is {} instructions long. Can you make it shorter?",
            verdict.program_len
        );
    } else {
        println!("not solved, cells differ at {:?}", verdict.mismatched_cells);
        println!("tape: {:?}", machine.tape());
    }
    Ok(())
}

fn check(args: SourceArgs) -> Result<(), CliError> {
    let source = read_source(&args)?;
    let program = tapestep::Program::parse(&source)?;
    print!("{}", program.disassemble());
    eprintln!("{} instructions", program.len());
    Ok(())
}

fn bench(args: BenchArgs) -> Result<(), CliError> {
    let config = BenchConfig {
        programs: args.programs,
        program_len: args.program_len,
        step_limit: args.step_limit,
        tape_size: args.tape_size,
    };

    let start = std::time::Instant::now();
    let mut total_steps = 0u64;
    let mut step_limited = 0usize;
    for batch in 0..args.batches {
        let report = run_batch(config, args.seed.wrapping_add(batch))?;
        total_steps += report.total_steps;
        step_limited += report.step_limited;
    }
    let elapsed = start.elapsed();

    let total_programs = args.batches * args.programs as u64;
    let steps_per_sec = total_steps as f64 / elapsed.as_secs_f64();

    eprintln!("Benchmark results:");
    eprintln!("  Batches:           {}", args.batches);
    eprintln!("  Programs:          {total_programs}");
    eprintln!("  Hit step limit:    {step_limited}");
    eprintln!("  Total steps:       {total_steps}");
    eprintln!("  Elapsed:           {elapsed:.2?}");
    eprintln!("  Steps/sec:         {steps_per_sec:.0}");
    Ok(())
}
