use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::path::PathBuf;

use wdc65c02_emulator::assembler::{Assembler, TassAssembler};
use wdc65c02_emulator::config::parse_address;
use wdc65c02_emulator::{
    metrics, vectors, Checkpoint, CheckpointReason, ClockProfile, Cpu, ExecState,
    ExecutionController, LinePauseHandler, Mnemonic, RunConfig, RunOutcome, OPCODE_TABLE,
};

#[derive(Parser)]
#[command(name = "wdc65c02_emulator", version, about = "WDC 65C02 emulator")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a program and run it to completion
    Run(RunArgs),

    /// Run SingleStepTests-style JSON vectors (files or directories)
    Vectors {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Also run BRK, STP, WAI, the debug slots and undefined opcodes
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Print the opcode table, or the rows of one mnemonic
    Opcodes { mnemonic: Option<String> },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Raw binary, or assembly source with --asm
    program: PathBuf,

    /// Load address, e.g. 0x0600 or $0600
    #[arg(long, value_parser = parse_address)]
    base: Option<u16>,

    /// Assemble the program with 64tass first
    #[arg(long, default_value_t = false)]
    asm: bool,

    /// JSON run configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Clock profile name (micro, standard, turbo, ...) or a frequency in Hz
    #[arg(long)]
    clock: Option<ClockProfile>,

    #[arg(long)]
    max_steps: Option<u64>,

    /// Pause after every instruction
    #[arg(long, default_value_t = false)]
    single_step: bool,

    #[arg(long)]
    log_level: Option<String>,

    /// Record Prometheus metrics and print them on exit
    #[arg(long, default_value_t = false)]
    metrics: bool,

    /// Write the final state as JSON
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Write a compressed checkpoint of the final state
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

impl RunArgs {
    fn resolve_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => RunConfig::default(),
        };
        if let Some(base) = self.base {
            config.base_address = base;
        }
        if let Some(clock) = self.clock {
            config.clock = clock;
        }
        if self.max_steps.is_some() {
            config.max_steps = self.max_steps;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config.single_step |= self.single_step;
        config.record_metrics |= self.metrics;
        Ok(config)
    }
}

fn init_logging(level: &str) {
    // RUST_LOG still wins over the configured level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Run(run) => {
            let config = run.resolve_config()?;
            init_logging(&config.log_level);
            run_program(&run, &config)
        }
        Command::Vectors { paths, all } => {
            init_logging("warn");
            run_vectors(&paths, all)
        }
        Command::Opcodes { mnemonic } => print_opcodes(mnemonic.as_deref()),
    }
}

fn load_bytes(run: &RunArgs, config: &RunConfig) -> Result<Vec<u8>> {
    if run.asm {
        let assembler = TassAssembler::from_config(&config.assembler);
        return assembler
            .assemble_file(&run.program)
            .with_context(|| format!("assembling {}", run.program.display()));
    }
    fs::read(&run.program).with_context(|| format!("reading {}", run.program.display()))
}

fn run_program(run: &RunArgs, config: &RunConfig) -> Result<()> {
    let program = load_bytes(run, config)?;
    if program.is_empty() {
        bail!("{} is empty", run.program.display());
    }

    let mut cpu = Cpu::new();
    cpu.load_program(&program, config.base_address);
    if config.record_metrics {
        metrics::init_metrics();
        metrics::record_program_load();
    }
    log::info!(
        "Loaded {} bytes at ${:04X}, clock {}",
        program.len(),
        config.base_address,
        config.clock
    );

    let stdin = io::stdin();
    let mut controller = ExecutionController::new(cpu, LinePauseHandler::new(stdin.lock()))
        .with_clock_hz(config.clock.hz())
        .with_metrics(config.record_metrics);
    controller.set_single_step(config.single_step);

    let outcome = match config.max_steps {
        Some(limit) => controller.run_for(limit),
        None => controller.run_until_finish().map(RunOutcome::Finished),
    };
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("{}", controller.cpu().register_summary());
            bail!("execution stopped: {}", err);
        }
    };

    let cpu = controller.cpu();
    match outcome {
        RunOutcome::Finished(steps) => println!("Finished after {} steps", steps),
        RunOutcome::StepLimit(steps) => println!("Stopped at step limit after {} steps", steps),
    }
    println!("{}", cpu.register_summary());
    println!("Cycles: {}", cpu.total_cycles());

    if let Some(path) = &run.save_state {
        let raw = cpu.get_state().to_raw();
        fs::write(path, serde_json::to_string_pretty(&raw)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &run.checkpoint {
        let reason = match controller.state() {
            ExecState::Finished => CheckpointReason::Finished,
            _ => CheckpointReason::Manual,
        };
        let name = run
            .program
            .file_name()
            .map_or_else(|| "program".to_string(), |n| n.to_string_lossy().into_owned());
        Checkpoint::capture(cpu, name, reason, controller.steps())
            .save(path)
            .with_context(|| format!("writing checkpoint {}", path.display()))?;
    }
    if config.record_metrics {
        print!("{}", metrics::gather_text());
    }
    Ok(())
}

fn run_vectors(paths: &[PathBuf], all: bool) -> Result<()> {
    let mut failed_files = 0usize;
    let mut total = 0usize;

    for path in paths {
        for file in vectors::collect_files(path)? {
            if !all && vectors::is_skipped(&file) {
                log::info!("skipping {}", file.display());
                continue;
            }
            let report = vectors::run_file(&file)
                .with_context(|| format!("running {}", file.display()))?;
            total += 1;
            println!("{}", report);
            if !report.is_success() {
                failed_files += 1;
                for failure in report.failures.iter().take(3) {
                    println!("    {}", failure);
                }
            }
        }
    }

    println!("{} of {} files passed", total - failed_files, total);
    if failed_files > 0 {
        bail!("{} vector files failed", failed_files);
    }
    Ok(())
}

fn print_opcodes(mnemonic: Option<&str>) -> Result<()> {
    let rows = match mnemonic {
        Some(name) => {
            let mnemonic: Mnemonic = name.parse().map_err(anyhow::Error::msg)?;
            OPCODE_TABLE.by_mnemonic(mnemonic)
        }
        None => OPCODE_TABLE.iter().collect(),
    };

    println!("OP  MNEM  MODE                          BYTES CYCLES");
    for d in rows {
        println!(
            "{:02X}  {:<4}  {:<28}  {:>5} {:>6}",
            d.opcode,
            d.mnemonic,
            format!("{:?}", d.mode),
            d.bytes,
            d.cycles
        );
    }
    Ok(())
}
