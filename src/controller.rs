//! Run loop around [`Cpu::step`].
//!
//! ```text
//!   Running --Pause--> Paused --resume--> Running
//!   Running --Finished--> Finished
//! ```
//!
//! Single-step mode is a flag, not a state: while it is on, every step that
//! does not finish the program pauses.

use std::collections::VecDeque;
use std::io::BufRead;
use std::thread;
use std::time::{Duration, Instant};

use log::Level;
use serde::Serialize;

use crate::cpu::{Cpu, StepResult};
use crate::error::CpuError;
use crate::metrics::{self, Timer};
use crate::opcodes::OPCODE_TABLE;

const PAUSE_PROMPT: &str =
    "Enter 'c' or 'continue' to resume, 'regs' to print registers, 'step' to step one instruction.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecState {
    Running,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseCommand {
    Continue,
    Regs,
    Step,
}

impl PauseCommand {
    /// `None` for anything unrecognized; the caller re-prompts.
    pub fn parse(line: &str) -> Option<PauseCommand> {
        match line.trim() {
            "c" | "continue" => Some(PauseCommand::Continue),
            "regs" => Some(PauseCommand::Regs),
            "step" => Some(PauseCommand::Step),
            _ => None,
        }
    }
}

/// Source of commands while execution is paused. Blocking is allowed.
pub trait PauseHandler {
    /// The next command line, or `None` once the source is closed.
    fn next_command(&mut self) -> Option<String>;
}

/// Reads one command per line, e.g. from stdin.
#[derive(Debug)]
pub struct LinePauseHandler<R: BufRead> {
    reader: R,
}

impl<R: BufRead> LinePauseHandler<R> {
    pub fn new(reader: R) -> Self {
        LinePauseHandler { reader }
    }
}

impl<R: BufRead> PauseHandler for LinePauseHandler<R> {
    fn next_command(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

/// Replays a fixed list of commands, then reports the source closed.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPauseHandler {
    commands: VecDeque<String>,
    served: usize,
}

impl ScriptedPauseHandler {
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedPauseHandler {
            commands: commands.into_iter().map(Into::into).collect(),
            served: 0,
        }
    }

    /// Number of commands handed out so far.
    pub fn served(&self) -> usize {
        self.served
    }
}

impl PauseHandler for ScriptedPauseHandler {
    fn next_command(&mut self) -> Option<String> {
        let command = self.commands.pop_front();
        if command.is_some() {
            self.served += 1;
        }
        command
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// The program ended; total steps executed.
    Finished(u64),
    /// The step bound was reached first.
    StepLimit(u64),
}

impl RunOutcome {
    pub fn steps(&self) -> u64 {
        match self {
            RunOutcome::Finished(steps) | RunOutcome::StepLimit(steps) => *steps,
        }
    }
}

#[derive(Debug)]
pub struct ExecutionController<P: PauseHandler> {
    cpu: Cpu,
    pause_handler: P,
    state: ExecState,
    single_step: bool,
    steps: u64,
    clock_hz: Option<u64>,
    record_metrics: bool,
    // Pacing origin: wall time and cycle count when throttling (re)started
    last_cycle_time: Option<(Instant, u64)>,
}

impl<P: PauseHandler> ExecutionController<P> {
    pub fn new(cpu: Cpu, pause_handler: P) -> Self {
        ExecutionController {
            cpu,
            pause_handler,
            state: ExecState::Running,
            single_step: false,
            steps: 0,
            clock_hz: None,
            record_metrics: false,
            last_cycle_time: None,
        }
    }

    /// Paces execution to roughly `hz` cycles per second. `None` or zero disables pacing.
    pub fn with_clock_hz(mut self, hz: Option<u64>) -> Self {
        self.clock_hz = hz.filter(|&hz| hz > 0);
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        if enabled {
            metrics::init_metrics();
        }
        self.record_metrics = enabled;
        self
    }

    pub fn set_single_step(&mut self, enabled: bool) {
        self.single_step = enabled;
    }

    pub fn single_step(&self) -> bool {
        self.single_step
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn pause_handler(&self) -> &P {
        &self.pause_handler
    }

    pub fn into_cpu(self) -> Cpu {
        self.cpu
    }

    /// Steps until the program finishes, returning the number of steps taken
    /// (the finishing step included).
    pub fn run_until_finish(&mut self) -> Result<u64, CpuError> {
        self.run(None).map(|outcome| outcome.steps())
    }

    /// Like [`run_until_finish`](Self::run_until_finish) but stops after `max_steps`.
    pub fn run_for(&mut self, max_steps: u64) -> Result<RunOutcome, CpuError> {
        self.run(Some(max_steps))
    }

    fn run(&mut self, limit: Option<u64>) -> Result<RunOutcome, CpuError> {
        let mut executed = 0u64;
        if self.state == ExecState::Paused {
            self.pause();
        }

        while self.state != ExecState::Finished {
            if limit.is_some_and(|limit| executed >= limit) {
                return Ok(RunOutcome::StepLimit(self.steps));
            }
            if self.clock_hz.is_some() && self.last_cycle_time.is_none() {
                self.last_cycle_time = Some((Instant::now(), self.cpu.total_cycles()));
            }

            let result = self.step_once()?;
            self.steps += 1;
            executed += 1;

            match result {
                StepResult::Finished => {
                    if self.single_step {
                        self.record_pause("single_step");
                        self.pause();
                    }
                    self.state = ExecState::Finished;
                    self.cpu
                        .diagnostics
                        .info(&format!("Finished after {} steps", self.steps));
                }
                StepResult::Pause => {
                    self.record_pause("breakpoint");
                    self.pause();
                }
                StepResult::Continue if self.single_step => {
                    self.record_pause("single_step");
                    self.pause();
                }
                StepResult::Continue => {}
            }

            self.throttle();
        }
        Ok(RunOutcome::Finished(self.steps))
    }

    fn step_once(&mut self) -> Result<StepResult, CpuError> {
        let pc = self.cpu.get_pc();
        if self.cpu.diagnostics.enabled(Level::Trace) {
            let opcode = self.cpu.memory().read(pc);
            let mnemonic = OPCODE_TABLE
                .get(opcode)
                .map_or("???", |d| d.mnemonic.name());
            self.cpu.diagnostics.trace(&format!(
                "{:04X}  {:02X}  {:<4} {}",
                pc,
                opcode,
                mnemonic,
                self.cpu.register_summary()
            ));
        }

        let timer = Timer::new();
        let result = self.cpu.step()?;

        if self.record_metrics {
            if let Some(instruction) = self.cpu.last_instruction().filter(|i| i.address == pc) {
                metrics::record_instruction(
                    instruction.descriptor,
                    instruction.cycles(),
                    timer.elapsed(),
                );
            }
        }
        Ok(result)
    }

    fn record_pause(&self, reason: &str) {
        if self.record_metrics {
            metrics::record_pause(reason);
        }
    }

    /// Blocks on the pause handler until a resume or step command arrives.
    fn pause(&mut self) {
        self.state = ExecState::Paused;
        self.cpu.diagnostics.info(&format!(
            "Paused at PC={:04X}. {}",
            self.cpu.get_pc(),
            PAUSE_PROMPT
        ));

        loop {
            let Some(line) = self.pause_handler.next_command() else {
                // Closed source: nothing can resume us later, so run to the end
                self.single_step = false;
                break;
            };
            match PauseCommand::parse(&line) {
                Some(PauseCommand::Continue) => {
                    self.single_step = false;
                    break;
                }
                Some(PauseCommand::Regs) => {
                    let summary = self.cpu.register_summary();
                    self.cpu.diagnostics.info(&summary);
                }
                Some(PauseCommand::Step) => {
                    self.single_step = true;
                    self.cpu.diagnostics.info("Single Step Mode Enabled");
                    break;
                }
                None => {
                    self.cpu
                        .diagnostics
                        .warn(&format!("Unknown command `{}`. {}", line, PAUSE_PROMPT));
                }
            }
        }

        self.state = ExecState::Running;
        self.last_cycle_time = None;
    }

    /// Sleeps until wall time catches up with the cycles run since pacing started.
    fn throttle(&mut self) {
        let Some(hz) = self.clock_hz else {
            return;
        };
        let cycles = self.cpu.total_cycles();
        let (origin, origin_cycles) = *self.last_cycle_time.get_or_insert((Instant::now(), cycles));

        let owed = cycles.saturating_sub(origin_cycles);
        let target = Duration::from_secs_f64(owed as f64 / hz as f64);
        let elapsed = origin.elapsed();
        if target > elapsed {
            thread::sleep(target - elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CapturedDiagnostics;
    use std::io::Cursor;

    fn controller_for(
        program: &[u8],
        commands: &[&str],
    ) -> (ExecutionController<ScriptedPauseHandler>, CapturedDiagnostics) {
        let sink = CapturedDiagnostics::new();
        let mut cpu = Cpu::with_diagnostics(Box::new(sink.clone()));
        cpu.load_program(program, 0x0600);
        let handler = ScriptedPauseHandler::new(commands.iter().copied());
        (ExecutionController::new(cpu, handler), sink)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(PauseCommand::parse("c"), Some(PauseCommand::Continue));
        assert_eq!(PauseCommand::parse("continue\n"), Some(PauseCommand::Continue));
        assert_eq!(PauseCommand::parse(" regs "), Some(PauseCommand::Regs));
        assert_eq!(PauseCommand::parse("step"), Some(PauseCommand::Step));
        assert_eq!(PauseCommand::parse("quit"), None);
        assert_eq!(PauseCommand::parse(""), None);
    }

    #[test]
    fn test_runs_to_finish() {
        // LDA #$42 ; STA $0200 ; NOP ; (BRK)
        let (mut controller, _) = controller_for(&[0xA9, 0x42, 0x8D, 0x00, 0x02, 0xEA], &[]);
        let steps = controller.run_until_finish().unwrap();

        assert_eq!(steps, 4);
        assert_eq!(controller.state(), ExecState::Finished);
        assert_eq!(controller.cpu().get_register_a(), 0x42);
        assert_eq!(controller.cpu().memory().read(0x0200), 0x42);
    }

    #[test]
    fn test_breakpoint_consults_pause_handler() {
        // DBP ; LDA #$01
        let (mut controller, sink) = controller_for(&[0x03, 0xA9, 0x01], &["regs", "bogus", "c"]);
        controller.run_until_finish().unwrap();

        assert_eq!(controller.pause_handler().served(), 3);
        assert_eq!(controller.cpu().get_register_a(), 0x01);
        let messages = sink.messages();
        assert!(messages.iter().any(|m| m == "PC=0601 A=00 X=00 Y=00 S=FF P=00"));
        assert_eq!(sink.messages_at(Level::Warn).len(), 1);
    }

    #[test]
    fn test_single_step_pauses_after_every_step() {
        // NOP ; NOP ; NOP ; (BRK)
        let (mut controller, sink) = controller_for(&[0xEA, 0xEA, 0xEA], &["step", "c"]);
        controller.set_single_step(true);
        let steps = controller.run_until_finish().unwrap();

        assert_eq!(steps, 4);
        assert!(!controller.single_step());
        let pauses = sink
            .messages()
            .iter()
            .filter(|m| m.starts_with("Paused at"))
            .count();
        // after NOP 1 (step), after NOP 2 (c), then free-running
        assert_eq!(pauses, 2);
    }

    #[test]
    fn test_single_step_pauses_after_finishing_step() {
        // NOP ; (BRK)
        let (mut controller, sink) = controller_for(&[0xEA], &["step", "step", "step"]);
        controller.set_single_step(true);
        let steps = controller.run_until_finish().unwrap();

        assert_eq!(steps, 2);
        assert_eq!(controller.state(), ExecState::Finished);
        assert_eq!(controller.pause_handler().served(), 2);
        assert!(controller.single_step());
        assert!(sink.messages().iter().any(|m| m.starts_with("Paused at PC=0601")));
        assert_eq!(sink.messages().last().unwrap(), "Finished after 2 steps");
    }

    #[test]
    fn test_closed_source_resumes() {
        let (mut controller, _) = controller_for(&[0x03, 0x03, 0xA9, 0x07], &[]);
        controller.set_single_step(true);
        controller.run_until_finish().unwrap();
        assert_eq!(controller.state(), ExecState::Finished);
        assert_eq!(controller.cpu().get_register_a(), 0x07);
        assert!(!controller.single_step());
    }

    #[test]
    fn test_line_pause_handler() {
        let mut handler = LinePauseHandler::new(Cursor::new("regs\nc\n"));
        assert_eq!(handler.next_command().as_deref(), Some("regs"));
        assert_eq!(handler.next_command().as_deref(), Some("c"));
        assert_eq!(handler.next_command(), None);
    }

    #[test]
    fn test_step_limit() {
        // JMP $0600
        let (mut controller, _) = controller_for(&[0x4C, 0x00, 0x06], &[]);
        assert_eq!(controller.run_for(10).unwrap(), RunOutcome::StepLimit(10));
        assert_eq!(controller.state(), ExecState::Running);
        assert_eq!(controller.run_for(5).unwrap(), RunOutcome::StepLimit(15));
    }

    #[test]
    fn test_fatal_error_surfaces() {
        let (mut controller, _) = controller_for(&[0xEA, 0xFC], &[]);
        let err = controller.run_until_finish().unwrap_err();
        assert_eq!(
            err,
            CpuError::UnsupportedInstruction {
                opcode: 0xFC,
                pc: 0x0601
            }
        );
        assert_eq!(controller.steps(), 1);
    }

    #[test]
    fn test_throttle_paces_wall_clock() {
        // NOP x3 ; (BRK) = 13 cycles, 13 ms at 1 kHz
        let (controller, _) = controller_for(&[0xEA, 0xEA, 0xEA], &[]);
        let mut controller = controller.with_clock_hz(Some(1_000));
        let start = Instant::now();
        controller.run_until_finish().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert_eq!(controller.cpu().total_cycles(), 13);
    }

    #[test]
    fn test_clock_does_not_change_results() {
        let program = [0xA9, 0x05, 0x69, 0x07, 0xAA];
        let (mut fast, _) = controller_for(&program, &[]);
        let (slow, _) = controller_for(&program, &[]);
        let mut slow = slow.with_clock_hz(Some(100_000));
        fast.run_until_finish().unwrap();
        slow.run_until_finish().unwrap();
        assert_eq!(fast.cpu().get_state(), slow.cpu().get_state());
    }
}
