use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Once;
use std::time::{Duration, Instant};

use crate::opcodes::InstructionDescriptor;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Counter for instructions executed by opcode
    pub static ref CPU_INSTRUCTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("cpu_instructions_total", "Total number of CPU instructions executed by opcode"),
        &["opcode", "mnemonic"]
    ).expect("Failed to create CPU instructions counter");

    /// Counter for CPU cycles executed
    pub static ref CPU_CYCLES_TOTAL: Counter = Counter::new(
        "cpu_cycles_total", "Total number of CPU cycles executed"
    ).expect("Failed to create CPU cycles counter");

    /// Histogram for instruction execution time
    pub static ref INSTRUCTION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("instruction_duration_seconds", "Time spent executing instructions")
            .buckets(vec![0.000001, 0.000005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001]),
        &["mnemonic"]
    ).expect("Failed to create instruction duration histogram");

    /// Counter for controller pauses by cause
    pub static ref CONTROLLER_PAUSES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("controller_pauses_total", "Total number of execution pauses"),
        &["reason"]
    ).expect("Failed to create controller pauses counter");

    /// Counter for program loads
    pub static ref PROGRAMS_LOADED_TOTAL: Counter = Counter::new(
        "programs_loaded_total", "Total number of programs loaded"
    ).expect("Failed to create program loads counter");
}

static INIT: Once = Once::new();

/// Registers every metric with [`REGISTRY`]. Safe to call more than once.
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(CPU_INSTRUCTIONS_TOTAL.clone()),
            Box::new(CPU_CYCLES_TOTAL.clone()),
            Box::new(INSTRUCTION_DURATION.clone()),
            Box::new(CONTROLLER_PAUSES_TOTAL.clone()),
            Box::new(PROGRAMS_LOADED_TOTAL.clone()),
        ];
        for collector in collectors {
            if let Err(err) = REGISTRY.register(collector) {
                log::warn!("metric registration failed: {}", err);
            }
        }
    });
}

/// Record one executed instruction and its cycle cost
pub fn record_instruction(descriptor: &InstructionDescriptor, cycles: u32, duration: Duration) {
    let mnemonic = descriptor.mnemonic.name();
    CPU_INSTRUCTIONS_TOTAL
        .with_label_values(&[&format!("0x{:02X}", descriptor.opcode), mnemonic])
        .inc();

    CPU_CYCLES_TOTAL.inc_by(cycles as f64);

    INSTRUCTION_DURATION
        .with_label_values(&[mnemonic])
        .observe(duration.as_secs_f64());
}

/// Record a pause; `reason` is `breakpoint` or `single_step`
pub fn record_pause(reason: &str) {
    CONTROLLER_PAUSES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_program_load() {
    PROGRAMS_LOADED_TOTAL.inc();
}

/// Text exposition of everything in [`REGISTRY`]
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        log::warn!("metrics encoding failed: {}", err);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Helper struct for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
