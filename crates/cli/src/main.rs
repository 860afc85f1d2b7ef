// WireSim - SPI Peripheral Simulation Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use wiresim_config::{
    BenchManifest, LineName, ReadAccess, ScenarioScript, ScenarioStep, SlaveConfig,
};
use wiresim_core::bus::PeripheralBus;
use wiresim_core::slave::{LoopbackSlave, PatternSlave};
use wiresim_core::spi::SpiController;
use wiresim_core::BusPeripheral;

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "WireSim Scenario Runner",
    long_about = None
)]
struct Cli {
    /// Enable transfer-level execution tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deterministic, CI-friendly runner mode driven by a scenario script (YAML).
    Run(RunArgs),

    /// Print the power-on state of a bench as JSON.
    Dump(DumpArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the bench manifest (YAML)
    #[arg(short, long)]
    bench: PathBuf,

    /// Path to the scenario script (YAML)
    #[arg(short = 'c', long)]
    scenario: PathBuf,

    /// Directory to write run artifacts (result.json)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct DumpArgs {
    /// Path to the bench manifest (YAML)
    #[arg(short, long)]
    bench: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunResult {
    result_schema_version: String,
    status: String,
    steps_executed: u64,
    checks: Vec<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    scenario_hash: String,
    config: RunConfig,
    controller: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct CheckResult {
    step: usize,
    description: String,
    passed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunConfig {
    bench: PathBuf,
    scenario: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with appropriate level based on --trace flag
    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Commands::Run(args) => run_scenario(args),
        Commands::Dump(args) => dump_bench(args),
    }
}

fn build_bench(manifest: &BenchManifest) -> (Arc<SpiController>, PeripheralBus) {
    let controller = Arc::new(SpiController::with_capacity(
        manifest.controller.buffer_capacity,
    ));

    match &manifest.slave {
        SlaveConfig::None => {
            info!("No slave device attached");
        }
        SlaveConfig::Loopback => {
            // A freshly built controller has no slave yet.
            let _ = controller.attach_slave(Box::new(LoopbackSlave));
        }
        SlaveConfig::Pattern { response } => {
            let _ = controller.attach_slave(Box::new(PatternSlave::new(response.clone())));
        }
    }

    let mut bus = PeripheralBus::new();
    bus.map("spi1", manifest.controller.base_address, controller.clone());
    (controller, bus)
}

fn run_scenario(args: RunArgs) -> ExitCode {
    info!("Starting WireSim scenario run");

    let manifest = match BenchManifest::from_file(&args.bench) {
        Ok(m) => m,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_result(&args, msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let script = match ScenarioScript::from_file(&args.scenario) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_result(&args, msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let scenario_bytes = match std::fs::read(&args.scenario) {
        Ok(b) => b,
        Err(e) => {
            let msg = format!("Failed to read scenario {:?}: {}", args.scenario, e);
            error!("{}", msg);
            write_config_error_result(&args, msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    info!(
        "Bench '{}': controller at {:#x}",
        manifest.name, manifest.controller.base_address
    );
    let (controller, bus) = build_bench(&manifest);
    let base = manifest.controller.base_address;

    let mut checks: Vec<CheckResult> = Vec::new();
    let mut steps_executed: u64 = 0;
    let mut runtime_message: Option<String> = None;

    for (index, step) in script.steps.iter().enumerate() {
        match execute_step(index, step, base, &controller, &bus, &mut checks) {
            Ok(()) => steps_executed += 1,
            Err(e) => {
                let msg = format!("Step {} failed: {:#}", index, e);
                error!("{}", msg);
                runtime_message = Some(msg);
                break;
            }
        }
    }

    let all_passed = checks.iter().all(|c| c.passed);
    let status = if runtime_message.is_some() {
        "error"
    } else if all_passed {
        "pass"
    } else {
        "fail"
    };

    let mut hasher = Sha256::new();
    hasher.update(&scenario_bytes);
    let scenario_hash = format!("{:x}", hasher.finalize());

    let result = RunResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        steps_executed,
        checks,
        message: runtime_message,
        scenario_hash,
        config: RunConfig {
            bench: args.bench.clone(),
            scenario: args.scenario.clone(),
        },
        controller: controller.snapshot(),
    };

    let failed = result.checks.iter().filter(|c| !c.passed).count();
    info!(
        "Scenario finished: {} steps, {} checks, {} failed",
        result.steps_executed,
        result.checks.len(),
        failed
    );

    write_result(&args, &result);

    if result.message.is_some() {
        ExitCode::from(EXIT_RUNTIME_ERROR)
    } else if failed > 0 {
        ExitCode::from(EXIT_ASSERT_FAIL)
    } else {
        ExitCode::from(EXIT_PASS)
    }
}

fn execute_step(
    index: usize,
    step: &ScenarioStep,
    base: u64,
    controller: &SpiController,
    bus: &PeripheralBus,
    checks: &mut Vec<CheckResult>,
) -> anyhow::Result<()> {
    match step {
        ScenarioStep::WriteDword(s) => {
            let a = &s.write_dword;
            tracing::debug!(
                "Step {}: write_dword {:#x} <- {:#x}",
                index,
                a.offset,
                a.value
            );
            bus.write_u32(base + a.offset, a.value)?;
        }
        ScenarioStep::WriteWord(s) => {
            let a = &s.write_word;
            tracing::debug!("Step {}: write_word {:#x} <- {:#x}", index, a.offset, a.value);
            bus.write_u16(base + a.offset, a.value as u16)?;
        }
        ScenarioStep::WriteByte(s) => {
            let a = &s.write_byte;
            tracing::debug!("Step {}: write_byte {:#x} <- {:#x}", index, a.offset, a.value);
            bus.write_u8(base + a.offset, a.value as u8)?;
        }
        ScenarioStep::ReadDword(s) => {
            let a = &s.read_dword;
            let observed = bus.read_u32(base + a.offset)?;
            record_read_check(index, "read_dword", a, observed, checks);
        }
        ScenarioStep::ReadWord(s) => {
            let a = &s.read_word;
            let observed = u32::from(bus.read_u16(base + a.offset)?);
            record_read_check(index, "read_word", a, observed, checks);
        }
        ScenarioStep::ReadByte(s) => {
            let a = &s.read_byte;
            let observed = u32::from(bus.read_u8(base + a.offset)?);
            record_read_check(index, "read_byte", a, observed, checks);
        }
        ScenarioStep::ExpectLine(s) => {
            let e = &s.expect_line;
            let probe = match e.line {
                LineName::Irq => controller.irq(),
                LineName::DmaReceive => controller.dma_receive(),
                LineName::DmaTransmit => controller.dma_transmit(),
            };
            if let Some(wanted) = e.asserted {
                push_check(
                    checks,
                    index,
                    format!("{} asserted == {}", line_label(e.line), wanted),
                    probe.asserted == wanted,
                );
            }
            if let Some(min) = e.min_rising_edges {
                push_check(
                    checks,
                    index,
                    format!("{} rising_edges >= {}", line_label(e.line), min),
                    probe.rising_edges >= min,
                );
            }
        }
        ScenarioStep::ExpectRegister(s) => {
            let e = &s.expect_register;
            let stored = controller.peek_register(e.offset);
            let passed = stored == Some(e.value);
            if !passed {
                error!(
                    "Step {}: register {:#x} holds {:?}, expected {:#x}",
                    index, e.offset, stored, e.value
                );
            }
            push_check(
                checks,
                index,
                format!("register {:#x} == {:#x}", e.offset, e.value),
                passed,
            );
        }
        ScenarioStep::Reset(_) => {
            info!("Step {}: bench reset", index);
            bus.reset();
        }
    }
    Ok(())
}

fn record_read_check(
    index: usize,
    kind: &str,
    access: &ReadAccess,
    observed: u32,
    checks: &mut Vec<CheckResult>,
) {
    let Some(expected) = access.expect else {
        return;
    };
    let passed = observed == expected;
    if !passed {
        error!(
            "Step {}: {} at {:#x} observed {:#x}, expected {:#x}",
            index, kind, access.offset, observed, expected
        );
    }
    checks.push(CheckResult {
        step: index,
        description: format!("{} {:#x} == {:#x}", kind, access.offset, expected),
        passed,
    });
}

fn push_check(checks: &mut Vec<CheckResult>, step: usize, description: String, passed: bool) {
    if !passed {
        error!("Step {}: check failed: {}", step, description);
    }
    checks.push(CheckResult {
        step,
        description,
        passed,
    });
}

fn line_label(line: LineName) -> &'static str {
    match line {
        LineName::Irq => "irq",
        LineName::DmaReceive => "dma_receive",
        LineName::DmaTransmit => "dma_transmit",
    }
}

fn write_result(args: &RunArgs, result: &RunResult) {
    let Some(output_dir) = &args.output_dir else {
        return;
    };

    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!("Failed to create output directory {:?}: {}", output_dir, e);
        return;
    }

    let result_path = output_dir.join("result.json");
    match std::fs::File::create(&result_path) {
        Ok(f) => {
            if let Err(e) = serde_json::to_writer_pretty(f, result) {
                error!("Failed to write result.json: {}", e);
            }
        }
        Err(e) => error!("Failed to create result.json: {}", e),
    }
}

fn write_config_error_result(args: &RunArgs, message: String) {
    let result = RunResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: "error".to_string(),
        steps_executed: 0,
        checks: vec![],
        message: Some(message),
        scenario_hash: String::new(),
        config: RunConfig {
            bench: args.bench.clone(),
            scenario: args.scenario.clone(),
        },
        controller: serde_json::Value::Null,
    };
    write_result(args, &result);
}

fn dump_bench(args: DumpArgs) -> ExitCode {
    let manifest = match BenchManifest::from_file(&args.bench) {
        Ok(m) => m,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let (_controller, bus) = build_bench(&manifest);
    match serde_json::to_string_pretty(&bus.snapshot()) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => {
            error!("Failed to serialize bench snapshot: {}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}
