// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::Context;
use clap::{Parser, Subcommand};
use orkarv_bootloader::{
    BootloaderError, HostState, MemoryTransport, SerialTransport, TargetSession, UploadOptions,
    Uploader,
};
use orkarv_config::MemorySpec;
use orkarv_core::bus::{SystemBus, RAM_BASE};
use orkarv_core::cpu::RiscV;
use orkarv_core::{Cpu, Machine, StopReason};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

fn parse_u32_addr(s: &str) -> Result<u32, String> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex address '{}': {}", s, e))
    } else {
        u32::from_str(trimmed).map_err(|e| format!("Invalid address '{}': {}", s, e))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "orkarv RV32I SoC simulator and firmware uploader", long_about = None)]
struct Cli {
    /// Enable instruction-level execution tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run firmware on the simulated SoC until it reports pass or fail.
    Run(RunArgs),

    /// Send firmware to a target running the serial bootloader.
    Upload(UploadArgs),

    /// Validate a memory map and print it.
    MemoryMap(MemoryMapArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Firmware ELF, or a flat binary placed at the RAM base
    firmware: PathBuf,

    /// Memory map (YAML) describing the SoC; the reference layout otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of steps to execute
    #[arg(long, default_value = "20000")]
    max_steps: u64,

    /// Breakpoint PC address (repeatable)
    #[arg(long, value_parser = parse_u32_addr)]
    breakpoint: Vec<u32>,

    /// Stop on the first synchronous trap instead of entering the handler
    #[arg(long)]
    stop_on_trap: bool,
}

#[derive(Parser, Debug)]
struct UploadArgs {
    /// Firmware ELF or flat binary
    firmware: PathBuf,

    /// Serial port the target is attached to
    #[arg(short, long)]
    port: Option<String>,

    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// Pulse DTR and wait for the bootloader banner first
    #[arg(long)]
    reset: bool,

    /// Wait for the target to confirm the checksum
    #[arg(long)]
    await_verdict: bool,

    /// Serial read timeout in milliseconds
    #[arg(long, default_value = "3000")]
    timeout_ms: u64,

    /// Upload into the simulated SoC over an in-process link, then run it
    #[arg(long, conflicts_with = "port")]
    loopback: bool,

    /// Memory map for --loopback
    #[arg(short, long, requires = "loopback")]
    config: Option<PathBuf>,

    /// Step limit for --loopback
    #[arg(long, default_value = "20000")]
    max_steps: u64,
}

#[derive(Parser, Debug)]
struct MemoryMapArgs {
    /// Memory map (YAML)
    config: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

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
        Commands::Run(args) => run_firmware(args),
        Commands::Upload(args) => upload(args),
        Commands::MemoryMap(args) => memory_map(args),
    }
}

fn build_bus(config: Option<&Path>) -> anyhow::Result<SystemBus> {
    match config {
        Some(path) => {
            let spec = MemorySpec::from_file(path)?;
            SystemBus::from_spec(&spec)
                .with_context(|| format!("Failed to build bus from {:?}", path))
        }
        None => Ok(SystemBus::new()),
    }
}

fn ram_base(bus: &SystemBus) -> u32 {
    bus.ram_region().map_or(RAM_BASE, |r| r.base)
}

fn run_firmware(args: RunArgs) -> ExitCode {
    let bus = match build_bus(args.config.as_deref()) {
        Ok(bus) => bus,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    info!("Loading firmware: {:?}", args.firmware);
    let program = match orkarv_loader::load_firmware(&args.firmware, ram_base(&bus)) {
        Ok(program) => program,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let mut machine = Machine::new(RiscV::new(), bus);
    machine.stop_on_trap = args.stop_on_trap;
    machine.breakpoints.extend(args.breakpoint);
    machine
        .bus
        .attach_uart_tx_sink(Arc::new(Mutex::new(Vec::new())), true);

    if let Err(e) = machine.load_firmware(&program) {
        error!("Failed to place firmware in memory: {}", e);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    finish(&mut machine, args.max_steps)
}

fn finish(machine: &mut Machine<RiscV>, max_steps: u64) -> ExitCode {
    let reason = match machine.run(Some(max_steps)) {
        Ok(reason) => reason,
        Err(e) => {
            error!("Simulation error at pc {:#010x}: {}", machine.cpu.get_pc(), e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };
    info!(
        "Stopped after {} cycles: {:?}",
        machine.total_cycles, reason
    );

    match reason {
        StopReason::DebugPass | StopReason::Breakpoint(_) => ExitCode::from(EXIT_PASS),
        StopReason::DebugFail => ExitCode::from(EXIT_ASSERT_FAIL),
        StopReason::Trap(cause) => {
            error!(
                "Trap {:?} at mepc {:#010x}",
                cause,
                machine.cpu.read_csr(orkarv_core::cpu::csr::MEPC).unwrap_or(0)
            );
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
        StopReason::MaxStepsReached => {
            warn!("Step limit reached before the firmware reported a result");
            ExitCode::from(EXIT_PASS)
        }
    }
}

fn upload_failure(err: BootloaderError) -> ExitCode {
    error!("Upload failed: {}", err);
    match err {
        BootloaderError::Rejected(_)
        | BootloaderError::ChecksumMismatch { .. }
        | BootloaderError::ImageTooLarge { .. } => ExitCode::from(EXIT_ASSERT_FAIL),
        _ => ExitCode::from(EXIT_RUNTIME_ERROR),
    }
}

fn upload(args: UploadArgs) -> ExitCode {
    let program = match orkarv_loader::load_firmware(&args.firmware, RAM_BASE) {
        Ok(program) => program,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let Some((origin, payload)) = program.flatten() else {
        error!("Firmware {:?} has nothing to upload", args.firmware);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };
    if origin != RAM_BASE {
        warn!(
            "Image starts at {:#010x} but the bootloader loads at {:#010x}",
            origin, RAM_BASE
        );
    }

    let options = UploadOptions {
        reset: args.reset,
        await_verdict: args.await_verdict,
        ..Default::default()
    };

    if args.loopback {
        return upload_loopback(&args, payload, options);
    }

    let Some(port) = args.port.as_deref() else {
        error!("Missing required --port argument (or use --loopback)");
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };
    let transport =
        match SerialTransport::open(port, args.baud, Duration::from_millis(args.timeout_ms)) {
            Ok(transport) => transport,
            Err(e) => {
                error!("Failed to open {}: {}", port, e);
                return ExitCode::from(EXIT_RUNTIME_ERROR);
            }
        };

    let mut uploader = Uploader::new(transport, payload, options);
    match uploader.run() {
        Ok(report) => {
            info!(
                "Sent {} bytes, crc32 {:#010x}{}",
                report.header.length,
                report.header.checksum,
                if report.confirmed == Some(true) {
                    ", confirmed"
                } else {
                    ""
                }
            );
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => upload_failure(e),
    }
}

fn exchange(
    host: &mut Uploader<MemoryTransport>,
    target: &mut TargetSession<MemoryTransport>,
    bus: &mut SystemBus,
) -> orkarv_bootloader::Result<()> {
    target.step(bus)?;
    while !matches!(host.state(), HostState::AwaitVerdict | HostState::Done) {
        host.step()?;
    }
    target.run(bus)?;
    host.run()?;
    Ok(())
}

/// Plays both ends of the protocol in-process: the host uploads into the
/// simulated SoC's RAM, and the machine then boots the committed image.
fn upload_loopback(args: &UploadArgs, payload: Vec<u8>, options: UploadOptions) -> ExitCode {
    let mut bus = match build_bus(args.config.as_deref()) {
        Ok(bus) => bus,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let (host_end, target_end) = MemoryTransport::pair();
    let mut target = match TargetSession::for_bus(target_end, &bus) {
        Ok(target) => target,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let mut host = Uploader::new(host_end, payload, options);

    if let Err(e) = exchange(&mut host, &mut target, &mut bus) {
        return upload_failure(e);
    }

    let base = ram_base(&bus);
    let mut machine = Machine::new(RiscV::new(), bus);
    machine
        .bus
        .attach_uart_tx_sink(Arc::new(Mutex::new(Vec::new())), true);
    machine.cpu.set_pc(base);
    finish(&mut machine, args.max_steps)
}

fn memory_map(args: MemoryMapArgs) -> ExitCode {
    let rendered = MemorySpec::from_file(&args.config).and_then(|spec| {
        spec.ascii_memory_map()
            .with_context(|| format!("Invalid memory map {:?}", args.config))
    });
    match rendered {
        Ok(map) => {
            println!("{}", map);
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}
