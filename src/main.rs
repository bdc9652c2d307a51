//! WipeKit — command-line supervisor for the securewipe engine.
//!
//! Thin binary entry point. All orchestration logic lives in the
//! `wipekit-core` crate; this layer only parses arguments, drains the
//! event channel, and prints progress.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use wipekit_core::model::size::{format_size, format_throughput};
use wipekit_core::{
    check_privileges, elevation_description, supports_gui_prompts, Orchestrator, OutcomeStatus,
    WipeAlgorithm, WipeEvent, WipeRequest,
};

#[derive(Parser)]
#[command(name = "wipekit", about = "Supervise the securewipe data-sanitization engine")]
struct Cli {
    /// Explicit path to the securewipe engine binary.
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    /// Wall-clock timeout for wipe operations, in seconds.
    #[arg(long, global = true, default_value_t = 300)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    Random,
    Zeros,
    Ones,
    Dod3,
    Gutmann,
}

impl From<AlgorithmArg> for WipeAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Random => Self::Random,
            AlgorithmArg::Zeros => Self::Zeros,
            AlgorithmArg::Ones => Self::Ones,
            AlgorithmArg::Dod3 => Self::Dod3,
            AlgorithmArg::Gutmann => Self::Gutmann,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Sanitize a file or device.
    Wipe {
        /// Target path. Ignored with --demo.
        target: Option<String>,
        #[arg(long, value_enum, default_value = "zeros")]
        algorithm: AlgorithmArg,
        /// Explicit pass-count override (1..=100).
        #[arg(long)]
        passes: Option<u32>,
        /// I/O buffer size hint in KB.
        #[arg(long)]
        buffer_size: Option<u32>,
        /// Wipe a generated temporary file instead of a real target.
        #[arg(long)]
        demo: bool,
        /// Size of the demo target in MB.
        #[arg(long, default_value_t = 16)]
        demo_size: u64,
        /// Re-launch elevated if the target requires it.
        #[arg(long)]
        elevate: bool,
    },
    /// List drives the engine can see.
    Drives,
    /// Show the engine's system report.
    Sysinfo,
    /// Check engine presence and privilege status.
    Check {
        /// Target to evaluate privileges against.
        target: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let cli = Cli::parse();

    let mut orch = Orchestrator::new().with_timeout(Duration::from_secs(cli.timeout));
    if let Some(engine) = &cli.engine {
        orch = orch.with_binary(engine);
    }

    match cli.command {
        Command::Wipe {
            target,
            algorithm,
            passes,
            buffer_size,
            demo,
            demo_size,
            elevate,
        } => {
            let mut request = if demo {
                WipeRequest::demo(algorithm.into(), demo_size)
            } else {
                let target = target.context("a target path is required unless --demo is set")?;
                WipeRequest::new(target, algorithm.into())
            };
            request.passes = passes;
            request.buffer_size_kb = buffer_size;
            request.elevate = elevate;

            run_wipe(&orch, request)
        }
        Command::Drives => {
            let drives = orch.list_drives()?;
            for drive in drives {
                println!(
                    "{:<24} {:>10}  {}{}",
                    drive.device,
                    format_size(drive.size_bytes),
                    drive.model.as_deref().unwrap_or("(unknown model)"),
                    if drive.removable { "  [removable]" } else { "" },
                );
            }
            Ok(())
        }
        Command::Sysinfo => {
            let report = orch.system_info()?;
            println!("OS:           {} {}", report.os_name, report.os_version);
            println!("Architecture: {}", report.architecture);
            if let Some(host) = &report.hostname {
                println!("Hostname:     {host}");
            }
            if let Some(mem) = report.total_memory_bytes {
                println!("Memory:       {}", format_size(mem));
            }
            Ok(())
        }
        Command::Check { target } => {
            match orch.validate_binary_access() {
                Ok(path) => println!("engine:     {}", path.display()),
                Err(err) => println!("engine:     NOT AVAILABLE ({err})"),
            }
            let status = check_privileges(target.as_deref());
            println!("user:       {}", status.user);
            println!("platform:   {}", status.platform);
            println!("elevated:   {}", status.elevated);
            println!("needs elevation: {}", status.needs_elevation);
            println!("mechanism:  {:?}", status.method);
            println!("gui prompt: {}", supports_gui_prompts());
            println!("note:       {}", elevation_description(status.method));
            Ok(())
        }
    }
}

/// Start the wipe and drain its event stream until the outcome resolves.
fn run_wipe(orch: &Orchestrator, request: WipeRequest) -> anyhow::Result<()> {
    let handle = orch.start(request)?;

    for event in handle.events.iter() {
        match event {
            WipeEvent::Start {
                target,
                algorithm,
                total_passes,
                total_bytes,
            } => println!(
                "wiping {target} with {algorithm} ({total_passes} pass(es), {})",
                format_size(total_bytes)
            ),
            WipeEvent::PassStart { pass, total_passes, .. } => {
                println!("pass {pass}/{total_passes} started");
            }
            WipeEvent::Progress {
                pass,
                total_passes,
                bytes_written,
                total_bytes,
                percent,
                throughput_bps,
            } => println!(
                "pass {pass}/{total_passes}: {percent:5.1}%  {} / {}  ({})",
                format_size(bytes_written),
                format_size(total_bytes),
                format_throughput(throughput_bps),
            ),
            WipeEvent::PassComplete { pass, total_passes } => {
                println!("pass {pass}/{total_passes} complete");
            }
            WipeEvent::Complete { duration_secs } => {
                println!("engine finished in {duration_secs:.1} s");
            }
            WipeEvent::Info { message } => println!("info: {message}"),
            WipeEvent::Error { message } => eprintln!("error: {message}"),
            // Payload events never appear in sanitize mode.
            WipeEvent::DriveList { .. } | WipeEvent::SystemInfo(_) => {}
        }
    }

    let outcome = handle.wait();
    match outcome.status {
        OutcomeStatus::Completed => {
            println!("done");
            Ok(())
        }
        _ => {
            if let Some(elevation) = &outcome.elevation_error {
                eprintln!("privileges were needed but not obtained: {elevation}");
            }
            anyhow::bail!("{}", outcome.message)
        }
    }
}
