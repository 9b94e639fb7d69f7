use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use binutils::{clap, verbose};
use clap::{builder::PossibleValuesParser, Parser};
use cosim::{
    architectures::{create_model, ArchOption, ARCH_NAMES},
    Emulator, LoopbackHost, RunConfig, TraceTarget,
};

/// Cycle-stepped co-simulation driver for designs behind a host interface
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None,
    styles = binutils::get_styles(),
    arg_required_else_help = true,
)]
struct Args {
    /// Payload image streamed to the design by the loopback agent
    input: PathBuf,

    /// Seed for the model's initial register state (default mixes time and pid)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Give up after this many cycles. Unbounded if omitted.
    #[arg(long)]
    max_cycles: Option<u64>,

    /// First cycle printed with --print-state and written to the waveform
    #[arg(long, default_value_t = 0)]
    start: u64,

    /// Write a VCD waveform to this file, `-` for stdout
    #[arg(long)]
    vcd: Option<String>,

    /// Print the model state on every cycle from --start on
    #[arg(long)]
    print_state: bool,

    /// Report the cycle count of a successful run
    #[arg(short = 'c', long)]
    cycle_count: bool,

    /// Design to simulate
    #[arg(long, default_value = "echo", value_parser = PossibleValuesParser::new(ARCH_NAMES))]
    arch: String,

    /// Simulation steps per host clock cycle
    #[arg(long, default_value_t = 2)]
    divider: u32,

    /// Host port width in bits
    #[arg(long, default_value_t = 16)]
    width: u32,

    /// Register stages in the design's reset pipeline
    #[arg(long, default_value_t = 2)]
    reset_stages: usize,

    /// Write logs to this file as JSON lines instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(flatten)]
    verbose: verbose::Verbosity,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = args
        .log_file
        .as_ref()
        .map(|path| {
            std::fs::File::create(path)
                .with_context(|| format!("could not create log file `{}`", path.display()))
        })
        .transpose()?;
    let log_level = binutils::verbose_level_to_trace(args.verbose.log_level());
    binutils::logging_setup(log_level, log_file.as_ref());

    let mut config = RunConfig::default()
        .set_max_cycles(args.max_cycles)
        .set_trace_start(args.start)
        .set_verbose(args.print_state)
        .set_print_cycles(args.cycle_count)
        .set_trace(TraceTarget::from_arg(args.vcd.as_deref()));
    if let Some(seed) = args.seed {
        config = config.set_seed(seed);
    }
    tracing::info!(seed = config.seed, arch = %args.arch, "starting co-simulation");

    let opt = ArchOption {
        width: args.width,
        divider: args.divider,
        reset_stages: args.reset_stages,
    };
    let model = create_model(&args.arch, opt)
        .ok_or_else(|| anyhow::anyhow!("unknown design `{}`", args.arch))?;
    let host = LoopbackHost::from_file(&args.input)?;
    let mut emu = Emulator::new(model, host, config)?.with_configured_trace()?;
    let announce = emu.config().verbose || emu.config().print_cycles;

    let stop = emu.stop_token();
    ctrlc::set_handler(move || stop.stop()).context("failed to set termination handler")?;

    let report = emu.run()?;
    tracing::debug!(echoed = emu.host().echoed(), "loopback agent finished");

    if let Some(msg) = report.message(announce) {
        if std::io::stderr().is_terminal() {
            let colour = if report.outcome.is_success() {
                ansi_term::Colour::Green
            } else {
                ansi_term::Colour::Red
            };
            eprintln!("{}", colour.bold().paint(msg));
        } else {
            eprintln!("{msg}");
        }
    }

    let status = report.exit_status();
    if status != 0 {
        std::process::exit(status);
    }
    Ok(())
}
