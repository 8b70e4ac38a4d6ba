use amx_probe::core::probe;
use amx_probe::core::runtime::RuntimeConfig;
use amx_probe::core::table::FeatureTable;
use amx_probe::platform::{self, linux, snapshot::Recorder, snapshot::Snapshot};
use amx_probe::report;
use amx_probe::{Processor, ProbeReport};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

/// Detect Intel AMX tile support and whether the OS has enabled tile state.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Probe a saved CPUID snapshot instead of this machine
    #[arg(long, conflicts_with = "cpu")]
    replay: Option<PathBuf>,

    /// Save every CPUID/XGETBV result the probe reads to a snapshot file
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Pin to this logical CPU before probing
    #[arg(long)]
    cpu: Option<usize>,

    /// Exit with status 2 when AMX is not usable
    #[arg(long)]
    strict: bool,

    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn probe_with<P: Processor>(cpu: P, dump: Option<&PathBuf>) -> Result<ProbeReport, amx_probe::ProbeError> {
    let table = FeatureTable::amx();
    match dump {
        Some(path) => {
            let recorder = Recorder::new(cpu);
            let report = probe::run(&recorder, &table);
            recorder.to_snapshot().save(path)?;
            tracing::info!(path = %path.display(), queries = recorder.cpuid_count(), "snapshot written");
            Ok(report)
        }
        None => Ok(probe::run(&cpu, &table)),
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    let report = match &args.replay {
        Some(path) => probe_with(Snapshot::load(path)?, args.dump.as_ref())?,
        None => {
            if let Some(cpu) = args.cpu {
                RuntimeConfig::pin_thread(cpu)?;
            }
            let report = probe_with(platform::native()?, args.dump.as_ref())?;
            if report.os_support.is_some_and(|s| s.is_supported()) {
                report.with_permissions(linux::xcomp_permissions())
            } else {
                report
            }
        }
    };

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    if args.json {
        report::write_json(&mut out, &report)?;
    } else {
        report::write_text(&mut out, &report)?;
    }
    out.flush()?;

    if args.strict && !report.is_usable() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}
