use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_tally::{
    check_dump, CheckOptions, DumpChecker, KillSignaller, Signal, SystemClock, ThresholdRule,
};

#[derive(Parser, Debug)]
#[command(name = "tracing-tally")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Signal a process to dump its tallies, then check rules against the dump
    ///
    /// Exit codes: 0 all rules hold, 1 usage or fatal error, 2 the dump was not
    /// rewritten in time, 3+N rule N (0-based) does not hold.
    CheckLogDump(CheckLogDumpArgs),
}

#[derive(Args, Debug)]
struct CheckLogDumpArgs {
    /// Process id of the target
    pid: u32,

    /// Dump file the target writes when signalled
    file: PathBuf,

    /// Signal to send, by name (SIGUSR2, usr2) or number
    #[arg(default_value = "SIGUSR2")]
    signal: Signal,

    /// Rules of the form "<LABEL|ANY> <count|last_record> <lt|gt> <number>"
    rules: Vec<ThresholdRule>,

    /// Number of times to poll the dump file
    #[arg(long, default_value_t = 10)]
    attempts: u32,

    /// Milliseconds to wait before each poll
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn run_check(args: CheckLogDumpArgs) -> i32 {
    let options = CheckOptions {
        attempts: args.attempts,
        interval: Duration::from_millis(args.interval_ms),
    };
    tracing::debug!(
        pid = args.pid,
        file = %args.file.display(),
        signal = %args.signal,
        rules = args.rules.len(),
        "checking log dump"
    );

    let result = if options == CheckOptions::default() {
        check_dump(args.pid, &args.file, args.signal, &args.rules)
    } else {
        DumpChecker::new(Arc::new(KillSignaller), Arc::new(SystemClock::new()))
            .with_options(options)
            .check(args.pid, &args.file, args.signal, &args.rules)
    };
    match result {
        Ok(outcome) => {
            if !outcome.is_passed() {
                eprintln!("{}", outcome);
            }
            outcome.exit_code()
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            1
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let _ = err.print();
            process::exit(1);
        }
    };

    init_logging();

    let exit_code = match cli.command {
        Command::CheckLogDump(args) => run_check(args),
    };
    process::exit(exit_code);
}
