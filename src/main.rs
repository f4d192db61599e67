use clap::Parser;
use parquet2csv::CancelToken;
use parquet2csv::cli::{Cli, run};
use std::io::{BufWriter, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_filter().into()),
        )
        .init();

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = run(&cli, &CancelToken::new(), &mut out);
    // Rows already written stay written, even on failure.
    let flushed = out.flush();

    match result.and_then(|()| flushed.map_err(Into::into)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
