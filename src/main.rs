mod cli;
mod config;
mod error;
mod filter;
mod maps;
mod scan;
mod scanner;
mod subject;
mod value;

use clap::Parser;
use std::io::{stdin, stdout};

use config::Cli;

fn main() -> anyhow::Result<()> {
    // `Cli::parse()` would exit(2) on a bad pid/mode via clap's own usage
    // error path; the spec calls for exit code 1 on every startup failure
    // (bad pid, unparseable mode, failed attach) uniformly, so we parse
    // manually and fold a usage error into the same ordinary error return.
    let args = match Cli::try_parse() {
        Ok(args) => args,
        // `--help`/`--version` exit 0 via clap as usual; every other parse
        // failure (bad pid, unparseable mode) is folded into the spec's
        // uniform exit code 1 for startup failures rather than clap's
        // default exit code 2.
        Err(err) if err.exit_code() == 0 => err.exit(),
        Err(err) => {
            eprint!("{err}");
            std::process::exit(1);
        }
    };

    eprintln!("[main] attaching to pid {}", args.pid);
    let mut target = subject::attach(args.pid)?;

    let scan_ids: Vec<_> = args
        .mode
        .scan_types()
        .into_iter()
        .map(|ty| target.begin_scan(ty))
        .collect();

    eprintln!(
        "[main] opened {} scan(s), type `exact <value>` to begin narrowing",
        scan_ids.len()
    );

    cli::run(&mut target, &scan_ids, stdin().lock(), stdout().lock())?;

    Ok(())
}
