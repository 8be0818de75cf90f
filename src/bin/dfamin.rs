use clap::{Arg, ArgMatches, Command};
use tracing::{debug, error, info};
use tracing_subscriber::{filter, prelude::*};

use remin::prelude::*;

fn cli() -> Command {
    Command::new("dfamin")
        .about("minimizes a tabular DFA or Moore machine by partition refinement")
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbosity")
                .num_args(0..=1)
                .require_equals(true)
                .value_parser(["info", "debug", "trace"])
                .default_missing_value("debug"),
        )
        .arg(
            Arg::new("output")
                .required(true)
                .help("path the minimal table is written to"),
        )
        .arg(
            Arg::new("input")
                .required(true)
                .help("path of the DFA table to read"),
        )
}

fn setup_logging(matches: &ArgMatches) {
    let level = match matches
        .try_get_one::<String>("verbosity")
        .ok()
        .flatten()
        .map(|m| m.as_str())
    {
        Some("trace") => filter::LevelFilter::TRACE,
        Some("debug") => filter::LevelFilter::DEBUG,
        _ => filter::LevelFilter::INFO,
    };

    let stderr_log = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(stderr_log.with_filter(level))
        .init();
}

pub fn main() {
    let matches = cli().try_get_matches().unwrap_or_else(|err| {
        use clap::error::ErrorKind;
        if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
            err.exit();
        }
        eprintln!("{err}");
        std::process::exit(1);
    });
    setup_logging(&matches);

    let output = matches.get_one::<String>("output").expect("argument is required");
    let input = matches.get_one::<String>("input").expect("argument is required");

    let contents = std::fs::read_to_string(input).unwrap_or_else(|err| {
        error!("cannot read `{input}`: {err}");
        std::process::exit(1);
    });
    let dfa: AutomatonTable = contents.parse().unwrap_or_else(|err| {
        error!("malformed table in `{input}`: {err}");
        std::process::exit(1);
    });
    debug!("input table\n{}", dfa.pretty());

    let minimal = minimize(&dfa).unwrap_or_else(|err| {
        error!("invalid automaton: {err}");
        std::process::exit(1);
    });
    debug!("minimal table\n{}", minimal.pretty());

    if let Err(err) = std::fs::write(output, minimal.to_string()) {
        error!("cannot write `{output}`: {err}");
        std::process::exit(1);
    }
    info!(
        "minimal machine with {} states (down from {}) written to `{output}`",
        minimal.state_count(),
        dfa.state_count()
    );
}
