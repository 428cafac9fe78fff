mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "tokenwire", version, about = "Credit-based streaming client")]
struct Cli {
    /// Output format for results.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::try_parse_from([
            "tokenwire",
            "run",
            "ws://localhost:9099",
            "--filter",
            "faces",
            "--file",
            "a.jpg",
            "--file",
            "b.jpg",
            "--count",
            "5",
        ])
        .expect("run args should parse");

        let Command::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.filter, "faces");
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.count, Some(5));
        assert!(!args.timing);
    }

    #[test]
    fn run_requires_a_file() {
        let err = Cli::try_parse_from(["tokenwire", "run", "ws://localhost:9099", "-f", "faces"])
            .expect_err("missing --file should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn output_freq_requires_timing() {
        let err = Cli::try_parse_from([
            "tokenwire",
            "run",
            "ws://localhost:9099",
            "-f",
            "faces",
            "--file",
            "a.jpg",
            "--output-freq",
            "5",
        ])
        .expect_err("--output-freq without --timing should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tokenwire",
            "version",
            "--extended",
            "--log-format",
            "json",
            "--format",
            "pretty",
        ])
        .expect("global flags should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Pretty)));
        assert!(matches!(cli.command, Command::Version(_)));
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = Cli::try_parse_from([
            "tokenwire",
            "run",
            "ws://localhost:9099",
            "-f",
            "faces",
            "--file",
            "a.jpg",
            "--kind",
            "smell",
        ])
        .expect_err("unknown kind should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
