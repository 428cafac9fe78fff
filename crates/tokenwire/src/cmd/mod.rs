use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use tokenwire_proto::PayloadKind;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream files to a server and print the results.
    Run(RunArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Server endpoint (ws://host:port).
    pub url: String,
    /// Filter the frames are sent on.
    #[arg(long, short = 'f')]
    pub filter: String,
    /// Payload file. Repeat to cycle through several.
    #[arg(long = "file", value_name = "PATH", required = true)]
    pub files: Vec<PathBuf>,
    /// Payload kind declared on every frame.
    #[arg(long, value_enum, default_value = "image")]
    pub kind: KindArg,
    /// Stop after N successful results.
    #[arg(long)]
    pub count: Option<u64>,
    /// Log throughput and average round trip.
    #[arg(long)]
    pub timing: bool,
    /// Results between throughput log lines when --timing is set.
    #[arg(long, default_value = "10", requires = "timing")]
    pub output_freq: u64,
    /// Maximum time to establish the connection (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s")]
    pub connect_timeout: String,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum KindArg {
    Image,
    Video,
    Audio,
    Accelerometer,
    Gyroscope,
    Other,
}

impl From<KindArg> for PayloadKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Image => PayloadKind::Image,
            KindArg::Video => PayloadKind::Video,
            KindArg::Audio => PayloadKind::Audio,
            KindArg::Accelerometer => PayloadKind::Accelerometer,
            KindArg::Gyroscope => PayloadKind::Gyroscope,
            KindArg::Other => PayloadKind::Other,
        }
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
