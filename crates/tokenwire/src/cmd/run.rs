use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokenwire_client::{
    InputFrame, Session, SessionConfig, SessionEnd, StopHandle, TimingStats,
};
use tokenwire_proto::{PayloadKind, ResultMessage};
use tokenwire_transport::{Endpoint, WebSocketConnector};
use tracing::{info, warn};

use crate::cmd::RunArgs;
use crate::exit::{
    client_error, io_error, transport_error, CliError, CliResult, FAILURE, SUCCESS, USAGE,
};
use crate::output::{print_result, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint =
        Endpoint::parse(&args.url).map_err(|err| transport_error("invalid endpoint", err))?;
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let payloads = load_payloads(&args.files)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;

    runtime.block_on(stream(args, endpoint, connect_timeout, payloads, format))
}

async fn stream(
    args: RunArgs,
    endpoint: Endpoint,
    connect_timeout: Duration,
    payloads: Vec<Bytes>,
    format: OutputFormat,
) -> CliResult<i32> {
    let stop = StopHandle::new();
    let connector = WebSocketConnector::new(endpoint).with_connect_timeout(Some(connect_timeout));
    let config = SessionConfig::new(connector).with_stop_handle(stop.clone());

    let printed = Arc::new(AtomicU64::new(0));
    let consumer = {
        let printed = Arc::clone(&printed);
        let stop = stop.clone();
        let limit = args.count;
        move |result: ResultMessage| {
            print_result(&result, format);
            let seen = printed.fetch_add(1, Ordering::SeqCst) + 1;
            if limit.is_some_and(|limit| seen >= limit) {
                stop.stop();
            }
        }
    };
    let producer = round_robin(args.kind.into(), payloads);

    let timing = args.timing.then(|| TimingStats::new(args.output_freq));
    let mut session = match &timing {
        Some(stats) => {
            let mut session = Session::new(config, stats.wrap_consumer(consumer));
            let counter = session.sequence_counter();
            session.add_producer(args.filter.as_str(), stats.wrap_producer(producer, counter));
            session
        }
        None => Session::new(config, consumer).with_producer(args.filter.as_str(), producer),
    };

    let end = tokio::select! {
        end = session.launch() => end,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            SessionEnd::Stopped
        }
    };

    if let Some(stats) = &timing {
        match stats.average_rtt() {
            Some(rtt) => info!(
                results = stats.results(),
                avg_rtt_ms = rtt.as_secs_f64() * 1000.0,
                "timing summary"
            ),
            None => warn!("no round trips measured"),
        }
    }

    let printed = printed.load(Ordering::SeqCst);
    match end {
        SessionEnd::Stopped => Ok(SUCCESS),
        SessionEnd::Disconnected if args.count.is_some_and(|limit| printed >= limit) => {
            Ok(SUCCESS)
        }
        SessionEnd::Disconnected => Err(CliError::new(
            FAILURE,
            format!("connection lost after {printed} results"),
        )),
        SessionEnd::NotConnected(err) => Err(client_error("connect failed", err)),
        SessionEnd::Failed(err) => Err(client_error("session failed", err)),
    }
}

/// Cycle through `payloads` forever, one frame per call.
fn round_robin(
    kind: PayloadKind,
    payloads: Vec<Bytes>,
) -> impl FnMut() -> Option<InputFrame> + Send + 'static {
    let mut next = 0usize;
    move || {
        let payload = payloads.get(next)?.clone();
        next = (next + 1) % payloads.len();
        Some(InputFrame::new(kind, payload))
    }
}

fn load_payloads(paths: &[PathBuf]) -> CliResult<Vec<Bytes>> {
    if paths.is_empty() {
        return Err(CliError::new(USAGE, "at least one --file is required"));
    }
    paths
        .iter()
        .map(|path| {
            std::fs::read(path)
                .map(Bytes::from)
                .map_err(|err| io_error(&format!("read {} failed", path.display()), err))
        })
        .collect()
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
