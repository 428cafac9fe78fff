use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use tokenwire_proto::{PayloadKind, ResultMessage, ResultStatus};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ResultOutput<'a> {
    filter: &'a str,
    status: &'static str,
    sequence_number: u64,
    results: Vec<PayloadOutput>,
    timestamp: String,
}

#[derive(Serialize)]
struct PayloadOutput {
    kind: &'static str,
    size: usize,
    payload: String,
}

pub fn print_result(result: &ResultMessage, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ResultOutput {
                filter: &result.filter_name,
                status: status_name(result.status),
                sequence_number: result.sequence_number,
                results: result
                    .results
                    .iter()
                    .map(|item| PayloadOutput {
                        kind: kind_name(item.payload_kind),
                        size: item.payload.len(),
                        payload: payload_preview(&item.payload),
                    })
                    .collect(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "FILTER", "KIND", "SIZE", "PAYLOAD"]);
            for item in &result.results {
                table.add_row(vec![
                    result.sequence_number.to_string(),
                    result.filter_name.clone(),
                    kind_name(item.payload_kind).to_string(),
                    item.payload.len().to_string(),
                    payload_preview(&item.payload),
                ]);
            }
            if result.results.is_empty() {
                table.add_row(vec![
                    result.sequence_number.to_string(),
                    result.filter_name.clone(),
                    "-".to_string(),
                    "0".to_string(),
                    String::new(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "seq={} filter={} status={} payloads={}",
                result.sequence_number,
                result.filter_name,
                status_name(result.status),
                result.results.len()
            );
            for item in &result.results {
                println!(
                    "  {} size={} payload={}",
                    kind_name(item.payload_kind),
                    item.payload.len(),
                    payload_preview(&item.payload)
                );
            }
        }
        OutputFormat::Raw => {
            for item in &result.results {
                print_raw(&item.payload);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn status_name(status: i32) -> &'static str {
    ResultStatus::try_from(status)
        .map(ResultStatus::name)
        .unwrap_or("UNKNOWN")
}

fn kind_name(kind: i32) -> &'static str {
    PayloadKind::try_from(kind)
        .map(PayloadKind::name)
        .unwrap_or("unknown")
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
