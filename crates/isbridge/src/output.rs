use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use isbridge_bridge::BridgeStatus;
use isbridge_frame::{Frame, Sentence};
use serde::Serialize;

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
struct FrameOutput<'a> {
    packet_type: &'a str,
    did: u8,
    did_name: &'a str,
    offset: u16,
    payload_size: usize,
    payload: String,
    payload_text: Option<&'a str>,
    source: &'a str,
    timestamp: String,
}

pub fn print_frame(frame: &Frame, source: &str, format: OutputFormat) {
    let payload = frame.payload.as_ref();
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                packet_type: frame.packet_type.name(),
                did: frame.did.0,
                did_name: frame.did.name(),
                offset: frame.offset,
                payload_size: payload.len(),
                payload: hex::encode(payload),
                payload_text: printable(payload),
                source,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "DID", "OFFSET", "SIZE", "SOURCE", "PAYLOAD"])
                .add_row(vec![
                    frame.packet_type.name().to_string(),
                    frame.did.to_string(),
                    frame.offset.to_string(),
                    payload.len().to_string(),
                    source.to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} did={} offset={} size={} source={} payload={}",
                frame.packet_type,
                frame.did,
                frame.offset,
                payload.len(),
                source,
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

#[derive(Serialize)]
struct PayloadOutput<'a> {
    payload_size: usize,
    payload: String,
    payload_text: Option<&'a str>,
    source: &'a str,
    timestamp: String,
}

/// Print payload bytes read from a stream opened by connection string.
pub fn print_payload(payload: &[u8], source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&PayloadOutput {
            payload_size: payload.len(),
            payload: hex::encode(payload),
            payload_text: printable(payload),
            source,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SIZE", "SOURCE", "PAYLOAD"])
                .add_row(vec![
                    payload.len().to_string(),
                    source.to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "size={} source={} payload={}",
            payload.len(),
            source,
            payload_preview(payload)
        ),
        OutputFormat::Raw => print_raw(payload),
    }
}

#[derive(Serialize)]
struct SentenceOutput<'a> {
    message_id: Option<&'a str>,
    body: Option<&'a str>,
    checksum: String,
}

pub fn print_sentence(sentence: &Sentence<'_>, format: OutputFormat) {
    let body = sentence.body_str();
    let message_id = sentence
        .fields()
        .next()
        .and_then(|id| std::str::from_utf8(id).ok());
    let checksum = format!("{:02X}", sentence.checksum);
    match format {
        OutputFormat::Json => print_json(&SentenceOutput {
            message_id,
            body,
            checksum,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "CHECKSUM", "BODY"])
                .add_row(vec![
                    message_id.unwrap_or("-").to_string(),
                    checksum,
                    body.unwrap_or("<binary>").to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "id={} checksum={} body={}",
            message_id.unwrap_or("-"),
            checksum,
            body.unwrap_or("<binary>")
        ),
        OutputFormat::Raw => print_raw(sentence.body),
    }
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    size: usize,
    hex: &'a str,
}

/// Print wire bytes: hex for humans and JSON, untouched bytes for `raw`.
pub fn print_encoded(wire: &[u8], format: OutputFormat) {
    let encoded = hex::encode(wire);
    match format {
        OutputFormat::Json => print_json(&EncodedOutput {
            size: wire.len(),
            hex: &encoded,
        }),
        OutputFormat::Table | OutputFormat::Pretty => println!("{encoded}"),
        OutputFormat::Raw => print_raw(wire),
    }
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    state: &'a str,
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    subscribe: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    publish: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    listen_port: Option<u16>,
}

pub fn print_status(status: &BridgeStatus, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let (state, subscribe, publish, listen_port) = match status {
                BridgeStatus::Stopped => ("stopped", None, None, None),
                BridgeStatus::Running {
                    subscribe_endpoint,
                    publish_endpoint,
                    listen_port,
                } => (
                    "running",
                    Some(subscribe_endpoint.as_str()),
                    Some(publish_endpoint.as_str()),
                    Some(*listen_port),
                ),
                BridgeStatus::Failed { .. } => ("failed", None, None, None),
            };
            print_json(&StatusOutput {
                state,
                summary: status.to_string(),
                subscribe,
                publish,
                listen_port,
            });
        }
        _ => println!("{status}"),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn printable(payload: &[u8]) -> Option<&str> {
    std::str::from_utf8(payload)
        .ok()
        .filter(|text| !text.chars().any(char::is_control))
}

fn payload_preview(payload: &[u8]) -> String {
    match printable(payload) {
        Some(text) => text.to_string(),
        None => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_hides_binary_payloads() {
        assert_eq!(payload_preview(b"hello"), "hello");
        assert_eq!(payload_preview(&[0xEF, 0x49, 0x00]), "<binary 3 bytes>");
        assert_eq!(payload_preview(b"line\n"), "<binary 5 bytes>");
    }
}
