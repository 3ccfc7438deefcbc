use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use topicmq_frame::Envelope;

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
struct DeliveryOutput<'a> {
    topic: Option<&'a str>,
    content_type: &'static str,
    version: u8,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

pub fn print_envelope(envelope: &Envelope, format: OutputFormat) {
    let topic = envelope.topic.as_ref().map(|topic| topic.as_str());
    let message = &envelope.message;
    match format {
        OutputFormat::Json => {
            let out = DeliveryOutput {
                topic,
                content_type: message.content_type().name(),
                version: message.version(),
                payload_size: message.len(),
                payload: payload_preview(message.payload()),
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
                .set_header(vec!["TOPIC", "TYPE", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    topic.unwrap_or("-").to_string(),
                    message.content_type().name().to_string(),
                    message.len().to_string(),
                    payload_preview(message.payload()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "topic={} type={} size={} payload={}",
                topic.unwrap_or("-"),
                message.content_type(),
                message.len(),
                payload_preview(message.payload())
            );
        }
        OutputFormat::Raw => {
            print_raw(message.payload());
        }
    }
}

#[derive(Serialize)]
struct KeypairOutput<'a> {
    public_key: &'a str,
    secret_key: &'a str,
}

pub fn print_keypair(public_key: &str, secret_key: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = KeypairOutput {
                public_key,
                secret_key,
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
                .set_header(vec!["KEY", "Z85"])
                .add_row(vec!["public", public_key])
                .add_row(vec!["secret", secret_key]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!("public_key={public_key}");
            println!("secret_key={secret_key}");
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
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
