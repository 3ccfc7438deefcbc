use std::fs;
use std::thread;

use tracing::info;

use topicmq_frame::Message;
use topicmq_session::PublisherSession;
use topicmq_transport::Context;

use crate::cmd::{parse_duration, PayloadKind, PublishArgs};
use crate::exit::{io_error, session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::OutputFormat;

pub fn run(args: PublishArgs, _format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let warmup = parse_duration(&args.warmup)?;
    let message = build_message(args.content_type, resolve_payload(&args)?);

    let publisher = PublisherSession::new(Context::new(), args.port);
    if let Some(key) = &args.server_secret_key {
        publisher
            .set_server_secret_key(key)
            .map_err(|err| session_error("invalid server key", err))?;
    }
    publisher
        .start()
        .map_err(|err| session_error("start failed", err))?;
    // Subscribers connecting now would miss anything sent before their
    // filters reach us.
    thread::sleep(warmup);

    for sent in 0..args.count {
        if sent > 0 {
            thread::sleep(interval);
        }
        let result = if args.topic.is_empty() {
            publisher.publish(&message)
        } else {
            publisher.publish_topics(args.topic.as_slice(), &message)
        };
        result.map_err(|err| session_error("publish failed", err))?;
        info!(
            port = args.port,
            topics = args.topic.len(),
            size = message.len(),
            "message published"
        );
    }

    publisher
        .stop()
        .map_err(|err| session_error("stop failed", err))?;
    Ok(SUCCESS)
}

fn build_message(kind: PayloadKind, payload: Vec<u8>) -> Message {
    match kind {
        PayloadKind::Structured => Message::structured(payload),
        PayloadKind::Raw => Message::raw(payload),
    }
}

fn resolve_payload(args: &PublishArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(json.as_bytes().to_vec());
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use topicmq_frame::ContentType;

    #[test]
    fn payload_kind_selects_content_type() {
        assert_eq!(
            build_message(PayloadKind::Raw, vec![1]).content_type(),
            ContentType::Raw
        );
        assert_eq!(
            build_message(PayloadKind::Structured, vec![1]).content_type(),
            ContentType::Structured
        );
    }
}
