use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::info;

use topicmq_session::{Sink, SubscriberSession};
use topicmq_transport::Context;

use crate::cmd::SubscribeArgs;
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_envelope, OutputFormat};

const TICK: Duration = Duration::from_millis(200);

pub fn run(args: SubscribeArgs, format: OutputFormat) -> CliResult<i32> {
    let (sink, deliveries) = Sink::channel();
    let subscriber = SubscriberSession::new(Context::new(), args.ip.clone(), args.port, sink);

    if let Some(key) = &args.server_public_key {
        subscriber
            .set_server_public_key(key)
            .map_err(|err| session_error("invalid server key", err))?;
    }
    if let (Some(secret), Some(public)) = (&args.client_secret_key, &args.client_public_key) {
        subscriber
            .set_client_keys(secret, public)
            .map_err(|err| session_error("invalid client keys", err))?;
    }

    subscriber
        .start()
        .map_err(|err| session_error("start failed", err))?;
    let subscribed = if args.topic.is_empty() {
        subscriber.subscribe_all()
    } else {
        subscriber.subscribe_topics(args.topic.as_slice())
    };
    subscribed.map_err(|err| session_error("subscribe failed", err))?;
    info!(ip = %args.ip, port = args.port, topics = ?args.topic, "subscribed");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let envelope = match deliveries.recv_timeout(TICK) {
            Ok(envelope) => envelope,
            Err(RecvTimeoutError::Timeout) => {
                if !subscriber.is_running() {
                    return Err(CliError::new(TRANSPORT_ERROR, "receive loop exited"));
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        print_envelope(&envelope, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    subscriber
        .stop()
        .map_err(|err| session_error("stop failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
