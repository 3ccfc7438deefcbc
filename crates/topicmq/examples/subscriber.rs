//! Prints everything published under `home/` for thirty seconds.
//!
//! Run with:
//!   cargo run --example subscriber

use std::time::{Duration, Instant};

use topicmq::frame::{Message, Topic};
use topicmq::session::{Sink, SubscriberSession};
use topicmq::transport::Context;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Sink::callbacks(
        |message: Message| eprintln!("untopiced: {} bytes", message.len()),
        |topic: &Topic, message: Message| {
            eprintln!(
                "{topic}: {}",
                String::from_utf8_lossy(message.payload())
            )
        },
    );

    let subscriber = SubscriberSession::new(Context::new(), "127.0.0.1", 5562, sink);
    subscriber.start()?;
    subscriber.subscribe("home")?;
    eprintln!("Subscribed to home/ on {}:{}", subscriber.ip(), subscriber.port());

    let deadline = Instant::now() + Duration::from_secs(30);
    while Instant::now() < deadline && subscriber.is_running() {
        std::thread::sleep(Duration::from_millis(200));
    }

    subscriber.stop()?;
    Ok(())
}
