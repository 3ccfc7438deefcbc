//! Publishes a reading to `home/livingroom` once a second.
//!
//! Run with:
//!   cargo run --example publisher
//!
//! In another terminal:
//!   cargo run --example subscriber

use std::thread;
use std::time::Duration;

use topicmq::frame::Message;
use topicmq::session::PublisherSession;
use topicmq::transport::Context;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let publisher = PublisherSession::new(Context::new(), 5562);
    publisher.start()?;
    eprintln!("Publishing on tcp://*:{}", publisher.port());

    for reading in 0u32..30 {
        let payload = format!("temperature={}", 20 + reading % 5);
        publisher.publish_topic("home/livingroom", &Message::raw(payload.into_bytes()))?;
        // Topic-less messages reach only catch-all subscribers.
        publisher.publish(&Message::raw(reading.to_be_bytes().to_vec()))?;
        thread::sleep(Duration::from_secs(1));
    }

    publisher.stop()?;
    Ok(())
}
