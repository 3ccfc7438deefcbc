use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use topicmq_frame::{Envelope, Message, Topic};

/// Application-side receiver of delivered messages.
///
/// Called on the subscriber's receive thread. Implementations must not call
/// `stop()` or the filter methods of the session that delivers to them;
/// those calls fail with `CalledFromReceiver`.
pub trait MessageHandler: Send + Sync {
    /// A message published without a topic.
    fn on_message(&self, message: Message);

    /// A message published to `topic`, as it arrived on the wire.
    fn on_topic_message(&self, topic: &Topic, message: Message);
}

/// Callback for topic-less deliveries.
pub type MessageCallback = Box<dyn Fn(Message) + Send + Sync>;

/// Callback for topic deliveries.
pub type TopicMessageCallback = Box<dyn Fn(&Topic, Message) + Send + Sync>;

/// Where a subscriber delivers messages.
///
/// The form is fixed when the sink is built.
pub enum Sink {
    /// A pair of closures.
    Callbacks {
        on_message: MessageCallback,
        on_topic_message: TopicMessageCallback,
    },
    /// A handler object.
    Handler(Arc<dyn MessageHandler>),
}

impl Sink {
    /// Sink from two closures.
    pub fn callbacks<M, T>(on_message: M, on_topic_message: T) -> Self
    where
        M: Fn(Message) + Send + Sync + 'static,
        T: Fn(&Topic, Message) + Send + Sync + 'static,
    {
        Sink::Callbacks {
            on_message: Box::new(on_message),
            on_topic_message: Box::new(on_topic_message),
        }
    }

    /// Sink from a handler object.
    pub fn handler<H: MessageHandler + 'static>(handler: H) -> Self {
        Sink::Handler(Arc::new(handler))
    }

    /// Sink that forwards every delivery into an unbounded channel.
    pub fn channel() -> (Self, Receiver<Envelope>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Sink::handler(ChannelHandler { tx }), rx)
    }

    /// Deliver one decoded message.
    pub fn dispatch(&self, envelope: Envelope) {
        let Envelope { topic, message } = envelope;
        match (self, topic) {
            (Sink::Callbacks { on_message, .. }, None) => on_message(message),
            (Sink::Callbacks { on_topic_message, .. }, Some(topic)) => {
                on_topic_message(&topic, message)
            }
            (Sink::Handler(handler), None) => handler.on_message(message),
            (Sink::Handler(handler), Some(topic)) => handler.on_topic_message(&topic, message),
        }
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Callbacks { .. } => f.write_str("Sink::Callbacks"),
            Sink::Handler(_) => f.write_str("Sink::Handler"),
        }
    }
}

struct ChannelHandler {
    tx: Sender<Envelope>,
}

impl ChannelHandler {
    fn forward(&self, envelope: Envelope) {
        if self.tx.send(envelope).is_err() {
            debug!("delivery channel closed; message discarded");
        }
    }
}

impl MessageHandler for ChannelHandler {
    fn on_message(&self, message: Message) {
        self.forward(Envelope::broadcast(message));
    }

    fn on_topic_message(&self, topic: &Topic, message: Message) {
        self.forward(Envelope::addressed(topic.clone(), message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(Option<String>, Vec<u8>)>>,
    }

    impl MessageHandler for Recorder {
        fn on_message(&self, message: Message) {
            self.seen
                .lock()
                .unwrap()
                .push((None, message.payload().to_vec()));
        }

        fn on_topic_message(&self, topic: &Topic, message: Message) {
            self.seen
                .lock()
                .unwrap()
                .push((Some(topic.to_string()), message.payload().to_vec()));
        }
    }

    #[test]
    fn callbacks_route_by_topic_presence() {
        let (plain_tx, plain_rx) = crossbeam_channel::unbounded();
        let (topic_tx, topic_rx) = crossbeam_channel::unbounded();
        let sink = Sink::callbacks(
            move |m: Message| plain_tx.send(m).unwrap(),
            move |t: &Topic, m: Message| topic_tx.send((t.clone(), m)).unwrap(),
        );

        sink.dispatch(Envelope::broadcast(Message::raw(vec![1u8])));
        sink.dispatch(Envelope::addressed(
            Topic::new("home/livingroom").unwrap(),
            Message::structured(vec![2u8]),
        ));

        assert_eq!(plain_rx.try_recv().unwrap().payload().as_ref(), &[1]);
        let (topic, message) = topic_rx.try_recv().unwrap();
        assert_eq!(topic.as_str(), "home/livingroom/");
        assert_eq!(message.payload().as_ref(), &[2]);
        assert!(plain_rx.try_recv().is_err());
        assert!(topic_rx.try_recv().is_err());
    }

    #[test]
    fn handler_receives_both_forms() {
        let recorder = Arc::new(Recorder::default());
        let sink = Sink::Handler(recorder.clone());

        sink.dispatch(Envelope::addressed(
            Topic::new("a/b").unwrap(),
            Message::raw(b"x".to_vec()),
        ));
        sink.dispatch(Envelope::broadcast(Message::raw(b"y".to_vec())));

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (Some("a/b/".to_string()), b"x".to_vec()),
                (None, b"y".to_vec()),
            ]
        );
    }

    #[test]
    fn channel_sink_forwards_envelopes() {
        let (sink, rx) = Sink::channel();
        let envelope = Envelope::addressed(Topic::new("t").unwrap(), Message::raw(vec![9u8]));
        sink.dispatch(envelope.clone());
        assert_eq!(rx.try_recv().unwrap(), envelope);

        drop(rx);
        sink.dispatch(envelope);
    }
}
