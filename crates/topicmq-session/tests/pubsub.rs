use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use topicmq_frame::{ContentType, Envelope, Message};
use topicmq_session::{ErrorCode, PublisherSession, SessionError, Sink, SubscriberSession};
use topicmq_transport::{bind, has_curve, tcp_bind_address, Context, SocketKind};

const WAIT: Duration = Duration::from_secs(5);

/// Publish with `publish` until the subscriber sees something.
///
/// Subscriptions propagate to the publisher asynchronously, so the first
/// messages after connecting can be lost.
fn warm_up(deliveries: &Receiver<Envelope>, mut publish: impl FnMut()) -> Envelope {
    let start = Instant::now();
    loop {
        publish();
        if let Ok(envelope) = deliveries.recv_timeout(Duration::from_millis(25)) {
            return envelope;
        }
        assert!(start.elapsed() < WAIT, "no delivery within {WAIT:?}");
    }
}

/// Discard deliveries already in flight.
fn drain(deliveries: &Receiver<Envelope>) {
    while deliveries.recv_timeout(Duration::from_millis(100)).is_ok() {}
}

fn subscriber(ctx: &Context, port: u16) -> (SubscriberSession, Receiver<Envelope>) {
    let (sink, deliveries) = Sink::channel();
    let session = SubscriberSession::new(ctx.clone(), "127.0.0.1", port, sink);
    session.start().expect("subscriber should start");
    (session, deliveries)
}

fn publisher(ctx: &Context, port: u16) -> PublisherSession {
    let session = PublisherSession::new(ctx.clone(), port);
    session.start().expect("publisher should start");
    session
}

#[test]
fn raw_message_reaches_catch_all_subscriber() {
    let ctx = Context::new();
    let publisher = publisher(&ctx, 47401);
    let (subscriber, deliveries) = subscriber(&ctx, 47401);
    subscriber.subscribe_all().expect("filter should install");

    let message = Message::raw(vec![0x01, 0x02, 0x03]);
    let envelope = warm_up(&deliveries, || publisher.publish(&message).expect("publish"));

    assert!(envelope.topic.is_none());
    assert_eq!(envelope.message.content_type(), ContentType::Raw);
    assert_eq!(envelope.message.payload().as_ref(), &[0x01, 0x02, 0x03]);

    subscriber.stop().expect("subscriber should stop");
    publisher.stop().expect("publisher should stop");
}

#[test]
fn topic_is_delivered_in_canonical_form() {
    let ctx = Context::new();
    let publisher = publisher(&ctx, 47402);
    let (subscriber, deliveries) = subscriber(&ctx, 47402);
    subscriber.subscribe("home/").expect("filter should install");

    let message = Message::structured(&b"\x08\x01"[..]);
    let envelope = warm_up(&deliveries, || {
        publisher
            .publish_topic("home/livingroom", &message)
            .expect("publish")
    });

    assert_eq!(
        envelope.topic.expect("topic should be present").as_str(),
        "home/livingroom/"
    );
    assert_eq!(envelope.message.content_type(), ContentType::Structured);
    assert_eq!(envelope.message.payload().as_ref(), b"\x08\x01");
}

#[test]
fn prefix_filter_excludes_parent_topics() {
    let ctx = Context::new();
    let publisher = publisher(&ctx, 47403);
    let (subscriber, deliveries) = subscriber(&ctx, 47403);
    subscriber.subscribe("a/b").expect("filter should install");

    warm_up(&deliveries, || {
        publisher
            .publish_topic("a/b/c", &Message::raw(&b"warm"[..]))
            .expect("publish")
    });
    drain(&deliveries);

    publisher
        .publish_topic("a", &Message::raw(&b"parent"[..]))
        .expect("publish");
    publisher
        .publish(&Message::raw(&b"untopiced"[..]))
        .expect("publish");
    publisher
        .publish_topic("a/b/c", &Message::raw(&b"child"[..]))
        .expect("publish");

    let next = deliveries.recv_timeout(WAIT).expect("child should arrive");
    assert_eq!(next.topic.expect("topic").as_str(), "a/b/c/");
    assert_eq!(next.message.payload().as_ref(), b"child");
}

#[test]
fn unsubscribe_stops_delivery() {
    let ctx = Context::new();
    let publisher = publisher(&ctx, 47404);
    let (subscriber, deliveries) = subscriber(&ctx, 47404);
    subscriber
        .subscribe_topics(&["x", "y"])
        .expect("filters should install");

    warm_up(&deliveries, || {
        publisher
            .publish_topic("x", &Message::raw(&b"warm"[..]))
            .expect("publish")
    });
    subscriber.unsubscribe("x").expect("filter should be removed");
    drain(&deliveries);

    publisher
        .publish_topics(&["x", "y"], &Message::raw(&b"after"[..]))
        .expect("publish");

    let next = deliveries.recv_timeout(WAIT).expect("y should arrive");
    assert_eq!(next.topic.expect("topic").as_str(), "y/");
}

#[test]
fn topic_list_stops_at_first_invalid_topic() {
    let ctx = Context::new();
    let (subscriber, _deliveries) = subscriber(&ctx, 47405);
    let err = subscriber
        .subscribe_topics(&["ok", "not ok", "never"])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidTopic);

    let publisher = publisher(&ctx, 47405);
    let err = publisher
        .publish_topics(&["ok", "", "never"], &Message::raw(vec![1u8]))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidTopic);
}

#[test]
fn stop_twice_is_a_noop() {
    let ctx = Context::new();
    let (subscriber, _deliveries) = subscriber(&ctx, 47406);
    subscriber.subscribe_all().expect("filter should install");

    subscriber.stop().expect("first stop");
    subscriber.stop().expect("second stop");
    assert!(!subscriber.is_running());
    assert!(matches!(
        subscriber.subscribe_all(),
        Err(SessionError::NotStarted)
    ));
}

#[test]
fn publish_after_stop_fails() {
    let ctx = Context::new();
    let publisher = publisher(&ctx, 47407);
    publisher.stop().expect("publisher should stop");

    let err = publisher.publish(&Message::raw(vec![1u8])).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Error);
}

#[test]
fn sessions_restart_ten_times() {
    let ctx = Context::new();
    let publisher = PublisherSession::new(ctx.clone(), 47408);
    let (sink, _deliveries) = Sink::channel();
    let subscriber = SubscriberSession::new(ctx, "127.0.0.1", 47408, sink);

    for round in 0..10 {
        publisher.start().unwrap_or_else(|e| panic!("publisher start {round}: {e}"));
        subscriber.start().unwrap_or_else(|e| panic!("subscriber start {round}: {e}"));
        subscriber.subscribe("round").expect("filter should install");
        subscriber.stop().expect("subscriber should stop");
        publisher.stop().expect("publisher should stop");
    }
}

#[test]
fn concurrent_publishes_are_not_interleaved() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 50;

    let ctx = Context::new();
    let publisher = Arc::new(publisher(&ctx, 47409));
    let (subscriber, deliveries) = subscriber(&ctx, 47409);
    subscriber.subscribe("load").expect("filter should install");

    warm_up(&deliveries, || {
        publisher
            .publish_topic("load/warm", &Message::raw(&b"warm"[..]))
            .expect("publish")
    });
    drain(&deliveries);

    let handles: Vec<_> = (0..THREADS)
        .map(|id| {
            let publisher = Arc::clone(&publisher);
            thread::spawn(move || {
                let topic = format!("load/{id}");
                for seq in 0..PER_THREAD {
                    let payload = format!("{id}:{seq}").into_bytes();
                    publisher
                        .publish_topic(&topic, &Message::raw(payload))
                        .expect("publish");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("publisher thread");
    }

    let mut per_topic: HashMap<String, Vec<usize>> = HashMap::new();
    for _ in 0..THREADS * PER_THREAD {
        let envelope = deliveries.recv_timeout(WAIT).expect("message should arrive");
        let topic = envelope.topic.expect("topic").into_string();
        let payload = String::from_utf8(envelope.message.payload().to_vec()).expect("utf-8");
        let (id, seq) = payload.split_once(':').expect("id:seq payload");
        assert_eq!(topic, format!("load/{id}/"), "payload landed under another topic");
        per_topic
            .entry(topic)
            .or_default()
            .push(seq.parse().expect("sequence number"));
    }

    assert_eq!(per_topic.len(), THREADS);
    for seqs in per_topic.values() {
        assert_eq!(*seqs, (0..PER_THREAD).collect::<Vec<_>>());
    }
}

#[test]
fn invalid_messages_are_dropped() {
    let ctx = Context::new();
    let raw = ctx.socket(SocketKind::Pub).expect("socket");
    bind(&raw, &tcp_bind_address(47410)).expect("bind");
    let (subscriber, deliveries) = subscriber(&ctx, 47410);
    subscriber.subscribe_all().expect("filter should install");

    warm_up(&deliveries, || {
        raw.send_multipart([&[0x24u8][..], &b"warm"[..]], 0)
            .expect("send")
    });
    drain(&deliveries);

    // reserved content type, bad version, extra frames, then a valid message
    raw.send_multipart([&[0x64u8][..], &b"reserved"[..]], 0)
        .expect("send");
    raw.send_multipart([&[0x28u8][..], &b"version 2"[..]], 0)
        .expect("send");
    raw.send_multipart([&b"t/"[..], &[0x24u8][..], &b"a"[..], &b"b"[..]], 0)
        .expect("send");
    raw.send_multipart([&[0x24u8][..], &b"valid"[..]], 0)
        .expect("send");

    let next = deliveries.recv_timeout(WAIT).expect("valid message");
    assert_eq!(next.message.payload().as_ref(), b"valid");
    assert!(subscriber.is_running());
}

#[test]
fn second_endpoint_delivers() {
    let ctx = Context::new();
    let first = publisher(&ctx, 47411);
    let second = publisher(&ctx, 47412);
    let (subscriber, deliveries) = subscriber(&ctx, 47411);

    subscriber
        .subscribe_endpoint("127.0.0.1", 47412, "sensors")
        .expect("second endpoint should connect");

    let envelope = warm_up(&deliveries, || {
        second
            .publish_topic("sensors/temp", &Message::raw(&b"21"[..]))
            .expect("publish")
    });
    assert_eq!(envelope.topic.expect("topic").as_str(), "sensors/temp/");

    first.stop().expect("first publisher should stop");
}

#[test]
fn stop_from_delivery_is_refused() {
    let ctx = Context::new();
    let publisher = publisher(&ctx, 47413);

    let session: Arc<OnceLock<Weak<SubscriberSession>>> = Arc::new(OnceLock::new());
    let (results_tx, results) = crossbeam_channel::unbounded();
    let handle = Arc::clone(&session);
    let sink = Sink::callbacks(
        move |_message| {
            if let Some(subscriber) = handle.get().and_then(Weak::upgrade) {
                let _ = results_tx.send(subscriber.stop().map_err(|e| e.to_string()));
            }
        },
        |_topic, _message| {},
    );
    let subscriber = Arc::new(SubscriberSession::new(ctx.clone(), "127.0.0.1", 47413, sink));
    session
        .set(Arc::downgrade(&subscriber))
        .expect("set once");
    subscriber.start().expect("subscriber should start");
    subscriber.subscribe_all().expect("filter should install");

    let start = Instant::now();
    let outcome = loop {
        publisher.publish(&Message::raw(vec![0u8])).expect("publish");
        if let Ok(outcome) = results.recv_timeout(Duration::from_millis(25)) {
            break outcome;
        }
        assert!(start.elapsed() < WAIT, "callback never ran");
    };

    let err = outcome.expect_err("stop from the receive thread should fail");
    assert!(err.contains("receive thread"), "unexpected error: {err}");
    assert!(subscriber.is_running());
    subscriber.stop().expect("stop from caller thread");
}

#[test]
fn stop_after_receive_loop_died_returns_promptly() {
    let ctx = Context::new();
    let publisher = publisher(&ctx, 47416);
    let sink = Sink::callbacks(
        |_message| panic!("delivery handler failed"),
        |_topic, _message| {},
    );
    let subscriber = SubscriberSession::new(ctx, "127.0.0.1", 47416, sink);
    subscriber.start().expect("subscriber should start");
    subscriber.subscribe_all().expect("filter should install");

    let start = Instant::now();
    while subscriber.is_running() {
        publisher.publish(&Message::raw(vec![0u8])).expect("publish");
        thread::sleep(Duration::from_millis(25));
        assert!(start.elapsed() < WAIT, "receive loop never exited");
    }
    assert!(matches!(
        subscriber.subscribe_all(),
        Err(SessionError::ReceiverExited)
    ));

    let stopping = Instant::now();
    subscriber.stop().expect("stop after the loop died");
    assert!(stopping.elapsed() < Duration::from_secs(1));

    let restarting = Instant::now();
    subscriber.start().expect("start after the loop died");
    assert!(restarting.elapsed() < Duration::from_secs(1));
    assert!(subscriber.is_running());
    subscriber.stop().expect("subscriber should stop");
}

#[test]
fn wire_topic_is_delivered_as_received() {
    let ctx = Context::new();
    let raw = ctx.socket(SocketKind::Pub).expect("socket");
    bind(&raw, &tcp_bind_address(47417)).expect("bind");
    let (subscriber, deliveries) = subscriber(&ctx, 47417);
    subscriber.subscribe_all().expect("filter should install");

    warm_up(&deliveries, || {
        raw.send_multipart([&[0x24u8][..], &b"warm"[..]], 0)
            .expect("send")
    });
    drain(&deliveries);

    raw.send_multipart([&b"home"[..], &[0x24u8][..], &b"x"[..]], 0)
        .expect("send");
    raw.send_multipart([&b"home#1"[..], &[0x24u8][..], &b"y"[..]], 0)
        .expect("send");

    let first = deliveries.recv_timeout(WAIT).expect("bare topic");
    assert_eq!(first.topic.expect("topic").as_str(), "home");
    assert_eq!(first.message.payload().as_ref(), b"x");

    let second = deliveries.recv_timeout(WAIT).expect("topic outside the alphabet");
    assert_eq!(second.topic.expect("topic").as_str(), "home#1");
    assert_eq!(second.message.payload().as_ref(), b"y");
}

#[test]
fn empty_client_keys_are_rejected() {
    let ctx = Context::new();
    let (sink, _deliveries) = Sink::channel();
    let subscriber = SubscriberSession::new(ctx, "127.0.0.1", 47414, sink);
    let err = subscriber.set_client_keys("", "").unwrap_err();
    assert_eq!(err.code(), ErrorCode::Error);
}

#[test]
fn curve_secured_delivery() {
    if !has_curve() {
        eprintln!("skipping curve_secured_delivery: libzmq built without CURVE");
        let publisher = PublisherSession::new(Context::new(), 47415);
        assert!(matches!(
            publisher.set_server_secret_key("rq:rM>}U?@Lns47E1%kR.o@n%FcmmsL/@{H8]yf7"),
            Err(SessionError::SecurityUnsupported)
        ));
        return;
    }
    let server = zmq::CurveKeyPair::new().expect("server keypair");
    let client = zmq::CurveKeyPair::new().expect("client keypair");
    let z85 = |key: &[u8]| zmq::z85_encode(key).expect("z85");

    let ctx = Context::new();
    let publisher = PublisherSession::new(ctx.clone(), 47415);
    publisher
        .set_server_secret_key(&z85(&server.secret_key))
        .expect("server key");
    publisher.start().expect("publisher should start");

    let (sink, deliveries) = Sink::channel();
    let subscriber = SubscriberSession::new(ctx, "127.0.0.1", 47415, sink);
    subscriber
        .set_server_public_key(&z85(&server.public_key))
        .expect("server public key");
    subscriber
        .set_client_keys(&z85(&client.secret_key), &z85(&client.public_key))
        .expect("client keys");
    subscriber.start().expect("subscriber should start");
    subscriber.subscribe("secure").expect("filter should install");

    let envelope = warm_up(&deliveries, || {
        publisher
            .publish_topic("secure/channel", &Message::raw(&b"secret"[..]))
            .expect("publish")
    });
    assert_eq!(envelope.message.payload().as_ref(), b"secret");
}
