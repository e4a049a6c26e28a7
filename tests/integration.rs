//! Integration tests for commswire.
//!
//! These tests run the demo protocol through the whole pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use commswire::demo::{self, build_frame, DemoMessage};
use commswire::filter::Filter;
use commswire::message::InvalidMessage;
use commswire::msg_list;
use commswire::protocol::Protocol;
use commswire::transport::EchoSocket;
use commswire::{DataInfo, Message, MessageBody, MsgMgr, MsgType, Session};
use tokio::time::Instant;

fn frame(msg: &DemoMessage) -> Vec<u8> {
    let mut payload = Vec::new();
    msg.encode_payload(&mut payload);
    build_frame(msg.id(), &payload)
}

/// (name, raw bytes) of every message, in order.
fn summarize(msgs: &[Message]) -> Vec<(String, Vec<u8>)> {
    msgs.iter()
        .map(|m| {
            let raw = m
                .props
                .raw_data_msg
                .as_ref()
                .map(|r| r.encode_payload())
                .unwrap_or_default();
            (m.name().to_string(), raw)
        })
        .collect()
}

fn mixed_stream() -> Vec<u8> {
    let mut stream = vec![0x01, 0x02, 0x03];
    stream.extend(frame(&DemoMessage::Heartbeat { counter: 7 }));
    stream.extend(frame(&DemoMessage::text("chunked")));
    stream.extend([0xAB, 0x00]);
    stream.extend(frame(&DemoMessage::Status {
        flags: 0x80,
        value: 1_000_000,
    }));
    stream.extend(build_frame(0x55, &[9, 9]));
    stream.extend(frame(&DemoMessage::Heartbeat { counter: 8 }));
    stream
}

/// Test that splitting a stream into chunks does not change the result.
#[test]
fn test_chunking_is_idempotent() {
    let stream = mixed_stream();
    let whole = demo::protocol().read(&DataInfo::new(stream.clone()), true);
    assert_eq!(whole.len(), 7);

    for size in [1, 2, 3, 5, 7, 13, 64] {
        let mut protocol = demo::protocol();
        let chunks: Vec<&[u8]> = stream.chunks(size).collect();
        let mut msgs = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let is_final = i + 1 == chunks.len();
            msgs.extend(protocol.read(&DataInfo::new(chunk.to_vec()), is_final));
        }
        assert_eq!(summarize(&msgs), summarize(&whole), "chunk size {}", size);
    }
}

/// Test that unrecognizable input is flushed in runs of at most 512 bytes.
#[test]
fn test_garbage_bound() {
    for n in [513usize, 1024, 1300] {
        let mut protocol = demo::protocol();
        let msgs = protocol.read(&DataInfo::new(vec![0x00; n]), true);

        assert_eq!(msgs.len(), n.div_ceil(512), "{} bytes", n);
        let total: usize = msgs
            .iter()
            .map(|m| {
                let data = &m.downcast_ref::<InvalidMessage>().unwrap().data;
                assert!(data.len() <= 512);
                data.len()
            })
            .sum();
        assert_eq!(total, n);
    }
}

/// Test that garbage is emitted before the frame that follows it.
#[test]
fn test_garbage_before_success() {
    let valid = frame(&DemoMessage::Heartbeat { counter: 1 });
    let mut stream = vec![0x10, 0x20, 0x30];
    stream.extend(&valid);

    let msgs = demo::protocol().read(&DataInfo::new(stream), false);

    assert_eq!(
        summarize(&msgs),
        vec![
            ("Invalid Message".to_string(), vec![0x10, 0x20, 0x30]),
            ("Heartbeat".to_string(), valid),
        ]
    );
}

/// Test that a final read flushes a trailing partial frame.
#[test]
fn test_end_of_stream_flush() {
    let complete = frame(&DemoMessage::Heartbeat { counter: 3 });
    let partial = frame(&DemoMessage::text("cut short"));
    let mut stream = complete.clone();
    stream.extend(&partial[..6]);

    let msgs = demo::protocol().read(&DataInfo::new(stream), true);

    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0].id_as_string(), "1");
    assert_eq!(
        msgs[1].downcast_ref::<InvalidMessage>().unwrap().data.to_vec(),
        partial[..6].to_vec()
    );
}

/// Test encode/decode round trip for every catalog message.
#[test]
fn test_catalog_round_trip() {
    let mut protocol = demo::protocol();
    for mut msg in protocol.create_all_messages() {
        protocol.update_message(&mut msg);
        let data = protocol.write(&msg).unwrap();
        let decoded = protocol.read(&data, false);
        assert_eq!(decoded.len(), 1, "{}", msg.name());
        assert_eq!(
            decoded[0].downcast_ref::<DemoMessage>(),
            msg.downcast_ref::<DemoMessage>()
        );
    }
}

/// Test that sequence numbers only grow across sends, receives and deletions.
#[test]
fn test_sequence_numbers_strictly_increase() {
    let mut mgr = MsgMgr::new();
    mgr.set_socket(Box::new(EchoSocket::new()));
    mgr.set_protocol(Box::new(demo::protocol()));
    mgr.start().unwrap();

    let mut seen = Vec::new();
    for counter in 0..5u16 {
        mgr.send_msgs([Message::new(DemoMessage::Heartbeat { counter })])
            .unwrap();
        mgr.process_pending_events();
        seen.extend(mgr.all_msgs().iter().map(|m| m.props.seq_num));
        if counter % 2 == 0 {
            mgr.delete_all_msgs();
        } else if let Some(first) = mgr.all_msgs().first() {
            let seq = first.props.seq_num;
            mgr.delete_msg(seq);
        }
    }

    seen.dedup();
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "{:?}", seen);
    assert_eq!(seen.last(), Some(&10));
}

/// XORs every byte in both directions.
struct Scramble(u8);

impl Filter for Scramble {
    fn recv_data(&mut self, data: DataInfo) -> Option<DataInfo> {
        let bytes: Vec<u8> = data.data().iter().map(|b| b ^ self.0).collect();
        Some(data.with_data(bytes))
    }

    fn send_data(&mut self, data: DataInfo) -> Option<DataInfo> {
        self.recv_data(data)
    }
}

/// Test a filter chain on top of a loopback socket.
#[test]
fn test_filters_are_reversible_over_loopback() {
    let session = Session::builder()
        .socket(EchoSocket::new())
        .filter(Scramble(0x5A))
        .filter(Scramble(0xC3))
        .protocol(demo::protocol())
        .start();
    let mut session = session.unwrap();

    let text = DemoMessage::text("through two filters");
    session
        .msg_mgr_mut()
        .send_msgs([Message::new(text.clone())])
        .unwrap();
    session.msg_mgr_mut().process_pending_events();

    let history = session.msg_mgr().all_msgs();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].props.msg_type, MsgType::Received);
    assert_eq!(history[1].downcast_ref::<DemoMessage>(), Some(&text));
}

fn heartbeat(counter: u16, delay: u64, repeat: u64, count: u32) -> Message {
    let mut msg = Message::new(DemoMessage::Heartbeat { counter });
    msg.props.delay = delay;
    msg.props.repeat_duration = repeat;
    msg.props.repeat_count = count;
    msg
}

/// Test the scheduler timeline end to end.
#[tokio::test(start_paused = true)]
async fn test_scheduler_timeline() {
    let mut session = Session::builder()
        .socket(EchoSocket::new())
        .protocol(demo::protocol())
        .start()
        .unwrap();

    let start = Instant::now();
    let timeline = Arc::new(Mutex::new(Vec::new()));
    let t = timeline.clone();
    session.msg_mgr_mut().on_msg_added(move |msg| {
        if msg.props.msg_type == MsgType::Sent {
            if let Some(DemoMessage::Heartbeat { counter }) = msg.downcast_ref::<DemoMessage>() {
                t.lock()
                    .unwrap()
                    .push((start.elapsed().as_millis() as u64, *counter));
            }
        }
    });
    let completions = Arc::new(AtomicUsize::new(0));
    let c = completions.clone();
    session.send_mgr_mut().on_complete(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });

    session
        .start_sending([
            heartbeat(0xA, 0, 0, 1),
            heartbeat(0xB, 100, 0, 1),
            heartbeat(0xC, 100, 50, 3),
        ])
        .unwrap();
    session.run_until_complete().await;

    assert_eq!(
        *timeline.lock().unwrap(),
        vec![(0, 0xA), (100, 0xB), (100, 0xC), (150, 0xC), (200, 0xC)]
    );
    assert_eq!(completions.load(Ordering::SeqCst), 1);

    // Nothing fires after completion.
    let idle = tokio::time::timeout(Duration::from_secs(1), session.send_mgr_mut().tick()).await;
    assert!(idle.is_err());
}

/// Test that a saved send list can be loaded and replayed.
#[tokio::test(start_paused = true)]
async fn test_send_list_replay() {
    let protocol = demo::protocol();
    let list = msg_list::save_send_list([
        heartbeat(1, 0, 0, 1),
        heartbeat(2, 20, 10, 2),
    ])
    .unwrap();
    let msgs = msg_list::load_send_list(&protocol, &list).unwrap();

    let mut session = Session::builder()
        .socket(EchoSocket::new())
        .protocol(protocol)
        .start()
        .unwrap();
    session.start_sending(&msgs).unwrap();
    session.run_until_complete().await;

    let received = session
        .msg_mgr()
        .all_msgs()
        .iter()
        .filter(|m| m.props.msg_type == MsgType::Received)
        .count();
    assert_eq!(received, 3);
}
