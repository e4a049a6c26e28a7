//! Echo loopback - scheduled sends over an in-memory socket.
//!
//! This example demonstrates:
//! - Building a session with the fluent builder
//! - Scheduling messages with a delay and a repeat interval
//! - Receiving the echoed frames back through the demo protocol
//! - Saving the resulting history as a receive list
//!
//! ```text
//! cargo run --example echo
//! ```

use commswire::demo::{self, DemoMessage};
use commswire::msg_list;
use commswire::transport::EchoSocket;
use commswire::{Message, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::builder()
        .socket(EchoSocket::new())
        .protocol(demo::protocol())
        .start()?;

    session.msg_mgr_mut().on_msg_added(|msg| {
        println!(
            "#{:<3} {:<8} {:<10} {}",
            msg.props.seq_num,
            format!("{:?}", msg.props.msg_type),
            msg.name(),
            msg.fields()
                .iter()
                .map(|f| format!("{}={}", f.name, f.value))
                .collect::<Vec<_>>()
                .join(" ")
        );
    });

    // One greeting right away, a heartbeat every 250 ms four times.
    let hello = Message::new(DemoMessage::text("hello"));
    let mut heartbeat = Message::new(DemoMessage::Heartbeat { counter: 1 });
    heartbeat.props.delay = 100;
    heartbeat.props.repeat_duration = 250;
    heartbeat.props.repeat_count = 4;

    session.start_sending([hello, heartbeat])?;
    session.run_until_complete().await;

    let list = msg_list::save_recv_list(session.msg_mgr().all_msgs())?;
    println!("{}", serde_json::to_string_pretty(&list)?);

    session.stop();
    Ok(())
}
