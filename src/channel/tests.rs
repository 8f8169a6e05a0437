// src/channel/tests.rs

use super::*;
use crate::protocol::wire::WireReader;
use std::sync::Arc;
use std::thread;

fn pair() -> (MessageChannel, UnixStream) {
    let (engine_end, controller_end) = UnixStream::pair().unwrap();
    (MessageChannel::new(Box::new(engine_end)), controller_end)
}

fn read_engine_message(stream: &mut UnixStream) -> EngineMessage {
    EngineMessage::read_from(&mut WireReader::new(stream)).unwrap()
}

#[test_log::test]
fn try_receive_returns_none_when_idle() {
    let (channel, _controller) = pair();
    assert!(channel.lock().try_receive().unwrap().is_none());
}

#[test_log::test]
fn messages_arrive_in_order() {
    let (channel, mut controller) = pair();
    controller
        .write_all(&ControllerMessage::RamWatch("a".into()).encode())
        .unwrap();
    controller
        .write_all(&ControllerMessage::StartFrameBoundary.encode())
        .unwrap();

    let mut guard = channel.lock();
    assert_eq!(guard.receive().unwrap(), ControllerMessage::RamWatch("a".into()));
    assert_eq!(
        guard.try_receive().unwrap(),
        Some(ControllerMessage::StartFrameBoundary)
    );
    assert!(guard.try_receive().unwrap().is_none());
}

#[test_log::test]
fn hang_up_is_reported_as_closed() {
    let (channel, controller) = pair();
    drop(controller);
    let mut guard = channel.lock();
    assert!(matches!(guard.try_receive(), Err(ChannelError::Closed)));
}

#[test_log::test]
fn send_to_closed_peer_fails() {
    let (channel, controller) = pair();
    drop(controller);
    assert!(channel.send(&EngineMessage::StartFrameBoundary).is_err());
}

#[test_log::test]
fn oversized_strings_are_refused() {
    let (engine_end, mut controller) = UnixStream::pair().unwrap();
    let channel = MessageChannel::with_string_limit(Box::new(engine_end), 2);
    controller
        .write_all(&ControllerMessage::OsdMessage("too long".into()).encode())
        .unwrap();
    assert!(matches!(
        channel.lock().receive(),
        Err(ChannelError::Oversized { len: 8, limit: 2 })
    ));
}

#[test_log::test]
fn oversized_string_leaves_next_message_aligned() {
    let (engine_end, mut controller) = UnixStream::pair().unwrap();
    let channel = MessageChannel::with_string_limit(Box::new(engine_end), 2);
    controller
        .write_all(&ControllerMessage::OsdMessage("too long".into()).encode())
        .unwrap();
    controller
        .write_all(&ControllerMessage::UserQuit.encode())
        .unwrap();

    let mut guard = channel.lock();
    assert!(guard.receive().is_err());
    assert!(matches!(guard.receive(), Ok(ControllerMessage::UserQuit)));
}

#[test_log::test]
fn held_guard_serializes_other_senders() {
    let (channel, mut controller) = pair();
    let channel = Arc::new(channel);

    let mut guard = channel.lock();
    guard.send(&EngineMessage::NondrawFrame).unwrap();

    let other = {
        let channel = Arc::clone(&channel);
        thread::spawn(move || channel.send(&EngineMessage::WindowId(42)).unwrap())
    };

    // The other thread cannot interleave while the guard is held.
    thread::sleep(std::time::Duration::from_millis(20));
    guard.send(&EngineMessage::StartFrameBoundary).unwrap();
    drop(guard);
    other.join().unwrap();

    assert_eq!(read_engine_message(&mut controller), EngineMessage::NondrawFrame);
    assert_eq!(
        read_engine_message(&mut controller),
        EngineMessage::StartFrameBoundary
    );
    assert_eq!(read_engine_message(&mut controller), EngineMessage::WindowId(42));
}
