//! Integration tests: a real `Sender` and `Receiver` talking over UDP on
//! localhost, plus the wire behaviour seen from a bare socket.

use std::sync::atomic::Ordering;
use std::time::Duration;

use framecast_core::net::bind_udp;
use framecast_core::{
    ChunkHeader, ControlSample, DisplayBuffer, DisplaySink, FrameSource, FramecastError,
    FragmenterConfig, InputProvider, InputSnapshot, KeyboardState, RawFrame, Receiver,
    ReceiverConfig, Sender, SenderConfig,
};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

// ── Helpers ──────────────────────────────────────────────────────

const WIDTH: u32 = 40;
const HEIGHT: u32 = 30;

fn raster() -> Vec<u8> {
    (0..WIDTH * HEIGHT * 3).map(|i| (i % 251) as u8).collect()
}

/// Always yields the same raster.
struct Still;

impl FrameSource for Still {
    fn dimensions(&self) -> (u32, u32) {
        (WIDTH, HEIGHT)
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>, FramecastError> {
        RawFrame::new(WIDTH, HEIGHT, raster()).map(Some)
    }
}

/// Forwards every presented frame to the test.
struct Forward(mpsc::UnboundedSender<(u32, u32, u32, Vec<u8>)>);

impl DisplaySink for Forward {
    fn present(&mut self, frame: &DisplayBuffer) -> Result<(), FramecastError> {
        self.0
            .send((
                frame.frame_id(),
                frame.width(),
                frame.height(),
                frame.pixel_data().to_vec(),
            ))
            .map_err(|e| FramecastError::Display(e.to_string()))
    }
}

struct Idle;

impl InputProvider for Idle {
    fn poll(&mut self) -> InputSnapshot {
        InputSnapshot::Keyboard(KeyboardState::default())
    }
}

fn loopback() -> UdpSocket {
    bind_udp("127.0.0.1:0".parse().unwrap(), None).unwrap()
}

fn sender_config(video_port: u16) -> SenderConfig {
    SenderConfig {
        video_port,
        target_fps: 60,
        fragmenter: FragmenterConfig {
            payload_cap: 500,
            ..FragmenterConfig::default()
        },
        idle_delay: Duration::from_millis(10),
        ..SenderConfig::default()
    }
}

// ── End to end ───────────────────────────────────────────────────

#[tokio::test]
async fn frames_flow_after_receiver_associates() {
    let sender_control = loopback();
    let receiver_video = bind_udp("127.0.0.1:0".parse().unwrap(), Some(1 << 20)).unwrap();

    let mut sender = Sender::from_sockets(
        sender_config(receiver_video.local_addr().unwrap().port()),
        sender_control,
        loopback(),
        Box::new(Still),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let receiver_config = ReceiverConfig {
        server_control_addr: sender.local_control_addr().unwrap(),
        ..ReceiverConfig::default()
    };
    let mut receiver = Receiver::from_sockets(
        receiver_config,
        receiver_video,
        loopback(),
        Box::new(Forward(tx)),
        Box::new(Idle),
    )
    .unwrap();

    let stop_sender = sender.stop_handle();
    let stop_receiver = receiver.stop_handle();
    let sender_task = tokio::spawn(async move { sender.run().await });
    let receiver_task = tokio::spawn(async move { receiver.run().await });

    let (frame_id, width, height, pixels) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timeout waiting for a frame")
        .expect("display channel closed");

    assert!(frame_id >= 1);
    assert_eq!((width, height), (WIDTH, HEIGHT));
    assert_eq!(pixels, raster());

    stop_sender.store(false, Ordering::SeqCst);
    stop_receiver.store(false, Ordering::SeqCst);
    sender_task.await.unwrap().unwrap();
    receiver_task.await.unwrap().unwrap();
}

// ── Wire behaviour ───────────────────────────────────────────────

#[tokio::test]
async fn sender_is_silent_until_control_arrives() {
    let peer = loopback();
    let peer_port = peer.local_addr().unwrap().port();
    let mut sender = Sender::from_sockets(
        sender_config(peer_port),
        loopback(),
        loopback(),
        Box::new(Still),
    );
    let control_addr = sender.local_control_addr().unwrap();
    let stop = sender.stop_handle();
    let task = tokio::spawn(async move { sender.run().await });

    let mut buf = vec![0u8; 2048];
    let silent = tokio::time::timeout(Duration::from_millis(150), peer.recv_from(&mut buf)).await;
    assert!(silent.is_err(), "no datagram may be sent before association");

    peer.send_to(&ControlSample::default().to_bytes(), control_addr)
        .await
        .unwrap();

    let (n, _) = tokio::time::timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
        .await
        .expect("timeout waiting for a chunk")
        .unwrap();
    let header = ChunkHeader::decode(&buf[..n]).unwrap();
    assert_eq!(header.frame_id, 1);
    assert_eq!((header.width, header.height), (WIDTH, HEIGHT));
    assert_eq!(header.total_chunks, 8);
    assert_eq!(n, ChunkHeader::SIZE + header.chunk_size as usize);

    stop.store(false, Ordering::SeqCst);
    task.await.unwrap().unwrap();
}
