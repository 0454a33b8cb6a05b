//! UDP socket setup.
//!
//! Sockets are built with `socket2` so the kernel receive buffer can be
//! enlarged before binding (a full frame arrives as hundreds of
//! datagrams in a burst), then handed to tokio in non-blocking mode.

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::error::FramecastError;

/// Receive buffer requested for the video socket.
pub const DEFAULT_RECV_BUFFER: usize = 4 * 1024 * 1024;

/// Bind a non-blocking UDP socket at `addr`.
///
/// `recv_buffer` of `None` keeps the OS default. A refused buffer size
/// is only logged; a failed bind is fatal and reported with the address.
pub fn bind_udp(addr: SocketAddr, recv_buffer: Option<usize>) -> Result<UdpSocket, FramecastError> {
    let bind_err = |source| FramecastError::Bind { addr, source };

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(bind_err)?;

    if let Some(size) = recv_buffer {
        match socket.set_recv_buffer_size(size) {
            Ok(()) => debug!(
                "{addr}: receive buffer {} bytes",
                socket.recv_buffer_size().unwrap_or(0)
            ),
            Err(e) => warn!("{addr}: could not set receive buffer to {size} bytes: {e}"),
        }
    }

    socket.set_nonblocking(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(bind_err)
}

/// Bind an ephemeral-port socket able to reach `peer`.
pub fn bind_ephemeral_for(peer: SocketAddr) -> Result<UdpSocket, FramecastError> {
    let any: SocketAddr = if peer.is_ipv4() {
        (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
    };
    bind_udp(any, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_loopback_with_buffer() {
        let socket = bind_udp("127.0.0.1:0".parse().unwrap(), Some(DEFAULT_RECV_BUFFER)).unwrap();
        assert_ne!(socket.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn bind_conflict_names_address() {
        let first = bind_udp("127.0.0.1:0".parse().unwrap(), None).unwrap();
        let taken = first.local_addr().unwrap();
        match bind_udp(taken, None) {
            Err(FramecastError::Bind { addr, .. }) => assert_eq!(addr, taken),
            other => panic!("expected bind error, got {other:?}"),
        }
    }
}
