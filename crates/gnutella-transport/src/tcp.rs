//! Frames Gnutella packets on top of an async byte stream.
//!
//! One buffer per connection, grown only as far as a single packet needs
//!: reads accumulate into
//! `read_buf` until [`Packet::framed_len`] can see a complete frame, then
//! that frame is sliced out and the remainder kept for the next call.

use std::net::SocketAddr;

use gnutella_msg::message::Packet;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Result, TransportError};

/// Refuse to grow a connection's read buffer past this many bytes while
/// waiting for one packet to complete; a peer claiming more is a size bomb
/// already rejected by `Packet::decode`'s ceiling, but this bounds the
/// buffer itself before that check even runs.
const READ_BUF_CEILING: usize = 4 * 1024 * 1024;

pub struct GnutellaStream<S> {
    inner: S,
    read_buf: Vec<u8>,
}

impl GnutellaStream<TcpStream> {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(GnutellaStream::new(stream))
    }

    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.peer_addr()
    }
}

impl<S> GnutellaStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(inner: S) -> Self {
        GnutellaStream { inner, read_buf: Vec::new() }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Reads and decodes the next packet, blocking on more I/O as needed.
    pub async fn read_packet(&mut self, size_ceiling: usize) -> Result<Packet> {
        loop {
            if let Some(needed) = Packet::framed_len(&self.read_buf) {
                if self.read_buf.len() >= needed {
                    let frame: Vec<u8> = self.read_buf.drain(..needed).collect();
                    return Ok(Packet::decode(&frame, size_ceiling)?);
                }
            }

            if self.read_buf.len() >= READ_BUF_CEILING {
                return Err(TransportError::HeadersTooLarge(READ_BUF_CEILING));
            }

            let mut chunk = [0u8; 4096];
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                return Err(TransportError::ConnectionClosed);
            }
            self.read_buf.extend_from_slice(&chunk[..n]);
        }
    }

    pub async fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        let encoded = packet.encode()?;
        self.inner.write_all(&encoded).await?;
        Ok(())
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnutella_dtyp::Guid;
    use gnutella_msg::header::{Function, Header};
    use gnutella_msg::message::Message;
    use gnutella_msg::ping::PingPayload;
    use tokio::io::duplex;

    #[tokio::test]
    async fn round_trips_a_packet_over_a_duplex_stream() {
        let (client_io, server_io) = duplex(1024);
        let mut client = GnutellaStream::new(client_io);
        let mut server = GnutellaStream::new(server_io);

        let packet = Packet {
            header: Header::new(Guid::random(&mut rand::thread_rng()), Function::Ping, 7, 0, 0),
            message: Message::Ping(PingPayload::new()),
        };

        client.write_packet(&packet).await.unwrap();
        let received = server.read_packet(64 * 1024).await.unwrap();
        assert_eq!(received, packet);
    }

    #[tokio::test]
    async fn leftover_bytes_after_one_frame_feed_the_next_read() {
        let (client_io, server_io) = duplex(1024);
        let mut client = GnutellaStream::new(client_io);
        let mut server = GnutellaStream::new(server_io);

        let packet = Packet {
            header: Header::new(Guid::random(&mut rand::thread_rng()), Function::Ping, 7, 0, 0),
            message: Message::Ping(PingPayload::new()),
        };

        let mut both = packet.encode().unwrap();
        both.extend(packet.encode().unwrap());
        client.write_raw(&both).await.unwrap();

        let first = server.read_packet(64 * 1024).await.unwrap();
        let second = server.read_packet(64 * 1024).await.unwrap();
        assert_eq!(first, packet);
        assert_eq!(second, packet);
    }
}
