//! Socket I/O for the two device channels with timeout handling.
//!
//! The control channel is one UDP datagram out, one datagram back, on a
//! fresh socket per round-trip. The data channel is a single TCP stream
//! held for the whole upload.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, error};

use crate::error::{PrinterError, Result};

/// Largest datagram we expect from the device.
const MAX_DATAGRAM: usize = 1500;

/// Both channels of one printer.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Stream: DataStream;

    /// Send one control datagram and wait for exactly one reply.
    ///
    /// A lost reply is an error; there is no retry.
    async fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>>;

    /// Open the raster data stream.
    async fn open_stream(&mut self) -> Result<Self::Stream>;
}

/// Write side of the raster data stream.
#[allow(async_fn_in_trait)]
pub trait DataStream {
    /// Write every byte or fail; a short write is fatal.
    async fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Shut the stream down.
    async fn close(&mut self) -> Result<()>;
}

/// UDP/TCP transport to a printer on the network.
#[derive(Debug, Clone)]
pub struct NetTransport {
    addr: SocketAddrV4,
    timeout_duration: Duration,
}

impl NetTransport {
    /// Create a transport for the printer at `address:port`.
    pub fn new(address: Ipv4Addr, port: u16, timeout_duration: Duration) -> Self {
        Self {
            addr: SocketAddrV4::new(address, port),
            timeout_duration,
        }
    }
}

impl Transport for NetTransport {
    type Stream = NetStream;

    async fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        let addr = SocketAddr::V4(self.addr);

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| PrinterError::transport(format!("Failed to bind UDP socket: {e}")))?;
        socket
            .connect(addr)
            .await
            .map_err(|e| PrinterError::transport(format!("Failed to address {addr}: {e}")))?;

        debug!("UDP TX ({} bytes): {:02X?}", request.len(), request);
        timeout(self.timeout_duration, socket.send(request))
            .await
            .map_err(|_| PrinterError::timeout(format!("Send timeout to {addr}")))?
            .map_err(|e| {
                error!("Send to {addr} failed: {e}");
                PrinterError::transport(format!("Send to {addr} failed: {e}"))
            })?;

        let mut buffer = vec![0u8; MAX_DATAGRAM];
        let len = timeout(self.timeout_duration, socket.recv(&mut buffer))
            .await
            .map_err(|_| {
                error!("No response from {addr} within {:?}", self.timeout_duration);
                PrinterError::timeout(format!("No response from {addr}"))
            })?
            .map_err(|e| {
                error!("Receive from {addr} failed: {e}");
                PrinterError::transport(format!("Receive from {addr} failed: {e}"))
            })?;
        buffer.truncate(len);

        debug!("UDP RX ({len} bytes): {:02X?}", buffer);
        Ok(buffer)
    }

    async fn open_stream(&mut self) -> Result<NetStream> {
        let addr = SocketAddr::V4(self.addr);
        debug!("TCP connecting to {addr} (timeout={:?})", self.timeout_duration);

        let stream = timeout(self.timeout_duration, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                error!("Connection timeout to {addr}");
                PrinterError::timeout(format!("Connection timeout to {addr}"))
            })?
            .map_err(|e| {
                error!("Failed to connect to {addr}: {e}");
                PrinterError::transport(format!("Failed to connect to {addr}: {e}"))
            })?;

        Ok(NetStream {
            stream,
            timeout_duration: self.timeout_duration,
        })
    }
}

/// TCP data stream to the printer. Dropping it closes the connection.
#[derive(Debug)]
pub struct NetStream {
    stream: TcpStream,
    timeout_duration: Duration,
}

impl DataStream for NetStream {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        debug!(
            "TCP TX ({} bytes): {:02X?}",
            data.len(),
            &data[..data.len().min(32)]
        );
        // Budget grows with the stream size
        let budget = self.timeout_duration + Duration::from_millis(data.len() as u64 / 64);
        timeout(budget, self.stream.write_all(data))
            .await
            .map_err(|_| PrinterError::timeout("Write timeout"))?
            .map_err(|e| {
                error!("Write failed: {e}");
                PrinterError::transport(format!("Write failed: {e}"))
            })?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        timeout(self.timeout_duration, self.stream.shutdown())
            .await
            .map_err(|_| PrinterError::timeout("Shutdown timeout"))??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn local(port: u16) -> NetTransport {
        NetTransport::new(Ipv4Addr::LOCALHOST, port, Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_exchange_round_trip() {
        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = device.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (len, peer) = device.recv_from(&mut buf).await.unwrap();
            let mut reply = buf[..len].to_vec();
            reply.extend_from_slice(&[0x02, 0x00, 0x00]);
            device.send_to(&reply, peer).await.unwrap();
        });

        let mut transport = local(port);
        let reply = transport.exchange(b"TPRT").await.unwrap();
        assert_eq!(reply, b"TPRT\x02\x00\x00");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_lost_reply_is_timeout() {
        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = device.local_addr().unwrap().port();

        let mut transport = NetTransport::new(Ipv4Addr::LOCALHOST, port, Duration::from_millis(50));
        let err = transport.exchange(b"TPRT").await.unwrap_err();
        assert!(matches!(err, PrinterError::Timeout(_)));
        drop(device);
    }

    #[tokio::test]
    async fn test_stream_delivers_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let mut transport = local(port);
        let mut stream = transport.open_stream().await.unwrap();
        stream.write_all(&[0x1b, 0x7b, 0x03, 0x40, 0x40, 0x7d]).await.unwrap();
        stream.close().await.unwrap();
        drop(stream);

        assert_eq!(server.await.unwrap(), vec![0x1b, 0x7b, 0x03, 0x40, 0x40, 0x7d]);
    }
}
