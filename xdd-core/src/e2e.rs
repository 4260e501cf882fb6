//! End-to-End network protocol engine (spec.md §4.6 C6).
//!
//! Source targets frame each completed read as an [`E2eHeader`] + payload
//! and write it to one of N TCP streams (one per destination port);
//! destination targets read frames off their listening sockets and turn
//! them into local write `Task`s. Blocking `std::net` sockets are used
//! throughout, matching the "parallel OS threads, no cooperative task
//! runtime" constraint (spec.md §5) the same way the rest of the engine
//! avoids async I/O.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};

use xdd_wire::e2e::{E2eHeader, E2E_HEADER_SIZE};

use crate::config::E2eAddress;

/// One connected source-side stream, guarded so concurrent workers can
/// share it (spec.md §4.6: "multiple workers may share a destination
/// port; frames interleave safely because each carries its own header").
pub struct SourceSession {
    streams: Vec<std::sync::Mutex<TcpStream>>,
}

impl SourceSession {
    /// Connect one TCP stream per configured destination port.
    pub fn connect(addresses: &[E2eAddress]) -> io::Result<Self> {
        let mut streams = Vec::new();
        for addr in addresses {
            for port_offset in 0..addr.port_count.max(1) {
                let port = addr.base_port + port_offset;
                let stream = TcpStream::connect((addr.host.as_str(), port))?;
                stream.set_nodelay(true).ok();
                streams.push(std::sync::Mutex::new(stream));
            }
        }
        Ok(Self { streams })
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Destination stream for a given sender worker, round-robin over the
    /// configured ports (spec.md §4.6 "worker-to-port mapping").
    pub fn stream_for_worker(&self, worker: usize) -> usize {
        if self.streams.is_empty() {
            0
        } else {
            worker % self.streams.len()
        }
    }

    pub fn send_data(
        &self,
        stream_idx: usize,
        header: E2eHeader,
        payload: &[u8],
    ) -> io::Result<()> {
        let mut stream = self.streams[stream_idx].lock().unwrap();
        stream.write_all(&header.to_le_bytes())?;
        stream.write_all(payload)?;
        Ok(())
    }

    /// Send an EOF frame on every stream, once each, to let destinations
    /// know no more data is coming on that connection.
    pub fn send_eof(&self, sender_worker: u32, op_sequence: u64, send_time_ns: u64) -> io::Result<()> {
        let header = E2eHeader::eof(sender_worker, op_sequence, send_time_ns);
        for stream in &self.streams {
            let mut stream = stream.lock().unwrap();
            stream.write_all(&header.to_le_bytes())?;
        }
        Ok(())
    }
}

/// Destination side: one listener per configured local port, accepting
/// exactly one connection each (spec.md §4.6 "one source stream per
/// destination port, no reconnection mid-run").
pub struct DestinationSession {
    streams: Vec<TcpStream>,
}

impl DestinationSession {
    pub fn listen(bind_host: &str, base_port: u16, port_count: u16) -> io::Result<Self> {
        let mut listeners = Vec::new();
        for port_offset in 0..port_count.max(1) {
            listeners.push(TcpListener::bind((bind_host, base_port + port_offset))?);
        }
        let mut streams = Vec::new();
        for listener in listeners {
            let (stream, _) = listener.accept()?;
            stream.set_nodelay(true).ok();
            streams.push(stream);
        }
        Ok(Self { streams })
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Read one frame off stream `idx`. Returns `None` once that stream
    /// sends its EOF frame or is closed by the peer.
    pub fn recv_frame(&mut self, idx: usize) -> io::Result<Option<(E2eHeader, Vec<u8>)>> {
        let stream = &mut self.streams[idx];
        let mut header_bytes = [0u8; E2E_HEADER_SIZE];
        match read_exact_or_eof(stream, &mut header_bytes)? {
            false => return Ok(None),
            true => {}
        }
        let header = E2eHeader::from_le_bytes(&header_bytes);
        if header.is_eof() {
            return Ok(None);
        }
        let mut payload = vec![0u8; header.data_length as usize];
        stream.read_exact(&mut payload)?;
        Ok(Some((header, payload)))
    }
}

/// Like `read_exact` but returns `Ok(false)` on a clean EOF at a frame
/// boundary instead of erroring, so the destination can distinguish "peer
/// hung up after sending EOF frame" from "peer died mid-frame".
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return if filled == 0 {
                    Ok(false)
                } else {
                    Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed mid-frame",
                    ))
                }
            }
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn source_sends_destination_receives_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut header_bytes = [0u8; E2E_HEADER_SIZE];
            stream.read_exact(&mut header_bytes).unwrap();
            let header = E2eHeader::from_le_bytes(&header_bytes);
            let mut payload = vec![0u8; header.data_length as usize];
            stream.read_exact(&mut payload).unwrap();
            (header, payload)
        });

        thread::sleep(std::time::Duration::from_millis(20));
        let client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let session = SourceSession {
            streams: vec![std::sync::Mutex::new(client)],
        };
        let header = E2eHeader::data(0, 0, 1000, 0, 1024);
        session.send_data(0, header, &[7u8; 1024]).unwrap();

        let (recv_header, recv_payload) = server.join().unwrap();
        assert_eq!(recv_header.data_length, 1024);
        assert_eq!(recv_payload, vec![7u8; 1024]);
    }
}
