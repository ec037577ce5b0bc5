//! Minimal protocol client used against a live server.

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use barlink_protocol::{Message, encode};

/// Line-oriented client speaking the JSONL protocol.
pub struct TestClient {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl TestClient {
    /// Connects to `addr` with a read timeout so tests cannot hang.
    pub fn connect(addr: SocketAddr) -> Self {
        let writer = TcpStream::connect(addr).expect("connect to server");
        writer
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set client read timeout");
        let reader = BufReader::new(writer.try_clone().expect("clone client stream"));
        Self { writer, reader }
    }

    /// Sends `message`.
    pub fn send(&mut self, message: &Message) {
        let bytes = encode(message).expect("encode message");
        self.writer.write_all(&bytes).expect("write message");
    }

    /// Sends raw bytes.
    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).expect("write raw bytes");
    }

    /// Reads the next message, or `None` once the server closes the stream.
    pub fn recv(&mut self) -> Option<Message> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).ok()?;
        if read == 0 {
            return None;
        }
        Some(serde_json::from_str(line.trim_end()).expect("server sent a valid frame"))
    }

    /// Sends `message` and waits for the reply.
    pub fn request(&mut self, message: &Message) -> Message {
        self.send(message);
        self.recv().expect("server replied")
    }

    /// Returns `true` once the server has closed the connection.
    pub fn is_closed_by_server(&mut self) -> bool {
        self.recv().is_none()
    }

    /// Closes the client side abruptly.
    pub fn hang_up(self) {
        let _ = self.writer.shutdown(Shutdown::Both);
    }
}
