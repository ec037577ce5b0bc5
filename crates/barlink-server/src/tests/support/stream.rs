//! In-memory stream that replays scripted reads and captures writes.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Duration;

use barlink_protocol::{DecodeOutcome, FrameDecoder, Message, encode};

use crate::session::SessionIo;

enum Step {
    Bytes(Vec<u8>),
    Fail(io::ErrorKind),
}

/// Scripted [`SessionIo`] implementation.
#[derive(Default)]
pub struct ScriptedStream {
    steps: VecDeque<Step>,
    written: Vec<u8>,
    timeouts: Vec<Option<Duration>>,
}

impl ScriptedStream {
    /// Queues one encoded message.
    #[must_use]
    pub fn message(mut self, message: &Message) -> Self {
        let bytes = encode(message).expect("encode scripted message");
        self.steps.push_back(Step::Bytes(bytes));
        self
    }

    /// Queues raw bytes, delivered by a single read.
    #[must_use]
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.steps.push_back(Step::Bytes(bytes.to_vec()));
        self
    }

    /// Queues a read failure of `kind`.
    #[must_use]
    pub fn fail(mut self, kind: io::ErrorKind) -> Self {
        self.steps.push_back(Step::Fail(kind));
        self
    }

    /// Messages the session wrote, decoded in order.
    pub fn replies(&self) -> Vec<Message> {
        let mut decoder = FrameDecoder::default();
        decoder.extend(&self.written);
        let mut replies = Vec::new();
        while let DecodeOutcome::Complete(message) =
            decoder.decode().expect("session wrote a malformed frame")
        {
            replies.push(message);
        }
        replies
    }

    /// Idle timeouts applied by the session, in order.
    pub fn timeouts(&self) -> &[Option<Duration>] {
        &self.timeouts
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.steps.pop_front() {
            None => Ok(0),
            Some(Step::Fail(kind)) => Err(io::Error::from(kind)),
            Some(Step::Bytes(mut bytes)) => {
                let count = bytes.len().min(buf.len());
                buf[..count].copy_from_slice(&bytes[..count]);
                if count < bytes.len() {
                    self.steps.push_front(Step::Bytes(bytes.split_off(count)));
                }
                Ok(count)
            }
        }
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SessionIo for ScriptedStream {
    fn set_idle_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.timeouts.push(timeout);
        Ok(())
    }
}
