//! Wire types shared by the indicator server and its clients.
//!
//! A session carries JSONL frames: one JSON object per line, tagged by a
//! `kind` field. The trading platform opens with a [`Message::Handshake`]
//! naming the indicator it wants, then sends one [`Message::DataRow`] per bar
//! and waits for the matching [`Message::Result`] or [`Message::Error`]
//! before sending the next row. Either side ends the session with
//! [`Message::Close`].
//!
//! ```json
//! {"kind":"handshake","indicator":"MYIND"}
//! {"kind":"data_row","fields":[1.0,2.0,3.0]}
//! {"kind":"result","value":6.0}
//! {"kind":"close"}
//! ```

mod codec;
mod message;

pub use codec::{
    CodecError, DEFAULT_MAX_FRAME_BYTES, DecodeOutcome, FrameDecoder, MalformedFrame, encode,
};
pub use message::{ErrorCode, Field, Message};
