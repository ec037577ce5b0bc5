//! Tests for the connection state machine over scripted streams.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use barlink_protocol::{ErrorCode, Field, Message};
use rstest::{fixture, rstest};

use super::*;
use crate::capability::PredictorFactory;
use crate::model::LinearModel;
use crate::registry::RegistryBuilder;
use crate::tests::support::{RecordingObserver, ScriptedStream};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

struct Harness {
    context: SessionContext,
    observer: Arc<RecordingObserver>,
    link: Link,
}

impl Harness {
    fn run(&self, stream: ScriptedStream) -> (Result<SessionEnd, SessionError>, ScriptedStream) {
        let mut session = Session::new(stream, self.link, &self.context);
        let outcome = session.run();
        (outcome, session.into_stream())
    }

    fn events(&self) -> Vec<(u64, bool)> {
        self.context
            .observers
            .close(Instant::now() + Duration::from_secs(5));
        self.observer.events()
    }
}

#[fixture]
fn harness() -> Harness {
    let mut builder = RegistryBuilder::new();
    let factory = PredictorFactory::new(Arc::new(LinearModel::sum(3)), 1).expect("factory");
    builder
        .register("MYIND", Arc::new(factory))
        .expect("register indicator");
    let observers = Arc::new(ObserverHub::new(16));
    let observer = Arc::new(RecordingObserver::default());
    observers.add(observer.clone()).expect("add observer");
    Harness {
        context: SessionContext {
            registry: builder.freeze(),
            observers,
            max_frame_bytes: 1024,
            handshake_timeout: Some(HANDSHAKE_TIMEOUT),
        },
        observer,
        link: Link::new(1, SocketAddr::from((Ipv4Addr::LOCALHOST, 50_000))),
    }
}

fn row(values: &[f64]) -> Message {
    Message::numeric_row(values.iter().copied())
}

fn error_code(message: &Message) -> Option<ErrorCode> {
    match message {
        Message::Error { code, .. } => Some(*code),
        _ => None,
    }
}

#[rstest]
fn sum_indicator_answers_rows_and_survives_shape_errors(harness: Harness) {
    let stream = ScriptedStream::default()
        .message(&Message::handshake("MYIND"))
        .message(&row(&[1.0, 2.0, 3.0]))
        .message(&row(&[1.0]))
        .message(&row(&[4.0, 5.0, 6.0]))
        .message(&Message::Close);

    let (outcome, stream) = harness.run(stream);

    assert_eq!(outcome.expect("session succeeds"), SessionEnd::Closed);
    let replies = stream.replies();
    assert_eq!(replies.len(), 4);
    assert_eq!(replies[0], Message::Result { value: 6.0 });
    assert_eq!(error_code(&replies[1]), Some(ErrorCode::ShapeMismatch));
    assert_eq!(replies[2], Message::Result { value: 15.0 });
    assert_eq!(replies[3], Message::Close);
    assert_eq!(harness.events(), vec![(1, true), (1, false)]);
}

#[rstest]
fn text_fields_are_row_level_errors(harness: Harness) {
    let stream = ScriptedStream::default()
        .message(&Message::handshake("MYIND"))
        .message(&Message::DataRow {
            fields: vec![Field::from(1.0), Field::from("x"), Field::from(2.0)],
        });

    let (outcome, stream) = harness.run(stream);

    assert_eq!(outcome.expect("peer hangs up"), SessionEnd::Disconnected);
    let replies = stream.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(error_code(&replies[0]), Some(ErrorCode::NonNumericField));
    assert_eq!(harness.events(), vec![(1, true), (1, false)]);
}

#[rstest]
fn unknown_indicator_is_rejected_without_notifications(harness: Harness) {
    let stream = ScriptedStream::default()
        .message(&Message::handshake("OTHER"))
        .message(&row(&[1.0, 2.0, 3.0]));

    let (outcome, stream) = harness.run(stream);

    assert!(matches!(
        outcome,
        Err(SessionError::UnknownIndicator { ref name }) if name == "OTHER"
    ));
    let replies = stream.replies();
    assert_eq!(replies.len(), 1, "no data row is processed");
    assert_eq!(error_code(&replies[0]), Some(ErrorCode::UnknownIndicator));
    assert!(harness.events().is_empty());
}

#[rstest]
#[case::data_row_first(row(&[1.0, 2.0, 3.0]))]
#[case::close_first(Message::Close)]
#[case::result_first(Message::Result { value: 1.0 })]
fn first_message_must_be_a_handshake(harness: Harness, #[case] first: Message) {
    let (outcome, stream) = harness.run(ScriptedStream::default().message(&first));

    assert!(matches!(outcome, Err(SessionError::ProtocolViolation { .. })));
    let replies = stream.replies();
    assert_eq!(error_code(&replies[0]), Some(ErrorCode::ProtocolViolation));
    assert!(harness.events().is_empty());
}

#[rstest]
#[case::second_handshake(Message::handshake("MYIND"))]
#[case::peer_result(Message::Result { value: 2.0 })]
#[case::peer_error(Message::error(ErrorCode::ShapeMismatch, "nope"))]
fn out_of_sequence_messages_close_an_active_session(harness: Harness, #[case] message: Message) {
    let stream = ScriptedStream::default()
        .message(&Message::handshake("MYIND"))
        .message(&message)
        .message(&row(&[1.0, 2.0, 3.0]));

    let (outcome, stream) = harness.run(stream);

    assert!(matches!(outcome, Err(SessionError::ProtocolViolation { .. })));
    let replies = stream.replies();
    assert_eq!(replies.len(), 1, "the trailing row is never processed");
    assert_eq!(error_code(&replies[0]), Some(ErrorCode::ProtocolViolation));
    assert_eq!(harness.events(), vec![(1, true), (1, false)]);
}

#[rstest]
fn malformed_frame_closes_with_best_effort_error(harness: Harness) {
    let stream = ScriptedStream::default()
        .message(&Message::handshake("MYIND"))
        .raw(b"{not json}\n")
        .message(&row(&[1.0, 2.0, 3.0]));

    let (outcome, stream) = harness.run(stream);

    assert!(matches!(outcome, Err(SessionError::Malformed(_))));
    let replies = stream.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(error_code(&replies[0]), Some(ErrorCode::ProtocolViolation));
    assert_eq!(harness.events(), vec![(1, true), (1, false)]);
}

#[rstest]
fn frames_split_across_reads_are_reassembled(harness: Harness) {
    let stream = ScriptedStream::default()
        .raw(b"{\"kind\":\"hand")
        .raw(b"shake\",\"indicator\":\"MYIND\"}\n{\"kind\":\"data_row\",")
        .raw(b"\"fields\":[1,1,1]}\n");

    let (outcome, stream) = harness.run(stream);

    assert_eq!(outcome.expect("peer hangs up"), SessionEnd::Disconnected);
    assert_eq!(stream.replies(), vec![Message::Result { value: 3.0 }]);
}

#[rstest]
fn disconnect_mid_frame_is_a_plain_disconnect(harness: Harness) {
    let stream = ScriptedStream::default()
        .message(&Message::handshake("MYIND"))
        .raw(b"{\"kind\":\"data_");

    let (outcome, stream) = harness.run(stream);

    assert_eq!(outcome.expect("peer hangs up"), SessionEnd::Disconnected);
    assert!(stream.replies().is_empty());
    assert_eq!(harness.events(), vec![(1, true), (1, false)]);
}

#[rstest]
fn transport_errors_still_publish_closed(harness: Harness) {
    let stream = ScriptedStream::default()
        .message(&Message::handshake("MYIND"))
        .message(&row(&[1.0, 2.0, 3.0]))
        .fail(io::ErrorKind::ConnectionReset);

    let (outcome, _stream) = harness.run(stream);

    assert!(matches!(outcome, Err(SessionError::Transport(_))));
    assert_eq!(harness.events(), vec![(1, true), (1, false)]);
}

#[rstest]
fn interrupted_reads_are_retried(harness: Harness) {
    let stream = ScriptedStream::default()
        .fail(io::ErrorKind::Interrupted)
        .message(&Message::handshake("MYIND"))
        .message(&Message::Close);

    let (outcome, _stream) = harness.run(stream);

    assert_eq!(outcome.expect("session succeeds"), SessionEnd::Closed);
}

#[rstest]
fn idle_bound_applies_until_the_first_row(harness: Harness) {
    let stream = ScriptedStream::default()
        .message(&Message::handshake("MYIND"))
        .message(&row(&[1.0, 2.0, 3.0]))
        .message(&row(&[1.0, 2.0, 3.0]));

    let (_outcome, stream) = harness.run(stream);

    assert_eq!(stream.timeouts(), &[Some(HANDSHAKE_TIMEOUT), None]);
}

#[rstest]
fn idle_handshake_times_out(harness: Harness) {
    let stream = ScriptedStream::default().fail(io::ErrorKind::WouldBlock);

    let (outcome, stream) = harness.run(stream);

    assert!(matches!(
        outcome,
        Err(SessionError::IdleTimeout { timeout }) if timeout == HANDSHAKE_TIMEOUT
    ));
    assert!(stream.replies().is_empty());
    assert!(harness.events().is_empty());
}

#[rstest]
fn silent_peer_after_handshake_times_out_and_closes(harness: Harness) {
    let stream = ScriptedStream::default()
        .message(&Message::handshake("MYIND"))
        .fail(io::ErrorKind::TimedOut);

    let (outcome, _stream) = harness.run(stream);

    assert!(matches!(outcome, Err(SessionError::IdleTimeout { .. })));
    assert_eq!(harness.events(), vec![(1, true), (1, false)]);
}

#[test]
fn busy_rejection_writes_server_busy() {
    let mut buffer = Vec::new();
    reject_busy(&mut buffer, 4);
    let text = String::from_utf8(buffer).expect("utf8 reply");
    assert!(text.starts_with("{\"kind\":\"error\",\"code\":\"server_busy\""));
    assert!(text.ends_with('\n'));
}
