//! Streaming transport.
//!
//! The upstream service delivers newline-delimited JSON: statuses, control
//! notices and blank keep-alive lines. A [`FrameSource`] turns that into
//! [`Frame`]s and [`Stream::filter`] hands each frame to a
//! [`StreamListener`] until the listener asks to stop or the transport fails.
//!
//! # Available Sources
//!
//! - [`HttpStreamSource`] - Long-lived HTTP connection to the filter endpoint
//! - [`ReplaySource`] - Replays a JSONL capture of a previous stream

mod http;
mod replay;

pub use http::HttpStreamSource;
pub use replay::ReplaySource;

use serde_json::Value;
use std::ops::ControlFlow;

use tweetdb_types::StopReason;

use crate::error::TransportError;

/// One message from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A status object, not yet validated.
    Status(Value),
    /// A control message interleaved with statuses.
    Notice(Notice),
    /// Non-success status code reported by the transport.
    Error(u16),
    /// Blank line upstream sends to hold the connection open.
    KeepAlive,
}

/// Control messages the upstream interleaves with statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A previously delivered status was deleted.
    Delete { post_id: Option<i64> },
    /// Matching statuses were withheld because of delivery caps.
    Limit { undelivered: u64 },
    /// Upstream warns about the consumer (e.g. falling behind).
    Warning { message: String },
    /// Upstream is closing the connection.
    Disconnect { code: i64, reason: String },
}

impl Frame {
    /// Parse one line of the stream. Blank lines are keep-alives.
    pub fn parse(line: &str) -> Result<Frame, serde_json::Error> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Frame::KeepAlive);
        }
        let value: Value = serde_json::from_str(line)?;
        Ok(Frame::classify(value))
    }

    fn classify(value: Value) -> Frame {
        if let Some(delete) = value.get("delete") {
            return Frame::Notice(Notice::Delete {
                post_id: delete.pointer("/status/id").and_then(Value::as_i64),
            });
        }
        if let Some(limit) = value.get("limit") {
            return Frame::Notice(Notice::Limit {
                undelivered: limit.get("track").and_then(Value::as_u64).unwrap_or(0),
            });
        }
        if let Some(warning) = value.get("warning") {
            return Frame::Notice(Notice::Warning {
                message: warning
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        if let Some(disconnect) = value.get("disconnect") {
            return Frame::Notice(Notice::Disconnect {
                code: disconnect.get("code").and_then(Value::as_i64).unwrap_or(0),
                reason: disconnect
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        Frame::Status(value)
    }
}

/// A source of stream frames.
pub trait FrameSource {
    /// Human-readable name for this source (used in logs).
    fn name(&self) -> &'static str;

    /// Open the stream, asking upstream for posts matching any track keyword.
    fn connect(&mut self, track: &[String]) -> Result<(), TransportError>;

    /// Block until the next frame arrives. `Ok(None)` means the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, TransportError>;
}

/// Callbacks invoked by [`Stream::filter`].
///
/// Every callback that returns a [`ControlFlow`] can end the session by
/// returning `Break` with the reason.
pub trait StreamListener {
    fn on_connect(&mut self);

    fn on_status(&mut self, status: &Value) -> ControlFlow<StopReason>;

    fn on_error(&mut self, code: u16) -> ControlFlow<StopReason>;

    /// Called for disconnect notices too, before the session fails.
    fn on_notice(&mut self, _notice: &Notice) -> ControlFlow<StopReason> {
        ControlFlow::Continue(())
    }

    /// Called for every keep-alive, so a quiet stream still reaches the listener.
    fn on_keep_alive(&mut self) -> ControlFlow<StopReason> {
        ControlFlow::Continue(())
    }
}

/// One filtered stream session over a frame source.
pub struct Stream<S> {
    source: S,
    track: Vec<String>,
}

impl<S: FrameSource> Stream<S> {
    pub fn new(source: S, track: Vec<String>) -> Self {
        Self { source, track }
    }

    pub fn track(&self) -> &[String] {
        &self.track
    }

    /// Connect and dispatch frames to `listener` until it stops the session
    ///
    /// Returns the listener's stop reason, or [`StopReason::StreamEnded`] when
    /// the source runs dry. Transport failures and upstream disconnects are
    /// returned as errors; there is no reconnect.
    pub fn filter<L: StreamListener>(
        &mut self,
        listener: &mut L,
    ) -> Result<StopReason, TransportError> {
        tracing::info!(source = self.source.name(), track = ?self.track, "Connecting to stream");
        self.source.connect(&self.track)?;
        listener.on_connect();

        loop {
            let Some(frame) = self.source.next_frame()? else {
                tracing::info!(source = self.source.name(), "Stream exhausted");
                return Ok(StopReason::StreamEnded);
            };

            let flow = match &frame {
                Frame::Status(status) => listener.on_status(status),
                Frame::Error(code) => listener.on_error(*code),
                Frame::KeepAlive => listener.on_keep_alive(),
                Frame::Notice(notice @ Notice::Disconnect { code, reason }) => {
                    let _ = listener.on_notice(notice);
                    return Err(TransportError::Disconnected {
                        code: *code,
                        reason: reason.clone(),
                    });
                }
                Frame::Notice(notice) => listener.on_notice(notice),
            };

            if let ControlFlow::Break(reason) = flow {
                return Ok(reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Frame source backed by a queue; `Err` entries become transport failures
    struct ScriptedSource {
        frames: VecDeque<Result<Frame, u16>>,
        connected_with: Option<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Result<Frame, u16>>) -> Self {
            Self {
                frames: frames.into(),
                connected_with: None,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn connect(&mut self, track: &[String]) -> Result<(), TransportError> {
            self.connected_with = Some(track.to_vec());
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<Frame>, TransportError> {
            match self.frames.pop_front() {
                Some(Ok(frame)) => Ok(Some(frame)),
                Some(Err(code)) => Err(TransportError::Status { code }),
                None => Ok(None),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        connected: bool,
        statuses: usize,
        errors: Vec<u16>,
        notices: Vec<Notice>,
        keep_alives: usize,
        stop_after: Option<usize>,
    }

    impl StreamListener for Recorder {
        fn on_connect(&mut self) {
            self.connected = true;
        }

        fn on_status(&mut self, _status: &Value) -> ControlFlow<StopReason> {
            self.statuses += 1;
            match self.stop_after {
                Some(n) if self.statuses >= n => ControlFlow::Break(StopReason::TimeLimit),
                _ => ControlFlow::Continue(()),
            }
        }

        fn on_error(&mut self, code: u16) -> ControlFlow<StopReason> {
            self.errors.push(code);
            if code == 420 {
                ControlFlow::Break(StopReason::QuotaExceeded)
            } else {
                ControlFlow::Continue(())
            }
        }

        fn on_notice(&mut self, notice: &Notice) -> ControlFlow<StopReason> {
            self.notices.push(notice.clone());
            ControlFlow::Continue(())
        }

        fn on_keep_alive(&mut self) -> ControlFlow<StopReason> {
            self.keep_alives += 1;
            match self.stop_after {
                Some(n) if self.keep_alives >= n => ControlFlow::Break(StopReason::TimeLimit),
                _ => ControlFlow::Continue(()),
            }
        }
    }

    fn status(id: i64) -> Frame {
        Frame::Status(json!({"id": id}))
    }

    #[test]
    fn test_parse_keepalive() {
        assert_eq!(Frame::parse("\r\n").unwrap(), Frame::KeepAlive);
        assert_eq!(Frame::parse("").unwrap(), Frame::KeepAlive);
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(Frame::parse("{not json").is_err());
    }

    #[test]
    fn test_parse_notices() {
        assert_eq!(
            Frame::parse(r#"{"limit":{"track":1234,"timestamp_ms":"1"}}"#).unwrap(),
            Frame::Notice(Notice::Limit { undelivered: 1234 })
        );
        assert_eq!(
            Frame::parse(r#"{"delete":{"status":{"id":99,"user_id":3}}}"#).unwrap(),
            Frame::Notice(Notice::Delete { post_id: Some(99) })
        );
        assert_eq!(
            Frame::parse(r#"{"warning":{"code":"FALLING_BEHIND","message":"slow"}}"#).unwrap(),
            Frame::Notice(Notice::Warning {
                message: "slow".to_string()
            })
        );
        assert_eq!(
            Frame::parse(r#"{"disconnect":{"code":7,"reason":"admin logout"}}"#).unwrap(),
            Frame::Notice(Notice::Disconnect {
                code: 7,
                reason: "admin logout".to_string()
            })
        );
    }

    #[test]
    fn test_parse_status() {
        let frame = Frame::parse(r#"{"id": 5, "text": "hi"}"#).unwrap();
        assert!(matches!(frame, Frame::Status(v) if v["id"] == 5));
    }

    #[test]
    fn test_filter_sends_track_and_connects_listener() {
        let mut stream = Stream::new(ScriptedSource::new(vec![]), vec!["tesla".to_string()]);
        let mut listener = Recorder::default();

        let reason = stream.filter(&mut listener).unwrap();

        assert_eq!(reason, StopReason::StreamEnded);
        assert!(listener.connected);
        assert_eq!(stream.source.connected_with, Some(vec!["tesla".to_string()]));
    }

    #[test]
    fn test_listener_break_stops_dispatch() {
        let source = ScriptedSource::new(vec![Ok(status(1)), Ok(status(2)), Ok(status(3))]);
        let mut stream = Stream::new(source, vec![]);
        let mut listener = Recorder {
            stop_after: Some(2),
            ..Default::default()
        };

        assert_eq!(stream.filter(&mut listener).unwrap(), StopReason::TimeLimit);
        assert_eq!(listener.statuses, 2);
        assert_eq!(stream.source.frames.len(), 1);
    }

    #[test]
    fn test_quota_error_stops_before_later_statuses() {
        let source = ScriptedSource::new(vec![Ok(Frame::Error(420)), Ok(status(1))]);
        let mut stream = Stream::new(source, vec![]);
        let mut listener = Recorder::default();

        assert_eq!(stream.filter(&mut listener).unwrap(), StopReason::QuotaExceeded);
        assert_eq!(listener.errors, vec![420]);
        assert_eq!(listener.statuses, 0);
    }

    #[test]
    fn test_notices_reach_listener() {
        let source = ScriptedSource::new(vec![
            Ok(Frame::Notice(Notice::Limit { undelivered: 3 })),
            Ok(status(1)),
        ]);
        let mut stream = Stream::new(source, vec![]);
        let mut listener = Recorder::default();

        stream.filter(&mut listener).unwrap();
        assert_eq!(listener.notices, vec![Notice::Limit { undelivered: 3 }]);
        assert_eq!(listener.statuses, 1);
    }

    #[test]
    fn test_disconnect_is_fatal() {
        let source = ScriptedSource::new(vec![
            Ok(Frame::Notice(Notice::Disconnect {
                code: 12,
                reason: "gone".to_string(),
            })),
            Ok(status(1)),
        ]);
        let mut stream = Stream::new(source, vec![]);
        let mut listener = Recorder::default();

        let err = stream.filter(&mut listener).unwrap_err();
        assert!(matches!(err, TransportError::Disconnected { code: 12, .. }));
        assert_eq!(listener.statuses, 0);
        assert_eq!(
            listener.notices,
            vec![Notice::Disconnect {
                code: 12,
                reason: "gone".to_string()
            }]
        );
    }

    #[test]
    fn test_keep_alives_reach_listener() {
        let source = ScriptedSource::new(vec![
            Ok(Frame::KeepAlive),
            Ok(Frame::KeepAlive),
            Ok(Frame::KeepAlive),
        ]);
        let mut stream = Stream::new(source, vec![]);
        let mut listener = Recorder {
            stop_after: Some(2),
            ..Default::default()
        };

        assert_eq!(stream.filter(&mut listener).unwrap(), StopReason::TimeLimit);
        assert_eq!(listener.keep_alives, 2);
        assert_eq!(stream.source.frames.len(), 1);
    }

    #[test]
    fn test_transport_failure_propagates() {
        let source = ScriptedSource::new(vec![Ok(status(1)), Err(401)]);
        let mut stream = Stream::new(source, vec![]);
        let mut listener = Recorder::default();

        let err = stream.filter(&mut listener).unwrap_err();
        assert!(matches!(err, TransportError::Status { code: 401 }));
        assert_eq!(listener.statuses, 1);
    }
}
