use serde_json::Value;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use tweetdb_types::{Rejection, StopReason, StreamState};

use crate::db::PostSink;
use crate::error::{SessionError, TransportError};
use crate::extract::extract;
use crate::filter::FilterPolicy;
use crate::stream::{FrameSource, Notice, Stream, StreamListener};

/// Transport codes meaning the API quota is used up (420 legacy, 429 current)
pub const QUOTA_EXCEEDED_CODES: [u16; 2] = [420, 429];

/// Source of the current time for session deadlines
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Counters kept for the lifetime of one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub received: u64,
    pub malformed: u64,
    pub rejected_retweet: u64,
    pub rejected_language: u64,
    pub persisted: u64,
    pub persist_failures: u64,
    /// Statuses upstream reported as withheld through limit notices
    pub undelivered: u64,
}

/// Drives one stream session: extracts every status, applies the inclusion
/// filters, hands accepted posts to the sink and decides when to stop.
///
/// Per-event failures (malformed status, failed write) are logged and
/// counted; they never end the session. The session ends when the time
/// limit elapses or upstream reports the quota as exhausted.
pub struct SessionController<S, C = SystemClock> {
    sink: S,
    clock: C,
    policy: FilterPolicy,
    time_limit: Duration,
    started_at: Option<Instant>,
    state: StreamState,
    stop_reason: Option<StopReason>,
    stats: SessionStats,
}

impl<S: PostSink> SessionController<S, SystemClock> {
    pub fn new(sink: S, policy: FilterPolicy, time_limit: Duration) -> Self {
        Self::with_clock(sink, policy, time_limit, SystemClock)
    }
}

impl<S: PostSink, C: Clock> SessionController<S, C> {
    pub fn with_clock(sink: S, policy: FilterPolicy, time_limit: Duration, clock: C) -> Self {
        Self {
            sink,
            clock,
            policy,
            time_limit,
            started_at: None,
            state: StreamState::Disconnected,
            stop_reason: None,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Time since the stream connected (zero before connecting)
    pub fn elapsed(&self) -> Duration {
        self.started_at
            .map(|start| self.clock.now().saturating_duration_since(start))
            .unwrap_or_default()
    }

    /// Run one session over `stream` until it stops
    ///
    /// A transport failure is returned as [`SessionError::TransportFatal`]
    /// carrying the tracked keywords and how long the session ran.
    pub fn run<F: FrameSource>(&mut self, stream: &mut Stream<F>) -> Result<StopReason, SessionError> {
        match stream.filter(self) {
            Ok(reason) => {
                let _ = self.terminate(reason);
                tracing::info!(
                    reason = reason.as_str(),
                    state = self.state.as_str(),
                    elapsed_secs = self.elapsed().as_secs(),
                    stats = ?self.stats,
                    "Session finished"
                );
                Ok(reason)
            }
            Err(source) => Err(self.fail(stream.track(), source)),
        }
    }

    fn fail(&mut self, track: &[String], source: TransportError) -> SessionError {
        self.state = StreamState::Terminated;
        let elapsed = self.elapsed();
        tracing::error!(
            track = ?track,
            elapsed_secs = elapsed.as_secs(),
            stats = ?self.stats,
            "Session aborted by transport failure: {}",
            source
        );
        SessionError::TransportFatal {
            track: track.to_vec(),
            elapsed,
            source,
        }
    }

    fn deadline_passed(&self) -> bool {
        self.elapsed() > self.time_limit
    }

    fn terminate(&mut self, reason: StopReason) -> ControlFlow<StopReason> {
        if self.state != StreamState::Terminated {
            self.state = StreamState::Terminated;
            self.stop_reason = Some(reason);
            match reason {
                StopReason::TimeLimit => tracing::info!(
                    limit_secs = self.time_limit.as_secs(),
                    "Time limit reached"
                ),
                StopReason::QuotaExceeded => {
                    tracing::info!("Upstream quota exceeded, disconnecting")
                }
                StopReason::StreamEnded => tracing::info!("Stream ended"),
            }
        }
        ControlFlow::Break(self.stop_reason.unwrap_or(reason))
    }

    fn check_deadline(&mut self) -> ControlFlow<StopReason> {
        if self.deadline_passed() {
            self.terminate(StopReason::TimeLimit)
        } else {
            ControlFlow::Continue(())
        }
    }

    fn process(&mut self, status: &Value) {
        let record = match extract(status) {
            Ok(record) => record,
            Err(e) => {
                self.stats.malformed += 1;
                tracing::warn!("Skipping event: {}", e);
                return;
            }
        };

        if let Err(rejection) = self.policy.evaluate(&record) {
            match &rejection {
                Rejection::Retweet => self.stats.rejected_retweet += 1,
                Rejection::Language { .. } => self.stats.rejected_language += 1,
            }
            tracing::debug!(post_id = record.post_id, reason = rejection.as_str(), "Filtered out");
            return;
        }

        match self.sink.persist(&record) {
            Ok(()) => self.stats.persisted += 1,
            Err(e) => {
                self.stats.persist_failures += 1;
                tracing::error!(post_id = record.post_id, "Failed to store post: {}", e);
            }
        }
    }
}

impl<S: PostSink, C: Clock> StreamListener for SessionController<S, C> {
    fn on_connect(&mut self) {
        self.started_at = Some(self.clock.now());
        self.state = StreamState::Connected;
        tracing::info!(
            language = self.policy.target_language(),
            limit_secs = self.time_limit.as_secs(),
            "Connected to stream"
        );
    }

    fn on_status(&mut self, status: &Value) -> ControlFlow<StopReason> {
        if self.state == StreamState::Terminated {
            return self.terminate(StopReason::TimeLimit);
        }
        // An event arriving after the deadline is dropped unprocessed
        if let ControlFlow::Break(reason) = self.check_deadline() {
            return ControlFlow::Break(reason);
        }

        self.stats.received += 1;
        self.process(status);

        self.check_deadline()
    }

    fn on_error(&mut self, code: u16) -> ControlFlow<StopReason> {
        if QUOTA_EXCEEDED_CODES.contains(&code) {
            return self.terminate(StopReason::QuotaExceeded);
        }
        // Other codes are left to the transport, which fails the session if
        // the connection is unusable
        tracing::warn!(code, "Transport reported an error, continuing");
        self.check_deadline()
    }

    fn on_notice(&mut self, notice: &Notice) -> ControlFlow<StopReason> {
        match notice {
            Notice::Limit { undelivered } => {
                self.stats.undelivered = self.stats.undelivered.max(*undelivered);
                tracing::warn!(undelivered, "Upstream withheld matching posts");
            }
            Notice::Delete { post_id } => {
                tracing::debug!(?post_id, "Ignoring delete notice");
            }
            Notice::Warning { message } => {
                tracing::warn!("Upstream warning: {}", message);
            }
            // The stream fails the session right after this returns
            Notice::Disconnect { code, reason } => {
                tracing::warn!(code, "Upstream disconnect notice: {}", reason);
            }
        }
        self.check_deadline()
    }

    fn on_keep_alive(&mut self) -> ControlFlow<StopReason> {
        tracing::trace!("Keep-alive");
        self.check_deadline()
    }
}
