use reqwest::blocking::{Client, Response};
use std::io::{BufRead, BufReader};
use std::time::Duration;

use super::{Frame, FrameSource};
use crate::error::TransportError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Long-lived HTTP connection to the filtered stream endpoint.
///
/// The track keywords are sent as a comma-separated `track` form field and the
/// request is authenticated with a bearer token. The response body is read
/// line by line for as long as the session lasts.
pub struct HttpStreamSource {
    client: Client,
    endpoint: String,
    bearer_token: String,
    body: Option<BufReader<Response>>,
    /// Status code received on connect, not yet reported as a frame
    pending_status: Option<u16>,
    /// Status code already reported; the connection carries no body
    rejected_with: Option<u16>,
    line: String,
}

impl HttpStreamSource {
    pub fn new(endpoint: impl Into<String>, bearer_token: impl Into<String>) -> Result<Self, TransportError> {
        let endpoint = endpoint.into();
        let bearer_token = bearer_token.into();
        if bearer_token.trim().is_empty() {
            return Err(TransportError::MissingCredentials("bearer_token"));
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Option::<Duration>::None)
            .build()
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.clone(),
                source,
            })?;

        Ok(Self {
            client,
            endpoint,
            bearer_token,
            body: None,
            pending_status: None,
            rejected_with: None,
            line: String::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl FrameSource for HttpStreamSource {
    fn name(&self) -> &'static str {
        "http"
    }

    fn connect(&mut self, track: &[String]) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.bearer_token)
            .form(&[("track", track.join(","))])
            .send()
            .map_err(|source| TransportError::Connect {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(endpoint = %self.endpoint, "Connected to stream");
            self.body = Some(BufReader::new(response));
        } else {
            tracing::warn!(endpoint = %self.endpoint, status = status.as_u16(), "Stream refused connection");
            self.pending_status = Some(status.as_u16());
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        if let Some(code) = self.pending_status.take() {
            self.rejected_with = Some(code);
            return Ok(Some(Frame::Error(code)));
        }
        if let Some(code) = self.rejected_with {
            return Err(TransportError::Status { code });
        }

        let body = self.body.as_mut().ok_or(TransportError::Closed)?;
        loop {
            self.line.clear();
            if body.read_line(&mut self.line)? == 0 {
                return Err(TransportError::Closed);
            }
            match Frame::parse(&self.line) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => tracing::warn!("Skipping unparseable stream line: {}", e),
            }
        }
    }
}
