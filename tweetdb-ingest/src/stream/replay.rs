//! JSONL replay source.
//!
//! Reads a capture of a previous stream (one frame per line) and replays it.
//! Track keywords are applied locally against the status text so a broad
//! capture behaves like a filtered stream.

use serde_json::Value;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use super::{Frame, FrameSource};
use crate::error::TransportError;

pub struct ReplaySource<R> {
    reader: R,
    track: Vec<String>,
    line: String,
    line_number: usize,
}

impl ReplaySource<BufReader<File>> {
    /// Open a capture file for replay
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            track: Vec::new(),
            line: String::new(),
            line_number: 0,
        }
    }

    /// Whether a status matches the track list the way upstream would match it
    ///
    /// Statuses without readable text are passed through so the extractor
    /// can report them.
    fn matches_track(&self, status: &Value) -> bool {
        if self.track.is_empty() {
            return true;
        }
        let truncated = status.get("truncated").and_then(Value::as_bool).unwrap_or(false);
        let text = if truncated {
            status.pointer("/extended_tweet/full_text")
        } else {
            status.get("text")
        };
        match text.and_then(Value::as_str) {
            Some(text) => {
                let text = text.to_lowercase();
                self.track.iter().any(|keyword| text.contains(keyword.as_str()))
            }
            None => true,
        }
    }
}

impl<R: BufRead> FrameSource for ReplaySource<R> {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn connect(&mut self, track: &[String]) -> Result<(), TransportError> {
        self.track = track
            .iter()
            .map(|keyword| keyword.trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect();
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            match Frame::parse(&self.line) {
                Ok(Frame::Status(status)) => {
                    if self.matches_track(&status) {
                        return Ok(Some(Frame::Status(status)));
                    }
                }
                // Blank lines in a capture carry no timing
                Ok(Frame::KeepAlive) => {}
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => {
                    tracing::warn!(line = self.line_number, "Skipping unparseable replay line: {}", e);
                }
            }
        }
    }
}
