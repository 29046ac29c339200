//! Output sink for reported points.
//!
//! Each point is serialized as one JSON object per line. The writer is
//! flushed after every batch so downstream consumers see points as soon
//! as a drain window closes.

use std::io::{self, Write};

use metrics::counter;

use logstreamer_core::metrics as m;
use logstreamer_log_stream::Point;

/// Writes points as newline-delimited JSON.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> JsonLinesSink<W> {
    /// Wrap a writer (stdout in production, a buffer in tests).
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Write a batch of points and flush.
    ///
    /// Returns the number of points written.
    pub fn write_points(&mut self, points: &[Point]) -> io::Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }

        for point in points {
            serde_json::to_writer(&mut self.writer, point)?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;

        self.written += points.len() as u64;
        counter!(m::POINTS_WRITTEN_TOTAL).increment(points.len() as u64);
        Ok(points.len())
    }

    /// Total number of points written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Consume the sink and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
