//! Multiplexed rendering of engine progress streams
//!
//! Build and pull operations emit one JSON event per line. Events carrying an
//! `id` belong to a concurrent sub-operation (usually an image layer) and get
//! their own terminal row, which is redrawn in place on every update. The
//! cursor always rests on the line below the last allocated row.

use std::collections::HashMap;
use std::io::Write;

use futures::{Stream, StreamExt};
use serde::Deserialize;
use thiserror::Error;

const ESC: &str = "\u{1b}";

/// One structured progress line emitted by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProgressEvent {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub stream: Option<String>,

    #[serde(default)]
    pub progress: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

impl From<bollard::models::BuildInfo> for ProgressEvent {
    fn from(info: bollard::models::BuildInfo) -> Self {
        Self {
            id: info.id,
            status: info.status,
            stream: info.stream,
            progress: info.progress,
            error: info.error,
        }
    }
}

/// Progress rendering failures
#[derive(Debug, Error)]
pub enum ProgressError {
    /// The engine reported an error inside a well-formed event
    #[error("{0}")]
    Event(String),

    /// The underlying event source failed
    #[error("progress stream failed: {0}")]
    Stream(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to write progress: {0}")]
    Sink(#[from] std::io::Error),
}

/// Tracks which terminal row belongs to which progress id
pub struct ProgressRenderer<W: Write> {
    sink: W,
    rows: HashMap<String, usize>,
}

impl<W: Write> ProgressRenderer<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            rows: HashMap::new(),
        }
    }

    /// Number of rows currently allocated to ids
    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// Render a single event
    pub fn handle(&mut self, event: &ProgressEvent) -> Result<(), ProgressError> {
        if let Some(error) = &event.error {
            return Err(ProgressError::Event(error.clone()));
        }

        let Some(id) = event.id.as_deref() else {
            // A global status line starts a new logical operation
            self.rows.clear();
            return self.draw(event);
        };

        let row = match self.rows.get(id) {
            Some(row) => *row,
            None => {
                let row = self.rows.len();
                self.rows.insert(id.to_string(), row);
                self.sink.write_all(b"\n")?;
                row
            }
        };

        let offset = self.rows.len() - row;
        write!(self.sink, "{ESC}[{offset}A")?;
        self.draw(event)?;
        write!(self.sink, "{ESC}[{offset}B")?;
        Ok(())
    }

    fn draw(&mut self, event: &ProgressEvent) -> Result<(), ProgressError> {
        write!(self.sink, "{ESC}[2K\r")?;
        if let Some(id) = non_empty(&event.id) {
            write!(self.sink, "{id}: ")?;
        }

        let status = non_empty(&event.status);
        if let Some(progress) = non_empty(&event.progress) {
            match status {
                Some(status) => write!(self.sink, "{status} {progress}\r")?,
                None => write!(self.sink, "{progress}\r")?,
            }
        } else if let Some(stream) = non_empty(&event.stream) {
            write!(self.sink, "{stream}\r")?;
        } else if let Some(status) = status {
            write!(self.sink, "{status}\r")?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ProgressError> {
        self.sink.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

/// Render an event stream to `sink` until it ends or fails
///
/// Stops consuming at the first event carrying an `error` field.
pub async fn render<S, E, W>(events: S, sink: W) -> Result<(), ProgressError>
where
    S: Stream<Item = Result<ProgressEvent, E>>,
    E: std::error::Error + Send + Sync + 'static,
    W: Write,
{
    let mut events = std::pin::pin!(events);
    let mut renderer = ProgressRenderer::new(sink);

    while let Some(item) = events.next().await {
        let event = item.map_err(|e| ProgressError::Stream(Box::new(e)))?;
        renderer.handle(&event)?;
    }

    renderer.flush()
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}
