//! Line-delimited JSON event source
//!
//! One object per line: `{"id": "...", "source": "com.example.chat", "text": "..."}`.
//! `id` is optional; a random one is generated when it is missing or blank.

use cybersafe_core::{Event, SensitiveText};
use cybersafe_pipeline::{IngestStatus, Pipeline};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Lines buffered between the reader thread and the input loop
const LINE_BUFFER: usize = 1024;

#[derive(Deserialize)]
struct EventLine {
    #[serde(default)]
    id: Option<String>,
    source: String,
    text: String,
}

/// Counters for one run of the input loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputStats {
    pub lines: u64,
    pub queued: u64,
    pub empty: u64,
    pub inactive: u64,
    pub malformed: u64,
}

/// Parse one input line into an event.
///
/// Errors are reduced to their category: serde messages can quote input.
pub fn parse_line(line: &str) -> Result<Event, serde_json::error::Category> {
    let parsed: EventLine = serde_json::from_str(line).map_err(|e| e.classify())?;

    let id = match parsed.id {
        Some(id) if !id.trim().is_empty() => id,
        _ => uuid::Uuid::new_v4().to_string(),
    };

    Ok(Event::new(id, parsed.source, parsed.text))
}

/// Read lines from `input` on a dedicated thread.
///
/// A blocking read never holds up runtime shutdown this way. Each line is
/// wrapped as sensitive text as soon as it is read.
pub fn spawn_reader<R>(input: R) -> std::io::Result<mpsc::Receiver<std::io::Result<SensitiveText>>>
where
    R: Read + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(LINE_BUFFER);

    std::thread::Builder::new()
        .name("cybersafe-input".to_string())
        .spawn(move || {
            for line in BufReader::new(input).lines() {
                let failed = line.is_err();
                if sender.blocking_send(line.map(SensitiveText::new)).is_err() || failed {
                    break;
                }
            }
        })?;

    Ok(receiver)
}

/// Feed every received line to the pipeline until input ends
pub async fn run(
    pipeline: &Pipeline,
    mut lines: mpsc::Receiver<std::io::Result<SensitiveText>>,
) -> std::io::Result<InputStats> {
    let mut stats = InputStats::default();

    while let Some(line) = lines.recv().await {
        let line = line?;
        if line.is_blank() {
            continue;
        }
        stats.lines += 1;

        let event = match parse_line(line.expose()) {
            Ok(event) => event,
            Err(category) => {
                stats.malformed += 1;
                warn!(line = stats.lines, ?category, "Skipping malformed input line");
                continue;
            }
        };
        drop(line);

        match pipeline.ingest_event(event) {
            IngestStatus::Queued => stats.queued += 1,
            IngestStatus::Empty => stats.empty += 1,
            IngestStatus::Inactive => stats.inactive += 1,
        }
    }

    debug!(?stats, "Input closed");
    Ok(stats)
}
