//! Event journal: record a live input stream and replay it later.
//!
//! Lets a gesture session be captured once on a real display and fed
//! back through the engine offline with its original pacing.

pub mod codec;

use std::path::Path;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::event::InputEvent;

use codec::{EventCodec, MAX_FRAME_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("not a selpopd journal")]
    NotAJournal,
    #[error("frame too large: {0} bytes (max {MAX_FRAME_SIZE})")]
    PayloadTooLarge(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Append every event from `events` to a new journal at `path` until the
/// channel closes. Returns the number of events written.
pub async fn record(
    path: &Path,
    mut events: mpsc::UnboundedReceiver<InputEvent>,
) -> Result<u64, JournalError> {
    let file = tokio::fs::File::create(path).await?;
    let mut sink = FramedWrite::new(file, EventCodec::new());
    let mut written = 0u64;

    while let Some(event) = events.recv().await {
        sink.send(event).await?;
        written += 1;
        tracing::trace!(event = event.name(), written, "recorded");
    }

    sink.close().await?;
    tracing::info!(path = %path.display(), written, "journal closed");
    Ok(written)
}

/// Feed the journal at `path` into `tx`, sleeping between events so the
/// original spacing is preserved. Returns the number of events sent.
pub async fn replay(path: &Path, tx: &mpsc::UnboundedSender<InputEvent>) -> Result<u64, JournalError> {
    let file = tokio::fs::File::open(path).await?;
    let mut frames = FramedRead::new(file, EventCodec::new());
    let started = Instant::now();
    let mut first_ts: Option<u64> = None;
    let mut sent = 0u64;

    while let Some(event) = frames.next().await {
        let event = event?;
        let base = *first_ts.get_or_insert(event.timestamp_ms);
        let offset = Duration::from_millis(event.timestamp_ms.saturating_sub(base));
        tokio::time::sleep_until(started + offset).await;

        if tx.send(event).is_err() {
            tracing::warn!("engine stopped before replay finished");
            break;
        }
        sent += 1;
    }

    tracing::info!(path = %path.display(), sent, "replay finished");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, Point};

    fn ev(kind: EventKind, ts: u64) -> InputEvent {
        InputEvent::new(kind, Point::new(1.0, 2.0), ts)
    }

    #[tokio::test]
    async fn recorded_session_replays_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.journal");

        let session = vec![
            ev(EventKind::PointerDown { click_count: 1 }, 1000),
            ev(EventKind::PointerDrag, 1010),
            ev(EventKind::PointerUp, 1030),
        ];

        let (tx, rx) = mpsc::unbounded_channel();
        for e in &session {
            tx.send(*e).unwrap();
        }
        drop(tx);
        assert_eq!(record(&path, rx).await.unwrap(), 3);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = Instant::now();
        assert_eq!(replay(&path, &tx).await.unwrap(), 3);
        assert!(start.elapsed() >= Duration::from_millis(30));

        let mut replayed = Vec::new();
        while let Ok(e) = rx.try_recv() {
            replayed.push(e);
        }
        assert_eq!(replayed, session);
    }

    #[tokio::test]
    async fn replay_missing_file_is_io_error() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = replay(Path::new("/nonexistent/selpopd.journal"), &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, JournalError::Io(_)));
    }

    #[tokio::test]
    async fn foreign_file_is_not_replayed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"just some text\n").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(matches!(
            replay(&path, &tx).await,
            Err(JournalError::NotAJournal)
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn truncated_journal_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.journal");
        let mut bytes = codec::MAGIC.to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 10, 0x81]);
        std::fs::write(&path, bytes).unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(replay(&path, &tx).await.is_err());
    }
}
