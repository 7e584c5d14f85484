//! Subcommand entry points: wire the X11 monitor, the selection reader
//! and the stdout surface to an [`Engine`].

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{SignalKind, signal as tokio_signal};
use tokio::sync::mpsc;

use crate::capture::{FixedSelection, SelectionSource};
use crate::cli::{EngineArgs, ReaderArgs};
use crate::engine::{Engine, EngineConfig};
use crate::event::InputEvent;
use crate::journal::{self, JournalError};
use crate::monitor::{MonitorError, X11Monitor};
use crate::visibility::surface::{LineSurface, Surface};

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("{0}")]
    Monitor(#[from] MonitorError),
    #[error("journal: {0}")]
    Journal(#[from] JournalError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Monitor the display and drive the popup until SIGINT/SIGTERM or the
/// input thread exits.
pub async fn run(
    engine_args: &EngineArgs,
    reader: &ReaderArgs,
    capture_key: Option<&str>,
    ignore_classes: Vec<String>,
) -> Result<(), DaemonError> {
    // 1. Connect and subscribe to raw input.
    let mut monitor = X11Monitor::connect()?;

    // 2. Resolve the optional capture key.
    let mut config = engine_args.config();
    if let Some(name) = capture_key {
        let code = monitor.resolve_key(name)?;
        tracing::info!(key = name, code, "capture key bound");
        config.capture_key = Some(code);
    }

    // 3. Selection reader, gated on the focused application if asked.
    let mut source = reader.selection();
    if !ignore_classes.is_empty() {
        tracing::info!(classes = ?ignore_classes, "ignoring selections in listed applications");
        let probe = monitor.focus_probe()?;
        source = source.with_ignore_list(ignore_classes, Arc::new(probe));
    }

    let engine = Engine::new(
        config,
        source,
        LineSurface::stdout(engine_args.surface_size()),
    );

    // 4. Start the input thread and install signal handlers.
    let events = monitor.start()?;
    let mut sig_term = tokio_signal(SignalKind::terminate())?;
    let mut sig_int = tokio_signal(SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sig_term.recv() => "SIGTERM",
            _ = sig_int.recv() => "SIGINT",
        }
    };

    let result = serve(engine, events, shutdown).await;
    monitor.stop();
    result
}

/// Drive `engine` until `shutdown` resolves. The event channel closing
/// first means the input thread died, which is an error.
async fn serve<S, U>(
    engine: Engine<S, U>,
    events: mpsc::UnboundedReceiver<InputEvent>,
    shutdown: impl Future<Output = &'static str>,
) -> Result<(), DaemonError>
where
    S: SelectionSource,
    U: Surface,
{
    tokio::select! {
        () = engine.run(events) => {
            tracing::error!("input monitor stopped");
            Err(MonitorError::InputClosed.into())
        }
        signal = shutdown => {
            tracing::info!(signal, "shutting down");
            Ok(())
        }
    }
}

/// Write live input to a journal at `out` until SIGINT/SIGTERM.
pub async fn record(out: &Path) -> Result<(), DaemonError> {
    let mut monitor = X11Monitor::connect()?;
    let events = monitor.start()?;
    let mut sig_term = tokio_signal(SignalKind::terminate())?;
    let mut sig_int = tokio_signal(SignalKind::interrupt())?;

    tracing::info!(path = %out.display(), "recording input");

    let recording = journal::record(out, events);
    tokio::pin!(recording);

    // Stopping the monitor closes the channel, which lets `record` flush.
    let written = tokio::select! {
        result = &mut recording => result?,
        _ = sig_term.recv() => {
            monitor.stop();
            recording.await?
        }
        _ = sig_int.recv() => {
            monitor.stop();
            recording.await?
        }
    };

    eprintln!("recorded {written} events to {}", out.display());
    Ok(())
}

/// Feed the journal at `path` through an engine. Surface commands go to
/// stdout. With `capture_text`, every capture yields that text instead
/// of running the reader.
pub async fn replay(
    path: &Path,
    engine_args: &EngineArgs,
    reader: &ReaderArgs,
    capture_text: Option<String>,
) -> Result<(), DaemonError> {
    let config = engine_args.config();
    let surface = LineSurface::stdout(engine_args.surface_size());

    let sent = match capture_text {
        Some(text) => drive_replay(path, config, FixedSelection(text), surface).await?,
        None => drive_replay(path, config, reader.selection(), surface).await?,
    };

    tracing::info!(sent, "replay complete");
    Ok(())
}

/// Time to keep the engine alive after the last journal event so that
/// pending settle, capture and hide timers still fire.
fn linger(config: &EngineConfig) -> Duration {
    config.settle + config.capture_timeout + config.visibility.hide_idle + config.visibility.fade
}

async fn drive_replay<S, U>(
    path: &Path,
    config: EngineConfig,
    source: S,
    surface: U,
) -> Result<u64, DaemonError>
where
    S: SelectionSource,
    U: Surface,
{
    let linger = linger(&config);
    let engine = Engine::new(config, source, surface);
    let (tx, rx) = mpsc::unbounded_channel();

    let feed = async move {
        let sent = journal::replay(path, &tx).await?;
        tokio::time::sleep(linger).await;
        drop(tx);
        Ok::<_, JournalError>(sent)
    };

    let (sent, ()) = tokio::join!(feed, engine.run(rx));
    Ok(sent?)
}
