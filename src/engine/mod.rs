//! Engine: the single serial context that owns dispatcher, controller,
//! timers and capture completions.
//!
//! Architecture: one `select!` loop, no locks. Device events arrive on
//! an mpsc channel fed by the platform monitor thread. Settled triggers
//! come out of the dispatcher's delay queue, capture results come back
//! from spawned tasks over a second channel tagged with the generation
//! they were issued for, and the hide countdown is a deadline owned by
//! the visibility controller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::capture::{CaptureError, SelectionSource};
use crate::combination::{CustomPredicate, DoubleClick, DragThreshold, KeyPress, ScrollDismiss};
use crate::dispatcher::{self, Dispatcher};
use crate::event::{EventKind, InputEvent, KeyCode};
use crate::visibility::surface::Surface;
use crate::visibility::{CaptureOutcome, VisibilityConfig, VisibilityController};

/// Default upper bound on a single capture.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_millis(1500);

/// What a matched combination asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Read the selection and show it if it is new.
    Capture,
    /// Fade the surface out, if it is still the one showing when the
    /// gesture happened.
    FadeOut,
    /// Hide at once; supersede any outstanding capture.
    Dismiss,
    /// Re-check the hide countdown against the pointer.
    PointerMoved,
}

/// Engine parameters. Injected at construction, never persisted.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub drag_threshold: usize,
    pub settle: Duration,
    pub capture_timeout: Duration,
    pub visibility: VisibilityConfig,
    /// Key whose key-down triggers a capture.
    pub capture_key: Option<KeyCode>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            drag_threshold: crate::combination::DEFAULT_DRAG_THRESHOLD,
            settle: dispatcher::DEFAULT_SETTLE,
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
            visibility: VisibilityConfig::default(),
            capture_key: None,
        }
    }
}

#[derive(Debug)]
struct Completion {
    generation: u64,
    result: Result<String, CaptureError>,
}

pub struct Engine<S, U> {
    dispatcher: Dispatcher<Trigger>,
    visibility: VisibilityController<U>,
    source: Arc<S>,
    capture_timeout: Duration,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    /// Capture task for the generation it was issued for.
    in_flight: Option<(u64, JoinHandle<()>)>,
}

impl<S: SelectionSource, U: Surface> Engine<S, U> {
    /// Build an engine with the standard selection gestures registered.
    pub fn new(config: EngineConfig, source: S, surface: U) -> Self {
        let mut dispatcher = Dispatcher::new(config.settle);

        dispatcher.register(DoubleClick::new(), Some(Trigger::Capture));
        dispatcher.register(
            DragThreshold::new(config.drag_threshold),
            Some(Trigger::Capture),
        );
        dispatcher.register(ScrollDismiss::new(), Some(Trigger::FadeOut));
        if let Some(code) = config.capture_key {
            dispatcher.register(KeyPress::new(code), Some(Trigger::Capture));
        }
        // The capture key's own press and release must not dismiss the
        // capture it starts.
        let capture_key = config.capture_key;
        dispatcher.register_immediate(
            CustomPredicate::new("Dismiss", move |e: &InputEvent| {
                e.is_dismissal() && !is_key(e, capture_key)
            }),
            Some(Trigger::Dismiss),
        );
        dispatcher.register_immediate(
            CustomPredicate::new("PointerMoved", InputEvent::is_pointer_move),
            Some(Trigger::PointerMoved),
        );

        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        Self {
            dispatcher,
            visibility: VisibilityController::new(surface, config.visibility),
            source: Arc::new(source),
            capture_timeout: config.capture_timeout,
            completion_tx,
            completion_rx,
            in_flight: None,
        }
    }

    /// Run until the event channel closes.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<InputEvent>) {
        tracing::info!(
            combinations = self.dispatcher.len(),
            "engine running"
        );

        loop {
            let countdown = self.visibility.hide_countdown();
            let hide_deadline = countdown.map_or_else(Instant::now, |c| c.deadline);

            tokio::select! {
                biased;

                Some(done) = self.completion_rx.recv() => {
                    self.complete(done);
                }

                Some(settled) = self.dispatcher.next_settled() => {
                    self.apply(settled.trigger, settled.epoch);
                }

                _ = sleep_until(hide_deadline), if countdown.is_some() => {
                    if let Some(c) = countdown {
                        self.visibility.hide_timer_fired(c.token);
                    }
                }

                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("event source closed");
                        break;
                    };
                    self.handle_event(&event);
                }
            }
        }
    }

    /// Dispatch one event and apply its immediate triggers.
    fn handle_event(&mut self, event: &InputEvent) {
        tracing::trace!(event = event.name(), x = event.position.x, y = event.position.y, "event");
        self.visibility.observe_pointer(event.position);
        let epoch = self.visibility.generation();
        self.dispatcher.dispatch(event, epoch);
        while let Some(trigger) = self.dispatcher.pop_ready() {
            self.apply(trigger, self.visibility.generation());
        }
        if self.dispatcher.settling_len() > 0 {
            tracing::trace!(settling = self.dispatcher.settling_len(), "triggers settling");
        }
    }

    /// Apply a trigger whose gesture was seen at generation `epoch`.
    fn apply(&mut self, trigger: Trigger, epoch: u64) {
        tracing::trace!(?trigger, epoch, state = ?self.visibility.state(), "apply");
        match trigger {
            Trigger::Capture => self.start_capture(),
            Trigger::FadeOut => self.visibility.fade_out(epoch),
            Trigger::Dismiss => self.visibility.dismiss(),
            Trigger::PointerMoved => self.visibility.reevaluate_hide(),
        }
        self.abort_superseded();
    }

    /// Cancel the capture task if its generation is no longer current.
    /// Dropping the task drops the reader, which kills any child process.
    fn abort_superseded(&mut self) {
        let current = self.visibility.generation();
        match self.in_flight.take() {
            Some((generation, handle)) if generation != current => {
                handle.abort();
                tracing::debug!(generation, current, "superseded capture aborted");
            }
            kept => self.in_flight = kept,
        }
    }

    /// Spawn a bounded capture; its result returns through the
    /// completion channel.
    fn start_capture(&mut self) {
        let generation = self.visibility.begin_capture();
        self.abort_superseded();
        tracing::debug!(
            generation,
            down = ?self.dispatcher.last_pointer_down(),
            up = ?self.dispatcher.last_pointer_up(),
            "capture started"
        );
        let source = Arc::clone(&self.source);
        let tx = self.completion_tx.clone();
        let timeout = self.capture_timeout;

        let handle = tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, source.capture_selected_text()).await {
                Ok(result) => result,
                Err(_) => Err(CaptureError::Timeout),
            };
            // The engine owns the receiver; a send error means it has
            // already shut down.
            let _ = tx.send(Completion { generation, result });
        });
        self.in_flight = Some((generation, handle));
    }

    fn complete(&mut self, done: Completion) {
        if matches!(self.in_flight, Some((generation, _)) if generation == done.generation) {
            self.in_flight = None;
        }
        let anchor = self.dispatcher.last_pointer_up();
        let outcome = self
            .visibility
            .complete_capture(done.generation, done.result, anchor);
        if outcome == CaptureOutcome::Shown {
            tracing::info!(generation = self.visibility.generation(), "selection shown");
        }
    }
}

fn is_key(event: &InputEvent, key: Option<KeyCode>) -> bool {
    match event.kind {
        EventKind::KeyDown { code, .. } | EventKind::KeyUp { code } => Some(code) == key,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::event::{EventKind, Point, Size};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Show(Point, String),
        Hide,
        Fade,
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Call>>>);

    impl Recorder {
        fn calls(&self) -> Vec<Call> {
            self.0.lock().unwrap().clone()
        }

        fn shows(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Show(_, text) => Some(text),
                    _ => None,
                })
                .collect()
        }

        fn last(&self) -> Option<Call> {
            self.calls().last().cloned()
        }
    }

    impl Surface for Recorder {
        fn size(&self) -> Size {
            Size {
                width: 200.0,
                height: 100.0,
            }
        }

        fn show_at(&mut self, origin: Point, text: &str) {
            self.0.lock().unwrap().push(Call::Show(origin, text.into()));
        }

        fn hide(&mut self) {
            self.0.lock().unwrap().push(Call::Hide);
        }

        fn hide_animated(&mut self, _fade: Duration) {
            self.0.lock().unwrap().push(Call::Fade);
        }
    }

    /// Replies in order, each after its own delay.
    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<(Duration, Result<String, CaptureError>)>>,
    }

    impl Scripted {
        fn new(replies: Vec<(u64, Result<&str, CaptureError>)>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|(ms, r)| (Duration::from_millis(ms), r.map(str::to_string)))
                        .collect(),
                ),
            }
        }
    }

    impl SelectionSource for Scripted {
        async fn capture_selected_text(&self) -> Result<String, CaptureError> {
            let next = self.replies.lock().unwrap().pop_front();
            let Some((delay, reply)) = next else {
                return Err(CaptureError::NoSelection);
            };
            tokio::time::sleep(delay).await;
            reply
        }
    }

    /// Never finishes on its own; records when its capture future is dropped.
    #[derive(Default)]
    struct Stalled {
        dropped: Arc<AtomicBool>,
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    impl SelectionSource for Stalled {
        async fn capture_selected_text(&self) -> Result<String, CaptureError> {
            let _guard = SetOnDrop(Arc::clone(&self.dropped));
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("never".into())
        }
    }

    const SELECT_AT: Point = Point::new(500.0, 400.0);
    const OUTSIDE: Point = Point::new(10.0, 10.0);
    // Surface occupies x 400..600, y 290..390 when shown from SELECT_AT.
    const INSIDE: Point = Point::new(450.0, 330.0);

    fn ev(kind: EventKind, at: Point) -> InputEvent {
        InputEvent::new(kind, at, 0)
    }

    struct Harness {
        tx: mpsc::UnboundedSender<InputEvent>,
        surface: Recorder,
    }

    impl Harness {
        fn start(source: impl SelectionSource) -> Self {
            Self::with_config(EngineConfig::default(), source)
        }

        fn with_config(config: EngineConfig, source: impl SelectionSource) -> Self {
            let surface = Recorder::default();
            let engine = Engine::new(config, source, surface.clone());
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(engine.run(rx));
            Self { tx, surface }
        }

        fn send(&self, kind: EventKind, at: Point) {
            self.tx.send(ev(kind, at)).unwrap();
        }

        fn double_click(&self) {
            self.send(EventKind::PointerDown { click_count: 1 }, SELECT_AT);
            self.send(EventKind::PointerUp, SELECT_AT);
            self.send(EventKind::PointerDown { click_count: 2 }, SELECT_AT);
            self.send(EventKind::PointerUp, SELECT_AT);
        }

        fn drag_select(&self, drags: usize) {
            self.send(EventKind::PointerDown { click_count: 1 }, Point::new(300.0, 400.0));
            for i in 0..drags {
                self.send(EventKind::PointerDrag, Point::new(300.0 + 50.0 * i as f64, 400.0));
            }
            self.send(EventKind::PointerUp, SELECT_AT);
        }
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn double_click_shows_selection_after_settle() {
        let h = Harness::start(Scripted::new(vec![(0, Ok("hello"))]));
        h.double_click();

        advance(50).await;
        assert!(h.surface.shows().is_empty());

        advance(100).await;
        assert_eq!(
            h.surface.last(),
            Some(Call::Show(Point::new(400.0, 290.0), "hello".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn drag_select_shows_selection() {
        let h = Harness::start(Scripted::new(vec![(0, Ok("dragged"))]));
        h.drag_select(3);
        advance(200).await;
        assert_eq!(h.surface.shows(), vec!["dragged".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn short_drag_does_not_capture() {
        let h = Harness::start(Scripted::new(vec![(0, Ok("dragged"))]));
        h.drag_select(2);
        advance(200).await;
        assert!(h.surface.shows().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_selection_is_suppressed() {
        let h = Harness::start(Scripted::new(vec![
            (0, Ok("hello")),
            (0, Ok("hello")),
            (0, Ok("world")),
        ]));

        h.double_click();
        advance(200).await;
        h.double_click();
        advance(200).await;
        assert_eq!(h.surface.shows(), vec!["hello".to_string()]);
        // The second gesture's pointer-down dismissed the first surface.
        assert_eq!(h.surface.last(), Some(Call::Hide));

        h.double_click();
        advance(200).await;
        assert_eq!(
            h.surface.shows(),
            vec!["hello".to_string(), "world".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pointer_outside_hides_after_idle_timeout() {
        let h = Harness::start(Scripted::new(vec![(0, Ok("hello"))]));
        h.double_click();
        advance(200).await;

        h.send(EventKind::PointerMove, OUTSIDE);
        advance(990).await;
        assert!(matches!(h.surface.last(), Some(Call::Show(..))));

        advance(20).await;
        assert_eq!(h.surface.last(), Some(Call::Fade));
    }

    #[tokio::test(start_paused = true)]
    async fn reentry_cancels_hide_countdown() {
        let h = Harness::start(Scripted::new(vec![(0, Ok("hello"))]));
        h.double_click();
        advance(200).await;

        h.send(EventKind::PointerMove, OUTSIDE);
        advance(500).await;
        h.send(EventKind::PointerMove, INSIDE);
        advance(1500).await;

        assert!(matches!(h.surface.last(), Some(Call::Show(..))));
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_dismisses_visible_surface() {
        let h = Harness::start(Scripted::new(vec![(0, Ok("hello"))]));
        h.double_click();
        advance(200).await;

        h.send(
            EventKind::Scroll {
                delta: crate::event::ScrollDelta { dx: 0.0, dy: 1.0 },
            },
            INSIDE,
        );
        advance(200).await;
        // Immediate dismissal wins; the settled fade finds nothing to hide.
        assert_eq!(h.surface.last(), Some(Call::Hide));
        assert_eq!(h.surface.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_before_show_does_not_fade_new_selection() {
        let h = Harness::start(Scripted::new(vec![(0, Ok("hello"))]));
        h.double_click();
        advance(50).await;
        // Scroll lands while nothing is showing; its fade settles after the
        // double-click's capture has shown.
        h.send(
            EventKind::Scroll {
                delta: crate::event::ScrollDelta { dx: 0.0, dy: 1.0 },
            },
            INSIDE,
        );
        advance(300).await;
        assert_eq!(
            h.surface.calls(),
            vec![Call::Show(Point::new(400.0, 290.0), "hello".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dismissal_during_capture_discards_result() {
        let h = Harness::start(Scripted::new(vec![(300, Ok("late"))]));
        h.double_click();
        // Capture starts at ~100 ms and resolves at ~400 ms.
        advance(200).await;
        h.send(
            EventKind::KeyDown {
                code: 9,
                repeat: false,
            },
            SELECT_AT,
        );
        advance(400).await;
        assert!(h.surface.shows().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dismissal_cancels_running_capture() {
        let source = Stalled::default();
        let dropped = Arc::clone(&source.dropped);
        let h = Harness::start(source);
        h.double_click();
        advance(200).await;
        assert!(!dropped.load(Ordering::SeqCst));

        h.send(
            EventKind::KeyDown {
                code: 9,
                repeat: false,
            },
            SELECT_AT,
        );
        advance(10).await;
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn new_capture_cancels_running_capture() {
        let source = Stalled::default();
        let dropped = Arc::clone(&source.dropped);
        let h = Harness::with_config(capture_key_config(), source);
        h.drag_select(3);
        advance(200).await;

        h.send(key(74, false), SELECT_AT);
        advance(50).await;
        assert!(!dropped.load(Ordering::SeqCst));

        advance(100).await;
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn capture_timeout_returns_to_hidden() {
        let h = Harness::start(Scripted::new(vec![(10_000, Ok("slow")), (0, Ok("fast"))]));
        h.double_click();
        advance(100 + DEFAULT_CAPTURE_TIMEOUT.as_millis() as u64 + 50).await;
        assert!(h.surface.shows().is_empty());

        h.double_click();
        advance(200).await;
        assert_eq!(h.surface.shows(), vec!["fast".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_failure_shows_nothing() {
        let h = Harness::start(Scripted::new(vec![(0, Err(CaptureError::PermissionDenied))]));
        h.double_click();
        advance(200).await;
        assert!(h.surface.calls().is_empty());
    }

    fn key(code: KeyCode, repeat: bool) -> EventKind {
        EventKind::KeyDown { code, repeat }
    }

    fn capture_key_config() -> EngineConfig {
        EngineConfig {
            capture_key: Some(74),
            ..EngineConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn capture_key_triggers_capture() {
        let h = Harness::with_config(
            capture_key_config(),
            Scripted::new(vec![(0, Ok("keyboard"))]),
        );
        h.send(EventKind::PointerUp, SELECT_AT);
        h.send(key(74, false), SELECT_AT);
        advance(200).await;
        assert_eq!(h.surface.shows(), vec!["keyboard".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_key_release_keeps_pending_capture() {
        // Capture starts at ~100 ms and resolves at ~200 ms.
        let h = Harness::with_config(
            capture_key_config(),
            Scripted::new(vec![(100, Ok("keyboard"))]),
        );
        h.send(EventKind::PointerUp, SELECT_AT);
        h.send(key(74, false), SELECT_AT);
        advance(150).await;
        h.send(EventKind::KeyUp { code: 74 }, SELECT_AT);
        advance(300).await;

        assert_eq!(h.surface.shows(), vec!["keyboard".to_string()]);
        assert!(matches!(h.surface.last(), Some(Call::Show(..))));
    }

    #[tokio::test(start_paused = true)]
    async fn holding_capture_key_captures_once() {
        let h = Harness::with_config(
            capture_key_config(),
            Scripted::new(vec![(0, Ok("keyboard")), (0, Ok("again"))]),
        );
        h.send(EventKind::PointerUp, SELECT_AT);
        h.send(key(74, false), SELECT_AT);
        advance(200).await;
        h.send(key(74, true), SELECT_AT);
        h.send(key(74, true), SELECT_AT);
        advance(200).await;
        h.send(EventKind::KeyUp { code: 74 }, SELECT_AT);
        advance(200).await;

        assert_eq!(
            h.surface.calls(),
            vec![Call::Show(Point::new(400.0, 290.0), "keyboard".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn other_keys_still_dismiss_with_capture_key_bound() {
        let h = Harness::with_config(
            capture_key_config(),
            Scripted::new(vec![(0, Ok("keyboard"))]),
        );
        h.send(EventKind::PointerUp, SELECT_AT);
        h.send(key(74, false), SELECT_AT);
        advance(200).await;
        h.send(key(9, false), SELECT_AT);
        advance(10).await;
        assert_eq!(h.surface.last(), Some(Call::Hide));
    }

    #[tokio::test(start_paused = true)]
    async fn run_ends_when_events_close() {
        let engine = Engine::new(EngineConfig::default(), Scripted::default(), Recorder::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(engine.run(rx));
        drop(tx);
        task.await.unwrap();
    }
}
