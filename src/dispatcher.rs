//! Event dispatcher: fans every event out to the registered combinations.
//!
//! Owned exclusively by the engine loop. `dispatch` never blocks: a
//! match either lands in the ready queue (immediate delivery) or in a
//! [`DelayQueue`] that releases it after the settle delay. The engine
//! drains both between events, which keeps every trigger on the same
//! serial context as the events themselves.

use std::collections::VecDeque;
use std::future::poll_fn;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tokio_util::time::DelayQueue;

use crate::combination::Combination;
use crate::event::{EventKind, InputEvent, Point};

/// Default settle delay between a match and its trigger.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);

/// When a matched trigger is released to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// After the dispatcher's settle delay.
    Settled,
    /// Before the next event is dispatched.
    Immediate,
}

/// A trigger released after the settle delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settled<T> {
    pub trigger: T,
    /// Caller-supplied epoch current when the matching event was dispatched.
    pub epoch: u64,
}

struct Registration<T> {
    combination: Box<dyn Combination>,
    on_trigger: Option<T>,
    delivery: Delivery,
}

/// Owns the combination list and the pointer locations observed so far.
pub struct Dispatcher<T> {
    registrations: Vec<Registration<T>>,
    settle: Duration,
    settling: DelayQueue<Settled<T>>,
    ready: VecDeque<T>,
    last_pointer_down: Option<Point>,
    last_pointer_up: Option<Point>,
}

impl<T: Clone> Dispatcher<T> {
    pub fn new(settle: Duration) -> Self {
        Self {
            registrations: Vec::new(),
            settle,
            settling: DelayQueue::new(),
            ready: VecDeque::new(),
            last_pointer_down: None,
            last_pointer_up: None,
        }
    }

    /// Append a combination whose trigger fires after the settle delay.
    ///
    /// No de-duplication: registering the same recognizer twice makes it
    /// fire twice. Registration order is dispatch order only.
    pub fn register(&mut self, combination: impl Combination + 'static, on_trigger: Option<T>) {
        self.register_with(combination, on_trigger, Delivery::Settled);
    }

    /// Append a combination whose trigger fires before the next event.
    pub fn register_immediate(
        &mut self,
        combination: impl Combination + 'static,
        on_trigger: Option<T>,
    ) {
        self.register_with(combination, on_trigger, Delivery::Immediate);
    }

    fn register_with(
        &mut self,
        combination: impl Combination + 'static,
        on_trigger: Option<T>,
        delivery: Delivery,
    ) {
        tracing::debug!(
            combination = combination.identifier(),
            ?delivery,
            "combination registered"
        );
        self.registrations.push(Registration {
            combination: Box::new(combination),
            on_trigger,
            delivery,
        });
    }

    /// Forward one event to every combination, exactly once each.
    ///
    /// `epoch` is stamped on every settled trigger this event schedules so
    /// the owner can tell whether its state moved on during the delay.
    /// A combination that panics is logged and skipped; the remaining
    /// combinations still see the event.
    pub fn dispatch(&mut self, event: &InputEvent, epoch: u64) {
        match event.kind {
            EventKind::PointerDown { .. } => self.last_pointer_down = Some(event.position),
            EventKind::PointerUp => self.last_pointer_up = Some(event.position),
            _ => {}
        }

        for reg in &mut self.registrations {
            let matched =
                match panic::catch_unwind(AssertUnwindSafe(|| reg.combination.consume(event))) {
                    Ok(matched) => matched,
                    Err(_) => {
                        tracing::error!(
                            combination = reg.combination.identifier(),
                            event = event.name(),
                            "combination panicked, skipping"
                        );
                        continue;
                    }
                };

            if !matched {
                continue;
            }

            tracing::trace!(
                combination = reg.combination.identifier(),
                event = event.name(),
                "combination matched"
            );

            let Some(trigger) = reg.on_trigger.clone() else {
                continue;
            };
            match reg.delivery {
                Delivery::Immediate => self.ready.push_back(trigger),
                Delivery::Settled => {
                    self.settling.insert(Settled { trigger, epoch }, self.settle);
                }
            }
        }
    }

    /// Take the next immediate trigger, if any.
    pub fn pop_ready(&mut self) -> Option<T> {
        self.ready.pop_front()
    }

    /// Wait for the next settled trigger.
    ///
    /// Resolves to `None` at once when nothing is settling.
    pub async fn next_settled(&mut self) -> Option<Settled<T>> {
        poll_fn(|cx| self.settling.poll_expired(cx))
            .await
            .map(|expired| expired.into_inner())
    }

    /// Number of triggers still waiting out the settle delay.
    pub fn settling_len(&self) -> usize {
        self.settling.len()
    }

    pub fn last_pointer_down(&self) -> Option<Point> {
        self.last_pointer_down
    }

    pub fn last_pointer_up(&self) -> Option<Point> {
        self.last_pointer_up
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }
}
