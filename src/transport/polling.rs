//! Batching, single-flight polling adapter.
//!
//! Adapts a request/response primitive (a [`Poller`]) to the [`Adapter`]
//! contract. Outgoing messages are queued and shipped together as one
//! envelope; at most one poll is outstanding at any time.
//!
//! # Envelope
//!
//! ```json
//! {"messages": ["{\"method\":\"mining.subscribe\",\"params\":[],\"id\":\"0\"}"]}
//! ```
//!
//! # Lifecycle
//!
//! 1. `send` queues a message and calls `flush`
//! 2. `flush` is a no-op while a poll is in flight; otherwise it takes the
//!    whole queue and issues exactly one poll
//! 3. The poll's callback clears the in-flight flag, then forwards the body
//!    to the inbound sink, even when the body is empty
//! 4. `tick` (or [`PollingAdapter::spawn_ticker`]) flushes periodically so the
//!    server gets a chance to push with no outgoing traffic
//!
//! A poll whose callback never fires keeps the adapter busy forever. The
//! bundled [`HttpPoller`](super::HttpPoller) always answers, with an empty
//! body on failure or timeout.

// ============================================================================
// Imports
// ============================================================================

use std::mem;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::to_string;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{Adapter, InboundSink};

// ============================================================================
// Types
// ============================================================================

/// Continuation invoked with the response body of one poll.
pub type PollCallback = Box<dyn FnOnce(String) + Send>;

/// One request/response round trip.
///
/// Implementations must invoke `on_response` exactly once per call, or the
/// polling adapter stays in flight forever.
pub trait Poller: Send + Sync {
    /// Sends `payload` to `url` and hands the response text to `on_response`.
    fn request(&self, url: &Url, payload: String, on_response: PollCallback);
}

/// Outbound batch envelope.
#[derive(Serialize)]
struct OutboundBatch<'a> {
    messages: &'a [String],
}

/// Mutable polling state.
#[derive(Debug, Default)]
struct PollState {
    /// Messages not yet transmitted.
    queue: Vec<String>,
    /// Single-flight guard.
    in_flight: bool,
    /// Set by `close`.
    closed: bool,
}

/// Shared adapter internals.
struct PollingInner {
    url: Url,
    poller: Arc<dyn Poller>,
    on_response: InboundSink,
    state: Mutex<PollState>,
}

// ============================================================================
// PollingAdapter
// ============================================================================

/// Polling transport adapter.
///
/// Cheap to clone; clones share the queue and in-flight flag.
#[derive(Clone)]
pub struct PollingAdapter {
    inner: Arc<PollingInner>,
}

impl PollingAdapter {
    /// Creates a polling adapter for a fixed endpoint.
    #[must_use]
    pub fn new(url: Url, poller: Arc<dyn Poller>, on_response: InboundSink) -> Self {
        Self {
            inner: Arc::new(PollingInner {
                url,
                poller,
                on_response,
                state: Mutex::new(PollState::default()),
            }),
        }
    }

    /// Returns the polling endpoint.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Issues a poll carrying the queued messages unless one is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the envelope cannot be serialized.
    pub fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    /// Scheduler hook; equivalent to [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// See [`flush`](Self::flush).
    pub fn tick(&self) -> Result<()> {
        self.inner.flush()
    }

    /// Spawns a task calling [`tick`](Self::tick) every `period`.
    ///
    /// The task ends once the adapter is closed or dropped.
    pub fn spawn_ticker(&self, period: Duration) -> JoinHandle<()> {
        let weak: Weak<PollingInner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if inner.state.lock().closed {
                    break;
                }
                if let Err(e) = inner.flush() {
                    warn!(error = %e, "Poll tick failed");
                }
            }

            debug!("Poll ticker stopped");
        })
    }

    /// Returns the number of queued, untransmitted messages.
    #[inline]
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Returns `true` while a poll is outstanding.
    #[inline]
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.inner.state.lock().in_flight
    }

    /// Returns `true` once the adapter has been closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }
}

impl Adapter for PollingAdapter {
    fn send(&self, message: String) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(Error::ConnectionClosed);
            }
            state.queue.push(message);
        }

        self.inner.flush()
    }

    fn close(&self) -> Result<()> {
        let dropped = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            mem::take(&mut state.queue).len()
        };

        debug!(url = %self.inner.url, dropped, "Polling adapter closed");
        Ok(())
    }
}

impl PollingInner {
    fn flush(self: &Arc<Self>) -> Result<()> {
        let payload = {
            let mut state = self.state.lock();
            if state.closed || state.in_flight {
                return Ok(());
            }

            let payload = to_string(&OutboundBatch {
                messages: &state.queue,
            })?;
            state.queue.clear();
            state.in_flight = true;
            payload
        };

        trace!(url = %self.url, payload = %payload, "Issuing poll");

        let inner = Arc::clone(self);
        self.poller.request(
            &self.url,
            payload,
            Box::new(move |body| inner.process_response(body)),
        );

        Ok(())
    }

    fn process_response(&self, body: String) {
        let closed = {
            let mut state = self.state.lock();
            state.in_flight = false;
            state.closed
        };

        if closed {
            debug!(len = body.len(), "Dropping poll response after close");
            return;
        }

        trace!(len = body.len(), "Poll response received");
        (self.on_response)(body);
    }
}

// ============================================================================
// Test Support
// ============================================================================

/// Poller that records requests and lets tests complete them by hand.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingPoller {
    calls: Mutex<Vec<RecordedPoll>>,
}

#[cfg(test)]
struct RecordedPoll {
    url: Url,
    payload: String,
    callback: Option<PollCallback>,
}

#[cfg(test)]
impl RecordingPoller {
    /// Number of polls issued so far.
    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    /// URL of the `index`-th poll.
    pub fn url(&self, index: usize) -> Url {
        self.calls.lock()[index].url.clone()
    }

    /// Messages carried by the `index`-th poll.
    pub fn messages(&self, index: usize) -> Vec<String> {
        let payload = self.calls.lock()[index].payload.clone();
        let envelope: serde_json::Value = serde_json::from_str(&payload).expect("envelope json");
        serde_json::from_value(envelope["messages"].clone()).expect("messages array")
    }

    /// Completes the `index`-th poll with `body`.
    pub fn complete(&self, index: usize, body: &str) {
        let callback = self.calls.lock()[index]
            .callback
            .take()
            .expect("poll already completed");
        callback(body.to_string());
    }
}

#[cfg(test)]
impl Poller for RecordingPoller {
    fn request(&self, url: &Url, payload: String, on_response: PollCallback) {
        self.calls.lock().push(RecordedPoll {
            url: url.clone(),
            payload,
            callback: Some(on_response),
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (PollingAdapter, Arc<RecordingPoller>, Arc<Mutex<Vec<String>>>) {
        let poller = Arc::new(RecordingPoller::default());
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_received = Arc::clone(&received);

        let adapter = PollingAdapter::new(
            Url::parse("http://pool.example.com/poll").expect("url"),
            Arc::clone(&poller) as Arc<dyn Poller>,
            Arc::new(move |body| sink_received.lock().push(body)),
        );

        (adapter, poller, received)
    }

    #[test]
    fn test_send_triggers_poll_without_flush() {
        let (adapter, poller, _) = setup();

        adapter.send("String message".into()).expect("send");

        assert_eq!(poller.count(), 1);
        assert!(adapter.is_in_flight());
        assert_eq!(adapter.queued_len(), 0);
    }

    #[test]
    fn test_poll_arguments() {
        let (adapter, poller, _) = setup();

        adapter.send("String message".into()).expect("send");
        adapter.flush().expect("flush");

        assert_eq!(poller.count(), 1);
        assert_eq!(poller.url(0).as_str(), "http://pool.example.com/poll");
        assert_eq!(poller.messages(0), vec!["String message".to_string()]);
    }

    #[test]
    fn test_second_send_is_queued_while_in_flight() {
        let (adapter, poller, _) = setup();

        adapter.send("first".into()).expect("send");
        adapter.send("second".into()).expect("send");
        adapter.send("third".into()).expect("send");

        assert_eq!(poller.count(), 1);
        assert_eq!(adapter.queued_len(), 2);

        poller.complete(0, "");
        assert!(!adapter.is_in_flight());

        adapter.tick().expect("tick");
        assert_eq!(poller.count(), 2);
        assert_eq!(poller.messages(1), vec!["second".to_string(), "third".to_string()]);
    }

    #[test]
    fn test_back_to_back_ticks_issue_one_poll() {
        let (adapter, poller, _) = setup();

        adapter.tick().expect("tick");
        adapter.tick().expect("tick");

        assert_eq!(poller.count(), 1);
        assert!(poller.messages(0).is_empty());
    }

    #[test]
    fn test_responses_are_tunnelled_to_sink() {
        let (adapter, poller, received) = setup();

        adapter.send("String message".into()).expect("send");
        poller.complete(0, "response");

        assert_eq!(*received.lock(), vec!["response".to_string()]);
    }

    #[test]
    fn test_empty_response_is_still_forwarded() {
        let (adapter, poller, received) = setup();

        adapter.tick().expect("tick");
        poller.complete(0, "");

        assert_eq!(*received.lock(), vec![String::new()]);
        assert!(!adapter.is_in_flight());
    }

    #[test]
    fn test_close_rejects_sends_and_drops_late_responses() {
        let (adapter, poller, received) = setup();

        adapter.send("first".into()).expect("send");
        adapter.send("queued".into()).expect("send");
        adapter.close().expect("close");

        assert!(adapter.is_closed());
        assert_eq!(adapter.queued_len(), 0);
        assert!(matches!(adapter.send("late".into()), Err(Error::ConnectionClosed)));

        poller.complete(0, r#"{"id":"0","result":true}"#);
        assert!(received.lock().is_empty());

        adapter.tick().expect("tick");
        assert_eq!(poller.count(), 1);
    }

    #[test]
    fn test_open_is_noop() {
        let (adapter, poller, _) = setup();
        adapter.open().expect("open");
        assert_eq!(poller.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_respects_single_flight() {
        let (adapter, poller, _) = setup();

        let ticker = adapter.spawn_ticker(Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(poller.count(), 1);

        poller.complete(0, "");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(poller.count(), 2);

        adapter.close().expect("close");
        poller.complete(1, "");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(ticker.is_finished());
        assert_eq!(poller.count(), 2);
    }
}
