//! Conversation state store — ordered message history, typing indicator,
//! fullscreen flag and "conversation started" flag, mutated only through the
//! operations on [`ConversationStore`].
//!
//! Replies are produced by a [`Responder`] on a spawned task after a random
//! delay. Every pending reply is tied to the store's current epoch;
//! [`ConversationStore::clear_messages`] and [`ConversationStore::shutdown`]
//! advance the epoch and abort the tasks, so a stale reply is never applied.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use fluent_core::event_bus::{EventSink, WidgetEvent};
use fluent_core::types::{Message, MessageAuthor};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::host::HostPage;
use crate::responder::Responder;

/// Window from which the simulated reply latency is drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDelay {
    range_ms: Range<u64>,
}

impl ReplyDelay {
    /// `[min_ms, max_ms)`; an empty window always yields `min_ms`.
    pub fn between(min_ms: u64, max_ms: u64) -> Self {
        Self {
            range_ms: min_ms..max_ms,
        }
    }

    /// Reply as soon as the responder returns.
    pub fn none() -> Self {
        Self::between(0, 0)
    }

    pub fn sample(&self) -> Duration {
        let ms = if self.range_ms.is_empty() {
            self.range_ms.start
        } else {
            rand::thread_rng().gen_range(self.range_ms.clone())
        };
        Duration::from_millis(ms)
    }
}

impl Default for ReplyDelay {
    fn default() -> Self {
        Self::between(1000, 3000)
    }
}

/// Read-only view of the conversation.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub is_open: bool,
    pub messages: Vec<Message>,
    pub is_typing: bool,
    pub has_started: bool,
}

#[derive(Default)]
struct StoreInner {
    state: ConversationState,
    next_sequence: u64,
    epoch: u64,
    pending: Vec<JoinHandle<()>>,
    closed: bool,
}

impl StoreInner {
    fn push(&mut self, content: String, author: MessageAuthor) -> Message {
        let message = Message::new(self.next_sequence, content, author);
        self.next_sequence += 1;
        self.state.messages.push(message.clone());
        message
    }

    /// Advance the epoch and abort every in-flight reply.
    fn cancel_pending(&mut self) -> usize {
        self.epoch += 1;
        let pending = std::mem::take(&mut self.pending);
        let live = pending.iter().filter(|h| !h.is_finished()).count();
        for handle in pending {
            handle.abort();
        }
        live
    }
}

/// Shared handle to one conversation. Clones refer to the same state.
#[derive(Clone)]
pub struct ConversationStore {
    inner: Arc<Mutex<StoreInner>>,
    responder: Arc<dyn Responder>,
    page: Arc<dyn HostPage>,
    events: Arc<dyn EventSink>,
    reply_delay: ReplyDelay,
}

impl ConversationStore {
    pub fn new(
        responder: Arc<dyn Responder>,
        page: Arc<dyn HostPage>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner::default())),
            responder,
            page,
            events,
            reply_delay: ReplyDelay::default(),
        }
    }

    pub fn with_reply_delay(mut self, delay: ReplyDelay) -> Self {
        self.reply_delay = delay;
        self
    }

    /// Append a user message and schedule the reply.
    ///
    /// Blank input is ignored and returns `None`. The first message of a
    /// conversation marks it started and opens the fullscreen view.
    pub fn send_message(&self, text: &str) -> Option<Message> {
        let content = text.trim();
        if content.is_empty() {
            debug!("ignoring blank message");
            return None;
        }

        let (message, first, epoch) = {
            let mut inner = self.inner.lock();
            if inner.closed {
                warn!("conversation store is shut down, message dropped");
                return None;
            }
            let message = inner.push(content.to_string(), MessageAuthor::User);
            let first = !inner.state.has_started;
            inner.state.has_started = true;
            inner.state.is_typing = true;
            (message, first, inner.epoch)
        };

        if first {
            self.open_fullscreen();
        }

        self.events.emit(WidgetEvent::Message {
            content: message.content.clone(),
            author: MessageAuthor::User,
            metadata: None,
        });
        self.events.emit(WidgetEvent::Typing(true));

        self.schedule_reply(content.to_string(), epoch);
        Some(message)
    }

    fn schedule_reply(&self, prompt: String, epoch: u64) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "no async runtime available, reply not scheduled");
                self.inner.lock().state.is_typing = false;
                self.events.emit(WidgetEvent::Typing(false));
                return;
            }
        };

        let delay = self.reply_delay.sample();
        let store = self.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let reply = store.responder.respond(&prompt).await;
            store.apply_reply(reply, epoch);
        });

        let mut inner = self.inner.lock();
        inner.pending.retain(|h| !h.is_finished());
        if inner.epoch == epoch && !inner.closed {
            inner.pending.push(handle);
        } else {
            handle.abort();
        }
    }

    fn apply_reply(&self, reply: String, epoch: u64) {
        {
            let mut inner = self.inner.lock();
            if inner.closed || inner.epoch != epoch {
                debug!(epoch, current = inner.epoch, "discarding stale reply");
                return;
            }
            inner.push(reply.clone(), MessageAuthor::System);
            inner.state.is_typing = false;
        }

        self.events.emit(WidgetEvent::Message {
            content: reply,
            author: MessageAuthor::System,
            metadata: None,
        });
        self.events.emit(WidgetEvent::Typing(false));
    }

    /// Empty the history and reset the started flag. Pending replies are
    /// cancelled. Does not touch the fullscreen flag.
    pub fn clear_messages(&self) {
        let (cancelled, was_typing) = {
            let mut inner = self.inner.lock();
            let cancelled = inner.cancel_pending();
            inner.state.messages.clear();
            inner.state.has_started = false;
            let was_typing = std::mem::replace(&mut inner.state.is_typing, false);
            (cancelled, was_typing)
        };
        debug!(cancelled, "conversation cleared");
        if was_typing {
            self.events.emit(WidgetEvent::Typing(false));
        }
    }

    pub fn open_fullscreen(&self) {
        self.inner.lock().state.is_open = true;
        self.page.set_scroll_locked(true);
    }

    pub fn close_fullscreen(&self) {
        self.inner.lock().state.is_open = false;
        self.page.set_scroll_locked(false);
    }

    /// Cancel all pending work and refuse further messages. Restores page
    /// scrolling if the fullscreen view was open.
    pub fn shutdown(&self) {
        let was_open = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            let cancelled = inner.cancel_pending();
            debug!(cancelled, "conversation store shut down");
            std::mem::replace(&mut inner.state.is_open, false)
        };
        if was_open {
            self.page.set_scroll_locked(false);
        }
    }

    /// Accept messages again after [`shutdown`](Self::shutdown). History is
    /// kept; replies cancelled by the shutdown stay cancelled.
    pub fn resume(&self) {
        let mut inner = self.inner.lock();
        if std::mem::replace(&mut inner.closed, false) {
            if inner.state.is_typing {
                inner.state.is_typing = false;
                drop(inner);
                self.events.emit(WidgetEvent::Typing(false));
            }
            debug!("conversation store resumed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.lock().state.messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.inner.lock().state.messages.len()
    }

    pub fn is_typing(&self) -> bool {
        self.inner.lock().state.is_typing
    }

    pub fn has_started(&self) -> bool {
        self.inner.lock().state.has_started
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().state.is_open
    }

    pub fn snapshot(&self) -> ConversationState {
        self.inner.lock().state.clone()
    }

    /// Replies scheduled but not yet applied or cancelled.
    pub fn pending_replies(&self) -> usize {
        self.inner
            .lock()
            .pending
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryPage;
    use crate::responder::{CannedResponder, GREETING_REPLY, PRICING_REPLY};
    use async_trait::async_trait;
    use fluent_core::event_bus::{capture_sink, CaptureSink, EventKind};

    fn store() -> (ConversationStore, Arc<MemoryPage>, Arc<CaptureSink>) {
        let page = Arc::new(MemoryPage::new());
        let sink = capture_sink();
        let store = ConversationStore::new(
            Arc::new(CannedResponder::new()),
            page.clone(),
            sink.clone(),
        );
        (store, page, sink)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(3500)).await;
    }

    #[test]
    fn test_reply_delay_sampling() {
        let delay = ReplyDelay::default();
        for _ in 0..100 {
            let d = delay.sample();
            assert!(d >= Duration::from_millis(1000) && d < Duration::from_millis(3000));
        }
        assert_eq!(ReplyDelay::none().sample(), Duration::ZERO);
        assert_eq!(ReplyDelay::between(50, 10).sample(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_messages_are_noops() {
        let (store, page, sink) = store();
        assert!(store.send_message("").is_none());
        assert!(store.send_message("   ").is_none());
        assert_eq!(store.message_count(), 0);
        assert!(!store.has_started());
        assert!(!store.is_open());
        assert!(!page.is_scroll_locked());
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_message_starts_and_opens() {
        let (store, page, _sink) = store();
        let sent = store.send_message("  hello  ").unwrap();
        assert_eq!(sent.content, "hello");
        assert!(sent.is_user());
        assert!(store.has_started());
        assert!(store.is_open());
        assert!(store.is_typing());
        assert!(page.is_scroll_locked());

        settle().await;
        let messages = store.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].author, MessageAuthor::System);
        assert_eq!(messages[1].content, GREETING_REPLY);
        assert!(!store.is_typing());

        // Still started after further messages
        store.send_message("what does it cost").unwrap();
        assert!(store.has_started());
        assert!(store.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closing_fullscreen_keeps_history() {
        let (store, page, _sink) = store();
        store.send_message("hi").unwrap();
        store.close_fullscreen();
        assert!(!store.is_open());
        assert!(!page.is_scroll_locked());

        // Not the first message any more, so it does not reopen
        store.send_message("again").unwrap();
        assert!(!store.is_open());
        assert_eq!(store.message_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_rapid_messages_get_two_replies() {
        let (store, _page, sink) = store();
        store.send_message("hi").unwrap();
        store.send_message("what does it cost").unwrap();
        assert_eq!(store.pending_replies(), 2);

        settle().await;
        let messages = store.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].content, "what does it cost");

        let mut replies: Vec<&str> = messages[2..].iter().map(|m| m.content.as_str()).collect();
        replies.sort();
        let mut expected = vec![GREETING_REPLY, PRICING_REPLY];
        expected.sort();
        assert_eq!(replies, expected);

        // Sequence numbers follow append order
        let seqs: Vec<u64> = messages.iter().map(|m| m.sequence).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
        assert_eq!(sink.count_kind(EventKind::Message), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_discards_in_flight_reply() {
        let (store, _page, sink) = store();
        store.send_message("hi").unwrap();
        store.clear_messages();

        assert_eq!(store.message_count(), 0);
        assert!(!store.has_started());
        assert!(!store.is_typing());
        // Fullscreen is untouched by clear
        assert!(store.is_open());

        settle().await;
        assert_eq!(store.message_count(), 0);
        assert_eq!(store.pending_replies(), 0);
        // Only the user message was reported
        assert_eq!(sink.count_kind(EventKind::Message), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_always_resets() {
        let (store, _page, _sink) = store();
        store.clear_messages();
        assert!(store.messages().is_empty());
        assert!(!store.has_started());

        store.send_message("hello").unwrap();
        settle().await;
        store.clear_messages();
        assert!(store.messages().is_empty());
        assert!(!store.has_started());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_and_unlocks_scroll() {
        let (store, page, _sink) = store();
        store.send_message("hi").unwrap();
        store.shutdown();

        assert!(!page.is_scroll_locked());
        assert!(store.send_message("late").is_none());

        settle().await;
        assert_eq!(store.message_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_accepts_messages_but_not_cancelled_replies() {
        let (store, _page, sink) = store();
        store.send_message("hi").unwrap();
        store.shutdown();
        assert!(store.is_closed());

        store.resume();
        assert!(!store.is_closed());
        assert!(!store.is_typing());
        settle().await;
        assert_eq!(store.message_count(), 1);

        store.send_message("still there?").unwrap();
        settle().await;
        assert_eq!(store.message_count(), 3);
        assert_eq!(sink.count_kind(EventKind::Message), 3);
    }

    struct EchoResponder;

    #[async_trait]
    impl Responder for EchoResponder {
        async fn respond(&self, last_user_message: &str) -> String {
            format!("echo: {last_user_message}")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pluggable_responder_without_delay() {
        let page = Arc::new(MemoryPage::new());
        let store = ConversationStore::new(Arc::new(EchoResponder), page, capture_sink())
            .with_reply_delay(ReplyDelay::none());
        store.send_message("ping").unwrap();

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.messages()[1].content, "echo: ping");
    }

    #[test]
    fn test_send_without_runtime_does_not_panic() {
        let (store, _page, sink) = store();
        let sent = store.send_message("hello");
        assert!(sent.is_some());
        assert!(!store.is_typing());
        assert_eq!(sink.count_kind(EventKind::Typing), 2);
    }
}
