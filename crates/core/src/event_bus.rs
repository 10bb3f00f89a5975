//! Widget event bus — the host page's callback hooks as a single trait.
//!
//! The lifecycle manager and the mounted UI accept an `Arc<dyn EventSink>` and
//! emit [`WidgetEvent`]s into it. Host pages either implement the trait or
//! build a [`WidgetHooks`] from individual closures.

use crate::error::WidgetErrorInfo;
use crate::types::{
    AgentInfo, FileAttachment, MessageAuthor, MessageMetadata, SurveyFeedback, VisitorInfo,
};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Everything the widget reports back to the host page.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    Ready,
    Opened,
    Closed,
    Minimized,
    Message {
        content: String,
        author: MessageAuthor,
        metadata: Option<MessageMetadata>,
    },
    Typing(bool),
    FileUpload(Vec<FileAttachment>),
    SurveySubmitted(SurveyFeedback),
    Error(WidgetErrorInfo),
    ConversationStarted(String),
    ConversationEnded(String),
    AgentAssigned(AgentInfo),
    VisitorIdentified(VisitorInfo),
}

/// Discriminant of [`WidgetEvent`], used for filtering and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    Opened,
    Closed,
    Minimized,
    Message,
    Typing,
    FileUpload,
    SurveySubmitted,
    Error,
    ConversationStarted,
    ConversationEnded,
    AgentAssigned,
    VisitorIdentified,
}

impl WidgetEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WidgetEvent::Ready => EventKind::Ready,
            WidgetEvent::Opened => EventKind::Opened,
            WidgetEvent::Closed => EventKind::Closed,
            WidgetEvent::Minimized => EventKind::Minimized,
            WidgetEvent::Message { .. } => EventKind::Message,
            WidgetEvent::Typing(_) => EventKind::Typing,
            WidgetEvent::FileUpload(_) => EventKind::FileUpload,
            WidgetEvent::SurveySubmitted(_) => EventKind::SurveySubmitted,
            WidgetEvent::Error(_) => EventKind::Error,
            WidgetEvent::ConversationStarted(_) => EventKind::ConversationStarted,
            WidgetEvent::ConversationEnded(_) => EventKind::ConversationEnded,
            WidgetEvent::AgentAssigned(_) => EventKind::AgentAssigned,
            WidgetEvent::VisitorIdentified(_) => EventKind::VisitorIdentified,
        }
    }
}

/// Receiver of widget events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: WidgetEvent);
}

/// No-op sink, the default when the host registers no hooks.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: WidgetEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<WidgetEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<WidgetEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> Vec<WidgetEvent> {
        self.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.lock().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: WidgetEvent) {
        self.lock().push(event);
    }
}

type UnitHook = Option<Arc<dyn Fn() + Send + Sync>>;
type RefHook<T> = Option<Arc<dyn Fn(&T) + Send + Sync>>;
type StrHook = Option<Arc<dyn Fn(&str) + Send + Sync>>;

/// Per-event callbacks, mirroring the `on*` options of the embed snippet.
///
/// ```
/// use fluent_core::event_bus::WidgetHooks;
///
/// let hooks = WidgetHooks::new()
///     .on_ready(|| println!("widget ready"))
///     .on_message(|content, author, _meta| println!("{author:?}: {content}"));
/// ```
#[derive(Default, Clone)]
pub struct WidgetHooks {
    on_ready: UnitHook,
    on_open: UnitHook,
    on_close: UnitHook,
    on_minimize: UnitHook,
    on_message: Option<Arc<dyn Fn(&str, MessageAuthor, Option<&MessageMetadata>) + Send + Sync>>,
    on_typing: Option<Arc<dyn Fn(bool) + Send + Sync>>,
    on_file_upload: Option<Arc<dyn Fn(&[FileAttachment]) + Send + Sync>>,
    on_survey_submit: RefHook<SurveyFeedback>,
    on_error: RefHook<WidgetErrorInfo>,
    on_conversation_start: StrHook,
    on_conversation_end: StrHook,
    on_agent_assigned: RefHook<AgentInfo>,
    on_visitor_identified: RefHook<VisitorInfo>,
}

impl WidgetHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_ready(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_ready = Some(Arc::new(f));
        self
    }

    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(f));
        self
    }

    pub fn on_close(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    pub fn on_minimize(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_minimize = Some(Arc::new(f));
        self
    }

    pub fn on_message(
        mut self,
        f: impl Fn(&str, MessageAuthor, Option<&MessageMetadata>) + Send + Sync + 'static,
    ) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    pub fn on_typing(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_typing = Some(Arc::new(f));
        self
    }

    pub fn on_file_upload(mut self, f: impl Fn(&[FileAttachment]) + Send + Sync + 'static) -> Self {
        self.on_file_upload = Some(Arc::new(f));
        self
    }

    pub fn on_survey_submit(mut self, f: impl Fn(&SurveyFeedback) + Send + Sync + 'static) -> Self {
        self.on_survey_submit = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&WidgetErrorInfo) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_conversation_start(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_conversation_start = Some(Arc::new(f));
        self
    }

    pub fn on_conversation_end(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_conversation_end = Some(Arc::new(f));
        self
    }

    pub fn on_agent_assigned(mut self, f: impl Fn(&AgentInfo) + Send + Sync + 'static) -> Self {
        self.on_agent_assigned = Some(Arc::new(f));
        self
    }

    pub fn on_visitor_identified(mut self, f: impl Fn(&VisitorInfo) + Send + Sync + 'static) -> Self {
        self.on_visitor_identified = Some(Arc::new(f));
        self
    }

    pub fn into_sink(self) -> Arc<dyn EventSink> {
        Arc::new(self)
    }
}

impl EventSink for WidgetHooks {
    fn emit(&self, event: WidgetEvent) {
        match &event {
            WidgetEvent::Ready => call_unit(&self.on_ready),
            WidgetEvent::Opened => call_unit(&self.on_open),
            WidgetEvent::Closed => call_unit(&self.on_close),
            WidgetEvent::Minimized => call_unit(&self.on_minimize),
            WidgetEvent::Message {
                content,
                author,
                metadata,
            } => {
                if let Some(f) = &self.on_message {
                    f(content, *author, metadata.as_ref());
                }
            }
            WidgetEvent::Typing(typing) => {
                if let Some(f) = &self.on_typing {
                    f(*typing);
                }
            }
            WidgetEvent::FileUpload(files) => {
                if let Some(f) = &self.on_file_upload {
                    f(files);
                }
            }
            WidgetEvent::SurveySubmitted(feedback) => call(&self.on_survey_submit, feedback),
            WidgetEvent::Error(info) => call(&self.on_error, info),
            WidgetEvent::ConversationStarted(id) => call_str(&self.on_conversation_start, id),
            WidgetEvent::ConversationEnded(id) => call_str(&self.on_conversation_end, id),
            WidgetEvent::AgentAssigned(agent) => call(&self.on_agent_assigned, agent),
            WidgetEvent::VisitorIdentified(visitor) => call(&self.on_visitor_identified, visitor),
        }
    }
}

fn call_unit(hook: &UnitHook) {
    if let Some(f) = hook {
        f();
    }
}

fn call<T>(hook: &RefHook<T>, arg: &T) {
    if let Some(f) = hook {
        f(arg);
    }
}

fn call_str(hook: &StrHook, arg: &str) {
    if let Some(f) = hook {
        f(arg);
    }
}

impl fmt::Debug for WidgetHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetHooks")
            .field("on_ready", &self.on_ready.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}

/// Convenience: create a no-op sink.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
