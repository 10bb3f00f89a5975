//! UI capability interface and the headless chat UI.
//!
//! The lifecycle manager talks to whatever it mounted only through
//! [`WidgetUi`]. Every method has a no-op default, so a partial UI compiles
//! and the manager never has to probe for optional methods.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fluent_core::config::WidgetConfig;
use fluent_core::error::{WidgetError, WidgetResult};
use fluent_core::event_bus::{EventSink, WidgetEvent};
use fluent_core::types::{FileAttachment, SendResult, SurveyFeedback};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::host::HostPage;
use crate::responder::{CannedResponder, Responder};
use crate::store::{ConversationStore, ReplyDelay};

/// Everything a UI tree receives when it is mounted.
pub struct MountContext {
    pub config: WidgetConfig,
    pub visitor_id: String,
    pub conversation_id: Option<String>,
    pub container_id: String,
    pub page: Arc<dyn HostPage>,
    /// Output channel back to the lifecycle manager and the host's hooks.
    pub events: Arc<dyn EventSink>,
}

/// Commands and queries a mounted UI tree answers.
#[async_trait]
pub trait WidgetUi: Send + Sync {
    fn open(&self) {}
    fn close(&self) {}
    fn toggle(&self) {}
    fn minimize(&self) {}

    async fn send_message(
        &self,
        _text: &str,
        _files: Vec<FileAttachment>,
    ) -> WidgetResult<SendResult> {
        Err(WidgetError::Ui("this UI cannot send messages".into()))
    }

    fn show_badge(&self, _count: u32) {}
    fn hide_badge(&self) {}
    fn show_survey(&self) {}
    fn hide_survey(&self) {}
    fn update_config(&self, _config: &WidgetConfig) {}

    fn is_open(&self) -> bool {
        false
    }

    fn is_minimized(&self) -> bool {
        false
    }

    fn handle_visibility_change(&self, _visible: bool) {}
    fn handle_resize(&self) {}

    /// Drop connections and timers. May be called more than once.
    fn cleanup(&self) {}

    /// Undo a `cleanup` that was not followed by `unmount`, e.g. when the
    /// page comes back from an aborted unload.
    fn resume(&self) {}

    fn unmount(&self) -> WidgetResult<()> {
        Ok(())
    }
}

/// Builds the UI tree inside the widget container.
pub trait UiMounter: Send + Sync {
    fn mount(&self, ctx: MountContext) -> WidgetResult<Arc<dyn WidgetUi>>;
}

// ─── Headless chat UI ───────────────────────────────────────────────────

struct ChatUiState {
    config: WidgetConfig,
    conversation_id: Option<String>,
    minimized: bool,
    badge: Option<u32>,
    survey_visible: bool,
    page_visible: bool,
    resizes: u64,
    mounted: bool,
}

/// The default UI: launcher/chat window state over a [`ConversationStore`].
pub struct ChatWidget {
    store: ConversationStore,
    state: Mutex<ChatUiState>,
    events: Arc<dyn EventSink>,
    visitor_id: String,
    auto_open: Mutex<Option<JoinHandle<()>>>,
}

impl ChatWidget {
    pub fn new(ctx: MountContext, store: ConversationStore) -> Arc<Self> {
        let auto_open = ctx.config.auto_open;
        let delay = Duration::from_millis(ctx.config.auto_open_delay);
        let widget = Arc::new(Self {
            store,
            state: Mutex::new(ChatUiState {
                config: ctx.config,
                conversation_id: ctx.conversation_id,
                minimized: false,
                badge: None,
                survey_visible: false,
                page_visible: true,
                resizes: 0,
                mounted: true,
            }),
            events: ctx.events,
            visitor_id: ctx.visitor_id,
            auto_open: Mutex::new(None),
        });
        if auto_open {
            widget.schedule_auto_open(delay);
        }
        widget
    }

    fn schedule_auto_open(self: &Arc<Self>, delay: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime, auto-open skipped");
            return;
        };
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(widget) = weak.upgrade() {
                if widget.state.lock().mounted && !widget.is_open() {
                    debug!("auto-opening widget");
                    widget.open();
                }
            }
        });
        *self.auto_open.lock() = Some(handle);
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.state.lock().conversation_id.clone()
    }

    pub fn badge_count(&self) -> Option<u32> {
        self.state.lock().badge
    }

    pub fn is_survey_visible(&self) -> bool {
        self.state.lock().survey_visible
    }

    pub fn is_page_visible(&self) -> bool {
        self.state.lock().page_visible
    }

    pub fn config(&self) -> WidgetConfig {
        self.state.lock().config.clone()
    }

    /// The visitor pressed "new conversation".
    pub fn clear_conversation(&self) {
        self.store.clear_messages();
        let ended = self.state.lock().conversation_id.take();
        if let Some(id) = ended {
            info!(conversation_id = %id, "conversation ended");
            self.events.emit(WidgetEvent::ConversationEnded(id));
        }
    }

    /// The visitor submitted the satisfaction survey.
    pub fn submit_survey(
        &self,
        rating: Option<u8>,
        comment: Option<String>,
    ) -> WidgetResult<SurveyFeedback> {
        let conversation_id = {
            let mut state = self.state.lock();
            let id = state
                .conversation_id
                .clone()
                .ok_or_else(|| WidgetError::Ui("no conversation to rate".into()))?;
            state.survey_visible = false;
            id
        };
        let feedback = SurveyFeedback {
            rating,
            comment,
            categories: Vec::new(),
            conversation_id,
            visitor_id: self.visitor_id.clone(),
            submitted_at: Utc::now(),
        };
        self.events
            .emit(WidgetEvent::SurveySubmitted(feedback.clone()));
        Ok(feedback)
    }

    fn ensure_conversation(&self) -> String {
        let mut state = self.state.lock();
        if let Some(id) = &state.conversation_id {
            return id.clone();
        }
        let id = format!("conv_{}", Uuid::new_v4().simple());
        state.conversation_id = Some(id.clone());
        drop(state);
        info!(conversation_id = %id, "conversation started");
        self.events.emit(WidgetEvent::ConversationStarted(id.clone()));
        id
    }
}

/// Check attachments against the upload settings.
pub fn validate_attachments(config: &WidgetConfig, files: &[FileAttachment]) -> Result<(), String> {
    if files.is_empty() {
        return Ok(());
    }
    if !config.enable_file_upload {
        return Err("File upload is disabled".into());
    }
    if files.len() > config.max_files_per_message as usize {
        return Err(format!(
            "Too many files: {} (max {})",
            files.len(),
            config.max_files_per_message
        ));
    }
    for file in files {
        if file.size > config.max_file_size {
            return Err(format!(
                "{} exceeds the maximum file size of {} bytes",
                file.name, config.max_file_size
            ));
        }
        if !is_allowed_type(&config.allowed_file_types, file) {
            return Err(format!("{} has a file type that is not allowed", file.name));
        }
    }
    Ok(())
}

/// `image/*` style MIME wildcards, exact MIME types, or `.ext` suffixes.
fn is_allowed_type(allowed: &[String], file: &FileAttachment) -> bool {
    let mime = file.mime_type.to_ascii_lowercase();
    let ext = file.extension();
    allowed.iter().any(|rule| {
        let rule = rule.trim().to_ascii_lowercase();
        if let Some(prefix) = rule.strip_suffix("/*") {
            mime.split('/').next() == Some(prefix)
        } else if rule.starts_with('.') {
            ext.as_deref() == Some(rule.as_str())
        } else {
            mime == rule
        }
    })
}

#[async_trait]
impl WidgetUi for ChatWidget {
    fn open(&self) {
        self.store.open_fullscreen();
        {
            let mut state = self.state.lock();
            state.minimized = false;
            state.badge = None;
        }
        self.events.emit(WidgetEvent::Opened);
    }

    fn close(&self) {
        self.store.close_fullscreen();
        let minimize = {
            let mut state = self.state.lock();
            if state.config.minimize_on_close {
                state.minimized = true;
            }
            state.config.minimize_on_close
        };
        self.events.emit(WidgetEvent::Closed);
        if minimize {
            self.events.emit(WidgetEvent::Minimized);
        }
    }

    fn toggle(&self) {
        if self.is_open() {
            self.close();
        } else {
            self.open();
        }
    }

    fn minimize(&self) {
        self.store.close_fullscreen();
        self.state.lock().minimized = true;
        self.events.emit(WidgetEvent::Minimized);
    }

    async fn send_message(&self, text: &str, files: Vec<FileAttachment>) -> WidgetResult<SendResult> {
        if text.trim().is_empty() {
            return Ok(SendResult::rejected("Message is empty"));
        }
        let config = self.state.lock().config.clone();
        if let Err(reason) = validate_attachments(&config, &files) {
            debug!(reason = %reason, "attachments rejected");
            return Ok(SendResult::rejected(reason));
        }

        // The conversation only starts once the store has taken the message
        let Some(message) = self.store.send_message(text) else {
            return Ok(SendResult::rejected("Conversation is closed"));
        };
        let conversation_id = self.ensure_conversation();
        if !files.is_empty() {
            self.events.emit(WidgetEvent::FileUpload(files));
        }
        Ok(SendResult::sent(message.id, Some(conversation_id)))
    }

    fn show_badge(&self, count: u32) {
        self.state.lock().badge = Some(count);
    }

    fn hide_badge(&self) {
        self.state.lock().badge = None;
    }

    fn show_survey(&self) {
        let mut state = self.state.lock();
        if !state.config.enable_satisfaction_survey {
            debug!("satisfaction survey disabled, not showing");
            return;
        }
        state.survey_visible = true;
    }

    fn hide_survey(&self) {
        self.state.lock().survey_visible = false;
    }

    fn update_config(&self, config: &WidgetConfig) {
        self.state.lock().config = config.clone();
    }

    fn is_open(&self) -> bool {
        self.store.is_open()
    }

    fn is_minimized(&self) -> bool {
        self.state.lock().minimized
    }

    fn handle_visibility_change(&self, visible: bool) {
        self.state.lock().page_visible = visible;
        debug!(visible, "page visibility changed");
    }

    fn handle_resize(&self) {
        self.state.lock().resizes += 1;
    }

    fn cleanup(&self) {
        if let Some(handle) = self.auto_open.lock().take() {
            handle.abort();
        }
        self.store.shutdown();
    }

    fn resume(&self) {
        if self.state.lock().mounted {
            self.store.resume();
        }
    }

    fn unmount(&self) -> WidgetResult<()> {
        self.cleanup();
        self.state.lock().mounted = false;
        Ok(())
    }
}

/// Mounts a [`ChatWidget`] backed by a responder.
pub struct ChatWidgetMounter {
    responder: Arc<dyn Responder>,
    reply_delay: ReplyDelay,
}

impl ChatWidgetMounter {
    pub fn new(responder: Arc<dyn Responder>) -> Self {
        Self {
            responder,
            reply_delay: ReplyDelay::default(),
        }
    }

    pub fn with_reply_delay(mut self, delay: ReplyDelay) -> Self {
        self.reply_delay = delay;
        self
    }
}

impl Default for ChatWidgetMounter {
    fn default() -> Self {
        Self::new(Arc::new(CannedResponder::new()))
    }
}

impl UiMounter for ChatWidgetMounter {
    fn mount(&self, ctx: MountContext) -> WidgetResult<Arc<dyn WidgetUi>> {
        let store = ConversationStore::new(self.responder.clone(), ctx.page.clone(), ctx.events.clone())
            .with_reply_delay(self.reply_delay.clone());
        debug!(container = %ctx.container_id, visitor_id = %ctx.visitor_id, "mounting chat UI");
        Ok(ChatWidget::new(ctx, store))
    }
}
