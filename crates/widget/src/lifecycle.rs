//! Widget lifecycle manager.
//!
//! A [`WidgetInstance`] owns the container element, the injected style block,
//! the mounted UI and the page listeners, and moves through
//! `Uninitialized → Initializing → Ready → Destroyed`. Commands are accepted
//! only in `Ready`; `destroy` works from any state and never fails.

use std::sync::{Arc, Weak};

use fluent_core::config::{resolve, PartialWidgetConfig, WidgetConfig};
use fluent_core::error::{WidgetError, WidgetResult};
use fluent_core::event_bus::{EventSink, WidgetEvent};
use fluent_core::types::{FileAttachment, SendResult, VisitorInfo};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::host::{Element, HostPage, ListenerId, MemoryPage, PageEvent, PageEventKind};
use crate::styles::{container_classes, stylesheet, ROOT_ID, STYLES_ID};
use crate::ui::{ChatWidgetMounter, MountContext, UiMounter, WidgetUi};
use crate::visitor::{get_or_create_visitor_id, MemoryStorage, VisitorStorage};

/// Default badge count when `show_badge` is called without one.
pub const DEFAULT_BADGE_COUNT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    Destroyed,
}

/// Collaborators an instance is built against.
#[derive(Clone)]
pub struct WidgetEnvironment {
    pub page: Arc<dyn HostPage>,
    pub storage: Arc<dyn VisitorStorage>,
    pub mounter: Arc<dyn UiMounter>,
}

impl WidgetEnvironment {
    pub fn new(
        page: Arc<dyn HostPage>,
        storage: Arc<dyn VisitorStorage>,
        mounter: Arc<dyn UiMounter>,
    ) -> Self {
        Self {
            page,
            storage,
            mounter,
        }
    }

    /// In-memory page and storage with the default chat UI.
    pub fn headless() -> Self {
        Self::new(
            Arc::new(MemoryPage::new()),
            Arc::new(MemoryStorage::new()),
            Arc::new(ChatWidgetMounter::default()),
        )
    }
}

struct InstanceState {
    lifecycle: LifecycleState,
    config: WidgetConfig,
    conversation_id: Option<String>,
    ui: Option<Arc<dyn WidgetUi>>,
    listeners: Vec<ListenerId>,
    /// Whether this instance inserted the container into the page.
    attached: bool,
    /// Set when the last `init` failed; the next `init` builds again.
    init_failed: bool,
    /// The UI was cleaned up for a page unload that has not happened yet.
    suspended: bool,
}

struct InstanceInner {
    id: Uuid,
    visitor_id: String,
    page: Arc<dyn HostPage>,
    mounter: Arc<dyn UiMounter>,
    state: Mutex<InstanceState>,
}

impl InstanceInner {
    fn ready_ui(&self) -> Option<Arc<dyn WidgetUi>> {
        let state = self.state.lock();
        match state.lifecycle {
            LifecycleState::Ready => state.ui.clone(),
            _ => None,
        }
    }

    /// The Ready UI for a command, resumed first if an unload suspended it.
    fn active_ui(&self) -> Option<Arc<dyn WidgetUi>> {
        let (ui, resume) = {
            let mut state = self.state.lock();
            if state.lifecycle != LifecycleState::Ready {
                return None;
            }
            (state.ui.clone(), std::mem::take(&mut state.suspended))
        };
        if let (Some(ui), true) = (&ui, resume) {
            info!(instance = %self.id, "Widget resumed after page unload was abandoned");
            ui.resume();
        }
        ui
    }

    fn config(&self) -> WidgetConfig {
        self.state.lock().config.clone()
    }
}

/// Output channel handed to the mounted UI. Records conversation ids and
/// forwards everything to the hooks of the current configuration. Once the
/// instance is destroyed (or dropped) events are discarded.
struct InstanceSink {
    inner: Weak<InstanceInner>,
}

impl EventSink for InstanceSink {
    fn emit(&self, event: WidgetEvent) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let hooks = {
            let mut state = inner.state.lock();
            if state.lifecycle == LifecycleState::Destroyed {
                debug!(event = ?event.kind(), "dropping event from destroyed widget");
                return;
            }
            match &event {
                WidgetEvent::ConversationStarted(id) => state.conversation_id = Some(id.clone()),
                WidgetEvent::ConversationEnded(_) => state.conversation_id = None,
                _ => {}
            }
            state.config.hooks.clone()
        };
        hooks.emit(event);
    }
}

/// One widget on one page. Clones share the same instance.
#[derive(Clone)]
pub struct WidgetInstance {
    inner: Arc<InstanceInner>,
}

impl WidgetInstance {
    /// Resolve the configuration and the visitor identity. Fails only on an
    /// invalid `apiKey`.
    pub fn new(partial: PartialWidgetConfig, env: &WidgetEnvironment) -> WidgetResult<Self> {
        let config = resolve(partial)?;
        let visitor_id = get_or_create_visitor_id(env.storage.as_ref());
        let id = Uuid::new_v4();
        debug!(instance = %id, visitor_id = %visitor_id, "widget instance created");

        Ok(Self {
            inner: Arc::new(InstanceInner {
                id,
                visitor_id,
                page: env.page.clone(),
                mounter: env.mounter.clone(),
                state: Mutex::new(InstanceState {
                    lifecycle: LifecycleState::Uninitialized,
                    config,
                    conversation_id: None,
                    ui: None,
                    listeners: Vec::new(),
                    attached: false,
                    init_failed: false,
                    suspended: false,
                }),
            }),
        })
    }

    /// Build the container, inject styles, mount the UI and wire page
    /// listeners. A failure is logged, reported to the error hook and
    /// returned; nothing is rolled back, and calling `init` again retries
    /// the build over whatever the failed attempt left on the page.
    pub fn init(&self) -> WidgetResult<()> {
        {
            let mut state = self.inner.state.lock();
            match state.lifecycle {
                LifecycleState::Uninitialized => state.lifecycle = LifecycleState::Initializing,
                LifecycleState::Ready => {
                    warn!(instance = %self.inner.id, "Widget already initialized");
                    return Ok(());
                }
                LifecycleState::Initializing if state.init_failed => {
                    info!(instance = %self.inner.id, "Retrying widget initialization");
                    state.init_failed = false;
                }
                LifecycleState::Initializing => {
                    return Err(WidgetError::Initialization(
                        "Widget initialization already in progress".into(),
                    ));
                }
                LifecycleState::Destroyed => {
                    return Err(WidgetError::Initialization(
                        "Widget has been destroyed".into(),
                    ));
                }
            }
        }

        if let Err(e) = self.mount() {
            self.inner.state.lock().init_failed = true;
            error!(instance = %self.inner.id, error = %e, "Failed to initialize widget");
            self.inner.config().emit(WidgetEvent::Error((&e).into()));
            return Err(e);
        }

        let config = {
            let mut state = self.inner.state.lock();
            state.lifecycle = LifecycleState::Ready;
            state.config.clone()
        };
        info!(
            instance = %self.inner.id,
            visitor_id = %self.inner.visitor_id,
            position = config.position.as_str(),
            theme = config.theme.as_str(),
            "Widget initialized"
        );
        config.emit(WidgetEvent::Ready);
        config.emit(WidgetEvent::VisitorIdentified(VisitorInfo::anonymous(
            self.inner.visitor_id.clone(),
        )));
        Ok(())
    }

    fn mount(&self) -> WidgetResult<()> {
        let page = &self.inner.page;
        let (config, conversation_id) = {
            let state = self.inner.state.lock();
            (state.config.clone(), state.conversation_id.clone())
        };

        if page.remove_element(ROOT_ID)? {
            debug!("removed stale widget container");
        }
        page.append_to_body(Element::div(ROOT_ID, container_classes(&config)))?;
        self.inner.state.lock().attached = true;

        if !page.has_element(STYLES_ID) {
            page.append_to_head(Element::style(STYLES_ID, stylesheet(&config)))?;
        }

        let events: Arc<dyn EventSink> = Arc::new(InstanceSink {
            inner: Arc::downgrade(&self.inner),
        });
        let ui = self.inner.mounter.mount(MountContext {
            config,
            visitor_id: self.inner.visitor_id.clone(),
            conversation_id,
            container_id: ROOT_ID.to_string(),
            page: page.clone(),
            events,
        })?;
        self.inner.state.lock().ui = Some(ui);

        let listeners = self.register_listeners();
        self.inner.state.lock().listeners = listeners;
        Ok(())
    }

    fn register_listeners(&self) -> Vec<ListenerId> {
        let page = &self.inner.page;

        let weak = Arc::downgrade(&self.inner);
        let unload = page.add_listener(
            PageEventKind::BeforeUnload,
            Arc::new(move |_| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if let Some(ui) = inner.ready_ui() {
                    inner.state.lock().suspended = true;
                    info!(instance = %inner.id, "Page unloading, widget suspended until next use");
                    ui.cleanup();
                }
            }),
        );

        let weak = Arc::downgrade(&self.inner);
        let visibility = page.add_listener(
            PageEventKind::VisibilityChange,
            Arc::new(move |event| {
                if let PageEvent::VisibilityChange { visible } = event {
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    let ui = if visible {
                        inner.active_ui()
                    } else {
                        inner.ready_ui()
                    };
                    if let Some(ui) = ui {
                        ui.handle_visibility_change(visible);
                    }
                }
            }),
        );

        let weak = Arc::downgrade(&self.inner);
        let resize = page.add_listener(
            PageEventKind::Resize,
            Arc::new(move |_| {
                if let Some(ui) = weak.upgrade().and_then(|inner| inner.ready_ui()) {
                    ui.handle_resize();
                }
            }),
        );

        vec![unload, visibility, resize]
    }

    // ─── Commands ───────────────────────────────────────────────────────

    fn command(&self, name: &'static str, f: impl FnOnce(&dyn WidgetUi)) {
        match self.inner.active_ui() {
            Some(ui) => f(ui.as_ref()),
            None => warn!(command = name, state = ?self.state(), "Widget not ready, ignoring command"),
        }
    }

    pub fn open(&self) {
        self.command("open", |ui| ui.open());
    }

    pub fn close(&self) {
        self.command("close", |ui| ui.close());
    }

    pub fn toggle(&self) {
        self.command("toggle", |ui| ui.toggle());
    }

    pub fn minimize(&self) {
        self.command("minimize", |ui| ui.minimize());
    }

    /// Show the unread badge; `None` shows [`DEFAULT_BADGE_COUNT`].
    pub fn show_badge(&self, count: Option<u32>) {
        let count = count.unwrap_or(DEFAULT_BADGE_COUNT);
        self.command("show_badge", |ui| ui.show_badge(count));
    }

    pub fn hide_badge(&self) {
        self.command("hide_badge", |ui| ui.hide_badge());
    }

    pub fn show_survey(&self) {
        self.command("show_survey", |ui| ui.show_survey());
    }

    pub fn hide_survey(&self) {
        self.command("hide_survey", |ui| ui.hide_survey());
    }

    /// Replace the active configuration with a shallow merge of the current
    /// one and `update`, then push it to the mounted UI.
    pub fn update_config(&self, update: PartialWidgetConfig) {
        let next = {
            let mut state = self.inner.state.lock();
            if state.lifecycle != LifecycleState::Ready {
                warn!(command = "update_config", state = ?state.lifecycle, "Widget not ready, ignoring command");
                return;
            }
            let next = state.config.merged(update);
            state.config = next.clone();
            next
        };
        if let Some(ui) = self.inner.active_ui() {
            ui.update_config(&next);
        }
        info!(instance = %self.inner.id, "Widget configuration updated");
    }

    pub async fn send_message(
        &self,
        text: &str,
        files: Vec<FileAttachment>,
    ) -> WidgetResult<SendResult> {
        let ui = self.inner.active_ui().ok_or_else(|| {
            WidgetError::Initialization("Widget not ready. Call init() first".into())
        })?;
        ui.send_message(text, files).await
    }

    /// Tear everything down. Safe to call in any state and more than once;
    /// failures are logged and skipped.
    pub fn destroy(&self) {
        let (ui, listeners, attached) = {
            let mut state = self.inner.state.lock();
            if state.lifecycle == LifecycleState::Destroyed {
                debug!(instance = %self.inner.id, "widget already destroyed");
                return;
            }
            state.lifecycle = LifecycleState::Destroyed;
            state.conversation_id = None;
            state.suspended = false;
            (
                state.ui.take(),
                std::mem::take(&mut state.listeners),
                std::mem::replace(&mut state.attached, false),
            )
        };

        let page = &self.inner.page;
        for id in listeners {
            page.remove_listener(id);
        }

        if let Some(ui) = ui {
            ui.cleanup();
            if let Err(e) = ui.unmount() {
                error!(instance = %self.inner.id, error = %e, "Failed to unmount widget UI");
            }
        }

        if attached {
            for id in [ROOT_ID, STYLES_ID] {
                if let Err(e) = page.remove_element(id) {
                    error!(instance = %self.inner.id, element = id, error = %e, "Failed to remove widget element");
                }
            }
        }

        info!(instance = %self.inner.id, "Widget destroyed");
    }

    // ─── Queries ────────────────────────────────────────────────────────

    pub fn is_open(&self) -> bool {
        self.inner.ready_ui().is_some_and(|ui| ui.is_open())
    }

    pub fn is_minimized(&self) -> bool {
        self.inner.ready_ui().is_some_and(|ui| ui.is_minimized())
    }

    pub fn visitor_id(&self) -> &str {
        &self.inner.visitor_id
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.inner.state.lock().conversation_id.clone()
    }

    /// A copy of the active configuration.
    pub fn config(&self) -> WidgetConfig {
        self.inner.state.lock().config.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state.lock().lifecycle
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Ready
    }

    pub fn instance_id(&self) -> Uuid {
        self.inner.id
    }

    /// Whether two handles refer to the same instance.
    pub fn same_as(&self, other: &WidgetInstance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for WidgetInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetInstance")
            .field("id", &self.inner.id)
            .field("visitor_id", &self.inner.visitor_id)
            .field("state", &self.state())
            .finish()
    }
}
