//! Host-facing façade.
//!
//! [`FluentWidget`] is the one object a host page talks to. It keeps at most
//! one active [`WidgetInstance`], replacing it on every `init`, proxies the
//! command and query surface to it, and can auto-initialize from a
//! declarative configuration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fluent_core::config::{PartialWidgetConfig, WidgetConfig};
use fluent_core::error::{WidgetError, WidgetResult};
use fluent_core::types::{FileAttachment, SendResult};
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, error, info, warn};

use crate::host::{ListenerId, PageEventKind};
use crate::lifecycle::{WidgetEnvironment, WidgetInstance};

/// Crate version reported by [`FluentWidget::version`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Delay before the timer-based auto-init check.
pub const DEFAULT_AUTO_INIT_DELAY: Duration = Duration::from_millis(100);

pub struct FluentWidget {
    env: WidgetEnvironment,
    active: Mutex<Option<WidgetInstance>>,
    /// Serializes `init` so two callers never interleave teardown and build.
    init_guard: ReentrantMutex<()>,
    auto_init_armed: AtomicBool,
    auto_init_fired: AtomicBool,
    auto_init_listener: Mutex<Option<ListenerId>>,
}

impl FluentWidget {
    pub fn new(env: WidgetEnvironment) -> Self {
        Self {
            env,
            active: Mutex::new(None),
            init_guard: ReentrantMutex::new(()),
            auto_init_armed: AtomicBool::new(false),
            auto_init_fired: AtomicBool::new(false),
            auto_init_listener: Mutex::new(None),
        }
    }

    pub fn headless() -> Self {
        Self::new(WidgetEnvironment::headless())
    }

    pub fn environment(&self) -> &WidgetEnvironment {
        &self.env
    }

    /// Destroy the active instance, if any, then build, initialize and
    /// publish a new one.
    ///
    /// On failure nothing is published and the partially built instance is
    /// destroyed.
    pub fn init(&self, config: PartialWidgetConfig) -> WidgetResult<WidgetInstance> {
        let _guard = self.init_guard.lock();

        let previous = self.active.lock().take();
        if let Some(previous) = previous {
            info!(instance = %previous.instance_id(), "Destroying previous widget instance");
            previous.destroy();
        }

        let instance = WidgetInstance::new(config, &self.env)?;
        if let Err(e) = instance.init() {
            instance.destroy();
            return Err(e);
        }

        let displaced = self.active.lock().replace(instance.clone());
        if let Some(displaced) = displaced {
            warn!(instance = %displaced.instance_id(), "Replacing widget initialized during init");
            displaced.destroy();
        }
        Ok(instance)
    }

    fn with_active<R>(&self, f: impl FnOnce(&WidgetInstance) -> R) -> Option<R> {
        let instance = self.active.lock().clone();
        instance.as_ref().map(f)
    }

    // ─── Commands ───────────────────────────────────────────────────────

    pub fn open(&self) {
        if self.with_active(|w| w.open()).is_none() {
            warn!("Widget not initialized. Call FluentWidget::init() first");
        }
    }

    pub fn close(&self) {
        self.with_active(|w| w.close());
    }

    pub fn toggle(&self) {
        self.with_active(|w| w.toggle());
    }

    pub fn minimize(&self) {
        self.with_active(|w| w.minimize());
    }

    pub fn show_badge(&self, count: Option<u32>) {
        self.with_active(|w| w.show_badge(count));
    }

    pub fn hide_badge(&self) {
        self.with_active(|w| w.hide_badge());
    }

    pub fn show_survey(&self) {
        self.with_active(|w| w.show_survey());
    }

    pub fn hide_survey(&self) {
        self.with_active(|w| w.hide_survey());
    }

    pub fn update_config(&self, update: PartialWidgetConfig) {
        self.with_active(|w| w.update_config(update));
    }

    pub async fn send_message(
        &self,
        text: &str,
        files: Vec<FileAttachment>,
    ) -> WidgetResult<SendResult> {
        let instance = self.instance().ok_or(WidgetError::NotInitialized)?;
        instance.send_message(text, files).await
    }

    pub fn destroy(&self) {
        let instance = self.active.lock().take();
        match instance {
            Some(instance) => instance.destroy(),
            None => debug!("no active widget to destroy"),
        }
    }

    // ─── Queries ────────────────────────────────────────────────────────

    pub fn is_open(&self) -> bool {
        self.with_active(|w| w.is_open()).unwrap_or(false)
    }

    pub fn is_minimized(&self) -> bool {
        self.with_active(|w| w.is_minimized()).unwrap_or(false)
    }

    pub fn visitor_id(&self) -> Option<String> {
        self.with_active(|w| w.visitor_id().to_string())
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.with_active(|w| w.conversation_id()).flatten()
    }

    pub fn config(&self) -> Option<WidgetConfig> {
        self.with_active(|w| w.config())
    }

    pub fn instance(&self) -> Option<WidgetInstance> {
        self.active.lock().clone()
    }

    pub fn version(&self) -> &'static str {
        VERSION
    }

    // ─── Auto-init ──────────────────────────────────────────────────────

    /// Initialize from a declarative configuration once the page is ready.
    ///
    /// Two triggers are armed: a timer after `delay`, and `DOMContentLoaded`
    /// when the page is still loading. A one-shot latch lets only the first
    /// trigger through, and it does nothing if an instance already exists.
    pub fn arm_auto_init(self: &Arc<Self>, declared: Option<PartialWidgetConfig>, delay: Duration) {
        let Some(config) = declared else {
            debug!("no declarative configuration, auto-init not armed");
            return;
        };
        if self.auto_init_armed.swap(true, Ordering::SeqCst) {
            warn!("Auto-init already armed");
            return;
        }

        let page = self.env.page.clone();
        if page.is_loading() {
            let weak = Arc::downgrade(self);
            let declared = config.clone();
            let id = page.add_listener(
                PageEventKind::DomContentLoaded,
                Arc::new(move |_| {
                    if let Some(widget) = weak.upgrade() {
                        widget.auto_init(declared.clone(), "dom-ready");
                    }
                }),
            );
            *self.auto_init_listener.lock() = Some(id);
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let weak = Arc::downgrade(self);
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(widget) = weak.upgrade() {
                        widget.auto_init(config, "timer");
                    }
                });
            }
            Err(_) if !page.is_loading() => self.auto_init(config, "immediate"),
            Err(_) => debug!("no async runtime, waiting for DOMContentLoaded"),
        }
    }

    fn auto_init(&self, config: PartialWidgetConfig, trigger: &'static str) {
        if self
            .auto_init_fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(trigger, "auto-init already ran");
            return;
        }
        if let Some(id) = self.auto_init_listener.lock().take() {
            self.env.page.remove_listener(id);
        }
        if self.active.lock().is_some() {
            info!(trigger, "Widget already initialized, skipping auto-init");
            return;
        }
        match self.init(config) {
            Ok(widget) => info!(trigger, visitor_id = %widget.visitor_id(), "Widget auto-initialized"),
            Err(e) => error!(trigger, error = %e, "Auto-initialization failed"),
        }
    }
}

impl Default for FluentWidget {
    fn default() -> Self {
        Self::headless()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostPage, MemoryPage};
    use crate::styles::{ROOT_ID, STYLES_ID};
    use crate::ui::ChatWidgetMounter;
    use crate::visitor::MemoryStorage;
    use crate::lifecycle::LifecycleState;
    use fluent_core::event_bus::{capture_sink, EventKind};
    use tracing_test::traced_test;

    fn widget_on(page: Arc<MemoryPage>) -> Arc<FluentWidget> {
        Arc::new(FluentWidget::new(WidgetEnvironment::new(
            page,
            Arc::new(MemoryStorage::new()),
            Arc::new(ChatWidgetMounter::default()),
        )))
    }

    fn config() -> PartialWidgetConfig {
        PartialWidgetConfig::with_api_key("1234567890")
    }

    #[test]
    fn test_init_replaces_previous_instance() {
        let page = Arc::new(MemoryPage::new());
        let widget = widget_on(page.clone());

        let first = widget.init(config()).unwrap();
        let second = widget.init(config()).unwrap();

        assert_eq!(first.state(), LifecycleState::Destroyed);
        assert!(second.is_ready());
        assert!(widget.instance().unwrap().same_as(&second));
        assert_eq!(first.visitor_id(), second.visitor_id());
        assert_eq!(page.body_elements().iter().filter(|e| e.id == ROOT_ID).count(), 1);
        assert_eq!(page.head_elements().iter().filter(|e| e.id == STYLES_ID).count(), 1);
    }

    #[test]
    fn test_failed_init_publishes_nothing() {
        let page = Arc::new(MemoryPage::new());
        let widget = widget_on(page.clone());
        widget.init(config()).unwrap();

        let err = widget.init(PartialWidgetConfig::with_api_key("short")).unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
        assert!(widget.instance().is_none());
        assert!(!page.has_element(ROOT_ID));

        page.fail_appends(true);
        assert!(matches!(widget.init(config()), Err(WidgetError::Host(_))));
        assert!(widget.instance().is_none());
    }

    #[test]
    #[traced_test]
    fn test_commands_without_instance() {
        let widget = widget_on(Arc::new(MemoryPage::new()));
        widget.close();
        widget.show_badge(Some(2));
        widget.destroy();
        assert!(!logs_contain("Widget not initialized"));

        widget.open();
        assert!(logs_contain("Widget not initialized"));
        assert!(!widget.is_open());
        assert!(widget.visitor_id().is_none());
        assert!(widget.config().is_none());
    }

    #[tokio::test]
    async fn test_send_without_instance_is_rejected() {
        let widget = widget_on(Arc::new(MemoryPage::new()));
        let err = widget.send_message("hello", Vec::new()).await.unwrap_err();
        assert!(matches!(err, WidgetError::NotInitialized));
    }

    #[tokio::test(start_paused = true)]
    async fn test_proxies_to_active_instance() {
        let page = Arc::new(MemoryPage::new());
        let widget = widget_on(page.clone());
        widget.init(config()).unwrap();

        widget.toggle();
        assert!(widget.is_open());
        assert!(page.is_scroll_locked());
        widget.minimize();
        assert!(widget.is_minimized());

        let result = widget.send_message("hi there", Vec::new()).await.unwrap();
        assert!(result.success);
        assert_eq!(widget.conversation_id(), result.conversation_id);

        widget.destroy();
        assert!(widget.instance().is_none());
        assert!(!page.has_element(ROOT_ID));
        assert!(!page.is_scroll_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_init_on_timer() {
        let widget = widget_on(Arc::new(MemoryPage::new()));
        widget.arm_auto_init(Some(config()), DEFAULT_AUTO_INIT_DELAY);
        assert!(widget.instance().is_none());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(widget.instance().is_some_and(|w| w.is_ready()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_init_runs_once_with_both_triggers() {
        let page = Arc::new(MemoryPage::loading());
        let widget = widget_on(page.clone());
        let hooks = capture_sink();
        widget.arm_auto_init(Some(config().hooks(hooks.clone())), DEFAULT_AUTO_INIT_DELAY);
        assert_eq!(page.listener_count(PageEventKind::DomContentLoaded), 1);

        page.finish_loading();
        let first = widget.instance().unwrap();
        assert_eq!(page.listener_count(PageEventKind::DomContentLoaded), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(widget.instance().unwrap().same_as(&first));
        assert_eq!(hooks.count_kind(EventKind::Ready), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_init_skips_existing_instance() {
        let widget = widget_on(Arc::new(MemoryPage::new()));
        let manual = widget.init(config()).unwrap();
        widget.arm_auto_init(Some(config()), DEFAULT_AUTO_INIT_DELAY);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(widget.instance().unwrap().same_as(&manual));
    }

    #[test]
    #[traced_test]
    fn test_auto_init_arming_rules() {
        let widget = widget_on(Arc::new(MemoryPage::new()));
        widget.arm_auto_init(None, DEFAULT_AUTO_INIT_DELAY);
        assert!(widget.instance().is_none());

        // No runtime and the page is parsed: initializes immediately
        widget.arm_auto_init(Some(config()), DEFAULT_AUTO_INIT_DELAY);
        assert!(widget.instance().is_some());

        widget.arm_auto_init(Some(config()), DEFAULT_AUTO_INIT_DELAY);
        assert!(logs_contain("Auto-init already armed"));
    }

    #[test]
    #[traced_test]
    fn test_auto_init_failure_is_logged() {
        let widget = widget_on(Arc::new(MemoryPage::new()));
        widget.arm_auto_init(
            Some(PartialWidgetConfig::with_api_key("nope")),
            DEFAULT_AUTO_INIT_DELAY,
        );
        assert!(widget.instance().is_none());
        assert!(logs_contain("Auto-initialization failed"));
    }

    #[test]
    fn test_version() {
        assert_eq!(FluentWidget::headless().version(), env!("CARGO_PKG_VERSION"));
    }
}
