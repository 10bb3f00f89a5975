//! Host page abstraction — the slice of the DOM and window the widget
//! touches: body/head insertion, element lookup by id, scroll locking, and
//! page-level event listeners.
//!
//! [`MemoryPage`] is a headless implementation used by tests and the demo
//! binary. A browser binding implements [`HostPage`] over the real document.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fluent_core::error::{WidgetError, WidgetResult};
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementTag {
    Div,
    Style,
}

/// An element the widget inserts into the host document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub id: String,
    pub tag: ElementTag,
    pub classes: Vec<String>,
    pub text: Option<String>,
}

impl Element {
    pub fn div(id: impl Into<String>, classes: Vec<String>) -> Self {
        Self {
            id: id.into(),
            tag: ElementTag::Div,
            classes,
            text: None,
        }
    }

    pub fn style(id: impl Into<String>, css: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: ElementTag::Style,
            classes: Vec::new(),
            text: Some(css.into()),
        }
    }

    pub fn class_name(&self) -> String {
        self.classes.join(" ")
    }
}

/// Page-level events the widget subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// `DOMContentLoaded`.
    DomContentLoaded,
    /// `beforeunload`.
    BeforeUnload,
    /// `visibilitychange`, carrying whether the document is now visible.
    VisibilityChange { visible: bool },
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageEventKind {
    DomContentLoaded,
    BeforeUnload,
    VisibilityChange,
    Resize,
}

impl PageEvent {
    pub fn kind(&self) -> PageEventKind {
        match self {
            PageEvent::DomContentLoaded => PageEventKind::DomContentLoaded,
            PageEvent::BeforeUnload => PageEventKind::BeforeUnload,
            PageEvent::VisibilityChange { .. } => PageEventKind::VisibilityChange,
            PageEvent::Resize => PageEventKind::Resize,
        }
    }
}

pub type PageListener = Arc<dyn Fn(PageEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The host document and window as seen by the widget.
pub trait HostPage: Send + Sync {
    fn has_element(&self, id: &str) -> bool;
    /// Remove the element with `id` from wherever it lives. Returns whether
    /// anything was removed.
    fn remove_element(&self, id: &str) -> WidgetResult<bool>;
    fn append_to_body(&self, element: Element) -> WidgetResult<()>;
    fn append_to_head(&self, element: Element) -> WidgetResult<()>;
    /// Lock or unlock background scrolling (`body.style.overflow`).
    fn set_scroll_locked(&self, locked: bool);
    /// `document.readyState == "loading"`.
    fn is_loading(&self) -> bool;
    fn add_listener(&self, kind: PageEventKind, listener: PageListener) -> ListenerId;
    fn remove_listener(&self, id: ListenerId);
}

// ─── Headless page ──────────────────────────────────────────────────────

#[derive(Default)]
struct PageState {
    body: Vec<Element>,
    head: Vec<Element>,
    scroll_locked: bool,
    loading: bool,
    fail_appends: bool,
    listeners: Vec<(ListenerId, PageEventKind, PageListener)>,
}

/// In-memory document used headlessly and in tests.
#[derive(Default)]
pub struct MemoryPage {
    state: Mutex<PageState>,
    next_listener: AtomicU64,
    mutations: AtomicU64,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A page whose document is still being parsed.
    pub fn loading() -> Self {
        let page = Self::new();
        page.state.lock().loading = true;
        page
    }

    /// Finish parsing and fire `DOMContentLoaded`.
    pub fn finish_loading(&self) {
        self.state.lock().loading = false;
        self.dispatch(PageEvent::DomContentLoaded);
    }

    /// Make every subsequent append fail, emulating a hostile host page.
    pub fn fail_appends(&self, fail: bool) {
        self.state.lock().fail_appends = fail;
    }

    /// Deliver an event to every listener registered for its kind.
    pub fn dispatch(&self, event: PageEvent) {
        // Listeners run outside the lock so they can call back into the page.
        let listeners: Vec<PageListener> = self
            .state
            .lock()
            .listeners
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind())
            .map(|(_, _, l)| l.clone())
            .collect();
        debug!(event = ?event, listeners = listeners.len(), "dispatching page event");
        for listener in listeners {
            listener(event);
        }
    }

    pub fn element(&self, id: &str) -> Option<Element> {
        let state = self.state.lock();
        state
            .body
            .iter()
            .chain(state.head.iter())
            .find(|e| e.id == id)
            .cloned()
    }

    pub fn body_elements(&self) -> Vec<Element> {
        self.state.lock().body.clone()
    }

    pub fn head_elements(&self) -> Vec<Element> {
        self.state.lock().head.clone()
    }

    pub fn is_scroll_locked(&self) -> bool {
        self.state.lock().scroll_locked
    }

    pub fn listener_count(&self, kind: PageEventKind) -> usize {
        self.state
            .lock()
            .listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }

    /// Number of document mutations (inserts and removals) so far.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    fn mutated(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    fn append(&self, element: Element, to_head: bool) -> WidgetResult<()> {
        let mut state = self.state.lock();
        if state.fail_appends {
            return Err(WidgetError::Host(format!(
                "cannot append #{} to the document",
                element.id
            )));
        }
        if to_head {
            state.head.push(element);
        } else {
            state.body.push(element);
        }
        drop(state);
        self.mutated();
        Ok(())
    }
}

impl HostPage for MemoryPage {
    fn has_element(&self, id: &str) -> bool {
        self.element(id).is_some()
    }

    fn remove_element(&self, id: &str) -> WidgetResult<bool> {
        let mut state = self.state.lock();
        let before = state.body.len() + state.head.len();
        state.body.retain(|e| e.id != id);
        state.head.retain(|e| e.id != id);
        let removed = state.body.len() + state.head.len() < before;
        drop(state);
        if removed {
            self.mutated();
        }
        Ok(removed)
    }

    fn append_to_body(&self, element: Element) -> WidgetResult<()> {
        self.append(element, false)
    }

    fn append_to_head(&self, element: Element) -> WidgetResult<()> {
        self.append(element, true)
    }

    fn set_scroll_locked(&self, locked: bool) {
        self.state.lock().scroll_locked = locked;
    }

    fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    fn add_listener(&self, kind: PageEventKind, listener: PageListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.state.lock().listeners.push((id, kind, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.state.lock().listeners.retain(|(lid, _, _)| *lid != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_append_and_remove() {
        let page = MemoryPage::new();
        page.append_to_body(Element::div("root", vec!["a".into(), "b".into()]))
            .unwrap();
        page.append_to_head(Element::style("styles", "body {}")).unwrap();

        assert!(page.has_element("root"));
        assert!(page.has_element("styles"));
        assert_eq!(page.element("root").unwrap().class_name(), "a b");
        assert_eq!(page.mutation_count(), 2);

        assert!(page.remove_element("root").unwrap());
        assert!(!page.remove_element("root").unwrap());
        assert!(!page.has_element("root"));
        assert_eq!(page.mutation_count(), 3);
    }

    #[test]
    fn test_failing_appends() {
        let page = MemoryPage::new();
        page.fail_appends(true);
        let err = page.append_to_body(Element::div("root", vec![])).unwrap_err();
        assert!(matches!(err, WidgetError::Host(_)));
        assert!(!page.has_element("root"));
    }

    #[test]
    fn test_listeners_by_kind() {
        let page = MemoryPage::new();
        let resizes = Arc::new(AtomicUsize::new(0));
        let counter = resizes.clone();
        let id = page.add_listener(
            PageEventKind::Resize,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        page.dispatch(PageEvent::Resize);
        page.dispatch(PageEvent::BeforeUnload);
        assert_eq!(resizes.load(Ordering::SeqCst), 1);

        page.remove_listener(id);
        page.dispatch(PageEvent::Resize);
        assert_eq!(resizes.load(Ordering::SeqCst), 1);
        assert_eq!(page.listener_count(PageEventKind::Resize), 0);
    }

    #[test]
    fn test_loading_lifecycle() {
        let page = MemoryPage::loading();
        let loaded = Arc::new(AtomicUsize::new(0));
        let counter = loaded.clone();
        page.add_listener(
            PageEventKind::DomContentLoaded,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(page.is_loading());
        page.finish_loading();
        assert!(!page.is_loading());
        assert_eq!(loaded.load(Ordering::SeqCst), 1);
    }
}
