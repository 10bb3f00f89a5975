//! Embeddable chat widget runtime — lifecycle, host-page integration and the
//! host-facing command surface.
//!
//! # Modules
//!
//! - [`facade`] — Single-instance façade with declarative auto-init
//! - [`lifecycle`] — Widget instance state machine and page wiring
//! - [`ui`] — UI capability trait and the headless chat UI
//! - [`store`] — Conversation state with cancellable delayed replies
//! - [`responder`] — Pluggable reply strategies
//! - [`visitor`] — Durable visitor identity
//! - [`host`] — Host page abstraction and its in-memory implementation
//! - [`styles`] — Container classes and the injected stylesheet

pub mod facade;
pub mod host;
pub mod lifecycle;
pub mod responder;
pub mod store;
pub mod styles;
pub mod ui;
pub mod visitor;

pub use facade::{FluentWidget, DEFAULT_AUTO_INIT_DELAY, VERSION};
pub use host::{HostPage, MemoryPage, PageEvent};
pub use lifecycle::{LifecycleState, WidgetEnvironment, WidgetInstance};
pub use responder::{CannedResponder, Responder};
pub use store::{ConversationStore, ReplyDelay};
pub use ui::{ChatWidget, ChatWidgetMounter, MountContext, UiMounter, WidgetUi};
pub use visitor::{FileStorage, MemoryStorage, VisitorStorage};
