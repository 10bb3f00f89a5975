//! Shared data model for the Fluent chat widget: host configuration and its
//! resolver, the error taxonomy, chat types, and the event sink through which
//! the widget calls back into the host page.

pub mod config;
pub mod error;
pub mod event_bus;
pub mod settings;
pub mod types;

pub use config::{resolve, PartialWidgetConfig, WidgetConfig};
pub use error::{WidgetError, WidgetErrorInfo, WidgetResult};
pub use event_bus::{EventSink, WidgetEvent, WidgetHooks};
pub use settings::RuntimeSettings;
