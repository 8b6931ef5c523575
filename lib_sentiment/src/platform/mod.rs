//! # Platform Capabilities
//!
//! Seams to collaborators that live outside the engine.
//!
//! - **`widgets`**: push target for the home-screen / lock-screen widget.
//! - **`session`**: the "has valid credentials" signal from the login flow.
//!
//! Both are chosen at startup and injected; nothing here depends on the
//! target platform at compile time.

pub mod session;
pub mod widgets;

pub use session::{SessionFlag, SessionGate};
pub use widgets::{LogWidgetSink, NoopWidgetSink, WidgetSink};
