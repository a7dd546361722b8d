// Export modules for use in tests
pub mod api;
pub mod event_source;
pub mod loader;
pub mod main_app;
pub mod panic_handler;
pub mod preferences;
pub mod resolver;
pub mod router;
pub mod session;
pub mod settings;
pub mod theme;
pub mod widget;
// Test utilities - only available when test-utils feature is enabled or during tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main app components
pub use main_app::{App, AppAction, run_app_with_event_source};
pub use router::{Route, Screen};
