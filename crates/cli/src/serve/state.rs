//! Application state.

use smehub_core::LifecycleCoordinator;

/// Application state shared across request handlers.
///
/// Read-only after startup; per-report state lives in the store.
pub(crate) struct AppState {
    pub(crate) coordinator: LifecycleCoordinator,
    /// Whether a store backend was established at process start.
    pub(crate) store_connected: bool,
}

impl AppState {
    pub(crate) fn new(coordinator: LifecycleCoordinator) -> Self {
        let store_connected = coordinator.store_connected();
        Self {
            coordinator,
            store_connected,
        }
    }
}
