pub mod json_settings_store;
pub mod tracing_executor;

pub use json_settings_store::JsonFilterSettingsStore;
pub use tracing_executor::TracingExecutor;
