//! The Dispatcher, HTTP surface, configuration, and persisted state layout
//! binding every other crate into one running service (spec.md §4.1, §6).

pub mod auth;
pub mod collection_routes;
pub mod config;
pub mod dispatcher;
pub mod persisted;
pub mod security_config;
pub mod state;

pub use config::AppConfig;
pub use dispatcher::build_router;
pub use state::AppState;

/// Installs the `tracing` subscriber the whole workspace logs through,
/// honoring `RUST_LOG`/`DEPLOYD_LOG` and emitting JSON when `dev` is false
/// (spec.md §6 "dev ... enabling verbose diagnostics").
pub fn init_tracing(dev_mode: bool) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Registry};

    let filter = EnvFilter::try_from_env("DEPLOYD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(if dev_mode { "debug" } else { "info" }));

    if dev_mode {
        Registry::default()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    } else {
        Registry::default()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    }
}
