//! Tracing subscriber setup
//!
//! JSON lines by default; `LOG_FORMAT=pretty` for a human-readable console.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "admin_auth_service=info,actix_middleware=info,info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let pretty = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("pretty"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if pretty {
        registry.with(fmt::layer().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    }
}
