// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Tracing setup: env-filtered fmt output, compact by default, `LOG_FORMAT=pretty` for local runs.

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_DIRECTIVES: &str = "netdash=info,tower_http=info";

pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let pretty = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("pretty"))
        .unwrap_or(false);

    let builder = fmt::Subscriber::builder().with_env_filter(env_filter);
    let installed = if pretty {
        tracing::subscriber::set_global_default(builder.pretty().finish())
    } else {
        tracing::subscriber::set_global_default(builder.compact().with_target(false).finish())
    };

    if installed.is_err() {
        // Already installed; integration tests call this repeatedly.
    }
}
