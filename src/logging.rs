use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global subscriber. `RUST_LOG` wins over `level`; an
/// unparseable `level` falls back to `info`.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
    if let Err(err) = result {
        eprintln!("logging already initialised: {err}");
    }
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("{level},tower_http=info")).unwrap_or_else(|err| {
        eprintln!("invalid log level {level}: {err}, defaulting to info");
        EnvFilter::new("info")
    })
}

