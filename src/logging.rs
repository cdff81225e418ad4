use std::sync::Mutex;

use tracing_subscriber::{prelude::*, EnvFilter, Registry};

/// What we log when `RUST_LOG` doesn't say otherwise: our own info-level
/// messages plus one line per HTTP request from tower-http.
pub const DEFAULT_FILTER: &str = "trialtree=info,tower_http=info";

lazy_static! {
    static ref LOG_INITIALIZED: Mutex<bool> = Mutex::new(false);
}

/// Initialize logging.  If you set the environment variable `RUST_LOG` to a
/// non-empty value, it's interpreted as an `EnvFilter` directive; otherwise
/// `DEFAULT_FILTER` applies.  Safe to call more than once, which tests rely
/// on.
pub fn init_logging() {
    let mut initialized = match LOG_INITIALIZED.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if *initialized {
        return;
    }

    // We frequently end up with RUST_LOG set but empty from shell scripts,
    // and that shouldn't be read as "log nothing".
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(rustlog) if !rustlog.is_empty() => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        }
        _ => EnvFilter::new(DEFAULT_FILTER),
    };

    let layer = tracing_subscriber::fmt::layer()
        .compact()
        // Logs end up in files and journald, not terminals.
        .with_ansi(false)
        .without_time()
        // stdout belongs to trialtree-tool's JSON output.
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    // Somebody else (a test harness, say) may have installed a global
    // subscriber already, in which case theirs wins.
    let _ = Registry::default().with(layer).try_init();

    *initialized = true;
}
