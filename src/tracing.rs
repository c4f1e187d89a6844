//! Tracing initialization.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Initialize tracing. Safe to call multiple times.
///
/// `RUST_LOG` adds directives on top of the default level, which is DEBUG
/// under the test harness and INFO otherwise.
pub fn init(format: LogFormat) {
    let is_test = cfg!(test) || std::env::var_os("NEXTEST").is_some();
    install(format, is_test);
}

/// Initialize tracing for tests, capturing output through the test writer.
///
/// Integration tests call this from their fixtures; the library's own unit
/// tests are detected by [`init`].
pub fn init_test() {
    install(LogFormat::Compact, true);
}

fn install(format: LogFormat, is_test: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env().add_directive(
            if is_test {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            }
            .into(),
        );

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_target(true);

        if is_test {
            let _ = builder.compact().with_test_writer().try_init();
            return;
        }

        let result = match format {
            LogFormat::Compact => builder.compact().with_writer(std::io::stderr).try_init(),
            LogFormat::Json => builder
                .json()
                .flatten_event(true)
                .with_writer(std::io::stderr)
                .try_init(),
        };
        if let Err(e) = result {
            eprintln!("Failed to initialize tracing: {}", e);
        }
    });
}
