use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use env_logger::{Builder, Env, Target};

/// Level used when `RUST_LOG` is unset, by number of `-v` flags
fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize logging to stderr, or append to `log_file` when given.
///
/// `RUST_LOG` overrides the verbosity flags.
pub fn init_logging(verbosity: u8, log_file: Option<&Path>) {
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level(verbosity)));
    builder.format_timestamp_millis();

    if let Some(path) = log_file {
        // Create logs directory if it doesn't exist
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder
                    .format(|buf, record| {
                        writeln!(
                            buf,
                            "[{}] [{}] [{}] {}",
                            buf.timestamp_millis(),
                            record.level(),
                            record.target(),
                            record.args()
                        )
                    })
                    .target(Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Cannot open log file {}: {}; logging to stderr", path.display(), e),
        }
    }

    // A second init (tests) keeps the first logger
    let _ = builder.try_init();
    log::debug!("playsmf {} started", env!("CARGO_PKG_VERSION"));
}
