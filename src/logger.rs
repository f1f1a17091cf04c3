use std::io::Write;

use chrono::Local;
use env_logger::Builder;
use log::LevelFilter;

/// Installs the process logger: `[LEVEL][time][target]: message`.
/// `debug` lowers the default level; `RUST_LOG` still takes precedence.
pub fn init(debug: bool) {
    let level = if debug { LevelFilter::Debug } else { LevelFilter::Info };

    let mut builder = Builder::new();
    builder
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}][{}][{}]: {}",
                record.level(),
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.target(),
                record.args()
            )
        });

    if builder.try_init().is_err() {
        log::warn!("logger already installed");
    }
}
