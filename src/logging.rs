// src/logging.rs

use log::debug;
use once_cell::sync::OnceCell;

static INIT: OnceCell<()> = OnceCell::new();

/// Installs `env_logger` with an `info` default, overridable through
/// `RUST_LOG`. Safe to call more than once; a logger installed by the host
/// process is left in place.
pub fn init() {
    INIT.get_or_init(|| {
        let installed =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .format_timestamp_micros()
                .try_init()
                .is_ok();
        if installed {
            debug!("logging: env_logger installed");
        }
    });
}
