//! Runtime controls, read once from the environment at initialization.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit real-implementation library name or path (`INTERLAY_LIB`).
    pub lib_name: Option<String>,
    /// Log every intercepted call's entry and exit (`INTERLAY_CALL_LOGGING`).
    pub call_logging: bool,
    /// Log failing return codes (`INTERLAY_ERROR_LOGGING`).
    pub error_logging: bool,
    /// Count object allocations, retains and releases (`INTERLAY_LEAK_CHECKING`).
    pub leak_checking: bool,
    /// Record per-entry-point host timing (`INTERLAY_HOST_TIMING`).
    pub host_timing: bool,
    /// Trace command-buffer dependencies (`INTERLAY_CMDBUF_TRACING`).
    pub cmdbuf_tracing: bool,
    /// Directory for serialized dependency graphs (`INTERLAY_DUMP_DIR`).
    pub dump_dir: Option<PathBuf>,
    /// Emit the teardown report as JSON instead of text (`INTERLAY_JSON`).
    pub json_report: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lib_name: None,
            call_logging: false,
            error_logging: true,
            leak_checking: true,
            host_timing: false,
            cmdbuf_tracing: true,
            dump_dir: None,
            json_report: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            lib_name: std::env::var("INTERLAY_LIB").ok(),
            call_logging: env_flag("INTERLAY_CALL_LOGGING", defaults.call_logging),
            error_logging: env_flag("INTERLAY_ERROR_LOGGING", defaults.error_logging),
            leak_checking: env_flag("INTERLAY_LEAK_CHECKING", defaults.leak_checking),
            host_timing: env_flag("INTERLAY_HOST_TIMING", defaults.host_timing),
            cmdbuf_tracing: env_flag("INTERLAY_CMDBUF_TRACING", defaults.cmdbuf_tracing),
            dump_dir: std::env::var("INTERLAY_DUMP_DIR").ok().map(PathBuf::from),
            json_report: env_flag("INTERLAY_JSON", defaults.json_report),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(default)
}
