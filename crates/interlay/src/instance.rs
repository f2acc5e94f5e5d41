//! The process-wide interception instance and its lifecycle.
//!
//! The instance is constructed exactly once - either lazily on the first
//! intercepted call (the interposed-library case) or explicitly through
//! [`install`] (embedders and tests) - and reached through the narrow
//! [`current`] accessor. When construction fails, interception stays
//! disabled and every wrapper takes the dummy forwarding path instead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, OnceLock, RwLock};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use eyre::{eyre, Result};
use tracing::{debug, warn};

use crate::api::Handle;
use crate::cmdbuf::DependencyTracer;
use crate::config::Config;
use crate::dispatch::DispatchTable;
use crate::loader::{RealLibrary, SymbolSource};
use crate::objects::ObjectTracker;
use crate::report::{JsonReporter, Reporter, TableReporter};
use crate::timing::HostTiming;

/// One active interception of the real implementation.
pub struct Interlay {
    config: Config,
    dispatch: DispatchTable,
    objects: ObjectTracker,
    tracer: DependencyTracer,
    timing: HostTiming,
    // Rarely written: one entry per created kernel, far off the hot path.
    kernel_names: RwLock<HashMap<Handle, String>>,
    start: Instant,
    reported: AtomicBool,
}

impl Interlay {
    /// Builds an instance over an already-opened symbol source.
    pub fn with_source(config: Config, source: Box<dyn SymbolSource>) -> Result<Self> {
        let dispatch = DispatchTable::resolve(source)?;
        Ok(Self {
            config,
            dispatch,
            objects: ObjectTracker::new(),
            tracer: DependencyTracer::new(),
            timing: HostTiming::new(),
            kernel_names: RwLock::new(HashMap::new()),
            start: Instant::now(),
            reported: AtomicBool::new(false),
        })
    }

    /// Opens the real implementation per the environment configuration.
    pub fn from_env() -> Result<Self> {
        let config = Config::from_env();
        let library = RealLibrary::open(config.lib_name.as_deref())?;
        Self::with_source(config, Box::new(library))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    pub fn objects(&self) -> &ObjectTracker {
        &self.objects
    }

    pub fn tracer(&self) -> &DependencyTracer {
        &self.tracer
    }

    pub fn timing(&self) -> &HostTiming {
        &self.timing
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub(crate) fn remember_kernel_name(&self, kernel: Handle, name: &str) {
        if let Ok(mut names) = self.kernel_names.write() {
            names.insert(kernel, name.to_string());
        }
    }

    pub(crate) fn kernel_name(&self, kernel: Handle) -> Option<String> {
        self.kernel_names.read().ok()?.get(&kernel).cloned()
    }

    /// Persists a finalized recording's graph if a dump directory is
    /// configured. Best effort: I/O failures only produce a diagnostic.
    pub(crate) fn dump_trace(&self, cmdbuf: Handle, graph: &str) {
        let Some(dir) = &self.config.dump_dir else {
            debug!(cmdbuf = cmdbuf.raw(), "no dump directory, dropping trace");
            return;
        };
        if let Err(err) = std::fs::create_dir_all(dir) {
            warn!(%err, "could not create dump directory");
            return;
        }
        let path = dir.join(format!("cmdbuf_{:016x}.dot", cmdbuf.raw()));
        if let Err(err) = std::fs::write(&path, graph) {
            warn!(%err, path = %path.display(), "could not write trace");
        }
    }

    /// Writes the teardown report exactly once, no matter how many
    /// teardown paths fire.
    pub fn write_reports(&self) {
        if self.reported.swap(true, Ordering::SeqCst) {
            return;
        }
        let reporter: Box<dyn Reporter> = if self.config.json_report {
            Box::new(JsonReporter)
        } else {
            Box::new(TableReporter)
        };
        if let Err(err) = reporter.report(self) {
            eprintln!("interlay: failed to write teardown report: {err}");
        }
    }
}

static INSTANCE: OnceLock<ArcSwapOption<Interlay>> = OnceLock::new();
static BOOTSTRAP: Once = Once::new();

fn slot() -> &'static ArcSwapOption<Interlay> {
    INSTANCE.get_or_init(|| ArcSwapOption::from(None))
}

/// The active interception instance, if any. The first caller triggers
/// the one-shot environment bootstrap.
pub(crate) fn current() -> Option<Arc<Interlay>> {
    BOOTSTRAP.call_once(bootstrap);
    slot().load_full()
}

fn bootstrap() {
    init_tracing(&Config::from_env());
    match Interlay::from_env() {
        Ok(instance) => {
            slot().store(Some(Arc::new(instance)));
            // The interposed-library case has no guard to drop; report at
            // process exit instead.
            #[cfg(unix)]
            unsafe {
                libc::atexit(report_at_exit);
            }
        }
        Err(err) => {
            warn!(%err, "interception disabled, forwarding only");
        }
    }
}

#[cfg(unix)]
extern "C" fn report_at_exit() {
    if let Some(instance) = INSTANCE.get().and_then(|slot| slot.load_full()) {
        instance.write_reports();
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if config.call_logging {
        "interlay=debug"
    } else {
        "interlay=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Keeps an explicitly installed instance alive; dropping it tears the
/// instance down and writes the teardown report.
pub struct Guard {
    instance: Arc<Interlay>,
}

impl Guard {
    /// The installed instance, for inspection while interception runs.
    pub fn interlay(&self) -> &Interlay {
        &self.instance
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        shutdown();
    }
}

/// Activates an explicitly constructed instance. Fails if one is already
/// active; the no-instance fallback path is suppressed for the guard's
/// lifetime.
pub fn install(instance: Interlay) -> Result<Guard> {
    init_tracing(instance.config());
    // Mark the bootstrap as done so the environment path cannot race an
    // explicit installation.
    BOOTSTRAP.call_once(|| {});
    let slot = slot();
    if slot.load().is_some() {
        return Err(eyre!("an interception instance is already active"));
    }
    let instance = Arc::new(instance);
    slot.store(Some(Arc::clone(&instance)));
    Ok(Guard { instance })
}

/// Deactivates interception and writes the teardown report. In-flight
/// calls finish against the instance they already resolved; later calls
/// take the dummy forwarding path.
pub fn shutdown() {
    if let Some(instance) = slot().swap(None) {
        instance.write_reports();
    }
}
