//! Locating and loading the real implementation's shared library.

use std::os::raw::c_void;

use eyre::{eyre, Result, WrapErr};
use libloading::Library;
use tracing::{debug, info};

/// A source of real-implementation entry points.
///
/// Production code resolves against the dynamically loaded real library;
/// tests substitute a table of local functions. An absent symbol is not an
/// error - plenty of optional entry points legitimately do not exist in a
/// given implementation.
pub trait SymbolSource: Send + Sync {
    /// Resolves a symbol by name, or `None` if the source does not export it.
    fn resolve(&self, name: &str) -> Option<*mut c_void>;

    /// Human-readable description of where symbols come from.
    fn describe(&self) -> String;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "windows")] {
        const DEFAULT_SEARCH_LIST: &[&str] = &["OpenCL.dll"];
    } else if #[cfg(target_os = "macos")] {
        const DEFAULT_SEARCH_LIST: &[&str] = &[
            "/System/Library/Frameworks/OpenCL.framework/OpenCL",
            "libOpenCL.dylib",
        ];
    } else {
        const DEFAULT_SEARCH_LIST: &[&str] = &["libOpenCL.so.1", "libOpenCL.so"];
    }
}

/// The real implementation, kept loaded for the lifetime of the shim.
///
/// Unloading happens on drop; nothing is ever resolved from a closed
/// library because the dispatch table owns its `RealLibrary`.
pub struct RealLibrary {
    lib: Library,
    path: String,
}

impl RealLibrary {
    /// Opens the real implementation, preferring an explicitly supplied
    /// library name over the platform search list.
    pub fn open(explicit: Option<&str>) -> Result<Self> {
        if let Some(name) = explicit {
            return Self::open_one(name);
        }

        let mut last_err = None;
        for &name in DEFAULT_SEARCH_LIST {
            match Self::open_one(name) {
                Ok(lib) => return Ok(lib),
                Err(err) => {
                    debug!(library = name, %err, "candidate library not loadable");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| eyre!("empty library search list")))
    }

    fn open_one(name: &str) -> Result<Self> {
        // Safety: loading a shared library runs its initializers; the real
        // implementation is trusted the same way the application trusts it
        // when linked directly.
        let lib = unsafe { Library::new(name) }
            .wrap_err_with(|| format!("failed to load {name}"))?;
        info!(library = name, "loaded real implementation");
        Ok(Self {
            lib,
            path: name.to_string(),
        })
    }
}

impl SymbolSource for RealLibrary {
    fn resolve(&self, name: &str) -> Option<*mut c_void> {
        // Safety: the symbol is only ever transmuted to the function
        // pointer type declared for this exact name in `api`.
        let sym = unsafe { self.lib.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        let addr = *sym;
        if addr.is_null() {
            None
        } else {
            Some(addr)
        }
    }

    fn describe(&self) -> String {
        self.path.clone()
    }
}
