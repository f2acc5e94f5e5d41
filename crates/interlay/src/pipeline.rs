//! The per-call instrumentation pipeline.
//!
//! Every exported entry point is one thin instantiation of the same
//! sequence: look up the active instance (or fall back to dummy
//! forwarding), run any override, forward to the dispatch table, then let
//! the post-call hooks observe the result. Hooks never change what the
//! caller sees.

use std::cell::Cell;

use tracing::{debug, error};

use crate::api::{cl_int, Handle, CL_SUCCESS};
use crate::dispatch::DispatchTable;
use crate::instance::{self, Interlay};
use crate::objects::ObjectKind;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        use quanta::Instant;
    } else {
        use std::time::Instant;
    }
}

macro_rules! fn_ids {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Identity of an intercepted entry point.
        #[derive(Copy, Clone, PartialEq, Eq, Debug)]
        pub enum FnId {
            $($variant),+
        }

        impl FnId {
            pub const ALL: &'static [FnId] = &[$(FnId::$variant),+];
            pub const COUNT: usize = FnId::ALL.len();

            /// The exported C name of this entry point.
            pub fn name(self) -> &'static str {
                match self {
                    $(FnId::$variant => $name),+
                }
            }

            pub fn index(self) -> usize {
                self as usize
            }
        }
    };
}

fn_ids! {
    GetPlatformIDs => "clGetPlatformIDs",
    GetPlatformInfo => "clGetPlatformInfo",
    GetDeviceIDs => "clGetDeviceIDs",
    RetainDevice => "clRetainDevice",
    ReleaseDevice => "clReleaseDevice",
    CreateContext => "clCreateContext",
    RetainContext => "clRetainContext",
    ReleaseContext => "clReleaseContext",
    CreateCommandQueue => "clCreateCommandQueue",
    CreateCommandQueueWithProperties => "clCreateCommandQueueWithProperties",
    RetainCommandQueue => "clRetainCommandQueue",
    ReleaseCommandQueue => "clReleaseCommandQueue",
    GetCommandQueueInfo => "clGetCommandQueueInfo",
    CreateBuffer => "clCreateBuffer",
    RetainMemObject => "clRetainMemObject",
    ReleaseMemObject => "clReleaseMemObject",
    CreateSamplerWithProperties => "clCreateSamplerWithProperties",
    RetainSampler => "clRetainSampler",
    ReleaseSampler => "clReleaseSampler",
    CreateProgramWithSource => "clCreateProgramWithSource",
    BuildProgram => "clBuildProgram",
    RetainProgram => "clRetainProgram",
    ReleaseProgram => "clReleaseProgram",
    CreateKernel => "clCreateKernel",
    RetainKernel => "clRetainKernel",
    ReleaseKernel => "clReleaseKernel",
    EnqueueNDRangeKernel => "clEnqueueNDRangeKernel",
    EnqueueReadBuffer => "clEnqueueReadBuffer",
    EnqueueWriteBuffer => "clEnqueueWriteBuffer",
    RetainEvent => "clRetainEvent",
    ReleaseEvent => "clReleaseEvent",
    WaitForEvents => "clWaitForEvents",
    Flush => "clFlush",
    Finish => "clFinish",
    GetExtensionFunctionAddressForPlatform => "clGetExtensionFunctionAddressForPlatform",
    CreateCommandBufferKHR => "clCreateCommandBufferKHR",
    RetainCommandBufferKHR => "clRetainCommandBufferKHR",
    ReleaseCommandBufferKHR => "clReleaseCommandBufferKHR",
    FinalizeCommandBufferKHR => "clFinalizeCommandBufferKHR",
    EnqueueCommandBufferKHR => "clEnqueueCommandBufferKHR",
    CommandCopyBufferKHR => "clCommandCopyBufferKHR",
    CommandFillBufferKHR => "clCommandFillBufferKHR",
    CommandNDRangeKernelKHR => "clCommandNDRangeKernelKHR",
    CommandBarrierWithWaitListKHR => "clCommandBarrierWithWaitListKHR",
    CreateSemaphoreWithPropertiesKHR => "clCreateSemaphoreWithPropertiesKHR",
    RetainSemaphoreKHR => "clRetainSemaphoreKHR",
    ReleaseSemaphoreKHR => "clReleaseSemaphoreKHR",
}

/// Per-call pipeline state, alive for the duration of one intercepted call.
///
/// Dropping the guard completes the pipeline: call-log exit with whatever
/// return code was observed, plus the host-timing record if `check` never
/// ran (the timer normally stops at the observation point right after the
/// forwarded call returns, so hook work is not billed to the real call).
pub(crate) struct Call<'a> {
    intercept: &'a Interlay,
    id: FnId,
    start: Cell<Option<Instant>>,
    code: Cell<Option<cl_int>>,
}

impl<'a> Call<'a> {
    fn begin(intercept: &'a Interlay, id: FnId) -> Self {
        if intercept.config().call_logging {
            debug!(function = id.name(), "enter");
        }
        let start = intercept.config().host_timing.then(Instant::now);
        Self {
            intercept,
            id,
            start: Cell::new(start),
            code: Cell::new(None),
        }
    }

    pub fn intercept(&self) -> &Interlay {
        self.intercept
    }

    pub fn dispatch(&self) -> &DispatchTable {
        self.intercept.dispatch()
    }

    /// Emits call detail on the logging side channel. The closure only
    /// runs when call logging is enabled, so wrappers can format freely.
    pub fn log_info(&self, detail: impl FnOnce() -> String) {
        if self.intercept.config().call_logging {
            debug!(function = self.id.name(), "{}", detail());
        }
    }

    /// Observes a return code: stops the host timer and reports failures.
    /// The code itself passes through untouched.
    pub fn check(&self, code: cl_int) -> cl_int {
        self.stop_timer();
        self.code.set(Some(code));
        if code != CL_SUCCESS && self.intercept.config().error_logging {
            error!(function = self.id.name(), code, "call returned an error");
        }
        code
    }

    pub fn track_allocation(&self, kind: ObjectKind, handle: Handle) {
        if self.intercept.config().leak_checking {
            self.intercept.objects().record_allocation(kind, handle);
        }
    }

    pub fn track_retain(&self, kind: ObjectKind, handle: Handle) {
        if self.intercept.config().leak_checking {
            self.intercept.objects().record_retain(kind, handle);
        }
    }

    pub fn track_release(&self, kind: ObjectKind, handle: Handle) {
        if self.intercept.config().leak_checking {
            self.intercept.objects().record_release(kind, handle);
        }
    }

    fn stop_timer(&self) {
        if let Some(start) = self.start.take() {
            self.intercept
                .timing()
                .record(self.id, start.elapsed().as_nanos() as u64);
        }
    }
}

impl Drop for Call<'_> {
    fn drop(&mut self) {
        self.stop_timer();
        if self.intercept.config().call_logging {
            match self.code.get() {
                Some(code) => debug!(function = self.id.name(), code, "exit"),
                None => debug!(function = self.id.name(), "exit"),
            }
        }
    }
}

/// Runs one intercepted call: through the instrumentation pipeline when an
/// instance is active, through the dummy forwarding path otherwise.
pub(crate) fn intercepted<R>(
    id: FnId,
    fallback: impl FnOnce() -> R,
    body: impl FnOnce(&Call<'_>) -> R,
) -> R {
    match instance::current() {
        Some(intercept) => {
            let call = Call::begin(intercept.as_ref(), id);
            body(&call)
        }
        None => fallback(),
    }
}
