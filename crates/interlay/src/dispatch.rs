//! The dispatch table: every intercepted identity mapped to its resolved
//! real-implementation entry point.
//!
//! Required identities are resolved exactly once, before interception is
//! enabled; the table is never written afterwards. Optional extension
//! identities resolve lazily on first use behind a per-slot compare-and-set.

use std::marker::PhantomData;
use std::mem;
use std::os::raw::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::OnceLock;

use eyre::{eyre, Result};

use crate::api::*;
use crate::loader::{RealLibrary, SymbolSource};

/// Marks a lazy slot whose symbol turned out to be absent.
const ABSENT: *mut c_void = usize::MAX as *mut c_void;

/// A lazily resolved optional entry point.
///
/// The slot starts unresolved; first use resolves through the symbol
/// source and publishes either the address or the `ABSENT` sentinel.
/// Competing first uses may both perform the lookup - whichever
/// compare-and-set wins is kept and the other result is discarded, which
/// is harmless because resolution is a pure lookup.
pub(crate) struct LazySymbol<F> {
    name: &'static str,
    slot: AtomicPtr<c_void>,
    _shape: PhantomData<F>,
}

impl<F: Copy> LazySymbol<F> {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: AtomicPtr::new(ptr::null_mut()),
            _shape: PhantomData,
        }
    }

    pub(crate) fn get(&self, source: &dyn SymbolSource) -> Option<F> {
        let mut addr = self.slot.load(Ordering::Acquire);
        if addr.is_null() {
            let resolved = source.resolve(self.name).unwrap_or(ABSENT);
            addr = match self.slot.compare_exchange(
                ptr::null_mut(),
                resolved,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => resolved,
                Err(winner) => winner,
            };
        }
        if addr == ABSENT {
            None
        } else {
            debug_assert_eq!(mem::size_of::<F>(), mem::size_of::<*mut c_void>());
            // Safety: the slot only ever holds an address resolved under
            // this slot's name, and `F` is the declared shape of that name.
            Some(unsafe { mem::transmute_copy::<*mut c_void, F>(&addr) })
        }
    }
}

fn required<F: Copy>(source: &dyn SymbolSource, name: &'static str) -> Result<F> {
    let addr = source
        .resolve(name)
        .ok_or_else(|| eyre!("required entry point {name} is missing from {}", source.describe()))?;
    debug_assert_eq!(mem::size_of::<F>(), mem::size_of::<*mut c_void>());
    // Safety: as for `LazySymbol::get`.
    Ok(unsafe { mem::transmute_copy::<*mut c_void, F>(&addr) })
}

/// Immutable-after-init mapping from intercepted identities to the real
/// implementation's entry points.
pub struct DispatchTable {
    source: Box<dyn SymbolSource>,

    pub get_platform_ids: FnClGetPlatformIDs,
    pub get_platform_info: FnClGetPlatformInfo,
    pub get_device_ids: FnClGetDeviceIDs,
    pub retain_device: FnClRetainDevice,
    pub release_device: FnClReleaseDevice,
    pub create_context: FnClCreateContext,
    pub retain_context: FnClRetainContext,
    pub release_context: FnClReleaseContext,
    pub create_command_queue: FnClCreateCommandQueue,
    pub create_command_queue_with_properties: FnClCreateCommandQueueWithProperties,
    pub retain_command_queue: FnClRetainCommandQueue,
    pub release_command_queue: FnClReleaseCommandQueue,
    pub get_command_queue_info: FnClGetCommandQueueInfo,
    pub create_buffer: FnClCreateBuffer,
    pub retain_mem_object: FnClRetainMemObject,
    pub release_mem_object: FnClReleaseMemObject,
    pub create_sampler_with_properties: FnClCreateSamplerWithProperties,
    pub retain_sampler: FnClRetainSampler,
    pub release_sampler: FnClReleaseSampler,
    pub create_program_with_source: FnClCreateProgramWithSource,
    pub build_program: FnClBuildProgram,
    pub retain_program: FnClRetainProgram,
    pub release_program: FnClReleaseProgram,
    pub create_kernel: FnClCreateKernel,
    pub retain_kernel: FnClRetainKernel,
    pub release_kernel: FnClReleaseKernel,
    pub enqueue_ndrange_kernel: FnClEnqueueNDRangeKernel,
    pub enqueue_read_buffer: FnClEnqueueReadBuffer,
    pub enqueue_write_buffer: FnClEnqueueWriteBuffer,
    pub retain_event: FnClRetainEvent,
    pub release_event: FnClReleaseEvent,
    pub wait_for_events: FnClWaitForEvents,
    pub flush: FnClFlush,
    pub finish: FnClFinish,
    pub get_extension_function_address_for_platform: FnClGetExtensionFunctionAddressForPlatform,

    ext_create_command_buffer_khr: LazySymbol<FnClCreateCommandBufferKHR>,
    ext_retain_command_buffer_khr: LazySymbol<FnClRetainCommandBufferKHR>,
    ext_release_command_buffer_khr: LazySymbol<FnClReleaseCommandBufferKHR>,
    ext_finalize_command_buffer_khr: LazySymbol<FnClFinalizeCommandBufferKHR>,
    ext_enqueue_command_buffer_khr: LazySymbol<FnClEnqueueCommandBufferKHR>,
    ext_command_copy_buffer_khr: LazySymbol<FnClCommandCopyBufferKHR>,
    ext_command_fill_buffer_khr: LazySymbol<FnClCommandFillBufferKHR>,
    ext_command_ndrange_kernel_khr: LazySymbol<FnClCommandNDRangeKernelKHR>,
    ext_command_barrier_with_wait_list_khr: LazySymbol<FnClCommandBarrierWithWaitListKHR>,
    ext_create_semaphore_with_properties_khr: LazySymbol<FnClCreateSemaphoreWithPropertiesKHR>,
    ext_retain_semaphore_khr: LazySymbol<FnClRetainSemaphoreKHR>,
    ext_release_semaphore_khr: LazySymbol<FnClReleaseSemaphoreKHR>,
}

impl DispatchTable {
    /// Resolves every required identity once; fails outright if any is
    /// missing, in which case interception stays disabled and the dummy
    /// forwarding path takes over.
    pub fn resolve(source: Box<dyn SymbolSource>) -> Result<Self> {
        let src = source.as_ref();
        Ok(Self {
            get_platform_ids: required(src, "clGetPlatformIDs")?,
            get_platform_info: required(src, "clGetPlatformInfo")?,
            get_device_ids: required(src, "clGetDeviceIDs")?,
            retain_device: required(src, "clRetainDevice")?,
            release_device: required(src, "clReleaseDevice")?,
            create_context: required(src, "clCreateContext")?,
            retain_context: required(src, "clRetainContext")?,
            release_context: required(src, "clReleaseContext")?,
            create_command_queue: required(src, "clCreateCommandQueue")?,
            create_command_queue_with_properties: required(
                src,
                "clCreateCommandQueueWithProperties",
            )?,
            retain_command_queue: required(src, "clRetainCommandQueue")?,
            release_command_queue: required(src, "clReleaseCommandQueue")?,
            get_command_queue_info: required(src, "clGetCommandQueueInfo")?,
            create_buffer: required(src, "clCreateBuffer")?,
            retain_mem_object: required(src, "clRetainMemObject")?,
            release_mem_object: required(src, "clReleaseMemObject")?,
            create_sampler_with_properties: required(src, "clCreateSamplerWithProperties")?,
            retain_sampler: required(src, "clRetainSampler")?,
            release_sampler: required(src, "clReleaseSampler")?,
            create_program_with_source: required(src, "clCreateProgramWithSource")?,
            build_program: required(src, "clBuildProgram")?,
            retain_program: required(src, "clRetainProgram")?,
            release_program: required(src, "clReleaseProgram")?,
            create_kernel: required(src, "clCreateKernel")?,
            retain_kernel: required(src, "clRetainKernel")?,
            release_kernel: required(src, "clReleaseKernel")?,
            enqueue_ndrange_kernel: required(src, "clEnqueueNDRangeKernel")?,
            enqueue_read_buffer: required(src, "clEnqueueReadBuffer")?,
            enqueue_write_buffer: required(src, "clEnqueueWriteBuffer")?,
            retain_event: required(src, "clRetainEvent")?,
            release_event: required(src, "clReleaseEvent")?,
            wait_for_events: required(src, "clWaitForEvents")?,
            flush: required(src, "clFlush")?,
            finish: required(src, "clFinish")?,
            get_extension_function_address_for_platform: required(
                src,
                "clGetExtensionFunctionAddressForPlatform",
            )?,

            ext_create_command_buffer_khr: LazySymbol::new("clCreateCommandBufferKHR"),
            ext_retain_command_buffer_khr: LazySymbol::new("clRetainCommandBufferKHR"),
            ext_release_command_buffer_khr: LazySymbol::new("clReleaseCommandBufferKHR"),
            ext_finalize_command_buffer_khr: LazySymbol::new("clFinalizeCommandBufferKHR"),
            ext_enqueue_command_buffer_khr: LazySymbol::new("clEnqueueCommandBufferKHR"),
            ext_command_copy_buffer_khr: LazySymbol::new("clCommandCopyBufferKHR"),
            ext_command_fill_buffer_khr: LazySymbol::new("clCommandFillBufferKHR"),
            ext_command_ndrange_kernel_khr: LazySymbol::new("clCommandNDRangeKernelKHR"),
            ext_command_barrier_with_wait_list_khr: LazySymbol::new(
                "clCommandBarrierWithWaitListKHR",
            ),
            ext_create_semaphore_with_properties_khr: LazySymbol::new(
                "clCreateSemaphoreWithPropertiesKHR",
            ),
            ext_retain_semaphore_khr: LazySymbol::new("clRetainSemaphoreKHR"),
            ext_release_semaphore_khr: LazySymbol::new("clReleaseSemaphoreKHR"),

            source,
        })
    }

    pub fn create_command_buffer_khr(&self) -> Option<FnClCreateCommandBufferKHR> {
        self.ext_create_command_buffer_khr.get(self.source.as_ref())
    }

    pub fn retain_command_buffer_khr(&self) -> Option<FnClRetainCommandBufferKHR> {
        self.ext_retain_command_buffer_khr.get(self.source.as_ref())
    }

    pub fn release_command_buffer_khr(&self) -> Option<FnClReleaseCommandBufferKHR> {
        self.ext_release_command_buffer_khr.get(self.source.as_ref())
    }

    pub fn finalize_command_buffer_khr(&self) -> Option<FnClFinalizeCommandBufferKHR> {
        self.ext_finalize_command_buffer_khr.get(self.source.as_ref())
    }

    pub fn enqueue_command_buffer_khr(&self) -> Option<FnClEnqueueCommandBufferKHR> {
        self.ext_enqueue_command_buffer_khr.get(self.source.as_ref())
    }

    pub fn command_copy_buffer_khr(&self) -> Option<FnClCommandCopyBufferKHR> {
        self.ext_command_copy_buffer_khr.get(self.source.as_ref())
    }

    pub fn command_fill_buffer_khr(&self) -> Option<FnClCommandFillBufferKHR> {
        self.ext_command_fill_buffer_khr.get(self.source.as_ref())
    }

    pub fn command_ndrange_kernel_khr(&self) -> Option<FnClCommandNDRangeKernelKHR> {
        self.ext_command_ndrange_kernel_khr.get(self.source.as_ref())
    }

    pub fn command_barrier_with_wait_list_khr(&self) -> Option<FnClCommandBarrierWithWaitListKHR> {
        self.ext_command_barrier_with_wait_list_khr
            .get(self.source.as_ref())
    }

    pub fn create_semaphore_with_properties_khr(
        &self,
    ) -> Option<FnClCreateSemaphoreWithPropertiesKHR> {
        self.ext_create_semaphore_with_properties_khr
            .get(self.source.as_ref())
    }

    pub fn retain_semaphore_khr(&self) -> Option<FnClRetainSemaphoreKHR> {
        self.ext_retain_semaphore_khr.get(self.source.as_ref())
    }

    pub fn release_semaphore_khr(&self) -> Option<FnClReleaseSemaphoreKHR> {
        self.ext_release_semaphore_khr.get(self.source.as_ref())
    }
}

/// Fresh lookup used by the no-instance fallback path.
///
/// The library handle is opened once and cached - closing it between calls
/// would invalidate objects the application still holds - but each call
/// resolves its symbol anew rather than reading any dispatch table.
pub(crate) fn fresh<F: Copy>(name: &str) -> Option<F> {
    static FALLBACK: OnceLock<Option<RealLibrary>> = OnceLock::new();
    let lib = FALLBACK
        .get_or_init(|| {
            let explicit = std::env::var("INTERLAY_LIB").ok();
            RealLibrary::open(explicit.as_deref()).ok()
        })
        .as_ref()?;
    let addr = lib.resolve(name)?;
    debug_assert_eq!(mem::size_of::<F>(), mem::size_of::<*mut c_void>());
    // Safety: as for `LazySymbol::get`.
    Some(unsafe { mem::transmute_copy::<*mut c_void, F>(&addr) })
}
