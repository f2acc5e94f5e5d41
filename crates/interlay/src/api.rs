//! C ABI surface of the wrapped compute API.
//!
//! Every type here mirrors the wrapped API's own declarations bit for bit;
//! handles are opaque pointers the shim never dereferences.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_void};

pub type cl_int = i32;
pub type cl_uint = u32;
pub type cl_ulong = u64;
pub type cl_bool = cl_uint;
pub type cl_bitfield = cl_ulong;
pub type cl_properties = cl_ulong;

pub type cl_platform_id = *mut c_void;
pub type cl_device_id = *mut c_void;
pub type cl_context = *mut c_void;
pub type cl_command_queue = *mut c_void;
pub type cl_mem = *mut c_void;
pub type cl_sampler = *mut c_void;
pub type cl_program = *mut c_void;
pub type cl_kernel = *mut c_void;
pub type cl_event = *mut c_void;
pub type cl_semaphore_khr = *mut c_void;
pub type cl_command_buffer_khr = *mut c_void;
pub type cl_mutable_command_khr = *mut c_void;

pub type cl_platform_info = cl_uint;
pub type cl_command_queue_info = cl_uint;
pub type cl_device_type = cl_bitfield;
pub type cl_command_queue_properties = cl_bitfield;
pub type cl_mem_flags = cl_bitfield;
pub type cl_context_properties = isize;
pub type cl_queue_properties = cl_properties;
pub type cl_sampler_properties = cl_properties;
pub type cl_semaphore_properties_khr = cl_properties;
pub type cl_command_buffer_properties_khr = cl_properties;
pub type cl_command_properties_khr = cl_properties;
pub type cl_sync_point_khr = cl_uint;

pub const CL_SUCCESS: cl_int = 0;
pub const CL_DEVICE_NOT_FOUND: cl_int = -1;
pub const CL_OUT_OF_RESOURCES: cl_int = -5;
pub const CL_OUT_OF_HOST_MEMORY: cl_int = -6;
pub const CL_INVALID_VALUE: cl_int = -30;
pub const CL_INVALID_PLATFORM: cl_int = -32;
pub const CL_INVALID_OPERATION: cl_int = -59;
pub const CL_PLATFORM_NOT_FOUND_KHR: cl_int = -1001;

pub const CL_QUEUE_PROPERTIES: cl_command_queue_info = 0x1093;
pub const CL_QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE: cl_command_queue_properties = 1 << 0;

/// Context error callback, as declared by the wrapped API.
pub type context_notify_fn =
    Option<unsafe extern "C" fn(*const c_char, *const c_void, usize, *mut c_void)>;
/// Program build completion callback.
pub type program_notify_fn = Option<unsafe extern "C" fn(cl_program, *mut c_void)>;

// Function pointer shapes for every intercepted entry point.
pub type FnClGetPlatformIDs =
    unsafe extern "C" fn(cl_uint, *mut cl_platform_id, *mut cl_uint) -> cl_int;
pub type FnClGetPlatformInfo = unsafe extern "C" fn(
    cl_platform_id,
    cl_platform_info,
    usize,
    *mut c_void,
    *mut usize,
) -> cl_int;
pub type FnClGetDeviceIDs = unsafe extern "C" fn(
    cl_platform_id,
    cl_device_type,
    cl_uint,
    *mut cl_device_id,
    *mut cl_uint,
) -> cl_int;
pub type FnClRetainDevice = unsafe extern "C" fn(cl_device_id) -> cl_int;
pub type FnClReleaseDevice = unsafe extern "C" fn(cl_device_id) -> cl_int;
pub type FnClCreateContext = unsafe extern "C" fn(
    *const cl_context_properties,
    cl_uint,
    *const cl_device_id,
    context_notify_fn,
    *mut c_void,
    *mut cl_int,
) -> cl_context;
pub type FnClRetainContext = unsafe extern "C" fn(cl_context) -> cl_int;
pub type FnClReleaseContext = unsafe extern "C" fn(cl_context) -> cl_int;
pub type FnClCreateCommandQueue = unsafe extern "C" fn(
    cl_context,
    cl_device_id,
    cl_command_queue_properties,
    *mut cl_int,
) -> cl_command_queue;
pub type FnClCreateCommandQueueWithProperties = unsafe extern "C" fn(
    cl_context,
    cl_device_id,
    *const cl_queue_properties,
    *mut cl_int,
) -> cl_command_queue;
pub type FnClRetainCommandQueue = unsafe extern "C" fn(cl_command_queue) -> cl_int;
pub type FnClReleaseCommandQueue = unsafe extern "C" fn(cl_command_queue) -> cl_int;
pub type FnClGetCommandQueueInfo = unsafe extern "C" fn(
    cl_command_queue,
    cl_command_queue_info,
    usize,
    *mut c_void,
    *mut usize,
) -> cl_int;
pub type FnClCreateBuffer =
    unsafe extern "C" fn(cl_context, cl_mem_flags, usize, *mut c_void, *mut cl_int) -> cl_mem;
pub type FnClRetainMemObject = unsafe extern "C" fn(cl_mem) -> cl_int;
pub type FnClReleaseMemObject = unsafe extern "C" fn(cl_mem) -> cl_int;
pub type FnClCreateSamplerWithProperties =
    unsafe extern "C" fn(cl_context, *const cl_sampler_properties, *mut cl_int) -> cl_sampler;
pub type FnClRetainSampler = unsafe extern "C" fn(cl_sampler) -> cl_int;
pub type FnClReleaseSampler = unsafe extern "C" fn(cl_sampler) -> cl_int;
pub type FnClCreateProgramWithSource = unsafe extern "C" fn(
    cl_context,
    cl_uint,
    *const *const c_char,
    *const usize,
    *mut cl_int,
) -> cl_program;
pub type FnClBuildProgram = unsafe extern "C" fn(
    cl_program,
    cl_uint,
    *const cl_device_id,
    *const c_char,
    program_notify_fn,
    *mut c_void,
) -> cl_int;
pub type FnClRetainProgram = unsafe extern "C" fn(cl_program) -> cl_int;
pub type FnClReleaseProgram = unsafe extern "C" fn(cl_program) -> cl_int;
pub type FnClCreateKernel =
    unsafe extern "C" fn(cl_program, *const c_char, *mut cl_int) -> cl_kernel;
pub type FnClRetainKernel = unsafe extern "C" fn(cl_kernel) -> cl_int;
pub type FnClReleaseKernel = unsafe extern "C" fn(cl_kernel) -> cl_int;
pub type FnClEnqueueNDRangeKernel = unsafe extern "C" fn(
    cl_command_queue,
    cl_kernel,
    cl_uint,
    *const usize,
    *const usize,
    *const usize,
    cl_uint,
    *const cl_event,
    *mut cl_event,
) -> cl_int;
pub type FnClEnqueueReadBuffer = unsafe extern "C" fn(
    cl_command_queue,
    cl_mem,
    cl_bool,
    usize,
    usize,
    *mut c_void,
    cl_uint,
    *const cl_event,
    *mut cl_event,
) -> cl_int;
pub type FnClEnqueueWriteBuffer = unsafe extern "C" fn(
    cl_command_queue,
    cl_mem,
    cl_bool,
    usize,
    usize,
    *const c_void,
    cl_uint,
    *const cl_event,
    *mut cl_event,
) -> cl_int;
pub type FnClRetainEvent = unsafe extern "C" fn(cl_event) -> cl_int;
pub type FnClReleaseEvent = unsafe extern "C" fn(cl_event) -> cl_int;
pub type FnClWaitForEvents = unsafe extern "C" fn(cl_uint, *const cl_event) -> cl_int;
pub type FnClFlush = unsafe extern "C" fn(cl_command_queue) -> cl_int;
pub type FnClFinish = unsafe extern "C" fn(cl_command_queue) -> cl_int;
pub type FnClGetExtensionFunctionAddressForPlatform =
    unsafe extern "C" fn(cl_platform_id, *const c_char) -> *mut c_void;

// Command buffer and semaphore extensions.
pub type FnClCreateCommandBufferKHR = unsafe extern "C" fn(
    cl_uint,
    *const cl_command_queue,
    *const cl_command_buffer_properties_khr,
    *mut cl_int,
) -> cl_command_buffer_khr;
pub type FnClRetainCommandBufferKHR = unsafe extern "C" fn(cl_command_buffer_khr) -> cl_int;
pub type FnClReleaseCommandBufferKHR = unsafe extern "C" fn(cl_command_buffer_khr) -> cl_int;
pub type FnClFinalizeCommandBufferKHR = unsafe extern "C" fn(cl_command_buffer_khr) -> cl_int;
pub type FnClEnqueueCommandBufferKHR = unsafe extern "C" fn(
    cl_uint,
    *mut cl_command_queue,
    cl_command_buffer_khr,
    cl_uint,
    *const cl_event,
    *mut cl_event,
) -> cl_int;
pub type FnClCommandCopyBufferKHR = unsafe extern "C" fn(
    cl_command_buffer_khr,
    cl_command_queue,
    cl_mem,
    cl_mem,
    usize,
    usize,
    usize,
    cl_uint,
    *const cl_sync_point_khr,
    *mut cl_sync_point_khr,
    *mut cl_mutable_command_khr,
) -> cl_int;
pub type FnClCommandFillBufferKHR = unsafe extern "C" fn(
    cl_command_buffer_khr,
    cl_command_queue,
    cl_mem,
    *const c_void,
    usize,
    usize,
    usize,
    cl_uint,
    *const cl_sync_point_khr,
    *mut cl_sync_point_khr,
    *mut cl_mutable_command_khr,
) -> cl_int;
pub type FnClCommandNDRangeKernelKHR = unsafe extern "C" fn(
    cl_command_buffer_khr,
    cl_command_queue,
    *const cl_command_properties_khr,
    cl_kernel,
    cl_uint,
    *const usize,
    *const usize,
    *const usize,
    cl_uint,
    *const cl_sync_point_khr,
    *mut cl_sync_point_khr,
    *mut cl_mutable_command_khr,
) -> cl_int;
pub type FnClCommandBarrierWithWaitListKHR = unsafe extern "C" fn(
    cl_command_buffer_khr,
    cl_command_queue,
    cl_uint,
    *const cl_sync_point_khr,
    *mut cl_sync_point_khr,
    *mut cl_mutable_command_khr,
) -> cl_int;
pub type FnClCreateSemaphoreWithPropertiesKHR = unsafe extern "C" fn(
    cl_context,
    *const cl_semaphore_properties_khr,
    *mut cl_int,
) -> cl_semaphore_khr;
pub type FnClRetainSemaphoreKHR = unsafe extern "C" fn(cl_semaphore_khr) -> cl_int;
pub type FnClReleaseSemaphoreKHR = unsafe extern "C" fn(cl_semaphore_khr) -> cl_int;

/// Opaque identity of a real-implementation object.
///
/// Only ever used as a map key or forwarded back to the real
/// implementation; the shim never owns or dereferences what it points at.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Handle(usize);

impl Handle {
    pub fn from_ptr<T>(ptr: *mut T) -> Self {
        Handle(ptr as usize)
    }

    pub const fn from_raw(raw: usize) -> Self {
        Handle(raw)
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn raw(self) -> usize {
        self.0
    }
}
