//! A fake "real implementation" for integration tests: local `extern "C"`
//! functions published through a `SymbolSource`, so the whole interception
//! stack can run without any actual compute runtime on the machine.

#![allow(dead_code)]

use std::collections::HashMap;
use std::os::raw::{c_char, c_void};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use interlay::api::*;
use interlay::SymbolSource;

static NEXT_HANDLE: AtomicUsize = AtomicUsize::new(0x1000);
static NEXT_SYNC_POINT: AtomicU32 = AtomicU32::new(1);
static QUEUE_PROPS: Mutex<Option<HashMap<usize, cl_command_queue_properties>>> = Mutex::new(None);

pub const FAKE_PLATFORM: usize = 0x51;
pub const FAKE_DEVICE: usize = 0xd1;

fn new_handle() -> *mut c_void {
    NEXT_HANDLE.fetch_add(0x10, Ordering::Relaxed) as *mut c_void
}

fn remember_queue(queue: *mut c_void, props: cl_command_queue_properties) {
    let mut map = QUEUE_PROPS.lock().unwrap();
    map.get_or_insert_with(HashMap::new).insert(queue as usize, props);
}

unsafe fn write_errcode(errcode_ret: *mut cl_int, code: cl_int) {
    if !errcode_ret.is_null() {
        *errcode_ret = code;
    }
}

unsafe fn write_sync_point(sync_point: *mut cl_sync_point_khr) {
    if !sync_point.is_null() {
        *sync_point = NEXT_SYNC_POINT.fetch_add(1, Ordering::Relaxed);
    }
}

unsafe fn write_event(event: *mut cl_event) {
    if !event.is_null() {
        *event = new_handle();
    }
}

unsafe extern "C" fn get_platform_ids(
    num_entries: cl_uint,
    platforms: *mut cl_platform_id,
    num_platforms: *mut cl_uint,
) -> cl_int {
    if !num_platforms.is_null() {
        *num_platforms = 1;
    }
    if !platforms.is_null() && num_entries > 0 {
        *platforms = FAKE_PLATFORM as cl_platform_id;
    }
    CL_SUCCESS
}

unsafe extern "C" fn get_platform_info(
    _platform: cl_platform_id,
    _param_name: cl_platform_info,
    _param_value_size: usize,
    _param_value: *mut c_void,
    param_value_size_ret: *mut usize,
) -> cl_int {
    if !param_value_size_ret.is_null() {
        *param_value_size_ret = 0;
    }
    CL_SUCCESS
}

unsafe extern "C" fn get_device_ids(
    _platform: cl_platform_id,
    _device_type: cl_device_type,
    num_entries: cl_uint,
    devices: *mut cl_device_id,
    num_devices: *mut cl_uint,
) -> cl_int {
    if !num_devices.is_null() {
        *num_devices = 1;
    }
    if !devices.is_null() && num_entries > 0 {
        *devices = FAKE_DEVICE as cl_device_id;
    }
    CL_SUCCESS
}

unsafe extern "C" fn retain_object(_object: *mut c_void) -> cl_int {
    CL_SUCCESS
}

unsafe extern "C" fn release_object(_object: *mut c_void) -> cl_int {
    CL_SUCCESS
}

unsafe extern "C" fn create_context(
    _properties: *const cl_context_properties,
    _num_devices: cl_uint,
    _devices: *const cl_device_id,
    _pfn_notify: context_notify_fn,
    _user_data: *mut c_void,
    errcode_ret: *mut cl_int,
) -> cl_context {
    write_errcode(errcode_ret, CL_SUCCESS);
    new_handle()
}

unsafe extern "C" fn create_command_queue(
    _context: cl_context,
    _device: cl_device_id,
    properties: cl_command_queue_properties,
    errcode_ret: *mut cl_int,
) -> cl_command_queue {
    write_errcode(errcode_ret, CL_SUCCESS);
    let queue = new_handle();
    remember_queue(queue, properties);
    queue
}

unsafe extern "C" fn create_command_queue_with_properties(
    _context: cl_context,
    _device: cl_device_id,
    _properties: *const cl_queue_properties,
    errcode_ret: *mut cl_int,
) -> cl_command_queue {
    write_errcode(errcode_ret, CL_SUCCESS);
    let queue = new_handle();
    remember_queue(queue, 0);
    queue
}

unsafe extern "C" fn get_command_queue_info(
    command_queue: cl_command_queue,
    param_name: cl_command_queue_info,
    param_value_size: usize,
    param_value: *mut c_void,
    param_value_size_ret: *mut usize,
) -> cl_int {
    if param_name != CL_QUEUE_PROPERTIES {
        return CL_INVALID_VALUE;
    }
    if !param_value.is_null() {
        if param_value_size < std::mem::size_of::<cl_command_queue_properties>() {
            return CL_INVALID_VALUE;
        }
        let props = QUEUE_PROPS
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|map| map.get(&(command_queue as usize)).copied())
            .unwrap_or(0);
        *(param_value as *mut cl_command_queue_properties) = props;
    }
    if !param_value_size_ret.is_null() {
        *param_value_size_ret = std::mem::size_of::<cl_command_queue_properties>();
    }
    CL_SUCCESS
}

unsafe extern "C" fn create_buffer(
    _context: cl_context,
    _flags: cl_mem_flags,
    _size: usize,
    _host_ptr: *mut c_void,
    errcode_ret: *mut cl_int,
) -> cl_mem {
    write_errcode(errcode_ret, CL_SUCCESS);
    new_handle()
}

unsafe extern "C" fn create_sampler_with_properties(
    _context: cl_context,
    _properties: *const cl_sampler_properties,
    errcode_ret: *mut cl_int,
) -> cl_sampler {
    write_errcode(errcode_ret, CL_SUCCESS);
    new_handle()
}

unsafe extern "C" fn create_program_with_source(
    _context: cl_context,
    _count: cl_uint,
    _strings: *const *const c_char,
    _lengths: *const usize,
    errcode_ret: *mut cl_int,
) -> cl_program {
    write_errcode(errcode_ret, CL_SUCCESS);
    new_handle()
}

unsafe extern "C" fn build_program(
    _program: cl_program,
    _num_devices: cl_uint,
    _device_list: *const cl_device_id,
    _options: *const c_char,
    _pfn_notify: program_notify_fn,
    _user_data: *mut c_void,
) -> cl_int {
    CL_SUCCESS
}

unsafe extern "C" fn create_kernel(
    _program: cl_program,
    _kernel_name: *const c_char,
    errcode_ret: *mut cl_int,
) -> cl_kernel {
    write_errcode(errcode_ret, CL_SUCCESS);
    new_handle()
}

unsafe extern "C" fn enqueue_ndrange_kernel(
    _command_queue: cl_command_queue,
    _kernel: cl_kernel,
    _work_dim: cl_uint,
    _global_work_offset: *const usize,
    _global_work_size: *const usize,
    _local_work_size: *const usize,
    _num_events_in_wait_list: cl_uint,
    _event_wait_list: *const cl_event,
    event: *mut cl_event,
) -> cl_int {
    write_event(event);
    CL_SUCCESS
}

unsafe extern "C" fn enqueue_read_buffer(
    _command_queue: cl_command_queue,
    _buffer: cl_mem,
    _blocking_read: cl_bool,
    _offset: usize,
    _size: usize,
    _ptr: *mut c_void,
    _num_events_in_wait_list: cl_uint,
    _event_wait_list: *const cl_event,
    event: *mut cl_event,
) -> cl_int {
    write_event(event);
    CL_SUCCESS
}

unsafe extern "C" fn enqueue_write_buffer(
    _command_queue: cl_command_queue,
    _buffer: cl_mem,
    _blocking_write: cl_bool,
    _offset: usize,
    _size: usize,
    _ptr: *const c_void,
    _num_events_in_wait_list: cl_uint,
    _event_wait_list: *const cl_event,
    event: *mut cl_event,
) -> cl_int {
    write_event(event);
    CL_SUCCESS
}

unsafe extern "C" fn wait_for_events(num_events: cl_uint, _event_list: *const cl_event) -> cl_int {
    if num_events == 0 {
        CL_INVALID_VALUE
    } else {
        CL_SUCCESS
    }
}

unsafe extern "C" fn queue_op(_command_queue: cl_command_queue) -> cl_int {
    CL_SUCCESS
}

unsafe extern "C" fn get_extension_function_address_for_platform(
    _platform: cl_platform_id,
    _func_name: *const c_char,
) -> *mut c_void {
    std::ptr::null_mut()
}

unsafe extern "C" fn create_command_buffer_khr(
    _num_queues: cl_uint,
    _queues: *const cl_command_queue,
    _properties: *const cl_command_buffer_properties_khr,
    errcode_ret: *mut cl_int,
) -> cl_command_buffer_khr {
    write_errcode(errcode_ret, CL_SUCCESS);
    new_handle()
}

unsafe extern "C" fn command_buffer_op(_command_buffer: cl_command_buffer_khr) -> cl_int {
    CL_SUCCESS
}

unsafe extern "C" fn enqueue_command_buffer_khr(
    _num_queues: cl_uint,
    _queues: *mut cl_command_queue,
    _command_buffer: cl_command_buffer_khr,
    _num_events_in_wait_list: cl_uint,
    _event_wait_list: *const cl_event,
    event: *mut cl_event,
) -> cl_int {
    write_event(event);
    CL_SUCCESS
}

unsafe extern "C" fn command_copy_buffer_khr(
    _command_buffer: cl_command_buffer_khr,
    _command_queue: cl_command_queue,
    _src_buffer: cl_mem,
    _dst_buffer: cl_mem,
    _src_offset: usize,
    _dst_offset: usize,
    _size: usize,
    _num_sync_points_in_wait_list: cl_uint,
    _sync_point_wait_list: *const cl_sync_point_khr,
    sync_point: *mut cl_sync_point_khr,
    _mutable_handle: *mut cl_mutable_command_khr,
) -> cl_int {
    write_sync_point(sync_point);
    CL_SUCCESS
}

unsafe extern "C" fn command_fill_buffer_khr(
    _command_buffer: cl_command_buffer_khr,
    _command_queue: cl_command_queue,
    _buffer: cl_mem,
    _pattern: *const c_void,
    _pattern_size: usize,
    _offset: usize,
    _size: usize,
    _num_sync_points_in_wait_list: cl_uint,
    _sync_point_wait_list: *const cl_sync_point_khr,
    sync_point: *mut cl_sync_point_khr,
    _mutable_handle: *mut cl_mutable_command_khr,
) -> cl_int {
    write_sync_point(sync_point);
    CL_SUCCESS
}

unsafe extern "C" fn command_ndrange_kernel_khr(
    _command_buffer: cl_command_buffer_khr,
    _command_queue: cl_command_queue,
    _properties: *const cl_command_properties_khr,
    _kernel: cl_kernel,
    _work_dim: cl_uint,
    _global_work_offset: *const usize,
    _global_work_size: *const usize,
    _local_work_size: *const usize,
    _num_sync_points_in_wait_list: cl_uint,
    _sync_point_wait_list: *const cl_sync_point_khr,
    sync_point: *mut cl_sync_point_khr,
    _mutable_handle: *mut cl_mutable_command_khr,
) -> cl_int {
    write_sync_point(sync_point);
    CL_SUCCESS
}

unsafe extern "C" fn command_barrier_with_wait_list_khr(
    _command_buffer: cl_command_buffer_khr,
    _command_queue: cl_command_queue,
    _num_sync_points_in_wait_list: cl_uint,
    _sync_point_wait_list: *const cl_sync_point_khr,
    sync_point: *mut cl_sync_point_khr,
    _mutable_handle: *mut cl_mutable_command_khr,
) -> cl_int {
    write_sync_point(sync_point);
    CL_SUCCESS
}

unsafe extern "C" fn create_semaphore_with_properties_khr(
    _context: cl_context,
    _sema_props: *const cl_semaphore_properties_khr,
    errcode_ret: *mut cl_int,
) -> cl_semaphore_khr {
    write_errcode(errcode_ret, CL_SUCCESS);
    new_handle()
}

macro_rules! symbol_table {
    ($($name:literal => $func:ident as $shape:ty),+ $(,)?) => {{
        let mut symbols: HashMap<&'static str, usize> = HashMap::new();
        $(symbols.insert($name, $func as $shape as usize);)+
        symbols
    }};
}

fn full_symbol_table() -> HashMap<&'static str, usize> {
    symbol_table! {
        "clGetPlatformIDs" => get_platform_ids as FnClGetPlatformIDs,
        "clGetPlatformInfo" => get_platform_info as FnClGetPlatformInfo,
        "clGetDeviceIDs" => get_device_ids as FnClGetDeviceIDs,
        "clRetainDevice" => retain_object as FnClRetainDevice,
        "clReleaseDevice" => release_object as FnClReleaseDevice,
        "clCreateContext" => create_context as FnClCreateContext,
        "clRetainContext" => retain_object as FnClRetainContext,
        "clReleaseContext" => release_object as FnClReleaseContext,
        "clCreateCommandQueue" => create_command_queue as FnClCreateCommandQueue,
        "clCreateCommandQueueWithProperties" =>
            create_command_queue_with_properties as FnClCreateCommandQueueWithProperties,
        "clRetainCommandQueue" => retain_object as FnClRetainCommandQueue,
        "clReleaseCommandQueue" => release_object as FnClReleaseCommandQueue,
        "clGetCommandQueueInfo" => get_command_queue_info as FnClGetCommandQueueInfo,
        "clCreateBuffer" => create_buffer as FnClCreateBuffer,
        "clRetainMemObject" => retain_object as FnClRetainMemObject,
        "clReleaseMemObject" => release_object as FnClReleaseMemObject,
        "clCreateSamplerWithProperties" =>
            create_sampler_with_properties as FnClCreateSamplerWithProperties,
        "clRetainSampler" => retain_object as FnClRetainSampler,
        "clReleaseSampler" => release_object as FnClReleaseSampler,
        "clCreateProgramWithSource" => create_program_with_source as FnClCreateProgramWithSource,
        "clBuildProgram" => build_program as FnClBuildProgram,
        "clRetainProgram" => retain_object as FnClRetainProgram,
        "clReleaseProgram" => release_object as FnClReleaseProgram,
        "clCreateKernel" => create_kernel as FnClCreateKernel,
        "clRetainKernel" => retain_object as FnClRetainKernel,
        "clReleaseKernel" => release_object as FnClReleaseKernel,
        "clEnqueueNDRangeKernel" => enqueue_ndrange_kernel as FnClEnqueueNDRangeKernel,
        "clEnqueueReadBuffer" => enqueue_read_buffer as FnClEnqueueReadBuffer,
        "clEnqueueWriteBuffer" => enqueue_write_buffer as FnClEnqueueWriteBuffer,
        "clRetainEvent" => retain_object as FnClRetainEvent,
        "clReleaseEvent" => release_object as FnClReleaseEvent,
        "clWaitForEvents" => wait_for_events as FnClWaitForEvents,
        "clFlush" => queue_op as FnClFlush,
        "clFinish" => queue_op as FnClFinish,
        "clGetExtensionFunctionAddressForPlatform" =>
            get_extension_function_address_for_platform
                as FnClGetExtensionFunctionAddressForPlatform,
        "clCreateCommandBufferKHR" => create_command_buffer_khr as FnClCreateCommandBufferKHR,
        "clRetainCommandBufferKHR" => command_buffer_op as FnClRetainCommandBufferKHR,
        "clReleaseCommandBufferKHR" => command_buffer_op as FnClReleaseCommandBufferKHR,
        "clFinalizeCommandBufferKHR" => command_buffer_op as FnClFinalizeCommandBufferKHR,
        "clEnqueueCommandBufferKHR" => enqueue_command_buffer_khr as FnClEnqueueCommandBufferKHR,
        "clCommandCopyBufferKHR" => command_copy_buffer_khr as FnClCommandCopyBufferKHR,
        "clCommandFillBufferKHR" => command_fill_buffer_khr as FnClCommandFillBufferKHR,
        "clCommandNDRangeKernelKHR" => command_ndrange_kernel_khr as FnClCommandNDRangeKernelKHR,
        "clCommandBarrierWithWaitListKHR" =>
            command_barrier_with_wait_list_khr as FnClCommandBarrierWithWaitListKHR,
        "clCreateSemaphoreWithPropertiesKHR" =>
            create_semaphore_with_properties_khr as FnClCreateSemaphoreWithPropertiesKHR,
        "clRetainSemaphoreKHR" => retain_object as FnClRetainSemaphoreKHR,
        "clReleaseSemaphoreKHR" => release_object as FnClReleaseSemaphoreKHR,
    }
}

/// Publishes the fake driver's functions as a symbol source.
pub struct FakeSource {
    symbols: HashMap<&'static str, usize>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            symbols: full_symbol_table(),
        }
    }

    /// A source with some symbols removed, to exercise absent-symbol paths.
    pub fn without(missing: &[&str]) -> Self {
        let mut symbols = full_symbol_table();
        for name in missing {
            symbols.remove(*name);
        }
        Self { symbols }
    }
}

impl SymbolSource for FakeSource {
    fn resolve(&self, name: &str) -> Option<*mut c_void> {
        self.symbols.get(name).map(|&addr| addr as *mut c_void)
    }

    fn describe(&self) -> String {
        "fake test driver".into()
    }
}
