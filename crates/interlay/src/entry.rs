//! Exported entry points.
//!
//! Each function here is ABI-identical to the real implementation's export
//! of the same name and is a thin instantiation of the instrumentation
//! pipeline: forward through the dispatch table, observe, return the real
//! result unchanged. When no interception instance is active every wrapper
//! degrades to a fresh-lookup forward so the process still behaves like
//! the real API.

#![allow(clippy::missing_safety_doc)]
#![allow(clippy::too_many_arguments)]

use std::os::raw::{c_char, c_void};
use std::ptr;

use crate::api::*;
use crate::dispatch::{self, DispatchTable};
use crate::objects::ObjectKind;
use crate::pipeline::{self, Call, FnId};

/// Failure result for a create-style fallback with nothing to forward to.
unsafe fn fail_create(errcode_ret: *mut cl_int) -> *mut c_void {
    if !errcode_ret.is_null() {
        *errcode_ret = CL_INVALID_OPERATION;
    }
    ptr::null_mut()
}

/// Substitutes a local slot when the application passed no errcode
/// pointer, so the pipeline can still classify the result.
fn errcode_or_local(errcode_ret: *mut cl_int, local: &mut cl_int) -> *mut cl_int {
    if errcode_ret.is_null() {
        local
    } else {
        errcode_ret
    }
}

unsafe fn sync_points<'a>(
    count: cl_uint,
    list: *const cl_sync_point_khr,
) -> &'a [cl_sync_point_khr] {
    if list.is_null() || count == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(list, count as usize)
    }
}

unsafe fn out_sync_point(sync_point: *mut cl_sync_point_khr) -> Option<cl_sync_point_khr> {
    if sync_point.is_null() {
        None
    } else {
        Some(*sync_point)
    }
}

unsafe fn cstr<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        None
    } else {
        std::ffi::CStr::from_ptr(ptr).to_str().ok()
    }
}

/// Events handed back by enqueue-style calls are allocations the
/// application must release.
unsafe fn track_out_event(call: &Call<'_>, ret: cl_int, event: *mut cl_event) {
    if ret == CL_SUCCESS && !event.is_null() {
        call.track_allocation(ObjectKind::Event, Handle::from_ptr(*event));
    }
}

fn queue_is_in_order(dispatch: &DispatchTable, queue: cl_command_queue) -> bool {
    let mut props: cl_command_queue_properties = 0;
    let ret = unsafe {
        (dispatch.get_command_queue_info)(
            queue,
            CL_QUEUE_PROPERTIES,
            std::mem::size_of::<cl_command_queue_properties>(),
            &mut props as *mut cl_command_queue_properties as *mut c_void,
            ptr::null_mut(),
        )
    };
    ret == CL_SUCCESS && props & CL_QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE == 0
}

// Platform and device queries.

#[no_mangle]
pub unsafe extern "C" fn clGetPlatformIDs(
    num_entries: cl_uint,
    platforms: *mut cl_platform_id,
    num_platforms: *mut cl_uint,
) -> cl_int {
    pipeline::intercepted(
        FnId::GetPlatformIDs,
        || match dispatch::fresh::<FnClGetPlatformIDs>("clGetPlatformIDs") {
            Some(func) => unsafe { func(num_entries, platforms, num_platforms) },
            None => CL_PLATFORM_NOT_FOUND_KHR,
        },
        |call| {
            call.check(unsafe {
                (call.dispatch().get_platform_ids)(num_entries, platforms, num_platforms)
            })
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clGetPlatformInfo(
    platform: cl_platform_id,
    param_name: cl_platform_info,
    param_value_size: usize,
    param_value: *mut c_void,
    param_value_size_ret: *mut usize,
) -> cl_int {
    pipeline::intercepted(
        FnId::GetPlatformInfo,
        || match dispatch::fresh::<FnClGetPlatformInfo>("clGetPlatformInfo") {
            Some(func) => unsafe {
                func(
                    platform,
                    param_name,
                    param_value_size,
                    param_value,
                    param_value_size_ret,
                )
            },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            call.check(unsafe {
                (call.dispatch().get_platform_info)(
                    platform,
                    param_name,
                    param_value_size,
                    param_value,
                    param_value_size_ret,
                )
            })
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clGetDeviceIDs(
    platform: cl_platform_id,
    device_type: cl_device_type,
    num_entries: cl_uint,
    devices: *mut cl_device_id,
    num_devices: *mut cl_uint,
) -> cl_int {
    pipeline::intercepted(
        FnId::GetDeviceIDs,
        || match dispatch::fresh::<FnClGetDeviceIDs>("clGetDeviceIDs") {
            Some(func) => unsafe { func(platform, device_type, num_entries, devices, num_devices) },
            None => CL_DEVICE_NOT_FOUND,
        },
        |call| {
            call.check(unsafe {
                (call.dispatch().get_device_ids)(
                    platform,
                    device_type,
                    num_entries,
                    devices,
                    num_devices,
                )
            })
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clRetainDevice(device: cl_device_id) -> cl_int {
    pipeline::intercepted(
        FnId::RetainDevice,
        || match dispatch::fresh::<FnClRetainDevice>("clRetainDevice") {
            Some(func) => unsafe { func(device) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().retain_device)(device) });
            if ret == CL_SUCCESS {
                call.track_retain(ObjectKind::Device, Handle::from_ptr(device));
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clReleaseDevice(device: cl_device_id) -> cl_int {
    pipeline::intercepted(
        FnId::ReleaseDevice,
        || match dispatch::fresh::<FnClReleaseDevice>("clReleaseDevice") {
            Some(func) => unsafe { func(device) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().release_device)(device) });
            if ret == CL_SUCCESS {
                call.track_release(ObjectKind::Device, Handle::from_ptr(device));
            }
            ret
        },
    )
}

// Contexts.

#[no_mangle]
pub unsafe extern "C" fn clCreateContext(
    properties: *const cl_context_properties,
    num_devices: cl_uint,
    devices: *const cl_device_id,
    pfn_notify: context_notify_fn,
    user_data: *mut c_void,
    errcode_ret: *mut cl_int,
) -> cl_context {
    pipeline::intercepted(
        FnId::CreateContext,
        || match dispatch::fresh::<FnClCreateContext>("clCreateContext") {
            Some(func) => unsafe {
                func(
                    properties,
                    num_devices,
                    devices,
                    pfn_notify,
                    user_data,
                    errcode_ret,
                )
            },
            None => unsafe { fail_create(errcode_ret) },
        },
        |call| {
            call.log_info(|| format!("num_devices = {num_devices}"));
            let mut local_err = CL_SUCCESS;
            let errcode_ret = errcode_or_local(errcode_ret, &mut local_err);
            let ret = unsafe {
                (call.dispatch().create_context)(
                    properties,
                    num_devices,
                    devices,
                    pfn_notify,
                    user_data,
                    errcode_ret,
                )
            };
            call.check(unsafe { *errcode_ret });
            call.track_allocation(ObjectKind::Context, Handle::from_ptr(ret));
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clRetainContext(context: cl_context) -> cl_int {
    pipeline::intercepted(
        FnId::RetainContext,
        || match dispatch::fresh::<FnClRetainContext>("clRetainContext") {
            Some(func) => unsafe { func(context) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().retain_context)(context) });
            if ret == CL_SUCCESS {
                call.track_retain(ObjectKind::Context, Handle::from_ptr(context));
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clReleaseContext(context: cl_context) -> cl_int {
    pipeline::intercepted(
        FnId::ReleaseContext,
        || match dispatch::fresh::<FnClReleaseContext>("clReleaseContext") {
            Some(func) => unsafe { func(context) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().release_context)(context) });
            if ret == CL_SUCCESS {
                call.track_release(ObjectKind::Context, Handle::from_ptr(context));
            }
            ret
        },
    )
}

// Command queues.

#[no_mangle]
pub unsafe extern "C" fn clCreateCommandQueue(
    context: cl_context,
    device: cl_device_id,
    properties: cl_command_queue_properties,
    errcode_ret: *mut cl_int,
) -> cl_command_queue {
    pipeline::intercepted(
        FnId::CreateCommandQueue,
        || match dispatch::fresh::<FnClCreateCommandQueue>("clCreateCommandQueue") {
            Some(func) => unsafe { func(context, device, properties, errcode_ret) },
            None => unsafe { fail_create(errcode_ret) },
        },
        |call| {
            let mut local_err = CL_SUCCESS;
            let errcode_ret = errcode_or_local(errcode_ret, &mut local_err);
            let ret = unsafe {
                (call.dispatch().create_command_queue)(context, device, properties, errcode_ret)
            };
            call.check(unsafe { *errcode_ret });
            call.track_allocation(ObjectKind::CommandQueue, Handle::from_ptr(ret));
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clCreateCommandQueueWithProperties(
    context: cl_context,
    device: cl_device_id,
    properties: *const cl_queue_properties,
    errcode_ret: *mut cl_int,
) -> cl_command_queue {
    pipeline::intercepted(
        FnId::CreateCommandQueueWithProperties,
        || match dispatch::fresh::<FnClCreateCommandQueueWithProperties>(
            "clCreateCommandQueueWithProperties",
        ) {
            Some(func) => unsafe { func(context, device, properties, errcode_ret) },
            None => unsafe { fail_create(errcode_ret) },
        },
        |call| {
            let mut local_err = CL_SUCCESS;
            let errcode_ret = errcode_or_local(errcode_ret, &mut local_err);
            let ret = unsafe {
                (call.dispatch().create_command_queue_with_properties)(
                    context,
                    device,
                    properties,
                    errcode_ret,
                )
            };
            call.check(unsafe { *errcode_ret });
            call.track_allocation(ObjectKind::CommandQueue, Handle::from_ptr(ret));
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clRetainCommandQueue(command_queue: cl_command_queue) -> cl_int {
    pipeline::intercepted(
        FnId::RetainCommandQueue,
        || match dispatch::fresh::<FnClRetainCommandQueue>("clRetainCommandQueue") {
            Some(func) => unsafe { func(command_queue) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().retain_command_queue)(command_queue) });
            if ret == CL_SUCCESS {
                call.track_retain(ObjectKind::CommandQueue, Handle::from_ptr(command_queue));
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clReleaseCommandQueue(command_queue: cl_command_queue) -> cl_int {
    pipeline::intercepted(
        FnId::ReleaseCommandQueue,
        || match dispatch::fresh::<FnClReleaseCommandQueue>("clReleaseCommandQueue") {
            Some(func) => unsafe { func(command_queue) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().release_command_queue)(command_queue) });
            if ret == CL_SUCCESS {
                call.track_release(ObjectKind::CommandQueue, Handle::from_ptr(command_queue));
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clGetCommandQueueInfo(
    command_queue: cl_command_queue,
    param_name: cl_command_queue_info,
    param_value_size: usize,
    param_value: *mut c_void,
    param_value_size_ret: *mut usize,
) -> cl_int {
    pipeline::intercepted(
        FnId::GetCommandQueueInfo,
        || match dispatch::fresh::<FnClGetCommandQueueInfo>("clGetCommandQueueInfo") {
            Some(func) => unsafe {
                func(
                    command_queue,
                    param_name,
                    param_value_size,
                    param_value,
                    param_value_size_ret,
                )
            },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            call.check(unsafe {
                (call.dispatch().get_command_queue_info)(
                    command_queue,
                    param_name,
                    param_value_size,
                    param_value,
                    param_value_size_ret,
                )
            })
        },
    )
}

// Memory objects.

#[no_mangle]
pub unsafe extern "C" fn clCreateBuffer(
    context: cl_context,
    flags: cl_mem_flags,
    size: usize,
    host_ptr: *mut c_void,
    errcode_ret: *mut cl_int,
) -> cl_mem {
    pipeline::intercepted(
        FnId::CreateBuffer,
        || match dispatch::fresh::<FnClCreateBuffer>("clCreateBuffer") {
            Some(func) => unsafe { func(context, flags, size, host_ptr, errcode_ret) },
            None => unsafe { fail_create(errcode_ret) },
        },
        |call| {
            call.log_info(|| format!("flags = {flags:#x}, size = {size}"));
            let mut local_err = CL_SUCCESS;
            let errcode_ret = errcode_or_local(errcode_ret, &mut local_err);
            let ret = unsafe {
                (call.dispatch().create_buffer)(context, flags, size, host_ptr, errcode_ret)
            };
            call.check(unsafe { *errcode_ret });
            call.track_allocation(ObjectKind::MemObject, Handle::from_ptr(ret));
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clRetainMemObject(memobj: cl_mem) -> cl_int {
    pipeline::intercepted(
        FnId::RetainMemObject,
        || match dispatch::fresh::<FnClRetainMemObject>("clRetainMemObject") {
            Some(func) => unsafe { func(memobj) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().retain_mem_object)(memobj) });
            if ret == CL_SUCCESS {
                call.track_retain(ObjectKind::MemObject, Handle::from_ptr(memobj));
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clReleaseMemObject(memobj: cl_mem) -> cl_int {
    pipeline::intercepted(
        FnId::ReleaseMemObject,
        || match dispatch::fresh::<FnClReleaseMemObject>("clReleaseMemObject") {
            Some(func) => unsafe { func(memobj) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().release_mem_object)(memobj) });
            if ret == CL_SUCCESS {
                call.track_release(ObjectKind::MemObject, Handle::from_ptr(memobj));
            }
            ret
        },
    )
}

// Samplers.

#[no_mangle]
pub unsafe extern "C" fn clCreateSamplerWithProperties(
    context: cl_context,
    sampler_properties: *const cl_sampler_properties,
    errcode_ret: *mut cl_int,
) -> cl_sampler {
    pipeline::intercepted(
        FnId::CreateSamplerWithProperties,
        || match dispatch::fresh::<FnClCreateSamplerWithProperties>(
            "clCreateSamplerWithProperties",
        ) {
            Some(func) => unsafe { func(context, sampler_properties, errcode_ret) },
            None => unsafe { fail_create(errcode_ret) },
        },
        |call| {
            let mut local_err = CL_SUCCESS;
            let errcode_ret = errcode_or_local(errcode_ret, &mut local_err);
            let ret = unsafe {
                (call.dispatch().create_sampler_with_properties)(
                    context,
                    sampler_properties,
                    errcode_ret,
                )
            };
            call.check(unsafe { *errcode_ret });
            call.track_allocation(ObjectKind::Sampler, Handle::from_ptr(ret));
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clRetainSampler(sampler: cl_sampler) -> cl_int {
    pipeline::intercepted(
        FnId::RetainSampler,
        || match dispatch::fresh::<FnClRetainSampler>("clRetainSampler") {
            Some(func) => unsafe { func(sampler) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().retain_sampler)(sampler) });
            if ret == CL_SUCCESS {
                call.track_retain(ObjectKind::Sampler, Handle::from_ptr(sampler));
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clReleaseSampler(sampler: cl_sampler) -> cl_int {
    pipeline::intercepted(
        FnId::ReleaseSampler,
        || match dispatch::fresh::<FnClReleaseSampler>("clReleaseSampler") {
            Some(func) => unsafe { func(sampler) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().release_sampler)(sampler) });
            if ret == CL_SUCCESS {
                call.track_release(ObjectKind::Sampler, Handle::from_ptr(sampler));
            }
            ret
        },
    )
}

// Programs and kernels.

#[no_mangle]
pub unsafe extern "C" fn clCreateProgramWithSource(
    context: cl_context,
    count: cl_uint,
    strings: *const *const c_char,
    lengths: *const usize,
    errcode_ret: *mut cl_int,
) -> cl_program {
    pipeline::intercepted(
        FnId::CreateProgramWithSource,
        || match dispatch::fresh::<FnClCreateProgramWithSource>("clCreateProgramWithSource") {
            Some(func) => unsafe { func(context, count, strings, lengths, errcode_ret) },
            None => unsafe { fail_create(errcode_ret) },
        },
        |call| {
            let mut local_err = CL_SUCCESS;
            let errcode_ret = errcode_or_local(errcode_ret, &mut local_err);
            let ret = unsafe {
                (call.dispatch().create_program_with_source)(
                    context,
                    count,
                    strings,
                    lengths,
                    errcode_ret,
                )
            };
            call.check(unsafe { *errcode_ret });
            call.track_allocation(ObjectKind::Program, Handle::from_ptr(ret));
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clBuildProgram(
    program: cl_program,
    num_devices: cl_uint,
    device_list: *const cl_device_id,
    options: *const c_char,
    pfn_notify: program_notify_fn,
    user_data: *mut c_void,
) -> cl_int {
    pipeline::intercepted(
        FnId::BuildProgram,
        || match dispatch::fresh::<FnClBuildProgram>("clBuildProgram") {
            Some(func) => unsafe {
                func(
                    program,
                    num_devices,
                    device_list,
                    options,
                    pfn_notify,
                    user_data,
                )
            },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            call.check(unsafe {
                (call.dispatch().build_program)(
                    program,
                    num_devices,
                    device_list,
                    options,
                    pfn_notify,
                    user_data,
                )
            })
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clRetainProgram(program: cl_program) -> cl_int {
    pipeline::intercepted(
        FnId::RetainProgram,
        || match dispatch::fresh::<FnClRetainProgram>("clRetainProgram") {
            Some(func) => unsafe { func(program) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().retain_program)(program) });
            if ret == CL_SUCCESS {
                call.track_retain(ObjectKind::Program, Handle::from_ptr(program));
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clReleaseProgram(program: cl_program) -> cl_int {
    pipeline::intercepted(
        FnId::ReleaseProgram,
        || match dispatch::fresh::<FnClReleaseProgram>("clReleaseProgram") {
            Some(func) => unsafe { func(program) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().release_program)(program) });
            if ret == CL_SUCCESS {
                call.track_release(ObjectKind::Program, Handle::from_ptr(program));
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clCreateKernel(
    program: cl_program,
    kernel_name: *const c_char,
    errcode_ret: *mut cl_int,
) -> cl_kernel {
    pipeline::intercepted(
        FnId::CreateKernel,
        || match dispatch::fresh::<FnClCreateKernel>("clCreateKernel") {
            Some(func) => unsafe { func(program, kernel_name, errcode_ret) },
            None => unsafe { fail_create(errcode_ret) },
        },
        |call| {
            call.log_info(|| {
                format!(
                    "kernel_name = {}",
                    unsafe { cstr(kernel_name) }.unwrap_or("<invalid>")
                )
            });
            let mut local_err = CL_SUCCESS;
            let errcode_ret = errcode_or_local(errcode_ret, &mut local_err);
            let ret =
                unsafe { (call.dispatch().create_kernel)(program, kernel_name, errcode_ret) };
            call.check(unsafe { *errcode_ret });
            call.track_allocation(ObjectKind::Kernel, Handle::from_ptr(ret));
            if !ret.is_null() {
                if let Some(name) = unsafe { cstr(kernel_name) } {
                    call.intercept()
                        .remember_kernel_name(Handle::from_ptr(ret), name);
                }
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clRetainKernel(kernel: cl_kernel) -> cl_int {
    pipeline::intercepted(
        FnId::RetainKernel,
        || match dispatch::fresh::<FnClRetainKernel>("clRetainKernel") {
            Some(func) => unsafe { func(kernel) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().retain_kernel)(kernel) });
            if ret == CL_SUCCESS {
                call.track_retain(ObjectKind::Kernel, Handle::from_ptr(kernel));
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clReleaseKernel(kernel: cl_kernel) -> cl_int {
    pipeline::intercepted(
        FnId::ReleaseKernel,
        || match dispatch::fresh::<FnClReleaseKernel>("clReleaseKernel") {
            Some(func) => unsafe { func(kernel) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().release_kernel)(kernel) });
            if ret == CL_SUCCESS {
                call.track_release(ObjectKind::Kernel, Handle::from_ptr(kernel));
            }
            ret
        },
    )
}

// Enqueues and synchronization.

#[no_mangle]
pub unsafe extern "C" fn clEnqueueNDRangeKernel(
    command_queue: cl_command_queue,
    kernel: cl_kernel,
    work_dim: cl_uint,
    global_work_offset: *const usize,
    global_work_size: *const usize,
    local_work_size: *const usize,
    num_events_in_wait_list: cl_uint,
    event_wait_list: *const cl_event,
    event: *mut cl_event,
) -> cl_int {
    pipeline::intercepted(
        FnId::EnqueueNDRangeKernel,
        || match dispatch::fresh::<FnClEnqueueNDRangeKernel>("clEnqueueNDRangeKernel") {
            Some(func) => unsafe {
                func(
                    command_queue,
                    kernel,
                    work_dim,
                    global_work_offset,
                    global_work_size,
                    local_work_size,
                    num_events_in_wait_list,
                    event_wait_list,
                    event,
                )
            },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            call.log_info(|| {
                let name = call
                    .intercept()
                    .kernel_name(Handle::from_ptr(kernel))
                    .unwrap_or_default();
                format!("kernel = {kernel:?} ({name}), work_dim = {work_dim}")
            });
            let ret = call.check(unsafe {
                (call.dispatch().enqueue_ndrange_kernel)(
                    command_queue,
                    kernel,
                    work_dim,
                    global_work_offset,
                    global_work_size,
                    local_work_size,
                    num_events_in_wait_list,
                    event_wait_list,
                    event,
                )
            });
            unsafe { track_out_event(call, ret, event) };
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clEnqueueReadBuffer(
    command_queue: cl_command_queue,
    buffer: cl_mem,
    blocking_read: cl_bool,
    offset: usize,
    size: usize,
    ptr_arg: *mut c_void,
    num_events_in_wait_list: cl_uint,
    event_wait_list: *const cl_event,
    event: *mut cl_event,
) -> cl_int {
    pipeline::intercepted(
        FnId::EnqueueReadBuffer,
        || match dispatch::fresh::<FnClEnqueueReadBuffer>("clEnqueueReadBuffer") {
            Some(func) => unsafe {
                func(
                    command_queue,
                    buffer,
                    blocking_read,
                    offset,
                    size,
                    ptr_arg,
                    num_events_in_wait_list,
                    event_wait_list,
                    event,
                )
            },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe {
                (call.dispatch().enqueue_read_buffer)(
                    command_queue,
                    buffer,
                    blocking_read,
                    offset,
                    size,
                    ptr_arg,
                    num_events_in_wait_list,
                    event_wait_list,
                    event,
                )
            });
            unsafe { track_out_event(call, ret, event) };
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clEnqueueWriteBuffer(
    command_queue: cl_command_queue,
    buffer: cl_mem,
    blocking_write: cl_bool,
    offset: usize,
    size: usize,
    ptr_arg: *const c_void,
    num_events_in_wait_list: cl_uint,
    event_wait_list: *const cl_event,
    event: *mut cl_event,
) -> cl_int {
    pipeline::intercepted(
        FnId::EnqueueWriteBuffer,
        || match dispatch::fresh::<FnClEnqueueWriteBuffer>("clEnqueueWriteBuffer") {
            Some(func) => unsafe {
                func(
                    command_queue,
                    buffer,
                    blocking_write,
                    offset,
                    size,
                    ptr_arg,
                    num_events_in_wait_list,
                    event_wait_list,
                    event,
                )
            },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe {
                (call.dispatch().enqueue_write_buffer)(
                    command_queue,
                    buffer,
                    blocking_write,
                    offset,
                    size,
                    ptr_arg,
                    num_events_in_wait_list,
                    event_wait_list,
                    event,
                )
            });
            unsafe { track_out_event(call, ret, event) };
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clRetainEvent(event: cl_event) -> cl_int {
    pipeline::intercepted(
        FnId::RetainEvent,
        || match dispatch::fresh::<FnClRetainEvent>("clRetainEvent") {
            Some(func) => unsafe { func(event) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().retain_event)(event) });
            if ret == CL_SUCCESS {
                call.track_retain(ObjectKind::Event, Handle::from_ptr(event));
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clReleaseEvent(event: cl_event) -> cl_int {
    pipeline::intercepted(
        FnId::ReleaseEvent,
        || match dispatch::fresh::<FnClReleaseEvent>("clReleaseEvent") {
            Some(func) => unsafe { func(event) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let ret = call.check(unsafe { (call.dispatch().release_event)(event) });
            if ret == CL_SUCCESS {
                call.track_release(ObjectKind::Event, Handle::from_ptr(event));
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clWaitForEvents(
    num_events: cl_uint,
    event_list: *const cl_event,
) -> cl_int {
    pipeline::intercepted(
        FnId::WaitForEvents,
        || match dispatch::fresh::<FnClWaitForEvents>("clWaitForEvents") {
            Some(func) => unsafe { func(num_events, event_list) },
            None => CL_INVALID_OPERATION,
        },
        |call| call.check(unsafe { (call.dispatch().wait_for_events)(num_events, event_list) }),
    )
}

#[no_mangle]
pub unsafe extern "C" fn clFlush(command_queue: cl_command_queue) -> cl_int {
    pipeline::intercepted(
        FnId::Flush,
        || match dispatch::fresh::<FnClFlush>("clFlush") {
            Some(func) => unsafe { func(command_queue) },
            None => CL_INVALID_OPERATION,
        },
        |call| call.check(unsafe { (call.dispatch().flush)(command_queue) }),
    )
}

#[no_mangle]
pub unsafe extern "C" fn clFinish(command_queue: cl_command_queue) -> cl_int {
    pipeline::intercepted(
        FnId::Finish,
        || match dispatch::fresh::<FnClFinish>("clFinish") {
            Some(func) => unsafe { func(command_queue) },
            None => CL_INVALID_OPERATION,
        },
        |call| call.check(unsafe { (call.dispatch().finish)(command_queue) }),
    )
}

// Extension discovery. Handing back our own wrappers here is the one
// behavioral override the shim performs: without it the application would
// receive raw real-implementation pointers and bypass interception for
// every extension call.

macro_rules! exported {
    ($func:ident: $shape:ty) => {
        $func as $shape as usize as *mut c_void
    };
}

fn interposed_extension(name: &str) -> Option<*mut c_void> {
    let addr = match name {
        "clCreateCommandBufferKHR" => {
            exported!(clCreateCommandBufferKHR: FnClCreateCommandBufferKHR)
        }
        "clRetainCommandBufferKHR" => {
            exported!(clRetainCommandBufferKHR: FnClRetainCommandBufferKHR)
        }
        "clReleaseCommandBufferKHR" => {
            exported!(clReleaseCommandBufferKHR: FnClReleaseCommandBufferKHR)
        }
        "clFinalizeCommandBufferKHR" => {
            exported!(clFinalizeCommandBufferKHR: FnClFinalizeCommandBufferKHR)
        }
        "clEnqueueCommandBufferKHR" => {
            exported!(clEnqueueCommandBufferKHR: FnClEnqueueCommandBufferKHR)
        }
        "clCommandCopyBufferKHR" => exported!(clCommandCopyBufferKHR: FnClCommandCopyBufferKHR),
        "clCommandFillBufferKHR" => exported!(clCommandFillBufferKHR: FnClCommandFillBufferKHR),
        "clCommandNDRangeKernelKHR" => {
            exported!(clCommandNDRangeKernelKHR: FnClCommandNDRangeKernelKHR)
        }
        "clCommandBarrierWithWaitListKHR" => {
            exported!(clCommandBarrierWithWaitListKHR: FnClCommandBarrierWithWaitListKHR)
        }
        "clCreateSemaphoreWithPropertiesKHR" => {
            exported!(clCreateSemaphoreWithPropertiesKHR: FnClCreateSemaphoreWithPropertiesKHR)
        }
        "clRetainSemaphoreKHR" => exported!(clRetainSemaphoreKHR: FnClRetainSemaphoreKHR),
        "clReleaseSemaphoreKHR" => exported!(clReleaseSemaphoreKHR: FnClReleaseSemaphoreKHR),
        _ => return None,
    };
    Some(addr)
}

#[no_mangle]
pub unsafe extern "C" fn clGetExtensionFunctionAddressForPlatform(
    platform: cl_platform_id,
    func_name: *const c_char,
) -> *mut c_void {
    pipeline::intercepted(
        FnId::GetExtensionFunctionAddressForPlatform,
        || match dispatch::fresh::<FnClGetExtensionFunctionAddressForPlatform>(
            "clGetExtensionFunctionAddressForPlatform",
        ) {
            Some(func) => unsafe { func(platform, func_name) },
            None => ptr::null_mut(),
        },
        |call| {
            if let Some(name) = unsafe { cstr(func_name) } {
                if let Some(ours) = interposed_extension(name) {
                    return ours;
                }
            }
            unsafe {
                (call.dispatch().get_extension_function_address_for_platform)(platform, func_name)
            }
        },
    )
}

// Command buffers.

#[no_mangle]
pub unsafe extern "C" fn clCreateCommandBufferKHR(
    num_queues: cl_uint,
    queues: *const cl_command_queue,
    properties: *const cl_command_buffer_properties_khr,
    errcode_ret: *mut cl_int,
) -> cl_command_buffer_khr {
    pipeline::intercepted(
        FnId::CreateCommandBufferKHR,
        || match dispatch::fresh::<FnClCreateCommandBufferKHR>("clCreateCommandBufferKHR") {
            Some(func) => unsafe { func(num_queues, queues, properties, errcode_ret) },
            None => unsafe { fail_create(errcode_ret) },
        },
        |call| {
            let Some(func) = call.dispatch().create_command_buffer_khr() else {
                call.check(CL_INVALID_OPERATION);
                return unsafe { fail_create(errcode_ret) };
            };
            let mut local_err = CL_SUCCESS;
            let errcode_ret = errcode_or_local(errcode_ret, &mut local_err);
            let ret = unsafe { func(num_queues, queues, properties, errcode_ret) };
            call.check(unsafe { *errcode_ret });
            call.track_allocation(ObjectKind::CommandBuffer, Handle::from_ptr(ret));
            if !ret.is_null() && call.intercept().config().cmdbuf_tracing {
                let in_order = num_queues > 0
                    && !queues.is_null()
                    && queue_is_in_order(call.dispatch(), unsafe { *queues });
                call.intercept()
                    .tracer()
                    .create(Handle::from_ptr(ret), in_order);
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clRetainCommandBufferKHR(command_buffer: cl_command_buffer_khr) -> cl_int {
    pipeline::intercepted(
        FnId::RetainCommandBufferKHR,
        || match dispatch::fresh::<FnClRetainCommandBufferKHR>("clRetainCommandBufferKHR") {
            Some(func) => unsafe { func(command_buffer) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let Some(func) = call.dispatch().retain_command_buffer_khr() else {
                return call.check(CL_INVALID_OPERATION);
            };
            let ret = call.check(unsafe { func(command_buffer) });
            if ret == CL_SUCCESS {
                call.track_retain(ObjectKind::CommandBuffer, Handle::from_ptr(command_buffer));
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clReleaseCommandBufferKHR(
    command_buffer: cl_command_buffer_khr,
) -> cl_int {
    pipeline::intercepted(
        FnId::ReleaseCommandBufferKHR,
        || match dispatch::fresh::<FnClReleaseCommandBufferKHR>("clReleaseCommandBufferKHR") {
            Some(func) => unsafe { func(command_buffer) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let Some(func) = call.dispatch().release_command_buffer_khr() else {
                return call.check(CL_INVALID_OPERATION);
            };
            let ret = call.check(unsafe { func(command_buffer) });
            if ret == CL_SUCCESS {
                call.track_release(ObjectKind::CommandBuffer, Handle::from_ptr(command_buffer));
                // A recording destroyed before finalize is silently dropped.
                call.intercept()
                    .tracer()
                    .discard(Handle::from_ptr(command_buffer));
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clFinalizeCommandBufferKHR(
    command_buffer: cl_command_buffer_khr,
) -> cl_int {
    pipeline::intercepted(
        FnId::FinalizeCommandBufferKHR,
        || match dispatch::fresh::<FnClFinalizeCommandBufferKHR>("clFinalizeCommandBufferKHR") {
            Some(func) => unsafe { func(command_buffer) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let Some(func) = call.dispatch().finalize_command_buffer_khr() else {
                return call.check(CL_INVALID_OPERATION);
            };
            let ret = call.check(unsafe { func(command_buffer) });
            if ret == CL_SUCCESS {
                let handle = Handle::from_ptr(command_buffer);
                if let Some(graph) = call.intercept().tracer().finalize(handle) {
                    call.intercept().dump_trace(handle, &graph);
                }
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clEnqueueCommandBufferKHR(
    num_queues: cl_uint,
    queues: *mut cl_command_queue,
    command_buffer: cl_command_buffer_khr,
    num_events_in_wait_list: cl_uint,
    event_wait_list: *const cl_event,
    event: *mut cl_event,
) -> cl_int {
    pipeline::intercepted(
        FnId::EnqueueCommandBufferKHR,
        || match dispatch::fresh::<FnClEnqueueCommandBufferKHR>("clEnqueueCommandBufferKHR") {
            Some(func) => unsafe {
                func(
                    num_queues,
                    queues,
                    command_buffer,
                    num_events_in_wait_list,
                    event_wait_list,
                    event,
                )
            },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let Some(func) = call.dispatch().enqueue_command_buffer_khr() else {
                return call.check(CL_INVALID_OPERATION);
            };
            let ret = call.check(unsafe {
                func(
                    num_queues,
                    queues,
                    command_buffer,
                    num_events_in_wait_list,
                    event_wait_list,
                    event,
                )
            });
            unsafe { track_out_event(call, ret, event) };
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clCommandCopyBufferKHR(
    command_buffer: cl_command_buffer_khr,
    command_queue: cl_command_queue,
    src_buffer: cl_mem,
    dst_buffer: cl_mem,
    src_offset: usize,
    dst_offset: usize,
    size: usize,
    num_sync_points_in_wait_list: cl_uint,
    sync_point_wait_list: *const cl_sync_point_khr,
    sync_point: *mut cl_sync_point_khr,
    mutable_handle: *mut cl_mutable_command_khr,
) -> cl_int {
    pipeline::intercepted(
        FnId::CommandCopyBufferKHR,
        || match dispatch::fresh::<FnClCommandCopyBufferKHR>("clCommandCopyBufferKHR") {
            Some(func) => unsafe {
                func(
                    command_buffer,
                    command_queue,
                    src_buffer,
                    dst_buffer,
                    src_offset,
                    dst_offset,
                    size,
                    num_sync_points_in_wait_list,
                    sync_point_wait_list,
                    sync_point,
                    mutable_handle,
                )
            },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let Some(func) = call.dispatch().command_copy_buffer_khr() else {
                return call.check(CL_INVALID_OPERATION);
            };
            let ret = call.check(unsafe {
                func(
                    command_buffer,
                    command_queue,
                    src_buffer,
                    dst_buffer,
                    src_offset,
                    dst_offset,
                    size,
                    num_sync_points_in_wait_list,
                    sync_point_wait_list,
                    sync_point,
                    mutable_handle,
                )
            });
            if ret == CL_SUCCESS && call.intercept().config().cmdbuf_tracing {
                call.intercept().tracer().record_command(
                    Handle::from_ptr(command_buffer),
                    FnId::CommandCopyBufferKHR.name(),
                    "",
                    unsafe { sync_points(num_sync_points_in_wait_list, sync_point_wait_list) },
                    unsafe { out_sync_point(sync_point) },
                );
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clCommandFillBufferKHR(
    command_buffer: cl_command_buffer_khr,
    command_queue: cl_command_queue,
    buffer: cl_mem,
    pattern: *const c_void,
    pattern_size: usize,
    offset: usize,
    size: usize,
    num_sync_points_in_wait_list: cl_uint,
    sync_point_wait_list: *const cl_sync_point_khr,
    sync_point: *mut cl_sync_point_khr,
    mutable_handle: *mut cl_mutable_command_khr,
) -> cl_int {
    pipeline::intercepted(
        FnId::CommandFillBufferKHR,
        || match dispatch::fresh::<FnClCommandFillBufferKHR>("clCommandFillBufferKHR") {
            Some(func) => unsafe {
                func(
                    command_buffer,
                    command_queue,
                    buffer,
                    pattern,
                    pattern_size,
                    offset,
                    size,
                    num_sync_points_in_wait_list,
                    sync_point_wait_list,
                    sync_point,
                    mutable_handle,
                )
            },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let Some(func) = call.dispatch().command_fill_buffer_khr() else {
                return call.check(CL_INVALID_OPERATION);
            };
            let ret = call.check(unsafe {
                func(
                    command_buffer,
                    command_queue,
                    buffer,
                    pattern,
                    pattern_size,
                    offset,
                    size,
                    num_sync_points_in_wait_list,
                    sync_point_wait_list,
                    sync_point,
                    mutable_handle,
                )
            });
            if ret == CL_SUCCESS && call.intercept().config().cmdbuf_tracing {
                call.intercept().tracer().record_command(
                    Handle::from_ptr(command_buffer),
                    FnId::CommandFillBufferKHR.name(),
                    "",
                    unsafe { sync_points(num_sync_points_in_wait_list, sync_point_wait_list) },
                    unsafe { out_sync_point(sync_point) },
                );
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clCommandNDRangeKernelKHR(
    command_buffer: cl_command_buffer_khr,
    command_queue: cl_command_queue,
    properties: *const cl_command_properties_khr,
    kernel: cl_kernel,
    work_dim: cl_uint,
    global_work_offset: *const usize,
    global_work_size: *const usize,
    local_work_size: *const usize,
    num_sync_points_in_wait_list: cl_uint,
    sync_point_wait_list: *const cl_sync_point_khr,
    sync_point: *mut cl_sync_point_khr,
    mutable_handle: *mut cl_mutable_command_khr,
) -> cl_int {
    pipeline::intercepted(
        FnId::CommandNDRangeKernelKHR,
        || match dispatch::fresh::<FnClCommandNDRangeKernelKHR>("clCommandNDRangeKernelKHR") {
            Some(func) => unsafe {
                func(
                    command_buffer,
                    command_queue,
                    properties,
                    kernel,
                    work_dim,
                    global_work_offset,
                    global_work_size,
                    local_work_size,
                    num_sync_points_in_wait_list,
                    sync_point_wait_list,
                    sync_point,
                    mutable_handle,
                )
            },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let Some(func) = call.dispatch().command_ndrange_kernel_khr() else {
                return call.check(CL_INVALID_OPERATION);
            };
            let ret = call.check(unsafe {
                func(
                    command_buffer,
                    command_queue,
                    properties,
                    kernel,
                    work_dim,
                    global_work_offset,
                    global_work_size,
                    local_work_size,
                    num_sync_points_in_wait_list,
                    sync_point_wait_list,
                    sync_point,
                    mutable_handle,
                )
            });
            if ret == CL_SUCCESS && call.intercept().config().cmdbuf_tracing {
                // Tag the node with the kernel's name when we saw it created.
                let tag = call
                    .intercept()
                    .kernel_name(Handle::from_ptr(kernel))
                    .unwrap_or_default();
                call.intercept().tracer().record_command(
                    Handle::from_ptr(command_buffer),
                    FnId::CommandNDRangeKernelKHR.name(),
                    &tag,
                    unsafe { sync_points(num_sync_points_in_wait_list, sync_point_wait_list) },
                    unsafe { out_sync_point(sync_point) },
                );
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clCommandBarrierWithWaitListKHR(
    command_buffer: cl_command_buffer_khr,
    command_queue: cl_command_queue,
    num_sync_points_in_wait_list: cl_uint,
    sync_point_wait_list: *const cl_sync_point_khr,
    sync_point: *mut cl_sync_point_khr,
    mutable_handle: *mut cl_mutable_command_khr,
) -> cl_int {
    pipeline::intercepted(
        FnId::CommandBarrierWithWaitListKHR,
        || match dispatch::fresh::<FnClCommandBarrierWithWaitListKHR>(
            "clCommandBarrierWithWaitListKHR",
        ) {
            Some(func) => unsafe {
                func(
                    command_buffer,
                    command_queue,
                    num_sync_points_in_wait_list,
                    sync_point_wait_list,
                    sync_point,
                    mutable_handle,
                )
            },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let Some(func) = call.dispatch().command_barrier_with_wait_list_khr() else {
                return call.check(CL_INVALID_OPERATION);
            };
            let ret = call.check(unsafe {
                func(
                    command_buffer,
                    command_queue,
                    num_sync_points_in_wait_list,
                    sync_point_wait_list,
                    sync_point,
                    mutable_handle,
                )
            });
            if ret == CL_SUCCESS && call.intercept().config().cmdbuf_tracing {
                call.intercept().tracer().record_barrier(
                    Handle::from_ptr(command_buffer),
                    FnId::CommandBarrierWithWaitListKHR.name(),
                    unsafe { sync_points(num_sync_points_in_wait_list, sync_point_wait_list) },
                    unsafe { out_sync_point(sync_point) },
                );
            }
            ret
        },
    )
}

// Semaphores.

#[no_mangle]
pub unsafe extern "C" fn clCreateSemaphoreWithPropertiesKHR(
    context: cl_context,
    sema_props: *const cl_semaphore_properties_khr,
    errcode_ret: *mut cl_int,
) -> cl_semaphore_khr {
    pipeline::intercepted(
        FnId::CreateSemaphoreWithPropertiesKHR,
        || match dispatch::fresh::<FnClCreateSemaphoreWithPropertiesKHR>(
            "clCreateSemaphoreWithPropertiesKHR",
        ) {
            Some(func) => unsafe { func(context, sema_props, errcode_ret) },
            None => unsafe { fail_create(errcode_ret) },
        },
        |call| {
            let Some(func) = call.dispatch().create_semaphore_with_properties_khr() else {
                call.check(CL_INVALID_OPERATION);
                return unsafe { fail_create(errcode_ret) };
            };
            let mut local_err = CL_SUCCESS;
            let errcode_ret = errcode_or_local(errcode_ret, &mut local_err);
            let ret = unsafe { func(context, sema_props, errcode_ret) };
            call.check(unsafe { *errcode_ret });
            call.track_allocation(ObjectKind::Semaphore, Handle::from_ptr(ret));
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clRetainSemaphoreKHR(sema_object: cl_semaphore_khr) -> cl_int {
    pipeline::intercepted(
        FnId::RetainSemaphoreKHR,
        || match dispatch::fresh::<FnClRetainSemaphoreKHR>("clRetainSemaphoreKHR") {
            Some(func) => unsafe { func(sema_object) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let Some(func) = call.dispatch().retain_semaphore_khr() else {
                return call.check(CL_INVALID_OPERATION);
            };
            let ret = call.check(unsafe { func(sema_object) });
            if ret == CL_SUCCESS {
                call.track_retain(ObjectKind::Semaphore, Handle::from_ptr(sema_object));
            }
            ret
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn clReleaseSemaphoreKHR(sema_object: cl_semaphore_khr) -> cl_int {
    pipeline::intercepted(
        FnId::ReleaseSemaphoreKHR,
        || match dispatch::fresh::<FnClReleaseSemaphoreKHR>("clReleaseSemaphoreKHR") {
            Some(func) => unsafe { func(sema_object) },
            None => CL_INVALID_OPERATION,
        },
        |call| {
            let Some(func) = call.dispatch().release_semaphore_khr() else {
                return call.check(CL_INVALID_OPERATION);
            };
            let ret = call.check(unsafe { func(sema_object) });
            if ret == CL_SUCCESS {
                call.track_release(ObjectKind::Semaphore, Handle::from_ptr(sema_object));
            }
            ret
        },
    )
}
