//! End-to-end interception against the fake driver: the exported entry
//! points forward through the dispatch table while the tracker, tracer and
//! timing observe the call stream.

mod common;

use std::ffi::CString;
use std::ptr;

use interlay::api::*;
use interlay::entry::*;
use interlay::{Config, Interlay, LeakClass, ObjectKind};

#[test]
fn full_interception_flow() {
    let dump_dir = tempfile::tempdir().unwrap();
    let config = Config {
        lib_name: None,
        call_logging: false,
        error_logging: false,
        leak_checking: true,
        host_timing: true,
        cmdbuf_tracing: true,
        dump_dir: Some(dump_dir.path().to_path_buf()),
        json_report: false,
    };
    let instance = Interlay::with_source(config, Box::new(common::FakeSource::new())).unwrap();
    let guard = interlay::install(instance).unwrap();

    let platform;
    let cmdbuf;
    let sp0;
    let sp1;
    let cmdbuf2;
    unsafe {
        // Discovery.
        let mut num_platforms = 0;
        assert_eq!(
            clGetPlatformIDs(0, ptr::null_mut(), &mut num_platforms),
            CL_SUCCESS
        );
        assert_eq!(num_platforms, 1);
        let mut platform_out: cl_platform_id = ptr::null_mut();
        assert_eq!(
            clGetPlatformIDs(1, &mut platform_out, ptr::null_mut()),
            CL_SUCCESS
        );
        platform = platform_out;
        assert_eq!(platform as usize, common::FAKE_PLATFORM);

        let mut device: cl_device_id = ptr::null_mut();
        assert_eq!(
            clGetDeviceIDs(platform, 0, 1, &mut device, ptr::null_mut()),
            CL_SUCCESS
        );
        assert_eq!(clRetainDevice(device), CL_SUCCESS);
        assert_eq!(clReleaseDevice(device), CL_SUCCESS);

        // Context, with a caller-supplied errcode slot.
        let mut err = CL_INVALID_VALUE;
        let context = clCreateContext(ptr::null(), 1, &device, None, ptr::null_mut(), &mut err);
        assert_eq!(err, CL_SUCCESS);
        assert!(!context.is_null());
        assert_eq!(clRetainContext(context), CL_SUCCESS);

        // Queues, one of them with a null errcode pointer.
        let in_order_queue = clCreateCommandQueue(context, device, 0, ptr::null_mut());
        assert!(!in_order_queue.is_null());
        let ooo_queue = clCreateCommandQueue(
            context,
            device,
            CL_QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE,
            &mut err,
        );
        assert_eq!(err, CL_SUCCESS);

        // Buffers: buf_a is released at the end, buf_b leaks on purpose.
        let buf_a = clCreateBuffer(context, 0, 64, ptr::null_mut(), &mut err);
        let buf_b = clCreateBuffer(context, 0, 64, ptr::null_mut(), &mut err);
        assert!(!buf_a.is_null() && !buf_b.is_null());

        let sampler = clCreateSamplerWithProperties(context, ptr::null(), &mut err);
        assert_eq!(err, CL_SUCCESS);
        assert_eq!(clReleaseSampler(sampler), CL_SUCCESS);

        // Program and kernel; the kernel name feeds the tracer's tags.
        let src = CString::new("kernel void vec_add() {}").unwrap();
        let src_ptr = src.as_ptr();
        let program = clCreateProgramWithSource(context, 1, &src_ptr, ptr::null(), &mut err);
        assert_eq!(err, CL_SUCCESS);
        assert_eq!(
            clBuildProgram(program, 1, &device, ptr::null(), None, ptr::null_mut()),
            CL_SUCCESS
        );
        let kernel_name = CString::new("vec_add").unwrap();
        let kernel = clCreateKernel(program, kernel_name.as_ptr(), &mut err);
        assert_eq!(err, CL_SUCCESS);

        // Enqueues; returned events are allocations.
        let gws = [64usize];
        let mut event: cl_event = ptr::null_mut();
        assert_eq!(
            clEnqueueNDRangeKernel(
                in_order_queue,
                kernel,
                1,
                ptr::null(),
                gws.as_ptr(),
                ptr::null(),
                0,
                ptr::null(),
                &mut event,
            ),
            CL_SUCCESS
        );
        assert!(!event.is_null());
        assert_eq!(clReleaseEvent(event), CL_SUCCESS);

        let mut scratch = [0u8; 64];
        assert_eq!(
            clEnqueueReadBuffer(
                in_order_queue,
                buf_a,
                1,
                0,
                scratch.len(),
                scratch.as_mut_ptr() as *mut _,
                0,
                ptr::null(),
                ptr::null_mut(),
            ),
            CL_SUCCESS
        );
        let mut write_event: cl_event = ptr::null_mut();
        assert_eq!(
            clEnqueueWriteBuffer(
                in_order_queue,
                buf_a,
                1,
                0,
                scratch.len(),
                scratch.as_ptr() as *const _,
                0,
                ptr::null(),
                &mut write_event,
            ),
            CL_SUCCESS
        );
        assert_eq!(clReleaseEvent(write_event), CL_SUCCESS);

        // The real implementation's error comes back unchanged.
        assert_eq!(clWaitForEvents(0, ptr::null()), CL_INVALID_VALUE);

        // Extension discovery hands back our own wrappers.
        let ext = CString::new("clCommandCopyBufferKHR").unwrap();
        let addr = clGetExtensionFunctionAddressForPlatform(platform, ext.as_ptr());
        assert_eq!(
            addr as usize,
            clCommandCopyBufferKHR as FnClCommandCopyBufferKHR as usize
        );
        let unknown = CString::new("clTotallyUnknownExtension").unwrap();
        assert!(clGetExtensionFunctionAddressForPlatform(platform, unknown.as_ptr()).is_null());

        // Out-of-order command buffer: two unordered commands, a barrier,
        // then a tagged kernel command.
        cmdbuf = clCreateCommandBufferKHR(1, &ooo_queue, ptr::null(), &mut err);
        assert_eq!(err, CL_SUCCESS);
        assert_eq!(
            clCommandCopyBufferKHR(
                cmdbuf,
                ooo_queue,
                buf_a,
                buf_b,
                0,
                0,
                64,
                0,
                ptr::null(),
                ptr::null_mut(),
                ptr::null_mut(),
            ),
            CL_SUCCESS
        );
        let pattern = [0u8; 4];
        assert_eq!(
            clCommandFillBufferKHR(
                cmdbuf,
                ooo_queue,
                buf_b,
                pattern.as_ptr() as *const _,
                pattern.len(),
                0,
                64,
                0,
                ptr::null(),
                ptr::null_mut(),
                ptr::null_mut(),
            ),
            CL_SUCCESS
        );
        assert_eq!(
            clCommandBarrierWithWaitListKHR(
                cmdbuf,
                ooo_queue,
                0,
                ptr::null(),
                ptr::null_mut(),
                ptr::null_mut(),
            ),
            CL_SUCCESS
        );
        assert_eq!(
            clCommandNDRangeKernelKHR(
                cmdbuf,
                ooo_queue,
                ptr::null(),
                kernel,
                1,
                ptr::null(),
                gws.as_ptr(),
                ptr::null(),
                0,
                ptr::null(),
                ptr::null_mut(),
                ptr::null_mut(),
            ),
            CL_SUCCESS
        );
        assert_eq!(clFinalizeCommandBufferKHR(cmdbuf), CL_SUCCESS);
        assert_eq!(clReleaseCommandBufferKHR(cmdbuf), CL_SUCCESS);

        // In-order command buffer with explicit sync points.
        cmdbuf2 = clCreateCommandBufferKHR(1, &in_order_queue, ptr::null(), &mut err);
        assert_eq!(err, CL_SUCCESS);
        let mut sp0_out: cl_sync_point_khr = 0;
        assert_eq!(
            clCommandCopyBufferKHR(
                cmdbuf2,
                in_order_queue,
                buf_a,
                buf_b,
                0,
                0,
                64,
                0,
                ptr::null(),
                &mut sp0_out,
                ptr::null_mut(),
            ),
            CL_SUCCESS
        );
        sp0 = sp0_out;
        let wait = [sp0];
        let mut sp1_out: cl_sync_point_khr = 0;
        assert_eq!(
            clCommandFillBufferKHR(
                cmdbuf2,
                in_order_queue,
                buf_b,
                pattern.as_ptr() as *const _,
                pattern.len(),
                0,
                64,
                1,
                wait.as_ptr(),
                &mut sp1_out,
                ptr::null_mut(),
            ),
            CL_SUCCESS
        );
        sp1 = sp1_out;
        assert_eq!(clFinalizeCommandBufferKHR(cmdbuf2), CL_SUCCESS);
        assert_eq!(clReleaseCommandBufferKHR(cmdbuf2), CL_SUCCESS);

        // Semaphores.
        let sema = clCreateSemaphoreWithPropertiesKHR(context, ptr::null(), &mut err);
        assert_eq!(err, CL_SUCCESS);
        assert_eq!(clRetainSemaphoreKHR(sema), CL_SUCCESS);
        assert_eq!(clReleaseSemaphoreKHR(sema), CL_SUCCESS);
        assert_eq!(clReleaseSemaphoreKHR(sema), CL_SUCCESS);

        // Teardown of everything except the deliberately leaked buf_b.
        assert_eq!(clReleaseKernel(kernel), CL_SUCCESS);
        assert_eq!(clReleaseProgram(program), CL_SUCCESS);
        assert_eq!(clReleaseMemObject(buf_a), CL_SUCCESS);
        assert_eq!(clFlush(in_order_queue), CL_SUCCESS);
        assert_eq!(clFinish(in_order_queue), CL_SUCCESS);
        assert_eq!(clReleaseCommandQueue(in_order_queue), CL_SUCCESS);
        assert_eq!(clReleaseCommandQueue(ooo_queue), CL_SUCCESS);
        assert_eq!(clReleaseContext(context), CL_SUCCESS);
        assert_eq!(clReleaseContext(context), CL_SUCCESS);
    }

    // The out-of-order recording was dumped on finalize.
    let graph = std::fs::read_to_string(
        dump_dir
            .path()
            .join(format!("cmdbuf_{:016x}.dot", cmdbuf as usize)),
    )
    .unwrap();
    assert_eq!(
        graph,
        "digraph {\n\
         \x20 // out-of-order command-buffer\n\
         \x20 internal0 [shape=oval, label=\"clCommandCopyBufferKHR\"]\n\
         \x20 internal1 [shape=oval, label=\"clCommandFillBufferKHR\"]\n\
         \x20 internal2 [shape=octagon, label=\"clCommandBarrierWithWaitListKHR\"]\n\
         \x20 internal0 -> internal2 [style=dotted] // barrier dependency\n\
         \x20 internal1 -> internal2 [style=dotted] // barrier dependency\n\
         \x20 internal3 [shape=oval, label=\"clCommandNDRangeKernelKHR( vec_add )\"]\n\
         \x20 internal2 -> internal3 [style=dashed] // implicit dependency\n\
         }\n"
    );

    // The in-order recording chained on sync points.
    let graph2 = std::fs::read_to_string(
        dump_dir
            .path()
            .join(format!("cmdbuf_{:016x}.dot", cmdbuf2 as usize)),
    )
    .unwrap();
    assert_eq!(
        graph2,
        format!(
            "digraph {{\n\
             \x20 // in-order command-buffer\n\
             \x20 syncpoint{sp0} [shape=oval, label=\"clCommandCopyBufferKHR\"]\n\
             \x20 syncpoint{sp1} [shape=oval, label=\"clCommandFillBufferKHR\"]\n\
             \x20 syncpoint{sp0} -> syncpoint{sp1} // explicit dependency\n\
             \x20 syncpoint{sp0} -> syncpoint{sp1} [style=dashed] // implicit dependency\n\
             }}\n"
        )
    );

    // Final accounting.
    let objects = guard.interlay().objects();
    let check = |kind: ObjectKind, alloc: u64, retains: u64, releases: u64, class: LeakClass| {
        let counts = objects.snapshot(kind);
        assert_eq!(counts.allocations, alloc, "{:?} allocations", kind);
        assert_eq!(counts.retains, retains, "{:?} retains", kind);
        assert_eq!(counts.releases, releases, "{:?} releases", kind);
        assert_eq!(counts.classify(), class, "{:?} classification", kind);
    };
    check(ObjectKind::Device, 0, 1, 1, LeakClass::Clean);
    check(ObjectKind::Context, 1, 1, 2, LeakClass::Clean);
    check(ObjectKind::CommandQueue, 2, 0, 2, LeakClass::Clean);
    check(ObjectKind::MemObject, 2, 0, 1, LeakClass::PossibleLeak);
    check(ObjectKind::Sampler, 1, 0, 1, LeakClass::Clean);
    check(ObjectKind::Program, 1, 0, 1, LeakClass::Clean);
    check(ObjectKind::Kernel, 1, 0, 1, LeakClass::Clean);
    check(ObjectKind::Event, 2, 0, 2, LeakClass::Clean);
    check(ObjectKind::Semaphore, 1, 1, 2, LeakClass::Clean);
    check(ObjectKind::CommandBuffer, 2, 0, 2, LeakClass::Clean);

    // Host timing observed the stream.
    let timing = guard.interlay().timing().snapshot();
    let calls_for = |name: &str| {
        timing
            .iter()
            .find(|row| row.name == name)
            .map(|row| row.calls)
            .unwrap_or(0)
    };
    assert_eq!(calls_for("clCreateBuffer"), 2);
    assert_eq!(calls_for("clCommandCopyBufferKHR"), 2);
    assert_eq!(calls_for("clWaitForEvents"), 1);
    assert_eq!(calls_for("clFinalizeCommandBufferKHR"), 2);

    drop(guard);
}
