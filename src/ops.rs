//! The public operations surface: the state machine over fiber
//! status (create/yield/switch/exit/kill) plus the scheduler loop.
//!
//! Every operation here takes or returns a raw `*mut Fiber` handle —
//! there is no safe owned wrapper, mirroring the opaque-pointer style
//! of the reference library this was built from. Callers on the
//! fiber's own OS thread may treat a handle as valid for as long as
//! the fiber hasn't exited.

use crate::fiber::{self, EntryFn, Fiber, Status, KILLED};
use crate::runtime::{self, Runtime};
use crate::{info, trace};

/// Creates a new fiber in READY status and enqueues it. Does not run
/// it; the scheduler or a subsequent `yield`/`switch` will.
#[must_use]
pub fn create(stack_size: usize, entry: EntryFn, arg: *mut ()) -> *mut Fiber {
	let fiber = runtime::with(|rt| rt.create(stack_size, entry, arg));

	// Safety: `create` always returns a freshly initialized fiber.
	trace!("created fiber {}", unsafe { (*fiber).id });

	fiber
}

/// The currently executing fiber, or null if called from the
/// scheduler context.
#[must_use]
pub fn running() -> *mut Fiber {
	runtime::with(Runtime::running)
}

/// The id of the running fiber, or 0 if called from the scheduler
/// context.
#[must_use]
pub fn self_id() -> u64 {
	runtime::with(Runtime::self_id)
}

/// # Safety
/// `fiber` must be a valid, non-dangling handle returned by [`create`].
#[must_use]
pub unsafe fn id(fiber: *const Fiber) -> u64 {
	Runtime::id_of(fiber)
}

/// # Safety
/// `fiber` must be a valid, non-dangling handle returned by [`create`].
#[must_use]
pub unsafe fn status(fiber: *const Fiber) -> Status {
	Runtime::status_of(fiber)
}

/// # Safety
/// `fiber` must be a valid, non-dangling handle returned by [`create`].
#[must_use]
pub unsafe fn killed(fiber: *const Fiber) -> bool {
	Runtime::killed(fiber)
}

/// Re-enqueues `fiber` onto the ready queue with status READY, unless
/// it has already exited. Callers must not double-enqueue a fiber
/// already on the ready queue.
///
/// # Safety
/// `fiber` must be a valid handle belonging to this thread's runtime.
pub unsafe fn ready(fiber: *mut Fiber) {
	runtime::with(|rt| {
		// Safety: guaranteed by caller.
		unsafe { rt.ready_fiber(fiber) };
	});
}

/// Marks the running fiber as not user-visible (infrastructure
/// fibers, e.g. I/O drivers, use this so `ndead`/the live count don't
/// count them).
pub fn system() {
	let current = runtime::with(Runtime::running);

	if !current.is_null() {
		runtime::with(|rt| rt.mark_system(current));
	}
}

pub fn count_inc() {
	runtime::with(Runtime::count_inc);
}

pub fn count_dec() {
	runtime::with(Runtime::count_dec);
}

#[must_use]
pub fn ndead() -> usize {
	runtime::with(Runtime::ndead)
}

/// If the ready queue is empty, returns 0 without switching.
/// Otherwise re-enqueues the running fiber and switches to the next
/// ready fiber; returns the number of *other* switches that occurred
/// while this fiber was descheduled.
pub fn yield_now() -> u64 {
	let before = runtime::with(Runtime::switched);
	let Some(next) = runtime::with(Runtime::pop_ready) else {
		return 0;
	};

	let current = runtime::with(Runtime::running);

	runtime::with(|rt| {
		// Safety: `current` is the fiber executing this call.
		unsafe { rt.ready_fiber(current) };
		rt.set_running(next);
		rt.record_switch();
	});

	// Safety: `current` and `next` both belong to this thread's
	// runtime; `current` is the fiber executing this call.
	unsafe { fiber::switch_fibers(current, next) };

	let after = runtime::with(Runtime::switched);

	after.saturating_sub(before).saturating_sub(1)
}

/// Unconditional cooperative switch: pops the next ready fiber and
/// switches into it, or falls back to the scheduler's origin context
/// if none are ready. Unlike [`yield_now`], does not re-enqueue the
/// caller — used by blockers that have already parked the fiber
/// elsewhere.
pub fn switch() {
	let current = runtime::with(Runtime::running);

	// Safety: `current`, when non-null, is the fiber executing this
	// call.
	let exiting = !current.is_null() && unsafe { (*current).status == Status::Exiting };

	let next = runtime::with(Runtime::pop_ready);

	runtime::with(|rt| {
		rt.set_running(next.unwrap_or(std::ptr::null_mut()));
		rt.record_switch();
	});

	if exiting {
		runtime::with(|rt| {
			// Safety: `current` was owned by this runtime's live
			// table; `fiber_swap` retires it at exactly this point,
			// right before the underlying context switch.
			unsafe { rt.retire(current) };
		});
	}

	match next {
		Some(next) => {
			// Safety: both fibers belong to this thread's runtime.
			unsafe { fiber::switch_fibers(current, next) };
		}
		None => {
			let rt = runtime::raw();

			// Safety: `rt` is this thread's runtime, stable for its
			// lifetime; `current` belongs to it.
			unsafe {
				let origin = (*rt).origin_mut();

				fiber::switch_to_origin(current, origin);
			}
		}
	}
}

/// Sets the runtime's exit code, marks the running fiber EXITING,
/// then switches away from it. Never returns: the switch implementation
/// observes EXITING and retires the fiber's slot and stack.
pub fn exit(code: i32) -> ! {
	runtime::with(|rt| rt.set_exit_code(code));

	let current = runtime::with(Runtime::running);

	if !current.is_null() {
		// Safety: `current` is the fiber executing this call.
		unsafe { (*current).status = Status::Exiting };
	}

	self::switch();

	crate::unreachable_unchecked!("exited fiber was resumed")
}

/// Sets the KILLED flag on `target`. If `target` is the caller,
/// returns without switching — the caller observes the flag at its
/// next cancellation check. Otherwise detaches both the caller and
/// the target from the ready queue, re-enqueues the target, then
/// yields.
///
/// # Safety
/// `target` must be a valid handle belonging to this thread's
/// runtime.
pub unsafe fn kill(target: *mut Fiber) {
	// Safety: guaranteed by caller.
	unsafe { (*target).flags |= KILLED };

	let current = runtime::with(Runtime::running);

	if std::ptr::eq(target, current) {
		return;
	}

	runtime::with(|rt| {
		rt.detach_ready(current);
		rt.detach_ready(target);

		// Safety: `target` is a valid fiber belonging to this runtime.
		unsafe { rt.ready_fiber(target) };
	});

	let _ = yield_now();
}

/// Runs the scheduler loop on the calling thread: enables
/// syscall-hook mode, dispatches ready fibers to completion or
/// suspension, drains the dead cache, then disables hook mode.
///
/// Returns once the ready queue is empty and stays empty (every
/// dispatched fiber either exited or was re-parked by a blocker
/// without re-readying itself before control returned here).
pub fn schedule() {
	runtime::with(|rt| rt.set_hooked(true));

	loop {
		let Some(next) = runtime::with(Runtime::pop_ready) else {
			info!("no fibers ready, scheduler returning");
			break;
		};

		runtime::with(|rt| {
			rt.set_running(next);
			rt.record_switch();
		});

		let rt = runtime::raw();

		// Safety: `rt` is this thread's runtime, stable for its
		// lifetime.
		unsafe {
			let origin = (*rt).origin_mut();

			fiber::switch_from_origin(origin, next);
		}

		runtime::with(|rt| rt.set_running(std::ptr::null_mut()));
	}

	runtime::with(Runtime::drain_dead);
	runtime::with(|rt| rt.set_hooked(false));
}
