//! Per-fiber errno isolation and the `fcntl`/`errno_location` syscall
//! interposition boundary.
//!
//! Grounded on the reference library's `dlsym(RTLD_NEXT, ...)`
//! approach: the real libc entry points are looked up once and kept
//! around, and our overrides forward to them after doing their
//! per-fiber bookkeeping. Unlike the original's fully variadic
//! `fcntl(fd, cmd, ...)`, the override here takes a fixed `c_long`
//! third argument — Rust can declare but not itself define a
//! C-variadic function on stable, so the handful of `fcntl` commands
//! that take more than one extra argument (locking commands taking a
//! `struct flock*`) are out of scope for the override and simply
//! forwarded with the argument reinterpreted as a pointer.

use std::sync::OnceLock;

use libc::{c_int, c_long, F_GETFD, F_GETFL, F_GETLK, F_SETFD, F_SETFL, F_SETLK, F_SETLKW};

use crate::error::{Error, ErrorKind};
use crate::fiber::SAVE_ERRNO;
use crate::runtime::{self, Runtime};

/// Toggles whether overridden syscalls consult per-fiber errno and
/// route through blocking adapters. The scheduler loop flips this on
/// for its own duration; callers may also toggle it directly (e.g. in
/// tests).
pub fn hook_api(on: bool) {
	runtime::with(|rt| rt.set_hooked(on));
}

/// Copies the OS errno into the running fiber's shadow, unless
/// `SAVE_ERRNO` is set on it (a no-op in that case — including not
/// clearing the flag; see the module-level open question this
/// preserves).
pub fn save_errno() {
	let errno = os_errno();
	let current = runtime::with(Runtime::running);

	if current.is_null() {
		runtime::with(|rt| rt.origin_mut().errnum = errno);
		return;
	}

	// Safety: `current` is the fiber executing this call.
	let suppressed = unsafe { (*current).flags & SAVE_ERRNO != 0 };

	if suppressed {
		return;
	}

	// Safety: `current` is the fiber executing this call.
	unsafe {
		(*current).errnum = errno;
	}
}

/// Address of the running fiber's errno shadow when hooking is
/// enabled (or the origin's, when no fiber runs); the OS's own errno
/// location otherwise.
#[must_use]
pub fn errno_location() -> *mut c_int {
	if !runtime::with(Runtime::hooked) {
		return real_errno_location();
	}

	let current = runtime::with(Runtime::running);

	if current.is_null() {
		runtime::with(Runtime::origin_errnum_ptr)
	} else {
		// Safety: `current` is a valid fiber belonging to this runtime.
		unsafe { std::ptr::addr_of_mut!((*current).errnum) }
	}
}

/// The fiber-private errno shadow's current value: the running
/// fiber's, or the origin's if none runs.
#[must_use]
pub fn errno() -> i32 {
	// Safety: `errno_location` always returns a valid, initialized
	// `i32` location for the calling thread.
	unsafe { *errno_location() }
}

/// Sets the fiber-private errno shadow.
pub fn set_errno(value: i32) {
	// Safety: see `errno`.
	unsafe {
		*errno_location() = value;
	}
}

/// Sets `SAVE_ERRNO` on the running fiber, suppressing further
/// `save_errno` overwrites until cleared.
pub fn keep_errno(on: bool) {
	let current = runtime::with(Runtime::running);

	if current.is_null() {
		return;
	}

	// Safety: `current` is the fiber executing this call.
	unsafe {
		if on {
			(*current).flags |= SAVE_ERRNO;
		} else {
			(*current).flags &= !SAVE_ERRNO;
		}
	}
}

fn os_errno() -> i32 {
	// Safety: always a valid, per-thread location provided by libc.
	unsafe { *real_errno_location() }
}

fn real_errno_location() -> *mut c_int {
	// Safety: `__errno_location` returns the calling thread's own
	// errno cell; no precondition beyond being on a libc-backed target.
	unsafe { libc::__errno_location() }
}

type FcntlFn = unsafe extern "C" fn(c_int, c_int, c_long) -> c_int;

static REAL_FCNTL: OnceLock<usize> = OnceLock::new();

fn real_fcntl() -> FcntlFn {
	let addr = *REAL_FCNTL.get_or_init(|| {
		// Safety: `RTLD_NEXT` plus a well-known libc symbol name; the
		// result, if non-null, is a valid C function pointer with
		// `fcntl`'s calling convention.
		let sym = unsafe { libc::dlsym(libc::RTLD_NEXT, c"fcntl".as_ptr()) };

		if sym.is_null() {
			crate::panic_nounwind!("fatal: dlsym(RTLD_NEXT, \"fcntl\") failed");
		}

		sym as usize
	});

	// Safety: `addr` was validated non-null above and resolved against
	// the real `fcntl` symbol.
	unsafe { std::mem::transmute::<usize, FcntlFn>(addr) }
}

/// Forwards to the real `fcntl` for the commands the original library
/// recognizes; any other command is rejected the same way the
/// original's `default:` switch arm is, without ever reaching the real
/// syscall.
///
/// # Safety
/// Same contract as libc's `fcntl`: `fd` must be a valid descriptor
/// and `arg`'s meaning depends on `cmd`.
pub unsafe fn fcntl(fd: c_int, cmd: c_int, arg: c_long) -> c_int {
	let ret = match cmd {
		F_GETFD | F_GETFL | F_SETFD | F_SETFL | F_GETLK | F_SETLK | F_SETLKW => {
			let real = real_fcntl();

			// Safety: guaranteed by caller; `real` has `fcntl`'s ABI.
			unsafe { real(fd, cmd, arg) }
		}
		_ => {
			let err = Error::from(ErrorKind::UnknownFcntlCmd);

			crate::info!("fcntl: {err} (cmd {cmd}, fd {fd})");

			-1
		}
	};

	if ret < 0 {
		save_errno();
	}

	ret
}

#[cfg(test)]
mod tests {
	use super::{errno, fcntl, hook_api, keep_errno, set_errno};

	#[test]
	fn unhooked_errno_is_os_errno() {
		hook_api(false);
		set_errno(42);

		assert_eq!(errno(), 42);
	}

	#[test]
	fn hooked_errno_uses_origin_shadow_outside_a_fiber() {
		hook_api(true);
		set_errno(7);

		assert_eq!(errno(), 7);

		hook_api(false);
	}

	#[test]
	fn keep_errno_without_running_fiber_is_a_noop() {
		// No fiber runs on a plain test thread, so this must not panic.
		keep_errno(true);
		keep_errno(false);
	}

	#[test]
	fn fcntl_rejects_an_unrecognized_command_without_touching_the_fd() {
		// Safety: the command is unrecognized, so the real `fcntl` is
		// never called and `fd` is never dereferenced.
		let ret = unsafe { fcntl(-1, i32::MAX, 0) };

		assert_eq!(ret, -1);
	}
}
