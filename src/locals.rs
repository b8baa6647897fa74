//! Fiber-local storage: a dense per-fiber array of typed slots keyed
//! by small positive integers, freed automatically when the owning
//! fiber exits (see `fiber_trampoline`'s cleanup loop).

use crate::error::{Error, ErrorKind, Result};
use crate::fiber::Local;
use crate::runtime::{self, Runtime};

/// Assigns or updates a local-storage slot on the running fiber.
///
/// If `*key` is `<= 0`, a new key is allocated and written back
/// through `key`. If `*key` is greater than the thread's current
/// high-water mark, returns `InvalidKey`.
///
/// The previous occupant of the slot, if any, is leaked rather than
/// freed: this mirrors the reference library's behavior exactly.
/// Callers are expected to clear a slot themselves first, or reuse
/// the same key idempotently.
///
/// # Safety
/// `key` must point to a valid, writable `i64`. `value` is stored
/// opaquely and passed back to `free_fn` unchanged; `free_fn`, if
/// present, is invoked at most once, when the owning fiber exits.
pub unsafe fn set_specific(
	key: *mut i64, value: *mut (), free_fn: Option<unsafe extern "C" fn(*mut ())>
) -> Result<()> {
	let current = runtime::with(Runtime::running);

	if current.is_null() {
		return Err(Error::from(ErrorKind::NoRunningFiber));
	}

	// Safety: guaranteed by caller.
	let current_key = unsafe { *key };

	let resolved = if current_key <= 0 {
		let assigned = runtime::with(Runtime::alloc_local_key);

		// Safety: guaranteed by caller.
		unsafe { *key = i64::from(assigned) };

		assigned
	} else {
		let high_water = runtime::with(Runtime::nlocal);

		#[allow(clippy::cast_sign_loss)]
		if current_key as u64 > u64::from(high_water) {
			return Err(Error::from(ErrorKind::InvalidKey));
		} else {
			current_key as u32
		}
	};

	// Safety: `current` is the fiber executing this call.
	let fiber = unsafe { &mut *current };

	#[allow(clippy::cast_possible_truncation)]
	let index = (resolved - 1) as usize;

	if fiber.locals.len() <= index {
		fiber.locals.resize_with(index + 1, || None);
	}

	fiber.locals[index] = Some(Local { value, free_fn });

	Ok(())
}

/// Returns the value stored under `key` on the running fiber, or
/// null if unassigned or out of range.
#[must_use]
pub fn get_specific(key: i64) -> *mut () {
	if key <= 0 {
		return std::ptr::null_mut();
	}

	let current = runtime::with(Runtime::running);

	if current.is_null() {
		return std::ptr::null_mut();
	}

	// Safety: `current` is the fiber executing this call.
	let fiber = unsafe { &*current };

	#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
	let index = (key - 1) as usize;

	fiber
		.locals
		.get(index)
		.and_then(Option::as_ref)
		.map_or(std::ptr::null_mut(), |local| local.value)
}

#[cfg(test)]
mod tests {
	use super::{get_specific, set_specific};
	use crate::error::ErrorKind;

	#[test]
	fn get_specific_out_of_range_is_null() {
		assert!(get_specific(0).is_null());
		assert!(get_specific(-1).is_null());
		assert!(get_specific(999).is_null());
	}

	#[test]
	fn set_specific_without_running_fiber_errors() {
		let mut key: i64 = 0;

		// Safety: no running fiber, so `value`/`free_fn` are never touched.
		let err = unsafe { set_specific(&mut key, std::ptr::null_mut(), None) }.unwrap_err();

		assert_eq!(err.kind(), ErrorKind::NoRunningFiber);

		// The missing-fiber check must run before a key is allocated, so
		// a fresh key is left untouched rather than silently consumed.
		assert_eq!(key, 0);
	}
}
