//! Fiber-local storage lifecycle, driven through the public `locals`
//! surface.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use fiber_rt::{locals, ops, Fiber};

const STACK_SIZE: usize = 64 * 1024;

static FREE_CALLS: AtomicUsize = AtomicUsize::new(0);
static FREED_VALUE: AtomicU64 = AtomicU64::new(0);

unsafe extern "C" fn free_marker(value: *mut ()) {
	FREE_CALLS.fetch_add(1, Ordering::SeqCst);
	FREED_VALUE.store(value as u64, Ordering::SeqCst);
}

unsafe extern "C" fn entry(_me: *mut Fiber, arg: *mut ()) {
	let mut key: i64 = 0;

	unsafe { locals::set_specific(&mut key, arg, Some(free_marker)) }.expect("set_specific");

	assert_eq!(key, 1);
	assert_eq!(locals::get_specific(key), arg);
}

/// A fiber registers one local-storage slot with a free function; once
/// it exits, the free function must run exactly once, with the value
/// it was registered with.
#[test]
fn registered_free_fn_runs_exactly_once_on_exit() {
	let marker = Box::into_raw(Box::new(0_u8));
	let value = marker.cast::<()>();

	ops::create(STACK_SIZE, entry, value);
	ops::schedule();

	assert_eq!(FREE_CALLS.load(Ordering::SeqCst), 1);
	assert_eq!(FREED_VALUE.load(Ordering::SeqCst), value as u64);

	// Safety: `marker` was leaked above specifically so the fiber's
	// copy of the pointer stayed valid until `free_marker` ran; this
	// is the only place that reclaims it, after both writes above.
	unsafe { drop(Box::from_raw(marker)) };
}

/// Reading an unassigned or out-of-range key from outside any fiber
/// never panics and always returns null.
#[test]
fn get_specific_outside_a_fiber_is_null() {
	assert!(locals::get_specific(0).is_null());
	assert!(locals::get_specific(1).is_null());
}
