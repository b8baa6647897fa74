//! End-to-end scheduler behavior, driven entirely through the public
//! `ops`/`errno` surface the way an embedding application would.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use fiber_rt::{errno, ops, Fiber};

const STACK_SIZE: usize = 64 * 1024;

/// A single fiber that finds the ready queue empty: `yield_now` must
/// return 0 without switching, and the fiber simply continues and
/// exits.
#[test]
fn yield_with_empty_ready_queue_is_a_noop() {
	static RETURNED: AtomicU64 = AtomicU64::new(u64::MAX);

	unsafe extern "C" fn entry(_me: *mut Fiber, _arg: *mut ()) {
		let n = ops::yield_now();
		RETURNED.store(n, Ordering::SeqCst);
	}

	ops::create(STACK_SIZE, entry, std::ptr::null_mut());
	ops::schedule();

	assert_eq!(RETURNED.load(Ordering::SeqCst), 0);
	assert_eq!(ops::ndead(), 0);
}

/// Three fibers created in order A, B, C; each runs once and yields
/// exactly once before exiting. Ready is LIFO (most recently enqueued
/// runs first), so the most recently *created* fiber is dispatched
/// first, and since none of the others have run yet when the first
/// yields, the queue drains in strict reverse-creation order.
#[test]
fn lifo_ready_queue_dispatches_newest_first() {
	static ORDER: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

	unsafe extern "C" fn entry(_me: *mut Fiber, arg: *mut ()) {
		let label = unsafe { *arg.cast::<&'static str>() };
		ORDER.lock().unwrap().push(label);
		ops::yield_now();
	}

	let a: &'static str = "a";
	let b: &'static str = "b";
	let c: &'static str = "c";

	ops::create(STACK_SIZE, entry, std::ptr::addr_of!(a).cast_mut().cast());
	ops::create(STACK_SIZE, entry, std::ptr::addr_of!(b).cast_mut().cast());
	ops::create(STACK_SIZE, entry, std::ptr::addr_of!(c).cast_mut().cast());

	ops::schedule();

	assert_eq!(*ORDER.lock().unwrap(), vec!["c", "b", "a"]);
	assert_eq!(ops::ndead(), 0);
}

/// A fiber that creates a second fiber and kills it before the second
/// one ever runs: the target must observe `killed()` on its very
/// first scheduling and exit without looping.
#[test]
fn kill_is_observed_before_the_target_ever_runs() {
	static B_SAW_KILLED: AtomicUsize = AtomicUsize::new(0);
	static B_LOOP_ITERATIONS: AtomicUsize = AtomicUsize::new(0);

	unsafe extern "C" fn victim(me: *mut Fiber, _arg: *mut ()) {
		loop {
			if unsafe { ops::killed(me) } {
				B_SAW_KILLED.fetch_add(1, Ordering::SeqCst);
				return;
			}

			B_LOOP_ITERATIONS.fetch_add(1, Ordering::SeqCst);
			ops::yield_now();
		}
	}

	unsafe extern "C" fn killer(_me: *mut Fiber, _arg: *mut ()) {
		let victim_handle = ops::create(STACK_SIZE, victim, std::ptr::null_mut());
		unsafe { ops::kill(victim_handle) };
	}

	ops::create(STACK_SIZE, killer, std::ptr::null_mut());
	ops::schedule();

	assert_eq!(B_SAW_KILLED.load(Ordering::SeqCst), 1);
	assert_eq!(B_LOOP_ITERATIONS.load(Ordering::SeqCst), 0);
	assert_eq!(ops::ndead(), 0);
}

/// Two fibers each set the hooked errno to a distinct value, yield,
/// and check it again after the other has run: a fiber's shadow must
/// never be clobbered by another fiber's write.
#[test]
fn errno_is_isolated_per_fiber() {
	static LOG: Mutex<Vec<(&'static str, i32)>> = Mutex::new(Vec::new());

	unsafe extern "C" fn first(_me: *mut Fiber, _arg: *mut ()) {
		errno::set_errno(11);
		ops::yield_now();
		LOG.lock().unwrap().push(("first", errno::errno()));
	}

	unsafe extern "C" fn second(_me: *mut Fiber, _arg: *mut ()) {
		errno::set_errno(22);
		ops::yield_now();
		LOG.lock().unwrap().push(("second", errno::errno()));
	}

	ops::create(STACK_SIZE, first, std::ptr::null_mut());
	ops::create(STACK_SIZE, second, std::ptr::null_mut());

	ops::schedule();

	let log = LOG.lock().unwrap();
	assert_eq!(log.len(), 2);

	for (label, value) in log.iter() {
		match *label {
			"first" => assert_eq!(*value, 11),
			"second" => assert_eq!(*value, 22),
			other => panic!("unexpected label {other}")
		}
	}
}
