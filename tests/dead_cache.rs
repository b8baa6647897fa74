//! Dead-fiber stack recycling under heavy churn.

use fiber_rt::{ops, Fiber};

const STACK_SIZE: usize = 16 * 1024;
const CHURN: usize = 1500;

unsafe extern "C" fn exit_immediately(_me: *mut Fiber, _arg: *mut ()) {}

unsafe extern "C" fn driver(_me: *mut Fiber, _arg: *mut ()) {
	for _ in 0..CHURN {
		ops::create(STACK_SIZE, exit_immediately, std::ptr::null_mut());
		ops::yield_now();
	}
}

/// A long-lived fiber repeatedly spawns a same-size worker that exits
/// immediately, well past the dead-cache bound: each worker after the
/// first is handed the stack the previous one just freed (the common
/// case — same `stack_size` on every `create`), and the whole run
/// completes with the dead cache fully drained.
#[test]
fn heavy_churn_recycles_same_size_stacks() {
	ops::create(STACK_SIZE, driver, std::ptr::null_mut());
	ops::schedule();

	assert_eq!(ops::ndead(), 0);
}

/// A wide burst of fibers created up front, none of which get to run
/// (and so none retire) until `schedule` dispatches them all: this
/// exercises allocation and the dead-cache eviction bound from the
/// other direction, with no reuse possible since nothing has exited
/// yet when the batch is created.
#[test]
fn wide_burst_without_reuse_still_drains() {
	for _ in 0..CHURN {
		ops::create(STACK_SIZE, exit_immediately, std::ptr::null_mut());
	}

	ops::schedule();

	assert_eq!(ops::ndead(), 0);
}
