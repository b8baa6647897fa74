//! Per-thread scheduler state: ready/dead queues, the live-fiber slot
//! table, and the distinguished origin context.
//!
//! Lazily constructed on first use per OS thread via [`std::thread_local`]
//! and torn down by that mechanism's own destructor when the thread
//! exits — no manual `pthread_key_create` dance is needed in safe
//! Rust the way the original runtime wires one up by hand.
//!
//! `live` is the sole owner of every fiber that hasn't exited yet;
//! `ready` and `running` only ever hold raw, non-owning pointers into
//! it. A fiber's `Box` moves out of `live` exactly once, into `dead`,
//! at the moment it's retired.

use std::cell::UnsafeCell;
use std::collections::VecDeque;

use crate::fiber::{EntryFn, Fiber, Origin, Status, KILLED};
use crate::{info, trace};

/// Upper bound on the dead-fiber cache; excess entries are freed
/// eagerly rather than kept around for reuse.
pub(crate) const MAX_CACHE: usize = 1000;

thread_local! {
	static RUNTIME: UnsafeCell<Runtime> = UnsafeCell::new(Runtime::new());
}

/// Runs `f` against this thread's runtime.
///
/// # Safety (contract, not an `unsafe fn` since the body is sound
/// given single-threaded cooperative use)
/// `f` must not call `with` again before returning, and must not
/// stash the `&mut Runtime` anywhere that outlives a context switch
/// performed inside `f` — the switch suspends this stack frame with
/// the borrow still notionally live, and resuming it later while
/// another alias exists would violate aliasing rules.
pub(crate) fn with<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
	RUNTIME.with(|cell| {
		// Safety: single-threaded, non-reentrant by the contract above.
		f(unsafe { &mut *cell.get() })
	})
}

/// Returns a raw, stable-for-the-thread's-lifetime pointer to this
/// thread's runtime, for call sites that must span a context switch
/// (and so cannot hold a borrow from [`with`] across it).
pub(crate) fn raw() -> *mut Runtime {
	RUNTIME.with(UnsafeCell::get)
}

pub(crate) struct Runtime {
	ready: Vec<*mut Fiber>,
	dead: VecDeque<Box<Fiber>>,
	live: Vec<Box<Fiber>>,
	running: *mut Fiber,
	origin: Origin,
	idgen: u64,
	count: u64,
	switched: u64,
	nlocal: u32,
	hooked: bool,
	exit_code: i32
}

impl Runtime {
	fn new() -> Self {
		Self {
			ready: Vec::new(),
			dead: VecDeque::new(),
			live: Vec::new(),
			running: std::ptr::null_mut(),
			origin: Origin::new(),
			idgen: 0,
			count: 0,
			switched: 0,
			nlocal: 0,
			hooked: false,
			exit_code: 0
		}
	}

	fn next_id(&mut self) -> u64 {
		self.idgen = self
			.idgen
			.checked_add(1)
			.unwrap_or_else(|| crate::panic_nounwind!("fatal: fiber id generator overflowed"));

		self.idgen
	}

	/// Pops one fiber from the dead cache and re-arms it, or allocates
	/// a fresh one if the cache is empty.
	fn alloc(&mut self, stack_size: usize, entry_fn: EntryFn, entry_arg: *mut ()) -> Box<Fiber> {
		match self.dead.pop_front() {
			Some(fiber) => {
				trace!(target: self, "== reusing cached stack");

				fiber.recycle(stack_size, entry_fn, entry_arg)
			}
			None => {
				trace!(target: self, "++ allocating new stack");

				Fiber::new(stack_size, entry_fn, entry_arg)
			}
		}
	}

	pub(crate) fn create(
		&mut self, stack_size: usize, entry_fn: EntryFn, entry_arg: *mut ()
	) -> *mut Fiber {
		let mut fiber = self.alloc(stack_size, entry_fn, entry_arg);

		fiber.id = self.next_id();
		fiber.status = Status::Ready;
		fiber.slot = self.live.len();

		let ptr = std::ptr::from_mut(fiber.as_mut());

		self.live.push(fiber);
		self.count = self.count.saturating_add(1);
		self.ready.push(ptr);

		ptr
	}

	pub(crate) fn running(&self) -> *mut Fiber {
		self.running
	}

	pub(crate) fn self_id(&self) -> u64 {
		if self.running.is_null() {
			0
		} else {
			// Safety: `running`, when non-null, is the currently
			// executing fiber owned by `live`.
			unsafe { (*self.running).id }
		}
	}

	pub(crate) fn id_of(fiber: *const Fiber) -> u64 {
		// Safety: caller holds a valid fiber pointer.
		unsafe { (*fiber).id }
	}

	pub(crate) fn status_of(fiber: *const Fiber) -> Status {
		// Safety: caller holds a valid fiber pointer.
		unsafe { (*fiber).status }
	}

	pub(crate) fn killed(fiber: *const Fiber) -> bool {
		// Safety: caller holds a valid fiber pointer.
		unsafe { (*fiber).flags & KILLED != 0 }
	}

	pub(crate) fn set_killed(fiber: *mut Fiber) {
		// Safety: caller holds a valid fiber pointer.
		unsafe { (*fiber).flags |= KILLED };
	}

	pub(crate) fn mark_system(&mut self, fiber: *mut Fiber) {
		// Safety: caller holds a valid fiber pointer belonging to this
		// runtime.
		let fiber = unsafe { &mut *fiber };

		if !fiber.sys {
			fiber.sys = true;
			self.count = self.count.saturating_sub(1);
		}
	}

	pub(crate) fn count_inc(&mut self) {
		self.count = self.count.saturating_add(1);
	}

	pub(crate) fn count_dec(&mut self) {
		self.count = self.count.saturating_sub(1);
	}

	pub(crate) fn ndead(&self) -> usize {
		self.dead.len()
	}

	pub(crate) fn nlive(&self) -> usize {
		self.live.len()
	}

	/// Re-enqueues `fiber` onto `ready` with status READY, unless it
	/// has already exited.
	///
	/// # Safety
	/// `fiber` must be owned by this runtime's `live` table and must
	/// not already be present on `ready`.
	pub(crate) unsafe fn ready_fiber(&mut self, fiber: *mut Fiber) {
		// Safety: guaranteed by caller.
		let status = unsafe { (*fiber).status };

		if status == Status::Exiting {
			return;
		}

		// Safety: guaranteed by caller.
		unsafe {
			(*fiber).status = Status::Ready;
		}

		self.ready.push(fiber);
	}

	/// Removes `fiber` from the ready queue if it happens to be on it.
	pub(crate) fn detach_ready(&mut self, fiber: *mut Fiber) {
		if let Some(pos) = self.ready.iter().position(|&f| f == fiber) {
			self.ready.remove(pos);
		}
	}

	/// Pops the most recently enqueued ready fiber, if any (LIFO:
	/// prepend on ready, pop from head).
	pub(crate) fn pop_ready(&mut self) -> Option<*mut Fiber> {
		self.ready.pop()
	}

	pub(crate) fn set_running(&mut self, fiber: *mut Fiber) {
		self.running = fiber;
	}

	pub(crate) fn switched(&self) -> u64 {
		self.switched
	}

	pub(crate) fn record_switch(&mut self) {
		self.switched = self.switched.saturating_add(1);
	}

	pub(crate) fn hooked(&self) -> bool {
		self.hooked
	}

	pub(crate) fn set_hooked(&mut self, on: bool) {
		self.hooked = on;
	}

	pub(crate) fn origin_mut(&mut self) -> &mut Origin {
		&mut self.origin
	}

	/// A raw pointer to the origin's errno shadow, stable for the
	/// thread's lifetime, usable by `errno_location` without holding a
	/// borrow of the whole runtime.
	pub(crate) fn origin_errnum_ptr(&mut self) -> *mut i32 {
		std::ptr::addr_of_mut!(self.origin.errnum)
	}

	pub(crate) fn exit_code(&self) -> i32 {
		self.exit_code
	}

	pub(crate) fn set_exit_code(&mut self, code: i32) {
		self.exit_code = code;
	}

	/// Called at the switch point right after a fiber has finished
	/// exiting: compacts `live` (swap-with-last), decrements `count`
	/// if the fiber was user-visible, evicts the oldest cached fibers
	/// past `MAX_CACHE`, then takes ownership of this one into `dead`.
	///
	/// # Safety
	/// `fiber` must currently be owned by this runtime's `live` table.
	pub(crate) unsafe fn retire(&mut self, fiber: *mut Fiber) {
		// Safety: guaranteed by caller.
		let slot = unsafe { (*fiber).slot };
		let removed = self.live.swap_remove(slot);

		debug_assert!(std::ptr::eq(removed.as_ref(), unsafe { &*fiber }));

		if let Some(moved) = self.live.get_mut(slot) {
			moved.slot = slot;
		}

		if !removed.sys {
			self.count = self.count.saturating_sub(1);
		}

		while self.dead.len() > MAX_CACHE {
			if self.dead.pop_back().is_none() {
				break;
			}
		}

		trace!(target: self, "-> fiber {} retired, dead cache now {}", removed.id, self.dead.len() + 1);

		self.dead.push_front(removed);
	}

	pub(crate) fn nlocal(&self) -> u32 {
		self.nlocal
	}

	pub(crate) fn alloc_local_key(&mut self) -> u32 {
		self.nlocal = self.nlocal.saturating_add(1);
		self.nlocal
	}

	/// Drains and frees every fiber left in the dead cache, at the end
	/// of `schedule()`.
	pub(crate) fn drain_dead(&mut self) {
		let n = self.dead.len();

		if n > 0 {
			info!(target: self, "draining {n} cached fiber(s)");
		}

		self.dead.clear();
	}
}
