//! Portable fallback context switch built on `ucontext.h`, for targets
//! without a hand-written assembly backend. Grounded on the original
//! library's non-setjmp path, which builds fibers the same way.

use std::mem::MaybeUninit;

use libc::{c_void, getcontext, makecontext, swapcontext, ucontext_t};

use super::Start;
use crate::panic_nounwind;

pub(super) struct Context {
	ucontext: ucontext_t,
	stack_top: usize,
	stack_size: usize,
	entry_fn: usize,
	entry_arg: usize
}

/// `makecontext` only passes `int`s through to the entered function,
/// so a 64-bit address is split across two of them and reassembled
/// here. This reconstructs a pointer to the `Context` itself (not the
/// fiber), since that's what carries the real entry point and
/// argument.
extern "C" fn trampoline_adapter(hi: u32, lo: u32) {
	let addr = (u64::from(hi) << 32) | u64::from(lo);

	#[allow(clippy::cast_possible_truncation)]
	let ctx = addr as usize as *const Context;

	// Safety: `addr` was produced from a live `&Context` in `set_start`
	// below, and that `Context` does not move while its fiber is
	// executing.
	let (entry, arg) = unsafe { ((*ctx).entry_fn, (*ctx).entry_arg) };

	// Safety: `entry` was stored from a real `Start::entry` value.
	let entry: unsafe extern "C" fn(*mut ()) = unsafe { std::mem::transmute(entry) };

	#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
	// Safety: `arg` was stored from a real `Start::arg` value.
	unsafe {
		entry(arg as *mut ());
	}
}

impl Context {
	pub(super) fn new() -> Self {
		Self {
			// Safety: a zeroed `ucontext_t` is only ever read through
			// `getcontext`/`swapcontext`, which overwrite it in full
			// before it is used as a jump target.
			ucontext: unsafe { MaybeUninit::zeroed().assume_init() },
			stack_top: 0,
			stack_size: 0,
			entry_fn: 0,
			entry_arg: 0
		}
	}

	pub(super) fn set_stack(&mut self, top: usize, size: usize) {
		self.stack_top = top;
		self.stack_size = size;
	}

	pub(super) fn set_start(&mut self, start: Start) {
		self.entry_fn = start.entry as usize;
		self.entry_arg = start.arg as usize;

		// Safety: `self.ucontext` is a valid, fully owned buffer.
		if unsafe { getcontext(&mut self.ucontext) } != 0 {
			panic_nounwind!("getcontext failed");
		}

		#[allow(clippy::cast_possible_wrap)]
		{
			self.ucontext.uc_stack.ss_sp =
				(self.stack_top - self.stack_size) as *mut c_void;
			self.ucontext.uc_stack.ss_size = self.stack_size;
		}

		self.ucontext.uc_link = std::ptr::null_mut();

		let addr = std::ptr::from_ref(self) as usize as u64;

		#[allow(clippy::cast_possible_truncation)]
		let hi = (addr >> 32) as u32;
		#[allow(clippy::cast_possible_truncation)]
		let lo = (addr & 0xffff_ffff) as u32;

		// Safety: `trampoline_adapter` takes exactly the two `c_int`
		// arguments `makecontext` is told to pass, matching its
		// documented calling convention for a non-`void(void)` entry.
		unsafe {
			makecontext(
				&mut self.ucontext,
				std::mem::transmute::<extern "C" fn(u32, u32), extern "C" fn()>(
					trampoline_adapter
				),
				2,
				hi,
				lo
			);
		}
	}
}

pub(super) unsafe fn switch(from: *mut Context, to: *mut Context) {
	// Safety: caller guarantees both contexts are valid and belong to
	// fibers on the same thread.
	unsafe {
		if swapcontext(&mut (*from).ucontext, &mut (*to).ucontext) != 0 {
			panic_nounwind!("swapcontext failed");
		}
	}
}
