use std::arch::{asm, global_asm};

use super::Start;

global_asm!(include_str!("aarch64.s"));

extern "C" {
	fn fiber_rt_aarch64_start();
}

/// Saved machine state for a suspended fiber.
///
/// Only `pc`, `sp` and the frame pointer are kept here; the rest of
/// the AAPCS64 callee-saved set (`x18`, `x20`-`x28`, `d8`-`d15`) is
/// left to the compiler's own clobber tracking at the call site in
/// [`switch`], since our switch routine doesn't touch them either.
#[repr(C)]
#[derive(Default)]
pub(super) struct Context {
	pc: u64,
	sp: u64,
	fp: u64,
	start_fn: u64,
	start_arg: u64
}

impl Context {
	pub(super) const fn new() -> Self {
		Self {
			pc: 0,
			sp: 0,
			fp: 0,
			start_fn: 0,
			start_arg: 0
		}
	}

	pub(super) fn set_stack(&mut self, top: usize, _size: usize) {
		#[allow(clippy::cast_possible_truncation)]
		{
			self.sp = top as u64;
		}
	}

	pub(super) fn set_start(&mut self, start: Start) {
		#[allow(clippy::cast_possible_truncation)]
		{
			self.start_fn = start.entry as usize as u64;
			self.start_arg = start.arg as usize as u64;
			self.pc = fiber_rt_aarch64_start as usize as u64;
		}
	}
}

/// Switches the calling thread's machine state from `from` to `to`.
///
/// # Safety
///
/// Both contexts must belong to fibers on the same thread, `to` must
/// hold a valid saved or freshly-initialized state, and `from` must
/// not currently be running anywhere else.
pub(super) unsafe fn switch(from: *mut Context, to: *mut Context) {
	unsafe {
		asm!(
			"bl {switch}",
			switch = sym fiber_rt_aarch64_switch_trampoline,
			in("x0") from,
			in("x1") to,
			lateout("x18") _,
			lateout("x20") _,
			lateout("x21") _,
			lateout("x22") _,
			lateout("x23") _,
			lateout("x24") _,
			lateout("x25") _,
			lateout("x26") _,
			lateout("x27") _,
			lateout("x28") _,
			lateout("d8") _,
			lateout("d9") _,
			lateout("d10") _,
			lateout("d11") _,
			lateout("d12") _,
			lateout("d13") _,
			lateout("d14") _,
			lateout("d15") _,
			clobber_abi("C")
		);
	}
}

extern "C" {
	#[link_name = "fiber_rt_aarch64_switch"]
	fn fiber_rt_aarch64_switch_trampoline();
}
