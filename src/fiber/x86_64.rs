use std::arch::{asm, global_asm};

use super::Start;

global_asm!(include_str!("x86_64.s"));

extern "C" {
	fn fiber_rt_x86_64_start();
}

/// Saved machine state for a suspended fiber.
///
/// Only the registers the switch routine itself cannot do without are
/// kept here (`rip`, `rsp`, `rbx`, `rbp`); `r12`-`r15` are reloaded by
/// the compiler instead, via an explicit clobber list at the call
/// site in [`switch`].
#[repr(C)]
#[derive(Default)]
pub(super) struct Context {
	rip: u64,
	rsp: u64,
	rbx: u64,
	rbp: u64,
	start_fn: u64,
	start_arg: u64
}

impl Context {
	pub(super) const fn new() -> Self {
		Self {
			rip: 0,
			rsp: 0,
			rbx: 0,
			rbp: 0,
			start_fn: 0,
			start_arg: 0
		}
	}

	pub(super) fn set_stack(&mut self, top: usize, _size: usize) {
		#[allow(clippy::cast_possible_truncation)]
		{
			self.rsp = top as u64;
		}
	}

	pub(super) fn set_start(&mut self, start: Start) {
		#[allow(clippy::cast_possible_truncation)]
		{
			self.start_fn = start.entry as usize as u64;
			self.start_arg = start.arg as usize as u64;
			self.rip = fiber_rt_x86_64_start as usize as u64;
		}
	}
}

/// Switches the calling thread's machine state from `from` to `to`.
///
/// Returns once some other fiber switches back into `from`. `rbx` and
/// `rbp` are restored by the assembly routine; `r12`-`r15` are marked
/// clobbered here so the compiler never assumes stale values across
/// the switch.
///
/// # Safety
///
/// Both contexts must belong to fibers on the same thread, `to` must
/// hold a valid saved or freshly-initialized state, and `from` must
/// not currently be running anywhere else.
pub(super) unsafe fn switch(from: *mut Context, to: *mut Context) {
	unsafe {
		asm!(
			"call {switch}",
			switch = sym fiber_rt_x86_64_switch_trampoline,
			in("rdi") from,
			in("rsi") to,
			lateout("r12") _,
			lateout("r13") _,
			lateout("r14") _,
			lateout("r15") _,
			clobber_abi("C")
		);
	}
}

extern "C" {
	#[link_name = "fiber_rt_x86_64_switch"]
	fn fiber_rt_x86_64_switch_trampoline();
}
