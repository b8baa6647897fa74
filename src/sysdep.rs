/// Pulls in whichever architecture-specific context-switch backend
/// matches the target, re-exporting it as `platform`.
///
/// Two fast paths exist (`x86_64`, `aarch64`, both inline asm); every
/// other target falls back to the portable `ucontext`-based
/// implementation.
macro_rules! import_sysdeps {
	() => {
		#[cfg(target_arch = "x86_64")]
		mod x86_64;
		#[cfg(target_arch = "aarch64")]
		mod aarch64;
		#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
		mod portable;

		mod platform {
			#[cfg(target_arch = "x86_64")]
			#[allow(unused_imports)]
			pub use super::x86_64::*;
			#[cfg(target_arch = "aarch64")]
			#[allow(unused_imports)]
			pub use super::aarch64::*;
			#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
			#[allow(unused_imports)]
			pub use super::portable::*;
		}

		#[allow(unused_imports)]
		use platform::*;
	};
}

pub(crate) use import_sysdeps;
