/// Aborts the process immediately, without running unwind machinery.
///
/// Used at the handful of spots where a structural invariant of the
/// scheduler has been violated and continuing would corrupt another
/// fiber's stack out from under it.
#[macro_export]
macro_rules! panic_nounwind {
	($($arg: tt)+) => {{
		#[allow(clippy::print_stderr)]
		{
			eprintln!($($arg)+);
		}

		::std::process::abort()
	}};
}

pub use panic_nounwind;

/// Like [`std::hint::unreachable_unchecked`], but logs in debug builds
/// before reaching for undefined behavior.
#[macro_export]
macro_rules! unreachable_unchecked {
	($($arg: tt)+) => {{
		#[cfg(debug_assertions)]
		{
			$crate::panic_nounwind!($($arg)+)
		}

		#[cfg(not(debug_assertions))]
		{
			#[allow(unused_unsafe)]
			unsafe {
				::std::hint::unreachable_unchecked()
			}
		}
	}};
}

pub use unreachable_unchecked;

/// Declares a crate-private `Sealed` trait for the enclosing module,
/// used to close extension traits like `OptionExt` over foreign types.
macro_rules! seal_trait {
	() => {
		pub trait Sealed {}
	};
}

pub(crate) use seal_trait;
