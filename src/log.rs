//! Structured logging for the scheduler.
//!
//! Behind the `logger` feature, a small ANSI-colored [`log::Log`] is
//! installed at process startup via `ctor`, mirroring the way the
//! reference implementation wires up its message sink once per
//! process. Disable the feature if the host application already owns
//! the global logger.

#[cfg(feature = "logger")]
mod install {
	use ctor::ctor;
	use log::{set_boxed_logger, set_max_level, Level, LevelFilter, Log, Metadata, Record};

	struct Logger;

	macro_rules! ansi_color {
		($color: expr) => {
			format!("\x1b[38;5;{}m", $color)
		};

		() => {
			"\x1b[0m"
		};
	}

	impl Log for Logger {
		fn enabled(&self, _: &Metadata<'_>) -> bool {
			true
		}

		fn log(&self, record: &Record<'_>) {
			if !self.enabled(record.metadata()) {
				return;
			}

			let color = match record.level() {
				Level::Error => ansi_color!(1),
				Level::Warn => ansi_color!(3),
				Level::Info => ansi_color!(122),
				Level::Debug => ansi_color!(14),
				Level::Trace => ansi_color!(244)
			};

			let target = record.target();

			#[allow(clippy::print_stderr)]
			{
				eprintln!("{}[{}] {}{}", color, target, ansi_color!(), record.args());
			}
		}

		fn flush(&self) {}
	}

	#[ctor]
	#[allow(clippy::expect_used)]
	fn init() {
		set_boxed_logger(Box::new(Logger)).expect("logger already installed");
		set_max_level(LevelFilter::Info);
	}
}

/// Formats `val` as `TypeName @ 0xaddr`, used as the log `target` for
/// per-fiber and per-runtime trace output so log lines can be
/// correlated with a specific fiber even across many threads.
pub fn format_target<T>(val: &T) -> String {
	let name = std::any::type_name::<T>();
	let name = name.rsplit("::").next().unwrap_or(name);

	format!("{} @ {:p}", name, val as *const T)
}

#[macro_export]
macro_rules! trace {
	(target: $target: expr, $($arg: tt)+) => {
		::log::trace!(target: &$crate::log::format_target($target) as &str, $($arg)+)
	};

	($($arg: tt)+) => {
		::log::trace!($($arg)+)
	};
}

#[macro_export]
macro_rules! info {
	(target: $target: expr, $($arg: tt)+) => {
		::log::info!(target: &$crate::log::format_target($target) as &str, $($arg)+)
	};

	($($arg: tt)+) => {
		::log::info!($($arg)+)
	};
}

pub use {info, trace};
