//! A userspace, single-threaded cooperative fiber scheduler.
//!
//! Fibers are stackful coroutines: each owns its own stack and is
//! switched to and from explicitly, never preemptively. All state
//! lives in a per-OS-thread [`runtime`]; nothing here is safe to share
//! across threads.

pub mod errno;
pub mod error;
pub mod fiber;
pub mod impls;
pub mod locals;
pub mod log;
mod macros;
pub mod ops;
mod runtime;
mod sysdep;

pub use error::{Error, ErrorKind, Result};
pub use fiber::{EntryFn, Fiber, Status};
