//! # Types
//!
//! Target-agnostic types shared by the codecs, the register pool and the
//! debugger session.
//!
//! These types describe *what* is being inspected (an address, a process, an
//! open handle, the pointer width of the target) without knowing which
//! [`MemoryPort`](crate::port::MemoryPort) implementation performs the access.

pub mod address;
pub mod process;

// Re-export all public types
pub use address::Address;
pub use process::{Bitness, ProcessHandle, ProcessId, ThreadId};
