//! # Memory Providers
//!
//! Implementations of [`MemoryPort`](crate::port::MemoryPort).
//!
//! - **simulated**: an in-process target with mapped regions and a scripted
//!   debugger, used by the tests and the CLI demo
//!
//! OS-backed providers (`ReadProcessMemory`/`SetThreadContext` on Windows,
//! `ptrace` on Linux) plug in behind the same trait.

pub mod simulated;

pub use simulated::SimulatedTarget;
