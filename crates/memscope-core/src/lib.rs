//! # memscope-core
//!
//! Typed access to another process's memory and hardware breakpoints on it.
//!
//! This crate provides:
//! - A byte-exact codec for primitive, vector and string values
//! - Reading and writing `std::string` fields of structures copied out of a target
//! - Allocation of the four x86 debug registers (DR0-DR3)
//! - A debugger session that arms hardware breakpoints and publishes the traps
//!   they raise to async subscribers
//!
//! Everything that touches the target goes through the
//! [`MemoryPort`](port::MemoryPort) trait. The crate ships one implementation,
//! [`SimulatedTarget`](platform::simulated::SimulatedTarget), an in-memory
//! process used by the tests and the CLI.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use memscope_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> MemscopeResult<()> {
//! let target = Arc::new(SimulatedTarget::new(ProcessId::from(100)));
//! target.map_region(Address::from(0x1000), 0x100);
//!
//! let mut session = DebuggerSession::new(target.clone(), tokio::runtime::Handle::current());
//! session.attach(ProcessId::from(100), false)?;
//! let register = session.set_hardware_breakpoint(
//!     ProcessId::from(100),
//!     Address::from(0x1000),
//!     TriggerKind::Write,
//!     "int32".parse()?,
//! )?;
//! assert_eq!(register, DebugRegister::Dr0);
//! session.remove_hardware_breakpoint(ProcessId::from(100), register)?;
//! assert_eq!(session.free_registers(), 4);
//! # Ok(())
//! # }
//! ```

pub mod breakpoints;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod monitor;
pub mod platform;
pub mod port;
pub mod prelude;
pub mod registers;
pub mod session;
pub mod strings;
pub mod types;

// Re-export commonly used types
pub use error::{MemscopeError, MemscopeResult};
pub use port::{MemoryPort, MemoryPortExt};
pub use session::DebuggerSession;
pub use types::{Address, ProcessId};
