//! Common module for library exports

pub use crate::breakpoints::{Breakpoint, TriggerKind};
pub use crate::codec::{ByteOrder, DataType, TextEncoding, TypeCodec, TypeTag, Value, Vector3, Vector4};
pub use crate::config::SessionConfig;
pub use crate::error::{MemscopeError, MemscopeResult};
pub use crate::events::{DebugEvent, DebugEventReceiver};
pub use crate::platform::simulated::SimulatedTarget;
pub use crate::port::{MemoryPort, MemoryPortExt};
pub use crate::registers::{DebugRegister, HardwareRegisterPool};
pub use crate::session::DebuggerSession;
pub use crate::strings::{StructuredStringCodec, WriteOutcome};
pub use crate::types::{Address, Bitness, ProcessHandle, ProcessId, ThreadId};
