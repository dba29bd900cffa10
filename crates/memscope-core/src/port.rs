//! # Memory Port
//!
//! The boundary between memscope and whatever actually touches the target
//! process.
//!
//! A [`MemoryPort`] performs raw reads and writes, opens and closes process
//! handles, and drives the debug primitives used for hardware breakpoints.
//! On Windows this is `ReadProcessMemory`/`WriteProcessMemory` plus the debug
//! API; on Linux `process_vm_readv` and `ptrace`. memscope itself ships only
//! the in-process [`SimulatedTarget`](crate::platform::simulated::SimulatedTarget).
//!
//! [`MemoryPortExt`] layers typed access on top of the raw primitives using
//! the [`TypeCodec`].
//!
//! ## Thread Safety
//!
//! Ports are shared between the caller and the breakpoint monitor tasks, so
//! every method takes `&self` and implementations must be `Send + Sync`.

use std::time::Duration;

use tracing::trace;

use crate::breakpoints::TriggerKind;
use crate::codec::{TypeCodec, TypeTag, Value};
use crate::error::{MemscopeError, MemscopeResult};
use crate::events::DebugEvent;
use crate::registers::DebugRegister;
use crate::types::{Address, ProcessHandle, ProcessId, ThreadId};

/// Chunk size used by the default [`MemoryPort::read_c_string`].
pub const STRING_READ_CHUNK: usize = 64;

/// Longest string [`MemoryPort::read_c_string`] will follow before giving up.
pub const MAX_STRING_LENGTH: usize = 64 * 1024;

/// Raw access to a target process
pub trait MemoryPort: Send + Sync
{
    /// Open a process for memory access.
    ///
    /// ## Errors
    ///
    /// `ProcessNotFound` if the process doesn't exist or cannot be opened.
    fn open_process(&self, pid: ProcessId) -> MemscopeResult<ProcessHandle>;

    /// Close a handle returned by [`MemoryPort::open_process`].
    fn close_handle(&self, handle: ProcessHandle) -> MemscopeResult<()>;

    /// Read exactly `len` bytes starting at `address`.
    ///
    /// ## Errors
    ///
    /// `IoFailure` if any byte of the range is unreadable.
    fn read_bytes(&self, handle: ProcessHandle, address: Address, len: usize) -> MemscopeResult<Vec<u8>>;

    /// Write all of `data` starting at `address`.
    ///
    /// ## Errors
    ///
    /// `IoFailure` if any byte of the range is unwritable.
    fn write_bytes(&self, handle: ProcessHandle, address: Address, data: &[u8]) -> MemscopeResult<()>;

    /// Read a terminated string starting at `address`, without the terminator.
    ///
    /// The default implementation reads in [`STRING_READ_CHUNK`]-sized pieces,
    /// shrinking the chunk when a read fails near the end of a mapping, and
    /// stops at the first `0` byte.
    ///
    /// ## Errors
    ///
    /// `IoFailure` if the first byte is unreadable, or if no terminator is
    /// found within [`MAX_STRING_LENGTH`] bytes.
    fn read_c_string(&self, handle: ProcessHandle, address: Address) -> MemscopeResult<Vec<u8>>
    {
        let mut out = Vec::new();
        let mut chunk = STRING_READ_CHUNK;
        while out.len() < MAX_STRING_LENGTH {
            let cursor = address + out.len();
            match self.read_bytes(handle, cursor, chunk) {
                Ok(bytes) => {
                    if let Some(end) = bytes.iter().position(|&b| b == 0) {
                        out.extend_from_slice(&bytes[..end]);
                        return Ok(out);
                    }
                    out.extend_from_slice(&bytes);
                }
                Err(err) if chunk == 1 => return Err(err),
                Err(_) => chunk /= 2,
            }
        }
        Err(MemscopeError::io(
            "read_string",
            address,
            format!("no terminator within {MAX_STRING_LENGTH} bytes"),
        ))
    }

    /// Attach the provider's debugger to a process.
    ///
    /// With `kill_on_detach` the target is terminated when the debugger detaches.
    fn attach_debugger(&self, pid: ProcessId, kill_on_detach: bool) -> MemscopeResult<()>;

    /// Detach the provider's debugger. Invalidates every armed breakpoint.
    fn detach_debugger(&self, pid: ProcessId) -> MemscopeResult<()>;

    /// Program `register` to trap on `trigger` accesses of `size` bytes at `address`.
    fn arm_hardware_breakpoint(
        &self,
        pid: ProcessId,
        address: Address,
        register: DebugRegister,
        trigger: TriggerKind,
        size: usize,
    ) -> MemscopeResult<()>;

    /// Clear the trap programmed into `register`.
    fn disarm_hardware_breakpoint(&self, pid: ProcessId, register: DebugRegister) -> MemscopeResult<()>;

    /// Wait up to `timeout` for a debug event raised through `register`.
    ///
    /// Returns `Ok(None)` when nothing arrived in time. May block the calling
    /// thread for the full timeout.
    fn poll_debug_event(&self, register: DebugRegister, timeout: Duration) -> MemscopeResult<Option<DebugEvent>>;

    /// Let the trapped thread continue after an event has been consumed.
    fn acknowledge_debug_event(&self, pid: ProcessId, thread: ThreadId) -> MemscopeResult<()>;
}

/// Typed access built on [`MemoryPort`]
///
/// Implemented for every port, including `dyn MemoryPort`.
///
/// ## Example
///
/// ```rust
/// use memscope_core::codec::{DataType, TypeCodec, Value};
/// use memscope_core::platform::simulated::SimulatedTarget;
/// use memscope_core::port::{MemoryPort, MemoryPortExt};
/// use memscope_core::types::{Address, ProcessId};
///
/// let target = SimulatedTarget::new(ProcessId::from(7));
/// target.map_region(Address::from(0x1000), 0x100);
/// let handle = target.open_process(ProcessId::from(7))?;
///
/// let codec = TypeCodec::default();
/// target.write_value(&codec, handle, Address::from(0x1000), DataType::Int32.into(), &Value::Int32(-5))?;
/// let value = target.read_value(&codec, handle, Address::from(0x1000), DataType::Int32.into())?;
/// assert_eq!(value, Value::Int32(-5));
/// # Ok::<(), memscope_core::error::MemscopeError>(())
/// ```
pub trait MemoryPortExt: MemoryPort
{
    /// Read and decode a value of type `tag`.
    ///
    /// Strings are followed to their terminator; every other tag reads exactly
    /// its width.
    ///
    /// ## Errors
    ///
    /// `IoFailure` from the port, or any codec error.
    fn read_value(&self, codec: &TypeCodec, handle: ProcessHandle, address: Address, tag: TypeTag) -> MemscopeResult<Value>
    {
        trace!(%address, %tag, "read_value");
        match codec.width(tag) {
            Some(width) => {
                let bytes = self.read_bytes(handle, address, width)?;
                codec.decode(tag, &bytes)
            }
            None => {
                let bytes = self.read_c_string(handle, address)?;
                codec.decode(tag, &bytes)
            }
        }
    }

    /// Encode and write a value of type `tag`.
    ///
    /// ## Errors
    ///
    /// Any codec error, or `IoFailure` from the port.
    fn write_value(
        &self,
        codec: &TypeCodec,
        handle: ProcessHandle,
        address: Address,
        tag: TypeTag,
        value: &Value,
    ) -> MemscopeResult<()>
    {
        trace!(%address, %tag, "write_value");
        let bytes = codec.encode(tag, value)?;
        self.write_bytes(handle, address, &bytes)
    }

    /// Read a terminated string decoded with the codec's encoding.
    ///
    /// ## Errors
    ///
    /// `IoFailure` from the port.
    fn read_string(&self, codec: &TypeCodec, handle: ProcessHandle, address: Address) -> MemscopeResult<String>
    {
        let bytes = self.read_c_string(handle, address)?;
        Ok(codec.decode_str(&bytes))
    }

    /// Write `text` followed by a terminator.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` for unencodable text, `IoFailure` from the port.
    fn write_string(&self, codec: &TypeCodec, handle: ProcessHandle, address: Address, text: &str) -> MemscopeResult<()>
    {
        let bytes = codec.encode_str(text)?;
        self.write_bytes(handle, address, &bytes)
    }
}

impl<P: MemoryPort + ?Sized> MemoryPortExt for P {}
