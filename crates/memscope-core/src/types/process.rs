//! Process, thread, handle and bitness types.

use std::fmt;
use std::str::FromStr;

use crate::error::MemscopeError;

/// Process identifier (PID)
///
/// ## Example
///
/// ```rust
/// use memscope_core::types::ProcessId;
///
/// let pid = ProcessId::from(4242);
/// assert_eq!(u32::from(pid), 4242);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Thread identifier
///
/// Reported by the provider alongside every debug event so the trapped thread
/// can be resumed through
/// [`MemoryPort::acknowledge_debug_event`](crate::port::MemoryPort::acknowledge_debug_event).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(pub u64);

impl ThreadId
{
    /// Get the raw `u64` representation of the thread identifier
    #[must_use]
    pub fn raw(&self) -> u64
    {
        self.0
    }
}

impl From<u64> for ThreadId
{
    fn from(value: u64) -> Self
    {
        Self(value)
    }
}

/// Opaque handle to an opened target process.
///
/// Handles are produced by [`MemoryPort::open_process`](crate::port::MemoryPort::open_process)
/// and must be given back to [`MemoryPort::close_handle`](crate::port::MemoryPort::close_handle)
/// by whoever opened them. The value itself means nothing to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessHandle(pub u64);

impl ProcessHandle
{
    /// Get the raw handle value
    #[must_use]
    pub const fn raw(self) -> u64
    {
        self.0
    }
}

impl From<u64> for ProcessHandle
{
    fn from(value: u64) -> Self
    {
        Self(value)
    }
}

/// Pointer width of the target process
///
/// Determines how wide `pointer` values are and how large a `std::string`
/// container is inside the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Bitness
{
    /// 32-bit target: 4-byte pointers, 24-byte string containers
    X86,
    /// 64-bit target: 8-byte pointers, 32-byte string containers
    #[default]
    X64,
}

impl Bitness
{
    /// Width of a pointer in bytes.
    #[must_use]
    pub const fn pointer_width(self) -> usize
    {
        match self {
            Self::X86 => 4,
            Self::X64 => 8,
        }
    }

    /// The bitness of the process running this code.
    #[must_use]
    pub const fn host() -> Self
    {
        if cfg!(target_pointer_width = "64") {
            Self::X64
        } else {
            Self::X86
        }
    }
}

impl fmt::Display for Bitness
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::X86 => write!(f, "32"),
            Self::X64 => write!(f, "64"),
        }
    }
}

impl FromStr for Bitness
{
    type Err = MemscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "32" | "x86" | "i386" | "i686" => Ok(Self::X86),
            "64" | "x64" | "x86_64" | "amd64" => Ok(Self::X64),
            _ => Err(MemscopeError::InvalidArgument(format!(
                "Unknown target bitness: {s}. Use '32' or '64'"
            ))),
        }
    }
}
