//! # Error Types
//!
//! General error handling for memscope.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

use crate::codec::TypeTag;
use crate::types::Address;

/// Main error type for memscope operations
///
/// ## Error Categories
///
/// 1. **Codec errors**: InvalidDataType, TypeMismatch, ValueOutOfRange,
///    BufferUnderflow, BufferOverflow, InvalidPointer
/// 2. **Register errors**: RegisterPoolExhausted, UnknownRegister
/// 3. **Session errors**: NotAttached, AttachFailed, DetachFailed, InvalidArgument
/// 4. **Provider errors**: IoFailure, ProcessNotFound
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemscopeError
{
    /// The data type name or tag is not one the codec understands
    ///
    /// Also returned for a big-endian suffix on a type that has no big-endian
    /// form (`bool`, `pointer`, `string`, vectors, single-byte integers).
    #[error("Invalid data type: {0}")]
    InvalidDataType(String),

    /// The value's representation does not match what the tag requires
    ///
    /// For example an `int64` tag given a floating point value, or a string
    /// given to a numeric tag.
    #[error("Type mismatch for {tag}: expected {expected}, found {found}")]
    TypeMismatch
    {
        /// Tag the value was encoded with
        tag: TypeTag,
        /// Representation the tag requires
        expected: &'static str,
        /// Representation that was supplied
        found: &'static str,
    },

    /// The value has the right representation but does not fit the target width
    ///
    /// Only pointers can hit this: a 64-bit value on a 32-bit target.
    #[error("Value {value} does not fit {tag}")]
    ValueOutOfRange
    {
        /// Tag the value was encoded with
        tag: TypeTag,
        /// The rejected value, formatted for display
        value: String,
    },

    /// A pointer resolved from a string container is null or negative
    #[error("Invalid pointer 0x{0:016x} in string container")]
    InvalidPointer(i64),

    /// Not enough bytes to decode a value or a container field
    #[error("Buffer underflow: need {needed} bytes, {available} available")]
    BufferUnderflow
    {
        /// Bytes required by the operation (measured from the buffer start)
        needed: usize,
        /// Bytes present in the buffer
        available: usize,
    },

    /// Not enough room in a destination buffer
    #[error("Buffer overflow: need {needed} bytes, {available} available")]
    BufferOverflow
    {
        /// Bytes required by the operation (measured from the buffer start)
        needed: usize,
        /// Bytes present in the buffer
        available: usize,
    },

    /// All hardware debug registers are in use
    ///
    /// x86 provides exactly four address breakpoint registers (DR0-DR3).
    ///
    /// ## Solution
    ///
    /// Remove an existing hardware breakpoint before adding a new one.
    #[error("No available hardware registers to set breakpoint")]
    RegisterPoolExhausted,

    /// A raw register index outside DR0-DR3
    #[error("Unknown hardware register index {0} (expected 0-3)")]
    UnknownRegister(u8),

    /// Operation requires the session to be attached to a process
    ///
    /// ## Solution
    ///
    /// Call `attach(pid, kill_on_detach)` before arming breakpoints.
    #[error("Not attached to a process")]
    NotAttached,

    /// The provider refused to attach its debugger to the process
    #[error("Failed to attach to process {pid}: {details}")]
    AttachFailed
    {
        /// Target process
        pid: u32,
        /// Provider-supplied reason
        details: String,
    },

    /// The provider refused to detach its debugger from the process
    #[error("Failed to detach from process {pid}: {details}")]
    DetachFailed
    {
        /// Target process
        pid: u32,
        /// Provider-supplied reason
        details: String,
    },

    /// The process with the given PID doesn't exist or could not be opened
    #[error("Process not found: PID {0}")]
    ProcessNotFound(u32),

    /// Invalid argument passed to a memscope function
    ///
    /// Examples:
    /// - A null breakpoint address
    /// - A null structure base address
    /// - An unparseable bitness or encoding name
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The memory provider reported a failure
    ///
    /// Covers unreadable/unwritable addresses, short reads, and provider-side
    /// failures to arm or disarm a breakpoint.
    #[error("I/O failure during {operation} at {address}: {details}")]
    IoFailure
    {
        /// Provider operation that failed (`read`, `write`, `arm`, ...)
        operation: &'static str,
        /// Address involved, `Address::ZERO` when not applicable
        address: Address,
        /// Additional error details
        details: String,
    },
}

impl MemscopeError
{
    /// Shorthand for an [`MemscopeError::IoFailure`].
    pub fn io(operation: &'static str, address: Address, details: impl Into<String>) -> Self
    {
        Self::IoFailure {
            operation,
            address,
            details: details.into(),
        }
    }
}

/// Convenience type alias for `Result<T, MemscopeError>`
///
/// ```rust
/// use memscope_core::error::MemscopeResult;
/// fn foo() -> MemscopeResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type MemscopeResult<T> = std::result::Result<T, MemscopeError>;
