//! # String Container Fields
//!
//! Reads and writes `std::string` fields inside structures copied out of a
//! target process. The container uses the small-string layout:
//!
//! ```text
//! offset 0x00  inline bytes (length <= 15) or heap pointer (length > 15)
//! offset 0x10  length, u32 little-endian
//! offset 0x14  capacity and padding
//! ```
//!
//! The whole container is 32 bytes on 64-bit targets and 24 bytes on 32-bit
//! targets.
//!
//! A write never moves a string between inline and heap storage. When the new
//! value would need the other mode, the live container is copied out
//! unchanged and [`WriteOutcome::Preserved`] is returned.

use tracing::{debug, trace};

use crate::codec::{DataType, TextEncoding, TypeCodec, TypeTag, Value};
use crate::error::{MemscopeError, MemscopeResult};
use crate::port::{MemoryPort, MemoryPortExt};
use crate::types::{Address, Bitness, ProcessHandle};

/// Offset of the length field inside the container.
pub const LENGTH_OFFSET: usize = 0x10;

/// Longest string stored inline.
pub const INLINE_CAPACITY: usize = 15;

/// Container size for a target of the given bitness.
#[must_use]
pub const fn container_size(bitness: Bitness) -> usize
{
    match bitness {
        Bitness::X86 => 24,
        Bitness::X64 => 32,
    }
}

/// Result of [`StructuredStringCodec::write`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome
{
    /// The new value was stored
    Written,
    /// The value needed a different storage mode; the live container was
    /// copied out unchanged
    Preserved,
}

/// Codec for the string containers of one structure in the target
///
/// The codec is bound to the structure's base address. Each call names the
/// field by its `offset`, which applies both to the local copy of the
/// structure and to the live structure in the target.
///
/// ## Example
///
/// ```rust
/// use memscope_core::platform::simulated::SimulatedTarget;
/// use memscope_core::port::MemoryPort;
/// use memscope_core::strings::StructuredStringCodec;
/// use memscope_core::codec::TextEncoding;
/// use memscope_core::types::{Address, Bitness, ProcessId};
///
/// let target = SimulatedTarget::new(ProcessId::from(1));
/// target.map_region(Address::from(0x2000), 0x40);
/// let handle = target.open_process(ProcessId::from(1))?;
///
/// let mut field = [0u8; 32];
/// field[..5].copy_from_slice(b"hello");
/// field[0x10] = 5;
///
/// let codec = StructuredStringCodec::new(&target, handle, Address::from(0x2000), Bitness::X64, TextEncoding::Utf8)?;
/// assert_eq!(codec.read(&field, 0)?, "hello");
/// # Ok::<(), memscope_core::error::MemscopeError>(())
/// ```
pub struct StructuredStringCodec<'a, P: MemoryPort + ?Sized>
{
    port: &'a P,
    handle: ProcessHandle,
    address: Address,
    codec: TypeCodec,
}

impl<'a, P: MemoryPort + ?Sized> StructuredStringCodec<'a, P>
{
    /// Bind a codec to the structure at `address` in the process behind `handle`.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` for a null address.
    pub fn new(
        port: &'a P,
        handle: ProcessHandle,
        address: Address,
        bitness: Bitness,
        encoding: TextEncoding,
    ) -> MemscopeResult<Self>
    {
        if address.is_null() {
            return Err(MemscopeError::InvalidArgument(
                "string container address must not be null".to_string(),
            ));
        }
        Ok(Self {
            port,
            handle,
            address,
            codec: TypeCodec::new(bitness).with_encoding(encoding),
        })
    }

    /// Bytes the container occupies.
    #[must_use]
    pub const fn size(&self) -> usize
    {
        container_size(self.codec.bitness())
    }

    /// Live base address of the structure.
    #[must_use]
    pub const fn address(&self) -> Address
    {
        self.address
    }

    /// Live address of the container at `offset` inside the structure.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` when the address would wrap.
    pub fn field_address(&self, offset: usize) -> MemscopeResult<Address>
    {
        u64::try_from(offset)
            .ok()
            .and_then(|offset| self.address.checked_add(offset))
            .ok_or_else(|| {
                MemscopeError::InvalidArgument(format!("field offset 0x{offset:x} overflows {}", self.address))
            })
    }

    /// Decode the container stored in `buffer` at `offset`.
    ///
    /// Inline strings come straight from the buffer; heap strings are read
    /// from the target through the stored pointer.
    ///
    /// ## Errors
    ///
    /// - `BufferUnderflow` when the length field or inline bytes are missing
    /// - `InvalidPointer` for a null or negative heap pointer
    /// - `IoFailure` when the heap string cannot be read
    pub fn read(&self, buffer: &[u8], offset: usize) -> MemscopeResult<String>
    {
        let length = read_length(buffer, offset)?;
        if length > INLINE_CAPACITY {
            let pointer = self.resolve_pointer(buffer, offset)?;
            trace!(address = %pointer, length, "reading heap string");
            return self.port.read_string(&self.codec, self.handle, pointer);
        }

        let inline = offset
            .checked_add(length)
            .and_then(|end| buffer.get(offset..end))
            .ok_or(MemscopeError::BufferUnderflow {
                needed: offset.saturating_add(length),
                available: buffer.len(),
            })?;
        Ok(self.codec.encoding().decode(inline))
    }

    /// Store `value` in the live container at `offset` and copy the result
    /// into `buffer` at the same offset.
    ///
    /// The new length is written to the target. A heap string is written
    /// through the live pointer; an inline string is placed in the copied
    /// container, with bytes freed by a shorter value zeroed.
    ///
    /// ## Errors
    ///
    /// - `BufferOverflow` when `buffer` cannot hold a container at `offset`
    /// - `InvalidArgument` when the encoding cannot represent `value`
    /// - `InvalidPointer` for a null or negative live heap pointer
    /// - `IoFailure` from the target
    pub fn write(&self, value: &str, buffer: &mut [u8], offset: usize) -> MemscopeResult<WriteOutcome>
    {
        let size = self.size();
        let end = match offset.checked_add(size) {
            Some(end) if end <= buffer.len() => end,
            _ => {
                return Err(MemscopeError::BufferOverflow {
                    needed: offset.saturating_add(size),
                    available: buffer.len(),
                })
            }
        };

        let container = self.field_address(offset)?;
        let mut scratch = self.port.read_bytes(self.handle, container, size)?;
        let length_tag = TypeTag::new(DataType::UInt32);
        let length_address = container + LENGTH_OFFSET;
        let live_length = match self.port.read_value(&self.codec, self.handle, length_address, length_tag)? {
            Value::UInt32(length) => length as usize,
            other => {
                return Err(MemscopeError::TypeMismatch {
                    tag: length_tag,
                    expected: "u32",
                    found: other.kind(),
                })
            }
        };

        let encoded = self.codec.encoding().encode(value)?;
        let new_length = encoded.len();
        if (new_length > INLINE_CAPACITY) != (live_length > INLINE_CAPACITY) {
            debug!(
                address = %container,
                live_length,
                new_length,
                "string storage mode would change; keeping live value"
            );
            buffer[offset..end].copy_from_slice(&scratch);
            return Ok(WriteOutcome::Preserved);
        }

        let length_field = u32::try_from(new_length)
            .map_err(|_| MemscopeError::InvalidArgument(format!("string of {new_length} bytes is too long")))?;
        self.port
            .write_value(&self.codec, self.handle, length_address, length_tag, &Value::UInt32(length_field))?;

        if new_length > INLINE_CAPACITY {
            let pointer = self.resolve_pointer(&scratch, 0)?;
            trace!(address = %pointer, new_length, "writing heap string");
            self.port.write_string(&self.codec, self.handle, pointer, value)?;
        } else {
            scratch[..new_length].copy_from_slice(&encoded);
            let clear_end = live_length.clamp(new_length + 1, INLINE_CAPACITY + 1);
            scratch[new_length..clear_end].fill(0);
        }
        scratch[LENGTH_OFFSET..LENGTH_OFFSET + 4].copy_from_slice(&length_field.to_le_bytes());

        buffer[offset..end].copy_from_slice(&scratch);
        Ok(WriteOutcome::Written)
    }

    fn resolve_pointer(&self, buffer: &[u8], offset: usize) -> MemscopeResult<Address>
    {
        let raw = self.codec.read_pointer(buffer.get(offset..).unwrap_or_default())?;
        let valid = match self.codec.bitness() {
            Bitness::X64 => i64::from_le_bytes(raw.to_le_bytes()) > 0,
            Bitness::X86 => raw != 0,
        };
        if !valid {
            return Err(MemscopeError::InvalidPointer(i64::from_le_bytes(raw.to_le_bytes())));
        }
        Ok(Address::from(raw))
    }
}

fn read_length(buffer: &[u8], offset: usize) -> MemscopeResult<usize>
{
    let field = offset
        .checked_add(LENGTH_OFFSET)
        .and_then(|start| buffer.get(start..start.checked_add(4)?))
        .ok_or(MemscopeError::BufferUnderflow {
            needed: offset.saturating_add(LENGTH_OFFSET + 4),
            available: buffer.len(),
        })?;
    let mut raw = [0u8; 4];
    raw.copy_from_slice(field);
    Ok(u32::from_le_bytes(raw) as usize)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_container_sizes()
    {
        assert_eq!(container_size(Bitness::X64), 32);
        assert_eq!(container_size(Bitness::X86), 24);
    }

    #[test]
    fn test_read_length_underflow()
    {
        let buffer = [0u8; 0x12];
        assert_eq!(
            read_length(&buffer, 0),
            Err(MemscopeError::BufferUnderflow {
                needed: 0x14,
                available: 0x12
            })
        );
    }

    #[test]
    fn test_read_length_with_huge_offset()
    {
        let buffer = [0u8; 0x20];
        assert_eq!(
            read_length(&buffer, usize::MAX - 2),
            Err(MemscopeError::BufferUnderflow {
                needed: usize::MAX,
                available: 0x20
            })
        );
    }

    #[test]
    fn test_read_length_at_offset()
    {
        let mut buffer = [0u8; 0x30];
        buffer[0x18] = 9;
        assert_eq!(read_length(&buffer, 8).unwrap(), 9);
    }
}
