//! # Type Codec
//!
//! Byte-exact conversion between [`Value`]s and the bytes a target process
//! stores for them.
//!
//! ## Layouts
//!
//! - Integers and floats: native width, little-endian unless the tag is `_be`
//! - `bool`: one byte, `0` or `1` on encode, any non-zero byte is `true` on decode
//! - `pointer`: 4 or 8 bytes depending on [`Bitness`], little-endian
//! - `string`: encoded text followed by a single `0` terminator
//! - `vector3` / `vector4`: 3 or 4 little-endian `f32`
//!
//! The codec is pure: it never touches target memory. Fetching bytes is the
//! job of a [`MemoryPort`](crate::port::MemoryPort).

mod data_type;
mod encoding;
mod value;

pub use data_type::{ByteOrder, DataType, TypeTag};
pub use encoding::TextEncoding;
pub use value::{Value, Vector3, Vector4};

use crate::error::{MemscopeError, MemscopeResult};
use crate::types::Bitness;

/// Terminator appended to encoded strings.
pub const STRING_TERMINATOR: u8 = 0;

macro_rules! put {
    ($value:expr, $order:expr) => {
        match $order {
            ByteOrder::Little => $value.to_le_bytes().to_vec(),
            ByteOrder::Big => $value.to_be_bytes().to_vec(),
        }
    };
}

macro_rules! take {
    ($ty:ty, $bytes:expr, $order:expr) => {{
        let mut raw = [0u8; std::mem::size_of::<$ty>()];
        raw.copy_from_slice(&$bytes[..std::mem::size_of::<$ty>()]);
        match $order {
            ByteOrder::Little => <$ty>::from_le_bytes(raw),
            ByteOrder::Big => <$ty>::from_be_bytes(raw),
        }
    }};
}

/// Encoder/decoder for tagged values
///
/// Holds the two pieces of target context that affect layouts: the pointer
/// width and the text encoding of strings.
///
/// ## Example
///
/// ```rust
/// use memscope_core::codec::{DataType, TypeCodec, TypeTag, Value};
///
/// let codec = TypeCodec::default();
/// let bytes = codec.encode(TypeTag::big_endian(DataType::Int32)?, &Value::Int32(0x0102_0304))?;
/// assert_eq!(bytes, [0x01, 0x02, 0x03, 0x04]);
/// # Ok::<(), memscope_core::error::MemscopeError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeCodec
{
    bitness: Bitness,
    encoding: TextEncoding,
}

impl TypeCodec
{
    /// Codec for a target with the given pointer width and UTF-8 strings.
    #[must_use]
    pub const fn new(bitness: Bitness) -> Self
    {
        Self {
            bitness,
            encoding: TextEncoding::Utf8,
        }
    }

    /// Use a different text encoding for `string` values.
    #[must_use]
    pub const fn with_encoding(mut self, encoding: TextEncoding) -> Self
    {
        self.encoding = encoding;
        self
    }

    /// Target pointer width.
    #[must_use]
    pub const fn bitness(&self) -> Bitness
    {
        self.bitness
    }

    /// Text encoding used for `string` values.
    #[must_use]
    pub const fn encoding(&self) -> TextEncoding
    {
        self.encoding
    }

    /// Width in bytes of a tag on this target, `None` for strings.
    #[must_use]
    pub const fn width(&self, tag: TypeTag) -> Option<usize>
    {
        tag.width(self.bitness)
    }

    /// Encode `value` as the bytes the target stores for `tag`.
    ///
    /// ## Errors
    ///
    /// - `TypeMismatch`: the value's representation is not the one `tag` requires
    /// - `ValueOutOfRange`: a pointer above `u32::MAX` on a 32-bit target
    /// - `InvalidArgument`: a string the configured encoding cannot represent
    pub fn encode(&self, tag: TypeTag, value: &Value) -> MemscopeResult<Vec<u8>>
    {
        let order = tag.order();
        let bytes = match (tag.data_type(), value) {
            (DataType::Int8, Value::Int8(v)) => v.to_le_bytes().to_vec(),
            (DataType::UInt8, Value::UInt8(v)) => vec![*v],
            (DataType::Int16, Value::Int16(v)) => put!(v, order),
            (DataType::UInt16, Value::UInt16(v)) => put!(v, order),
            (DataType::Int32, Value::Int32(v)) => put!(v, order),
            (DataType::UInt32, Value::UInt32(v)) => put!(v, order),
            (DataType::Int64, Value::Int64(v)) => put!(v, order),
            (DataType::UInt64, Value::UInt64(v)) => put!(v, order),
            (DataType::Float32, Value::Float32(v)) => put!(v, order),
            (DataType::Float64, Value::Float64(v)) => put!(v, order),
            (DataType::Bool, Value::Bool(v)) => vec![u8::from(*v)],
            (DataType::Pointer, Value::Pointer(v)) => self.encode_pointer(tag, *v)?,
            (DataType::String, Value::String(text)) => self.encode_str(text)?,
            (DataType::Vector3, Value::Vector3(v)) => [v.x, v.y, v.z].iter().flat_map(|c| c.to_le_bytes()).collect(),
            (DataType::Vector4, Value::Vector4(v)) => {
                [v.x, v.y, v.z, v.w].iter().flat_map(|c| c.to_le_bytes()).collect()
            }
            (data_type, other) => {
                return Err(MemscopeError::TypeMismatch {
                    tag,
                    expected: expected_kind(data_type),
                    found: other.kind(),
                })
            }
        };
        Ok(bytes)
    }

    /// Encode text followed by the string terminator.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if the configured encoding cannot represent `text`.
    pub fn encode_str(&self, text: &str) -> MemscopeResult<Vec<u8>>
    {
        let mut bytes = self.encoding.encode(text)?;
        bytes.push(STRING_TERMINATOR);
        Ok(bytes)
    }

    /// Decode the bytes the target stores for `tag`.
    ///
    /// Fixed-width tags read exactly their width from the start of `bytes`;
    /// trailing bytes are ignored. Strings stop at the first terminator, or use
    /// the whole buffer if none is present.
    ///
    /// ## Errors
    ///
    /// `BufferUnderflow` if `bytes` is shorter than the tag's width.
    pub fn decode(&self, tag: TypeTag, bytes: &[u8]) -> MemscopeResult<Value>
    {
        if let Some(width) = self.width(tag) {
            require(bytes, width)?;
        }

        let order = tag.order();
        let value = match tag.data_type() {
            DataType::Int8 => Value::Int8(take!(i8, bytes, order)),
            DataType::UInt8 => Value::UInt8(bytes[0]),
            DataType::Int16 => Value::Int16(take!(i16, bytes, order)),
            DataType::UInt16 => Value::UInt16(take!(u16, bytes, order)),
            DataType::Int32 => Value::Int32(take!(i32, bytes, order)),
            DataType::UInt32 => Value::UInt32(take!(u32, bytes, order)),
            DataType::Int64 => Value::Int64(take!(i64, bytes, order)),
            DataType::UInt64 => Value::UInt64(take!(u64, bytes, order)),
            DataType::Float32 => Value::Float32(take!(f32, bytes, order)),
            DataType::Float64 => Value::Float64(take!(f64, bytes, order)),
            DataType::Bool => Value::Bool(bytes[0] != 0),
            DataType::Pointer => Value::Pointer(self.decode_pointer(bytes)),
            DataType::String => Value::String(self.decode_str(bytes)),
            DataType::Vector3 => {
                let [x, y, z] = floats::<3>(bytes);
                Value::Vector3(Vector3 { x, y, z })
            }
            DataType::Vector4 => {
                let [x, y, z, w] = floats::<4>(bytes);
                Value::Vector4(Vector4 { x, y, z, w })
            }
        };
        Ok(value)
    }

    /// Decode text up to (excluding) the first terminator.
    #[must_use]
    pub fn decode_str(&self, bytes: &[u8]) -> String
    {
        let end = bytes.iter().position(|&b| b == STRING_TERMINATOR).unwrap_or(bytes.len());
        self.encoding.decode(&bytes[..end])
    }

    /// Read a target-width pointer from the start of `bytes`.
    ///
    /// ## Errors
    ///
    /// `BufferUnderflow` if `bytes` is shorter than a pointer.
    pub fn read_pointer(&self, bytes: &[u8]) -> MemscopeResult<u64>
    {
        require(bytes, self.bitness.pointer_width())?;
        Ok(self.decode_pointer(bytes))
    }

    fn decode_pointer(&self, bytes: &[u8]) -> u64
    {
        match self.bitness {
            Bitness::X86 => u64::from(take!(u32, bytes, ByteOrder::Little)),
            Bitness::X64 => take!(u64, bytes, ByteOrder::Little),
        }
    }

    fn encode_pointer(&self, tag: TypeTag, pointer: u64) -> MemscopeResult<Vec<u8>>
    {
        match self.bitness {
            Bitness::X64 => Ok(pointer.to_le_bytes().to_vec()),
            Bitness::X86 => u32::try_from(pointer)
                .map(|narrow| narrow.to_le_bytes().to_vec())
                .map_err(|_| MemscopeError::ValueOutOfRange {
                    tag,
                    value: format!("0x{pointer:x}"),
                }),
        }
    }
}

fn require(bytes: &[u8], needed: usize) -> MemscopeResult<()>
{
    if bytes.len() < needed {
        return Err(MemscopeError::BufferUnderflow {
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}

fn floats<const N: usize>(bytes: &[u8]) -> [f32; N]
{
    let mut out = [0f32; N];
    for (slot, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *slot = take!(f32, chunk, ByteOrder::Little);
    }
    out
}

const fn expected_kind(data_type: DataType) -> &'static str
{
    match data_type {
        DataType::Int8 => "i8",
        DataType::UInt8 => "u8",
        DataType::Int16 => "i16",
        DataType::UInt16 => "u16",
        DataType::Int32 => "i32",
        DataType::UInt32 => "u32",
        DataType::Int64 => "i64",
        DataType::UInt64 => "u64",
        DataType::Float32 => "f32",
        DataType::Float64 => "f64",
        DataType::Bool => "bool",
        DataType::Pointer => "pointer",
        DataType::String => "string",
        DataType::Vector3 => "vector3",
        DataType::Vector4 => "vector4",
    }
}
