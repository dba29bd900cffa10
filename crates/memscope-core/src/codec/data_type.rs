//! Data type tags understood by the codec.
//!
//! A [`TypeTag`] pairs a [`DataType`] with a [`ByteOrder`]. Tags are parsed
//! from the familiar names used by memory-editing tools (`int`, `dword`,
//! `float_be`, `vec3`, ...) so callers can take them straight from user input.

use std::fmt;
use std::str::FromStr;

use crate::error::{MemscopeError, MemscopeResult};
use crate::types::Bitness;

/// Logical data type stored in target memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType
{
    /// Signed 8-bit integer (`int8`, `byte`, `char`)
    Int8,
    /// Unsigned 8-bit integer (`uint8`, `ubyte`, `uchar`)
    UInt8,
    /// Signed 16-bit integer (`int16`, `short`)
    Int16,
    /// Unsigned 16-bit integer (`uint16`, `ushort`, `word`)
    UInt16,
    /// Signed 32-bit integer (`int32`, `int`, `long`)
    Int32,
    /// Unsigned 32-bit integer (`uint32`, `uint`, `ulong`, `dword`)
    UInt32,
    /// Signed 64-bit integer (`int64`)
    Int64,
    /// Unsigned 64-bit integer (`uint64`)
    UInt64,
    /// IEEE-754 single precision (`float`)
    Float32,
    /// IEEE-754 double precision (`double`)
    Float64,
    /// One byte, zero or non-zero (`bool`, `boolean`)
    Bool,
    /// Target-width pointer (`ptr`, `pointer`, `uptr`, `upointer`)
    Pointer,
    /// Terminated string of caller-determined length (`str`, `string`)
    String,
    /// Three consecutive `f32` (`vec3`, `vector3`)
    Vector3,
    /// Four consecutive `f32` (`vec4`, `vector4`)
    Vector4,
}

impl DataType
{
    /// Every data type, in declaration order.
    pub const ALL: [DataType; 15] = [
        Self::Int8,
        Self::UInt8,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
        Self::Bool,
        Self::Pointer,
        Self::String,
        Self::Vector3,
        Self::Vector4,
    ];

    /// Fixed width in bytes, `None` for strings.
    #[must_use]
    pub const fn width(self, bitness: Bitness) -> Option<usize>
    {
        match self {
            Self::Int8 | Self::UInt8 | Self::Bool => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float32 => Some(4),
            Self::Int64 | Self::UInt64 | Self::Float64 => Some(8),
            Self::Pointer => Some(bitness.pointer_width()),
            Self::Vector3 => Some(12),
            Self::Vector4 => Some(16),
            Self::String => None,
        }
    }

    /// Whether a big-endian variant of this type exists.
    #[must_use]
    pub const fn supports_big_endian(self) -> bool
    {
        matches!(
            self,
            Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
                | Self::Float32
                | Self::Float64
        )
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str
    {
        match self {
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float32 => "float",
            Self::Float64 => "double",
            Self::Bool => "bool",
            Self::Pointer => "pointer",
            Self::String => "string",
            Self::Vector3 => "vector3",
            Self::Vector4 => "vector4",
        }
    }

    fn from_alias(name: &str) -> Option<Self>
    {
        let data_type = match name {
            "int8" | "byte" | "char" => Self::Int8,
            "uint8" | "ubyte" | "uchar" => Self::UInt8,
            "int16" | "short" => Self::Int16,
            "uint16" | "ushort" | "word" => Self::UInt16,
            "int32" | "int" | "long" => Self::Int32,
            "uint32" | "uint" | "ulong" | "dword" => Self::UInt32,
            "int64" => Self::Int64,
            "uint64" => Self::UInt64,
            "float" | "float32" => Self::Float32,
            "double" | "float64" => Self::Float64,
            "bool" | "boolean" => Self::Bool,
            "ptr" | "pointer" | "uptr" | "upointer" => Self::Pointer,
            "str" | "string" => Self::String,
            "vec3" | "vector3" => Self::Vector3,
            "vec4" | "vector4" => Self::Vector4,
            _ => return None,
        };
        Some(data_type)
    }
}

impl fmt::Display for DataType
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.name())
    }
}

/// Byte order of a multi-byte value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder
{
    /// Least significant byte first (x86 native order)
    #[default]
    Little,
    /// Most significant byte first (`_be` tags)
    Big,
}

/// A data type together with its byte order
///
/// The only way to build a big-endian tag is [`TypeTag::big_endian`] (or
/// parsing a `_be` name), which refuses types that have no big-endian form,
/// so every `TypeTag` value is one the codec can handle.
///
/// ## Example
///
/// ```rust
/// use memscope_core::codec::{ByteOrder, DataType, TypeTag};
///
/// let tag: TypeTag = "dword_be".parse()?;
/// assert_eq!(tag.data_type(), DataType::UInt32);
/// assert_eq!(tag.order(), ByteOrder::Big);
/// assert!("vec3_be".parse::<TypeTag>().is_err());
/// # Ok::<(), memscope_core::error::MemscopeError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag
{
    data_type: DataType,
    order: ByteOrder,
}

impl TypeTag
{
    /// Little-endian tag for `data_type`.
    #[must_use]
    pub const fn new(data_type: DataType) -> Self
    {
        Self {
            data_type,
            order: ByteOrder::Little,
        }
    }

    /// Big-endian tag for `data_type`.
    ///
    /// ## Errors
    ///
    /// `InvalidDataType` if the type has no big-endian variant.
    pub fn big_endian(data_type: DataType) -> MemscopeResult<Self>
    {
        if !data_type.supports_big_endian() {
            return Err(MemscopeError::InvalidDataType(format!("{data_type}_be")));
        }
        Ok(Self {
            data_type,
            order: ByteOrder::Big,
        })
    }

    /// The logical data type.
    #[must_use]
    pub const fn data_type(self) -> DataType
    {
        self.data_type
    }

    /// The byte order.
    #[must_use]
    pub const fn order(self) -> ByteOrder
    {
        self.order
    }

    /// Fixed width in bytes for the given target, `None` for strings.
    #[must_use]
    pub const fn width(self, bitness: Bitness) -> Option<usize>
    {
        self.data_type.width(bitness)
    }

    /// Whether this tag describes a variable-length string.
    #[must_use]
    pub const fn is_string(self) -> bool
    {
        matches!(self.data_type, DataType::String)
    }
}

impl From<DataType> for TypeTag
{
    fn from(data_type: DataType) -> Self
    {
        Self::new(data_type)
    }
}

impl fmt::Display for TypeTag
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.order {
            ByteOrder::Little => write!(f, "{}", self.data_type),
            ByteOrder::Big => write!(f, "{}_be", self.data_type),
        }
    }
}

impl FromStr for TypeTag
{
    type Err = MemscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let name = s.trim().to_lowercase();
        let invalid = || MemscopeError::InvalidDataType(s.to_string());

        if let Some(base) = name.strip_suffix("_be") {
            let data_type = DataType::from_alias(base).ok_or_else(invalid)?;
            return Self::big_endian(data_type).map_err(|_| invalid());
        }

        DataType::from_alias(&name).map(Self::new).ok_or_else(invalid)
    }
}
