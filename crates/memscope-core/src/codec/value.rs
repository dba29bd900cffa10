//! Decoded values.

use std::fmt;

/// Three consecutive `f32` components (position, velocity, ...)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3
{
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Four consecutive `f32` components (quaternion, colour, ...)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector4
{
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

/// A typed value read from or written to target memory
///
/// Each variant holds the exact host representation of one
/// [`DataType`](super::DataType). 64-bit integers and pointers are carried as
/// `i64`/`u64`, never as floating point, so values above 2^53 survive a
/// round trip unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Value
{
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    /// Raw pointer value; only the low 32 bits are meaningful on 32-bit targets
    Pointer(u64),
    String(String),
    Vector3(Vector3),
    Vector4(Vector4),
}

impl Value
{
    /// Short name of the host representation, used in type mismatch errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str
    {
        match self {
            Self::Int8(_) => "i8",
            Self::UInt8(_) => "u8",
            Self::Int16(_) => "i16",
            Self::UInt16(_) => "u16",
            Self::Int32(_) => "i32",
            Self::UInt32(_) => "u32",
            Self::Int64(_) => "i64",
            Self::UInt64(_) => "u64",
            Self::Float32(_) => "f32",
            Self::Float64(_) => "f64",
            Self::Bool(_) => "bool",
            Self::Pointer(_) => "pointer",
            Self::String(_) => "string",
            Self::Vector3(_) => "vector3",
            Self::Vector4(_) => "vector4",
        }
    }

    /// The string payload, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str>
    {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    /// Integer payloads widened to `i128`, `None` for non-integers.
    #[must_use]
    pub fn as_i128(&self) -> Option<i128>
    {
        match *self {
            Self::Int8(v) => Some(v.into()),
            Self::UInt8(v) => Some(v.into()),
            Self::Int16(v) => Some(v.into()),
            Self::UInt16(v) => Some(v.into()),
            Self::Int32(v) => Some(v.into()),
            Self::UInt32(v) => Some(v.into()),
            Self::Int64(v) => Some(v.into()),
            Self::UInt64(v) | Self::Pointer(v) => Some(v.into()),
            _ => None,
        }
    }
}

impl fmt::Display for Value
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Int8(v) => write!(f, "{v}"),
            Self::UInt8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Pointer(v) => write!(f, "0x{v:x}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Vector3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Self::Vector4(v) => write!(f, "({}, {}, {}, {})", v.x, v.y, v.z, v.w),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value
            {
                fn from(value: $ty) -> Self
                {
                    Self::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    bool => Bool,
    String => String,
    Vector3 => Vector3,
    Vector4 => Vector4,
}

impl From<&str> for Value
{
    fn from(value: &str) -> Self
    {
        Self::String(value.to_string())
    }
}
