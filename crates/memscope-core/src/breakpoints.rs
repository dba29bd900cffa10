//! Hardware breakpoint bookkeeping.
//!
//! The provider installs and removes the actual trap; the session records
//! each armed breakpoint here so callers can list what is live.

use std::fmt;

use crate::error::MemscopeError;
use crate::registers::DebugRegister;
use crate::types::{Address, ProcessId};

/// Access condition a hardware breakpoint traps on
///
/// The discriminants are the raw values the x86 debug control register uses
/// for the R/W field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TriggerKind
{
    /// Instruction fetch at the address
    Execute = 0,
    /// Data write
    Write = 1,
    /// Data read or write
    ReadWrite = 3,
}

impl TriggerKind
{
    /// Raw R/W field value.
    #[must_use]
    pub const fn raw(self) -> u8
    {
        self as u8
    }
}

impl TryFrom<u8> for TriggerKind
{
    type Error = MemscopeError;

    fn try_from(value: u8) -> Result<Self, Self::Error>
    {
        match value {
            0 => Ok(Self::Execute),
            1 => Ok(Self::Write),
            3 => Ok(Self::ReadWrite),
            other => Err(MemscopeError::InvalidArgument(format!("unknown trigger kind {other}"))),
        }
    }
}

impl fmt::Display for TriggerKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let name = match self {
            Self::Execute => "execute",
            Self::Write => "write",
            Self::ReadWrite => "readwrite",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for TriggerKind
{
    type Err = MemscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_ascii_lowercase().as_str() {
            "execute" | "exec" | "x" => Ok(Self::Execute),
            "write" | "w" => Ok(Self::Write),
            "readwrite" | "access" | "rw" => Ok(Self::ReadWrite),
            other => Err(MemscopeError::InvalidArgument(format!("unknown trigger kind '{other}'"))),
        }
    }
}

/// An armed hardware breakpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint
{
    /// Process the breakpoint was armed in
    pub process_id: ProcessId,
    /// Watched address
    pub address: Address,
    /// Access condition
    pub trigger: TriggerKind,
    /// Register holding the breakpoint
    pub register: DebugRegister,
    /// Number of bytes watched
    pub size: usize,
}

impl fmt::Display for Breakpoint
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(
            f,
            "{} {} {} bytes at {} (pid {})",
            self.register, self.trigger, self.size, self.address, self.process_id
        )
    }
}
