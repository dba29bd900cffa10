//! # Hardware Debug Registers
//!
//! x86 CPUs expose four address breakpoint registers, DR0-DR3. Each can watch
//! one address for execution, writes, or any access. The
//! [`HardwareRegisterPool`] hands them out and takes them back; it knows
//! nothing about what the registers are programmed with.

use std::fmt;

use crate::error::MemscopeError;

/// Number of hardware breakpoint slots.
pub const REGISTER_COUNT: usize = 4;

/// One of the four x86 address breakpoint registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DebugRegister
{
    Dr0 = 0,
    Dr1 = 1,
    Dr2 = 2,
    Dr3 = 3,
}

impl DebugRegister
{
    /// All registers in allocation order.
    pub const ALL: [DebugRegister; REGISTER_COUNT] = [Self::Dr0, Self::Dr1, Self::Dr2, Self::Dr3];

    /// Slot index, 0-3.
    #[must_use]
    pub const fn index(self) -> usize
    {
        self as usize
    }
}

impl TryFrom<u8> for DebugRegister
{
    type Error = MemscopeError;

    fn try_from(value: u8) -> Result<Self, Self::Error>
    {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(MemscopeError::UnknownRegister(value))
    }
}

impl fmt::Display for DebugRegister
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "DR{}", self.index())
    }
}

/// Tracks which debug registers are in use
///
/// The pool is plain data; [`DebuggerSession`](crate::session::DebuggerSession)
/// owns it and only mutates it through `&mut self`, so an acquire and the
/// release that undoes it can never interleave with another caller.
///
/// ## Example
///
/// ```rust
/// use memscope_core::registers::{DebugRegister, HardwareRegisterPool};
///
/// let mut pool = HardwareRegisterPool::new();
/// assert_eq!(pool.acquire(), Some(DebugRegister::Dr0));
/// assert_eq!(pool.acquire(), Some(DebugRegister::Dr1));
/// pool.release(DebugRegister::Dr0);
/// assert_eq!(pool.acquire(), Some(DebugRegister::Dr0));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareRegisterPool
{
    busy: [bool; REGISTER_COUNT],
}

impl HardwareRegisterPool
{
    /// A pool with every register free.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Take the first free register in DR0..DR3 order.
    ///
    /// Returns `None` when all four are busy; that is a capacity condition,
    /// not an error.
    pub fn acquire(&mut self) -> Option<DebugRegister>
    {
        let register = DebugRegister::ALL.into_iter().find(|register| !self.busy[register.index()])?;
        self.busy[register.index()] = true;
        Some(register)
    }

    /// Mark a register free again. Releasing a free register does nothing.
    pub fn release(&mut self, register: DebugRegister)
    {
        self.busy[register.index()] = false;
    }

    /// Whether `register` is currently handed out.
    #[must_use]
    pub fn is_busy(&self, register: DebugRegister) -> bool
    {
        self.busy[register.index()]
    }

    /// Registers currently free, in allocation order.
    #[must_use]
    pub fn available(&self) -> Vec<DebugRegister>
    {
        DebugRegister::ALL
            .into_iter()
            .filter(|register| !self.is_busy(*register))
            .collect()
    }

    /// Number of free registers.
    #[must_use]
    pub fn free_count(&self) -> usize
    {
        self.busy.iter().filter(|busy| !**busy).count()
    }
}
