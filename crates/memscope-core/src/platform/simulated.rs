//! # Simulated Target
//!
//! An in-memory process that implements [`MemoryPort`]. Memory is a set of
//! mapped regions; reads and writes outside them fail like an unmapped page
//! would. The debugger side records armed registers and hands out events
//! that tests inject with [`SimulatedTarget::inject_event`].
//!
//! Every provider operation can be made to fail with
//! [`SimulatedTarget::fail`], which is how the tests exercise the session's
//! error paths.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::breakpoints::TriggerKind;
use crate::error::{MemscopeError, MemscopeResult};
use crate::events::DebugEvent;
use crate::port::MemoryPort;
use crate::registers::{DebugRegister, REGISTER_COUNT};
use crate::types::{Address, ProcessHandle, ProcessId, ThreadId};

/// Exception code a hardware breakpoint raises on Windows (`EXCEPTION_SINGLE_STEP`).
pub const EXCEPTION_SINGLE_STEP: u32 = 0x8000_0004;

/// Provider operations that can be switched to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint
{
    Open,
    Read,
    Write,
    Attach,
    Detach,
    Arm,
    Disarm,
    Poll,
    Acknowledge,
}

/// A write the target received through [`MemoryPort::write_bytes`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord
{
    pub address: Address,
    pub bytes: Vec<u8>,
}

/// A breakpoint as the simulated debugger sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedBreakpoint
{
    pub address: Address,
    pub trigger: TriggerKind,
    pub size: usize,
}

#[derive(Debug, Default)]
struct TargetState
{
    regions: BTreeMap<u64, Vec<u8>>,
    handles: HashSet<u64>,
    next_handle: u64,
    debugger: Option<bool>,
    armed: [Option<ArmedBreakpoint>; REGISTER_COUNT],
    pending: [VecDeque<DebugEvent>; REGISTER_COUNT],
    writes: Vec<WriteRecord>,
    acknowledged: Vec<(ProcessId, ThreadId)>,
    failures: HashSet<FailurePoint>,
}

impl TargetState
{
    fn check(&self, point: FailurePoint, operation: &'static str) -> MemscopeResult<()>
    {
        if self.failures.contains(&point) {
            return Err(MemscopeError::io(operation, Address::ZERO, "injected failure"));
        }
        Ok(())
    }

    fn check_handle(&self, handle: ProcessHandle, operation: &'static str, address: Address) -> MemscopeResult<()>
    {
        if self.handles.contains(&handle.raw()) {
            Ok(())
        } else {
            Err(MemscopeError::io(operation, address, format!("invalid handle {}", handle.raw())))
        }
    }

    /// Region base and offset covering `[address, address + len)`.
    fn locate(&self, address: Address, len: usize) -> Option<(u64, usize)>
    {
        let (&base, bytes) = self.regions.range(..=address.value()).next_back()?;
        let start = usize::try_from(address.value() - base).ok()?;
        let end = start.checked_add(len)?;
        (end <= bytes.len()).then_some((base, start))
    }
}

/// In-memory process with a scripted hardware debugger
///
/// ## Example
///
/// ```rust
/// use memscope_core::platform::simulated::SimulatedTarget;
/// use memscope_core::port::MemoryPort;
/// use memscope_core::types::{Address, ProcessId};
///
/// let target = SimulatedTarget::new(ProcessId::from(42));
/// target.map_region(Address::from(0x1000), 0x10);
/// let handle = target.open_process(ProcessId::from(42))?;
/// target.write_bytes(handle, Address::from(0x1004), &[1, 2])?;
/// assert_eq!(target.read_bytes(handle, Address::from(0x1003), 3)?, [0, 1, 2]);
/// assert!(target.read_bytes(handle, Address::from(0x100f), 2).is_err());
/// # Ok::<(), memscope_core::error::MemscopeError>(())
/// ```
#[derive(Debug)]
pub struct SimulatedTarget
{
    pid: ProcessId,
    state: Mutex<TargetState>,
    event_ready: Condvar,
}

impl SimulatedTarget
{
    /// A target with no mapped memory and no debugger attached.
    #[must_use]
    pub fn new(pid: ProcessId) -> Self
    {
        Self {
            pid,
            state: Mutex::new(TargetState {
                next_handle: 1,
                ..TargetState::default()
            }),
            event_ready: Condvar::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, TargetState>
    {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub const fn pid(&self) -> ProcessId
    {
        self.pid
    }

    /// Map `len` zeroed bytes at `base`, replacing any region with the same base.
    pub fn map_region(&self, base: Address, len: usize)
    {
        self.state().regions.insert(base.value(), vec![0; len]);
    }

    /// Map a region initialised with `bytes`.
    pub fn map_bytes(&self, base: Address, bytes: &[u8])
    {
        self.state().regions.insert(base.value(), bytes.to_vec());
    }

    /// Store bytes without going through a handle or the write log.
    ///
    /// ## Errors
    ///
    /// `IoFailure` when the range is not mapped.
    pub fn poke(&self, address: Address, bytes: &[u8]) -> MemscopeResult<()>
    {
        let mut state = self.state();
        let (base, start) = state
            .locate(address, bytes.len())
            .ok_or_else(|| MemscopeError::io("poke", address, "address not mapped"))?;
        if let Some(region) = state.regions.get_mut(&base) {
            region[start..start + bytes.len()].copy_from_slice(bytes);
        }
        Ok(())
    }

    /// Load bytes without going through a handle.
    ///
    /// ## Errors
    ///
    /// `IoFailure` when the range is not mapped.
    pub fn peek(&self, address: Address, len: usize) -> MemscopeResult<Vec<u8>>
    {
        let state = self.state();
        let (base, start) = state
            .locate(address, len)
            .ok_or_else(|| MemscopeError::io("peek", address, "address not mapped"))?;
        Ok(state.regions[&base][start..start + len].to_vec())
    }

    /// Writes received through the port, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<WriteRecord>
    {
        self.state().writes.clone()
    }

    pub fn clear_writes(&self)
    {
        self.state().writes.clear();
    }

    /// Make `point` fail until [`SimulatedTarget::recover`] is called.
    pub fn fail(&self, point: FailurePoint)
    {
        self.state().failures.insert(point);
    }

    pub fn recover(&self, point: FailurePoint)
    {
        self.state().failures.remove(&point);
    }

    #[must_use]
    pub fn is_debugger_attached(&self) -> bool
    {
        self.state().debugger.is_some()
    }

    /// What the debugger has programmed into `register`.
    #[must_use]
    pub fn armed(&self, register: DebugRegister) -> Option<ArmedBreakpoint>
    {
        self.state().armed[register.index()]
    }

    /// Number of process handles currently open.
    #[must_use]
    pub fn open_handles(&self) -> usize
    {
        self.state().handles.len()
    }

    /// Threads resumed through `acknowledge_debug_event`, oldest first.
    #[must_use]
    pub fn acknowledged(&self) -> Vec<(ProcessId, ThreadId)>
    {
        self.state().acknowledged.clone()
    }

    /// Queue a trap on `register` as if `thread` hit it at `exception_address`.
    pub fn inject_event(&self, register: DebugRegister, thread: ThreadId, exception_address: Address)
    {
        let event = DebugEvent {
            process_id: self.pid,
            thread_id: thread,
            register,
            exception_code: EXCEPTION_SINGLE_STEP,
            exception_address,
        };
        self.state().pending[register.index()].push_back(event);
        self.event_ready.notify_all();
    }

    /// Events queued but not yet polled on `register`.
    #[must_use]
    pub fn pending_events(&self, register: DebugRegister) -> usize
    {
        self.state().pending[register.index()].len()
    }

    fn require_pid(&self, pid: ProcessId) -> MemscopeResult<()>
    {
        if pid == self.pid {
            Ok(())
        } else {
            Err(MemscopeError::ProcessNotFound(pid.0))
        }
    }
}

impl MemoryPort for SimulatedTarget
{
    fn open_process(&self, pid: ProcessId) -> MemscopeResult<ProcessHandle>
    {
        self.require_pid(pid)?;
        let mut state = self.state();
        state.check(FailurePoint::Open, "open_process")?;
        let handle = state.next_handle;
        state.next_handle += 1;
        state.handles.insert(handle);
        debug!(%pid, handle, "opened process handle");
        Ok(ProcessHandle::from(handle))
    }

    fn close_handle(&self, handle: ProcessHandle) -> MemscopeResult<()>
    {
        if self.state().handles.remove(&handle.raw()) {
            Ok(())
        } else {
            Err(MemscopeError::InvalidArgument(format!("unknown process handle {}", handle.raw())))
        }
    }

    fn read_bytes(&self, handle: ProcessHandle, address: Address, len: usize) -> MemscopeResult<Vec<u8>>
    {
        let state = self.state();
        state.check_handle(handle, "read", address)?;
        if state.failures.contains(&FailurePoint::Read) {
            return Err(MemscopeError::io("read", address, "injected failure"));
        }
        let (base, start) = state
            .locate(address, len)
            .ok_or_else(|| MemscopeError::io("read", address, format!("{len} bytes not mapped")))?;
        trace!(%address, len, "simulated read");
        Ok(state.regions[&base][start..start + len].to_vec())
    }

    fn write_bytes(&self, handle: ProcessHandle, address: Address, data: &[u8]) -> MemscopeResult<()>
    {
        let mut state = self.state();
        state.check_handle(handle, "write", address)?;
        if state.failures.contains(&FailurePoint::Write) {
            return Err(MemscopeError::io("write", address, "injected failure"));
        }
        let (base, start) = state
            .locate(address, data.len())
            .ok_or_else(|| MemscopeError::io("write", address, format!("{} bytes not mapped", data.len())))?;
        if let Some(region) = state.regions.get_mut(&base) {
            region[start..start + data.len()].copy_from_slice(data);
        }
        state.writes.push(WriteRecord {
            address,
            bytes: data.to_vec(),
        });
        trace!(%address, len = data.len(), "simulated write");
        Ok(())
    }

    fn attach_debugger(&self, pid: ProcessId, kill_on_detach: bool) -> MemscopeResult<()>
    {
        let mut state = self.state();
        if pid != self.pid || state.failures.contains(&FailurePoint::Attach) {
            return Err(MemscopeError::AttachFailed {
                pid: pid.0,
                details: "access denied".to_string(),
            });
        }
        if state.debugger.is_some() {
            return Err(MemscopeError::AttachFailed {
                pid: pid.0,
                details: "process is already being debugged".to_string(),
            });
        }
        state.debugger = Some(kill_on_detach);
        Ok(())
    }

    fn detach_debugger(&self, pid: ProcessId) -> MemscopeResult<()>
    {
        let mut state = self.state();
        if pid != self.pid || state.debugger.is_none() || state.failures.contains(&FailurePoint::Detach) {
            return Err(MemscopeError::DetachFailed {
                pid: pid.0,
                details: "no debugger attached".to_string(),
            });
        }
        state.debugger = None;
        state.armed = [None; REGISTER_COUNT];
        for queue in &mut state.pending {
            queue.clear();
        }
        Ok(())
    }

    fn arm_hardware_breakpoint(
        &self,
        pid: ProcessId,
        address: Address,
        register: DebugRegister,
        trigger: TriggerKind,
        size: usize,
    ) -> MemscopeResult<()>
    {
        self.require_pid(pid)?;
        let mut state = self.state();
        if state.debugger.is_none() {
            return Err(MemscopeError::NotAttached);
        }
        if state.failures.contains(&FailurePoint::Arm) {
            return Err(MemscopeError::io("arm", address, "SetThreadContext failed"));
        }
        state.armed[register.index()] = Some(ArmedBreakpoint { address, trigger, size });
        debug!(%pid, %register, %address, %trigger, size, "simulated arm");
        Ok(())
    }

    fn disarm_hardware_breakpoint(&self, pid: ProcessId, register: DebugRegister) -> MemscopeResult<()>
    {
        self.require_pid(pid)?;
        let mut state = self.state();
        state.check(FailurePoint::Disarm, "disarm")?;
        match state.armed[register.index()].take() {
            Some(armed) => {
                debug!(%pid, %register, address = %armed.address, "simulated disarm");
                Ok(())
            }
            None => Err(MemscopeError::io("disarm", Address::ZERO, format!("{register} is not armed"))),
        }
    }

    fn poll_debug_event(&self, register: DebugRegister, timeout: Duration) -> MemscopeResult<Option<DebugEvent>>
    {
        let deadline = Instant::now() + timeout;
        let mut state = self.state();
        loop {
            state.check(FailurePoint::Poll, "poll")?;
            if let Some(event) = state.pending[register.index()].pop_front() {
                return Ok(Some(event));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            state = self
                .event_ready
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn acknowledge_debug_event(&self, pid: ProcessId, thread: ThreadId) -> MemscopeResult<()>
    {
        let mut state = self.state();
        state.check(FailurePoint::Acknowledge, "acknowledge")?;
        state.acknowledged.push((pid, thread));
        Ok(())
    }
}
