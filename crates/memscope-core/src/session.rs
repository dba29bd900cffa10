//! # Debugger Session
//!
//! [`DebuggerSession`] ties the pieces together: it attaches the provider's
//! debugger, sizes and arms hardware breakpoints on free registers, runs a
//! [`Monitor`] per armed register, and hands out event subscriptions.
//!
//! ## Lifecycle
//!
//! 1. Create a session on a tokio runtime: `DebuggerSession::new(port, handle)`
//! 2. Attach: `attach(pid, kill_on_detach)`
//! 3. Arm: `set_hardware_breakpoint(pid, address, trigger, tag)`
//! 4. Consume events from `subscribe()` or `subscribe_register(register)`
//! 5. Remove breakpoints or `detach(pid)`
//!
//! Dropping the session cancels every monitor but does not detach.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::breakpoints::{Breakpoint, TriggerKind};
use crate::codec::TypeTag;
use crate::config::SessionConfig;
use crate::error::{MemscopeError, MemscopeResult};
use crate::events::{DebugEventReceiver, EventHub};
use crate::monitor::{Monitor, PollGate, PollSchedule};
use crate::port::MemoryPort;
use crate::registers::{DebugRegister, HardwareRegisterPool, REGISTER_COUNT};
use crate::types::{Address, ProcessId};

/// Hardware breakpoint session over a [`MemoryPort`]
pub struct DebuggerSession
{
    port: Arc<dyn MemoryPort>,
    runtime: Handle,
    config: SessionConfig,
    pool: HardwareRegisterPool,
    breakpoints: [Option<Breakpoint>; REGISTER_COUNT],
    monitors: [Option<Monitor>; REGISTER_COUNT],
    poll_gates: [PollGate; REGISTER_COUNT],
    hub: Arc<EventHub>,
    attached: Option<ProcessId>,
}

impl DebuggerSession
{
    /// Create a session whose monitors run on `runtime`.
    pub fn new(port: Arc<dyn MemoryPort>, runtime: Handle) -> Self
    {
        Self::with_config(port, runtime, SessionConfig::default())
    }

    /// Create a session with explicit configuration.
    pub fn with_config(port: Arc<dyn MemoryPort>, runtime: Handle, config: SessionConfig) -> Self
    {
        Self {
            port,
            runtime,
            hub: Arc::new(EventHub::new(config.event_capacity)),
            config,
            pool: HardwareRegisterPool::new(),
            breakpoints: [None; REGISTER_COUNT],
            monitors: std::array::from_fn(|_| None),
            poll_gates: std::array::from_fn(|_| PollGate::default()),
            attached: None,
        }
    }

    /// Create a session on the runtime the caller is running in.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` when called outside a tokio runtime.
    pub fn in_current_runtime(port: Arc<dyn MemoryPort>, config: SessionConfig) -> MemscopeResult<Self>
    {
        let runtime = Handle::try_current()
            .map_err(|err| MemscopeError::InvalidArgument(format!("no tokio runtime available: {err}")))?;
        Ok(Self::with_config(port, runtime, config))
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig
    {
        &self.config
    }

    /// Whether the provider's debugger is attached through this session.
    #[must_use]
    pub const fn is_attached(&self) -> bool
    {
        self.attached.is_some()
    }

    /// Process the session last attached to.
    #[must_use]
    pub const fn attached_process(&self) -> Option<ProcessId>
    {
        self.attached
    }

    /// Attach the provider's debugger to `pid`.
    ///
    /// With `kill_on_detach` the provider terminates the target when the
    /// debugger goes away.
    ///
    /// ## Errors
    ///
    /// Whatever the provider reports; the session state is unchanged on error.
    pub fn attach(&mut self, pid: ProcessId, kill_on_detach: bool) -> MemscopeResult<()>
    {
        self.port.attach_debugger(pid, kill_on_detach)?;
        self.attached = Some(pid);
        info!(%pid, kill_on_detach, "attached debugger");
        Ok(())
    }

    /// Cancel every monitor, then detach the provider's debugger from `pid`.
    ///
    /// Registers are not disarmed one by one; the provider drops all of a
    /// process's breakpoints when its debugger detaches. On success the
    /// session forgets them and every register is free again.
    ///
    /// ## Errors
    ///
    /// Whatever the provider reports. Monitors stay cancelled; the recorded
    /// breakpoints are kept.
    pub fn detach(&mut self, pid: ProcessId) -> MemscopeResult<()>
    {
        self.cancel_all_monitors();
        self.port.detach_debugger(pid)?;

        self.pool = HardwareRegisterPool::new();
        self.breakpoints = [None; REGISTER_COUNT];
        if self.attached == Some(pid) {
            self.attached = None;
        }
        info!(%pid, "detached debugger");
        Ok(())
    }

    /// Number of bytes a breakpoint on `tag` at `address` watches.
    ///
    /// Fixed-width tags use their width for the configured bitness. Strings
    /// are read from the target and measured, so the trap covers every byte
    /// of the current text.
    ///
    /// ## Errors
    ///
    /// `IoFailure` when the string cannot be read.
    pub fn breakpoint_size(&self, pid: ProcessId, address: Address, tag: TypeTag) -> MemscopeResult<usize>
    {
        if let Some(width) = tag.width(self.config.bitness) {
            return Ok(width);
        }

        let as_io = |err: MemscopeError| match err {
            MemscopeError::IoFailure { .. } => err,
            other => MemscopeError::io("read_string", address, other.to_string()),
        };
        let handle = self.port.open_process(pid).map_err(as_io)?;
        let read = self.port.read_c_string(handle, address);
        if let Err(err) = self.port.close_handle(handle) {
            warn!(%pid, error = %err, "failed to close process handle");
        }
        let bytes = read.map_err(as_io)?;

        // A trap needs at least one byte to watch.
        Ok(bytes.len().max(1))
    }

    /// Arm a hardware breakpoint and start monitoring it.
    ///
    /// Returns the register that now holds the breakpoint.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument` for a null address
    /// - `RegisterPoolExhausted` when all four registers are busy; nothing is
    ///   sent to the provider
    /// - `IoFailure` when a string target cannot be measured
    /// - whatever the provider reports when arming fails; the register is
    ///   released again before returning
    pub fn set_hardware_breakpoint(
        &mut self,
        pid: ProcessId,
        address: Address,
        trigger: TriggerKind,
        tag: TypeTag,
    ) -> MemscopeResult<DebugRegister>
    {
        if address.is_null() {
            return Err(MemscopeError::InvalidArgument("breakpoint address must not be null".to_string()));
        }
        if self.pool.free_count() == 0 {
            return Err(MemscopeError::RegisterPoolExhausted);
        }

        let size = self.breakpoint_size(pid, address, tag)?;
        let register = self.pool.acquire().ok_or(MemscopeError::RegisterPoolExhausted)?;

        if let Err(err) = self
            .port
            .arm_hardware_breakpoint(pid, address, register, trigger, size)
        {
            self.pool.release(register);
            warn!(%pid, %address, %register, error = %err, "failed to arm hardware breakpoint");
            return Err(err);
        }

        let breakpoint = Breakpoint {
            process_id: pid,
            address,
            trigger,
            register,
            size,
        };
        self.breakpoints[register.index()] = Some(breakpoint);
        info!(%breakpoint, "hardware breakpoint armed");

        self.monitor(register);
        Ok(register)
    }

    /// Disarm the breakpoint in `register` and stop its monitor.
    ///
    /// ## Errors
    ///
    /// Whatever the provider reports; on error the register stays allocated
    /// and its monitor keeps running.
    pub fn remove_hardware_breakpoint(&mut self, pid: ProcessId, register: DebugRegister) -> MemscopeResult<()>
    {
        self.port.disarm_hardware_breakpoint(pid, register)?;

        self.pool.release(register);
        self.breakpoints[register.index()] = None;
        self.cancel_monitor(register);
        info!(%pid, %register, "hardware breakpoint removed");
        Ok(())
    }

    /// Start (or restart) the monitor for `register`.
    ///
    /// `set_hardware_breakpoint` calls this itself; call it directly to
    /// resume monitoring after changing the session's poll schedule.
    pub fn monitor(&mut self, register: DebugRegister)
    {
        self.cancel_monitor(register);
        let schedule = PollSchedule {
            interval: self.config.poll_interval,
            timeout: self.config.poll_timeout,
        };
        let monitor = Monitor::spawn(
            &self.runtime,
            Arc::clone(&self.port),
            Arc::clone(&self.hub),
            Arc::clone(&self.poll_gates[register.index()]),
            register,
            schedule,
        );
        self.monitors[register.index()] = Some(monitor);
    }

    /// Whether a monitor is running for `register`.
    #[must_use]
    pub fn is_monitoring(&self, register: DebugRegister) -> bool
    {
        self.monitors[register.index()]
            .as_ref()
            .is_some_and(|monitor| !monitor.is_finished())
    }

    /// Subscribe to events from every register.
    #[must_use]
    pub fn subscribe(&self) -> DebugEventReceiver
    {
        self.hub.subscribe()
    }

    /// Subscribe to events from one register.
    #[must_use]
    pub fn subscribe_register(&self, register: DebugRegister) -> DebugEventReceiver
    {
        self.hub.subscribe_register(register)
    }

    /// Breakpoints currently armed, in register order.
    #[must_use]
    pub fn breakpoints(&self) -> Vec<Breakpoint>
    {
        self.breakpoints.iter().flatten().copied().collect()
    }

    /// Number of registers available for new breakpoints.
    #[must_use]
    pub fn free_registers(&self) -> usize
    {
        self.pool.free_count()
    }

    fn cancel_monitor(&mut self, register: DebugRegister)
    {
        if let Some(monitor) = self.monitors[register.index()].take() {
            monitor.cancel(&self.hub);
        }
    }

    fn cancel_all_monitors(&mut self)
    {
        self.hub.deactivate_all();
        for monitor in self.monitors.iter_mut().filter_map(Option::take) {
            monitor.cancel(&self.hub);
        }
        debug!("all monitors cancelled");
    }
}

impl Drop for DebuggerSession
{
    fn drop(&mut self)
    {
        self.cancel_all_monitors();
    }
}

impl std::fmt::Debug for DebuggerSession
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("DebuggerSession")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("breakpoints", &self.breakpoints)
            .field("attached", &self.attached)
            .finish_non_exhaustive()
    }
}
