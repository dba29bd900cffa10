//! # Breakpoint Monitors
//!
//! A monitor is a tokio task that polls the provider for traps on one debug
//! register. Each tick hands the blocking `poll_debug_event` call to the
//! blocking pool and waits for it before scheduling the next tick. Polls on
//! one register are serialized through a shared [`PollGate`], so a restarted
//! monitor waits for the poll its predecessor still has in flight. A trapped
//! thread is always resumed through `acknowledge_debug_event`, even when the
//! monitor was cancelled while the poll was running.
//!
//! Cancelling a monitor closes its register on the [`EventHub`] and raises
//! its stop flag. The task is never aborted: a poll that was already running
//! completes, its thread is acknowledged, and the event carries a dead
//! generation so the hub drops it. The loop then exits on its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::events::EventHub;
use crate::port::MemoryPort;
use crate::registers::DebugRegister;

/// Timing for one monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule
{
    /// Delay between ticks
    pub interval: Duration,
    /// Timeout handed to the provider on each tick
    pub timeout: Duration,
}

/// Lock held around each poll and acknowledge on one register
pub type PollGate = Arc<Mutex<()>>;

/// Handle to a running monitor task
#[derive(Debug)]
pub struct Monitor
{
    register: DebugRegister,
    generation: u64,
    should_stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Monitor
{
    /// Start polling `register` on `runtime`.
    ///
    /// Every monitor of the same register must share one `gate`.
    pub fn spawn(
        runtime: &Handle,
        port: Arc<dyn MemoryPort>,
        hub: Arc<EventHub>,
        gate: PollGate,
        register: DebugRegister,
        schedule: PollSchedule,
    ) -> Self
    {
        let generation = hub.activate(register);
        debug!(%register, generation, ?schedule, "starting monitor");
        let should_stop = Arc::new(AtomicBool::new(false));
        let task = runtime.spawn(poll_loop(
            PollContext {
                port,
                hub,
                gate,
                should_stop: Arc::clone(&should_stop),
                register,
                generation,
            },
            schedule,
        ));
        Self {
            register,
            generation,
            should_stop,
            task,
        }
    }

    /// Register this monitor polls.
    #[must_use]
    pub const fn register(&self) -> DebugRegister
    {
        self.register
    }

    /// Generation the monitor publishes with.
    #[must_use]
    pub const fn generation(&self) -> u64
    {
        self.generation
    }

    /// Whether the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool
    {
        self.task.is_finished()
    }

    /// Stop the monitor. No event from it is published after this returns.
    ///
    /// A poll already in flight still runs to completion and resumes any
    /// thread it trapped before the task exits.
    pub fn cancel(self, hub: &EventHub)
    {
        self.should_stop.store(true, Ordering::Release);
        if hub.is_live(self.register, self.generation) {
            hub.deactivate(self.register);
        }
        debug!(register = %self.register, generation = self.generation, "monitor cancelled");
    }
}

struct PollContext
{
    port: Arc<dyn MemoryPort>,
    hub: Arc<EventHub>,
    gate: PollGate,
    should_stop: Arc<AtomicBool>,
    register: DebugRegister,
    generation: u64,
}

impl PollContext
{
    fn stopped(&self) -> bool
    {
        self.should_stop.load(Ordering::Acquire) || !self.hub.is_live(self.register, self.generation)
    }
}

async fn poll_loop(ctx: PollContext, schedule: PollSchedule)
{
    let (register, generation) = (ctx.register, ctx.generation);
    let mut ticker = time::interval(schedule.interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if ctx.stopped() {
            break;
        }

        let _gate = ctx.gate.lock().await;
        // A restart may have happened while waiting on the previous monitor's poll.
        if ctx.stopped() {
            break;
        }

        trace!(%register, "polling for debug event");
        let poll_port = Arc::clone(&ctx.port);
        let timeout = schedule.timeout;
        let polled = tokio::task::spawn_blocking(move || poll_port.poll_debug_event(register, timeout)).await;

        let event = match polled {
            Ok(Ok(Some(event))) => event,
            Ok(Ok(None)) => continue,
            Ok(Err(err)) => {
                warn!(%register, error = %err, "poll failed");
                continue;
            }
            Err(err) => {
                warn!(%register, error = %err, "poll task did not complete");
                break;
            }
        };

        let ack_port = Arc::clone(&ctx.port);
        let (pid, thread) = (event.process_id, event.thread_id);
        match tokio::task::spawn_blocking(move || ack_port.acknowledge_debug_event(pid, thread)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(%register, %pid, error = %err, "failed to resume trapped thread"),
            Err(err) => warn!(%register, error = %err, "acknowledge task did not complete"),
        }

        // Dropped by the hub when the monitor was cancelled during the poll.
        ctx.hub.publish(generation, event);
    }

    trace!(%register, generation, "monitor loop exited");
}
