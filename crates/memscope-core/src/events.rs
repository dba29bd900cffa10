//! Debug event types and the per-session publish/subscribe hub.
//!
//! Every trap reported by the provider becomes a [`DebugEvent`]. The
//! [`EventHub`] fans each event out twice: on a global topic carrying events
//! from every register, and on a topic scoped to the register that fired.
//! Subscribers choose one or both.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::registers::{DebugRegister, REGISTER_COUNT};
use crate::types::{Address, ProcessId, ThreadId};

/// Default number of undelivered events each topic buffers per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// A hardware breakpoint trap reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEvent
{
    /// Process that trapped
    pub process_id: ProcessId,
    /// Thread that trapped; resumed through `acknowledge_debug_event`
    pub thread_id: ThreadId,
    /// Register whose condition fired
    pub register: DebugRegister,
    /// Raw exception code from the provider (`EXCEPTION_SINGLE_STEP` on Windows)
    pub exception_code: u32,
    /// Instruction address at the time of the trap
    pub exception_address: Address,
}

impl DebugEvent
{
    /// Human-readable description of the event.
    #[must_use]
    pub fn describe(&self) -> String
    {
        format!(
            "{} hit in process {} (thread {}) at {} [code 0x{:08x}]",
            self.register,
            self.process_id,
            self.thread_id.raw(),
            self.exception_address,
            self.exception_code
        )
    }
}

/// Receiver side of a debug event topic.
pub type DebugEventReceiver = broadcast::Receiver<DebugEvent>;

#[derive(Debug)]
struct HubState
{
    global: broadcast::Sender<DebugEvent>,
    scoped: [broadcast::Sender<DebugEvent>; REGISTER_COUNT],
    live: [Option<u64>; REGISTER_COUNT],
    next_generation: u64,
}

/// Typed publish/subscribe hub with a global topic and one topic per register
///
/// Publishing is gated by a generation number per register. A monitor gets a
/// generation when it starts; [`EventHub::deactivate`] clears it under the
/// same lock publishing takes, so once `deactivate` returns no event carrying
/// the old generation can reach a subscriber.
#[derive(Debug)]
pub struct EventHub
{
    state: Mutex<HubState>,
}

impl EventHub
{
    /// Create a hub whose topics buffer `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self
    {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(HubState {
                global: broadcast::channel(capacity).0,
                scoped: std::array::from_fn(|_| broadcast::channel(capacity).0),
                live: [None; REGISTER_COUNT],
                next_generation: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, HubState>
    {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to events from every register.
    #[must_use]
    pub fn subscribe(&self) -> DebugEventReceiver
    {
        self.state().global.subscribe()
    }

    /// Subscribe to events from a single register.
    #[must_use]
    pub fn subscribe_register(&self, register: DebugRegister) -> DebugEventReceiver
    {
        self.state().scoped[register.index()].subscribe()
    }

    /// Open `register` for publishing and return the generation to publish with.
    pub fn activate(&self, register: DebugRegister) -> u64
    {
        let mut state = self.state();
        state.next_generation += 1;
        let generation = state.next_generation;
        state.live[register.index()] = Some(generation);
        generation
    }

    /// Close `register`; later publishes for its current generation are dropped.
    pub fn deactivate(&self, register: DebugRegister)
    {
        self.state().live[register.index()] = None;
    }

    /// Close every register.
    pub fn deactivate_all(&self)
    {
        self.state().live = [None; REGISTER_COUNT];
    }

    /// Whether `register` is open for the given generation.
    #[must_use]
    pub fn is_live(&self, register: DebugRegister, generation: u64) -> bool
    {
        self.state().live[register.index()] == Some(generation)
    }

    /// Publish `event` on the global topic and on its register's topic.
    ///
    /// Returns `false` (and delivers nothing) when the generation is stale.
    pub fn publish(&self, generation: u64, event: DebugEvent) -> bool
    {
        let state = self.state();
        let index = event.register.index();
        if state.live[index] != Some(generation) {
            warn!(register = %event.register, generation, "dropping event from cancelled monitor");
            return false;
        }

        trace!(register = %event.register, "publishing debug event");
        // Sending only fails when nobody is subscribed.
        let _ = state.global.send(event.clone());
        let _ = state.scoped[index].send(event);
        true
    }
}

impl Default for EventHub
{
    fn default() -> Self
    {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
