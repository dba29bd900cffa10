//! Tests for the debugger session against a simulated target

use std::sync::Arc;
use std::time::Duration;

use memscope_core::breakpoints::TriggerKind;
use memscope_core::codec::TypeTag;
use memscope_core::config::SessionConfig;
use memscope_core::error::MemscopeError;
use memscope_core::events::DebugEventReceiver;
use memscope_core::platform::simulated::{FailurePoint, SimulatedTarget};
use memscope_core::registers::DebugRegister;
use memscope_core::session::DebuggerSession;
use memscope_core::types::{Address, Bitness, ProcessId, ThreadId};
use tokio::runtime::Handle;
use tokio::time::timeout;

const PID: ProcessId = ProcessId(4242);

fn tag(name: &str) -> TypeTag
{
    name.parse().unwrap()
}

fn fast_config() -> SessionConfig
{
    SessionConfig::default()
        .with_bitness(Bitness::X64)
        .with_poll_interval(Duration::from_millis(5))
        .with_poll_timeout(Duration::from_millis(5))
}

fn setup() -> (Arc<SimulatedTarget>, DebuggerSession)
{
    let target = Arc::new(SimulatedTarget::new(PID));
    target.map_region(Address::from(0x1000), 0x200);
    let session = DebuggerSession::with_config(target.clone(), Handle::current(), fast_config());
    (target, session)
}

fn attached() -> (Arc<SimulatedTarget>, DebuggerSession)
{
    let (target, mut session) = setup();
    session.attach(PID, false).unwrap();
    (target, session)
}

async fn next_event(rx: &mut DebugEventReceiver) -> memscope_core::events::DebugEvent
{
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event should arrive")
        .expect("topic should stay open")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_write_breakpoint_end_to_end()
{
    let (target, mut session) = attached();

    let register = session
        .set_hardware_breakpoint(PID, Address::from(0x1000), TriggerKind::Write, tag("int32"))
        .unwrap();
    assert!(DebugRegister::ALL.contains(&register));
    assert_eq!(session.free_registers(), 3);
    assert!(session.is_monitoring(register));

    let armed = target.armed(register).unwrap();
    assert_eq!(armed.address, Address::from(0x1000));
    assert_eq!(armed.trigger, TriggerKind::Write);
    assert_eq!(armed.size, 4);

    let recorded = session.breakpoints();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].register, register);
    assert_eq!(recorded[0].size, 4);

    session.remove_hardware_breakpoint(PID, register).unwrap();
    assert_eq!(session.free_registers(), 4);
    assert!(session.breakpoints().is_empty());
    assert!(!session.is_monitoring(register));
    assert_eq!(target.armed(register), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_trap_is_acknowledged_and_published()
{
    let (target, mut session) = attached();
    let register = session
        .set_hardware_breakpoint(PID, Address::from(0x1010), TriggerKind::ReadWrite, tag("double"))
        .unwrap();
    let mut global = session.subscribe();
    let mut scoped = session.subscribe_register(register);

    target.inject_event(register, ThreadId::from(7), Address::from(0x40_2000));

    let event = next_event(&mut global).await;
    assert_eq!(event.register, register);
    assert_eq!(event.process_id, PID);
    assert_eq!(event.thread_id, ThreadId::from(7));
    assert_eq!(next_event(&mut scoped).await, event);
    assert_eq!(target.acknowledged(), vec![(PID, ThreadId::from(7))]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scoped_topic_only_sees_its_register()
{
    let (target, mut session) = attached();
    let first = session
        .set_hardware_breakpoint(PID, Address::from(0x1000), TriggerKind::Write, tag("int32"))
        .unwrap();
    let second = session
        .set_hardware_breakpoint(PID, Address::from(0x1008), TriggerKind::Write, tag("int64"))
        .unwrap();
    assert_ne!(first, second);

    let mut global = session.subscribe();
    let mut only_second = session.subscribe_register(second);

    target.inject_event(first, ThreadId::from(1), Address::from(0x40_0000));
    assert_eq!(next_event(&mut global).await.register, first);

    target.inject_event(second, ThreadId::from(2), Address::from(0x40_0010));
    assert_eq!(next_event(&mut global).await.register, second);

    let event = next_event(&mut only_second).await;
    assert_eq!(event.register, second);
    assert!(only_second.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_events_after_removal()
{
    let (target, mut session) = attached();
    let register = session
        .set_hardware_breakpoint(PID, Address::from(0x1000), TriggerKind::Execute, tag("byte"))
        .unwrap();
    let mut global = session.subscribe();
    let mut scoped = session.subscribe_register(register);

    session.remove_hardware_breakpoint(PID, register).unwrap();
    // Let a poll that was already on the blocking pool run out its timeout.
    tokio::time::sleep(Duration::from_millis(20)).await;
    target.inject_event(register, ThreadId::from(3), Address::from(0x1000));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(global.try_recv().is_err());
    assert!(scoped.try_recv().is_err());
    assert_eq!(target.pending_events(register), 1);
    assert!(target.acknowledged().is_empty());
}

fn slow_poll_session() -> (Arc<SimulatedTarget>, DebuggerSession)
{
    let target = Arc::new(SimulatedTarget::new(PID));
    target.map_region(Address::from(0x1000), 0x200);
    let config = fast_config().with_poll_timeout(Duration::from_millis(400));
    let mut session = DebuggerSession::with_config(target.clone(), Handle::current(), config);
    session.attach(PID, false).unwrap();
    (target, session)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_removal_during_poll_resumes_trapped_thread()
{
    let (target, mut session) = slow_poll_session();
    let register = session
        .set_hardware_breakpoint(PID, Address::from(0x1000), TriggerKind::Write, tag("int32"))
        .unwrap();
    let mut global = session.subscribe();
    let mut scoped = session.subscribe_register(register);

    // The first poll is now blocked in the provider for up to 400ms.
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.remove_hardware_breakpoint(PID, register).unwrap();
    target.inject_event(register, ThreadId::from(3), Address::from(0x1000));

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(global.try_recv().is_err());
    assert!(scoped.try_recv().is_err());
    assert_eq!(target.pending_events(register), 0);
    assert_eq!(target.acknowledged(), vec![(PID, ThreadId::from(3))]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_waits_for_previous_poll()
{
    let (target, mut session) = slow_poll_session();
    let register = session
        .set_hardware_breakpoint(PID, Address::from(0x1000), TriggerKind::Write, tag("int32"))
        .unwrap();
    let mut scoped = session.subscribe_register(register);

    tokio::time::sleep(Duration::from_millis(50)).await;
    session.monitor(register);
    assert!(session.is_monitoring(register));

    // Taken by the poll the old monitor still has in flight.
    target.inject_event(register, ThreadId::from(3), Address::from(0x1000));
    tokio::time::sleep(Duration::from_millis(20)).await;
    target.inject_event(register, ThreadId::from(9), Address::from(0x1000));

    let event = next_event(&mut scoped).await;
    assert_eq!(event.thread_id, ThreadId::from(9));
    assert!(scoped.try_recv().is_err());
    assert_eq!(
        target.acknowledged(),
        vec![(PID, ThreadId::from(3)), (PID, ThreadId::from(9))]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_exhaustion_is_reported_before_contacting_provider()
{
    let (target, mut session) = attached();
    let mut registers = Vec::new();
    for offset in 0..4u64 {
        let register = session
            .set_hardware_breakpoint(PID, Address::from(0x1000 + offset * 8), TriggerKind::Write, tag("uint64"))
            .unwrap();
        registers.push(register);
    }
    assert_eq!(registers, DebugRegister::ALL);
    assert_eq!(session.free_registers(), 0);

    // A string breakpoint would open the process first; that must not happen.
    target.fail(FailurePoint::Open);
    let result = session.set_hardware_breakpoint(PID, Address::from(0x1100), TriggerKind::Write, tag("string"));
    assert_eq!(result, Err(MemscopeError::RegisterPoolExhausted));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_released_register_is_reused()
{
    let (_target, mut session) = attached();
    for offset in 0..4u64 {
        session
            .set_hardware_breakpoint(PID, Address::from(0x1000 + offset * 4), TriggerKind::Write, tag("int32"))
            .unwrap();
    }

    session.remove_hardware_breakpoint(PID, DebugRegister::Dr2).unwrap();
    let register = session
        .set_hardware_breakpoint(PID, Address::from(0x1100), TriggerKind::Write, tag("int32"))
        .unwrap();
    assert_eq!(register, DebugRegister::Dr2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_arm_releases_register()
{
    let (target, mut session) = attached();
    target.fail(FailurePoint::Arm);

    let result = session.set_hardware_breakpoint(PID, Address::from(0x1000), TriggerKind::Write, tag("int32"));
    assert!(matches!(result, Err(MemscopeError::IoFailure { operation: "arm", .. })));
    assert_eq!(session.free_registers(), 4);
    assert!(session.breakpoints().is_empty());

    target.recover(FailurePoint::Arm);
    let register = session
        .set_hardware_breakpoint(PID, Address::from(0x1000), TriggerKind::Write, tag("int32"))
        .unwrap();
    assert_eq!(register, DebugRegister::Dr0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_arm_without_debugger_is_surfaced()
{
    let (_target, mut session) = setup();
    let result = session.set_hardware_breakpoint(PID, Address::from(0x1000), TriggerKind::Write, tag("int32"));
    assert_eq!(result, Err(MemscopeError::NotAttached));
    assert_eq!(session.free_registers(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_string_breakpoint_covers_live_text()
{
    let (target, mut session) = attached();
    target.poke(Address::from(0x1100), b"hello\0").unwrap();

    let register = session
        .set_hardware_breakpoint(PID, Address::from(0x1100), TriggerKind::ReadWrite, tag("string"))
        .unwrap();
    assert_eq!(target.armed(register).unwrap().size, 5);
    assert_eq!(target.open_handles(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreadable_string_fails_with_io_failure()
{
    let (target, mut session) = attached();

    let result = session.set_hardware_breakpoint(PID, Address::from(0x8000), TriggerKind::Write, tag("string"));
    assert!(matches!(result, Err(MemscopeError::IoFailure { .. })));
    assert_eq!(session.free_registers(), 4);
    assert_eq!(target.open_handles(), 0);
    assert_eq!(target.armed(DebugRegister::Dr0), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_null_address_is_rejected()
{
    let (_target, mut session) = attached();
    let result = session.set_hardware_breakpoint(PID, Address::ZERO, TriggerKind::Write, tag("int32"));
    assert!(matches!(result, Err(MemscopeError::InvalidArgument(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_attach_leaves_session_detached()
{
    let (_target, mut session) = setup();
    let result = session.attach(ProcessId(1), true);
    assert!(matches!(result, Err(MemscopeError::AttachFailed { pid: 1, .. })));
    assert!(!session.is_attached());

    session.attach(PID, true).unwrap();
    assert!(session.is_attached());
    assert_eq!(session.attached_process(), Some(PID));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_disarm_keeps_register()
{
    let (target, mut session) = attached();
    let register = session
        .set_hardware_breakpoint(PID, Address::from(0x1000), TriggerKind::Write, tag("int16"))
        .unwrap();

    target.fail(FailurePoint::Disarm);
    assert!(session.remove_hardware_breakpoint(PID, register).is_err());
    assert_eq!(session.free_registers(), 3);
    assert!(session.is_monitoring(register));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_detach_cancels_monitors_and_frees_registers()
{
    let (target, mut session) = attached();
    let first = session
        .set_hardware_breakpoint(PID, Address::from(0x1000), TriggerKind::Write, tag("int32"))
        .unwrap();
    let second = session
        .set_hardware_breakpoint(PID, Address::from(0x1004), TriggerKind::Write, tag("int32"))
        .unwrap();
    let mut global = session.subscribe();

    session.detach(PID).unwrap();
    target.inject_event(first, ThreadId::from(1), Address::from(0x1000));

    assert!(!session.is_attached());
    assert!(!target.is_debugger_attached());
    assert!(!session.is_monitoring(first));
    assert!(!session.is_monitoring(second));
    assert_eq!(session.free_registers(), 4);
    assert!(session.breakpoints().is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(global.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_detach_is_surfaced()
{
    let (target, mut session) = attached();
    session
        .set_hardware_breakpoint(PID, Address::from(0x1000), TriggerKind::Write, tag("int32"))
        .unwrap();

    target.fail(FailurePoint::Detach);
    assert!(matches!(session.detach(PID), Err(MemscopeError::DetachFailed { .. })));
    assert!(session.is_attached());
    assert_eq!(session.breakpoints().len(), 1);
    assert!(!session.is_monitoring(DebugRegister::Dr0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_poll_failures_do_not_stop_the_monitor()
{
    let (target, mut session) = attached();
    let register = session
        .set_hardware_breakpoint(PID, Address::from(0x1000), TriggerKind::Write, tag("int32"))
        .unwrap();
    let mut global = session.subscribe();

    target.fail(FailurePoint::Poll);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(session.is_monitoring(register));

    target.recover(FailurePoint::Poll);
    target.inject_event(register, ThreadId::from(5), Address::from(0x40_0000));
    assert_eq!(next_event(&mut global).await.thread_id, ThreadId::from(5));
}

#[test]
fn test_session_requires_a_runtime()
{
    let target = Arc::new(SimulatedTarget::new(PID));
    let result = DebuggerSession::in_current_runtime(target, SessionConfig::default());
    assert!(matches!(result, Err(MemscopeError::InvalidArgument(_))));
}
