//! Tests for std::string container fields against a simulated target

use memscope_core::codec::TextEncoding;
use memscope_core::error::MemscopeError;
use memscope_core::platform::simulated::SimulatedTarget;
use memscope_core::port::MemoryPort;
use memscope_core::strings::{StructuredStringCodec, WriteOutcome, INLINE_CAPACITY, LENGTH_OFFSET};
use memscope_core::types::{Address, Bitness, ProcessHandle, ProcessId};

const PID: u32 = 77;
const FIELD: u64 = 0x2000;
const HEAP: u64 = 0x9000;

fn inline_container(text: &[u8]) -> [u8; 32]
{
    let mut container = [0u8; 32];
    container[..text.len()].copy_from_slice(text);
    container[LENGTH_OFFSET..LENGTH_OFFSET + 4].copy_from_slice(&(text.len() as u32).to_le_bytes());
    container[0x18] = INLINE_CAPACITY as u8;
    container
}

fn heap_container(pointer: u64, len: u32) -> [u8; 32]
{
    let mut container = [0u8; 32];
    container[..8].copy_from_slice(&pointer.to_le_bytes());
    container[LENGTH_OFFSET..LENGTH_OFFSET + 4].copy_from_slice(&len.to_le_bytes());
    container[0x18..0x20].copy_from_slice(&u64::from(len).to_le_bytes());
    container
}

fn setup(live: &[u8]) -> (SimulatedTarget, ProcessHandle)
{
    let target = SimulatedTarget::new(ProcessId::from(PID));
    target.map_bytes(Address::from(FIELD), live);
    target.map_region(Address::from(HEAP), 0x100);
    let handle = target.open_process(ProcessId::from(PID)).unwrap();
    (target, handle)
}

fn codec(target: &SimulatedTarget, handle: ProcessHandle) -> StructuredStringCodec<'_, SimulatedTarget>
{
    StructuredStringCodec::new(target, handle, Address::from(FIELD), Bitness::X64, TextEncoding::Utf8).unwrap()
}

#[test]
fn test_null_structure_address_is_rejected()
{
    let (target, handle) = setup(&[0; 32]);
    let result = StructuredStringCodec::new(&target, handle, Address::ZERO, Bitness::X64, TextEncoding::Utf8);
    assert!(matches!(result, Err(MemscopeError::InvalidArgument(_))));
}

#[test]
fn test_container_size_follows_bitness()
{
    let (target, handle) = setup(&[0; 32]);
    assert_eq!(codec(&target, handle).size(), 32);
    let x86 = StructuredStringCodec::new(&target, handle, Address::from(FIELD), Bitness::X86, TextEncoding::Utf8).unwrap();
    assert_eq!(x86.size(), 24);
}

#[test]
fn test_read_fifteen_bytes_inline()
{
    let (target, handle) = setup(&[0; 32]);
    let field = inline_container(b"fifteen bytes!!");
    assert_eq!(codec(&target, handle).read(&field, 0).unwrap(), "fifteen bytes!!");
}

#[test]
fn test_read_sixteen_bytes_follows_pointer()
{
    let (target, handle) = setup(&[0; 32]);
    target.poke(Address::from(HEAP), b"sixteen bytes!!!\0").unwrap();
    let field = heap_container(HEAP, 16);
    assert_eq!(codec(&target, handle).read(&field, 0).unwrap(), "sixteen bytes!!!");
}

#[test]
fn test_read_at_offset_inside_structure()
{
    let (target, handle) = setup(&[0; 32]);
    let mut structure = vec![0xaa; 8];
    structure.extend_from_slice(&inline_container(b"name"));
    assert_eq!(codec(&target, handle).read(&structure, 8).unwrap(), "name");
}

#[test]
fn test_read_rejects_non_positive_pointers()
{
    let (target, handle) = setup(&[0; 32]);
    let codec = codec(&target, handle);

    let null = heap_container(0, 40);
    assert_eq!(codec.read(&null, 0), Err(MemscopeError::InvalidPointer(0)));

    let negative = heap_container(0xffff_ffff_ffff_fff0, 40);
    assert_eq!(codec.read(&negative, 0), Err(MemscopeError::InvalidPointer(-16)));
}

#[test]
fn test_read_short_buffer_underflows()
{
    let (target, handle) = setup(&[0; 32]);
    let field = [0u8; 0x13];
    assert_eq!(
        codec(&target, handle).read(&field, 0),
        Err(MemscopeError::BufferUnderflow {
            needed: 0x14,
            available: 0x13
        })
    );
}

#[test]
fn test_write_long_value_into_inline_container_is_preserved()
{
    let live = inline_container(b"short");
    let (target, handle) = setup(&live);
    let mut destination = [0u8; 32];

    let outcome = codec(&target, handle)
        .write("twenty characters!!!", &mut destination, 0)
        .unwrap();

    assert_eq!(outcome, WriteOutcome::Preserved);
    assert_eq!(destination, live);
    assert!(target.writes().is_empty(), "no length or pointer write expected");
    assert_eq!(target.peek(Address::from(FIELD), 32).unwrap(), live);
}

#[test]
fn test_write_short_value_into_heap_container_is_preserved()
{
    let live = heap_container(HEAP, 20);
    let (target, handle) = setup(&live);
    let mut destination = [0u8; 32];

    let outcome = codec(&target, handle).write("tiny", &mut destination, 0).unwrap();

    assert_eq!(outcome, WriteOutcome::Preserved);
    assert_eq!(destination, live);
    assert!(target.writes().is_empty());
}

#[test]
fn test_write_inline_zero_fills_freed_bytes()
{
    let mut live = vec![0xee; 4];
    live.extend_from_slice(&inline_container(b"hello world"));
    let (target, handle) = setup(&live);
    let mut destination = [0xffu8; 40];

    let outcome = codec(&target, handle).write("hi", &mut destination, 4).unwrap();
    assert_eq!(outcome, WriteOutcome::Written);

    let writes = target.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].address, Address::from(FIELD + 4 + 0x10));
    assert_eq!(writes[0].bytes, [2, 0, 0, 0]);

    let container = &destination[4..36];
    assert_eq!(&container[..2], b"hi");
    assert!(container[2..16].iter().all(|&b| b == 0));
    assert_eq!(&container[LENGTH_OFFSET..LENGTH_OFFSET + 4], &[2, 0, 0, 0]);
    assert_eq!(&destination[..4], &[0xff; 4]);
    assert_eq!(&destination[36..], &[0xff; 4]);

    assert_eq!(codec(&target, handle).read(&destination, 4).unwrap(), "hi");
}

#[test]
fn test_write_heap_value_through_live_pointer()
{
    let (target, handle) = setup(&heap_container(HEAP, 20));
    let mut destination = [0u8; 32];
    let value = "a considerably longer string";

    let outcome = codec(&target, handle).write(value, &mut destination, 0).unwrap();
    assert_eq!(outcome, WriteOutcome::Written);

    let heap = target.peek(Address::from(HEAP), value.len() + 1).unwrap();
    assert_eq!(&heap[..value.len()], value.as_bytes());
    assert_eq!(heap[value.len()], 0);

    let length = target.peek(Address::from(FIELD + 0x10), 4).unwrap();
    assert_eq!(length, (value.len() as u32).to_le_bytes());
    assert_eq!(&destination[..8], &HEAP.to_le_bytes());
    assert_eq!(codec(&target, handle).read(&destination, 0).unwrap(), value);
}

#[test]
fn test_write_heap_with_null_live_pointer()
{
    let (target, handle) = setup(&heap_container(0, 20));
    let mut destination = [0u8; 32];
    assert_eq!(
        codec(&target, handle).write("still needs the heap buffer", &mut destination, 0),
        Err(MemscopeError::InvalidPointer(0))
    );
}

#[test]
fn test_write_small_destination_overflows()
{
    let (target, handle) = setup(&inline_container(b"abc"));
    let mut destination = [0u8; 40];
    assert_eq!(
        codec(&target, handle).write("abc", &mut destination, 9),
        Err(MemscopeError::BufferOverflow {
            needed: 41,
            available: 40
        })
    );
    assert!(target.writes().is_empty());
}

#[test]
fn test_x86_container_uses_four_byte_pointer()
{
    let mut live = [0u8; 24];
    live[..4].copy_from_slice(&(HEAP as u32).to_le_bytes());
    live[LENGTH_OFFSET] = 18;
    let (target, handle) = setup(&live);
    target.poke(Address::from(HEAP), b"thirty-two bit str\0").unwrap();

    let codec = StructuredStringCodec::new(&target, handle, Address::from(FIELD), Bitness::X86, TextEncoding::Utf8).unwrap();
    assert_eq!(codec.read(&live, 0).unwrap(), "thirty-two bit str");

    let mut destination = [0u8; 24];
    assert_eq!(codec.write("eighteen more char", &mut destination, 0).unwrap(), WriteOutcome::Written);
    assert_eq!(codec.read(&destination, 0).unwrap(), "eighteen more char");
}

#[test]
fn test_write_field_after_other_members()
{
    // struct { i32 pad[4]; i32 health; u8 pad[12]; std::string name; }
    let mut live = vec![0u8; 0x40];
    live[0x10..0x14].copy_from_slice(&100i32.to_le_bytes());
    live[0x20..0x40].copy_from_slice(&inline_container(b"bob"));
    let (target, handle) = setup(&live);
    let mut local = live.clone();

    let codec = codec(&target, handle);
    assert_eq!(codec.field_address(0x20).unwrap(), Address::from(FIELD + 0x20));
    assert_eq!(codec.read(&local, 0x20).unwrap(), "bob");

    let outcome = codec.write("alice", &mut local, 0x20).unwrap();
    assert_eq!(outcome, WriteOutcome::Written);

    let writes = target.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].address, Address::from(FIELD + 0x30));
    assert_eq!(writes[0].bytes, [5, 0, 0, 0]);
    assert_eq!(target.peek(Address::from(FIELD + 0x10), 4).unwrap(), 100i32.to_le_bytes());

    assert_eq!(&local[..0x20], &live[..0x20]);
    assert_eq!(codec.read(&local, 0x20).unwrap(), "alice");
}

#[test]
fn test_huge_offsets_are_rejected()
{
    let (target, handle) = setup(&inline_container(b"abc"));
    let codec = codec(&target, handle);
    let mut buffer = [0u8; 32];

    assert!(matches!(
        codec.write("abc", &mut buffer, usize::MAX - 8),
        Err(MemscopeError::BufferOverflow { needed: usize::MAX, .. })
    ));
    assert!(matches!(
        codec.read(&buffer, usize::MAX - 8),
        Err(MemscopeError::BufferUnderflow { .. })
    ));
    assert!(target.writes().is_empty());
}
