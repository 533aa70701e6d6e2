//! Ring buffers over real SysV shared memory. Each test keys its segment off its own
//! temporary directory so parallel tests never share a segment.

use tm_runtime::transport::{
    messages::{GpsMessage, PlantOutputs},
    ring_buffer::RingBuffer,
    shm::SegmentKey,
};

fn fix(n: f32) -> GpsMessage {
    GpsMessage { north: n, east: -n }
}

#[test]
fn reader_sees_no_data_until_first_write() {
    let dir = tempfile::tempdir().unwrap();
    let key = SegmentKey::new(dir.path(), b'a');

    let writer = RingBuffer::<GpsMessage>::open_writer(&key, 8).unwrap();
    let reader = RingBuffer::<GpsMessage>::open_reader(&key, 8).unwrap();
    assert_eq!(reader.read(), None);

    writer.write(&fix(1.0));
    assert_eq!(reader.read(), Some(fix(1.0)));
    // reading does not consume
    assert_eq!(reader.read(), Some(fix(1.0)));

    writer.remove_segment().unwrap();
}

#[test]
fn reader_gets_latest_after_overflow() {
    let dir = tempfile::tempdir().unwrap();
    let key = SegmentKey::new(dir.path(), b'c');

    let writer = RingBuffer::<GpsMessage>::open_writer(&key, 8).unwrap();
    let reader = RingBuffer::<GpsMessage>::open_reader(&key, 8).unwrap();

    for i in 1..=9 {
        writer.write(&fix(i as f32));
    }
    assert_eq!(reader.read(), Some(fix(9.0)));

    let history: Vec<f32> = reader.snapshot().iter().map(|m| m.north).collect();
    assert_eq!(history, vec![2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);

    writer.remove_segment().unwrap();
}

#[test]
fn new_writer_invalidates_previous_contents() {
    let dir = tempfile::tempdir().unwrap();
    let key = SegmentKey::new(dir.path(), b'd');

    let first = RingBuffer::<GpsMessage>::open_writer(&key, 8).unwrap();
    first.write(&fix(5.0));

    let reader = RingBuffer::<GpsMessage>::open_reader(&key, 8).unwrap();
    assert_eq!(reader.read(), Some(fix(5.0)));

    let second = RingBuffer::<GpsMessage>::open_writer(&key, 8).unwrap();
    assert_eq!(reader.read(), None);
    second.write(&fix(6.0));
    assert_eq!(reader.read(), Some(fix(6.0)));

    second.remove_segment().unwrap();
}

#[test]
fn ids_under_one_directory_are_separate_segments() {
    let dir = tempfile::tempdir().unwrap();
    let gps = RingBuffer::<GpsMessage>::open_writer(&SegmentKey::new(dir.path(), b'a'), 8).unwrap();
    let plant =
        RingBuffer::<PlantOutputs>::open_writer(&SegmentKey::new(dir.path(), b'b'), 8).unwrap();

    gps.write(&fix(1.0));
    assert_eq!(plant.read(), None);

    gps.remove_segment().unwrap();
    plant.remove_segment().unwrap();
}
