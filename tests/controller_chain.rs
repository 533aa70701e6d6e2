//! The controller chain wired the way the controller process wires it, but on
//! ephemeral ports and in-process ring buffers.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use tm_runtime::{
    actors::{HoverTarget, SensorListener},
    config::RuntimeConfig,
    runtime::Runtime,
    transport::{
        messages::{ActuatorMessage, GpsMessage, InsMessage},
        ring_buffer::RingBuffer,
        udp::{UdpClient, UdpServer},
    },
    utils::events::{EventKind, EventRecorder},
};

fn cfg() -> RuntimeConfig {
    RuntimeConfig {
        listener_poll: Duration::from_millis(20),
        ..Default::default()
    }
}

#[test]
fn ins_datagram_produces_actuator_datagram() {
    let recorder = EventRecorder::new();
    let rt = Runtime::with_recorder(cfg(), recorder.clone()).unwrap();

    let plant = UdpServer::init(0).unwrap();
    let to_plant = UdpClient::init("127.0.0.1", plant.local_addr().unwrap().port()).unwrap();
    let actors = rt.wire_controller(Box::new(to_plant), HoverTarget::default());

    let gps_server = UdpServer::init(0).unwrap();
    let ins_server = UdpServer::init(0).unwrap();
    let gps_tx = UdpClient::init("127.0.0.1", gps_server.local_addr().unwrap().port()).unwrap();
    let ins_tx = UdpClient::init("127.0.0.1", ins_server.local_addr().unwrap().port()).unwrap();

    let gps_ring = RingBuffer::<GpsMessage>::in_process(8).unwrap();
    let ins_ring = RingBuffer::<InsMessage>::in_process(8).unwrap();

    let running = Arc::new(AtomicBool::new(true));
    let (ports, poll) = (rt.ports(), rt.config().listener_poll);
    let gps = SensorListener::new("gps", gps_server, gps_ring.clone(), ports.gps.clone(), poll);
    let ins = SensorListener::new("ins", ins_server, ins_ring.clone(), ports.ins.clone(), poll);
    let listeners = vec![
        gps.spawn(running.clone()).unwrap(),
        ins.spawn(running.clone()).unwrap(),
    ];
    let scheduler = rt.spawn_scheduler().unwrap();

    gps_tx.send(&GpsMessage { north: 2.0, east: 0.0 }).unwrap();
    thread::sleep(Duration::from_millis(100));
    ins_tx
        .send(&InsMessage {
            down: -3.0,
            ..Default::default()
        })
        .unwrap();

    let cmd: ActuatorMessage = plant
        .receive_timeout(Duration::from_secs(3))
        .unwrap()
        .expect("no actuator command within 3 s");
    // 7 m below the hover height: climb
    assert!(cmd.collective > 0.0);

    running.store(false, Ordering::Relaxed);
    for l in listeners {
        l.join().unwrap();
    }
    rt.shutdown();
    scheduler.join().unwrap().unwrap();

    assert_eq!(gps_ring.read().map(|m| m.north), Some(2.0));
    assert_eq!(ins_ring.read().map(|m| m.down), Some(-3.0));
    assert_eq!(actors.actuator_output.sent(), 1);

    let snap = rt.metrics().snapshot();
    assert_eq!(snap.executed, 3);
    assert_eq!(snap.dropped, 0);

    let events = recorder.drain();
    let produced = events
        .iter()
        .filter(|e| e.kind == EventKind::OutputProduced)
        .count();
    assert!(produced >= 1);
    assert!(events.iter().any(|e| e.kind == EventKind::Triggered && e.actor == "filter"));
}

#[test]
fn burst_beyond_capacity_is_dropped_not_blocked() {
    let rt = Runtime::new(RuntimeConfig {
        queue_capacity: 2,
        ..cfg()
    })
    .unwrap();
    let (tx, _rx) = crossbeam::channel::unbounded::<ActuatorMessage>();
    rt.wire_controller(Box::new(tx), HoverTarget::default());

    // no scheduler running: every trigger stays queued
    let started = Instant::now();
    for _ in 0..5 {
        rt.ports().set_ins(InsMessage::default());
    }
    assert!(started.elapsed() < Duration::from_secs(1));

    assert_eq!(rt.queue().len(), 2);
    assert_eq!(rt.queue().dropped(), 3);
    assert_eq!(rt.metrics().dropped(), 3);
    rt.shutdown();
}
