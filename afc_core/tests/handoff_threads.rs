//! The capture and actuator handoffs under a real concurrent writer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use afc_core::handoff::{RawCapture, actuator_link, capture_slot};
use std::time::Duration;

fn uniform(k: u16) -> RawCapture {
    RawCapture {
        position_at_trigger: k,
        internal_a: k,
        internal_b: k,
        external_a: k,
        external_b: k,
        sample_index: k,
    }
}

#[test]
fn reader_never_sees_a_torn_capture() {
    const N: u16 = 50_000;
    let (mut writer, mut reader) = capture_slot();
    let done = Arc::new(AtomicBool::new(false));
    let done_w = done.clone();

    let producer = thread::spawn(move || {
        for k in 1..=N {
            writer.publish(uniform(k));
        }
        done_w.store(true, Ordering::Release);
    });

    let mut accounted = 0u64;
    let mut last = 0u16;
    loop {
        let finished = done.load(Ordering::Acquire);
        if let Some(t) = reader.take() {
            let c = t.capture;
            assert_eq!(c, uniform(c.sample_index), "torn read: {c:?}");
            assert!(c.sample_index > last, "went backwards");
            last = c.sample_index;
            accounted += 1 + u64::from(t.missed);
        } else if finished {
            break;
        }
    }
    producer.join().unwrap();
    while let Some(t) = reader.take() {
        accounted += 1 + u64::from(t.missed);
        last = t.capture.sample_index;
    }
    assert_eq!(last, N);
    assert_eq!(accounted, u64::from(N));
}

#[test]
fn step_thread_follows_control_targets() {
    let (mut control, mut step) = actuator_link(1_000, 64, Duration::from_micros(10));
    control.set_bounds(500, 2_000);
    control.set_target(1_500);
    let tap = control.position_tap();

    let stepper = thread::spawn(move || {
        for _ in 0..2_000 {
            step.tick();
        }
        step
    });
    // the tap only ever reports positions between start and target
    for _ in 0..1_000 {
        let p = tap.position();
        assert!((1_000..=1_500).contains(&p), "{p}");
    }
    let step = stepper.join().unwrap();
    assert_eq!(step.position(), 1_500);
    assert_eq!(control.position(), 1_500);
    let state = control.state(1_200);
    assert_eq!(state.time_steps_stopped, 64);
    assert_eq!(state.home_position, 1_200);
}
