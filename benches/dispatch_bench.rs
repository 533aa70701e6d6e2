use criterion::{Criterion, criterion_group, criterion_main};
use std::{hint::black_box, time::Duration};

use tm_runtime::{
    actors::{HoverTarget, OutputSink},
    config::RuntimeConfig,
    error::Result,
    runtime::Runtime,
    transport::messages::{ActuatorMessage, InsMessage},
};

struct Discard;

impl OutputSink for Discard {
    fn emit(&self, cmd: &ActuatorMessage) -> Result<()> {
        black_box(cmd);
        Ok(())
    }
}

/// One INS sample through filter, state feedback and actuator output, driven
/// on the bench thread instead of the scheduler thread.
fn controller_chain_bench(c: &mut Criterion) {
    let cfg = RuntimeConfig {
        filter_budget: Duration::from_secs(1),
        controller_budget: Duration::from_secs(1),
        ..Default::default()
    };
    let rt = Runtime::new(cfg).unwrap();
    rt.wire_controller(Box::new(Discard), HoverTarget::default());
    let queue = rt.queue().clone();

    c.bench_function("controller_chain_ins_to_actuator", |b| {
        b.iter(|| {
            rt.ports().set_ins(black_box(InsMessage {
                down: -9.0,
                ..Default::default()
            }));
            while !queue.is_empty() {
                let Some(entry) = queue.dequeue_blocking() else { break };
                queue.remove_head();
                let actor = entry.actor().clone();
                if actor.is_ready() {
                    let output = actor.exec(entry.cancel_token());
                    actor.produce_output(output);
                }
            }
        })
    });

    rt.shutdown();
}

criterion_group!(benches, controller_chain_bench);
criterion_main!(benches);
