// src/io.rs
//
// Boundary of the detection loop: the mirrored light phase on the way
// in, violations/context/frames on the way out. Production wires this
// to the shared context and the HTTP bus; loop tests substitute fakes.

use std::sync::Arc;

use tracing::warn;

use crate::bus::{BusClient, CONTEXT_TOPIC, VIOLATION_TOPIC};
use crate::context::MonitorContext;
use crate::light::LightStatus;
use crate::types::{ContextSnapshot, ViolationEvent};

pub trait MonitorIo: Send + Sync {
    fn read_light(&self) -> LightStatus;
    fn publish_violation(&self, event: &ViolationEvent);
    fn publish_context(&self, snapshot: &ContextSnapshot);
    fn push_frame(&self, jpeg: Vec<u8>);
}

/// Production sink. Violations fan out twice: the full record to
/// storage, the reduced record (image payload stripped) to the
/// violation topic. Context snapshots go to the context topic, frames
/// to the in-process handoff slot.
pub struct BusIo {
    ctx: Arc<MonitorContext>,
    bus: BusClient,
}

impl BusIo {
    pub fn new(ctx: Arc<MonitorContext>, bus: BusClient) -> Self {
        Self { ctx, bus }
    }
}

impl MonitorIo for BusIo {
    fn read_light(&self) -> LightStatus {
        self.ctx.light.status()
    }

    fn publish_violation(&self, event: &ViolationEvent) {
        match serde_json::to_value(event) {
            Ok(full) => self.bus.send_to_storage(full),
            Err(e) => warn!("Could not serialize violation for storage: {}", e),
        }
        match event.reduced() {
            Ok(reduced) => self.bus.send_to_bus(VIOLATION_TOPIC, reduced),
            Err(e) => warn!("Could not serialize violation for the bus: {}", e),
        }
    }

    fn publish_context(&self, snapshot: &ContextSnapshot) {
        match serde_json::to_value(snapshot) {
            Ok(body) => self.bus.send_to_bus(CONTEXT_TOPIC, body),
            Err(e) => warn!("Could not serialize context snapshot: {}", e),
        }
    }

    fn push_frame(&self, jpeg: Vec<u8>) {
        self.ctx.handoff.publish(jpeg);
    }
}
