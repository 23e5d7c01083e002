use image::RgbImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LightState {
    Red,
    Yellow,
    Green,
}

impl LightState {
    /// Parses the uppercase wire form pushed by the light controller.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "RED" => Some(LightState::Red),
            "YELLOW" => Some(LightState::Yellow),
            "GREEN" => Some(LightState::Green),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LightState::Red => "RED",
            LightState::Yellow => "YELLOW",
            LightState::Green => "GREEN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrigin {
    Remote,
    Local,
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleClass {
    Car,
    Motorcycle,
    Bus,
    Truck,
}

impl VehicleClass {
    /// COCO class ids as emitted by the detector capability.
    pub fn from_coco_id(id: u32) -> Option<Self> {
        match id {
            2 => Some(VehicleClass::Car),
            3 => Some(VehicleClass::Motorcycle),
            5 => Some(VehicleClass::Bus),
            7 => Some(VehicleClass::Truck),
            _ => None,
        }
    }

    /// Only cars and motorcycles trigger violation processing.
    pub fn is_target(&self) -> bool {
        matches!(self, VehicleClass::Car | VehicleClass::Motorcycle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Motorcycle => "motorcycle",
            VehicleClass::Bus => "bus",
            VehicleClass::Truck => "truck",
        }
    }

    /// Uppercase type code carried on violation events.
    pub fn event_code(&self) -> &'static str {
        match self {
            VehicleClass::Car => "CAR",
            VehicleClass::Motorcycle => "MOTORBIKE",
            VehicleClass::Bus => "BUS",
            VehicleClass::Truck => "TRUCK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }
}

#[derive(Debug, Clone)]
pub struct Detection {
    pub class: VehicleClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// One decoded frame plus where the arbiter got it from.
pub struct Frame {
    pub image: RgbImage,
    pub origin: FrameOrigin,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// A scored text fragment returned by the plate reader capability.
#[derive(Debug, Clone)]
pub struct PlateFragment {
    pub text: String,
    pub confidence: f32,
}

/// Violation record handed to the storage collaborator. The bus copy is
/// the same object with `image_b64` stripped.
#[derive(Debug, Clone, Serialize)]
pub struct ViolationEvent {
    pub event_id: String,
    pub ts: i64,
    pub plate: String,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub speed_kmh: f64,
    pub confidence: f64,
    pub image_b64: String,
    pub cam_id: String,
    pub roi: String,
    pub vehicles_frame: usize,
}

impl ViolationEvent {
    /// Bus-facing copy with the image payload omitted.
    pub fn reduced(&self) -> anyhow::Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.remove("image_b64");
        }
        Ok(value)
    }
}

/// Per-tick status snapshot published to the context channel.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSnapshot {
    pub vehicles_frame: usize,
    pub fps: f64,
    pub capture_interval: f64,
    pub roi: String,
    pub target_objects: Vec<String>,
    pub weather: String,
    pub distance: f64,
    pub light: String,
    pub ts: i64,
    pub source: String,
}

/// Fields the monitor overlay reads from the detection loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayInfo {
    pub vehicles_frame: usize,
    pub detection_fps: f32,
    pub detector_live: bool,
}
