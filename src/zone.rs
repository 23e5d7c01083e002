use crate::config::ZoneConfig;

/// Violation region expressed as fractions of the frame dimensions,
/// so the same zone applies to every source resolution.
#[derive(Debug, Clone, Copy)]
pub struct ViolationZone {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl ViolationZone {
    pub fn from_config(config: &ZoneConfig) -> Self {
        Self {
            top: config.top,
            bottom: config.bottom,
            left: config.left,
            right: config.right,
        }
    }

    /// Containment is evaluated in normalized coordinates. Bounds are
    /// inclusive on all four edges.
    pub fn contains(&self, center: (i32, i32), width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        let fx = center.0 as f32 / width as f32;
        let fy = center.1 as f32 / height as f32;
        fx >= self.left && fx <= self.right && fy >= self.top && fy <= self.bottom
    }

    /// Pixel rectangle for drawing the zone guide on a frame.
    pub fn pixel_rect(&self, width: u32, height: u32) -> (i32, i32, i32, i32) {
        (
            (self.left * width as f32) as i32,
            (self.top * height as f32) as i32,
            (self.right * width as f32) as i32,
            (self.bottom * height as f32) as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_zone() -> ViolationZone {
        ViolationZone::from_config(&ZoneConfig::default())
    }

    #[test]
    fn center_inside_and_outside() {
        let zone = default_zone();
        // 1280x720: zone spans x 51..1228, y 432..648
        assert!(zone.contains((640, 500), 1280, 720));
        assert!(!zone.contains((640, 100), 1280, 720));
        assert!(!zone.contains((10, 500), 1280, 720));
        assert!(!zone.contains((640, 700), 1280, 720));
    }

    #[test]
    fn edges_are_inclusive() {
        let zone = ViolationZone {
            top: 0.5,
            bottom: 0.75,
            left: 0.25,
            right: 0.75,
        };
        // Exact fractional positions on a 100x100 frame.
        assert!(zone.contains((25, 50), 100, 100));
        assert!(zone.contains((75, 75), 100, 100));
        assert!(!zone.contains((24, 50), 100, 100));
        assert!(!zone.contains((25, 76), 100, 100));
    }

    #[test]
    fn containment_is_scale_invariant() {
        let zone = default_zone();
        let cases = [
            ((640, 500), true),
            ((640, 430), false),
            ((52, 433), true),
            ((1230, 500), false),
        ];
        for ((cx, cy), expected) in cases {
            for scale in [1, 2, 3, 5] {
                let got = zone.contains((cx * scale, cy * scale), 1280 * scale as u32, 720 * scale as u32);
                assert_eq!(
                    got, expected,
                    "center ({},{}) at scale {} diverged",
                    cx, cy, scale
                );
            }
        }
    }

    #[test]
    fn pixel_rect_matches_fractions() {
        let zone = default_zone();
        assert_eq!(zone.pixel_rect(1280, 720), (51, 432, 1228, 648));
        assert_eq!(zone.pixel_rect(640, 480), (25, 288, 614, 432));
    }

    #[test]
    fn degenerate_frame_never_contains() {
        let zone = default_zone();
        assert!(!zone.contains((0, 0), 0, 720));
        assert!(!zone.contains((0, 0), 1280, 0));
    }
}
