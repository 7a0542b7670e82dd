//! Static arena geometry

use crate::ws::protocol::Platform;

/// (x, y, w, h) of every platform, centred rectangles. The first entry is the ground.
const LAYOUT: [(f32, f32, f32, f32); 7] = [
    (0.0, 290.0, 800.0, 20.0),
    (-300.0, 200.0, 120.0, 20.0),
    (200.0, 200.0, 120.0, 20.0),
    (0.0, 100.0, 180.0, 20.0),
    (-250.0, -50.0, 100.0, 20.0),
    (250.0, -50.0, 100.0, 20.0),
    (0.0, -150.0, 150.0, 20.0),
];

/// Platforms for a freshly created room
pub fn platform_layout() -> Vec<Platform> {
    LAYOUT
        .iter()
        .map(|&(x, y, w, h)| Platform { x, y, w, h })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tuning::FALL_LIMIT_Y;

    #[test]
    fn every_platform_is_above_the_fall_limit() {
        let platforms = platform_layout();
        assert_eq!(platforms.len(), 7);
        assert!(platforms.iter().all(|p| p.y + p.h / 2.0 < FALL_LIMIT_Y));
    }
}
