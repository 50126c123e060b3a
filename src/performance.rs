//! Lag warning derived from a server's tick rate class and reported FPS

use crate::constants::{FPS_THRESHOLD_HIGH120, FPS_THRESHOLD_HIGH60, FPS_THRESHOLD_REGULAR};
use crate::server::{Frequency, ServerRecord};

const HIGH_RATE_LAG: &str = "This server is having performance issues. You might experience lag.";
const LOW_FPS_LAG: &str = "This server has low fps. You might experience lag.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceAdvice {
    pub warn: bool,
    pub message: Option<&'static str>,
}

impl PerformanceAdvice {
    fn ok() -> Self {
        Self { warn: false, message: None }
    }
}

/// FPS ceiling at or below which a server counts as lagging.
///
/// Thresholds sit above the nominal rate (66 for 60Hz) so a server is only
/// flagged when it runs meaningfully under what it advertises.
pub fn fps_threshold(frequency: Frequency) -> i64 {
    match frequency {
        Frequency::High60 => FPS_THRESHOLD_HIGH60,
        Frequency::High120 => FPS_THRESHOLD_HIGH120,
        Frequency::Regular => FPS_THRESHOLD_REGULAR,
    }
}

/// No reported FPS means no warning.
pub fn advise(server: &ServerRecord) -> PerformanceAdvice {
    let Some(fps) = server.fps else {
        return PerformanceAdvice::ok();
    };
    if fps > fps_threshold(server.frequency) {
        return PerformanceAdvice::ok();
    }

    let message = match server.frequency {
        Frequency::High60 | Frequency::High120 => HIGH_RATE_LAG,
        Frequency::Regular => LOW_FPS_LAG,
    };
    PerformanceAdvice { warn: true, message: Some(message) }
}
