use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Target resolution with a tolerance, matched in either orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionFilter {
    pub desired_width: u32,
    pub desired_height: u32,
    pub tolerance_px: u32,
}

impl ResolutionFilter {
    pub fn new(desired_width: u32, desired_height: u32, tolerance_px: u32) -> Self {
        Self {
            desired_width,
            desired_height,
            tolerance_px,
        }
    }

    /// A portrait 1080x1920 image matches a 1920x1080 filter.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        let within = |a: u32, b: u32| a.abs_diff(b) <= self.tolerance_px;
        (within(width, self.desired_width) && within(height, self.desired_height))
            || (within(width, self.desired_height) && within(height, self.desired_width))
    }
}

fn raster_path_regex() -> &'static Regex {
    static RASTER: OnceLock<Regex> = OnceLock::new();
    RASTER.get_or_init(|| Regex::new(r"(?i)\.(jpe?g|png)$").expect("valid raster regex"))
}

/// True when the URL path (query and fragment ignored) names a jpg, jpeg or
/// png file.
pub fn is_raster_url(url: &str) -> bool {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    raster_path_regex().is_match(path)
}

/// Parses `1920x1080`.
pub fn parse_resolution(input: &str) -> Option<(u32, u32)> {
    let (w, h) = input.trim().split_once(['x', 'X'])?;
    let width = w.trim().parse().ok()?;
    let height = h.trim().parse().ok()?;
    (width > 0 && height > 0).then_some((width, height))
}
