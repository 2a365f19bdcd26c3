use crate::constants::{DEGENERATE_OFFSET_SECONDS, GRID_TOLERANCE};

/// Snap a time in seconds onto the frame grid.
///
/// # Arguments
///
/// * `time` - Time in seconds.
/// * `fps` - Frames per second of the grid.
///
/// # Returns
///
/// * The nearest grid time. Halfway cases round to the even frame.
pub fn time_to_grid(time: f64, fps: f64) -> f64 {
    (time * fps).round_ties_even() / fps
}

/// Whether `time` sits on a frame boundary, up to float noise.
pub fn is_on_grid(time: f64, fps: f64) -> bool {
    let frames = time * fps;
    (frames - frames.round()).abs() <= GRID_TOLERANCE
}

/// Frame index of a non-negative time.
pub fn time_to_frame(time: f64, fps: f64) -> usize {
    (time * fps).round_ties_even().max(0.0) as usize
}

/// Number of frames in a segment of `duration` seconds, both ends included.
pub fn segment_frames(duration: f64, fps: f64) -> usize {
    time_to_frame(duration, fps) + 1
}

/// Push a zero-length interval's offset forward so it covers one frame.
pub fn nudge_offset(onset: f64, fps: f64) -> f64 {
    let nudged = onset + DEGENERATE_OFFSET_SECONDS;
    let snapped = time_to_grid(nudged, fps);
    if snapped > onset {
        snapped
    } else {
        nudged
    }
}

/// Render a time the way `time=` strings spell it: shortest round-tripping
/// decimal, always with a fractional part (`0.0`, `3.0`, `1.23`).
pub fn format_time(time: f64) -> String {
    // -0.0 would otherwise leak a sign into the vocabulary
    let time = if time == 0.0 { 0.0 } else { time };
    format!("{time:?}")
}
