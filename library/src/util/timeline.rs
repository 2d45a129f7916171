/// Formats an absolute frame number as `HH:MM:SS:FF` for the given framerate.
///
/// Negative frames clamp to zero; a non-positive framerate yields all zeros.
pub fn format_frame_to_time(frame: f64, framerate: f64) -> String {
    if framerate <= 0.0 {
        return String::from("00:00:00:00");
    }
    let frame = frame.max(0.0);
    let fps = framerate.round().max(1.0) as u64;
    let total_frames = frame.floor() as u64;
    let total_seconds = total_frames / fps;
    let frames = total_frames % fps;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3600;
    format!("{:02}:{:02}:{:02}:{:02}", hours, minutes, seconds, frames)
}

/// Converts a span of seconds into whole frames at the given framerate.
pub fn seconds_to_frames(seconds: f64, framerate: f64) -> f64 {
    (seconds * framerate).floor()
}
