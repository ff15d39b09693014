use std::time::Duration;

use url::Url;

pub fn get_filename_from_url(url: &Url) -> String {
    if let Some(segments) = url.path_segments() {
        if let Some(filename) = segments.last() {
            if !filename.is_empty() {
                return filename.to_string();
            }
        }
    }

    // Fallback if no filename found in path
    format!("download_{}", uuid::Uuid::new_v4())
}

pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(
        |c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '_',
        "_",
    )
}

/// Renders a duration as `1h2m3s`, dropping leading zero units.
pub fn format_elapsed(elapsed: Duration) -> String {
    let mut secs = elapsed.as_secs_f64().round() as u64;
    let mut out = String::new();
    if secs >= 3600 {
        out.push_str(&format!("{}h", secs / 3600));
        secs %= 3600;
    }
    if secs >= 60 || !out.is_empty() {
        out.push_str(&format!("{}m", secs / 60));
        secs %= 60;
    }
    out.push_str(&format!("{}s", secs));
    out
}
