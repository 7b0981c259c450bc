/// Human-readable run length: seconds under a minute, minutes under an hour, hours beyond.
pub fn format_duration(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s.is_finite() && s >= 0.0 => {
            if s < 60.0 {
                format!("{s:.1}s")
            } else if s < 3600.0 {
                format!("{:.1}m", s / 60.0)
            } else {
                format!("{:.1}h", s / 3600.0)
            }
        }
        _ => "N/A".to_string(),
    }
}
