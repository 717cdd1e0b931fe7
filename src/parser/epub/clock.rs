//! SMIL clock values (`media:duration`, `clipBegin`, ...), in seconds.

/// Parse a full or partial clock value (`1:02:03.5`, `02:03`) or a
/// timecount (`3.2h`, `45min`, `10s`, `250ms`, `12`).
pub fn parse_clock_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.contains(':') {
        let parts: Vec<f64> = raw
            .split(':')
            .map(|p| p.trim().parse::<f64>().unwrap_or(0.0))
            .collect();
        return match parts.as_slice() {
            [.., h, m, s] => Some(h * 3600.0 + m * 60.0 + s),
            [m, s] => Some(m * 60.0 + s),
            _ => None,
        };
    }

    let split = raw.find(|c: char| c.is_alphabetic()).unwrap_or(raw.len());
    let count: f64 = raw[..split].parse().ok()?;
    match &raw[split..] {
        "h" => Some(count * 3600.0),
        "min" => Some(count * 60.0),
        "s" | "" => Some(count),
        "ms" => Some(count / 1000.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_values() {
        assert_eq!(parse_clock_value("02:30:03"), Some(9003.0));
        assert_eq!(parse_clock_value("50:00:10.25"), Some(180010.25));
        assert_eq!(parse_clock_value("02:33"), Some(153.0));
        assert_eq!(parse_clock_value("00:10.5"), Some(10.5));
    }

    #[test]
    fn test_timecounts() {
        assert_eq!(parse_clock_value("3.2h"), Some(11520.0));
        assert_eq!(parse_clock_value("45min"), Some(2700.0));
        assert_eq!(parse_clock_value("30s"), Some(30.0));
        assert_eq!(parse_clock_value("5ms"), Some(0.005));
        assert_eq!(parse_clock_value(" 12.345 "), Some(12.345));
    }

    #[test]
    fn test_invalid() {
        assert_eq!(parse_clock_value(""), None);
        assert_eq!(parse_clock_value("7days"), None);
        assert_eq!(parse_clock_value("abc"), None);
    }
}
