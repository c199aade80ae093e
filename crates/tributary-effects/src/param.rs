//! Parsing of effect configuration values.

/// A configuration value with its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    /// Plain number.
    Number(f32),
    /// Percentage, already divided by 100.
    Fraction(f32),
    /// Level in decibels, as written.
    Decibels(f32),
    /// Time in seconds (from `ms` or `s` suffixes).
    Seconds(f32),
    /// Frequency in Hz (from `Hz` or `kHz` suffixes).
    Hertz(f32),
}

impl ParamValue {
    /// Value as a linear gain: numbers and fractions as-is, dB converted.
    pub fn as_linear_gain(self) -> Option<f32> {
        match self {
            ParamValue::Number(v) | ParamValue::Fraction(v) => Some(v),
            ParamValue::Decibels(db) => Some(libm::powf(10.0, db / 20.0)),
            ParamValue::Seconds(_) | ParamValue::Hertz(_) => None,
        }
    }
}

fn number(s: &str) -> Option<f32> {
    s.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

/// Parses a configuration value.
///
/// Supports:
/// - Plain numbers: "0.5", "480"
/// - Percentages: "50%"
/// - Decibels: "-6dB", "+3db"
/// - Time: "10ms", "0.5s"
/// - Frequency: "440Hz", "1.2kHz"
pub fn parse_param_value(value: &str) -> Option<ParamValue> {
    let value = value.trim();

    if let Some(pct) = value.strip_suffix('%') {
        return number(pct).map(|v| ParamValue::Fraction(v / 100.0));
    }

    if let Some(db) = value
        .strip_suffix("dB")
        .or_else(|| value.strip_suffix("db"))
    {
        return number(db).map(ParamValue::Decibels);
    }

    if let Some(ms) = value.strip_suffix("ms") {
        return number(ms).map(|v| ParamValue::Seconds(v / 1000.0));
    }

    if let Some(khz) = value
        .strip_suffix("kHz")
        .or_else(|| value.strip_suffix("khz"))
    {
        return number(khz).map(|v| ParamValue::Hertz(v * 1000.0));
    }

    if let Some(hz) = value
        .strip_suffix("Hz")
        .or_else(|| value.strip_suffix("hz"))
    {
        return number(hz).map(ParamValue::Hertz);
    }

    if let Some(s) = value.strip_suffix('s') {
        return number(s).map(ParamValue::Seconds);
    }

    number(value).map(ParamValue::Number)
}
