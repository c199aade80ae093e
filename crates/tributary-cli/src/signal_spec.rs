//! Parser for `--input` signal descriptions.
//!
//! Syntax: `usage:kind:value[:amplitude][@rate]`
//!
//! - `media:sine:440` - 440 Hz sine at the default amplitude
//! - `communication:sine:1kHz:0.25@16000` - quarter-scale 1 kHz sine at 16 kHz
//! - `background:constant:0.1@44100` - DC level 0.1 at 44.1 kHz

use std::str::FromStr;

use tributary_core::{StreamUsage, Waveform};
use tributary_effects::{ParamValue, parse_param_value};

/// Amplitude used when a sine omits one.
pub const DEFAULT_AMPLITUDE: f32 = 0.5;

/// One synthetic input for `render`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalSpec {
    pub usage: StreamUsage,
    pub waveform: Waveform,
    /// Source rate; `None` uses the root group's rate.
    pub rate: Option<u32>,
}

impl FromStr for SignalSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, rate) = match s.rsplit_once('@') {
            Some((body, rate)) => {
                let rate = rate
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| format!("invalid rate '{rate}' in '{s}'"))?;
                (body, Some(rate))
            }
            None => (s, None),
        };

        let parts: Vec<&str> = body.split(':').map(str::trim).collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(format!(
                "expected usage:kind:value[:amplitude][@rate], got '{s}'"
            ));
        }

        let usage: StreamUsage = parts[0].parse().map_err(|e| format!("{e}"))?;
        let value = parse_param_value(parts[2])
            .ok_or_else(|| format!("invalid value '{}' in '{s}'", parts[2]))?;
        let amplitude = match parts.get(3) {
            Some(a) => a
                .parse::<f32>()
                .map_err(|_| format!("invalid amplitude '{a}' in '{s}'"))?,
            None => DEFAULT_AMPLITUDE,
        };

        let waveform = match parts[1].to_ascii_lowercase().as_str() {
            "sine" => {
                let frequency = match value {
                    ParamValue::Hertz(hz) | ParamValue::Number(hz) => hz,
                    _ => return Err(format!("sine needs a frequency, got '{}'", parts[2])),
                };
                Waveform::Sine {
                    frequency,
                    amplitude,
                }
            }
            "constant" | "dc" => {
                if parts.len() == 4 {
                    return Err(format!("constant takes no amplitude: '{s}'"));
                }
                let level = value
                    .as_linear_gain()
                    .ok_or_else(|| format!("constant needs a level, got '{}'", parts[2]))?;
                Waveform::Constant(level)
            }
            other => return Err(format!("unknown signal kind '{other}' (sine, constant)")),
        };

        Ok(Self {
            usage,
            waveform,
            rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sine_with_rate() {
        let spec: SignalSpec = "communication:sine:1kHz:0.25@16000".parse().unwrap();
        assert_eq!(spec.usage, StreamUsage::Communication);
        assert_eq!(
            spec.waveform,
            Waveform::Sine {
                frequency: 1000.0,
                amplitude: 0.25
            }
        );
        assert_eq!(spec.rate, Some(16000));
    }

    #[test]
    fn defaults_amplitude_and_rate() {
        let spec: SignalSpec = "media:sine:440".parse().unwrap();
        assert_eq!(
            spec.waveform,
            Waveform::Sine {
                frequency: 440.0,
                amplitude: DEFAULT_AMPLITUDE
            }
        );
        assert_eq!(spec.rate, None);
    }

    #[test]
    fn parses_constant_levels() {
        let spec: SignalSpec = "background:constant:0.1@44100".parse().unwrap();
        assert_eq!(spec.waveform, Waveform::Constant(0.1));
        let spec: SignalSpec = "media:dc:50%".parse().unwrap();
        assert_eq!(spec.waveform, Waveform::Constant(0.5));
    }

    #[test]
    fn rejects_malformed() {
        assert!("media:sine".parse::<SignalSpec>().is_err());
        assert!("radio:sine:440".parse::<SignalSpec>().is_err());
        assert!("media:square:440".parse::<SignalSpec>().is_err());
        assert!("media:sine:440@fast".parse::<SignalSpec>().is_err());
        assert!("media:sine:10ms".parse::<SignalSpec>().is_err());
        assert!("media:constant:0.5:0.5".parse::<SignalSpec>().is_err());
    }
}
