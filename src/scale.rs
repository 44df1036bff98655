//! Axis scales and tick placement.
//!
//! The chart is always drawn on linear axes: the y values are passed through
//! [`YScale::forward`] before drawing and the tick labels through
//! [`YScale::inverse`], so the three scales share a single drawing path.
use std::fmt;
use std::str::FromStr;

/// Half-width of the linear region of the symlog scale around zero
pub const SYMLOG_LINTHRESH: f64 = 1.0;

pub const YSCALE_NAMES: [&str; 3] = ["linear", "log", "symlog"];

/// target number of y ticks
const Y_TICKS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YScale {
    Linear,
    Log,
    Symlog,
}

impl Default for YScale {
    fn default() -> Self {
        YScale::Log
    }
}

impl FromStr for YScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(YScale::Linear),
            "log" => Ok(YScale::Log),
            "symlog" => Ok(YScale::Symlog),
            other => Err(format!(
                "unknown y scale '{}', expected one of {}",
                other,
                YSCALE_NAMES.join("|")
            )),
        }
    }
}

impl fmt::Display for YScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            YScale::Linear => YSCALE_NAMES[0],
            YScale::Log => YSCALE_NAMES[1],
            YScale::Symlog => YSCALE_NAMES[2],
        };
        f.write_str(name)
    }
}

impl YScale {
    /// whether y can be placed on this scale; log has no room for y <= 0
    pub fn accepts(self, y: f64) -> bool {
        match self {
            YScale::Log => y.is_finite() && y > 0.,
            YScale::Linear | YScale::Symlog => y.is_finite(),
        }
    }

    pub fn forward(self, y: f64) -> f64 {
        match self {
            YScale::Linear => y,
            YScale::Log => y.log10(),
            YScale::Symlog => y.signum() * (1. + y.abs() / SYMLOG_LINTHRESH).log10(),
        }
    }

    pub fn inverse(self, v: f64) -> f64 {
        match self {
            YScale::Linear => v,
            YScale::Log => 10f64.powf(v),
            YScale::Symlog => v.signum() * SYMLOG_LINTHRESH * (10f64.powf(v.abs()) - 1.),
        }
    }

    /// label for a tick at the transformed position v
    pub fn format_tick(self, v: f64) -> String {
        format_ops(self.inverse(v))
    }

    /// Tick positions (transformed) inside [lo, hi].
    /// Log and symlog prefer whole powers of ten when the range spans a few of them.
    pub fn ticks(self, lo: f64, hi: f64) -> Vec<f64> {
        let decades = match self {
            YScale::Linear => Vec::new(),
            YScale::Log => {
                let first = lo.ceil() as i32;
                let last = hi.floor() as i32;
                (first..=last).map(f64::from).collect()
            }
            YScale::Symlog => {
                let top = self.inverse(hi.abs().max(lo.abs())).abs().log10().ceil().max(0.) as i32;
                let mut values: Vec<f64> = (0..=top)
                    .rev()
                    .map(|k| -(10f64.powi(k)))
                    .chain(std::iter::once(0.))
                    .chain((0..=top).map(|k| 10f64.powi(k)))
                    .map(|y| self.forward(y))
                    .filter(|v| *v >= lo && *v <= hi)
                    .collect();
                values.dedup();
                values
            }
        };
        if decades.len() >= 2 {
            let stride = (decades.len() + Y_TICKS - 1) / Y_TICKS;
            decades.into_iter().step_by(stride).collect()
        } else {
            nice_ticks(lo, hi, Y_TICKS)
        }
    }
}

/// Evenly spaced ticks on 1-2-5 steps covering [lo, hi], about `target` of them.
pub fn nice_ticks(lo: f64, hi: f64, target: usize) -> Vec<f64> {
    let span = hi - lo;
    if !span.is_finite() || span <= 0. || target == 0 {
        return vec![lo];
    }
    let raw = span / target as f64;
    let mag = 10f64.powf(raw.log10().floor());
    let step = match raw / mag {
        n if n <= 1. => mag,
        n if n <= 2. => 2. * mag,
        n if n <= 5. => 5. * mag,
        _ => 10. * mag,
    };
    let first = (lo / step).ceil() as i64;
    let last = (hi / step + 1e-9).floor() as i64;
    (first..=last).map(|i| i as f64 * step).collect()
}

/// Picks the x ticks among the distinct (ascending) thread counts.
/// More than `max_ticks` values get subsampled with a stride, the largest value
/// is always kept; 0 hides the ticks altogether.
pub fn x_ticks(distinct: &[u32], max_ticks: usize) -> Vec<u32> {
    if max_ticks == 0 {
        return Vec::new();
    }
    if distinct.len() <= max_ticks {
        return distinct.to_vec();
    }
    let stride = (distinct.len() + max_ticks - 1) / max_ticks;
    let mut ticks: Vec<u32> = distinct.iter().copied().step_by(stride).collect();
    if let (Some(last), Some(tick)) = (distinct.last(), ticks.last()) {
        if last != tick {
            ticks.push(*last);
        }
    }
    ticks
}

/// compact label for a throughput value
pub fn format_ops(y: f64) -> String {
    let a = y.abs();
    if a == 0. {
        "0".to_string()
    } else if a >= 1e5 || a < 1e-2 {
        format!("{:.1e}", y)
    } else if a >= 100. {
        format!("{:.0}", y)
    } else {
        format!("{:.2}", y)
    }
}
