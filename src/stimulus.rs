//! Synthetic scenes for driving a retina without a camera or game
//!
//! Each scene is a pure function of time drawn into a [`LumaFrame`]: white
//! shapes on black, like the pointing and catching demos.

use crate::pixel::{LumaFrame, PixelSource};
use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stimulus {
    /// Uniform frame at a fixed brightness
    Static { level: u8 },
    /// Disc crossing left to right every `period` seconds on a swaying vertical path
    Sweep { radius: u32, period: f64 },
    /// Square falling from the top edge, respawning at a new column each fall
    Falling { size: u32, period: f64 },
    /// Disc circling the frame centre
    Orbit { radius: u32, period: f64 },
}

impl Stimulus {
    /// Named presets used by the CLI, scaled to the frame size
    pub fn preset(name: &str, width: u32, height: u32) -> Option<Self> {
        let unit = (width.min(height) / 10).max(1);
        match name {
            "static" => Some(Stimulus::Static { level: 255 }),
            "sweep" => Some(Stimulus::Sweep {
                radius: unit,
                period: 4.0,
            }),
            "falling" => Some(Stimulus::Falling {
                size: unit * 2,
                period: 2.0,
            }),
            "orbit" => Some(Stimulus::Orbit {
                radius: unit,
                period: 3.0,
            }),
            _ => None,
        }
    }

    /// Redraw `frame` for time `t` seconds
    pub fn draw(&self, frame: &mut LumaFrame, t: f64) {
        let (w, h) = (frame.width() as f64, frame.height() as f64);
        match *self {
            Stimulus::Static { level } => frame.fill(level),
            Stimulus::Sweep { radius, period } => {
                frame.fill(0);
                let phase = cycle_phase(t, period);
                let x = phase * (w - 1.0);
                let y = h / 2.0 + (h / 4.0) * (TAU * phase).sin();
                frame.fill_disc(x.round() as i64, y.round() as i64, radius, 255);
            }
            Stimulus::Falling { size, period } => {
                frame.fill(0);
                let fall = if period > 0.0 { (t / period).floor() } else { 0.0 };
                // Golden-ratio stride gives a new, well spread column every fall
                let column = ((fall * 0.618_033_988_75).fract() * (w - 1.0)).round();
                let y = cycle_phase(t, period) * (h - 1.0);
                frame.fill_rect(column as i64, y.round() as i64, size, size, 255);
            }
            Stimulus::Orbit { radius, period } => {
                frame.fill(0);
                let angle = TAU * cycle_phase(t, period);
                let (cx, cy) = (w / 2.0, h / 2.0);
                let r = w.min(h) / 3.0;
                let x = cx + r * angle.cos();
                let y = cy + r * angle.sin();
                frame.fill_disc(x.round() as i64, y.round() as i64, radius, 255);
            }
        }
    }
}

/// Position within the current period, in `[0, 1)`
fn cycle_phase(t: f64, period: f64) -> f64 {
    if period <= 0.0 {
        0.0
    } else {
        (t / period).rem_euclid(1.0)
    }
}
