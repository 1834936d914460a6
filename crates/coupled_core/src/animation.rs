//! Render state for the mode animations as pure functions of the frame
//! index. Frame pacing belongs to whoever draws the frames.

use crate::config::{PendulumModeSettings, PendulumParams, RingAnimationSettings};
use crate::modes::ModeSet;
use crate::pendulum::{pendulum_mode_series, PendulumModeSeries};
use crate::trajectory::arange;
use anyhow::{bail, Result};
use serde::Serialize;
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

/// One mode's panel in a ring animation frame.
#[derive(Debug, Clone, Serialize)]
pub struct RingModeFrame {
    pub mode: usize,
    pub frequency: f64,
    pub nodes: Vec<Point>,
    /// Spring from each node to the next one around the ring.
    pub springs: Vec<Segment>,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RingFrame {
    pub index: usize,
    pub time: f64,
    pub modes: Vec<RingModeFrame>,
}

/// Ring mode animation over a precomputed [`ModeSet`].
#[derive(Debug, Clone)]
pub struct RingAnimation<'a> {
    modes: &'a ModeSet,
    settings: RingAnimationSettings,
    equilibrium: Vec<Point>,
    frame_count: usize,
}

impl<'a> RingAnimation<'a> {
    pub fn new(modes: &'a ModeSet, settings: RingAnimationSettings) -> Result<Self> {
        settings.validate()?;
        let n = modes.dimension();
        let equilibrium = (0..n)
            .map(|k| {
                let angle = 2.0 * PI * k as f64 / n as f64;
                Point::new(settings.radius * angle.cos(), settings.radius * angle.sin())
            })
            .collect();
        let frame_count = arange(0.0, settings.t_max, settings.dt).len();
        Ok(Self {
            modes,
            settings,
            equilibrium,
            frame_count,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn equilibrium(&self) -> &[Point] {
        &self.equilibrium
    }

    pub fn frame(&self, index: usize) -> Result<RingFrame> {
        if index >= self.frame_count {
            bail!(
                "Frame {} out of range (animation has {} frames).",
                index,
                self.frame_count
            );
        }
        let time = index as f64 * self.settings.dt;
        let n = self.equilibrium.len();

        let modes = self
            .modes
            .modes()
            .iter()
            .enumerate()
            .map(|(mode, normal)| {
                let envelope = normal.envelope(self.settings.amplitude, time);
                // the shift is applied along both axes, not radially
                let nodes: Vec<Point> = self
                    .equilibrium
                    .iter()
                    .zip(&normal.vector)
                    .map(|(eq, v)| Point::new(eq.x + v * envelope, eq.y + v * envelope))
                    .collect();
                let springs = (0..n)
                    .map(|i| Segment {
                        from: nodes[i],
                        to: nodes[(i + 1) % n],
                    })
                    .collect();
                RingModeFrame {
                    mode,
                    frequency: normal.frequency,
                    nodes,
                    springs,
                    label: format!("Mode {}\nω = {:.2} rad/s", mode + 1, normal.frequency),
                }
            })
            .collect();

        Ok(RingFrame {
            index,
            time,
            modes,
        })
    }
}

/// Pivot, bob and rod geometry of a single pendulum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PendulumBob {
    pub anchor: Point,
    pub bob: Point,
}

/// Both pendulums of one mode plus the spring between the bobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PendulumPair {
    pub left: PendulumBob,
    pub right: PendulumBob,
    pub spring: Segment,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendulumFrame {
    pub index: usize,
    pub time: f64,
    pub in_phase: PendulumPair,
    pub out_of_phase: PendulumPair,
}

/// Two-pendulum mode animation backed by a precomputed angle series.
#[derive(Debug, Clone)]
pub struct PendulumAnimation {
    series: PendulumModeSeries,
    length: f64,
    separation: f64,
}

impl PendulumAnimation {
    pub fn new(params: &PendulumParams, settings: &PendulumModeSettings) -> Result<Self> {
        Ok(Self {
            series: pendulum_mode_series(params, settings)?,
            length: params.length,
            separation: settings.separation,
        })
    }

    pub fn series(&self) -> &PendulumModeSeries {
        &self.series
    }

    pub fn frame_count(&self) -> usize {
        self.series.len()
    }

    fn pair(&self, theta1: f64, theta2: f64) -> PendulumPair {
        let half = 0.5 * self.separation;
        let left = bob_position(Point::new(-half, 0.0), self.length, theta1);
        let right = bob_position(Point::new(half, 0.0), self.length, theta2);
        PendulumPair {
            left,
            right,
            spring: Segment {
                from: left.bob,
                to: right.bob,
            },
        }
    }

    pub fn frame(&self, index: usize) -> Result<PendulumFrame> {
        if index >= self.frame_count() {
            bail!(
                "Frame {} out of range (animation has {} frames).",
                index,
                self.frame_count()
            );
        }
        let s = &self.series;
        Ok(PendulumFrame {
            index,
            time: s.times[index],
            in_phase: self.pair(s.in_phase_theta1[index], s.in_phase_theta2[index]),
            out_of_phase: self.pair(s.out_of_phase_theta1[index], s.out_of_phase_theta2[index]),
        })
    }
}

/// Bob hanging from `anchor` at angle `theta` from the downward vertical.
pub fn bob_position(anchor: Point, length: f64, theta: f64) -> PendulumBob {
    PendulumBob {
        anchor,
        bob: Point::new(anchor.x + length * theta.sin(), anchor.y - length * theta.cos()),
    }
}
