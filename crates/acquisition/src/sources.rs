//! 内置样本源，无传感器硬件时也能运行节点

use std::f64::consts::TAU;

use contracts::{SampleSource, SourceConfig, Uptime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Build the source a channel config names
pub fn build_source(config: &SourceConfig, uptime: Uptime) -> Box<dyn SampleSource> {
    match *config {
        SourceConfig::Constant { value } => Box::new(ConstantSource { value }),
        SourceConfig::Ramp { start, step } => Box::new(RampSource::new(start, step)),
        SourceConfig::Sine {
            amplitude,
            period_ms,
            offset,
        } => Box::new(SineSource {
            uptime,
            amplitude,
            period_ms,
            offset,
        }),
        SourceConfig::Noise { min, max } => Box::new(NoiseSource::new(min, max)),
        SourceConfig::Uptime => Box::new(UptimeSource { uptime }),
    }
}

/// Always the same reading
#[derive(Debug, Clone, Copy)]
pub struct ConstantSource {
    pub value: f64,
}

impl SampleSource for ConstantSource {
    fn read(&mut self) -> f64 {
        self.value
    }
}

/// Monotonically increasing by `step` per read
#[derive(Debug, Clone, Copy)]
pub struct RampSource {
    next: f64,
    step: f64,
}

impl RampSource {
    pub fn new(start: f64, step: f64) -> Self {
        Self { next: start, step }
    }
}

impl SampleSource for RampSource {
    fn read(&mut self) -> f64 {
        let value = self.next;
        self.next += self.step;
        value
    }
}

/// Sine wave over device uptime
#[derive(Debug, Clone, Copy)]
pub struct SineSource {
    uptime: Uptime,
    amplitude: f64,
    period_ms: f64,
    offset: f64,
}

impl SampleSource for SineSource {
    fn read(&mut self) -> f64 {
        let phase = self.uptime.elapsed_ms() as f64 / self.period_ms;
        self.offset + self.amplitude * (TAU * phase).sin()
    }
}

/// Uniform noise in `[min, max)`
#[derive(Debug, Clone)]
pub struct NoiseSource {
    rng: StdRng,
    min: f64,
    max: f64,
}

impl NoiseSource {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            min,
            max,
        }
    }

    /// Reproducible sequence
    pub fn seeded(min: f64, max: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            min,
            max,
        }
    }
}

impl SampleSource for NoiseSource {
    fn read(&mut self) -> f64 {
        if self.min < self.max {
            self.rng.random_range(self.min..self.max)
        } else {
            self.min
        }
    }
}

/// Device uptime in milliseconds
#[derive(Debug, Clone, Copy)]
pub struct UptimeSource {
    uptime: Uptime,
}

impl SampleSource for UptimeSource {
    fn read(&mut self) -> f64 {
        self.uptime.elapsed_ms() as f64
    }
}
