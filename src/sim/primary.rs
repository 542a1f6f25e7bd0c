//! Primary particle generation.

use anyhow::{Result, ensure};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::sim::config::GunConfig;
use crate::{Point, Vector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleKind {
    Electron,
    Positron,
    Proton,
    Alpha,
    Gamma,
    /// Uncharged test particle that never interacts.
    Geantino,
}

impl ParticleKind {
    /// Charge in units of the elementary charge.
    pub fn charge(self) -> f64 {
        match self {
            Self::Electron => -1.0,
            Self::Positron | Self::Proton => 1.0,
            Self::Alpha => 2.0,
            Self::Gamma | Self::Geantino => 0.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Electron => "e-",
            Self::Positron => "e+",
            Self::Proton => "proton",
            Self::Alpha => "alpha",
            Self::Gamma => "gamma",
            Self::Geantino => "geantino",
        }
    }

    pub fn is_charged(self) -> bool {
        self.charge() != 0.0
    }
}

/// One primary particle of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct Primary {
    pub particle: ParticleKind,
    /// Kinetic energy in MeV.
    pub energy: f64,
    pub position: Point,
    /// Unit direction.
    pub direction: Vector,
}

/// Shoots one particle per event along a fixed direction.
///
/// Each worker owns its own gun; the random stream is seeded explicitly so
/// runs are reproducible.
pub struct ParticleGun {
    particle: ParticleKind,
    energy: f64,
    position: Point,
    direction: Vector,
    spread_half_width: f64,
    rng: StdRng,
}

impl ParticleGun {
    pub fn new(
        particle: ParticleKind,
        energy: f64,
        position: Point,
        direction: Vector,
        seed: u64,
    ) -> Result<Self> {
        ensure!(energy >= 0.0, "Particle energy must not be negative: {energy}");
        let direction = direction
            .normalize()
            .ok_or_else(|| anyhow::anyhow!("Particle direction must not be zero"))?;
        Ok(Self {
            particle,
            energy,
            position,
            direction,
            spread_half_width: 0.0,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Builds the gun from its configuration; `default_z` is used when no
    /// start position is configured.
    pub fn from_config(config: &GunConfig, default_z: f64, seed: u64) -> Result<Self> {
        let position = match config.position {
            Some(p) => Point::from(p),
            None => Point::new(0.0, 0.0, default_z),
        };
        let mut gun = Self::new(
            config.particle,
            config.energy,
            position,
            Vector::from(config.direction),
            seed,
        )?;
        gun.set_spread(config.spread_half_width);
        Ok(gun)
    }

    /// Randomises the start position over a square in the XY plane.
    pub fn set_spread(&mut self, half_width: f64) {
        self.spread_half_width = half_width.max(0.0);
    }

    pub fn particle(&self) -> ParticleKind {
        self.particle
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn generate(&mut self) -> Primary {
        let mut position = self.position;
        if self.spread_half_width > 0.0 {
            let h = self.spread_half_width;
            position.x += self.rng.gen_range(-h..h);
            position.y += self.rng.gen_range(-h..h);
        }
        Primary {
            particle: self.particle,
            energy: self.energy,
            position,
            direction: self.direction,
        }
    }
}
