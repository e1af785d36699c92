use crate::entity::{Body, Entity};
use crate::kinematics::Kinematics;
use crate::protocol::ProtocolError;
use crate::{ASTEROID_MAX_SPEED, ASTEROID_MIN_SPEED};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsteroidSize {
    Large,
    Medium,
    Small,
}

impl AsteroidSize {
    /// Points credited for destroying an asteroid of this size.
    pub fn score_value(self) -> u32 {
        match self {
            AsteroidSize::Large => 20,
            AsteroidSize::Medium => 50,
            AsteroidSize::Small => 100,
        }
    }

    pub fn radius(self) -> f32 {
        match self {
            AsteroidSize::Large => 40.0,
            AsteroidSize::Medium => 24.0,
            AsteroidSize::Small => 12.0,
        }
    }

    /// Size of the fragments left behind, if any.
    pub fn split_into(self) -> Option<AsteroidSize> {
        match self {
            AsteroidSize::Large => Some(AsteroidSize::Medium),
            AsteroidSize::Medium => Some(AsteroidSize::Small),
            AsteroidSize::Small => None,
        }
    }

    /// Size whose destruction produces fragments of this size.
    pub fn split_from(self) -> Option<AsteroidSize> {
        match self {
            AsteroidSize::Large => None,
            AsteroidSize::Medium => Some(AsteroidSize::Large),
            AsteroidSize::Small => Some(AsteroidSize::Medium),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AsteroidSize::Large => "LARGE",
            AsteroidSize::Medium => "MEDIUM",
            AsteroidSize::Small => "SMALL",
        }
    }
}

impl fmt::Display for AsteroidSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AsteroidSize {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LARGE" => Ok(AsteroidSize::Large),
            "MEDIUM" => Ok(AsteroidSize::Medium),
            "SMALL" => Ok(AsteroidSize::Small),
            other => Err(ProtocolError::InvalidField {
                field: "size",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Asteroid {
    body: Body,
    size: AsteroidSize,
    speed: i32,
}

impl Asteroid {
    pub fn new(x: f32, y: f32, heading: i32, speed: i32, size: AsteroidSize) -> Self {
        Self {
            body: Body::new(
                Kinematics::launched(x, y, heading, speed as f32),
                size.radius(),
            ),
            size,
            speed,
        }
    }

    /// A large asteroid somewhere on one of the four screen edges, drifting in
    /// a random direction.
    pub fn on_edge<R: Rng + ?Sized>(rng: &mut R, width: f32, height: f32) -> Self {
        let along_top_or_bottom = rng.gen_bool(0.5);
        let (x, y) = if along_top_or_bottom {
            (rng.gen_range(0.0..width), 0.0)
        } else {
            (0.0, rng.gen_range(0.0..height))
        };
        let (heading, speed) = random_motion(rng);

        Self::new(x, y, heading, speed, AsteroidSize::Large)
    }

    pub fn size(&self) -> AsteroidSize {
        self.size
    }

    pub fn speed(&self) -> i32 {
        self.speed
    }

    pub fn heading(&self) -> i32 {
        self.body.kinematics.heading()
    }

    pub fn position(&self) -> (f32, f32) {
        (self.body.kinematics.x, self.body.kinematics.y)
    }

    /// Fragments produced when this asteroid is destroyed: two of the next
    /// size down at the current position, or none for the smallest size.
    pub fn fragments<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Asteroid> {
        let Some(size) = self.size.split_into() else {
            return Vec::new();
        };
        let (x, y) = self.position();

        (0..2)
            .map(|_| {
                let (heading, speed) = random_motion(rng);
                Asteroid::new(x, y, heading, speed, size)
            })
            .collect()
    }
}

impl Entity for Asteroid {
    fn body(&self) -> &Body {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }
}

fn random_motion<R: Rng + ?Sized>(rng: &mut R) -> (i32, i32) {
    (
        rng.gen_range(0..360),
        rng.gen_range(ASTEROID_MIN_SPEED..=ASTEROID_MAX_SPEED),
    )
}
