//! Position, velocity and heading integration with toroidal screen wrap.
//!
//! Headings are whole degrees with 0 pointing up the screen and angles growing
//! clockwise. Screen y grows downward, so a heading of 0 moves toward y = 0.

use crate::{DELTA_SCALE, VIEW_HEIGHT, VIEW_WIDTH};
use serde::{Deserialize, Serialize};

/// Direction a body is currently turning in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    Left,
    #[default]
    None,
    Right,
}

impl Rotation {
    pub fn sign(self) -> i32 {
        match self {
            Rotation::Left => -1,
            Rotation::None => 0,
            Rotation::Right => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Kinematics {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    heading: i32,
    /// Forward acceleration applied while `accelerating` is set.
    acceleration: f32,
    /// Degrees per step applied in the current rotation direction.
    rotation_speed: i32,
    pub accelerating: bool,
    pub rotation: Rotation,
}

impl Kinematics {
    /// A motionless body pointing up with no drive of its own.
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
            heading: 0,
            acceleration: 0.0,
            rotation_speed: 0,
            accelerating: false,
            rotation: Rotation::None,
        }
    }

    /// A body already travelling along `heading` at `speed`.
    pub fn launched(x: f32, y: f32, heading: i32, speed: f32) -> Self {
        let mut kinematics = Self::new(x, y);
        kinematics.set_heading(heading);
        let (dx, dy) = direction(kinematics.heading);
        kinematics.vel_x = dx * speed;
        kinematics.vel_y = dy * speed;
        kinematics
    }

    /// Gives the body a thruster and the ability to turn.
    pub fn with_drive(mut self, acceleration: f32, rotation_speed: i32) -> Self {
        self.acceleration = acceleration;
        self.rotation_speed = rotation_speed;
        self
    }

    pub fn heading(&self) -> i32 {
        self.heading
    }

    pub fn set_heading(&mut self, degrees: i32) {
        self.heading = normalize_heading(degrees);
    }

    /// Moves the body to a new position, leaving velocity untouched.
    pub fn place(&mut self, x: f32, y: f32) {
        self.x = wrap(x, VIEW_WIDTH);
        self.y = wrap(y, VIEW_HEIGHT);
    }

    pub fn halt(&mut self) {
        self.vel_x = 0.0;
        self.vel_y = 0.0;
    }

    /// Advances the body by one simulation step.
    pub fn integrate(&mut self) {
        self.set_heading(self.heading + self.rotation.sign() * self.rotation_speed);

        if self.accelerating {
            let (dx, dy) = direction(self.heading);
            self.vel_x += dx * self.acceleration * DELTA_SCALE;
            self.vel_y += dy * self.acceleration * DELTA_SCALE;
        }

        self.x = wrap(self.x + self.vel_x * DELTA_SCALE, VIEW_WIDTH);
        self.y = wrap(self.y + self.vel_y * DELTA_SCALE, VIEW_HEIGHT);
    }

    /// Point `distance` units ahead of the body along its heading.
    pub fn ahead(&self, distance: f32) -> (f32, f32) {
        let (dx, dy) = direction(self.heading);
        (
            wrap(self.x + dx * distance, VIEW_WIDTH),
            wrap(self.y + dy * distance, VIEW_HEIGHT),
        )
    }
}

pub fn normalize_heading(degrees: i32) -> i32 {
    degrees.rem_euclid(360)
}

/// Wraps a coordinate into `[0, extent)`.
pub fn wrap(value: f32, extent: f32) -> f32 {
    let wrapped = value.rem_euclid(extent);
    // rem_euclid can round up to `extent` for tiny negative inputs
    if wrapped >= extent {
        0.0
    } else {
        wrapped
    }
}

/// Unit vector for a heading in screen space.
fn direction(heading: i32) -> (f32, f32) {
    let radians = (heading as f32).to_radians();
    (radians.sin(), -radians.cos())
}
