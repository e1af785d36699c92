//! Types and rules shared by every peer role: world constants, the kinematics
//! every moving body integrates with, the three entity variants and the text
//! line protocol spoken between host and clients.

pub mod asteroid;
pub mod bullet;
pub mod entity;
pub mod kinematics;
pub mod protocol;
pub mod ship;

pub use asteroid::{Asteroid, AsteroidSize};
pub use bullet::Bullet;
pub use entity::{Body, Entity};
pub use kinematics::{Kinematics, Rotation};
pub use protocol::{
    AsteroidRecord, BulletPosition, BulletRecord, Message, ProtocolError, ShipRecord,
    PROTOCOL_VERSION,
};
pub use ship::Ship;

pub const VIEW_WIDTH: f32 = 1024.0;
pub const VIEW_HEIGHT: f32 = 768.0;

/// Simulation steps per second.
pub const TICK_RATE: u64 = 100;
/// Simulated milliseconds that elapse per step.
pub const TICK_MS: u64 = 1000 / TICK_RATE;
/// Fixed integration scale applied to velocity and acceleration every step.
pub const DELTA_SCALE: f32 = 0.1;

pub const SHIP_RADIUS: f32 = 16.0;
pub const SHIP_THRUST: f32 = 1.0;
/// Degrees turned per step while rotating.
pub const SHIP_ROTATION_SPEED: i32 = 1;
pub const SHIP_MAX_BULLETS: usize = 4;
pub const SHIP_START_LIVES: u32 = 5;
pub const RESPAWN_DELAY_MS: u64 = 2000;
pub const MATERIALIZE_MS: u64 = 300;
pub const EXTRA_LIFE_SCORE: u32 = 10_000;
/// Extra Manhattan clearance required around a spawn point.
pub const SAFE_HAVEN_MARGIN: f32 = 100.0;

pub const BULLET_RADIUS: f32 = 3.0;
pub const BULLET_SPEED: f32 = 25.0;
pub const BULLET_TTL_MS: u64 = 2000;

pub const MAX_ASTEROIDS: usize = 8;
pub const ASTEROID_MIN_SPEED: i32 = 2;
pub const ASTEROID_MAX_SPEED: i32 = 8;

pub const DEFAULT_PORT: u16 = 50001;
/// Players in one session, the host included.
pub const MAX_PLAYERS: usize = 4;

/// Returns true if the two bodies overlap, using the Manhattan distance between
/// centers. Destroyed bodies never contact anything.
pub fn check_contact(a: &Body, b: &Body) -> bool {
    if a.is_destroyed() || b.is_destroyed() {
        return false;
    }

    let dx = (a.kinematics.x - b.kinematics.x).abs();
    let dy = (a.kinematics.y - b.kinematics.y).abs();

    dx + dy < a.radius + b.radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_uses_manhattan_distance() {
        let a = Body::new(Kinematics::new(100.0, 100.0), 10.0);
        // Euclidean distance ~14.1 < 20, Manhattan distance 20 is not < 20
        let b = Body::new(Kinematics::new(110.0, 110.0), 10.0);
        assert!(!check_contact(&a, &b));

        let c = Body::new(Kinematics::new(109.0, 110.0), 10.0);
        assert!(check_contact(&a, &c));
    }

    #[test]
    fn test_contact_is_symmetric() {
        let a = Body::new(Kinematics::new(0.0, 0.0), 5.0);
        let b = Body::new(Kinematics::new(3.0, 4.0), 5.0);
        assert_eq!(check_contact(&a, &b), check_contact(&b, &a));
        assert!(check_contact(&a, &b));
    }

    #[test]
    fn test_destroyed_bodies_never_contact() {
        let a = Body::new(Kinematics::new(50.0, 50.0), 10.0);
        let mut b = Body::new(Kinematics::new(50.0, 50.0), 10.0);
        assert!(check_contact(&a, &b));

        b.destroy();
        assert!(!check_contact(&a, &b));
        assert!(!check_contact(&b, &a));
    }

    #[test]
    fn test_tick_constants_agree() {
        assert_eq!(TICK_MS * TICK_RATE, 1000);
        assert!(SHIP_RADIUS > BULLET_RADIUS);
        assert!(ASTEROID_MIN_SPEED <= ASTEROID_MAX_SPEED);
    }
}
