use crate::bullet::Bullet;
use crate::entity::{Body, Entity};
use crate::kinematics::{Kinematics, Rotation};
use crate::{
    BULLET_RADIUS, EXTRA_LIFE_SCORE, MATERIALIZE_MS, SHIP_MAX_BULLETS, SHIP_RADIUS,
    SHIP_ROTATION_SPEED, SHIP_START_LIVES, SHIP_THRUST,
};

/// A player's ship along with its score, remaining lives and live bullets.
///
/// A new ship is not in play until [`Ship::spawn`] is called, and every spawn
/// consumes one life.
#[derive(Debug, Clone, PartialEq)]
pub struct Ship {
    body: Body,
    player_id: usize,
    lives: u32,
    max_lives: u32,
    score: u32,
    bullets: Vec<Bullet>,
    birth_time: u64,
}

impl Ship {
    pub fn new(player_id: usize) -> Self {
        let mut body = Body::new(
            Kinematics::new(0.0, 0.0).with_drive(SHIP_THRUST, SHIP_ROTATION_SPEED),
            SHIP_RADIUS,
        );
        body.destroy();

        Self {
            body,
            player_id,
            lives: SHIP_START_LIVES,
            max_lives: SHIP_START_LIVES,
            score: 0,
            bullets: Vec::with_capacity(SHIP_MAX_BULLETS),
            birth_time: 0,
        }
    }

    pub fn player_id(&self) -> usize {
        self.player_id
    }

    pub fn set_player_id(&mut self, player_id: usize) {
        self.player_id = player_id;
    }

    pub fn position(&self) -> (f32, f32) {
        (self.body.kinematics.x, self.body.kinematics.y)
    }

    pub fn heading(&self) -> i32 {
        self.body.kinematics.heading()
    }

    pub fn is_accelerating(&self) -> bool {
        self.body.kinematics.accelerating
    }

    pub fn rotation(&self) -> Rotation {
        self.body.kinematics.rotation
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn set_score(&mut self, score: u32) {
        self.score = score;
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn set_lives(&mut self, lives: u32) {
        self.lives = lives;
        self.max_lives = self.max_lives.max(lives);
    }

    /// Highest number of lives this ship has held.
    pub fn max_lives(&self) -> u32 {
        self.max_lives
    }

    pub fn birth_time(&self) -> u64 {
        self.birth_time
    }

    /// Turns the thruster on or off. Returns true if the state changed.
    pub fn thrust(&mut self, on: bool) -> bool {
        let changed = self.body.kinematics.accelerating != on;
        self.body.kinematics.accelerating = on;
        changed
    }

    pub fn rotate(&mut self, rotation: Rotation) {
        self.body.kinematics.rotation = rotation;
    }

    /// Fires a bullet from the nose of the ship.
    ///
    /// Returns `None` without side effects when the ship is not in play or
    /// already has the maximum number of live bullets.
    pub fn fire(&mut self, now: u64) -> Option<Bullet> {
        if self.is_destroyed() || self.live_bullets() >= SHIP_MAX_BULLETS {
            return None;
        }

        let (x, y) = self.body.kinematics.ahead(SHIP_RADIUS - BULLET_RADIUS);
        let bullet = Bullet::new(self.player_id, x, y, self.heading(), now);
        self.bullets.push(bullet.clone());
        Some(bullet)
    }

    /// Adds `points` to the score. Returns true if a multiple of the extra
    /// life score was crossed, in which case a life has been granted.
    pub fn add_score(&mut self, points: u32) -> bool {
        let before = self.score / EXTRA_LIFE_SCORE;
        self.score = self.score.saturating_add(points);

        if self.score / EXTRA_LIFE_SCORE > before {
            self.set_lives(self.lives + 1);
            return true;
        }
        false
    }

    /// Moves the ship to `spawn`, pointing up and motionless. A new game also
    /// restores the score and lives.
    pub fn reset(&mut self, spawn: (f32, f32), new_game: bool) {
        let kinematics = &mut self.body.kinematics;
        kinematics.place(spawn.0, spawn.1);
        kinematics.set_heading(0);
        kinematics.halt();

        if new_game {
            self.score = 0;
            self.lives = SHIP_START_LIVES;
        }
    }

    /// Puts the ship into play at its current position, using up one life.
    pub fn spawn(&mut self, now: u64) {
        self.body.restore();
        self.birth_time = now;
        self.lives = self.lives.saturating_sub(1);
    }

    /// Removes the ship from play without any effects.
    pub fn terminate(&mut self) {
        self.thrust(false);
        self.rotate(Rotation::None);
        self.body.destroy();
    }

    /// True while the ship is still materializing after a spawn.
    pub fn is_spawning(&self, now: u64) -> bool {
        !self.is_destroyed() && now.saturating_sub(self.birth_time) < MATERIALIZE_MS
    }

    /// How far the materialization has got, from 0.0 to 1.0.
    pub fn spawn_progress(&self, now: u64) -> f32 {
        let alive = now.saturating_sub(self.birth_time) as f32;
        (alive / MATERIALIZE_MS as f32).min(1.0)
    }

    /// Overwrites position, heading and thrust with values from a peer.
    /// Returns true if the thrust state changed.
    pub fn force_update(&mut self, x: f32, y: f32, heading: i32, thrust: bool) -> bool {
        self.body.kinematics.place(x, y);
        self.body.kinematics.set_heading(heading);
        self.thrust(thrust)
    }

    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    pub fn bullets_mut(&mut self) -> &mut Vec<Bullet> {
        &mut self.bullets
    }

    pub fn live_bullets(&self) -> usize {
        self.bullets.iter().filter(|b| !b.is_destroyed()).count()
    }

    /// Adopts a bullet fired by this ship's player on another peer. Refused
    /// under the same rules as [`Ship::fire`].
    pub fn add_bullet(&mut self, bullet: Bullet) -> bool {
        if self.is_destroyed() || self.live_bullets() >= SHIP_MAX_BULLETS {
            return false;
        }
        self.bullets.push(bullet);
        true
    }

    pub fn replace_bullets(&mut self, bullets: Vec<Bullet>) {
        self.bullets = bullets;
    }

    pub fn prune_bullets(&mut self) {
        self.bullets.retain(|b| !b.is_destroyed());
    }
}

impl Entity for Ship {
    fn body(&self) -> &Body {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    fn destroy(&mut self) {
        self.terminate();
    }
}
