use crate::asteroid::AsteroidSize;
use crate::entity::{Body, Entity};
use crate::kinematics::Kinematics;
use crate::{BULLET_RADIUS, BULLET_SPEED, BULLET_TTL_MS};

#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    body: Body,
    owner: usize,
    created_at: u64,
    /// Size of the asteroid this bullet just destroyed, waiting to be scored.
    hit: Option<AsteroidSize>,
}

impl Bullet {
    pub fn new(owner: usize, x: f32, y: f32, heading: i32, created_at: u64) -> Self {
        Self {
            body: Body::new(
                Kinematics::launched(x, y, heading, BULLET_SPEED),
                BULLET_RADIUS,
            ),
            owner,
            created_at,
            hit: None,
        }
    }

    pub fn owner(&self) -> usize {
        self.owner
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn heading(&self) -> i32 {
        self.body.kinematics.heading()
    }

    pub fn position(&self) -> (f32, f32) {
        (self.body.kinematics.x, self.body.kinematics.y)
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) > BULLET_TTL_MS
    }

    pub fn record_hit(&mut self, size: AsteroidSize) {
        self.hit = Some(size);
    }

    /// Returns the pending hit, clearing it so it is only scored once.
    pub fn take_hit(&mut self) -> Option<AsteroidSize> {
        self.hit.take()
    }
}

impl Entity for Bullet {
    fn body(&self) -> &Body {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    fn integrate(&mut self, now: u64) {
        if self.is_expired(now) {
            self.destroy();
            return;
        }
        self.body.kinematics.integrate();
    }
}
