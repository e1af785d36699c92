use crate::check_contact;
use crate::kinematics::Kinematics;

/// The state every entity variant embeds: where it is, how big it is and
/// whether it is still in play.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub kinematics: Kinematics,
    pub radius: f32,
    destroyed: bool,
}

impl Body {
    pub fn new(kinematics: Kinematics, radius: f32) -> Self {
        Self {
            kinematics,
            radius,
            destroyed: false,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn destroy(&mut self) {
        self.destroyed = true;
    }

    pub fn restore(&mut self) {
        self.destroyed = false;
    }
}

/// Capabilities shared by asteroids, bullets and ships.
///
/// Variants override `integrate` and `destroy` where their lifecycle differs;
/// contact and collision are the same for all of them.
pub trait Entity {
    fn body(&self) -> &Body;

    fn body_mut(&mut self) -> &mut Body;

    /// Advances the entity by one step at simulation time `now`.
    fn integrate(&mut self, _now: u64) {
        self.body_mut().kinematics.integrate();
    }

    fn destroy(&mut self) {
        self.body_mut().destroy();
    }

    fn is_destroyed(&self) -> bool {
        self.body().is_destroyed()
    }

    fn is_contacting(&self, other: &impl Entity) -> bool {
        check_contact(self.body(), other.body())
    }

    /// Destroys both entities. Anything needed for scoring must be read first.
    fn collide(&mut self, other: &mut impl Entity) {
        self.destroy();
        other.destroy();
    }
}
