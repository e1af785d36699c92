use crate::audio::Cue;
use rand::Rng;
use shared::{Asteroid, AsteroidRecord, AsteroidSize, Entity, MAX_ASTEROIDS, VIEW_HEIGHT, VIEW_WIDTH};

/// The asteroids currently in play.
#[derive(Debug, Clone, Default)]
pub struct AsteroidField {
    asteroids: Vec<Asteroid>,
}

impl AsteroidField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the field with a fresh set of large asteroids along the edges.
    pub fn generate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.asteroids.clear();
        while self.asteroids.len() < MAX_ASTEROIDS {
            self.asteroids
                .push(Asteroid::on_edge(rng, VIEW_WIDTH, VIEW_HEIGHT));
        }
    }

    pub fn clear(&mut self) {
        self.asteroids.clear();
    }

    pub fn replace(&mut self, asteroids: Vec<Asteroid>) {
        self.asteroids = asteroids;
    }

    /// Removes the asteroid at `index` and adds its fragments in the same step.
    /// Returns the size it had.
    pub fn destroy<R: Rng + ?Sized>(&mut self, index: usize, rng: &mut R) -> Option<AsteroidSize> {
        if index >= self.asteroids.len() {
            return None;
        }
        let mut parent = self.asteroids.remove(index);
        parent.destroy();
        self.asteroids.extend(parent.fragments(rng));
        Some(parent.size())
    }

    pub fn integrate(&mut self, now: u64) {
        for asteroid in &mut self.asteroids {
            asteroid.integrate(now);
        }
    }

    pub fn len(&self) -> usize {
        self.asteroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asteroids.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Asteroid> {
        self.asteroids.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Asteroid> {
        self.asteroids.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Asteroid> {
        self.asteroids.iter()
    }

    pub fn records(&self) -> Vec<AsteroidRecord> {
        self.asteroids.iter().map(AsteroidRecord::from).collect()
    }
}

/// Explosion cues implied by a snapshot replacing the field.
///
/// Snapshots carry no events, so destruction is inferred from how the field
/// length changed: an asteroid appearing at a new index is a fragment of an
/// asteroid one size larger, and a vanished index is taken as a small one
/// destroyed. An empty snapshot is only an explosion when it removes a lone
/// small asteroid; otherwise it is a reset of the field.
pub fn snapshot_cues(old: &AsteroidField, new: &[AsteroidRecord]) -> Vec<Cue> {
    if new.is_empty() {
        let lone_small = old.len() == 1
            && old.get(0).map(Asteroid::size) == Some(AsteroidSize::Small);
        return if lone_small {
            vec![Cue::ExplodeSmall]
        } else {
            Vec::new()
        };
    }

    let mut cues = Vec::new();
    for i in old.len().min(new.len())..old.len().max(new.len()) {
        if i >= old.len() {
            if let Some(parent) = new[i].size.split_from() {
                cues.push(Cue::explosion(parent));
            }
        } else {
            cues.push(Cue::ExplodeSmall);
        }
    }
    cues
}
