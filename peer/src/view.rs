//! Read-only snapshot of the world for presentation.
//!
//! A renderer, the status command and the tests all look at the game through
//! [`WorldView`]; nothing here can change the simulation.

use crate::simulation::Simulation;
use serde::Serialize;
use shared::Entity;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorldView {
    pub clock: u64,
    pub started: bool,
    pub paused: bool,
    pub level: i32,
    pub waiting_to_start_level: bool,
    pub game_over: bool,
    pub show_text: bool,
    pub local_player: usize,
    pub ships: Vec<ShipView>,
    pub asteroids: Vec<AsteroidView>,
    pub bullets: Vec<BulletView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipView {
    pub player_id: usize,
    pub x: f32,
    pub y: f32,
    pub heading: i32,
    pub accelerating: bool,
    pub destroyed: bool,
    pub spawning: bool,
    /// Materialization progress from 0.0 to 1.0.
    pub spawn_progress: f32,
    pub score: u32,
    pub lives: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AsteroidView {
    pub x: f32,
    pub y: f32,
    pub heading: i32,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulletView {
    pub owner: usize,
    pub x: f32,
    pub y: f32,
    pub heading: i32,
}

impl WorldView {
    pub fn capture(sim: &Simulation) -> Self {
        let now = sim.clock();
        let level = sim.level();

        let ships = sim
            .roster()
            .iter()
            .map(|(slot, ship)| {
                let (x, y) = ship.position();
                ShipView {
                    player_id: slot,
                    x,
                    y,
                    heading: ship.heading(),
                    accelerating: ship.is_accelerating(),
                    destroyed: ship.is_destroyed(),
                    spawning: ship.is_spawning(now),
                    spawn_progress: ship.spawn_progress(now),
                    score: ship.score(),
                    lives: ship.lives(),
                }
            })
            .collect();

        let asteroids = sim
            .field()
            .iter()
            .map(|asteroid| {
                let (x, y) = asteroid.position();
                AsteroidView {
                    x,
                    y,
                    heading: asteroid.heading(),
                    size: asteroid.size().to_string(),
                }
            })
            .collect();

        let bullets = sim
            .roster()
            .iter()
            .flat_map(|(_, ship)| ship.bullets().iter())
            .filter(|bullet| !bullet.is_destroyed())
            .map(|bullet| {
                let (x, y) = bullet.position();
                BulletView {
                    owner: bullet.owner(),
                    x,
                    y,
                    heading: bullet.heading(),
                }
            })
            .collect();

        Self {
            clock: now,
            started: sim.is_started(),
            paused: sim.is_paused(),
            level: level.current(),
            waiting_to_start_level: level.is_waiting_to_start_level(),
            game_over: level.is_game_over(),
            show_text: level.should_show_text(),
            local_player: sim.local_slot(),
            ships,
            asteroids,
            bullets,
        }
    }

    pub fn local_ship(&self) -> Option<&ShipView> {
        self.ships.iter().find(|s| s.player_id == self.local_player)
    }

    /// One-line summary for the status command.
    pub fn summary(&self) -> String {
        let state = if self.paused {
            "paused"
        } else if self.started {
            "running"
        } else {
            "stopped"
        };
        let (score, lives) = self
            .local_ship()
            .map_or((0, 0), |ship| (ship.score, ship.lives));

        format!(
            "{} | level {} | player {} | score {} | lives {} | {} ships, {} asteroids, {} bullets",
            state,
            self.level,
            self.local_player,
            score,
            lives,
            self.ships.len(),
            self.asteroids.len(),
            self.bullets.len()
        )
    }
}
