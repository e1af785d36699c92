//! Fixed-step game simulation.
//!
//! One [`Simulation`] holds the complete world of a peer: roster, asteroid
//! field, level progression and the simulation clock. Only the authority (a
//! host, or a peer playing alone) resolves collisions and populates the field;
//! a client integrates locally and otherwise takes what the host sends.
//!
//! Anything other parts of the program need to react to is queued as a
//! [`SimEvent`] and collected with [`Simulation::drain_events`].

use crate::audio::{Cue, CueCommand};
use crate::field::{snapshot_cues, AsteroidField};
use crate::level::{
    Level, BEFORE_GAME_OVER_WAIT_MS, GAME_OVER_LEVEL, GAME_OVER_WAIT_MS,
    HIGH_SCORE_MUSIC_THRESHOLD, NEW_LEVEL_WAIT_MS,
};
use crate::roster::Roster;
use crate::timers::{TimerEvent, TimerId, Timers};
use crate::view::WorldView;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use shared::{
    AsteroidRecord, Bullet, Entity, Rotation, Ship, ShipRecord, MAX_PLAYERS, RESPAWN_DELAY_MS,
    SAFE_HAVEN_MARGIN, TICK_MS, VIEW_HEIGHT, VIEW_WIDTH,
};

const MULTIPLAYER_SPAWNS: [(f32, f32); MAX_PLAYERS] = [
    (VIEW_WIDTH / 4.0, VIEW_HEIGHT / 4.0),
    (VIEW_WIDTH * 3.0 / 4.0, VIEW_HEIGHT * 3.0 / 4.0),
    (VIEW_WIDTH * 3.0 / 4.0, VIEW_HEIGHT / 4.0),
    (VIEW_WIDTH / 4.0, VIEW_HEIGHT * 3.0 / 4.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Cue(CueCommand),
    /// The asteroid field changed in a way peers need to hear about.
    AsteroidsChanged,
    LevelChanged(i32),
    GameStateChanged { started: bool, paused: bool },
    /// The local player fired.
    BulletFired(Bullet),
}

pub struct Simulation {
    state: RunState,
    clock: u64,
    authority: bool,
    multiplayer: bool,
    local_slot: usize,
    roster: Roster,
    field: AsteroidField,
    level: Level,
    timers: Timers,
    level_timer: Option<TimerId>,
    rng: StdRng,
    events: Vec<SimEvent>,
}

impl Simulation {
    /// A stopped simulation with only the local ship and a background field.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut roster = Roster::new();
        roster.insert(0, Ship::new(0));

        let mut sim = Self {
            state: RunState::Stopped,
            clock: 0,
            authority: true,
            multiplayer: false,
            local_slot: 0,
            roster,
            field: AsteroidField::new(),
            level: Level::new(),
            timers: Timers::new(),
            level_timer: None,
            rng,
            events: Vec::new(),
        };
        sim.field.generate(&mut sim.rng);
        sim
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.state != RunState::Stopped
    }

    pub fn is_paused(&self) -> bool {
        self.state == RunState::Paused
    }

    /// Simulated milliseconds elapsed while not paused.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn is_authority(&self) -> bool {
        self.authority
    }

    pub fn set_authority(&mut self, authority: bool) {
        self.authority = authority;
    }

    pub fn is_multiplayer(&self) -> bool {
        self.multiplayer
    }

    /// Multiplayer games spawn each slot in its own quadrant.
    pub fn set_multiplayer(&mut self, multiplayer: bool) {
        self.multiplayer = multiplayer;
    }

    pub fn local_slot(&self) -> usize {
        self.local_slot
    }

    pub fn local_ship(&self) -> Option<&Ship> {
        self.roster.get(self.local_slot)
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn field(&self) -> &AsteroidField {
        &self.field
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn view(&self) -> WorldView {
        WorldView::capture(self)
    }

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn spawn_position(&self, slot: usize) -> (f32, f32) {
        if self.multiplayer {
            MULTIPLAYER_SPAWNS[slot % MAX_PLAYERS]
        } else {
            (VIEW_WIDTH / 2.0, VIEW_HEIGHT / 2.0)
        }
    }

    /// Advances the world by one step.
    pub fn tick(&mut self) {
        if self.state == RunState::Paused {
            return;
        }

        self.clock += TICK_MS;
        let now = self.clock;
        for event in self.timers.take_due(now) {
            self.on_timer(event);
        }

        let running = self.state == RunState::Running;
        if running {
            for (_, ship) in self.roster.iter_mut() {
                if !ship.is_destroyed() {
                    ship.integrate(now);
                }
            }
        }

        self.field.integrate(now);

        if running {
            if self.authority {
                for (_, ship) in self.roster.iter_mut() {
                    for bullet in ship.bullets_mut() {
                        bullet.integrate(now);
                    }
                }
                self.resolve_collisions();
                for (_, ship) in self.roster.iter_mut() {
                    ship.prune_bullets();
                }
            } else if let Some(ship) = self.roster.get_mut(self.local_slot) {
                ship.prune_bullets();
            }
        }

        if self.level.is_waiting_to_start_level() && (!self.is_started() || !self.field.is_empty())
        {
            self.level.hide_text();
            self.cancel_level_timer();
        }
    }

    pub fn start_game(&mut self) {
        info!("Starting game");
        self.timers.clear();
        self.level_timer = None;
        self.set_state(RunState::Running);

        if self.authority {
            self.start_level(1);

            let now = self.clock;
            let slots: Vec<usize> = self.roster.iter().map(|(slot, _)| slot).collect();
            for slot in slots {
                let spawn = self.spawn_position(slot);
                if let Some(ship) = self.roster.get_mut(slot) {
                    ship.reset(spawn, true);
                    ship.replace_bullets(Vec::new());
                    ship.spawn(now);
                }
                self.play(Cue::Spawn);
            }
        }

        self.cue(CueCommand::Loop(Cue::MusicGame));
    }

    /// Ends the game and leaves the asteroids drifting in the background.
    pub fn stop_game(&mut self) {
        info!("Stopping game");
        self.timers.clear();
        self.level_timer = None;
        self.set_state(RunState::Stopped);

        for (_, ship) in self.roster.iter_mut() {
            ship.terminate();
            ship.replace_bullets(Vec::new());
        }
        self.stop_thrust_if_idle();

        self.level.set(1);
        self.level.hide_text();
        if self.authority {
            self.field.generate(&mut self.rng);
            self.events.push(SimEvent::AsteroidsChanged);
        }

        self.cue(CueCommand::Stop(Cue::MusicGame));
    }

    pub fn pause(&mut self) {
        if self.state == RunState::Running {
            self.set_state(RunState::Paused);
        }
    }

    pub fn resume(&mut self) {
        if self.state == RunState::Paused {
            self.set_state(RunState::Running);
        }
    }

    /// Client: follow the host's started and paused flags.
    pub fn mirror_game_state(&mut self, started: bool, paused: bool) {
        if started && !self.is_started() {
            self.start_game();
        } else if !started && self.is_started() {
            if self.level.is_game_over() {
                self.set_state(RunState::Stopped);
            } else {
                self.stop_game();
            }
        }

        if started {
            if paused {
                self.pause();
            } else {
                self.resume();
            }
        }
    }

    /// Shows the banner for `level` and populates the field once the wait is
    /// over. Level 1 starts from an empty field.
    pub fn start_level(&mut self, level: i32) {
        info!("Level {}", level);
        self.level.set(level);
        self.level.show_text();

        if self.authority {
            if level == 1 {
                self.field.clear();
                self.events.push(SimEvent::AsteroidsChanged);
            }
            self.events.push(SimEvent::LevelChanged(level));
        }

        self.cancel_level_timer();
        let due = self.clock + NEW_LEVEL_WAIT_MS;
        self.level_timer = Some(self.timers.schedule(due, TimerEvent::GenerateLevel { level }));
    }

    /// Client: the host declared the game over.
    pub fn mirror_game_over(&mut self) {
        if !self.level.is_game_over() {
            self.game_over();
        }
    }

    pub fn rotate(&mut self, rotation: Rotation) {
        if let Some(ship) = self.roster.get_mut(self.local_slot) {
            if rotation == Rotation::None || !ship.is_destroyed() {
                ship.rotate(rotation);
            }
        }
    }

    pub fn thrust(&mut self, on: bool) {
        let Some(ship) = self.roster.get_mut(self.local_slot) else {
            return;
        };
        if on && ship.is_destroyed() {
            return;
        }
        if ship.thrust(on) {
            self.thrust_cue(on);
        }
    }

    /// Fires from the local ship. Returns true if a bullet left the ship.
    pub fn fire(&mut self) -> bool {
        if self.state != RunState::Running {
            return false;
        }
        let now = self.clock;
        let Some(bullet) = self
            .roster
            .get_mut(self.local_slot)
            .and_then(|ship| ship.fire(now))
        else {
            return false;
        };

        self.play(Cue::Shoot);
        self.events.push(SimEvent::BulletFired(bullet));
        true
    }

    /// Host: position, heading and thrust reported by the player in `slot`.
    pub fn force_kinematics(&mut self, slot: usize, record: &ShipRecord) {
        let Some(ship) = self.roster.get_mut(slot) else {
            return;
        };
        if ship.force_update(record.x, record.y, record.heading, record.accelerating) {
            self.thrust_cue(record.accelerating);
        }
    }

    /// Host: a bullet fired on a client joins its owner's ship.
    pub fn adopt_bullet(&mut self, bullet: Bullet) -> bool {
        let Some(ship) = self.roster.get_mut(bullet.owner()) else {
            return false;
        };
        if !ship.add_bullet(bullet) {
            debug!("Refusing bullet for player {}", ship.player_id());
            return false;
        }
        self.play(Cue::Shoot);
        true
    }

    /// Client: another player fired; the host's next state record carries the
    /// bullet itself.
    pub fn remote_shot(&mut self) {
        self.play(Cue::Shoot);
    }

    /// Client: replaces the field with the host's snapshot.
    pub fn replace_field(&mut self, records: &[AsteroidRecord]) {
        for cue in snapshot_cues(&self.field, records) {
            self.play(cue);
        }
        self.field
            .replace(records.iter().map(AsteroidRecord::to_asteroid).collect());
    }

    /// Client: applies the host's view of one ship. The local ship keeps its
    /// own position, heading and thrust.
    pub fn apply_ship_record(&mut self, record: &ShipRecord) {
        let slot = record.player_id;
        let own = slot == self.local_slot;
        let now = self.clock;
        let spawn = self.spawn_position(slot);

        let Some(ship) = self.roster.get_mut(slot) else {
            debug!("Ignoring state for empty slot {}", slot);
            return;
        };

        let thrust_changed =
            !own && ship.force_update(record.x, record.y, record.heading, record.accelerating);
        ship.replace_bullets(record.to_bullets(now));
        ship.set_score(record.score);
        ship.set_lives(record.lives);

        let transition = match (record.destroyed, ship.is_destroyed()) {
            (true, false) => {
                ship.terminate();
                Some(false)
            }
            (false, true) => {
                if own {
                    ship.reset(spawn, false);
                }
                ship.spawn(now);
                ship.set_lives(record.lives);
                Some(true)
            }
            _ => None,
        };

        if thrust_changed {
            self.thrust_cue(record.accelerating);
        }
        match transition {
            Some(false) => self.on_ship_destroyed(slot),
            Some(true) => self.play(Cue::Spawn),
            None => {}
        }
    }

    /// Adds a ship for a newly connected player. A player arriving in the
    /// middle of a game waits for the next one with no lives.
    pub fn add_remote_ship(&mut self, slot: usize) -> bool {
        if slot >= MAX_PLAYERS || slot == self.local_slot {
            warn!("No remote ship can take slot {}", slot);
            return false;
        }
        let mut ship = Ship::new(slot);
        if self.authority && self.is_started() {
            ship.set_lives(0);
        }
        self.roster.insert(slot, ship);
        true
    }

    pub fn remove_ship(&mut self, slot: usize) {
        if slot == self.local_slot {
            return;
        }
        if self.roster.remove(slot).is_some() {
            self.timers
                .cancel_where(|e| matches!(e, TimerEvent::Respawn { slot: s } if *s == slot));
            self.stop_thrust_if_idle();
        }
    }

    /// Client: moves the local ship to the slot the host assigned and puts a
    /// placeholder for the host in slot 0. Returns false for a slot no client
    /// can hold.
    pub fn rebind_local(&mut self, slot: usize) -> bool {
        if slot == 0 || slot >= MAX_PLAYERS {
            warn!("Cannot play in slot {}", slot);
            return false;
        }
        let local = self
            .roster
            .remove(self.local_slot)
            .unwrap_or_else(|| Ship::new(slot));
        self.roster.clear();
        self.roster.insert(0, Ship::new(0));
        self.roster.insert(slot, local);
        self.local_slot = slot;
        true
    }

    /// Drops every remote ship, leaving the local ship alone in slot 0.
    pub fn reset_roster(&mut self) {
        let local = self
            .roster
            .remove(self.local_slot)
            .unwrap_or_else(|| Ship::new(0));
        self.roster.clear();
        self.roster.insert(0, local);
        self.local_slot = 0;
        self.timers
            .cancel_where(|e| matches!(e, TimerEvent::Respawn { .. }));
    }

    fn on_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::GenerateLevel { level } => {
                self.level_timer = None;
                if self.authority
                    && self.is_started()
                    && self.field.is_empty()
                    && self.level.current() == level
                {
                    self.field.generate(&mut self.rng);
                    self.events.push(SimEvent::AsteroidsChanged);
                }
                self.level.hide_text();
            }
            TimerEvent::Respawn { slot } => self.try_respawn(slot),
            TimerEvent::ShowGameOver => {
                if self.level.is_game_over() {
                    self.level.show_text();
                    self.set_state(RunState::Stopped);
                }
            }
            TimerEvent::EndGameOver => {
                if self.level.is_game_over() {
                    self.level.hide_text();
                }
            }
        }
    }

    fn try_respawn(&mut self, slot: usize) {
        if self.state != RunState::Running {
            return;
        }
        match self.roster.get(slot) {
            Some(ship) if ship.is_destroyed() && ship.lives() > 0 => {}
            _ => return,
        }

        if self.is_safe_haven(slot) {
            let now = self.clock;
            if let Some(ship) = self.roster.get_mut(slot) {
                ship.spawn(now);
            }
            debug!("Player {} respawned", slot);
            self.play(Cue::Spawn);
        } else {
            let due = self.clock + TICK_MS;
            self.timers.schedule(due, TimerEvent::Respawn { slot });
        }
    }

    /// True if nothing dangerous is near the ship's current position.
    fn is_safe_haven(&self, slot: usize) -> bool {
        let Some(ship) = self.roster.get(slot) else {
            return false;
        };
        let (x, y) = ship.position();
        let radius = ship.body().radius;
        let clear = |other_x: f32, other_y: f32, other_radius: f32| {
            (x - other_x).abs() + (y - other_y).abs() >= radius + other_radius + SAFE_HAVEN_MARGIN
        };

        let asteroids_clear = self.field.iter().all(|a| {
            let (ax, ay) = a.position();
            clear(ax, ay, a.body().radius)
        });
        let ships_clear = self
            .roster
            .iter()
            .filter(|(other, s)| *other != slot && !s.is_destroyed() && !s.is_spawning(self.clock))
            .all(|(_, s)| {
                let (sx, sy) = s.position();
                clear(sx, sy, s.body().radius)
            });

        asteroids_clear && ships_clear
    }

    fn resolve_collisions(&mut self) {
        let slots: Vec<usize> = self.roster.iter().map(|(slot, _)| slot).collect();
        let mut downed: Vec<usize> = Vec::new();

        for (n, &a) in slots.iter().enumerate() {
            for &b in &slots[n + 1..] {
                if let Some((first, second)) = self.roster.pair_mut(a, b) {
                    if first.is_contacting(&*second) {
                        first.collide(second);
                        downed.push(a);
                        downed.push(b);
                    }
                }
            }
        }

        let mut struck: Vec<usize> = Vec::new();
        for &slot in &slots {
            let Some(ship) = self.roster.get_mut(slot) else {
                continue;
            };
            let contacts: Vec<usize> = self
                .field
                .iter()
                .enumerate()
                .filter(|(_, asteroid)| ship.is_contacting(*asteroid))
                .map(|(i, _)| i)
                .collect();
            if contacts.is_empty() {
                continue;
            }
            for &i in &contacts {
                if let Some(asteroid) = self.field.get_mut(i) {
                    ship.collide(asteroid);
                }
            }
            downed.push(slot);
            struck.extend(contacts);
        }
        struck.sort_unstable();
        struck.dedup();
        for &i in struck.iter().rev() {
            self.destroy_asteroid(i);
        }

        for &owner in &slots {
            let Some(ship) = self.roster.get_mut(owner) else {
                continue;
            };
            let mut bullets = std::mem::take(ship.bullets_mut());

            for bullet in bullets.iter_mut().rev() {
                if bullet.is_destroyed() {
                    continue;
                }

                let target = slots.iter().copied().find(|&s| {
                    s != owner
                        && self
                            .roster
                            .get(s)
                            .map_or(false, |other| bullet.is_contacting(other))
                });
                if let Some(s) = target {
                    if let Some(other) = self.roster.get_mut(s) {
                        bullet.collide(other);
                    }
                    downed.push(s);
                    continue;
                }

                let hit = self
                    .field
                    .iter()
                    .enumerate()
                    .rev()
                    .find(|(_, asteroid)| bullet.is_contacting(*asteroid))
                    .map(|(i, asteroid)| (i, asteroid.size()));
                if let Some((i, size)) = hit {
                    bullet.record_hit(size);
                    bullet.destroy();
                    self.destroy_asteroid(i);
                }

                if let Some(size) = bullet.take_hit() {
                    self.add_score(owner, size.score_value());
                }
            }

            if let Some(ship) = self.roster.get_mut(owner) {
                ship.replace_bullets(bullets);
            }
        }

        let mut seen = Vec::with_capacity(downed.len());
        for slot in downed {
            if !seen.contains(&slot) {
                seen.push(slot);
                self.on_ship_destroyed(slot);
            }
        }
    }

    fn destroy_asteroid(&mut self, index: usize) {
        let Some(size) = self.field.destroy(index, &mut self.rng) else {
            return;
        };
        self.play(Cue::explosion(size));
        self.events.push(SimEvent::AsteroidsChanged);

        if self.field.is_empty() && self.is_started() && !self.level.is_game_over() {
            self.start_level(self.level.current() + 1);
        }
    }

    fn add_score(&mut self, slot: usize, points: u32) {
        let extra_life = self
            .roster
            .get_mut(slot)
            .map_or(false, |ship| ship.add_score(points));
        if extra_life {
            info!("Player {} earned an extra life", slot);
            self.play(Cue::ExtraLife);
        }
    }

    fn on_ship_destroyed(&mut self, slot: usize) {
        self.play(Cue::ExplodePlayer);
        self.stop_thrust_if_idle();

        let spawn = self.spawn_position(slot);
        let authority = self.authority;
        let local = slot == self.local_slot;
        let Some(ship) = self.roster.get_mut(slot) else {
            return;
        };

        if ship.lives() > 0 {
            if authority || local {
                ship.reset(spawn, false);
            }
            if authority {
                let due = self.clock + RESPAWN_DELAY_MS;
                self.timers.schedule(due, TimerEvent::Respawn { slot });
            }
        } else if self.roster.all_out_of_lives() && !self.level.is_game_over() {
            self.game_over();
        }
    }

    fn game_over(&mut self) {
        info!("Game over");
        self.level.set(GAME_OVER_LEVEL);
        self.level.hide_text();
        self.cancel_level_timer();
        if self.authority {
            self.events.push(SimEvent::LevelChanged(GAME_OVER_LEVEL));
        }

        self.cue(CueCommand::Stop(Cue::MusicGame));
        let score = self.local_ship().map_or(0, Ship::score);
        if score > HIGH_SCORE_MUSIC_THRESHOLD {
            self.play(Cue::MusicHighscore);
        } else {
            self.play(Cue::MusicDeath);
        }

        let now = self.clock;
        self.timers
            .schedule(now + BEFORE_GAME_OVER_WAIT_MS, TimerEvent::ShowGameOver);
        self.timers.schedule(
            now + BEFORE_GAME_OVER_WAIT_MS + GAME_OVER_WAIT_MS,
            TimerEvent::EndGameOver,
        );
    }

    fn set_state(&mut self, state: RunState) {
        if self.state == state {
            return;
        }
        self.state = state;
        self.events.push(SimEvent::GameStateChanged {
            started: self.is_started(),
            paused: self.is_paused(),
        });
    }

    fn cancel_level_timer(&mut self) {
        if let Some(id) = self.level_timer.take() {
            self.timers.cancel(id);
        }
    }

    fn thrust_cue(&mut self, on: bool) {
        if on {
            self.cue(CueCommand::Loop(Cue::Thrust));
        } else {
            self.stop_thrust_if_idle();
        }
    }

    /// The thrust loop is shared by every ship, so it only stops once none of
    /// them is thrusting.
    fn stop_thrust_if_idle(&mut self) {
        if !self.roster.any_accelerating() {
            self.cue(CueCommand::Stop(Cue::Thrust));
        }
    }

    fn play(&mut self, cue: Cue) {
        self.cue(CueCommand::Play(cue));
    }

    fn cue(&mut self, command: CueCommand) {
        self.events.push(SimEvent::Cue(command));
    }
}
