//! Multiplayer session rules on top of the simulation.
//!
//! [`GameSession`] decides who is allowed to say what. The host owns the
//! asteroid field, level progression and game state, and relays what its
//! clients report about their own ships. A client mirrors the host and only
//! ever speaks for its own ship.
//!
//! The session performs no I/O. Messages to send are queued as [`Outbound`]
//! work for the network node, state changes for the user as [`Notice`]s and
//! audio as [`CueCommand`]s.

use crate::audio::CueCommand;
use crate::level::GAME_OVER_LEVEL;
use crate::simulation::{SimEvent, Simulation};
use crate::view::WorldView;
use log::{debug, info, warn};
use shared::{BulletRecord, Entity, Message, Rotation, ShipRecord, PROTOCOL_VERSION};
use std::collections::HashMap;

/// Identifies one transport connection for the lifetime of the process.
pub type ConnId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Standalone,
    Host,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    Connecting,
    Connected,
    Disconnected,
}

/// Work for the network layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Send { conn: ConnId, message: Message },
    Broadcast {
        message: Message,
        exclude: Option<ConnId>,
    },
    Close { conn: ConnId },
    /// Stop listening and close every connection.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    HostWaiting { addr: String },
    Connected { player_id: usize },
    Disconnected,
}

pub struct GameSession {
    sim: Simulation,
    role: Role,
    state: SessionState,
    /// Slot bound to each client connection on the host.
    peers: HashMap<ConnId, usize>,
    host_conn: Option<ConnId>,
    outbound: Vec<Outbound>,
    notices: Vec<Notice>,
    cues: Vec<CueCommand>,
}

impl GameSession {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            sim: Simulation::new(seed),
            role: Role::Standalone,
            state: SessionState::Idle,
            peers: HashMap::new(),
            host_conn: None,
            outbound: Vec::new(),
            notices: Vec::new(),
            cues: Vec::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    pub fn view(&self) -> WorldView {
        self.sim.view()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn slot_of(&self, conn: ConnId) -> Option<usize> {
        self.peers.get(&conn).copied()
    }

    pub fn begin_hosting(&mut self, addr: String) {
        info!("Waiting for players on {}", addr);
        self.role = Role::Host;
        self.state = SessionState::Listening;
        self.sim.set_authority(true);
        self.notices.push(Notice::HostWaiting { addr });
    }

    /// Drops any local game and waits for the host to take over.
    pub fn begin_joining(&mut self) {
        if self.sim.is_started() {
            self.sim.stop_game();
        }
        self.role = Role::Client;
        self.state = SessionState::Connecting;
        self.sim.set_authority(false);
        self.flush();
    }

    /// Host: admits a new connection. Returns false if it was turned away.
    pub fn on_peer_connected(&mut self, conn: ConnId) -> bool {
        if self.role != Role::Host {
            warn!("Connection {} arrived while not hosting", conn);
            self.outbound.push(Outbound::Close { conn });
            return false;
        }
        let Some(slot) = self.sim.roster().free_slot() else {
            warn!("No free slot for connection {}", conn);
            self.outbound.push(Outbound::Close { conn });
            return false;
        };

        info!("Player {} joined on connection {}", slot, conn);
        self.sim.set_multiplayer(true);
        self.state = SessionState::Connected;

        let mut welcome = vec![
            Message::Welcome {
                version: PROTOCOL_VERSION,
                player_id: slot,
            },
            Message::Game {
                started: self.sim.is_started(),
                paused: self.sim.is_paused(),
            },
            Message::Level {
                level: self.sim.level().current(),
            },
            Message::Asteroids(self.sim.field().records()),
        ];
        let mut others: Vec<usize> = self.peers.values().copied().collect();
        others.sort_unstable();
        welcome.extend(others.into_iter().map(|player_id| Message::PlayerStatus {
            player_id,
            connected: true,
        }));
        for message in welcome {
            self.outbound.push(Outbound::Send { conn, message });
        }

        self.peers.insert(conn, slot);
        self.sim.add_remote_ship(slot);
        self.outbound.push(Outbound::Broadcast {
            message: Message::PlayerStatus {
                player_id: slot,
                connected: true,
            },
            exclude: Some(conn),
        });
        self.notices.push(Notice::Connected { player_id: slot });
        true
    }

    /// Client: the transport to the host is up. The session counts as
    /// connected once the host's welcome arrives.
    pub fn on_connected_to_host(&mut self, conn: ConnId) {
        debug!("Connection {} to host open", conn);
        self.host_conn = Some(conn);
    }

    pub fn on_peer_disconnected(&mut self, conn: ConnId) {
        match self.role {
            Role::Host => {
                let Some(slot) = self.peers.remove(&conn) else {
                    return;
                };
                info!("Player {} left", slot);
                self.sim.remove_ship(slot);
                self.outbound.push(Outbound::Broadcast {
                    message: Message::PlayerStatus {
                        player_id: slot,
                        connected: false,
                    },
                    exclude: None,
                });
                self.flush();
                if self.peers.is_empty() {
                    self.end_session();
                }
            }
            Role::Client if self.host_conn == Some(conn) => {
                info!("Lost connection to host");
                self.end_session();
            }
            _ => {}
        }
    }

    /// Tears down the session and returns to playing alone.
    pub fn end_session(&mut self) {
        if self.role == Role::Standalone {
            return;
        }
        self.outbound.push(Outbound::Shutdown);
        self.peers.clear();
        self.host_conn = None;

        self.sim.set_authority(true);
        self.sim.stop_game();
        self.sim.reset_roster();
        self.sim.set_multiplayer(false);

        self.role = Role::Standalone;
        self.state = SessionState::Disconnected;
        self.notices.push(Notice::Disconnected);
        self.flush();
    }

    pub fn leave(&mut self) {
        self.end_session();
    }

    pub fn handle_message(&mut self, conn: ConnId, message: Message) {
        debug!("{} from connection {}", message.kind(), conn);
        match self.role {
            Role::Host => self.handle_as_host(conn, message),
            Role::Client => self.handle_as_client(conn, message),
            Role::Standalone => warn!("Dropping {} while not in a session", message.kind()),
        }
        self.flush();
    }

    fn handle_as_host(&mut self, conn: ConnId, message: Message) {
        let Some(slot) = self.slot_of(conn) else {
            warn!("Dropping {} from unknown connection {}", message.kind(), conn);
            return;
        };

        match message {
            Message::PlayerState(record) if record.player_id == slot => {
                self.sim.force_kinematics(slot, &record);
            }
            Message::Bullet(record) if record.player_id == slot => {
                if !self.sim.is_started() {
                    return;
                }
                let bullet = record.to_bullet(self.sim.clock());
                if self.sim.adopt_bullet(bullet) {
                    self.outbound.push(Outbound::Broadcast {
                        message: Message::Bullet(record),
                        exclude: Some(conn),
                    });
                }
            }
            other @ (Message::PlayerState(_) | Message::Bullet(_)) => {
                warn!("Player {} sent {} for another player", slot, other.kind());
            }
            other => warn!(
                "Ignoring {} from player {}: only the host sends it",
                other.kind(),
                slot
            ),
        }
    }

    fn handle_as_client(&mut self, conn: ConnId, message: Message) {
        if self.host_conn != Some(conn) {
            warn!("Dropping {} from connection {}", message.kind(), conn);
            return;
        }

        if let Message::Welcome { version, player_id } = message {
            if version != PROTOCOL_VERSION {
                warn!(
                    "Host speaks protocol version {}, expected {}",
                    version, PROTOCOL_VERSION
                );
                self.outbound.push(Outbound::Close { conn });
                self.end_session();
                return;
            }
            self.sim.set_multiplayer(true);
            if !self.sim.rebind_local(player_id) {
                self.outbound.push(Outbound::Close { conn });
                self.end_session();
                return;
            }
            info!("Joined as player {}", player_id);
            self.state = SessionState::Connected;
            self.notices.push(Notice::Connected { player_id });
            return;
        }

        if self.state != SessionState::Connected {
            warn!("Dropping {} received before the welcome", message.kind());
            return;
        }

        match message {
            Message::Game { started, paused } => self.sim.mirror_game_state(started, paused),
            Message::Level { level } if level == GAME_OVER_LEVEL => self.sim.mirror_game_over(),
            Message::Level { level } => self.sim.start_level(level),
            Message::Asteroids(records) => self.sim.replace_field(&records),
            Message::PlayerStatus {
                player_id,
                connected,
            } => {
                if player_id == self.sim.local_slot() {
                    return;
                }
                if connected {
                    self.sim.add_remote_ship(player_id);
                } else {
                    self.sim.remove_ship(player_id);
                }
            }
            Message::PlayerState(record) => self.sim.apply_ship_record(&record),
            Message::Bullet(record) => {
                if record.player_id != self.sim.local_slot() {
                    self.sim.remote_shot();
                }
            }
            Message::Welcome { .. } => {}
        }
    }

    pub fn start_game(&mut self) -> bool {
        if !self.may_control_game("start") {
            return false;
        }
        self.sim.start_game();
        self.flush();
        true
    }

    pub fn stop_game(&mut self) -> bool {
        if !self.may_control_game("stop") {
            return false;
        }
        self.sim.stop_game();
        self.flush();
        true
    }

    pub fn pause(&mut self) -> bool {
        if !self.may_control_game("pause") {
            return false;
        }
        self.sim.pause();
        self.flush();
        true
    }

    pub fn resume(&mut self) -> bool {
        if !self.may_control_game("resume") {
            return false;
        }
        self.sim.resume();
        self.flush();
        true
    }

    fn may_control_game(&self, action: &str) -> bool {
        if self.role == Role::Client {
            warn!("Only the host can {} the game", action);
            return false;
        }
        true
    }

    pub fn rotate(&mut self, rotation: Rotation) {
        self.sim.rotate(rotation);
    }

    pub fn thrust(&mut self, on: bool) {
        self.sim.thrust(on);
        self.flush();
    }

    pub fn fire(&mut self) -> bool {
        let fired = self.sim.fire();
        self.flush();
        fired
    }

    /// Advances the simulation one step, then queues this step's state for
    /// the other peers.
    pub fn tick(&mut self) {
        self.sim.tick();
        self.flush();

        if !self.sim.is_started() || self.sim.is_paused() {
            return;
        }

        match self.role {
            Role::Host if !self.peers.is_empty() => {
                let records: Vec<ShipRecord> = self
                    .sim
                    .roster()
                    .iter()
                    .map(|(_, ship)| ShipRecord::from(ship))
                    .collect();
                for record in records {
                    self.outbound.push(Outbound::Broadcast {
                        message: Message::PlayerState(record),
                        exclude: None,
                    });
                }
            }
            Role::Client if self.state == SessionState::Connected => {
                let own = self
                    .sim
                    .local_ship()
                    .filter(|ship| !ship.is_destroyed())
                    .map(ShipRecord::from);
                if let (Some(record), Some(conn)) = (own, self.host_conn) {
                    self.outbound.push(Outbound::Send {
                        conn,
                        message: Message::PlayerState(record),
                    });
                }
            }
            _ => {}
        }
    }

    /// Turns simulation events into outbound messages and cues. Several field
    /// changes in one pass go out as a single snapshot.
    fn flush(&mut self) {
        let mut field_sent = false;

        for event in self.sim.drain_events() {
            match event {
                SimEvent::Cue(command) => self.cues.push(command),
                SimEvent::AsteroidsChanged => {
                    if self.role == Role::Host && !field_sent {
                        field_sent = true;
                        self.broadcast(Message::Asteroids(self.sim.field().records()));
                    }
                }
                SimEvent::LevelChanged(level) => {
                    if self.role == Role::Host {
                        self.broadcast(Message::Level { level });
                    }
                }
                SimEvent::GameStateChanged { started, paused } => {
                    if self.role == Role::Host {
                        self.broadcast(Message::Game { started, paused });
                    }
                }
                SimEvent::BulletFired(bullet) => {
                    let message = Message::Bullet(BulletRecord::from(&bullet));
                    match (self.role, self.host_conn) {
                        (Role::Host, _) => self.broadcast(message),
                        (Role::Client, Some(conn)) => {
                            self.outbound.push(Outbound::Send { conn, message })
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn broadcast(&mut self, message: Message) {
        if self.peers.is_empty() {
            return;
        }
        self.outbound.push(Outbound::Broadcast {
            message,
            exclude: None,
        });
    }

    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbound)
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn drain_cues(&mut self) -> Vec<CueCommand> {
        std::mem::take(&mut self.cues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Cue;
    use shared::{AsteroidSize, MAX_ASTEROIDS, MAX_PLAYERS, SHIP_MAX_BULLETS, TICK_MS};

    fn host() -> GameSession {
        let mut session = GameSession::new(Some(5));
        session.begin_hosting("127.0.0.1:50001".to_string());
        session.drain_notices();
        session
    }

    fn client(player_id: usize) -> GameSession {
        let mut session = GameSession::new(Some(6));
        session.begin_joining();
        session.on_connected_to_host(1);
        session.handle_message(
            1,
            Message::Welcome {
                version: PROTOCOL_VERSION,
                player_id,
            },
        );
        session.drain_outbound();
        session.drain_notices();
        session
    }

    fn sent_to(outbound: &[Outbound], target: ConnId) -> Vec<Message> {
        outbound
            .iter()
            .filter_map(|o| match o {
                Outbound::Send { conn, message } if *conn == target => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn broadcasts(outbound: &[Outbound]) -> Vec<(Message, Option<ConnId>)> {
        outbound
            .iter()
            .filter_map(|o| match o {
                Outbound::Broadcast { message, exclude } => Some((message.clone(), *exclude)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_host_join_sequence() {
        let mut session = host();
        assert!(session.on_peer_connected(7));

        let outbound = session.drain_outbound();
        let sent = sent_to(&outbound, 7);
        assert_eq!(
            sent[0],
            Message::Welcome {
                version: PROTOCOL_VERSION,
                player_id: 1
            }
        );
        assert_eq!(
            sent[1],
            Message::Game {
                started: false,
                paused: false
            }
        );
        assert_eq!(sent[2], Message::Level { level: 1 });
        assert!(matches!(&sent[3], Message::Asteroids(a) if a.len() == MAX_ASTEROIDS));
        assert_eq!(sent.len(), 4);
        assert_eq!(
            broadcasts(&outbound),
            vec![(
                Message::PlayerStatus {
                    player_id: 1,
                    connected: true
                },
                Some(7)
            )]
        );
        assert_eq!(
            session.drain_notices(),
            vec![Notice::Connected { player_id: 1 }]
        );

        session.on_peer_connected(8);
        let sent = sent_to(&session.drain_outbound(), 8);
        assert_eq!(
            sent[0],
            Message::Welcome {
                version: PROTOCOL_VERSION,
                player_id: 2
            }
        );
        assert_eq!(
            sent[4],
            Message::PlayerStatus {
                player_id: 1,
                connected: true
            }
        );
    }

    #[test]
    fn test_host_reuses_lowest_freed_slot() {
        let mut session = host();
        for conn in 1..=3 {
            assert!(session.on_peer_connected(conn));
        }
        assert!(!session.on_peer_connected(4));
        assert!(session
            .drain_outbound()
            .contains(&Outbound::Close { conn: 4 }));

        session.on_peer_disconnected(2);
        assert_eq!(session.slot_of(2), None);
        assert!(broadcasts(&session.drain_outbound()).contains(&(
            Message::PlayerStatus {
                player_id: 2,
                connected: false
            },
            None
        )));

        assert!(session.on_peer_connected(5));
        assert_eq!(session.slot_of(5), Some(2));
    }

    #[test]
    fn test_player_joining_running_game_spectates() {
        let mut session = host();
        session.start_game();
        session.on_peer_connected(3);

        let ship = session.simulation().roster().get(1).unwrap();
        assert!(ship.is_destroyed());
        assert_eq!(ship.lives(), 0);
    }

    #[test]
    fn test_host_ignores_client_field_and_level() {
        let mut session = host();
        session.on_peer_connected(3);

        session.handle_message(3, Message::Asteroids(Vec::new()));
        session.handle_message(3, Message::Level { level: 4 });
        session.handle_message(
            3,
            Message::Game {
                started: true,
                paused: false,
            },
        );

        assert_eq!(session.simulation().field().len(), MAX_ASTEROIDS);
        assert_eq!(session.simulation().level().current(), 1);
        assert!(!session.simulation().is_started());
    }

    #[test]
    fn test_host_applies_state_only_for_bound_slot() {
        let mut session = host();
        session.on_peer_connected(3);
        session.on_peer_connected(4);

        let mut record = ShipRecord::from(session.simulation().roster().get(2).unwrap());
        record.x = 300.0;
        record.y = 200.0;
        record.score = 99_999;

        session.handle_message(3, Message::PlayerState(record.clone()));
        assert_ne!(
            session.simulation().roster().get(2).unwrap().position(),
            (300.0, 200.0)
        );

        session.handle_message(4, Message::PlayerState(record));
        let ship = session.simulation().roster().get(2).unwrap();
        assert_eq!(ship.position(), (300.0, 200.0));
        assert_eq!(ship.score(), 0);
    }

    #[test]
    fn test_host_relays_bullets_to_other_clients() {
        let mut session = host();
        session.on_peer_connected(3);
        session.on_peer_connected(4);
        session.start_game();
        session.drain_outbound();
        session.drain_cues();

        let record = BulletRecord {
            player_id: 1,
            x: 10.0,
            y: 20.0,
            heading: 90,
        };
        session.handle_message(3, Message::Bullet(record.clone()));

        assert_eq!(
            broadcasts(&session.drain_outbound()),
            vec![(Message::Bullet(record), Some(3))]
        );
        assert_eq!(
            session.simulation().roster().get(1).unwrap().bullets().len(),
            1
        );
        assert!(session
            .drain_cues()
            .contains(&CueCommand::Play(Cue::Shoot)));
    }

    #[test]
    fn test_host_caps_bullets_from_a_client() {
        let mut session = host();
        session.on_peer_connected(3);
        session.on_peer_connected(4);
        session.start_game();
        session.drain_outbound();

        for i in 0..6 {
            let record = BulletRecord {
                player_id: 1,
                x: 100.0 + i as f32,
                y: 20.0,
                heading: 90,
            };
            session.handle_message(3, Message::Bullet(record));
        }

        let relayed = broadcasts(&session.drain_outbound())
            .into_iter()
            .filter(|(m, _)| matches!(m, Message::Bullet(_)))
            .count();
        assert_eq!(relayed, SHIP_MAX_BULLETS);
        assert_eq!(
            session.simulation().roster().get(1).unwrap().live_bullets(),
            SHIP_MAX_BULLETS
        );
    }

    #[test]
    fn test_spectator_bullets_are_not_adopted() {
        let mut session = host();
        session.on_peer_connected(3);
        session.start_game();
        session.on_peer_connected(4);
        session.drain_outbound();

        let record = BulletRecord {
            player_id: 2,
            x: 10.0,
            y: 20.0,
            heading: 0,
        };
        session.handle_message(4, Message::Bullet(record));

        assert!(broadcasts(&session.drain_outbound()).is_empty());
        assert!(session
            .simulation()
            .roster()
            .get(2)
            .unwrap()
            .bullets()
            .is_empty());
    }

    #[test]
    fn test_host_broadcasts_every_ship_each_tick() {
        let mut session = host();
        session.on_peer_connected(3);
        session.start_game();
        session.drain_outbound();

        session.tick();
        let states = broadcasts(&session.drain_outbound())
            .into_iter()
            .filter(|(m, _)| matches!(m, Message::PlayerState(_)))
            .count();
        assert_eq!(states, 2);
    }

    #[test]
    fn test_host_start_announces_game_and_level() {
        let mut session = host();
        session.on_peer_connected(3);
        session.drain_outbound();

        session.start_game();
        let messages: Vec<Message> = broadcasts(&session.drain_outbound())
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        assert_eq!(
            messages[0],
            Message::Game {
                started: true,
                paused: false
            }
        );
        assert_eq!(messages[1], Message::Asteroids(Vec::new()));
        assert_eq!(messages[2], Message::Level { level: 1 });
    }

    #[test]
    fn test_last_player_leaving_ends_session() {
        let mut session = host();
        session.on_peer_connected(3);
        session.start_game();
        session.drain_outbound();
        session.drain_notices();

        session.on_peer_disconnected(3);

        assert!(session.drain_outbound().contains(&Outbound::Shutdown));
        assert_eq!(session.drain_notices(), vec![Notice::Disconnected]);
        assert_eq!(session.role(), Role::Standalone);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.simulation().is_started());
        assert_eq!(session.simulation().roster().len(), 1);
    }

    #[test]
    fn test_client_welcome_binds_local_slot() {
        let mut session = GameSession::new(Some(1));
        session.begin_joining();
        session.on_connected_to_host(9);
        assert_eq!(session.state(), SessionState::Connecting);

        session.handle_message(
            9,
            Message::Welcome {
                version: PROTOCOL_VERSION,
                player_id: 3,
            },
        );

        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.simulation().local_slot(), 3);
        assert!(session.simulation().roster().get(0).is_some());
        assert_eq!(
            session.drain_notices(),
            vec![Notice::Connected { player_id: 3 }]
        );
    }

    #[test]
    fn test_client_rejects_other_protocol_version() {
        let mut session = GameSession::new(Some(1));
        session.begin_joining();
        session.on_connected_to_host(9);

        session.handle_message(
            9,
            Message::Welcome {
                version: PROTOCOL_VERSION + 1,
                player_id: 1,
            },
        );

        let outbound = session.drain_outbound();
        assert!(outbound.contains(&Outbound::Close { conn: 9 }));
        assert!(outbound.contains(&Outbound::Shutdown));
        assert_eq!(session.role(), Role::Standalone);
        assert_eq!(session.drain_notices(), vec![Notice::Disconnected]);
    }

    #[test]
    fn test_client_only_replaces_field_from_host() {
        let mut session = client(1);
        session.handle_message(
            1,
            Message::Game {
                started: true,
                paused: false,
            },
        );
        session.handle_message(1, Message::Level { level: 1 });
        session.handle_message(1, Message::Asteroids(Vec::new()));

        for _ in 0..400 {
            session.tick();
        }
        assert!(session.simulation().field().is_empty());

        let snapshot = vec![shared::AsteroidRecord {
            x: 100.0,
            y: 100.0,
            heading: 0,
            speed: 2,
            size: AsteroidSize::Large,
        }];
        session.handle_message(1, Message::Asteroids(snapshot));
        assert_eq!(session.simulation().field().len(), 1);
    }

    #[test]
    fn test_client_mirrors_game_over() {
        let mut session = client(1);
        session.handle_message(
            1,
            Message::Game {
                started: true,
                paused: false,
            },
        );
        session.handle_message(1, Message::Level { level: GAME_OVER_LEVEL });

        assert!(session.simulation().level().is_game_over());
        assert!(session
            .drain_cues()
            .contains(&CueCommand::Play(Cue::MusicDeath)));
    }

    #[test]
    fn test_client_cannot_control_game() {
        let mut session = client(2);
        assert!(!session.start_game());
        assert!(!session.pause());
        assert!(!session.simulation().is_started());
    }

    #[test]
    fn test_client_sends_own_state_and_bullets_to_host() {
        let mut session = client(1);
        session.handle_message(
            1,
            Message::Game {
                started: true,
                paused: false,
            },
        );
        let own = ShipRecord {
            player_id: 1,
            x: 0.0,
            y: 0.0,
            heading: 0,
            accelerating: false,
            destroyed: false,
            score: 0,
            lives: 4,
            bullets: Vec::new(),
        };
        session.handle_message(1, Message::PlayerState(own));
        assert!(!session.simulation().local_ship().unwrap().is_destroyed());
        session.drain_outbound();

        session.tick();
        let sent = sent_to(&session.drain_outbound(), 1);
        assert!(matches!(&sent[..], [Message::PlayerState(r)] if r.player_id == 1));

        assert!(session.fire());
        let sent = sent_to(&session.drain_outbound(), 1);
        assert!(matches!(&sent[..], [Message::Bullet(b)] if b.player_id == 1));
    }

    #[test]
    fn test_client_ignores_kinematics_for_own_ship() {
        let mut session = client(1);
        session.handle_message(
            1,
            Message::Game {
                started: true,
                paused: false,
            },
        );
        let spawn = session.simulation().spawn_position(1);
        let own = ShipRecord {
            player_id: 1,
            x: 5.0,
            y: 5.0,
            heading: 180,
            accelerating: true,
            destroyed: false,
            score: 150,
            lives: 3,
            bullets: Vec::new(),
        };
        session.handle_message(1, Message::PlayerState(own));

        let ship = session.simulation().local_ship().unwrap();
        assert_eq!(ship.position(), spawn);
        assert!(!ship.is_accelerating());
        assert_eq!(ship.score(), 150);
        assert_eq!(ship.lives(), 3);
    }

    #[test]
    fn test_client_tracks_other_players() {
        let mut session = client(2);
        session.handle_message(
            1,
            Message::PlayerStatus {
                player_id: 1,
                connected: true,
            },
        );
        assert_eq!(session.simulation().roster().len(), 3);

        session.handle_message(
            1,
            Message::PlayerStatus {
                player_id: 1,
                connected: false,
            },
        );
        assert_eq!(session.simulation().roster().len(), 2);

        session.handle_message(
            1,
            Message::PlayerStatus {
                player_id: 2,
                connected: false,
            },
        );
        assert!(session.simulation().local_ship().is_some());
    }

    #[test]
    fn test_client_survives_out_of_range_player_ids() {
        let mut session = client(1);
        for player_id in [MAX_PLAYERS, 1_000_000, usize::MAX] {
            session.handle_message(
                1,
                Message::PlayerStatus {
                    player_id,
                    connected: true,
                },
            );
        }
        assert_eq!(session.simulation().roster().len(), 2);
        assert_eq!(session.role(), Role::Client);

        let line = format!("3 C {} true", usize::MAX);
        assert!(Message::decode(&line).is_err());
    }

    #[test]
    fn test_client_rejects_welcome_for_invalid_slot() {
        let mut session = GameSession::new(Some(1));
        session.begin_joining();
        session.on_connected_to_host(9);

        session.handle_message(
            9,
            Message::Welcome {
                version: PROTOCOL_VERSION,
                player_id: usize::MAX,
            },
        );

        assert!(session
            .drain_outbound()
            .contains(&Outbound::Close { conn: 9 }));
        assert_eq!(session.role(), Role::Standalone);
        assert_eq!(session.simulation().local_slot(), 0);
        assert_eq!(session.simulation().roster().len(), 1);
    }

    #[test]
    fn test_losing_host_ends_client_session() {
        let mut session = client(1);
        session.on_peer_disconnected(1);

        assert_eq!(session.role(), Role::Standalone);
        assert_eq!(session.simulation().local_slot(), 0);
        assert_eq!(session.simulation().field().len(), MAX_ASTEROIDS);
        assert!(session.simulation().is_authority());
        assert_eq!(session.drain_notices(), vec![Notice::Disconnected]);
    }

    #[test]
    fn test_standalone_tick_queues_nothing() {
        let mut session = GameSession::new(Some(3));
        session.start_game();
        for _ in 0..(3000 / TICK_MS) {
            session.tick();
        }
        assert!(session.drain_outbound().is_empty());
        assert_eq!(session.simulation().field().len(), MAX_ASTEROIDS);
    }
}
