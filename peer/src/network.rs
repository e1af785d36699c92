//! Network node running one peer: tick driver, listener, dialer and the
//! command queue, all feeding a single task that owns the [`GameSession`].

use crate::audio::{LogBackend, Mixer};
use crate::config::{NodeConfig, Settings};
use crate::connection_manager::ConnectionManager;
use crate::session::{ConnId, GameSession, Notice, Outbound, Role, SessionState};
use crate::view::WorldView;
use log::{debug, error, info, warn};
use shared::{Message, Rotation, MAX_PLAYERS, TICK_MS};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to the node
#[derive(Debug)]
pub enum NetEvent {
    Accepted {
        stream: TcpStream,
        addr: SocketAddr,
        permit: OwnedSemaphorePermit,
    },
    Dialed {
        stream: TcpStream,
        addr: SocketAddr,
    },
    DialFailed {
        addr: String,
        error: io::Error,
    },
    Line {
        conn: ConnId,
        message: Message,
    },
    Closed {
        conn: ConnId,
    },
}

/// Requests from the user or an embedding program
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Pause,
    Resume,
    Rotate(Rotation),
    Thrust(bool),
    Fire,
    Host,
    /// Join a host; without an address the last one used is tried.
    Join(Option<String>),
    Leave,
    ToggleSound,
    ToggleMusic,
    Status,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command {:?}", self.0)
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let command = match words.next().unwrap_or_default() {
            "start" => Command::Start,
            "stop" => Command::Stop,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "left" => Command::Rotate(Rotation::Left),
            "right" => Command::Rotate(Rotation::Right),
            "straight" => Command::Rotate(Rotation::None),
            "thrust" => Command::Thrust(true),
            "coast" => Command::Thrust(false),
            "fire" => Command::Fire,
            "host" => Command::Host,
            "join" => Command::Join(words.next().map(str::to_string)),
            "leave" => Command::Leave,
            "sound" => Command::ToggleSound,
            "music" => Command::ToggleMusic,
            "status" => Command::Status,
            "quit" | "exit" => Command::Quit,
            _ => return Err(UnknownCommand(s.trim().to_string())),
        };
        Ok(command)
    }
}

/// The outside world's side of a running [`Node`].
pub struct NodeHandle {
    pub commands: mpsc::UnboundedSender<Command>,
    pub view: watch::Receiver<WorldView>,
    pub notices: mpsc::UnboundedReceiver<Notice>,
}

pub struct Node {
    config: NodeConfig,
    settings: Settings,
    settings_path: Option<PathBuf>,
    session: GameSession,
    connections: ConnectionManager,
    mixer: Mixer<LogBackend>,
    listener: Option<JoinHandle<()>>,

    // Communication channels
    net_tx: mpsc::UnboundedSender<NetEvent>,
    net_rx: mpsc::UnboundedReceiver<NetEvent>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    view_tx: watch::Sender<WorldView>,
    notice_tx: mpsc::UnboundedSender<Notice>,
}

impl Node {
    /// Settings are written back to `settings_path` whenever a preference
    /// changes; without a path they only live in memory.
    pub fn new(
        config: NodeConfig,
        settings: Settings,
        settings_path: Option<PathBuf>,
    ) -> (Self, NodeHandle) {
        let (net_tx, net_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let session = GameSession::new(config.seed);
        let (view_tx, view_rx) = watch::channel(session.view());
        let mixer = Mixer::new(
            LogBackend::default(),
            settings.sound_enabled,
            settings.music_enabled,
        );

        let node = Node {
            config,
            settings,
            settings_path,
            session,
            connections: ConnectionManager::new(),
            mixer,
            listener: None,
            net_tx,
            net_rx,
            cmd_rx,
            view_tx,
            notice_tx,
        };
        let handle = NodeHandle {
            commands: cmd_tx,
            view: view_rx,
            notices: notice_rx,
        };
        (node, handle)
    }

    /// Main loop. Returns once a quit command arrives or every command
    /// sender is gone.
    pub async fn run(mut self) {
        let mut ticker = interval(Duration::from_millis(TICK_MS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Node started");

        loop {
            tokio::select! {
                // Handle network events
                Some(event) = self.net_rx.recv() => {
                    self.handle_net_event(event);
                },

                // Handle user commands
                command = self.cmd_rx.recv() => {
                    match command {
                        Some(Command::Quit) | None => {
                            info!("Node shutting down");
                            break;
                        }
                        Some(command) => self.handle_command(command).await,
                    }
                },

                // Advance the simulation
                _ = ticker.tick() => {
                    self.session.tick();
                },
            }

            self.dispatch();
        }

        self.session.leave();
        self.dispatch();
        self.shutdown_network();
    }

    fn handle_net_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::Accepted {
                stream,
                addr,
                permit,
            } => {
                if self.session.role() != Role::Host {
                    debug!("Dropping connection from {}: no longer hosting", addr);
                    return;
                }
                let conn = self
                    .connections
                    .register(stream, addr, Some(permit), self.net_tx.clone());
                self.session.on_peer_connected(conn);
            }
            NetEvent::Dialed { stream, addr } => {
                if self.session.role() != Role::Client
                    || self.session.state() != SessionState::Connecting
                {
                    debug!("Dropping link to {}: no longer joining", addr);
                    return;
                }
                let conn = self
                    .connections
                    .register(stream, addr, None, self.net_tx.clone());
                self.session.on_connected_to_host(conn);
            }
            NetEvent::DialFailed { addr, error } => {
                error!("Could not connect to {}: {}", addr, error);
                if self.session.role() == Role::Client {
                    self.session.end_session();
                }
            }
            NetEvent::Line { conn, message } => {
                if self.connections.contains(conn) {
                    self.session.handle_message(conn, message);
                }
            }
            NetEvent::Closed { conn } => {
                if self.connections.remove(conn) {
                    self.session.on_peer_disconnected(conn);
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        debug!("Command {:?}", command);
        match command {
            Command::Start => {
                self.session.start_game();
            }
            Command::Stop => {
                self.session.stop_game();
            }
            Command::Pause => {
                self.session.pause();
            }
            Command::Resume => {
                self.session.resume();
            }
            Command::Rotate(rotation) => self.session.rotate(rotation),
            Command::Thrust(on) => self.session.thrust(on),
            Command::Fire => {
                self.session.fire();
            }
            Command::Host => {
                if let Err(e) = self.host().await {
                    error!("Could not listen on {}: {}", self.config.listen_addr(), e);
                }
            }
            Command::Join(address) => self.join(address),
            Command::Leave => self.session.leave(),
            Command::ToggleSound => {
                self.settings.sound_enabled = self.mixer.toggle_sound();
                info!("Sound {}", on_off(self.settings.sound_enabled));
                self.save_settings();
            }
            Command::ToggleMusic => {
                let running = self.session.simulation().is_started()
                    && !self.session.simulation().level().is_game_over();
                self.settings.music_enabled = self.mixer.toggle_music(running);
                info!("Music {}", on_off(self.settings.music_enabled));
                self.save_settings();
            }
            Command::Status => info!("{}", self.session.view().summary()),
            Command::Quit => {}
        }
    }

    /// Starts listening for players. A session already in progress is left
    /// first.
    async fn host(&mut self) -> io::Result<SocketAddr> {
        self.session.leave();
        self.dispatch();

        let listener = TcpListener::bind(self.config.listen_addr()).await?;
        let addr = listener.local_addr()?;

        let capacity = Arc::new(Semaphore::new(MAX_PLAYERS - 1));
        self.listener = Some(tokio::spawn(accept_loop(
            listener,
            capacity,
            self.net_tx.clone(),
        )));
        self.session.begin_hosting(addr.to_string());
        Ok(addr)
    }

    fn join(&mut self, address: Option<String>) {
        let Some(address) = address.or_else(|| self.settings.last_address.clone()) else {
            warn!("No host address to join");
            return;
        };

        self.session.leave();
        self.dispatch();

        let target = self.config.dial_addr(&address);
        info!("Connecting to {}", target);
        self.session.begin_joining();

        if self.settings.last_address.as_deref() != Some(address.as_str()) {
            self.settings.last_address = Some(address);
            self.save_settings();
        }

        let events = self.net_tx.clone();
        tokio::spawn(async move {
            let event = match TcpStream::connect(&target).await {
                Ok(stream) => match stream.peer_addr() {
                    Ok(addr) => NetEvent::Dialed { stream, addr },
                    Err(error) => NetEvent::DialFailed {
                        addr: target,
                        error,
                    },
                },
                Err(error) => NetEvent::DialFailed {
                    addr: target,
                    error,
                },
            };
            if events.send(event).is_err() {
                debug!("Node gone before dial finished");
            }
        });
    }

    /// Carries out what the session queued, then publishes the new view.
    fn dispatch(&mut self) {
        loop {
            let outbound = self.session.drain_outbound();
            if outbound.is_empty() {
                break;
            }
            for work in outbound {
                match work {
                    Outbound::Send { conn, message } => {
                        self.connections.send(conn, &message);
                    }
                    Outbound::Broadcast { message, exclude } => {
                        self.connections.broadcast(&message, exclude);
                    }
                    Outbound::Close { conn } => {
                        if self.connections.remove(conn) {
                            self.session.on_peer_disconnected(conn);
                        }
                    }
                    Outbound::Shutdown => self.shutdown_network(),
                }
            }
        }

        for cue in self.session.drain_cues() {
            self.mixer.apply(cue);
        }

        for notice in self.session.drain_notices() {
            info!("{:?}", notice);
            if self.notice_tx.send(notice).is_err() {
                debug!("Nobody is listening for notices");
            }
        }

        self.view_tx.send_replace(self.session.view());
    }

    fn shutdown_network(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            info!("Stopped listening");
        }
        self.connections.close_all();
    }

    fn save_settings(&self) {
        let Some(path) = &self.settings_path else {
            return;
        };
        if let Err(e) = self.settings.save(path) {
            warn!("Could not save settings to {}: {}", path.display(), e);
        }
    }
}

/// Accepts players while a capacity permit is free. With every permit taken
/// the loop parks until a connection closes and returns its permit.
async fn accept_loop(
    listener: TcpListener,
    capacity: Arc<Semaphore>,
    events: mpsc::UnboundedSender<NetEvent>,
) {
    loop {
        let permit = match Arc::clone(&capacity).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("Accepted connection from {}", addr);
                if events
                    .send(NetEvent::Accepted {
                        stream,
                        addr,
                        permit,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
