//! Text line protocol spoken between a host and its clients.
//!
//! Every message is a single line of space separated fields. The first field is
//! the message type code:
//!
//! | Code | Message  | Fields                                                          |
//! |------|----------|-----------------------------------------------------------------|
//! | 0    | GAME     | `started paused`                                                |
//! | 1    | LEVEL    | `level` (-1 is game over)                                       |
//! | 2    | ASTEROIDS| `(x y heading speed size)*`, none clears the field              |
//! | 3    | PLAYER   | `C id connected` or `S id x y heading accel destroyed score lives (bx by bheading)*` |
//! | 4    | BULLET   | `id x y heading`                                                |
//! | 5    | WELCOME  | `version id`                                                    |

use crate::asteroid::{Asteroid, AsteroidSize};
use crate::bullet::Bullet;
use crate::entity::Entity;
use crate::ship::Ship;
use crate::MAX_PLAYERS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bumped whenever the line layout changes.
pub const PROTOCOL_VERSION: u32 = 2;

const TYPE_GAME: u8 = 0;
const TYPE_LEVEL: u8 = 1;
const TYPE_ASTEROIDS: u8 = 2;
const TYPE_PLAYER: u8 = 3;
const TYPE_BULLET: u8 = 4;
const TYPE_WELCOME: u8 = 5;

const PLAYER_STATUS_TAG: &str = "C";
const PLAYER_STATE_TAG: &str = "S";

const ASTEROID_FIELDS: usize = 5;
const BULLET_FIELDS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    Empty,
    UnknownType(String),
    UnknownSubtype(String),
    MissingField(&'static str),
    InvalidField { field: &'static str, value: String },
    /// A repeated group ended part way through.
    IncompleteRecord { record: &'static str, fields: usize },
    UnexpectedField(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty line"),
            Self::UnknownType(code) => write!(f, "unknown message type: {code}"),
            Self::UnknownSubtype(tag) => write!(f, "unknown player record tag: {tag}"),
            Self::MissingField(field) => write!(f, "missing field: {field}"),
            Self::InvalidField { field, value } => {
                write!(f, "invalid value for {field}: {value:?}")
            }
            Self::IncompleteRecord { record, fields } => {
                write!(f, "incomplete {record} record: {fields} trailing fields")
            }
            Self::UnexpectedField(value) => write!(f, "unexpected trailing field: {value:?}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsteroidRecord {
    pub x: f32,
    pub y: f32,
    pub heading: i32,
    pub speed: i32,
    pub size: AsteroidSize,
}

impl AsteroidRecord {
    pub fn to_asteroid(&self) -> Asteroid {
        Asteroid::new(self.x, self.y, self.heading, self.speed, self.size)
    }
}

impl From<&Asteroid> for AsteroidRecord {
    fn from(asteroid: &Asteroid) -> Self {
        let (x, y) = asteroid.position();
        Self {
            x,
            y,
            heading: asteroid.heading(),
            speed: asteroid.speed(),
            size: asteroid.size(),
        }
    }
}

/// Position and heading of one bullet inside a ship state record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletPosition {
    pub x: f32,
    pub y: f32,
    pub heading: i32,
}

impl From<&Bullet> for BulletPosition {
    fn from(bullet: &Bullet) -> Self {
        let (x, y) = bullet.position();
        Self {
            x,
            y,
            heading: bullet.heading(),
        }
    }
}

/// Full state of one ship, including its live bullets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipRecord {
    pub player_id: usize,
    pub x: f32,
    pub y: f32,
    pub heading: i32,
    pub accelerating: bool,
    pub destroyed: bool,
    pub score: u32,
    pub lives: u32,
    pub bullets: Vec<BulletPosition>,
}

impl ShipRecord {
    /// Rebuilds the bullets carried by this record, stamped with `now` as
    /// their creation time.
    pub fn to_bullets(&self, now: u64) -> Vec<Bullet> {
        self.bullets
            .iter()
            .map(|b| Bullet::new(self.player_id, b.x, b.y, b.heading, now))
            .collect()
    }
}

impl From<&Ship> for ShipRecord {
    fn from(ship: &Ship) -> Self {
        let (x, y) = ship.position();
        Self {
            player_id: ship.player_id(),
            x,
            y,
            heading: ship.heading(),
            accelerating: ship.is_accelerating(),
            destroyed: ship.is_destroyed(),
            score: ship.score(),
            lives: ship.lives(),
            bullets: ship
                .bullets()
                .iter()
                .filter(|b| !b.is_destroyed())
                .map(BulletPosition::from)
                .collect(),
        }
    }
}

/// A bullet that was just fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletRecord {
    pub player_id: usize,
    pub x: f32,
    pub y: f32,
    pub heading: i32,
}

impl BulletRecord {
    pub fn to_bullet(&self, now: u64) -> Bullet {
        Bullet::new(self.player_id, self.x, self.y, self.heading, now)
    }
}

impl From<&Bullet> for BulletRecord {
    fn from(bullet: &Bullet) -> Self {
        let (x, y) = bullet.position();
        Self {
            player_id: bullet.owner(),
            x,
            y,
            heading: bullet.heading(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Game { started: bool, paused: bool },
    Level { level: i32 },
    /// Complete asteroid field. An empty list clears the field.
    Asteroids(Vec<AsteroidRecord>),
    PlayerStatus { player_id: usize, connected: bool },
    PlayerState(ShipRecord),
    Bullet(BulletRecord),
    Welcome { version: u32, player_id: usize },
}

impl Message {
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parses one line, with or without its trailing newline.
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let mut fields = Fields::new(line);
        let code = fields.next_token("type")?;

        let message = match code.parse::<u8>() {
            Ok(TYPE_GAME) => Message::Game {
                started: fields.parse("started")?,
                paused: fields.parse("paused")?,
            },
            Ok(TYPE_LEVEL) => Message::Level {
                level: fields.parse("level")?,
            },
            Ok(TYPE_ASTEROIDS) => {
                fields.expect_groups("asteroid", ASTEROID_FIELDS)?;
                let mut asteroids = Vec::new();
                while !fields.is_empty() {
                    asteroids.push(AsteroidRecord {
                        x: fields.coordinate("asteroid x")?,
                        y: fields.coordinate("asteroid y")?,
                        heading: fields.parse("asteroid heading")?,
                        speed: fields.parse("asteroid speed")?,
                        size: fields.parse("asteroid size")?,
                    });
                }
                Message::Asteroids(asteroids)
            }
            Ok(TYPE_PLAYER) => decode_player(&mut fields)?,
            Ok(TYPE_BULLET) => Message::Bullet(BulletRecord {
                player_id: fields.player_id()?,
                x: fields.coordinate("x")?,
                y: fields.coordinate("y")?,
                heading: fields.parse("heading")?,
            }),
            Ok(TYPE_WELCOME) => Message::Welcome {
                version: fields.parse("version")?,
                player_id: fields.player_id()?,
            },
            _ => return Err(ProtocolError::UnknownType(code.to_string())),
        };

        fields.finish()?;
        Ok(message)
    }

    /// Short name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Game { .. } => "GAME",
            Message::Level { .. } => "LEVEL",
            Message::Asteroids(_) => "ASTEROIDS",
            Message::PlayerStatus { .. } | Message::PlayerState(_) => "PLAYER",
            Message::Bullet(_) => "BULLET",
            Message::Welcome { .. } => "WELCOME",
        }
    }
}

fn decode_player(fields: &mut Fields<'_>) -> Result<Message, ProtocolError> {
    let tag = fields.next_token("player record tag")?;

    match tag {
        PLAYER_STATUS_TAG => Ok(Message::PlayerStatus {
            player_id: fields.player_id()?,
            connected: fields.parse("connected")?,
        }),
        PLAYER_STATE_TAG => {
            let player_id = fields.player_id()?;
            let x = fields.coordinate("x")?;
            let y = fields.coordinate("y")?;
            let heading = fields.parse("heading")?;
            let accelerating = fields.parse("accelerating")?;
            let destroyed = fields.parse("destroyed")?;
            let score = fields.parse("score")?;
            let lives = fields.parse("lives")?;

            fields.expect_groups("bullet", BULLET_FIELDS)?;
            let mut bullets = Vec::new();
            while !fields.is_empty() {
                bullets.push(BulletPosition {
                    x: fields.coordinate("bullet x")?,
                    y: fields.coordinate("bullet y")?,
                    heading: fields.parse("bullet heading")?,
                });
            }

            Ok(Message::PlayerState(ShipRecord {
                player_id,
                x,
                y,
                heading,
                accelerating,
                destroyed,
                score,
                lives,
                bullets,
            }))
        }
        other => Err(ProtocolError::UnknownSubtype(other.to_string())),
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Game { started, paused } => {
                write!(f, "{TYPE_GAME} {started} {paused}")
            }
            Message::Level { level } => write!(f, "{TYPE_LEVEL} {level}"),
            Message::Asteroids(asteroids) => {
                write!(f, "{TYPE_ASTEROIDS}")?;
                for a in asteroids {
                    write!(f, " {} {} {} {} {}", a.x, a.y, a.heading, a.speed, a.size)?;
                }
                Ok(())
            }
            Message::PlayerStatus {
                player_id,
                connected,
            } => write!(f, "{TYPE_PLAYER} {PLAYER_STATUS_TAG} {player_id} {connected}"),
            Message::PlayerState(ship) => {
                write!(
                    f,
                    "{TYPE_PLAYER} {PLAYER_STATE_TAG} {} {} {} {} {} {} {} {}",
                    ship.player_id,
                    ship.x,
                    ship.y,
                    ship.heading,
                    ship.accelerating,
                    ship.destroyed,
                    ship.score,
                    ship.lives
                )?;
                for b in &ship.bullets {
                    write!(f, " {} {} {}", b.x, b.y, b.heading)?;
                }
                Ok(())
            }
            Message::Bullet(bullet) => write!(
                f,
                "{TYPE_BULLET} {} {} {} {}",
                bullet.player_id, bullet.x, bullet.y, bullet.heading
            ),
            Message::Welcome { version, player_id } => {
                write!(f, "{TYPE_WELCOME} {version} {player_id}")
            }
        }
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::decode(s)
    }
}

/// Cursor over the whitespace separated fields of one line.
struct Fields<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            tokens: line.split_whitespace().collect(),
            pos: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.tokens.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn next_token(&mut self, field: &'static str) -> Result<&'a str, ProtocolError> {
        let token = match self.tokens.get(self.pos) {
            Some(token) => *token,
            None if self.tokens.is_empty() => return Err(ProtocolError::Empty),
            None => return Err(ProtocolError::MissingField(field)),
        };
        self.pos += 1;
        Ok(token)
    }

    fn parse<T: FromStr>(&mut self, field: &'static str) -> Result<T, ProtocolError> {
        let token = self.next_token(field)?;
        token.parse().map_err(|_| ProtocolError::InvalidField {
            field,
            value: token.to_string(),
        })
    }

    /// A slot index; anything past the last player slot is malformed.
    fn player_id(&mut self) -> Result<usize, ProtocolError> {
        let id: usize = self.parse("player id")?;
        if id >= MAX_PLAYERS {
            return Err(ProtocolError::InvalidField {
                field: "player id",
                value: id.to_string(),
            });
        }
        Ok(id)
    }

    /// A float that must be finite.
    fn coordinate(&mut self, field: &'static str) -> Result<f32, ProtocolError> {
        let value: f32 = self.parse(field)?;
        if !value.is_finite() {
            return Err(ProtocolError::InvalidField {
                field,
                value: value.to_string(),
            });
        }
        Ok(value)
    }

    fn expect_groups(&self, record: &'static str, size: usize) -> Result<(), ProtocolError> {
        let fields = self.remaining() % size;
        if fields != 0 {
            return Err(ProtocolError::IncompleteRecord { record, fields });
        }
        Ok(())
    }

    fn finish(&self) -> Result<(), ProtocolError> {
        match self.tokens.get(self.pos) {
            Some(extra) => Err(ProtocolError::UnexpectedField(extra.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(message: &Message) -> Message {
        Message::decode(&message.encode()).unwrap()
    }

    #[test]
    fn test_game_and_level_lines() {
        let game = Message::Game {
            started: true,
            paused: false,
        };
        assert_eq!(game.encode(), "0 true false");
        assert_eq!(round_trip(&game), game);

        let over = Message::Level { level: -1 };
        assert_eq!(over.encode(), "1 -1");
        assert_eq!(Message::decode("1 -1\n").unwrap(), over);
    }

    #[test]
    fn test_empty_asteroid_snapshot_clears() {
        let empty = Message::Asteroids(Vec::new());
        assert_eq!(empty.encode(), "2");
        assert_eq!(Message::decode("2").unwrap(), empty);
    }

    #[test]
    fn test_asteroid_snapshot() {
        let line = "2 10.5 20 45 3 LARGE 0 767.25 359 8 SMALL";
        let Message::Asteroids(records) = Message::decode(line).unwrap() else {
            panic!("expected an asteroid snapshot");
        };

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].x, 10.5);
        assert_eq!(records[0].size, AsteroidSize::Large);
        assert_eq!(records[1].heading, 359);
        assert_eq!(records[1].speed, 8);
        assert_eq!(records[1].size, AsteroidSize::Small);
        assert_eq!(Message::Asteroids(records).encode(), "2 10.5 20 45 3 LARGE 0 767.25 359 8 SMALL");
    }

    #[test]
    fn test_player_status_uses_subtag() {
        let status = Message::PlayerStatus {
            player_id: 2,
            connected: false,
        };
        assert_eq!(status.encode(), "3 C 2 false");
        assert_eq!(round_trip(&status), status);
    }

    #[test]
    fn test_full_ship_state_round_trip() {
        let record = ShipRecord {
            player_id: 3,
            x: 123.456,
            y: 0.1,
            heading: 271,
            accelerating: true,
            destroyed: false,
            score: 10_520,
            lives: 4,
            bullets: vec![
                BulletPosition {
                    x: 1.0e-3,
                    y: 1023.9,
                    heading: 0,
                },
                BulletPosition {
                    x: 500.0,
                    y: 250.75,
                    heading: 359,
                },
            ],
        };
        let message = Message::PlayerState(record.clone());

        assert!(message.encode().starts_with("3 S 3 "));
        assert_eq!(round_trip(&message), Message::PlayerState(record));
    }

    #[test]
    fn test_ship_record_from_ship() {
        let mut ship = Ship::new(1);
        ship.reset((100.0, 200.0), true);
        ship.spawn(0);
        ship.fire(0);
        ship.add_score(50);

        let record = ShipRecord::from(&ship);
        assert_eq!(record.player_id, 1);
        assert_eq!((record.x, record.y), (100.0, 200.0));
        assert_eq!(record.score, 50);
        assert_eq!(record.lives, ship.lives());
        assert!(!record.destroyed);
        assert_eq!(record.bullets.len(), 1);

        let bullets = record.to_bullets(0);
        assert_eq!(bullets[0].owner(), 1);
        assert_eq!(bullets[0].position(), ship.bullets()[0].position());
    }

    #[test]
    fn test_bullet_and_welcome() {
        let bullet = Message::Bullet(BulletRecord {
            player_id: 1,
            x: 30.5,
            y: -0.0,
            heading: 90,
        });
        assert_eq!(round_trip(&bullet), bullet);

        let welcome = Message::Welcome {
            version: PROTOCOL_VERSION,
            player_id: 1,
        };
        assert_eq!(welcome.encode(), "5 2 1");
        assert_eq!(round_trip(&welcome), welcome);
    }

    #[test]
    fn test_malformed_lines_are_rejected() {
        assert_eq!(Message::decode(""), Err(ProtocolError::Empty));
        assert_eq!(Message::decode("   \n"), Err(ProtocolError::Empty));
        assert!(matches!(
            Message::decode("9 1 2"),
            Err(ProtocolError::UnknownType(_))
        ));
        assert!(matches!(
            Message::decode("hello"),
            Err(ProtocolError::UnknownType(_))
        ));
        assert!(matches!(
            Message::decode("3 X 1 true"),
            Err(ProtocolError::UnknownSubtype(_))
        ));
        assert_eq!(
            Message::decode("0 true"),
            Err(ProtocolError::MissingField("paused"))
        );
        assert!(matches!(
            Message::decode("0 yes no"),
            Err(ProtocolError::InvalidField { field: "started", .. })
        ));
        assert!(matches!(
            Message::decode("2 1 2 3 4"),
            Err(ProtocolError::IncompleteRecord { fields: 4, .. })
        ));
        assert!(matches!(
            Message::decode("2 1 2 3 4 HUGE"),
            Err(ProtocolError::InvalidField { field: "asteroid size", .. })
        ));
        assert!(matches!(
            Message::decode("4 1 NaN 2 3"),
            Err(ProtocolError::InvalidField { field: "x", .. })
        ));
        assert!(matches!(
            Message::decode("1 3 4"),
            Err(ProtocolError::UnexpectedField(_))
        ));
        assert!(matches!(
            Message::decode("3 S 1 2 3 4 true false 10 2 5 6"),
            Err(ProtocolError::IncompleteRecord { record: "bullet", fields: 2 })
        ));
    }

    #[test]
    fn test_player_ids_past_last_slot_are_rejected() {
        let huge = format!("3 C {} true", usize::MAX);
        for line in [
            huge.as_str(),
            "3 C 4000000000 true",
            "3 C 4 true",
            "3 S 7 1 2 0 false false 0 3",
            "4 4 1 2 0",
            "5 2 9",
        ] {
            assert!(
                matches!(
                    Message::decode(line),
                    Err(ProtocolError::InvalidField { field: "player id", .. })
                ),
                "accepted {:?}",
                line
            );
        }
        assert!(Message::decode("3 C 3 true").is_ok());
        assert!(Message::decode("5 2 0").is_ok());
    }
}
