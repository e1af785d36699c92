/// Simulated milliseconds the level banner shows before the field is populated.
pub const NEW_LEVEL_WAIT_MS: u64 = 3000;
/// Delay between the last ship going down and the game-over banner.
pub const BEFORE_GAME_OVER_WAIT_MS: u64 = 3000;
/// How long the game-over banner stays up.
pub const GAME_OVER_WAIT_MS: u64 = 6000;
/// Local score above which game over plays the high score tune.
pub const HIGH_SCORE_MUSIC_THRESHOLD: u32 = 5000;

pub const GAME_OVER_LEVEL: i32 = -1;

/// Current level number and whether its banner should be on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    current: i32,
    show_text: bool,
}

impl Default for Level {
    fn default() -> Self {
        Self {
            current: 1,
            show_text: false,
        }
    }
}

impl Level {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn set(&mut self, level: i32) {
        self.current = level;
    }

    pub fn should_show_text(&self) -> bool {
        self.show_text
    }

    pub fn show_text(&mut self) {
        self.show_text = true;
    }

    pub fn hide_text(&mut self) {
        self.show_text = false;
    }

    /// In the pause at the start of a level, before any asteroids appear.
    pub fn is_waiting_to_start_level(&self) -> bool {
        self.show_text && self.current > 0
    }

    pub fn is_game_over(&self) -> bool {
        self.current == GAME_OVER_LEVEL
    }
}
