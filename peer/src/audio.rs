//! Audio cue dispatch.
//!
//! The simulation only emits [`CueCommand`]s. A [`Mixer`] owns the table of
//! cues that are currently playing, applies the sound and music preferences and
//! forwards the work to an [`AudioBackend`]. Playback itself lives outside this
//! crate; [`LogBackend`] stands in for it in the headless peer.

use log::debug;
use serde::Serialize;
use shared::AsteroidSize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Cue {
    MusicGame,
    MusicDeath,
    MusicHighscore,
    Thrust,
    Shoot,
    Spawn,
    ExplodePlayer,
    ExplodeLarge,
    ExplodeMedium,
    ExplodeSmall,
    ExtraLife,
}

impl Cue {
    pub const ALL: [Cue; 11] = [
        Cue::MusicGame,
        Cue::MusicDeath,
        Cue::MusicHighscore,
        Cue::Thrust,
        Cue::Shoot,
        Cue::Spawn,
        Cue::ExplodePlayer,
        Cue::ExplodeLarge,
        Cue::ExplodeMedium,
        Cue::ExplodeSmall,
        Cue::ExtraLife,
    ];

    pub fn asset(self) -> &'static str {
        match self {
            Cue::MusicGame => "snd/comet.mid",
            Cue::MusicDeath => "snd/comet1.mid",
            Cue::MusicHighscore => "snd/comet2.mid",
            Cue::Thrust => "snd/thrust.wav",
            Cue::Shoot => "snd/shoot.wav",
            Cue::Spawn => "snd/spawn.wav",
            Cue::ExplodePlayer => "snd/explode_player.wav",
            Cue::ExplodeLarge => "snd/explode_large.wav",
            Cue::ExplodeMedium => "snd/explode_medium.wav",
            Cue::ExplodeSmall => "snd/explode_small.wav",
            Cue::ExtraLife => "snd/extra_life.wav",
        }
    }

    pub fn is_music(self) -> bool {
        self.asset().ends_with(".mid")
    }

    pub fn explosion(size: AsteroidSize) -> Cue {
        match size {
            AsteroidSize::Large => Cue::ExplodeLarge,
            AsteroidSize::Medium => Cue::ExplodeMedium,
            AsteroidSize::Small => Cue::ExplodeSmall,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CueCommand {
    Play(Cue),
    Loop(Cue),
    Stop(Cue),
}

/// Something that can actually make noise.
pub trait AudioBackend {
    type Handle;

    fn start(&mut self, asset: &'static str, looped: bool) -> Self::Handle;

    fn stop(&mut self, handle: Self::Handle);
}

/// Backend that only logs what would have been played.
#[derive(Debug, Default)]
pub struct LogBackend {
    next_handle: u64,
}

impl AudioBackend for LogBackend {
    type Handle = u64;

    fn start(&mut self, asset: &'static str, looped: bool) -> u64 {
        self.next_handle += 1;
        debug!(
            "audio: start {} ({}) as #{}",
            asset,
            if looped { "loop" } else { "once" },
            self.next_handle
        );
        self.next_handle
    }

    fn stop(&mut self, handle: u64) {
        debug!("audio: stop #{}", handle);
    }
}

pub struct Mixer<B: AudioBackend> {
    backend: B,
    active: HashMap<Cue, B::Handle>,
    sound_enabled: bool,
    music_enabled: bool,
}

impl<B: AudioBackend> Mixer<B> {
    pub fn new(backend: B, sound_enabled: bool, music_enabled: bool) -> Self {
        Self {
            backend,
            active: HashMap::new(),
            sound_enabled,
            music_enabled,
        }
    }

    pub fn apply(&mut self, command: CueCommand) {
        match command {
            CueCommand::Play(cue) => self.start(cue, false),
            CueCommand::Loop(cue) => self.start(cue, true),
            CueCommand::Stop(cue) => self.stop(cue),
        }
    }

    fn start(&mut self, cue: Cue, looped: bool) {
        if !self.is_enabled(cue) {
            return;
        }
        // Only one piece of music plays at a time.
        if cue.is_music() {
            self.stop_class(true);
        }
        if let Some(handle) = self.active.remove(&cue) {
            self.backend.stop(handle);
        }
        let handle = self.backend.start(cue.asset(), looped);
        self.active.insert(cue, handle);
    }

    pub fn stop(&mut self, cue: Cue) {
        if let Some(handle) = self.active.remove(&cue) {
            self.backend.stop(handle);
        }
    }

    /// Stops every active music cue if `music`, otherwise every sound effect.
    pub fn stop_class(&mut self, music: bool) {
        let cues: Vec<Cue> = self
            .active
            .keys()
            .copied()
            .filter(|cue| cue.is_music() == music)
            .collect();
        for cue in cues {
            self.stop(cue);
        }
    }

    pub fn is_enabled(&self, cue: Cue) -> bool {
        if cue.is_music() {
            self.music_enabled
        } else {
            self.sound_enabled
        }
    }

    pub fn is_active(&self, cue: Cue) -> bool {
        self.active.contains_key(&cue)
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled
    }

    pub fn music_enabled(&self) -> bool {
        self.music_enabled
    }

    /// Flips the sound effects preference and returns the new value.
    pub fn toggle_sound(&mut self) -> bool {
        self.sound_enabled = !self.sound_enabled;
        if !self.sound_enabled {
            self.stop_class(false);
        }
        self.sound_enabled
    }

    /// Flips the music preference and returns the new value. Game music starts
    /// again straight away if a game is running.
    pub fn toggle_music(&mut self, game_running: bool) -> bool {
        self.music_enabled = !self.music_enabled;
        if !self.music_enabled {
            self.stop_class(true);
        } else if game_running {
            self.start(Cue::MusicGame, true);
        }
        self.music_enabled
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
