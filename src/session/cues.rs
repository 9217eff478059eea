//! Audible success and failure cues.

use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use tracing::debug;

use crate::config::CueConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Success,
    Failure,
}

pub trait CuePlayer {
    /// Starts the cue and returns without waiting for it to finish.
    fn play(&self, cue: Cue);
}

/// Plays sound files through an external player, or rings the terminal bell.
pub struct SoundCues {
    config: CueConfig,
    /// Player processes not yet reaped
    playing: Mutex<Vec<Child>>,
}

impl SoundCues {
    pub fn new(config: CueConfig) -> Self {
        Self {
            config,
            playing: Mutex::new(Vec::new()),
        }
    }

    /// Collects players that have exited; returns how many are still running.
    fn reap(&self) -> usize {
        let mut playing = self.playing.lock().unwrap_or_else(|e| e.into_inner());
        playing.retain_mut(|child| matches!(child.try_wait(), Ok(None)));
        playing.len()
    }

    fn asset(&self, cue: Cue) -> &Path {
        match cue {
            Cue::Success => &self.config.success_sound,
            Cue::Failure => &self.config.failure_sound,
        }
    }
}

impl CuePlayer for SoundCues {
    fn play(&self, cue: Cue) {
        if !self.config.enabled {
            return;
        }
        self.reap();

        let asset = self.asset(cue);
        if !asset.exists() {
            debug!(path = %asset.display(), "cue sound missing, using bell");
            ring_bell(cue);
            return;
        }

        let spawned = Command::new(&self.config.player)
            .arg(asset)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => self.playing.lock().unwrap_or_else(|e| e.into_inner()).push(child),
            Err(e) => {
                debug!(player = %self.config.player, error = %e, "cue player failed, using bell");
                ring_bell(cue);
            }
        }
    }
}

impl Drop for SoundCues {
    fn drop(&mut self) {
        let playing = self.playing.get_mut().unwrap_or_else(|e| e.into_inner());
        for mut child in playing.drain(..) {
            let _ = child.wait();
        }
    }
}

/// One bell for success, two for failure.
fn ring_bell(cue: Cue) {
    let bells = match cue {
        Cue::Success => "\x07",
        Cue::Failure => "\x07\x07",
    };
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(bells.as_bytes());
    let _ = stdout.flush();
}

pub struct SilentCues;

impl CuePlayer for SilentCues {
    fn play(&self, _cue: Cue) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    #[cfg(unix)]
    #[test]
    fn test_finished_players_are_reaped() {
        let dir = tempdir().unwrap();
        let success = dir.path().join("success.wav");
        let failure = dir.path().join("failure.wav");
        std::fs::write(&success, b"").unwrap();
        std::fs::write(&failure, b"").unwrap();
        let cues = SoundCues::new(CueConfig {
            enabled: true,
            player: "true".to_string(),
            success_sound: success,
            failure_sound: failure,
        });

        cues.play(Cue::Success);
        cues.play(Cue::Failure);

        let deadline = Instant::now() + Duration::from_secs(5);
        while cues.reap() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(cues.reap(), 0);
    }

    #[test]
    fn test_disabled_cues_spawn_nothing() {
        let cues = SoundCues::new(CueConfig {
            enabled: false,
            ..CueConfig::default()
        });
        cues.play(Cue::Success);
        assert_eq!(cues.reap(), 0);
    }
}
