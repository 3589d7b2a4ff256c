// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The interactive line-command driver.

use std::io::{self, BufRead, Write};
use std::str::FromStr;

use tracing::debug;

use crate::sounds::{LoadError, RangeError};
use crate::system::SoundSystem;

/// How far `+` and `-` move the volume.
const VOLUME_STEP: i32 = 5;

const HELP: &str = "\
play <file>:   play the specified file a single time
loop <file>:   loop the specified file
stop <file>:   stop every instance of the specified sound
stopall:       stop all sounds
volume <n>:    set the volume (0-127)
+:             increase volume
-:             decrease volume
pause:         pause output
resume:        resume output
status:        show the engine state
help:          display this help menu
quit:          safely quit the program
";

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("unrecognized command: {0}")]
    UnknownCommand(String),

    #[error("invalid volume: {0}")]
    InvalidVolume(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A parsed shell command. Commands that take a sound name carry `None` when
/// it was left off; the shell then prompts for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play(Option<String>),
    Loop(Option<String>),
    Stop(Option<String>),
    StopAll,
    Volume(i32),
    VolumeUp,
    VolumeDown,
    Pause,
    Resume,
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = ShellError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let argument = (!rest.is_empty()).then(|| rest.to_string());

        match word {
            "play" => Ok(Command::Play(argument)),
            "loop" => Ok(Command::Loop(argument)),
            "stop" => Ok(Command::Stop(argument)),
            "stopall" => Ok(Command::StopAll),
            "volume" => rest
                .parse::<i32>()
                .map(Command::Volume)
                .map_err(|_| ShellError::InvalidVolume(rest.to_string())),
            "+" => Ok(Command::VolumeUp),
            "-" => Ok(Command::VolumeDown),
            "pause" => Ok(Command::Pause),
            "resume" => Ok(Command::Resume),
            "status" => Ok(Command::Status),
            "help" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            _ => Err(ShellError::UnknownCommand(line.to_string())),
        }
    }
}

/// Runs commands against a sound system until `quit` or end of input.
pub struct Shell<'a, R, W> {
    system: &'a SoundSystem,
    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> Shell<'a, R, W> {
    pub fn new(system: &'a SoundSystem, input: R, output: W) -> Self {
        Shell {
            system,
            input,
            output,
        }
    }

    /// Runs the read-eval loop. Command errors are printed and the loop goes
    /// on; only I/O errors end it early.
    pub fn run(&mut self) -> Result<(), io::Error> {
        writeln!(self.output, "Audio test (enter 'help' for options)\n")?;
        loop {
            let Some(line) = self.prompt("> ")? else {
                return Ok(());
            };
            if line.trim().is_empty() {
                continue;
            }

            let result = line
                .parse::<Command>()
                .and_then(|command| self.execute(command));
            match result {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(ShellError::Io(e)) => return Err(e),
                Err(e) => writeln!(self.output, "{}", e)?,
            }
        }
    }

    /// Writes `text` and reads one line. Returns `None` at end of input.
    fn prompt(&mut self, text: &str) -> Result<Option<String>, io::Error> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Uses `name` or asks for it.
    fn sound_name(&mut self, name: Option<String>) -> Result<Option<String>, ShellError> {
        match name {
            Some(name) => Ok(Some(name)),
            None => Ok(self.prompt("file: ")?),
        }
    }

    fn play(&mut self, name: Option<String>, looping: bool) -> Result<bool, ShellError> {
        let Some(name) = self.sound_name(name)? else {
            return Ok(false);
        };
        match self.system.engine().play(&name, looping)? {
            Some(cursor) => writeln!(self.output, "playing {} ({})", name, cursor.id())?,
            None => writeln!(self.output, "audio is disabled")?,
        }
        Ok(true)
    }

    /// Executes one command. Returns false when the shell should exit.
    fn execute(&mut self, command: Command) -> Result<bool, ShellError> {
        debug!(command = ?command, "Shell command");
        let system = self.system;
        let engine = system.engine();
        match command {
            Command::Play(name) => return self.play(name, false),
            Command::Loop(name) => return self.play(name, true),
            Command::Stop(name) => {
                let Some(name) = self.sound_name(name)? else {
                    return Ok(false);
                };
                engine.stop_by_name(&name)?;
            }
            Command::StopAll => engine.stop_all(),
            Command::Volume(volume) => {
                engine.set_volume(volume)?;
                writeln!(self.output, "volume: {}", volume)?;
            }
            Command::VolumeUp => {
                let volume = engine.adjust_volume(VOLUME_STEP);
                writeln!(self.output, "volume: {}", volume)?;
            }
            Command::VolumeDown => {
                let volume = engine.adjust_volume(-VOLUME_STEP);
                writeln!(self.output, "volume: {}", volume)?;
            }
            Command::Pause => system.pause(true),
            Command::Resume => system.pause(false),
            Command::Status => {
                let device = system
                    .device()
                    .map(|device| device.to_string())
                    .unwrap_or_else(|| "none".to_string());
                writeln!(
                    self.output,
                    "device: {}\nformat: {}\naudio: {}\npaused: {}\nvolume: {}\nplaying: {}\nloaded: {}",
                    device,
                    engine.target_format(),
                    if engine.is_usable() { "enabled" } else { "disabled" },
                    system.is_paused(),
                    engine.volume(),
                    engine.active_count(),
                    engine.loaded_count(),
                )?;
            }
            Command::Help => write!(self.output, "{}", HELP)?,
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::config;
    use crate::testutil::MemoryDecoder;

    fn system() -> SoundSystem {
        let config = config::Audio::new("mock-shell");
        let decoder = MemoryDecoder::new();
        let spec = config.target_format().unwrap().spec().unwrap();
        decoder.insert("ding.wav", spec, vec![1; 4 * 44100]);
        SoundSystem::with_decoder(&config, Box::new(decoder)).unwrap()
    }

    fn run(system: &SoundSystem, input: &str) -> String {
        let mut output = Vec::new();
        Shell::new(system, Cursor::new(input.as_bytes()), &mut output)
            .run()
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "play ding.wav".parse::<Command>().unwrap(),
            Command::Play(Some("ding.wav".to_string()))
        );
        assert_eq!(
            "loop  my sound.wav ".parse::<Command>().unwrap(),
            Command::Loop(Some("my sound.wav".to_string()))
        );
        assert_eq!("stop".parse::<Command>().unwrap(), Command::Stop(None));
        assert_eq!("volume 12".parse::<Command>().unwrap(), Command::Volume(12));
        assert_eq!("+".parse::<Command>().unwrap(), Command::VolumeUp);
        assert_eq!("exit".parse::<Command>().unwrap(), Command::Quit);
        assert!(matches!(
            "volume loud".parse::<Command>(),
            Err(ShellError::InvalidVolume(_))
        ));
        assert!(matches!(
            "dance".parse::<Command>(),
            Err(ShellError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_volume_commands() {
        let system = system();
        let output = run(&system, "volume 120\n+\n+\nvolume 128\n-\nquit\n");

        assert!(output.contains("volume: 120"));
        assert!(output.contains("volume: 125"));
        assert!(output.contains("volume: 127"));
        assert!(output.contains("Volume 128 out of range [0, 128)"));
        assert!(output.contains("volume: 122"));
        assert_eq!(system.engine().volume(), 122);
    }

    #[test]
    fn test_play_prompts_for_file() {
        let system = system();
        let output = run(&system, "loop\nding.wav\nplay missing.wav\nstatus\n");

        assert!(output.contains("file: "));
        assert!(output.contains("playing ding.wav"));
        assert!(output.contains("Unable to load sound file missing.wav"));
        assert!(output.contains("playing: 1"));
        assert!(output.contains("audio: enabled"));
    }

    #[test]
    fn test_stop_and_unknown() {
        let system = system();
        let output = run(&system, "loop ding.wav\nstop ding.wav\nfoo\nhelp\n");

        assert!(output.contains("unrecognized command: foo"));
        assert!(output.contains("stopall:"));
        assert!(system
            .engine()
            .play("ding.wav", false)
            .unwrap()
            .is_some());
    }
}
