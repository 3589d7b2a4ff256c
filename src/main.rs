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
use std::error::Error;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sfxmix::audio;
use sfxmix::config;
use sfxmix::shell::Shell;
use sfxmix::system::SoundSystem;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sound effect mixer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Plays a sound file through the audio interface.
    Play {
        /// The sound file to play.
        file: String,
        /// Loop the sound until stdin is closed.
        #[arg(short, long = "loop")]
        looping: bool,
        /// The path to the audio config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The device name to play through. Overrides the config.
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Starts an interactive shell for playing sounds.
    Shell {
        /// The path to the audio config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The device name to play through. Overrides the config.
        #[arg(short, long)]
        device: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play {
            file,
            looping,
            config,
            device,
        } => {
            let config = config::Audio::load(config.as_deref())?.with_device(device);
            let system = SoundSystem::new(&config)?;

            let Some(cursor) = system.engine().play(&file, looping)? else {
                return Err("audio is disabled, unable to play".into());
            };

            if looping {
                println!("Looping {}, close stdin (Ctrl-D) to stop.", file);
                for line in io::stdin().lock().lines() {
                    line?;
                }
                cursor.stop();
            }
            while !cursor.is_finished() {
                thread::sleep(Duration::from_millis(10));
            }
        }
        Commands::Shell { config, device } => {
            let config = config::Audio::load(config.as_deref())?.with_device(device);
            let system = SoundSystem::new(&config)?;

            Shell::new(&system, io::stdin().lock(), io::stdout()).run()?;
        }
    }

    Ok(())
}
