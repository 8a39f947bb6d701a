use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use dualdeck::audio::engine::{list_audio_devices, start_output};
use dualdeck::{
    Config, ControlEvent, Controller, DeckId, Decks, FileMailbox, LogDisplay, Reply, SpeedMode,
    SymphoniaSource, TrackRef, TransportPoller,
};

/// Two-deck DJ player driven from the terminal.
///
/// Reads commands from stdin: `<deck> play|stop|load <path>|gain <0-1>|
/// speed <ratio>|pos <0-1>|loop on|off`, `status`, `quit`.
#[derive(Parser, Debug)]
#[command(name = "dualdeck")]
#[command(about = "Two-deck DJ player")]
struct Args {
    /// Config file (default: ~/.config/dualdeck/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output device name (substring match)
    #[arg(long)]
    device: Option<String>,

    /// Playlist mailbox file
    #[arg(long)]
    mailbox: Option<PathBuf>,

    /// Do not poll the playlist mailbox
    #[arg(long)]
    no_mailbox: bool,

    /// Track to load on deck 1 at startup
    #[arg(long)]
    deck1: Option<String>,

    /// Track to load on deck 2 at startup
    #[arg(long)]
    deck2: Option<String>,

    /// Loop deck 1 at the end of the track
    #[arg(long)]
    loop1: bool,

    /// Loop deck 2 at the end of the track
    #[arg(long)]
    loop2: bool,

    /// Change tempo without changing pitch
    #[arg(long)]
    key_lock: bool,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_devices {
        for device in list_audio_devices() {
            println!(
                "{}{} ({} channels)",
                device.name,
                if device.is_default { " [default]" } else { "" },
                device.max_channels
            );
        }
        return Ok(());
    }

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading config {:?}", config_path))?;
    if let Some(device) = &args.device {
        config.audio.device_name = device.clone();
    }
    if let Some(mailbox) = &args.mailbox {
        config.playlist.mailbox_path = mailbox.clone();
    }
    if args.no_mailbox {
        config.playlist.enabled = false;
    }
    if args.key_lock {
        config.decks.speed_mode = SpeedMode::KeyLock;
    }

    let decks = Decks::new(
        Arc::new(SymphoniaSource),
        config.decks.player_options(),
        |id| Box::new(LogDisplay::new(id)),
    );

    for (id, track, looping) in [
        (DeckId::One, &args.deck1, args.loop1),
        (DeckId::Two, &args.deck2, args.loop2),
    ] {
        let deck = decks.get(id);
        deck.set_looping(looping);
        if let Some(track) = track {
            // Failure is logged and leaves the deck empty
            let _ = deck.load(TrackRef::parse(track));
        }
    }

    let output = start_output(decks.mixer(), &config.audio).context("starting audio output")?;
    let spec = output.spec();
    log::info!(
        "Output: {} Hz, {} channels, {} frame blocks",
        spec.sample_rate,
        spec.channels,
        spec.block_size
    );

    let mut poller = TransportPoller::new(decks.clone());
    if config.playlist.enabled {
        log::info!("Watching playlist mailbox {:?}", config.playlist.mailbox_path);
        poller = poller.with_mailbox(Box::new(FileMailbox::new(&config.playlist.mailbox_path)));
    }
    let poller = poller
        .spawn(config.decks.poll_interval())
        .context("spawning transport poller")?;

    let controller = Controller::new(decks);
    let result = run_console(&controller);

    poller.stop();
    output.stop();
    result
}

/// Read control lines from stdin until `quit` or end of input.
fn run_console(controller: &Controller) -> Result<()> {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let event: ControlEvent = match line.parse() {
            Ok(event) => event,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match controller.dispatch(event) {
            Ok(Reply::Done) => {}
            Ok(Reply::Status(decks)) => {
                for deck in decks {
                    println!("{deck}");
                }
            }
            Ok(Reply::Quit) => break,
            Err(e) => eprintln!("load failed: {e}"),
        }
    }
    Ok(())
}
