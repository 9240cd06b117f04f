use std::{
    error::Error,
    path::{Path, PathBuf},
    process,
    sync::Arc,
    time::Duration,
};

use clap::{command, Parser, ValueHint};
use log::{debug, error, info, warn, LevelFilter};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
    time::MissedTickBehavior,
};
use url::Url;

use tunetube::{
    adapter::{Adapter, WidgetState},
    api,
    catalog::{self, Catalog, Page},
    command::{Command, Target},
    config::Config,
    error::{self as tunetube_error, ErrorKind},
    history::Recorder,
    media_session::{self, Bridge, LogSession},
    player::Player,
    signal,
    store::FileStore,
    token::Token,
    track::Track,
    util::format_duration,
};

#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// `-q` and `-v` exclude each other.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Number of results to ask for per search.
const SEARCH_RESULTS: usize = 20;

/// How long to let queued history requests finish when shutting down.
const HISTORY_FLUSH_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Debug, PartialEq, Eq, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Secrets file
    ///
    /// TOML file with the `token` to authenticate with the backend. Without
    /// one, history is recorded anonymously, which the backend may refuse.
    /// Keep this file private.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value = "secrets.toml")]
    secrets_file: PathBuf,

    /// Base URL of the tunetube backend
    #[arg(long, value_name = "URL", value_hint = ValueHint::Url, env = "TUNETUBE_API_URL", default_value = Config::DEFAULT_API_URL)]
    api_url: Url,

    /// File to keep the current track and queue in between runs
    ///
    /// [default: tunetube/state.json in the user data directory]
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    state_file: Option<PathBuf>,

    /// Path to the mpv executable
    #[arg(long, value_name = "PATH", value_hint = ValueHint::ExecutablePath, default_value = "mpv")]
    mpv: PathBuf,

    /// Only log warnings and errors
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Log more; twice for everything
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

/// Sets up `env_logger`.
///
/// `-q` and `-v` win over `RUST_LOG`, which wins over the `info` default.
/// The flags only change what tunetube itself logs; dependencies stay at
/// whatever `RUST_LOG` or the default says.
///
/// # Panics
///
/// Panics if a logger was set up before.
fn init_logger(args: &Args) {
    let env = env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info");
    let mut logger = env_logger::Builder::from_env(env);

    let level = match (args.quiet, args.verbose) {
        (true, _) => Some(LevelFilter::Warn),
        (false, 0) => None,
        (false, 1) => Some(LevelFilter::Debug),
        (false, _) => Some(LevelFilter::Trace),
    };
    if let Some(level) = level {
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Loads the backend token, if there is a secrets file.
///
/// # Errors
///
/// Returns an error if the secrets file exists but cannot be used.
fn load_token(secrets_file: &Path) -> tunetube_error::Result<Option<Token>> {
    match Token::from_file(secrets_file) {
        Ok(token) => Ok(Some(token)),
        Err(e) if e.kind == ErrorKind::NotFound => {
            info!(
                "no token in {}; recording history anonymously",
                secrets_file.display()
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Results of lookups that run in the background.
#[derive(Debug)]
enum Reply {
    Search {
        query: String,
        /// Continues the previous results rather than replacing them.
        more: bool,
        result: tunetube_error::Result<Page>,
    },
    Video {
        video_id: String,
        enqueue: bool,
        track: Option<Track>,
    },
    Refresh {
        video_id: String,
        track: Option<Track>,
    },
}

/// Everything the main loop acts on.
struct Session {
    player: Player,
    bridge: Bridge,
    catalog: Arc<api::Client>,
    replies: mpsc::UnboundedSender<Reply>,
    results: Vec<Track>,
    /// Last search, with where its next page starts.
    last_search: Option<(String, Option<String>)>,
}

impl Session {
    fn execute(&mut self, command: Command) {
        debug!("executing {command:?}");

        match command {
            Command::Search(query) => self.search(query, None),
            Command::More => self.more(),
            Command::Play(None) => self.player.play(),
            Command::Play(Some(target)) => self.target(target, false),
            Command::Add(target) => self.target(target, true),
            Command::Pause => self.player.pause(),
            Command::Toggle => self.player.toggle_play_pause(),
            Command::Next => self.player.play_next(),
            Command::Previous => self.player.play_previous(),
            Command::Seek(seconds) => self.player.seek_to(seconds),
            Command::Volume(volume) => self.player.set_volume(volume),
            Command::Quality(quality) => self.player.set_quality(quality),
            Command::Remove(index) => {
                if index >= self.player.queue().len() {
                    println!("the queue has {} tracks", self.player.queue().len());
                }
                self.player.remove_from_queue(index);
            }
            Command::Clear => self.player.clear_queue(),
            Command::Queue => self.print_queue(),
            Command::Status => self.print_status(),
            Command::Help => println!("{}", Command::USAGE),
            // Handled by the main loop.
            Command::Quit => {}
        }
    }

    fn search(&self, query: String, page_token: Option<String>) {
        let catalog = Arc::clone(&self.catalog);
        let replies = self.replies.clone();

        tokio::spawn(async move {
            let more = page_token.is_some();
            let result = catalog
                .search(&query, SEARCH_RESULTS, page_token.as_deref())
                .await;
            let _ = replies.send(Reply::Search {
                query,
                more,
                result,
            });
        });
    }

    fn more(&self) {
        match &self.last_search {
            Some((query, Some(page_token))) => {
                self.search(query.clone(), Some(page_token.clone()));
            }
            Some((query, None)) => println!("no more results for \"{query}\""),
            None => println!("search for something first"),
        }
    }

    fn continues(&self, query: &str) -> bool {
        self.last_search
            .as_ref()
            .is_some_and(|(last, _)| last == query)
    }

    fn target(&mut self, target: Target, enqueue: bool) {
        match target {
            Target::Result(number) => {
                let Some(track) = self.results.get(number - 1).cloned() else {
                    println!("there are {} search results", self.results.len());
                    return;
                };

                if enqueue {
                    self.player.add_to_queue(track);
                } else {
                    // Playing a search result queues all results, like
                    // starting an album.
                    self.player.play_track(track, Some(self.results.clone()));
                }
            }
            Target::Video(video_id) => {
                let catalog = Arc::clone(&self.catalog);
                let replies = self.replies.clone();

                tokio::spawn(async move {
                    let track = catalog::refresh(&*catalog, &video_id).await;
                    let _ = replies.send(Reply::Video {
                        video_id,
                        enqueue,
                        track,
                    });
                });
            }
        }
    }

    fn refresh(&self, video_id: String) {
        let catalog = Arc::clone(&self.catalog);
        let replies = self.replies.clone();

        tokio::spawn(async move {
            let track = catalog::refresh(&*catalog, &video_id).await;
            let _ = replies.send(Reply::Refresh { video_id, track });
        });
    }

    fn on_reply(&mut self, reply: Reply) {
        match reply {
            Reply::Search {
                query,
                more,
                result,
            } => match result {
                Ok(_) if more && !self.continues(&query) => {
                    debug!("dropping results of \"{query}\" after a newer search");
                }
                Ok(page) => {
                    if !more {
                        self.results.clear();
                    }
                    if page.tracks.is_empty() && self.results.is_empty() {
                        println!("nothing found for \"{query}\"");
                    }

                    let first = self.results.len();
                    self.results.extend(page.tracks);
                    for (number, track) in self.results.iter().enumerate().skip(first) {
                        println!("{:>3}. {}", number + 1, describe(track));
                    }
                    if page.next_page_token.is_some() {
                        println!("type more for more results");
                    }
                    self.last_search = Some((query, page.next_page_token));
                }
                Err(e) => {
                    warn!("search for \"{query}\" failed: {e}");
                    println!("search failed: {e}");
                }
            },
            Reply::Video {
                video_id,
                enqueue,
                track,
            } => {
                // Without details, the widget can still play the id.
                let track = track.unwrap_or_else(|| {
                    debug!("using bare video id {video_id} without details");
                    Track::new(&video_id, &video_id, "", "", 0)
                });
                if enqueue {
                    self.player.add_to_queue(track);
                } else {
                    self.player.play_track(track, None);
                }
            }
            Reply::Refresh { video_id, track } => match track {
                Some(track) => self.player.apply_refresh(&video_id, track),
                None => debug!("keeping restored details of {video_id}"),
            },
        }
    }

    fn print_queue(&self) {
        let queue = self.player.queue();
        if queue.is_empty() {
            println!("the queue is empty");
            return;
        }

        for (index, track) in queue.iter().enumerate() {
            let marker = if index == self.player.queue_index() {
                '>'
            } else {
                ' '
            };
            println!("{marker}{:>3}. {}", index + 1, describe(track));
        }
    }

    fn print_status(&self) {
        let Some(track) = self.player.current_track() else {
            println!("nothing to play; search for something first");
            return;
        };

        println!(
            "{} {} [{} / {}] volume {} quality {}{}",
            if self.player.is_playing() {
                "playing"
            } else {
                "paused"
            },
            describe(track),
            format_duration(self.player.current_time()),
            format_duration(self.player.duration()),
            self.player.volume(),
            self.player.quality(),
            if self.player.is_ready() {
                ""
            } else {
                " (no audio)"
            }
        );
    }
}

fn describe(track: &Track) -> String {
    #[expect(clippy::cast_precision_loss)]
    let duration = format_duration(track.duration() as f64);
    format!("{} - {} ({duration})", track.artist(), track.title())
}

/// Starts a player widget and mounts it.
///
/// Returns where the widget reports its states. Playback continues without
/// audio if the widget cannot be started.
async fn mount(player: &mut Player, config: &Config) -> mpsc::UnboundedReceiver<WidgetState> {
    let (state_tx, state_rx) = mpsc::unbounded_channel();

    #[cfg(unix)]
    {
        match tunetube::mpv::Mpv::spawn(&config.mpv_path, state_tx).await {
            Ok(mpv) => player.mount(Box::new(mpv)),
            Err(e) => warn!("continuing without audio: {e}"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = (player, config, state_tx);
        warn!("continuing without audio: no player widget on this platform");
    }

    state_rx
}

/// Main application loop.
///
/// # Errors
///
/// Returns an error when the configuration is unusable. Failures during
/// playback are logged and never end the loop.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = Config::with_api_url(args.api_url);
    config.token = load_token(&args.secrets_file)?;
    config.mpv_path = args.mpv;
    if let Some(state_file) = args.state_file {
        config.state_file = state_file;
    }
    debug!("state file: {}", config.state_file.display());

    let catalog = Arc::new(api::Client::new(&config)?);
    let (recorder, history_task) = Recorder::spawn(Arc::clone(&catalog));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let player = Player::new(Box::new(FileStore::new(&config.state_file)))
        .with_history(recorder)
        .with_events(event_tx);

    let (action_tx, mut action_rx) = mpsc::unbounded_channel();
    let mut bridge = Bridge::new(Box::<LogSession>::default());
    let supported = bridge.register(&action_tx);
    debug!("media session actions: {supported:?}");
    bridge.sync(&player);

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    let mut session = Session {
        player,
        bridge,
        catalog,
        replies: reply_tx,
        results: Vec::new(),
        last_search: None,
    };

    // Restored details may be stale: the video could have been retitled or
    // removed since.
    if let Some(video_id) = session.player.refresh_target() {
        session.refresh(video_id);
    }

    let mut state_rx = mount(&mut session.player, &config).await;

    let mut signals = signal::Handler::new()?;

    let mut poll = tokio::time::interval(Adapter::POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    println!("type help for a list of commands");

    loop {
        tokio::select! {
            // Prioritize signals.
            biased;

            signal = signals.recv() => {
                if signal.is_shutdown() {
                    info!("shutting down gracefully on {signal}");
                    break;
                }

                info!("restarting player on {signal}");
                session.player.unmount();
                state_rx = mount(&mut session.player, &config).await;
            }

            Some(state) = state_rx.recv() => session.player.on_widget_state(state),

            Some(action) = action_rx.recv() => media_session::dispatch(action, &mut session.player),

            Some(event) = event_rx.recv() => session.bridge.handle(event, &session.player),

            Some(reply) = reply_rx.recv() => session.on_reply(reply),

            _ = poll.tick() => session.player.poll(),

            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    match line.parse::<Command>() {
                        Ok(Command::Quit) => {
                            info!("shutting down gracefully");
                            break;
                        }
                        Ok(command) => session.execute(command),
                        Err(e) => println!("{e}"),
                    }
                }
                Ok(None) => {
                    debug!("standard input closed; use Ctrl+C to quit");
                    stdin_open = false;
                }
                Err(e) => {
                    error!("could not read standard input: {e}");
                    stdin_open = false;
                }
            },
        }
    }

    // Dropping the player stops its widget and, with the last recorder gone,
    // lets the history task drain and end.
    drop(session);
    if tokio::time::timeout(HISTORY_FLUSH_TIMEOUT, history_task)
        .await
        .is_err()
    {
        warn!("history requests still pending at shutdown");
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(&args);
    debug!("{args:#?}");

    let cmd = command!();
    info!(
        "starting {}/{}; {BUILD_PROFILE}",
        cmd.get_name(),
        cmd.get_version().unwrap_or("unknown")
    );

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
