//! Player widget backed by an external `mpv` process.
//!
//! `mpv` streams videos from the platform through its `youtube-dl` hook and
//! is driven over its JSON IPC socket. It is a black box like any other
//! widget: tunetube sends commands, and learns what happens through events
//! and observed properties.
//!
//! # IPC
//!
//! Every message is a single line of JSON. Commands look like
//!
//! ```json
//! {"command": ["loadfile", "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "replace"], "request_id": 7}
//! ```
//!
//! and are answered by `{"request_id": 7, "error": "success"}`. Unsolicited
//! events arrive in between, most importantly `property-change` for the
//! properties observed right after connecting, `file-loaded` and
//! `end-file`.
//!
//! # Mapping onto widget states
//!
//! | `mpv` | [`WidgetState`] |
//! |---|---|
//! | connected | `Ready` |
//! | `file-loaded` | `Playing` or `Paused`, after `pause` |
//! | `pause` changed while a file is loaded | `Playing` or `Paused` |
//! | `paused-for-cache` became true | `Buffering` |
//! | `end-file` with reason `eof` | `Ended` |
//! | `end-file` with reason `error` | `Error` |
//! | socket closed | `Error` |
//!
//! `duration` becoming known while playing is reported as `Playing` once
//! more, so that the controller picks up the length.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        unix::{OwnedReadHalf, OwnedWriteHalf},
        UnixStream,
    },
    process::{Child, Command},
    sync::mpsc,
    task::JoinHandle,
};

use crate::{
    adapter::{Widget, WidgetState},
    error::{Error, Result},
    track::Quality,
};

/// Observation ids of the properties `mpv` pushes changes of.
const OBS_PAUSE: u64 = 1;
const OBS_TIME_POS: u64 = 2;
const OBS_DURATION: u64 = 3;
const OBS_PAUSED_FOR_CACHE: u64 = 4;

/// What is known about the player, as last pushed by `mpv`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Properties {
    pub paused: bool,
    pub loaded: bool,
    pub time_pos: f64,
    pub duration: f64,
}

/// A line received from `mpv`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Event(Event),
    Reply {
        error: String,
        #[serde(default)]
        request_id: Option<u64>,
    },
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
    PropertyChange {
        id: u64,
        #[serde(default)]
        data: Value,
    },
    FileLoaded,
    EndFile {
        reason: String,
        #[serde(default)]
        file_error: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl Properties {
    /// Updates the properties from `message` and returns the widget state it
    /// amounts to, if any.
    pub fn apply(&mut self, message: Message) -> Option<WidgetState> {
        let event = match message {
            Message::Event(event) => event,
            Message::Reply { error, request_id } => {
                if error != "success" {
                    debug!("mpv rejected request {request_id:?}: {error}");
                }
                return None;
            }
        };

        match event {
            Event::PropertyChange { id, data } => match id {
                OBS_PAUSE => {
                    let paused = data.as_bool().unwrap_or(false);
                    let changed = paused != self.paused;
                    self.paused = paused;
                    (changed && self.loaded).then(|| self.play_state())
                }
                OBS_TIME_POS => {
                    self.time_pos = data.as_f64().unwrap_or(0.0);
                    None
                }
                OBS_DURATION => {
                    let duration = data.as_f64().unwrap_or(0.0);
                    let learned = duration > 0.0 && self.duration <= 0.0;
                    self.duration = duration;
                    (learned && self.loaded && !self.paused).then_some(WidgetState::Playing)
                }
                OBS_PAUSED_FOR_CACHE => data
                    .as_bool()
                    .unwrap_or(false)
                    .then_some(WidgetState::Buffering),
                _ => None,
            },
            Event::FileLoaded => {
                self.loaded = true;
                Some(self.play_state())
            }
            Event::EndFile { reason, file_error } => {
                self.loaded = false;
                self.time_pos = 0.0;
                self.duration = 0.0;
                match reason.as_str() {
                    "eof" => Some(WidgetState::Ended),
                    "error" => Some(WidgetState::Error(
                        file_error.unwrap_or_else(|| "playback failed".to_owned()),
                    )),
                    // Replaced by another file, stopped or quitting.
                    _ => None,
                }
            }
            Event::Other => None,
        }
    }

    fn play_state(&self) -> WidgetState {
        if self.paused {
            WidgetState::Paused
        } else {
            WidgetState::Playing
        }
    }
}

/// An `mpv` process and the tasks talking to it.
pub struct Mpv {
    child: Child,
    socket_path: PathBuf,
    commands: mpsc::UnboundedSender<Value>,
    properties: Arc<Mutex<Properties>>,
    request_id: u64,
    tasks: Vec<JoinHandle<()>>,
}

impl Mpv {
    /// How long to wait for `mpv` to open its IPC socket.
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

    /// Base of the URL to play a video id from.
    const WATCH_URL: &'static str = "https://www.youtube.com/watch?v=";

    /// Starts `mpv` from `executable` and connects to it.
    ///
    /// Widget states are sent to `state_tx`, starting with
    /// [`WidgetState::Ready`] once connected.
    ///
    /// # Errors
    ///
    /// Returns error if `mpv` cannot be started or does not open its IPC
    /// socket in time.
    pub async fn spawn(
        executable: &Path,
        state_tx: mpsc::UnboundedSender<WidgetState>,
    ) -> Result<Self> {
        let socket_path = std::env::temp_dir().join(format!(
            "tunetube-{}-{:08x}.sock",
            std::process::id(),
            fastrand::u32(..)
        ));

        let mut child = Command::new(executable)
            .arg("--idle=yes")
            .arg("--no-video")
            .arg("--no-terminal")
            .arg("--no-config")
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!("could not start {}: {e}", executable.display());
                Error::from(e)
            })?;
        debug!("started {} with pid {:?}", executable.display(), child.id());

        let stream = match tokio::time::timeout(
            Self::CONNECT_TIMEOUT,
            Self::connect(&socket_path),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                let _ = child.start_kill();
                return Err(e);
            }
            Err(e) => {
                let _ = child.start_kill();
                return Err(Error::deadline_exceeded(format!(
                    "mpv did not open {}: {e}",
                    socket_path.display()
                )));
            }
        };
        info!("connected to mpv at {}", socket_path.display());

        let (reader, writer) = stream.into_split();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let properties = Arc::new(Mutex::new(Properties::default()));

        let tasks = vec![
            tokio::spawn(Self::write(writer, command_rx)),
            tokio::spawn(Self::read(reader, Arc::clone(&properties), state_tx.clone())),
        ];

        let mut mpv = Self {
            child,
            socket_path,
            commands,
            properties,
            request_id: 0,
            tasks,
        };

        for (id, name) in [
            (OBS_PAUSE, "pause"),
            (OBS_TIME_POS, "time-pos"),
            (OBS_DURATION, "duration"),
            (OBS_PAUSED_FOR_CACHE, "paused-for-cache"),
        ] {
            mpv.command(json!(["observe_property", id, name]))?;
        }

        let _ = state_tx.send(WidgetState::Ready);
        Ok(mpv)
    }

    async fn connect(socket_path: &Path) -> Result<UnixStream> {
        loop {
            match UnixStream::connect(socket_path).await {
                Ok(stream) => return Ok(stream),
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    tokio::time::sleep(Self::CONNECT_RETRY_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn write(mut writer: OwnedWriteHalf, mut commands: mpsc::UnboundedReceiver<Value>) {
        while let Some(command) = commands.recv().await {
            trace!("mpv <- {command}");

            let mut line = command.to_string();
            line.push('\n');
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                error!("could not write to mpv: {e}");
                break;
            }
        }
    }

    async fn read(
        reader: OwnedReadHalf,
        properties: Arc<Mutex<Properties>>,
        state_tx: mpsc::UnboundedSender<WidgetState>,
    ) {
        let mut lines = BufReader::new(reader).lines();

        let reason = loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    trace!("mpv -> {line}");

                    let message = match serde_json::from_str::<Message>(&line) {
                        Ok(message) => message,
                        Err(e) => {
                            debug!("ignoring unexpected mpv message: {e}");
                            continue;
                        }
                    };

                    let state = lock(&properties).apply(message);
                    if let Some(state) = state {
                        if state_tx.send(state).is_err() {
                            return;
                        }
                    }
                }
                Ok(None) => break "mpv closed its IPC socket".to_owned(),
                Err(e) => break format!("could not read from mpv: {e}"),
            }
        };

        warn!("{reason}");
        let _ = state_tx.send(WidgetState::Error(reason));
    }

    fn command(&mut self, command: Value) -> Result<()> {
        self.request_id += 1;
        let message = json!({ "command": command, "request_id": self.request_id });

        self.commands
            .send(message)
            .map_err(|_| Error::unavailable("mpv connection is closed"))
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<()> {
        self.command(json!(["set_property", name, value]))
    }

    fn load_file(&mut self, video_id: &str, paused: bool) -> Result<()> {
        self.set_property("pause", Value::Bool(paused))?;
        self.command(json!([
            "loadfile",
            format!("{}{video_id}", Self::WATCH_URL),
            "replace"
        ]))
    }

    /// `youtube-dl` format selector for `quality`, audio only.
    #[must_use]
    pub fn format_selector(quality: Quality) -> &'static str {
        match quality {
            Quality::Low => "bestaudio[abr<=64]/worstaudio/bestaudio",
            Quality::Medium => "bestaudio[abr<=128]/bestaudio",
            Quality::High => "bestaudio/best",
        }
    }
}

fn lock(properties: &Mutex<Properties>) -> MutexGuard<'_, Properties> {
    properties.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Widget for Mpv {
    fn load(&mut self, video_id: &str) -> Result<()> {
        self.load_file(video_id, false)
    }

    fn cue(&mut self, video_id: &str) -> Result<()> {
        self.load_file(video_id, true)
    }

    fn play(&mut self) -> Result<()> {
        self.set_property("pause", Value::Bool(false))
    }

    fn pause(&mut self) -> Result<()> {
        self.set_property("pause", Value::Bool(true))
    }

    fn seek_to(&mut self, seconds: f64) -> Result<()> {
        if !lock(&self.properties).loaded {
            return Err(Error::failed_precondition("nothing loaded to seek in"));
        }
        self.command(json!(["seek", seconds.max(0.0), "absolute"]))
    }

    fn set_volume(&mut self, percent: u8) -> Result<()> {
        self.set_property("volume", json!(percent))
    }

    fn set_playback_quality(&mut self, quality: Quality) -> Result<()> {
        // Applies from the next file on.
        self.set_property("ytdl-format", json!(Self::format_selector(quality)))
    }

    fn current_time(&self) -> Result<f64> {
        Ok(lock(&self.properties).time_pos)
    }

    fn duration(&self) -> Result<f64> {
        Ok(lock(&self.properties).duration)
    }

    fn destroy(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }

        if let Err(e) = self.child.start_kill() {
            debug!("mpv already exited: {e}");
        }

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            trace!("could not remove {}: {e}", self.socket_path.display());
        }
    }
}
