//! Drives the playback controller through a scripted widget.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use tokio::sync::mpsc;

use tunetube::{
    adapter::{Widget, WidgetState},
    error::{Error, Result},
    events::Event,
    history::Recorder,
    player::Player,
    store::{FileStore, MemoryStore, Snapshot, Store},
    track::{Quality, Track, Volume},
};

#[derive(Debug, Default)]
struct Script {
    calls: Vec<String>,
    fail_loads: bool,
    time: f64,
    duration: f64,
}

/// Widget that records commands and answers from a shared script.
struct Scripted(Arc<Mutex<Script>>);

impl Scripted {
    fn call(&self, call: String) {
        self.0.lock().unwrap().calls.push(call);
    }
}

impl Widget for Scripted {
    fn load(&mut self, video_id: &str) -> Result<()> {
        if self.0.lock().unwrap().fail_loads {
            return Err(Error::unavailable("video unavailable"));
        }
        self.call(format!("load {video_id}"));
        Ok(())
    }

    fn cue(&mut self, video_id: &str) -> Result<()> {
        self.call(format!("cue {video_id}"));
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.call("play".to_owned());
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.call("pause".to_owned());
        Ok(())
    }

    fn seek_to(&mut self, seconds: f64) -> Result<()> {
        self.call(format!("seek {seconds}"));
        Ok(())
    }

    fn set_volume(&mut self, percent: u8) -> Result<()> {
        self.call(format!("volume {percent}"));
        Ok(())
    }

    fn set_playback_quality(&mut self, quality: Quality) -> Result<()> {
        self.call(format!("quality {quality}"));
        Ok(())
    }

    fn current_time(&self) -> Result<f64> {
        Ok(self.0.lock().unwrap().time)
    }

    fn duration(&self) -> Result<f64> {
        Ok(self.0.lock().unwrap().duration)
    }
}

/// Store that outlives the player, to restart from.
#[derive(Clone, Default)]
struct Shared(Arc<Mutex<MemoryStore>>);

impl Store for Shared {
    fn load(&mut self) -> Snapshot {
        self.0.lock().unwrap().load()
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.0.lock().unwrap().save(snapshot)
    }
}

fn track(id: &str) -> Track {
    Track::new(id, format!("Song {id}"), "Artist", format!("https://img/{id}"), 180)
}

fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id)).collect()
}

fn queue_of(len: usize) -> Vec<Track> {
    (0..len).map(|i| track(&format!("v{i}"))).collect()
}

/// A player with a ready widget, and the widget's script.
fn ready_player() -> (Player, Arc<Mutex<Script>>) {
    let script = Arc::new(Mutex::new(Script::default()));
    let mut player = Player::new(Box::<MemoryStore>::default());
    player.mount(Box::new(Scripted(Arc::clone(&script))));
    player.on_widget_state(WidgetState::Ready);
    script.lock().unwrap().calls.clear();
    (player, script)
}

fn calls(script: &Arc<Mutex<Script>>) -> Vec<String> {
    std::mem::take(&mut script.lock().unwrap().calls)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

proptest! {
    #[test]
    fn next_cycles_back_to_start(len in 1usize..12, start in 0usize..12) {
        let start = start % len;
        let queue = queue_of(len);
        let mut player = Player::new(Box::<MemoryStore>::default());
        player.play_track(queue[start].clone(), Some(queue));

        for _ in 0..len {
            player.play_next();
        }

        prop_assert_eq!(player.queue_index(), start);
        prop_assert_eq!(player.current_track().unwrap().video_id(), format!("v{start}"));
    }

    #[test]
    fn previous_undoes_next(len in 1usize..12, start in 0usize..12) {
        let start = start % len;
        let queue = queue_of(len);
        let mut player = Player::new(Box::<MemoryStore>::default());
        player.play_track(queue[start].clone(), Some(queue));

        player.play_next();
        player.play_previous();
        prop_assert_eq!(player.queue_index(), start);

        player.play_previous();
        player.play_next();
        prop_assert_eq!(player.queue_index(), start);
        prop_assert_eq!(player.current_track().unwrap().video_id(), format!("v{start}"));
    }

    #[test]
    fn play_track_points_queue_at_track(len in 1usize..12, pick in 0usize..12, member in any::<bool>()) {
        let queue = queue_of(len);
        let chosen = if member { queue[pick % len].clone() } else { track("elsewhere") };

        let mut player = Player::new(Box::<MemoryStore>::default());
        player.play_track(chosen.clone(), Some(queue));

        prop_assert!(player.is_playing());
        prop_assert_eq!(player.current_track().unwrap().video_id(), chosen.video_id());
        if member {
            prop_assert_eq!(player.queue()[player.queue_index()].video_id(), chosen.video_id());
        } else {
            prop_assert_eq!(player.queue_index(), 0);
        }
    }

    #[test]
    fn perceptual_volume_never_decreases(a in 0u8..=100, b in 0u8..=100) {
        let (low, high) = (a.min(b), a.max(b));
        prop_assert!(Volume::new(low).perceptual() <= Volume::new(high).perceptual());
    }
}

#[test]
fn volume_endpoints_reach_widget_unchanged() {
    let (mut player, script) = ready_player();

    player.set_volume(Volume::new(0));
    player.set_volume(Volume::new(100));
    player.set_volume(Volume::new(50));

    assert_eq!(calls(&script), ["volume 0", "volume 100", "volume 27"]);
    assert_eq!(player.volume().linear(), 50);
}

#[test]
fn perceptual_volume_rises_over_the_audible_range() {
    let curve: Vec<u8> = (0..=100).map(|v| Volume::new(v).perceptual()).collect();
    assert!(curve.windows(2).all(|w| w[0] <= w[1]));
    // Rounding to whole percents flattens some steps in the lower half only.
    assert!(curve[54..].windows(2).all(|w| w[0] < w[1]));
    assert!(curve[..54].windows(2).any(|w| w[0] == w[1]));
}

#[test]
fn wraps_from_last_to_first() {
    let (mut player, script) = ready_player();
    let queue = tracks(&["a", "b", "c"]);
    player.play_track(queue[2].clone(), Some(queue));
    assert_eq!(player.queue_index(), 2);
    calls(&script);

    player.play_next();

    assert_eq!(player.queue_index(), 0);
    assert_eq!(player.current_track().unwrap().video_id(), "a");
    assert_eq!(calls(&script), ["load a", "play"]);
}

#[test]
fn empty_queue_skips_are_no_ops() {
    let (mut player, script) = ready_player();
    let (tx, mut rx) = mpsc::unbounded_channel();
    player = player.with_events(tx);
    player.play_track(track("solo"), None);
    player.pause();
    calls(&script);
    drain(&mut rx);

    player.play_next();
    player.play_previous();

    assert_eq!(player.current_track().unwrap().video_id(), "solo");
    assert_eq!(player.queue_index(), 0);
    assert!(!player.is_playing());
    assert!(calls(&script).is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn playing_report_wins_over_paused_intent() {
    let (mut player, script) = ready_player();
    let (tx, mut rx) = mpsc::unbounded_channel();
    player = player.with_events(tx);
    player.play_track(track("a"), None);
    player.pause();
    drain(&mut rx);
    script.lock().unwrap().duration = 215.0;

    player.on_widget_state(WidgetState::Playing);

    assert!(player.is_playing());
    assert!((player.duration() - 215.0).abs() < f64::EPSILON);
    assert_eq!(drain(&mut rx), [Event::Play]);
}

#[test]
fn paused_report_wins_over_playing_intent() {
    let (mut player, _script) = ready_player();
    player.play_track(track("a"), None);

    player.on_widget_state(WidgetState::Paused);
    assert!(!player.is_playing());

    // Buffering is not a pause.
    player.play();
    player.on_widget_state(WidgetState::Buffering);
    assert!(player.is_playing());
}

#[test]
fn each_ended_report_advances_once() {
    let (mut player, script) = ready_player();
    let (recorder, mut history) = Recorder::channel();
    player = player.with_history(recorder);
    player.play_track(track("a"), Some(tracks(&["a", "b", "c"])));
    history.try_recv().unwrap();
    calls(&script);

    player.on_widget_state(WidgetState::Ended);

    assert_eq!(player.queue_index(), 1);
    assert_eq!(calls(&script), ["load b", "play"]);
    assert_eq!(history.try_recv().unwrap().video_id(), "b");
    assert!(history.try_recv().is_err());

    player.on_widget_state(WidgetState::Ended);
    assert_eq!(player.queue_index(), 2);
}

#[test]
fn history_records_every_started_track() {
    let (recorder, mut history) = Recorder::channel();
    let mut player = Player::new(Box::<MemoryStore>::default()).with_history(recorder);

    player.play_track(track("a"), Some(tracks(&["a", "b"])));
    player.play_next();
    player.play_previous();
    player.pause();
    player.play();

    let mut recorded = Vec::new();
    while let Ok(track) = history.try_recv() {
        recorded.push(track.video_id().to_owned());
    }
    assert_eq!(recorded, ["a", "b", "a"]);
}

#[test]
fn commands_before_ready_are_replayed_on_ready() {
    let script = Arc::new(Mutex::new(Script::default()));
    let mut player = Player::new(Box::<MemoryStore>::default());
    player.mount(Box::new(Scripted(Arc::clone(&script))));

    player.set_volume(Volume::new(50));
    player.set_quality(Quality::Medium);
    player.play_track(track("a"), None);
    assert!(calls(&script).is_empty());
    assert!(player.is_playing());

    player.on_widget_state(WidgetState::Ready);
    assert_eq!(
        calls(&script),
        ["load a", "play", "volume 27", "quality medium"]
    );
}

#[test]
fn failing_widget_command_keeps_state() {
    let (mut player, script) = ready_player();
    script.lock().unwrap().fail_loads = true;

    player.play_track(track("a"), Some(tracks(&["a", "b"])));

    assert!(player.is_playing());
    assert_eq!(player.current_track().unwrap().video_id(), "a");
    // The failed load does not keep the sibling command from being sent.
    assert_eq!(calls(&script), ["play"]);

    player.on_widget_state(WidgetState::Error("video unavailable".to_owned()));
    assert!(player.is_playing());
    assert_eq!(player.queue_index(), 0);
}

#[test]
fn position_is_sampled_within_duration() {
    let (mut player, script) = ready_player();
    player.play_track(track("a"), None);
    {
        let mut script = script.lock().unwrap();
        script.duration = 100.0;
        script.time = 42.5;
    }
    player.on_widget_state(WidgetState::Playing);

    player.poll();
    assert!((player.current_time() - 42.5).abs() < f64::EPSILON);

    script.lock().unwrap().time = 250.0;
    player.poll();
    assert!((player.current_time() - 100.0).abs() < f64::EPSILON);
}

#[test]
fn restart_restores_only_track_and_queue() {
    let store = Shared::default();

    let mut player = Player::new(Box::new(store.clone()));
    player.play_track(track("b"), Some(tracks(&["a", "b", "c"])));
    player.set_volume(Volume::new(20));
    player.set_quality(Quality::High);
    player.seek_to(90.0);
    drop(player);

    let script = Arc::new(Mutex::new(Script::default()));
    let mut restored = Player::new(Box::new(store));
    assert_eq!(restored.current_track().unwrap().video_id(), "b");
    let ids: Vec<_> = restored.queue().iter().map(Track::video_id).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    assert_eq!(restored.queue_index(), 1);
    assert!(!restored.is_playing());
    assert_eq!(restored.volume(), Volume::MAX);
    assert_eq!(restored.quality(), Quality::Low);
    assert!(restored.current_time().abs() < f64::EPSILON);

    // A paused session only cues the restored track.
    restored.mount(Box::new(Scripted(Arc::clone(&script))));
    restored.on_widget_state(WidgetState::Ready);
    assert_eq!(
        calls(&script),
        ["cue b", "volume 100", "quality low"]
    );
}

#[test]
fn snapshot_survives_the_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut player = Player::new(Box::new(FileStore::new(&path)));
    let cover = "data:image/png;base64,AAAA";
    player.play_track(track("x").with_custom_cover(cover), Some(tracks(&["w", "x"])));
    player.add_to_queue(track("y"));
    player.remove_from_queue(0);
    drop(player);

    let restored = Player::new(Box::new(FileStore::new(&path)));
    let current = restored.current_track().unwrap();
    assert_eq!(current.video_id(), "x");
    assert_eq!(current.artwork(), cover);
    let ids: Vec<_> = restored.queue().iter().map(Track::video_id).collect();
    assert_eq!(ids, ["x", "y"]);
    assert_eq!(restored.queue_index(), 0);
}

#[test]
fn corrupt_state_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{\"currentTrack\": 42").unwrap();

    let player = Player::new(Box::new(FileStore::new(&path)));
    assert!(player.current_track().is_none());
    assert!(player.queue().is_empty());
}

#[test]
fn refresh_is_dropped_after_moving_on() {
    let (mut player, _script) = ready_player();
    let (tx, mut rx) = mpsc::unbounded_channel();
    player = player.with_events(tx);
    player.play_track(track("a"), Some(tracks(&["a", "b"])));
    let target = player.refresh_target().unwrap();

    player.play_next();
    drain(&mut rx);
    player.apply_refresh(&target, Track::new("a", "Retitled", "Artist", "", 181));

    assert_eq!(player.current_track().unwrap().video_id(), "b");
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn remount_starts_over_with_ready() {
    let (mut player, old) = ready_player();
    player.play_track(track("a"), None);
    calls(&old);

    player.unmount();
    player.pause();
    assert!(calls(&old).is_empty());

    let script = Arc::new(Mutex::new(Script::default()));
    player.mount(Box::new(Scripted(Arc::clone(&script))));
    player.on_widget_state(WidgetState::Ready);
    assert_eq!(calls(&script), ["cue a", "volume 100", "quality low"]);
}
