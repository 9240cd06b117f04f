//! Events emitted by the playback controller.
//!
//! Subscribers such as the media session bridge or a user interface receive
//! these over a channel and read whatever they need from the
//! [`Player`](crate::player::Player) itself. Events carry no payload so that
//! a subscriber always sees current state, never a stale copy.
//!
//! # Example
//!
//! ```rust
//! use tunetube::events::Event;
//!
//! fn handle_event(event: Event) {
//!     match event {
//!         Event::Play => println!("Playback started"),
//!         Event::Pause => println!("Playback paused"),
//!         Event::TrackChanged => println!("New track"),
//!         Event::QueueChanged => println!("Queue changed"),
//!     }
//! }
//! ```

/// Significant changes of the playback state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// Playback has started or resumed.
    ///
    /// Emitted both for user commands and when the widget turns out to be
    /// playing while the controller thought it was paused.
    Play,

    /// Playback has paused.
    Pause,

    /// The current track changed, or its metadata was refreshed.
    TrackChanged,

    /// Tracks were added to, removed from or replaced in the queue.
    QueueChanged,
}
