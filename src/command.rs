//! Interactive commands typed on standard input.
//!
//! One command per line. Track arguments can be a 1-based number into the
//! last search results, a video id, or a video link:
//!
//! ```text
//! search daft punk
//! play 3
//! add https://youtu.be/dQw4w9WgXcQ
//! seek 1:30
//! volume 40
//! ```

use std::{fmt, str::FromStr};

use crate::{
    error::{Error, Result},
    track::{Quality, Volume},
    util,
};

/// Refers to a track to play or queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// 1-based number into the last search results.
    Result(usize),
    /// Video id, given directly or through a link.
    Video(String),
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::invalid_argument("missing track number, id or link"));
        }

        if let Ok(number) = s.parse::<usize>() {
            return if number == 0 {
                Err(Error::out_of_range("track numbers start at 1"))
            } else {
                Ok(Self::Result(number))
            };
        }

        if let Some(video_id) = util::parse_video_url(s) {
            return Ok(Self::Video(video_id.to_owned()));
        }

        if s.contains(['/', ':', ' ']) {
            return Err(Error::invalid_argument(format!("not a video link: {s}")));
        }

        Ok(Self::Video(s.to_owned()))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Search(String),
    /// Fetches the next page of the last search.
    More,
    /// Plays the target, or resumes without one.
    Play(Option<Target>),
    Pause,
    Toggle,
    Next,
    Previous,
    Seek(f64),
    Volume(Volume),
    Quality(Quality),
    Add(Target),
    /// Removes the queued track at this 0-based position.
    Remove(usize),
    Clear,
    Queue,
    Status,
    Help,
    Quit,
}

impl Command {
    pub const USAGE: &'static str = "\
commands:
  search <query>          search for songs
  more                    show more results of the last search
  play [<n|id|link>]      play a search result or video, or resume
  pause | toggle          pause, or toggle play and pause
  next | prev             skip forward or back in the queue
  seek <secs|m:ss>        jump to a position
  volume <0-100>          set the volume
  quality <low|medium|high>
  add <n|id|link>         queue a search result or video
  remove <n>              remove the n-th queued track
  clear                   empty the queue
  queue | status          show the queue or what is playing
  quit";
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, argument) = match line.split_once(char::is_whitespace) {
            Some((verb, argument)) => (verb, argument.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "search" | "s" => {
                if argument.is_empty() {
                    return Err(Error::invalid_argument("search needs a query"));
                }
                Self::Search(argument.to_owned())
            }
            "more" | "m" => Self::More,
            "play" | "p" => {
                if argument.is_empty() {
                    Self::Play(None)
                } else {
                    Self::Play(Some(argument.parse()?))
                }
            }
            "resume" => Self::Play(None),
            "pause" => Self::Pause,
            "toggle" | "t" => Self::Toggle,
            "next" | "n" => Self::Next,
            "prev" | "previous" => Self::Previous,
            "seek" => {
                let seconds = util::parse_position(argument).ok_or_else(|| {
                    Error::invalid_argument(format!("not a position: \"{argument}\""))
                })?;
                Self::Seek(seconds)
            }
            "volume" | "vol" => {
                let linear = argument.parse::<u8>()?;
                if linear > 100 {
                    return Err(Error::out_of_range("volume goes from 0 to 100"));
                }
                Self::Volume(Volume::new(linear))
            }
            "quality" => Self::Quality(argument.parse()?),
            "add" | "a" => Self::Add(argument.parse()?),
            "remove" | "rm" => {
                let number = argument.parse::<usize>()?;
                let index = number
                    .checked_sub(1)
                    .ok_or_else(|| Error::out_of_range("queue positions start at 1"))?;
                Self::Remove(index)
            }
            "clear" => Self::Clear,
            "queue" | "q" => Self::Queue,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            "" => return Err(Error::invalid_argument("empty command")),
            other => {
                return Err(Error::unimplemented(format!(
                    "unknown command \"{other}\"; type help for a list"
                )))
            }
        };

        Ok(command)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Result(number) => write!(f, "result {number}"),
            Self::Video(video_id) => write!(f, "video {video_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn parse(line: &str) -> Command {
        line.parse().unwrap()
    }

    #[test]
    fn parses_transport_commands() {
        assert_eq!(parse("pause"), Command::Pause);
        assert_eq!(parse("  RESUME "), Command::Play(None));
        assert_eq!(parse("next"), Command::Next);
        assert_eq!(parse("prev"), Command::Previous);
        assert_eq!(parse("seek 1:30"), Command::Seek(90.0));
        assert_eq!(parse("volume 40"), Command::Volume(Volume::new(40)));
        assert_eq!(parse("quality high"), Command::Quality(Quality::High));
    }

    #[test]
    fn parses_targets() {
        assert_eq!(parse("play 2"), Command::Play(Some(Target::Result(2))));
        assert_eq!(
            parse("add https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Command::Add(Target::Video("dQw4w9WgXcQ".to_owned()))
        );
        assert_eq!(
            parse("play dQw4w9WgXcQ"),
            Command::Play(Some(Target::Video("dQw4w9WgXcQ".to_owned())))
        );
        assert!("play 0".parse::<Command>().is_err());
        assert!("add https://example.com/x".parse::<Command>().is_err());
    }

    #[test]
    fn queue_positions_are_one_based() {
        assert_eq!(parse("remove 1"), Command::Remove(0));
        let err = "remove 0".parse::<Command>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::OutOfRange);
    }

    #[test]
    fn search_keeps_the_whole_query() {
        assert_eq!(
            parse("search  daft punk  one more time"),
            Command::Search("daft punk  one more time".to_owned())
        );
        assert!("search".parse::<Command>().is_err());
    }

    #[test]
    fn more_continues_the_search() {
        assert_eq!(parse("more"), Command::More);
        assert_eq!(parse(" M "), Command::More);
    }

    #[test]
    fn rejects_unknown_and_invalid_input() {
        assert_eq!(
            "dance".parse::<Command>().unwrap_err().kind,
            ErrorKind::Unimplemented
        );
        assert!("volume 101".parse::<Command>().is_err());
        assert!("volume loud".parse::<Command>().is_err());
        assert!("seek soon".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }
}
