//! User intents consumed by the scene.
//!
//! Intents decouple whatever presentation layer drives the viewer from the
//! scene state. The text form is one command per line:
//!
//! ```text
//! pause
//! scrub 12
//! map GDC1
//! toggle laser
//! pose 1.0 2.0 0.5
//! goal 4.0 -1.5 3.14
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::pose::Pose2;
use crate::transform::Layer;

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    SetMapName(String),
    TogglePause,
    SetScrubOffset(usize),
    ToggleLayerVisible(Layer),
    SetInitialPose(Pose2),
    SetNavGoal(Pose2),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntentParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("{command}: missing argument {arg}")]
    MissingArgument { command: &'static str, arg: &'static str },

    #[error("{command}: invalid {arg} {value:?}")]
    InvalidArgument { command: &'static str, arg: &'static str, value: String },

    #[error("{command}: unexpected trailing argument {value:?}")]
    TrailingArgument { command: &'static str, value: String },
}

/// Argument cursor over one command line.
struct Args<'a> {
    command: &'static str,
    words: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn next(&mut self, arg: &'static str) -> Result<&'a str, IntentParseError> {
        self.words
            .next()
            .ok_or(IntentParseError::MissingArgument { command: self.command, arg })
    }

    fn parse<T: FromStr>(&mut self, arg: &'static str) -> Result<T, IntentParseError> {
        let word = self.next(arg)?;
        word.parse().map_err(|_| IntentParseError::InvalidArgument {
            command: self.command,
            arg,
            value: word.to_string(),
        })
    }

    fn pose(&mut self) -> Result<Pose2, IntentParseError> {
        let x = self.parse("x")?;
        let y = self.parse("y")?;
        let theta = self.parse("theta")?;
        Ok(Pose2::new(x, y, theta))
    }

    fn finish(mut self) -> Result<(), IntentParseError> {
        match self.words.next() {
            None => Ok(()),
            Some(extra) => Err(IntentParseError::TrailingArgument {
                command: self.command,
                value: extra.to_string(),
            }),
        }
    }
}

impl FromStr for Intent {
    type Err = IntentParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let head = words.next().ok_or(IntentParseError::Empty)?;
        let command: &'static str = match head.to_ascii_lowercase().as_str() {
            "pause" => "pause",
            "scrub" => "scrub",
            "map" => "map",
            "toggle" => "toggle",
            "pose" => "pose",
            "goal" => "goal",
            _ => return Err(IntentParseError::UnknownCommand(head.to_string())),
        };
        let mut args = Args { command, words };
        let intent = match command {
            "pause" => Intent::TogglePause,
            "scrub" => Intent::SetScrubOffset(args.parse("offset")?),
            "map" => Intent::SetMapName(args.next("name")?.to_string()),
            "toggle" => Intent::ToggleLayerVisible(args.parse("layer")?),
            "pose" => Intent::SetInitialPose(args.pose()?),
            _ => Intent::SetNavGoal(args.pose()?),
        };
        args.finish()?;
        Ok(intent)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetMapName(name) => write!(f, "map {name}"),
            Self::TogglePause => write!(f, "pause"),
            Self::SetScrubOffset(n) => write!(f, "scrub {n}"),
            Self::ToggleLayerVisible(layer) => write!(f, "toggle {layer}"),
            Self::SetInitialPose(p) => write!(f, "pose {} {} {}", p.x, p.y, p.theta),
            Self::SetNavGoal(p) => write!(f, "goal {} {} {}", p.x, p.y, p.theta),
        }
    }
}
