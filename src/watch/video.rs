use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::errors::TetsundoError;

/// Eleven character YouTube video id.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct VideoId(String);

fn url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?:youtube(?:-nocookie)?\.com/(?:watch\?(?:[^#]*&)?v=|embed/|v/|e/|shorts/|live/|[^/?#]+/[^?#]*/)|youtu\.be/|googleusercontent\.com/youtube\.com/[12]/)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
            )
            .ok()
        })
        .as_ref()
}

fn bare_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").ok())
        .as_ref()
}

impl VideoId {
    /// Accepts a bare id or any of the common YouTube URL shapes
    /// (`watch?v=`, `youtu.be/`, `embed/`, `v/`, `shorts/`, `live/`), a nested
    /// `youtube.com/<a>/<b>/<id>` path, or a
    /// `googleusercontent.com/youtube.com/{1,2}/<id>` proxy link.
    pub fn parse(input: &str) -> Result<Self, TetsundoError> {
        let input = input.trim();
        if bare_id_pattern().is_some_and(|re| re.is_match(input)) {
            return Ok(Self(input.to_string()));
        }

        url_pattern()
            .and_then(|re| re.captures(input))
            .and_then(|caps| caps.get(1))
            .map(|id| Self(id.as_str().to_string()))
            .ok_or_else(|| TetsundoError::InvalidVideoUrl {
                url: input.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl FromStr for VideoId {
    type Err = TetsundoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
