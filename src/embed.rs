use serde::Serialize;
use serde_json::{json, Value};

use crate::tmdb::MediaKind;

/// The third-party players this service knows how to embed, in preference
/// order. Playback is delegated entirely to these hosts; nothing is proxied.
pub const EMBED_SOURCES: &[EmbedSource] = &[
    EmbedSource {
        id: "vidsrc-rip",
        name: "VidSrc Pro",
    },
    EmbedSource {
        id: "vidsrc-cc",
        name: "VidSrc Ultra",
    },
    EmbedSource {
        id: "vidsrc-me",
        name: "VidSrc ME",
    },
    EmbedSource {
        id: "vidsrc-net",
        name: "VidSrc NET",
    },
    EmbedSource {
        id: "embedsoap",
        name: "EmbedSoap",
    },
];

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EmbedSource {
    pub id: &'static str,
    pub name: &'static str,
}

impl EmbedSource {
    /// Embed URL for this host. `season`/`episode` default to 1 for TV and
    /// are ignored for movies.
    pub fn url(&self, kind: MediaKind, tmdb_id: i64, season: Option<i32>, episode: Option<i32>) -> String {
        let season = season.unwrap_or(1);
        let episode = episode.unwrap_or(1);
        match (self.id, kind) {
            ("vidsrc-rip", MediaKind::Movie) => {
                format!("https://vidsrc.rip/embed/movie/{tmdb_id}")
            }
            ("vidsrc-rip", MediaKind::Tv) => {
                format!("https://vidsrc.rip/embed/tv/{tmdb_id}/{season}/{episode}")
            }
            ("vidsrc-cc", MediaKind::Movie) => {
                format!("https://vidsrc.cc/v2/embed/movie/{tmdb_id}")
            }
            ("vidsrc-cc", MediaKind::Tv) => {
                format!("https://vidsrc.cc/v2/embed/tv/{tmdb_id}/{season}/{episode}")
            }
            ("vidsrc-me", MediaKind::Movie) => {
                format!("https://vidsrc.me/embed/movie?tmdb={tmdb_id}")
            }
            ("vidsrc-me", MediaKind::Tv) => {
                format!("https://vidsrc.me/embed/tv?tmdb={tmdb_id}&season={season}&episode={episode}")
            }
            ("vidsrc-net", MediaKind::Movie) => {
                format!("https://vidsrc.net/embed/movie?tmdb={tmdb_id}")
            }
            ("vidsrc-net", MediaKind::Tv) => {
                format!("https://vidsrc.net/embed/tv?tmdb={tmdb_id}&season={season}&episode={episode}")
            }
            ("embedsoap", MediaKind::Movie) => {
                format!("https://www.embedsoap.com/embed/movie?id={tmdb_id}")
            }
            ("embedsoap", MediaKind::Tv) => {
                format!("https://www.embedsoap.com/embed/tv?id={tmdb_id}&s={season}&e={episode}")
            }
            _ => unreachable!("unknown embed source id"),
        }
    }
}

pub fn embed_urls(kind: MediaKind, tmdb_id: i64, season: Option<i32>, episode: Option<i32>) -> Vec<Value> {
    EMBED_SOURCES
        .iter()
        .map(|source| {
            json!({
                "id": source.id,
                "name": source.name,
                "url": source.url(kind, tmdb_id, season, episode),
            })
        })
        .collect()
}

/// Best-effort control messages posted into the embedded player. The host
/// may or may not honor them; there is no acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Mute,
    Unmute,
    Volume(f32),
}

impl PlayerCommand {
    pub fn to_message(self) -> Value {
        match self {
            PlayerCommand::Play => json!({ "action": "play" }),
            PlayerCommand::Pause => json!({ "action": "pause" }),
            PlayerCommand::Mute => json!({ "action": "mute", "muted": true }),
            PlayerCommand::Unmute => json!({ "action": "mute", "muted": false }),
            PlayerCommand::Volume(level) => {
                json!({ "action": "volume", "volume": level.clamp(0.0, 1.0) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movie_urls_ignore_season_and_episode() {
        let urls = embed_urls(MediaKind::Movie, 550, Some(3), Some(7));
        assert_eq!(urls.len(), EMBED_SOURCES.len());
        assert_eq!(
            urls[0]["url"].as_str(),
            Some("https://vidsrc.rip/embed/movie/550")
        );
        assert_eq!(
            urls[2]["url"].as_str(),
            Some("https://vidsrc.me/embed/movie?tmdb=550")
        );
    }

    #[test]
    fn tv_urls_default_missing_season_and_episode_to_one() {
        let urls = embed_urls(MediaKind::Tv, 1399, None, None);
        assert_eq!(
            urls[0]["url"].as_str(),
            Some("https://vidsrc.rip/embed/tv/1399/1/1")
        );
        assert_eq!(
            urls[4]["url"].as_str(),
            Some("https://www.embedsoap.com/embed/tv?id=1399&s=1&e=1")
        );
    }

    #[test]
    fn tv_urls_carry_season_and_episode() {
        let urls = embed_urls(MediaKind::Tv, 1399, Some(2), Some(5));
        assert_eq!(
            urls[3]["url"].as_str(),
            Some("https://vidsrc.net/embed/tv?tmdb=1399&season=2&episode=5")
        );
    }

    #[test]
    fn player_commands_serialize_to_action_messages() {
        assert_eq!(PlayerCommand::Play.to_message(), json!({"action": "play"}));
        assert_eq!(
            PlayerCommand::Unmute.to_message(),
            json!({"action": "mute", "muted": false})
        );
        assert_eq!(
            PlayerCommand::Volume(1.5).to_message(),
            json!({"action": "volume", "volume": 1.0})
        );
    }
}
