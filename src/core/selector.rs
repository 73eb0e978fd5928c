//! Picks which rendering strategy is authoritative right now

use super::negotiator::MediaStream;

/// URL marker of the embedded-room provider
pub const EMBEDDED_ROOM_MARKER: &str = "daily.co";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Presentation {
    /// Raw peer-to-peer stream
    PeerVideo { stream_id: String },
    /// Live and still plausibly negotiating
    Connecting,
    EmbeddedRoom { url: String },
    /// URL-based player; `url` may be absent when nothing is configured
    GenericPlayer {
        url: Option<String>,
        poster: Option<String>,
    },
}

impl Presentation {
    pub fn name(&self) -> &'static str {
        match self {
            Presentation::PeerVideo { .. } => "peer-video",
            Presentation::Connecting => "connecting",
            Presentation::EmbeddedRoom { .. } => "embedded-room",
            Presentation::GenericPlayer { .. } => "generic-player",
        }
    }
}

pub fn is_embedded_room_url(url: &str) -> bool {
    url.contains(EMBEDDED_ROOM_MARKER)
}

/// Selection order: direct stream, connecting placeholder, embedded room, generic player.
pub fn select(
    direct_stream: Option<&MediaStream>,
    has_ever_received: bool,
    is_live: bool,
    video_url: Option<&str>,
    poster: Option<&str>,
) -> Presentation {
    if let Some(stream) = direct_stream {
        return Presentation::PeerVideo {
            stream_id: stream.id.clone(),
        };
    }
    if is_live && !has_ever_received {
        return Presentation::Connecting;
    }
    match video_url {
        Some(url) if is_embedded_room_url(url) => Presentation::EmbeddedRoom {
            url: url.to_string(),
        },
        url => Presentation::GenericPlayer {
            url: url.map(str::to_string),
            poster: poster.map(str::to_string),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> MediaStream {
        MediaStream {
            id: "s1".into(),
            video_tracks: 1,
            audio_tracks: 0,
        }
    }

    #[test]
    fn test_direct_stream_always_wins() {
        let s = stream();
        for ever in [false, true] {
            for live in [false, true] {
                for url in [None, Some("https://x.daily.co/room"), Some("https://cdn/v.m3u8")] {
                    assert_eq!(
                        select(Some(&s), ever, live, url, None),
                        Presentation::PeerVideo {
                            stream_id: "s1".into()
                        }
                    );
                }
            }
        }
    }

    #[test]
    fn test_connecting_while_live_and_never_received() {
        for url in [None, Some("https://x.daily.co/room"), Some("https://cdn/v.mp4")] {
            assert_eq!(select(None, false, true, url, None), Presentation::Connecting);
        }
    }

    #[test]
    fn test_embedded_room_after_stream_dropped() {
        assert_eq!(
            select(None, true, true, Some("https://x.daily.co/room"), None),
            Presentation::EmbeddedRoom {
                url: "https://x.daily.co/room".into()
            }
        );
    }

    #[test]
    fn test_generic_player_when_not_live() {
        assert_eq!(
            select(None, false, false, Some("https://cdn/v.mp4"), Some("/poster.jpg")),
            Presentation::GenericPlayer {
                url: Some("https://cdn/v.mp4".into()),
                poster: Some("/poster.jpg".into())
            }
        );
        assert_eq!(
            select(None, false, false, None, None),
            Presentation::GenericPlayer {
                url: None,
                poster: None
            }
        );
    }

    #[test]
    fn test_embedded_room_when_not_live() {
        assert_eq!(
            select(None, false, false, Some("https://x.daily.co/room"), None).name(),
            "embedded-room"
        );
    }
}
