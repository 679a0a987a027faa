// Workout video catalog backed by the YouTube Data API

use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::TetsundoError;
use crate::watch::VideoId;

const API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_CHANNEL_ID: &str = "UCw7HTQv0F4CB9zGRhqosYsg";
pub const DEFAULT_MAX_RESULTS: u32 = 30;
pub const DEFAULT_RECOMMENDATION_COUNT: usize = 6;

#[derive(Clone, Debug, PartialEq)]
pub struct VideoInfo {
    pub id: VideoId,
    pub title: String,
    pub thumbnail_url: Option<String>,
    /// ISO 8601 duration as reported by the API, e.g. `PT12M30S`
    pub duration: String,
}

impl VideoInfo {
    pub fn duration_seconds(&self) -> Option<u64> {
        parse_iso_duration(&self.duration)
    }

    /// `h:mm:ss` or `mm:ss`, `"unknown"` when the duration does not parse.
    pub fn formatted_duration(&self) -> String {
        match self.duration_seconds() {
            Some(total) => {
                let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);
                if hours > 0 {
                    format!("{}:{:02}:{:02}", hours, minutes, seconds)
                } else {
                    format!("{:02}:{:02}", minutes, seconds)
                }
            }
            None => "unknown".to_string(),
        }
    }
}

fn iso_duration_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^P(?:(\d+)D)?T?(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").ok())
        .as_ref()
}

fn parse_iso_duration(duration: &str) -> Option<u64> {
    if duration == "P" || duration == "PT" {
        return None;
    }
    let caps = iso_duration_pattern()?.captures(duration)?;
    let part = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    Some(part(1) * 86_400 + part(2) * 3600 + part(3) * 60 + part(4))
}

/// Source of candidate workout videos.
pub trait VideoCatalog {
    /// Fetch the candidate videos. One attempt, no retry.
    fn fetch_videos(&self) -> Result<Vec<VideoInfo>, TetsundoError>;
}

/// Result of a recommendation request. On failure `videos` is empty and
/// `message` says why, for display.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Recommendations {
    pub videos: Vec<VideoInfo>,
    pub message: Option<String>,
}

/// Pick `count` random videos from the catalog.
pub fn recommend(catalog: &dyn VideoCatalog, count: usize) -> Recommendations {
    recommend_with_rng(catalog, count, &mut rand::thread_rng())
}

pub fn recommend_with_rng<R: Rng + ?Sized>(
    catalog: &dyn VideoCatalog,
    count: usize,
    rng: &mut R,
) -> Recommendations {
    match catalog.fetch_videos() {
        Ok(mut videos) => {
            videos.shuffle(rng);
            videos.truncate(count);
            Recommendations {
                videos,
                message: None,
            }
        }
        Err(e) => {
            log::warn!("Could not fetch recommended videos: {}", e);
            Recommendations {
                videos: Vec::new(),
                message: Some(user_message(&e)),
            }
        }
    }
}

fn user_message(error: &TetsundoError) -> String {
    match error {
        TetsundoError::MissingApiKey => "YouTube API key is not configured".to_string(),
        TetsundoError::CatalogEmpty { .. } => "No videos were found".to_string(),
        _ => "Something went wrong while fetching videos".to_string(),
    }
}

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize, Debug)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Deserialize, Debug)]
struct DetailsResponse {
    #[serde(default)]
    items: Vec<DetailsItem>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DetailsItem {
    id: String,
    snippet: Snippet,
    content_details: ContentDetails,
}

#[derive(Deserialize, Debug)]
struct Snippet {
    title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Deserialize, Debug, Default)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Deserialize, Debug)]
struct Thumbnail {
    url: String,
}

#[derive(Deserialize, Debug)]
struct ContentDetails {
    duration: String,
}

fn video_ids_from_search(response: SearchResponse) -> Result<Vec<String>, TetsundoError> {
    let ids: Vec<String> = response
        .items
        .into_iter()
        .filter_map(|item| item.id.video_id)
        .collect();
    if ids.is_empty() {
        return Err(TetsundoError::CatalogEmpty {
            reason: "search returned no videos".to_string(),
        });
    }
    Ok(ids)
}

fn videos_from_details(response: DetailsResponse) -> Result<Vec<VideoInfo>, TetsundoError> {
    let videos: Vec<VideoInfo> = response
        .items
        .into_iter()
        .filter_map(|item| {
            let id = match VideoId::parse(&item.id) {
                Ok(id) => id,
                Err(e) => {
                    log::warn!("Skipping catalog entry: {}", e);
                    return None;
                }
            };
            let Thumbnails {
                high,
                medium,
                default,
            } = item.snippet.thumbnails;
            Some(VideoInfo {
                id,
                title: item.snippet.title,
                thumbnail_url: high.or(medium).or(default).map(|t| t.url),
                duration: item.content_details.duration,
            })
        })
        .collect();
    if videos.is_empty() {
        return Err(TetsundoError::CatalogEmpty {
            reason: "no video details returned".to_string(),
        });
    }
    Ok(videos)
}

/// Latest videos of one YouTube channel.
pub struct YouTubeCatalog {
    client: reqwest::Client,
    api_key: Option<String>,
    channel_id: String,
    max_results: u32,
}

impl YouTubeCatalog {
    pub fn new(api_key: Option<String>, channel_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            channel_id: channel_id.into(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    async fn fetch(&self, api_key: &str) -> Result<Vec<VideoInfo>, TetsundoError> {
        let max_results = self.max_results.to_string();
        log::debug!("Searching channel {} for videos", self.channel_id);
        let search: SearchResponse = self
            .client
            .get(format!("{}/search", API_BASE_URL))
            .query(&[
                ("part", "snippet"),
                ("channelId", self.channel_id.as_str()),
                ("maxResults", max_results.as_str()),
                ("type", "video"),
                ("key", api_key),
            ])
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| TetsundoError::CatalogRequestError { source: e })?
            .json()
            .await
            .map_err(|e| TetsundoError::CatalogRequestError { source: e })?;

        let ids = video_ids_from_search(search)?.join(",");
        let details: DetailsResponse = self
            .client
            .get(format!("{}/videos", API_BASE_URL))
            .query(&[
                ("part", "snippet,contentDetails"),
                ("id", ids.as_str()),
                ("key", api_key),
            ])
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| TetsundoError::CatalogRequestError { source: e })?
            .json()
            .await
            .map_err(|e| TetsundoError::CatalogRequestError { source: e })?;

        videos_from_details(details)
    }
}

impl VideoCatalog for YouTubeCatalog {
    fn fetch_videos(&self) -> Result<Vec<VideoInfo>, TetsundoError> {
        let api_key = self.api_key.as_deref().ok_or(TetsundoError::MissingApiKey)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TetsundoError::RuntimeError { source: e })?;
        let videos = runtime.block_on(self.fetch(api_key))?;
        log::info!("Fetched {} videos from the catalog", videos.len());
        Ok(videos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct StaticCatalog(Vec<VideoInfo>);

    impl VideoCatalog for StaticCatalog {
        fn fetch_videos(&self) -> Result<Vec<VideoInfo>, TetsundoError> {
            if self.0.is_empty() {
                return Err(TetsundoError::CatalogEmpty {
                    reason: "static catalog".to_string(),
                });
            }
            Ok(self.0.clone())
        }
    }

    fn video(n: usize) -> VideoInfo {
        VideoInfo {
            id: VideoId::parse(&format!("video{:06}", n)).unwrap(),
            title: format!("Workout {}", n),
            thumbnail_url: None,
            duration: "PT10M".to_string(),
        }
    }

    #[test]
    fn test_parse_iso_duration() {
        assert_eq!(parse_iso_duration("PT12M30S"), Some(750));
        assert_eq!(parse_iso_duration("PT1H2M3S"), Some(3723));
        assert_eq!(parse_iso_duration("PT45S"), Some(45));
        assert_eq!(parse_iso_duration("P1DT1S"), Some(86_401));
        assert_eq!(parse_iso_duration("PT"), None);
        assert_eq!(parse_iso_duration("12:30"), None);
    }

    #[test]
    fn test_formatted_duration() {
        let mut info = video(1);
        info.duration = "PT5M7S".to_string();
        assert_eq!(info.formatted_duration(), "05:07");
        info.duration = "PT1H0M9S".to_string();
        assert_eq!(info.formatted_duration(), "1:00:09");
        info.duration = "garbage".to_string();
        assert_eq!(info.formatted_duration(), "unknown");
    }

    #[test]
    fn test_parse_api_responses() {
        let search: SearchResponse = serde_json::from_str(
            r#"{"items": [
                {"id": {"kind": "youtube#video", "videoId": "dQw4w9WgXcQ"}},
                {"id": {"kind": "youtube#playlist", "playlistId": "PL123"}},
                {"id": {"kind": "youtube#video", "videoId": "M7lc1UVf-VE"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            video_ids_from_search(search).unwrap(),
            vec!["dQw4w9WgXcQ", "M7lc1UVf-VE"]
        );

        let details: DetailsResponse = serde_json::from_str(
            r#"{"items": [
                {"id": "dQw4w9WgXcQ",
                 "snippet": {"title": "Morning stretch", "thumbnails": {"high": {"url": "https://i.ytimg.com/hq.jpg"}}},
                 "contentDetails": {"duration": "PT15M2S"}},
                {"id": "M7lc1UVf-VE",
                 "snippet": {"title": "Core", "thumbnails": {"default": {"url": "https://i.ytimg.com/d.jpg"}}},
                 "contentDetails": {"duration": "PT8M"}}
            ]}"#,
        )
        .unwrap();
        let videos = videos_from_details(details).unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].title, "Morning stretch");
        assert_eq!(videos[0].duration_seconds(), Some(902));
        assert_eq!(videos[1].thumbnail_url.as_deref(), Some("https://i.ytimg.com/d.jpg"));
    }

    #[test]
    fn test_empty_responses_are_errors() {
        let search: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            video_ids_from_search(search),
            Err(TetsundoError::CatalogEmpty { .. })
        ));
        let details: DetailsResponse = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert!(matches!(
            videos_from_details(details),
            Err(TetsundoError::CatalogEmpty { .. })
        ));
    }

    #[test]
    fn test_recommend_keeps_a_random_subset() {
        let catalog = StaticCatalog((0..30).map(video).collect());
        let mut rng = StdRng::seed_from_u64(7);
        let recommendations = recommend_with_rng(&catalog, DEFAULT_RECOMMENDATION_COUNT, &mut rng);

        assert!(recommendations.message.is_none());
        assert_eq!(recommendations.videos.len(), 6);
        let mut ids: Vec<&str> = recommendations.videos.iter().map(|v| v.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn test_recommend_with_fewer_videos_than_requested() {
        let catalog = StaticCatalog((0..3).map(video).collect());
        assert_eq!(recommend(&catalog, 6).videos.len(), 3);
    }

    #[test]
    fn test_failure_gives_empty_list_and_message() {
        let recommendations = recommend(&StaticCatalog(Vec::new()), 6);
        assert!(recommendations.videos.is_empty());
        assert_eq!(recommendations.message.as_deref(), Some("No videos were found"));

        let catalog = YouTubeCatalog::new(Some("  ".to_string()), DEFAULT_CHANNEL_ID);
        let recommendations = recommend(&catalog, 6);
        assert!(recommendations.videos.is_empty());
        assert_eq!(
            recommendations.message.as_deref(),
            Some("YouTube API key is not configured")
        );
    }
}
