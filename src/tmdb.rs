use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

const TMDB_BASE: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
const LANG: &str = "ar";

// Discover queries require a minimum number of votes so obscure titles with
// a handful of 10/10 ratings don't dominate the results.
const DISCOVER_MIN_VOTES: u32 = 100;
const AWARD_MIN_VOTES: u32 = 1000;
const AWARD_MIN_RATING: f32 = 8.0;
const AWARD_KEYWORDS: &str = "207317|265|9914";
const ASIAN_LANGUAGES: &str = "ko|ja|zh|th";

/// Baseline genre table used when the live genre list is unavailable.
pub static COMMON_GENRES: Lazy<Vec<Genre>> = Lazy::new(|| {
    vec![
        Genre { id: 28, name: "Action".to_string() },
        Genre { id: 18, name: "Drama".to_string() },
        Genre { id: 35, name: "Comedy".to_string() },
        Genre { id: 27, name: "Horror".to_string() },
        Genre { id: 10749, name: "Romance".to_string() },
        Genre { id: 878, name: "Science Fiction".to_string() },
        Genre { id: 16, name: "Animation".to_string() },
        Genre { id: 99, name: "Documentary".to_string() },
    ]
});

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    pub fn as_path(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum TrendingKind {
    All,
    Movie,
    Tv,
}

impl TrendingKind {
    fn as_path(&self) -> &'static str {
        match self {
            TrendingKind::All => "all",
            TrendingKind::Movie => "movie",
            TrendingKind::Tv => "tv",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum TimeWindow {
    Day,
    Week,
}

impl TimeWindow {
    fn as_path(&self) -> &'static str {
        match self {
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
        }
    }
}

/// A single listing entry as TMDB returns it from trending, top-rated,
/// discover and search endpoints. `title` is populated for movies, `name`
/// for TV shows; both stay optional because the multi-search endpoint mixes
/// kinds in one result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub vote_average: f32,
    #[serde(default)]
    pub vote_count: i64,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub runtime: Option<i64>,
}

impl MediaItem {
    pub fn is_movie_like(&self) -> bool {
        self.title.is_some() || self.media_type.as_deref() == Some("movie")
    }

    pub fn is_tv_like(&self) -> bool {
        self.name.is_some() || self.media_type.as_deref() == Some("tv")
    }

    /// Release year taken from whichever date field is present.
    pub fn release_year(&self) -> Option<i32> {
        self.release_date
            .as_deref()
            .or(self.first_air_date.as_deref())
            .and_then(extract_year)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingPage {
    pub page: i32,
    pub results: Vec<MediaItem>,
    #[serde(default)]
    pub total_pages: i32,
    #[serde(default)]
    pub total_results: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastMember {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewMember {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub job: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub site: String,
    #[serde(rename = "type")]
    pub video_type: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Videos {
    #[serde(default)]
    pub results: Vec<Video>,
}

/// Full detail record with appended credits and videos, shared between the
/// movie and TV detail endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDetails {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub vote_average: f32,
    #[serde(default)]
    pub vote_count: i64,
    #[serde(default)]
    pub runtime: Option<i64>,
    #[serde(default)]
    pub number_of_seasons: Option<i32>,
    #[serde(default)]
    pub number_of_episodes: Option<i32>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub credits: Option<Credits>,
    #[serde(default)]
    pub videos: Option<Videos>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonDetails {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
    #[serde(default)]
    pub known_for_department: Option<String>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub place_of_birth: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonCredits {
    #[serde(default)]
    pub cast: Vec<MediaItem>,
    #[serde(default)]
    pub crew: Vec<MediaItem>,
}

/// Parameters for the recommendation discover query. Empty/`None` fields are
/// simply omitted from the request, which is what the fallback levels rely on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoverParams {
    pub genres: Vec<i64>,
    pub vote_average_min: f32,
    pub vote_average_max: Option<f32>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub runtime_min: Option<i32>,
    pub runtime_max: Option<i32>,
    pub directors: Vec<i64>,
    pub cast: Vec<i64>,
    pub page: i32,
}

#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn trending(&self, kind: TrendingKind, window: TimeWindow) -> Result<ListingPage>;
    async fn top_rated(&self, kind: MediaKind, page: i32) -> Result<ListingPage>;
    async fn by_genre(&self, kind: MediaKind, genre_id: i64, page: i32) -> Result<ListingPage>;
    async fn asian_catalog(&self, kind: MediaKind, page: i32) -> Result<ListingPage>;
    async fn award_winners(&self, page: i32) -> Result<ListingPage>;
    async fn search_multi(&self, query: &str, page: i32) -> Result<ListingPage>;
    async fn genre_list(&self, kind: MediaKind) -> Result<Vec<Genre>>;
    async fn details(&self, kind: MediaKind, id: i64) -> Result<MediaDetails>;
    async fn person_details(&self, id: i64) -> Result<PersonDetails>;
    async fn person_credits(&self, kind: MediaKind, id: i64) -> Result<PersonCredits>;
    async fn discover(&self, params: &DiscoverParams) -> Result<ListingPage>;
}

impl TmdbClient {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("TMDB_API_KEY").context("TMDB_API_KEY not set")?;
        let user_agent = format!("cinetaste/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self { client, api_key })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {}", url, text));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }

    fn discover_url(&self, params: &DiscoverParams) -> String {
        let mut url = format!(
            "{TMDB_BASE}/discover/movie?api_key={}&language={LANG}&sort_by=popularity.desc&include_adult=false&vote_count.gte={DISCOVER_MIN_VOTES}&vote_average.gte={}&page={}",
            self.api_key,
            params.vote_average_min,
            params.page.max(1)
        );
        if let Some(max) = params.vote_average_max {
            url.push_str(&format!("&vote_average.lte={max}"));
        }
        if let Some(year) = params.year_min {
            url.push_str(&format!("&primary_release_date.gte={year}-01-01"));
        }
        if let Some(year) = params.year_max {
            url.push_str(&format!("&primary_release_date.lte={year}-12-31"));
        }
        if let Some(min) = params.runtime_min {
            url.push_str(&format!("&with_runtime.gte={min}"));
        }
        if let Some(max) = params.runtime_max {
            url.push_str(&format!("&with_runtime.lte={max}"));
        }
        if !params.genres.is_empty() {
            url.push_str(&format!("&with_genres={}", join_ids(&params.genres, "|")));
        }
        // TMDB accepts a single crew id but a comma list of cast ids.
        if let Some(director) = params.directors.first() {
            url.push_str(&format!("&with_crew={director}"));
        }
        if !params.cast.is_empty() {
            let cast: Vec<i64> = params.cast.iter().take(2).copied().collect();
            url.push_str(&format!("&with_cast={}", join_ids(&cast, ",")));
        }
        url
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn trending(&self, kind: TrendingKind, window: TimeWindow) -> Result<ListingPage> {
        let url = format!(
            "{TMDB_BASE}/trending/{}/{}?api_key={}&language={LANG}",
            kind.as_path(),
            window.as_path(),
            self.api_key
        );
        self.get_json(&url).await
    }

    async fn top_rated(&self, kind: MediaKind, page: i32) -> Result<ListingPage> {
        let url = format!(
            "{TMDB_BASE}/{}/top_rated?api_key={}&language={LANG}&page={}",
            kind.as_path(),
            self.api_key,
            page.max(1)
        );
        self.get_json(&url).await
    }

    async fn by_genre(&self, kind: MediaKind, genre_id: i64, page: i32) -> Result<ListingPage> {
        let url = format!(
            "{TMDB_BASE}/discover/{}?api_key={}&language={LANG}&with_genres={}&page={}",
            kind.as_path(),
            self.api_key,
            genre_id,
            page.max(1)
        );
        self.get_json(&url).await
    }

    async fn asian_catalog(&self, kind: MediaKind, page: i32) -> Result<ListingPage> {
        let url = format!(
            "{TMDB_BASE}/discover/{}?api_key={}&language={LANG}&with_original_language={}&sort_by=popularity.desc&page={}",
            kind.as_path(),
            self.api_key,
            urlencoding::encode(ASIAN_LANGUAGES),
            page.max(1)
        );
        self.get_json(&url).await
    }

    async fn award_winners(&self, page: i32) -> Result<ListingPage> {
        let url = format!(
            "{TMDB_BASE}/discover/movie?api_key={}&language={LANG}&sort_by=vote_average.desc&vote_count.gte={AWARD_MIN_VOTES}&vote_average.gte={AWARD_MIN_RATING}&with_keywords={}&page={}",
            self.api_key,
            urlencoding::encode(AWARD_KEYWORDS),
            page.max(1)
        );
        self.get_json(&url).await
    }

    async fn search_multi(&self, query: &str, page: i32) -> Result<ListingPage> {
        let url = format!(
            "{TMDB_BASE}/search/multi?api_key={}&language={LANG}&query={}&page={}",
            self.api_key,
            urlencoding::encode(query),
            page.max(1)
        );
        self.get_json(&url).await
    }

    async fn genre_list(&self, kind: MediaKind) -> Result<Vec<Genre>> {
        #[derive(Deserialize)]
        struct GenreListResponse {
            genres: Vec<Genre>,
        }

        let url = format!(
            "{TMDB_BASE}/genre/{}/list?api_key={}&language={LANG}",
            kind.as_path(),
            self.api_key
        );
        let data: GenreListResponse = self.get_json(&url).await?;
        Ok(data.genres)
    }

    async fn details(&self, kind: MediaKind, id: i64) -> Result<MediaDetails> {
        let url = format!(
            "{TMDB_BASE}/{}/{id}?api_key={}&language={LANG}&append_to_response=videos,credits",
            kind.as_path(),
            self.api_key
        );
        self.get_json(&url).await
    }

    async fn person_details(&self, id: i64) -> Result<PersonDetails> {
        let url = format!(
            "{TMDB_BASE}/person/{id}?api_key={}&language={LANG}",
            self.api_key
        );
        self.get_json(&url).await
    }

    async fn person_credits(&self, kind: MediaKind, id: i64) -> Result<PersonCredits> {
        let url = format!(
            "{TMDB_BASE}/person/{id}/{}_credits?api_key={}&language={LANG}",
            kind.as_path(),
            self.api_key
        );
        self.get_json(&url).await
    }

    async fn discover(&self, params: &DiscoverParams) -> Result<ListingPage> {
        let url = self.discover_url(params);
        self.get_json(&url).await
    }
}

pub fn image_url(path: Option<&str>, size: &str) -> Option<String> {
    path.map(|p| format!("{IMAGE_BASE}/{size}{p}"))
}

pub fn extract_year(date: &str) -> Option<i32> {
    date.split('-').next().and_then(|s| s.parse().ok())
}

/// Picks a YouTube trailer from a detail's appended videos, falling back to a
/// teaser when no trailer exists.
pub fn select_trailer(videos: &Videos) -> Option<String> {
    videos
        .results
        .iter()
        .find(|v| v.site.eq_ignore_ascii_case("YouTube") && v.video_type == "Trailer")
        .or_else(|| {
            videos
                .results
                .iter()
                .find(|v| v.site.eq_ignore_ascii_case("YouTube") && v.video_type == "Teaser")
        })
        .map(|v| format!("https://www.youtube.com/watch?v={}", v.key))
}

fn join_ids(ids: &[i64], sep: &str) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TmdbClient {
        TmdbClient {
            client: Client::new(),
            api_key: "k".to_string(),
        }
    }

    #[test]
    fn extracts_year_from_date() {
        assert_eq!(extract_year("2023-05-01"), Some(2023));
        assert_eq!(extract_year("bogus"), None);
    }

    #[test]
    fn builds_image_url() {
        assert_eq!(
            image_url(Some("/abc.jpg"), "w500").as_deref(),
            Some("https://image.tmdb.org/t/p/w500/abc.jpg")
        );
        assert_eq!(image_url(None, "w500"), None);
    }

    #[test]
    fn item_with_title_and_name_counts_as_both() {
        let item = MediaItem {
            id: 1,
            title: Some("Both".to_string()),
            name: Some("Both".to_string()),
            poster_path: None,
            backdrop_path: None,
            overview: String::new(),
            release_date: None,
            first_air_date: None,
            vote_average: 0.0,
            vote_count: 0,
            genre_ids: vec![],
            media_type: None,
            runtime: None,
        };
        assert!(item.is_movie_like());
        assert!(item.is_tv_like());
    }

    #[test]
    fn discover_url_includes_only_set_criteria() {
        let url = client().discover_url(&DiscoverParams {
            genres: vec![28, 18],
            vote_average_min: 7.5,
            year_min: Some(2015),
            runtime_max: Some(90),
            directors: vec![525, 1000],
            cast: vec![6193, 287, 500],
            page: 2,
            ..Default::default()
        });
        assert!(url.contains("vote_average.gte=7.5"));
        assert!(url.contains("primary_release_date.gte=2015-01-01"));
        assert!(!url.contains("primary_release_date.lte"));
        assert!(url.contains("with_runtime.lte=90"));
        assert!(!url.contains("with_runtime.gte"));
        assert!(url.contains("with_genres=28|18"));
        // single crew id, at most two cast ids
        assert!(url.contains("with_crew=525"));
        assert!(!url.contains("with_crew=525,"));
        assert!(url.contains("with_cast=6193,287"));
        assert!(!url.contains("287,500"));
        assert!(url.contains("page=2"));
        assert!(url.contains("vote_count.gte=100"));
    }

    #[test]
    fn discover_url_omits_people_when_empty() {
        let url = client().discover_url(&DiscoverParams {
            genres: vec![28],
            page: 1,
            ..Default::default()
        });
        assert!(!url.contains("with_crew"));
        assert!(!url.contains("with_cast"));
        assert!(url.contains("with_genres=28"));
    }

    #[test]
    fn selects_trailer_before_teaser() {
        let videos = Videos {
            results: vec![
                Video {
                    site: "YouTube".to_string(),
                    video_type: "Teaser".to_string(),
                    key: "t1".to_string(),
                },
                Video {
                    site: "YouTube".to_string(),
                    video_type: "Trailer".to_string(),
                    key: "t2".to_string(),
                },
            ],
        };
        assert_eq!(
            select_trailer(&videos).as_deref(),
            Some("https://www.youtube.com/watch?v=t2")
        );
    }
}
