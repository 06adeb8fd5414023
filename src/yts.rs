use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const YTS_BASE: &str = "https://yts.mx/api/v2";
const SEARCH_LIMIT: u32 = 10;

const TRACKERS: &[&str] = &[
    "udp://glotorrents.pw:6969/announce",
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://torrent.gresille.org:80/announce",
    "udp://tracker.openbittorrent.com:80",
    "udp://tracker.coppersurfer.tk:6969",
    "udp://tracker.leechers-paradise.org:6969",
    "udp://p4p.arenabg.ch:1337",
    "udp://tracker.internetwarriors.net:1337",
];

#[derive(Debug, Clone)]
pub struct YtsClient {
    client: Client,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtsTorrent {
    pub hash: String,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub seeds: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtsMovie {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub imdb_code: Option<String>,
    #[serde(default)]
    pub medium_cover_image: Option<String>,
    #[serde(default)]
    pub torrents: Vec<YtsTorrent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YtsListData {
    #[serde(default)]
    pub movie_count: i64,
    #[serde(default)]
    pub movies: Vec<YtsMovie>,
}

#[derive(Debug, Deserialize)]
struct YtsListResponse {
    status: String,
    #[serde(default)]
    data: Option<YtsListData>,
}

#[derive(Debug, Deserialize)]
struct YtsDetailsData {
    movie: YtsMovie,
}

#[derive(Debug, Deserialize)]
struct YtsDetailsResponse {
    status: String,
    #[serde(default)]
    data: Option<YtsDetailsData>,
}

#[derive(Debug, Deserialize)]
struct YtsSuggestionsData {
    #[serde(default)]
    movies: Vec<YtsMovie>,
}

#[derive(Debug, Deserialize)]
struct YtsSuggestionsResponse {
    status: String,
    #[serde(default)]
    data: Option<YtsSuggestionsData>,
}

#[async_trait]
pub trait YtsApi: Send + Sync {
    async fn search(&self, title: &str, year: Option<i32>) -> Result<YtsListData>;
    async fn movie_details(&self, movie_id: i64) -> Result<Option<YtsMovie>>;
    async fn suggestions(&self, movie_id: i64) -> Result<Vec<YtsMovie>>;
    async fn availability(&self, imdb_id: &str) -> Result<Option<YtsMovie>>;
}

impl YtsClient {
    pub fn new() -> Result<Self> {
        let user_agent = format!("cinetaste/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build YTS HTTP client")?;
        Ok(Self { client })
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
}

#[async_trait]
impl YtsApi for YtsClient {
    async fn search(&self, title: &str, year: Option<i32>) -> Result<YtsListData> {
        let cleaned = clean_title(title);
        // YTS only indexes Latin titles; with nothing left after cleaning,
        // the year is a better query term than an empty string.
        let query = match (cleaned.len() < 2, year) {
            (true, Some(y)) => y.to_string(),
            _ => cleaned,
        };
        let mut url = format!(
            "{YTS_BASE}/list_movies.json?query_term={}&limit={SEARCH_LIMIT}&sort_by=download_count&order_by=desc",
            urlencoding::encode(&query)
        );
        if let Some(y) = year {
            url.push_str(&format!("&year={y}"));
        }
        let res: YtsListResponse = self.get_json(&url).await?;
        if res.status != "ok" {
            return Err(anyhow!("YTS search returned status {}", res.status));
        }
        Ok(res.data.unwrap_or_default())
    }

    async fn movie_details(&self, movie_id: i64) -> Result<Option<YtsMovie>> {
        let url = format!(
            "{YTS_BASE}/movie_details.json?movie_id={movie_id}&with_images=true&with_cast=true"
        );
        let res: YtsDetailsResponse = self.get_json(&url).await?;
        if res.status != "ok" {
            return Ok(None);
        }
        Ok(res.data.map(|d| d.movie))
    }

    async fn suggestions(&self, movie_id: i64) -> Result<Vec<YtsMovie>> {
        let url = format!("{YTS_BASE}/movie_suggestions.json?movie_id={movie_id}");
        let res: YtsSuggestionsResponse = self.get_json(&url).await?;
        if res.status != "ok" {
            return Ok(Vec::new());
        }
        Ok(res.data.map(|d| d.movies).unwrap_or_default())
    }

    async fn availability(&self, imdb_id: &str) -> Result<Option<YtsMovie>> {
        let url = format!(
            "{YTS_BASE}/list_movies.json?query_term={}&limit=1",
            urlencoding::encode(imdb_id)
        );
        let res: YtsListResponse = self.get_json(&url).await?;
        if res.status != "ok" {
            return Ok(None);
        }
        Ok(res
            .data
            .filter(|d| d.movie_count > 0)
            .and_then(|d| d.movies.into_iter().next()))
    }
}

/// Strips everything but ASCII word characters and whitespace, then drops
/// one-letter words. YTS search chokes on Arabic titles and punctuation.
pub fn clean_title(title: &str) -> String {
    let filtered: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    filtered
        .split_whitespace()
        .filter(|word| word.len() > 1)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn magnet_link(hash: &str, title: &str) -> String {
    let mut link = format!(
        "magnet:?xt=urn:btih:{hash}&dn={}",
        urlencoding::encode(title)
    );
    for tracker in TRACKERS {
        link.push_str("&tr=");
        link.push_str(tracker);
    }
    link
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning_strips_non_latin_and_short_words() {
        assert_eq!(clean_title("The Matrix (1999)"), "The Matrix 1999");
        assert_eq!(clean_title("فيلم Inception رائع"), "Inception");
        assert_eq!(clean_title("A I"), "");
    }

    #[test]
    fn magnet_link_carries_hash_title_and_trackers() {
        let link = magnet_link("ABC123", "Some Movie");
        assert!(link.starts_with("magnet:?xt=urn:btih:ABC123&dn=Some%20Movie"));
        assert_eq!(link.matches("&tr=").count(), TRACKERS.len());
        assert!(link.contains("udp://tracker.opentrackr.org:1337/announce"));
    }
}
