use serde::Serialize;
use tracing::{debug, warn};

use crate::analysis::FavoritesAnalysis;
use crate::stats::FavoritesStatistics;
use crate::tmdb::{DiscoverParams, MediaItem, TmdbApi};

/// Discovery criteria derived from the favorites statistics and the
/// director/actor tally. Holds at most 3 genres, 1 director and 2 cast ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecommendationCriteria {
    pub genres: Vec<i64>,
    pub vote_average_min: f32,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub runtime_min: Option<i32>,
    pub runtime_max: Option<i32>,
    pub directors: Vec<i64>,
    pub cast: Vec<i64>,
}

/// A non-empty page of recommendations together with the relaxation level
/// (0-based) that produced it, so the caller can disclose how loose the
/// match is.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationOutcome {
    pub items: Vec<MediaItem>,
    pub fallback_level: usize,
    pub page: i32,
    pub total_pages: i32,
}

pub fn build_criteria(
    stats: &FavoritesStatistics,
    analysis: &FavoritesAnalysis,
    current_year: i32,
) -> RecommendationCriteria {
    let vote_average_min = if stats.avg_rating >= 8.0 {
        7.5
    } else if stats.avg_rating >= 6.0 {
        6.0
    } else {
        0.0
    };

    // Dominant bucket wins; on a tie the earlier bucket does (new, then
    // recent, then old), which also covers the all-zero case.
    let years = &stats.year_distribution;
    let year_buckets = [("new", years.new), ("recent", years.recent), ("old", years.old)];
    let (mut year_min, mut year_max) = (Some(current_year - 10), Some(current_year));
    match dominant(&year_buckets) {
        Some("new") => year_min = Some(current_year - 3),
        Some("old") => {
            year_min = None;
            year_max = Some(current_year - 10);
        }
        _ => {}
    }

    let runtimes = &stats.runtime_distribution;
    let runtime_buckets = [
        ("short", runtimes.short),
        ("medium", runtimes.medium),
        ("long", runtimes.long),
    ];
    let (mut runtime_min, mut runtime_max) = (None, None);
    match dominant(&runtime_buckets) {
        Some("short") => runtime_max = Some(90),
        Some("long") => runtime_min = Some(120),
        Some("medium") => {
            runtime_min = Some(90);
            runtime_max = Some(120);
        }
        _ => {}
    }

    RecommendationCriteria {
        genres: stats.top_genres.iter().take(3).copied().collect(),
        vote_average_min,
        year_min,
        year_max,
        runtime_min,
        runtime_max,
        directors: analysis.top_directors.first().map(|d| d.id).into_iter().collect(),
        cast: analysis.top_actors.iter().take(2).map(|a| a.id).collect(),
    }
}

/// Returns the bucket with the highest non-zero count, earlier entries
/// winning ties. All-zero counts yield `None`.
fn dominant<'a>(buckets: &[(&'a str, usize)]) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;
    for (name, count) in buckets {
        if *count > 0 && best.map(|(_, c)| *count > c).unwrap_or(true) {
            best = Some((name, *count));
        }
    }
    best.map(|(name, _)| name)
}

/// The ordered relaxation ladder. Each level keeps the same page so "more
/// recommendations" can page through whichever level last succeeded.
pub fn fallback_levels(criteria: &RecommendationCriteria, page: i32) -> Vec<DiscoverParams> {
    let full = DiscoverParams {
        genres: criteria.genres.clone(),
        vote_average_min: criteria.vote_average_min,
        vote_average_max: None,
        year_min: criteria.year_min,
        year_max: criteria.year_max,
        runtime_min: criteria.runtime_min,
        runtime_max: criteria.runtime_max,
        directors: criteria.directors.clone(),
        cast: criteria.cast.clone(),
        page,
    };
    vec![
        full.clone(),
        DiscoverParams {
            directors: vec![],
            ..full.clone()
        },
        DiscoverParams {
            directors: vec![],
            cast: vec![],
            ..full.clone()
        },
        DiscoverParams {
            genres: criteria.genres.clone(),
            vote_average_min: criteria.vote_average_min,
            page,
            ..Default::default()
        },
        DiscoverParams {
            genres: criteria.genres.clone(),
            page,
            ..Default::default()
        },
    ]
}

/// Tries each relaxation level in order until one returns a non-empty page.
/// A request failure is treated exactly like an empty result: logged and
/// escalated. `None` means every level came back empty, which is a normal
/// user-visible outcome rather than an error. Already-favorited ids are
/// filtered out of the winning page before it is returned.
pub async fn fetch_with_fallback(
    tmdb: &dyn TmdbApi,
    criteria: &RecommendationCriteria,
    page: i32,
    exclude: &[i64],
) -> Option<RecommendationOutcome> {
    for (level, params) in fallback_levels(criteria, page).into_iter().enumerate() {
        match tmdb.discover(&params).await {
            Ok(listing) if !listing.results.is_empty() => {
                debug!(
                    "Recommendation query succeeded at fallback level {} with {} results",
                    level,
                    listing.results.len()
                );
                let items = listing
                    .results
                    .into_iter()
                    .filter(|m| !exclude.contains(&m.id))
                    .collect();
                return Some(RecommendationOutcome {
                    items,
                    fallback_level: level,
                    page: listing.page,
                    total_pages: listing.total_pages,
                });
            }
            Ok(_) => debug!("Fallback level {} returned no results", level),
            Err(e) => warn!("Fallback level {} failed, escalating: {:#}", level, e),
        }
    }
    None
}
