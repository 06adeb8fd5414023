use serde::Serialize;
use std::collections::HashMap;

use crate::tmdb::MediaItem;

/// Rating buckets over the movie-like favorites: `high` >= 8,
/// `medium` in [6, 8), `low` < 6.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RatingDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Release-year buckets relative to the supplied current year:
/// `new` within the last 3 years, `recent` 3-10 years back, `old` older
/// than 10 years. Items with no parseable date count as year 0, i.e. `old`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct YearDistribution {
    pub new: usize,
    pub recent: usize,
    pub old: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeDistribution {
    pub short: usize,
    pub medium: usize,
    pub long: usize,
    pub unknown: usize,
}

/// View-model over the favorites list, recomputed on demand and never
/// persisted. Genre and rating figures cover movie-like favorites only.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FavoritesStatistics {
    pub total_movies: usize,
    pub total_tv_shows: usize,
    pub avg_rating: f32,
    pub rating_distribution: RatingDistribution,
    pub year_distribution: YearDistribution,
    pub runtime_distribution: RuntimeDistribution,
    pub genre_counts: HashMap<i64, usize>,
    pub top_genres: Vec<i64>,
}

const TOP_GENRES: usize = 3;

pub fn compute_statistics(favorites: &[MediaItem], current_year: i32) -> FavoritesStatistics {
    let movies: Vec<&MediaItem> = favorites.iter().filter(|m| m.is_movie_like()).collect();
    let tv_shows = favorites.iter().filter(|m| m.is_tv_like()).count();

    let avg_rating = if movies.is_empty() {
        0.0
    } else {
        movies.iter().map(|m| m.vote_average).sum::<f32>() / movies.len() as f32
    };

    let mut rating = RatingDistribution::default();
    for m in &movies {
        if m.vote_average >= 8.0 {
            rating.high += 1;
        } else if m.vote_average >= 6.0 {
            rating.medium += 1;
        } else {
            rating.low += 1;
        }
    }

    let mut years = YearDistribution::default();
    for m in &movies {
        let year = m.release_year().unwrap_or(0);
        if year >= current_year - 3 {
            years.new += 1;
        } else if year >= current_year - 10 {
            years.recent += 1;
        } else {
            years.old += 1;
        }
    }

    let mut runtimes = RuntimeDistribution::default();
    for m in &movies {
        match m.runtime {
            // TMDB reports 0 when the runtime is not on file.
            Some(0) | None => runtimes.unknown += 1,
            Some(r) if r < 90 => runtimes.short += 1,
            Some(r) if r <= 120 => runtimes.medium += 1,
            Some(_) => runtimes.long += 1,
        }
    }

    let mut genre_counts: HashMap<i64, usize> = HashMap::new();
    for m in &movies {
        for genre_id in &m.genre_ids {
            *genre_counts.entry(*genre_id).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(i64, usize)> = genre_counts.iter().map(|(g, c)| (*g, *c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let top_genres = ranked.into_iter().take(TOP_GENRES).map(|(g, _)| g).collect();

    FavoritesStatistics {
        total_movies: movies.len(),
        total_tv_shows: tv_shows,
        avg_rating,
        rating_distribution: rating,
        year_distribution: years,
        runtime_distribution: runtimes,
        genre_counts,
        top_genres,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: i64, vote: f32, date: &str, runtime: Option<i64>, genres: &[i64]) -> MediaItem {
        MediaItem {
            id,
            title: Some(format!("Movie {id}")),
            name: None,
            poster_path: None,
            backdrop_path: None,
            overview: String::new(),
            release_date: Some(date.to_string()),
            first_air_date: None,
            vote_average: vote,
            vote_count: 100,
            genre_ids: genres.to_vec(),
            media_type: Some("movie".to_string()),
            runtime,
        }
    }

    fn show(id: i64) -> MediaItem {
        MediaItem {
            id,
            title: None,
            name: Some(format!("Show {id}")),
            poster_path: None,
            backdrop_path: None,
            overview: String::new(),
            release_date: None,
            first_air_date: Some("2020-01-01".to_string()),
            vote_average: 8.5,
            vote_count: 100,
            genre_ids: vec![18],
            media_type: Some("tv".to_string()),
            runtime: None,
        }
    }

    #[test]
    fn empty_favorites_yield_all_zero() {
        let stats = compute_statistics(&[], 2025);
        assert_eq!(stats.total_movies, 0);
        assert_eq!(stats.total_tv_shows, 0);
        assert_eq!(stats.avg_rating, 0.0);
        assert_eq!(stats.rating_distribution, RatingDistribution::default());
        assert_eq!(stats.year_distribution, YearDistribution::default());
        assert_eq!(stats.runtime_distribution, RuntimeDistribution::default());
        assert!(stats.top_genres.is_empty());
    }

    #[test]
    fn single_favorite_scenario() {
        let favs = vec![movie(1, 9.0, "2023-05-01", Some(85), &[28])];
        let stats = compute_statistics(&favs, 2025);
        assert_eq!(stats.avg_rating, 9.0);
        assert_eq!(stats.rating_distribution.high, 1);
        assert_eq!(stats.year_distribution.new, 1);
        assert_eq!(stats.runtime_distribution.short, 1);
        assert_eq!(stats.top_genres, vec![28]);
    }

    #[test]
    fn tv_favorites_are_excluded_from_movie_stats() {
        let favs = vec![movie(1, 5.0, "2010-01-01", Some(100), &[35]), show(2)];
        let stats = compute_statistics(&favs, 2025);
        assert_eq!(stats.total_movies, 1);
        assert_eq!(stats.total_tv_shows, 1);
        assert_eq!(stats.avg_rating, 5.0);
        assert_eq!(stats.rating_distribution.low, 1);
        assert_eq!(stats.rating_distribution.high, 0);
        assert_eq!(stats.genre_counts.get(&18), None);
    }

    #[test]
    fn buckets_use_direct_thresholds() {
        let favs = vec![
            movie(1, 8.0, "2024-06-01", Some(89), &[28]),
            movie(2, 6.0, "2018-06-01", Some(90), &[28]),
            movie(3, 5.9, "2000-06-01", Some(120), &[18]),
            movie(4, 7.0, "2015-06-01", Some(121), &[18]),
            movie(5, 7.0, "2015-06-01", None, &[18]),
        ];
        let stats = compute_statistics(&favs, 2025);
        assert_eq!(stats.rating_distribution.high, 1);
        assert_eq!(stats.rating_distribution.medium, 3);
        assert_eq!(stats.rating_distribution.low, 1);
        assert_eq!(stats.year_distribution.new, 1);
        assert_eq!(stats.year_distribution.recent, 3);
        assert_eq!(stats.year_distribution.old, 1);
        assert_eq!(stats.runtime_distribution.short, 1);
        assert_eq!(stats.runtime_distribution.medium, 2);
        assert_eq!(stats.runtime_distribution.long, 1);
        assert_eq!(stats.runtime_distribution.unknown, 1);
        assert_eq!(stats.top_genres[0], 18);
    }

    #[test]
    fn missing_release_date_counts_as_old() {
        let mut m = movie(1, 7.0, "x", Some(100), &[28]);
        m.release_date = None;
        let stats = compute_statistics(&[m], 2025);
        assert_eq!(stats.year_distribution.old, 1);
    }

    #[test]
    fn top_genres_keeps_three_most_frequent() {
        let favs = vec![
            movie(1, 7.0, "2020-01-01", None, &[28, 18]),
            movie(2, 7.0, "2020-01-01", None, &[28, 35]),
            movie(3, 7.0, "2020-01-01", None, &[28, 18, 99]),
            movie(4, 7.0, "2020-01-01", None, &[878]),
        ];
        let stats = compute_statistics(&favs, 2025);
        assert_eq!(stats.top_genres.len(), 3);
        assert_eq!(stats.top_genres[0], 28);
        assert_eq!(stats.top_genres[1], 18);
        assert_eq!(stats.genre_counts[&28], 3);
    }
}
