use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::warn;

use crate::tmdb::{MediaDetails, MediaItem, MediaKind, TmdbApi};

const TOP_DIRECTORS: usize = 3;
const TOP_ACTORS: usize = 5;
// Only the first few billed cast members count per title, so large ensembles
// don't drown out everyone else.
const CAST_PER_TITLE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonTally {
    pub id: i64,
    pub name: String,
    pub count: usize,
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FavoritesAnalysis {
    pub top_directors: Vec<PersonTally>,
    pub top_actors: Vec<PersonTally>,
}

/// Fetches full details for every favorite concurrently and tallies the
/// recurring directors and lead actors. A failed detail fetch is logged and
/// contributes nothing; the batch itself never fails.
pub async fn analyze_favorites(
    tmdb: Arc<dyn TmdbApi>,
    favorites: &[MediaItem],
) -> FavoritesAnalysis {
    let mut tasks = JoinSet::new();
    for fav in favorites {
        let kind = if fav.is_movie_like() {
            MediaKind::Movie
        } else if fav.is_tv_like() {
            MediaKind::Tv
        } else {
            continue;
        };
        let tmdb = tmdb.clone();
        let id = fav.id;
        tasks.spawn(async move { (id, tmdb.details(kind, id).await) });
    }

    let mut details: Vec<MediaDetails> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(detail))) => details.push(detail),
            Ok((id, Err(e))) => warn!("Skipping favorite {} in analysis: {:#}", id, e),
            Err(e) => warn!("Analysis fetch task failed: {}", e),
        }
    }

    tally(&details)
}

fn tally(details: &[MediaDetails]) -> FavoritesAnalysis {
    let mut directors: HashMap<i64, PersonTally> = HashMap::new();
    let mut actors: HashMap<i64, PersonTally> = HashMap::new();

    for detail in details {
        let Some(credits) = detail.credits.as_ref() else {
            continue;
        };
        for crew in credits.crew.iter().filter(|c| c.job.as_deref() == Some("Director")) {
            directors
                .entry(crew.id)
                .or_insert_with(|| PersonTally {
                    id: crew.id,
                    name: crew.name.clone(),
                    count: 0,
                    profile_path: crew.profile_path.clone(),
                })
                .count += 1;
        }
        for cast in credits.cast.iter().take(CAST_PER_TITLE) {
            actors
                .entry(cast.id)
                .or_insert_with(|| PersonTally {
                    id: cast.id,
                    name: cast.name.clone(),
                    count: 0,
                    profile_path: cast.profile_path.clone(),
                })
                .count += 1;
        }
    }

    FavoritesAnalysis {
        top_directors: top_by_count(directors, TOP_DIRECTORS),
        top_actors: top_by_count(actors, TOP_ACTORS),
    }
}

fn top_by_count(people: HashMap<i64, PersonTally>, keep: usize) -> Vec<PersonTally> {
    let mut ranked: Vec<PersonTally> = people.into_values().collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then(a.id.cmp(&b.id)));
    ranked.truncate(keep);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmdb::{CastMember, Credits, CrewMember};

    fn detail(directors: &[(i64, &str)], cast: &[(i64, &str)]) -> MediaDetails {
        MediaDetails {
            id: 1,
            title: Some("Movie".to_string()),
            name: None,
            overview: String::new(),
            poster_path: None,
            backdrop_path: None,
            release_date: None,
            first_air_date: None,
            vote_average: 7.0,
            vote_count: 100,
            runtime: None,
            number_of_seasons: None,
            number_of_episodes: None,
            genres: vec![],
            credits: Some(Credits {
                cast: cast
                    .iter()
                    .map(|(id, name)| CastMember {
                        id: *id,
                        name: name.to_string(),
                        character: None,
                        profile_path: None,
                    })
                    .collect(),
                crew: directors
                    .iter()
                    .map(|(id, name)| CrewMember {
                        id: *id,
                        name: name.to_string(),
                        job: Some("Director".to_string()),
                        profile_path: None,
                    })
                    .collect(),
            }),
            videos: None,
        }
    }

    #[test]
    fn counts_only_director_crew_members() {
        let mut d = detail(&[(10, "Dir A")], &[]);
        if let Some(credits) = d.credits.as_mut() {
            credits.crew.push(CrewMember {
                id: 11,
                name: "Writer".to_string(),
                job: Some("Writer".to_string()),
                profile_path: None,
            });
        }
        let analysis = tally(&[d]);
        assert_eq!(analysis.top_directors.len(), 1);
        assert_eq!(analysis.top_directors[0].id, 10);
    }

    #[test]
    fn caps_cast_contribution_per_title() {
        let cast: Vec<(i64, String)> = (1..=8).map(|i| (i, format!("Actor {i}"))).collect();
        let cast_refs: Vec<(i64, &str)> = cast.iter().map(|(i, n)| (*i, n.as_str())).collect();
        let analysis = tally(&[detail(&[], &cast_refs)]);
        assert_eq!(analysis.top_actors.len(), TOP_ACTORS);
        assert!(analysis.top_actors.iter().all(|a| a.id <= 5));
    }

    #[test]
    fn ranks_by_recurrence_and_truncates() {
        let d1 = detail(&[(10, "Dir A"), (20, "Dir B")], &[(1, "Actor A")]);
        let d2 = detail(&[(10, "Dir A"), (30, "Dir C")], &[(1, "Actor A"), (2, "Actor B")]);
        let d3 = detail(&[(10, "Dir A"), (40, "Dir D")], &[(2, "Actor B")]);
        let analysis = tally(&[d1, d2, d3]);
        assert_eq!(analysis.top_directors.len(), TOP_DIRECTORS);
        assert_eq!(analysis.top_directors[0].id, 10);
        assert_eq!(analysis.top_directors[0].count, 3);
        assert_eq!(analysis.top_actors[0].count, 2);
    }

    #[test]
    fn missing_credits_contribute_nothing() {
        let mut d = detail(&[(10, "Dir A")], &[]);
        d.credits = None;
        let analysis = tally(&[d]);
        assert!(analysis.top_directors.is_empty());
        assert!(analysis.top_actors.is_empty());
    }
}
