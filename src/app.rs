use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{env, net::SocketAddr, sync::Arc};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::analysis::{analyze_favorites, FavoritesAnalysis};
use crate::auth::{AuthApi, AuthClient, Credentials, SignUpPayload};
use crate::embed::{embed_urls, PlayerCommand};
use crate::error::{AppError, AppResult};
use crate::favorites::FavoritesStore;
use crate::recommend::{build_criteria, fetch_with_fallback, RecommendationOutcome};
use crate::stats::{compute_statistics, FavoritesStatistics};
use crate::tmdb::{
    image_url, select_trailer, Genre, ListingPage, MediaItem, MediaKind, PersonCredits,
    PersonDetails, TimeWindow, TmdbApi, TmdbClient, TrendingKind, COMMON_GENRES,
};
use crate::yts::{magnet_link, YtsApi, YtsClient, YtsMovie};

const MAX_BODY_BYTES: usize = 256 * 1024;
const DEFAULT_PORT: u16 = 4170;
const DEFAULT_FAVORITES_PATH: &str = "favorites.json";

#[derive(Clone)]
pub struct AppState {
    pub tmdb: Arc<dyn TmdbApi>,
    pub yts: Arc<dyn YtsApi>,
    pub auth: Option<Arc<dyn AuthApi>>,
    pub favorites: Arc<FavoritesStore>,
}

pub async fn run_server() -> Result<()> {
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_env()?);
    let yts: Arc<dyn YtsApi> = Arc::new(YtsClient::new()?);
    let auth: Option<Arc<dyn AuthApi>> = match AuthClient::from_env()? {
        Some(client) => {
            info!("Auth proxy enabled");
            Some(Arc::new(client))
        }
        None => {
            info!("AUTH_BASE_URL not set, auth routes disabled");
            None
        }
    };

    let favorites_path =
        env::var("FAVORITES_PATH").unwrap_or_else(|_| DEFAULT_FAVORITES_PATH.to_string());
    let favorites = Arc::new(FavoritesStore::open(&favorites_path));

    let state = AppState {
        tmdb,
        yts,
        auth,
        favorites,
    };
    let app = build_router(state);

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/trending", get(trending))
        .route("/api/:kind/top_rated", get(top_rated))
        .route("/api/:kind/genre/:genre_id", get(by_genre))
        .route("/api/:kind/asian", get(asian_catalog))
        .route("/api/movie/awards", get(award_winners))
        .route("/api/search", get(search))
        .route("/api/genres/:kind", get(genres))
        .route("/api/:kind/:id/details", get(details))
        .route("/api/person/:id", get(person_details))
        .route("/api/person/:id/:kind_credits", get(person_credits))
        .route("/api/favorites", get(favorites_list))
        .route("/api/favorites", delete(favorites_clear))
        .route("/api/favorites/toggle", post(favorites_toggle))
        .route("/api/favorites/stats", get(favorites_stats))
        .route("/api/favorites/analysis", get(favorites_analysis))
        .route("/api/favorites/recommendations", get(recommendations))
        .route("/api/embed/movie/:id", get(embed_movie))
        .route("/api/embed/tv/:id/:season/:episode", get(embed_tv))
        .route("/api/yts/search", get(yts_search))
        .route("/api/yts/movie/:id", get(yts_movie))
        .route("/api/yts/movie/:id/suggestions", get(yts_suggestions))
        .route("/api/yts/availability/:imdb_id", get(yts_availability))
        .route("/api/yts/magnet", get(yts_magnet))
        .route("/api/auth/signin", post(auth_sign_in))
        .route("/api/auth/signup", post(auth_sign_up))
        .route("/api/auth/user", get(auth_user))
        .route("/api/auth/profile", get(auth_profile))
        .route("/api/auth/activate", post(auth_activate))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Deserialize)]
struct TrendingQuery {
    #[serde(default = "default_kind_all")]
    kind: String,
    #[serde(default = "default_window")]
    window: String,
}

fn default_kind_all() -> String {
    "all".to_string()
}

fn default_window() -> String {
    "week".to_string()
}

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default = "default_page")]
    page: i32,
}

fn default_page() -> i32 {
    1
}

fn parse_media_kind(raw: &str) -> AppResult<MediaKind> {
    match raw {
        "movie" => Ok(MediaKind::Movie),
        "tv" => Ok(MediaKind::Tv),
        other => Err(AppError::InvalidInput(format!(
            "unknown media kind '{other}'"
        ))),
    }
}

async fn trending(
    State(state): State<AppState>,
    Query(q): Query<TrendingQuery>,
) -> AppResult<Json<ListingPage>> {
    let kind = match q.kind.as_str() {
        "all" => TrendingKind::All,
        "movie" => TrendingKind::Movie,
        "tv" => TrendingKind::Tv,
        other => {
            return Err(AppError::InvalidInput(format!(
                "unknown trending kind '{other}'"
            )))
        }
    };
    let window = match q.window.as_str() {
        "day" => TimeWindow::Day,
        "week" => TimeWindow::Week,
        other => {
            return Err(AppError::InvalidInput(format!(
                "unknown time window '{other}'"
            )))
        }
    };
    Ok(Json(state.tmdb.trending(kind, window).await?))
}

async fn top_rated(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(q): Query<PageQuery>,
) -> AppResult<Json<ListingPage>> {
    let kind = parse_media_kind(&kind)?;
    Ok(Json(state.tmdb.top_rated(kind, q.page).await?))
}

async fn by_genre(
    State(state): State<AppState>,
    Path((kind, genre_id)): Path<(String, i64)>,
    Query(q): Query<PageQuery>,
) -> AppResult<Json<ListingPage>> {
    let kind = parse_media_kind(&kind)?;
    Ok(Json(state.tmdb.by_genre(kind, genre_id, q.page).await?))
}

async fn asian_catalog(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(q): Query<PageQuery>,
) -> AppResult<Json<ListingPage>> {
    let kind = parse_media_kind(&kind)?;
    Ok(Json(state.tmdb.asian_catalog(kind, q.page).await?))
}

async fn award_winners(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> AppResult<Json<ListingPage>> {
    Ok(Json(state.tmdb.award_winners(q.page).await?))
}

#[derive(Deserialize)]
struct SearchQuery {
    query: String,
    #[serde(default = "default_page")]
    page: i32,
}

async fn search(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<ListingPage>> {
    if q.query.trim().is_empty() {
        return Err(AppError::InvalidInput("query must not be empty".to_string()));
    }
    Ok(Json(state.tmdb.search_multi(&q.query, q.page).await?))
}

async fn genres(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> AppResult<Json<Vec<Genre>>> {
    let kind = parse_media_kind(&kind)?;
    match state.tmdb.genre_list(kind).await {
        Ok(list) => Ok(Json(list)),
        Err(e) => {
            warn!("Genre list fetch failed, using baseline table: {:#}", e);
            Ok(Json(COMMON_GENRES.clone()))
        }
    }
}

async fn details(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> AppResult<Json<Value>> {
    let kind = parse_media_kind(&kind)?;
    let details = state.tmdb.details(kind, id).await?;
    let trailer = details.videos.as_ref().and_then(select_trailer);
    let poster_url = image_url(details.poster_path.as_deref(), "w500");
    let backdrop_url = image_url(details.backdrop_path.as_deref(), "original");
    Ok(Json(json!({
        "details": details,
        "trailer": trailer,
        "poster_url": poster_url,
        "backdrop_url": backdrop_url,
    })))
}

async fn person_details(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PersonDetails>> {
    Ok(Json(state.tmdb.person_details(id).await?))
}

async fn person_credits(
    State(state): State<AppState>,
    Path((id, kind_credits)): Path<(i64, String)>,
) -> AppResult<Json<PersonCredits>> {
    let kind = match kind_credits.as_str() {
        "movie_credits" => MediaKind::Movie,
        "tv_credits" => MediaKind::Tv,
        other => {
            return Err(AppError::InvalidInput(format!(
                "unknown credits kind '{other}'"
            )))
        }
    };
    Ok(Json(state.tmdb.person_credits(kind, id).await?))
}

async fn favorites_list(State(state): State<AppState>) -> Json<Vec<MediaItem>> {
    Json(state.favorites.list())
}

async fn favorites_clear(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.favorites.clear().map_err(AppError::Upstream)?;
    Ok(Json(json!({ "cleared": true })))
}

async fn favorites_toggle(
    State(state): State<AppState>,
    Json(item): Json<MediaItem>,
) -> AppResult<Json<Value>> {
    let id = item.id;
    let favorite = state.favorites.toggle(item).map_err(AppError::Upstream)?;
    Ok(Json(json!({ "id": id, "favorite": favorite })))
}

async fn favorites_stats(State(state): State<AppState>) -> Json<FavoritesStatistics> {
    let favorites = state.favorites.list();
    Json(compute_statistics(&favorites, current_year()))
}

async fn favorites_analysis(State(state): State<AppState>) -> Json<FavoritesAnalysis> {
    let favorites = state.favorites.list();
    Json(analyze_favorites(state.tmdb.clone(), &favorites).await)
}

/// Response for the recommendations endpoint. An exhausted fallback ladder is
/// a normal outcome, reported as such instead of an error status.
#[derive(serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecommendationResponse {
    Found {
        #[serde(flatten)]
        result: RecommendationOutcome,
    },
    NoRecommendations,
}

async fn recommendations(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Json<RecommendationResponse> {
    let favorites = state.favorites.list();
    if favorites.is_empty() {
        return Json(RecommendationResponse::NoRecommendations);
    }

    let stats = compute_statistics(&favorites, current_year());
    let analysis = analyze_favorites(state.tmdb.clone(), &favorites).await;
    let criteria = build_criteria(&stats, &analysis, current_year());
    let exclude = state.favorites.ids();

    match fetch_with_fallback(state.tmdb.as_ref(), &criteria, q.page, &exclude).await {
        Some(result) => Json(RecommendationResponse::Found { result }),
        None => Json(RecommendationResponse::NoRecommendations),
    }
}

async fn embed_movie(Path(id): Path<i64>) -> Json<Value> {
    Json(json!({
        "sources": embed_urls(MediaKind::Movie, id, None, None),
        "controls": control_messages(),
    }))
}

async fn embed_tv(Path((id, season, episode)): Path<(i64, i32, i32)>) -> Json<Value> {
    Json(json!({
        "sources": embed_urls(MediaKind::Tv, id, Some(season), Some(episode)),
        "controls": control_messages(),
    }))
}

/// Message payloads a client can post into the embedded player. Delivery is
/// best-effort; the embeds never acknowledge.
fn control_messages() -> Value {
    json!({
        "play": PlayerCommand::Play.to_message(),
        "pause": PlayerCommand::Pause.to_message(),
        "mute": PlayerCommand::Mute.to_message(),
        "unmute": PlayerCommand::Unmute.to_message(),
        "volume": PlayerCommand::Volume(0.5).to_message(),
    })
}

#[derive(Deserialize)]
struct YtsSearchQuery {
    title: String,
    #[serde(default)]
    year: Option<i32>,
}

async fn yts_search(
    State(state): State<AppState>,
    Query(q): Query<YtsSearchQuery>,
) -> Json<Value> {
    match state.yts.search(&q.title, q.year).await {
        Ok(data) => Json(json!({ "movie_count": data.movie_count, "movies": data.movies })),
        Err(e) => {
            warn!("YTS search failed: {:#}", e);
            Json(json!({ "movie_count": 0, "movies": Vec::<YtsMovie>::new() }))
        }
    }
}

async fn yts_movie(State(state): State<AppState>, Path(id): Path<i64>) -> Json<Value> {
    match state.yts.movie_details(id).await {
        Ok(movie) => Json(json!({ "movie": movie })),
        Err(e) => {
            warn!("YTS details failed for {}: {:#}", id, e);
            Json(json!({ "movie": Value::Null }))
        }
    }
}

async fn yts_suggestions(State(state): State<AppState>, Path(id): Path<i64>) -> Json<Value> {
    match state.yts.suggestions(id).await {
        Ok(movies) => Json(json!({ "movies": movies })),
        Err(e) => {
            warn!("YTS suggestions failed for {}: {:#}", id, e);
            Json(json!({ "movies": Vec::<YtsMovie>::new() }))
        }
    }
}

async fn yts_availability(
    State(state): State<AppState>,
    Path(imdb_id): Path<String>,
) -> Json<Value> {
    match state.yts.availability(&imdb_id).await {
        Ok(movie) => Json(json!({ "available": movie.is_some(), "movie": movie })),
        Err(e) => {
            warn!("YTS availability check failed for {}: {:#}", imdb_id, e);
            Json(json!({ "available": false, "movie": Value::Null }))
        }
    }
}

#[derive(Deserialize)]
struct MagnetQuery {
    hash: String,
    title: String,
}

async fn yts_magnet(Query(q): Query<MagnetQuery>) -> AppResult<Json<Value>> {
    if q.hash.is_empty() {
        return Err(AppError::InvalidInput("hash must not be empty".to_string()));
    }
    Ok(Json(json!({ "magnet": magnet_link(&q.hash, &q.title) })))
}

fn auth_client(state: &AppState) -> AppResult<Arc<dyn AuthApi>> {
    state
        .auth
        .clone()
        .ok_or_else(|| AppError::NotFound("auth backend not configured".to_string()))
}

fn bearer_token(headers: &HeaderMap) -> AppResult<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.to_string())
        .ok_or_else(|| AppError::InvalidInput("missing bearer token".to_string()))
}

async fn auth_sign_in(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> AppResult<Json<Value>> {
    let auth = auth_client(&state)?;
    Ok(Json(auth.sign_in(&credentials).await?))
}

async fn auth_sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpPayload>,
) -> AppResult<Json<Value>> {
    let auth = auth_client(&state)?;
    Ok(Json(auth.sign_up(&payload).await?))
}

async fn auth_user(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let auth = auth_client(&state)?;
    let token = bearer_token(&headers)?;
    Ok(Json(auth.session_user(&token).await?))
}

#[derive(Deserialize)]
struct ProfileQuery {
    user_id: String,
}

async fn auth_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ProfileQuery>,
) -> AppResult<Json<Value>> {
    let auth = auth_client(&state)?;
    let token = bearer_token(&headers)?;
    let profile = auth.profile(&token, &q.user_id).await?;
    Ok(Json(json!({ "profile": profile })))
}

#[derive(Deserialize)]
struct ActivatePayload {
    code: String,
}

async fn auth_activate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ActivatePayload>,
) -> AppResult<Json<Value>> {
    let auth = auth_client(&state)?;
    let token = bearer_token(&headers)?;
    Ok(Json(auth.activate_account(&token, &payload.code).await?))
}

fn current_year() -> i32 {
    Utc::now().year()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
