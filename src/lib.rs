pub mod analysis;
pub mod app;
pub mod auth;
pub mod embed;
pub mod error;
pub mod favorites;
pub mod recommend;
pub mod stats;
pub mod tmdb;
pub mod yts;
