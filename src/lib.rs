pub mod config;
pub mod metadata;
pub mod omdb;
pub mod probe;
pub mod resolution;
pub mod template;
pub mod tmdb;
pub mod tvdb;
pub mod tvmaze;
pub mod video;
