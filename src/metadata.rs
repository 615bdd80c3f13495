//! Metadata records and the provider abstraction.
//!
//! Each online service (TMDb, OMDb, TVMaze, TVDb) implements [`MetadataProvider`].
//! The configured provider for each content type is built by [`movie_provider`]
//! and [`tv_provider`].

use async_trait::async_trait;
use clap::ValueEnum;
use core::fmt;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use thiserror::Error;

use crate::{
    config::Config,
    omdb::OmdbClient,
    tmdb::TmdbClient,
    tvdb::TvdbClient,
    tvmaze::TvmazeClient,
    video::{ContentType, MovieQuery, TvQuery},
};

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Movie details as returned by a provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieRecord {
    pub title: String,
    pub year: Option<u16>,
    pub overview: String,
    pub genres: Vec<String>,
}

/// Show and episode details as returned by a provider.
///
/// Providers that cannot resolve the episode itself still return the show,
/// with `season`/`episode` taken from the query and an empty `episode_title`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TvEpisodeRecord {
    pub title: String,
    pub year: Option<u16>,
    pub overview: String,
    pub season: u32,
    pub episode: u32,
    pub episode_title: String,
    pub network: String,
    pub status: String,
    pub season_count: u32,
    pub genres: Vec<String>,
    pub air_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Tmdb,
    Omdb,
    Tvmaze,
    Tvdb,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Tmdb => "tmdb",
            ProviderKind::Omdb => "omdb",
            ProviderKind::Tvmaze => "tvmaze",
            ProviderKind::Tvdb => "tvdb",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no {kind} found matching '{title}'")]
    NoResults { kind: &'static str, title: String },

    #[error("{provider} does not support {kind} lookups")]
    Unsupported {
        provider: &'static str,
        kind: &'static str,
    },

    #[error("unsupported {kind} provider: {provider}")]
    UnsupportedSelection {
        kind: &'static str,
        provider: ProviderKind,
    },

    #[error("{0} API key is required")]
    MissingApiKey(&'static str),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{path} returned {status}")]
    Status { status: StatusCode, path: String },

    #[error("{0}")]
    Api(String),
}

impl ProviderError {
    pub fn no_movies(title: &str) -> Self {
        ProviderError::NoResults {
            kind: "movies",
            title: title.to_string(),
        }
    }

    pub fn no_shows(title: &str) -> Self {
        ProviderError::NoResults {
            kind: "TV shows",
            title: title.to_string(),
        }
    }

    /// True when the lookup worked but nothing matched.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NoResults { .. })
    }
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Display name, e.g. `"TMDb"`.
    fn name(&self) -> &'static str;

    async fn search_movie(
        &self,
        query: &MovieQuery,
        language: &str,
    ) -> Result<MovieRecord, ProviderError>;

    async fn search_tv_show(
        &self,
        query: &TvQuery,
        language: &str,
    ) -> Result<TvEpisodeRecord, ProviderError>;
}

/// Build the configured movie provider.
pub fn movie_provider(config: &Config) -> Result<Box<dyn MetadataProvider>, ProviderError> {
    match config.movie_provider {
        ProviderKind::Tmdb => Ok(Box::new(TmdbClient::new(&config.tmdb_api_key)?)),
        ProviderKind::Omdb => Ok(Box::new(OmdbClient::new(&config.omdb_api_key)?)),
        other => Err(ProviderError::UnsupportedSelection {
            kind: "movie",
            provider: other,
        }),
    }
}

/// Build the configured TV provider.
pub fn tv_provider(config: &Config) -> Result<Box<dyn MetadataProvider>, ProviderError> {
    match config.tv_provider {
        ProviderKind::Tvmaze => Ok(Box::new(TvmazeClient::new()?)),
        ProviderKind::Tvdb => Ok(Box::new(TvdbClient::new(&config.tvdb_api_key)?)),
        ProviderKind::Tmdb => Ok(Box::new(TmdbClient::new(&config.tmdb_api_key)?)),
        other => Err(ProviderError::UnsupportedSelection {
            kind: "TV show",
            provider: other,
        }),
    }
}

pub fn provider_for(
    config: &Config,
    content_type: ContentType,
) -> Result<Box<dyn MetadataProvider>, ProviderError> {
    match content_type {
        ContentType::Show => tv_provider(config),
        ContentType::Movie => movie_provider(config),
    }
}

pub(crate) fn http_client() -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Decode a JSON body, turning non-2xx responses into [`ProviderError::Status`].
pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            status,
            path: response.url().path().to_string(),
        });
    }
    Ok(response.json().await?)
}

pub(crate) async fn fetch<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    decode(request.send().await?).await
}

/// Year from an ISO date such as `2008-01-20`.
pub(crate) fn year_from_date(date: &str) -> Option<u16> {
    date.split('-').next().and_then(|y| y.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_keys() -> Config {
        Config {
            tmdb_api_key: "tmdb-token".to_string(),
            omdb_api_key: "omdb-key".to_string(),
            tvdb_api_key: "tvdb-key".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_year_from_date() {
        assert_eq!(year_from_date("2008-01-20"), Some(2008));
        assert_eq!(year_from_date("1999"), Some(1999));
        assert_eq!(year_from_date(""), None);
        assert_eq!(year_from_date("unknown"), None);
    }

    #[test]
    fn test_no_results_messages() {
        assert_eq!(
            ProviderError::no_movies("Nonexistent Movie").to_string(),
            "no movies found matching 'Nonexistent Movie'"
        );
        assert_eq!(
            ProviderError::no_shows("NonExistentShow").to_string(),
            "no TV shows found matching 'NonExistentShow'"
        );
        assert!(ProviderError::no_shows("x").is_not_found());
        assert!(!ProviderError::MissingApiKey("OMDb").is_not_found());
    }

    #[test]
    fn test_default_providers() {
        let config = config_with_keys();
        assert_eq!(movie_provider(&config).unwrap().name(), "TMDb");
        assert_eq!(tv_provider(&config).unwrap().name(), "TVMaze");
    }

    #[test]
    fn test_selected_providers() {
        let config = Config {
            movie_provider: ProviderKind::Omdb,
            tv_provider: ProviderKind::Tvdb,
            ..config_with_keys()
        };
        assert_eq!(movie_provider(&config).unwrap().name(), "OMDb");
        assert_eq!(tv_provider(&config).unwrap().name(), "TVDb");
        assert_eq!(
            provider_for(&config, ContentType::Show).unwrap().name(),
            "TVDb"
        );
        assert_eq!(
            provider_for(&config, ContentType::Movie).unwrap().name(),
            "OMDb"
        );
    }

    #[test]
    fn test_tmdb_serves_tv_too() {
        let config = Config {
            tv_provider: ProviderKind::Tmdb,
            ..config_with_keys()
        };
        assert_eq!(tv_provider(&config).unwrap().name(), "TMDb");
    }

    #[test]
    fn test_unsupported_selection() {
        let config = Config {
            movie_provider: ProviderKind::Tvmaze,
            tv_provider: ProviderKind::Omdb,
            ..config_with_keys()
        };
        assert!(matches!(
            movie_provider(&config),
            Err(ProviderError::UnsupportedSelection { kind: "movie", .. })
        ));
        assert_eq!(
            tv_provider(&config).err().unwrap().to_string(),
            "unsupported TV show provider: omdb"
        );
    }

    #[test]
    fn test_missing_api_key() {
        let config = Config {
            movie_provider: ProviderKind::Omdb,
            ..Config::default()
        };
        assert!(matches!(
            movie_provider(&config),
            Err(ProviderError::MissingApiKey("OMDb"))
        ));
    }

    #[test]
    fn test_provider_kind_names() {
        assert_eq!(ProviderKind::Tvmaze.to_string(), "tvmaze");
        assert_eq!(
            serde_json::to_string(&ProviderKind::Tmdb).unwrap(),
            "\"tmdb\""
        );
        assert_eq!(
            serde_json::from_str::<ProviderKind>("\"tvdb\"").unwrap(),
            ProviderKind::Tvdb
        );
    }
}
