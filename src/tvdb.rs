use async_trait::async_trait;
use reqwest::{StatusCode, header::ACCEPT_LANGUAGE};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    metadata::{
        MetadataProvider, MovieRecord, ProviderError, TvEpisodeRecord, decode, http_client,
        year_from_date,
    },
    video::{MovieQuery, TvQuery},
};

const BASE_URL: &str = "https://api.thetvdb.com";

/// Tokens live for 24 hours; refresh a little early.
const TOKEN_LIFETIME: Duration = Duration::from_secs(23 * 60 * 60);

#[derive(Debug, Deserialize)]
struct Login {
    token: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Series {
    series_name: String,
    first_aired: Option<String>,
    status: Option<String>,
    network: Option<String>,
    overview: Option<String>,
    genre: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct EpisodeSummary {
    aired_seasons: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Episode {
    episode_name: Option<String>,
    first_aired: Option<String>,
    aired_season: u32,
    aired_episode_number: u32,
}

struct Token {
    value: String,
    expires: Instant,
}

impl Token {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires
    }
}

/// TheTVDB (v3 API) client. Logs in with the API key and caches the session token.
pub struct TvdbClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    token: Mutex<Option<Token>>,
}

impl TvdbClient {
    pub fn new(api_key: &str) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, ProviderError> {
        if api_key.is_empty() {
            return Err(ProviderError::MissingApiKey("TVDb"));
        }
        Ok(Self {
            client: http_client()?,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    async fn login(&self) -> Result<String, ProviderError> {
        debug!("logging in to TVDb");
        let response = self
            .client
            .post(format!("{}/login", self.base_url))
            .json(&serde_json::json!({ "apikey": self.api_key }))
            .send()
            .await?;
        let login: Login = decode(response).await?;
        if login.token.is_empty() {
            let message = "TVDb login returned no token".to_string();
            return Err(ProviderError::Api(message));
        }
        Ok(login.token)
    }

    /// Current token, logging in again when missing, expired or `refresh` is set.
    async fn token(&self, refresh: bool) -> Result<String, ProviderError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| !refresh && t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let value = self.login().await?;
        *cached = Some(Token {
            value: value.clone(),
            expires: Instant::now() + TOKEN_LIFETIME,
        });
        Ok(value)
    }

    async fn send(
        &self,
        path: &str,
        query: &[(&str, String)],
        language: &str,
        token: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .bearer_auth(token)
            .header(ACCEPT_LANGUAGE, language)
            .send()
            .await?)
    }

    /// Authenticated GET. A 401 triggers one fresh login and a retry.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        language: &str,
    ) -> Result<T, ProviderError> {
        let token = self.token(false).await?;
        let mut response = self.send(path, query, language, &token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(path, "TVDb token rejected, logging in again");
            let token = self.token(true).await?;
            response = self.send(path, query, language, &token).await?;
        }
        let envelope: Envelope<T> = decode(response).await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl MetadataProvider for TvdbClient {
    fn name(&self) -> &'static str {
        "TVDb"
    }

    async fn search_movie(
        &self,
        _query: &MovieQuery,
        _language: &str,
    ) -> Result<MovieRecord, ProviderError> {
        Err(ProviderError::Unsupported {
            provider: "TVDb",
            kind: "movie",
        })
    }

    async fn search_tv_show(
        &self,
        query: &TvQuery,
        language: &str,
    ) -> Result<TvEpisodeRecord, ProviderError> {
        let mut params = vec![("name", query.title.clone())];
        if let Some(year) = query.year {
            params.push(("year", year.to_string()));
        }

        // TVDb answers an empty search with 404.
        let hits: Vec<SearchHit> = match self.get("/search/series", &params, language).await {
            Err(ProviderError::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
                Vec::new()
            }
            other => other?,
        };
        let id = hits
            .first()
            .ok_or_else(|| ProviderError::no_shows(&query.title))?
            .id;

        let series: Series = self.get(&format!("/series/{}", id), &[], language).await?;
        let summary: EpisodeSummary = self
            .get(&format!("/series/{}/episodes/summary", id), &[], language)
            .await?;

        let mut record = TvEpisodeRecord {
            year: series.first_aired.as_deref().and_then(year_from_date),
            title: series.series_name,
            overview: series.overview.unwrap_or_default(),
            season: query.season,
            episode: query.episode,
            network: series.network.unwrap_or_default(),
            status: series.status.unwrap_or_default(),
            season_count: summary.aired_seasons.len() as u32,
            genres: series.genre,
            ..TvEpisodeRecord::default()
        };

        if query.is_episode() {
            let params = [
                ("airedSeason", query.season.to_string()),
                ("airedEpisode", query.episode.to_string()),
            ];
            let episodes: Result<Vec<Episode>, _> = self
                .get(&format!("/series/{}/episodes/query", id), &params, language)
                .await;
            match episodes {
                Ok(episodes) => {
                    if let Some(episode) = episodes.into_iter().next() {
                        record.season = episode.aired_season;
                        record.episode = episode.aired_episode_number;
                        record.episode_title = episode.episode_name.unwrap_or_default();
                        record.air_date = episode.first_aired.unwrap_or_default();
                    }
                }
                Err(err) => debug!(error = %err, "TVDb episode lookup failed, using show only"),
            }
        }

        Ok(record)
    }
}
