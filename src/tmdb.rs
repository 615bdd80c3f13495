use async_trait::async_trait;
use futures::future::join;
use serde::Deserialize;
use tracing::debug;

use crate::{
    metadata::{
        MetadataProvider, MovieRecord, ProviderError, TvEpisodeRecord, fetch, http_client,
        year_from_date,
    },
    video::{MovieQuery, TvQuery},
};

const BASE_URL: &str = "https://api.themoviedb.org/3";

#[derive(Debug, Deserialize)]
struct SearchResults {
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: i64,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Genre {
    pub name: String,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Network {
    pub name: String,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Series {
    pub id: i64,
    pub name: String,
    pub overview: Option<String>,
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub number_of_seasons: u32,
    pub status: Option<String>,
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub season_number: u32,
    pub episode_number: u32,
    pub name: String,
    pub overview: Option<String>,
    pub air_date: Option<String>,
}

fn genre_names(genres: Vec<Genre>) -> Vec<String> {
    genres.into_iter().map(|genre| genre.name).collect()
}

/// TMDb v3 client authenticated with an API read access token.
pub struct TmdbClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl TmdbClient {
    pub fn new(token: &str) -> Result<Self, ProviderError> {
        Self::with_base_url(token, BASE_URL)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, ProviderError> {
        if token.is_empty() {
            return Err(ProviderError::MissingApiKey("TMDb"));
        }
        Ok(Self {
            client: http_client()?,
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    async fn search(
        &self,
        path: &str,
        title: &str,
        year: Option<(&str, u16)>,
        language: &str,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        let mut params = vec![
            ("query", title.to_string()),
            ("language", language.to_string()),
        ];
        if let Some((key, year)) = year {
            params.push((key, year.to_string()));
        }
        let found: SearchResults = fetch(self.get(path).query(&params)).await?;
        Ok(found.results)
    }

    pub async fn movie(&self, id: i64, language: &str) -> Result<Movie, ProviderError> {
        fetch(
            self.get(&format!("/movie/{}", id))
                .query(&[("language", language)]),
        )
        .await
    }

    pub async fn series(&self, id: i64, language: &str) -> Result<Series, ProviderError> {
        fetch(
            self.get(&format!("/tv/{}", id))
                .query(&[("language", language)]),
        )
        .await
    }

    pub async fn episode(
        &self,
        id: i64,
        season: u32,
        episode: u32,
        language: &str,
    ) -> Result<Episode, ProviderError> {
        fetch(
            self.get(&format!("/tv/{}/season/{}/episode/{}", id, season, episode))
                .query(&[("language", language)]),
        )
        .await
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    fn name(&self) -> &'static str {
        "TMDb"
    }

    async fn search_movie(
        &self,
        query: &MovieQuery,
        language: &str,
    ) -> Result<MovieRecord, ProviderError> {
        let year = query.year.map(|year| ("year", year));
        let mut hits = self
            .search("/search/movie", &query.title, year, language)
            .await?;

        if hits.is_empty() && year.is_some() {
            debug!(title = %query.title, "no TMDb movie for year, retrying without");
            hits = self
                .search("/search/movie", &query.title, None, language)
                .await?;
        }

        let hit = hits
            .first()
            .ok_or_else(|| ProviderError::no_movies(&query.title))?;
        let movie = self.movie(hit.id, language).await?;

        Ok(MovieRecord {
            year: movie.release_date.as_deref().and_then(year_from_date),
            title: movie.title,
            overview: movie.overview.unwrap_or_default(),
            genres: genre_names(movie.genres),
        })
    }

    async fn search_tv_show(
        &self,
        query: &TvQuery,
        language: &str,
    ) -> Result<TvEpisodeRecord, ProviderError> {
        let year = query.year.map(|year| ("first_air_date_year", year));
        let hits = self
            .search("/search/tv", &query.title, year, language)
            .await?;
        let id = hits
            .first()
            .ok_or_else(|| ProviderError::no_shows(&query.title))?
            .id;

        let episode_lookup = async {
            if query.is_episode() {
                self.episode(id, query.season, query.episode, language)
                    .await
                    .map(Some)
            } else {
                Ok(None)
            }
        };
        let (series, episode) = join(self.series(id, language), episode_lookup).await;
        let series = series?;

        let mut record = TvEpisodeRecord {
            year: series.first_air_date.as_deref().and_then(year_from_date),
            title: series.name,
            overview: series.overview.unwrap_or_default(),
            season: query.season,
            episode: query.episode,
            network: series
                .networks
                .into_iter()
                .next()
                .map(|network| network.name)
                .unwrap_or_default(),
            status: series.status.unwrap_or_default(),
            season_count: series.number_of_seasons,
            genres: genre_names(series.genres),
            ..TvEpisodeRecord::default()
        };

        match episode {
            Ok(Some(episode)) => {
                record.season = episode.season_number;
                record.episode = episode.episode_number;
                record.episode_title = episode.name;
                record.air_date = episode.air_date.unwrap_or_default();
            }
            Ok(None) => {}
            Err(err) => debug!(error = %err, "TMDb episode lookup failed, using show only"),
        }

        Ok(record)
    }
}
