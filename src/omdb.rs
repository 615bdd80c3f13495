use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{
    metadata::{MetadataProvider, MovieRecord, ProviderError, TvEpisodeRecord, fetch, http_client},
    video::{MovieQuery, TvQuery},
};

const BASE_URL: &str = "https://www.omdbapi.com/";
const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Search", default)]
    search: Vec<SearchResult>,
    #[serde(rename = "Response")]
    response: String,
}

impl SearchResponse {
    fn found(&self) -> bool {
        self.response == "True" && !self.search.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(rename = "imdbID")]
    imdb_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct MovieDetails {
    title: String,
    year: String,
    plot: String,
    genre: String,
    response: String,
    error: String,
}

fn present(value: String) -> String {
    if value == NOT_AVAILABLE {
        String::new()
    } else {
        value
    }
}

// OMDb reports series runs as "2008–2013"; only the leading year matters.
fn leading_year(year: &str) -> Option<u16> {
    let digits: String = year.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Open Movie Database client. Movies only.
pub struct OmdbClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OmdbClient {
    pub fn new(api_key: &str) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, ProviderError> {
        if api_key.is_empty() {
            return Err(ProviderError::MissingApiKey("OMDb"));
        }
        Ok(Self {
            client: http_client()?,
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
        })
    }

    async fn search(
        &self,
        title: &str,
        year: Option<u16>,
    ) -> Result<SearchResponse, ProviderError> {
        let mut params = vec![
            ("apikey", self.api_key.clone()),
            ("s", title.to_string()),
            ("type", "movie".to_string()),
        ];
        if let Some(year) = year {
            params.push(("y", year.to_string()));
        }
        fetch(self.client.get(&self.base_url).query(&params)).await
    }

    async fn details(&self, imdb_id: &str) -> Result<MovieDetails, ProviderError> {
        let params = [
            ("apikey", self.api_key.as_str()),
            ("i", imdb_id),
            ("plot", "full"),
        ];
        fetch(self.client.get(&self.base_url).query(&params)).await
    }
}

#[async_trait]
impl MetadataProvider for OmdbClient {
    fn name(&self) -> &'static str {
        "OMDb"
    }

    async fn search_movie(
        &self,
        query: &MovieQuery,
        _language: &str,
    ) -> Result<MovieRecord, ProviderError> {
        let mut found = self.search(&query.title, query.year).await?;
        if !found.found() && query.year.is_some() {
            debug!(title = %query.title, "no OMDb movie for year, retrying without");
            found = self.search(&query.title, None).await?;
        }

        let hit = found
            .search
            .first()
            .filter(|_| found.found())
            .ok_or_else(|| ProviderError::no_movies(&query.title))?;

        let movie = self.details(&hit.imdb_id).await?;
        if movie.response != "True" {
            let message = format!("failed to get movie details: {}", movie.error);
            return Err(ProviderError::Api(message));
        }

        Ok(MovieRecord {
            year: leading_year(&movie.year),
            genres: movie
                .genre
                .split(',')
                .map(str::trim)
                .filter(|genre| !genre.is_empty() && *genre != NOT_AVAILABLE)
                .map(str::to_string)
                .collect(),
            title: movie.title,
            overview: present(movie.plot),
        })
    }

    async fn search_tv_show(
        &self,
        _query: &TvQuery,
        _language: &str,
    ) -> Result<TvEpisodeRecord, ProviderError> {
        Err(ProviderError::Unsupported {
            provider: "OMDb",
            kind: "TV show",
        })
    }
}
