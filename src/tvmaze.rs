use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::debug;

use crate::{
    metadata::{
        MetadataProvider, MovieRecord, ProviderError, TvEpisodeRecord, fetch, http_client,
        year_from_date,
    },
    video::{MovieQuery, TvQuery},
};

const BASE_URL: &str = "https://api.tvmaze.com";

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

#[derive(Debug, Deserialize)]
struct SearchResult {
    show: ShowRef,
}

#[derive(Debug, Deserialize)]
struct ShowRef {
    id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Channel {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Seasons {
    seasons: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Show {
    name: String,
    genres: Vec<String>,
    status: Option<String>,
    premiered: Option<String>,
    network: Option<Channel>,
    web_channel: Option<Channel>,
    summary: Option<String>,
    #[serde(rename = "_embedded")]
    embedded: Seasons,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Episode {
    name: String,
    season: u32,
    number: u32,
    airdate: Option<String>,
}

/// Drop markup from a TVMaze summary and decode the common entities.
pub fn strip_html(html: &str) -> String {
    HTML_TAG
        .replace_all(html, "")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

/// TVMaze client. No API key; TV shows only.
pub struct TvmazeClient {
    client: reqwest::Client,
    base_url: String,
}

impl TvmazeClient {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn show(&self, id: i64) -> Result<Show, ProviderError> {
        fetch(
            self.client
                .get(format!("{}/shows/{}", self.base_url, id))
                .query(&[("embed", "seasons")]),
        )
        .await
    }

    async fn episode(&self, id: i64, season: u32, number: u32) -> Result<Episode, ProviderError> {
        fetch(
            self.client
                .get(format!("{}/shows/{}/episodebynumber", self.base_url, id))
                .query(&[("season", season), ("number", number)]),
        )
        .await
    }
}

#[async_trait]
impl MetadataProvider for TvmazeClient {
    fn name(&self) -> &'static str {
        "TVMaze"
    }

    async fn search_movie(
        &self,
        _query: &MovieQuery,
        _language: &str,
    ) -> Result<MovieRecord, ProviderError> {
        Err(ProviderError::Unsupported {
            provider: "TVMaze",
            kind: "movie",
        })
    }

    async fn search_tv_show(
        &self,
        query: &TvQuery,
        _language: &str,
    ) -> Result<TvEpisodeRecord, ProviderError> {
        let hits: Vec<SearchResult> = fetch(
            self.client
                .get(format!("{}/search/shows", self.base_url))
                .query(&[("q", query.title.as_str())]),
        )
        .await?;
        let id = hits
            .first()
            .ok_or_else(|| ProviderError::no_shows(&query.title))?
            .show
            .id;

        let show = self.show(id).await?;
        let mut record = TvEpisodeRecord {
            year: show.premiered.as_deref().and_then(year_from_date),
            overview: show.summary.as_deref().map(strip_html).unwrap_or_default(),
            season: query.season,
            episode: query.episode,
            network: show
                .network
                .or(show.web_channel)
                .map(|channel| channel.name)
                .unwrap_or_default(),
            status: show.status.unwrap_or_default(),
            season_count: show.embedded.seasons.len() as u32,
            title: show.name,
            genres: show.genres,
            ..TvEpisodeRecord::default()
        };

        if query.is_episode() {
            match self.episode(id, query.season, query.episode).await {
                Ok(episode) => {
                    record.season = episode.season;
                    record.episode = episode.number;
                    record.episode_title = episode.name;
                    record.air_date = episode.airdate.unwrap_or_default();
                }
                Err(err) => debug!(error = %err, "TVMaze episode lookup failed, using show only"),
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    fn query(title: &str, season: u32, episode: u32) -> TvQuery {
        TvQuery {
            title: title.to_string(),
            season,
            episode,
            ..TvQuery::default()
        }
    }

    async fn mount_show(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/search/shows"))
            .and(query_param("q", "Breaking Bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"score": 0.9, "show": {"id": 169, "name": "Breaking Bad"}}
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/shows/169"))
            .and(query_param("embed", "seasons"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 169,
                "name": "Breaking Bad",
                "genres": ["Drama", "Crime", "Thriller"],
                "status": "Ended",
                "premiered": "2008-01-20",
                "network": {"id": 20, "name": "AMC"},
                "webChannel": null,
                "summary": "<p><b>Breaking Bad</b> follows Walter White &amp; Jesse.</p>",
                "_embedded": {"seasons": [
                    {"id": 1, "number": 1}, {"id": 2, "number": 2}, {"id": 3, "number": 3},
                    {"id": 4, "number": 4}, {"id": 5, "number": 5}
                ]}
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>Tom &amp; Jerry&nbsp;<i>return</i>.</p>\n"),
            "Tom & Jerry return."
        );
        assert_eq!(strip_html("&lt;b&gt; is bold"), "<b> is bold");
        assert_eq!(strip_html(""), "");
    }

    #[tokio::test]
    async fn test_search_tv_show_with_episode() {
        let server = MockServer::start().await;
        mount_show(&server).await;
        Mock::given(method("GET"))
            .and(path("/shows/169/episodebynumber"))
            .and(query_param("season", "1"))
            .and(query_param("number", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 17,
                "name": "Gray Matter",
                "season": 1,
                "number": 5,
                "airdate": "2008-02-24"
            })))
            .mount(&server)
            .await;

        let client = TvmazeClient::with_base_url(&server.uri()).unwrap();
        let record = client
            .search_tv_show(&query("Breaking Bad", 1, 5), "en")
            .await
            .unwrap();

        assert_eq!(
            record,
            TvEpisodeRecord {
                title: "Breaking Bad".to_string(),
                year: Some(2008),
                overview: "Breaking Bad follows Walter White & Jesse.".to_string(),
                season: 1,
                episode: 5,
                episode_title: "Gray Matter".to_string(),
                network: "AMC".to_string(),
                status: "Ended".to_string(),
                season_count: 5,
                genres: vec![
                    "Drama".to_string(),
                    "Crime".to_string(),
                    "Thriller".to_string(),
                ],
                air_date: "2008-02-24".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_search_tv_show_missing_episode_keeps_show() {
        let server = MockServer::start().await;
        mount_show(&server).await;
        Mock::given(method("GET"))
            .and(path("/shows/169/episodebynumber"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = TvmazeClient::with_base_url(&server.uri()).unwrap();
        let record = client
            .search_tv_show(&query("Breaking Bad", 9, 99), "en")
            .await
            .unwrap();

        assert_eq!(record.title, "Breaking Bad");
        assert_eq!((record.season, record.episode), (9, 99));
        assert_eq!(record.episode_title, "");
    }

    #[tokio::test]
    async fn test_search_tv_show_falls_back_to_web_channel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/shows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"show": {"id": 7}}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/shows/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 7,
                "name": "Stream Only",
                "genres": [],
                "premiered": null,
                "network": null,
                "webChannel": {"id": 1, "name": "Netflix"},
                "summary": null
            })))
            .mount(&server)
            .await;

        let client = TvmazeClient::with_base_url(&server.uri()).unwrap();
        let record = client
            .search_tv_show(&query("Stream Only", 0, 0), "en")
            .await
            .unwrap();

        assert_eq!(record.network, "Netflix");
        assert_eq!(record.year, None);
        assert_eq!(record.overview, "");
        assert_eq!(record.season_count, 0);
    }

    #[tokio::test]
    async fn test_search_tv_show_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/shows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = TvmazeClient::with_base_url(&server.uri()).unwrap();
        let err = client
            .search_tv_show(&query("NonExistentShow", 1, 1), "en")
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "no TV shows found matching 'NonExistentShow'"
        );
    }

    #[tokio::test]
    async fn test_search_movie_unsupported() {
        let client = TvmazeClient::new().unwrap();
        let err = client
            .search_movie(&MovieQuery::default(), "en")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "TVMaze does not support movie lookups");
    }
}
