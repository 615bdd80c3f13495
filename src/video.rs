use core::fmt;
use regex::Regex;
use std::{path::Path, sync::LazyLock};

/// Extensions handed to the parser when no allow-list is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".mp4", ".mkv", ".avi", ".mov", ".wmv", ".m4v", ".mpg", ".mpeg", ".webm", ".flv", ".ts",
    ".m2ts", ".mts", ".mxf",
];

// Release noise stripped from every title. Substring match, not word match.
static TITLE_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)1080p|720p|480p|360p|h264|x264|hdrip|brrip|bluray|web-dl|hdtv",
    )
    .unwrap()
});

// Terms that must never survive into an episode title hint.
static QUALITY_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)1080p|720p|480p|hevc|h264|x264|hdrip|brrip|bluray|web-dl|hdtv",
    )
    .unwrap()
});

static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\[\]()._]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DELIMITED_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([0-9]{4})\)|\[([0-9]{4})\]").unwrap());

/// Season/episode notations in priority order. The first pattern that matches wins,
/// looser notations only get a chance when the stricter ones fail.
static EPISODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Show.Name.S01E02.Episode.Title
        r"(?i)(.*?)[\s._-]*s([0-9]{1,2})[\s._-]*e([0-9]{1,2})(?:[\s._-]*(.*))?",
        // Show.Name.1x02.Episode.Title
        r"(?i)(.*?)[\s._-]*([0-9]{1,2})x([0-9]{1,2})(?:[\s._-]*(.*))?",
        // Show Name Season 1 Episode 2 Episode Title
        r"(?i)(.*?)[\s._-]*(?:season|s)[\s._-]*([0-9]{1,2})[\s._-]*(?:episode|ep|e)[\s._-]*([0-9]{1,2})(?:[\s._-]*(.*))?",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Show,
    Movie,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Show => "TV Show",
            ContentType::Movie => "Movie",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn episode_id(season: u32, episode: u32) -> String {
    format!("S{:02}E{:02}", season, episode)
}

/// Search terms for a movie lookup.
///
/// An empty `title` means the filename was not a movie (usually because it
/// carries a season/episode marker) and must not be sent to a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieQuery {
    pub title: String,
    pub year: Option<u16>,
}

impl MovieQuery {
    pub fn is_usable(&self) -> bool {
        !self.title.is_empty()
    }
}

impl fmt::Display for MovieQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.title)?;
        if let Some(year) = self.year {
            write!(f, " (year: {})", year)?;
        }
        Ok(())
    }
}

/// Search terms for a TV episode lookup.
///
/// `season` and `episode` are 1-based; a zero in either means the filename
/// did not describe an episode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TvQuery {
    pub title: String,
    pub year: Option<u16>,
    pub season: u32,
    pub episode: u32,
    pub episode_title: String,
}

impl TvQuery {
    pub fn is_episode(&self) -> bool {
        self.season > 0 && self.episode > 0
    }

    pub fn episode_id(&self) -> String {
        episode_id(self.season, self.episode)
    }
}

impl fmt::Display for TvQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.title)?;
        if let Some(year) = self.year {
            write!(f, " (year: {})", year)?;
        }
        write!(f, " - {}", self.episode_id())
    }
}

/// Raw pieces captured by the first season/episode pattern that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeMatch {
    pub show: String,
    pub season: u32,
    pub episode: u32,
    pub trailing: String,
}

/// Result of classifying a filename. TV is always tried before movie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Episode(TvQuery),
    Movie(MovieQuery),
    Unrecognized,
}

impl Classification {
    pub fn content_type(&self) -> Option<ContentType> {
        match self {
            Classification::Episode(_) => Some(ContentType::Show),
            Classification::Movie(_) => Some(ContentType::Movie),
            Classification::Unrecognized => None,
        }
    }
}

// File name up to its last dot. A name that starts with its only dot has an
// empty base.
fn base_name(path: &Path) -> String {
    let Some(name) = path.file_name() else {
        return String::new();
    };
    let name = name.to_string_lossy();
    match name.rfind('.') {
        Some(dot) => name[..dot].to_string(),
        None => name.into_owned(),
    }
}

// Removes every match, repeating until nothing is left to remove, so that
// removal cannot splice a new match together out of the leftovers.
fn strip_all(pattern: &Regex, text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = pattern.replace_all(&current, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Strip release noise and structural punctuation from a title candidate.
///
/// The result has single spaces between words and no surrounding whitespace.
/// Cleaning an already clean title returns it unchanged.
pub fn clean_title(raw: &str) -> String {
    let stripped = strip_all(&TITLE_NOISE, raw);
    let spaced = PUNCTUATION.replace_all(&stripped, " ");
    WHITESPACE.replace_all(spaced.trim(), " ").into_owned()
}

/// Find a year written as `(YYYY)` or `[YYYY]`.
///
/// The first such year wins, but every delimited year is replaced by a space in
/// the returned remainder. Bare digit runs such as `Movie.1999` are not years.
/// Without a match the text comes back untouched.
pub fn extract_year(text: &str) -> (Option<u16>, String) {
    let Some(captures) = DELIMITED_YEAR.captures(text) else {
        return (None, text.to_string());
    };
    let year = captures
        .get(1)
        .or_else(|| captures.get(2))
        .and_then(|m| m.as_str().parse().ok());
    (year, DELIMITED_YEAR.replace_all(text, " ").into_owned())
}

/// Match a base filename against the season/episode notations in priority order.
pub fn match_episode(name: &str) -> Option<EpisodeMatch> {
    EPISODE_PATTERNS.iter().find_map(|pattern| {
        let captures = pattern.captures(name)?;
        Some(EpisodeMatch {
            show: captures.get(1).map_or("", |m| m.as_str()).to_string(),
            season: captures.get(2)?.as_str().parse().ok()?,
            episode: captures.get(3)?.as_str().parse().ok()?,
            trailing: captures.get(4).map_or("", |m| m.as_str()).to_string(),
        })
    })
}

/// Extract movie search terms from a filename.
///
/// Filenames that look like episodes produce an empty query. When no delimited
/// year is present the base name is returned verbatim, dots and all.
pub fn extract_movie<P: AsRef<Path>>(filename: P) -> MovieQuery {
    let base = base_name(filename.as_ref());

    if match_episode(&base).is_some_and(|found| found.season > 0 && found.episode > 0) {
        return MovieQuery::default();
    }

    match extract_year(&base) {
        (Some(year), remainder) => MovieQuery {
            title: clean_title(&remainder),
            year: Some(year),
        },
        (None, _) => MovieQuery {
            title: base,
            year: None,
        },
    }
}

/// Extract TV episode search terms from a filename.
///
/// Without a season/episode marker the cleaned base name comes back with
/// season and episode left at zero.
pub fn extract_tv_show<P: AsRef<Path>>(filename: P) -> TvQuery {
    let base = base_name(filename.as_ref());

    let Some(found) = match_episode(&base) else {
        return TvQuery {
            title: clean_title(&base),
            ..TvQuery::default()
        };
    };

    let (year, show) = extract_year(&found.show);

    TvQuery {
        title: clean_title(&show),
        year,
        season: found.season,
        episode: found.episode,
        episode_title: clean_episode_title(&found.trailing),
    }
}

fn clean_episode_title(raw: &str) -> String {
    clean_title(&strip_all(&QUALITY_TERMS, raw))
}

/// Decide whether a filename names a TV episode, a movie, or neither.
pub fn classify<P: AsRef<Path>>(filename: P) -> Classification {
    let path = filename.as_ref();

    let show = extract_tv_show(path);
    if show.is_episode() {
        return Classification::Episode(show);
    }

    let movie = extract_movie(path);
    if movie.is_usable() {
        Classification::Movie(movie)
    } else {
        Classification::Unrecognized
    }
}

/// Lowercased extension of `path` if it is on the allow-list.
///
/// Allow-list entries may be written with or without the leading dot. An empty
/// allow-list falls back to [`DEFAULT_EXTENSIONS`].
pub fn parse_extension<S: AsRef<str>>(path: &Path, allowed: &[S]) -> Option<String> {
    if path.is_dir() {
        return None;
    }

    let ext = path.extension()?.to_str()?.to_lowercase();

    let matches = |candidate: &str| {
        candidate
            .strip_prefix('.')
            .unwrap_or(candidate)
            .eq_ignore_ascii_case(&ext)
    };
    let listed = if allowed.is_empty() {
        DEFAULT_EXTENSIONS.iter().any(|entry| matches(*entry))
    } else {
        allowed.iter().any(|entry| matches(entry.as_ref()))
    };

    listed.then_some(ext)
}

pub fn is_video_file<S: AsRef<str>>(path: &Path, allowed: &[S]) -> bool {
    parse_extension(path, allowed).is_some()
}
