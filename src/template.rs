//! Filename and directory templates.
//!
//! Templates use `{name}` placeholders, `{name:02d}` for two-digit numbers and
//! `{name[0]}` for a single character:
//!
//! ```
//! use vidkit::template::{RenderOptions, TemplateFields, render};
//!
//! let fields = TemplateFields::new()
//!     .with_var("title", "Breaking Bad")
//!     .with_var("season", "1")
//!     .with_var("episode", "5");
//!
//! let name = render("{title} S{season:02d}E{episode:02d}", &fields, &RenderOptions::default());
//! assert_eq!(name, "Breaking Bad S01E05");
//! ```

use regex::{Captures, Regex};
use sanitize_filename::{Options, sanitize_with_options};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use crate::{
    config::Config,
    metadata::{MovieRecord, TvEpisodeRecord},
    probe::MediaTechInfo,
};

pub const DEFAULT_MOVIE_FORMAT: &str = "{title} ({year}) [{resolution} {codec}]";
pub const DEFAULT_TV_FORMAT: &str =
    "{title} S{season:02d}E{episode:02d} {episode_title} [{resolution} {codec}]";
pub const DEFAULT_MOVIE_DIRECTORY: &str = "{genre}/{title} ({year})";
pub const DEFAULT_TV_DIRECTORY: &str = "{genre}/{title}/Season {season}";

const UNKNOWN_GENRE: &str = "Unknown";

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)(?:\[([0-9]+)\]|(:02d))?\}").unwrap()
});

/// Replace `/ \ : * ? " < > |` and control characters with `-`.
fn make_safe(value: &str) -> String {
    sanitize_with_options(
        value,
        Options {
            windows: false,
            truncate: false,
            replacement: "-",
        },
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Replaces every space in the rendered text when not `" "`.
    pub separator: String,
    pub lowercase: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            separator: " ".to_string(),
            lowercase: false,
        }
    }
}

impl RenderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            separator: config.separator.clone(),
            lowercase: config.lowercase,
        }
    }
}

/// Values available to a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateFields {
    vars: HashMap<String, String>,
}

impl TemplateFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|s| s.as_str())
    }

    fn with_tech(self, tech: &MediaTechInfo) -> Self {
        self.with_var("resolution", &tech.resolution)
            .with_var("codec", &tech.codec)
    }

    fn with_genres(self, genres: &[String]) -> Self {
        let genre = genres.first().map_or(UNKNOWN_GENRE, String::as_str);
        self.with_var("genre", genre)
    }

    /// Fields for a movie: `title year genre resolution codec`.
    pub fn for_movie(movie: &MovieRecord, tech: &MediaTechInfo) -> Self {
        Self::new()
            .with_var("title", &movie.title)
            .with_var("year", &movie.year.unwrap_or(0).to_string())
            .with_genres(&movie.genres)
            .with_tech(tech)
    }

    /// Fields for an episode: the movie set plus `season episode episode_title network`.
    pub fn for_episode(show: &TvEpisodeRecord, tech: &MediaTechInfo) -> Self {
        Self::new()
            .with_var("title", &show.title)
            .with_var("year", &show.year.unwrap_or(0).to_string())
            .with_var("season", &show.season.to_string())
            .with_var("episode", &show.episode.to_string())
            .with_var("episode_title", &show.episode_title)
            .with_var("network", &show.network)
            .with_genres(&show.genres)
            .with_tech(tech)
    }

    fn resolve(&self, caps: &Captures) -> String {
        let Some(value) = self.get(&caps[1]) else {
            return caps[0].to_string();
        };

        if let Some(index) = caps.get(2) {
            return index
                .as_str()
                .parse::<usize>()
                .ok()
                .and_then(|i| value.chars().nth(i))
                .map(|c| make_safe(&c.to_string()))
                .unwrap_or_default();
        }

        if let (Some(_), Ok(number)) = (caps.get(3), value.parse::<u64>()) {
            return format!("{:02}", number);
        }

        make_safe(value)
    }

    /// Replace every known placeholder in one pass. Unknown placeholders stay as written.
    pub fn substitute(&self, template: &str) -> String {
        TOKEN
            .replace_all(template, |caps: &Captures| self.resolve(caps))
            .into_owned()
    }
}

/// Substitute `fields` into `template`, then apply the separator and case options.
pub fn render(template: &str, fields: &TemplateFields, options: &RenderOptions) -> String {
    let mut rendered = fields.substitute(template);
    if options.separator != " " {
        rendered = rendered.replace(' ', &options.separator);
    }
    if options.lowercase {
        rendered = rendered.to_lowercase();
    }
    rendered
}

/// [`render`] for a single path component; the whole result is made filesystem-safe.
pub fn render_file_name(
    template: &str,
    fields: &TemplateFields,
    options: &RenderOptions,
) -> String {
    make_safe(&render(template, fields, options))
}

/// [`render`] for a relative directory. `/` in the template itself separates directories.
pub fn render_directory(
    template: &str,
    fields: &TemplateFields,
    options: &RenderOptions,
) -> String {
    render(template, fields, options)
}

/// Templates that decide where a file ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    pub file_template: String,
    pub directory_template: Option<String>,
    pub options: RenderOptions,
}

impl Naming {
    fn new(config: &Config, file_template: &str, directory_template: &str) -> Self {
        Self {
            file_template: file_template.to_string(),
            directory_template: (config.organize_files && !directory_template.is_empty())
                .then(|| directory_template.to_string()),
            options: RenderOptions::from_config(config),
        }
    }

    pub fn movie(config: &Config) -> Self {
        Self::new(config, &config.movie_format, &config.movie_directory)
    }

    pub fn episode(config: &Config) -> Self {
        Self::new(config, &config.tv_format, &config.tv_directory)
    }

    /// `<source dir>/[<directory>/]<file name><source extension>`.
    ///
    /// A file template that renders blank keeps the source file name.
    pub fn destination(&self, source: &Path, fields: &TemplateFields) -> PathBuf {
        let base = source.parent().unwrap_or_else(|| Path::new(""));
        let mut file_name = render_file_name(&self.file_template, fields, &self.options);
        if file_name.trim().is_empty() {
            file_name = source
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        if let Some(ext) = source.extension() {
            file_name.push('.');
            file_name.push_str(&ext.to_string_lossy());
        }

        match &self.directory_template {
            Some(template) => base
                .join(render_directory(template, fields, &self.options))
                .join(file_name),
            None => base.join(file_name),
        }
    }
}
