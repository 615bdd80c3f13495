use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use inquire::Confirm;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tabled::{Table, Tabled, settings::Style};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use vidkit::{
    config::Config,
    metadata::{
        MetadataProvider, MovieRecord, ProviderKind, TvEpisodeRecord, movie_provider, tv_provider,
    },
    probe::{self, VideoInfo, format_bit_rate, format_file_size, format_frame_rate},
    resolution::standard_resolution,
    template::{Naming, TemplateFields},
    video::{Classification, classify, is_video_file},
};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Video files or directories to process
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Rename without asking for confirmation
    #[arg(long)]
    batch: bool,

    /// Descend into subdirectories
    #[arg(long)]
    recursive: bool,

    /// Lowercase the new names
    #[arg(long)]
    lowercase: bool,

    /// Use dots instead of spaces
    #[arg(long)]
    scene_style: bool,

    /// Replace spaces in new names with this string
    #[arg(long)]
    separator: Option<String>,

    /// Move files into the directory templates
    #[arg(long)]
    organize: bool,

    /// Skip files whose new name already exists
    #[arg(long)]
    no_overwrite: bool,

    /// Only show technical information
    #[arg(long)]
    no_metadata: bool,

    /// Show the new names without renaming anything
    #[arg(long)]
    preview: bool,

    /// Metadata language (ISO 639-1)
    #[arg(long)]
    lang: Option<String>,

    #[arg(long)]
    movie_filename_template: Option<String>,

    #[arg(long)]
    tv_filename_template: Option<String>,

    #[arg(long)]
    movie_directory_template: Option<String>,

    #[arg(long)]
    tv_directory_template: Option<String>,

    #[arg(long, value_enum)]
    movie_provider: Option<ProviderKind>,

    #[arg(long, value_enum)]
    tv_provider: Option<ProviderKind>,

    /// Config file [default: ~/.config/vidkit/config.json]
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    /// Flags override the config file only when given.
    fn apply(&self, config: &mut Config) {
        config.batch_mode |= self.batch;
        config.recursive |= self.recursive;
        config.lowercase |= self.lowercase;
        config.scene_style |= self.scene_style;
        config.organize_files |= self.organize;
        config.no_overwrite |= self.no_overwrite;
        config.no_metadata |= self.no_metadata;
        config.preview_mode |= self.preview;

        let overrides = [
            (&mut config.separator, &self.separator),
            (&mut config.language, &self.lang),
            (&mut config.movie_format, &self.movie_filename_template),
            (&mut config.tv_format, &self.tv_filename_template),
            (&mut config.movie_directory, &self.movie_directory_template),
            (&mut config.tv_directory, &self.tv_directory_template),
        ];
        for (field, value) in overrides {
            if let Some(value) = value {
                *field = value.clone();
            }
        }

        if let Some(provider) = self.movie_provider {
            config.movie_provider = provider;
        }
        if let Some(provider) = self.tv_provider {
            config.tv_provider = provider;
        }
    }
}

struct Providers {
    movies: Box<dyn MetadataProvider>,
    shows: Box<dyn MetadataProvider>,
}

impl Providers {
    fn from_config(config: &Config) -> Result<Option<Self>> {
        if !config.metadata_enabled() {
            return Ok(None);
        }
        Ok(Some(Self {
            movies: movie_provider(config).context("Invalid movie provider")?,
            shows: tv_provider(config).context("Invalid TV show provider")?,
        }))
    }
}

#[derive(Tabled)]
struct StreamRow {
    #[tabled(rename = "Stream")]
    kind: String,
    #[tabled(rename = "Codec")]
    codec: String,
    #[tabled(rename = "Details")]
    details: String,
    #[tabled(rename = "Bitrate")]
    bit_rate: String,
}

fn heading(title: &str) {
    println!("\n{}", format!("=== {} ===", title).cyan().bold());
}

fn print_wrapped(label: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    let width = textwrap::termwidth().min(100);
    println!("{}\n{}", label.bold(), textwrap::fill(text, width));
}

fn print_file_info(path: &Path, info: &VideoInfo) {
    heading(&format!("Processing: {}", path.display()));
    println!("{} {}", "Container:".bold(), info.format.format_name);
    println!("{} {} seconds", "Duration:".bold(), info.format.duration);
    println!(
        "{} {}",
        "File size:".bold(),
        format_file_size(&info.format.size)
    );
    println!(
        "{} {}",
        "Bitrate:".bold(),
        format_bit_rate(&info.format.bit_rate)
    );

    let rows: Vec<StreamRow> = info
        .streams
        .iter()
        .filter_map(|stream| {
            let details = match stream.codec_type.as_str() {
                "video" => format!(
                    "{} @ {}",
                    standard_resolution(stream.width, stream.height),
                    format_frame_rate(&stream.frame_rate)
                ),
                "audio" => format!(
                    "{} Hz, {} ch {}",
                    stream.sample_rate, stream.channels, stream.channel_layout
                ),
                _ => return None,
            };
            Some(StreamRow {
                kind: stream.codec_type.clone(),
                codec: stream.codec_name.clone(),
                details: details.trim().to_string(),
                bit_rate: format_bit_rate(&stream.bit_rate),
            })
        })
        .collect();

    if !rows.is_empty() {
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", table);
    }
}

fn print_movie(movie: &MovieRecord) {
    heading("Movie Metadata");
    println!("{} {}", "Title:".bold(), movie.title);
    if let Some(year) = movie.year {
        println!("{} {}", "Year:".bold(), year);
    }
    if !movie.genres.is_empty() {
        println!("{} {}", "Genres:".bold(), movie.genres.join(", "));
    }
    print_wrapped("Overview:", &movie.overview);
}

fn print_episode(show: &TvEpisodeRecord) {
    heading("TV Show Metadata");
    println!("{} {}", "Title:".bold(), show.title);
    if let Some(year) = show.year {
        println!("{} {}", "Year:".bold(), year);
    }
    for (label, value) in [("Network:", &show.network), ("Status:", &show.status)] {
        if !value.is_empty() {
            println!("{} {}", label.bold(), value);
        }
    }
    if !show.genres.is_empty() {
        println!("{} {}", "Genres:".bold(), show.genres.join(", "));
    }
    if show.season_count > 0 {
        println!("{} {}", "Seasons:".bold(), show.season_count);
    }

    heading("Episode Information");
    println!("{} {}", "Season:".bold(), show.season);
    println!("{} {}", "Episode:".bold(), show.episode);
    for (label, value) in [
        ("Title:", &show.episode_title),
        ("Air date:", &show.air_date),
    ] {
        if !value.is_empty() {
            println!("{} {}", label.bold(), value);
        }
    }
    print_wrapped("Overview:", &show.overview);
}

/// Video files under `path`, sorted by name. Subdirectories only when recursive.
fn collect_files(path: &Path, config: &Config) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        if !is_video_file(path, &config.file_extensions) {
            bail!("Unsupported file type: {}", path.display());
        }
        return Ok(vec![path.to_path_buf()]);
    }

    let max_depth = if config.recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(path).max_depth(max_depth).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to read {}", path.display()))?;
        if entry.file_type().is_file() && is_video_file(entry.path(), &config.file_extensions) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn commit(old: &Path, new: &Path) -> Result<()> {
    let parent = new.parent().context("Failed to get parent")?;
    fs::create_dir_all(parent)?;
    fs::rename(old, new)
        .with_context(|| format!("Failed to rename {:?} to {:?}", old, new))?;
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Renamed,
    Unchanged,
    Previewed,
    Exists,
    Declined,
}

/// Show the planned rename and carry it out unless previewing, blocked or declined.
fn finish(old: &Path, new: &Path, config: &Config) -> Result<Outcome> {
    heading("File Renaming");
    println!("{} {}", "Original:".bold(), old.display());
    println!("{} {}", "New name:".bold(), new.display());

    if old == new {
        println!("Already named correctly");
        return Ok(Outcome::Unchanged);
    }
    if config.preview_mode {
        println!(
            "{}",
            "[PREVIEW] File would be renamed as shown above".yellow()
        );
        return Ok(Outcome::Previewed);
    }
    if config.no_overwrite && new.exists() {
        println!("{}", "Skipping rename: target file already exists".yellow());
        return Ok(Outcome::Exists);
    }
    if !config.batch_mode {
        let confirmed = Confirm::new("Rename this file?")
            .with_default(false)
            .prompt()?;
        if !confirmed {
            return Ok(Outcome::Declined);
        }
    }

    commit(old, new)?;
    println!("{}", "File renamed successfully!".green());
    Ok(Outcome::Renamed)
}

async fn process_file(path: &Path, config: &Config, providers: Option<&Providers>) -> Result<()> {
    let info = probe::probe(path).await?;
    print_file_info(path, &info);

    let Some(providers) = providers else {
        return Ok(());
    };
    let tech = info.tech_info();

    let target = match classify(path) {
        Classification::Episode(query) => {
            heading("Looking up TV show metadata");
            println!("Searching {} for {}", providers.shows.name(), query);
            let show = providers
                .shows
                .search_tv_show(&query, &config.language)
                .await
                .context("Failed to look up TV show")?;
            print_episode(&show);
            let fields = TemplateFields::for_episode(&show, &tech);
            Naming::episode(config).destination(path, &fields)
        }
        Classification::Movie(query) => {
            heading("Looking up movie metadata");
            println!("Searching {} for {}", providers.movies.name(), query);
            let movie = providers
                .movies
                .search_movie(&query, &config.language)
                .await
                .context("Failed to look up movie")?;
            print_movie(&movie);
            let fields = TemplateFields::for_movie(&movie, &tech);
            Naming::movie(config).destination(path, &fields)
        }
        Classification::Unrecognized => {
            debug!(path = %path.display(), "no title in filename");
            return Ok(());
        }
    };

    let outcome = finish(path, &target, config)?;
    debug!(?outcome, "done");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vidkit=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };
    let mut config = Config::load_from(&config_path).unwrap_or_else(|err| {
        warn!("Failed to load config, using defaults: {:#}", err);
        Config::default()
    });
    config.apply_env();
    args.apply(&mut config);
    config.validate().context("Error in configuration")?;

    let providers = Providers::from_config(&config)?;

    for path in &args.paths {
        let files = match collect_files(path, &config) {
            Ok(files) => files,
            Err(err) => {
                warn!("{:#}", err);
                continue;
            }
        };
        info!("Found {} video file(s) in {}", files.len(), path.display());

        for file in files {
            if let Err(err) = process_file(&file, &config, providers.as_ref()).await {
                warn!("Error processing {}: {:#}", file.display(), err);
            }
        }
    }

    Ok(())
}
