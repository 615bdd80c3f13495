use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::resolution::standard_resolution;

const UNKNOWN: &str = "unknown";

/// Subset of `ffprobe -print_format json -show_format -show_streams` output.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VideoInfo {
    pub format: Format,
    pub streams: Vec<Stream>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Format {
    pub filename: String,
    pub format_name: String,
    pub duration: String,
    pub size: String,
    pub bit_rate: String,
    pub probe_score: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Stream {
    pub codec_type: String,
    pub codec_name: String,
    pub width: u32,
    pub height: u32,
    pub bit_rate: String,
    #[serde(rename = "r_frame_rate")]
    pub frame_rate: String,
    pub sample_rate: String,
    pub channels: u32,
    pub channel_layout: String,
}

/// The technical fields a filename template can refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTechInfo {
    pub resolution: String,
    pub codec: String,
}

impl Default for MediaTechInfo {
    fn default() -> Self {
        Self {
            resolution: UNKNOWN.to_string(),
            codec: UNKNOWN.to_string(),
        }
    }
}

impl VideoInfo {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse ffprobe output")
    }

    pub fn video_stream(&self) -> Option<&Stream> {
        self.streams.iter().find(|s| s.codec_type == "video")
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams.iter().filter(|s| s.codec_type == "audio")
    }

    /// Resolution label and codec of the first video stream.
    pub fn tech_info(&self) -> MediaTechInfo {
        match self.video_stream() {
            Some(stream) => MediaTechInfo {
                resolution: standard_resolution(stream.width, stream.height),
                codec: if stream.codec_name.is_empty() {
                    UNKNOWN.to_string()
                } else {
                    stream.codec_name.clone()
                },
            },
            None => MediaTechInfo::default(),
        }
    }
}

fn ffprobe_path() -> String {
    std::env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string())
}

/// Run ffprobe on `path`. `FFPROBE_PATH` overrides the binary.
pub async fn probe(path: &Path) -> Result<VideoInfo> {
    let program = ffprobe_path();
    debug!(program = %program, path = %path.display(), "probing");

    let output = Command::new(&program)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .with_context(|| format!("Failed to run {}", program))?;

    if !output.status.success() {
        bail!("ffprobe failed for {:?}: {}", path, output.status);
    }

    VideoInfo::parse(&String::from_utf8_lossy(&output.stdout))
}

/// `"1500000"` -> `"1500.00 Kbps"`.
pub fn format_bit_rate(bit_rate: &str) -> String {
    if bit_rate.is_empty() {
        return "N/A".to_string();
    }
    match bit_rate.parse::<f64>() {
        Ok(rate) => format!("{:.2} Kbps", rate / 1000.0),
        Err(_) => format!("{} bps", bit_rate),
    }
}

/// Byte count as B/KB/MB/GB/TB.
pub fn format_file_size(size: &str) -> String {
    const UNIT: f64 = 1024.0;
    const PREFIXES: [char; 4] = ['K', 'M', 'G', 'T'];

    if size.is_empty() {
        return "N/A".to_string();
    }
    let Ok(bytes) = size.parse::<f64>() else {
        return format!("{} bytes", size);
    };
    if bytes < UNIT {
        return format!("{:.0} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    while bytes / div >= UNIT && exp < PREFIXES.len() - 1 {
        div *= UNIT;
        exp += 1;
    }
    format!("{:.2} {}B", bytes / div, PREFIXES[exp])
}

/// `"24000/1001"` -> `"23.98 fps"`. Anything unparsable is returned as given.
pub fn format_frame_rate(frame_rate: &str) -> String {
    if frame_rate.is_empty() {
        return "N/A".to_string();
    }
    let Some((num, den)) = frame_rate.split_once('/') else {
        return frame_rate.to_string();
    };
    match (num.parse::<f64>(), den.parse::<f64>()) {
        (Ok(num), Ok(den)) if den != 0.0 => format!("{:.2} fps", num / den),
        _ => frame_rate.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FFPROBE_JSON: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "h264",
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "24000/1001",
                "bit_rate": "4500000"
            },
            {
                "index": 1,
                "codec_name": "aac",
                "codec_type": "audio",
                "sample_rate": "48000",
                "channels": 2,
                "channel_layout": "stereo",
                "bit_rate": "128000"
            }
        ],
        "format": {
            "filename": "Big Buck Bunny (2008).mp4",
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "596.474195",
            "size": "158008374",
            "bit_rate": "2119234",
            "probe_score": 100
        }
    }"#;

    #[test]
    fn test_parse_ffprobe_output() {
        let info = VideoInfo::parse(FFPROBE_JSON).unwrap();
        assert_eq!(info.format.format_name, "mov,mp4,m4a,3gp,3g2,mj2");
        assert_eq!(info.format.probe_score, 100);
        assert_eq!(info.streams.len(), 2);

        let video = info.video_stream().unwrap();
        assert_eq!((video.width, video.height), (1920, 1080));
        assert_eq!(video.frame_rate, "24000/1001");

        let audio: Vec<_> = info.audio_streams().collect();
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].channel_layout, "stereo");
    }

    #[test]
    fn test_tech_info_from_video_stream() {
        let info = VideoInfo::parse(FFPROBE_JSON).unwrap();
        assert_eq!(
            info.tech_info(),
            MediaTechInfo {
                resolution: "1080p".to_string(),
                codec: "h264".to_string(),
            }
        );
    }

    #[test]
    fn test_tech_info_without_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio", "codec_name": "flac"}]}"#;
        let info = VideoInfo::parse(json).unwrap();
        assert_eq!(info.tech_info(), MediaTechInfo::default());
        assert_eq!(info.tech_info().resolution, "unknown");
    }

    #[test]
    fn test_parse_invalid_output() {
        assert!(VideoInfo::parse("not json").is_err());
    }

    #[test]
    fn test_format_bit_rate() {
        assert_eq!(format_bit_rate("1500000"), "1500.00 Kbps");
        assert_eq!(format_bit_rate(""), "N/A");
        assert_eq!(format_bit_rate("fast"), "fast bps");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size("512"), "512 B");
        assert_eq!(format_file_size("2048"), "2.00 KB");
        assert_eq!(format_file_size("1048576"), "1.00 MB");
        assert_eq!(format_file_size("1073741824"), "1.00 GB");
        assert_eq!(format_file_size(""), "N/A");
        assert_eq!(format_file_size("big"), "big bytes");
    }

    #[test]
    fn test_format_frame_rate() {
        assert_eq!(format_frame_rate("24000/1001"), "23.98 fps");
        assert_eq!(format_frame_rate("25/1"), "25.00 fps");
        assert_eq!(format_frame_rate("30/0"), "30/0");
        assert_eq!(format_frame_rate("25"), "25");
        assert_eq!(format_frame_rate(""), "N/A");
    }
}
