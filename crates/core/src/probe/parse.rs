//! Parsing of ffprobe's JSON report.

use serde::Deserialize;

use super::error::ProbeError;
use super::types::{FormatDescriptor, MediaMetadata, StreamDescriptor, StreamKind};

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    format_long_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    #[serde(default)]
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    codec_long_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    bit_rate: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u8>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    #[serde(default)]
    tags: Option<ProbeStreamTags>,
}

#[derive(Deserialize)]
struct ProbeSideData {
    /// Display matrix rotation, counter-clockwise degrees.
    rotation: Option<f64>,
}

#[derive(Deserialize)]
struct ProbeStreamTags {
    /// Legacy clockwise rotation tag.
    rotate: Option<String>,
}

/// Parses a rational like "24000/1001", "30/1" or a plain number.
fn parse_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            (den > 0.0 && num > 0.0).then(|| num / den)
        }
        None => rate.trim().parse::<f64>().ok().filter(|r| *r > 0.0),
    }
}

/// Clockwise quarter-turn rotation of a stream.
///
/// The display matrix side data wins over the legacy `rotate` tag.
/// Angles that are not a multiple of 90 degrees are ignored.
fn parse_rotation(stream: &ProbeStream) -> Option<u16> {
    let clockwise = stream
        .side_data_list
        .iter()
        .find_map(|d| d.rotation)
        .map(|ccw| -ccw)
        .or_else(|| {
            stream
                .tags
                .as_ref()
                .and_then(|t| t.rotate.as_deref())
                .and_then(|r| r.trim().parse::<f64>().ok())
        })?;
    if !clockwise.is_finite() || clockwise.fract() != 0.0 {
        return None;
    }
    let degrees = (clockwise as i64).rem_euclid(360);
    (degrees % 90 == 0).then_some(degrees as u16)
}

fn parse_number<T: std::str::FromStr>(value: Option<&String>) -> Option<T> {
    value.and_then(|v| v.trim().parse::<T>().ok())
}

fn parse_seconds(value: Option<&String>) -> Option<f64> {
    parse_number::<f64>(value).filter(|d| d.is_finite() && *d >= 0.0)
}

/// Parses ffprobe `-print_format json -show_format -show_streams` output.
///
/// An absent duration becomes 0 and absent streams become an empty list;
/// anything that is not a JSON object of the expected shape is rejected.
pub fn parse_probe_output(output: &str) -> Result<MediaMetadata, ProbeError> {
    let probe: ProbeOutput =
        serde_json::from_str(output).map_err(|e| ProbeError::Malformed {
            reason: format!("Failed to parse ffprobe output: {}", e),
        })?;

    let (format, duration_secs) = match probe.format {
        Some(format) => {
            let duration = parse_seconds(format.duration.as_ref()).unwrap_or(0.0);
            let name = format
                .format_name
                .as_deref()
                .and_then(|n| n.split(',').next())
                .filter(|n| !n.is_empty())
                .unwrap_or("unknown")
                .to_string();
            (
                FormatDescriptor {
                    name,
                    long_name: format.format_long_name,
                    size_bytes: parse_number(format.size.as_ref()),
                    bit_rate: parse_number(format.bit_rate.as_ref()),
                },
                duration,
            )
        }
        None => (FormatDescriptor::default(), 0.0),
    };

    let streams = probe
        .streams
        .into_iter()
        .map(|s| {
            let kind = StreamKind::from_codec_type(s.codec_type.as_deref().unwrap_or(""));
            let rotation = if kind == StreamKind::Video {
                parse_rotation(&s).filter(|r| *r != 0)
            } else {
                None
            };
            let frame_rate = if kind == StreamKind::Video {
                s.avg_frame_rate
                    .as_deref()
                    .and_then(parse_rate)
                    .or_else(|| s.r_frame_rate.as_deref().and_then(parse_rate))
            } else {
                None
            };
            StreamDescriptor {
                index: s.index,
                kind,
                codec: s.codec_name,
                codec_long_name: s.codec_long_name,
                width: s.width.filter(|_| kind == StreamKind::Video),
                height: s.height.filter(|_| kind == StreamKind::Video),
                rotation,
                bit_rate: parse_number(s.bit_rate.as_ref()),
                frame_rate,
                duration_secs: parse_seconds(s.duration.as_ref()),
                sample_rate: parse_number(s.sample_rate.as_ref()),
                channels: s.channels,
            }
        })
        .collect();

    Ok(MediaMetadata {
        format,
        duration_secs,
        streams,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MP4_REPORT: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "h264",
                "codec_long_name": "H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10",
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "24000/1001",
                "avg_frame_rate": "24000/1001",
                "duration": "8.008000",
                "bit_rate": "1205000"
            },
            {
                "index": 1,
                "codec_name": "aac",
                "codec_type": "audio",
                "sample_rate": "48000",
                "channels": 2,
                "r_frame_rate": "0/0",
                "duration": "8.000000",
                "bit_rate": "128000"
            }
        ],
        "format": {
            "filename": "clip.mp4",
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "format_long_name": "QuickTime / MOV",
            "duration": "8.008000",
            "size": "1340000",
            "bit_rate": "1338661"
        }
    }"#;

    #[test]
    fn test_parse_video_report() {
        let metadata = parse_probe_output(MP4_REPORT).unwrap();
        assert_eq!(metadata.format.name, "mov");
        assert_eq!(metadata.format.long_name.as_deref(), Some("QuickTime / MOV"));
        assert_eq!(metadata.format.size_bytes, Some(1340000));
        assert!((metadata.duration_secs - 8.008).abs() < 1e-9);
        assert_eq!(metadata.streams.len(), 2);

        let video = &metadata.streams[0];
        assert_eq!(video.kind, StreamKind::Video);
        assert_eq!(video.codec.as_deref(), Some("h264"));
        assert_eq!((video.width, video.height), (Some(1920), Some(1080)));
        assert!((video.frame_rate.unwrap() - 23.976).abs() < 0.01);
        assert_eq!(video.bit_rate, Some(1205000));

        let audio = &metadata.streams[1];
        assert_eq!(audio.kind, StreamKind::Audio);
        assert_eq!(audio.sample_rate, Some(48000));
        assert_eq!(audio.channels, Some(2));
        assert_eq!(audio.frame_rate, None);
    }

    #[test]
    fn test_missing_duration_defaults_to_zero() {
        let json = r#"{"format": {"format_name": "image2"}, "streams": []}"#;
        let metadata = parse_probe_output(json).unwrap();
        assert_eq!(metadata.duration_secs, 0.0);
        assert!(!metadata.has_usable_duration());
        assert_eq!(metadata.format.name, "image2");
    }

    #[test]
    fn test_missing_streams_defaults_to_empty() {
        let json = r#"{"format": {"format_name": "mp3", "duration": "N/A"}}"#;
        let metadata = parse_probe_output(json).unwrap();
        assert!(metadata.streams.is_empty());
        assert_eq!(metadata.duration_secs, 0.0);
    }

    #[test]
    fn test_malformed_output_rejected() {
        let result = parse_probe_output("not json at all");
        assert!(matches!(result, Err(ProbeError::Malformed { .. })));

        let result = parse_probe_output(r#"{"streams": "nope"}"#);
        assert!(matches!(result, Err(ProbeError::Malformed { .. })));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let first = serde_json::to_vec(&parse_probe_output(MP4_REPORT).unwrap()).unwrap();
        let second = serde_json::to_vec(&parse_probe_output(MP4_REPORT).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    fn portrait_report(side_data: &str, tags: &str) -> String {
        format!(
            r#"{{
                "streams": [{{
                    "index": 0,
                    "codec_name": "h264",
                    "codec_type": "video",
                    "width": 1920,
                    "height": 1080{side_data}{tags}
                }}],
                "format": {{"format_name": "mov,mp4", "duration": "12.0"}}
            }}"#
        )
    }

    #[test]
    fn test_display_matrix_rotation_swaps_dimensions() {
        let json = portrait_report(
            r#", "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]"#,
            "",
        );
        let metadata = parse_probe_output(&json).unwrap();
        assert_eq!(metadata.streams[0].rotation, Some(90));
        assert_eq!(metadata.frame_dimensions(), Some((1080, 1920)));
    }

    #[test]
    fn test_rotate_tag_swaps_dimensions() {
        let json = portrait_report("", r#", "tags": {"rotate": "270"}"#);
        let metadata = parse_probe_output(&json).unwrap();
        assert_eq!(metadata.streams[0].rotation, Some(270));
        assert_eq!(metadata.frame_dimensions(), Some((1080, 1920)));
    }

    #[test]
    fn test_upside_down_and_odd_angles_keep_dimensions() {
        let json = portrait_report(r#", "side_data_list": [{"rotation": 180}]"#, "");
        let metadata = parse_probe_output(&json).unwrap();
        assert_eq!(metadata.streams[0].rotation, Some(180));
        assert_eq!(metadata.frame_dimensions(), Some((1920, 1080)));

        let json = portrait_report("", r#", "tags": {"rotate": "45"}"#);
        let metadata = parse_probe_output(&json).unwrap();
        assert_eq!(metadata.streams[0].rotation, None);
        assert_eq!(metadata.frame_dimensions(), Some((1920, 1080)));
    }

    #[test]
    fn test_parse_rate() {
        assert!((parse_rate("30/1").unwrap() - 30.0).abs() < f64::EPSILON);
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("25"), Some(25.0));
        assert_eq!(parse_rate("abc"), None);
    }
}
