//! Canned engine output.

/// ffprobe JSON for a clip with one H.264 video and one AAC audio stream.
///
/// A `duration_secs` of zero or less omits the duration entirely.
pub fn probe_json(duration_secs: f64, width: u32, height: u32) -> String {
    let duration = if duration_secs > 0.0 {
        format!(r#","duration": "{:.6}""#, duration_secs)
    } else {
        String::new()
    };
    format!(
        r#"{{
    "streams": [
        {{
            "index": 0,
            "codec_name": "h264",
            "codec_long_name": "H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10",
            "codec_type": "video",
            "width": {width},
            "height": {height},
            "r_frame_rate": "25/1",
            "avg_frame_rate": "25/1",
            "bit_rate": "1205000"
        }},
        {{
            "index": 1,
            "codec_name": "aac",
            "codec_type": "audio",
            "sample_rate": "48000",
            "channels": 2,
            "bit_rate": "128000"
        }}
    ],
    "format": {{
        "filename": "input.mp4",
        "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
        "format_long_name": "QuickTime / MOV",
        "size": "1340000",
        "bit_rate": "1338661"{duration}
    }}
}}"#
    )
}

/// `count` cropdetect lines that all suggest the same region.
pub fn cropdetect_lines(width: u32, height: u32, x: u32, y: u32, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            format!(
                "[Parsed_cropdetect_0 @ 0x5581c0] x1:{} x2:{} y1:{} y2:{} w:{} h:{} x:{} y:{} pts:{} t:{:.2} crop={}:{}:{}:{}",
                x,
                x + width.saturating_sub(1),
                y,
                y + height.saturating_sub(1),
                width,
                height,
                x,
                y,
                i * 512,
                i as f64 * 0.04,
                width,
                height,
                x,
                y
            )
        })
        .collect()
}
