use std::fmt::Write;
use std::time::Duration;

use super::SubtitleCue;

/// `HH:MM:SS,mmm`
pub fn format_srt_timestamp(d: Duration) -> String {
    let total = d.as_secs();
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total / 3600,
        (total % 3600) / 60,
        total % 60,
        d.subsec_millis()
    )
}

/// Renders cues as SubRip: sequence number from 1, time range, text, blank
/// line. Cues without text are skipped and numbering stays consecutive.
pub fn render_srt(cues: &[SubtitleCue]) -> String {
    let mut out = String::new();
    let spoken = cues.iter().filter(|cue| !cue.text.trim().is_empty());
    for (i, cue) in spoken.enumerate() {
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_srt_timestamp(cue.start),
            format_srt_timestamp(cue.end),
            cue.text
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_timestamps() {
        assert_eq!(format_srt_timestamp(Duration::ZERO), "00:00:00,000");
        assert_eq!(
            format_srt_timestamp(Duration::from_millis(3_723_045)),
            "01:02:03,045"
        );
    }

    #[test]
    fn renders_cue_blocks() {
        let cues = vec![
            SubtitleCue {
                start: Duration::ZERO,
                end: Duration::from_secs(8),
                text: "First two lines.".into(),
                first_segment: 0,
                last_segment: 1,
            },
            SubtitleCue {
                start: Duration::from_secs(8),
                end: Duration::from_millis(12_500),
                text: "Third.".into(),
                first_segment: 2,
                last_segment: 2,
            },
        ];
        assert_eq!(
            render_srt(&cues),
            "1\n00:00:00,000 --> 00:00:08,000\nFirst two lines.\n\n\
             2\n00:00:08,000 --> 00:00:12,500\nThird.\n\n"
        );
    }

    #[test]
    fn skips_cues_without_text() {
        let cue = |start: u64, end: u64, text: &str| SubtitleCue {
            start: Duration::from_secs(start),
            end: Duration::from_secs(end),
            text: text.into(),
            first_segment: 0,
            last_segment: 0,
        };
        let cues = vec![cue(0, 4, "Hello."), cue(4, 9, "  "), cue(9, 12, "Bye.")];
        assert_eq!(
            render_srt(&cues),
            "1\n00:00:00,000 --> 00:00:04,000\nHello.\n\n\
             2\n00:00:09,000 --> 00:00:12,000\nBye.\n\n"
        );
        assert_eq!(render_srt(&[cue(0, 3, "")]), "");
    }
}
