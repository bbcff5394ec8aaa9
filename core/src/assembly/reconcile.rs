use serde::Serialize;
use std::time::Duration;

use crate::error::AssemblyError;
use crate::stage::{AudioArtifact, ImageArtifact};
use crate::timeline::VisualSegment;

/// One output window: a still held for the length of its narration clip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipWindow {
    pub index: usize,
    /// Offset on the measured axis (sum of earlier clip durations).
    pub start: Duration,
    /// Measured clip duration; the still is held this long.
    pub duration: Duration,
    pub planned_start: Duration,
    pub planned_duration: Duration,
    pub image: ImageArtifact,
    pub audio: AudioArtifact,
}

impl ClipWindow {
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

pub fn measured_durations(clips: &[AudioArtifact]) -> Vec<Duration> {
    clips.iter().map(|c| c.duration).collect()
}

/// Pairs image `i` with clip `i` and lays the windows out back to back on
/// the measured-audio axis. Planned timestamps are kept for reference only.
pub fn reconcile(
    images: &[ImageArtifact],
    clips: &[AudioArtifact],
    visuals: &[VisualSegment],
) -> Result<Vec<ClipWindow>, AssemblyError> {
    if images.len() != clips.len() || images.len() != visuals.len() || images.is_empty() {
        return Err(AssemblyError::Misaligned {
            images: images.len(),
            clips: clips.len(),
            windows: visuals.len(),
        });
    }

    let mut offset = Duration::ZERO;
    let windows = images
        .iter()
        .zip(clips)
        .zip(visuals)
        .enumerate()
        .map(|(index, ((image, audio), visual))| {
            let window = ClipWindow {
                index,
                start: offset,
                duration: audio.duration,
                planned_start: visual.start,
                planned_duration: visual.end.saturating_sub(visual.start),
                image: image.clone(),
                audio: audio.clone(),
            };
            offset += audio.duration;
            window
        })
        .collect();
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::ClipSource;
    use crate::timeline::RenderParams;
    use std::path::PathBuf;

    fn visuals(bounds: &[(u64, u64)]) -> Vec<VisualSegment> {
        bounds
            .iter()
            .map(|(s, e)| VisualSegment {
                start: Duration::from_secs(*s),
                end: Duration::from_secs(*e),
                render: RenderParams::default(),
            })
            .collect()
    }

    fn clip(ms: u64) -> AudioArtifact {
        AudioArtifact {
            clip: ClipSource::Rendered {
                path: PathBuf::from(format!("clip_{ms}.wav")),
            },
            duration: Duration::from_millis(ms),
        }
    }

    fn image(i: usize) -> ImageArtifact {
        ImageArtifact::Rendered {
            path: PathBuf::from(format!("scene_{i:03}.png")),
        }
    }

    #[test]
    fn windows_follow_measured_durations() {
        let windows = reconcile(
            &[image(0), image(1), image(2)],
            &[clip(6_200), clip(3_100), clip(5_000)],
            &visuals(&[(0, 5), (5, 10), (10, 15)]),
        )
        .unwrap();

        let starts: Vec<u128> = windows.iter().map(|w| w.start.as_millis()).collect();
        assert_eq!(starts, vec![0, 6_200, 9_300]);
        assert_eq!(windows[2].end(), Duration::from_millis(14_300));
        assert_eq!(windows[1].planned_start, Duration::from_secs(5));
        assert_eq!(windows[1].planned_duration, Duration::from_secs(5));
    }

    #[test]
    fn placeholders_keep_their_slot() {
        let placeholder = ImageArtifact::Placeholder {
            width: 1024,
            height: 576,
        };
        let silence = AudioArtifact {
            clip: ClipSource::Silence,
            duration: Duration::from_secs(5),
        };
        let windows = reconcile(
            &[image(0), placeholder.clone()],
            &[clip(4_000), silence],
            &visuals(&[(0, 5), (5, 10)]),
        )
        .unwrap();
        assert_eq!(windows[1].image, placeholder);
        assert!(windows[1].audio.is_placeholder());
        assert_eq!(windows[1].start, Duration::from_secs(4));
    }

    #[test]
    fn rejects_misaligned_artifacts() {
        let err = reconcile(&[image(0)], &[clip(1), clip(2)], &visuals(&[(0, 5)])).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::Misaligned {
                images: 1,
                clips: 2,
                windows: 1
            }
        ));
    }
}
