use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use forgetube_core::api::{
    Assembler, AssemblyError, AssemblyJob, ClipSource, ClipWindow, FfmpegConfig, ImageArtifact,
};

const STDERR_TAIL: usize = 2_000;
const AUDIO_RATE: u32 = 44_100;
const SEGMENTS_DIR: &str = "segments";
const CONCAT_LIST: &str = "concat.txt";

/// Muxes the job with the ffmpeg binary: one still+audio segment per window,
/// joined with the concat demuxer, subtitles burned in on the final pass.
pub struct FfmpegAssembler {
    bin: String,
    font_path: Option<String>,
    fps: u32,
}

impl FfmpegAssembler {
    pub fn new(cfg: &FfmpegConfig) -> Self {
        Self {
            bin: cfg.bin.clone(),
            font_path: cfg.font_path.clone(),
            fps: cfg.fps.max(1),
        }
    }

    async fn run(&self, args: Vec<OsString>) -> Result<(), AssemblyError> {
        tracing::debug!(
            target: "forgetube.assembly",
            bin = %self.bin,
            args = ?args,
            "spawning ffmpeg"
        );
        let output = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AssemblyError::Encoder(format!("failed to start {}: {e}", self.bin)))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(AssemblyError::Encoder(format!(
            "{} exited with {}: {}",
            self.bin,
            output.status,
            tail(&stderr, STDERR_TAIL)
        )))
    }
}

#[async_trait]
impl Assembler for FfmpegAssembler {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn assemble(&self, job: &AssemblyJob) -> Result<PathBuf, AssemblyError> {
        let windows = job.windows()?;
        let (width, height) = frame_size(job);
        let work = job
            .output_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SEGMENTS_DIR);
        tokio::fs::create_dir_all(&work).await?;

        let mut segments = Vec::with_capacity(windows.len());
        for window in &windows {
            let out = work.join(format!("segment_{:03}.mp4", window.index));
            self.run(segment_args(window, width, height, self.fps, &out))
                .await?;
            segments.push(out);
        }

        let list = work.join(CONCAT_LIST);
        tokio::fs::write(&list, concat_list(&segments)).await?;

        let subtitles = burned_subtitles(job);
        self.run(concat_args(
            &list,
            subtitles,
            self.font_path.as_deref(),
            &job.output_path,
        ))
        .await?;

        if let Err(e) = tokio::fs::remove_dir_all(&work).await {
            tracing::warn!(target: "forgetube.assembly", dir = %work.display(), error = %e, "failed to remove segment files");
        }
        tracing::info!(
            target: "forgetube.assembly",
            windows = windows.len(),
            output = %job.output_path.display(),
            "video assembled"
        );
        Ok(job.output_path.clone())
    }
}

/// Output frame size from the first visual window, rounded down to even for
/// yuv420p.
fn frame_size(job: &AssemblyJob) -> (u32, u32) {
    let (w, h) = job
        .visuals
        .first()
        .map(|v| (v.render.width, v.render.height))
        .unwrap_or((1024, 576));
    ((w.max(2)) & !1, (h.max(2)) & !1)
}

fn seconds(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64())
}

fn push_all(args: &mut Vec<OsString>, items: &[&str]) {
    args.extend(items.iter().map(OsString::from));
}

fn segment_args(
    window: &ClipWindow,
    width: u32,
    height: u32,
    fps: u32,
    out: &Path,
) -> Vec<OsString> {
    let fps_text = fps.to_string();
    let mut args = Vec::new();
    push_all(&mut args, &["-y", "-hide_banner"]);

    match &window.image {
        ImageArtifact::Rendered { path } => {
            push_all(&mut args, &["-loop", "1", "-framerate", &fps_text, "-i"]);
            args.push(path.as_os_str().to_owned());
        }
        ImageArtifact::Placeholder { .. } => {
            let color = format!("color=c=black:s={width}x{height}:r={fps}");
            push_all(&mut args, &["-f", "lavfi", "-i", &color]);
        }
    }
    match &window.audio.clip {
        ClipSource::Rendered { path } => {
            push_all(&mut args, &["-i"]);
            args.push(path.as_os_str().to_owned());
        }
        ClipSource::Silence => {
            let silence = format!("anullsrc=r={AUDIO_RATE}:cl=stereo");
            push_all(&mut args, &["-f", "lavfi", "-i", &silence]);
        }
    }

    let scale = format!(
        "scale={width}:{height}:force_original_aspect_ratio=decrease,\
         pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1,format=yuv420p"
    );
    let rate = AUDIO_RATE.to_string();
    push_all(
        &mut args,
        &[
            "-t",
            &seconds(window.duration),
            "-vf",
            &scale,
            "-r",
            &fps_text,
            "-c:v",
            "libx264",
            "-tune",
            "stillimage",
            "-c:a",
            "aac",
            "-ar",
            &rate,
            "-ac",
            "2",
        ],
    );
    // clips shorter than the window are padded with silence
    if !window.audio.is_placeholder() {
        push_all(&mut args, &["-af", "apad"]);
    }
    args.push(out.as_os_str().to_owned());
    args
}

fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| {
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("file '{}'\n", name.replace('\'', r"'\''"))
        })
        .collect()
}

/// Quotes a path for use inside an ffmpeg filter argument.
fn escape_filter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for ch in value.chars() {
        if matches!(ch, '\\' | ':' | '\'' | ',' | '[' | ']' | ';') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Subtitle file to burn in. An `.srt` without any text cue is empty and
/// the `subtitles` filter rejects it, so it is skipped.
fn burned_subtitles(job: &AssemblyJob) -> Option<&Path> {
    let has_text = job.cues.iter().any(|c| !c.text.trim().is_empty());
    job.subtitles_path.as_deref().filter(|_| has_text)
}

fn subtitle_filter(subtitles: &Path, font_path: Option<&str>) -> String {
    let mut filter = format!(
        "subtitles={}",
        escape_filter_value(&subtitles.to_string_lossy())
    );
    if let Some(font) = font_path {
        let dir = Path::new(font)
            .parent()
            .map(|d| d.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !dir.is_empty() {
            filter.push_str(&format!(":fontsdir={}", escape_filter_value(&dir)));
        }
    }
    filter
}

fn concat_args(
    list: &Path,
    subtitles: Option<&Path>,
    font_path: Option<&str>,
    out: &Path,
) -> Vec<OsString> {
    let mut args = Vec::new();
    push_all(&mut args, &["-y", "-hide_banner", "-f", "concat", "-safe", "0", "-i"]);
    args.push(list.as_os_str().to_owned());
    match subtitles {
        Some(srt) => {
            let filter = subtitle_filter(srt, font_path);
            push_all(
                &mut args,
                &["-vf", &filter, "-c:v", "libx264", "-pix_fmt", "yuv420p", "-c:a", "copy"],
            );
        }
        None => push_all(&mut args, &["-c", "copy"]),
    }
    push_all(&mut args, &["-movflags", "+faststart"]);
    args.push(out.as_os_str().to_owned());
    args
}

fn tail(text: &str, limit: usize) -> &str {
    let text = text.trim_end();
    if text.len() <= limit {
        return text;
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgetube_core::api::{AudioArtifact, SubtitleCue};
    use forgetube_core::timeline::{RenderParams, VisualSegment};

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn window(image: ImageArtifact, clip: ClipSource, millis: u64) -> ClipWindow {
        ClipWindow {
            index: 0,
            start: Duration::ZERO,
            duration: Duration::from_millis(millis),
            planned_start: Duration::ZERO,
            planned_duration: Duration::from_secs(5),
            image,
            audio: AudioArtifact {
                clip,
                duration: Duration::from_millis(millis),
            },
        }
    }

    #[test]
    fn test_segment_args_for_rendered_inputs() {
        let w = window(
            ImageArtifact::Rendered {
                path: "/r/images/scene_000.png".into(),
            },
            ClipSource::Rendered {
                path: "/r/audio/clip_000.wav".into(),
            },
            6_250,
        );
        let args = strings(&segment_args(&w, 1024, 576, 24, Path::new("/r/seg.mp4")));
        assert_eq!(
            &args[..9],
            ["-y", "-hide_banner", "-loop", "1", "-framerate", "24", "-i", "/r/images/scene_000.png", "-i"]
        );
        assert_eq!(args[9], "/r/audio/clip_000.wav");
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "6.250");
        assert!(args.contains(&"apad".to_string()));
        assert_eq!(args.last().unwrap(), "/r/seg.mp4");
    }

    #[test]
    fn test_segment_args_for_placeholders() {
        let w = window(
            ImageArtifact::Placeholder {
                width: 64,
                height: 36,
            },
            ClipSource::Silence,
            5_000,
        );
        let args = strings(&segment_args(&w, 64, 36, 24, Path::new("seg.mp4")));
        assert!(args.contains(&"color=c=black:s=64x36:r=24".to_string()));
        assert!(args.contains(&"anullsrc=r=44100:cl=stereo".to_string()));
        assert!(!args.contains(&"apad".to_string()));
        assert!(!args.contains(&"-loop".to_string()));
    }

    #[test]
    fn test_concat_list_uses_file_names() {
        let list = concat_list(&[
            PathBuf::from("/w/segments/segment_000.mp4"),
            PathBuf::from("/w/segments/it's.mp4"),
        ]);
        assert_eq!(list, "file 'segment_000.mp4'\nfile 'it'\\''s.mp4'\n");
    }

    #[test]
    fn test_concat_args_burn_subtitles() {
        let args = strings(&concat_args(
            Path::new("/w/concat.txt"),
            Some(Path::new("C:/out/subtitles.srt")),
            Some("/fonts/Inter.ttf"),
            Path::new("/w/video.mp4"),
        ));
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], r"subtitles=C\:/out/subtitles.srt:fontsdir=/fonts");
        assert!(args.contains(&"libx264".to_string()));

        let plain = strings(&concat_args(
            Path::new("/w/concat.txt"),
            None,
            None,
            Path::new("/w/video.mp4"),
        ));
        assert!(!plain.contains(&"-vf".to_string()));
        assert!(plain.windows(2).any(|p| p == ["-c", "copy"]));
    }

    #[test]
    fn test_tail_keeps_the_end() {
        assert_eq!(tail("abcdef\n", 3), "def");
        assert_eq!(tail("ab", 3), "ab");
    }

    fn job(dir: &Path) -> AssemblyJob {
        let visual = VisualSegment {
            start: Duration::ZERO,
            end: Duration::from_secs(5),
            render: RenderParams::default(),
        };
        AssemblyJob {
            images: vec![ImageArtifact::Placeholder {
                width: 1024,
                height: 576,
            }],
            clips: vec![AudioArtifact {
                clip: ClipSource::Silence,
                duration: Duration::from_secs(5),
            }],
            cues: vec![],
            subtitles_path: None,
            visuals: vec![visual],
            output_path: dir.join("video.mp4"),
        }
    }

    #[test]
    fn test_textless_cues_are_not_burned_in() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(dir.path());
        job.subtitles_path = Some(dir.path().join("subtitles.srt"));
        job.cues = vec![SubtitleCue {
            start: Duration::ZERO,
            end: Duration::from_secs(5),
            text: "  ".into(),
            first_segment: 0,
            last_segment: 0,
        }];
        assert_eq!(burned_subtitles(&job), None);

        job.cues[0].text = "Hello".into();
        assert_eq!(burned_subtitles(&job), job.subtitles_path.as_deref());
    }

    #[tokio::test]
    async fn test_missing_binary_is_encoder_error() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = FfmpegAssembler::new(&FfmpegConfig {
            bin: dir.path().join("no-such-ffmpeg").to_string_lossy().into_owned(),
            font_path: None,
            fps: 24,
        });
        let err = assembler.assemble(&job(dir.path())).await.unwrap_err();
        assert!(matches!(err, AssemblyError::Encoder(_)), "{err}");
    }

    #[tokio::test]
    async fn test_misaligned_job_fails_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(dir.path());
        job.clips.clear();
        let assembler = FfmpegAssembler::new(&FfmpegConfig::default());
        let err = assembler.assemble(&job).await.unwrap_err();
        assert!(matches!(err, AssemblyError::Misaligned { .. }));
        assert!(!dir.path().join(SEGMENTS_DIR).exists());
    }
}
