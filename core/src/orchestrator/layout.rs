use std::path::{Path, PathBuf};

use crate::state::TaskId;
use crate::timeline::Timeline;

/// Where a task's artifacts live: `<root>/<task_id>/...`.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPaths {
    pub dir: PathBuf,
    pub images: PathBuf,
    pub audio: PathBuf,
    /// Latest validated script, in the wire form the model produced.
    pub script: PathBuf,
    pub subtitles: PathBuf,
    pub video: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self, id: TaskId) -> TaskPaths {
        let dir = self.root.join(id.to_string());
        TaskPaths {
            images: dir.join("images"),
            audio: dir.join("audio"),
            script: dir.join("script.json"),
            subtitles: dir.join("subtitles.srt"),
            video: dir.join("video.mp4"),
            dir,
        }
    }

    /// Creates the per-task directories.
    pub async fn prepare(&self, id: TaskId) -> std::io::Result<TaskPaths> {
        let paths = self.paths(id);
        tokio::fs::create_dir_all(&paths.images).await?;
        tokio::fs::create_dir_all(&paths.audio).await?;
        Ok(paths)
    }
}

impl TaskPaths {
    /// Writes `script.json`, replacing an earlier revision.
    pub async fn save_script(&self, timeline: &Timeline) -> std::io::Result<()> {
        let body = serde_json::to_vec_pretty(&timeline.to_raw())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&self.script, body).await
    }

    /// Removes the subtitle file and the final video if they exist.
    pub async fn discard_outputs(&self) {
        for path in [&self.subtitles, &self.video] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "removed output"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot remove output"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prepare_and_discard() {
        let root = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(root.path());
        let id = TaskId::new();
        let paths = layout.prepare(id).await.unwrap();

        assert!(paths.images.is_dir());
        assert!(paths.audio.is_dir());
        assert_eq!(paths.dir, root.path().join(id.to_string()));

        tokio::fs::write(&paths.video, b"x").await.unwrap();
        paths.discard_outputs().await;
        assert!(!paths.video.exists());
        assert!(!paths.subtitles.exists());
    }

    #[tokio::test]
    async fn test_save_script_writes_raw_form() {
        let root = tempfile::tempdir().unwrap();
        let paths = ArtifactLayout::new(root.path()).paths(TaskId::new());
        let timeline =
            crate::timeline::parse_script(&crate::stage::fake::sample_script(2, 5)).unwrap();

        paths.save_script(&timeline).await.unwrap();

        let saved = tokio::fs::read_to_string(&paths.script).await.unwrap();
        assert_eq!(crate::timeline::parse_script(&saved).unwrap(), timeline);
    }
}
