use anyhow::{Context, Result};
use std::sync::Arc;

use forgetube_core::api::{AppConfig, ProviderKind, Stages};
use forgetube_core::stage::fake::{
    sample_script, FakeAssembler, FakeImageRenderer, FakeScriptBackend, FakeSpeechSynthesizer,
};

use crate::assembly::FfmpegAssembler;
use crate::image::HttpImageRenderer;
use crate::script::HttpScriptBackend;
use crate::speech::HttpSpeechSynthesizer;

/// Window length of the scripted dry-run output.
const DRY_RUN_WINDOW_SECS: u64 = 5;

pub fn build_stages(cfg: &AppConfig) -> Result<Stages> {
    match cfg.providers.kind {
        ProviderKind::Http => build_http(cfg),
        ProviderKind::Fake => Ok(build_fake(cfg)),
    }
}

fn build_http(cfg: &AppConfig) -> Result<Stages> {
    let p = &cfg.providers;
    Ok(Stages {
        script: Arc::new(
            HttpScriptBackend::new(&p.gemini, &p.serp).context("building script backend")?,
        ),
        images: Arc::new(
            HttpImageRenderer::new(&p.image.base_url, p.image.timeout_ms)
                .context("building image renderer")?,
        ),
        speech: Arc::new(
            HttpSpeechSynthesizer::new(&p.tts.base_url, p.tts.timeout_ms)
                .context("building speech synthesizer")?,
        ),
        assembler: Arc::new(FfmpegAssembler::new(&p.ffmpeg)),
    })
}

/// In-process generators: a fixed script sized to the default duration,
/// fake stills and clips, and a JSON manifest in place of the video.
fn build_fake(cfg: &AppConfig) -> Stages {
    let windows = (cfg.script.default_duration_secs / DRY_RUN_WINDOW_SECS).max(1) as usize;
    Stages {
        script: Arc::new(FakeScriptBackend::new(vec![sample_script(
            windows,
            DRY_RUN_WINDOW_SECS,
        )])),
        images: Arc::new(FakeImageRenderer::new()),
        speech: Arc::new(FakeSpeechSynthesizer::new()),
        assembler: Arc::new(FakeAssembler::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_kind_builds_fakes() {
        let mut cfg = AppConfig::default();
        cfg.providers.kind = ProviderKind::Fake;
        let stages = build_stages(&cfg).unwrap();
        assert_eq!(stages.script.name(), "fake");
        assert_eq!(stages.assembler.name(), "fake");
    }

    #[test]
    fn test_http_kind_builds_adapters() {
        let stages = build_stages(&AppConfig::default()).unwrap();
        assert_eq!(stages.script.name(), "gemini");
        assert_eq!(stages.images.name(), "http-diffusion");
        assert_eq!(stages.speech.name(), "http-tts");
        assert_eq!(stages.assembler.name(), "ffmpeg");
    }
}
