use async_trait::async_trait;
use std::io::Cursor;
use std::time::Duration;

use forgetube_core::api::{SpeechRequest, SpeechSynthesizer, SynthesisError, SynthesizedClip};

use crate::http_error::{client, endpoint, ensure_success, ProviderHttpError};

const PROVIDER: &str = "tts";
pub const DURATION_HEADER: &str = "x-audio-duration-ms";

/// TTS service speaking `POST /synthesize`. The clip length comes from the
/// `x-audio-duration-ms` header when the service sends it, otherwise it is
/// measured from the WAV header of the body.
pub struct HttpSpeechSynthesizer {
    http: reqwest::Client,
    url_synthesize: String,
}

impl HttpSpeechSynthesizer {
    pub fn new(base_url: &str, timeout_ms: u64) -> anyhow::Result<Self> {
        Ok(Self {
            http: client(timeout_ms)?,
            url_synthesize: endpoint(base_url, "synthesize"),
        })
    }

    async fn post(&self, request: &SpeechRequest) -> anyhow::Result<(Vec<u8>, Option<Duration>)> {
        let url = &self.url_synthesize;
        let resp = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|err| ProviderHttpError::from_reqwest(PROVIDER, err, url))?;
        let resp = ensure_success(PROVIDER, resp).await?;
        let reported = resp
            .headers()
            .get(DURATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis);
        let body = resp
            .bytes()
            .await
            .map_err(|err| ProviderHttpError::from_reqwest(PROVIDER, err, url))?;
        Ok((body.to_vec(), reported))
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    fn name(&self) -> &str {
        "http-tts"
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<SynthesizedClip, SynthesisError> {
        tracing::debug!(
            target: "forgetube.provider",
            stage = "tts.synthesize.in",
            speaker = %request.speaker,
            emotion = request.emotion.as_str(),
            text_len = request.text.len()
        );
        let (data, reported) = self.post(request).await?;
        if data.is_empty() {
            return Err(SynthesisError::new("synthesizer returned empty audio"));
        }
        let duration = match reported {
            Some(d) => d,
            None => wav_duration(&data).ok_or_else(|| {
                SynthesisError::new("clip length unknown: no duration header and no readable WAV header")
            })?,
        };
        tracing::debug!(
            target: "forgetube.provider",
            stage = "tts.synthesize.out",
            bytes = data.len(),
            duration_ms = duration.as_millis() as u64
        );
        Ok(SynthesizedClip { data, duration })
    }
}

/// Playback length of a WAV byte stream: frames over the sample rate, as
/// read from the header by `hound`.
pub fn wav_duration(bytes: &[u8]) -> Option<Duration> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let rate = u64::from(reader.spec().sample_rate);
    if rate == 0 {
        return None;
    }
    let frames = u64::from(reader.duration());
    Some(Duration::from_nanos(frames * 1_000_000_000 / rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgetube_core::timeline::Emotion;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn wav(sample_rate: u32, channels: u16, frames: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut out = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut out, spec).unwrap();
        for _ in 0..frames * u32::from(channels) {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
        out.into_inner()
    }

    fn request() -> SpeechRequest {
        SpeechRequest {
            text: "The tide is turning.".into(),
            speaker: "narrator_female".into(),
            speed: 1.0,
            pitch: 1.1,
            emotion: Emotion::Calm,
        }
    }

    #[test]
    fn test_wav_duration_from_header() {
        let bytes = wav(16_000, 1, 24_000);
        assert_eq!(wav_duration(&bytes), Some(Duration::from_millis(1_500)));
    }

    #[test]
    fn test_wav_duration_counts_frames_not_samples() {
        let bytes = wav(8_000, 2, 4_000);
        assert_eq!(wav_duration(&bytes), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_wav_duration_rejects_other_formats() {
        assert_eq!(wav_duration(b"ID3\x03 not a wav file"), None);
        assert_eq!(wav_duration(&[]), None);
    }

    #[tokio::test]
    async fn test_duration_header_wins() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/synthesize")
            .match_body(Matcher::PartialJson(json!({
                "text": "The tide is turning.",
                "speaker": "narrator_female",
                "emotion": "calm"
            })))
            .with_status(200)
            .with_header(DURATION_HEADER, "2750")
            .with_body(wav(16_000, 1, 16_000))
            .create_async()
            .await;

        let tts = HttpSpeechSynthesizer::new(&server.url(), 5_000).unwrap();
        let clip = tts.synthesize(&request()).await.unwrap();
        assert_eq!(clip.duration, Duration::from_millis(2_750));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_duration_measured_from_wav() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/synthesize")
            .with_status(200)
            .with_body(wav(16_000, 1, 32_000))
            .create_async()
            .await;

        let tts = HttpSpeechSynthesizer::new(&server.url(), 5_000).unwrap();
        let clip = tts.synthesize(&request()).await.unwrap();
        assert_eq!(clip.duration, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_unmeasurable_clip_is_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/synthesize")
            .with_status(200)
            .with_body("not audio")
            .create_async()
            .await;

        let tts = HttpSpeechSynthesizer::new(&server.url(), 5_000).unwrap();
        let err = tts.synthesize(&request()).await.unwrap_err();
        assert!(err.to_string().contains("clip length unknown"), "{err}");
    }
}
