use std::path::{Path, PathBuf};

use super::types::{AppConfig, ProviderKind};

/// Data directory: ~/.forgetube
pub fn get_forgetube_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".forgetube"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.forgetube/config.toml (highest)
    let data_dir = get_forgetube_data_dir()?;
    let user_config = data_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg = if user_config.exists() {
        load_file(&user_config)?
    } else if local_config.exists() {
        load_file(local_config)?
    } else {
        AppConfig::default()
    };

    if cfg.logging.file
        && cfg
            .logging
            .directory
            .as_ref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    {
        let logs_dir = data_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        cfg.logging.directory = Some(logs_dir.to_string_lossy().to_string());
    }

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

pub fn load_file(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)?;
    Ok(toml::from_str::<AppConfig>(&s)?)
}

/// Environment variables win over file values. Blank values are ignored.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("FORGETUBE_OUTPUT_DIR") {
        cfg.output.root_dir = v;
    }
    if let Some(v) = get("FORGETUBE_PROVIDER") {
        cfg.providers.kind = match v.trim().to_ascii_lowercase().as_str() {
            "http" => ProviderKind::Http,
            "fake" => ProviderKind::Fake,
            other => anyhow::bail!("FORGETUBE_PROVIDER must be 'http' or 'fake', got '{other}'"),
        };
    }
    if let Some(v) = get("FORGETUBE_GEMINI_API_KEY") {
        cfg.providers.gemini.api_key = v;
    }
    if let Some(v) = get("FORGETUBE_SERP_API_KEY") {
        cfg.providers.serp.api_key = v;
    }
    if let Some(v) = get("FORGETUBE_IMAGE_URL") {
        cfg.providers.image.base_url = v;
    }
    if let Some(v) = get("FORGETUBE_TTS_URL") {
        cfg.providers.tts.base_url = v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_win() {
        let mut cfg = AppConfig::default();
        apply_env_overrides(
            &mut cfg,
            env(&[
                ("FORGETUBE_OUTPUT_DIR", "/tmp/videos"),
                ("FORGETUBE_PROVIDER", "FAKE"),
                ("FORGETUBE_TTS_URL", "http://tts:9000"),
                ("FORGETUBE_IMAGE_URL", "  "),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.output.root_dir, "/tmp/videos");
        assert_eq!(cfg.providers.kind, ProviderKind::Fake);
        assert_eq!(cfg.providers.tts.base_url, "http://tts:9000");
        assert_eq!(cfg.providers.image.base_url, "http://127.0.0.1:7860");
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let mut cfg = AppConfig::default();
        assert!(apply_env_overrides(&mut cfg, env(&[("FORGETUBE_PROVIDER", "cloud")])).is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[output]\nroot_dir = \"out\"\n[subtitles]\nchunk_size_secs = 8.0\n")
            .unwrap();
        let cfg = load_file(&path).unwrap();
        assert_eq!(cfg.output.root_dir, "out");
        assert_eq!(cfg.subtitles.chunk_size_secs, 8.0);
    }

    #[test]
    fn test_api_keys_never_serialized_or_debug_printed() {
        let mut cfg = AppConfig::default();
        cfg.providers.gemini.api_key = "sk-very-secret".into();
        let toml = toml::to_string(&cfg).unwrap();
        assert!(!toml.contains("sk-very-secret"));
        assert!(!format!("{cfg:?}").contains("sk-very-secret"));
    }
}
