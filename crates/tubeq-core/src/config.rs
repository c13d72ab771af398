use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// yt-dlp invocation settings (optional `[ytdlp]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtDlpConfig {
    /// Program name or path of the yt-dlp executable.
    pub binary: String,
    /// Directory containing ffmpeg/ffprobe, if not on PATH.
    #[serde(default)]
    pub ffmpeg_location: Option<PathBuf>,
    /// Bitrate (kbit/s) used when extracting mp3 audio.
    pub mp3_quality: String,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            ffmpeg_location: None,
            mp3_quality: "192".to_string(),
        }
    }
}

/// Global configuration loaded from `~/.config/tubeq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TubeqConfig {
    /// Number of worker loops; fixed for the lifetime of the daemon.
    pub max_concurrent_downloads: usize,
    /// Directory completed artifacts are written to.
    pub download_dir: PathBuf,
    /// Control socket path; defaults to the XDG state dir.
    #[serde(default)]
    pub control_socket: Option<PathBuf>,
    #[serde(default)]
    pub ytdlp: YtDlpConfig,
}

impl Default for TubeqConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 3,
            download_dir: PathBuf::from("downloads"),
            control_socket: None,
            ytdlp: YtDlpConfig::default(),
        }
    }
}

impl TubeqConfig {
    /// Worker count, never below one.
    pub fn worker_count(&self) -> usize {
        self.max_concurrent_downloads.max(1)
    }

    /// Apply `TUBEQ_DOWNLOAD_DIR` / `TUBEQ_MAX_CONCURRENT_DOWNLOADS`.
    /// `lookup` is the environment in production (`std::env::var(..).ok()`).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("TUBEQ_DOWNLOAD_DIR").filter(|d| !d.trim().is_empty()) {
            self.download_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("TUBEQ_MAX_CONCURRENT_DOWNLOADS") {
            match raw.trim().parse::<usize>() {
                Ok(n) => self.max_concurrent_downloads = n,
                Err(_) => tracing::warn!(
                    "ignoring TUBEQ_MAX_CONCURRENT_DOWNLOADS={raw:?}: not a number"
                ),
            }
        }
    }

    /// Control socket path: configured value or `$XDG_STATE_HOME/tubeq/control.sock`.
    pub fn control_socket_path(&self) -> Result<PathBuf> {
        match self.control_socket {
            Some(ref p) => Ok(p.clone()),
            None => default_control_socket_path(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tubeq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Default control socket location (same XDG state dir as the log file).
pub fn default_control_socket_path() -> Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("tubeq")?
        .get_state_home()
        .join("tubeq");
    Ok(dir.join("control.sock"))
}

/// Load configuration from disk, creating a default file if none exists,
/// then apply environment overrides.
pub fn load_or_init() -> Result<TubeqConfig> {
    let path = config_path()?;
    let mut cfg = load_or_init_at(&path)?;
    cfg.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(cfg)
}

/// Like `load_or_init` for an explicit path, without environment overrides.
pub fn load_or_init_at(path: &Path) -> Result<TubeqConfig> {
    if !path.exists() {
        let default_cfg = TubeqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TubeqConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
