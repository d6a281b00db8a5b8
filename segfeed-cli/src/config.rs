use std::path::{Path, PathBuf};

use segfeed_engine::{Endpoint, MediaProfile, SessionConfig};
use serde::Deserialize;
use tracing::debug;

use crate::cli::Args;
use crate::error::{AppError, Result};

const CONFIG_DIR: &str = "segfeed";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `segfeed_engine=debug`
    pub filter: Option<String>,
    pub file: Option<PathBuf>,
}

/// On-disk configuration.
///
/// ```toml
/// [session]
/// stream_id = "demo"
/// max_queued_segments = 512
///
/// [session.endpoint]
/// host = "127.0.0.1"
/// port = ":8083"
///
/// [logging]
/// filter = "segfeed_engine=debug"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from an explicit path, falling back to the default location when
    /// it exists, or defaults otherwise. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.is_file() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            AppError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Command-line flags win over the file.
    pub fn apply_args(&mut self, args: &Args) {
        let session = &mut self.session;

        if let Some(stream) = &args.stream {
            session.stream_id = stream.clone();
        }
        if let Some(host) = &args.host {
            session.endpoint.host = host.clone();
        }
        if let Some(port) = args.port {
            session.endpoint.port = port;
        }
        if args.secure {
            session.endpoint.secure = true;
        }
        if let Some(scheme) = &args.page_scheme {
            let endpoint = std::mem::take(&mut session.endpoint);
            session.endpoint = endpoint.mirror_page_scheme(scheme);
        }
        if args.codecs.is_some() || args.mode.is_some() {
            let current = &session.profile;
            session.profile = MediaProfile::new(
                current.container(),
                args.codecs.as_deref().unwrap_or(current.codecs()),
                args.mode.unwrap_or(current.mode()),
            );
        }
        if let Some(limit) = args.max_queued {
            session.max_queued_segments = Some(limit);
        }
        if let Some(secs) = args.connect_timeout {
            session.connect_timeout_secs = secs;
        }
        if let Some(secs) = args.idle_timeout {
            session.idle_timeout_secs = (secs > 0).then_some(secs);
        }
        if args.log_file.is_some() {
            self.logging.file = args.log_file.clone();
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.session.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use segfeed_engine::AppendMode;
    use std::io::Write;

    const SAMPLE: &str = r#"
[session]
stream_id = "camera-1"
max_queued_segments = 128
idle_timeout_secs = 20

[session.endpoint]
host = "10.0.0.5"
port = ":8083"

[session.profile]
codecs = "avc1.640028"

[logging]
filter = "segfeed_engine=debug"
"#;

    #[test]
    fn test_from_toml() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.session.stream_id, "camera-1");
        assert_eq!(config.session.endpoint.host, "10.0.0.5");
        assert_eq!(config.session.endpoint.port, 8083);
        assert_eq!(config.session.profile.codecs(), "avc1.640028");
        assert_eq!(config.session.profile.container(), "video/mp4");
        assert_eq!(config.session.max_queued_segments, Some(128));
        assert_eq!(config.session.idle_timeout_secs, Some(20));
        assert_eq!(
            config.logging.filter.as_deref(),
            Some("segfeed_engine=debug")
        );
    }

    #[test]
    fn test_args_override_file() {
        let mut config = AppConfig::from_toml(SAMPLE).unwrap();
        let args = Args::try_parse_from([
            "segfeed",
            "-s",
            "camera-2",
            "-p",
            "9000",
            "--page-scheme",
            "https:",
            "--mode",
            "sequence",
            "--idle-timeout",
            "0",
        ])
        .unwrap();
        config.apply_args(&args);

        let session = &config.session;
        assert_eq!(session.stream_id, "camera-2");
        assert_eq!(session.endpoint.host, "10.0.0.5");
        assert_eq!(session.endpoint.port, 9000);
        assert!(session.endpoint.secure);
        assert_eq!(session.profile.codecs(), "avc1.640028");
        assert_eq!(session.profile.mode(), AppendMode::Sequence);
        assert_eq!(session.idle_timeout_secs, None);
        assert_eq!(
            session.connection_uri().unwrap().as_str(),
            "wss://10.0.0.5:9000/ws/live?suuid=camera-2"
        );
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.session.stream_id, "camera-1");
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            AppConfig::load(Some(&missing)),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            AppConfig::from_toml("[session\nstream_id = 1"),
            Err(AppError::ConfigParse(_))
        ));
    }
}
