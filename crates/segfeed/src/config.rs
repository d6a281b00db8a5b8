use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::{FeederError, Result};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8083;
pub const DEFAULT_PATH: &str = "/ws/live";
pub const DEFAULT_CONTAINER: &str = "video/mp4";
/// H.264 Constrained Baseline, level 3.0.
pub const DEFAULT_CODECS: &str = "avc1.42C01E";

/// Query parameter carrying the stream identifier.
const STREAM_ID_PARAM: &str = "suuid";

/// How the sink places appended segments on its timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum AppendMode {
    /// Timestamps inside each fragment decide placement.
    #[default]
    Segments,
    /// Fragments are laid out back to back in append order.
    Sequence,
}

impl AppendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppendMode::Segments => "segments",
            AppendMode::Sequence => "sequence",
        }
    }
}

/// The single media format declared to the sink for a whole session.
///
/// Fields are private: a profile is fixed once built and is never
/// renegotiated mid-stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MediaProfile {
    container: String,
    codecs: String,
    mode: AppendMode,
}

impl Default for MediaProfile {
    fn default() -> Self {
        Self {
            container: DEFAULT_CONTAINER.to_owned(),
            codecs: DEFAULT_CODECS.to_owned(),
            mode: AppendMode::Segments,
        }
    }
}

impl MediaProfile {
    pub fn new(container: impl Into<String>, codecs: impl Into<String>, mode: AppendMode) -> Self {
        Self {
            container: container.into(),
            codecs: codecs.into(),
            mode,
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn codecs(&self) -> &str {
        &self.codecs
    }

    pub fn mode(&self) -> AppendMode {
        self.mode
    }

    /// Full MIME type, e.g. `video/mp4; codecs="avc1.42C01E"`.
    pub fn mime_type(&self) -> String {
        format!("{}; codecs=\"{}\"", self.container, self.codecs)
    }
}

impl fmt::Display for MediaProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.mime_type(), self.mode.as_str())
    }
}

/// Parse a port written either as `8083` or `:8083`.
pub fn parse_port(input: &str) -> Result<u16> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix(':').unwrap_or(trimmed);
    match digits.parse::<u16>() {
        Ok(0) => Err(FeederError::invalid_endpoint(input, "port must be non-zero")),
        Ok(port) => Ok(port),
        Err(e) => Err(FeederError::invalid_endpoint(input, e.to_string())),
    }
}

fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u16),
        Text(String),
    }

    match RawPort::deserialize(deserializer)? {
        RawPort::Number(port) => Ok(port),
        RawPort::Text(text) => parse_port(&text).map_err(serde::de::Error::custom),
    }
}

/// Publisher endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub host: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    /// `wss` when true, `ws` otherwise
    pub secure: bool,
    pub path: String,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            secure: false,
            path: DEFAULT_PATH.to_owned(),
        }
    }
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Pick `wss` for pages served over `https`, `ws` otherwise.
    pub fn mirror_page_scheme(mut self, page_scheme: &str) -> Self {
        self.secure = page_scheme
            .trim_end_matches(':')
            .eq_ignore_ascii_case("https");
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }
}

/// Everything one playback session needs. Built once, never mutated while
/// the session runs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub stream_id: String,
    pub endpoint: Endpoint,
    pub profile: MediaProfile,
    /// High-water mark for pending segments. `None` keeps the queue unbounded.
    pub max_queued_segments: Option<usize>,
    pub connect_timeout_secs: u64,
    /// Silence on the connection longer than this ends the session. `None`
    /// or `0` disables the timer.
    pub idle_timeout_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stream_id: String::new(),
            endpoint: Endpoint::default(),
            profile: MediaProfile::default(),
            max_queued_segments: None,
            connect_timeout_secs: 10,
            idle_timeout_secs: Some(10),
        }
    }
}

impl SessionConfig {
    pub fn new(stream_id: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            stream_id: stream_id.into(),
            endpoint,
            ..Default::default()
        }
    }

    pub fn with_profile(mut self, profile: MediaProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_queue_limit(mut self, limit: Option<usize>) -> Self {
        self.max_queued_segments = limit;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout_secs = timeout.map(|t| t.as_secs().max(1));
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stream_id.trim().is_empty() {
            return Err(FeederError::configuration("stream id must not be empty"));
        }
        if self.endpoint.host.trim().is_empty() {
            return Err(FeederError::configuration("host must not be empty"));
        }
        if self.endpoint.port == 0 {
            return Err(FeederError::configuration("port must be non-zero"));
        }
        if self.profile.codecs().trim().is_empty() {
            return Err(FeederError::configuration("codecs must not be empty"));
        }
        if self.max_queued_segments == Some(0) {
            return Err(FeederError::configuration(
                "max_queued_segments must be at least 1",
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(FeederError::configuration(
                "connect_timeout_secs must be non-zero",
            ));
        }
        Ok(())
    }

    /// `{ws|wss}://host:port/path?suuid=<stream_id>`
    pub fn connection_uri(&self) -> Result<Url> {
        let endpoint = &self.endpoint;
        let base = format!(
            "{}://{}:{}",
            endpoint.scheme(),
            endpoint.host,
            endpoint.port
        );
        let mut url =
            Url::parse(&base).map_err(|e| FeederError::invalid_endpoint(&base, e.to_string()))?;
        url.set_path(&endpoint.path);
        url.query_pairs_mut()
            .append_pair(STREAM_ID_PARAM, &self.stream_id);
        Ok(url)
    }
}
