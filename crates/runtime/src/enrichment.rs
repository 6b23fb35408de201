//! Weather-derived generation parameters.
//!
//! The driver asks a [`ParameterSource`] for the signal scale and refinement
//! depth before spawning workers. [`EnrichmentClient`] derives both from a
//! current weather reading fetched over HTTP:
//!
//! | Value | Transform | Fallback |
//! |-------|-----------|----------|
//! | scale | `temperature / 100` (or `humidity / 100`) | [`FALLBACK_SCALE`] |
//! | depth | `trunc(temperature / 10) + 1`, floored at 0 | [`FALLBACK_DEPTH`] |
//!
//! The fetch itself is fallible ([`EnrichmentClient::fetch_reading`]); the
//! parameter accessors never are. Any failure, including a missing API key,
//! resolves through [`scale_or_fallback`] / [`depth_or_fallback`], so the
//! simulation always runs, online or not.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

/// OpenWeatherMap current-weather endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";

pub const DEFAULT_CITY: &str = "London";

/// Upper bound for one enrichment request, connect through body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Scale used whenever the reading cannot be obtained.
pub const FALLBACK_SCALE: f64 = 1.0;

/// Depth used whenever the reading cannot be obtained.
pub const FALLBACK_DEPTH: u32 = 3;

/// Supplies generation parameters to the driver.
pub trait ParameterSource {
    fn scale(&self) -> f64;

    fn depth(&self) -> u32;

    /// Resolve both parameters.
    fn resolve(&self) -> Enrichment {
        Enrichment {
            scale: self.scale(),
            depth: self.depth(),
        }
    }
}

/// Resolved generation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Enrichment {
    pub scale: f64,
    pub depth: u32,
}

impl Default for Enrichment {
    fn default() -> Self {
        Self {
            scale: FALLBACK_SCALE,
            depth: FALLBACK_DEPTH,
        }
    }
}

/// Constant parameters, for offline runs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FixedParameters(pub Enrichment);

impl FixedParameters {
    pub fn new(scale: f64, depth: u32) -> Self {
        Self(Enrichment { scale, depth })
    }
}

impl ParameterSource for FixedParameters {
    fn scale(&self) -> f64 {
        self.0.scale
    }

    fn depth(&self) -> u32 {
        self.0.depth
    }

    fn resolve(&self) -> Enrichment {
        self.0
    }
}

/// Which reading drives the scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleSource {
    #[default]
    Temperature,
    Humidity,
}

/// Connection settings for [`EnrichmentClient`].
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Base URL; query parameters are appended.
    pub endpoint: String,
    pub city: String,
    /// Without a key, no request is attempted.
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub scale_source: ScaleSource,
    /// Honour `HTTP_PROXY`-style environment variables.
    pub use_system_proxy: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            city: DEFAULT_CITY.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            scale_source: ScaleSource::default(),
            use_system_proxy: true,
        }
    }
}

/// The two consumed fields of a weather response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherReading {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity in percent, when reported.
    pub humidity: Option<f64>,
}

impl WeatherReading {
    pub fn scale(&self, source: ScaleSource) -> Result<f64, EnrichmentError> {
        match source {
            ScaleSource::Temperature => Ok(self.temperature / 100.0),
            ScaleSource::Humidity => self
                .humidity
                .map(|humidity| humidity / 100.0)
                .ok_or(EnrichmentError::MissingField("main.humidity")),
        }
    }

    pub fn depth(&self) -> u32 {
        let depth = (self.temperature / 10.0).trunc() + 1.0;
        depth.clamp(0.0, f64::from(u32::MAX)) as u32
    }
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    main: MainReadings,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    #[serde(default)]
    humidity: Option<f64>,
}

/// Fetches weather readings and turns them into generation parameters.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentClient {
    config: EnrichmentConfig,
}

impl EnrichmentClient {
    pub fn new(config: EnrichmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    /// Perform one bounded GET and extract the reading.
    pub fn fetch_reading(&self) -> Result<WeatherReading, EnrichmentError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(EnrichmentError::MissingApiKey)?;

        let mut builder = reqwest::blocking::Client::builder().timeout(self.config.timeout);
        if !self.config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| EnrichmentError::Client(e.to_string()))?;

        debug!(
            endpoint = %self.config.endpoint,
            city = %self.config.city,
            "Requesting weather reading"
        );

        let response = client
            .get(&self.config.endpoint)
            .query(&[
                ("q", self.config.city.as_str()),
                ("appid", api_key),
                ("units", "metric"),
            ])
            .send()
            .map_err(|e| EnrichmentError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status(status.as_u16()));
        }

        let body: WeatherResponse = response
            .json()
            .map_err(|e| EnrichmentError::Malformed(e.to_string()))?;

        let reading = WeatherReading {
            temperature: body.main.temp,
            humidity: body.main.humidity,
        };
        info!(
            temperature = reading.temperature,
            humidity = ?reading.humidity,
            "Weather reading received"
        );
        Ok(reading)
    }

    /// Scale derived from the current reading, or [`FALLBACK_SCALE`].
    pub fn fetch_scale(&self) -> f64 {
        scale_or_fallback(
            self.fetch_reading()
                .and_then(|reading| reading.scale(self.config.scale_source)),
        )
    }

    /// Depth derived from the current reading, or [`FALLBACK_DEPTH`].
    pub fn fetch_depth(&self) -> u32 {
        depth_or_fallback(self.fetch_reading().map(|reading| reading.depth()))
    }
}

impl ParameterSource for EnrichmentClient {
    fn scale(&self) -> f64 {
        self.fetch_scale()
    }

    fn depth(&self) -> u32 {
        self.fetch_depth()
    }

    /// One request serves both parameters.
    fn resolve(&self) -> Enrichment {
        match self.fetch_reading() {
            Ok(reading) => Enrichment {
                scale: scale_or_fallback(reading.scale(self.config.scale_source)),
                depth: reading.depth(),
            },
            Err(err) => Enrichment {
                scale: scale_or_fallback(Err(err.clone())),
                depth: depth_or_fallback(Err(err)),
            },
        }
    }
}

/// Unwrap a derived scale, substituting [`FALLBACK_SCALE`] on failure.
pub fn scale_or_fallback(result: Result<f64, EnrichmentError>) -> f64 {
    result.unwrap_or_else(|err| {
        warn!(error = %err, fallback = FALLBACK_SCALE, "Enrichment failed, using default scale");
        FALLBACK_SCALE
    })
}

/// Unwrap a derived depth, substituting [`FALLBACK_DEPTH`] on failure.
pub fn depth_or_fallback(result: Result<u32, EnrichmentError>) -> u32 {
    result.unwrap_or_else(|err| {
        warn!(error = %err, fallback = FALLBACK_DEPTH, "Enrichment failed, using default depth");
        FALLBACK_DEPTH
    })
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnrichmentError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("response is missing `{0}`")]
    MissingField(&'static str),
}
