use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::applications::ScoringConfig;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            engine: EngineConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// What happens when a reviewer rejects the last open candidate of an unstaffed project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionPolicy {
    /// Rejection always proceeds; the project may end up with no candidates.
    AllowLastCandidate,
    /// Rejection is refused while it would leave the project with no assignee and no candidates.
    ProtectLastCandidate,
}

impl RejectionPolicy {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::AllowLastCandidate),
            "protect" => Ok(Self::ProtectLastCandidate),
            other => Err(ConfigError::InvalidRejectionPolicy(other.to_string())),
        }
    }
}

/// Business-rule knobs for the screening and escrow workflows.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub rejection_policy: RejectionPolicy,
    /// Hours an assignment offer stays open; `None` leaves `offer_expires_at` unset.
    pub offer_window_hours: Option<i64>,
    pub scoring: ScoringConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rejection_policy: RejectionPolicy::AllowLastCandidate,
            offer_window_hours: None,
            scoring: ScoringConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let rejection_policy = match env::var("ENGINE_REJECTION_POLICY") {
            Ok(raw) => RejectionPolicy::parse(&raw)?,
            Err(_) => defaults.rejection_policy,
        };

        let offer_window_hours = match env::var("ENGINE_OFFER_WINDOW_HOURS") {
            Ok(raw) => {
                let hours = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ConfigError::InvalidOfferWindow)?;
                if hours <= 0 {
                    return Err(ConfigError::InvalidOfferWindow);
                }
                Some(hours)
            }
            Err(_) => None,
        };

        let scoring = ScoringConfig {
            auto_weight: weight_var("SCORING_AUTO_WEIGHT", defaults.scoring.auto_weight)?,
            portfolio_weight: weight_var(
                "SCORING_PORTFOLIO_WEIGHT",
                defaults.scoring.portfolio_weight,
            )?,
            manual_weight: weight_var("SCORING_MANUAL_WEIGHT", defaults.scoring.manual_weight)?,
        };
        scoring
            .validate()
            .map_err(|err| ConfigError::InvalidScoringWeights(err.to_string()))?;

        Ok(Self {
            rejection_policy,
            offer_window_hours,
            scoring,
        })
    }
}

fn weight_var(name: &'static str, default: f32) -> Result<f32, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<f32>()
            .map_err(|_| ConfigError::InvalidScoringWeights(format!("{name} must be a number"))),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidRejectionPolicy(String),
    InvalidOfferWindow,
    InvalidScoringWeights(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidRejectionPolicy(value) => write!(
                f,
                "ENGINE_REJECTION_POLICY must be 'allow' or 'protect' (found '{value}')"
            ),
            ConfigError::InvalidOfferWindow => {
                write!(f, "ENGINE_OFFER_WINDOW_HOURS must be a positive integer")
            }
            ConfigError::InvalidScoringWeights(reason) => {
                write!(f, "invalid scoring weights: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidRejectionPolicy(_)
            | ConfigError::InvalidOfferWindow
            | ConfigError::InvalidScoringWeights(_) => None,
        }
    }
}
