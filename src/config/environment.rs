//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de configuración.
//! Las variables ausentes toman un valor por defecto; las mal formadas son error.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Backend de almacenamiento de códigos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(()),
        }
    }
}

/// Política de reintentos del servicio de asignación
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationConfig {
    /// Intentos totales ante conflictos transitorios del almacén
    pub max_attempts: u32,
    /// Espera base entre intentos; se aplica jitter y crece con el intento
    pub base_backoff: Duration,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
        }
    }
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub store_backend: StoreBackend,
    pub allocation: AllocationConfig,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
            cors_origins: Vec::new(),
            request_timeout: Duration::from_secs(30),
            max_concurrent_requests: 256,
            store_backend: StoreBackend::Postgres,
            allocation: AllocationConfig::default(),
        }
    }
}

impl EnvironmentConfig {
    /// Leer la configuración desde las variables de entorno
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            port: parse_var("PORT", defaults.port)?,
            host: env::var("HOST").unwrap_or(defaults.host),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            request_timeout: Duration::from_secs(parse_var(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            max_concurrent_requests: parse_var("MAX_CONCURRENT_REQUESTS", defaults.max_concurrent_requests)?,
            store_backend: parse_var("STORE_BACKEND", defaults.store_backend)?,
            allocation: AllocationConfig {
                max_attempts: parse_var("ALLOCATION_MAX_ATTEMPTS", defaults.allocation.max_attempts)?,
                base_backoff: Duration::from_millis(parse_var(
                    "ALLOCATION_BACKOFF_MS",
                    defaults.allocation.base_backoff.as_millis() as u64,
                )?),
            },
        })
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub(crate) fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_uses_default_when_missing() {
        let value: u32 = parse_var("COLLECTION_CODES_TEST_MISSING_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("COLLECTION_CODES_TEST_BAD_PORT", "not-a-port");
        let result: Result<u16, _> = parse_var("COLLECTION_CODES_TEST_BAD_PORT", 3000);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
        env::remove_var("COLLECTION_CODES_TEST_BAD_PORT");
    }

    #[test]
    fn test_store_backend_from_str() {
        assert_eq!("Memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("postgresql".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = EnvironmentConfig::default();
        assert!(config.is_development());
        assert_eq!(config.server_url(), "0.0.0.0:3000");
        assert_eq!(config.allocation.max_attempts, 5);
    }
}
