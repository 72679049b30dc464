//! Tipos de erro para o cliente do backend de candidaturas.
//!
//! Define [`BackendError`] com variantes para rate limiting, recusas do
//! backend e erros de rede, derivadas via `thiserror`.

use thiserror::Error;

/// Erros que podem ocorrer ao submeter uma candidatura ao backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// O servidor retornou HTTP 429.
    /// `retry_after_ms` indica quantos milissegundos esperar antes de retentar.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// O backend recusou a candidatura (qualquer outro status 4xx/5xx).
    #[error("backend rejected application (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display() {
        let err = BackendError::RateLimited {
            retry_after_ms: 5000,
        };
        assert_eq!(err.to_string(), "rate limited, retry after 5000ms");
    }

    #[test]
    fn rejected_display() {
        let err = BackendError::Rejected {
            status: 422,
            message: "missing resume".into(),
        };
        assert_eq!(
            err.to_string(),
            "backend rejected application (status 422): missing resume"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BackendError>();
    }
}
