//! Configuração do autoapply carregada a partir de `autoapply.toml`.
//!
//! A struct [`AutoApplyConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `AUTOAPPLY_API_KEY` e `AUTOAPPLY_BACKEND_URL`
//! têm precedência sobre o arquivo; flags da CLI têm precedência sobre ambos.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "autoapply.toml";

/// Configuração de nível superior carregada de `autoapply.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AutoApplyConfig {
    /// Tempo máximo de uma candidatura antes do health check forçar IDLE.
    #[serde(default = "default_application_timeout_secs")]
    pub application_timeout_secs: u64,

    /// Intervalo entre health checks.
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,

    /// Atraso antes de retentar `process_next` enquanto o lock está ocupado.
    #[serde(default = "default_busy_retry_delay_ms")]
    pub busy_retry_delay_ms: u64,

    /// Pausa entre o fim de uma candidatura e o início da próxima.
    #[serde(default = "default_next_application_delay_ms")]
    pub next_application_delay_ms: u64,

    /// Itens por página ao ler arquivos de vagas.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Limite de candidaturas por execução (créditos do plano).
    #[serde(default)]
    pub application_limit: Option<u32>,

    /// URL base do serviço de backend.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Token enviado como `Authorization: Bearer`.
    #[serde(default)]
    pub api_key: String,

    /// Caminho do snapshot de estado.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

// Per-site application timeouts range from one to eight minutes.
fn default_application_timeout_secs() -> u64 {
    300
}

fn default_health_check_interval_secs() -> u64 {
    10
}

fn default_busy_retry_delay_ms() -> u64 {
    2000
}

fn default_next_application_delay_ms() -> u64 {
    3000
}

fn default_page_size() -> usize {
    25
}

fn default_backend_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".autoapply/state.json")
}

impl Default for AutoApplyConfig {
    fn default() -> Self {
        Self {
            application_timeout_secs: default_application_timeout_secs(),
            health_check_interval_secs: default_health_check_interval_secs(),
            busy_retry_delay_ms: default_busy_retry_delay_ms(),
            next_application_delay_ms: default_next_application_delay_ms(),
            page_size: default_page_size(),
            application_limit: None,
            backend_url: default_backend_url(),
            api_key: String::new(),
            state_file: default_state_file(),
        }
    }
}

impl AutoApplyConfig {
    /// Carrega a configuração de `autoapply.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(Path::new(CONFIG_FILE))?;
        config.apply_env_with(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str::<AutoApplyConfig>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Aplica variáveis de ambiente. Valores vazios são ignorados.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("AUTOAPPLY_API_KEY")
            && !key.is_empty()
        {
            self.api_key = key;
        }
        if let Some(url) = lookup("AUTOAPPLY_BACKEND_URL")
            && !url.is_empty()
        {
            self.backend_url = url;
        }
    }

    pub fn application_timeout(&self) -> Duration {
        Duration::from_secs(self.application_timeout_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        // A zero interval would spin the runner loop.
        Duration::from_secs(self.health_check_interval_secs.max(1))
    }

    pub fn busy_retry_delay(&self) -> Duration {
        Duration::from_millis(self.busy_retry_delay_ms)
    }

    pub fn next_application_delay(&self) -> Duration {
        Duration::from_millis(self.next_application_delay_ms)
    }
}
