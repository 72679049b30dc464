//! Interface de linha de comando do autoapply baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, status, reset,
//! demo) e flags globais (--timeout-secs, --limit, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// autoapply: submete candidaturas uma de cada vez, com timeout e retomada.
#[derive(Debug, Parser)]
#[command(name = "autoapply", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Timeout de uma candidatura, em segundos.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Número máximo de candidaturas nesta execução.
    #[arg(long, global = true)]
    pub limit: Option<u32>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Filtro padrão do `tracing` quando `RUST_LOG` não está definido.
    ///
    /// Sem `--verbose` só aparecem avisos: o spinner já mostra cada resultado.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose { "autoapply=debug" } else { "warn" }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Processa as vagas de um arquivo JSON ou TOML.
    Run {
        /// Caminho para o arquivo de vagas.
        #[arg(long)]
        file: PathBuf,

        /// Simula as candidaturas sem chamar o backend.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Mostra o snapshot persistido do coordenador.
    Status,

    /// Apaga o snapshot persistido.
    Reset,

    /// Executa a demonstração embutida, incluindo uma candidatura travada.
    Demo,
}
