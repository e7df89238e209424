//! Ingest command handler.

use clap::Args;
use std::path::PathBuf;
use tabula_core::{config::AppConfig, AppError, AppResult};
use tabula_knowledge::{ingest_directory, ingest_options, ingest_tables, open_index, TableSource};

/// Ingest tables and their column metadata
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Directory of `*.json` data files
    #[arg(long, env = "DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory of metadata files named after their data files
    #[arg(long, env = "METADATA_DIR")]
    pub metadata_dir: Option<PathBuf>,

    /// A single data file; the directories are ignored when given
    #[arg(long, requires = "metadata")]
    pub file: Option<PathBuf>,

    /// Metadata file for --file
    #[arg(long, requires = "file")]
    pub metadata: Option<PathBuf>,

    /// Re-ingest tables even if unchanged
    #[arg(long)]
    pub force: bool,

    /// Clear the index before ingesting
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");
        tracing::debug!("Ingest options: {:?}", self);

        config.rag.validate()?;

        let index = open_index(config)?;
        let options = ingest_options(config, self.force, self.reset);

        let stats = match (&self.file, &self.metadata) {
            (Some(file), Some(metadata)) => {
                let source = TableSource {
                    data_path: file.clone(),
                    metadata_path: metadata.clone(),
                };
                ingest_tables(&index, &[source], &options).await?
            }
            _ => {
                let (data_dir, metadata_dir) = self.directories(config)?;
                ingest_directory(&index, &data_dir, &metadata_dir, &options).await?
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!(
                "Ingested {} tables ({} chunks, {} skipped) in {:.2}s",
                stats.tables, stats.chunks, stats.skipped, stats.duration_secs
            );
        }

        Ok(())
    }

    /// Data and metadata directories, defaulting to `<workspace>/data` and
    /// `<workspace>/metadata`.
    fn directories(&self, config: &AppConfig) -> AppResult<(PathBuf, PathBuf)> {
        let data_dir = self
            .data_dir
            .clone()
            .unwrap_or_else(|| config.workspace.join("data"));
        let metadata_dir = self
            .metadata_dir
            .clone()
            .unwrap_or_else(|| config.workspace.join("metadata"));

        if !data_dir.is_dir() {
            return Err(AppError::Config(format!(
                "Data directory not found: {:?} (use --data-dir or DATA_DIR)",
                data_dir
            )));
        }

        Ok((data_dir, metadata_dir))
    }
}
