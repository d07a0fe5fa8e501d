//! Run command implementation
//!
//! Streams NDJSON entity records from a file or stdin through the pipeline
//! and writes anonymized NDJSON per entity kind to the output directory.
//! A shutdown signal stops intake; queued work is drained before exit.

use crate::adapters::{
    JsonlQuarantineSink, JsonlStorageWriter, MemoryQuarantineSink, MemoryStorageWriter,
    QuarantineSink, StorageWriter,
};
use crate::anonymization::AnonymizationEngine;
use crate::config::load_config;
use crate::domain::EntityRecord;
use crate::pipeline::Pipeline;
use clap::Args;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Input NDJSON file, or "-" for stdin
    #[arg(short, long, default_value = "-")]
    pub input: String,

    /// Output directory for anonymized NDJSON files (one per entity kind)
    #[arg(short, long, default_value = "out")]
    pub output: String,

    /// Quarantine file for requests that exhausted retries
    #[arg(long, default_value = "out/quarantine.ndjson")]
    pub quarantine: String,

    /// Process everything but write nothing
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let config = Arc::new(load_config(config_path)?);
        let engine = Arc::new(AnonymizationEngine::new(Arc::clone(&config))?);

        let storage: Arc<dyn StorageWriter> = if self.dry_run {
            Arc::new(MemoryStorageWriter::new())
        } else {
            Arc::new(JsonlStorageWriter::new(&self.output))
        };
        let quarantine: Arc<dyn QuarantineSink> = if self.dry_run {
            Arc::new(MemoryQuarantineSink::new())
        } else {
            Arc::new(JsonlQuarantineSink::new(&self.quarantine))
        };

        let pipeline = Pipeline::new(config, engine, storage, quarantine);
        pipeline.start().await?;

        tracing::info!(input = %self.input, output = %self.output, dry_run = self.dry_run, "run started");

        let (submitted, parse_errors) = if self.input == "-" {
            self.feed(&pipeline, BufReader::new(tokio::io::stdin()), &shutdown)
                .await?
        } else {
            let file = tokio::fs::File::open(&self.input).await?;
            self.feed(&pipeline, BufReader::new(file), &shutdown).await?
        };

        pipeline.stop().await?;

        let metrics = pipeline.metrics();
        println!();
        println!("Run complete:");
        println!("  Submitted:       {submitted}");
        println!("  Processed:       {}", metrics.processed);
        println!("  Failed:          {}", metrics.failed);
        println!("  Skipped:         {}", metrics.skipped);
        println!("  Retries:         {}", metrics.retried);
        println!("  Parse errors:    {parse_errors}");
        println!("  Avg quality:     {:.1}", metrics.avg_quality);
        println!("  Avg risk:        {:.1}", metrics.avg_risk);
        println!("  Throughput:      {:.1}/s", metrics.throughput_per_sec);

        let clean = metrics.failed == 0 && metrics.skipped == 0 && parse_errors == 0;
        Ok(if clean { 0 } else { 1 })
    }

    /// Read NDJSON lines and submit them until EOF or shutdown
    async fn feed<R>(
        &self,
        pipeline: &Pipeline,
        reader: BufReader<R>,
        shutdown: &watch::Receiver<bool>,
    ) -> anyhow::Result<(u64, u64)>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut submitted = 0u64;
        let mut parse_errors = 0u64;
        let mut line_no = 0u64;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if *shutdown.borrow() {
                tracing::info!(line = line_no, "shutdown requested, stopping intake");
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<EntityRecord>(trimmed) {
                Ok(record) => {
                    pipeline.submit(record)?;
                    submitted += 1;
                }
                Err(e) => {
                    parse_errors += 1;
                    tracing::warn!(line = line_no, error = %e, "unparseable record skipped");
                }
            }
        }

        Ok((submitted, parse_errors))
    }
}
