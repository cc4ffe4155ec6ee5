//! Writer externe (GDAL/OGR) piloté par un payload JSON sur stdin
//!
//! Protocole :
//! - stdin : le payload complet, puis EOF
//! - stderr : lignes `LEVEL - message`, relayées via `tracing`
//! - stdout : un objet JSON par jeu de données écrit, avec son `hash`

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::plan::{ExportPlan, ProcessedFile};
use crate::config::OutputFormat;
use crate::history::ProcessingHistory;

#[derive(Debug, Serialize)]
pub struct FeaturePayload<'a> {
    pub wkt: &'a str,
    pub properties: &'a HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct DatasetPayload<'a> {
    pub layer_name: &'a str,
    pub source_path: String,
    pub source_crs: &'a str,
    pub features: Vec<FeaturePayload<'a>>,
    pub total_features: usize,
    pub hash: &'a str,
}

#[derive(Debug, Serialize)]
pub struct WriterPayload<'a> {
    pub output_dir: String,
    pub driver: &'static str,
    /// `EPSG:<n>` du premier jeu qui a un code, sinon vide
    pub target_crs: String,
    pub merge: bool,
    pub overwrite: bool,
    pub datasets: Vec<DatasetPayload<'a>>,
}

impl WriterPayload<'_> {
    pub fn total_features(&self) -> usize {
        self.datasets.iter().map(|d| d.total_features).sum()
    }
}

/// Construit le payload : un jeu de données par fichier source
pub fn build_payload<'a>(
    plans: &'a [ExportPlan],
    processed: &'a [ProcessedFile],
    output: &Path,
    format: &OutputFormat,
    merge: bool,
    overwrite: bool,
) -> WriterPayload<'a> {
    let datasets: Vec<DatasetPayload<'a>> = plans
        .iter()
        .flat_map(|plan| {
            plan.sources
                .iter()
                .filter_map(|&i| processed.get(i))
                .map(move |file| DatasetPayload {
                    layer_name: &plan.output_name,
                    source_path: file.path.display().to_string(),
                    source_crs: &file.result.crs,
                    features: file
                        .result
                        .features
                        .iter()
                        .map(|f| FeaturePayload {
                            wkt: &f.wkt,
                            properties: &f.attributes,
                        })
                        .collect(),
                    total_features: file.feature_count(),
                    hash: &file.fingerprint,
                })
        })
        .collect();

    let target_crs = processed
        .iter()
        .map(|f| f.result.epsg)
        .find(|&epsg| epsg > 0)
        .map(|epsg| format!("EPSG:{}", epsg))
        .unwrap_or_default();

    WriterPayload {
        output_dir: output.display().to_string(),
        driver: format.driver,
        target_crs,
        merge,
        overwrite,
        datasets,
    }
}

/// Relaie une ligne stderr du writer au niveau correspondant
fn forward_log_line(line: &str) {
    let line = line.trim_end();
    if line.is_empty() {
        return;
    }

    match line.split_once(" - ") {
        Some((level, message)) => match level.trim().to_uppercase().as_str() {
            "DEBUG" => debug!(target: "txt2geo::writer", "{}", message),
            "WARNING" | "WARN" => warn!(target: "txt2geo::writer", "{}", message),
            "ERROR" | "CRITICAL" => error!(target: "txt2geo::writer", "{}", message),
            _ => info!(target: "txt2geo::writer", "{}", message),
        },
        None => warn!(target: "txt2geo::writer", "{}", line),
    }
}

/// Traite une ligne stdout ; `true` si c'est un résultat valide
fn record_result_line(line: &str, history: &ProcessingHistory) -> Result<bool> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(false);
    }

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, content = line, "Sortie du writer illisible");
            return Ok(false);
        }
    };

    if let Some(hash) = value.get("hash").and_then(|h| h.as_str()) {
        history.check_and_record(hash)?;
    }
    Ok(true)
}

/// Lance le writer, lui envoie le payload et attend sa fin.
///
/// Renvoie le nombre de résultats émis sur stdout. Échoue si la commande ne
/// démarre pas, se termine en erreur ou dépasse `timeout`.
pub async fn run_writer(
    command: &str,
    payload: &[u8],
    timeout: Duration,
    history: &ProcessingHistory,
) -> Result<usize> {
    let mut parts = command.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("External writer command is empty"))?;

    debug!(command, bytes = payload.len(), "Lancement du writer externe");

    let mut child = Command::new(program)
        .args(parts)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start external writer: {}", command))?;

    let mut stdin = child.stdin.take().context("Writer stdin unavailable")?;
    let stdout = child.stdout.take().context("Writer stdout unavailable")?;
    let stderr = child.stderr.take().context("Writer stderr unavailable")?;

    let payload = payload.to_vec();
    let feeder = tokio::spawn(async move {
        stdin.write_all(&payload).await?;
        stdin.shutdown().await
    });

    let logger = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            forward_log_line(&line);
        }
    });

    let run = async {
        let mut results = 0;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if record_result_line(&line, history)? {
                results += 1;
            }
        }
        let status = child.wait().await?;
        Ok::<_, anyhow::Error>((status, results))
    };

    let outcome = tokio::time::timeout(timeout, run).await;
    let (status, results) = match outcome {
        Ok(result) => result?,
        // `kill_on_drop` arrête le processus
        Err(_) => anyhow::bail!("External writer timed out after {}s", timeout.as_secs_f64()),
    };

    if let Ok(Err(e)) = feeder.await {
        warn!(error = %e, "Payload partiellement transmis au writer");
    }
    logger.await.ok();

    if !status.success() {
        anyhow::bail!("External writer failed: {}", status);
    }

    if results == 0 {
        warn!("Le writer externe n'a produit aucun résultat");
    }

    Ok(results)
}
