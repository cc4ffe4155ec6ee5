//! Orchestration de l'export : collecte -> prétraitement -> plans -> écriture

pub mod geojson;
pub mod plan;
pub mod writer;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use cadtxt::{charset, convert, GeometryOptions};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{ExportConfig, OutputFormat, WriterKind};
use crate::files::{collect_files, read_sources, SourceFile, SOURCE_EXTENSIONS};
use crate::history::ProcessingHistory;
use crate::report::{ExportReport, FailureStage};
use plan::{ExportPlan, ProcessedFile};

/// Échecs globaux d'un export
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no input files found")]
    NoInputFiles,

    #[error("no new input file to process ({skipped} skipped, {unreadable} unreadable)")]
    NothingToProcess { skipped: usize, unreadable: usize },

    #[error("all {failed} input files failed to preprocess")]
    AllFailed { failed: usize },

    #[error("format {format} needs an external writer (--writer or TXT2GEO_WRITER)")]
    WriterNotConfigured { format: &'static str },
}

/// Résultat du prétraitement d'un fichier
struct Preprocessed {
    source: SourceFile,
    encoding: charset::TextEncoding,
    warning: Option<String>,
    result: Result<cadtxt::PreprocessResult, cadtxt::CadtxtError>,
}

fn preprocess_source(source: SourceFile, options: GeometryOptions) -> Preprocessed {
    let decoded = charset::decode(&source.content);
    let result = convert(&decoded.text, options);
    Preprocessed {
        source,
        encoding: decoded.encoding,
        warning: decoded.warning,
        result,
    }
}

pub struct Exporter {
    config: ExportConfig,
    format: &'static OutputFormat,
    history: ProcessingHistory,
}

impl Exporter {
    /// Valide la configuration, prépare la sortie et charge l'historique
    pub fn new(mut config: ExportConfig) -> Result<Self> {
        let format = config.verify()?;

        let writer_missing = config
            .writer
            .as_deref()
            .map_or(true, |w| w.trim().is_empty());
        if format.writer == WriterKind::External && !config.dry_run && writer_missing {
            return Err(ExportError::WriterNotConfigured {
                format: format.code,
            }
            .into());
        }

        config.prepare(format)?;

        let history = ProcessingHistory::load(&config.history_path(format))?;
        let history = if config.dry_run {
            history.read_only()
        } else {
            history
        };

        Ok(Self {
            config,
            format,
            history,
        })
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn format(&self) -> &'static OutputFormat {
        self.format
    }

    pub fn history(&self) -> &ProcessingHistory {
        &self.history
    }

    /// Exécute l'export complet.
    ///
    /// Les échecs par fichier sont journalisés et comptés dans le rapport ;
    /// seuls l'absence d'entrée, l'absence de fichier traitable et l'échec
    /// du writer externe interrompent l'export.
    pub async fn execute(&self) -> Result<ExportReport> {
        let start = Instant::now();
        let mut report = ExportReport::new(self.format.code, &self.config.output, self.config.dry_run);

        let files = collect_files(&self.config.inputs, self.config.depth, SOURCE_EXTENSIONS)?;
        if files.is_empty() {
            return Err(ExportError::NoInputFiles.into());
        }
        report.files_found = files.len();
        info!(files = files.len(), format = self.format.code, "Fichiers trouvés");

        let sources = self.select_sources(read_sources(&files), &mut report);
        if sources.is_empty() {
            return Err(ExportError::NothingToProcess {
                skipped: report.files_skipped,
                unreadable: report.files_failed,
            }
            .into());
        }

        let processed = self.preprocess_all(sources, &mut report);
        if processed.is_empty() {
            return Err(ExportError::AllFailed {
                failed: report.files_failed,
            }
            .into());
        }

        let plans = plan::generate(&processed, &self.config, self.format);

        if self.config.dry_run {
            plan::preview(&plans, &processed, self.format);
            for p in &plans {
                report.record_dataset(plan_features(p, &processed));
            }
        } else {
            plan::log_plans(&plans, &processed, self.format);
            match self.format.writer {
                WriterKind::Native => self.write_native(&plans, &processed, &mut report),
                WriterKind::External => self.write_external(&plans, &processed, &mut report).await?,
            }
        }

        report.set_duration(start.elapsed());
        report.finalize();

        info!(
            datasets = report.datasets_written,
            features = report.features_written,
            duration_secs = report.duration_secs,
            "Export terminé"
        );

        Ok(report)
    }

    /// Écarte les fichiers illisibles, déjà traités ou en double
    fn select_sources(
        &self,
        results: Vec<(PathBuf, Result<SourceFile>)>,
        report: &mut ExportReport,
    ) -> Vec<SourceFile> {
        let check_history = !self.config.dry_run && !self.config.force_refresh;
        let mut seen: HashMap<String, PathBuf> = HashMap::new();
        let mut selected = Vec::with_capacity(results.len());

        for (path, result) in results {
            let source = match result {
                Ok(source) => source,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Lecture impossible");
                    report.record_failure(FailureStage::Read, &path, format!("{:#}", e));
                    continue;
                }
            };

            if check_history && self.history.contains(&source.fingerprint) {
                info!(path = %path.display(), "Déjà traité, ignoré");
                report.record_skipped();
                continue;
            }

            if let Some(first) = seen.get(&source.fingerprint) {
                info!(
                    path = %path.display(),
                    duplicate_of = %first.display(),
                    "Contenu identique, ignoré"
                );
                report.record_skipped();
                continue;
            }

            seen.insert(source.fingerprint.clone(), path);
            selected.push(source);
        }

        selected
    }

    /// Décode et convertit les fichiers en parallèle, dans l'ordre d'entrée
    fn preprocess_all(&self, sources: Vec<SourceFile>, report: &mut ExportReport) -> Vec<ProcessedFile> {
        let options = self.config.geometry;
        let outcomes: Vec<Preprocessed> = sources
            .into_par_iter()
            .map(|source| preprocess_source(source, options))
            .collect();

        let mut processed = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            let path = outcome.source.path;

            if let Some(warning) = outcome.warning {
                warn!(path = %path.display(), encoding = %outcome.encoding, "{}", warning);
                report.record_warning(&path, warning);
            }

            match outcome.result {
                Ok(result) => {
                    debug!(
                        path = %path.display(),
                        encoding = %outcome.encoding,
                        features = result.features.len(),
                        crs = %result.coordinate_system.name,
                        "Fichier prétraité"
                    );
                    report.record_processed();
                    processed.push(ProcessedFile {
                        path,
                        fingerprint: outcome.source.fingerprint,
                        result,
                    });
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Prétraitement impossible");
                    report.record_failure(FailureStage::Preprocess, &path, e.to_string());
                }
            }
        }

        processed
    }

    /// Écrit chaque plan en GeoJSON, en parallèle
    fn write_native(&self, plans: &[ExportPlan], processed: &[ProcessedFile], report: &mut ExportReport) {
        let overwrite = self.config.overwrite;
        let outcomes: Vec<(&ExportPlan, Result<usize>)> = plans
            .par_iter()
            .map(|p| {
                let files: Vec<&ProcessedFile> =
                    p.sources.iter().filter_map(|&i| processed.get(i)).collect();
                (p, geojson::export_to_geojson(&files, &p.target, overwrite))
            })
            .collect();

        for (p, outcome) in outcomes {
            let sources = p.sources.iter().filter_map(|&i| processed.get(i));
            match outcome {
                Ok(features) => {
                    report.record_dataset(features);
                    for file in sources {
                        if let Err(e) = self.history.check_and_record(&file.fingerprint) {
                            warn!(path = %file.path.display(), error = %e, "Historique non mis à jour");
                        }
                    }
                }
                Err(e) => {
                    error!(output = %p.target.display(), error = %e, "Écriture impossible");
                    for file in sources {
                        report.record_failure(FailureStage::Write, &file.path, format!("{:#}", e));
                    }
                }
            }
        }
    }

    /// Délègue l'écriture au writer externe
    async fn write_external(
        &self,
        plans: &[ExportPlan],
        processed: &[ProcessedFile],
        report: &mut ExportReport,
    ) -> Result<()> {
        let command = self.config.writer.as_deref().unwrap_or_default();
        let payload = writer::build_payload(
            plans,
            processed,
            &self.config.output,
            self.format,
            self.config.merge,
            self.config.overwrite,
        );
        let total_features = payload.total_features();
        let bytes = serde_json::to_vec(&payload)?;

        info!(
            driver = self.format.driver,
            datasets = payload.datasets.len(),
            features = total_features,
            "Appel du writer externe"
        );

        let results =
            writer::run_writer(command, &bytes, self.config.writer_timeout, &self.history).await?;
        info!(results, "Writer externe terminé");

        for p in plans {
            report.record_dataset(plan_features(p, processed));
        }
        Ok(())
    }
}

fn plan_features(plan: &ExportPlan, processed: &[ProcessedFile]) -> usize {
    plan.sources
        .iter()
        .filter_map(|&i| processed.get(i))
        .map(ProcessedFile::feature_count)
        .sum()
}
