//! Rapport d'export avec graceful degradation
//!
//! Collecte les compteurs et les erreurs par fichier d'un export ; un
//! fichier en échec n'interrompt pas les autres.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

/// Statut global de l'export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExportStatus {
    /// Export réussi sans erreur
    Success,
    /// Export réussi avec des fichiers en échec
    PartialSuccess,
    /// Aucun jeu de données produit
    Failed,
}

/// Étape à laquelle un fichier a échoué
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureStage {
    Read,
    Preprocess,
    Write,
}

/// Erreur rattachée à un fichier source
#[derive(Debug, Clone, Serialize)]
pub struct FileError {
    pub stage: FailureStage,
    pub path: String,
    pub message: String,
}

/// Avertissement non bloquant (décodage avec remplacements, etc.)
#[derive(Debug, Clone, Serialize)]
pub struct FileWarning {
    pub path: String,
    pub message: String,
}

/// Rapport complet d'export
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub format: String,
    pub output: String,
    pub dry_run: bool,
    pub duration_secs: f64,
    pub status: ExportStatus,

    /// Fichiers trouvés
    pub files_found: usize,
    /// Fichiers ignorés (historique ou doublon de contenu)
    pub files_skipped: usize,
    /// Fichiers prétraités avec succès
    pub files_processed: usize,
    /// Fichiers en échec
    pub files_failed: usize,
    /// Jeux de données écrits (ou planifiés en dry-run)
    pub datasets_written: usize,
    /// Features écrites (ou planifiées en dry-run)
    pub features_written: usize,

    pub errors: Vec<FileError>,
    pub warnings: Vec<FileWarning>,
}

impl Default for ExportReport {
    fn default() -> Self {
        Self {
            format: String::new(),
            output: String::new(),
            dry_run: false,
            duration_secs: 0.0,
            status: ExportStatus::Success,
            files_found: 0,
            files_skipped: 0,
            files_processed: 0,
            files_failed: 0,
            datasets_written: 0,
            features_written: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ExportReport {
    pub fn new(format: &str, output: &Path, dry_run: bool) -> Self {
        Self {
            format: format.to_string(),
            output: output.display().to_string(),
            dry_run,
            ..Default::default()
        }
    }

    pub fn record_skipped(&mut self) {
        self.files_skipped += 1;
    }

    pub fn record_processed(&mut self) {
        self.files_processed += 1;
    }

    /// Enregistre un fichier en échec
    pub fn record_failure(&mut self, stage: FailureStage, path: &Path, message: impl Into<String>) {
        self.files_failed += 1;
        self.errors.push(FileError {
            stage,
            path: path.display().to_string(),
            message: message.into(),
        });
    }

    pub fn record_warning(&mut self, path: &Path, message: impl Into<String>) {
        self.warnings.push(FileWarning {
            path: path.display().to_string(),
            message: message.into(),
        });
    }

    /// Enregistre un jeu de données écrit
    pub fn record_dataset(&mut self, features: usize) {
        self.datasets_written += 1;
        self.features_written += features;
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        let has_errors = !self.errors.is_empty();
        let has_success = self.datasets_written > 0;

        self.status = match (has_success, has_errors) {
            (true, false) => ExportStatus::Success,
            (true, true) => ExportStatus::PartialSuccess,
            (false, _) => ExportStatus::Failed,
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        if self.dry_run {
            println!("EXPORT REPORT - {} (dry-run)", self.format);
        } else {
            println!("EXPORT REPORT - {}", self.format);
        }
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Output: {}", self.output);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Files: {} found, {} skipped, {} processed, {} failed",
            self.files_found, self.files_skipped, self.files_processed, self.files_failed
        );
        println!(
            "Output: {} datasets, {} features",
            self.datasets_written, self.features_written
        );

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for w in self.warnings.iter().take(10) {
                println!("  [{}] {}", w.path, w.message);
            }
            if self.warnings.len() > 10 {
                println!("  ... and {} more", self.warnings.len() - 10);
            }
        }

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in self.errors.iter().take(20) {
                println!("  {:?} [{}] {}", e.stage, e.path, e.message);
            }
            if self.errors.len() > 20 {
                println!("  ... and {} more", self.errors.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} processed, {} skipped, {} failed, {} datasets, {} features",
            self.format,
            self.files_processed,
            self.files_skipped,
            self.files_failed,
            self.datasets_written,
            self.features_written
        )
    }
}
