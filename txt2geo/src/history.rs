//! Historique des empreintes déjà exportées
//!
//! Un fichier texte, une empreinte par ligne. Partagé entre les workers,
//! l'insertion et l'écriture se font sous le même verrou.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use tracing::debug;

#[derive(Debug, Default)]
pub struct ProcessingHistory {
    /// `None` : historique en mémoire uniquement (dry-run)
    path: Option<PathBuf>,
    entries: Mutex<HashSet<String>>,
}

impl ProcessingHistory {
    /// Charge l'historique ; un fichier absent donne un historique vide
    pub fn load(path: &Path) -> Result<Self> {
        let entries = match std::fs::read_to_string(path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read history file: {}", path.display()))
            }
        };

        debug!(path = %path.display(), entries = entries.len(), "Historique chargé");

        Ok(Self {
            path: Some(path.to_path_buf()),
            entries: Mutex::new(entries),
        })
    }

    /// Historique chargé mais jamais écrit sur disque
    pub fn read_only(self) -> Self {
        Self { path: None, ..self }
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // Un worker paniqué ne rend pas le set incohérent
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.lock().contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enregistre l'empreinte si elle est nouvelle.
    ///
    /// Renvoie `true` si elle a été ajoutée, `false` si elle était déjà
    /// connue ou vide. La ligne est ajoutée au fichier avant l'insertion en
    /// mémoire : un échec d'écriture laisse l'empreinte inconnue.
    pub fn check_and_record(&self, fingerprint: &str) -> Result<bool> {
        let fingerprint = fingerprint.trim();
        if fingerprint.is_empty() {
            return Ok(false);
        }

        let mut entries = self.lock();
        if entries.contains(fingerprint) {
            return Ok(false);
        }

        if let Some(path) = &self.path {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open history file: {}", path.display()))?;
            writeln!(file, "{}", fingerprint)
                .with_context(|| format!("Failed to append to {}", path.display()))?;
        }

        entries.insert(fingerprint.to_string());
        Ok(true)
    }
}
