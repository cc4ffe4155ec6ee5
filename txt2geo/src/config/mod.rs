//! Configuration de l'export

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use cadtxt::GeometryOptions;
use thiserror::Error;

/// Nom du fichier d'historique des empreintes déjà traitées
pub const HISTORY_FILE_NAME: &str = ".processed";

/// Gabarit de nom par défaut
pub const DEFAULT_NAME_TEMPLATE: &str = "{name}";

/// Délai par défaut du writer externe
pub const DEFAULT_WRITER_TIMEOUT: Duration = Duration::from_secs(60);

/// Variable d'environnement de la commande du writer externe
pub const WRITER_ENV: &str = "TXT2GEO_WRITER";

/// Variable d'environnement du délai du writer externe (secondes)
pub const WRITER_TIMEOUT_ENV: &str = "TXT2GEO_WRITER_TIMEOUT";

/// Qui écrit les fichiers d'un format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterKind {
    /// Écrit par ce binaire
    Native,
    /// Délégué à une commande externe (GDAL/OGR)
    External,
}

/// Format de sortie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub code: &'static str,
    /// Nom du driver OGR
    pub driver: &'static str,
    pub extension: &'static str,
    /// Un seul fichier contenant plusieurs couches
    pub is_container: bool,
    pub writer: WriterKind,
}

pub const FORMATS: [OutputFormat; 5] = [
    OutputFormat {
        code: "SHP",
        driver: "ESRI Shapefile",
        extension: ".shp",
        is_container: false,
        writer: WriterKind::External,
    },
    OutputFormat {
        code: "FGB",
        driver: "FlatGeobuf",
        extension: ".fgb",
        is_container: false,
        writer: WriterKind::External,
    },
    OutputFormat {
        code: "GPKG",
        driver: "GPKG",
        extension: ".gpkg",
        is_container: true,
        writer: WriterKind::External,
    },
    OutputFormat {
        code: "GDB",
        driver: "OpenFileGDB",
        extension: ".gdb",
        is_container: true,
        writer: WriterKind::External,
    },
    OutputFormat {
        code: "GEOJSON",
        driver: "GeoJSON",
        extension: ".geojson",
        is_container: false,
        writer: WriterKind::Native,
    },
];

const ALIASES: &[(&str, &str)] = &[
    ("SHAPE", "SHP"),
    ("SHAPEFILE", "SHP"),
    (".SHP", "SHP"),
    ("FLATGEOBUF", "FGB"),
    (".FGB", "FGB"),
    ("GEOPACKAGE", "GPKG"),
    (".GPKG", "GPKG"),
    ("OPENFILEGDB", "GDB"),
    (".GDB", "GDB"),
    (".GEOJSON", "GEOJSON"),
    ("JSON", "GEOJSON"),
];

/// Résout un format par code, alias ou nom de driver (insensible à la casse)
pub fn lookup_format(key: &str) -> Option<&'static OutputFormat> {
    let key = key.trim().to_uppercase();
    if key.is_empty() {
        return None;
    }

    let code = ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, code)| *code)
        .unwrap_or(key.as_str());

    FORMATS
        .iter()
        .find(|f| f.code == code || f.driver.eq_ignore_ascii_case(code))
}

/// Codes supportés, pour les messages d'erreur
pub fn supported_codes() -> String {
    FORMATS
        .iter()
        .map(|f| f.code)
        .collect::<Vec<_>>()
        .join("|")
}

/// Erreurs de validation de la configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one input path is required")]
    NoInputs,

    #[error("input path #{0} is empty")]
    EmptyInput(usize),

    #[error("invalid depth {0}: expected -1 (unlimited) or a value >= 0")]
    InvalidDepth(i32),

    #[error("unsupported format '{key}' (supported: {supported})")]
    UnsupportedFormat { key: String, supported: String },
}

/// Paramètres d'un export
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub inputs: Vec<PathBuf>,
    /// -1 = illimitée, 0 = fichiers directement dans les répertoires
    pub depth: i32,
    pub format: String,
    /// Répertoire de sortie, ou chemin du conteneur (GPKG/GDB)
    pub output: PathBuf,
    pub merge: bool,
    pub name_template: String,
    pub dry_run: bool,
    pub overwrite: bool,
    pub force_refresh: bool,
    pub geometry: GeometryOptions,
    /// Commande du writer externe
    pub writer: Option<String>,
    pub writer_timeout: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            depth: -1,
            format: "FGB".to_string(),
            output: PathBuf::new(),
            merge: false,
            name_template: DEFAULT_NAME_TEMPLATE.to_string(),
            dry_run: false,
            overwrite: false,
            force_refresh: false,
            geometry: GeometryOptions::default(),
            writer: None,
            writer_timeout: DEFAULT_WRITER_TIMEOUT,
        }
    }
}

impl ExportConfig {
    /// Valide et normalise la configuration, renvoie le format résolu.
    ///
    /// Les entrées sont nettoyées, la sortie rendue absolue (répertoire
    /// courant si vide) et le gabarit de nom privé de son extension.
    pub fn verify(&mut self) -> Result<&'static OutputFormat> {
        if self.inputs.is_empty() {
            return Err(ConfigError::NoInputs.into());
        }

        let mut inputs = Vec::with_capacity(self.inputs.len());
        for (i, input) in self.inputs.iter().enumerate() {
            let trimmed = input.to_string_lossy().trim().to_string();
            if trimmed.is_empty() {
                return Err(ConfigError::EmptyInput(i + 1).into());
            }
            inputs.push(PathBuf::from(trimmed));
        }
        self.inputs = inputs;

        if self.depth < -1 {
            return Err(ConfigError::InvalidDepth(self.depth).into());
        }

        let format = lookup_format(&self.format).ok_or_else(|| ConfigError::UnsupportedFormat {
            key: self.format.clone(),
            supported: supported_codes(),
        })?;
        self.format = format.code.to_string();

        self.output = resolve_output(&self.output, format)?;
        self.name_template = normalize_template(&self.name_template);

        Ok(format)
    }

    /// Répertoire qui reçoit les fichiers (ou le conteneur)
    pub fn output_dir(&self, format: &OutputFormat) -> PathBuf {
        if format.is_container {
            self.output
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.output.clone())
        } else {
            self.output.clone()
        }
    }

    /// Chemin du fichier d'historique
    pub fn history_path(&self, format: &OutputFormat) -> PathBuf {
        self.output_dir(format).join(HISTORY_FILE_NAME)
    }

    /// Crée le répertoire de sortie (sauf en dry-run)
    pub fn prepare(&self, format: &OutputFormat) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let dir = self.output_dir(format);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))
    }
}

fn resolve_output(output: &Path, format: &OutputFormat) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;

    let raw = output.to_string_lossy().trim().to_string();
    let mut resolved = if raw.is_empty() {
        cwd
    } else {
        let path = PathBuf::from(raw);
        if path.is_absolute() {
            path
        } else {
            cwd.join(path)
        }
    };

    if format.is_container {
        if resolved.is_dir() {
            let name = resolved
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            resolved = resolved.join(name);
        }
        if !has_extension(&resolved, format.extension) {
            let mut s = resolved.into_os_string();
            s.push(format.extension);
            resolved = PathBuf::from(s);
        }
    }

    Ok(resolved)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()).eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Gabarit vide -> `{name}`, sinon sans extension
fn normalize_template(template: &str) -> String {
    let template = template.trim();
    if template.is_empty() {
        return DEFAULT_NAME_TEMPLATE.to_string();
    }
    match template.rfind('.') {
        // Un point dans un jeton (`{date:%d.%m}`) n'est pas une extension
        Some(pos) if pos > 0 && !template[pos..].contains(|c: char| c == '{' || c == '}') => {
            template[..pos].to_string()
        }
        _ => template.to_string(),
    }
}
