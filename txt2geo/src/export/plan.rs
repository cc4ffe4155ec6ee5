//! Plans d'export : quelles sources alimentent quelle cible

use std::collections::HashSet;
use std::path::PathBuf;

use cadtxt::PreprocessResult;
use tracing::info;

use crate::config::{ExportConfig, OutputFormat};
use crate::naming::{render_name_template, sanitize_name};

/// Nom de base du plan unique en mode fusion
pub const MERGED_NAME: &str = "merged_output";

/// Fichier source prétraité
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub path: PathBuf,
    pub fingerprint: String,
    pub result: PreprocessResult,
}

impl ProcessedFile {
    pub fn feature_count(&self) -> usize {
        self.result.features.len()
    }

    /// Nom du fichier source, pour les propriétés `_source`
    pub fn source_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Une cible d'export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPlan {
    /// Indices dans la liste des fichiers prétraités
    pub sources: Vec<usize>,
    /// Fichier de sortie (non-conteneur) ou conteneur
    pub target: PathBuf,
    /// Nom du fichier (avec extension) ou de la couche
    pub output_name: String,
}

impl ExportPlan {
    /// `conteneur|couche` ou chemin complet du fichier
    pub fn display_target(&self, format: &OutputFormat) -> String {
        if format.is_container {
            format!("{}|{}", self.target.display(), self.output_name)
        } else {
            self.target.display().to_string()
        }
    }
}

/// Libellé de progression `[03/12]`
pub fn progress_label(position: usize, total: usize) -> String {
    let width = total.to_string().len();
    format!("[{:0width$}/{}]", position, total, width = width)
}

/// Génère les plans : un par fichier, ou un seul en mode fusion
pub fn generate(
    processed: &[ProcessedFile],
    config: &ExportConfig,
    format: &OutputFormat,
) -> Vec<ExportPlan> {
    let items: Vec<(Vec<usize>, String)> = if config.merge {
        vec![((0..processed.len()).collect(), MERGED_NAME.to_string())]
    } else {
        processed
            .iter()
            .enumerate()
            .map(|(i, file)| {
                let base = file
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| format!("file_{}", i + 1));
                (vec![i], base)
            })
            .collect()
    };

    let total = items.len();
    let mut used = HashSet::new();
    let output_dir = config.output_dir(format);

    items
        .into_iter()
        .enumerate()
        .map(|(i, (sources, base))| {
            let rendered = render_name_template(&config.name_template, &base, i + 1, total);
            let mut output_name = sanitize_name(&rendered, &mut used);

            let target = if format.is_container {
                config.output.clone()
            } else {
                output_name.push_str(format.extension);
                output_dir.join(&output_name)
            };

            ExportPlan {
                sources,
                target,
                output_name,
            }
        })
        .collect()
}

fn source_label(plan: &ExportPlan, processed: &[ProcessedFile]) -> String {
    match plan.sources.as_slice() {
        [single] => processed
            .get(*single)
            .map(|f| f.path.display().to_string())
            .unwrap_or_default(),
        many => format!("{} files", many.len()),
    }
}

/// Journalise chaque plan avec sa progression
pub fn log_plans(plans: &[ExportPlan], processed: &[ProcessedFile], format: &OutputFormat) {
    let total = plans.len();
    for (i, plan) in plans.iter().enumerate() {
        info!(
            source = %source_label(plan, processed),
            target = %plan.display_target(format),
            "{:>12}",
            progress_label(i + 1, total)
        );
    }
}

/// Affiche les plans sans rien écrire (dry-run)
pub fn preview(plans: &[ExportPlan], processed: &[ProcessedFile], format: &OutputFormat) {
    println!("=== Export plan ({}, {} targets) ===", format.code, plans.len());
    let total = plans.len();
    for (i, plan) in plans.iter().enumerate() {
        let features: usize = plan
            .sources
            .iter()
            .filter_map(|&s| processed.get(s))
            .map(ProcessedFile::feature_count)
            .sum();
        println!(
            "{:>12} {} -> {} ({} features)",
            progress_label(i + 1, total),
            source_label(plan, processed),
            plan.display_target(format),
            features
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::lookup_format;
    use cadtxt::CoordinateSystem;

    fn processed(path: &str) -> ProcessedFile {
        ProcessedFile {
            path: PathBuf::from(path),
            fingerprint: format!("fp-{}", path),
            result: PreprocessResult {
                crs: "EPSG:4527".to_string(),
                epsg: 4527,
                coordinate_system: CoordinateSystem {
                    name: "CGCS2000_3_Degree_GK_Zone_39".to_string(),
                    degree: 3,
                    band: 39,
                    central_meridian: 117.0,
                    epsg: 4527,
                    is_custom_meridian: false,
                    wkt: String::new(),
                },
                features: Vec::new(),
            },
        }
    }

    fn config(output: &str, merge: bool, template: &str) -> ExportConfig {
        ExportConfig {
            output: PathBuf::from(output),
            merge,
            name_template: template.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_progress_label() {
        assert_eq!(progress_label(3, 12), "[03/12]");
        assert_eq!(progress_label(1, 1), "[1/1]");
        assert_eq!(progress_label(7, 100), "[007/100]");
    }

    #[test]
    fn test_generate_split_mode() {
        let files = vec![processed("/in/a.txt"), processed("/in/b.txt")];
        let format = lookup_format("SHP").unwrap();
        let plans = generate(&files, &config("/out", false, "{name}_{index:02}"), format);

        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].output_name, "a_01.shp");
        assert_eq!(plans[0].target, PathBuf::from("/out/a_01.shp"));
        assert_eq!(plans[1].sources, vec![1]);
        assert_eq!(plans[1].display_target(format), "/out/b_02.shp");
    }

    #[test]
    fn test_generate_unique_names() {
        let files = vec![processed("/in/x/a.txt"), processed("/in/y/a.txt")];
        let format = lookup_format("GEOJSON").unwrap();
        let plans = generate(&files, &config("/out", false, "{name}"), format);

        assert_eq!(plans[0].output_name, "a.geojson");
        assert_eq!(plans[1].output_name, "a_1.geojson");
    }

    #[test]
    fn test_generate_merge_container() {
        let files = vec![processed("/in/a.txt"), processed("/in/b.txt")];
        let format = lookup_format("GPKG").unwrap();
        let plans = generate(&files, &config("/out/parcels.gpkg", true, "{name}"), format);

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].sources, vec![0, 1]);
        assert_eq!(plans[0].output_name, MERGED_NAME);
        assert_eq!(plans[0].target, PathBuf::from("/out/parcels.gpkg"));
        assert_eq!(
            plans[0].display_target(format),
            "/out/parcels.gpkg|merged_output"
        );
        assert_eq!(source_label(&plans[0], &files), "2 files");
    }

    #[test]
    fn test_generate_sanitizes_rendered_name() {
        let files = vec![processed("/in/2024 地块.txt")];
        let format = lookup_format("FGB").unwrap();
        let plans = generate(&files, &config("/out", false, "{name}"), format);

        assert_eq!(plans[0].output_name, "_2024_地块.fgb");
    }
}
