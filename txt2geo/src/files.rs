//! Collecte des fichiers sources et empreintes de contenu

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

/// Extensions des exports de coordonnées
pub const SOURCE_EXTENSIONS: &[&str] = &["txt"];

/// Fichier source lu en mémoire
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: Vec<u8>,
    /// Empreinte blake3 (hex) du contenu
    pub fingerprint: String,
}

impl SourceFile {
    /// Nom du fichier sans extension
    pub fn stem(&self) -> Option<String> {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.trim().is_empty())
    }
}

/// Empreinte blake3 hexadécimale
pub fn fingerprint(data: &[u8]) -> String {
    hex::encode(blake3::hash(data).as_bytes())
}

/// Lit un fichier et calcule son empreinte
pub fn read_source(path: &Path) -> Result<SourceFile> {
    let content =
        std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let fingerprint = fingerprint(&content);

    Ok(SourceFile {
        path: path.to_path_buf(),
        content,
        fingerprint,
    })
}

/// Lit les fichiers en parallèle, dans l'ordre des chemins
pub fn read_sources(paths: &[PathBuf]) -> Vec<(PathBuf, Result<SourceFile>)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), read_source(path)))
        .collect()
}

fn has_allowed_extension(path: &Path, extensions: &[&str]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            extensions
                .iter()
                .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}

/// Collecte les fichiers des entrées.
///
/// `depth` : -1 = illimitée, 0 = fichiers directement dans le répertoire,
/// n = n niveaux de sous-répertoires. Les entrées inexistantes sont ignorées.
/// Le résultat est dédoublonné et trié (casse ignorée, puis chemin brut).
pub fn collect_files(inputs: &[PathBuf], depth: i32, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut found: HashSet<PathBuf> = HashSet::new();

    for input in inputs {
        let resolved = match std::fs::canonicalize(input) {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %input.display(), "Entrée inexistante ignorée");
                continue;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot resolve {}", input.display()));
            }
        };

        if resolved.is_dir() {
            let mut walker = WalkDir::new(&resolved).min_depth(1);
            if depth >= 0 {
                walker = walker.max_depth(depth as usize + 1);
            }

            for entry in walker {
                let entry =
                    entry.with_context(|| format!("Failed to walk {}", resolved.display()))?;
                if entry.file_type().is_file() && has_allowed_extension(entry.path(), extensions)
                {
                    found.insert(entry.into_path());
                }
            }
        } else if has_allowed_extension(&resolved, extensions) {
            found.insert(resolved);
        }
    }

    let mut files: Vec<PathBuf> = found.into_iter().collect();
    files.sort_by(|a, b| {
        let la = a.to_string_lossy().to_lowercase();
        let lb = b.to_string_lossy().to_lowercase();
        la.cmp(&lb).then_with(|| a.cmp(b))
    });

    debug!(count = files.len(), "Fichiers collectés");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("txt2geo_files_{}", name));
        std::fs::remove_dir_all(&root).ok();
        std::fs::create_dir_all(root.join("sub/deeper")).unwrap();

        std::fs::write(root.join("b.txt"), "b").unwrap();
        std::fs::write(root.join("A.TXT"), "a").unwrap();
        std::fs::write(root.join("notes.md"), "x").unwrap();
        std::fs::write(root.join("sub/c.txt"), "c").unwrap();
        std::fs::write(root.join("sub/deeper/d.txt"), "d").unwrap();
        std::fs::canonicalize(root).unwrap()
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_collect_files_depth() {
        let root = fixture("depth");

        let top = collect_files(&[root.clone()], 0, SOURCE_EXTENSIONS).unwrap();
        assert_eq!(names(&top), vec!["A.TXT", "b.txt"]);

        let one = collect_files(&[root.clone()], 1, SOURCE_EXTENSIONS).unwrap();
        assert_eq!(one.len(), 3);

        let all = collect_files(&[root.clone()], -1, SOURCE_EXTENSIONS).unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|p| p.is_absolute()));

        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_collect_files_dedup_and_missing() {
        let root = fixture("dedup");

        let inputs = vec![
            root.join("b.txt"),
            root.clone(),
            root.join("missing.txt"),
            root.join("notes.md"),
        ];
        let files = collect_files(&inputs, 0, SOURCE_EXTENSIONS).unwrap();
        assert_eq!(names(&files), vec!["A.TXT", "b.txt"]);

        let everything = collect_files(&[root.clone()], 0, &[]).unwrap();
        assert_eq!(everything.len(), 3);

        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_read_source_fingerprint() {
        let root = fixture("read");

        let a = read_source(&root.join("b.txt")).unwrap();
        assert_eq!(a.content, b"b");
        assert_eq!(a.fingerprint.len(), 64);
        assert_eq!(a.fingerprint, fingerprint(b"b"));
        assert_eq!(a.stem().as_deref(), Some("b"));
        assert_ne!(a.fingerprint, fingerprint(b"c"));

        let results = read_sources(&[root.join("b.txt"), root.join("missing.txt")]);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());

        std::fs::remove_dir_all(root).ok();
    }
}
