//! Export vers GeoJSON avec geozero (streaming)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use cadtxt::Feature;
use geo::Geometry;
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use super::plan::ProcessedFile;

/// Propriété ajoutée : nom du fichier source
pub const SOURCE_PROPERTY: &str = "_source";

/// Vérifie que tous les fichiers partagent le même système de coordonnées.
///
/// Les coordonnées ne sont pas reprojetées : fusionner deux fuseaux
/// donnerait des features mal placées sous un seul `crs`.
fn ensure_single_crs(files: &[&ProcessedFile]) -> Result<()> {
    let Some((first, rest)) = files.split_first() else {
        return Ok(());
    };
    if let Some(other) = rest.iter().find(|f| f.result.crs != first.result.crs) {
        anyhow::bail!(
            "Cannot merge {} ({}) with {} ({}): coordinate systems differ and GeoJSON output is not reprojected",
            first.source_name(),
            first.result.coordinate_system.name,
            other.source_name(),
            other.result.coordinate_system.name
        );
    }
    Ok(())
}

/// Écrit une FeatureCollection avec les features de tous les fichiers.
///
/// Tous les fichiers doivent avoir le même système de coordonnées. Le membre
/// `crs` porte leur code EPSG ; un méridien central non standard (EPSG 0)
/// n'a pas de `crs`. Renvoie le nombre de features écrites.
pub fn export_to_geojson(
    files: &[&ProcessedFile],
    output_path: &Path,
    overwrite: bool,
) -> Result<usize> {
    ensure_single_crs(files)?;

    if output_path.exists() && !overwrite {
        anyhow::bail!(
            "Output already exists: {} (use --overwrite)",
            output_path.display()
        );
    }

    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    // Header FeatureCollection avec CRS
    write!(writer, r#"{{"type":"FeatureCollection","#)?;
    if let Some(epsg) = files.iter().map(|f| f.result.epsg).find(|&e| e > 0) {
        write!(
            writer,
            r#""crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{}"}}}},"#,
            epsg
        )?;
    }
    write!(writer, r#""features":["#)?;

    let mut count = 0;
    for file in files {
        let source = file.source_name();
        for feature in &file.result.features {
            if count > 0 {
                write!(writer, ",")?;
            }
            write_feature(&mut writer, feature, &source)?;
            count += 1;
        }
    }

    // Footer
    write!(writer, "]}}")?;
    writer.flush()?;

    Ok(count)
}

/// Écrit une feature en GeoJSON
fn write_feature<W: Write>(writer: &mut W, feature: &Feature, source: &str) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","geometry":"#)?;

    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    Geometry::Polygon(feature.geometry.clone()).process_geom(&mut geom_writer)?;
    writer.write_all(&geom_buf)?;

    // Properties, triées pour une sortie stable
    write!(
        writer,
        r#","properties":{{"{}":"{}""#,
        SOURCE_PROPERTY,
        escape_json(source)
    )?;
    let mut keys: Vec<&String> = feature.attributes.keys().collect();
    keys.sort();
    for key in keys {
        write!(
            writer,
            r#","{}":"{}""#,
            escape_json(key),
            escape_json(&feature.attributes[key])
        )?;
    }
    write!(writer, "}}}}")?;

    Ok(())
}

/// Échappe une chaîne pour JSON
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}
