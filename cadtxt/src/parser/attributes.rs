//! Lignes `clé=valeur` de la section `[属性描述]`

use std::collections::HashMap;

/// Sous-chaîne mal orthographiée rencontrée dans certains exports
const MISSPELLED_PRODUCTION: &str = "产生";
/// Forme canonique
const CANONICAL_PRODUCTION: &str = "生产";

/// Convertit les caractères pleine chasse en demi-chasse.
///
/// U+3000 -> espace, U+FF01..=U+FF5E -> U+0021..=U+007E, guillemets CJK
/// “ ” -> `"` et ‘ ’ -> `'`. Les autres caractères sont conservés.
pub fn fold_full_width(s: &str) -> String {
    s.chars().map(fold_char).collect()
}

#[inline]
fn fold_char(c: char) -> char {
    match c {
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        '\u{201C}' | '\u{201D}' => '"',
        '\u{2018}' | '\u{2019}' => '\'',
        _ => c,
    }
}

/// Remplace `产生` par `生产` dans une clé
pub fn canonical_key(key: &str) -> String {
    key.replace(MISSPELLED_PRODUCTION, CANONICAL_PRODUCTION)
}

/// Découpe une ligne au premier `=` ; `None` si la ligne n'en contient pas
pub fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), value.trim()))
}

/// Enregistre une ligne d'attribut de fichier.
///
/// La valeur est repliée en demi-chasse. Une clé contenant `产生` est
/// canonisée ; si la clé canonique existe déjà, la ligne est ignorée.
pub fn record_attribute(attributes: &mut HashMap<String, String>, line: &str) {
    let Some((key, value)) = split_key_value(line) else {
        return;
    };

    let value = fold_full_width(value);

    if key.contains(MISSPELLED_PRODUCTION) {
        let canonical = canonical_key(key);
        if attributes.contains_key(&canonical) {
            tracing::debug!(key, canonical = %canonical, "Clé mal orthographiée ignorée");
            return;
        }
        attributes.insert(canonical, value);
        return;
    }

    attributes.insert(key.to_string(), value);
}
