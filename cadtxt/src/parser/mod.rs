//! Parser à états pour les exports texte de coordonnées de parcelles
//!
//! Structure d'un document :
//!
//! ```text
//! [属性描述]
//! 坐标系=2000国家大地坐标系
//! 几度分带=3
//! 投影类型=高斯克吕格
//! 带号=39
//! [地块坐标]
//! 5,0.0123,P001,地块一,面,,,,@
//! J1,1,3512345.12,39512345.67
//! ...
//! ```
//!
//! Les états avancent strictement : `Initial -> Attributes -> Coordinates`.

pub mod attributes;
pub mod coordinates;

use std::collections::HashMap;

use crate::error::ParseError;
use crate::types::{Parcel, ParsedDocument, KEY_PARCEL_ID, REQUIRED_FILE_ATTRIBUTES};

use attributes::record_attribute;
use coordinates::{parse_point, ParcelBuilder, PARCEL_HEADER_SUFFIX};

/// Marqueur de la section des attributs de fichier
pub const SECTION_ATTRIBUTES: &str = "[属性描述]";

/// Marqueur de la section des coordonnées
pub const SECTION_COORDINATES: &str = "[地块坐标]";

const BOM: char = '\u{FEFF}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum State {
    Initial,
    Attributes,
    Coordinates,
}

/// Parse un document texte décodé.
///
/// Les erreurs de ligne interrompent immédiatement le parsing ; les sections et
/// attributs manquants ne sont signalés qu'après lecture complète.
pub fn parse(text: &str) -> Result<ParsedDocument, ParseError> {
    let text = text.strip_prefix(BOM).unwrap_or(text);

    let mut state = State::Initial;
    let mut file_attributes = HashMap::new();
    let mut parcels = Vec::new();
    let mut current: Option<ParcelBuilder> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        match state {
            State::Initial => {
                if line == SECTION_ATTRIBUTES {
                    state = State::Attributes;
                }
            }
            State::Attributes => {
                if line == SECTION_COORDINATES {
                    state = State::Coordinates;
                } else if line != SECTION_ATTRIBUTES {
                    record_attribute(&mut file_attributes, line);
                }
            }
            State::Coordinates => {
                if line == SECTION_ATTRIBUTES || line == SECTION_COORDINATES {
                    continue;
                }

                // Attribut égaré dans la section coordonnées
                if line.contains('=') && !line.contains(',') {
                    continue;
                }

                if line.ends_with(PARCEL_HEADER_SUFFIX) {
                    if let Some(builder) = current.take() {
                        finalize(builder, &mut parcels);
                    }
                    current = Some(ParcelBuilder::from_header(line));
                    continue;
                }

                let Some(builder) = current.as_mut() else {
                    return Err(ParseError::MissingParcelHeader { line: line_no });
                };

                let point =
                    parse_point(line).map_err(|kind| ParseError::Syntax { line: line_no, kind })?;
                builder.push(point);
            }
        }
    }

    if let Some(builder) = current.take() {
        finalize(builder, &mut parcels);
    }

    match state {
        State::Initial => return Err(ParseError::MissingSection(SECTION_ATTRIBUTES)),
        State::Attributes => return Err(ParseError::MissingSection(SECTION_COORDINATES)),
        State::Coordinates => {}
    }

    validate_file_attributes(&file_attributes)?;

    tracing::debug!(
        parcels = parcels.len(),
        attributes = file_attributes.len(),
        "Document parsé"
    );

    Ok(ParsedDocument {
        parcels,
        file_attributes,
    })
}

/// Termine une parcelle ; celles sans coordonnées sont abandonnées
fn finalize(builder: ParcelBuilder, parcels: &mut Vec<Parcel>) {
    let pid = builder
        .attributes()
        .get(KEY_PARCEL_ID)
        .cloned()
        .unwrap_or_default();

    match builder.finish() {
        Some(parcel) => parcels.push(parcel),
        None => tracing::debug!(parcel_id = %pid, "Parcelle sans coordonnées ignorée"),
    }
}

/// Vérifie la présence des attributs obligatoires (tous les manquants d'un coup)
fn validate_file_attributes(attributes: &HashMap<String, String>) -> Result<(), ParseError> {
    let missing: Vec<String> = REQUIRED_FILE_ATTRIBUTES
        .iter()
        .filter(|key| !attributes.contains_key(**key))
        .map(|key| key.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ParseError::MissingAttributes { keys: missing })
    }
}
