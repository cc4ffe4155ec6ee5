//! Types d'erreurs pour le crate cadtxt

use thiserror::Error;

/// Code de diagnostic pour une ligne de coordonnées mal formée
pub const CODE_INVALID_POINT_FORMAT: &str = "INVALID_POINT_FORMAT";

/// Code de diagnostic pour une coordonnée sans ligne d'en-tête de parcelle
pub const CODE_MISSING_PARCEL_HEADER: &str = "MISSING_PARCEL_HEADER";

/// Défaut syntaxique d'une ligne de coordonnées
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxKind {
    #[error("expected at least 4 comma-separated fields, found {found}")]
    TooFewFields { found: usize },

    #[error("invalid ring id: {0:?}")]
    InvalidRingId(String),

    #[error("invalid X coordinate: {0:?}")]
    InvalidX(String),

    #[error("invalid Y coordinate: {0:?}")]
    InvalidY(String),
}

/// Erreurs du parser (texte décodé -> document)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Ligne de coordonnées invalide (abandon immédiat)
    #[error("line {line}: {code}: {kind}", code = CODE_INVALID_POINT_FORMAT)]
    Syntax { line: usize, kind: SyntaxKind },

    /// Coordonnée rencontrée avant toute ligne `,@`
    #[error(
        "line {line}: {code}: coordinate record found before any parcel header (line ending with ',@')",
        code = CODE_MISSING_PARCEL_HEADER
    )]
    MissingParcelHeader { line: usize },

    /// Section jamais atteinte
    #[error("document is missing the {0} section")]
    MissingSection(&'static str),

    /// Attributs de fichier obligatoires absents (liste complète)
    #[error("{section} section is missing required attributes: {}", .keys.join(", "), section = crate::parser::SECTION_ATTRIBUTES)]
    MissingAttributes { keys: Vec<String> },
}

impl ParseError {
    /// Numéro de ligne (base 1) pour les erreurs de ligne
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Syntax { line, .. } | Self::MissingParcelHeader { line } => Some(*line),
            _ => None,
        }
    }

    /// Code de diagnostic stable pour les erreurs de ligne
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Syntax { .. } => Some(CODE_INVALID_POINT_FORMAT),
            Self::MissingParcelHeader { .. } => Some(CODE_MISSING_PARCEL_HEADER),
            _ => None,
        }
    }
}

/// Erreurs de construction du système de coordonnées
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CrsError {
    #[error("document contains no parcels")]
    NoParcels,

    #[error("coordinate system name is missing")]
    MissingName,

    #[error("coordinate system must be \"{expected}\", got {0:?}", expected = crate::crs::DATUM_MARKER)]
    UnsupportedDatum(String),

    #[error("degree banding must be 3 or 6, got {0:?}")]
    InvalidDegree(String),

    #[error("invalid band number: {0:?}")]
    InvalidBand(String),

    #[error("{degree}-degree band must be within {expected}, got {band}")]
    BandOutOfRange {
        degree: u8,
        band: i64,
        expected: &'static str,
    },

    #[error("central meridian {0:.6} is outside China's range [75,135]")]
    CentralMeridianOutOfRange(f64),
}

/// Défaut géométrique empêchant la construction d'un polygone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryDefect {
    #[error("parcel has no ring")]
    NoRings,

    #[error("ring has {count} points, at least 4 are required")]
    TooFewPoints { count: usize },

    #[error("ring is not closed")]
    Unclosed,
}

/// Parcelle dont la géométrie ne peut pas être rendue en WKT
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parcel {parcel_id:?}: {defect}")]
pub struct GeometryBuildError {
    pub parcel_id: String,
    pub defect: GeometryDefect,
}

impl GeometryBuildError {
    pub fn new(parcel_id: impl Into<String>, defect: GeometryDefect) -> Self {
        Self {
            parcel_id: parcel_id.into(),
            defect,
        }
    }
}

/// Erreurs pouvant survenir sur le pipeline complet
#[derive(Debug, Error)]
pub enum CadtxtError {
    /// Document syntaxiquement invalide
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Aucune parcelle exploitable
    #[error("no parcel data available")]
    NoParcels,

    /// Système de coordonnées non dérivable
    #[error("coordinate system build failed: {0}")]
    Crs(#[from] CrsError),

    /// Géométrie invalide pour une parcelle
    #[error("WKT build failed: {0}")]
    Geometry(#[from] GeometryBuildError),
}
