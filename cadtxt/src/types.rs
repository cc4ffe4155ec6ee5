//! Types de données pour le crate cadtxt

use geo::Polygon;
use std::collections::HashMap;

/// Tolérance maximale autorisée (unités du fichier, en pratique le mètre)
pub const MAX_TOLERANCE: f64 = 0.0001;

/// Nombre de points limites
pub const KEY_BP_COUNT: &str = "bp_cnt";
/// Surface déclarée
pub const KEY_AREA: &str = "area";
/// Identifiant de parcelle
pub const KEY_PARCEL_ID: &str = "pid";
/// Nom de parcelle
pub const KEY_PARCEL_NAME: &str = "pname";
/// Type de géométrie déclaré (point/ligne/surface)
pub const KEY_GEOMETRY_TYPE: &str = "gtype";
/// Numéro de feuille
pub const KEY_SHEET: &str = "sheet";
/// Usage du sol
pub const KEY_USAGE: &str = "usage";
/// Code de parcelle
pub const KEY_CODE: &str = "code";

/// Ordre positionnel des champs d'une ligne d'en-tête de parcelle
pub const PARCEL_ATTRIBUTE_KEYS: [&str; 8] = [
    KEY_BP_COUNT,
    KEY_AREA,
    KEY_PARCEL_ID,
    KEY_PARCEL_NAME,
    KEY_GEOMETRY_TYPE,
    KEY_SHEET,
    KEY_USAGE,
    KEY_CODE,
];

/// Nom du système de coordonnées
pub const ATTR_COORDINATE_SYSTEM: &str = "坐标系";
/// Type de projection
pub const ATTR_PROJECTION_TYPE: &str = "投影类型";
/// Largeur des fuseaux (3 ou 6 degrés)
pub const ATTR_DEGREE: &str = "几度分带";
/// Numéro de fuseau
pub const ATTR_BAND: &str = "带号";
/// Précision déclarée (optionnelle)
pub const ATTR_PRECISION: &str = "精度";

/// Attributs de fichier obligatoires, dans l'ordre de rapport
pub const REQUIRED_FILE_ATTRIBUTES: [&str; 4] = [
    ATTR_COORDINATE_SYSTEM,
    ATTR_PROJECTION_TYPE,
    ATTR_DEGREE,
    ATTR_BAND,
];

/// Point levé d'un anneau
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Numéro de point (premiers chiffres du champ 0)
    pub id: i64,
    /// Numéro d'anneau
    pub ring_id: i64,
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(id: i64, ring_id: i64, x: f64, y: f64) -> Self {
        Self { id, ring_id, x, y }
    }
}

/// Anneau : suite ordonnée de points
pub type Ring = Vec<Point>;

/// Une parcelle : attributs positionnels + anneaux
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parcel {
    pub attributes: HashMap<String, String>,
    pub rings: Vec<Ring>,
}

impl Parcel {
    /// Identifiant de la parcelle (champ `pid`, vide si absent)
    pub fn id(&self) -> &str {
        self.attributes
            .get(KEY_PARCEL_ID)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Résultat du parsing d'un fichier texte
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    /// Parcelles dans l'ordre du fichier
    pub parcels: Vec<Parcel>,

    /// Attributs de niveau fichier (section `[属性描述]`)
    pub file_attributes: HashMap<String, String>,
}

impl ParsedDocument {
    /// Nombre total d'anneaux, toutes parcelles confondues
    pub fn ring_count(&self) -> usize {
        self.parcels.iter().map(|p| p.rings.len()).sum()
    }

    /// Nombre total de points, toutes parcelles confondues
    pub fn point_count(&self) -> usize {
        self.parcels
            .iter()
            .flat_map(|p| p.rings.iter())
            .map(Vec::len)
            .sum()
    }
}

/// Options du post-traitement géométrique
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryOptions {
    /// Tolérance ; `None` (ou <= 0) = attribut `精度` du fichier, puis MAX_TOLERANCE
    pub precision: Option<f64>,

    /// Dédoublonnage sur grille
    pub deduplicate: bool,

    /// Fermeture automatique des anneaux
    pub auto_close: bool,
}

impl Default for GeometryOptions {
    fn default() -> Self {
        Self {
            precision: None,
            deduplicate: true,
            auto_close: true,
        }
    }
}

/// Système de coordonnées CGCS2000 Gauss-Krüger dérivé d'un document
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSystem {
    /// Nom de projection (PROJCS)
    pub name: String,

    /// Largeur de fuseau : 3 ou 6
    pub degree: u8,

    pub band: i64,

    /// Méridien central (degrés)
    pub central_meridian: f64,

    /// Code EPSG, 0 si aucun code standard
    pub epsg: u32,

    /// Méridien central lu dans le nom du système (suffixe entre parenthèses)
    pub is_custom_meridian: bool,

    /// Définition ESRI WKT
    pub wkt: String,
}

impl CoordinateSystem {
    /// `EPSG:<n>` si un code existe, sinon le WKT complet
    pub fn crs_string(&self) -> String {
        if self.epsg > 0 {
            format!("EPSG:{}", self.epsg)
        } else {
            self.wkt.clone()
        }
    }
}

/// Une parcelle prête à être écrite
#[derive(Debug, Clone)]
pub struct Feature {
    /// Polygone WKT (ordre des axes : Y puis X)
    pub wkt: String,

    /// Attributs de la parcelle, copiés tels quels
    pub attributes: HashMap<String, String>,

    /// Même polygone que `wkt`, pour les writers natifs
    pub geometry: Polygon<f64>,
}

/// Résultat du pipeline pour un document
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// `EPSG:<n>` ou WKT
    pub crs: String,

    /// Code EPSG, 0 si aucun
    pub epsg: u32,

    pub coordinate_system: CoordinateSystem,

    pub features: Vec<Feature>,
}
