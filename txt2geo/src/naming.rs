//! Gabarits de noms de sortie et noms sûrs pour les SIG
//!
//! Jetons : `{name}`, `{index[:width]}`, `{count}`, `{date[:strftime]}`,
//! `{uuid}`, `{rand[:len]}`. Chacun accepte un modificateur de casse
//! `lower`, `upper` ou `title` dans n'importe quelle position d'argument.

use std::collections::HashSet;
use std::fmt::Write;
use std::sync::OnceLock;

use cadtxt::fold_full_width;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::{Captures, Regex};

pub const DEFAULT_DATE_FORMAT: &str = "%Y%m%d";
pub const DEFAULT_RAND_LENGTH: usize = 8;

/// Longueur maximale d'un nom (en caractères)
pub const MAX_NAME_LENGTH: usize = 52;

pub const UNNAMED: &str = "unnamed";

/// Noms de champs réservés par les formats SIG, et mots-clés SQL
const RESERVED_NAMES: &[&str] = &[
    "fid", "area", "len", "points", "numofpts", "entity", "eminx", "eminy", "emaxx", "emaxy",
    "eminz", "emaxz", "min_measure", "max_measure", "add", "alter", "and", "between", "by",
    "column", "create", "delete", "drop", "exists", "for", "from", "group", "having", "in",
    "insert", "into", "is", "like", "not", "null", "or", "order", "select", "set", "table",
    "update", "values", "where",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaseTransform {
    Lower,
    Upper,
    Title,
}

impl CaseTransform {
    fn parse(arg: &str) -> Option<Self> {
        match arg.trim().to_lowercase().as_str() {
            "lower" => Some(Self::Lower),
            "upper" => Some(Self::Upper),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    fn apply(self, value: String) -> String {
        match self {
            Self::Lower => value.to_lowercase(),
            Self::Upper => value.to_uppercase(),
            Self::Title => {
                let mut chars = value.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => value,
                }
            }
        }
    }
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\{([^{}]*)\}").expect("valid token pattern"))
}

/// Rend un gabarit de nom.
///
/// `index` commence à 1. Les jetons inconnus et les accolades non fermées
/// sont conservés tels quels.
pub fn render_name_template(template: &str, base: &str, index: usize, count: usize) -> String {
    token_regex()
        .replace_all(template, |caps: &Captures| {
            resolve_token(&caps[1], base, index, count).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn resolve_token(token: &str, base: &str, index: usize, count: usize) -> Option<String> {
    let mut parts = token.split(':');
    let name = parts.next()?.trim().to_lowercase();
    if name.is_empty() {
        return None;
    }

    let mut case = None;
    let mut args = Vec::new();
    for arg in parts {
        match CaseTransform::parse(arg) {
            Some(c) => case = Some(c),
            None => args.push(arg),
        }
    }
    let first_arg = args.first().map(|a| a.trim()).filter(|a| !a.is_empty());

    let value = match name.as_str() {
        "name" => base.to_string(),
        "index" => {
            let width = first_arg
                .and_then(|a| a.parse::<usize>().ok())
                .unwrap_or(0)
                .min(MAX_NAME_LENGTH);
            format!("{:0width$}", index, width = width)
        }
        "count" => count.to_string(),
        "date" => {
            // `%H:%M` a été découpé sur les `:`
            let joined = args.join(":");
            let format = if joined.trim().is_empty() {
                DEFAULT_DATE_FORMAT
            } else {
                joined.as_str()
            };
            let mut out = String::new();
            write!(out, "{}", chrono::Local::now().format(format)).ok()?;
            out
        }
        "uuid" => uuid::Uuid::new_v4().to_string(),
        "rand" => {
            let length = first_arg
                .and_then(|a| a.parse::<usize>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(DEFAULT_RAND_LENGTH)
                .min(MAX_NAME_LENGTH);
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(length)
                .map(char::from)
                .collect()
        }
        _ => return None,
    };

    Some(match case {
        Some(c) => c.apply(value),
        None => value,
    })
}

fn is_reserved(name: &str) -> bool {
    let lower = name.to_lowercase();
    RESERVED_NAMES.contains(&lower.as_str())
}

/// Lettres, chiffres et `_` ; les séquences d'autres caractères deviennent
/// un seul `_`, sans `_` en tête ni en fin
fn fold_identifier(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_underscore = false;

    for c in fold_full_width(s).chars() {
        if c == '_' || c.is_alphabetic() || c.is_numeric() {
            out.push(c);
            previous_underscore = false;
        } else if !previous_underscore {
            out.push('_');
            previous_underscore = true;
        }
    }

    out.trim_matches('_').to_string()
}

fn stem_of(name: &str) -> &str {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    match base.rfind('.') {
        Some(pos) if pos > 0 => &base[..pos],
        _ => base,
    }
}

/// Transforme un nom quelconque en identifiant sûr et unique dans `used`
pub fn sanitize_name(name: &str, used: &mut HashSet<String>) -> String {
    let mut normalized = fold_identifier(stem_of(name.trim()));
    if normalized.is_empty() {
        normalized = UNNAMED.to_string();
    }

    let starts_with_digit = normalized.chars().next().map_or(false, char::is_numeric);
    if starts_with_digit || is_reserved(&normalized) {
        normalized.insert(0, '_');
    }

    let mut normalized: String = normalized.chars().take(MAX_NAME_LENGTH).collect();
    normalized.truncate(normalized.trim_end_matches('_').len());
    if normalized.is_empty() {
        normalized = UNNAMED.to_string();
    }

    if used.insert(normalized.clone()) {
        return normalized;
    }

    let mut suffix = 1;
    loop {
        let candidate = format!("{}_{}", normalized, suffix);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}
