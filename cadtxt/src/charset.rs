//! Détection et décodage de l'encodage des fichiers texte
//!
//! Ordre de détection : vide -> UTF-8 ; BOM (UTF-8, UTF-16LE, UTF-16BE) ;
//! UTF-8 strict sans octet nul (séquence finale tronquée tolérée) ; UTF-16 sans BOM
//! (répartition des octets nuls) ; GB18030 strict ; sinon inconnu.
//!
//! Les remplacements U+FFFD produits par un décodage tolérant sont signalés
//! comme avertissement, jamais comme erreur.

use std::fmt;

use encoding_rs::{Encoding, GB18030, UTF_16BE, UTF_16LE};

const BOM_UTF8: &[u8] = &[0xEF, 0xBB, 0xBF];
const BOM_UTF16LE: &[u8] = &[0xFF, 0xFE];
const BOM_UTF16BE: &[u8] = &[0xFE, 0xFF];

/// Seuils de la répartition des octets nuls (UTF-16 sans BOM)
const ZERO_HIGH: f64 = 0.30;
const ZERO_LOW: f64 = 0.05;

/// Seuils du motif "octet haut dans la plage CJK" (texte chinois sans ASCII)
const CJK_HIGH: f64 = 0.75;
const CJK_OTHER_MAX: f64 = 0.60;

/// Qualité minimale d'un décodage UTF-16
const MIN_PRINTABLE_RATIO: f64 = 0.80;
const MAX_CONTROL_RATIO: f64 = 0.05;
const MAX_WEIRD_RATIO: f64 = 0.02;
/// En dessous, un GB18030 strictement valide est préféré
const MIN_UTF16_SCORE: f64 = 0.90;

/// Encodage détecté
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Gb18030,
    Unknown,
}

impl TextEncoding {
    /// Libellé stable (`utf-8`, `utf-8-sig`, ...)
    pub fn label(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Bom => "utf-8-sig",
            Self::Utf16Le => "utf-16-le",
            Self::Utf16Be => "utf-16-be",
            Self::Gb18030 => "gb18030",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Texte décodé
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub encoding: TextEncoding,
    /// Avertissement (remplacements, encodage inconnu)
    pub warning: Option<String>,
}

/// Détecte l'encodage d'un contenu brut
pub fn detect(data: &[u8]) -> TextEncoding {
    if data.is_empty() {
        return TextEncoding::Utf8;
    }

    if data.starts_with(BOM_UTF8) {
        return TextEncoding::Utf8Bom;
    }
    if data.starts_with(BOM_UTF16LE) {
        return TextEncoding::Utf16Le;
    }
    if data.starts_with(BOM_UTF16BE) {
        return TextEncoding::Utf16Be;
    }

    if is_utf8_allow_truncated(data) {
        return TextEncoding::Utf8;
    }

    if let Some(encoding) = guess_utf16(data) {
        return encoding;
    }

    if is_gb18030(data) {
        return TextEncoding::Gb18030;
    }

    TextEncoding::Unknown
}

/// Décode un contenu brut en UTF-8
pub fn decode(data: &[u8]) -> Decoded {
    let encoding = detect(data);

    let (text, warning) = match encoding {
        TextEncoding::Utf8Bom => lossy_utf8(&data[BOM_UTF8.len()..], encoding),
        TextEncoding::Utf8 => lossy_utf8(data, encoding),
        TextEncoding::Utf16Le => decode_with(UTF_16LE, strip(data, BOM_UTF16LE), encoding),
        TextEncoding::Utf16Be => decode_with(UTF_16BE, strip(data, BOM_UTF16BE), encoding),
        TextEncoding::Gb18030 => decode_with(GB18030, data, encoding),
        TextEncoding::Unknown => {
            let (text, replaced) = lossy_utf8(data, encoding);
            let warning = match replaced {
                Some(w) => w,
                None => "unknown encoding, decoded as utf-8".to_string(),
            };
            (text, Some(warning))
        }
    };

    if let Some(ref w) = warning {
        tracing::warn!(encoding = %encoding, "{}", w);
    }

    Decoded {
        text,
        encoding,
        warning,
    }
}

fn strip<'a>(data: &'a [u8], bom: &[u8]) -> &'a [u8] {
    data.strip_prefix(bom).unwrap_or(data)
}

fn count_replacements(text: &str) -> usize {
    text.matches('\u{FFFD}').count()
}

fn lossy_utf8(data: &[u8], encoding: TextEncoding) -> (String, Option<String>) {
    if simdutf8::basic::from_utf8(data).is_ok() {
        return (String::from_utf8_lossy(data).into_owned(), None);
    }

    let text = String::from_utf8_lossy(data).into_owned();
    let replaced = count_replacements(&text);
    let warning = format!("{encoding}: {replaced} invalid sequence(s) replaced with U+FFFD");
    (text, Some(warning))
}

fn decode_with(
    codec: &'static Encoding,
    data: &[u8],
    encoding: TextEncoding,
) -> (String, Option<String>) {
    let (text, had_errors) = codec.decode_without_bom_handling(data);
    let text = text.into_owned();

    if had_errors {
        let replaced = count_replacements(&text);
        let warning = format!("{encoding}: {replaced} invalid sequence(s) replaced with U+FFFD");
        (text, Some(warning))
    } else {
        (text, None)
    }
}

/// UTF-8 strict, en tolérant une séquence multi-octets tronquée en fin de contenu.
/// Un octet nul exclut l'UTF-8 (texte UTF-16 sans BOM).
fn is_utf8_allow_truncated(data: &[u8]) -> bool {
    if memchr::memchr(0, data).is_some() {
        return false;
    }

    match simdutf8::compat::from_utf8(data) {
        Ok(_) => true,
        // error_len() == None : fin de contenu au milieu d'une séquence
        Err(e) => e.error_len().is_none(),
    }
}

fn is_gb18030(data: &[u8]) -> bool {
    GB18030
        .decode_without_bom_handling_and_without_replacement(data)
        .is_some()
}

/// Évaluation d'un décodage UTF-16 candidat
#[derive(Debug, Default, Clone, Copy)]
struct Utf16Eval {
    valid: bool,
    printable: f64,
    control: f64,
    weird: f64,
    score: f64,
}

impl Utf16Eval {
    fn acceptable(&self) -> bool {
        self.valid
            && self.printable >= MIN_PRINTABLE_RATIO
            && self.control <= MAX_CONTROL_RATIO
            && self.weird <= MAX_WEIRD_RATIO
    }
}

fn utf16_units(data: &[u8], little_endian: bool) -> Vec<u16> {
    data.chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect()
}

fn evaluate_utf16(data: &[u8], little_endian: bool) -> Utf16Eval {
    let units = utf16_units(data, little_endian);
    let total = units.len();
    if total == 0 {
        return Utf16Eval::default();
    }

    let (mut printable, mut control, mut weird, mut ascii, mut cjk, mut lone) = (0, 0, 0, 0, 0, 0);

    let mut i = 0;
    while i < total {
        let u = units[i];
        i += 1;

        match u {
            0xD800..=0xDBFF => {
                if i < total && (0xDC00..=0xDFFF).contains(&units[i]) {
                    i += 1;
                    printable += 1;
                } else {
                    lone += 1;
                }
            }
            0xDC00..=0xDFFF => lone += 1,
            0x09 | 0x0A | 0x0D => printable += 1,
            0x00..=0x1F => control += 1,
            0x20..=0x7F => {
                printable += 1;
                ascii += 1;
            }
            0x3400..=0x4DBF | 0x4E00..=0x9FFF => {
                printable += 1;
                cjk += 1;
            }
            0xFDD0..=0xFDEF | 0xFFFE | 0xFFFF => weird += 1,
            _ => printable += 1,
        }
    }

    // Quelques substituts isolés tolérés (coupure en fin de contenu)
    if lone > total / 100 {
        return Utf16Eval::default();
    }

    let ratio = |n: usize| n as f64 / total as f64;
    let printable = ratio(printable);

    Utf16Eval {
        valid: true,
        printable,
        control: ratio(control),
        weird: ratio(weird + lone),
        score: printable * 0.7 + (ratio(cjk) + ratio(ascii)) * 0.3,
    }
}

/// Proportion d'octets hauts (LE, BE) dans la plage des idéogrammes courants
fn cjk_high_byte_ratios(data: &[u8]) -> (f64, f64) {
    let pairs = data.len() / 2;
    if pairs == 0 {
        return (0.0, 0.0);
    }

    let in_range = |b: u8| (0x4E..=0x9F).contains(&b);
    let (le, be) = data.chunks_exact(2).fold((0usize, 0usize), |(le, be), pair| {
        (
            le + in_range(pair[1]) as usize,
            be + in_range(pair[0]) as usize,
        )
    });

    (le as f64 / pairs as f64, be as f64 / pairs as f64)
}

/// UTF-16 sans BOM : répartition des octets nuls, puis motif CJK
fn guess_utf16(data: &[u8]) -> Option<TextEncoding> {
    if data.len() < 4 {
        return None;
    }

    let half = (data.len() / 2) as f64;
    let (even_zeros, odd_zeros) =
        memchr::memchr_iter(0, data).fold((0usize, 0usize), |(even, odd), pos| {
            if pos % 2 == 0 {
                (even + 1, odd)
            } else {
                (even, odd + 1)
            }
        });
    let even_ratio = even_zeros as f64 / half;
    let odd_ratio = odd_zeros as f64 / half;

    let mut le_candidate = odd_ratio > ZERO_HIGH && even_ratio < ZERO_LOW;
    let mut be_candidate = even_ratio > ZERO_HIGH && odd_ratio < ZERO_LOW;

    if !le_candidate && !be_candidate && data.len() % 2 == 0 {
        let (le_high, be_high) = cjk_high_byte_ratios(data);
        le_candidate = le_high >= CJK_HIGH && be_high < CJK_OTHER_MAX;
        be_candidate = be_high >= CJK_HIGH && le_high < CJK_OTHER_MAX;
    }

    if !le_candidate && !be_candidate {
        return None;
    }

    let le = le_candidate
        .then(|| evaluate_utf16(data, true))
        .filter(Utf16Eval::acceptable);
    let be = be_candidate
        .then(|| evaluate_utf16(data, false))
        .filter(Utf16Eval::acceptable);

    let low_score = le.is_some_and(|e| e.score < MIN_UTF16_SCORE)
        || be.is_some_and(|e| e.score < MIN_UTF16_SCORE);
    if low_score && is_gb18030(data) {
        return None;
    }

    match (le, be) {
        (Some(_), None) => Some(TextEncoding::Utf16Le),
        (None, Some(_)) => Some(TextEncoding::Utf16Be),
        (Some(l), Some(b)) if l.score > b.score => Some(TextEncoding::Utf16Le),
        (Some(l), Some(b)) if b.score > l.score => Some(TextEncoding::Utf16Be),
        _ => None,
    }
}
