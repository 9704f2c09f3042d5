use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{RegistrarError, Result};

/// Comparison-only form of a person's name. Never shown to anyone.
///
/// Given name and surnames are folded separately and joined with `|`, so
/// "Ana María, López" and "Ana, María López" stay apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey(String);

impl MatchKey {
    pub fn new(given_name: &str, surnames: &str) -> Self {
        MatchKey(format!("{}|{}", fold(given_name), fold(surnames)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPerson {
    pub given_name: String,
    pub surname1: String,
    pub surname2: Option<String>,
    match_key: MatchKey,
}

impl NormalizedPerson {
    pub fn match_key(&self) -> &MatchKey {
        &self.match_key
    }

    /// Surnames as they should be displayed, separated by a single space.
    pub fn surnames(&self) -> String {
        match &self.surname2 {
            Some(surname2) => format!("{} {}", self.surname1, surname2),
            None => self.surname1.clone(),
        }
    }
}

/// Parses a roster name of the form `"Surname1 [Surname2], GivenName"`.
pub fn normalize(raw: &str) -> Result<NormalizedPerson> {
    let malformed = |reason| RegistrarError::MalformedName {
        raw: raw.to_string(),
        reason,
    };

    let (surname_group, given) = raw.split_once(',').ok_or_else(|| malformed("no comma"))?;

    let given_name = collapse(given);
    if given_name.is_empty() {
        return Err(malformed("empty given name"));
    }

    let mut surnames = surname_group.split_whitespace();
    let surname1 = surnames
        .next()
        .ok_or_else(|| malformed("empty surname"))?
        .to_string();
    let surname2 = surnames.next().map(str::to_string);
    if surnames.next().is_some() {
        return Err(malformed("more than two surnames"));
    }

    let match_key = MatchKey::new(&given_name, surname_group);
    Ok(NormalizedPerson {
        given_name,
        surname1,
        surname2,
        match_key,
    })
}

/// Lowercases, strips diacritics and collapses runs of whitespace.
pub fn fold(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.nfkd()
                .filter(|&c| !is_combining_mark(c))
                .flat_map(char::to_lowercase)
                .map(base_letter)
                .collect()
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Letters whose stroke or slash has no canonical decomposition.
fn base_letter(c: char) -> char {
    match c {
        'ł' => 'l',
        'ø' => 'o',
        'đ' => 'd',
        'ħ' => 'h',
        other => other,
    }
}
