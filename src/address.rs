use crate::name::{fold, NormalizedPerson};

/// Login address built from the given name's initial and the first surname.
///
/// Two people sharing both are given the same address; nothing here tries to
/// tell them apart.
pub fn synthesize(person: &NormalizedPerson, domain: &str) -> String {
    format!("{}@{}", local_part(person), domain)
}

/// Same as [`synthesize`] with `suffix` appended to the local part. Students
/// carry the tail of their enrollment id there.
pub fn synthesize_with_suffix(person: &NormalizedPerson, suffix: &str, domain: &str) -> String {
    format!("{}{}@{}", local_part(person), ascii_only(suffix), domain)
}

fn local_part(person: &NormalizedPerson) -> String {
    let initial = fold(&person.given_name).chars().next().map(String::from);
    let mut local = ascii_only(&initial.unwrap_or_default());
    local.push_str(&ascii_only(&fold(&person.surname1)));
    local
}

fn ascii_only(text: &str) -> String {
    text.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
