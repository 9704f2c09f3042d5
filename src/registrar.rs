use log::{info, warn};
use rand::Rng;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

pub mod address;
pub mod credential;
pub mod error;
pub mod io;
pub mod name;
pub mod org_unit;
pub mod provision;

pub use credential::CredentialGenerator;
pub use error::{RegistrarError, Result};
pub use name::{normalize, MatchKey, NormalizedPerson};
pub use org_unit::{GroupAssignment, GroupMapping};

pub const FIRST_NAME: &str = "First Name [Required]";
pub const LAST_NAME: &str = "Last Name [Required]";
pub const EMAIL: &str = "Email Address [Required]";
pub const PASSWORD: &str = "Password [Required]";
pub const ORG_UNIT_PATH: &str = "Org Unit Path [Required]";
pub const CHANGE_PASSWORD: &str = "Change Password at Next Sign-In";

/// File and line a roster row was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub file: String,
    pub line: u64,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One roster row, already split out of the source CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPerson {
    pub name: String,
    /// Students only, e.g. `2019/123456`.
    pub enrollment: Option<String>,
    pub origin: Option<Origin>,
}

impl RawPerson {
    pub fn new(name: impl Into<String>) -> Self {
        RawPerson {
            name: name.into(),
            enrollment: None,
            origin: None,
        }
    }

    pub fn student(name: impl Into<String>, enrollment: impl Into<String>) -> Self {
        RawPerson {
            name: name.into(),
            enrollment: Some(enrollment.into()),
            origin: None,
        }
    }

    pub fn read_from(mut self, file: impl Into<String>, line: u64) -> Self {
        self.origin = Some(Origin {
            file: file.into(),
            line,
        });
        self
    }
}

/// A user already provisioned in the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformAccount {
    #[serde(rename = "First Name [Required]")]
    pub given_name: String,
    #[serde(rename = "Last Name [Required]")]
    pub surnames: String,
}

impl PlatformAccount {
    pub fn new(given_name: impl Into<String>, surnames: impl Into<String>) -> Self {
        PlatformAccount {
            given_name: given_name.into(),
            surnames: surnames.into(),
        }
    }

    pub fn match_key(&self) -> MatchKey {
        MatchKey::new(&self.given_name, &self.surnames)
    }
}

/// Keys of every account the platform already has.
#[derive(Debug, Default)]
pub struct ExistingAccountSet {
    keys: HashSet<MatchKey>,
}

impl ExistingAccountSet {
    pub fn contains(&self, key: &MatchKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<PlatformAccount> for ExistingAccountSet {
    fn from_iter<I: IntoIterator<Item = PlatformAccount>>(accounts: I) -> Self {
        ExistingAccountSet {
            keys: accounts.into_iter().map(|a| a.match_key()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub domain: String,
    /// Academic year, e.g. `2021-2022`.
    pub year: String,
}

impl Settings {
    pub fn new(domain: impl Into<String>, year: impl Into<String>) -> Self {
        Settings {
            domain: domain.into(),
            year: year.into(),
        }
    }

    /// First calendar year of the academic year.
    fn starting_year(&self) -> &str {
        self.year.split('-').next().unwrap_or_default().trim()
    }
}

/// A row of the bulk-import file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub address: String,
    pub given_name: String,
    pub surnames: String,
    pub org_unit_path: String,
    pub password: String,
    /// Enrolled for the first time this academic year.
    pub new_enrollment: bool,
}

impl Serialize for NewAccount {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("NewAccount", 6)?;
        state.serialize_field(FIRST_NAME, &self.given_name)?;
        state.serialize_field(LAST_NAME, &self.surnames)?;
        state.serialize_field(EMAIL, &self.address)?;
        state.serialize_field(PASSWORD, &self.password)?;
        state.serialize_field(ORG_UNIT_PATH, &self.org_unit_path)?;
        state.serialize_field(CHANGE_PASSWORD, "TRUE")?;
        state.end()
    }
}

/// A roster row that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Zero-based position in the roster passed to [`Registrar::reconcile`].
    pub row: usize,
    /// Where to fix it, when the row came from a file.
    pub origin: Option<Origin>,
    pub raw: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct Reconciliation {
    pub accounts: Vec<NewAccount>,
    pub skipped: Vec<Diagnostic>,
}

pub struct Registrar<R: Rng> {
    existing: ExistingAccountSet,
    settings: Settings,
    credentials: CredentialGenerator<R>,
}

impl<R: Rng> Registrar<R> {
    pub fn new(
        existing: ExistingAccountSet,
        settings: Settings,
        credentials: CredentialGenerator<R>,
    ) -> Self {
        Registrar {
            existing,
            settings,
            credentials,
        }
    }

    /// Accounts to create for the `group` roster, in roster order.
    ///
    /// Rows whose name cannot be parsed are skipped and reported; a group
    /// with no organizational unit fails the whole call.
    pub fn reconcile(
        &mut self,
        group: &str,
        roster: &[RawPerson],
        assignment: &GroupAssignment,
    ) -> Result<Reconciliation> {
        let org_unit_path = assignment.resolve(group, &self.settings.year)?;
        let mut result = Reconciliation::default();
        let mut seen = HashSet::new();

        for (row, raw) in roster.iter().enumerate() {
            let person = match normalize(&raw.name) {
                Ok(person) => person,
                Err(err) => {
                    match &raw.origin {
                        Some(origin) => warn!("{}: {}, skipping", origin, err),
                        None => warn!("row {} of {}: {}, skipping", row, group, err),
                    }
                    result.skipped.push(Diagnostic {
                        row,
                        origin: raw.origin.clone(),
                        raw: raw.name.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            if self.existing.contains(person.match_key()) {
                continue;
            }
            if !seen.insert(person.match_key().clone()) {
                warn!("'{}' is listed twice in {}, skipping repeat", raw.name, group);
                continue;
            }

            let account = self.new_account(&person, raw, &org_unit_path);
            if account.new_enrollment {
                info!("[new enrollment] {} in {}", describe(&account), account.org_unit_path);
            } else {
                info!("{} in {}", describe(&account), account.org_unit_path);
            }
            result.accounts.push(account);
        }

        if result.accounts.is_empty() && !roster.is_empty() {
            warn!("no new accounts for {}", group);
        }
        Ok(result)
    }

    fn new_account(
        &mut self,
        person: &NormalizedPerson,
        raw: &RawPerson,
        org_unit_path: &str,
    ) -> NewAccount {
        let domain = &self.settings.domain;
        let (address, new_enrollment) = match &raw.enrollment {
            Some(enrollment) => (
                address::synthesize_with_suffix(person, enrollment_suffix(enrollment), domain),
                enrollment.split('/').next().map(str::trim) == Some(self.settings.starting_year()),
            ),
            None => (address::synthesize(person, domain), false),
        };

        NewAccount {
            address,
            given_name: person.given_name.clone(),
            surnames: person.surnames(),
            org_unit_path: org_unit_path.to_string(),
            password: self.credentials.generate(),
            new_enrollment,
        }
    }
}

/// Last two characters of an enrollment id.
fn enrollment_suffix(enrollment: &str) -> &str {
    let enrollment = enrollment.trim();
    let start = enrollment
        .char_indices()
        .rev()
        .nth(1)
        .map_or(0, |(index, _)| index);
    &enrollment[start..]
}

fn describe(account: &NewAccount) -> String {
    format!("{} {} ({})", account.given_name, account.surnames, account.address)
}

#[cfg(test)]
use rand::rngs::StdRng;
#[cfg(test)]
use rand::SeedableRng;

#[cfg(test)]
fn registrar(existing: Vec<PlatformAccount>) -> Registrar<StdRng> {
    Registrar::new(
        existing.into_iter().collect(),
        Settings::new("example.org", "2021-2022"),
        CredentialGenerator::new(StdRng::seed_from_u64(1)),
    )
}

#[cfg(test)]
fn manual(group: &str) -> GroupAssignment {
    GroupAssignment::Manual {
        group: group.to_string(),
        path: "Ruta 1A".to_string(),
    }
}

#[test]
fn skips_existing_accounts() {
    let mut registrar = registrar(vec![PlatformAccount::new("Juan", "Pérez")]);
    let roster = vec![RawPerson::new("Pérez, Juan"), RawPerson::new("García, Ana")];

    let result = registrar.reconcile("1-A", &roster, &manual("1-A")).unwrap();

    assert_eq!(result.accounts.len(), 1);
    assert!(result.skipped.is_empty());
    let account = &result.accounts[0];
    assert_eq!(account.given_name, "Ana");
    assert_eq!(account.surnames, "García");
    assert_eq!(account.address, "agarcia@example.org");
    assert_eq!(account.org_unit_path, "/Curso 2021-2022/Ruta 1A");
    assert_eq!(account.password.len(), 8);
    assert!(!account.password.starts_with('0'));
}

#[test]
fn existing_match_ignores_accents_and_case() {
    let mut registrar = registrar(vec![PlatformAccount::new("ANA", " garcia  lopez ")]);
    let roster = vec![RawPerson::new("García López, Ana")];

    let result = registrar.reconcile("1-A", &roster, &manual("1-A")).unwrap();

    assert!(result.accounts.is_empty());
}

#[test]
fn empty_roster() {
    let mut registrar = registrar(vec![]);
    let result = registrar.reconcile("1-A", &[], &manual("1-A")).unwrap();
    assert!(result.accounts.is_empty());
    assert!(result.skipped.is_empty());
}

#[test]
fn keeps_roster_order() {
    let mut registrar = registrar(vec![PlatformAccount::new("Berta", "Sanz")]);
    let roster = vec![
        RawPerson::new("Zapata, Carlos"),
        RawPerson::new("Sanz, Berta"),
        RawPerson::new("Alonso, Diego"),
        RawPerson::new("Moreno, Eva"),
    ];

    let result = registrar.reconcile("1-A", &roster, &manual("1-A")).unwrap();

    let names: Vec<_> = result.accounts.iter().map(|a| a.surnames.as_str()).collect();
    assert_eq!(names, ["Zapata", "Alonso", "Moreno"]);
}

#[test]
fn malformed_rows_are_reported() {
    let mut registrar = registrar(vec![]);
    let roster = vec![
        RawPerson::new("García López Fernández, Ana"),
        RawPerson::new("Ruiz, Pablo"),
    ];

    let result = registrar.reconcile("1-A", &roster, &manual("1-A")).unwrap();

    assert_eq!(result.accounts.len(), 1);
    assert_eq!(result.accounts[0].given_name, "Pablo");
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].row, 0);
    assert_eq!(result.skipped[0].raw, "García López Fernández, Ana");
}

#[test]
fn skipped_rows_point_at_their_file_line() {
    let mut registrar = registrar(vec![]);
    let roster = vec![
        RawPerson::student("Ruiz, Pablo", "2020/000101").read_from("1eso.csv", 2),
        RawPerson::student("Sin coma", "2020/000102").read_from("2eso.csv", 7),
    ];

    let result = registrar.reconcile("1-A", &roster, &manual("1-A")).unwrap();

    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].row, 1);
    let origin = result.skipped[0].origin.as_ref().unwrap();
    assert_eq!(origin.to_string(), "2eso.csv:7");
}

#[test]
fn repeated_roster_entry_emitted_once() {
    let mut registrar = registrar(vec![]);
    let roster = vec![RawPerson::new("Ruiz, Pablo"), RawPerson::new("RUIZ,  Pablo")];

    let result = registrar.reconcile("1-A", &roster, &manual("1-A")).unwrap();

    assert_eq!(result.accounts.len(), 1);
}

#[test]
fn unknown_group_fails() {
    let mapping = GroupMapping::new(vec![("1-A".to_string(), "Ruta A".to_string())]).unwrap();
    let mut registrar = registrar(vec![]);

    let err = registrar
        .reconcile("1-C", &[RawPerson::new("Ruiz, Pablo")], &GroupAssignment::Mapping(mapping))
        .unwrap_err();

    assert!(matches!(err, RegistrarError::UnknownGroup(group) if group == "1-C"));
}

#[test]
fn student_address_and_enrollment() {
    let mut registrar = registrar(vec![]);
    let roster = vec![
        RawPerson::student("Gómez Ruiz, Lucía", "2021/004556"),
        RawPerson::student("Vidal, Marcos", "2018/000312"),
    ];

    let result = registrar.reconcile("1-A", &roster, &manual("1-A")).unwrap();

    assert_eq!(result.accounts[0].address, "lgomez56@example.org");
    assert!(result.accounts[0].new_enrollment);
    assert_eq!(result.accounts[1].address, "mvidal12@example.org");
    assert!(!result.accounts[1].new_enrollment);
}

#[test]
fn repeated_runs_agree_except_passwords() {
    let existing = vec![PlatformAccount::new("Juan", "Pérez")];
    let roster = vec![RawPerson::new("Pérez, Juan"), RawPerson::new("García, Ana")];

    let first = registrar(existing.clone())
        .reconcile("1-A", &roster, &manual("1-A"))
        .unwrap();
    let mut second = Registrar::new(
        existing.into_iter().collect(),
        Settings::new("example.org", "2021-2022"),
        CredentialGenerator::new(StdRng::seed_from_u64(99)),
    );
    let second = second.reconcile("1-A", &roster, &manual("1-A")).unwrap();

    let strip = |accounts: &[NewAccount]| -> Vec<(String, String)> {
        accounts
            .iter()
            .map(|a| (a.address.clone(), a.org_unit_path.clone()))
            .collect()
    };
    assert_eq!(strip(&first.accounts), strip(&second.accounts));
}

#[test]
fn serializes_import_schema() {
    let account = NewAccount {
        address: "agarcia@example.org".to_string(),
        given_name: "Ana".to_string(),
        surnames: "García López".to_string(),
        org_unit_path: "/Curso 2021-2022/Ruta A".to_string(),
        password: "12345678".to_string(),
        new_enrollment: false,
    };
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.serialize(&account).unwrap();
    let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();

    assert_eq!(
        output,
        "First Name [Required],Last Name [Required],Email Address [Required],\
         Password [Required],Org Unit Path [Required],Change Password at Next Sign-In\n\
         Ana,García López,agarcia@example.org,12345678,/Curso 2021-2022/Ruta A,TRUE\n"
    );
}
