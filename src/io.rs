//! Reading the exports and writing the import files.
//!
//! Rows are turned into typed records here so nothing past this module looks
//! at columns by position.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use log::debug;

use crate::error::{RegistrarError, Result};
use crate::org_unit::GroupMapping;
use crate::{ExistingAccountSet, NewAccount, PlatformAccount, RawPerson};

/// Students of one group, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterGroup {
    pub group: String,
    pub people: Vec<RawPerson>,
}

/// Student rosters split by group, in the order groups first appear.
#[derive(Debug, Default)]
pub struct StudentRoster {
    groups: Vec<RosterGroup>,
}

impl StudentRoster {
    pub fn push(&mut self, group: String, person: RawPerson) {
        match self.groups.iter_mut().find(|g| g.group == group) {
            Some(existing) => existing.people.push(person),
            None => self.groups.push(RosterGroup {
                group,
                people: vec![person],
            }),
        }
    }

    pub fn get(&self, group: &str) -> Option<&RosterGroup> {
        self.groups.iter().find(|g| g.group == group)
    }

    pub fn groups(&self) -> &[RosterGroup] {
        &self.groups
    }
}

/// `2º BC` → `2-BC`.
pub fn group_identifier(course: &str) -> String {
    let mut identifier = String::with_capacity(course.len());
    let mut chars = course.trim().chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            'º' | 'ª' | '°' => {
                while chars.next_if(|c| c.is_whitespace()).is_some() {}
                identifier.push('-');
            }
            c if c.is_whitespace() => {}
            c => identifier.push(c),
        }
    }
    identifier
}

/// Existing platform users, from the platform's own user export.
pub fn read_platform_accounts<R: Read>(source: R) -> Result<ExistingAccountSet> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(source);
    let accounts = reader
        .deserialize::<PlatformAccount>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(accounts.into_iter().collect())
}

pub fn load_platform_accounts(path: &Path) -> Result<ExistingAccountSet> {
    let existing = read_platform_accounts(fs::File::open(path)?)?;
    debug!("{} existing accounts in {}", existing.len(), path.display());
    Ok(existing)
}

/// Teacher roster: name and subject, the subject is dropped.
pub fn read_teachers(path: &Path) -> Result<Vec<RawPerson>> {
    let text = read_text(path)?;
    let mut teachers = Vec::new();
    for record in roster_reader(&text).records() {
        let record = record?;
        let name = field(&record, 0, "name", path)?;
        let person = RawPerson::new(name).read_from(path.display().to_string(), line(&record));
        teachers.push(person);
    }
    Ok(teachers)
}

/// Adds the rows of one student roster file to `roster`.
pub fn read_students(path: &Path, roster: &mut StudentRoster) -> Result<()> {
    let text = read_text(path)?;
    for record in roster_reader(&text).records() {
        let record = record?;
        let name = field(&record, 0, "name", path)?;
        let course = field(&record, 1, "course", path)?;
        let enrollment = field(&record, 2, "enrollment", path)?;
        let person = RawPerson::student(name, enrollment)
            .read_from(path.display().to_string(), line(&record));
        roster.push(group_identifier(course), person);
    }
    Ok(())
}

/// All `*.csv` files in `dir`, sorted by name.
pub fn student_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "csv") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn load_student_roster(dir: &Path) -> Result<StudentRoster> {
    let mut roster = StudentRoster::default();
    for path in student_csv_files(dir)? {
        debug!("reading students from {}", path.display());
        read_students(&path, &mut roster)?;
    }
    Ok(roster)
}

/// Mapping file rows are `organizational path, group identifier`, no header.
pub fn read_mapping(path: &Path) -> Result<GroupMapping> {
    let text = read_text(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record?;
        let org_path = field(&record, 0, "path", path)?;
        let group = field(&record, 1, "group", path)?;
        pairs.push((group.to_string(), org_path.to_string()));
    }
    GroupMapping::new(pairs)
}

pub fn write_accounts<W: Write>(accounts: &[NewAccount], target: W) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(target);
    if accounts.is_empty() {
        writer.write_record([
            crate::FIRST_NAME,
            crate::LAST_NAME,
            crate::EMAIL,
            crate::PASSWORD,
            crate::ORG_UNIT_PATH,
            crate::CHANGE_PASSWORD,
        ])?;
    }
    for account in accounts {
        writer.serialize(account)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_accounts_file(path: &Path, accounts: &[NewAccount]) -> Result<()> {
    write_accounts(accounts, fs::File::create(path)?)
}

/// Roster exports come out of the records system as Latin-1.
fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().iter().map(|&b| b as char).collect(),
    })
}

fn roster_reader(text: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes())
}

fn field<'r>(
    record: &'r StringRecord,
    index: usize,
    column: &'static str,
    path: &Path,
) -> Result<&'r str> {
    record.get(index).ok_or_else(|| RegistrarError::MissingColumn {
        file: path.display().to_string(),
        row: line(record),
        column,
    })
}

fn line(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}
