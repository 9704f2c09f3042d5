use std::collections::HashMap;

use crate::error::{RegistrarError, Result};

/// Organizational path every teacher account lands in.
pub const TEACHERS_UNIT: &str = "Profesores";

/// Where the accounts of a group go.
#[derive(Debug, Clone)]
pub enum GroupAssignment {
    /// One group given on the command line; every record gets its path.
    Manual { group: String, path: String },
    /// Paths looked up per group from a mapping file.
    Mapping(GroupMapping),
}

impl GroupAssignment {
    pub fn teachers() -> Self {
        GroupAssignment::Manual {
            group: TEACHERS_UNIT.to_string(),
            path: TEACHERS_UNIT.to_string(),
        }
    }

    /// Organizational-unit path for `group` in the given academic year.
    pub fn resolve(&self, group: &str, year: &str) -> Result<String> {
        let path = match self {
            GroupAssignment::Manual { path, .. } => path.as_str(),
            GroupAssignment::Mapping(mapping) => mapping
                .path_for(group)
                .ok_or_else(|| RegistrarError::UnknownGroup(group.to_string()))?,
        };
        Ok(org_unit_path(year, path))
    }
}

/// Group identifier to organizational path, keeping the file's row order.
#[derive(Debug, Clone)]
pub struct GroupMapping {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl GroupMapping {
    /// Builds the lookup from `(group, path)` pairs. A group listed twice is
    /// rejected.
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let mut entries = Vec::new();
        let mut index = HashMap::new();
        for (group, path) in pairs {
            if index.insert(group.clone(), entries.len()).is_some() {
                return Err(RegistrarError::DuplicateGroup(group));
            }
            entries.push((group, path));
        }
        Ok(GroupMapping { entries, index })
    }

    pub fn path_for(&self, group: &str) -> Option<&str> {
        self.index
            .get(group)
            .map(|&position| self.entries[position].1.as_str())
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(group, _)| group.as_str())
    }
}

pub fn org_unit_path(year: &str, path: &str) -> String {
    format!("/Curso {}/{}", year, path.trim_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> GroupMapping {
        GroupMapping::new(vec![
            ("1-A".to_string(), "Ruta A".to_string()),
            ("1-B".to_string(), "Ruta B".to_string()),
        ])
        .unwrap()
    }

    #[test]
    fn mapping_lookup() {
        let assignment = GroupAssignment::Mapping(mapping());
        let path = assignment.resolve("1-B", "2021-2022").unwrap();
        assert!(path.contains("Ruta B"));
        assert!(path.contains("2021-2022"));
        assert_eq!(path, "/Curso 2021-2022/Ruta B");
    }

    #[test]
    fn mapping_unknown_group() {
        let assignment = GroupAssignment::Mapping(mapping());
        let err = assignment.resolve("1-C", "2021-2022").unwrap_err();
        assert!(matches!(err, RegistrarError::UnknownGroup(group) if group == "1-C"));
    }

    #[test]
    fn mapping_rejects_duplicates() {
        let err = GroupMapping::new(vec![
            ("1-A".to_string(), "Ruta A".to_string()),
            ("1-A".to_string(), "Otra".to_string()),
        ])
        .unwrap_err();
        assert!(matches!(err, RegistrarError::DuplicateGroup(group) if group == "1-A"));
    }

    #[test]
    fn mapping_keeps_order() {
        let groups: Vec<_> = mapping().groups().map(str::to_string).collect();
        assert_eq!(groups, ["1-A", "1-B"]);
    }

    #[test]
    fn manual_ignores_group() {
        let assignment = GroupAssignment::Manual {
            group: "2-BC".to_string(),
            path: "Alumnos/2 Bachillerato C".to_string(),
        };
        assert_eq!(
            assignment.resolve("anything", "2021-2022").unwrap(),
            "/Curso 2021-2022/Alumnos/2 Bachillerato C"
        );
    }

    #[test]
    fn teachers_unit() {
        assert_eq!(
            GroupAssignment::teachers().resolve("", "2021-2022").unwrap(),
            "/Curso 2021-2022/Profesores"
        );
    }
}
