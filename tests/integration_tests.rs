use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use registrar::io::{load_platform_accounts, load_student_roster, read_mapping, read_teachers};
use registrar::provision::{provision_students, provision_teachers};
use registrar::{
    CredentialGenerator, GroupAssignment, PlatformAccount, RawPerson, Registrar, RegistrarError,
    Settings,
};

const PLATFORM: &str = "\
First Name [Required],Last Name [Required],Email Address [Required],Org Unit Path [Required]
Juan,Pérez,jperez@example.org,/Curso 2020-2021/Profesores
Lucía,Gómez Ruiz,lgomez12@example.org,/Curso 2020-2021/1 ESO A
";

fn registrar(platform: &Path) -> Registrar<StdRng> {
    Registrar::new(
        load_platform_accounts(platform).unwrap(),
        Settings::new("example.org", "2021-2022"),
        CredentialGenerator::new(StdRng::seed_from_u64(3)),
    )
}

fn rows(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

fn latin1(text: &str) -> Vec<u8> {
    text.chars().map(|c| c as u32 as u8).collect()
}

#[test]
fn sanity() {
    let mut registrar = Registrar::new(
        vec![PlatformAccount::new("Juan", "Pérez")].into_iter().collect(),
        Settings::new("example.org", "2021-2022"),
        CredentialGenerator::new(StdRng::seed_from_u64(0)),
    );
    let roster = vec![RawPerson::new("Pérez, Juan"), RawPerson::new("García, Ana")];
    let assignment = GroupAssignment::Manual {
        group: "1-A".to_string(),
        path: "Ruta A".to_string(),
    };

    let result = registrar.reconcile("1-A", &roster, &assignment).unwrap();

    assert_eq!(result.accounts.len(), 1);
    let account = &result.accounts[0];
    assert!(account.address.contains("garcia"));
    assert!(account.address.starts_with('a'));
    assert!(account.org_unit_path.contains("Ruta A"));
    assert!(account.org_unit_path.contains("2021-2022"));
    assert_eq!(account.password.len(), 8);
    assert!(account.password.chars().all(|c| c.is_ascii_digit()));
    assert!(!account.password.starts_with('0'));
}

#[test]
fn teachers_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let platform = dir.path().join("platform.csv");
    fs::write(&platform, PLATFORM).unwrap();
    let roster_csv = dir.path().join("profesores.csv");
    fs::write(
        &roster_csv,
        latin1(
            "Profesor,Materia\n\
             \"Pérez, Juan\",Matemáticas\n\
             \"Núñez Díaz, Begoña\",Lengua\n\
             \"De la Fuente Ruiz, Pilar\",Física\n",
        ),
    )
    .unwrap();
    let output = dir.path().join("out").join("new_teachers.csv");

    let mut registrar = registrar(&platform);
    let roster = read_teachers(&roster_csv).unwrap();
    let result = provision_teachers(&mut registrar, &roster, &output).unwrap();

    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].raw, "De la Fuente Ruiz, Pilar");
    let origin = result.skipped[0].origin.as_ref().unwrap();
    assert_eq!(origin.line, 4);
    assert!(origin.file.ends_with("profesores.csv"));
    let written = rows(&output);
    assert_eq!(written.len(), 1);
    assert_eq!(written[0][0], "Begoña");
    assert_eq!(written[0][1], "Núñez Díaz");
    assert_eq!(written[0][2], "bnunez@example.org");
    assert_eq!(written[0][4], "/Curso 2021-2022/Profesores");
    assert_eq!(written[0][5], "TRUE");
}

#[test]
fn students_with_mapping_file() {
    let dir = tempfile::tempdir().unwrap();
    let platform = dir.path().join("platform.csv");
    fs::write(&platform, PLATFORM).unwrap();
    let students = dir.path().join("students");
    fs::create_dir(&students).unwrap();
    fs::write(
        students.join("1eso.csv"),
        "Alumno,Unidad,Matrícula\n\
         \"Gómez Ruiz, Lucía\",1º ESO A,2020/000112\n\
         \"Vidal, Marcos\",1º ESO A,2021/004556\n",
    )
    .unwrap();
    fs::write(
        students.join("2eso.csv"),
        "Alumno,Unidad,Matrícula\n\
         \"Gómez Ruiz, Lucía\",1º ESO A,2020/000112\n\
         \"Sanz, Eva\",2º ESO B,2019/000301\n",
    )
    .unwrap();
    fs::write(students.join("notes.txt"), "ignored").unwrap();
    let mapping = dir.path().join("mapping.csv");
    fs::write(
        &mapping,
        "Alumnos/1 ESO A,1-ESOA\nAlumnos/2 ESO B,2-ESOB\nAlumnos/3 ESO C,3-ESOC\n",
    )
    .unwrap();
    let output = dir.path().join("new-students");

    let mut registrar = registrar(&platform);
    let roster = load_student_roster(&students).unwrap();
    let assignment = GroupAssignment::Mapping(read_mapping(&mapping).unwrap());
    let reports = provision_students(&mut registrar, &roster, &assignment, &output).unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].group, "1-ESOA");
    let first = &reports[0].reconciliation.accounts;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].address, "mvidal56@example.org");
    assert!(first[0].new_enrollment);

    let written = rows(&output.join("1-ESOA.csv"));
    assert_eq!(written.len(), 1);
    assert_eq!(written[0][4], "/Curso 2021-2022/Alumnos/1 ESO A");
    let written = rows(&output.join("2-ESOB.csv"));
    assert_eq!(written[0][2], "esanz01@example.org");
    assert!(!output.join("3-ESOC.csv").exists());
}

#[test]
fn students_group_without_new_accounts_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let platform = dir.path().join("platform.csv");
    fs::write(&platform, PLATFORM).unwrap();
    let students = dir.path().join("students");
    fs::create_dir(&students).unwrap();
    fs::write(
        students.join("1eso.csv"),
        "Alumno,Unidad,Matrícula\n\"GÓMEZ RUIZ, LUCIA\",1º ESO A,2020/000112\n",
    )
    .unwrap();
    let output = dir.path().join("new-students");

    let mut registrar = registrar(&platform);
    let roster = load_student_roster(&students).unwrap();
    let assignment = GroupAssignment::Manual {
        group: "1-ESOA".to_string(),
        path: "Alumnos/1 ESO A".to_string(),
    };
    let reports = provision_students(&mut registrar, &roster, &assignment, &output).unwrap();

    assert_eq!(reports.len(), 1);
    assert!(reports[0].written.is_none());
    assert!(!output.join("1-ESOA.csv").exists());
}

#[test]
fn unmapped_group_stops_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let platform = dir.path().join("platform.csv");
    fs::write(&platform, PLATFORM).unwrap();
    let students = dir.path().join("students");
    fs::create_dir(&students).unwrap();
    fs::write(
        students.join("all.csv"),
        "Alumno,Unidad,Matrícula\n\
         \"Vidal, Marcos\",1º ESO A,2021/004556\n\
         \"Sanz, Eva\",4º ESO D,2019/000301\n",
    )
    .unwrap();
    let mapping = dir.path().join("mapping.csv");
    fs::write(&mapping, "Alumnos/1 ESO A,1-ESOA\n").unwrap();
    let output = dir.path().join("new-students");

    let mut registrar = registrar(&platform);
    let roster = load_student_roster(&students).unwrap();
    let assignment = GroupAssignment::Mapping(read_mapping(&mapping).unwrap());
    let err = provision_students(&mut registrar, &roster, &assignment, &output).unwrap_err();

    assert!(matches!(err, RegistrarError::UnknownGroup(group) if group == "4-ESOD"));
    assert!(!output.exists());
}

#[test]
fn manual_group_missing_from_roster() {
    let dir = tempfile::tempdir().unwrap();
    let platform = dir.path().join("platform.csv");
    fs::write(&platform, PLATFORM).unwrap();
    let students = dir.path().join("students");
    fs::create_dir(&students).unwrap();

    let mut registrar = registrar(&platform);
    let roster = load_student_roster(&students).unwrap();
    let assignment = GroupAssignment::Manual {
        group: "2-BC".to_string(),
        path: "Bachillerato".to_string(),
    };
    let err =
        provision_students(&mut registrar, &roster, &assignment, &dir.path().join("out"))
            .unwrap_err();

    assert!(matches!(err, RegistrarError::GroupNotInRoster(group) if group == "2-BC"));
}

#[test]
fn duplicate_mapping_rows_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mapping = dir.path().join("mapping.csv");
    fs::write(&mapping, "Alumnos/1 ESO A,1-ESOA\nOtra ruta,1-ESOA\n").unwrap();

    let err = read_mapping(&mapping).unwrap_err();

    assert!(matches!(err, RegistrarError::DuplicateGroup(group) if group == "1-ESOA"));
}
