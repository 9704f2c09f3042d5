use clap::{ArgGroup, Parser, Subcommand};
use log::error;
use std::path::PathBuf;

use registrar::provision::{provision_students, provision_teachers};
use registrar::{io, CredentialGenerator, GroupAssignment, Registrar, RegistrarError, Settings};

/// Builds bulk-import CSV files for accounts missing from the platform
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// User export downloaded from the platform
    platform_csv: PathBuf,
    /// School domain, e.g. iesinsti.com
    domain: String,
    /// Academic year, e.g. 2021-2022
    year: String,
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// New teacher accounts from the records system's teacher export
    Teachers {
        roster_csv: PathBuf,
        #[arg(short, long, default_value = "new_teachers.csv")]
        output: PathBuf,
    },
    /// New student accounts, one file per group
    Students(StudentArgs),
}

#[derive(Debug, clap::Args)]
#[command(group(ArgGroup::new("assignment").required(true).args(["mapping", "manual"])))]
struct StudentArgs {
    /// Directory holding the student exports
    #[arg(short, long, default_value = "students")]
    dir: PathBuf,
    /// CSV of organizational path and group pairs
    #[arg(short, long)]
    mapping: Option<PathBuf>,
    /// Single group and its organizational path
    #[arg(short = 'g', long, num_args = 2, value_names = ["GROUP", "PATH"])]
    manual: Option<Vec<String>>,
    /// Directory for the generated files
    #[arg(short, long, default_value = "new-students")]
    output: PathBuf,
}

impl StudentArgs {
    fn assignment(&self) -> registrar::Result<GroupAssignment> {
        match (&self.mapping, self.manual.as_deref()) {
            (Some(path), None) => Ok(GroupAssignment::Mapping(io::read_mapping(path)?)),
            (None, Some([group, path])) => Ok(GroupAssignment::Manual {
                group: group.clone(),
                path: path.clone(),
            }),
            _ => Err(RegistrarError::AssignmentMode),
        }
    }
}

fn run(cli: Cli) -> registrar::Result<()> {
    let existing = io::load_platform_accounts(&cli.platform_csv)?;
    let mut registrar = Registrar::new(
        existing,
        Settings::new(cli.domain, cli.year),
        CredentialGenerator::from_entropy(),
    );

    match cli.action {
        Action::Teachers { roster_csv, output } => {
            let roster = io::read_teachers(&roster_csv)?;
            provision_teachers(&mut registrar, &roster, &output)?;
        }
        Action::Students(args) => {
            let assignment = args.assignment()?;
            let roster = io::load_student_roster(&args.dir)?;
            provision_students(&mut registrar, &roster, &assignment, &args.output)?;
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        error!("{}", err);
        std::process::exit(1);
    }
}
