use clap::{Parser, Subcommand};
use std::path::PathBuf;

use api_shared::RegisterDoctorReq;
use clinic_core::auth::AuthService;
use clinic_core::repositories::doctors::DoctorService;
use clinic_core::repositories::patients::PatientService;
use clinic_core::{config, db, ClinicError, Database};

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic backend administration CLI")]
struct Cli {
    /// SQLite database file (overrides CLINIC_DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database if needed and apply pending migrations
    Migrate,
    /// Create a doctor account
    CreateDoctor {
        /// Full name
        name: String,
        /// Login e-mail address
        email: String,
        /// Specialization shown in the directory
        specialization: String,
        /// Initial password (at least 8 characters)
        #[arg(long)]
        password: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        qualification: Option<String>,
        #[arg(long)]
        experience_years: Option<i64>,
        /// Consultation fee
        #[arg(long)]
        fee: Option<f64>,
    },
    /// List all doctors, active or not
    ListDoctors,
    /// Allow a doctor to sign in and appear in the directory
    ActivateDoctor { id: i64 },
    /// Block a doctor from signing in and hide them from the directory
    DeactivateDoctor { id: i64 },
    /// List registered patients
    ListPatients,
    /// Delete tokens past their expiry time
    PruneTokens,
}

fn open_database(cli: &Cli) -> Result<(config::CoreConfig, Database), ClinicError> {
    let cfg = config::from_environment()?;
    let path = cli
        .database
        .clone()
        .unwrap_or_else(|| cfg.database_path().to_path_buf());
    let db = Database::open(&path)?;
    Ok((cfg, db))
}

/// Flatten field errors into one line per message for the terminal.
fn describe(err: &ClinicError) -> String {
    match err {
        ClinicError::Validation(errors) => errors
            .as_map()
            .iter()
            .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{field}: {m}")))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = &cli.command else {
        println!("Use 'clinic --help' for commands");
        return Ok(());
    };
    let (cfg, db) = open_database(&cli)?;

    match command {
        Commands::Migrate => {
            let version = db::current_version(&*db.lock()?);
            println!("Database schema is at version {version}");
        }
        Commands::CreateDoctor {
            name,
            email,
            specialization,
            password,
            phone,
            qualification,
            experience_years,
            fee,
        } => {
            let req = RegisterDoctorReq {
                name: Some(name.clone()),
                email: Some(email.clone()),
                password: Some(password.clone()),
                password_confirmation: Some(password.clone()),
                specialization: Some(specialization.clone()),
                phone: phone.clone(),
                qualification: qualification.clone(),
                experience_years: *experience_years,
                consultation_fee: *fee,
                bio: None,
            };
            match AuthService::new(db.clone(), cfg.token_ttl()).create_doctor(&req) {
                Ok(doctor) => println!(
                    "Created doctor {} <{}> with ID: {}",
                    doctor.name, doctor.email, doctor.id
                ),
                Err(e) => eprintln!("Error creating doctor:\n{}", describe(&e)),
            }
        }
        Commands::ListDoctors => {
            let doctors = DoctorService::new(db.clone()).list_all()?;
            if doctors.is_empty() {
                println!("No doctors found.");
            }
            for doctor in doctors {
                println!(
                    "ID: {}, Name: {}, Email: {}, Specialization: {}, Active: {}",
                    doctor.id, doctor.name, doctor.email, doctor.specialization, doctor.is_active
                );
            }
        }
        Commands::ActivateDoctor { id } | Commands::DeactivateDoctor { id } => {
            let active = matches!(command, Commands::ActivateDoctor { .. });
            match DoctorService::new(db.clone()).set_active(*id, active) {
                Ok(doctor) => println!(
                    "Doctor {} is now {}",
                    doctor.id,
                    if doctor.is_active { "active" } else { "inactive" }
                ),
                Err(e) => eprintln!("Error updating doctor {id}: {}", describe(&e)),
            }
        }
        Commands::ListPatients => {
            let patients = PatientService::new(db.clone()).list()?;
            if patients.is_empty() {
                println!("No patients found.");
            }
            for patient in patients {
                println!(
                    "ID: {}, Name: {}, Email: {}, Created: {}",
                    patient.id, patient.name, patient.email, patient.created_at
                );
            }
        }
        Commands::PruneTokens => {
            let removed = AuthService::new(db.clone(), cfg.token_ttl()).prune_expired_tokens()?;
            println!("Removed {removed} expired token(s)");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_create_doctor() {
        let cli = Cli::try_parse_from([
            "clinic",
            "create-doctor",
            "Dr Ada",
            "ada@example.com",
            "Cardiology",
            "--password",
            "correct horse",
            "--fee",
            "45.5",
        ])
        .unwrap();
        let Some(Commands::CreateDoctor { email, fee, phone, .. }) = cli.command else {
            panic!("expected create-doctor");
        };
        assert_eq!(email, "ada@example.com");
        assert_eq!(fee, Some(45.5));
        assert_eq!(phone, None);
    }

    #[test]
    fn validation_errors_are_listed_per_field() {
        let err = ClinicError::field("email", "The email has already been taken.");
        assert_eq!(describe(&err), "email: The email has already been taken.");
    }
}
