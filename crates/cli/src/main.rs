use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use clinic_core::config::time_from_env_value;
use clinic_core::constants::{DATE_FORMAT, DEFAULT_SLOT_MINUTES, DEFAULT_WORK_END, DEFAULT_WORK_START};
use clinic_core::directory::PasswordDigest;
use clinic_core::scheduling::generate_day_slots;
use clinic_core::{ClinicDirectory, RecordId, SlotPolicy};
use clinic_ids::Uuid;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic sessions and scheduling CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the slot grid of a day
    Slots {
        /// Day (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Start of the working window (HH:MM)
        #[arg(long, default_value = DEFAULT_WORK_START)]
        start: String,
        /// End of the working window (HH:MM)
        #[arg(long, default_value = DEFAULT_WORK_END)]
        end: String,
        /// Slot width in minutes
        #[arg(long, default_value_t = DEFAULT_SLOT_MINUTES)]
        minutes: u32,
    },
    /// Print a salted password digest for a seed file
    HashPassword {
        /// Password to digest
        password: String,
        /// Salt to use instead of a random one
        #[arg(long)]
        salt: Option<String>,
    },
    /// Load a seed file and report what it contains
    CheckSeed {
        /// Path to the YAML seed
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Slots {
            date,
            start,
            end,
            minutes,
        }) => {
            let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
                .map_err(|_| format!("--date must be YYYY-MM-DD, got '{date}'"))?;
            let policy = SlotPolicy::new(
                time_from_env_value("--start", &start)?,
                time_from_env_value("--end", &end)?,
                minutes,
            )?;
            // The grid is the same for every doctor.
            let slots = generate_day_slots(RecordId::from(Uuid::nil()), date, &policy);
            println!("{} ({} slots)", date.format(DATE_FORMAT), slots.len());
            for slot in slots {
                println!("  {}-{}", slot.label(), slot.end().format("%H:%M"));
            }
        }
        Some(Commands::HashPassword { password, salt }) => {
            let digest = match salt {
                Some(salt) => PasswordDigest::with_salt(&salt, &password),
                None => PasswordDigest::generate(&password),
            };
            println!("password_salt: {}", digest.salt());
            println!("password_sha256: {}", digest.sha256());
        }
        Some(Commands::CheckSeed { file }) => match ClinicDirectory::load(&file) {
            Ok(directory) => println!(
                "{}: {} accounts, {} doctors",
                file.display(),
                directory.account_count(),
                directory.doctor_count()
            ),
            Err(e) => {
                eprintln!("Error loading seed {}: {}", file.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            println!("Use 'clinic --help' for commands");
        }
    }

    Ok(())
}
