//! Command-line front end for the Swaasthya client

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use swaasthya_client::{
    App, AppOptions, ClientError, CreateAppointmentRequest, Doctor, ListState, SearchState, UpdateAppointmentRequest,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Connection settings come from the environment: `API_BASE_URL`,
/// `FIREBASE_API_KEY`, and optionally `REQUEST_TIMEOUT_SECS` and `PAGE_SIZE`.
#[derive(Parser, Debug)]
#[command(name = "swaasthya", version, about = "Browse doctors and manage appointments")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the backend
    Health,
    /// List doctors page by page
    Doctors {
        /// Only this specialization
        #[arg(long)]
        specialization: Option<String>,
        /// How many pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Search doctors by name or specialization
    Search {
        /// Free-text query
        #[arg(default_value = "")]
        query: String,
        /// Specialization filter
        #[arg(long, default_value = "")]
        specialization: String,
    },
    /// List your appointments
    Appointments {
        #[command(flatten)]
        login: Login,
    },
    /// Book an appointment
    Book {
        #[command(flatten)]
        login: Login,
        /// Doctor ID
        #[arg(long)]
        doctor: Uuid,
        /// Appointment date (RFC 3339, e.g. 2024-06-01T09:00:00Z)
        #[arg(long)]
        date: DateTime<Utc>,
        /// Slot label
        #[arg(long)]
        slot: String,
        /// Notes for the doctor
        #[arg(long)]
        notes: Option<String>,
    },
    /// Move an appointment to a new date and slot
    Reschedule {
        #[command(flatten)]
        login: Login,
        /// Appointment ID
        id: Uuid,
        /// New date (RFC 3339)
        #[arg(long)]
        date: DateTime<Utc>,
        /// New slot label
        #[arg(long)]
        slot: String,
    },
    /// Cancel an appointment
    Cancel {
        #[command(flatten)]
        login: Login,
        /// Appointment ID
        id: Uuid,
    },
}

#[derive(Args, Debug)]
struct Login {
    /// Account email
    #[arg(long, env = "SWAASTHYA_EMAIL")]
    email: String,
    /// Account password
    #[arg(long, env = "SWAASTHYA_PASSWORD", hide_env_values = true)]
    password: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, ClientError> {
    let app = App::new(AppOptions::from_env()?)?;

    match cli.command {
        Command::Health => {
            let health = app.api().health_check().await?;
            println!("{} {}", health.status, health.message.unwrap_or_default());
        }
        Command::Doctors { specialization, pages } => {
            let list = app.doctors().list();
            list.load(1, specialization).await?;
            for _ in 1..pages {
                if !list.load_more().await? {
                    break;
                }
            }
            if let ListState::Success { items, pagination } = list.state() {
                items.iter().for_each(print_doctor);
                println!("-- page {} of {} ({} total)", pagination.page, pagination.total_pages, pagination.total);
            }
        }
        Command::Search { query, specialization } => match app.doctors().search(&query, &specialization).await {
            SearchState::Success(doctors) => doctors.iter().for_each(print_doctor),
            SearchState::Error(message) => {
                error!(%message, "search failed");
                return Ok(ExitCode::FAILURE);
            }
            _ => println!("Nothing to search for"),
        },
        Command::Appointments { login } => {
            sign_in(&app, &login).await?;
            app.appointments().list().load(1, None).await?;
            print_appointments(&app);
        }
        Command::Book {
            login,
            doctor,
            date,
            slot,
            notes,
        } => {
            sign_in(&app, &login).await?;
            let mut request = CreateAppointmentRequest::new(doctor, date, slot);
            request.notes = notes;
            let booked = app.appointments().book(&request).await?;
            info!(appointment_id = %booked.appointment_id, "booked");
            println!("Booked {} on {} at {}", booked.appointment_id, booked.appointment_date, booked.appointment_time);
        }
        Command::Reschedule { login, id, date, slot } => {
            sign_in(&app, &login).await?;
            app.appointments()
                .update(id, &UpdateAppointmentRequest::reschedule(date, slot))
                .await?;
            print_appointments(&app);
        }
        Command::Cancel { login, id } => {
            sign_in(&app, &login).await?;
            app.appointments().cancel(id).await?;
            println!("Cancelled {}", id);
        }
    }

    app.session().sign_out().await;
    Ok(ExitCode::SUCCESS)
}

async fn sign_in(app: &App, login: &Login) -> Result<(), ClientError> {
    let user = app.session().sign_in(&login.email, &login.password).await?;
    info!(uid = %user.uid, "signed in");
    Ok(())
}

fn print_doctor(doctor: &Doctor) {
    println!(
        "{}  {:<24} {:<18} {} yrs",
        doctor.id,
        doctor.name().unwrap_or("-"),
        doctor.specialization,
        doctor.experience
    );
}

fn print_appointments(app: &App) {
    for a in app.appointments().state().items() {
        println!(
            "{}  {}  {:<6} {}",
            a.id,
            a.appointment_date.format("%Y-%m-%d"),
            a.slot,
            a.status
        );
    }
}
