use anyhow::Context;
use clap::{Parser, Subcommand};
use claim_core::config::{
    ai_config_from_env_values, fhir_base_url_from_env_value, smart_config_from_env_values,
};
use claim_core::{
    load_patient, CannedTextGenerator, ClaimDriver, ClaimWriter, CoreConfig, FhirClient,
    GeminiClient, GenerationState, HttpFhirClient, PatientRecord, Session, StaticFhirClient,
    TextGenerator,
};
use fhir::{parse_bundle_str, Patient, PatientData, PatientId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "claim")]
#[command(about = "Clinical claim wizard CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a FHIR Bundle file for one patient
    Parse {
        /// Bundle JSON file
        bundle: PathBuf,
        /// Patient id to extract
        #[arg(long)]
        patient: String,
    },
    /// Look up a patient on the FHIR server
    Lookup {
        /// Patient id
        patient: String,
        /// Read `$everything` from this Bundle file instead of the server
        #[arg(long)]
        bundle: Option<PathBuf>,
    },
    /// Run a whole claim for a patient
    Submit {
        /// Patient id
        patient: String,
        /// Encounter the claim is for
        #[arg(long)]
        encounter: String,
        /// Diagnosis to include (repeatable)
        #[arg(long = "condition", required = true)]
        conditions: Vec<String>,
        /// Procedure to include (repeatable)
        #[arg(long = "procedure", required = true)]
        procedures: Vec<String>,
        /// Read `$everything` from this Bundle file instead of the server
        #[arg(long)]
        bundle: Option<PathBuf>,
        /// Use fixed text instead of the text generation service
        #[arg(long)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("claim=warn".parse()?)
                .add_directive("fhir=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { bundle, patient } => {
            let id = PatientId::new(&patient)?;
            let text = read_file(&bundle)?;
            let parsed = parse_bundle_str(&text, &id)?;
            match &parsed.patient {
                Some(patient) => print_patient(patient),
                None => println!("No Patient with ID \"{id}\" in bundle."),
            }
            print_data(&parsed.data);
        }
        Commands::Lookup { patient, bundle } => {
            let id = PatientId::new(&patient)?;
            let client = fhir_client(&id, bundle.as_deref())?;
            let record = load_patient(client.as_ref(), &id)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            print_record(&record);
        }
        Commands::Submit {
            patient,
            encounter,
            conditions,
            procedures,
            bundle,
            offline,
        } => {
            let id = PatientId::new(&patient)?;
            let client = fhir_client(&id, bundle.as_deref())?;
            let generator: Arc<dyn TextGenerator> = if offline {
                Arc::new(CannedTextGenerator)
            } else {
                Arc::new(GeminiClient::new(core_config_from_env()?.ai())?)
            };

            let mut driver = ClaimDriver::new(Session::new(client), ClaimWriter::new(generator));
            submit(&mut driver, &patient, &encounter, &conditions, &procedures).await?;
        }
    }

    Ok(())
}

/// Resolve configuration from the process environment.
fn core_config_from_env() -> anyhow::Result<CoreConfig> {
    let fhir_base_url = fhir_base_url_from_env_value(std::env::var("FHIR_BASE_URL").ok())?;
    let smart = smart_config_from_env_values(
        std::env::var("SMART_CLIENT_ID").ok(),
        std::env::var("SMART_REDIRECT_URI").ok(),
        std::env::var("SMART_SCOPE").ok(),
    )?;
    let ai = ai_config_from_env_values(
        std::env::var("GEMINI_API_KEY").ok(),
        std::env::var("GEMINI_MODEL").ok(),
        std::env::var("GEMINI_BASE_URL").ok(),
    )?;
    Ok(CoreConfig::new(fhir_base_url, smart, ai)?)
}

/// A client over the Bundle file when one is given, otherwise the configured server.
fn fhir_client(id: &PatientId, bundle: Option<&Path>) -> anyhow::Result<Arc<dyn FhirClient>> {
    match bundle {
        Some(path) => {
            let value: serde_json::Value = serde_json::from_str(&read_file(path)?)
                .with_context(|| format!("{} is not valid JSON", path.display()))?;
            Ok(Arc::new(StaticFhirClient::new().with_bundle(id, value)))
        }
        None => {
            let cfg = core_config_from_env()?;
            tracing::info!("using FHIR server {}", cfg.fhir_base_url());
            Ok(Arc::new(HttpFhirClient::new(cfg.fhir_base_url().clone())?))
        }
    }
}

async fn submit(
    driver: &mut ClaimDriver,
    patient: &str,
    encounter: &str,
    conditions: &[String],
    procedures: &[String],
) -> anyhow::Result<()> {
    let record = driver
        .search(patient)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    print_patient(&record.patient);

    driver.select_encounter(encounter)?;
    for id in conditions {
        driver.toggle_condition(id)?;
    }
    for id in procedures {
        driver.toggle_procedure(id)?;
    }

    match driver.review().await? {
        GenerationState::Ready(summary) => println!("\nSummary:\n  {summary}"),
        GenerationState::Failed(message) => println!("\n{message}"),
        GenerationState::Idle | GenerationState::Pending => {}
    }

    let claim = driver
        .justify()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!("\nClaim submitted.");
    println!("\nJustification:\n  {}", claim.clipboard_text());
    println!("\n{}", serde_json::to_string_pretty(&claim)?);
    Ok(())
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn print_record(record: &PatientRecord) {
    print_patient(&record.patient);
    print_data(&record.data);
}

fn print_patient(patient: &Patient) {
    let today = chrono::Local::now().date_naive();
    let age = patient
        .age_on(today)
        .map(|a| a.to_string())
        .unwrap_or_else(|| "?".into());

    println!("{}  (ID: {})", patient.name, patient.id);
    println!(
        "  DOB: {} (Age: {})  Gender: {}",
        patient.birth_date,
        age,
        patient.gender.label()
    );
    println!("  Address: {}", patient.address);
}

fn print_data(data: &PatientData) {
    println!("\nEncounters:");
    if data.encounters.is_empty() {
        println!("  (none)");
    }
    for e in &data.encounters {
        println!("  [{}] {}  {}  {}", e.id, e.date, e.kind, e.practitioner);
    }

    println!("\nConditions:");
    if data.conditions.is_empty() {
        println!("  (none)");
    }
    for c in &data.conditions {
        println!("  [{}] {}: {}", c.id, c.code, c.description);
    }

    println!("\nProcedures:");
    if data.procedures.is_empty() {
        println!("  (none)");
    }
    for p in &data.procedures {
        println!("  [{}] {}: {}", p.id, p.code, p.description);
    }
}
