use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenv::dotenv;

use food_snap_client::config::AppConfig;
use food_snap_client::handlers::food_analysis::meal_type_at;
use food_snap_client::handlers::{
    check_apk, format_daily_report, AdminProvisioner, FoodAnalysisPipeline, GrantOutcome, ItemSpec,
};
use food_snap_client::models::{AnalysisType, MealType};
use food_snap_client::services::{
    AnalysisClient, BackendClient, ImageEncoder, SessionManager, UploadFile, VisionService,
};
use food_snap_client::ClientError;

#[derive(Parser)]
#[command(
    name = "food-snap",
    about = "Food photo nutrition analysis and health backend client",
    long_about = "Analyze food photos with a multimodal model, save them as food records, and manage the health-tracking backend. Configuration is read from the environment (.env supported)."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a food photo and print the nutrition as JSON
    Analyze {
        image: PathBuf,

        /// Free-text hint about the meal (e.g. "fried rice with egg")
        #[arg(long, short = 'd')]
        description: Option<String>,
    },

    /// Analyze a food photo and save it as a food record
    AnalyzeAndSave {
        image: PathBuf,

        #[arg(long, short = 'd')]
        description: Option<String>,

        /// breakfast, lunch, dinner or snack (guessed from the time of day if omitted)
        #[arg(long)]
        meal: Option<String>,

        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Let the backend analyze a food photo
    AnalyzeRemote {
        image: PathBuf,

        #[arg(long, short = 'd')]
        description: Option<String>,
    },

    /// List food records in a date range (YYYY-MM-DD)
    Records {
        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Print the daily nutrition report
    Report {
        /// Day to report on (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long, default_value = "2000")]
        goal: u32,
    },

    /// Let the backend analyze a food photo and store the record
    SaveRemote {
        image: PathBuf,

        #[arg(long, short = 'd')]
        description: Option<String>,

        #[arg(long)]
        meal: Option<String>,

        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Written analysis of the food records in a date range
    HealthAnalysis {
        #[arg(long)]
        start: NaiveDate,

        #[arg(long)]
        end: NaiveDate,

        /// comprehensive, nutrition, calories or macros
        #[arg(long = "type", default_value = "comprehensive")]
        analysis_type: String,

        #[arg(long, short = 'd')]
        description: Option<String>,
    },

    /// Show the latest health state
    HealthLatest,

    /// Check in for today
    CheckIn {
        #[arg(long, default_value = "")]
        content: String,
    },

    /// Upload a catalog item with its icon and image (admin)
    UploadItem {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: String,

        #[arg(long)]
        source: String,

        #[arg(long)]
        icon: PathBuf,

        #[arg(long)]
        image: PathBuf,
    },

    /// Publish an APK release (admin)
    UploadApk {
        file: PathBuf,

        #[arg(long)]
        version: String,

        #[arg(long, default_value = "android")]
        platform: String,

        /// Require clients to install this release
        #[arg(long)]
        force: bool,

        #[arg(long, default_value = "")]
        notes: String,
    },

    /// List registered users (admin)
    Users,

    /// Show user statistics (admin)
    Stats,

    /// Show metadata of a stored image
    ImageInfo { filename: String },

    /// Give an item to a user (admin)
    GrantItem {
        #[arg(long)]
        user_id: u64,

        #[arg(long)]
        item_id: u64,

        #[arg(long, default_value = "1")]
        quantity: i32,

        #[arg(long, default_value = "admin")]
        source: String,
    },

    /// Check whether a newer release exists
    CheckUpdate {
        #[arg(long, default_value = "android")]
        platform: String,

        #[arg(long)]
        current_version: String,
    },

    /// Download a release package
    DownloadUpdate {
        #[arg(long, default_value = "android")]
        platform: String,

        #[arg(long)]
        version: String,

        #[arg(long, short = 'o')]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    // Load environment variables
    dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    if let Err(e) = run(cli.command, &config).await {
        match e.downcast_ref::<ClientError>() {
            Some(client_error) => log::error!("❌ {} error: {}", client_error.kind(), client_error),
            None => log::error!("❌ {:#}", e),
        }
        return Err(e);
    }
    Ok(())
}

async fn run(command: Command, config: &AppConfig) -> Result<()> {
    let session = Arc::new(SessionManager::new(&config.backend, config.credentials.clone())?);
    let backend = Arc::new(BackendClient::new(&config.backend, session)?);
    log::debug!("✅ Backend client initialized: {}", config.backend.base_url);

    match command {
        Command::Analyze { image, description } => {
            let pipeline = analysis_pipeline(config, backend)?;
            let result = pipeline.analyze_file(&image, description.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::AnalyzeAndSave {
            image,
            description,
            meal,
            notes,
        } => {
            let meal_type = meal
                .map(|m| MealType::from_string(&m).with_context(|| format!("Unknown meal type: {}", m)))
                .transpose()?;
            let pipeline = analysis_pipeline(config, backend.clone())?;
            ImageEncoder::new().inspect(&image)?;
            sign_in(&backend, config).await?;

            let record = pipeline
                .analyze_and_save(&image, description.as_deref(), meal_type, &notes)
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Command::AnalyzeRemote { image, description } => {
            let upload = UploadFile::read(&image)?;
            sign_in(&backend, config).await?;
            let result = backend.analyze_food_remote(&upload, description.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::SaveRemote {
            image,
            description,
            meal,
            notes,
        } => {
            let meal_type = match meal {
                Some(m) => MealType::from_string(&m).with_context(|| format!("Unknown meal type: {}", m))?,
                None => meal_type_at(chrono::Local::now().time()),
            };
            let upload = UploadFile::read(&image)?;
            sign_in(&backend, config).await?;
            let saved = backend
                .analyze_and_save_remote(&upload, &meal_type, &notes, description.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&saved.record)?);
        }

        Command::HealthAnalysis {
            start,
            end,
            analysis_type,
            description,
        } => {
            let kind = AnalysisType::from_string(&analysis_type)
                .with_context(|| format!("Unknown analysis type: {}", analysis_type))?;
            sign_in(&backend, config).await?;
            let analysis = backend.analyze_health(start, end, kind, description.as_deref()).await?;
            println!("{}", analysis);
        }

        Command::Users => {
            sign_in(&backend, config).await?;
            for user in backend.list_users().await? {
                println!("{:>5}  {:<30}  {:<6}  verified: {}", user.id, user.email, user.role, user.verified);
            }
        }

        Command::Stats => {
            sign_in(&backend, config).await?;
            let stats = backend.system_stats().await?;
            println!("👥 Users: {} ({} verified, {} unverified)", stats.total_users, stats.verified_users, stats.unverified_users);
        }

        Command::ImageInfo { filename } => {
            sign_in(&backend, config).await?;
            let info = backend.image_info(&filename).await?;
            println!("{} ({} bytes) -> {}", info.filename, info.size, info.url);
        }

        Command::Records { start, end } => {
            sign_in(&backend, config).await?;
            let page = backend.list_food_records(start, end).await?;
            println!("🍽️ {} record(s)", page.total);
            println!("{}", serde_json::to_string_pretty(&page.records)?);
        }

        Command::Report { date, goal } => {
            let day = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            sign_in(&backend, config).await?;
            let page = backend.list_food_records(Some(day), Some(day)).await?;
            println!("{}", format_daily_report(&page.records, goal));
        }

        Command::HealthLatest => {
            sign_in(&backend, config).await?;
            let state = backend.latest_health_state().await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            println!("BMI: {:.1}", state.computed_bmi());
        }

        Command::CheckIn { content } => {
            sign_in(&backend, config).await?;
            let outcome = backend.check_in(&content).await?;
            if outcome.success {
                println!("✅ {}", outcome.message);
            } else {
                println!("⚠️ {}", outcome.message);
            }
        }

        Command::UploadItem {
            name,
            description,
            source,
            icon,
            image,
        } => {
            UploadFile::inspect(&icon)?;
            UploadFile::inspect(&image)?;
            sign_in(&backend, config).await?;
            let item = AdminProvisioner::new(backend)
                .upload_item(&ItemSpec {
                    name,
                    description,
                    source,
                    icon_path: icon,
                    image_path: image,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }

        Command::UploadApk {
            file,
            version,
            platform,
            force,
            notes,
        } => {
            check_apk(&file)?;
            sign_in(&backend, config).await?;
            let update = AdminProvisioner::new(backend)
                .publish_apk(&file, &version, &platform, force, &notes)
                .await?;
            println!("{}", serde_json::to_string_pretty(&update)?);
        }

        Command::GrantItem {
            user_id,
            item_id,
            quantity,
            source,
        } => {
            sign_in(&backend, config).await?;
            match AdminProvisioner::new(backend)
                .grant_item(user_id, item_id, quantity, &source)
                .await?
            {
                GrantOutcome::Granted(user_item) => println!("{}", serde_json::to_string_pretty(&user_item)?),
                GrantOutcome::QuantityUpdated(total) => println!("Quantity updated to {}", total),
            }
        }

        Command::CheckUpdate {
            platform,
            current_version,
        } => {
            let check = backend.check_update(&platform, &current_version).await?;
            match check.update_info.filter(|_| check.needs_update) {
                Some(update) => println!(
                    "⬆️ Update available: {} (force: {})\n{}",
                    update.version, update.force_update, update.update_notes
                ),
                None => println!("✅ Up to date"),
            }
        }

        Command::DownloadUpdate {
            platform,
            version,
            output,
        } => {
            let size = backend.download_update(&platform, &version, &output).await?;
            println!("✅ Saved {} bytes to {}", size, output.display());
        }
    }

    Ok(())
}

fn analysis_pipeline(config: &AppConfig, backend: Arc<BackendClient>) -> Result<FoodAnalysisPipeline> {
    let analysis = config.require_analysis()?.clone();
    let model = analysis.model.clone();
    let vision = Arc::new(AnalysisClient::new(analysis)?) as Arc<dyn VisionService>;
    log::info!("✅ Analysis service initialized with model: {}", model);
    Ok(FoodAnalysisPipeline::new(vision, backend))
}

/// Resume a saved token when one is configured, otherwise log in.
async fn sign_in(backend: &BackendClient, config: &AppConfig) -> Result<()> {
    match &config.token {
        Some(token) => backend.session().restore(token.clone()).await,
        None => {
            backend
                .login()
                .await
                .context("Login failed; set BACKEND_EMAIL and BACKEND_PASSWORD or BACKEND_TOKEN")?;
        }
    }
    Ok(())
}
