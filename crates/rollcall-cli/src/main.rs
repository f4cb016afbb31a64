use anyhow::Result;
use clap::{Parser, Subcommand};
use rollcall_core::FaceAnalyzer;
use rollcall_hw::Camera;
use rollcall_store::{FaceDb, QdrantIndex};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod attendance;
mod enroll;
mod watch;

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall face enrollment and attendance CLI")]
struct Cli {
    /// Qdrant gRPC endpoint (env: ROLLCALL_QDRANT_URL, default http://localhost:6334)
    #[arg(long, global = true)]
    qdrant_url: Option<String>,

    /// Qdrant Cloud API key (env: ROLLCALL_QDRANT_API_KEY)
    #[arg(long, global = true)]
    qdrant_api_key: Option<String>,

    /// Directory containing the ONNX model files (env: ROLLCALL_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a face from an image file
    Enroll {
        /// Person's display name
        #[arg(short, long)]
        name: String,
        /// External personnel id used for attendance marking
        #[arg(short, long)]
        personnel_id: Option<String>,
        /// Path to the image file
        image: PathBuf,
    },
    /// Enroll every image in a directory (person name taken from the file stem)
    EnrollDir {
        dir: PathBuf,
    },
    /// List enrolled people with their face counts
    List,
    /// Delete every face stored for a person
    Delete {
        name: String,
    },
    /// Show database statistics
    Stats,
    /// Watch a camera and mark attendance on recognition
    Watch(watch::WatchArgs),
    /// List available capture devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Cli {
        qdrant_url,
        qdrant_api_key,
        model_dir,
        command,
    } = Cli::parse();

    match command {
        Commands::Enroll {
            name,
            personnel_id,
            image,
        } => {
            let db = open_facedb(qdrant_url.as_deref(), qdrant_api_key.clone())?;
            db.ensure_ready().await?;
            let mut analyzer = load_analyzer(model_dir.as_deref())?;

            let id = enroll::enroll_file(&db, &mut analyzer, &name, personnel_id, &image).await?;
            println!("added '{name}' ({id})");
        }
        Commands::EnrollDir { dir } => {
            let db = open_facedb(qdrant_url.as_deref(), qdrant_api_key.clone())?;
            db.ensure_ready().await?;
            let mut analyzer = load_analyzer(model_dir.as_deref())?;

            let (added, total) = enroll::enroll_dir(&db, &mut analyzer, &dir).await?;
            println!("{added}/{total} images enrolled");
        }
        Commands::List => {
            let db = open_facedb(qdrant_url.as_deref(), qdrant_api_key.clone())?;
            let faces = db.list_faces().await?;

            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for face in faces {
                *counts.entry(face.name).or_default() += 1;
            }

            if counts.is_empty() {
                println!("no faces enrolled");
            } else {
                for (name, count) in counts {
                    println!("{name}: {count} face(s)");
                }
            }
        }
        Commands::Delete { name } => {
            let db = open_facedb(qdrant_url.as_deref(), qdrant_api_key.clone())?;
            if db.delete(&name).await? {
                println!("deleted all faces for '{name}'");
            } else {
                println!("no faces stored for '{name}'");
            }
        }
        Commands::Stats => {
            let db = open_facedb(qdrant_url.as_deref(), qdrant_api_key.clone())?;
            let stats = db.stats().await?;

            println!("total people: {}", stats.total_people);
            println!("total faces:  {}", stats.total_faces);
            for name in stats.people {
                println!("  {name}");
            }
        }
        Commands::Watch(args) => {
            let db = open_facedb(qdrant_url.as_deref(), qdrant_api_key.clone())?;
            db.ensure_ready().await?;
            let analyzer = load_analyzer(model_dir.as_deref())?;

            watch::run(db, analyzer, args).await?;
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("no capture devices found");
            } else {
                for d in devices {
                    println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
                }
            }
        }
    }

    Ok(())
}

fn open_facedb(url_flag: Option<&str>, api_key_flag: Option<String>) -> Result<FaceDb> {
    let url = url_flag
        .map(str::to_string)
        .or_else(|| std::env::var("ROLLCALL_QDRANT_URL").ok())
        .unwrap_or_else(|| "http://localhost:6334".to_string());
    let api_key = api_key_flag.or_else(|| std::env::var("ROLLCALL_QDRANT_API_KEY").ok());

    let index = QdrantIndex::connect(&url, api_key)?;
    Ok(FaceDb::new(Arc::new(index)))
}

fn load_analyzer(model_dir_flag: Option<&Path>) -> Result<FaceAnalyzer> {
    let model_dir = model_dir_flag
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("ROLLCALL_MODEL_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(rollcall_core::default_model_dir);

    Ok(FaceAnalyzer::load(&model_dir)?)
}
