use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xinsight_core::{
    render, render_result, AnalysisClient, AnalysisResult, CoreConfig, HttpAnalysisClient, Role,
    Session, SessionStore, SubmissionState, UploadWorkflow, UserDirectory,
};
use xinsight_files::{CandidateFile, PreviewStore};

#[derive(Parser)]
#[command(name = "xinsight")]
#[command(about = "X-Insight X-ray analysis CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in as one of the known accounts
    Login {
        /// Account email
        email: String,
        /// Password (must not be blank)
        password: String,
        /// Role to sign in as (patient, doctor or admin)
        #[arg(long, default_value = "patient")]
        role: Role,
    },
    /// Sign out and remove the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Upload an X-ray and print the analysis
    Analyse {
        /// Image or DICOM file
        path: PathBuf,
        /// Declared media type (detected from the file when omitted)
        #[arg(long)]
        media_type: Option<String>,
        /// Write decoded heatmaps into this directory
        #[arg(long)]
        heatmap_dir: Option<PathBuf>,
        /// Print the rendered view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render a saved analysis response without contacting the service
    Render {
        /// JSON file containing an analysis response
        json_file: PathBuf,
        /// Write decoded heatmaps into this directory
        #[arg(long)]
        heatmap_dir: Option<PathBuf>,
        /// Print the rendered result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so `--json` output stays machine readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("xinsight_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = CoreConfig::from_env()?;

    match cli.command {
        Some(Commands::Login {
            email,
            password,
            role,
        }) => {
            let mut session = open_session(&cfg)?;
            let user = session.login(&email, &password, role)?;
            println!("{}", user.greeting());
            println!("Portal: {}", user.role.portal_path());
        }
        Some(Commands::Logout) => {
            let mut session = open_session(&cfg)?;
            session.logout()?;
            println!("Signed out.");
        }
        Some(Commands::Whoami) => {
            let session = open_session(&cfg)?;
            match session.current_user() {
                Some(user) => {
                    println!("{} <{}> ({})", user.name, user.email, user.role);
                    println!("Portal: {}", user.role.portal_path());
                }
                None => println!("Not signed in."),
            }
        }
        Some(Commands::Analyse {
            path,
            media_type,
            heatmap_dir,
            json,
        }) => analyse(&cfg, &path, media_type, heatmap_dir.as_deref(), json).await?,
        Some(Commands::Render {
            json_file,
            heatmap_dir,
            json,
        }) => {
            let body = fs::read(&json_file)
                .with_context(|| format!("failed to read {}", json_file.display()))?;
            let result = AnalysisResult::from_json_slice(&body)?;
            let view = render_result(&result);
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{view}");
            }
            if let Some(dir) = heatmap_dir {
                report_heatmaps(&write_heatmaps(&result, &dir)?);
            }
        }
        None => {
            println!("No command given. Run with --help to see the available commands.");
        }
    }

    Ok(())
}

fn open_session(cfg: &CoreConfig) -> anyhow::Result<Session> {
    let store = SessionStore::new(cfg.session_file());
    Ok(Session::init(store, UserDirectory::mock())?)
}

async fn analyse(
    cfg: &CoreConfig,
    path: &Path,
    media_type: Option<String>,
    heatmap_dir: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let client = HttpAnalysisClient::new(cfg)?;
    let workflow = run_analyse(cfg, &client, path, media_type, !json).await?;

    let view = render(&workflow);
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{view}");
    }

    if let (Some(dir), Some(result)) = (heatmap_dir, workflow.result()) {
        report_heatmaps(&write_heatmaps(result, dir)?);
    }

    ensure_analysed(&workflow)
}

/// Takes one file through intake and a single submission against `client`.
///
/// The returned workflow is `Succeeded` or `Failed`; intake errors are returned as errors.
async fn run_analyse<C>(
    cfg: &CoreConfig,
    client: &C,
    path: &Path,
    media_type: Option<String>,
    show_progress: bool,
) -> anyhow::Result<UploadWorkflow>
where
    C: AnalysisClient + ?Sized,
{
    let previews = PreviewStore::new(cfg.preview_dir())?;
    let mut workflow = UploadWorkflow::new(cfg.intake_policy(), previews);

    let candidate = CandidateFile::from_path(path, media_type)
        .with_context(|| format!("failed to read {}", path.display()))?;
    workflow.accept(candidate)?;

    if show_progress {
        eprintln!("{}", xinsight_core::constants::PROGRESS_MESSAGE);
    }
    workflow.submit(client).await;
    Ok(workflow)
}

/// A failed analysis ends the command with a non-zero exit status.
fn ensure_analysed(workflow: &UploadWorkflow) -> anyhow::Result<()> {
    if let SubmissionState::Failed(err) = workflow.state() {
        anyhow::bail!("{}", err);
    }
    Ok(())
}

/// Writes every available heatmap as `<condition>.<ext>` and returns the paths written.
///
/// Conditions that map to the same file name get a `-2`, `-3`, ... suffix.
fn write_heatmaps(result: &AnalysisResult, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut written = Vec::new();
    for (condition, image) in &result.heatmaps {
        let Some(image) = image else {
            tracing::warn!(condition = %condition, "heatmap unavailable, skipping");
            continue;
        };
        let bytes = image
            .decode()
            .with_context(|| format!("heatmap for {condition} could not be decoded"))?;
        let path = unused_path(
            dir,
            &heatmap_file_stem(condition),
            image.file_extension(),
            &written,
        );
        fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn unused_path(dir: &Path, stem: &str, ext: &str, written: &[PathBuf]) -> PathBuf {
    let mut path = dir.join(format!("{stem}.{ext}"));
    let mut n = 2;
    while written.contains(&path) {
        path = dir.join(format!("{stem}-{n}.{ext}"));
        n += 1;
    }
    path
}

fn report_heatmaps(paths: &[PathBuf]) {
    for path in paths {
        eprintln!("Wrote heatmap {}", path.display());
    }
}

/// Condition names come from the service; keep them to a safe file name.
fn heatmap_file_stem(condition: &str) -> String {
    condition
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
