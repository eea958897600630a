//! Command-line interface.

use crate::artifacts::{self, read_dsl, read_json_object, write_json_file, write_text_file};
use crate::config::{self, Config};
use crate::console::{
    self, ConsoleClient, ImportRequest, ImportResult, ImportStatus, RunCollection, RunRequest,
};
use crate::error::Error;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

/// Dify console automation: import, export and test-run apps
#[derive(Parser, Debug)]
#[command(name = "dify-creator", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: <config dir>/dify-creator/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug logging to stderr (overridden by DIFY_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the configured credentials can log in
    Login,
    /// Import a DSL (overwrites the app when --app-id is given)
    Import(ImportArgs),
    /// Export an app as DSL
    Export(ExportArgs),
    /// Run an app's draft workflow and collect its events
    Run(RunArgs),
    /// Import, confirm if needed, then run the draft workflow
    Sync(SyncArgs),
}

/// App metadata applied on import.
#[derive(Args, Debug, Default)]
pub struct AppMetadataArgs {
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Icon type (emoji, image or link)
    #[arg(long)]
    pub icon_type: Option<String>,

    #[arg(long)]
    pub icon: Option<String>,

    #[arg(long)]
    pub icon_background: Option<String>,
}

impl AppMetadataArgs {
    fn apply(self, request: ImportRequest) -> ImportRequest {
        ImportRequest {
            name: self.name,
            description: self.description,
            icon_type: self.icon_type,
            icon: self.icon,
            icon_background: self.icon_background,
            ..request
        }
    }
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// DSL YAML file
    #[arg(
        long,
        value_name = "FILE",
        conflicts_with = "yaml_url",
        required_unless_present = "yaml_url"
    )]
    pub dsl: Option<PathBuf>,

    /// DSL YAML URL (raw GitHub file etc.)
    #[arg(long)]
    pub yaml_url: Option<String>,

    /// App to overwrite
    #[arg(long)]
    pub app_id: Option<String>,

    #[command(flatten)]
    pub metadata: AppMetadataArgs,

    /// Write the result JSON here
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[arg(long)]
    pub app_id: String,

    /// Include secret environment variables in the export
    #[arg(long)]
    pub include_secret: bool,

    /// Export a specific workflow version
    #[arg(long)]
    pub workflow_id: Option<String>,

    /// Write the DSL here instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// Workflow inputs, from a file or inline.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct InputArgs {
    /// JSON file holding the inputs object
    #[arg(long, value_name = "FILE")]
    pub inputs_json: Option<PathBuf>,

    /// Inputs object as a JSON string, e.g. '{"query":"hi"}'
    #[arg(long, value_name = "JSON")]
    pub inputs_inline: Option<String>,
}

impl InputArgs {
    fn load(&self) -> Result<Map<String, Value>> {
        match (&self.inputs_json, &self.inputs_inline) {
            (Some(path), _) => read_json_object(path, "--inputs-json"),
            (None, Some(inline)) => artifacts::parse_json_object(inline, "--inputs-inline"),
            (None, None) => {
                let message = "--inputs-json or --inputs-inline is required";
                Err(Error::Config(message.into()).into())
            }
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(long)]
    pub app_id: String,

    #[command(flatten)]
    pub inputs: InputArgs,

    /// Stop collecting once this many seconds have passed since the first event
    #[arg(long, value_name = "SECS", value_parser = parse_seconds)]
    pub max_wait_s: Option<Duration>,

    /// External trace id propagated to the run
    #[arg(long)]
    pub trace_id: Option<String>,

    /// Write the collected events here
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// DSL YAML file
    #[arg(long, value_name = "FILE")]
    pub dsl: PathBuf,

    /// App to overwrite
    #[arg(long)]
    pub app_id: Option<String>,

    #[command(flatten)]
    pub metadata: AppMetadataArgs,

    /// JSON file holding the inputs object
    #[arg(long, value_name = "FILE")]
    pub inputs_json: PathBuf,

    /// Stop collecting once this many seconds have passed since the first event
    #[arg(long, value_name = "SECS", value_parser = parse_seconds)]
    pub max_wait_s: Option<Duration>,

    /// Directory for import_result.json and run_result.json
    #[arg(long, value_name = "DIR", default_value = "artifacts")]
    pub out_dir: PathBuf,
}

fn parse_seconds(s: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("not a number: {s}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration {s}: {e}"))
}

/// Output of `sync`.
#[derive(Serialize)]
struct SyncReport<'a> {
    app_id: &'a str,
    import: &'a ImportResult,
    run: &'a RunCollection,
}

/// Run the CLI and map failures to an exit status.
pub async fn run(cli: Cli) -> ExitCode {
    // Before tracing so `.env` can set DIFY_LOG too.
    let dotenv = config::load_dotenv();
    init_tracing(cli.verbose);
    if let Some(path) = &dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    match run_inner(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", describe_error(&e));
            ExitCode::from(exit_code(&e))
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "dify_creator=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("DIFY_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_inner(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Login => {
            connect(&config).await?;
            println!("ok");
            Ok(())
        }
        Commands::Import(args) => import(&config, args).await,
        Commands::Export(args) => export(&config, args).await,
        Commands::Run(args) => run_draft(&config, args).await,
        Commands::Sync(args) => sync(&config, args).await,
    }
}

/// Build a client from config and log in.
async fn connect(config: &Config) -> Result<ConsoleClient> {
    let console_config = config.console()?;
    let credentials = config.credentials()?;
    let client = ConsoleClient::new(&console_config)?;
    client
        .login(&credentials.email, &credentials.password, false)
        .await?;
    Ok(client)
}

async fn import(config: &Config, args: ImportArgs) -> Result<()> {
    let yaml_content = args.dsl.as_deref().map(read_dsl).transpose()?;
    let request = args.metadata.apply(ImportRequest {
        yaml_content,
        yaml_url: args.yaml_url,
        app_id: args.app_id,
        ..ImportRequest::default()
    });
    request.payload()?;

    let client = connect(config).await?;
    let result = import_and_confirm(&client, &request).await?;

    if let Some(out) = &args.out {
        write_json_file(out, &result)?;
    }
    print_json(&result)
}

/// Import, confirming the import when the console asks for it.
async fn import_and_confirm(
    client: &ConsoleClient,
    request: &ImportRequest,
) -> Result<ImportResult> {
    let result = client.import_app(request).await?;

    let result = if result.is_pending() {
        let id = result.id().ok_or_else(|| {
            console::Error::UnexpectedResponse(format!(
                "pending import has no id: {}",
                Value::Object(result.as_map().clone())
            ))
        })?;
        tracing::warn!(import_id = id, "Import is pending (DSL version mismatch), confirming");
        client.confirm_import(id).await?
    } else {
        result
    };

    if result.status() == Some(ImportStatus::Failed) {
        tracing::warn!(error = ?result.error(), "Import failed");
    }
    Ok(result)
}

async fn export(config: &Config, args: ExportArgs) -> Result<()> {
    let client = connect(config).await?;
    let dsl = client
        .export_app(&args.app_id, args.include_secret, args.workflow_id.as_deref())
        .await?;

    match &args.out {
        Some(out) => write_text_file(out, &dsl),
        None => {
            println!("{dsl}");
            Ok(())
        }
    }
}

async fn run_draft(config: &Config, args: RunArgs) -> Result<()> {
    let inputs = args.inputs.load()?;

    let client = connect(config).await?;
    let collection = client
        .run_draft_workflow_collect(
            &args.app_id,
            &RunRequest::new(inputs),
            args.trace_id.as_deref(),
            args.max_wait_s,
        )
        .await?;

    if let Some(out) = &args.out {
        write_json_file(out, &collection)?;
    }
    print_json(&collection)
}

async fn sync(config: &Config, args: SyncArgs) -> Result<()> {
    let yaml_content = read_dsl(&args.dsl)?;
    let inputs = read_json_object(&args.inputs_json, "--inputs-json")?;
    let request = args.metadata.apply(ImportRequest {
        app_id: args.app_id.clone(),
        ..ImportRequest::from_content(yaml_content)
    });

    let client = connect(config).await?;
    let import_result = import_and_confirm(&client, &request).await?;

    let app_id = resolve_app_id(&import_result, args.app_id.as_deref())?;
    let run_result = client
        .run_draft_workflow_collect(&app_id, &RunRequest::new(inputs), None, args.max_wait_s)
        .await?;

    write_artifacts(&args.out_dir, &import_result, &run_result)?;
    print_json(&SyncReport {
        app_id: &app_id,
        import: &import_result,
        run: &run_result,
    })
}

/// App id from the import result, falling back to the overwrite target.
fn resolve_app_id(result: &ImportResult, fallback: Option<&str>) -> Result<String> {
    result
        .app_id()
        .or(fallback)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .ok_or_else(|| {
            console::Error::UnexpectedResponse(format!(
                "no app_id in import result: {}",
                Value::Object(result.as_map().clone())
            ))
            .into()
        })
}

fn write_artifacts(dir: &Path, import: &ImportResult, run: &RunCollection) -> Result<()> {
    write_json_file(&dir.join("import_result.json"), import)?;
    write_json_file(&dir.join("run_result.json"), run)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Message for the user, preferring the console's own error text.
fn describe_error(err: &anyhow::Error) -> String {
    if let Some(e) = err.downcast_ref::<console::Error>() {
        return e.user_message();
    }
    if let Some(Error::Console(e)) = err.downcast_ref::<Error>() {
        return e.user_message();
    }
    format!("{err:#}")
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<console::Error>().is_some() {
        return 2;
    }
    err.downcast_ref::<Error>().map_or(1, Error::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    fn import_result(value: Value) -> ImportResult {
        ImportResult::from(value.as_object().unwrap().clone())
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_import() {
        let cli = Cli::try_parse_from([
            "dify-creator",
            "import",
            "--dsl",
            "app.yml",
            "--app-id",
            "app-1",
            "--icon",
            "🤖",
            "--out",
            "result.json",
        ])
        .unwrap();
        let Commands::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(args.dsl.as_deref(), Some(Path::new("app.yml")));
        assert_eq!(args.app_id.as_deref(), Some("app-1"));
        assert_eq!(args.metadata.icon.as_deref(), Some("🤖"));
        assert!(args.yaml_url.is_none());
    }

    #[test]
    fn test_parse_import_requires_one_source() {
        assert!(Cli::try_parse_from(["dify-creator", "import"]).is_err());
        assert!(
            Cli::try_parse_from([
                "dify-creator",
                "import",
                "--dsl",
                "app.yml",
                "--yaml-url",
                "https://example.com/app.yml",
            ])
            .is_err()
        );

        let cli = Cli::try_parse_from([
            "dify-creator",
            "import",
            "--yaml-url",
            "https://example.com/app.yml",
        ])
        .unwrap();
        let Commands::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert!(args.dsl.is_none());
    }

    #[test]
    fn test_parse_run_requires_one_input_source() {
        assert!(Cli::try_parse_from(["dify-creator", "run", "--app-id", "a"]).is_err());
        assert!(
            Cli::try_parse_from([
                "dify-creator",
                "run",
                "--app-id",
                "a",
                "--inputs-json",
                "in.json",
                "--inputs-inline",
                "{}",
            ])
            .is_err()
        );

        let cli = Cli::try_parse_from([
            "dify-creator",
            "run",
            "--app-id",
            "a",
            "--inputs-inline",
            r#"{"q":1}"#,
            "--max-wait-s",
            "1.5",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.max_wait_s, Some(Duration::from_millis(1500)));
        assert_eq!(args.inputs.load().unwrap().get("q"), Some(&json!(1)));
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("0"), Ok(Duration::ZERO));
        assert_eq!(parse_seconds("2"), Ok(Duration::from_secs(2)));
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("abc").is_err());
    }

    #[test]
    fn test_sync_defaults() {
        let cli = Cli::try_parse_from([
            "dify-creator",
            "-v",
            "sync",
            "--dsl",
            "app.yml",
            "--inputs-json",
            "inputs.json",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.out_dir, PathBuf::from("artifacts"));
        assert!(args.max_wait_s.is_none());
    }

    #[test]
    fn test_metadata_apply_keeps_source() {
        let metadata = AppMetadataArgs {
            name: Some("Demo".into()),
            ..AppMetadataArgs::default()
        };
        let request = metadata.apply(ImportRequest::from_content("app: {}").with_app_id("app-1"));
        assert_eq!(request.yaml_content.as_deref(), Some("app: {}"));
        assert_eq!(request.app_id.as_deref(), Some("app-1"));
        assert_eq!(request.name.as_deref(), Some("Demo"));
    }

    #[test]
    fn test_resolve_app_id() {
        let completed = import_result(json!({"status": "completed", "app_id": "app-9"}));
        assert_eq!(resolve_app_id(&completed, Some("app-1")).unwrap(), "app-9");

        let no_app = import_result(json!({"status": "completed", "app_id": null}));
        assert_eq!(resolve_app_id(&no_app, Some("app-1")).unwrap(), "app-1");

        let err = resolve_app_id(&no_app, None).unwrap_err();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_write_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("artifacts");
        let import = import_result(json!({"status": "completed"}));
        let mut run = RunCollection::default();
        run.push(json!({"event": "workflow_finished"}));

        write_artifacts(&out_dir, &import, &run).unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(out_dir.join("run_result.json")).unwrap())
                .unwrap();
        assert_eq!(written["last_event"], json!({"event": "workflow_finished"}));
        assert!(out_dir.join("import_result.json").exists());
    }

    #[test]
    fn test_exit_codes_and_messages() {
        let http: anyhow::Error = console::Error::Http {
            status: 404,
            detail: console::ErrorDetail::from_body(r#"{"message":"App not found."}"#),
        }
        .into();
        assert_eq!(exit_code(&http), 2);
        assert_eq!(describe_error(&http), "HTTP 404: App not found.");

        let config: anyhow::Error = Error::Config("DIFY_BASE_URL is not set".into()).into();
        assert_eq!(exit_code(&config), 2);

        let io: anyhow::Error = Error::Io(std::io::Error::other("disk full")).into();
        assert_eq!(exit_code(&io), 1);

        let plain = anyhow::anyhow!("something else");
        assert_eq!(exit_code(&plain), 1);
    }
}
