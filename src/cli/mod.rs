//! CLI module for the sivacor-notify command-line interface.
//!
//! Subcommands:
//! - `render <input>` - Render a notification to stdout or an output directory
//! - `send <input>` - Render and deliver a notification by email
//! - `check-templates` - Load and validate the configured layouts

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::notifications::{
    JobRecord, LogSender, NotificationRenderer, NotificationSender, NotificationService,
    RenderedDocument, SmtpSender,
};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "sivacor-notify")]
#[command(author, version, about = "Render and send SIVACOR job notifications", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "SIVACOR_NOTIFY_CONFIG",
        default_value = "sivacor-notify.toml"
    )]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a notification without sending it
    Render {
        #[command(flatten)]
        input: InputArgs,

        /// Which document to produce
        #[arg(short, long, value_enum, default_value = "html")]
        format: OutputFormat,

        /// Write notification.html / notification.txt here instead of stdout
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Render a notification and deliver it by email
    Send {
        #[command(flatten)]
        input: InputArgs,

        /// Recipient address (defaults to the job owner's email)
        #[arg(long)]
        to: Option<String>,

        /// Log the message instead of delivering it
        #[arg(long)]
        dry_run: bool,
    },

    /// Load and validate the configured notification layouts
    CheckTemplates,
}

#[derive(Args, Debug)]
pub struct InputArgs {
    /// JSON file with a job record (or a raw attribute map with --raw)
    pub input: PathBuf,

    /// Treat the input as a raw notification attribute map
    #[arg(long)]
    pub raw: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Html,
    Text,
    Both,
}

/// Parsed contents of an input file
#[derive(Debug)]
enum Input {
    Job(Box<JobRecord>),
    Raw(Map<String, Value>),
}

fn load_input(args: &InputArgs) -> Result<Input> {
    let content = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read input file: {}", args.input.display()))?;

    if args.raw {
        let attrs: Map<String, Value> =
            serde_json::from_str(&content).context("Input must be a JSON object")?;
        Ok(Input::Raw(attrs))
    } else {
        let job: JobRecord =
            serde_json::from_str(&content).context("Failed to parse job record")?;
        Ok(Input::Job(Box::new(job)))
    }
}

fn build_service(config: &Config, sender: Arc<dyn NotificationSender>) -> Result<NotificationService> {
    let renderer = NotificationRenderer::from_resolver(config.template_resolver().as_ref())
        .context("Failed to load notification templates")?;
    let defaults = config.attribute_defaults()?;
    Ok(NotificationService::new(renderer, defaults, sender))
}

/// Run a CLI command
pub async fn run_command(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Commands::Render {
            input,
            format,
            output_dir,
        } => cmd_render(config, input, *format, output_dir.as_deref()),
        Commands::Send { input, to, dry_run } => {
            cmd_send(config, input, to.as_deref(), *dry_run).await
        }
        Commands::CheckTemplates => cmd_check_templates(config),
    }
}

/// Render a notification to stdout or files
fn cmd_render(
    config: &Config,
    input: &InputArgs,
    format: OutputFormat,
    output_dir: Option<&Path>,
) -> Result<()> {
    let service = build_service(config, Arc::new(LogSender))?;
    let document = match load_input(input)? {
        Input::Job(job) => service.prepare(&job)?,
        Input::Raw(attrs) => service.render_attributes(&attrs)?,
    };

    match output_dir {
        Some(dir) => {
            for path in write_document(&document, format, dir)? {
                println!("Wrote {}", path.display());
            }
        }
        None => print_document(&document, format),
    }

    Ok(())
}

fn print_document(document: &RenderedDocument, format: OutputFormat) {
    println!("Subject: {}", document.subject);
    println!();
    match format {
        OutputFormat::Html => println!("{}", document.html),
        OutputFormat::Text => println!("{}", document.text),
        OutputFormat::Both => {
            println!("{}", document.text);
            println!("{}", "-".repeat(72));
            println!("{}", document.html);
        }
    }
}

/// Write the selected documents into `dir`, returning the paths written
fn write_document(
    document: &RenderedDocument,
    format: OutputFormat,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let mut outputs = Vec::new();
    if matches!(format, OutputFormat::Html | OutputFormat::Both) {
        outputs.push((dir.join("notification.html"), &document.html));
    }
    if matches!(format, OutputFormat::Text | OutputFormat::Both) {
        outputs.push((dir.join("notification.txt"), &document.text));
    }

    let mut written = Vec::with_capacity(outputs.len());
    for (path, body) in outputs {
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Render a notification and deliver it
async fn cmd_send(config: &Config, input: &InputArgs, to: Option<&str>, dry_run: bool) -> Result<()> {
    let sender: Arc<dyn NotificationSender> = if dry_run {
        Arc::new(LogSender)
    } else {
        let smtp = SmtpSender::new(config.email.clone());
        if !smtp.is_enabled() {
            anyhow::bail!(
                "Email is not configured. Set [email] smtp_host and from_address, or use --dry-run."
            );
        }
        Arc::new(smtp)
    };
    let service = build_service(config, sender)?;

    match load_input(input)? {
        Input::Job(mut job) => {
            if let Some(to) = to {
                job.owner.email = to.to_string();
            }
            service.notify(&job).await?;
            println!("[OK] Notification for job {} sent to {}", job.id, job.owner.email);
        }
        Input::Raw(attrs) => {
            let to = to.context("--to is required when sending a raw attribute map")?;
            let document = service.render_attributes(&attrs)?;
            service.deliver(to, &document).await?;
            println!("[OK] Notification sent to {}", to);
        }
    }

    Ok(())
}

/// Validate the configured layouts
fn cmd_check_templates(config: &Config) -> Result<()> {
    let source = match &config.templates.dir {
        Some(dir) => dir.display().to_string(),
        None => "built-in".to_string(),
    };
    println!("Checking notification templates: {}", source);
    println!();

    match NotificationRenderer::from_resolver(config.template_resolver().as_ref()) {
        Ok(renderer) => {
            let template = renderer.template();
            println!("[OK] Templates are valid!");
            println!();
            println!("  Product:       {}", template.product_name);
            println!("  Support email: {}", template.support_email);
            println!();
            Ok(())
        }
        Err(e) => {
            println!("[!!] Templates are invalid!");
            println!();
            println!("Error: {}", e);
            println!();
            anyhow::bail!("Invalid notification templates");
        }
    }
}
