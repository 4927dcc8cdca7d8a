//! CLI command definitions, routing, and tracing setup.

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use ideaforge_core::{AnalysisService, StartOutcome};
use ideaforge_shared::{
    DisambiguationOption, IdeaId, Job, JobId, StepStatus, init_config, load_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ideaforge — prototype ideas from real company evidence.
#[derive(Parser)]
#[command(
    name = "ideaforge",
    version,
    about = "Turn a company name or URL into ranked prototype ideas and build plans.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Analyze a subject and wait for its ideas.
    Analyze {
        /// Company name or URL.
        input: String,

        /// Disambiguation option to pick (1-based), when the subject is
        /// ambiguous.
        #[arg(short, long)]
        pick: Option<usize>,

        /// Return the job id immediately instead of waiting.
        #[arg(long)]
        no_wait: bool,
    },

    /// Show the status and evidence of a job.
    Status {
        /// Job id.
        job: String,
    },

    /// Show one idea in detail.
    Idea {
        /// Idea id.
        idea: String,
    },

    /// Generate (or fetch the cached) build plan for an idea.
    Plan {
        /// Idea id.
        idea: String,
    },

    /// Add a custom idea to a finished job.
    Custom {
        /// Job id.
        job: String,

        /// What to build (40-600 characters).
        description: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "ideaforge=info",
        1 => "ideaforge=debug",
        _ => "ideaforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze {
            input,
            pick,
            no_wait,
        } => analyze(&input, pick, no_wait).await,
        Command::Status { job } => status(&job).await,
        Command::Idea { idea } => idea_detail(&idea).await,
        Command::Plan { idea } => plan(&idea).await,
        Command::Custom { job, description } => custom(&job, &description).await,
        Command::Config { action } => config_action(action),
    }
}

async fn service() -> Result<AnalysisService> {
    let config = load_config()?;
    Ok(AnalysisService::new(config).await?)
}

async fn analyze(input: &str, pick: Option<usize>, no_wait: bool) -> Result<()> {
    let service = service().await?;

    let mut outcome = service.start_analysis(input, None).await?;

    if let StartOutcome::NeedsDisambiguation { options } = &outcome {
        match pick {
            Some(n) => {
                let choice: &DisambiguationOption = options
                    .get(n.checked_sub(1).ok_or_else(|| eyre!("--pick is 1-based"))?)
                    .ok_or_else(|| eyre!("--pick {n} is out of range (1-{})", options.len()))?;
                outcome = service.start_analysis(input, Some(choice.clone())).await?;
            }
            None => {
                println!("\"{input}\" is ambiguous. Re-run with --pick <n>:");
                for (i, option) in options.iter().enumerate() {
                    let description = option.description.as_deref().unwrap_or("");
                    println!("  {}. {} — {description}", i + 1, option.label);
                }
                return Ok(());
            }
        }
    }

    let StartOutcome::Started { job_id } = outcome else {
        return Err(eyre!("disambiguation loop did not resolve"));
    };

    info!(%job_id, "analysis started");

    if no_wait {
        println!("{job_id}");
        return Ok(());
    }

    let job = wait_with_progress(&service, &job_id).await?;
    print_ideas(&job);
    Ok(())
}

/// Poll the job, mirroring step progress onto a spinner.
async fn wait_with_progress(service: &AnalysisService, job_id: &JobId) -> Result<Job> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .expect("static template is valid"),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    loop {
        let job = service.job_status(job_id).await?;

        if let Some(step) = job.steps.iter().find(|s| s.status == StepStatus::Running) {
            spinner.set_message(step.label.clone());
        }

        if job.status.is_terminal() {
            spinner.finish_and_clear();
            return Ok(job);
        }

        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    }
}

fn print_ideas(job: &Job) {
    println!(
        "{} — {} ideas (provider: {})",
        job.company.name,
        job.ideas.len(),
        job.evidence.provider_used.as_deref().unwrap_or("unknown"),
    );

    let mut current_effort = None;
    for idea in &job.ideas {
        if current_effort != Some(idea.effort) {
            current_effort = Some(idea.effort);
            println!("\n## {}", idea.effort.label());
        }
        println!("  [{}] {}", idea.id, idea.title);
        println!("      {}", idea.summary);
    }
}

async fn status(job: &str) -> Result<()> {
    let job_id: JobId = job.parse().map_err(|_| eyre!("invalid job id: {job}"))?;
    let service = service().await?;
    let job = service.job_status(&job_id).await?;

    println!("{} — {:?}", job.id, job.status);
    for step in &job.steps {
        let note = step.note.as_deref().unwrap_or("");
        println!("  {:<10} {:<9} {note}", step.id, format!("{:?}", step.status).to_lowercase());
    }

    if !job.evidence.fetch_attempts.is_empty() {
        println!("\nFetch attempts:");
        for attempt in &job.evidence.fetch_attempts {
            println!(
                "  {:<9} {} {}",
                format!("{:?}", attempt.outcome).to_lowercase(),
                attempt.status_code.map(|c| c.to_string()).unwrap_or_default(),
                attempt.url
            );
        }
    }

    if let Some(error) = &job.evidence.provider_error {
        println!("\nLast provider error: {error}");
    }

    Ok(())
}

async fn idea_detail(idea: &str) -> Result<()> {
    let idea_id: IdeaId = idea.parse().map_err(|_| eyre!("invalid idea id: {idea}"))?;
    let service = service().await?;
    let (idea, theme) = service.idea_detail(&idea_id).await?;

    println!("{} ({})", idea.title, idea.effort.label());
    println!("{}\n", idea.summary);
    if !idea.outline.pages.is_empty() {
        println!("Pages:         {}", idea.outline.pages.join(", "));
    }
    if !idea.outline.components.is_empty() {
        println!("Components:    {}", idea.outline.components.join(", "));
    }
    if !idea.outline.data.is_empty() {
        println!("Data:          {}", idea.outline.data.join(", "));
    }
    if !idea.outline.nice_to_haves.is_empty() {
        println!("Nice to have:  {}", idea.outline.nice_to_haves.join(", "));
    }
    if let Some(angle) = &idea.inspired_by {
        println!("Inspired by:   {angle}");
    }
    if let Some(theme) = theme {
        println!(
            "Brand:         {} / {} ({})",
            theme.primary,
            theme.accent,
            theme.source.as_str()
        );
    }

    Ok(())
}

async fn plan(idea: &str) -> Result<()> {
    let idea_id: IdeaId = idea.parse().map_err(|_| eyre!("invalid idea id: {idea}"))?;
    let service = service().await?;
    let plan = service.build_plan(&idea_id).await?;

    println!(
        "Build plan for {} (provider: {}, {}ms)\n",
        plan.folder_name, plan.provider, plan.generated_in_ms
    );
    println!("Setup:\n{}\n", plan.setup_script);

    for (i, step) in plan.steps.iter().enumerate() {
        println!("{}. [{}] {}", i + 1, step.role, step.title);
        println!("   {}", step.instruction);
        if !step.prompt.is_empty() {
            println!("   Prompt: {}", step.prompt);
        }
        for done in &step.done_looks_like {
            println!("   ✓ {done}");
        }
        println!();
    }

    Ok(())
}

async fn custom(job: &str, description: &str) -> Result<()> {
    let job_id: JobId = job.parse().map_err(|_| eyre!("invalid job id: {job}"))?;
    let service = service().await?;
    let idea = service.create_custom_idea(&job_id, description).await?;

    println!("Created custom idea [{}] {}", idea.id, idea.title);
    Ok(())
}

fn config_action(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = init_config()?;
            println!("Wrote {}", path.display());
        }
        ConfigAction::Show => {
            let config = load_config()?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
