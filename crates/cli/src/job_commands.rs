use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    anyhow::{Context as _, Result, bail},
    autocron_config::{AutocronConfig, load_or_discover},
    autocron_cron::{
        FileStore, JobIdentity, JobOptions, Outcome, Registrar, Registration,
        job::canonical_script,
    },
    clap::Args,
    tracing::{info, warn},
};

/// Owner recorded for jobs registered from the command line.
const OWNER: &str = "autocron-cli";

#[derive(Args)]
pub struct RegisterArgs {
    /// Human-chosen job name.
    #[arg(long)]
    identifier: String,
    /// Script the crontab entry runs.
    #[arg(long)]
    script: PathBuf,
    /// Five cron fields or an `@` macro, e.g. "*/5 * * * *" or "@daily".
    #[arg(long)]
    schedule: String,
    /// Program that runs the script, e.g. /bin/sh.
    #[arg(long)]
    interpreter: Option<String>,
}

/// Selects one job by identifier and script.
#[derive(Args)]
pub struct JobArgs {
    #[arg(long)]
    identifier: String,
    /// Script the job was registered with (default: from config).
    #[arg(long)]
    script: Option<PathBuf>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Show every entry, not only registered jobs.
    #[arg(long, conflicts_with = "identifier")]
    all: bool,
    /// Only show the entries of this job.
    #[arg(long)]
    identifier: Option<String>,
    /// Script of the job given by --identifier (default: from config).
    #[arg(long, requires = "identifier")]
    script: Option<PathBuf>,
}

/// Loaded config plus the registrar built from it.
pub struct Context {
    config: AutocronConfig,
    base_dir: PathBuf,
    registrar: Registrar,
}

impl Context {
    pub fn load(config: Option<&Path>, crontab_file: Option<&Path>) -> Result<Self> {
        let (config, path) = load_or_discover(config)?;
        let base_dir = match path.as_deref().and_then(Path::parent) {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => std::env::current_dir().context("cannot determine working directory")?,
        };
        let registrar = match crontab_file {
            Some(file) => Registrar::new(Arc::new(FileStore::new(file)))
                .with_policy(config.registration),
            None => config.registrar()?,
        };
        Ok(Self {
            config,
            base_dir,
            registrar,
        })
    }
}

impl Context {
    /// Identity a job registered by this tool gets. Without `script`, the
    /// script of the job declared in config under `identifier` is used.
    fn identity(&self, identifier: &str, script: Option<&Path>) -> Result<JobIdentity> {
        let script = match script {
            Some(script) => script.to_path_buf(),
            None => match self.config.job(identifier) {
                Some(job) => job.script_from(&self.base_dir),
                None => bail!("job \"{identifier}\" is not in the config; pass --script"),
            },
        };
        let script = canonical_script(&script)?;
        Ok(JobIdentity::new(identifier, &[
            script.display().to_string(),
            OWNER.to_string(),
        ])?)
    }
}

fn describe(registration: &Registration) -> String {
    let mut text = match registration.outcome {
        Outcome::Inserted => "added".to_string(),
        Outcome::Updated {
            schedule_changed: false,
            command_changed: false,
        } => "unchanged".to_string(),
        Outcome::Updated {
            schedule_changed,
            command_changed,
        } => {
            let mut parts = Vec::new();
            if schedule_changed {
                parts.push("schedule");
            }
            if command_changed {
                parts.push("command");
            }
            format!("updated {}", parts.join(" and "))
        },
    };
    if registration.duplicates_found > 0 {
        text.push_str(&format!(
            " ({} duplicate(s), {} removed)",
            registration.duplicates_found, registration.duplicates_removed
        ));
    }
    text
}

async fn register_options(ctx: &Context, options: JobOptions) -> Result<Registration> {
    let identifier = options.identifier.clone();
    let prepared = options
        .prepare(OWNER, &[])
        .with_context(|| format!("job \"{identifier}\""))?;
    let (_, registration) = prepared
        .register(&ctx.registrar)
        .await
        .with_context(|| format!("registering \"{identifier}\""))?;
    Ok(registration)
}

pub async fn register(ctx: &Context, args: RegisterArgs) -> Result<()> {
    let mut options = JobOptions::new(args.identifier, args.script, args.schedule.as_str());
    options.interpreter = args.interpreter;
    let identifier = options.identifier.clone();
    let registration = register_options(ctx, options).await?;
    println!(
        "{identifier}: {} [{}]",
        describe(&registration),
        registration.fingerprint
    );
    Ok(())
}

pub async fn sync(ctx: &Context) -> Result<()> {
    if ctx.config.jobs.is_empty() {
        warn!("no jobs declared in config");
        return Ok(());
    }

    let mut failed = 0;
    for job in &ctx.config.jobs {
        let mut options = job.options();
        options.script_path = job.script_from(&ctx.base_dir);
        match register_options(ctx, options).await {
            Ok(registration) => println!(
                "{}: {} [{}]",
                job.identifier,
                describe(&registration),
                registration.fingerprint
            ),
            Err(e) => {
                failed += 1;
                eprintln!("{}: {e:#}", job.identifier);
            },
        }
    }

    info!(
        jobs = ctx.config.jobs.len(),
        failed,
        store = %ctx.registrar.store().describe(),
        "sync finished"
    );
    if failed > 0 {
        bail!("{failed} of {} job(s) failed to register", ctx.config.jobs.len());
    }
    Ok(())
}

pub async fn list(ctx: &Context, args: ListArgs) -> Result<()> {
    let entries = match args.identifier {
        Some(identifier) => {
            let identity = ctx.identity(&identifier, args.script.as_deref())?;
            ctx.registrar.find(&identity).await?
        },
        None => ctx
            .registrar
            .snapshot()
            .await?
            .entries()
            .filter(|entry| args.all || entry.comment.contains("(Job ID "))
            .cloned()
            .collect(),
    };

    if entries.is_empty() {
        eprintln!("No entries in {}.", ctx.registrar.store().describe());
        return Ok(());
    }
    for entry in &entries {
        let state = if entry.enabled { "" } else { " (disabled)" };
        println!("{}  {}{state}", entry.timing(), entry.command);
        if !entry.comment.is_empty() {
            println!("    # {}", entry.comment);
        }
    }
    Ok(())
}

pub async fn remove(ctx: &Context, args: JobArgs) -> Result<()> {
    let identity = ctx.identity(&args.identifier, args.script.as_deref())?;
    let removed = ctx.registrar.unregister(&identity).await?;
    println!("{}: removed {removed} entr{}", args.identifier, if removed == 1 {
        "y"
    } else {
        "ies"
    });
    Ok(())
}

pub fn fingerprint(ctx: &Context, args: JobArgs) -> Result<()> {
    let identity = ctx.identity(&args.identifier, args.script.as_deref())?;
    println!("{}", identity.fingerprint());
    Ok(())
}
