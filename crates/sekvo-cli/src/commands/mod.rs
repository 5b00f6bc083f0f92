use anyhow::Context;
use clap::{Args, Command, FromArgMatches, Subcommand};
use clap_complete::{Shell, generate};
use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

use sekvo_config::{ConfigLoader, SekvoConfig};
use sekvo_core::{CredentialField, Result};
use sekvo_llm::ProviderRegistry;

use crate::output;

mod generate;

/// Default system prompt for `generate` and `stream`.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Flags accepted by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to sekvo.toml config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// List registered providers
    Providers,
    /// Show current configuration (secrets masked)
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ProviderAction {
    /// Generate a complete response
    Generate(GenerateArgs),
    /// Stream the response as it is produced
    Stream(StreamArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct GenerateArgs {
    /// Prompt text (piped stdin takes its place)
    pub prompt: Option<String>,

    /// System prompt
    #[arg(short, long, default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    /// Config environment to use (overrides SEKVO_ENV)
    #[arg(long)]
    pub env: Option<String>,

    /// Print only the response text
    #[arg(short, long, conflicts_with = "json")]
    pub raw: bool,

    /// Print the response as {"value": ...}
    #[arg(short, long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct StreamArgs {
    /// Prompt text (piped stdin takes its place)
    pub prompt: Option<String>,

    /// System prompt
    #[arg(short, long, default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    /// Config environment to use (overrides SEKVO_ENV)
    #[arg(long)]
    pub env: Option<String>,

    /// Print only the tokens
    #[arg(short, long)]
    pub raw: bool,
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Builtin(Commands),
    Provider {
        name: String,
        action: ProviderAction,
    },
}

/// sekvo — one interface over many LLM providers
#[derive(Debug, Clone)]
pub struct Cli {
    pub global: GlobalArgs,
    pub invocation: Invocation,
}

impl Cli {
    /// The full command tree: built-in commands plus one subcommand per registered provider.
    pub fn command(registry: &ProviderRegistry) -> Command {
        let root = Command::new("sekvo")
            .version(env!("CARGO_PKG_VERSION"))
            .about("sekvo — one interface over many LLM providers")
            .propagate_version(true)
            .subcommand_required(true)
            .arg_required_else_help(true);
        let root = GlobalArgs::augment_args(root);
        let mut root = Commands::augment_subcommands(root);

        for name in registry.names() {
            let about = match registry.resolve(&name).ok().and_then(|f| f.profile()) {
                Some(profile) => format!("{} commands", profile.display_name),
                None => format!("{name} commands"),
            };
            let sub = Command::new(name).about(about).subcommand_required(true);
            root = root.subcommand(ProviderAction::augment_subcommands(sub));
        }
        root
    }

    /// Parse the process arguments against the global registry; exits on error.
    pub fn parse() -> Self {
        Self::try_parse_from(ProviderRegistry::global(), std::env::args_os())
            .unwrap_or_else(|e| e.exit())
    }

    pub fn try_parse_from<I, T>(registry: &ProviderRegistry, args: I) -> clap::error::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command(registry).try_get_matches_from(args)?;
        let global = GlobalArgs::from_arg_matches(&matches)?;
        let invocation = match matches.subcommand() {
            Some((name, sub)) if registry.contains(name) => Invocation::Provider {
                name: name.to_string(),
                action: ProviderAction::from_arg_matches(sub)?,
            },
            _ => Invocation::Builtin(Commands::from_arg_matches(&matches)?),
        };
        Ok(Self { global, invocation })
    }

    pub async fn run(self) -> Result<()> {
        self.run_with(ProviderRegistry::global()).await
    }

    /// Load config, set up logging, read piped stdin, then execute.
    pub async fn run_with(self, registry: &ProviderRegistry) -> Result<()> {
        let config_loader = ConfigLoader::load(self.global.config.as_deref())?;
        init_tracing(&self.global, config_loader.get())?;

        let piped = match self.invocation {
            Invocation::Provider { .. } => read_piped_stdin().await?,
            Invocation::Builtin(_) => None,
        };
        self.execute(&config_loader, registry, piped).await
    }

    /// Execute against an already loaded config. `piped` replaces the prompt argument.
    pub async fn execute(
        self,
        config_loader: &ConfigLoader,
        registry: &ProviderRegistry,
        piped: Option<String>,
    ) -> Result<()> {
        match self.invocation {
            Invocation::Builtin(Commands::Providers) => Self::cmd_providers(registry),
            Invocation::Builtin(Commands::Config { json }) => {
                Self::cmd_config(config_loader, json)
            }
            Invocation::Builtin(Commands::Completions { shell }) => {
                Self::cmd_completions(registry, shell)
            }
            Invocation::Provider { name, action } => match action {
                ProviderAction::Generate(args) => {
                    generate::cmd_generate(config_loader, registry, &name, args, piped).await
                }
                ProviderAction::Stream(args) => {
                    generate::cmd_stream(config_loader, registry, &name, args, piped).await
                }
            },
        }
    }

    fn cmd_providers(registry: &ProviderRegistry) -> Result<()> {
        let mut rows = Vec::new();
        for name in registry.names() {
            let factory = registry.resolve(&name)?;
            let row = match factory.profile() {
                Some(p) => vec![
                    name.clone(),
                    p.display_name.to_string(),
                    p.default_model.to_string(),
                    format!(
                        "{} (or {})",
                        p.credential.key(),
                        p.credential.fallback_env_var(p.name)
                    ),
                ],
                None => vec![name.clone(), name.clone(), "-".into(), "-".into()],
            };
            rows.push(row);
        }
        println!(
            "{}",
            output::render_table(&["PROVIDER", "NAME", "DEFAULT MODEL", "CREDENTIAL"], &rows)
        );
        Ok(())
    }

    fn cmd_config(config_loader: &ConfigLoader, json: bool) -> Result<()> {
        let config = masked(config_loader.get());
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!("# {}", config_loader.path().display());
            if let Some(env) = config_loader.active_env(None) {
                println!("# active environment: {env}");
            }
            println!(
                "{}",
                toml::to_string_pretty(&config)
                    .map_err(|e| sekvo_core::SekvoError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_completions(registry: &ProviderRegistry, shell: Shell) -> Result<()> {
        let mut cmd = Self::command(registry);
        generate(shell, &mut cmd, "sekvo", &mut std::io::stdout());
        Ok(())
    }
}

/// Copy of the config with every API key masked.
fn masked(config: &SekvoConfig) -> SekvoConfig {
    let mut config = config.clone();
    for env in config.environments.values_mut() {
        *env = env.masked();
    }
    config
}

/// Credential field a provider needs; custom providers are assumed to take an API key.
pub(crate) fn credential_for(registry: &ProviderRegistry, name: &str) -> CredentialField {
    registry
        .resolve(name)
        .ok()
        .and_then(|f| f.profile())
        .map(|p| p.credential)
        .unwrap_or(CredentialField::ApiKey)
}

async fn read_piped_stdin() -> Result<Option<String>> {
    if std::io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut buf = String::new();
    tokio::io::stdin().read_to_string(&mut buf).await?;
    let trimmed = buf.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

/// Initialize tracing on stderr so stdout stays clean for piping.
///
/// Level: RUST_LOG > --verbose > --quiet > --log-level > config.
fn init_tracing(global: &GlobalArgs, config: &SekvoConfig) -> Result<()> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt::writer::BoxMakeWriter;

    let log_level = if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        global
            .log_level
            .as_deref()
            .unwrap_or(config.logging.level.as_str())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let writer = match config.logging.file {
        Some(ref path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    let result = match config.logging.format.as_str() {
        "json" => builder.json().with_target(true).try_init(),
        "compact" => builder.compact().with_target(false).try_init(),
        _ => builder.with_target(false).try_init(),
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}
