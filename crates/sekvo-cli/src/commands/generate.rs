use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use sekvo_config::ConfigLoader;
use sekvo_core::{Result, SekvoError};
use sekvo_llm::{BaseProvider, ProviderRegistry};
use tracing::debug;

use super::{GenerateArgs, StreamArgs, credential_for};
use crate::output;

/// Piped stdin wins over the positional prompt.
pub(crate) fn resolve_prompt(arg: Option<String>, piped: Option<String>) -> Result<String> {
    piped
        .or(arg)
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| {
            SekvoError::Usage("no prompt given: pass it as an argument or pipe it on stdin".into())
        })
}

/// Resolve config for `name` and create a fresh provider instance.
pub(crate) fn build_provider(
    config_loader: &ConfigLoader,
    registry: &ProviderRegistry,
    name: &str,
    env: Option<&str>,
) -> Result<Arc<dyn BaseProvider>> {
    let factory = registry.resolve(name)?;
    let env_name = config_loader.active_env(env);
    let config =
        config_loader.provider_config(name, credential_for(registry, name), env_name.as_deref());
    debug!(provider = name, env = ?env_name, "creating provider");
    factory.create(env_name.as_deref(), config)
}

fn display_name(registry: &ProviderRegistry, name: &str) -> String {
    registry
        .resolve(name)
        .ok()
        .and_then(|f| f.profile())
        .map(|p| p.display_name.to_string())
        .unwrap_or_else(|| name.to_string())
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub(crate) async fn cmd_generate(
    config_loader: &ConfigLoader,
    registry: &ProviderRegistry,
    name: &str,
    args: GenerateArgs,
    piped: Option<String>,
) -> Result<()> {
    let prompt = resolve_prompt(args.prompt, piped)?;
    let provider = build_provider(config_loader, registry, name, args.env.as_deref())?;
    let title = display_name(registry, name);

    let pb = (!args.raw && !args.json).then(|| spinner(format!("Asking {title}...")));
    let result = provider.generate(&prompt, Some(&args.system_prompt)).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let text = result?;

    if args.json {
        println!("{}", output::json_value(&text)?);
    } else if args.raw {
        println!("{text}");
    } else {
        output::print_panel(&format!("{title} Generation"), &text);
    }
    Ok(())
}

pub(crate) async fn cmd_stream(
    config_loader: &ConfigLoader,
    registry: &ProviderRegistry,
    name: &str,
    args: StreamArgs,
    piped: Option<String>,
) -> Result<()> {
    let prompt = resolve_prompt(args.prompt, piped)?;
    let provider = build_provider(config_loader, registry, name, args.env.as_deref())?;
    let title = display_name(registry, name);

    let caps = provider.initialize().await?;
    if !caps.streaming {
        eprintln!(
            "{}",
            console::style(format!(
                "{title} does not support streaming. Falling back to regular generation."
            ))
            .yellow()
        );
    }

    if !args.raw {
        println!("{}", output::frame_top(&format!("{title} Generation (Streaming)")));
    }

    let mut stream = provider
        .generate_stream(&prompt, Some(&args.system_prompt))
        .await?;
    let mut stdout = std::io::stdout();
    while let Some(token) = stream.next_token().await {
        let token = token?;
        stdout.write_all(token.as_bytes())?;
        stdout.flush()?;
    }
    println!();

    if !args.raw {
        println!("{}", output::frame_bottom());
    }
    Ok(())
}
