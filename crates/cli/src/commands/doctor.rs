//! `murmur doctor` — diagnose configuration problems.

use murmur_config::AppConfig;
use murmur_core::ModelService as _;

pub fn run() -> anyhow::Result<()> {
    println!("murmur doctor");
    println!();

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  [ok] config file: {}", config_path.display());
    } else {
        println!(
            "  [--] no config file at {} (defaults in effect, run `murmur onboard`)",
            config_path.display()
        );
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  [ok] config loads and validates");
            config
        }
        Err(e) => {
            println!("  [!!] config failed to load: {e}");
            anyhow::bail!("fix the config file and re-run");
        }
    };

    if config.has_api_key() {
        println!("  [ok] API key present");
    } else if config.model.provider == "ollama" {
        println!("  [ok] no API key needed for ollama");
    } else {
        println!("  [!!] no API key (set MURMUR_API_KEY)");
    }

    match murmur_providers::from_config(&config.model) {
        Ok(model) => println!(
            "  [ok] model backend '{}' ready (model: {})",
            model.name(),
            config.model.model
        ),
        Err(e) => println!("  [!!] model backend: {e}"),
    }

    match murmur_tools::builtin_registry() {
        Ok(registry) => println!("  [ok] {} tools registered", registry.names().len()),
        Err(e) => println!("  [!!] tool registry: {e}"),
    }

    println!();
    println!(
        "  scheduler: check every {}s, default policy {:?}",
        config.scheduler.task_check_interval_secs, config.scheduler.default_policy
    );
    println!(
        "  budgets: reply {} steps, task {} steps, deadline {}s",
        config.agent.reply_max_steps, config.agent.task_max_steps, config.agent.run_deadline_secs
    );

    Ok(())
}
