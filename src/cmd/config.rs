//! Configuration view and validation commands: `frontsmith config`.

use anyhow::Result;

use frontsmith::config::{CONFIG_DIR, CONFIG_FILE, FrontsmithConfig, FrontsmithToml};

use super::super::ConfigCommands;

fn print_toml(toml: &FrontsmithToml) {
    println!("[model]");
    println!("  backend = \"{}\"", toml.model.backend);
    if let Some(cmd) = &toml.model.command {
        println!("  command = \"{}\"", cmd);
    }
    println!("  base_url = \"{}\"", toml.model.base_url);
    println!("  api_key_env = \"{}\"", toml.model.api_key_env);
    let stages = &toml.model.stages;
    for (name, model) in [
        ("router", &stages.router),
        ("refiner", &stages.refiner),
        ("generator", &stages.generator),
        ("checker", &stages.checker),
    ] {
        if let Some(model) = model {
            println!("  stages.{} = \"{}\"", name, model);
        }
    }
    println!();
    println!("[workflow]");
    println!("  max_steps = {}", toml.workflow.max_steps);
    println!();
    println!("[server]");
    println!("  port = {}", toml.server.port);
    println!();
    println!("[export]");
    println!("  directory = \"{}\"", toml.export.directory);
    println!();
}

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    let config_dir = project_dir.join(CONFIG_DIR);
    let config_path = config_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("frontsmith Configuration");
            println!("========================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
                println!();
                print_toml(&FrontsmithToml::load(&config_path)?);

                println!("Effective values (with env overrides):");
                let config = FrontsmithConfig::new(project_dir.to_path_buf())?;
                println!("  command = \"{}\"", config.model_command());
                println!("  store = {}", config.store_path().display());
                println!();
            } else {
                println!("No frontsmith.toml found at {}", config_path.display());
                println!();
                println!("Using default configuration:");
                print_toml(&FrontsmithToml::default());
                println!("Run 'frontsmith config init' to create a frontsmith.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No frontsmith.toml found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = FrontsmithToml::load(&config_path)?.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("frontsmith.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&config_dir)?;
            FrontsmithToml::default().save(&config_path)?;

            println!("Created frontsmith.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [model] backend, command, base_url, api_key_env");
            println!("  - [model.stages] per-stage model names");
            println!("  - [workflow] max_steps, [server] port, [export] directory");
            println!();
        }
    }

    Ok(())
}
