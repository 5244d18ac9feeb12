use anyhow::{Result, bail};

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::Config;
use crate::ui;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(ctx),
        ConfigCommand::Init { force } => init(ctx, force),
        ConfigCommand::Path => {
            println!("{}", ctx.config_path.display());
            Ok(())
        }
    }
}

fn show(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    ui::header("Configuration");

    println!();
    let state = if ctx.config_path.exists() {
        ""
    } else {
        " (not found, using defaults)"
    };
    ui::kv("file", &format!("{}{}", ctx.config_path.display(), state));

    ui::section("topo");
    ui::kv("endpoint", &config.topo.endpoint);
    ui::kv("user", &config.topo.user);
    ui::kv("supplier_account", &config.topo.supplier_account);
    ui::kv("timeout_secs", &config.topo.timeout_secs.to_string());

    ui::section("registry");
    ui::kv("endpoint", &config.registry.endpoint);
    ui::kv("path", &config.registry.path);
    ui::kv("ttl_secs", &config.registry.ttl_secs.to_string());

    println!();
    ui::dim("SETSYNC_ENDPOINT and SETSYNC_USER override the file.");
    Ok(())
}

fn init(ctx: &Context, force: bool) -> Result<()> {
    let path = &ctx.config_path;
    if path.exists() && !force {
        bail!(
            "{} already exists, use --force to overwrite",
            path.display()
        );
    }

    Config::default().save_to(path)?;
    ui::success(&format!("Wrote {}", path.display()));
    Ok(())
}
