use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use clap::Parser;
use macguard::context::AppContext;
use macguard::registry::DeviceUpdate;
use macguard::report;
use macguard::settings::{Settings, DEFAULT_SETTINGS_PATH};

mod cli;

use cli::{Cli, Command, OutputFormat, Toggle};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = resolve_settings(cli.config.as_deref())?;
    let ctx = AppContext::new(settings);

    match cli.command {
        Command::List(args) => run_list(&ctx, args.format),
        Command::Show(args) => run_show(&ctx, args.id, args.format),
        Command::Add(args) => run_add(&ctx, &args.name, &args.mac),
        Command::Update(args) => run_update(&ctx, args),
        Command::Delete(args) => run_delete(&ctx, args.id),
        Command::Import(args) => run_import(&ctx, &args.file),
        Command::Export(args) => run_export(&ctx, args.format),
        Command::Stats(args) => run_stats(&ctx, args.format),
        Command::Sync => run_sync(&ctx),
        Command::Setup => run_setup(&ctx),
        Command::Rule(args) => run_rule(&ctx, args.enable),
        Command::Enforce(args) => run_enforce(&ctx, args.state),
        Command::Status(args) => run_status(&ctx, args.format),
    }
}

/// An explicit `--config` path must parse; the implicit default path falls
/// back to embedded defaults with a warning, so a fresh checkout works.
fn resolve_settings(path: Option<&Path>) -> Result<Settings> {
    if let Some(path) = path {
        return Settings::load_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()));
    }

    let default = Path::new(DEFAULT_SETTINGS_PATH);
    if !default.exists() {
        return Ok(Settings::default());
    }
    match Settings::load_file(default) {
        Ok(settings) => Ok(settings),
        Err(err) => {
            eprintln!("warning: {err}; using embedded defaults");
            Ok(Settings::default())
        }
    }
}

fn emit_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
}

fn run_list(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let loaded = ctx.registry.list()?;
    emit_warnings(&loaded.warnings);
    match format {
        OutputFormat::Text => println!("{}", report::render_devices(&loaded.devices)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&loaded.devices)?),
    }
    Ok(())
}

fn run_show(ctx: &AppContext, id: u32, format: OutputFormat) -> Result<()> {
    let device = ctx.registry.get(id)?;
    match format {
        OutputFormat::Text => println!("{}", report::render_device(&device)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&device)?),
    }
    Ok(())
}

fn run_add(ctx: &AppContext, name: &str, mac: &str) -> Result<()> {
    let saved = ctx.registry.add(name, mac)?;
    emit_warnings(&saved.warnings);
    println!(
        "added device '{}' with MAC {} (id {})",
        saved.value.name, saved.value.mac, saved.value.id
    );
    Ok(())
}

fn run_update(ctx: &AppContext, args: cli::UpdateArgs) -> Result<()> {
    let update = DeviceUpdate {
        name: args.name,
        mac: args.mac,
        enabled: args.enabled,
    };
    let saved = ctx.registry.update(args.id, update)?;
    emit_warnings(&saved.warnings);
    println!("{}", report::render_device(&saved.value));
    if !saved.value.enabled {
        println!("device disabled; it is no longer persisted and its id is not reserved");
    }
    Ok(())
}

fn run_delete(ctx: &AppContext, id: u32) -> Result<()> {
    let saved = ctx.registry.delete(id)?;
    emit_warnings(&saved.warnings);
    println!("deleted device {id}");
    Ok(())
}

fn run_import(ctx: &AppContext, file: &Path) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("failed to read import file {}", file.display()))?;
    let outcome = ctx.registry.import_from_text(&text)?;
    emit_warnings(&outcome.warnings);
    println!("{}", report::render_import(&outcome));
    Ok(())
}

fn run_export(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let export = ctx
        .registry
        .export_snapshot(&ctx.settings.firewall.alias_name)?;
    match format {
        OutputFormat::Text => println!("{}", report::render_export(&export)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&export)?),
    }
    Ok(())
}

fn run_stats(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let stats = ctx.registry.stats()?;
    match format {
        OutputFormat::Text => println!("{}", report::render_stats(&stats)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
    }
    Ok(())
}

fn run_sync(ctx: &AppContext) -> Result<()> {
    let outcome = ctx.reconciler.sync_alias(&ctx.registry)?;
    println!("{}", report::render_sync(&outcome, "device alias synced"));
    Ok(())
}

fn run_setup(ctx: &AppContext) -> Result<()> {
    let alias = ctx.reconciler.sync_alias(&ctx.registry)?;
    println!("{}", report::render_sync(&alias, "device alias synced"));
    let rule = ctx.reconciler.ensure_block_rule(false)?;
    println!("{}", report::render_sync(&rule, "block rule created (disabled)"));
    println!("run 'macguard enforce on' to start blocking");
    Ok(())
}

fn run_rule(ctx: &AppContext, enable: bool) -> Result<()> {
    let outcome = ctx.reconciler.ensure_block_rule(enable)?;
    let what = if enable {
        "block rule in place (enabled)"
    } else {
        "block rule in place (disabled)"
    };
    println!("{}", report::render_sync(&outcome, what));
    Ok(())
}

fn run_enforce(ctx: &AppContext, state: Toggle) -> Result<()> {
    let enabled = matches!(state, Toggle::On);
    let outcome = ctx.reconciler.set_enforcement(enabled)?;
    let what = if enabled {
        "enforcement enabled"
    } else {
        "enforcement disabled"
    };
    println!("{}", report::render_sync(&outcome, what));
    Ok(())
}

fn run_status(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let status = ctx.reconciler.status(&ctx.registry)?;
    match format {
        OutputFormat::Text => println!("{}", report::render_status(&status)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
    }
    Ok(())
}
