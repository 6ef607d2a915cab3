//! Profile commands: `kiln profiles` and `kiln check`.

use std::path::Path;

use kiln_core::toolchain::ensure_available;
use kiln_core::{ProfileRegistry, Settings, SystemToolchain};

use crate::colors;

fn registry(config: Option<&Path>) -> anyhow::Result<ProfileRegistry> {
    let settings = Settings::discover(config)?;
    let mut registry = ProfileRegistry::builtin();
    settings.apply_overrides(&mut registry)?;
    Ok(registry)
}

/// List every target profile.
pub fn list(config: Option<&Path>) -> anyhow::Result<()> {
    let registry = registry(config)?;

    println!(
        "{}{:<12}{:<14}{:<6}{}{}",
        colors::BOLD,
        "ID",
        "NAME",
        "EXT",
        "BUILD",
        colors::RESET
    );
    for profile in registry.profiles() {
        println!(
            "{:<12}{:<14}{:<6}{}",
            profile.id,
            profile.display_name,
            profile.file_extension,
            profile.build_command.as_deref().unwrap_or("(asset)")
        );
    }
    Ok(())
}

/// Probe toolchains; with no target, every profile that needs one.
pub fn check(target: Option<&str>, config: Option<&Path>) -> anyhow::Result<()> {
    let registry = registry(config)?;
    let toolchain = SystemToolchain::new();

    let profiles: Vec<_> = match target {
        Some(id) => vec![registry.lookup_by_id(id)?],
        None => registry.profiles().iter().filter(|p| !p.is_asset()).collect(),
    };

    let mut failures = 0;
    for profile in &profiles {
        print!("  {}◆ {}{} ... ", colors::BLUE, profile.id, colors::RESET);
        colors::flush_stdout();
        match ensure_available(&toolchain, profile) {
            Ok(()) => println!("{}✓{}", colors::GREEN, colors::RESET),
            Err(e) => {
                failures += 1;
                println!("{}✗{} {}{}{}", colors::RED, colors::RESET, colors::DIM, e, colors::RESET);
            }
        }
    }

    if target.is_some() && failures > 0 {
        anyhow::bail!("toolchain for {} is not available", profiles[0].id);
    }
    Ok(())
}
