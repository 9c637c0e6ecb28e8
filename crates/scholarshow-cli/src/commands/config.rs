use std::env;

use scholarshow_core::config::{
    ClientConfig, ENV_SHARE_BASE_URL, ENV_SUPABASE_ANON_KEY, ENV_SUPABASE_URL,
};

use crate::cli::ConfigCommands;
use crate::commands::common::{effective_config, resolve_db_path};
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            share_base_url,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ClientConfig {
                supabase_url,
                supabase_anon_key,
                share_base_url,
                r2: None,
            },
            no_activate,
        ),
        ConfigCommands::Show => run_config_show(global_profile),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    explicit: ClientConfig,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(explicit, existing, |key| env::var(key).ok()).normalized()?;
    merged.supabase()?;
    *config.profile_mut_or_default(&profile_name) = merged.clone();

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let missing = missing_fields(&merged);
    if missing.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Run `scholarshow auth login --email <email> --password <password>`."
        );
    } else {
        println!(
            "Profile '{}' runs local only; missing: {}",
            profile_name,
            missing.join(", ")
        );
    }
    Ok(())
}

/// Explicit values, then the environment, then what the profile already had.
pub fn merge_profile(
    explicit: ClientConfig,
    existing: ClientConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ClientConfig {
    let pick = |value: Option<String>, key: &str, current: Option<String>| {
        value
            .filter(|value| !value.trim().is_empty())
            .or_else(|| lookup(key).filter(|value| !value.trim().is_empty()))
            .or(current)
    };
    ClientConfig {
        supabase_url: pick(explicit.supabase_url, ENV_SUPABASE_URL, existing.supabase_url),
        supabase_anon_key: pick(
            explicit.supabase_anon_key,
            ENV_SUPABASE_ANON_KEY,
            existing.supabase_anon_key,
        ),
        share_base_url: pick(
            explicit.share_base_url,
            ENV_SHARE_BASE_URL,
            existing.share_base_url,
        ),
        r2: existing.r2,
    }
}

pub fn missing_fields(config: &ClientConfig) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if config.supabase_url.is_none() {
        missing.push("supabase_url");
    }
    if config.supabase_anon_key.is_none() {
        missing.push("supabase_anon_key");
    }
    missing
}

fn run_config_show(global_profile: Option<&str>) -> Result<(), CliError> {
    let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = profiles.resolve_profile_name(global_profile);
    let config = effective_config(&profiles, &profile_name, |key| env::var(key).ok())?;

    println!("profile:           {profile_name}");
    for line in describe_config(&config) {
        println!("{line}");
    }
    println!("database:          {}", resolve_db_path(None)?.display());
    Ok(())
}

pub fn describe_config(config: &ClientConfig) -> Vec<String> {
    let show = |value: Option<&str>| value.unwrap_or("(not set)").to_string();
    vec![
        format!("supabase_url:      {}", show(config.supabase_url.as_deref())),
        format!(
            "supabase_anon_key: {}",
            show(config.supabase_anon_key.as_ref().map(|_| "(set)"))
        ),
        format!("share_base_url:    {}", show(config.share_base_url.as_deref())),
        format!(
            "r2_bucket:         {}",
            show(config.r2.as_ref().map(|r2| r2.bucket.as_str()))
        ),
    ]
}
