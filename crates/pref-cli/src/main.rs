use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use pref_cli::{execute, PrefConfig, Request, DEFAULT_CONFIG, VERSION};
use pref_reconcile::presets::BOLD_COMPOSITE;
use pref_value::{ItemId, SettingKey};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn item_arg() -> Arg {
    Arg::new("item")
        .long("item")
        .required(true)
        .help("Item identity owning the provenance cache")
}

fn composite_arg() -> Arg {
    Arg::new("composite")
        .long("composite")
        .default_value(BOLD_COMPOSITE)
        .help("Composite rule name")
}

fn cli() -> Command {
    Command::new("prefctl")
        .version(VERSION)
        .about("Apply and restore settings bundles without clobbering user edits")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .default_value(DEFAULT_CONFIG)
                .value_parser(value_parser!(PathBuf))
                .help("Config file"),
        )
        .subcommand(
            Command::new("apply")
                .about("Reconcile an item toward a bundle")
                .arg(item_arg())
                .arg(Arg::new("bundle").long("bundle").required(true).help("Bundle name")),
        )
        .subcommand(
            Command::new("restore")
                .about("Revert every setting an item still owns")
                .arg(item_arg()),
        )
        .subcommand(
            Command::new("merge")
                .about("Contribute a composite rule")
                .arg(item_arg())
                .arg(composite_arg()),
        )
        .subcommand(
            Command::new("unmerge")
                .about("Withdraw a composite rule")
                .arg(item_arg())
                .arg(composite_arg()),
        )
        .subcommand(
            Command::new("toggle")
                .about("Run the bindings of a toggle setting")
                .arg(Arg::new("setting").required(true).help("Toggle setting key")),
        )
        .subcommand(Command::new("activate").about("Run activation bindings"))
        .subcommand(
            Command::new("show")
                .about("Print what an item owns")
                .arg(item_arg()),
        )
}

fn string(args: &ArgMatches, name: &str) -> Result<String> {
    args.get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing --{name}"))
}

fn request(matches: &ArgMatches) -> Result<Request> {
    let request = match matches.subcommand() {
        Some(("apply", args)) => Request::Apply {
            item: ItemId::new(string(args, "item")?),
            bundle: string(args, "bundle")?,
        },
        Some(("restore", args)) => Request::Restore {
            item: ItemId::new(string(args, "item")?),
        },
        Some(("merge", args)) => Request::Merge {
            item: ItemId::new(string(args, "item")?),
            composite: string(args, "composite")?,
        },
        Some(("unmerge", args)) => Request::Unmerge {
            item: ItemId::new(string(args, "item")?),
            composite: string(args, "composite")?,
        },
        Some(("toggle", args)) => Request::Toggle {
            setting: SettingKey::new(string(args, "setting")?),
        },
        Some(("activate", _)) => Request::Activate,
        Some(("show", args)) => Request::Show {
            item: ItemId::new(string(args, "item")?),
        },
        _ => anyhow::bail!("unknown command"),
    };
    Ok(request)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let request = request(&matches)?;

    let config = PrefConfig::load(&config_path)
        .await
        .with_context(|| format!("loading {}", config_path.display()))?;
    let controller = config.open().await.context("opening settings and cache files")?;

    let outcome = execute(&controller, request).await?;
    for line in &outcome.lines {
        println!("{line}");
    }

    std::process::exit(if outcome.clean { 0 } else { 1 });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn apply_parses_item_and_bundle() {
        let matches = cli()
            .try_get_matches_from(["prefctl", "apply", "--item", "mode", "--bundle", "basic"])
            .unwrap();
        assert_eq!(
            request(&matches).unwrap(),
            Request::Apply {
                item: ItemId::new("mode"),
                bundle: "basic".into()
            }
        );
    }

    #[test]
    fn merge_defaults_to_bold_composite() {
        let matches = cli()
            .try_get_matches_from(["prefctl", "--config", "x.toml", "merge", "--item", "bold"])
            .unwrap();
        assert_eq!(
            request(&matches).unwrap(),
            Request::Merge {
                item: ItemId::new("bold"),
                composite: BOLD_COMPOSITE.into()
            }
        );
        assert_eq!(
            matches.get_one::<PathBuf>("config"),
            Some(&PathBuf::from("x.toml"))
        );
    }
}
