//! `gallery` - manage the eight image slots of one owner from a terminal

mod config;
mod host;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use config::CliConfig;
use gallery_azure::{AzureBlobStore, DataverseMetadataStore};
use gallery_core::{
    Collaborators, Confirm, Gallery, SasToken, Slot, SystemClock, UploadReport,
};
use host::{AutoConfirm, JpegThumbnails, StdinConfirm, TerminalSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("gallery")
        .version(gallery_core::VERSION)
        .about("Property image gallery: eight image slots per owner")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .env("GALLERY_CONFIG")
                .default_value("gallery.toml")
                .value_parser(value_parser!(PathBuf))
                .global(true)
                .help("Path to the TOML configuration file"),
        )
        .arg(
            Arg::new("owner")
                .long("owner")
                .short('o')
                .env("GALLERY_OWNER")
                .global(true)
                .help("Owner record id the images belong to"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .default_value("text")
                .value_parser(["text", "json"])
                .global(true)
                .help("Log output format"),
        )
        .subcommand(Command::new("list").about("Show the slot grid"))
        .subcommand(
            Command::new("upload")
                .about("Upload images into empty slots")
                .arg(
                    Arg::new("files")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(PathBuf))
                        .help("Image files, at most eight are used"),
                ),
        )
        .subcommand(
            Command::new("replace")
                .about("Replace the image in a slot")
                .arg(
                    Arg::new("slot")
                        .required(true)
                        .value_parser(value_parser!(usize))
                        .help("Slot ordinal, 0 to 7"),
                )
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("New image file"),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete the image in a slot")
                .arg(
                    Arg::new("slot")
                        .required(true)
                        .value_parser(value_parser!(usize))
                        .help("Slot ordinal, 0 to 7"),
                )
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .short('y')
                        .action(ArgAction::SetTrue)
                        .help("Do not ask for confirmation"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn build_gallery(config: &CliConfig, confirm: Arc<dyn Confirm>) -> Result<Gallery> {
    let blobs = AzureBlobStore::new(&config.blob).context("failed to set up blob storage")?;
    let records =
        DataverseMetadataStore::new(config.dataverse.clone()).context("failed to set up Dataverse")?;

    Ok(Gallery::new(
        config.gallery.clone(),
        Collaborators {
            blobs: Arc::new(blobs),
            records: Arc::new(records),
            thumbnails: Arc::new(JpegThumbnails::new(
                config.thumbnail.max_side,
                config.thumbnail.quality,
            )),
            confirm,
            clock: Arc::new(SystemClock),
            notices: Arc::new(TerminalSink),
        },
    ))
}

fn print_slots(slots: &[Slot]) {
    for (ordinal, slot) in slots.iter().enumerate() {
        match (slot.display.blob_url(), &slot.record_id) {
            (None, _) => println!("[{ordinal}] (empty)"),
            (Some(url), Some(record)) => println!("[{ordinal}] {url}  record={record}"),
            (Some(url), None) => println!("[{ordinal}] {url}  record=(unlinked)"),
        }
    }
}

fn print_report(report: &UploadReport) {
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(slot) => println!("{} -> slot {slot}", outcome.file),
            Err(error) => println!("{} failed: {error}", outcome.file),
        }
    }
    if report.ignored > 0 {
        println!("{} file(s) ignored: only eight slots exist", report.ignored);
    }
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let path = matches
        .get_one::<PathBuf>("config")
        .context("missing --config")?;
    let owner = matches
        .get_one::<String>("owner")
        .context("--owner (or GALLERY_OWNER) is required")?;
    let config = CliConfig::load(path)?.with_env(|key| std::env::var(key).ok());

    let (command, args) = matches.subcommand().context("missing subcommand")?;
    let confirm: Arc<dyn Confirm> = if command == "delete" && args.get_flag("yes") {
        Arc::new(AutoConfirm)
    } else {
        Arc::new(StdinConfirm)
    };

    let gallery = build_gallery(&config, confirm)?;
    let credential = SasToken::new(config.sas_token.clone().unwrap_or_default());
    if credential.is_empty() {
        tracing::warn!("no SAS token configured; blob requests will be anonymous");
    }
    let loaded = gallery
        .bind(owner, credential)
        .await
        .with_context(|| format!("failed to load images for {owner}"))?;
    tracing::info!(owner = %owner, loaded, "gallery bound");

    match command {
        "list" => {}
        "upload" => {
            let files = args
                .get_many::<PathBuf>("files")
                .context("missing files")?
                .map(|path| host::load_image(path))
                .collect::<Result<Vec<_>>>()?;
            let report = gallery.upload_images(files).await?;
            print_report(&report);
            print_slots(&gallery.slots());
            if report.failed() > 0 {
                bail!("{} of {} uploads failed", report.failed(), report.outcomes.len());
            }
            return Ok(());
        }
        "replace" => {
            let slot = *args.get_one::<usize>("slot").context("missing slot")?;
            let path = args.get_one::<PathBuf>("file").context("missing file")?;
            let file = host::load_image(path)?;
            gallery.replace_image(slot, file).await?;
        }
        "delete" => {
            let slot = *args.get_one::<usize>("slot").context("missing slot")?;
            match gallery.delete_image(slot).await {
                Ok(()) => {}
                Err(error) if error.is_silent() => println!("Delete cancelled."),
                Err(error) => return Err(error.into()),
            }
        }
        other => bail!("unknown command {other}"),
    }

    print_slots(&gallery.slots());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let json = matches.get_one::<String>("log-format").map(String::as_str) == Some("json");
    init_tracing(json);

    run(&matches).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_delete_parses_slot_and_yes() {
        let matches = cli()
            .try_get_matches_from(["gallery", "--owner", "p-1", "delete", "3", "--yes"])
            .unwrap();
        let (command, args) = matches.subcommand().unwrap();
        assert_eq!(command, "delete");
        assert_eq!(args.get_one::<usize>("slot"), Some(&3));
        assert!(args.get_flag("yes"));
        assert_eq!(matches.get_one::<String>("owner").map(String::as_str), Some("p-1"));
    }

    #[test]
    fn test_owner_after_subcommand_reaches_top_level() {
        let matches = cli()
            .try_get_matches_from(["gallery", "list", "--owner", "p-2"])
            .unwrap();
        assert_eq!(matches.get_one::<String>("owner").map(String::as_str), Some("p-2"));
        assert_eq!(
            matches.get_one::<PathBuf>("config"),
            Some(&PathBuf::from("gallery.toml"))
        );
    }

    #[test]
    fn test_upload_takes_many_files() {
        let matches = cli()
            .try_get_matches_from(["gallery", "upload", "--owner", "p-1", "a.jpg", "b.png"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let files: Vec<_> = args.get_many::<PathBuf>("files").unwrap().cloned().collect();
        assert_eq!(files, vec![PathBuf::from("a.jpg"), PathBuf::from("b.png")]);
    }

    #[test]
    fn test_slot_must_be_a_number() {
        assert!(cli()
            .try_get_matches_from(["gallery", "--owner", "p-1", "delete", "three"])
            .is_err());
    }
}
