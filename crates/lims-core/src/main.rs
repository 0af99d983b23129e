//! `lims`: run lab workflows against a JSON snapshot of the lab state

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lims_core::{
    LabStore, LimsConfig, LimsError, MoveRequest, SampleTracker, TagSelections, TaskOutcome,
    TracingMessages,
};
use lims_lineage::{AssetGroupId, AssetId, BatchId, StudyId, TagGroupId, TagId, UserId};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lims")]
#[command(about = "Lab asset lineage and tagging workflows", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON snapshot of the lab state
    #[arg(long, short)]
    snapshot: PathBuf,

    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,

    /// Where to write the updated snapshot; defaults to the input
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Graph summary
    Stats,
    /// List every asset downstream of an asset
    Descendants { asset: AssetId },
    /// Move an asset and its lineage to another study
    Move {
        #[arg(long)]
        asset: AssetId,
        #[arg(long)]
        from_study: StudyId,
        #[arg(long)]
        to_study: StudyId,
        #[arg(long)]
        to_group: AssetGroupId,
        /// New name for relocated assets
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        actor: Option<UserId>,
    },
    /// Suggest a tag layout for a batch
    RenderTags {
        #[arg(long)]
        tag_group: TagGroupId,
        #[arg(long)]
        batch: BatchId,
    },
    /// Assign tags to a batch's wells
    ApplyTags {
        #[arg(long)]
        batch: BatchId,
        #[arg(long)]
        tag_group: Option<TagGroupId>,
        /// WELL=TAG pairs
        #[arg(long = "select", value_parser = parse_selection)]
        selections: Vec<(AssetId, TagId)>,
    },
}

fn parse_selection(raw: &str) -> Result<(AssetId, TagId), String> {
    let (well, tag) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected WELL=TAG, got {raw}"))?;
    let well = well.parse().map_err(|e| format!("bad well id: {e}"))?;
    let tag = tag.parse().map_err(|e| format!("bad tag id: {e}"))?;
    Ok((well, tag))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = match &cli.config {
        Some(path) => LimsConfig::load(path)?,
        None => LimsConfig::default(),
    };
    let store = Arc::new(
        LabStore::open(&cli.snapshot)
            .with_context(|| format!("Failed to open snapshot {}", cli.snapshot.display()))?,
    );
    let tracker =
        SampleTracker::new(store.clone(), config).with_messages(Arc::new(TracingMessages));

    let mutated = match cli.command {
        Commands::Stats => {
            let stats = store.read(|state| state.graph.stats());
            println!("{}", serde_json::to_string_pretty(&stats)?);
            false
        }
        Commands::Descendants { asset } => {
            for id in tracker.descendants_of(asset)? {
                println!("{id}");
            }
            false
        }
        Commands::Move {
            asset,
            from_study,
            to_study,
            to_group,
            name,
            actor,
        } => {
            let report = tracker.move_to_asset_group_with_report(&MoveRequest {
                asset,
                from_study,
                to_study,
                to_asset_group: to_group,
                new_name: name,
                actor: actor.unwrap_or_default(),
            })?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            true
        }
        Commands::RenderTags { tag_group, batch } => {
            match tracker.render_assign_tags_to_wells_task(tag_group, batch)? {
                TaskOutcome::Accepted(plan) => {
                    println!("{}", serde_json::to_string_pretty(&plan)?);
                }
                TaskOutcome::Rejected(rejection) => {
                    return Err(LimsError::from(rejection.violation)).context(rejection.warning);
                }
            }
            false
        }
        Commands::ApplyTags {
            batch,
            tag_group,
            selections,
        } => {
            let mut chosen = TagSelections::new();
            chosen.tag_group = tag_group;
            for (well, tag) in selections {
                chosen = chosen.select(well, tag);
            }
            match tracker.do_assign_tags_to_wells_task(batch, &chosen)? {
                TaskOutcome::Accepted(application) => {
                    println!("{}", serde_json::to_string_pretty(&application)?);
                }
                TaskOutcome::Rejected(rejection) => {
                    return Err(LimsError::from(rejection.violation)).context(rejection.warning);
                }
            }
            true
        }
    };

    if mutated {
        let output = cli.output.as_ref().unwrap_or(&cli.snapshot);
        store
            .save(output)
            .with_context(|| format!("Failed to write snapshot {}", output.display()))?;
        tracing::info!(path = %output.display(), "snapshot written");
    }

    Ok(())
}
