use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use multiblock_core::config::MultiblockSettings;
use multiblock_core::{
    init_logging_with_settings, load_settings, open_db, BackupPlan, BlockId,
    ContainerDeleteMode, LayoutRegistry, RelationshipService, ReorderDirection,
    SqliteBlockRepository, SqliteScopeRepository, SuggestedUse,
};
use rusqlite::Connection;
use std::io::Write;
use std::path::PathBuf;

use crate::error::Result;

#[derive(Debug, Parser)]
#[command(
    name = "multiblock",
    about = "Administrative tool for multiblock containers and their children",
    version
)]
pub struct Cli {
    /// Block store database file.
    #[arg(long, global = true, default_value = "multiblock.db")]
    pub db: PathBuf,

    /// Settings JSON file. Defaults apply when omitted.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Absolute directory for rolling log files. Logging is off when omitted.
    #[arg(long, global = true)]
    pub log_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List a container's children in display order.
    List { container: BlockId },

    /// Print the weight the next child of a container would receive.
    #[command(name = "next-weight")]
    NextWeight { container: BlockId },

    /// Move a block into a container as its last child.
    Move { child: BlockId, container: BlockId },

    /// Split a child out of its container.
    Split { container: BlockId, child: BlockId },

    /// Print the nearest scope above a block that is not a block scope.
    Ancestor { block: BlockId },

    /// Move a child one step up or down.
    Reorder {
        container: BlockId,
        child: BlockId,
        #[arg(value_enum)]
        direction: DirectionArg,
    },

    /// Delete a block. Containers need `--mode` unless empty.
    Delete {
        block: BlockId,
        #[arg(long, value_enum)]
        mode: Option<DeleteModeArg>,
    },

    /// Print registered layouts.
    Layouts {
        #[arg(long = "use", value_enum)]
        suggested_use: Option<UseArg>,
    },

    /// Back up blocks, expanding containers, into a JSON archive.
    Backup {
        #[arg(required = true)]
        blocks: Vec<BlockId>,
        #[arg(long)]
        output: PathBuf,
    },

    /// Split every child out of every container.
    #[command(name = "decompose-all")]
    DecomposeAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeleteModeArg {
    Cascade,
    SplitChildren,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UseArg {
    Main,
    Sidebar,
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli, &mut std::io::stdout().lock())
}

pub fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let settings = match &cli.settings {
        Some(path) => load_settings(path)?,
        None => MultiblockSettings::default(),
    };
    if let Some(log_dir) = &cli.log_dir {
        init_logging_with_settings(&settings, log_dir)?;
    }

    if let Commands::Layouts { suggested_use } = cli.command {
        return print_layouts(&settings, suggested_use, out);
    }

    let conn = open_db(&cli.db)?;
    info!(
        "event=cli_command module=cli status=start db={}",
        cli.db.display()
    );
    run_with_store(&conn, cli.command, out)
}

fn run_with_store(conn: &Connection, command: Commands, out: &mut dyn Write) -> Result<()> {
    let service = RelationshipService::new(
        SqliteBlockRepository::try_new(conn)?,
        SqliteScopeRepository::try_new(conn)?,
    );

    match command {
        Commands::List { container } => {
            let children = service.list_children(container)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&children)?)?;
        }
        Commands::NextWeight { container } => {
            writeln!(out, "{}", service.next_weight(container)?)?;
        }
        Commands::Move { child, container } => {
            let moved = service.move_child_into(child, container)?;
            writeln!(
                out,
                "moved {} into {} weight={}",
                child, container, moved.placement.default_weight
            )?;
        }
        Commands::Split { container, child } => {
            let split = service.split_child_out(container, child)?;
            writeln!(
                out,
                "split {} out of {} scope={}",
                child, container, split.parent_scope_uuid
            )?;
        }
        Commands::Ancestor { block } => {
            let scope = service.find_nearest_noncontainer_ancestor(block)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&scope)?)?;
        }
        Commands::Reorder {
            container,
            child,
            direction,
        } => {
            let direction = match direction {
                DirectionArg::Up => ReorderDirection::Up,
                DirectionArg::Down => ReorderDirection::Down,
            };
            for child in service.reorder_child(container, child, direction)? {
                writeln!(
                    out,
                    "{} {} {}",
                    child.placement.default_weight, child.block_uuid, child.block_type
                )?;
            }
        }
        Commands::Delete { block, mode } => match mode {
            None => {
                service.delete_block(block)?;
                writeln!(out, "deleted {block}")?;
            }
            Some(mode) => {
                let mode = match mode {
                    DeleteModeArg::Cascade => ContainerDeleteMode::Cascade,
                    DeleteModeArg::SplitChildren => ContainerDeleteMode::SplitChildren,
                };
                let summary = service.delete_container(block, mode)?;
                writeln!(
                    out,
                    "deleted {block} removed={} split={}",
                    summary.deleted, summary.split
                )?;
            }
        },
        Commands::Backup { blocks, output } => {
            let mut plan = BackupPlan::new();
            for block_uuid in blocks {
                plan.add_block(&service.get_block(block_uuid)?);
            }
            plan.execute(&service)?;
            let archive = plan.into_archive();
            std::fs::write(&output, serde_json::to_string_pretty(&archive)?)?;
            writeln!(
                out,
                "backed up {} blocks to {}",
                archive.records.len(),
                output.display()
            )?;
        }
        Commands::DecomposeAll => {
            let split = service.decompose_all_containers()?;
            writeln!(out, "split {split} children")?;
        }
        Commands::Layouts { .. } => {}
    }
    Ok(())
}

fn print_layouts(
    settings: &MultiblockSettings,
    suggested_use: Option<UseArg>,
    out: &mut dyn Write,
) -> Result<()> {
    let registry = LayoutRegistry::with_builtin(settings)?;
    let default_id = registry.default_layout_id().unwrap_or_default();
    let descriptors = match suggested_use {
        Some(UseArg::Main) => registry.layouts_for_use(SuggestedUse::Main),
        Some(UseArg::Sidebar) => registry.layouts_for_use(SuggestedUse::Sidebar),
        None => registry.list_layouts().values().collect(),
    };
    for descriptor in descriptors {
        let marker = if descriptor.id == default_id { "*" } else { " " };
        writeln!(
            out,
            "{marker} {:<28} {:<8} title={:<5} {}",
            descriptor.id,
            match descriptor.suggested_use {
                SuggestedUse::Main => "main",
                SuggestedUse::Sidebar => "sidebar",
            },
            descriptor.requires_title,
            descriptor.template
        )?;
    }
    Ok(())
}
