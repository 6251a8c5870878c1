use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dx_tags::error::categorize_error;
use dx_tags::view::TagNode;
use dx_tags::workspace::canonical_root;
use dx_tags::{logging, watcher, TagColor, TagWorkspace, TagsConfig};

#[derive(Parser)]
#[command(name = "dx-tags")]
#[command(about = "Colored tags for workspace files and folders that follow renames, moves and deletes", version)]
#[command(after_help = "Colors: red, orange, yellow, green, blue, purple, gray

Tags are stored in <workspace>/.dx/tags/state.db.
Settings are read from <workspace>/.dx/tags/config.toml.")]
struct Cli {
    /// Workspace root
    #[arg(short, long, global = true, default_value = ".")]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tag a file or folder with a color
    Tag { path: PathBuf, color: TagColor },

    /// Remove the tag from a file or folder
    Untag { path: PathBuf },

    /// Show the tag of a file or folder
    Show { path: PathBuf },

    /// List tag groups and their entries
    List {
        /// Only list this color
        #[arg(short, long)]
        color: Option<TagColor>,
    },

    /// Set the display name of a color
    Name { color: TagColor, name: String },

    /// Remove every tag of one color
    ClearGroup { color: TagColor },

    /// Remove all tags and the stored state
    Clear,

    /// Rename a file or folder, keeping its tags
    Mv { path: PathBuf, new_name: String },

    /// Delete a file or folder and its tags
    Rm { path: PathBuf },

    /// Create an empty file
    NewFile { folder: PathBuf, name: String },

    /// Create a folder
    NewFolder { folder: PathBuf, name: String },

    /// Drop tags whose paths no longer exist
    Cleanup,

    /// Keep tags in sync with filesystem changes until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let root = canonical_root(&cli.workspace);
    let config = TagsConfig::load(&root)?;
    let log_guard = logging::init(&config.logging)?;

    let mut workspace = TagWorkspace::open_with_config(root, config).await?;
    let result = run(&workspace, cli.command).await;
    workspace.flush().await;

    if let Err(error) = result {
        eprintln!("{} {}", "✗".red(), error);
        if let Some(hint) = categorize_error(&error).hint() {
            eprintln!("  {}", hint.dimmed());
        }
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(workspace: &TagWorkspace, command: Commands) -> Result<()> {
    let commands = workspace.commands();
    let registry = workspace.registry();

    match command {
        Commands::Tag { path, color } => {
            let key = workspace.resolve(&path);
            if !Path::new(&key).exists() {
                println!("{} {} does not exist yet", "!".yellow(), key);
            }
            commands.add_tag(Some(&key), color)?;
            println!(
                "{} Tagged {} as {}",
                "✓".green(),
                key.bright_white(),
                registry.display_name(color).color(term_color(color))
            );
        }

        Commands::Untag { path } => {
            let key = workspace.resolve(&path);
            commands.remove_tag(Some(&key))?;
            println!("{} Removed tag from {}", "✓".green(), key.bright_white());
        }

        Commands::Show { path } => {
            let key = workspace.resolve(&path);
            match workspace.decorations().decoration(&key) {
                Some(decoration) => println!(
                    "{} {}  {}",
                    decoration.badge.color(term_color(decoration.color)),
                    key.bright_white(),
                    decoration.tooltip
                ),
                None => match registry.get_tag(&key) {
                    Some(color) => println!("{}  {}", key.bright_white(), registry.display_name(color)),
                    None => println!("{} is not tagged", key.bright_white()),
                },
            }
        }

        Commands::List { color } => {
            let tree = workspace.tree();
            let groups: Vec<TagNode> = tree
                .roots()
                .into_iter()
                .filter(|node| match (node, color) {
                    (TagNode::Group { color: group, .. }, Some(wanted)) => *group == wanted,
                    _ => true,
                })
                .collect();

            if groups.is_empty() {
                println!("{}", "No tags".dimmed());
            }
            for group in &groups {
                if let TagNode::Group { color, label } = group {
                    println!("{} {}", "●".color(term_color(*color)), label.bold());
                }
                for child in tree.children(group) {
                    let marker = if child.is_expandable() { "▸" } else { " " };
                    println!(
                        "  {} {}  {}",
                        marker,
                        child.label(),
                        child.path().unwrap_or_default().dimmed()
                    );
                }
            }
        }

        Commands::Name { color, name } => {
            let name = commands.set_tag_name(color, &name)?;
            println!(
                "{} {} is now called {}",
                "✓".green(),
                color.as_str(),
                name.color(term_color(color)).bold()
            );
        }

        Commands::ClearGroup { color } => {
            let removed = commands.clear_tag_group(color);
            println!(
                "{} Removed {} {} tag(s)",
                "✓".green(),
                removed,
                registry.display_name(color)
            );
        }

        Commands::Clear => {
            if !workspace.persistence().clear().await {
                anyhow::bail!("Failed to clear stored tags");
            }
            println!("{} Cleared all tags", "✓".green());
        }

        Commands::Mv { path, new_name } => {
            let key = workspace.resolve(&path);
            let renamed = commands.rename_file(Some(&key), &new_name).await?;
            println!("{} {} → {}", "✓".green(), key, renamed.bright_white());
        }

        Commands::Rm { path } => {
            let key = workspace.resolve(&path);
            commands.delete_file(Some(&key)).await?;
            println!("{} Deleted {}", "✓".green(), key);
        }

        Commands::NewFile { folder, name } => {
            let key = workspace.resolve(&folder);
            let created = commands.new_file(Some(&key), &name).await?;
            println!("{} Created {}", "✓".green(), created.bright_white());
        }

        Commands::NewFolder { folder, name } => {
            let key = workspace.resolve(&folder);
            let created = commands.new_folder(Some(&key), &name).await?;
            println!("{} Created {}", "✓".green(), created.bright_white());
        }

        Commands::Cleanup => {
            let removed = commands.refresh().await;
            println!("{} Removed {} stale tag(s)", "✓".green(), removed);
        }

        Commands::Watch => watch(workspace).await?,
    }

    Ok(())
}

async fn watch(workspace: &TagWorkspace) -> Result<()> {
    println!(
        "{}",
        format!("👁  Watching {} ...", workspace.root().display())
            .cyan()
            .bold()
    );

    let removed = workspace.reconciler().sweep().await;
    if removed > 0 {
        println!("{} Removed {} stale tag(s)", "✓".green(), removed);
    }

    let (mut fs_watcher, changes) = workspace.watcher()?;
    fs_watcher.watch()?;
    let forwarder = tokio::spawn(watcher::forward(changes, Arc::clone(workspace.engine())));

    tokio::signal::ctrl_c().await?;
    println!("\n{}", "Stopping watcher".yellow());

    fs_watcher.stop();
    forwarder.abort();
    Ok(())
}

fn term_color(color: TagColor) -> Color {
    match color {
        TagColor::Red => Color::Red,
        TagColor::Orange => Color::TrueColor {
            r: 255,
            g: 165,
            b: 0,
        },
        TagColor::Yellow => Color::Yellow,
        TagColor::Green => Color::Green,
        TagColor::Blue => Color::Blue,
        TagColor::Purple => Color::Magenta,
        TagColor::Gray => Color::BrightBlack,
    }
}
