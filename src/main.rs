//! rmdkit CLI - Command-line tool for inspecting and round-tripping RMD scenes.
//!
//! This is the main entry point for the rmdkit command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use rmdkit::prelude::*;

/// rmdkit - RMD scene inspection and round-trip tool
#[derive(Parser)]
#[command(name = "rmdkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the contents of an RMD scene
    Info {
        /// Path to the RMD file
        #[arg(short, long, env = "RMDKIT_INPUT")]
        input: PathBuf,
    },

    /// Load and save a scene, reporting whether it survives unchanged
    Roundtrip {
        /// Path to the RMD file
        #[arg(short, long, env = "RMDKIT_INPUT")]
        input: PathBuf,

        /// Where to write the re-encoded scene
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write one part of a scene to its own file
    Extract {
        /// Path to the RMD file
        #[arg(short, long, env = "RMDKIT_INPUT")]
        input: PathBuf,

        /// Which part to extract
        #[arg(short, long, value_enum)]
        kind: PartKind,

        /// Index of the clump or animation set
        #[arg(long, default_value_t = 0)]
        index: usize,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Dump a scene as JSON
    Dump {
        /// Path to the RMD file
        #[arg(short, long, env = "RMDKIT_INPUT")]
        input: PathBuf,

        /// Output JSON file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Round-trip every RMD file under a directory
    Verify {
        /// Directory to search
        #[arg(short, long)]
        dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PartKind {
    /// A clump
    Clump,
    /// The texture dictionary
    Txd,
    /// An animation set
    Anim,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => {
            cmd_info(&input)?;
        }
        Commands::Roundtrip { input, output } => {
            cmd_roundtrip(&input, output.as_deref())?;
        }
        Commands::Extract {
            input,
            kind,
            index,
            output,
        } => {
            cmd_extract(&input, kind, index, &output)?;
        }
        Commands::Dump { input, output } => {
            cmd_dump(&input, output.as_deref())?;
        }
        Commands::Verify { dir } => {
            cmd_verify(&dir)?;
        }
    }

    Ok(())
}

fn load_scene(path: &Path) -> Result<Scene> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Scene::load(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

fn cmd_info(input: &Path) -> Result<()> {
    let start = Instant::now();
    let scene = load_scene(input)?;
    let tree = scene.tree();

    println!("Loaded {} in {:?}: {} chunks", input.display(), start.elapsed(), tree.len());

    match scene.texture_dictionary() {
        Some(txd) => {
            let textures = tree.children_with_tag(txd, ChunkId::TEXTURE_NATIVE).count();
            println!("Texture dictionary: {} textures", textures);
        }
        None => println!("Texture dictionary: none"),
    }

    println!("Clumps: {}", scene.clumps().len());
    for (i, &clump) in scene.clumps().iter().enumerate() {
        let frames = match tree.child_with_tag(clump, ChunkId::FRAME_LIST) {
            Some(list) => {
                let hierarchy = FrameHierarchy::new(tree, list)?;
                format!("{} frames, {} bones", hierarchy.len(), count_bones(&hierarchy))
            }
            None => "no frame list".to_string(),
        };
        let geometries = tree
            .child_with_tag(clump, ChunkId::GEOMETRY_LIST)
            .map_or(0, |list| tree.children_with_tag(list, ChunkId::GEOMETRY).count());
        let atomics = tree.children_with_tag(clump, ChunkId::ATOMIC).count();

        println!("  [{}] {}, {} geometries, {} atomics", i, frames, geometries, atomics);
    }

    if let Some(links) = scene.node_links() {
        println!("Node links: {}", links.len());
    }

    println!("Animation sets: {}", scene.animation_sets().len());
    for (i, set) in scene.animation_sets().iter().enumerate() {
        println!("  [{}] {}", i, tag_list(tree, set.members()));
    }

    if !scene.misc().is_empty() {
        println!("Misc: {}", tag_list(tree, scene.misc()));
    }

    Ok(())
}

fn count_bones(hierarchy: &FrameHierarchy<'_>) -> usize {
    fn walk(bones: &[rmdkit::rw::Bone]) -> usize {
        bones.iter().map(|b| 1 + walk(&b.children)).sum()
    }
    walk(&hierarchy.bone_tree())
}

fn tag_list(tree: &NodeTree, ids: &[NodeId]) -> String {
    ids.iter()
        .filter_map(|&id| tree.tag(id))
        .map(|tag| tag.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of saving and reloading one scene.
struct Roundtrip {
    equal: bool,
    identical: bool,
    saved: Vec<u8>,
}

fn roundtrip(data: &[u8]) -> Result<Roundtrip> {
    let scene = Scene::load(data).context("Failed to parse scene")?;
    let saved = scene.save().context("Failed to write scene")?;
    let reloaded = Scene::load(&saved).context("Failed to parse re-encoded scene")?;

    Ok(Roundtrip {
        equal: reloaded == scene,
        identical: saved == data,
        saved,
    })
}

fn cmd_roundtrip(input: &Path, output: Option<&Path>) -> Result<()> {
    let data = fs::read(input).context("Failed to read input file")?;

    let start = Instant::now();
    let result = roundtrip(&data)?;
    debug!("round trip of {} bytes took {:?}", data.len(), start.elapsed());

    println!("Structurally equal: {}", result.equal);
    println!(
        "Byte identical: {} ({} -> {} bytes)",
        result.identical,
        data.len(),
        result.saved.len()
    );

    if let Some(output) = output {
        fs::write(output, &result.saved).context("Failed to write output file")?;
        println!("Output written");
    }

    if !result.equal {
        anyhow::bail!("Scene changed after a round trip");
    }

    Ok(())
}

fn cmd_extract(input: &Path, kind: PartKind, index: usize, output: &Path) -> Result<()> {
    let scene = load_scene(input)?;

    let bytes = match kind {
        PartKind::Clump => scene.save_clump(index),
        PartKind::Txd => scene.save_texture_dictionary(),
        PartKind::Anim => scene.save_animation_set(index),
    }
    .context("Failed to write scene part")?;

    fs::write(output, &bytes).context("Failed to write output file")?;
    println!("Wrote {} bytes to {}", bytes.len(), output.display());

    Ok(())
}

fn cmd_dump(input: &Path, output: Option<&Path>) -> Result<()> {
    let scene = load_scene(input)?;
    let json = serde_json::to_string_pretty(&scene).context("Failed to serialize scene")?;

    match output {
        Some(output) => fs::write(output, json).context("Failed to write output file")?,
        None => println!("{}", json),
    }

    Ok(())
}

fn cmd_verify(dir: &Path) -> Result<()> {
    let paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("rmd"))
        })
        .map(|e| e.into_path())
        .collect();

    println!("Verifying {} files under {}...", paths.len(), dir.display());

    let pb = ProgressBar::new(paths.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let failures: Vec<(PathBuf, String)> = paths
        .par_iter()
        .filter_map(|path| {
            let outcome = fs::read(path)
                .context("Failed to read file")
                .and_then(|data| roundtrip(&data));
            pb.inc(1);

            match outcome {
                Ok(r) if r.equal => None,
                Ok(_) => Some((path.clone(), "scene changed after a round trip".to_string())),
                Err(e) => Some((path.clone(), format!("{:#}", e))),
            }
        })
        .collect();

    pb.finish_with_message("Done");

    for (path, reason) in &failures {
        eprintln!("{}: {}", path.display(), reason);
    }
    println!(
        "Verified {} files in {:?} ({} failures)",
        paths.len(),
        start.elapsed(),
        failures.len()
    );

    if !failures.is_empty() {
        anyhow::bail!("{} files failed to round-trip", failures.len());
    }

    Ok(())
}
