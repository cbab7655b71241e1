//! Render Export CLI
//!
//! Export a JSON render tree to OBJ/MTL, GLB or glTF files.

use clap::{Parser, Subcommand, ValueEnum};
use render_export::config::TEXTURE_LIBRARY_ENV;
use render_export::scene::{ElementNode, RenderNode};
use render_export::{
    create_obj_exporter, load_scene, ExportConfig, Exporter, GltfContainer, GltfSink,
    SceneWalker,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "render-export")]
#[command(author, version, about = "Export CAD render trees to OBJ and glTF", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a render tree
    Export {
        /// Input JSON file containing the render tree
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (extension is replaced per format)
        #[arg(short, long)]
        output: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "glb")]
        format: OutputFormat,

        /// Tessellation level of detail (0 to 15)
        #[arg(long, default_value = "8")]
        lod: u8,

        /// Root directory of the material texture library
        #[arg(long, env = TEXTURE_LIBRARY_ENV)]
        texture_library: Option<PathBuf>,
    },

    /// Show information about a render tree
    Info {
        /// Input JSON file containing the render tree
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Wavefront OBJ with an MTL palette
    Obj,
    /// Binary glTF format
    Glb,
    /// glTF text with a separate binary buffer
    Gltf,
    /// Every format above
    All,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            input,
            output,
            format,
            lod,
            texture_library,
        } => {
            let mut config = ExportConfig::default().with_level_of_detail(lod);
            if let Some(root) = texture_library {
                config = config.with_texture_library(root);
            }
            export(&input, &output, format, config)?;
        }
        Commands::Info { input } => {
            show_scene_info(&input)?;
        }
    }

    Ok(())
}

fn export(
    input: &Path,
    output: &Path,
    format: OutputFormat,
    config: ExportConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading render tree from {:?}...", input);
    let scene = load_scene(input)?;
    let walker = SceneWalker::new(&scene)?;

    if matches!(format, OutputFormat::Obj | OutputFormat::All) {
        let mut exporter = create_obj_exporter(walker.root_document(), output, config.clone())?;
        let summary = walker.export(&mut exporter)?;
        println!(
            "Exported OBJ to {:?}: {} elements, {} skipped{}",
            output.with_extension("obj"),
            summary.elements_exported,
            summary.elements_skipped,
            if summary.canceled { " (canceled)" } else { "" }
        );
    }

    let mut sink = GltfSink::new();
    if matches!(format, OutputFormat::Glb | OutputFormat::All) {
        sink = sink.with_output(output.with_extension("glb"), GltfContainer::Glb);
    }
    if matches!(format, OutputFormat::Gltf | OutputFormat::All) {
        sink = sink.with_output(output.with_extension("gltf"), GltfContainer::Gltf);
    }
    if format != OutputFormat::Obj {
        let mut exporter = Exporter::new(walker.root_document(), sink, config);
        let summary = walker.export(&mut exporter)?;
        println!(
            "Exported {} glTF nodes ({} elements, {} polymeshes)",
            exporter.sink().model().node_count(),
            summary.elements_exported,
            summary.polymeshes
        );
    }

    Ok(())
}

fn show_scene_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading render tree from {:?}...", input);
    let scene = load_scene(input)?;

    let mut elements = 0;
    let mut links = 0;
    let mut polymeshes = 0;
    count_nodes(&scene.view.nodes, &mut elements, &mut links, &mut polymeshes);

    println!("\nRender Tree Info:");
    println!("  View: {} ({})", scene.view.name, scene.view.id);
    println!("  Root document: {}", scene.root);
    println!("  Documents: {}", scene.documents.len());
    for document in &scene.documents {
        println!(
            "    {}: {} elements, {} materials",
            document.title,
            document.element_count(),
            document.material_count()
        );
    }
    println!("  Elements: {}", elements);
    println!("  Links: {}", links);
    println!("  Polymeshes: {}", polymeshes);

    Ok(())
}

fn count_nodes(nodes: &[RenderNode], elements: &mut usize, links: &mut usize, polymeshes: &mut usize) {
    for node in nodes {
        match node {
            RenderNode::Element { contents, .. } => {
                *elements += 1;
                *polymeshes += count_polymeshes(contents);
            }
            RenderNode::Link { children, .. } => {
                *links += 1;
                count_nodes(children, elements, links, polymeshes);
            }
        }
    }
}

fn count_polymeshes(contents: &[ElementNode]) -> usize {
    contents
        .iter()
        .map(|node| match node {
            ElementNode::Instance { contents, .. } => count_polymeshes(contents),
            ElementNode::Face { polymeshes, .. } => polymeshes.len(),
            ElementNode::Polymesh(_) => 1,
            _ => 0,
        })
        .sum()
}
