//! GMO/GMS model command implementations

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand, ValueEnum};
use console::style;
use psp_gmo::texture_lookup::find_texture_file;
use psp_gmo::{
    AxisConvention, BlendFunc, BoneBinding, Container, ImportOptions, Importer, Scene,
    TextureStatus, decode_source,
};
use std::path::{Path, PathBuf};

use crate::utils::{
    Align, NodeType, SectionTable, TreeNode, TreeOptions, format_bytes, format_offset, format_vec3,
    render_tree,
};

#[derive(Subcommand)]
pub enum GmoCommands {
    /// Display information about a GMO or GMS model
    Info {
        /// Path to the model file
        file: PathBuf,

        /// List every mesh, material and texture
        #[arg(short, long)]
        detailed: bool,
    },

    /// Display the model structure as a tree
    Tree {
        /// Path to the model file
        file: PathBuf,

        /// Maximum depth to display
        #[arg(short, long)]
        depth: Option<usize>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Show metadata inline
        #[arg(long)]
        compact: bool,

        /// Hide metadata
        #[arg(long)]
        no_metadata: bool,
    },

    /// Import a model and report every warning
    Validate {
        /// Path to the model file
        file: PathBuf,

        /// Fail when the import produced any warning
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        import: ImportArgs,
    },

    /// Import a model and summarize the resulting scene
    Import {
        /// Path to the model file
        file: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        import: ImportArgs,
    },
}

/// Up axis of the imported scene
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Axis {
    ZUp,
    YUp,
}

impl From<Axis> for AxisConvention {
    fn from(axis: Axis) -> Self {
        match axis {
            Axis::ZUp => AxisConvention::ZUp,
            Axis::YUp => AxisConvention::YUp,
        }
    }
}

/// Options shared by commands that run a full import
#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// JSON file with import options; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the GimConv texture converter
    #[arg(long, env = "GMO_CONVERTER")]
    pub converter: Option<PathBuf>,

    /// Directory receiving converted textures
    #[arg(long)]
    pub texture_dir: Option<PathBuf>,

    /// Up axis of the output
    #[arg(long, value_enum)]
    pub axis: Option<Axis>,

    /// Uniform scale applied to positions and bone translations
    #[arg(long)]
    pub scale: Option<f32>,

    /// Flip texture V coordinates
    #[arg(long)]
    pub flip_v: bool,

    /// Keep the model where it is instead of moving it onto the floor
    #[arg(long)]
    pub no_floor: bool,

    /// Do not look up or convert textures
    #[arg(long)]
    pub no_textures: bool,

    /// Fail when a texture cannot be resolved
    #[arg(long)]
    pub fatal_textures: bool,
}

impl ImportArgs {
    /// Merge the config file and the command-line flags
    pub fn options(&self) -> Result<ImportOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => ImportOptions::default(),
        };

        if let Some(converter) = &self.converter {
            options = options.with_converter(converter);
        }
        if let Some(dir) = &self.texture_dir {
            options = options.with_texture_output_dir(dir);
        }
        if let Some(axis) = self.axis {
            options = options.with_axis(axis.into());
        }
        if let Some(scale) = self.scale {
            if !scale.is_finite() || scale <= 0.0 {
                bail!("Scale must be a positive number, got {scale}");
            }
            options = options.with_scale(scale);
        }
        if self.flip_v {
            options = options.with_flip_v(true);
        }
        if self.no_floor {
            options = options.with_align_to_floor(false);
        }
        if self.no_textures {
            options = options.with_resolve_textures(false);
        }
        if self.fatal_textures {
            options = options.with_fatal_unresolved_textures(true);
        }
        Ok(options)
    }
}

pub fn execute(cmd: GmoCommands) -> Result<()> {
    match cmd {
        GmoCommands::Info { file, detailed } => handle_info(&file, detailed),
        GmoCommands::Tree {
            file,
            depth,
            no_color,
            compact,
            no_metadata,
        } => handle_tree(
            &file,
            &TreeOptions {
                max_depth: depth,
                show_external_refs: true,
                no_color,
                show_metadata: !no_metadata,
                compact,
            },
        ),
        GmoCommands::Validate {
            file,
            strict,
            import,
        } => handle_validate(&file, strict, &import),
        GmoCommands::Import { file, json, import } => handle_import(&file, json, &import),
    }
}

/// Read a model and decode its container without resolving anything
fn read_model(path: &Path) -> Result<(u64, Container)> {
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read model {}", path.display()))?;
    let size = data.len() as u64;
    let container = decode_source(&data.into())
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    Ok((size, container))
}

fn handle_info(path: &Path, detailed: bool) -> Result<()> {
    println!("Loading model: {}", path.display());
    let (size, container) = read_model(path)?;

    println!("\n=== Model Information ===");
    println!("Format:     {}", container.version);
    println!("File size:  {}", format_bytes(size));
    println!("Bones:      {}", container.bones.len());
    println!("Meshes:     {}", container.geometry.len());
    println!("Materials:  {}", container.materials.len());
    println!("Textures:   {}", container.textures.len());

    let mut chunks = SectionTable::new(
        "Chunks",
        &[
            ("#", Align::Right),
            ("Kind", Align::Left),
            ("Offset", Align::Right),
            ("Size", Align::Right),
            ("Status", Align::Left),
        ],
    );
    for outcome in &container.outcomes {
        chunks.row([
            outcome.index.to_string(),
            outcome.kind.to_string(),
            format_offset(outcome.offset),
            format_bytes(u64::from(outcome.size)),
            outcome.status.to_string(),
        ]);
    }
    chunks.print();

    if detailed {
        print_details(&container);
    }

    if !container.warnings.is_empty() {
        println!("\n=== Warnings ===");
        for warning in container.warnings.iter() {
            println!("  {} {}", style("⚠").yellow(), warning);
        }
    }

    Ok(())
}

fn print_details(container: &Container) {
    let mut meshes = SectionTable::new(
        "Meshes",
        &[
            ("Name", Align::Left),
            ("Vertices", Align::Right),
            ("Draws", Align::Right),
            ("Material", Align::Right),
            ("Bones", Align::Left),
        ],
    );
    for mesh in &container.geometry {
        let bones = match (mesh.rigid_bone, mesh.palette.len()) {
            (Some(bone), _) => format!("rigid {bone}"),
            (None, 0) => "-".to_string(),
            (None, n) => format!("{n} in palette"),
        };
        meshes.row([
            mesh.name.clone(),
            mesh.stream.len().to_string(),
            mesh.draws.len().to_string(),
            mesh.material.map_or_else(|| "-".to_string(), |m| m.to_string()),
            bones,
        ]);
    }
    meshes.print();

    let mut materials = SectionTable::new(
        "Materials",
        &[
            ("Name", Align::Left),
            ("Flags", Align::Right),
            ("Blend", Align::Left),
            ("Textures", Align::Left),
        ],
    );
    for material in &container.materials {
        let slots: Vec<String> = material
            .slots
            .iter()
            .map(|s| s.texture.map_or_else(|| "-".to_string(), |t| t.to_string()))
            .collect();
        materials.row([
            material.name.clone(),
            format!("{:#04x}", material.flags),
            BlendFunc::decode(material.blend_mode).to_string(),
            slots.join(", "),
        ]);
    }
    materials.print();

    if !container.textures.is_empty() {
        println!("\n=== Textures ===");
        for texture in &container.textures {
            println!("  {}: {}", texture.name, texture.source.describe());
        }
    }
}

fn handle_tree(path: &Path, options: &TreeOptions) -> Result<()> {
    let (size, container) = read_model(path)?;
    let model_dir = path.parent();
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    let mut root = TreeNode::new(name, NodeType::Root)
        .with_size(size)
        .with_metadata("version", container.version);

    if !container.outcomes.is_empty() {
        let mut chunks = TreeNode::new("Chunks", NodeType::Header);
        for outcome in &container.outcomes {
            chunks = chunks.add_child(
                TreeNode::new(format!("#{} {}", outcome.index, outcome.kind), NodeType::Chunk)
                    .with_size(u64::from(outcome.size))
                    .with_metadata("offset", format_offset(outcome.offset))
                    .with_metadata("status", &outcome.status),
            );
        }
        root = root.add_child(chunks);
    }

    let mut skeleton = TreeNode::new("Skeleton", NodeType::Group);
    for (index, bone) in container.bones.iter().enumerate() {
        if bone.parent.is_none() {
            skeleton = skeleton.add_child(bone_node(&container, index));
        }
    }
    root = root.add_child(skeleton);

    let mut meshes = TreeNode::new("Meshes", NodeType::Group);
    for mesh in &container.geometry {
        let material = mesh
            .material
            .and_then(|m| container.materials.get(m as usize))
            .map_or("-", |m| m.name.as_str());
        meshes = meshes.add_child(
            TreeNode::new(&mesh.name, NodeType::Mesh)
                .with_metadata("vertices", mesh.stream.len())
                .with_metadata("draws", mesh.draws.len())
                .with_metadata("material", material),
        );
    }
    root = root.add_child(meshes);

    let mut materials = TreeNode::new("Materials", NodeType::Group);
    for material in &container.materials {
        let mut node = TreeNode::new(&material.name, NodeType::Material)
            .with_metadata("flags", format!("{:#04x}", material.flags))
            .with_metadata("blend", BlendFunc::decode(material.blend_mode));
        for texture in material
            .slots
            .iter()
            .filter_map(|s| s.texture)
            .filter_map(|t| container.textures.get(t as usize))
        {
            node = node.add_child(TreeNode::new(&texture.name, NodeType::Texture));
        }
        materials = materials.add_child(node);
    }
    root = root.add_child(materials);

    let mut textures = TreeNode::new("Textures", NodeType::Group);
    for texture in &container.textures {
        let mut node = TreeNode::new(&texture.name, NodeType::Texture)
            .with_metadata("source", texture.source.describe());
        if let psp_gmo::chunks::TextureSource::External { file_name } = &texture.source {
            let found = model_dir.and_then(|dir| find_texture_file(dir, file_name));
            node = match found {
                Some(found) => node.with_external_ref(&found.display().to_string(), Some(true)),
                None => node.with_external_ref(file_name, Some(false)),
            };
        }
        textures = textures.add_child(node);
    }
    root = root.add_child(textures);

    print!("{}", render_tree(&root, options));
    Ok(())
}

fn bone_node(container: &Container, index: usize) -> TreeNode {
    let bone = &container.bones[index];
    let mut node = TreeNode::new(&bone.name, NodeType::Bone)
        .with_metadata("translation", format_vec3(bone.translation));
    for (child, record) in container.bones.iter().enumerate() {
        if record.parent == Some(index) {
            node = node.add_child(bone_node(container, child));
        }
    }
    node
}

fn run_import(path: &Path, args: &ImportArgs) -> Result<Scene> {
    let options = args.options()?;
    Importer::new(options)
        .import_path(path)
        .with_context(|| format!("Failed to import {}", path.display()))
}

fn handle_validate(path: &Path, strict: bool, args: &ImportArgs) -> Result<()> {
    println!("Validating model: {}", path.display());
    let scene = run_import(path, args)?;

    if scene.warnings.is_empty() {
        println!("{} Model is valid", style("✓").green());
        return Ok(());
    }

    println!(
        "{} {} warning(s):",
        style("⚠").yellow(),
        scene.warnings.len()
    );
    for warning in &scene.warnings {
        println!("  - {warning}");
    }
    if strict {
        bail!("Validation failed with {} warning(s)", scene.warnings.len());
    }
    Ok(())
}

fn handle_import(path: &Path, json: bool, args: &ImportArgs) -> Result<()> {
    let scene = run_import(path, args)?;

    if json {
        let summary = scene_summary(&scene);
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Imported {}", path.display());
    println!("Format:     {}", scene.version);
    println!("Meshes:     {}", scene.meshes.len());
    println!("Vertices:   {}", scene.vertex_count());
    println!("Triangles:  {}", scene.triangle_count());
    println!("Bones:      {}", scene.skeleton.len());
    println!("Materials:  {}", scene.materials.len());
    if let Some((min, max)) = scene.bounds() {
        println!("Bounds:     {} .. {}", format_vec3(min), format_vec3(max));
    }

    if !scene.textures.is_empty() {
        println!("\n=== Textures ===");
        for texture in &scene.textures {
            let status = match &texture.status {
                TextureStatus::Unresolved => style("unresolved".to_string()).dim(),
                TextureStatus::ConvertedPath(path) => style(path.display().to_string()).green(),
                TextureStatus::ConversionFailed(reason) => style(reason.to_string()).red(),
            };
            println!("  {}: {}", texture.name, status);
        }
    }

    if !scene.warnings.is_empty() {
        println!("\n=== Warnings ===");
        for warning in &scene.warnings {
            println!("  {} {}", style("⚠").yellow(), warning);
        }
    }
    Ok(())
}

fn scene_summary(scene: &Scene) -> serde_json::Value {
    let meshes: Vec<_> = scene
        .meshes
        .iter()
        .map(|mesh| {
            let binding = match mesh.binding {
                BoneBinding::Unbound => serde_json::json!("unbound"),
                BoneBinding::Rigid(bone) => serde_json::json!({ "rigid": bone }),
                BoneBinding::Skinned => serde_json::json!("skinned"),
            };
            serde_json::json!({
                "name": mesh.name,
                "vertices": mesh.vertices.len(),
                "triangles": mesh.triangles.len(),
                "material": mesh.material,
                "binding": binding,
            })
        })
        .collect();
    let bones: Vec<_> = scene
        .skeleton
        .bones()
        .iter()
        .enumerate()
        .map(|(index, bone)| {
            serde_json::json!({
                "name": bone.name,
                "parent": bone.parent,
                "head": scene.skeleton.head(index).map(|h| h.to_array()),
            })
        })
        .collect();
    let materials: Vec<_> = scene
        .materials
        .iter()
        .map(|m| {
            serde_json::json!({
                "name": m.name,
                "flags": m.flags.bits(),
                "blend_mode": m.blend_mode,
                "placeholder": m.placeholder,
            })
        })
        .collect();
    let textures: Vec<_> = scene
        .textures
        .iter()
        .map(|t| {
            serde_json::json!({
                "name": t.name,
                "path": t.status.path(),
                "error": match &t.status {
                    TextureStatus::ConversionFailed(reason) => Some(reason.to_string()),
                    _ => None,
                },
            })
        })
        .collect();

    serde_json::json!({
        "version": scene.version,
        "floor_offset": scene.floor_offset.to_array(),
        "meshes": meshes,
        "bones": bones,
        "materials": materials,
        "textures": textures,
        "warnings": scene.warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
    })
}
