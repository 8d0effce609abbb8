//! `.GMS` text export reader
//!
//! The text form carries the same model as a binary container, spelled out
//! as nested `Keyword "name" { ... }` blocks. It is read into a
//! [`Container`] so the rest of the import does not care which form the
//! model came from.
//!
//! Statements end at a line break, a `;`, an opening brace, or a closing
//! brace. `//` starts a comment. Blocks the importer has no use for
//! (motions, blind data, render state, definitions) are skipped whole.

use glam::{Quat, Vec2, Vec3, Vec4};
use std::collections::HashMap;

use crate::chunks::{
    BoneRecord, BoneRotation, DrawCommand, GeometryChunk, MaterialRecord, PrimitiveKind,
    SlotRecord, TextureRecord, TextureRole, TextureSource, VertexStream,
};
use crate::container::Container;
use crate::error::{GmoError, Result};
use crate::material::BlendFunc;
use crate::vertex_format::RawVertex;
use crate::version::GmoVersion;
use crate::warning::ImportWarning;

/// First token of every text export
pub const GMS_MAGIC: &str = ".GMS";

/// Largest weight count an `Arrays` block may declare
const MAX_WEIGHTS: usize = 8;

fn text_error(line: usize, message: impl Into<String>) -> GmoError {
    GmoError::Text {
        line,
        message: message.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Quoted(&'a str),
    Open,
    Close,
}

#[derive(Debug, Clone)]
struct Statement<'a> {
    line: usize,
    tokens: Vec<Token<'a>>,
}

impl<'a> Statement<'a> {
    fn keyword(&self) -> Option<&'a str> {
        match self.tokens.first() {
            Some(Token::Word(word)) => Some(*word),
            _ => None,
        }
    }

    fn opens_block(&self) -> bool {
        self.tokens.last() == Some(&Token::Open)
    }

    fn is_open(&self) -> bool {
        self.tokens.as_slice() == [Token::Open]
    }

    fn is_close(&self) -> bool {
        self.tokens.as_slice() == [Token::Close]
    }

    /// Tokens after the keyword, without a trailing `{`
    fn args(&self) -> &[Token<'a>] {
        let end = if self.opens_block() {
            self.tokens.len() - 1
        } else {
            self.tokens.len()
        };
        self.tokens.get(1..end).unwrap_or(&[])
    }

    fn words(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.args().iter().filter_map(|t| match t {
            Token::Word(word) => Some(*word),
            _ => None,
        })
    }

    fn quoted(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.args().iter().filter_map(|t| match t {
            Token::Quoted(text) => Some(*text),
            _ => None,
        })
    }

    fn name(&self) -> Result<&'a str> {
        self.quoted().next().ok_or_else(|| {
            self.error(format!(
                "{} needs a quoted name",
                self.keyword().unwrap_or("statement")
            ))
        })
    }

    fn error(&self, message: impl Into<String>) -> GmoError {
        text_error(self.line, message)
    }

    fn parse<T: std::str::FromStr>(&self, word: &str) -> Result<T> {
        word.parse()
            .map_err(|_| self.error(format!("invalid number '{word}'")))
    }

    /// The first `N` numeric arguments
    fn floats<const N: usize>(&self) -> Result<[f32; N]> {
        let mut values = [0.0; N];
        let mut words = self.words();
        for value in &mut values {
            let word = words.next().ok_or_else(|| {
                self.error(format!(
                    "{} needs {N} values",
                    self.keyword().unwrap_or("statement")
                ))
            })?;
            *value = self.parse(word)?;
        }
        Ok(values)
    }
}

fn flush<'a>(statements: &mut Vec<Statement<'a>>, line: usize, tokens: &mut Vec<Token<'a>>) {
    if !tokens.is_empty() {
        statements.push(Statement {
            line,
            tokens: std::mem::take(tokens),
        });
    }
}

/// Split everything after the header line into statements
fn tokenize(text: &str) -> Result<Vec<Statement<'_>>> {
    let mut statements = Vec::new();
    let mut tokens = Vec::new();

    for (index, line) in text.lines().enumerate().skip(1) {
        let number = index + 1;
        let mut rest = line;
        loop {
            rest = rest.trim_start();
            if rest.starts_with("//") {
                break;
            }
            let Some(&first) = rest.as_bytes().first() else {
                break;
            };
            match first {
                b'{' => {
                    tokens.push(Token::Open);
                    flush(&mut statements, number, &mut tokens);
                    rest = &rest[1..];
                }
                b'}' => {
                    flush(&mut statements, number, &mut tokens);
                    statements.push(Statement {
                        line: number,
                        tokens: vec![Token::Close],
                    });
                    rest = &rest[1..];
                }
                b';' => {
                    flush(&mut statements, number, &mut tokens);
                    rest = &rest[1..];
                }
                b'"' => {
                    let body = &rest[1..];
                    let end = body
                        .find('"')
                        .ok_or_else(|| text_error(number, "unterminated string"))?;
                    tokens.push(Token::Quoted(&body[..end]));
                    rest = &body[end + 1..];
                }
                _ => {
                    let end = rest
                        .find(|c: char| c.is_whitespace() || matches!(c, '{' | '}' | '"' | ';'))
                        .unwrap_or(rest.len());
                    tokens.push(Token::Word(&rest[..end]));
                    rest = &rest[end..];
                }
            }
        }
        flush(&mut statements, number, &mut tokens);
    }

    Ok(statements)
}

#[derive(Debug)]
struct TextBone<'a> {
    name: &'a str,
    line: usize,
    parent: Option<&'a str>,
    translation: Vec3,
    rotation: BoneRotation,
    scale: Vec3,
    blend_bones: Vec<&'a str>,
    parts: Vec<&'a str>,
}

#[derive(Debug)]
struct TextArrays<'a> {
    name: &'a str,
    vertices: Vec<RawVertex>,
}

#[derive(Debug)]
struct TextDraw<'a> {
    line: usize,
    arrays: &'a str,
    primitive: PrimitiveKind,
    vertices_per_primitive: u32,
    primitive_count: u32,
    indices: Vec<u32>,
}

#[derive(Debug, Default)]
struct TextMesh<'a> {
    name: &'a str,
    material: Option<&'a str>,
    blend_subset: Vec<usize>,
    draws: Vec<TextDraw<'a>>,
}

#[derive(Debug, Default)]
struct TextPart<'a> {
    name: &'a str,
    arrays: Vec<TextArrays<'a>>,
    meshes: Vec<TextMesh<'a>>,
}

#[derive(Debug, Default)]
struct TextLayer<'a> {
    diffuse: Option<Vec4>,
    ambient: Option<Vec4>,
    specular: Option<Vec4>,
    emission: Option<Vec4>,
    texture: Option<&'a str>,
    blend: Option<BlendFunc>,
}

#[derive(Debug, Default)]
struct TextMaterial<'a> {
    name: &'a str,
    diffuse: Option<Vec4>,
    ambient: Option<Vec4>,
    layers: Vec<TextLayer<'a>>,
}

#[derive(Debug)]
struct TextTexture<'a> {
    name: &'a str,
    file_name: Option<&'a str>,
}

#[derive(Debug, Default)]
struct TextModel<'a> {
    bones: Vec<TextBone<'a>>,
    parts: Vec<TextPart<'a>>,
    materials: Vec<TextMaterial<'a>>,
    textures: Vec<TextTexture<'a>>,
}

/// Columns present in each row of an `Arrays` block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ArrayLayout {
    position: bool,
    normal: bool,
    texcoord: bool,
    color: bool,
    weights: usize,
}

impl ArrayLayout {
    fn parse(statement: &Statement<'_>, flags: &str) -> Result<Self> {
        let mut layout = Self::default();
        for flag in flags.split('|') {
            match flag {
                "VERTEX" => layout.position = true,
                "NORMAL" => layout.normal = true,
                "TEXCOORD" => layout.texcoord = true,
                "COLOR" => layout.color = true,
                _ => {
                    let count = flag
                        .strip_prefix("WEIGHT")
                        .and_then(|n| n.parse::<usize>().ok())
                        .filter(|n| (1..=MAX_WEIGHTS).contains(n))
                        .ok_or_else(|| statement.error(format!("unknown array flag '{flag}'")))?;
                    layout.weights = count;
                }
            }
        }
        Ok(layout)
    }

    fn width(self) -> usize {
        3 * usize::from(self.position)
            + 3 * usize::from(self.normal)
            + 2 * usize::from(self.texcoord)
            + 4 * usize::from(self.color)
            + self.weights
    }

    fn read_row(self, row: &Statement<'_>) -> Result<RawVertex> {
        let values = row
            .tokens
            .iter()
            .map(|token| match token {
                Token::Word(word) => row.parse::<f32>(word),
                _ => Err(row.error("array rows hold numbers only")),
            })
            .collect::<Result<Vec<f32>>>()?;
        if values.len() < self.width() {
            return Err(row.error(format!(
                "array row has {} values, expected {}",
                values.len(),
                self.width()
            )));
        }

        let mut columns = values.into_iter();
        let mut take = |n: usize| -> Vec<f32> { columns.by_ref().take(n).collect() };
        let mut vertex = RawVertex::default();
        if self.position {
            vertex.position = Vec3::from_slice(&take(3));
        }
        if self.normal {
            vertex.normal = Some(Vec3::from_slice(&take(3)));
        }
        if self.texcoord {
            vertex.uv = Some(Vec2::from_slice(&take(2)));
        }
        if self.color {
            vertex.color = Some(Vec4::from_slice(&take(4)));
        }
        vertex.weights = take(self.weights);
        Ok(vertex)
    }
}

struct Parser<'a> {
    statements: Vec<Statement<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn next(&mut self) -> Option<Statement<'a>> {
        let statement = self.statements.get(self.pos).cloned();
        if statement.is_some() {
            self.pos += 1;
        }
        statement
    }

    fn starts_block(&self, statement: &Statement<'a>) -> bool {
        statement.opens_block()
            || self
                .statements
                .get(self.pos)
                .is_some_and(Statement::is_open)
    }

    /// Consume the `{` belonging to `header`
    fn enter(&mut self, header: &Statement<'a>) -> Result<()> {
        if header.opens_block() {
            return Ok(());
        }
        match self.statements.get(self.pos) {
            Some(next) if next.is_open() => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(header.error(format!(
                "expected '{{' after {}",
                header.keyword().unwrap_or("block header")
            ))),
        }
    }

    /// Next statement inside the block opened by `header`, `None` at its end
    fn body(&mut self, header: &Statement<'a>) -> Result<Option<Statement<'a>>> {
        match self.next() {
            None => Err(header.error(format!(
                "block {} is never closed",
                header.keyword().unwrap_or("{")
            ))),
            Some(statement) if statement.is_close() => Ok(None),
            Some(statement) => Ok(Some(statement)),
        }
    }

    fn skip_block(&mut self, header: &Statement<'a>) -> Result<()> {
        self.enter(header)?;
        while let Some(statement) = self.body(header)? {
            if self.starts_block(&statement) {
                self.skip_block(&statement)?;
            }
        }
        Ok(())
    }

    /// Skip a statement the reader does not interpret, with its block if any
    fn ignore(&mut self, statement: &Statement<'a>) -> Result<()> {
        log::trace!(
            "GMS line {}: skipping {}",
            statement.line,
            statement.keyword().unwrap_or("statement")
        );
        if self.starts_block(statement) {
            self.skip_block(statement)?;
        }
        Ok(())
    }

    fn file(&mut self) -> Result<TextModel<'a>> {
        let mut model = None;
        while let Some(statement) = self.next() {
            match statement.keyword() {
                Some("Model") if model.is_none() => model = Some(self.model(&statement)?),
                _ if statement.is_close() => return Err(statement.error("unmatched '}'")),
                _ => self.ignore(&statement)?,
            }
        }
        Ok(model.unwrap_or_default())
    }

    fn model(&mut self, header: &Statement<'a>) -> Result<TextModel<'a>> {
        log::debug!("GMS model '{}'", header.quoted().next().unwrap_or_default());
        self.enter(header)?;
        let mut model = TextModel::default();
        while let Some(statement) = self.body(header)? {
            match statement.keyword() {
                Some("Bone") => model.bones.push(self.bone(&statement)?),
                Some("Part") => model.parts.push(self.part(&statement)?),
                Some("Material") => model.materials.push(self.material(&statement)?),
                Some("Texture") => model.textures.push(self.texture(&statement)?),
                _ => self.ignore(&statement)?,
            }
        }
        Ok(model)
    }

    fn bone(&mut self, header: &Statement<'a>) -> Result<TextBone<'a>> {
        let record = BoneRecord::root("");
        let mut bone = TextBone {
            name: header.name()?,
            line: header.line,
            parent: None,
            translation: record.translation,
            rotation: record.rotation,
            scale: record.scale,
            blend_bones: Vec::new(),
            parts: Vec::new(),
        };
        self.enter(header)?;
        while let Some(statement) = self.body(header)? {
            match statement.keyword() {
                Some("ParentBone") => bone.parent = Some(statement.name()?),
                Some("Translate") => bone.translation = Vec3::from_array(statement.floats()?),
                Some("RotateZYX") => {
                    bone.rotation = BoneRotation::EulerZyx(Vec3::from_array(statement.floats()?));
                }
                Some("RotateYXZ") => {
                    bone.rotation = BoneRotation::EulerYxz(Vec3::from_array(statement.floats()?));
                }
                Some("RotateQ") => {
                    bone.rotation = BoneRotation::Quaternion(Quat::from_array(statement.floats()?));
                }
                Some("Scale") => bone.scale = Vec3::from_array(statement.floats()?),
                Some("BlendBones") => bone.blend_bones = statement.quoted().collect(),
                Some("DrawPart") => bone.parts.push(statement.name()?),
                _ => self.ignore(&statement)?,
            }
        }
        Ok(bone)
    }

    fn part(&mut self, header: &Statement<'a>) -> Result<TextPart<'a>> {
        let mut part = TextPart {
            name: header.name()?,
            ..TextPart::default()
        };
        self.enter(header)?;
        while let Some(statement) = self.body(header)? {
            match statement.keyword() {
                Some("Arrays") => part.arrays.push(self.arrays(&statement)?),
                Some("Mesh") => part.meshes.push(self.mesh(&statement)?),
                _ => self.ignore(&statement)?,
            }
        }
        Ok(part)
    }

    fn arrays(&mut self, header: &Statement<'a>) -> Result<TextArrays<'a>> {
        let name = header.name()?;
        let mut words = header.words();
        let flags = words
            .next()
            .ok_or_else(|| header.error("Arrays needs a format"))?;
        let layout = ArrayLayout::parse(header, flags)?;
        let declared: Option<usize> = words.next().and_then(|w| w.parse().ok());

        self.enter(header)?;
        let mut vertices = Vec::new();
        while let Some(row) = self.body(header)? {
            vertices.push(layout.read_row(&row)?);
        }
        if let Some(count) = declared
            && count != vertices.len()
        {
            log::debug!(
                "GMS line {}: arrays '{}' declares {} vertices, found {}",
                header.line,
                name,
                count,
                vertices.len()
            );
        }
        Ok(TextArrays { name, vertices })
    }

    fn mesh(&mut self, header: &Statement<'a>) -> Result<TextMesh<'a>> {
        let mut mesh = TextMesh {
            name: header.name()?,
            ..TextMesh::default()
        };
        self.enter(header)?;
        while let Some(statement) = self.body(header)? {
            match statement.keyword() {
                Some("SetMaterial") => mesh.material = Some(statement.name()?),
                Some("BlendSubset") => {
                    let mut words = statement.words();
                    let count: usize = match words.next() {
                        Some(word) => statement.parse(word)?,
                        None => 0,
                    };
                    mesh.blend_subset = words
                        .take(count)
                        .map(|w| statement.parse(w))
                        .collect::<Result<_>>()?;
                    if mesh.blend_subset.len() != count {
                        return Err(statement.error(format!(
                            "BlendSubset declares {count} entries, found {}",
                            mesh.blend_subset.len()
                        )));
                    }
                }
                Some("DrawArrays") => mesh.draws.push(draw_arrays(&statement)?),
                _ => self.ignore(&statement)?,
            }
        }
        Ok(mesh)
    }

    fn material(&mut self, header: &Statement<'a>) -> Result<TextMaterial<'a>> {
        let mut material = TextMaterial {
            name: header.name()?,
            ..TextMaterial::default()
        };
        self.enter(header)?;
        while let Some(statement) = self.body(header)? {
            match statement.keyword() {
                Some("Diffuse") => material.diffuse = Some(Vec4::from_array(statement.floats()?)),
                Some("Ambient") => material.ambient = Some(Vec4::from_array(statement.floats()?)),
                Some("Layer") => material.layers.push(self.layer(&statement)?),
                _ => self.ignore(&statement)?,
            }
        }
        Ok(material)
    }

    fn layer(&mut self, header: &Statement<'a>) -> Result<TextLayer<'a>> {
        let mut layer = TextLayer::default();
        self.enter(header)?;
        while let Some(statement) = self.body(header)? {
            match statement.keyword() {
                Some("Diffuse") => layer.diffuse = Some(Vec4::from_array(statement.floats()?)),
                Some("Ambient") => layer.ambient = Some(Vec4::from_array(statement.floats()?)),
                Some("Specular") => layer.specular = Some(Vec4::from_array(statement.floats()?)),
                Some("Emission") => layer.emission = Some(Vec4::from_array(statement.floats()?)),
                Some("SetTexture") => layer.texture = Some(statement.name()?),
                Some("BlendFunc") => {
                    let words: Vec<&str> = statement.words().collect();
                    let blend = match words.as_slice() {
                        [op, src, dst, ..] => BlendFunc::from_names(op, src, dst),
                        _ => None,
                    };
                    layer.blend = Some(blend.ok_or_else(|| {
                        statement.error(format!("invalid BlendFunc '{}'", words.join(" ")))
                    })?);
                }
                _ => self.ignore(&statement)?,
            }
        }
        Ok(layer)
    }

    fn texture(&mut self, header: &Statement<'a>) -> Result<TextTexture<'a>> {
        let mut texture = TextTexture {
            name: header.name()?,
            file_name: None,
        };
        self.enter(header)?;
        while let Some(statement) = self.body(header)? {
            match statement.keyword() {
                Some("FileName") => texture.file_name = Some(statement.name()?),
                _ => self.ignore(&statement)?,
            }
        }
        Ok(texture)
    }
}

fn draw_arrays<'a>(statement: &Statement<'a>) -> Result<TextDraw<'a>> {
    let arrays = statement.name()?;
    let mut words = statement.words();
    let primitive_name = words
        .next()
        .ok_or_else(|| statement.error("DrawArrays needs a primitive type"))?;
    let primitive = PrimitiveKind::from_name(primitive_name)
        .ok_or_else(|| statement.error(format!("unknown primitive '{primitive_name}'")))?;
    let mut number = |what: &str| -> Result<u32> {
        let word = words
            .next()
            .ok_or_else(|| statement.error(format!("DrawArrays needs {what}")))?;
        statement.parse(word)
    };
    let vertices_per_primitive = number("a vertex count")?;
    let primitive_count = number("a primitive count")?;
    let indices = words
        .map(|w| statement.parse::<u32>(w))
        .collect::<Result<Vec<_>>>()?;

    Ok(TextDraw {
        line: statement.line,
        arrays,
        primitive,
        vertices_per_primitive,
        primitive_count,
        indices,
    })
}

/// Name to first index
fn index_by_name<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<&'a str, usize> {
    let mut map = HashMap::new();
    for (index, name) in names.enumerate() {
        map.entry(name).or_insert(index);
    }
    map
}

struct Builder<'m, 'a> {
    model: &'m TextModel<'a>,
    bone_index: HashMap<&'a str, usize>,
    container: Container,
}

impl<'m, 'a> Builder<'m, 'a> {
    fn new(model: &'m TextModel<'a>) -> Self {
        Self {
            model,
            bone_index: index_by_name(model.bones.iter().map(|b| b.name)),
            container: Container::new(GmoVersion::Text),
        }
    }

    fn build(mut self) -> Result<Container> {
        self.bones();
        self.materials();
        self.geometry()?;
        Ok(self.container)
    }

    fn bones(&mut self) {
        for bone in &self.model.bones {
            let parent = bone.parent.and_then(|parent| {
                let index = self.bone_index.get(parent).copied();
                if index.is_none() {
                    self.container.warnings.push(ImportWarning::UnknownParentBone {
                        bone: bone.name.to_string(),
                        parent: parent.to_string(),
                    });
                }
                index
            });
            log::trace!("GMS line {}: bone '{}'", bone.line, bone.name);
            self.container.bones.push(BoneRecord {
                name: bone.name.to_string(),
                parent,
                translation: bone.translation,
                rotation: bone.rotation,
                scale: bone.scale,
            });
        }
    }

    fn materials(&mut self) {
        let mut texture_index = index_by_name(self.model.textures.iter().map(|t| t.name));
        self.container.textures = self
            .model
            .textures
            .iter()
            .map(|t| TextureRecord {
                name: t.name.to_string(),
                source: TextureSource::External {
                    file_name: t.file_name.unwrap_or(t.name).to_string(),
                },
            })
            .collect();

        for material in &self.model.materials {
            let mut record = MaterialRecord::plain(material.name);
            if let Some(diffuse) = material.diffuse {
                record.diffuse = diffuse;
            }
            if let Some(ambient) = material.ambient {
                record.ambient = ambient;
            }

            for layer in &material.layers {
                record.diffuse = layer.diffuse.unwrap_or(record.diffuse);
                record.ambient = layer.ambient.unwrap_or(record.ambient);
                record.specular = layer.specular.unwrap_or(record.specular);
                record.emission = layer.emission.unwrap_or(record.emission);
                if let Some(blend) = layer.blend
                    && record.blend_mode == 0
                {
                    record.blend_mode = blend.encode();
                }

                if let Some(name) = layer.texture {
                    let textures = &mut self.container.textures;
                    let index = *texture_index.entry(name).or_insert_with(|| {
                        textures.push(TextureRecord {
                            name: name.to_string(),
                            source: TextureSource::External {
                                file_name: name.to_string(),
                            },
                        });
                        textures.len() - 1
                    });
                    record.slots.push(SlotRecord {
                        role: TextureRole::Base,
                        texture: Some(index as u32),
                    });
                }
            }
            self.container.materials.push(record);
        }
    }

    fn find_arrays(&self, part: &'m TextPart<'a>, name: &str) -> Option<&'m TextArrays<'a>> {
        part.arrays
            .iter()
            .chain(self.model.parts.iter().flat_map(|p| p.arrays.iter()))
            .find(|a| a.name == name)
    }

    fn geometry(&mut self) -> Result<()> {
        let model = self.model;
        let material_index = index_by_name(model.materials.iter().map(|m| m.name));
        let mut owners: HashMap<&str, usize> = HashMap::new();
        for (index, bone) in model.bones.iter().enumerate() {
            for &part in &bone.parts {
                owners.entry(part).or_insert(index);
            }
        }

        for part in &model.parts {
            let owner = owners.get(part.name).copied();
            for mesh in &part.meshes {
                let mut chunk = self.mesh(part, mesh)?;
                chunk.material = mesh.material.map(|name| {
                    material_index
                        .get(name)
                        .map_or(model.materials.len() as u32, |&i| i as u32)
                });
                self.bind(part, owner, mesh, &mut chunk);
                self.container.geometry.push(chunk);
            }
        }
        Ok(())
    }

    /// Collect the vertices a mesh draws from, rebasing indices per `Arrays`
    fn mesh(&self, part: &'m TextPart<'a>, mesh: &TextMesh<'a>) -> Result<GeometryChunk> {
        let mut vertices: Vec<RawVertex> = Vec::new();
        let mut bases: HashMap<&str, (u32, u32)> = HashMap::new();
        let mut draws = Vec::with_capacity(mesh.draws.len());

        for draw in &mesh.draws {
            let (base, len) = match bases.get(draw.arrays) {
                Some(&entry) => entry,
                None => {
                    let arrays = self.find_arrays(part, draw.arrays).ok_or_else(|| {
                        text_error(draw.line, format!("unknown arrays '{}'", draw.arrays))
                    })?;
                    let entry = (vertices.len() as u32, arrays.vertices.len() as u32);
                    vertices.extend(arrays.vertices.iter().cloned());
                    bases.insert(draw.arrays, entry);
                    entry
                }
            };
            let indices = if draw.indices.is_empty() {
                let count = draw
                    .vertices_per_primitive
                    .checked_mul(draw.primitive_count)
                    .filter(|&count| count <= len)
                    .ok_or_else(|| {
                        text_error(
                            draw.line,
                            format!(
                                "DrawArrays needs {} x {} vertices, arrays '{}' has {len}",
                                draw.vertices_per_primitive, draw.primitive_count, draw.arrays
                            ),
                        )
                    })?;
                (base..base + count).collect()
            } else {
                draw.indices
                    .iter()
                    .map(|&i| {
                        if i < len {
                            Ok(base + i)
                        } else {
                            Err(text_error(
                                draw.line,
                                format!("index {i} is past the end of arrays '{}' ({len})", draw.arrays),
                            ))
                        }
                    })
                    .collect::<Result<Vec<_>>>()?
            };
            draws.push(DrawCommand {
                primitive: draw.primitive,
                vertices_per_primitive: draw.vertices_per_primitive,
                primitive_count: draw.primitive_count,
                indices,
            });
        }

        Ok(GeometryChunk {
            chunk_index: self.container.geometry.len(),
            name: mesh.name.to_string(),
            stream: VertexStream::Decoded(vertices),
            draws,
            material: None,
            rigid_bone: None,
            palette: Vec::new(),
        })
    }

    /// Attach a mesh to the bone that draws its part
    fn bind(
        &mut self,
        part: &TextPart<'a>,
        owner: Option<usize>,
        mesh: &TextMesh<'a>,
        chunk: &mut GeometryChunk,
    ) {
        let VertexStream::Decoded(vertices) = &mut chunk.stream else {
            return;
        };
        let model = self.model;
        let blend_bones = owner.map_or(&[][..], |b| model.bones[b].blend_bones.as_slice());

        if mesh.blend_subset.is_empty() {
            if blend_bones.is_empty()
                && let Some(bone) = owner
            {
                chunk.rigid_bone = Some(bone as u32);
            }
            for vertex in vertices.iter_mut() {
                vertex.weights.clear();
            }
            return;
        }

        let mut unknown_slots = Vec::new();
        for (slot, &local) in mesh.blend_subset.iter().enumerate() {
            let name = blend_bones.get(local).copied();
            match name.and_then(|n| self.bone_index.get(n)) {
                Some(&bone) => chunk.palette.push(bone as u32),
                None => {
                    self.container.warnings.push(ImportWarning::UnknownBlendBone {
                        part: part.name.to_string(),
                        bone: name.map_or_else(|| format!("#{local}"), str::to_string),
                    });
                    chunk.palette.push(0);
                    unknown_slots.push(slot);
                }
            }
        }

        for vertex in vertices.iter_mut() {
            vertex.weights.truncate(chunk.palette.len());
            for &slot in &unknown_slots {
                if let Some(weight) = vertex.weights.get_mut(slot) {
                    *weight = 0.0;
                }
            }
        }
        if !unknown_slots.is_empty() && chunk.palette.len() == 1 {
            chunk.palette.clear();
        }
    }
}

/// Parse a `.GMS` text export into a container
pub fn parse_gms(text: &str) -> Result<Container> {
    let header = text.trim_start_matches('\u{feff}');
    if !header.starts_with(GMS_MAGIC) {
        return Err(GmoError::InvalidMagic {
            expected: GMS_MAGIC.to_string(),
            actual: header.chars().take(GMS_MAGIC.len()).collect(),
        });
    }

    let mut parser = Parser {
        statements: tokenize(header)?,
        pos: 0,
    };
    let model = parser.file()?;
    let container = Builder::new(&model).build()?;
    log::debug!(
        "GMS: {} bones, {} meshes, {} materials, {} textures",
        container.bones.len(),
        container.geometry.len(),
        container.materials.len(),
        container.textures.len()
    );
    Ok(container)
}
