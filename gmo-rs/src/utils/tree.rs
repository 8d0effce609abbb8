//! Tree rendering for model structure

use console::Style;

use super::format::format_bytes;

/// A node in a rendered tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub node_type: NodeType,
    pub size: Option<u64>,
    pub children: Vec<TreeNode>,
    /// Key/value pairs, printed in insertion order
    pub metadata: Vec<(String, String)>,
    pub external_refs: Vec<ExternalRef>,
}

/// Kinds of nodes in a model tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Root,
    Header,
    Chunk,
    Group,
    Bone,
    Mesh,
    Material,
    Texture,
}

/// A file the model refers to
#[derive(Debug, Clone)]
pub struct ExternalRef {
    pub path: String,
    /// `None` when existence was not checked
    pub exists: Option<bool>,
}

/// Options for tree rendering
#[derive(Debug, Clone)]
pub struct TreeOptions {
    pub max_depth: Option<usize>,
    pub show_external_refs: bool,
    pub no_color: bool,
    pub show_metadata: bool,
    pub compact: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            show_external_refs: true,
            no_color: false,
            show_metadata: true,
            compact: false,
        }
    }
}

impl TreeNode {
    pub fn new(name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            name: name.into(),
            node_type,
            size: None,
            children: Vec::new(),
            metadata: Vec::new(),
            external_refs: Vec::new(),
        }
    }

    pub fn add_child(mut self, child: TreeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_external_ref(mut self, path: &str, exists: Option<bool>) -> Self {
        self.external_refs.push(ExternalRef {
            path: path.to_string(),
            exists,
        });
        self
    }
}

impl ExternalRef {
    /// Green when found, red when missing
    pub fn style(&self, no_color: bool) -> Style {
        if no_color {
            Style::new()
        } else {
            match self.exists {
                Some(true) => Style::new().green(),
                Some(false) => Style::new().red(),
                None => Style::new().yellow(),
            }
        }
    }
}

impl NodeType {
    pub fn icon(self) -> &'static str {
        match self {
            NodeType::Root => "📁",
            NodeType::Header => "📋",
            NodeType::Chunk => "📦",
            NodeType::Group => "📂",
            NodeType::Bone => "🦴",
            NodeType::Mesh => "🔺",
            NodeType::Material => "🎨",
            NodeType::Texture => "🖼️",
        }
    }

    pub fn style(self, no_color: bool) -> Style {
        if no_color {
            Style::new()
        } else {
            match self {
                NodeType::Root => Style::new().bold().cyan(),
                NodeType::Header => Style::new().bold().yellow(),
                NodeType::Chunk => Style::new().blue(),
                NodeType::Group => Style::new().cyan(),
                NodeType::Bone => Style::new().white(),
                NodeType::Mesh => Style::new().green(),
                NodeType::Material => Style::new().magenta(),
                NodeType::Texture => Style::new().yellow(),
            }
        }
    }
}

/// Render a tree to a string
pub fn render_tree(root: &TreeNode, options: &TreeOptions) -> String {
    let mut output = String::new();
    render_node(root, &mut output, "", true, 0, options);
    output
}

fn render_node(
    node: &TreeNode,
    output: &mut String,
    prefix: &str,
    is_last: bool,
    depth: usize,
    options: &TreeOptions,
) {
    if let Some(max_depth) = options.max_depth
        && depth > max_depth
    {
        return;
    }

    let connector = if depth == 0 {
        ""
    } else if is_last {
        "└── "
    } else {
        "├── "
    };
    let style = node.node_type.style(options.no_color);
    let mut line = format!(
        "{}{}{} {}",
        prefix,
        connector,
        node.node_type.icon(),
        style.apply_to(&node.name)
    );
    if let Some(size) = node.size {
        line.push_str(&format!(" ({})", format_bytes(size)));
    }
    if options.show_metadata && options.compact && !node.metadata.is_empty() {
        let parts: Vec<String> = node
            .metadata
            .iter()
            .map(|(key, value)| format!("{key}:{value}"))
            .collect();
        line.push_str(&format!(" [{}]", parts.join(", ")));
    }
    output.push_str(&line);
    output.push('\n');

    let child_prefix = if depth == 0 {
        String::new()
    } else {
        format!("{}{}", prefix, if is_last { "    " } else { "│   " })
    };

    if options.show_metadata && !options.compact {
        let meta_style = if options.no_color {
            Style::new()
        } else {
            Style::new().dim()
        };
        for (key, value) in &node.metadata {
            output.push_str(&format!(
                "{}    {}: {}\n",
                child_prefix,
                meta_style.apply_to(key),
                value
            ));
        }
    }

    if options.show_external_refs {
        for ext_ref in &node.external_refs {
            output.push_str(&format!(
                "{}    └─→ {}\n",
                child_prefix,
                ext_ref.style(options.no_color).apply_to(&ext_ref.path)
            ));
        }
    }

    for (i, child) in node.children.iter().enumerate() {
        let is_last_child = i == node.children.len() - 1;
        render_node(
            child,
            output,
            &child_prefix,
            is_last_child,
            depth + 1,
            options,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeNode {
        TreeNode::new("bc001.GMO", NodeType::Root)
            .with_size(2048)
            .with_metadata("version", "P3P")
            .add_child(
                TreeNode::new("Skeleton", NodeType::Group)
                    .add_child(TreeNode::new("root", NodeType::Bone)),
            )
            .add_child(
                TreeNode::new("skin.tm2", NodeType::Texture).with_external_ref("texture/skin.png", Some(true)),
            )
    }

    #[test]
    fn test_tree_rendering() {
        let options = TreeOptions {
            no_color: true,
            ..TreeOptions::default()
        };
        let output = render_tree(&sample(), &options);

        assert!(output.starts_with("📁 bc001.GMO (2.05 kB)\n"));
        assert!(output.contains("    version: P3P\n"));
        assert!(output.contains("├── 📂 Skeleton\n"));
        assert!(output.contains("│   └── 🦴 root\n"));
        assert!(output.contains("└─→ texture/skin.png"));
    }

    #[test]
    fn test_depth_limit_and_compact() {
        let options = TreeOptions {
            no_color: true,
            compact: true,
            max_depth: Some(1),
            ..TreeOptions::default()
        };
        let output = render_tree(&sample(), &options);

        assert!(output.contains("[version:P3P]"));
        assert!(output.contains("Skeleton"));
        assert!(!output.contains("root"));
    }
}
