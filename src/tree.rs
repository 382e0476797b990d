use std::fs;
use std::io;
use std::path::Path;

struct Node {
    label: String,
    children: Vec<Node>,
}

fn build(dir: &Path, label: String) -> io::Result<Node> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    let mut children = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            children.push(build(&entry.path(), name)?);
        } else {
            children.push(Node {
                label: name,
                children: Vec::new(),
            });
        }
    }
    Ok(Node { label, children })
}

fn draw(node: &Node, prefix: &str, out: &mut String) {
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let last = i + 1 == count;
        out.push_str(prefix);
        out.push_str(if last { "└─" } else { "├─" });
        out.push_str(if child.children.is_empty() { "─ " } else { "┬ " });
        out.push_str(&child.label);
        out.push('\n');

        let nested = format!("{prefix}{}", if last { "  " } else { "│ " });
        draw(child, &nested, out);
    }
}

/// Render the directory at `path` as a box-drawn tree, entries sorted by name.
///
/// Returns `None` if the directory cannot be read.
pub fn render_tree(path: &Path) -> Option<String> {
    let label = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let root = build(path, label).ok()?;

    let mut out = format!("{}\n", root.label);
    draw(&root, "", &mut out);
    Some(out)
}
