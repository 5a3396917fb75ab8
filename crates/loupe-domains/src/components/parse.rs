//! Extraction of component definitions from JavaScript syntax trees.

use super::{ComponentDefinition, Prop, Slot, TwigBlock};
use crate::text::{line_of, string_literal};
use crate::ADMINISTRATION_DIR;
use loupe_indexer::Node;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

static SLOT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<slot(?:\s+name=["']([^"']+)["'])?[^>]*>"#)
        .unwrap_or_else(|_| unreachable!("slot pattern is valid"))
});

static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{%\s*block\s+(\w+)\s*%\}")
        .unwrap_or_else(|_| unreachable!("block pattern is valid"))
});

/// Parse the members of a component options object.
///
/// `template_import` is the module specifier of the file's
/// `import template from '..'`, if any; it is resolved against `file` and
/// the referenced template is scanned for slots and blocks.
pub(crate) fn parse_definition(
    object: Node<'_>,
    source: &str,
    file: &Path,
    template_import: Option<&str>,
) -> ComponentDefinition {
    let mut def = ComponentDefinition {
        file_path: file.to_string_lossy().into_owned(),
        ..Default::default()
    };

    for member in object.named_children() {
        match member.kind() {
            "pair" => {
                let Some(key) = key_name(member, source) else {
                    continue;
                };
                let value = member.named_child(1);
                match (key.as_str(), value) {
                    ("props", Some(value)) => def.props = parse_props(value, source),
                    ("emits", Some(value)) => def.emits = string_items(value, source),
                    ("methods", Some(value)) => def.methods = member_names(value, source),
                    ("computed", Some(value)) => def.computed = member_names(value, source),
                    ("template", _) => def.has_template = true,
                    _ => {}
                }
            }
            "shorthand_property_identifier" if member.text(source) == "template" => {
                def.has_template = true;
            }
            _ => {}
        }
    }

    if let Some(import) = template_import {
        let template = resolve_relative(file, import);
        let scan = std::fs::read_to_string(&template)
            .map(|content| scan_template(&content))
            .unwrap_or_default();
        def.slots = scan.slots;
        def.blocks = scan.blocks;
        def.template_path = Some(template.to_string_lossy().into_owned());
    }

    def
}

/// The options object of a top-level `export default { .. }`.
pub(crate) fn export_default_object(root: Node<'_>) -> Option<Node<'_>> {
    root.named_children()
        .filter(|n| n.kind() == "export_statement" && n.child_of_kind("default").is_some())
        .find_map(|export| export.child_of_kind("object"))
}

/// Specifier of a top-level `import template from '..'`.
pub(crate) fn template_import(root: Node<'_>, source: &str) -> Option<String> {
    root.named_children()
        .filter(|n| n.kind() == "import_statement")
        .find(|import| {
            import
                .child_of_kind("import_clause")
                .and_then(|clause| clause.child_of_kind("identifier"))
                .is_some_and(|ident| ident.text(source) == "template")
        })
        .and_then(|import| import.child_of_kind("string"))
        .map(|s| string_literal(s, source))
}

/// Name of an object member key: `foo`, `'foo'` or `"foo"`.
fn key_name(member: Node<'_>, source: &str) -> Option<String> {
    let key = member.named_child(0)?;
    match key.kind() {
        "property_identifier" => Some(key.text(source).to_string()),
        "string" => Some(string_literal(key, source)),
        _ => None,
    }
}

fn parse_props(value: Node<'_>, source: &str) -> Vec<Prop> {
    match value.kind() {
        // props: ['label', 'variant']
        "array" => value
            .named_children()
            .filter(|n| n.kind() == "string")
            .map(|s| Prop {
                name: string_literal(s, source),
                line: line_of(s),
                ..Default::default()
            })
            .collect(),
        "object" => value
            .named_children()
            .filter(|n| n.kind() == "pair")
            .filter_map(|pair| parse_prop(pair, source))
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_prop(pair: Node<'_>, source: &str) -> Option<Prop> {
    let key = pair.named_child(0)?;
    let mut prop = Prop {
        name: key_name(pair, source)?,
        line: line_of(key),
        ..Default::default()
    };

    match pair.named_child(1) {
        // label: String
        Some(value) if value.kind() == "identifier" => {
            prop.prop_type = Some(value.text(source).to_string());
        }
        // label: { type: String, required: true, default: '' }
        Some(options) if options.kind() == "object" => {
            for option in options.named_children().filter(|n| n.kind() == "pair") {
                let Some(value) = option.named_child(1) else {
                    continue;
                };
                match key_name(option, source).as_deref() {
                    Some("type") => prop.prop_type = Some(value.text(source).to_string()),
                    Some("required") => prop.required = value.kind() == "true",
                    Some("default") => prop.default = Some(value.text(source).to_string()),
                    _ => {}
                }
            }
        }
        _ => {}
    }

    Some(prop)
}

fn string_items(value: Node<'_>, source: &str) -> Vec<String> {
    if value.kind() != "array" {
        return Vec::new();
    }
    value
        .named_children()
        .filter(|n| n.kind() == "string")
        .map(|s| string_literal(s, source))
        .collect()
}

fn member_names(value: Node<'_>, source: &str) -> Vec<String> {
    if value.kind() != "object" {
        return Vec::new();
    }
    value
        .named_children()
        .filter_map(|member| match member.kind() {
            "method_definition" => member
                .child_of_kind("property_identifier")
                .map(|n| n.text(source).to_string()),
            "pair" => key_name(member, source),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct TemplateScan {
    pub(crate) slots: Vec<Slot>,
    pub(crate) blocks: Vec<TwigBlock>,
}

/// Collect `<slot>` tags and `{% block %}` tags, first occurrence per name.
pub(crate) fn scan_template(content: &str) -> TemplateScan {
    let mut scan = TemplateScan::default();
    let mut seen_slots = HashSet::new();
    let mut seen_blocks = HashSet::new();

    for (index, line) in content.lines().enumerate() {
        for captures in SLOT_TAG.captures_iter(line) {
            let name = captures.get(1).map_or("default", |m| m.as_str());
            if seen_slots.insert(name.to_string()) {
                scan.slots.push(Slot {
                    name: name.to_string(),
                    line: index + 1,
                });
            }
        }
        for captures in BLOCK_TAG.captures_iter(line) {
            let name = &captures[1];
            if seen_blocks.insert(name.to_string()) {
                scan.blocks.push(TwigBlock {
                    name: name.to_string(),
                    line: index + 1,
                });
            }
        }
    }

    scan
}

/// Resolve a lazy-import specifier from a registration in `file` to the
/// definition file it loads.
///
/// `src/..` is resolved against the administration root, `./` and `../`
/// against the file's directory. Other specifiers are returned unchanged.
pub(crate) fn resolve_import_path(file: &Path, import: &str) -> String {
    let resolved = if import.starts_with("src/") {
        let file_text = file.to_string_lossy();
        let marker = format!("{ADMINISTRATION_DIR}/");
        match file_text.find(&marker) {
            Some(index) => PathBuf::from(&file_text[..index + marker.len()]).join(import),
            None => return import.to_string(),
        }
    } else if import.starts_with("./") || import.starts_with("../") {
        resolve_relative(file, import)
    } else {
        return import.to_string();
    };

    resolve_js_file(&resolved).to_string_lossy().into_owned()
}

/// Join `import` onto the directory of `file`, folding `.` and `..`.
pub(crate) fn resolve_relative(file: &Path, import: &str) -> PathBuf {
    let base = file.parent().unwrap_or_else(|| Path::new(""));
    normalize(&base.join(import))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Pick the file a module specifier refers to: the path itself when it has a
/// script extension, else the first existing `.js`, `.ts`, `/index.js`,
/// `/index.ts`, falling back to `/index.js`.
fn resolve_js_file(path: &Path) -> PathBuf {
    if path
        .extension()
        .is_some_and(|ext| ext == "js" || ext == "ts")
    {
        return path.to_path_buf();
    }

    let text = path.to_string_lossy();
    [".js", ".ts", "/index.js", "/index.ts"]
        .iter()
        .map(|suffix| PathBuf::from(format!("{text}{suffix}")))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| path.join("index.js"))
}

/// Definitions-store key for a definition file: extension and a trailing
/// `/index` removed, so `sw-card/index.ts` and `sw-card` agree.
pub(crate) fn normalize_definition_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let stem = path
        .strip_suffix(".js")
        .or_else(|| path.strip_suffix(".ts"))
        .unwrap_or(&path);
    stem.strip_suffix("/index").unwrap_or(stem).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use loupe_indexer::Parser;
    use std::fs;
    use tempfile::tempdir;

    fn definition(source: &str) -> ComponentDefinition {
        let path = Path::new("/admin/Resources/app/administration/src/sw-card/index.js");
        let tree = Parser::new().parse_path(path, source).unwrap();
        let object = export_default_object(tree.root()).unwrap();
        parse_definition(object, source, path, None)
    }

    #[test]
    fn test_parse_object_props() {
        let def = definition(
            "export default {\n    props: {\n        label: { type: String, required: true },\n        variant: { type: String, default: 'primary' },\n        size: Number,\n    },\n};\n",
        );

        assert_eq!(def.props.len(), 3);
        assert_eq!(def.props[0].name, "label");
        assert!(def.props[0].required);
        assert_eq!(def.props[0].line, 3);
        assert_eq!(def.props[1].default.as_deref(), Some("'primary'"));
        assert!(!def.props[1].required);
        assert_eq!(def.props[2].prop_type.as_deref(), Some("Number"));
    }

    #[test]
    fn test_parse_array_props_emits_methods() {
        let def = definition(
            "export default {\n  template,\n  props: ['title', 'subtitle'],\n  emits: ['close'],\n  methods: { onClose() {}, toggle: function () {} },\n  computed: { isOpen() { return true; } },\n};",
        );

        let names: Vec<_> = def.props.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["title", "subtitle"]);
        assert_eq!(def.emits, vec!["close"]);
        assert_eq!(def.methods, vec!["onClose", "toggle"]);
        assert_eq!(def.computed, vec!["isOpen"]);
        assert!(def.has_template);
    }

    #[test]
    fn test_template_import() {
        let source = "import template from './sw-card.html.twig';\nexport default { template };";
        let path = Path::new("/a/index.js");
        let tree = Parser::new().parse_path(path, source).unwrap();
        assert_eq!(
            template_import(tree.root(), source).as_deref(),
            Some("./sw-card.html.twig")
        );
    }

    #[test]
    fn test_scan_template_slots_and_blocks() {
        let scan = scan_template(
            "{% block sw_card %}\n<div>\n  <slot></slot>\n  <slot name=\"footer\"/>\n  <slot name='footer'></slot>\n</div>\n{% block sw_card %}{% endblock %}\n{% endblock %}",
        );

        assert_eq!(
            scan.slots,
            vec![
                Slot {
                    name: "default".into(),
                    line: 3
                },
                Slot {
                    name: "footer".into(),
                    line: 4
                },
            ]
        );
        assert_eq!(
            scan.blocks,
            vec![TwigBlock {
                name: "sw_card".into(),
                line: 1
            }]
        );
    }

    #[test]
    fn test_definition_reads_template_file() {
        let dir = tempdir().unwrap();
        let component = dir.path().join("sw-card");
        fs::create_dir_all(&component).unwrap();
        fs::write(
            component.join("sw-card.html.twig"),
            "{% block sw_card %}<slot name=\"title\"></slot>{% endblock %}",
        )
        .unwrap();

        let file = component.join("index.js");
        let source = "export default { template };";
        let tree = Parser::new().parse_path(&file, source).unwrap();
        let object = export_default_object(tree.root()).unwrap();
        let def = parse_definition(object, source, &file, Some("./sw-card.html.twig"));

        assert_eq!(
            def.template_path,
            Some(component.join("sw-card.html.twig").to_string_lossy().into_owned())
        );
        assert_eq!(def.slots[0].name, "title");
        assert_eq!(def.blocks[0].name, "sw_card");
    }

    #[test]
    fn test_resolve_import_path() {
        let dir = tempdir().unwrap();
        let admin = dir.path().join("Resources/app/administration");
        let module = admin.join("src/app/component/sw-card");
        fs::create_dir_all(&module).unwrap();
        fs::write(module.join("index.ts"), "").unwrap();
        let file = admin.join("src/app/component/index.js");

        assert_eq!(
            resolve_import_path(&file, "src/app/component/sw-card"),
            module.join("index.ts").to_string_lossy()
        );
        assert_eq!(
            resolve_import_path(&file, "./sw-card"),
            module.join("index.ts").to_string_lossy()
        );
        assert_eq!(
            resolve_import_path(&file, "./missing"),
            admin
                .join("src/app/component/missing/index.js")
                .to_string_lossy()
        );
        assert_eq!(resolve_import_path(&file, "@vendor/x"), "@vendor/x");
        assert_eq!(
            resolve_import_path(Path::new("/elsewhere/a.js"), "src/x"),
            "src/x"
        );
    }

    #[test]
    fn test_resolve_relative_parent() {
        assert_eq!(
            resolve_relative(Path::new("/a/b/c/index.js"), "../d/e.js"),
            PathBuf::from("/a/b/d/e.js")
        );
    }

    #[test]
    fn test_normalize_definition_path() {
        assert_eq!(normalize_definition_path("/x/sw-card/index.ts"), "/x/sw-card");
        assert_eq!(normalize_definition_path("/x/sw-card.js"), "/x/sw-card");
        assert_eq!(normalize_definition_path("/x/sw-card"), "/x/sw-card");
    }
}
