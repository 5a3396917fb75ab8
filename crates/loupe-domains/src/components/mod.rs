//! Administration component registrations.
//!
//! Three source shapes contribute facts:
//!
//! - `Component.register(name, def)` and `Component.extend(name, parent, def)`
//!   calls (with or without the `Shopware.` prefix), where `def` is an
//!   options object or a lazy `() => import('..')`
//! - `export default Shopware.Component.wrapComponentConfig({..})`, naming
//!   the component after its directory or file
//! - `export default {..}` definition files loaded by lazy registrations
//!
//! Registrations land in `components.db` keyed by component name. Parsed
//! options objects land in `component_definitions.db`, keyed by component
//! name for inline and wrapped definitions and by normalized file path for
//! definition files. The store keeps every contribution; readers reduce them
//! with [`merge_components`].

mod merge;
mod parse;

pub use merge::merge_components;

use crate::text::{line_of, string_literal};
use crate::ADMINISTRATION_DIR;
use loupe_indexer::indexer::slash_path;
use loupe_indexer::pattern::{and, any_text, find_all, has_child, kind, Pattern};
use loupe_indexer::{DomainIndexer, FactStore, FileFacts, IndexerError, Node, SyntaxTree};
use parse::{
    export_default_object, normalize_definition_path, parse_definition, resolve_import_path,
    template_import,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A component prop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prop {
    pub name: String,
    #[serde(rename = "type")]
    pub prop_type: Option<String>,
    pub required: bool,
    /// Default value as written in source
    pub default: Option<String>,
    pub line: usize,
}

/// A `<slot>` in a component template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    pub line: usize,
}

/// A `{% block %}` in a component template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwigBlock {
    pub name: String,
    pub line: usize,
}

/// Parsed component options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub file_path: String,
    pub props: Vec<Prop>,
    pub emits: Vec<String>,
    pub methods: Vec<String>,
    pub computed: Vec<String>,
    pub slots: Vec<Slot>,
    pub blocks: Vec<TwigBlock>,
    pub template_path: Option<String>,
    pub has_template: bool,
}

/// One registration of a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VueComponent {
    pub name: String,
    pub extends_component: Option<String>,
    /// Specifier of a lazy `import('..')` definition
    pub import_path: Option<String>,
    /// File the registration was found in
    pub file_path: String,
    /// File holding the options object
    pub definition_path: Option<String>,
    pub line: usize,
    pub props: Vec<Prop>,
    pub emits: Vec<String>,
    pub methods: Vec<String>,
    pub computed: Vec<String>,
    pub slots: Vec<Slot>,
    pub blocks: Vec<TwigBlock>,
    pub template_path: Option<String>,
    /// Options object parsed from an inline registration. Not persisted.
    #[serde(skip)]
    pub inline_definition: Option<ComponentDefinition>,
}

impl VueComponent {
    fn apply_definition(&mut self, def: &ComponentDefinition) {
        self.props = def.props.clone();
        self.emits = def.emits.clone();
        self.methods = def.methods.clone();
        self.computed = def.computed.clone();
        self.slots = def.slots.clone();
        self.blocks = def.blocks.clone();
        self.template_path = def.template_path.clone();
    }
}

/// Indexes administration JS/TS files into `components.db` and
/// `component_definitions.db`.
pub struct ComponentsIndexer {
    components: FactStore<VueComponent>,
    definitions: FactStore<ComponentDefinition>,
    registration: Pattern,
    wrapped_export: Pattern,
}

impl ComponentsIndexer {
    pub const ID: &'static str = "admin.components";

    pub fn open(cache_dir: &Path) -> Result<Self, IndexerError> {
        let registration = and([
            kind("call_expression"),
            has_child(and([
                kind("member_expression"),
                any_text([
                    "Shopware.Component.register",
                    "Shopware.Component.extend",
                    "Component.register",
                    "Component.extend",
                ]),
            ])),
        ]);
        let wrapped_export = and([
            kind("export_statement"),
            has_child(and([
                kind("call_expression"),
                has_child(and([
                    kind("member_expression"),
                    any_text([
                        "Shopware.Component.wrapComponentConfig",
                        "Component.wrapComponentConfig",
                    ]),
                ])),
            ])),
        ]);

        Ok(Self {
            components: FactStore::open(cache_dir.join("components.db"))?,
            definitions: FactStore::open(cache_dir.join("component_definitions.db"))?,
            registration,
            wrapped_export,
        })
    }

    /// Raw registrations of `name`, one per contributing call.
    pub fn get_component(&self, name: &str) -> Result<Vec<VueComponent>, IndexerError> {
        self.components.get_values(name)
    }

    pub fn get_component_names(&self) -> Result<Vec<String>, IndexerError> {
        self.components.get_all_keys()
    }

    pub fn get_all_components(&self) -> Result<Vec<VueComponent>, IndexerError> {
        self.components.get_all_values()
    }

    /// Definition stored for a definition file path (extension and `/index`
    /// optional).
    pub fn get_definition(
        &self,
        definition_path: &str,
    ) -> Result<Option<ComponentDefinition>, IndexerError> {
        let key = normalize_definition_path(definition_path);
        Ok(self.definitions.get_values(&key)?.into_iter().next())
    }

    /// Definition stored under a component name.
    pub fn get_definition_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ComponentDefinition>, IndexerError> {
        Ok(self.definitions.get_values(name)?.into_iter().next())
    }

    /// Registrations of `name`, each completed from its definition.
    ///
    /// A definition is looked up by the record's definition path first and by
    /// component name second. Among definitions stored under the name, the one
    /// parsed from the record's own file is preferred.
    pub fn get_component_with_definitions(
        &self,
        name: &str,
    ) -> Result<Vec<VueComponent>, IndexerError> {
        let mut components = self.components.get_values(name)?;
        let by_name = self.definitions.get_values(name)?;
        for component in &mut components {
            let by_path = match &component.definition_path {
                Some(path) => self.get_definition(path)?,
                None => None,
            };
            let def = by_path.or_else(|| {
                by_name
                    .iter()
                    .find(|def| def.file_path == component.file_path)
                    .or_else(|| by_name.first())
                    .cloned()
            });
            if let Some(def) = def {
                component.apply_definition(&def);
            }
        }
        Ok(components)
    }

    /// The single merged view of `name`, or `None` if nothing registers it.
    pub fn resolve_component(&self, name: &str) -> Result<Option<VueComponent>, IndexerError> {
        Ok(merge_components(self.get_component_with_definitions(name)?))
    }

    fn is_administration_script(path: &Path) -> bool {
        let is_script = path
            .extension()
            .is_some_and(|ext| ext == "js" || ext == "ts");
        is_script && slash_path(path).contains(ADMINISTRATION_DIR)
    }

    fn registrations(
        &self,
        root: Node<'_>,
        source: &str,
        path: &Path,
        template: Option<&str>,
        facts: &mut FileComponents,
    ) {
        for call in find_all(root, &self.registration, source) {
            let Some(member) = call
                .named_children()
                .find(|n| n.kind() == "member_expression")
            else {
                continue;
            };
            let is_extend = member.text(source).ends_with(".extend");
            let Some(arguments) = call.child_of_kind("arguments") else {
                continue;
            };
            let args: Vec<Node<'_>> = arguments
                .named_children()
                .filter(|n| n.kind() != "comment")
                .collect();

            let Some(name) = args
                .first()
                .filter(|n| n.kind() == "string")
                .map(|n| string_literal(*n, source))
            else {
                continue;
            };

            let mut component = VueComponent {
                name: name.clone(),
                file_path: path.to_string_lossy().into_owned(),
                line: line_of(call),
                ..Default::default()
            };

            let options = if is_extend {
                component.extends_component = args
                    .get(1)
                    .filter(|n| n.kind() == "string")
                    .map(|n| string_literal(*n, source));
                args.get(2)
            } else {
                args.get(1)
            };

            match options.map(|n| (n.kind(), *n)) {
                Some(("object", object)) => {
                    let def = parse_definition(object, source, path, template);
                    component.definition_path = Some(path.to_string_lossy().into_owned());
                    component.apply_definition(&def);
                    component.inline_definition = Some(def.clone());
                    facts.definitions.push((name.clone(), def));
                }
                Some(("arrow_function", arrow)) => {
                    if let Some(import) = lazy_import(arrow, source) {
                        component.definition_path = Some(resolve_import_path(path, &import));
                        component.import_path = Some(import);
                    }
                }
                _ => {}
            }

            facts.components.push((name, component));
        }
    }

    /// Handle `export default Component.wrapComponentConfig({..})`. Returns
    /// whether the file had such an export.
    fn wrapped_component(
        &self,
        root: Node<'_>,
        source: &str,
        path: &Path,
        template: Option<&str>,
        facts: &mut FileComponents,
    ) -> bool {
        let Some(export) = root
            .named_children()
            .filter(|n| n.child_of_kind("default").is_some())
            .find(|n| self.wrapped_export.matches(*n, source))
        else {
            return false;
        };

        let Some(name) = component_name_from_path(path) else {
            return true;
        };
        let config = export
            .child_of_kind("call_expression")
            .and_then(|call| call.child_of_kind("arguments"))
            .and_then(|args| args.child_of_kind("object"));
        let Some(config) = config else {
            return true;
        };

        let def = parse_definition(config, source, path, template);
        let mut component = VueComponent {
            name: name.clone(),
            file_path: path.to_string_lossy().into_owned(),
            definition_path: Some(path.to_string_lossy().into_owned()),
            line: line_of(export),
            ..Default::default()
        };
        component.apply_definition(&def);
        facts.definitions.push((name.clone(), def));
        facts.components.push((name, component));
        true
    }
}

/// Everything one file contributes to the two stores.
#[derive(Default)]
struct FileComponents {
    components: FileFacts<VueComponent>,
    definitions: FileFacts<ComponentDefinition>,
}

/// Specifier of the `import('..')` inside a lazy definition.
fn lazy_import(arrow: Node<'_>, source: &str) -> Option<String> {
    arrow
        .descendants()
        .find(|n| n.kind() == "call_expression" && n.child_of_kind("import").is_some())
        .and_then(|call| call.descendant_of_kind("string"))
        .map(|s| string_literal(s, source))
}

/// `sw-card/index.ts` is `sw-card`; `sw-card.ts` is `sw-card`.
fn component_name_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    if stem == "index" {
        let dir = path.parent()?.file_name()?.to_str()?;
        Some(dir.to_string())
    } else {
        Some(stem.to_string())
    }
}

impl DomainIndexer for ComponentsIndexer {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn accepts(&self, path: &Path) -> bool {
        Self::is_administration_script(path)
    }

    fn index(&self, path: &Path, tree: &SyntaxTree, source: &str) -> Result<(), IndexerError> {
        if !self.accepts(path) {
            return Ok(());
        }

        let root = tree.root();
        let template = template_import(root, source);
        let template = template.as_deref();
        let mut facts = FileComponents::default();

        self.registrations(root, source, path, template, &mut facts);
        let wrapped = self.wrapped_component(root, source, path, template, &mut facts);
        if !wrapped {
            if let Some(object) = export_default_object(root) {
                let def = parse_definition(object, source, path, template);
                let key = normalize_definition_path(&path.to_string_lossy());
                facts.definitions.push((key, def));
            }
        }

        debug!(
            path = ?path,
            components = facts.components.len(),
            definitions = facts.definitions.len(),
            "Indexed administration script"
        );

        // Not one transaction: a failure here can leave the two stores out of
        // step for this file until its next successful index.
        self.components
            .batch_save_items(&[(path, facts.components)])?;
        self.definitions
            .batch_save_items(&[(path, facts.definitions)])
    }

    fn removed_files(&self, paths: &[PathBuf]) -> Result<(), IndexerError> {
        self.components.batch_delete_by_file_paths(paths)?;
        self.definitions.batch_delete_by_file_paths(paths)
    }

    fn close(&self) -> Result<(), IndexerError> {
        self.components.close()?;
        self.definitions.close()
    }

    fn clear(&self) -> Result<(), IndexerError> {
        self.components.clear()?;
        self.definitions.clear()
    }
}
