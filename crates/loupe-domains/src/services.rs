//! Service container definitions from XML files.

use crate::text::line_of;
use crate::xml::{attribute, child_element_named, child_elements, element_name, root_element, text_content};
use loupe_indexer::pattern::{find_all, Pattern};
use loupe_indexer::{DomainIndexer, FactStore, FileFacts, IndexerError, Node, SyntaxTree};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// `<service>` and `<alias>` directly under the container or `<services>`.
static DEFINITION: LazyLock<Pattern> =
    LazyLock::new(|| child_element_named(["service", "alias"], ["container", "services"]));

/// `<parameter>` directly under the container or `<parameters>`.
static PARAMETER: LazyLock<Pattern> =
    LazyLock::new(|| child_element_named(["parameter"], ["container", "parameters"]));

/// A `<service>` or `<alias>` definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    /// Defaults to the id when no `class` attribute is given
    pub class: String,
    /// Target service id for aliases
    pub alias_target: Option<String>,
    /// Names of attached `<tag>` elements
    pub tags: Vec<String>,
    pub path: String,
    pub line: usize,
}

/// A container `<parameter>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
    pub path: String,
    pub line: usize,
}

/// Indexes `<container>` XML files into `services.db` and `parameters.db`.
pub struct ServicesIndexer {
    services: FactStore<Service>,
    parameters: FactStore<Parameter>,
}

impl ServicesIndexer {
    pub const ID: &'static str = "symfony.services";

    pub fn open(cache_dir: &Path) -> Result<Self, IndexerError> {
        Ok(Self {
            services: FactStore::open(cache_dir.join("services.db"))?,
            parameters: FactStore::open(cache_dir.join("parameters.db"))?,
        })
    }

    /// Every definition registered under `id`.
    pub fn get_services(&self, id: &str) -> Result<Vec<Service>, IndexerError> {
        self.services.get_values(id)
    }

    pub fn get_service_ids(&self) -> Result<Vec<String>, IndexerError> {
        self.services.get_all_keys()
    }

    pub fn get_all_services(&self) -> Result<Vec<Service>, IndexerError> {
        self.services.get_all_values()
    }

    pub fn get_parameters(&self, name: &str) -> Result<Vec<Parameter>, IndexerError> {
        self.parameters.get_values(name)
    }

    pub fn get_parameter_names(&self) -> Result<Vec<String>, IndexerError> {
        self.parameters.get_all_keys()
    }
}

impl DomainIndexer for ServicesIndexer {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xml"))
    }

    fn index(&self, path: &Path, tree: &SyntaxTree, source: &str) -> Result<(), IndexerError> {
        if !self.accepts(path) {
            return Ok(());
        }

        let mut definitions = ContainerFacts::new(path);
        if let Some(container) = root_element(tree.root(), "container", source) {
            definitions.collect(container, source);
        }
        debug!(
            path = ?path,
            services = definitions.services.len(),
            parameters = definitions.parameters.len(),
            "Indexed service container"
        );

        self.services
            .batch_save_items(&[(path, definitions.services)])?;
        self.parameters
            .batch_save_items(&[(path, definitions.parameters)])
    }

    fn removed_files(&self, paths: &[PathBuf]) -> Result<(), IndexerError> {
        self.services.batch_delete_by_file_paths(paths)?;
        self.parameters.batch_delete_by_file_paths(paths)
    }

    fn close(&self) -> Result<(), IndexerError> {
        self.services.close()?;
        self.parameters.close()
    }

    fn clear(&self) -> Result<(), IndexerError> {
        self.services.clear()?;
        self.parameters.clear()
    }
}

struct ContainerFacts {
    path: String,
    services: FileFacts<Service>,
    parameters: FileFacts<Parameter>,
}

impl ContainerFacts {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_string_lossy().into_owned(),
            services: Vec::new(),
            parameters: Vec::new(),
        }
    }

    fn collect(&mut self, container: Node<'_>, source: &str) {
        for element in find_all(container, &DEFINITION, source) {
            match element_name(element, source) {
                Some("service") => self.service(element, source),
                Some("alias") => self.alias(element, source),
                _ => {}
            }
        }
        for element in find_all(container, &PARAMETER, source) {
            self.parameter(element, source);
        }
    }

    fn service(&mut self, element: Node<'_>, source: &str) {
        let Some(id) = attribute(element, "id", source) else {
            return;
        };
        // inline argument services carry generated ids like "foo bar"
        if id.contains(' ') {
            return;
        }

        let tags = child_elements(element)
            .filter(|child| element_name(*child, source) == Some("tag"))
            .filter_map(|tag| attribute(tag, "name", source))
            .collect();

        let service = Service {
            class: attribute(element, "class", source).unwrap_or_else(|| id.clone()),
            alias_target: attribute(element, "alias", source),
            id: id.clone(),
            tags,
            path: self.path.clone(),
            line: line_of(element),
        };
        self.services.push((id, service));
    }

    fn alias(&mut self, element: Node<'_>, source: &str) {
        let (Some(id), Some(target)) = (
            attribute(element, "id", source),
            attribute(element, "service", source),
        ) else {
            return;
        };

        let service = Service {
            class: id.clone(),
            id: id.clone(),
            alias_target: Some(target),
            tags: Vec::new(),
            path: self.path.clone(),
            line: line_of(element),
        };
        self.services.push((id, service));
    }

    fn parameter(&mut self, element: Node<'_>, source: &str) {
        let Some(name) = attribute(element, "key", source) else {
            return;
        };

        let value = if attribute(element, "type", source).as_deref() == Some("service") {
            format!("@{}", attribute(element, "id", source).unwrap_or_default())
        } else if let Some(value) = attribute(element, "value", source) {
            value
        } else {
            text_content(element, source)
        };

        let parameter = Parameter {
            name: name.clone(),
            value,
            path: self.path.clone(),
            line: line_of(element),
        };
        self.parameters.push((name, parameter));
    }
}
