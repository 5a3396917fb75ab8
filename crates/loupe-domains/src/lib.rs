//! Concrete domain indexers for loupe.
//!
//! Each indexer owns its fact stores under the project cache directory and
//! exposes typed getters for consumers:
//!
//! - [`ServicesIndexer`]: service container XML
//! - [`ComponentsIndexer`]: administration component registrations
//! - [`TemplatesIndexer`]: Twig templates, blocks and version markers
//! - [`SnippetsIndexer`]: storefront and administration translations
//! - [`ThemeIndexer`]: `theme.json` configuration fields
//! - [`SystemConfigIndexer`]: plugin and app `config.xml` fields
//! - [`ExtensionsIndexer`]: apps declared by `manifest.xml`

pub mod components;
pub mod extensions;
pub mod services;
pub mod snippets;
pub mod system_config;
pub mod templates;
pub mod theme;
mod text;
mod xml;

pub use components::{
    merge_components, ComponentDefinition, ComponentsIndexer, Prop, Slot, TwigBlock, VueComponent,
};
pub use extensions::{Extension, ExtensionsIndexer};
pub use services::{Parameter, Service, ServicesIndexer};
pub use snippets::{Snippet, SnippetsIndexer};
pub use system_config::{SystemConfigEntry, SystemConfigIndexer};
pub use templates::{
    format_marker, BlockHash, Diagnostic, DiagnosticKind, TemplateBlock, TemplateFile,
    TemplatesIndexer, VersionMarker,
};
pub use theme::{ThemeConfigField, ThemeIndexer};

/// Path fragment that marks administration sources.
pub(crate) const ADMINISTRATION_DIR: &str = "Resources/app/administration";
