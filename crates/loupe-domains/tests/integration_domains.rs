//! Scanner-driven tests over a small project tree with every domain indexer
//! registered.

use loupe_domains::{
    format_marker, ComponentsIndexer, DiagnosticKind, ExtensionsIndexer, ServicesIndexer,
    SnippetsIndexer, SystemConfigIndexer, TemplatesIndexer, ThemeIndexer,
};
use loupe_indexer::{ScanOptions, Scanner};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

const ADMIN_SRC: &str = "custom/plugins/Demo/src/Resources/app/administration/src";
const UPSTREAM_BASE: &str = "platform/Storefront/Resources/views/storefront/base.html.twig";
const THEME_BASE: &str = "custom/plugins/Demo/src/Resources/views/storefront/base.html.twig";

struct Project {
    _cache: TempDir,
    _dir: TempDir,
    root: PathBuf,
    scanner: Scanner,
    components: Arc<ComponentsIndexer>,
    templates: Arc<TemplatesIndexer>,
    services: Arc<ServicesIndexer>,
    snippets: Arc<SnippetsIndexer>,
    theme: Arc<ThemeIndexer>,
    system_config: Arc<SystemConfigIndexer>,
    extensions: Arc<ExtensionsIndexer>,
}

fn project() -> Project {
    let dir = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();

    let components = Arc::new(ComponentsIndexer::open(cache.path()).unwrap());
    let templates = Arc::new(TemplatesIndexer::open(cache.path()).unwrap());
    let services = Arc::new(ServicesIndexer::open(cache.path()).unwrap());
    let snippets = Arc::new(SnippetsIndexer::open(cache.path()).unwrap());
    let theme = Arc::new(ThemeIndexer::open(cache.path()).unwrap());
    let system_config = Arc::new(SystemConfigIndexer::open(cache.path()).unwrap());
    let extensions = Arc::new(ExtensionsIndexer::open(cache.path()).unwrap());

    let scanner = Scanner::new(&root, cache.path(), ScanOptions::default()).unwrap();
    scanner.add_indexer(components.clone());
    scanner.add_indexer(templates.clone());
    scanner.add_indexer(services.clone());
    scanner.add_indexer(snippets.clone());
    scanner.add_indexer(theme.clone());
    scanner.add_indexer(system_config.clone());
    scanner.add_indexer(extensions.clone());

    Project {
        _cache: cache,
        _dir: dir,
        root,
        scanner,
        components,
        templates,
        services,
        snippets,
        theme,
        system_config,
        extensions,
    }
}

impl Project {
    fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }
}

#[test]
fn test_single_registration_has_required_prop() {
    let project = project();
    project.write(
        &format!("{ADMIN_SRC}/app/component/sw-button/index.js"),
        "Shopware.Component.register('sw-button', {\n    props: {\n        label: { type: String, required: true },\n    },\n});\n",
    );

    project.scanner.index_all(false).unwrap();

    let records = project.components.get_component("sw-button").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].props.len(), 1);
    assert_eq!(records[0].props[0].name, "label");
    assert_eq!(records[0].props[0].prop_type.as_deref(), Some("String"));
    assert!(records[0].props[0].required);
}

#[test]
fn test_two_registrations_merge_with_backfill() {
    let project = project();
    project.write(
        &format!("{ADMIN_SRC}/app/a/index.js"),
        "Component.register('sw-button', {\n    props: { label: { type: String, required: true } },\n    emits: ['click'],\n});\n",
    );
    project.write(
        &format!("{ADMIN_SRC}/app/b/index.js"),
        "Component.register('sw-button', {\n    props: {\n        label: { type: String, required: true },\n        variant: { type: String, required: true },\n    },\n});\n",
    );

    let report = project.scanner.index_all(false).unwrap();
    assert_eq!(report.indexed, 2);
    assert_eq!(project.components.get_component("sw-button").unwrap().len(), 2);

    let merged = project
        .components
        .resolve_component("sw-button")
        .unwrap()
        .unwrap();
    let props: Vec<_> = merged.props.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(props, vec!["label", "variant"]);
    assert!(merged.props.iter().all(|p| p.required));
    assert!(merged.file_path.ends_with("app/b/index.js"));
    // emits come from the record with fewer props
    assert_eq!(merged.emits, vec!["click"]);
}

#[test]
fn test_marker_drift_after_upstream_change() {
    let project = project();
    let upstream = project.write(
        UPSTREAM_BASE,
        "{% block base_body %}\n{% block content %}<main>v1</main>{% endblock %}\n{% endblock %}\n",
    );
    project.scanner.index_all(false).unwrap();

    let upstream_hash = |project: &Project| {
        project
            .templates
            .get_block_hashes("content")
            .unwrap()
            .into_iter()
            .find(|b| b.absolute_path == upstream.to_string_lossy())
            .map(|b| b.hash)
            .unwrap()
    };
    let h1 = upstream_hash(&project);

    let override_source = format!(
        "{{% sw_extends '@Storefront/storefront/base.html.twig' %}}\n{}{{% block content %}}<main>themed</main>{{% endblock %}}\n",
        format_marker(&h1, "6.6.0.0")
    );
    let theme_base = project.write(THEME_BASE, &override_source);
    project.scanner.index_files(&[theme_base.clone()]).unwrap();

    assert!(project
        .templates
        .check_drift(&theme_base, &override_source)
        .unwrap()
        .is_empty());

    project.write(
        UPSTREAM_BASE,
        "{% block base_body %}\n{% block content %}<main>v2</main>{% endblock %}\n{% endblock %}\n",
    );
    let report = project.scanner.index_files(&[upstream.clone()]).unwrap();
    assert_eq!(report.indexed, 1);
    let h2 = upstream_hash(&project);
    assert_ne!(h1, h2);

    let diagnostics = project
        .templates
        .check_drift(&theme_base, &override_source)
        .unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].block, "content");
    assert_eq!(diagnostics[0].line, 2);
    assert_eq!(
        diagnostics[0].message(),
        format!(
            "upstream block 'content' changed (expected: {}, got: {}, source: storefront/base.html.twig)",
            &h2[..12],
            &h1[..12]
        )
    );
    assert!(matches!(
        &diagnostics[0].kind,
        DiagnosticKind::Drift { expected, source, .. }
            if source == "storefront/base.html.twig" && *expected == h2
    ));
}

#[test]
fn test_every_domain_from_one_scan() {
    let project = project();
    project.write(
        "custom/plugins/Demo/src/Resources/config/services.xml",
        r#"<?xml version="1.0" ?>
<container>
    <parameters>
        <parameter key="demo.enabled">true</parameter>
    </parameters>
    <services>
        <service id="Demo\Service\Greeter">
            <tag name="kernel.event_subscriber"/>
        </service>
    </services>
</container>
"#,
    );
    project.write(
        "custom/plugins/Demo/src/Resources/snippet/en_GB/demo.en-GB.json",
        r#"{"demo": {"greeting": "Hello"}}"#,
    );
    project.write(
        "custom/plugins/Demo/src/Resources/theme.json",
        r##"{"config": {"fields": {"demo-color": {"type": "color", "value": "#fff"}}}}"##,
    );
    project.write("custom/plugins/Demo/README.md", "# Demo");

    let report = project.scanner.index_all(false).unwrap();
    assert_eq!(report.indexed, 3);

    let services = project.services.get_services("Demo\\Service\\Greeter").unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].tags, vec!["kernel.event_subscriber"]);
    assert_eq!(
        project.services.get_parameters("demo.enabled").unwrap()[0].value,
        "true"
    );
    assert_eq!(
        project.snippets.get_storefront_snippet("demo.greeting").unwrap()[0].text,
        "Hello"
    );
    assert_eq!(project.theme.get_field_keys().unwrap(), vec!["demo-color"]);

    // unchanged files are skipped on the next scan
    let again = project.scanner.index_all(false).unwrap();
    assert_eq!(again.indexed, 0);
    assert_eq!(again.unchanged, 3);

    fs::remove_file(project.root.join("custom/plugins/Demo/src/Resources/theme.json")).unwrap();
    let after = project.scanner.index_all(false).unwrap();
    assert_eq!(after.removed, 1);
    assert!(project.theme.get_all_fields().unwrap().is_empty());
}

const CONFIG_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<config xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
        xsi:noNamespaceSchemaLocation="https://raw.githubusercontent.com/shopware/shopware/trunk/src/Core/System/SystemConfig/Schema/config.xsd">
    <card>
        <title>General</title>
        <input-field type="bool">
            <name>active</name>
            <label>Active</label>
        </input-field>
    </card>
</config>
"#;

#[test]
fn test_plugin_and_app_config_namespaces() {
    let project = project();
    project.write(
        "custom/plugins/Demo/composer.json",
        r#"{"name": "demo/demo", "extra": {"shopware-plugin-class": "Demo\\Demo"}}"#,
    );
    project.write("custom/plugins/Demo/src/Resources/config/config.xml", CONFIG_XML);
    project.write(
        "custom/apps/ShopApp/manifest.xml",
        "<manifest>\n  <meta>\n    <name>ShopApp</name>\n    <label>Shop app</label>\n    <version>2.0.0</version>\n  </meta>\n</manifest>\n",
    );
    project.write("custom/apps/ShopApp/Resources/config/config.xml", CONFIG_XML);

    project.scanner.index_all(false).unwrap();

    assert_eq!(
        project.system_config.get_entry_keys().unwrap(),
        vec!["ShopApp.active", "Demo.config.active"]
    );
    let plugin = &project.system_config.get_entry("Demo.config.active").unwrap()[0];
    assert_eq!(plugin.field_type.as_deref(), Some("bool"));
    assert_eq!(plugin.card.as_deref(), Some("General"));

    let app = project.extensions.get_extension("ShopApp").unwrap().unwrap();
    assert_eq!(app.version, "2.0.0");
    assert_eq!(app.path, project.root.join("custom/apps/ShopApp").to_string_lossy());

    fs::remove_file(project.root.join("custom/apps/ShopApp/manifest.xml")).unwrap();
    project.scanner.index_all(false).unwrap();
    assert!(project.extensions.get_extension_names().unwrap().is_empty());
}
