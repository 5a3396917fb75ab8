//! Read-time reduction of several records for one component.

use super::VueComponent;

/// Reduce every record contributed for one component into one.
///
/// Records are folded pairwise in order. The record with strictly more props
/// wins; on a tie the one with a resolved definition path wins, and the
/// earlier record is kept otherwise. Fields the winner leaves empty are
/// backfilled from the other record.
pub fn merge_components<I>(records: I) -> Option<VueComponent>
where
    I: IntoIterator<Item = VueComponent>,
{
    records.into_iter().reduce(|best, next| {
        if next.props.len() > best.props.len() {
            backfill(next, best)
        } else if next.props.len() < best.props.len() {
            backfill(best, next)
        } else if next.definition_path.is_some() && best.definition_path.is_none() {
            backfill(next, best)
        } else {
            backfill(best, next)
        }
    })
}

/// Fill empty fields of `preferred` from `fallback`.
fn backfill(mut preferred: VueComponent, fallback: VueComponent) -> VueComponent {
    fn or_take<T>(field: &mut Option<T>, other: Option<T>) {
        if field.is_none() {
            *field = other;
        }
    }

    fn or_take_vec<T>(field: &mut Vec<T>, other: Vec<T>) {
        if field.is_empty() {
            *field = other;
        }
    }

    or_take(&mut preferred.extends_component, fallback.extends_component);
    or_take(&mut preferred.import_path, fallback.import_path);
    or_take(&mut preferred.definition_path, fallback.definition_path);
    or_take_vec(&mut preferred.props, fallback.props);
    or_take_vec(&mut preferred.emits, fallback.emits);
    or_take_vec(&mut preferred.methods, fallback.methods);
    or_take_vec(&mut preferred.computed, fallback.computed);
    or_take_vec(&mut preferred.slots, fallback.slots);
    or_take_vec(&mut preferred.blocks, fallback.blocks);
    or_take(&mut preferred.template_path, fallback.template_path);
    preferred
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Prop, Slot};

    fn component(file: &str, props: &[&str]) -> VueComponent {
        VueComponent {
            name: "sw-button".to_string(),
            file_path: file.to_string(),
            props: props
                .iter()
                .map(|name| Prop {
                    name: name.to_string(),
                    required: true,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_more_props_wins_and_backfills() {
        let mut a = component("a.js", &["label"]);
        a.extends_component = Some("sw-base".to_string());
        a.slots = vec![Slot {
            name: "default".to_string(),
            line: 1,
        }];
        let mut b = component("b.js", &["label", "variant"]);
        b.methods = vec!["onClick".to_string()];

        let merged = merge_components([a, b]).unwrap();

        assert_eq!(merged.file_path, "b.js");
        assert_eq!(merged.props.len(), 2);
        assert_eq!(merged.methods, vec!["onClick"]);
        assert_eq!(merged.extends_component.as_deref(), Some("sw-base"));
        assert_eq!(merged.slots.len(), 1);
    }

    #[test]
    fn test_order_does_not_change_the_winner() {
        let a = component("a.js", &["label"]);
        let b = component("b.js", &["label", "variant"]);

        let forward = merge_components([a.clone(), b.clone()]).unwrap();
        let backward = merge_components([b, a]).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_tie_prefers_definition_path() {
        let a = component("a.js", &["label"]);
        let mut b = component("b.js", &["label"]);
        b.definition_path = Some("/x/sw-button/index.js".to_string());

        let merged = merge_components([a, b]).unwrap();
        assert_eq!(merged.file_path, "b.js");
    }

    #[test]
    fn test_tie_keeps_first() {
        let mut a = component("a.js", &[]);
        a.definition_path = Some("/x/a".to_string());
        let mut b = component("b.js", &[]);
        b.definition_path = Some("/x/b".to_string());
        b.import_path = Some("./b".to_string());

        let merged = merge_components([a, b]).unwrap();
        assert_eq!(merged.file_path, "a.js");
        assert_eq!(merged.definition_path.as_deref(), Some("/x/a"));
        assert_eq!(merged.import_path.as_deref(), Some("./b"));
    }

    #[test]
    fn test_empty_input() {
        assert!(merge_components(Vec::new()).is_none());
    }
}
