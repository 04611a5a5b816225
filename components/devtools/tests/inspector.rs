/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::thread;
use std::time::Duration;

use devtools::DevtoolsPrefs;
use devtools::front::{ChildrenOptions, InspectorFront, Mutation, WalkerFront};
use devtools_traits::dom::{DOCUMENT_NODE, DocumentTree, ELEMENT_NODE, TEXT_NODE};
use serde_json::json;

use crate::{TIMEOUT, TestPage, error_name};

fn walker(page: &TestPage) -> WalkerFront {
    let inspector = InspectorFront::new(&page.client, &page.tab_actor("inspectorActor")).unwrap();
    inspector.get_walker().unwrap()
}

fn root(walker: &WalkerFront) -> String {
    walker.root().unwrap().actor_id().to_owned()
}

/// Let the server take in every host notification sent so far.
fn settle() {
    thread::sleep(Duration::from_millis(200));
}

#[test]
fn test_walker_starts_at_the_root_document() {
    let page = TestPage::new();
    let walker = walker(&page);
    let document = walker.root().unwrap();
    assert_eq!(document.node_type(), DOCUMENT_NODE);
    assert_eq!(document.node_name(), "#document");
    assert_eq!(document.num_children(), 1);
    assert!(document.parent().is_none());
    page.close();
}

#[test]
fn test_document_and_document_element() {
    let page = TestPage::new();
    let mut walker = walker(&page);
    let document = walker.document(None).unwrap().unwrap();
    assert_eq!(document, root(&walker));

    let html = walker.document_element(None).unwrap().unwrap();
    assert_eq!(walker.get(&html).unwrap().node_name(), "HTML");
    assert_eq!(walker.parent_node(&html).unwrap().actor_id(), document);

    let body = walker.query_selector(&document, "body").unwrap().unwrap();
    assert_eq!(walker.document(Some(&body)).unwrap().unwrap(), document);
    page.close();
}

#[test]
fn test_children_pages() {
    let page = TestPage::new();
    let mut walker = walker(&page);
    let document = root(&walker);
    let list = walker.query_selector(&document, "#list").unwrap().unwrap();

    let all = walker.children(&list, &ChildrenOptions::default()).unwrap();
    assert!(all.has_first && all.has_last);
    assert_eq!(all.nodes.len(), 10);
    let items = all.nodes;
    assert_eq!(walker.get(&items[3]).unwrap().id(), Some("li3"));
    for item in &items {
        assert_eq!(walker.parent_node(item).unwrap().actor_id(), list);
    }

    let first = walker
        .children(
            &list,
            &ChildrenOptions {
                max_nodes: Some(4),
                ..ChildrenOptions::default()
            },
        )
        .unwrap();
    assert!(first.has_first);
    assert!(!first.has_last);
    assert_eq!(first.nodes, items[0..4]);

    let centered = walker
        .children(
            &list,
            &ChildrenOptions {
                max_nodes: Some(4),
                center: Some(items[5].clone()),
                ..ChildrenOptions::default()
            },
        )
        .unwrap();
    assert!(!centered.has_first && !centered.has_last);
    assert_eq!(centered.nodes, items[3..7]);

    // Near the end the page is filled up from the front.
    let end = walker
        .children(
            &list,
            &ChildrenOptions {
                max_nodes: Some(4),
                center: Some(items[9].clone()),
                ..ChildrenOptions::default()
            },
        )
        .unwrap();
    assert!(end.has_last);
    assert_eq!(end.nodes, items[6..10]);

    let started = walker
        .children(
            &list,
            &ChildrenOptions {
                max_nodes: Some(4),
                start: Some(items[8].clone()),
                ..ChildrenOptions::default()
            },
        )
        .unwrap();
    assert!(!started.has_first && started.has_last);
    assert_eq!(started.nodes, items[8..10]);

    let error = walker
        .children(
            &list,
            &ChildrenOptions {
                center: Some(items[1].clone()),
                start: Some(items[2].clone()),
                ..ChildrenOptions::default()
            },
        )
        .unwrap_err();
    assert_eq!(error_name(&error), "badParameterType");
    page.close();
}

#[test]
fn test_siblings_and_single_steps() {
    let page = TestPage::new();
    let mut walker = walker(&page);
    let document = root(&walker);
    let b = walker.query_selector(&document, "#b").unwrap().unwrap();

    let siblings = walker
        .siblings(
            &b,
            &ChildrenOptions {
                max_nodes: Some(3),
                ..ChildrenOptions::default()
            },
        )
        .unwrap();
    let ids: Vec<_> = siblings
        .nodes
        .iter()
        .map(|node| walker.get(node).unwrap().id().map(str::to_owned))
        .collect();
    assert_eq!(
        ids,
        [Some("a".to_owned()), Some("b".to_owned()), Some("d".to_owned())]
    );

    let next = walker.next_sibling(&b, None).unwrap().unwrap();
    assert_eq!(walker.get(&next).unwrap().id(), Some("d"));
    let previous = walker.previous_sibling(&b, None).unwrap().unwrap();
    assert_eq!(walker.get(&previous).unwrap().id(), Some("a"));
    assert!(walker.previous_sibling(&previous, None).unwrap().is_none());
    page.close();
}

#[test]
fn test_query_selector_brings_missing_ancestors() {
    let page = TestPage::new();
    let mut walker = walker(&page);
    let document = root(&walker);

    let c = walker.query_selector(&document, "#c").unwrap().unwrap();
    let span = walker.get(&c).unwrap();
    assert_eq!(span.node_type(), ELEMENT_NODE);
    assert_eq!(span.node_name(), "SPAN");

    let mut chain = vec![];
    let mut current = c.clone();
    while let Some(parent) = walker.parent_node(&current) {
        assert!(!parent.is_standin(), "{} was never described", parent.actor_id());
        chain.push(parent.node_name().to_owned());
        current = parent.actor_id().to_owned();
    }
    assert_eq!(chain, ["DIV", "BODY", "HTML", "#document"]);
    assert_eq!(current, document);

    // A second query only sends what is new.
    let a = walker.query_selector(&document, "#a").unwrap().unwrap();
    assert!(walker.tree_children(&walker.parent_node(&a).unwrap().actor_id().to_owned()).contains(&a));

    assert!(walker.query_selector(&document, "#nothing").unwrap().is_none());
    let error = walker.query_selector(&document, "!!").unwrap_err();
    assert_eq!(error_name(&error), "invalidSelector");
    page.close();
}

#[test]
fn test_parents() {
    let page = TestPage::new();
    let mut walker = walker(&page);
    let document = root(&walker);
    let c = walker.query_selector(&document, "#c").unwrap().unwrap();
    let parents = walker.parents(&c, false).unwrap();
    let names: Vec<_> = parents
        .iter()
        .map(|parent| walker.get(parent).unwrap().node_name().to_owned())
        .collect();
    assert_eq!(names, ["DIV", "BODY", "HTML", "#document"]);
    page.close();
}

#[test]
fn test_query_selector_all() {
    let page = TestPage::new();
    let mut walker = walker(&page);
    let document = root(&walker);

    let list = walker.query_selector_all(&document, ".item").unwrap();
    assert_eq!(list.length(), 3);
    let second = list.item(&mut walker, 1).unwrap().unwrap();
    assert_eq!(walker.get(&second).unwrap().id(), Some("b"));
    assert!(walker.parent_node(&second).is_some_and(|body| !body.is_standin()));

    let items = list.items(&mut walker, None, None).unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[1], second);
    let tail = list.items(&mut walker, Some(2), None).unwrap();
    assert_eq!(tail, items[2..]);
    list.release().unwrap();
    page.close();
}

#[test]
fn test_mutations_are_announced_once() {
    let page = TestPage::new();
    let mut walker = walker(&page);
    let document = root(&walker);
    let a = walker.query_selector(&document, "#a").unwrap().unwrap();

    let node = page.node("#a");
    page.document.set_attribute(node, "title", Some("hi"));
    page.document.set_attribute(node, "class", None);
    settle();

    let mutations = walker.wait_for_mutations(TIMEOUT).unwrap();
    assert_eq!(
        mutations,
        [
            Mutation::Attributes {
                target: a.clone(),
                attribute_name: "title".to_owned(),
                attribute_namespace: None,
                new_value: Some("hi".to_owned()),
            },
            Mutation::Attributes {
                target: a.clone(),
                attribute_name: "class".to_owned(),
                attribute_namespace: None,
                new_value: None,
            },
        ]
    );
    let front = walker.get(&a).unwrap();
    assert_eq!(front.get_attribute("title"), Some("hi"));
    assert!(!front.has_attribute("class"));

    // Both records were covered by a single announcement.
    thread::sleep(Duration::from_millis(100));
    assert!(walker.process_events().unwrap().is_empty());
    page.close();
}

#[test]
fn test_mutations_of_unknown_nodes_are_not_reported() {
    let page = TestPage::new();
    let mut walker = walker(&page);
    let document = root(&walker);
    walker.query_selector(&document, "#a").unwrap().unwrap();

    page.document.set_attribute(page.node("#d"), "title", Some("unseen"));
    page.document.set_attribute(page.node("#a"), "title", Some("seen"));

    let mutations = walker.wait_for_mutations(TIMEOUT).unwrap();
    assert_eq!(mutations.len(), 1);
    assert!(matches!(
        &mutations[0],
        Mutation::Attributes { new_value: Some(value), .. } if value == "seen"
    ));
    page.close();
}

#[test]
fn test_removed_nodes_are_orphaned_until_cleanup() {
    let page = TestPage::new();
    let mut walker = walker(&page);
    walker.auto_cleanup = false;
    let document = root(&walker);
    let c = walker.query_selector(&document, "#c").unwrap().unwrap();
    let b = walker.parent_node(&c).unwrap().actor_id().to_owned();
    let d = walker.query_selector(&document, "#d").unwrap().unwrap();

    let span = page.node("#c");
    page.document.remove(span);
    let mutations = walker.wait_for_mutations(TIMEOUT).unwrap();
    assert_eq!(
        mutations,
        [Mutation::ChildList {
            target: b.clone(),
            added: vec![],
            removed: vec![c.clone()],
            num_children: 0,
        }]
    );
    assert!(walker.is_orphaned(&c));
    assert!(walker.parent_node(&c).is_none());
    assert!(walker.tree_children(&b).is_empty());
    assert_eq!(walker.get(&b).unwrap().num_children(), 0);

    // Moving the node back into the known tree adopts it again.
    page.document.append(page.node("#d"), span);
    let mutations = walker.wait_for_mutations(TIMEOUT).unwrap();
    assert!(matches!(
        &mutations[0],
        Mutation::ChildList { target, added, .. } if *target == d && *added == [c.clone()]
    ));
    assert!(!walker.is_orphaned(&c));
    assert_eq!(walker.parent_node(&c).unwrap().actor_id(), d);

    // Removed again, then cleaned up on both sides.
    page.document.remove(span);
    walker.wait_for_mutations(TIMEOUT).unwrap();
    assert!(walker.is_orphaned(&c));
    walker.get_mutations(true).unwrap();
    assert!(walker.get(&c).is_none());
    assert!(walker.orphans().is_empty());
    let error = walker.set_node_value(&c, "x").unwrap_err();
    assert_eq!(error_name(&error), "noSuchActor");
    page.close();
}

#[test]
fn test_character_data_and_long_values() {
    let prefs = DevtoolsPrefs {
        value_summary_length: 10,
        long_string_length: 30,
        long_string_initial_length: 5,
        ..DevtoolsPrefs::default()
    };
    let page = TestPage::with_prefs(prefs);
    let mut walker = walker(&page);
    let document = root(&walker);
    let c = walker.query_selector(&document, "#c").unwrap().unwrap();
    let text = walker.children(&c, &ChildrenOptions::default()).unwrap().nodes[0].clone();
    let front = walker.get(&text).unwrap();
    assert_eq!(front.node_type(), TEXT_NODE);
    assert_eq!(front.short_value(), Some("hello"));
    assert!(!front.incomplete_value());
    assert_eq!(walker.get_node_value(&text).unwrap(), "hello");

    let long = "a fairly long text value that will not fit in a summary";
    let text_node = page.document.first_child(page.node("#c")).unwrap();
    page.document.set_text(text_node, long);
    let mutations = walker.wait_for_mutations(TIMEOUT).unwrap();
    assert!(matches!(
        &mutations[0],
        Mutation::CharacterData { incomplete_value: true, .. }
    ));
    let front = walker.get(&text).unwrap();
    assert!(front.incomplete_value());
    assert_eq!(front.short_value().map(|value| value.chars().count()), Some(10));

    // Fetched through a long string actor.
    assert_eq!(walker.get_node_value(&text).unwrap(), long);

    walker.set_node_value(&text, "short").unwrap();
    walker.wait_for_mutations(TIMEOUT).unwrap();
    assert_eq!(walker.get_node_value(&text).unwrap(), "short");
    page.close();
}

#[test]
fn test_release_node_forgets_descendants() {
    let page = TestPage::new();
    let mut walker = walker(&page);
    let document = root(&walker);
    let c = walker.query_selector(&document, "#c").unwrap().unwrap();
    let b = walker.parent_node(&c).unwrap().actor_id().to_owned();

    walker.release_node(&b).unwrap();
    assert!(walker.get(&b).is_none());
    assert!(walker.get(&c).is_none());
    let error = walker.set_node_value(&c, "x").unwrap_err();
    assert_eq!(error_name(&error), "noSuchActor");

    // Asking again hands out fresh actors.
    let again = walker.query_selector(&document, "#c").unwrap().unwrap();
    assert_ne!(again, c);
    assert!(walker.parent_node(&again).is_some_and(|parent| !parent.is_standin()));
    page.close();
}

#[test]
fn test_failed_release_keeps_the_node() {
    let page = TestPage::new();
    let mut walker = walker(&page);
    let document = root(&walker);
    let c = walker.query_selector(&document, "#c").unwrap().unwrap();

    // Released behind the front's back, so its own release is refused.
    let packet = json!({ "to": walker.actor_id(), "type": "releaseNode", "node": c });
    page.client.call(packet.as_object().unwrap().clone()).unwrap();
    let error = walker.release_node(&c).unwrap_err();
    assert_eq!(error_name(&error), "noSuchActor");
    assert!(walker.get(&c).is_some());
    assert!(walker.parent_node(&c).is_some());
    page.close();
}

#[test]
fn test_walkers_are_independent() {
    let page = TestPage::new();
    let mut first = walker(&page);
    let mut second = walker(&page);
    assert_ne!(first.actor_id(), second.actor_id());
    let document = root(&first);
    let a = first.query_selector(&document, "#a").unwrap().unwrap();

    page.document.set_attribute(page.node("#a"), "title", Some("x"));
    assert_eq!(first.wait_for_mutations(TIMEOUT).unwrap().len(), 1);
    assert!(first.get(&a).unwrap().has_attribute("title"));

    // The second walker never saw #a.
    settle();
    assert!(second.process_events().unwrap().is_empty());
    first.release().unwrap();
    page.close();
}
