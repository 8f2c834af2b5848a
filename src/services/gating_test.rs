use super::*;

fn node(id: &str) -> ContentNode {
    ContentNode { id: Some(id.into()), ..ContentNode::default() }
}

fn tagged(id: &str, tag: &str) -> ContentNode {
    ContentNode { tag: Some(tag.into()), ..node(id) }
}

fn inline(id: &str, roles: &str) -> ContentNode {
    ContentNode { allowed_roles: Some(roles.into()), ..node(id) }
}

fn ids(nodes: &[ContentNode]) -> Vec<&str> {
    nodes.iter().filter_map(|n| n.id.as_deref()).collect()
}

#[test]
fn parse_role_list_trims_and_skips_unknown() {
    let roles = parse_role_list(" customer ,retailer, admin");
    assert_eq!(roles.into_iter().collect::<Vec<_>>(), vec![Role::Customer, Role::Retailer]);
    assert!(parse_role_list("").is_empty());
}

#[test]
fn inline_roles_remove_excluded_nodes() {
    let policy = VisibilityPolicy::new();
    let mut page = vec![node("public"), inline("trade", "retailer"), inline("both", "customer, retailer")];

    let report = policy.apply(&mut page, Some(Role::Customer));
    assert_eq!(ids(&page), vec!["public", "both"]);
    assert_eq!(report, GatingReport { removed: 1, hidden: 0 });
}

#[test]
fn removal_takes_the_whole_subtree() {
    let policy = VisibilityPolicy::standard();
    let mut section = tagged("section", "retailer-only");
    section.children = vec![node("price"), node("discount")];
    let mut page = vec![section, node("footer")];

    let report = policy.apply(&mut page, Some(Role::Customer));
    assert_eq!(ids(&page), vec!["footer"]);
    assert_eq!(report.removed, 1);
}

#[test]
fn nested_nodes_are_gated() {
    let policy = VisibilityPolicy::standard();
    let mut outer = tagged("dashboard", "auth-required");
    outer.children = vec![tagged("pricing", "trade-pricing"), tagged("wishlist", "wishlist-button")];
    let mut page = vec![outer];

    policy.apply(&mut page, Some(Role::Customer));
    assert_eq!(ids(&page), vec!["dashboard"]);
    assert_eq!(ids(&page[0].children), vec!["wishlist"]);
}

#[test]
fn unauthenticated_viewer_passes_no_gate() {
    let policy = VisibilityPolicy::standard();
    let mut page = vec![node("home"), tagged("account", "auth-required"), inline("x", "customer,retailer")];

    let report = policy.apply(&mut page, None);
    assert_eq!(ids(&page), vec!["home"]);
    assert_eq!(report.removed, 2);
}

#[test]
fn unknown_tags_are_not_gated() {
    let policy = VisibilityPolicy::standard();
    let mut page = vec![tagged("hero", "marketing-banner")];
    policy.apply(&mut page, None);
    assert_eq!(ids(&page), vec!["hero"]);
}

#[test]
fn inline_and_tag_must_both_allow() {
    let policy = VisibilityPolicy::standard();
    let mut page = vec![ContentNode { allowed_roles: Some("customer".into()), ..tagged("x", "retailer-only") }];
    policy.apply(&mut page, Some(Role::Retailer));
    assert!(page.is_empty());
}

#[test]
fn hide_is_opt_in_per_rule() {
    let policy = VisibilityPolicy::new().with_rule("teaser", &[Role::Retailer], GateMethod::Hide);
    let mut page = vec![tagged("t", "teaser")];

    let report = policy.apply(&mut page, Some(Role::Customer));
    assert_eq!(report, GatingReport { removed: 0, hidden: 1 });
    assert!(page[0].hidden);
}

#[test]
fn standard_rules_default_to_removal() {
    let policy = VisibilityPolicy::standard();
    for tag in ["auth-required", "retailer-only", "trade-pricing", "customer-only", "wishlist-button"] {
        assert_eq!(policy.rule(tag).map(|r| r.method), Some(GateMethod::Remove), "{tag}");
    }
}

#[test]
fn content_node_deserializes_attribute_name() {
    let nodes: Vec<ContentNode> =
        serde_json::from_str(r#"[{"id":"a","niko-role":"retailer","children":[{"text":"hi"}]}]"#).unwrap();
    assert_eq!(nodes[0].allowed_roles.as_deref(), Some("retailer"));
    assert_eq!(nodes[0].children[0].text.as_deref(), Some("hi"));

    let out = serde_json::to_value(&nodes[0].children[0]).unwrap();
    assert_eq!(out, serde_json::json!({"text": "hi"}));
}
