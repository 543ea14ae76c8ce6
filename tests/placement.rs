use rulesheet::{
    Declaration, EngineQuirks, InsertionPoint, MemoryDocument, NativeEngine, SheetOptions,
    StyleContext, StyleSheet, WarningKind,
};

fn styles(name: &str) -> Declaration {
    Declaration::new().nest(name, Declaration::new().set("color", "red"))
}

fn attach(ctx: &mut StyleContext<MemoryDocument>, options: SheetOptions) -> StyleSheet {
    let mut sheet = StyleSheet::new(ctx, &styles("a"), options);
    sheet.attach(ctx);
    sheet
}

fn head_children(ctx: &StyleContext<MemoryDocument>) -> Vec<rulesheet::NodeId> {
    let head = ctx.engine().head();
    ctx.engine().child_nodes(head)
}

#[test]
fn test_new_sheet_goes_before_first_higher_index() {
    let mut ctx = StyleContext::new(MemoryDocument::new());
    let one = attach(&mut ctx, SheetOptions::new().index(1));
    let two = attach(&mut ctx, SheetOptions::new().index(2));
    let three = attach(&mut ctx, SheetOptions::new().index(3));
    let late = attach(&mut ctx, SheetOptions::new().index(2));

    assert_eq!(
        head_children(&ctx),
        vec![one.element(), two.element(), late.element(), three.element()]
    );
    assert!(ctx.warnings().is_empty());
}

#[test]
fn test_attach_order_does_not_matter_for_priorities() {
    let mut ctx = StyleContext::new(MemoryDocument::new());
    let high = attach(&mut ctx, SheetOptions::new().index(10));
    let low = attach(&mut ctx, SheetOptions::new().index(-5));
    let mid = attach(&mut ctx, SheetOptions::new().index(0));

    assert_eq!(
        head_children(&ctx),
        vec![low.element(), mid.element(), high.element()]
    );
}

#[test]
fn test_reattach_returns_to_same_slot() {
    let mut ctx = StyleContext::new(MemoryDocument::new());
    let one = attach(&mut ctx, SheetOptions::new().index(1));
    let mut two = attach(&mut ctx, SheetOptions::new().index(2));
    let three = attach(&mut ctx, SheetOptions::new().index(3));

    two.detach(&mut ctx);
    assert_eq!(head_children(&ctx), vec![one.element(), three.element()]);
    two.attach(&mut ctx);
    assert_eq!(
        head_children(&ctx),
        vec![one.element(), two.element(), three.element()]
    );
}

#[test]
fn test_marker_groups_sheets() {
    let mut ctx = StyleContext::new(MemoryDocument::new());
    let head = ctx.engine().head();
    let before = ctx.engine_mut().create_element("meta");
    ctx.engine_mut().insert_before(head, before, None);
    let marker = ctx.engine_mut().append_comment(head, " app-styles ");
    let after = ctx.engine_mut().create_element("link");
    ctx.engine_mut().insert_before(head, after, None);

    let plain = attach(&mut ctx, SheetOptions::new());
    let first = attach(&mut ctx, SheetOptions::new().insertion_point("app-styles").index(5));
    let second = attach(&mut ctx, SheetOptions::new().insertion_point("app-styles").index(1));

    assert_eq!(
        head_children(&ctx),
        vec![
            before,
            marker,
            second.element(),
            first.element(),
            after,
            plain.element()
        ]
    );
}

#[test]
fn test_missing_marker_appends_with_one_warning() {
    let mut ctx = StyleContext::new(MemoryDocument::new());
    let head = ctx.engine().head();
    let existing = ctx.engine_mut().create_element("meta");
    ctx.engine_mut().insert_before(head, existing, None);

    let sheet = attach(&mut ctx, SheetOptions::new().insertion_point("nowhere"));

    assert_eq!(head_children(&ctx), vec![existing, sheet.element()]);
    let warnings = ctx.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::InsertionPointNotFound);
    assert!(warnings[0].message.contains("nowhere"));
}

#[test]
fn test_default_marker_from_config() {
    let config = rulesheet::ContextConfig::from_yaml("insertion_point: jss\n").unwrap();
    let mut ctx = StyleContext::with_config(MemoryDocument::new(), config);
    let head = ctx.engine().head();
    let marker = ctx.engine_mut().append_comment(head, "jss");
    let other = ctx.engine_mut().create_element("meta");
    ctx.engine_mut().insert_before(head, other, None);

    let sheet = attach(&mut ctx, SheetOptions::new());
    assert_eq!(sheet.insertion_point(), Some(&InsertionPoint::from("jss")));
    assert_eq!(head_children(&ctx), vec![marker, sheet.element(), other]);
}

#[test]
fn test_node_insertion_point() {
    let mut ctx = StyleContext::new(MemoryDocument::new());
    let body = ctx.engine().body();
    let anchor = ctx.engine_mut().create_element("div");
    ctx.engine_mut().insert_before(body, anchor, None);
    let tail = ctx.engine_mut().create_element("div");
    ctx.engine_mut().insert_before(body, tail, None);

    let sheet = attach(&mut ctx, SheetOptions::new().insertion_point(anchor));

    assert_eq!(ctx.engine().child_nodes(body), vec![anchor, sheet.element(), tail]);
    assert!(ctx.warnings().is_empty());
}

#[test]
fn test_attach_twice_is_noop() {
    let mut ctx = StyleContext::new(MemoryDocument::new());
    let mut sheet = attach(&mut ctx, SheetOptions::new());
    let text = ctx.engine().text_content(sheet.element());
    sheet.attach(&mut ctx);
    assert_eq!(head_children(&ctx), vec![sheet.element()]);
    assert_eq!(ctx.engine().text_content(sheet.element()), text);
    sheet.detach(&mut ctx).detach(&mut ctx);
    assert!(head_children(&ctx).is_empty());
}

#[test]
fn test_attach_without_host_area_stays_detached() {
    let doc = MemoryDocument::with_quirks(EngineQuirks {
        no_host_area: true,
        ..EngineQuirks::default()
    });
    let mut ctx = StyleContext::new(doc);
    let sheet = attach(&mut ctx, SheetOptions::new());

    assert!(!sheet.is_attached());
    assert!(!sheet.is_deployed());
    assert_eq!(ctx.engine().parent_node(sheet.element()), None);
    assert_eq!(ctx.registry().attached().count(), 0);
    let warnings = ctx.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::NoHostArea);

    let body = ctx.engine().body();
    let anchor = ctx.engine_mut().create_element("div");
    ctx.engine_mut().insert_before(body, anchor, None);
    let anchored = attach(&mut ctx, SheetOptions::new().insertion_point(anchor));
    assert!(anchored.is_attached());
    assert_eq!(ctx.engine().child_nodes(body), vec![anchor, anchored.element()]);
}
