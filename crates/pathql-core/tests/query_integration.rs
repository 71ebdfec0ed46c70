//! Integration tests for the evaluator over the sample store.

use pathql_core::{fixtures, EvalBudget, Error, ErrorKind, Evaluator, Store};
use pathql_lang::builder::*;
use pathql_lang::{from_json, Expr, NonesOrder};
use pathql_proto::{Multiset, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

struct TestContext {
    store: Store,
}

impl TestContext {
    fn new() -> Self {
        Self {
            store: fixtures::sample_store().unwrap(),
        }
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(&self.store)
    }

    fn query(&self, expr: &Expr) -> Multiset {
        self.evaluator().query(expr).unwrap()
    }

    fn run(&self, expr: &Expr) -> serde_json::Value {
        self.evaluator().run(expr).unwrap()
    }

    fn error(&self, expr: &Expr) -> Error {
        self.evaluator().query(expr).unwrap_err()
    }
}

fn strs(values: &[Value]) -> Vec<&str> {
    values.iter().filter_map(Value::as_str).collect()
}

fn ints(values: &[i64]) -> Multiset {
    values.iter().copied().map(Value::Int).collect()
}

fn name_is(value: &str) -> Expr {
    binop("=", partial(vec![ptr("name")]), str_lit(value))
}

// ============== Tests ==============

#[test]
fn test_shape_with_nested_link_properties() {
    let ctx = TestContext::new();

    // SELECT Person { name, notes: { name, @metanote } } FILTER .name = 'Phil Emarg'
    let query = select(shape(
        name("Person"),
        vec![
            element("name"),
            nested("notes", vec![element("name"), link_prop_element("metanote")]),
        ],
    ))
    .filter(name_is("Phil Emarg"))
    .build();

    assert_eq!(
        ctx.run(&query),
        json!([{
            "name": ["Phil Emarg"],
            "notes": [
                {"name": ["boxing"], "@metanote": []},
                {"name": ["unboxing"], "@metanote": ["arg!"]},
            ],
        }])
    );
}

#[test]
fn test_filter_on_absolute_path() {
    let ctx = TestContext::new();

    // SELECT Person { name, notes: { name } } FILTER Person.name = 'Phil Emarg'
    let query = select(shape(
        name("Person"),
        vec![element("name"), nested("notes", vec![element("name")])],
    ))
    .filter(binop("=", path("Person", &["name"]), str_lit("Phil Emarg")))
    .build();

    assert_eq!(
        ctx.run(&query),
        json!([{
            "name": ["Phil Emarg"],
            "notes": [{"name": ["boxing"]}, {"name": ["unboxing"]}],
        }])
    );
}

#[test]
fn test_membership() {
    let ctx = TestContext::new();

    assert_eq!(
        ctx.query(&binop("IN", int(1), int_set(&[1, 2, 3]))),
        vec![Value::Bool(true)]
    );
    assert_eq!(
        ctx.query(&binop("IN", int(4), int_set(&[1, 2, 3]))),
        vec![Value::Bool(false)]
    );

    let query = binop("IN", str_lit("Phil Emarg"), path("Person", &["name"]));
    assert_eq!(ctx.query(&query), vec![Value::Bool(true)]);

    let query = binop("IN", str_lit("Nobody"), path("Person", &["name"]));
    assert_eq!(ctx.query(&query), vec![Value::Bool(false)]);
}

#[test]
fn test_order_by() {
    let ctx = TestContext::new();

    let query = select(path("Person", &["name"]))
        .order_by(asc(path("Person", &["name"])))
        .build();
    assert_eq!(
        strs(&ctx.query(&query)),
        vec!["Emmanuel Villip", "Madeline Hatch", "Phil Emarg"]
    );

    let query = select(path("Person", &["name"]))
        .order_by(desc(path("Person", &["name"])))
        .limit(int(1))
        .build();
    assert_eq!(strs(&ctx.query(&query)), vec!["Phil Emarg"]);
}

#[test]
fn test_order_by_over_nested_select() {
    let ctx = TestContext::new();

    // SELECT (SELECT Person.name) ORDER BY Person.name DESC LIMIT 1
    let query = select(select(path("Person", &["name"])).build())
        .order_by(desc(path("Person", &["name"])))
        .limit(int(1))
        .build();
    assert_eq!(strs(&ctx.query(&query)), vec!["Phil Emarg"]);

    // The key is not bound per row, so every row sorts on the same first name.
    let query = select(select(path("Person", &["name"])).build())
        .order_by(asc(path("Person", &["name"])))
        .build();
    assert_eq!(
        strs(&ctx.query(&query)),
        vec!["Phil Emarg", "Madeline Hatch", "Emmanuel Villip"]
    );
}

#[test]
fn test_order_by_empty_keys() {
    let ctx = TestContext::new();

    let query = select(path("Foo", &["val"]))
        .order_by(asc(path("Foo", &["opt"])).nones(NonesOrder::Last))
        .build();
    assert_eq!(strs(&ctx.query(&query)), vec!["b", "a"]);

    let query = select(path("Foo", &["val"]))
        .order_by(asc(path("Foo", &["opt"])))
        .build();
    assert_eq!(strs(&ctx.query(&query)), vec!["a", "b"]);
}

#[test]
fn test_for_loop() {
    let ctx = TestContext::new();
    let query = for_in("x", int_set(&[1, 2, 3]), binop("*", name("x"), int(2)));
    assert_eq!(ctx.query(&query), ints(&[2, 4, 6]));
}

#[test]
fn test_union_and_distinct() {
    let ctx = TestContext::new();

    let query = call("count", vec![binop("UNION", name("Person"), name("Person"))]);
    assert_eq!(ctx.query(&query), ints(&[6]));

    let once = unop("DISTINCT", int_set(&[1, 1, 2]));
    let twice = unop("DISTINCT", once.clone());
    assert_eq!(ctx.query(&once), ints(&[1, 2]));
    assert_eq!(ctx.query(&twice), ctx.query(&once));
}

#[test]
fn test_coalesce() {
    let ctx = TestContext::new();

    assert_eq!(ctx.query(&binop("??", int(1), int(2))), ints(&[1]));
    assert_eq!(ctx.query(&binop("??", set(vec![]), int(2))), ints(&[2]));

    let query = select(tuple(vec![
        path("Foo", &["val"]),
        binop("??", path("Foo", &["opt"]), int(-1)),
    ]))
    .build();
    assert_eq!(ctx.run(&query), json!([["a", -1], ["b", 111]]));
}

#[test]
fn test_optional_operands_keep_rows() {
    let ctx = TestContext::new();

    let query = select(tuple(vec![
        path("Foo", &["val"]),
        binop("?=", path("Foo", &["opt"]), int(111)),
    ]))
    .build();
    assert_eq!(ctx.run(&query), json!([["a", false], ["b", true]]));

    let query = select(tuple(vec![
        path("Foo", &["val"]),
        binop("=", path("Foo", &["opt"]), int(111)),
    ]))
    .build();
    assert_eq!(ctx.run(&query), json!([["b", true]]));
}

#[test]
fn test_shared_prefix_is_bound_once() {
    let ctx = TestContext::new();

    // Obj.n and Obj.tgt share Obj, so count runs once per object.
    let query = select(tuple(vec![
        path("Obj", &["n"]),
        call("count", vec![path("Obj", &["tgt"])]),
    ]))
    .build();
    assert_eq!(ctx.run(&query), json!([[1, 2], [2, 2], [3, 2]]));
}

#[test]
fn test_links_are_deduplicated() {
    let ctx = TestContext::new();

    assert_eq!(ctx.query(&call("count", vec![path("Obj", &["tgt"])])), ints(&[4]));
    assert_eq!(ctx.query(&path("Obj", &["tgt", "n"])), ints(&[1, 2, 3, 4]));
}

#[test]
fn test_backlinks() {
    let ctx = TestContext::new();

    let query = path_steps("Person", vec![ptr("notes"), back("notes"), ptr("name")]);
    assert_eq!(strs(&ctx.query(&query)), vec!["Phil Emarg", "Madeline Hatch"]);

    let query = path_steps("Note", vec![back("notes"), is_type("Person"), ptr("name")]);
    assert_eq!(strs(&ctx.query(&query)), vec!["Phil Emarg", "Madeline Hatch"]);
}

#[test]
fn test_link_properties() {
    let ctx = TestContext::new();

    let query = path_steps("User", vec![ptr("friends"), link_prop("nickname")]);
    assert_eq!(
        strs(&ctx.query(&query)),
        vec!["Swampy", "Firefighter", "Grumpy"]
    );

    let query = select(shape(
        name("User"),
        vec![nested("deck", vec![element("name"), link_prop_element("count")])],
    ))
    .filter(name_is("Alice"))
    .build();
    assert_eq!(
        ctx.run(&query),
        json!([{
            "deck": [
                {"name": ["Imp"], "@count": [2]},
                {"name": ["Dragon"], "@count": [2]},
                {"name": ["Bog monster"], "@count": [3]},
                {"name": ["Giant turtle"], "@count": [3]},
            ],
        }])
    );
}

#[test]
fn test_computed_shape_elements() {
    let ctx = TestContext::new();

    let query = select(shape(
        name("User"),
        vec![
            element("name"),
            computed(
                "deck_cost",
                call("sum", vec![partial(vec![ptr("deck"), ptr("cost")])]),
            ),
        ],
    ))
    .order_by(asc(partial(vec![ptr("name")])))
    .build();

    assert_eq!(
        ctx.run(&query),
        json!([
            {"name": ["Alice"], "deck_cost": [11]},
            {"name": ["Bob"], "deck_cost": [9]},
            {"name": ["Carol"], "deck_cost": [16]},
            {"name": ["Dave"], "deck_cost": [20]},
        ])
    );
}

#[test]
fn test_query_from_json() {
    let ctx = TestContext::new();

    let query = from_json(
        r#"{
            "kind": "select",
            "result": {"kind": "path", "steps": [
                {"kind": "object_ref", "name": "Card"},
                {"kind": "ptr", "name": "name"}
            ]},
            "filter": {"kind": "binop", "op": "=",
                "left": {"kind": "path", "partial": true,
                         "steps": [{"kind": "ptr", "name": "element"}]},
                "right": {"kind": "str", "value": "Fire"}}
        }"#,
    )
    .unwrap();

    assert_eq!(ctx.run(&query), json!(["Imp", "Dragon"]));
}

#[test]
fn test_detached_is_independent() {
    let ctx = TestContext::new();

    // Without DETACHED both sides would share one Person.
    let query = call(
        "count",
        vec![binop(
            "=",
            path("Person", &["name"]),
            detached(path("Person", &["name"])),
        )],
    );
    assert_eq!(ctx.query(&query), ints(&[9]));
}

#[test]
fn test_errors() {
    let ctx = TestContext::new();

    let err = ctx.error(&call("frobnicate", vec![]));
    assert!(matches!(err, Error::UnknownOperator { .. }));
    assert_eq!(err.kind(), ErrorKind::MalformedQuery);

    let err = ctx.error(&call("len", vec![str_lit("a"), str_lit("b")]));
    assert!(matches!(err, Error::Arity { expected: 1, got: 2, .. }));

    let err = ctx.error(&name("Nobody"));
    assert!(matches!(err, Error::UnresolvedPath(_)));

    let err = ctx.error(&partial(vec![ptr("name")]));
    assert_eq!(err.kind(), ErrorKind::MalformedQuery);
}

#[test]
fn test_row_budget() {
    let ctx = TestContext::new();
    let evaluator = ctx
        .evaluator()
        .with_budget(EvalBudget::default().with_max_rows(2));

    let err = evaluator.query(&path("Person", &["name"])).unwrap_err();
    assert!(matches!(err, Error::BudgetExceeded(_)));
}
