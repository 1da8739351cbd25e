#![cfg(feature = "sqlite")]

mod common;

use common::{B, Base, Book, Doc, Pair, SCHEMA, open, text_rows};
use relmodel::ConstraintKind;
use relmodel::prelude::*;

fn cx() -> Cx {
    Cx::for_testing()
}

fn base(field: &str) -> Base {
    Base {
        id: 0,
        field: field.to_string(),
    }
}

fn seed_bases(conn: &SqliteConnection, n: usize) {
    for i in 1..=n {
        upsert(&cx(), conn, &mut base(&format!("f{i}"))).unwrap();
    }
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn composite_key_round_trip() {
    let conn = open();
    for (first, second) in [(1, 2), (1, 1), (2, 1)] {
        let mut pair = Pair {
            first_id: first,
            second_id: second,
            label: format!("{first}-{second}"),
        };
        upsert(&cx(), &conn, &mut pair).unwrap();
    }

    delete(
        &cx(),
        &conn,
        &Pair {
            first_id: 1,
            second_id: 1,
            ..Pair::default()
        },
    )
    .unwrap();

    let pairs: Vec<Pair> = query_many(
        &cx(),
        &conn,
        &Options::default().with_order(OrderBy::asc("first_id")),
    )
    .unwrap();
    let keys: Vec<_> = pairs.iter().map(|p| (p.first_id, p.second_id)).collect();
    assert_eq!(keys, vec![(1, 2), (2, 1)]);
    assert_eq!(pairs[0].label, "1-2");

    let tuple = Where::new().with("first_id,second_id", Cond::list([2, 1, 9, 9]));
    let found: Vec<Pair> =
        query_many(&cx(), &conn, &Options::default().with_where(tuple)).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].label, "2-1");
}

#[test]
fn upsert_updates_composite_row_in_place() {
    let conn = open();
    let mut pair = Pair {
        first_id: 3,
        second_id: 4,
        label: "old".to_string(),
    };
    upsert(&cx(), &conn, &mut pair).unwrap();
    pair.label = "new".to_string();
    upsert(&cx(), &conn, &mut pair).unwrap();

    assert_eq!(text_rows(&conn, "SELECT label FROM pair"), vec!["new"]);
}

#[test]
fn unique_conflict_resolves_existing_identity() {
    let conn = open();
    let mut first = base("test");
    upsert(&cx(), &conn, &mut first).unwrap();
    assert_eq!(first.id, 1);

    let mut again = base("test");
    upsert(&cx(), &conn, &mut again).unwrap();
    assert_eq!(again.id, 1);

    let mut other = base("test 2");
    upsert(&cx(), &conn, &mut other).unwrap();
    assert_eq!(other.id, 2);

    assert_eq!(count::<Base, _>(&cx(), &conn, &Options::default()).unwrap(), 2);
}

#[test]
fn update_changes_only_the_keyed_row() {
    let conn = open();
    seed_bases(&conn, 2);

    update(
        &cx(),
        &conn,
        &Base {
            id: 2,
            field: "renamed".to_string(),
        },
    )
    .unwrap();

    assert_eq!(
        text_rows(&conn, "SELECT field FROM base_model ORDER BY id"),
        vec!["f1", "renamed"]
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn insert_reports_unique_violation() {
    let conn = open();
    insert(&cx(), &conn, &mut base("test")).unwrap();

    let err = insert(&cx(), &conn, &mut base("test")).unwrap_err();
    assert!(err.is_unique_violation(), "{err:?}");
    assert_eq!(err.constraint(), Some(ConstraintKind::Unique));
}

#[test]
fn missing_rows_are_not_found() {
    let conn = open();
    seed_bases(&conn, 1);
    let missing = Base {
        id: 99,
        field: "ghost".to_string(),
    };

    assert!(delete(&cx(), &conn, &missing).unwrap_err().is_not_found());
    assert!(update(&cx(), &conn, &missing).unwrap_err().is_not_found());
    assert_eq!(count::<Base, _>(&cx(), &conn, &Options::default()).unwrap(), 1);
}

#[test]
fn zero_key_is_refused_before_any_statement() {
    let conn = open();
    let err = delete(&cx(), &conn, &base("x")).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "{err:?}");
}

#[test]
fn dangling_foreign_key_is_classified() {
    let conn = open();
    let mut book = Book {
        title: "orphan".to_string(),
        author: Related::from_key(999),
        ..Book::default()
    };

    let err = upsert(&cx(), &conn, &mut book).unwrap_err();
    assert!(err.is_foreign_key_violation(), "{err:?}");
    assert_eq!(book.id, 0);
}

model! {
    #[table = "broken"]
    #[derive(Debug, Default)]
    pub struct Broken {
        #[orm = "primary"]
        pub id: i64,
        #[orm = "many_to_many"]
        pub links: RelatedMany<B>,
    }
}

#[test]
fn invalid_relation_declaration_is_a_config_error() {
    let conn = open();
    let err = query_many::<Broken, _>(&cx(), &conn, &Options::default()).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "{err:?}");
}

#[test]
fn several_predicates_need_a_divider() {
    let conn = open();
    let options = Options::bare().with_where(Where::new().with("id", 1).with("field", "x"));
    let err = query_many::<Base, _>(&cx(), &conn, &options).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "{err:?}");
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn paging_and_ordering() {
    let conn = open();
    seed_bases(&conn, 5);

    let options = Options::default()
        .with_order(OrderBy::desc("field"))
        .with_limit(2)
        .with_offset(1);
    let page: Vec<Base> = query_many(&cx(), &conn, &options).unwrap();
    let fields: Vec<_> = page.iter().map(|b| b.field.as_str()).collect();
    assert_eq!(fields, vec!["f4", "f3"]);

    let bad = Options::default().with_order(OrderBy::asc("nope"));
    assert!(query_many::<Base, _>(&cx(), &conn, &bad).is_err());
}

#[test]
fn operators_and_counts() {
    let conn = open();
    seed_bases(&conn, 5);

    let above = Options::default().with_where(Where::new().with("id", Cond::gt(3)));
    assert_eq!(count::<Base, _>(&cx(), &conn, &above).unwrap(), 2);

    let either = Options::default()
        .with_divider(Divider::Or)
        .with_where(Where::new().with("id", 1).with("field", Cond::strict("f5")));
    assert_eq!(count::<Base, _>(&cx(), &conn, &either).unwrap(), 2);

    let like = Options::default().with_where(Where::new().with("field", "f"));
    assert_eq!(count::<Base, _>(&cx(), &conn, &like).unwrap(), 5);

    let listed = Options::default()
        .with_where(Where::new().with("id", Cond::list([1, 2, 3])))
        .with_limit(2);
    let records: Vec<Base> = query_many(&cx(), &conn, &listed).unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn query_one_considers_every_listed_key() {
    let conn = open();
    seed_bases(&conn, 2);

    let listed = Options::default().with_where(Where::new().with("id", Cond::list([999, 2])));
    let found: Base = query_one(&cx(), &conn, &listed).unwrap().unwrap();
    assert_eq!(found.field, "f2");

    let mut target = Base::default();
    assert!(query_into(&cx(), &conn, &listed, &mut target).unwrap());
    assert_eq!(target.id, 2);

    let capped = listed.with_limit(1);
    assert!(query_one::<Base, _>(&cx(), &conn, &capped).unwrap().is_none());
}

#[test]
fn projection_keeps_primary_key() {
    let conn = open();
    seed_bases(&conn, 2);

    let options = Options::default().with_columns(["id"]);
    let records: Vec<Base> = query_many(&cx(), &conn, &options).unwrap();
    let ids: Vec<_> = records.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(records.iter().all(|b| b.field.is_empty()));
}

#[test]
fn options_from_json() {
    let conn = open();
    seed_bases(&conn, 3);

    let options: Options = serde_json::from_str(
        r#"{"where": [["field", {"strict_text": "f2"}]], "limit": 1}"#,
    )
    .unwrap();
    let found: Base = query_one(&cx(), &conn, &options).unwrap().unwrap();
    assert_eq!(found.id, 2);

    let none: Options =
        serde_json::from_str(r#"{"where": [["field", {"strict_text": "zzz"}]]}"#).unwrap();
    assert!(query_one::<Base, _>(&cx(), &conn, &none).unwrap().is_none());
}

#[test]
fn omitted_fields_are_left_alone() {
    let conn = open();
    let mut doc = Doc::default();
    doc.title = "kept".to_string();
    upsert(&cx(), &conn, &mut doc).unwrap();

    let mut target = Doc::default();
    target.draft = "local".to_string();
    assert!(query_into(&cx(), &conn, &Options::default(), &mut target).unwrap());
    assert_eq!(target.title, "kept");
    assert_eq!(target.draft, "local");

    let mut untouched = Doc::default();
    untouched.draft = "local".to_string();
    let missing = Options::default().with_where(Where::new().with("id", 42));
    assert!(!query_into(&cx(), &conn, &missing, &mut untouched).unwrap());
    assert_eq!(untouched, {
        let mut expected = Doc::default();
        expected.draft = "local".to_string();
        expected
    });
}

// ============================================================================
// Cancellation and files
// ============================================================================

#[test]
fn cancelled_context_stops_before_running() {
    let conn = open();
    let cx = Cx::new();
    cx.cancel();

    let err = query_many::<Base, _>(&cx, &conn, &Options::default()).unwrap_err();
    assert!(err.is_cancelled(), "{err:?}");
    let err = upsert(&cx, &conn, &mut base("x")).unwrap_err();
    assert!(err.is_cancelled(), "{err:?}");

    assert_eq!(count::<Base, _>(&Cx::for_testing(), &conn, &Options::default()).unwrap(), 0);
}

#[test]
fn file_database_persists_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relmodel.db");

    {
        let conn = SqliteConfig::file(&path).open().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        upsert(&cx(), &conn, &mut base("on disk")).unwrap();
    }

    let conn = SqliteConfig::file(&path).open().unwrap();
    let found: Vec<Base> = query_many(&cx(), &conn, &Options::default()).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].field, "on disk");
}
