#![allow(dead_code)]

use relmodel::prelude::*;

model! {
    #[table = "node"]
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Node {
        #[orm = "primary"]
        pub id: i64,
        pub name: String,
        #[orm = "has_one,col=related_id"]
        pub related: Related<Node>,
    }
}

model! {
    #[table = "a"]
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct A {
        #[orm = "primary,ref=a_id"]
        pub id: i64,
        pub name: String,
        #[orm = "many_to_many,table=j"]
        pub bs: RelatedMany<B>,
    }
}

model! {
    #[table = "b"]
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct B {
        #[orm = "primary,ref=b_id"]
        pub id: i64,
        pub name: String,
    }
}

model! {
    #[table = "pair"]
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Pair {
        #[orm = "primary"]
        pub first_id: i64,
        #[orm = "primary"]
        pub second_id: i64,
        pub label: String,
    }
}

model! {
    /// An author and the books pointing back at them.
    #[table = "author"]
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Author {
        #[orm = "primary"]
        pub id: i64,
        #[orm = "unique"]
        pub name: String,
        #[orm = "has_many"]
        pub books: RelatedMany<Book>,
    }
}

model! {
    #[table = "book"]
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Book {
        #[orm = "primary"]
        pub id: i64,
        pub title: String,
        pub pages: i32,
        #[orm = "has_one,col=author_id"]
        pub author: Related<Author>,
    }
}

model! {
    #[table = "base_model"]
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Base {
        #[orm = "primary"]
        pub id: i64,
        #[orm = "unique"]
        pub field: String,
    }
}

model! {
    #[table = "topic"]
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Topic {
        #[orm = "primary,ref=topic_id"]
        pub id: i64,
        #[orm = "unique"]
        pub name: String,
    }
}

model! {
    #[table = "doc"]
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Doc {
        #[orm = "primary,ref=doc_id"]
        pub id: i64,
        pub title: String,
        #[orm = "many_to_many,table=doc_topic,condition:kind=1"]
        pub main_topics: RelatedMany<Topic>,
        #[orm = "many_to_many,table=doc_topic,condition:kind=2"]
        pub side_topics: RelatedMany<Topic>,
        /// Kept in memory only.
        #[orm = "-"]
        pub draft: String,
        cache: Option<i64>,
    }
}

model! {
    /// Keyed by two columns, linked to cells keyed by two columns.
    #[table = "grid"]
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Grid {
        #[orm = "primary,ref=grid_x"]
        pub x: i64,
        #[orm = "primary,ref=grid_y"]
        pub y: i64,
        pub name: String,
        #[orm = "many_to_many,table=grid_cell"]
        pub cells: RelatedMany<Cell>,
    }
}

model! {
    #[table = "cell"]
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Cell {
        #[orm = "primary,ref=cell_line"]
        pub line: i64,
        #[orm = "primary,ref=cell_slot"]
        pub slot: i64,
        pub label: String,
    }
}

pub const SCHEMA: &str = "
    CREATE TABLE node (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL DEFAULT '',
        related_id INTEGER REFERENCES node(id)
    );
    CREATE TABLE a (id INTEGER PRIMARY KEY, name TEXT NOT NULL DEFAULT '');
    CREATE TABLE b (id INTEGER PRIMARY KEY, name TEXT NOT NULL DEFAULT '');
    CREATE TABLE j (
        a_id INTEGER NOT NULL REFERENCES a(id),
        b_id INTEGER NOT NULL REFERENCES b(id)
    );
    CREATE TABLE j_log (op TEXT NOT NULL);
    CREATE TRIGGER j_insert AFTER INSERT ON j BEGIN INSERT INTO j_log (op) VALUES ('insert'); END;
    CREATE TRIGGER j_delete AFTER DELETE ON j BEGIN INSERT INTO j_log (op) VALUES ('delete'); END;
    CREATE TABLE pair (
        first_id INTEGER NOT NULL,
        second_id INTEGER NOT NULL,
        label TEXT NOT NULL DEFAULT '',
        PRIMARY KEY (first_id, second_id)
    );
    CREATE TABLE author (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
    CREATE TABLE book (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        pages INTEGER NOT NULL DEFAULT 0,
        author_id INTEGER REFERENCES author(id)
    );
    CREATE TABLE base_model (id INTEGER PRIMARY KEY, field TEXT NOT NULL UNIQUE);
    CREATE TABLE topic (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
    CREATE TABLE doc (id INTEGER PRIMARY KEY, title TEXT NOT NULL DEFAULT '');
    CREATE TABLE doc_topic (
        topic_id INTEGER NOT NULL REFERENCES topic(id),
        kind INTEGER NOT NULL,
        doc_id INTEGER NOT NULL REFERENCES doc(id)
    );
    CREATE TABLE grid (
        x INTEGER NOT NULL,
        y INTEGER NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        PRIMARY KEY (x, y)
    );
    CREATE TABLE cell (
        line INTEGER NOT NULL,
        slot INTEGER NOT NULL,
        label TEXT NOT NULL DEFAULT '',
        PRIMARY KEY (line, slot)
    );
    CREATE TABLE grid_cell (
        cell_line INTEGER NOT NULL,
        cell_slot INTEGER NOT NULL,
        grid_x INTEGER NOT NULL,
        grid_y INTEGER NOT NULL
    );
    CREATE TABLE grid_cell_log (op TEXT NOT NULL);
    CREATE TRIGGER grid_cell_insert AFTER INSERT ON grid_cell
        BEGIN INSERT INTO grid_cell_log (op) VALUES ('insert'); END;
    CREATE TRIGGER grid_cell_delete AFTER DELETE ON grid_cell
        BEGIN INSERT INTO grid_cell_log (op) VALUES ('delete'); END;
";

pub fn open() -> SqliteConnection {
    let conn = SqliteConnection::open_memory().expect("open in-memory database");
    conn.execute_batch(SCHEMA).expect("create schema");
    conn
}

/// Rows of a raw query as `i64` tuples.
pub fn int_rows(conn: &SqliteConnection, sql: &str) -> Vec<Vec<i64>> {
    conn.query(&Cx::for_testing(), sql, &[])
        .expect("raw query")
        .into_iter()
        .map(|row| {
            row.values()
                .iter()
                .map(|v| v.as_i64().expect("integer column"))
                .collect()
        })
        .collect()
}

pub fn text_rows(conn: &SqliteConnection, sql: &str) -> Vec<String> {
    conn.query(&Cx::for_testing(), sql, &[])
        .expect("raw query")
        .into_iter()
        .map(|row| row.values()[0].as_str().unwrap_or_default().to_string())
        .collect()
}
