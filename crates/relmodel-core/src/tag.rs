//! Field tag mini-language.
//!
//! A tag is a comma-separated list of `key` or `key=value` tokens:
//!
//! ```text
//! primary,col=rowid,ref=base_id
//! many_to_many,table=mapping,field=m_id,condition:kind=1
//! ```
//!
//! A token's key ends at its first `=` or `:`. The `:` form exists so that a
//! value may itself contain `=` (`condition:kind=1` has key `condition` and
//! value `kind=1`).

/// A parsed field tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    raw: &'a str,
}

/// Keywords understood by the introspector.
pub mod keys {
    pub const PRIMARY: &str = "primary";
    pub const UNIQUE: &str = "unique";
    pub const COLUMN: &str = "col";
    pub const REFERENCE: &str = "ref";
    pub const TABLE: &str = "table";
    pub const FIELD: &str = "field";
    pub const CONDITION: &str = "condition";
    pub const HAS_ONE: &str = "has_one";
    pub const HAS_MANY: &str = "has_many";
    pub const MANY_TO_MANY: &str = "many_to_many";
    pub const OMIT: &str = "-";
}

impl<'a> Tag<'a> {
    pub const fn new(raw: &'a str) -> Self {
        Self { raw }
    }

    /// The unparsed tag text.
    pub const fn raw(&self) -> &'a str {
        self.raw
    }

    /// Iterate `(key, value)` pairs. Bare keys yield `None` as value.
    pub fn tokens(&self) -> impl Iterator<Item = (&'a str, Option<&'a str>)> {
        self.raw
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|token| match token.find(['=', ':']) {
                Some(pos) => (&token[..pos], Some(&token[pos + 1..])),
                None => (token, None),
            })
    }

    /// Look up a setting.
    ///
    /// Returns the empty string when the key is absent, the key itself when
    /// it is present without a value, and the value otherwise.
    pub fn lookup(&self, key: &'a str) -> &'a str {
        for (k, v) in self.tokens() {
            if k == key {
                return v.unwrap_or(key);
            }
        }
        ""
    }

    /// The value of `key=value`, if present with a non-empty value.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.tokens()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v)
            .filter(|v| !v.is_empty())
    }

    /// Whether `key` appears, bare or with a value.
    pub fn has(&self, key: &str) -> bool {
        self.tokens().any(|(k, _)| k == key)
    }

    /// Whether the whole field is excluded from mapping.
    pub fn is_omitted(&self) -> bool {
        self.raw.trim() == keys::OMIT
    }
}
