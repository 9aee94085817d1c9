use std::fmt;

/// The part of an interaction a [`Path`] points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Path,
    Query,
    Headers,
    Body,
}

impl Category {
    /// Key used in the V2 flat notation, e.g. `$.body.id`.
    pub(crate) fn v2_key(&self) -> &'static str {
        match self {
            Category::Path => "path",
            Category::Query => "query",
            Category::Headers => "headers",
            Category::Body => "body",
        }
    }

    /// Key used to group rules in the V3 notation, e.g. `{"body": {"$.id": ...}}`.
    pub(crate) fn v3_key(&self) -> &'static str {
        match self {
            Category::Path => "path",
            Category::Query => "query",
            Category::Headers => "header",
            Category::Body => "body",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathToken {
    Field(String),
    Index(usize),
    Wildcard,
}

/// A locator into a nested structure, used as the key of the matching-rule and generator tables.
///
/// `Path`s are rendered in the pact notation: `$.body.items[*].id`, `$.query.baz[0]`,
/// `$.headers.Content-Type`. Body keys that are not plain identifiers are quoted:
/// `$.body['first name']`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path {
    category: Category,
    tokens: Vec<PathToken>,
}

impl Path {
    pub fn root(category: Category) -> Self {
        Self {
            category,
            tokens: Vec::new(),
        }
    }

    pub fn field(&self, name: impl Into<String>) -> Self {
        self.push(PathToken::Field(name.into()))
    }

    pub fn index(&self, index: usize) -> Self {
        self.push(PathToken::Index(index))
    }

    pub fn wildcard(&self) -> Self {
        self.push(PathToken::Wildcard)
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn tokens(&self) -> &[PathToken] {
        &self.tokens
    }

    fn push(&self, token: PathToken) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(token);
        Self {
            category: self.category,
            tokens,
        }
    }

    /// The path relative to its category, as used by the V3 notation.
    ///
    /// Body paths keep the `$` root (`$.id`); header and query paths are keyed by name only.
    pub(crate) fn v3_key(&self) -> String {
        match self.category {
            Category::Body => {
                let mut key = String::from("$");
                for token in &self.tokens {
                    write_token(&mut key, token, true);
                }
                key
            }
            Category::Path => String::new(),
            Category::Headers | Category::Query => match self.tokens.first() {
                Some(PathToken::Field(name)) => name.clone(),
                _ => String::new(),
            },
        }
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn write_token(buffer: &mut String, token: &PathToken, quote_fields: bool) {
    match token {
        PathToken::Field(name) if !quote_fields || is_identifier(name) => {
            buffer.push('.');
            buffer.push_str(name);
        }
        PathToken::Field(name) => {
            buffer.push_str("['");
            buffer.push_str(name);
            buffer.push_str("']");
        }
        PathToken::Index(index) => {
            buffer.push('[');
            buffer.push_str(&index.to_string());
            buffer.push(']');
        }
        PathToken::Wildcard => buffer.push_str("[*]"),
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rendered = format!("$.{}", self.category.v2_key());
        // Header and query names are free-form: they are never quoted.
        let quote_fields = self.category == Category::Body;
        for token in &self.tokens {
            write_token(&mut rendered, token, quote_fields);
        }
        f.write_str(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_paths_use_dots_and_brackets() {
        let path = Path::root(Category::Body)
            .field("items")
            .wildcard()
            .field("id");
        assert_eq!(path.to_string(), "$.body.items[*].id");
        assert_eq!(path.v3_key(), "$.items[*].id");
    }

    #[test]
    fn odd_body_keys_are_quoted() {
        let path = Path::root(Category::Body).field("first name").index(2);
        assert_eq!(path.to_string(), "$.body['first name'][2]");
    }

    #[test]
    fn header_and_query_paths_are_keyed_by_name() {
        let header = Path::root(Category::Headers).field("Content-Type");
        assert_eq!(header.to_string(), "$.headers.Content-Type");
        assert_eq!(header.v3_key(), "Content-Type");

        let query = Path::root(Category::Query).field("baz").index(1);
        assert_eq!(query.to_string(), "$.query.baz[1]");
        assert_eq!(query.v3_key(), "baz");
    }
}
