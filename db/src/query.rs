/// A value bound to a `?` placeholder. Values never become part of the SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Real(f64),
    Integer(i64),
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Real(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Integer(value)
    }
}

/// SQL text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    sql: String,
    params: Vec<Param>,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: vec![],
        }
    }

    #[must_use]
    pub fn bind(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// True when the text is a single statement starting with `SELECT` or `WITH` and no
    /// `INSERT`, `UPDATE`, `DELETE` or `REPLACE INTO` appears outside a quoted literal.
    ///
    /// A `WITH` prefix may front a data-modifying statement, so the first keyword alone is
    /// not enough.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        let body = strip_leading_comments(&self.sql);
        let words = bare_words(body);

        matches!(words.first().map(String::as_str), Some("SELECT" | "WITH"))
            && !modifies_data(&words)
            && is_single_statement(body)
    }
}

/// Uppercased words that sit outside quotes, in order.
fn bare_words(sql: &str) -> Vec<String> {
    let mut words = vec![];
    let mut word = String::new();
    let mut quote: Option<char> = None;

    for ch in sql.chars() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, c) if c.is_ascii_alphanumeric() || c == '_' => {
                word.push(c.to_ascii_uppercase());
                continue;
            }
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, _) => {}
        }
        if !word.is_empty() {
            words.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        words.push(word);
    }

    words
}

fn modifies_data(words: &[String]) -> bool {
    words.iter().enumerate().any(|(idx, word)| match word.as_str() {
        "INSERT" | "UPDATE" | "DELETE" => true,
        // REPLACE is also a string function; only `REPLACE INTO` writes.
        "REPLACE" => words.get(idx + 1).is_some_and(|next| next == "INTO"),
        _ => false,
    })
}

fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    while let Some(comment) = rest.strip_prefix("--") {
        rest = comment
            .split_once('\n')
            .map_or("", |(_, after)| after)
            .trim_start();
    }
    rest
}

/// A `;` outside quotes may only be followed by whitespace.
fn is_single_statement(sql: &str) -> bool {
    let mut quote: Option<char> = None;

    for (idx, ch) in sql.char_indices() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, ';') => return sql[idx + 1..].trim().is_empty(),
            (None, _) => {}
        }
    }

    true
}
