use std::fmt;

use quarry_schema::Value;

/// SQL text plus the values for its placeholders.
///
/// `Display` prints the statement with every value inlined as a literal,
/// for logs and tests; execute [`Statement::text`] with
/// [`Statement::params`] instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub(crate) text: String,
    pub(crate) params: Vec<Value>,
    pub(crate) inline: String,
}

impl Statement {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.text, self.params)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inline)
    }
}
