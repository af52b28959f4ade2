use std::any::type_name;

use documented::{Documented, DocumentedFields};
use toml_edit::{Decor, Item, RawString, Table};
use tracing::warn;

use crate::error::{ConfigError, Result};

/// Appends documentation lines as TOML comments to the given `Decor`.
///
/// Each line of `docs` becomes a `#` comment appended to the existing prefix,
/// separated from any previous comment block by an empty `#` line.
pub fn append_docs_as_toml_comments(decor: &mut Decor, docs: &str) {
    let old_prefix = decor.prefix().and_then(RawString::as_str);
    let last_line = old_prefix.and_then(|prefix| prefix.lines().last());

    let comments: String = docs
        .lines()
        .map(|l| {
            if l.is_empty() {
                "#\n".into()
            } else {
                format!("# {l}\n")
            }
        })
        .collect();

    let new_prefix = match (old_prefix, last_line) {
        (None, _) | (Some(_), None) => comments,
        (Some(prefix), Some("")) => format!("{prefix}{comments}"),
        (Some(prefix), Some(_)) => format!("{prefix}#\n{comments}"),
    };
    decor.set_prefix(new_prefix);
}

/// Annotates a TOML `Table` with the field docs of `T`.
///
/// Keys without documentation are left alone and logged. The struct-level
/// docs are added above the table unless it is the document root.
pub fn annotate_toml_table<T>(table: &mut Table, is_root: bool) -> Result<()>
where
    T: Documented + DocumentedFields,
{
    if !is_root {
        append_docs_as_toml_comments(table.decor_mut(), T::DOCS);
    }

    for (mut key_mut, value_item) in table.iter_mut() {
        let key_str = key_mut.get().to_string();
        match T::get_field_docs(&key_str) {
            Ok(docs) => match value_item {
                Item::None => return Err(ConfigError::UnexpectedTomlItem(key_str)),
                Item::Value(_) => append_docs_as_toml_comments(key_mut.leaf_decor_mut(), docs),
                Item::Table(sub_table) => {
                    append_docs_as_toml_comments(sub_table.decor_mut(), docs)
                }
                Item::ArrayOfTables(array) => {
                    if let Some(first_table) = array.iter_mut().next() {
                        append_docs_as_toml_comments(first_table.decor_mut(), docs);
                    }
                }
            },
            Err(_) => {
                warn!(
                    key = %key_str,
                    target_type = type_name::<T>(),
                    "TOML key has no documentation"
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use toml_edit::Decor;

    use super::*;
    use crate::config::Config;

    #[test]
    fn test_append_docs_as_toml_comments() {
        let mut decor = Decor::new("", "");
        append_docs_as_toml_comments(&mut decor, "Test documentation");

        let prefix = decor.prefix().and_then(|p| p.as_str()).unwrap();
        assert_eq!(prefix, "# Test documentation\n");
    }

    #[test]
    fn test_append_docs_multiline() {
        let mut decor = Decor::new("", "");
        append_docs_as_toml_comments(&mut decor, "Line 1\n\nLine 2");

        let prefix = decor.prefix().and_then(|p| p.as_str()).unwrap();
        assert_eq!(prefix, "# Line 1\n#\n# Line 2\n");
    }

    #[test]
    fn test_append_docs_after_existing_comment() {
        let mut decor = Decor::new("# first\n", "");
        append_docs_as_toml_comments(&mut decor, "second");

        let prefix = decor.prefix().and_then(|p| p.as_str()).unwrap();
        assert_eq!(prefix, "# first\n#\n# second\n");
    }

    #[test]
    fn test_annotate_toml_document() {
        let doc = Config::default_config().to_annotated_document().unwrap();
        let text = doc.to_string();
        assert!(text.contains("# SQL dialect"));
        assert!(text.contains("dialect = \"generic\""));
    }
}
