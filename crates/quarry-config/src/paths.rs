//! Path helpers for configuration and entity files.

use std::{env, iter::Peekable, path::PathBuf, str::Chars};

use crate::error::{ConfigError, Result};

/// The user's home directory: `$HOME`, or `/` when it is unset.
pub fn home_dir() -> PathBuf {
    env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

/// `$XDG_CONFIG_HOME`, defaulting to `$HOME/.config`.
pub fn xdg_config_home() -> PathBuf {
    env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Expands `$VAR`, `${VAR}` and a leading `~`, then makes the path absolute
/// against the current directory.
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let path = path.trim();
    if path.is_empty() {
        return Err(ConfigError::EmptyPath);
    }

    let resolved = PathBuf::from(expand_variables(path)?);
    if resolved.is_absolute() {
        Ok(resolved)
    } else {
        Ok(env::current_dir()?.join(resolved))
    }
}

fn expand_variables(path: &str) -> Result<String> {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' if chars.peek() == Some(&'{') => {
                chars.next();
                let name = consume_until(&mut chars, '}')
                    .ok_or_else(|| ConfigError::UnclosedVariable(path.to_string()))?;
                expand_env_var(&name, &mut result, path)?;
            }
            '$' => {
                let name = consume_var_name(&mut chars);
                if name.is_empty() {
                    result.push('$');
                } else {
                    expand_env_var(&name, &mut result, path)?;
                }
            }
            '~' if result.is_empty() => result.push_str(&home_dir().to_string_lossy()),
            _ => result.push(c),
        }
    }

    Ok(result)
}

fn consume_until(chars: &mut Peekable<Chars<'_>>, delimiter: char) -> Option<String> {
    let mut name = String::new();
    for c in chars.by_ref() {
        if c == delimiter {
            return Some(name);
        }
        name.push(c);
    }
    None
}

fn consume_var_name(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '_' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    name
}

fn expand_env_var(name: &str, result: &mut String, path: &str) -> Result<()> {
    let value = env::var(name).map_err(|_| ConfigError::MissingEnvVar {
        var: name.to_string(),
        path: path.to_string(),
    })?;
    result.push_str(&value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::test_utils::with_env;

    #[test]
    #[serial]
    fn test_expands_variables_and_tilde() {
        with_env(
            vec![("HOME", Some("/home/quarry")), ("QUARRY_TEST_DIR", Some("/srv/app"))],
            || {
                assert_eq!(
                    resolve_path("~/entities.toml").unwrap(),
                    PathBuf::from("/home/quarry/entities.toml")
                );
                assert_eq!(
                    resolve_path("$QUARRY_TEST_DIR/entities.toml").unwrap(),
                    PathBuf::from("/srv/app/entities.toml")
                );
                assert_eq!(
                    resolve_path("${QUARRY_TEST_DIR}/db").unwrap(),
                    PathBuf::from("/srv/app/db")
                );
            },
        );
    }

    #[test]
    #[serial]
    fn test_missing_variable() {
        with_env(vec![("QUARRY_TEST_UNSET", None)], || {
            assert!(matches!(
                resolve_path("$QUARRY_TEST_UNSET/x"),
                Err(ConfigError::MissingEnvVar { ref var, .. }) if var == "QUARRY_TEST_UNSET"
            ));
            assert!(matches!(
                resolve_path("${QUARRY_TEST_UNSET"),
                Err(ConfigError::UnclosedVariable(_))
            ));
        });
    }

    #[test]
    fn test_empty_and_relative_paths() {
        assert!(matches!(resolve_path("  "), Err(ConfigError::EmptyPath)));
        let resolved = resolve_path("entities.toml").unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("entities.toml"));
    }

    #[test]
    #[serial]
    fn test_xdg_config_home_fallback() {
        with_env(
            vec![("XDG_CONFIG_HOME", None), ("HOME", Some("/home/quarry"))],
            || assert_eq!(xdg_config_home(), PathBuf::from("/home/quarry/.config")),
        );
    }
}
