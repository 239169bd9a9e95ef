//! Configuration override parsing and application logic.

use toml::value::Table;

use crate::errors::ConfigError;

type Override = (String, toml::Value);

/// Parses an override string. Splits by '=' to get key and raw str value,
/// then parses the str value.
pub(crate) fn parse_override(override_str: &str) -> Result<Override, ConfigError> {
    let (key, value_str) = override_str
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidOverride(override_str.to_string()))?;
    Ok((key.to_string(), parse_value(value_str)))
}

/// Apply override to config table.
pub(crate) fn apply_override(
    path: &str,
    value: toml::Value,
    table: &mut Table,
) -> Result<(), ConfigError> {
    apply_override_inner(path, value, table)
}

fn apply_override_inner(
    remaining_path: &str,
    value: toml::Value,
    table: &mut Table,
) -> Result<(), ConfigError> {
    match remaining_path.split_once('.') {
        None => {
            table.insert(remaining_path.to_string(), value);
            Ok(())
        }
        Some((key, rest)) => match table.get_mut(key) {
            Some(toml::Value::Table(inner)) => apply_override_inner(rest, value, inner),
            Some(_) => Err(ConfigError::TraverseNonTableAt(key.to_string())),
            None => {
                // Sections the file omitted entirely are filled in.
                let mut inner = Table::new();
                apply_override_inner(rest, value, &mut inner)?;
                table.insert(key.to_string(), toml::Value::Table(inner));
                Ok(())
            }
        },
    }
}

/// Parses a string into a toml value. First tries as `i64`, then as `bool`
/// and then defaults to `String`.
fn parse_value(str_value: &str) -> toml::Value {
    str_value
        .parse::<i64>()
        .map(toml::Value::Integer)
        .or_else(|_| str_value.parse::<bool>().map(toml::Value::Boolean))
        .unwrap_or_else(|_| toml::Value::String(str_value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typed_values() {
        assert_eq!(
            parse_override("sync.poll_wait_ms=1000").unwrap().1,
            toml::Value::Integer(1000)
        );
        assert_eq!(
            parse_override("rpc.fetch_proofs=true").unwrap().1,
            toml::Value::Boolean(true)
        );
        assert_eq!(
            parse_override("rpc.url=http://x").unwrap().1,
            toml::Value::String("http://x".to_string())
        );
        assert!(parse_override("no-equals").is_err());
    }

    #[test]
    fn applies_nested_overrides() {
        let mut table: Table = toml::from_str("[rpc]\nurl = 'a'\n").unwrap();

        apply_override("rpc.url", toml::Value::String("b".into()), &mut table).unwrap();
        assert_eq!(table["rpc"]["url"], toml::Value::String("b".into()));

        // Missing sections are created on the way down.
        apply_override("sync.prune_depth", toml::Value::Integer(4), &mut table).unwrap();
        assert_eq!(table["sync"]["prune_depth"], toml::Value::Integer(4));

        let err = apply_override("rpc.url.too_deep", toml::Value::Integer(1), &mut table);
        assert!(err.is_err());
    }
}
