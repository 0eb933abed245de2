//! Dotted-path access into `serde_json::Value` trees.
//!
//! Paths are plain `a.b.c` segments; numeric segments index into arrays.

use serde_json::{Map, Value};

/// Paths longer than this are never followed.
pub const MAX_PATH_DEPTH: usize = 32;

pub fn segments(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Follow `path` from `root`. Stops quietly (returns `None`) at missing keys,
/// `null` or scalar intermediates, and paths deeper than [`MAX_PATH_DEPTH`].
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let parts = segments(path);
    if parts.is_empty() || parts.len() > MAX_PATH_DEPTH {
        return None;
    }
    let mut current = root;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Null => None,
        other => Some(other),
    }
}

/// Set `path` to `value`, creating intermediate objects as needed.
/// Fails when an intermediate exists but is not an object or array.
pub fn set(root: &mut Value, path: &str, value: Value) -> Result<(), String> {
    let parts = segments(path);
    if parts.is_empty() {
        return Err("Path must not be empty".into());
    }
    if parts.len() > MAX_PATH_DEPTH {
        return Err(format!("Path '{}' exceeds maximum depth {}", path, MAX_PATH_DEPTH));
    }

    let (last, parents) = parts.split_last().ok_or("Path must not be empty")?;
    let mut current = root;
    for (i, part) in parents.iter().enumerate() {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => {
                let idx = part
                    .parse::<usize>()
                    .map_err(|_| {
                        format!("Segment '{}' of '{}' is not an array index", part, path)
                    })?;
                items
                    .get_mut(idx)
                    .ok_or_else(|| format!("Index {} out of bounds in '{}'", idx, path))?
            }
            _ => {
                return Err(format!(
                    "Cannot set '{}': '{}' is not an object",
                    path,
                    parents[..=i].join(".")
                ));
            }
        };
    }

    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let idx = last
                .parse::<usize>()
                .map_err(|_| format!("Segment '{}' of '{}' is not an array index", last, path))?;
            let slot = items
                .get_mut(idx)
                .ok_or_else(|| format!("Index {} out of bounds in '{}'", idx, path))?;
            *slot = value;
            Ok(())
        }
        _ => Err(format!("Cannot set '{}': parent is not an object", path)),
    }
}

/// Remove the key at `path`, returning the removed value.
pub fn remove(root: &mut Value, path: &str) -> Option<Value> {
    let parts = segments(path);
    let (last, parents) = parts.split_last()?;
    if parts.len() > MAX_PATH_DEPTH {
        return None;
    }
    let mut current = root;
    for part in parents {
        current = match current {
            Value::Object(map) => map.get_mut(*part)?,
            _ => return None,
        };
    }
    current.as_object_mut()?.remove(*last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_tolerates_scalars_and_nulls() {
        let v = json!({ "a": { "b": null, "c": 3, "d": [ { "e": 1 } ] } });
        assert_eq!(get(&v, "a.b"), None);
        assert_eq!(get(&v, "a.c.x"), None);
        assert_eq!(get(&v, "a.d.0.e"), Some(&json!(1)));
        assert_eq!(get(&v, "missing.path"), None);
    }

    #[test]
    fn set_creates_intermediates() {
        let mut v = json!({});
        set(&mut v, "parameters.options.timeout", json!(30)).unwrap();
        assert_eq!(v, json!({ "parameters": { "options": { "timeout": 30 } } }));
    }

    #[test]
    fn set_refuses_to_descend_into_scalars() {
        let mut v = json!({ "a": 1 });
        assert!(set(&mut v, "a.b", json!(2)).is_err());
        assert_eq!(v, json!({ "a": 1 }));
    }

    #[test]
    fn remove_returns_value() {
        let mut v = json!({ "a": { "b": 1, "c": 2 } });
        assert_eq!(remove(&mut v, "a.b"), Some(json!(1)));
        assert_eq!(v, json!({ "a": { "c": 2 } }));
    }
}
