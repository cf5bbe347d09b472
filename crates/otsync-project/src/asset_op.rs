use serde_json::Map;
use serde_json::Value;

/// One segment of an asset op's `p` (path) array: ShareDB's json0 type
/// addresses object fields by string key and list elements by index, both
/// in the same path array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A single json0-style op component against an asset document's JSON
/// snapshot (§4.1's "Remote op application (asset document)"): object
/// insert/delete (`oi`/`od`), and list insert/delete (`li`/`ld`), with
/// both `li` and `ld` present meaning a same-index replace.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssetOpComponent {
    pub path: Vec<PathSegment>,
    pub object_insert: Option<Value>,
    pub object_delete: Option<Value>,
    pub list_insert: Option<Value>,
    pub list_delete: Option<Value>,
}

impl AssetOpComponent {
    /// Parse a json0 op component off the wire: `{"p": [...], "oi"?, "od"?,
    /// "li"?, "ld"?}`, where each `p` element is either a string (object
    /// key) or a non-negative integer (list index).
    pub fn from_json(value: &Value) -> Result<Self, AssetOpError> {
        let path = value
            .get("p")
            .and_then(Value::as_array)
            .map(|segments| {
                segments
                    .iter()
                    .map(|segment| match segment.as_str() {
                        Some(key) => Ok(PathSegment::Key(key.to_string())),
                        None => segment
                            .as_u64()
                            .map(|n| PathSegment::Index(n as usize))
                            .ok_or(AssetOpError::MalformedPathSegment),
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            path,
            object_insert: value.get("oi").cloned(),
            object_delete: value.get("od").cloned(),
            list_insert: value.get("li").cloned(),
            list_delete: value.get("ld").cloned(),
        })
    }
}

/// Apply one op component to `snapshot` in place. Returns `Ok(Some(field))`
/// naming the top-level field key that changed (driving §4.1's
/// "Asset:update reactions"), `Ok(None)` if the path was empty (nothing to
/// apply), or an error if the op would traverse into a non-object
/// primitive — the caller logs and skips such ops rather than treating
/// them as fatal (§4.1, §7's "Silent" tier).
pub fn apply(snapshot: &mut Value, component: &AssetOpComponent) -> Result<Option<String>, AssetOpError> {
    let Some((last, ancestors)) = component.path.split_last() else {
        return Ok(None);
    };

    let parent = descend(snapshot, ancestors)?;

    match last {
        PathSegment::Key(key) => {
            let obj = as_object_mut(parent)?;
            if let Some(value) = &component.object_insert {
                obj.insert(key.clone(), value.clone());
            } else if component.object_delete.is_some() {
                obj.remove(key);
            }
        }
        PathSegment::Index(index) => {
            let arr = as_array_mut(parent)?;
            match (&component.list_insert, &component.list_delete) {
                (Some(value), Some(_)) => {
                    let slot = arr.get_mut(*index).ok_or(AssetOpError::IndexOutOfRange(*index))?;
                    *slot = value.clone();
                }
                (Some(value), None) => {
                    let at = (*index).min(arr.len());
                    arr.insert(at, value.clone());
                }
                (None, Some(_)) => {
                    if *index >= arr.len() {
                        return Err(AssetOpError::IndexOutOfRange(*index));
                    }
                    arr.remove(*index);
                }
                (None, None) => {}
            }
        }
    }

    let field = match component.path.first() {
        Some(PathSegment::Key(key)) => Some(key.clone()),
        _ => None,
    };
    Ok(field)
}

fn descend<'a>(value: &'a mut Value, path: &[PathSegment]) -> Result<&'a mut Value, AssetOpError> {
    let mut current = value;
    for segment in path {
        match segment {
            PathSegment::Key(key) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                let obj = as_object_mut(current)?;
                current = obj.entry(key.clone()).or_insert(Value::Null);
            }
            PathSegment::Index(index) => {
                let arr = as_array_mut(current)?;
                current = arr.get_mut(*index).ok_or(AssetOpError::IndexOutOfRange(*index))?;
            }
        }
    }
    Ok(current)
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, AssetOpError> {
    value.as_object_mut().ok_or(AssetOpError::NotAnObject)
}

fn as_array_mut(value: &mut Value) -> Result<&mut Vec<Value>, AssetOpError> {
    value.as_array_mut().ok_or(AssetOpError::NotAnArray)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AssetOpError {
    #[error("op traverses into a non-object value")]
    NotAnObject,
    #[error("op traverses into a non-array value")]
    NotAnArray,
    #[error("list index {0} out of range")]
    IndexOutOfRange(usize),
    #[error("op path segment is neither a string key nor an integer index")]
    MalformedPathSegment,
}
