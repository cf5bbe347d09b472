use serde::de::Error as _;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

/// The payload half of an OT op: an insertion or a deletion of `n`
/// characters starting at the op's index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OtArg {
    Insert(String),
    Delete(usize),
}

impl OtArg {
    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Insert(s) => serde_json::Value::String(s.clone()),
            Self::Delete(n) => serde_json::json!({ "d": n }),
        }
    }

    fn from_json(value: &serde_json::Value) -> Result<Self, OtOpError> {
        match value {
            serde_json::Value::String(s) => Ok(Self::Insert(s.clone())),
            serde_json::Value::Object(map) => {
                let d = map
                    .get("d")
                    .and_then(serde_json::Value::as_u64)
                    .ok_or_else(|| OtOpError::MalformedArg(value.clone()))?;
                Ok(Self::Delete(d as usize))
            }
            _ => Err(OtOpError::MalformedArg(value.clone())),
        }
    }
}

/// A positional OT text operation, one of the three wire shapes: `[arg]`
/// (implicit index 0), `[index, arg]`, or `[index, ins, del]` (an atomic
/// replace).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OtOp {
    /// `[arg]`
    Arg(OtArg),
    /// `[index, arg]`
    Indexed(usize, OtArg),
    /// `[index, ins, del]` — an atomic replace at `index`.
    Replace(usize, String, usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtOpError {
    #[error("op array must have 1, 2, or 3 elements, got {0}")]
    WrongArity(usize),
    #[error("malformed op argument: {0}")]
    MalformedArg(serde_json::Value),
    #[error("op is not a JSON array")]
    NotAnArray,
}

impl OtOp {
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Arg(arg) => serde_json::Value::Array(vec![arg.to_json()]),
            Self::Indexed(index, arg) => {
                serde_json::Value::Array(vec![serde_json::json!(index), arg.to_json()])
            }
            Self::Replace(index, ins, del) => serde_json::Value::Array(vec![
                serde_json::json!(index),
                serde_json::Value::String(ins.clone()),
                serde_json::json!({ "d": del }),
            ]),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, OtOpError> {
        let arr = value.as_array().ok_or(OtOpError::NotAnArray)?;
        match arr.as_slice() {
            [arg] => Ok(Self::Arg(OtArg::from_json(arg)?)),
            [index, arg] => {
                let index = index
                    .as_u64()
                    .ok_or_else(|| OtOpError::MalformedArg(index.clone()))? as usize;
                Ok(Self::Indexed(index, OtArg::from_json(arg)?))
            }
            [index, ins, del] => {
                let index = index
                    .as_u64()
                    .ok_or_else(|| OtOpError::MalformedArg(index.clone()))? as usize;
                let ins = ins
                    .as_str()
                    .ok_or_else(|| OtOpError::MalformedArg(ins.clone()))?
                    .to_string();
                let del = del
                    .get("d")
                    .and_then(serde_json::Value::as_u64)
                    .ok_or_else(|| OtOpError::MalformedArg(del.clone()))? as usize;
                Ok(Self::Replace(index, ins, del))
            }
            other => Err(OtOpError::WrongArity(other.len())),
        }
    }
}

impl Serialize for OtOp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OtOp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json_for_each_shape() {
        let ops = vec![
            OtOp::Arg(OtArg::Insert("hi".into())),
            OtOp::Indexed(3, OtArg::Delete(2)),
            OtOp::Indexed(0, OtArg::Insert("// top\n".into())),
            OtOp::Replace(0, "AXC".into(), 3),
        ];
        for op in ops {
            let json = op.to_json();
            let back = OtOp::from_json(&json).unwrap();
            assert_eq!(op, back);
        }
    }

    #[test]
    fn delete_op_serializes_as_d_object() {
        let op = OtOp::Indexed(0, OtArg::Delete(3));
        assert_eq!(op.to_json(), serde_json::json!([0, {"d": 3}]));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let value = serde_json::json!([1, 2, 3, 4]);
        assert_eq!(OtOp::from_json(&value), Err(OtOpError::WrongArity(4)));
    }
}
