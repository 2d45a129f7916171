use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::gpu::types::{Framebuffer, Texture};
use crate::model::pin::PinId;

/// Map from output-pin ID to the value that pin produced, the currency of
/// node execution.
pub type PinMap = HashMap<PinId, DynValue>;

/// The closed set of value kinds that flow through pins and attributes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum DynValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    String(String),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
    Texture(Texture),
    Framebuffer(Framebuffer),
    AudioSamples(Vec<f32>),
}

/// Kind tag of a [`DynValue`], for queries without touching the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Float,
    Int,
    Bool,
    String,
    Vec2,
    Vec4,
    Texture,
    Framebuffer,
    AudioSamples,
}

impl DynValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            DynValue::Float(_) => ValueKind::Float,
            DynValue::Int(_) => ValueKind::Int,
            DynValue::Bool(_) => ValueKind::Bool,
            DynValue::String(_) => ValueKind::String,
            DynValue::Vec2(_) => ValueKind::Vec2,
            DynValue::Vec4(_) => ValueKind::Vec4,
            DynValue::Texture(_) => ValueKind::Texture,
            DynValue::Framebuffer(_) => ValueKind::Framebuffer,
            DynValue::AudioSamples(_) => ValueKind::AudioSamples,
        }
    }

    pub fn is_kind(&self, kind: ValueKind) -> bool {
        self.kind() == kind
    }

    /// Typed extraction. The runtime kind must match `T` exactly; there is
    /// no numeric coercion.
    pub fn get_as<T: FromDynValue>(&self) -> Option<T> {
        T::from_dyn(self)
    }
}

/// Type-safe extraction from a [`DynValue`], implemented per payload type.
pub trait FromDynValue: Sized {
    fn from_dyn(value: &DynValue) -> Option<Self>;
}

impl FromDynValue for f32 {
    fn from_dyn(value: &DynValue) -> Option<f32> {
        match value {
            DynValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromDynValue for i32 {
    fn from_dyn(value: &DynValue) -> Option<i32> {
        match value {
            DynValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromDynValue for bool {
    fn from_dyn(value: &DynValue) -> Option<bool> {
        match value {
            DynValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromDynValue for String {
    fn from_dyn(value: &DynValue) -> Option<String> {
        match value {
            DynValue::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromDynValue for [f32; 2] {
    fn from_dyn(value: &DynValue) -> Option<[f32; 2]> {
        match value {
            DynValue::Vec2(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromDynValue for [f32; 4] {
    fn from_dyn(value: &DynValue) -> Option<[f32; 4]> {
        match value {
            DynValue::Vec4(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromDynValue for Texture {
    fn from_dyn(value: &DynValue) -> Option<Texture> {
        match value {
            DynValue::Texture(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromDynValue for Framebuffer {
    fn from_dyn(value: &DynValue) -> Option<Framebuffer> {
        match value {
            DynValue::Framebuffer(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromDynValue for Vec<f32> {
    fn from_dyn(value: &DynValue) -> Option<Vec<f32>> {
        match value {
            DynValue::AudioSamples(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl From<f32> for DynValue {
    fn from(value: f32) -> Self {
        DynValue::Float(value)
    }
}

impl From<i32> for DynValue {
    fn from(value: i32) -> Self {
        DynValue::Int(value)
    }
}

impl From<bool> for DynValue {
    fn from(value: bool) -> Self {
        DynValue::Bool(value)
    }
}

impl From<&str> for DynValue {
    fn from(value: &str) -> Self {
        DynValue::String(value.to_string())
    }
}

impl From<String> for DynValue {
    fn from(value: String) -> Self {
        DynValue::String(value)
    }
}

impl From<[f32; 2]> for DynValue {
    fn from(value: [f32; 2]) -> Self {
        DynValue::Vec2(value)
    }
}

impl From<[f32; 4]> for DynValue {
    fn from(value: [f32; 4]) -> Self {
        DynValue::Vec4(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_queries() {
        assert_eq!(DynValue::Float(1.0).kind(), ValueKind::Float);
        assert_eq!(DynValue::from("hi").kind(), ValueKind::String);
        assert!(DynValue::Vec2([1.0, 2.0]).is_kind(ValueKind::Vec2));
    }

    #[test]
    fn test_typed_access_requires_exact_kind() {
        let float = DynValue::Float(45.0);
        assert_eq!(float.get_as::<f32>(), Some(45.0));
        assert_eq!(float.get_as::<i32>(), None);

        // An integer never coerces to a float.
        let int = DynValue::Int(45);
        assert_eq!(int.get_as::<f32>(), None);
        assert_eq!(int.get_as::<i32>(), Some(45));

        let string = DynValue::from("45");
        assert_eq!(string.get_as::<f32>(), None);
        assert_eq!(string.get_as::<String>(), Some("45".to_string()));
    }

    #[test]
    fn test_serde_round_trip() {
        let value = DynValue::Vec4([0.25, 0.5, 0.75, 1.0]);
        let json = serde_json::to_string(&value).unwrap();
        let back: DynValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
