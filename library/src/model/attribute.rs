use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::model::pin::allocate_id;
use crate::model::value::DynValue;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Keyframe {
    pub frame: OrderedFloat<f64>,
    pub value: DynValue,
}

/// A composition-level animatable value, sampled at composition-local time.
///
/// Scalar and vector kinds interpolate linearly between the surrounding
/// keyframes; every other kind holds the previous keyframe's value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Attribute {
    pub id: i32,
    pub name: String,
    pub keyframes: Vec<Keyframe>,
}

impl Attribute {
    pub fn new(name: &str, initial: DynValue) -> Self {
        Self {
            id: allocate_id(),
            name: name.to_string(),
            keyframes: vec![Keyframe {
                frame: OrderedFloat(0.0),
                value: initial,
            }],
        }
    }

    /// Inserts a keyframe, keeping the list sorted. A keyframe already
    /// sitting at the same frame is replaced.
    pub fn add_keyframe(&mut self, frame: f64, value: DynValue) {
        let frame = OrderedFloat(frame);
        match self.keyframes.binary_search_by(|k| k.frame.cmp(&frame)) {
            Ok(position) => self.keyframes[position].value = value,
            Err(position) => self.keyframes.insert(position, Keyframe { frame, value }),
        }
    }

    pub fn value_at(&self, frame: f64) -> Option<DynValue> {
        let first = self.keyframes.first()?;
        if self.keyframes.len() == 1 || frame <= first.frame.into_inner() {
            return Some(first.value.clone());
        }

        let last = self.keyframes.last()?;
        if frame >= last.frame.into_inner() {
            return Some(last.value.clone());
        }

        let upper = self
            .keyframes
            .iter()
            .position(|k| k.frame.into_inner() > frame)?;
        let k0 = &self.keyframes[upper - 1];
        let k1 = &self.keyframes[upper];
        let span = k1.frame.into_inner() - k0.frame.into_inner();
        let phase = if span > 0.0 {
            ((frame - k0.frame.into_inner()) / span) as f32
        } else {
            0.0
        };
        Some(interpolate(&k0.value, &k1.value, phase))
    }

    pub fn max_owned_id(&self) -> i32 {
        self.id
    }
}

fn lerp(a: f32, b: f32, phase: f32) -> f32 {
    a + (b - a) * phase
}

fn interpolate(a: &DynValue, b: &DynValue, phase: f32) -> DynValue {
    match (a, b) {
        (DynValue::Float(a), DynValue::Float(b)) => DynValue::Float(lerp(*a, *b, phase)),
        (DynValue::Int(a), DynValue::Int(b)) => {
            DynValue::Int(lerp(*a as f32, *b as f32, phase).round() as i32)
        }
        (DynValue::Vec2(a), DynValue::Vec2(b)) => {
            DynValue::Vec2([lerp(a[0], b[0], phase), lerp(a[1], b[1], phase)])
        }
        (DynValue::Vec4(a), DynValue::Vec4(b)) => DynValue::Vec4([
            lerp(a[0], b[0], phase),
            lerp(a[1], b[1], phase),
            lerp(a[2], b[2], phase),
            lerp(a[3], b[3], phase),
        ]),
        // Mismatched or non-numeric kinds hold the previous keyframe.
        _ => a.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_opacity() -> Attribute {
        let mut attribute = Attribute::new("Opacity", DynValue::Float(0.0));
        attribute.add_keyframe(10.0, DynValue::Float(1.0));
        attribute
    }

    #[test]
    fn test_linear_interpolation_between_keyframes() {
        let attribute = setup_opacity();
        assert_eq!(attribute.value_at(5.0), Some(DynValue::Float(0.5)));
        assert_eq!(attribute.value_at(2.5), Some(DynValue::Float(0.25)));
    }

    #[test]
    fn test_clamps_outside_the_keyframe_range() {
        let attribute = setup_opacity();
        assert_eq!(attribute.value_at(-3.0), Some(DynValue::Float(0.0)));
        assert_eq!(attribute.value_at(99.0), Some(DynValue::Float(1.0)));
    }

    #[test]
    fn test_vector_kinds_interpolate_componentwise() {
        let mut attribute = Attribute::new("Position", DynValue::Vec2([0.0, 100.0]));
        attribute.add_keyframe(4.0, DynValue::Vec2([8.0, 0.0]));
        assert_eq!(
            attribute.value_at(2.0),
            Some(DynValue::Vec2([4.0, 50.0]))
        );
    }

    #[test]
    fn test_non_numeric_kinds_hold_previous() {
        let mut attribute = Attribute::new("Label", DynValue::from("start"));
        attribute.add_keyframe(10.0, DynValue::from("end"));
        assert_eq!(attribute.value_at(9.0), Some(DynValue::from("start")));
        assert_eq!(attribute.value_at(10.0), Some(DynValue::from("end")));
    }

    #[test]
    fn test_same_frame_keyframe_replaces() {
        let mut attribute = setup_opacity();
        attribute.add_keyframe(10.0, DynValue::Float(0.25));
        assert_eq!(attribute.keyframes.len(), 2);
        assert_eq!(attribute.value_at(10.0), Some(DynValue::Float(0.25)));
    }
}
