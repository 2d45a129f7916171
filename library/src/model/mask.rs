use serde::{Deserialize, Serialize};

/// How a mask combines with the masks already accumulated for a target.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MaskOperation {
    #[default]
    Normal,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl MaskOperation {
    /// Index handed to the mask shader's operation uniform.
    pub fn index(&self) -> i32 {
        match self {
            MaskOperation::Normal => 0,
            MaskOperation::Add => 1,
            MaskOperation::Subtract => 2,
            MaskOperation::Multiply => 3,
            MaskOperation::Divide => 4,
        }
    }
}

/// Another composition's output used to gate this composition's pixels
/// during final composition.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CompositionMask {
    /// Composition whose renderable bundle supplies the mask texture.
    pub composition_id: i32,
    pub operation: MaskOperation,
    /// When set, the mask composition is flattened before sampling.
    #[serde(default)]
    pub precompose: bool,
}

impl CompositionMask {
    pub fn new(composition_id: i32, operation: MaskOperation) -> Self {
        Self {
            composition_id,
            operation,
            precompose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_indices_are_stable() {
        assert_eq!(MaskOperation::Normal.index(), 0);
        assert_eq!(MaskOperation::Add.index(), 1);
        assert_eq!(MaskOperation::Subtract.index(), 2);
        assert_eq!(MaskOperation::Multiply.index(), 3);
        assert_eq!(MaskOperation::Divide.index(), 4);
    }

    #[test]
    fn test_serde_uses_lowercase_operation_names() {
        let mask = CompositionMask::new(7, MaskOperation::Multiply);
        let json = serde_json::to_string(&mask).unwrap();
        assert!(json.contains("\"multiply\""));
        let back: CompositionMask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mask);
    }
}
