use super::try_append;
use crate::evaluation::context::EvalContext;
use crate::evaluation::engine;
use crate::model::node::Node;
use crate::model::value::{DynValue, PinMap};
use crate::nodes::registry::{NodeBehavior, NodeCategory, NodeDescriptor, NodeRegistry};

#[derive(Clone, Copy, Debug)]
enum MathOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl MathOp {
    fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            MathOp::Add => a + b,
            MathOp::Subtract => a - b,
            MathOp::Multiply => a * b,
            MathOp::Divide => a / b,
        }
    }
}

/// Kind-dispatched binary arithmetic. Vectors combine componentwise with a
/// vector of the same kind or broadcast against a scalar on the right;
/// anything else, integers included, produces no value.
fn binary(op: MathOp, a: &DynValue, b: &DynValue) -> Option<DynValue> {
    match (a, b) {
        (DynValue::Float(a), DynValue::Float(b)) => Some(DynValue::Float(op.apply(*a, *b))),
        (DynValue::Vec2(a), DynValue::Float(b)) => {
            Some(DynValue::Vec2([op.apply(a[0], *b), op.apply(a[1], *b)]))
        }
        (DynValue::Vec2(a), DynValue::Vec2(b)) => {
            Some(DynValue::Vec2([op.apply(a[0], b[0]), op.apply(a[1], b[1])]))
        }
        (DynValue::Vec4(a), DynValue::Float(b)) => Some(DynValue::Vec4([
            op.apply(a[0], *b),
            op.apply(a[1], *b),
            op.apply(a[2], *b),
            op.apply(a[3], *b),
        ])),
        (DynValue::Vec4(a), DynValue::Vec4(b)) => Some(DynValue::Vec4([
            op.apply(a[0], b[0]),
            op.apply(a[1], b[1]),
            op.apply(a[2], b[2]),
            op.apply(a[3], b[3]),
        ])),
        _ => None,
    }
}

/// Applies `f` to every component of a scalar or vector kind.
fn map_components(value: &DynValue, f: impl Fn(f32) -> f32) -> Option<DynValue> {
    match value {
        DynValue::Float(v) => Some(DynValue::Float(f(*v))),
        DynValue::Vec2(v) => Some(DynValue::Vec2([f(v[0]), f(v[1])])),
        DynValue::Vec4(v) => Some(DynValue::Vec4([f(v[0]), f(v[1]), f(v[2]), f(v[3])])),
        _ => None,
    }
}

fn mix(a: &DynValue, b: &DynValue, phase: f32) -> Option<DynValue> {
    match (a, b) {
        (DynValue::Float(a), DynValue::Float(b)) => Some(DynValue::Float(a + (b - a) * phase)),
        (DynValue::Vec2(a), DynValue::Vec2(b)) => Some(DynValue::Vec2([
            a[0] + (b[0] - a[0]) * phase,
            a[1] + (b[1] - a[1]) * phase,
        ])),
        (DynValue::Vec4(a), DynValue::Vec4(b)) => Some(DynValue::Vec4([
            a[0] + (b[0] - a[0]) * phase,
            a[1] + (b[1] - a[1]) * phase,
            a[2] + (b[2] - a[2]) * phase,
            a[3] + (b[3] - a[3]) * phase,
        ])),
        _ => None,
    }
}

struct BinaryMath {
    op: MathOp,
}

impl NodeBehavior for BinaryMath {
    fn execute(&self, node: &Node, ctx: &mut EvalContext<'_>, accumulated: &PinMap) -> PinMap {
        let mut outputs = PinMap::new();
        let a = engine::dynamic_attribute(ctx, node, "A", accumulated);
        let b = engine::dynamic_attribute(ctx, node, "B", accumulated);
        if let (Some(a), Some(b)) = (a, b) {
            if let Some(value) = binary(self.op, &a, &b) {
                try_append(&mut outputs, node, "Value", value);
            }
        }
        outputs
    }
}

struct MixValues;

impl NodeBehavior for MixValues {
    fn execute(&self, node: &Node, ctx: &mut EvalContext<'_>, accumulated: &PinMap) -> PinMap {
        let mut outputs = PinMap::new();
        let a = engine::dynamic_attribute(ctx, node, "A", accumulated);
        let b = engine::dynamic_attribute(ctx, node, "B", accumulated);
        let phase = engine::attribute::<f32>(ctx, node, "Phase", accumulated);
        if let (Some(a), Some(b), Some(phase)) = (a, b, phase) {
            if let Some(value) = mix(&a, &b, phase) {
                try_append(&mut outputs, node, "Value", value);
            }
        }
        outputs
    }
}

/// sin(Input) * MultiplyBy, componentwise.
struct SineWave;

impl NodeBehavior for SineWave {
    fn execute(&self, node: &Node, ctx: &mut EvalContext<'_>, accumulated: &PinMap) -> PinMap {
        let mut outputs = PinMap::new();
        let input = engine::dynamic_attribute(ctx, node, "Input", accumulated);
        let multiply_by = engine::dynamic_attribute(ctx, node, "MultiplyBy", accumulated);
        if let (Some(input), Some(multiply_by)) = (input, multiply_by) {
            if let Some(value) = map_components(&input, f32::sin)
                .and_then(|sine| binary(MathOp::Multiply, &sine, &multiply_by))
            {
                try_append(&mut outputs, node, "Value", value);
            }
        }
        outputs
    }
}

struct Absolute;

impl NodeBehavior for Absolute {
    fn execute(&self, node: &Node, ctx: &mut EvalContext<'_>, accumulated: &PinMap) -> PinMap {
        let mut outputs = PinMap::new();
        if let Some(value) = engine::dynamic_attribute(ctx, node, "Input", accumulated)
            .as_ref()
            .and_then(|input| map_components(input, f32::abs))
        {
            try_append(&mut outputs, node, "Value", value);
        }
        outputs
    }
}

fn binary_descriptor(type_name: &str, display_name: &str) -> NodeDescriptor {
    NodeDescriptor::new(type_name, display_name, NodeCategory::Math)
        .with_inputs(vec!["A", "B"])
        .with_outputs(vec!["Value"])
        .with_defaults(vec![
            ("A", DynValue::Float(1.0)),
            ("B", DynValue::Float(1.0)),
        ])
}

pub(super) fn register(registry: &mut NodeRegistry) {
    registry.register(
        binary_descriptor("math.add", "Add"),
        BinaryMath { op: MathOp::Add },
    );
    registry.register(
        binary_descriptor("math.subtract", "Subtract"),
        BinaryMath {
            op: MathOp::Subtract,
        },
    );
    registry.register(
        binary_descriptor("math.multiply", "Multiply"),
        BinaryMath {
            op: MathOp::Multiply,
        },
    );
    registry.register(
        binary_descriptor("math.divide", "Divide"),
        BinaryMath {
            op: MathOp::Divide,
        },
    );
    registry.register(
        NodeDescriptor::new("math.mix", "Mix", NodeCategory::Math)
            .with_inputs(vec!["A", "B", "Phase"])
            .with_outputs(vec!["Value"])
            .with_defaults(vec![
                ("A", DynValue::Float(0.0)),
                ("B", DynValue::Float(1.0)),
                ("Phase", DynValue::Float(0.5)),
            ]),
        MixValues,
    );
    registry.register(
        NodeDescriptor::new("math.sine", "Sine", NodeCategory::Math)
            .with_inputs(vec!["Input", "MultiplyBy"])
            .with_outputs(vec!["Value"])
            .with_defaults(vec![
                ("Input", DynValue::Float(0.0)),
                ("MultiplyBy", DynValue::Float(1.0)),
            ]),
        SineWave,
    );
    registry.register(
        NodeDescriptor::new("math.absolute", "Absolute", NodeCategory::Math)
            .with_inputs(vec!["Input"])
            .with_outputs(vec!["Value"])
            .with_defaults(vec![("Input", DynValue::Float(1.0))]),
        Absolute,
    );
}
