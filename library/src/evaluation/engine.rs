use crate::evaluation::context::{EvalContext, RenderPass};
use crate::model::composition::Composition;
use crate::model::node::Node;
use crate::model::project::Project;
use crate::model::value::{DynValue, FromDynValue, PinMap};

/// Runs one pass over a composition: finds the entry nodes of every
/// execution chain and executes each chain in node-ID order.
///
/// Compositions outside the playhead or with `enabled` off are skipped
/// entirely. The audio pass additionally requires the composition to have
/// audio enabled and to own at least one mixing node.
pub fn evaluate_composition(ctx: &mut EvalContext<'_>, composition: &Composition) {
    if !composition.enabled {
        return;
    }
    if !composition.contains_frame(ctx.current_frame) {
        return;
    }
    if ctx.pass == RenderPass::Audio
        && !(composition.audio_enabled && composition.does_audio_mixing(&ctx.services.registry))
    {
        return;
    }
    for node_id in entry_nodes(ctx, composition) {
        execute_node(ctx, node_id, &PinMap::new());
    }
}

/// A chain starts at a node whose flow input exists but is fed by nothing.
/// Entries are filtered by pass so audio chains never run during rendering
/// and vice versa.
fn entry_nodes(ctx: &EvalContext<'_>, composition: &Composition) -> Vec<i32> {
    let registry = &ctx.services.registry;
    composition
        .nodes
        .values()
        .filter(|node| {
            let Some(flow_input) = node.flow_input_pin.as_ref() else {
                return false;
            };
            if flow_input.is_connected() {
                return false;
            }
            // A half-wired link in a hand-edited document still disqualifies.
            let fed_by_upstream = composition.nodes.values().any(|other| {
                other
                    .flow_output_pin
                    .as_ref()
                    .is_some_and(|pin| pin.connected_pin_id == flow_input.pin_id)
            });
            if fed_by_upstream {
                return false;
            }
            let Some(descriptor) = registry.descriptor(&node.type_name) else {
                return false;
            };
            match ctx.pass {
                RenderPass::Audio => descriptor.does_audio_mixing,
                RenderPass::Rendering => !descriptor.does_audio_mixing,
            }
        })
        .map(|node| node.node_id)
        .collect()
}

/// Executes one node and everything downstream of its flow output.
///
/// The node's behavior runs with `accumulated` (the outputs of the previous
/// node in the chain), its outputs are published to the pin-value cache, and
/// the chain continues into the flow target with those outputs as the new
/// accumulated map. The returned map is the output of the last node that ran.
///
/// Disabled nodes produce an empty map and stop the chain. Bypassed nodes
/// hand `accumulated` through to their flow target untouched. Re-entering a
/// node that is still being resolved means the graph has a cycle; the pull
/// is dropped with a warning instead of recursing forever.
pub fn execute_node(ctx: &mut EvalContext<'_>, node_id: i32, accumulated: &PinMap) -> PinMap {
    let project = ctx.project;
    let Some(node) = project.node_by_id(node_id) else {
        return PinMap::new();
    };
    if !node.enabled {
        return PinMap::new();
    }

    if node.bypassed {
        let Some(target_id) = flow_target(project, node) else {
            return PinMap::new();
        };
        if !ctx.enter(node_id) {
            ctx.warn(node_id, "graph cycle detected; dropping pull");
            return PinMap::new();
        }
        let result = execute_node(ctx, target_id, accumulated);
        ctx.leave(node_id);
        return result;
    }

    let Some(behavior) = ctx.services.registry.behavior(&node.type_name) else {
        ctx.warn(
            node_id,
            format!("no behavior registered for '{}'", node.type_name),
        );
        return PinMap::new();
    };
    if !ctx.enter(node_id) {
        ctx.warn(node_id, "graph cycle detected; dropping pull");
        return PinMap::new();
    }

    let outputs = behavior.execute(node, ctx, accumulated);
    ctx.count_execution(node_id);
    ctx.services.pin_cache.write_all(&outputs);

    let result = match flow_target(project, node) {
        Some(target_id) if project.node_by_id(target_id).is_some_and(|n| n.enabled) => {
            execute_node(ctx, target_id, &outputs)
        }
        _ => outputs,
    };
    ctx.leave(node_id);
    result
}

fn flow_target(project: &Project, node: &Node) -> Option<i32> {
    let pin = node.flow_output_pin.as_ref()?;
    if !pin.is_connected() {
        return None;
    }
    project
        .node_by_pin(pin.connected_pin_id)
        .map(|target| target.node_id)
}

/// Resolves one attribute of `node` to a value, connections first.
///
/// Resolution order: the accumulated map from the running chain, then a
/// lazy pull on the connected upstream node, then the node's static
/// attribute when the pin is not connected at all. A connection that leads
/// nowhere usable (dangling pin, disabled or bypassed upstream, cycle)
/// yields `None` rather than falling back to the static value, so a broken
/// graph reads as missing data instead of silently using stale defaults.
pub fn dynamic_attribute(
    ctx: &mut EvalContext<'_>,
    node: &Node,
    name: &str,
    accumulated: &PinMap,
) -> Option<DynValue> {
    if !node.enabled || node.bypassed {
        return None;
    }
    let Some(pin) = node.attribute_pin(name) else {
        return node.attributes.get(name).cloned();
    };
    if !pin.is_connected() {
        return node.attributes.get(name).cloned();
    }

    let connected = pin.connected_pin_id;
    if let Some(value) = accumulated.get(&connected) {
        return Some(value.clone());
    }

    let upstream = ctx.project.node_by_pin(connected)?;
    if !upstream.enabled {
        return None;
    }
    let upstream_id = upstream.node_id;
    if !ctx.enter(upstream_id) {
        ctx.warn(upstream_id, "graph cycle detected; dropping pull");
        return None;
    }
    let outputs = execute_behavior_only(ctx, upstream);
    ctx.leave(upstream_id);
    outputs.get(&connected).cloned()
}

/// Pull-driven execution: runs just the node's behavior with an empty
/// accumulated map and no flow continuation.
fn execute_behavior_only(ctx: &mut EvalContext<'_>, node: &Node) -> PinMap {
    if !node.enabled || node.bypassed {
        return PinMap::new();
    }
    let Some(behavior) = ctx.services.registry.behavior(&node.type_name) else {
        ctx.warn(
            node.node_id,
            format!("no behavior registered for '{}'", node.type_name),
        );
        return PinMap::new();
    };
    let outputs = behavior.execute(node, ctx, &PinMap::new());
    ctx.count_execution(node.node_id);
    ctx.services.pin_cache.write_all(&outputs);
    outputs
}

/// Typed variant of [`dynamic_attribute`]. The value must carry exactly the
/// requested kind; no coercion happens between numeric kinds.
pub fn attribute<T: FromDynValue>(
    ctx: &mut EvalContext<'_>,
    node: &Node,
    name: &str,
    accumulated: &PinMap,
) -> Option<T> {
    dynamic_attribute(ctx, node, name, accumulated).and_then(|value| value.get_as::<T>())
}
