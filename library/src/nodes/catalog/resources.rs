use super::try_append;
use crate::evaluation::context::EvalContext;
use crate::evaluation::engine;
use crate::model::node::Node;
use crate::model::value::{DynValue, PinMap};
use crate::nodes::registry::{NodeBehavior, NodeCategory, NodeDescriptor, NodeRegistry};

/// Decodes an image from disk (through the shared cache) and turns it into
/// a GPU texture via the async uploader.
///
/// The lifecycle runs at most once per pass: retire state when the path
/// changed, kick off a load when nothing is in flight, then poll the ticket.
/// Until the upload lands the node simply produces nothing.
struct ReadImage;

impl NodeBehavior for ReadImage {
    fn execute(&self, node: &Node, ctx: &mut EvalContext<'_>, accumulated: &PinMap) -> PinMap {
        let mut outputs = PinMap::new();
        let services = ctx.services;
        let path =
            engine::attribute::<String>(ctx, node, "Path", accumulated).unwrap_or_default();
        let pass_id = ctx.pass_id;
        let scratch = ctx.scratch.entry(node.node_id);

        if scratch.last_pass_id != Some(pass_id) {
            scratch.last_pass_id = Some(pass_id);

            if scratch.image_path.as_deref() != Some(path.as_str()) {
                if let Some(texture) = scratch.texture.take() {
                    services.uploader.delete_texture(texture);
                }
                if let Some(upload) = scratch.upload.take() {
                    services.uploader.destroy_upload(upload);
                }
                scratch.image_path = Some(path.clone());
            }

            if scratch.texture.is_none() && scratch.upload.is_none() && !path.is_empty() {
                match services.image_cache.load(&path) {
                    Ok(image) => {
                        scratch.upload =
                            Some(services.uploader.generate_texture_from_image(image));
                    }
                    Err(e) => {
                        services
                            .diagnostics
                            .warn(node.node_id, format!("could not read '{}': {}", path, e));
                    }
                }
            }

            if let Some(upload) = scratch.upload {
                if services.uploader.upload_failed(upload) {
                    services.uploader.destroy_upload(upload);
                    scratch.upload = None;
                    services
                        .diagnostics
                        .warn(node.node_id, format!("upload of '{}' failed", path));
                } else if services.uploader.is_upload_ready(upload) {
                    scratch.texture = services.uploader.get_upload(upload);
                    services.uploader.destroy_upload(upload);
                    scratch.upload = None;
                }
            }
        }

        if let Some(texture) = &scratch.texture {
            try_append(&mut outputs, node, "Texture", DynValue::Texture(texture.clone()));
        }
        outputs
    }
}

pub(super) fn register(registry: &mut NodeRegistry) {
    registry.register(
        NodeDescriptor::new("resource.read_image", "Read Image", NodeCategory::Resources)
            .with_outputs(vec!["Texture"])
            .with_defaults(vec![("Path", DynValue::String(String::new()))]),
        ReadImage,
    );
}
