//! GLSL sources for the compositor's fixed passes. All passes draw a single
//! oversized triangle and derive texture coordinates from it, so no vertex
//! buffers are ever bound.

/// Vertex stage shared by every compositor pass.
pub const FULLSCREEN_VERTEX: &str = r#"#version 310 es
precision highp float;

out vec2 vUV;

void main() {
    vec2 position = vec2(float((gl_VertexID << 1) & 2), float(gl_VertexID & 2));
    vUV = position;
    gl_Position = vec4(position * 2.0 - 1.0, 0.0, 1.0);
}
"#;

/// Layer draw: samples the layer color (optionally remapped through a UV
/// attachment), applies the accumulated mask and the layer opacity.
pub const COMPOSITOR_FRAGMENT: &str = r#"#version 310 es
precision highp float;

uniform sampler2D uColor;
uniform sampler2D uUV;
uniform sampler2D uMask;
uniform vec2 uResolution;
uniform float uOpacity;
uniform int uHasUV;
uniform int uMaskAvailable;

in vec2 vUV;
out vec4 fragColor;

void main() {
    vec2 uv = vUV;
    if (uHasUV == 1) {
        uv = texture(uUV, vUV).xy;
    }
    vec4 color = texture(uColor, uv);
    if (uMaskAvailable == 1) {
        color.a *= texture(uMask, vUV).a;
    }
    fragColor = color * uOpacity;
}
"#;

/// Combines two mask textures according to `uMaskOperation`; operation
/// indices follow the mask operation order (add, subtract, multiply,
/// divide). The normal operation never reaches this pass.
pub const MASK_COMBINE_FRAGMENT: &str = r#"#version 310 es
precision highp float;

uniform sampler2D uA;
uniform sampler2D uB;
uniform int uMaskOperation;

in vec2 vUV;
out vec4 fragColor;

void main() {
    vec4 a = texture(uA, vUV);
    vec4 b = texture(uB, vUV);
    vec4 result = b;
    if (uMaskOperation == 1) result = clamp(a + b, 0.0, 1.0);
    if (uMaskOperation == 2) result = clamp(a - b, 0.0, 1.0);
    if (uMaskOperation == 3) result = a * b;
    if (uMaskOperation == 4) result = a / max(b, vec4(0.0001));
    fragColor = result;
}
"#;

/// Marker the generated blend-mode dispatch replaces.
pub const BLENDING_PLACEHOLDER: &str = "//__BLENDING_CODE__";

/// Blend pass template. One `if (uBlendMode == N) return (formula);` line
/// per registered mode is substituted for [`BLENDING_PLACEHOLDER`].
pub const BLENDING_FRAGMENT_TEMPLATE: &str = r#"#version 310 es
precision highp float;

uniform sampler2D uBase;
uniform sampler2D uBlend;
uniform vec2 uResolution;
uniform int uBlendMode;
uniform float uOpacity;

in vec2 vUV;
out vec4 fragColor;

vec4 applyBlending(vec4 base, vec4 blend) {
//__BLENDING_CODE__
    return blend;
}

void main() {
    vec4 base = texture(uBase, vUV);
    vec4 blend = texture(uBlend, vUV);
    fragColor = mix(base, applyBlending(base, blend), uOpacity * blend.a);
}
"#;
