// ============================================================================
// GPU SHADERS — all WGSL code kept inline for containment
// ============================================================================
//
// The three histogram-equalization kernels share one uniform layout
// (`HistogramInfo`, 48 bytes) and one buffer layout: 1024 words, channel
// major, 256 bins per channel in R, G, B, A order.
// ============================================================================

/// Histogram accumulation.  One invocation per pixel, atomic adds into the
/// 1024-word histogram buffer.  Alpha is binned only when `include_alpha`.
pub const HISTOGRAM_SHADER: &str = r#"
struct HistogramInfo {
    min_value:     vec4<f32>,
    max_value:     vec4<f32>,
    entries:       u32,
    include_alpha: u32,
    width:         u32,
    height:        u32,
};

const BINS: u32 = 256u;

@group(0) @binding(0) var source_tex: texture_2d<f32>;
@group(0) @binding(1) var<storage, read_write> histogram: array<atomic<u32>, 1024>;
@group(0) @binding(2) var<uniform> info: HistogramInfo;

fn bin_of(v: vec4<f32>) -> vec4<u32> {
    let span = max(info.max_value - info.min_value, vec4<f32>(1e-6));
    let t = clamp((v - info.min_value) / span, vec4<f32>(0.0), vec4<f32>(1.0));
    let last = f32(info.entries - 1u);
    return vec4<u32>(min(floor(t * f32(info.entries)), vec4<f32>(last)));
}

@compute @workgroup_size(16, 16)
fn cs_histogram(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= info.width || gid.y >= info.height) { return; }

    let px = textureLoad(source_tex, vec2<u32>(gid.x, gid.y), 0);
    let b = bin_of(px);

    atomicAdd(&histogram[b.x], 1u);
    atomicAdd(&histogram[BINS + b.y], 1u);
    atomicAdd(&histogram[2u * BINS + b.z], 1u);
    if (info.include_alpha != 0u) {
        atomicAdd(&histogram[3u * BINS + b.w], 1u);
    }
}
"#;

/// Equalization transform.  One workgroup per channel, one invocation per
/// bin.  Each invocation walks the channel's histogram to get its own CDF
/// value, the first non-zero CDF value and the total, then writes
///   lut[i] = floor((cdf[i] - cdf_min) / (total - cdf_min) * 255 + 0.5)
/// Single-valued channels (total == cdf_min) and an excluded alpha channel
/// get the identity.
pub const EQUALIZATION_TRANSFORM_SHADER: &str = r#"
struct HistogramInfo {
    min_value:     vec4<f32>,
    max_value:     vec4<f32>,
    entries:       u32,
    include_alpha: u32,
    width:         u32,
    height:        u32,
};

const BINS: u32 = 256u;

@group(0) @binding(0) var<storage, read> histogram: array<u32, 1024>;
@group(0) @binding(1) var<storage, read_write> lut: array<u32, 1024>;
@group(0) @binding(2) var<uniform> info: HistogramInfo;

@compute @workgroup_size(256)
fn cs_equalization_transform(
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(local_invocation_id) lid: vec3<u32>,
) {
    let c = wid.x;
    let i = lid.x;
    let base = c * BINS;

    if (c == 3u && info.include_alpha == 0u) {
        lut[base + i] = i;
        return;
    }

    var total = 0u;
    var cdf_min = 0u;
    var cdf_i = 0u;
    for (var k = 0u; k < BINS; k = k + 1u) {
        total = total + histogram[base + k];
        if (cdf_min == 0u) { cdf_min = total; }
        if (k == i) { cdf_i = total; }
    }

    if (total <= cdf_min) {
        lut[base + i] = i;
        return;
    }

    let num = f32(select(0u, cdf_i - cdf_min, cdf_i > cdf_min));
    let v = floor(num / f32(total - cdf_min) * 255.0 + 0.5);
    lut[base + i] = u32(clamp(v, 0.0, 255.0));
}
"#;

/// Apply the per-channel transform.  Reads the source texel, finds its bin,
/// looks the bin up in the channel's LUT and writes the destination texel.
/// Channels excluded from the histogram pass through unchanged.
pub const EQUALIZATION_APPLY_SHADER: &str = r#"
struct HistogramInfo {
    min_value:     vec4<f32>,
    max_value:     vec4<f32>,
    entries:       u32,
    include_alpha: u32,
    width:         u32,
    height:        u32,
};

const BINS: u32 = 256u;

@group(0) @binding(0) var source_tex: texture_2d<f32>;
@group(0) @binding(1) var dest_tex: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(2) var<storage, read> lut: array<u32, 1024>;
@group(0) @binding(3) var<uniform> info: HistogramInfo;

fn bin_of(v: vec4<f32>) -> vec4<u32> {
    let span = max(info.max_value - info.min_value, vec4<f32>(1e-6));
    let t = clamp((v - info.min_value) / span, vec4<f32>(0.0), vec4<f32>(1.0));
    let last = f32(info.entries - 1u);
    return vec4<u32>(min(floor(t * f32(info.entries)), vec4<f32>(last)));
}

@compute @workgroup_size(16, 16)
fn cs_equalization_apply(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= info.width || gid.y >= info.height) { return; }

    let coord = vec2<u32>(gid.x, gid.y);
    let px = textureLoad(source_tex, coord, 0);
    let b = bin_of(px);

    let level = vec4<f32>(
        f32(lut[b.x]),
        f32(lut[BINS + b.y]),
        f32(lut[2u * BINS + b.z]),
        f32(lut[3u * BINS + b.w]),
    ) / 255.0;
    var out = info.min_value + level * (info.max_value - info.min_value);
    if (info.include_alpha == 0u) {
        out.a = px.a;
    }

    textureStore(dest_tex, coord, clamp(out, vec4<f32>(0.0), vec4<f32>(1.0)));
}
"#;
