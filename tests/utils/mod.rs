// Shared helpers for integration tests
//
// Builds MobileNetV2 subnet configs and benchmark result documents shaped like
// what the search space exports and the benchmark service returns.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::fs;
use std::path::Path;

/// (in_channels, out_channels, mid_channels, kernel, stride, shortcut)
pub type BlockArgs = (usize, usize, Option<usize>, usize, usize, bool);

pub fn mbv2_config(
    stem_out: usize,
    blocks: &[BlockArgs],
    mix_out: Option<usize>,
    classes: usize,
) -> Value {
    let blocks: Vec<Value> = blocks
        .iter()
        .map(|&(in_c, out_c, mid, ks, stride, shortcut)| {
            let shortcut = if shortcut {
                json!({"name": "IdentityLayer", "in_channels": [in_c], "out_channels": [out_c]})
            } else {
                Value::Null
            };
            json!({
                "mobile_inverted_conv": {
                    "name": "MBConvLayer",
                    "in_channels": in_c,
                    "out_channels": out_c,
                    "kernel_size": ks,
                    "stride": stride,
                    "mid_channels": mid,
                },
                "shortcut": shortcut,
            })
        })
        .collect();

    let last = blocks
        .last()
        .and_then(|b| b["mobile_inverted_conv"]["out_channels"].as_u64())
        .map(|c| c as usize)
        .unwrap_or(stem_out);
    let mix = mix_out.map(|out| json!({"in_channels": last, "out_channels": out}));
    let features = mix_out.unwrap_or(last);

    json!({
        "name": "MobileNetV2",
        "first_conv": {"in_channels": 3, "out_channels": stem_out, "kernel_size": 3, "stride": 2},
        "blocks": blocks,
        "feature_mix_layer": mix,
        "classifier": {"in_features": features, "out_features": classes},
    })
}

pub fn benchmark_result(events: &[(&str, f64)]) -> Value {
    let nodes: Vec<Value> = events
        .iter()
        .map(|(name, ms)| {
            json!({
                "name": format!("node_{}", name.to_lowercase()),
                "description": name,
                "exec_time": {"duration_ms": ms, "cycles": 0},
            })
        })
        .collect();
    json!({"benchmark": {"info": {"graphs": [{"nodes": nodes}]}}, "benchmarkId": "test"})
}

/// Lay out one model the way the benchmark tooling does
pub fn write_model(
    models: &Path,
    results: &Path,
    stem: &str,
    config: &Value,
    result: Option<&Value>,
) {
    fs::write(models.join(format!("{}.tflite", stem)), b"TFL3").unwrap();
    fs::write(models.join(format!("{}.json", stem)), config.to_string()).unwrap();
    if let Some(result) = result {
        fs::write(results.join(format!("{}.json", stem)), result.to_string()).unwrap();
    }
}
