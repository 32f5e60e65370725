//! Property-based tests for key construction, attribution and aggregation

mod utils;

use latency_lut::aggregate::aggregate;
use latency_lut::attribution::{attribute, round_latency, ModelLatencyTable};
use latency_lut::family::{family_for, LatencyTableFamily, LayerOps};
use latency_lut::layer_key::{
    decomposition_tag, encode, BlockParams, LayerKey, Shape, PARAMETRIZED_LAYER,
};
use latency_lut::trace::TraceEvent;
use proptest::prelude::*;
use utils::{mbv2_config, BlockArgs};

fn block_args() -> impl Strategy<Value = BlockArgs> {
    (
        1usize..128,
        1usize..128,
        prop::option::of(1usize..512),
        prop::sample::select(vec![3usize, 5, 7]),
        1usize..=2,
        any::<bool>(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_key_list_deterministic(
        stem in 1usize..64,
        blocks in prop::collection::vec(block_args(), 0..12),
        mix in prop::option::of(1usize..2048),
        input in (1usize..300, 1usize..300),
    ) {
        let family = family_for("mobilenetv2", input, None).unwrap();
        let config = mbv2_config(stem, &blocks, mix, 1000);

        let first = family.build_key_list(&config).unwrap();
        let second = family.build_key_list(&config).unwrap();
        prop_assert_eq!(&first, &second);

        // stem + blocks + optional mix + pool + classifier
        let expected_len = 1 + blocks.len() + usize::from(mix.is_some()) + 2;
        prop_assert_eq!(first.len(), expected_len);

        // exactly one first-block flag when any block exists
        let flagged = first.iter().filter(|l| l.first_residual_block).count();
        prop_assert_eq!(flagged, usize::from(!blocks.is_empty()));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_tag_recovered_from_encoded_key(
        h in 1usize..256,
        w in 1usize..256,
        c_in in 1usize..512,
        c_out in 1usize..512,
        expand in 1usize..1024,
        kernel in 1usize..8,
        stride in 1usize..4,
        id_skip in any::<bool>(),
        plain_type in prop::sample::select(vec!["Conv", "Conv_1", "AvgPool2D", "Logits"]),
    ) {
        let params = BlockParams { expand, kernel, stride, id_skip };
        let key = encode(
            PARAMETRIZED_LAYER,
            &Shape::hwc(h, w, c_in),
            &Shape::hwc(h, w, c_out),
            Some(&params),
        ).unwrap();

        prop_assert_eq!(
            decomposition_tag(&key, false).unwrap(),
            format!("expanded_conv-stride:{}-idskip:{}", stride, u8::from(id_skip))
        );
        prop_assert_eq!(decomposition_tag(&key, true).unwrap(), "block0");
        prop_assert_eq!(key.decode().unwrap().params, Some(params));

        let plain = encode(plain_type, &Shape::hwc(h, w, c_in), &Shape::flat(c_out), None).unwrap();
        prop_assert_eq!(decomposition_tag(&plain, false).unwrap(), plain_type);
    }
}

/// Expected landmarks drawn from one alphabet, noise from a disjoint one
fn landmark_layer() -> impl Strategy<Value = (Vec<String>, Vec<Vec<(String, f64)>>)> {
    prop::collection::vec(prop::sample::select(vec!["Conv2D", "Pad", "Pool", "Eltwise"]), 1..6)
        .prop_flat_map(|expected| {
            let n = expected.len();
            let noise = prop::collection::vec(
                prop::collection::vec(
                    (prop::sample::select(vec!["Transpose", "Reshape", "Nop"]), 0.0f64..5.0),
                    0..4,
                ),
                n,
            );
            (Just(expected), noise)
        })
        .prop_map(|(expected, noise)| {
            let expected: Vec<String> = expected.into_iter().map(String::from).collect();
            let noise: Vec<Vec<(String, f64)>> = noise
                .into_iter()
                .map(|gap| gap.into_iter().map(|(name, ms)| (name.to_string(), ms)).collect())
                .collect();
            (expected, noise)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_attribution_consumes_through_last_landmark(
        (expected, noise) in landmark_layer(),
        landmark_ms in prop::collection::vec(0.0f64..5.0, 6),
        tail in prop::collection::vec(
            (prop::sample::select(vec!["Conv2D", "Pool", "Nop"]), 0.0f64..5.0),
            0..5,
        ),
    ) {
        let mut trace = Vec::new();
        let mut expected_sum = 0.0f64;
        for (i, name) in expected.iter().enumerate() {
            for (noise_name, ms) in &noise[i] {
                trace.push(TraceEvent::new(noise_name.clone(), *ms));
                expected_sum += ms;
            }
            trace.push(TraceEvent::new(name.clone(), landmark_ms[i]));
            expected_sum += landmark_ms[i];
        }
        let consumed = trace.len();
        for (name, ms) in &tail {
            trace.push(TraceEvent::new(*name, *ms));
        }

        let key = LayerKey::from("layer");
        let layers = [LayerOps { key: &key, operators: &expected }];
        let report = attribute(&layers, &trace).unwrap();

        prop_assert_eq!(report.consumed_events, consumed);
        prop_assert_eq!(report.trailing_events, tail.len());
        prop_assert_eq!(report.table.get("layer"), Some(round_latency(expected_sum)));
    }

    #[test]
    fn prop_attribution_fails_when_landmark_missing(
        expected in prop::collection::vec(prop::sample::select(vec!["Conv2D", "Pool"]), 1..5),
        noise in prop::collection::vec(
            (prop::sample::select(vec!["Transpose", "Nop"]), 0.0f64..5.0),
            0..20,
        ),
    ) {
        let expected: Vec<String> = expected.into_iter().map(String::from).collect();
        let trace: Vec<TraceEvent> = noise
            .iter()
            .map(|(name, ms)| TraceEvent::new(*name, *ms))
            .collect();

        let key = LayerKey::from("layer");
        let layers = [LayerOps { key: &key, operators: &expected }];
        prop_assert!(attribute(&layers, &trace).is_err());
    }
}

fn model_tables() -> impl Strategy<Value = Vec<ModelLatencyTable>> {
    prop::collection::vec(
        prop::collection::btree_map(
            prop::sample::select(vec!["Conv", "block", "Conv_1", "AvgPool2D", "Logits"]),
            0.0f64..100.0,
            0..5,
        ),
        0..8,
    )
    .prop_map(|models| {
        models
            .into_iter()
            .map(|m| {
                m.into_iter()
                    .map(|(k, v)| (LayerKey::from(k), round_latency(v)))
                    .collect::<ModelLatencyTable>()
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_aggregate_order_independent(tables in model_tables(), rotate in 0usize..8) {
        let forward = aggregate(tables.iter());
        let backward = aggregate(tables.iter().rev());
        prop_assert_eq!(&forward, &backward);

        let mut rotated = tables.clone();
        if !rotated.is_empty() {
            let by = rotate % rotated.len();
            rotated.rotate_left(by);
        }
        prop_assert_eq!(&forward, &aggregate(rotated.iter()));
    }

    #[test]
    fn prop_aggregate_single_model_identity(tables in model_tables()) {
        if let Some(model) = tables.first() {
            let result = aggregate([model]);
            prop_assert_eq!(result.len(), model.len());
            for (key, latency) in model {
                let stats = result.get(key.as_str()).unwrap();
                prop_assert_eq!(stats.count, 1);
                prop_assert_eq!(stats.mean, *latency);
                prop_assert_eq!(stats.std, 0.0);
            }
        }
    }

    #[test]
    fn prop_aggregate_counts_match_presence(tables in model_tables()) {
        let result = aggregate(tables.iter());
        for (key, stats) in result.iter() {
            let present = tables.iter().filter(|t| t.get(key.as_str()).is_some()).count();
            prop_assert_eq!(stats.count, present);
            prop_assert!(stats.std >= 0.0);
        }
    }
}
