// MobileNetV2 search space (once-for-all style subnet configs)
//
// Layer order on the STM32 runtime: stem conv, inverted-residual blocks,
// optional feature-mix 1x1 conv, global average pool, classifier.

use super::{LatencyTableFamily, PlannedLayer};
use crate::decomposition::OperatorRegistry;
use crate::error::{LutError, Result};
use crate::layer_key::{encode, BlockParams, Shape, PARAMETRIZED_LAYER};
use serde::{Deserialize, Deserializer};

/// Subnet config as exported by the search space
#[derive(Debug, Clone, Deserialize)]
pub struct Mbv2Config {
    pub first_conv: ConvStage,
    pub blocks: Vec<BlockConfig>,
    #[serde(default)]
    pub feature_mix_layer: Option<ConvStage>,
    pub classifier: ClassifierStage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConvStage {
    pub in_channels: usize,
    pub out_channels: usize,
    /// Stem must be stride 2 and feature mix stride 1 when given
    #[serde(default)]
    pub stride: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockConfig {
    /// `None` for identity blocks that carry no convolution
    #[serde(default)]
    pub mobile_inverted_conv: Option<MbConvConfig>,
    #[serde(default)]
    pub shortcut: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MbConvConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    /// Outer `None`: field absent. Inner `None`: explicit null.
    #[serde(default, deserialize_with = "present")]
    pub mid_channels: Option<Option<usize>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierStage {
    pub in_features: usize,
    pub out_features: usize,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<usize>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<usize>::deserialize(deserializer).map(Some)
}

const STEM_STRIDE: usize = 2;

/// Stride-2 stem: `ceil(input / 2)`
fn halve(dim: usize) -> usize {
    (dim + 1) / 2
}

fn strided(dim: usize, stride: usize) -> usize {
    (dim - 1) / stride + 1
}

/// Key-list builder for MobileNetV2 subnets
#[derive(Debug, Clone)]
pub struct MobileNetV2Family {
    input_shape: (usize, usize),
    registry: OperatorRegistry,
}

impl MobileNetV2Family {
    /// Create a builder for networks fed `(height, width)` inputs
    pub fn new(input_shape: (usize, usize)) -> Result<Self> {
        if input_shape.0 == 0 || input_shape.1 == 0 {
            return Err(LutError::InvalidConfig(format!(
                "input shape must be non-zero, got {}x{}",
                input_shape.0, input_shape.1
            )));
        }
        Ok(Self {
            input_shape,
            registry: OperatorRegistry::mobilenetv2(),
        })
    }

    pub fn with_registry(mut self, registry: OperatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Walk a typed config and emit keys in execution order
    pub fn key_list(&self, cfg: &Mbv2Config) -> Result<Vec<PlannedLayer>> {
        if let Some(stride) = cfg.first_conv.stride.filter(|&s| s != STEM_STRIDE) {
            return Err(LutError::UnsupportedLayerConfig(format!(
                "first_conv stride must be {}, got {}",
                STEM_STRIDE, stride
            )));
        }

        let (in_h, in_w) = self.input_shape;
        let (mut h, mut w) = (halve(in_h), halve(in_w));
        let mut layers = Vec::with_capacity(cfg.blocks.len() + 4);

        layers.push(PlannedLayer::new(encode(
            "Conv",
            &Shape::hwc(in_h, in_w, cfg.first_conv.in_channels),
            &Shape::hwc(h, w, cfg.first_conv.out_channels),
            None,
        )?));

        let mut channels = cfg.first_conv.out_channels;
        let mut first_block_pending = true;

        for (index, block) in cfg.blocks.iter().enumerate() {
            let Some(conv) = &block.mobile_inverted_conv else {
                continue;
            };

            if conv.stride == 0 {
                return Err(LutError::UnsupportedLayerConfig(format!(
                    "block {} has stride 0",
                    index
                )));
            }

            let expand = match conv.mid_channels {
                Some(Some(mid)) => mid,
                Some(None) => conv.out_channels,
                None => {
                    return Err(LutError::UnsupportedLayerConfig(format!(
                        "block {} has no mid_channels field",
                        index
                    )))
                }
            };

            let (out_h, out_w) = (strided(h, conv.stride), strided(w, conv.stride));
            let params = BlockParams {
                expand,
                kernel: conv.kernel_size,
                stride: conv.stride,
                id_skip: block.shortcut.is_some(),
            };
            let key = encode(
                PARAMETRIZED_LAYER,
                &Shape::hwc(h, w, conv.in_channels),
                &Shape::hwc(out_h, out_w, conv.out_channels),
                Some(&params),
            )?;

            layers.push(PlannedLayer {
                key,
                first_residual_block: first_block_pending,
            });
            first_block_pending = false;

            h = out_h;
            w = out_w;
            channels = conv.out_channels;
        }

        let mut pool_channels = channels;
        if let Some(mix) = &cfg.feature_mix_layer {
            if let Some(stride) = mix.stride.filter(|&s| s != 1) {
                return Err(LutError::UnsupportedLayerConfig(format!(
                    "feature_mix_layer stride must be 1, got {}",
                    stride
                )));
            }
            layers.push(PlannedLayer::new(encode(
                "Conv_1",
                &Shape::hwc(h, w, mix.in_channels),
                &Shape::hwc(h, w, mix.out_channels),
                None,
            )?));
            pool_channels = mix.out_channels;
        }

        layers.push(PlannedLayer::new(encode(
            "AvgPool2D",
            &Shape::hwc(h, w, pool_channels),
            &Shape::hwc(1, 1, pool_channels),
            None,
        )?));

        layers.push(PlannedLayer::new(encode(
            "Logits",
            &Shape::hwc(1, 1, cfg.classifier.in_features),
            &Shape::flat(cfg.classifier.out_features),
            None,
        )?));

        Ok(layers)
    }
}

impl LatencyTableFamily for MobileNetV2Family {
    fn name(&self) -> &str {
        "mobilenetv2"
    }

    fn build_key_list(&self, config: &serde_json::Value) -> Result<Vec<PlannedLayer>> {
        let cfg = Mbv2Config::deserialize(config)
            .map_err(|e| LutError::UnsupportedLayerConfig(e.to_string()))?;
        self.key_list(&cfg)
    }

    fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }
}
