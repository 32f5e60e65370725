// Architecture families
//
// A family pairs a key-list builder for one search space with the operator
// registry of the runtime that executes it. New search spaces implement
// `LatencyTableFamily` and register in `family_for`.

mod mobilenetv2;

pub use mobilenetv2::{
    BlockConfig, ClassifierStage, ConvStage, MbConvConfig, Mbv2Config, MobileNetV2Family,
};

use crate::decomposition::OperatorRegistry;
use crate::error::{LutError, Result};
use crate::layer_key::{decomposition_tag, LayerKey};

/// Names accepted by [`family_for`]
pub const KNOWN_FAMILIES: &[&str] = &["mobilenetv2"];

/// One emitted layer, in hardware execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLayer {
    pub key: LayerKey,

    /// Set only on the first parametrized block of the network
    pub first_residual_block: bool,
}

impl PlannedLayer {
    pub fn new(key: LayerKey) -> Self {
        Self {
            key,
            first_residual_block: false,
        }
    }
}

/// A layer key paired with its expected operator sequence
#[derive(Debug, Clone, Copy)]
pub struct LayerOps<'a> {
    pub key: &'a LayerKey,
    pub operators: &'a [String],
}

/// Key-list construction and decomposition for one search space
pub trait LatencyTableFamily: Send + Sync {
    fn name(&self) -> &str;

    /// Ordered layer keys for one architecture config
    ///
    /// Must be a pure, deterministic function of `config`.
    fn build_key_list(&self, config: &serde_json::Value) -> Result<Vec<PlannedLayer>>;

    fn registry(&self) -> &OperatorRegistry;

    /// Resolve each planned layer to the operators the runtime emits for it
    fn resolve_operators<'a>(&'a self, layers: &'a [PlannedLayer]) -> Result<Vec<LayerOps<'a>>> {
        layers
            .iter()
            .map(|layer| {
                let tag = decomposition_tag(&layer.key, layer.first_residual_block)?;
                let operators = self.registry().decomposition_for(&tag)?;
                Ok(LayerOps {
                    key: &layer.key,
                    operators,
                })
            })
            .collect()
    }
}

/// Look up a family by name
///
/// `registry` replaces the family's built-in operator registry when given.
pub fn family_for(
    name: &str,
    input_shape: (usize, usize),
    registry: Option<OperatorRegistry>,
) -> Result<Box<dyn LatencyTableFamily>> {
    match name {
        "mobilenetv2" => {
            let mut family = MobileNetV2Family::new(input_shape)?;
            if let Some(registry) = registry {
                family = family.with_registry(registry);
            }
            Ok(Box::new(family))
        }
        other => Err(LutError::UnknownFamily(other.to_string())),
    }
}
