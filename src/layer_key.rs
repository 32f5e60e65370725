//! Canonical layer keys
//!
//! A key encodes the structural identity of one layer:
//!
//! ```text
//! <type>-input:<HxWxC>-output:<HxWxC>[-expand:<n>-kernel:<n>-stride:<n>-idskip:<0|1>]
//! ```
//!
//! The field order is part of the persisted table format. Two layers from
//! different sampled architectures share a key exactly when they are
//! structurally identical, which is what makes cross-model aggregation work.

use crate::error::{LutError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Field separator inside a key
pub const SEPARATOR: char = '-';

/// The parametrized, residual-capable layer type
pub const PARAMETRIZED_LAYER: &str = "expanded_conv";

/// Decomposition tag for the first parametrized block of a network
pub const FIRST_BLOCK_TAG: &str = "block0";

/// Tensor shape: `HxWxC` for feature maps, a single integer for flat outputs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Feature-map shape (height, width, channels)
    pub fn hwc(h: usize, w: usize, c: usize) -> Self {
        Self(vec![h, w, c])
    }

    /// Flat shape, e.g. classifier output classes
    pub fn flat(n: usize) -> Self {
        Self(vec![n])
    }

    fn parse(text: &str) -> Option<Self> {
        text.split('x')
            .map(|d| d.parse::<usize>().ok())
            .collect::<Option<Vec<_>>>()
            .filter(|dims| !dims.is_empty())
            .map(Self)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("x")?;
            }
            write!(f, "{}", dim)?;
        }
        Ok(())
    }
}

/// Hyperparameters carried only by the parametrized layer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockParams {
    /// Expanded (mid) channel width
    pub expand: usize,
    pub kernel: usize,
    pub stride: usize,
    /// Whether the block carries an identity shortcut
    pub id_skip: bool,
}

/// Canonical, order-comparable layer identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerKey(String);

impl LayerKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Layer type tag: everything before the first separator
    pub fn layer_type(&self) -> &str {
        self.0.split(SEPARATOR).next().unwrap_or_default()
    }

    /// Parse the key back into its structural fields
    pub fn decode(&self) -> Result<DecodedKey> {
        let malformed = |reason: &str| LutError::MalformedKey {
            key: self.0.clone(),
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = self.0.split(SEPARATOR).collect();
        if fields.len() < 3 {
            return Err(malformed("expected at least type, input and output fields"));
        }

        let layer_type = fields[0].to_string();
        let input = field_value(fields[1], "input")
            .and_then(Shape::parse)
            .ok_or_else(|| malformed("bad input field"))?;
        let output = field_value(fields[2], "output")
            .and_then(Shape::parse)
            .ok_or_else(|| malformed("bad output field"))?;

        let params = if layer_type == PARAMETRIZED_LAYER {
            if fields.len() != 7 {
                return Err(malformed("parametrized layer needs expand, kernel, stride and idskip"));
            }
            let number = |field: &str, name: &str| {
                field_value(field, name)
                    .and_then(|v| v.parse::<usize>().ok())
                    .ok_or_else(|| malformed(&format!("bad {} field", name)))
            };
            let id_skip = match number(fields[6], "idskip")? {
                0 => false,
                1 => true,
                _ => return Err(malformed("idskip must be 0 or 1")),
            };
            Some(BlockParams {
                expand: number(fields[3], "expand")?,
                kernel: number(fields[4], "kernel")?,
                stride: number(fields[5], "stride")?,
                id_skip,
            })
        } else {
            if fields.len() != 3 {
                return Err(malformed("unexpected trailing fields"));
            }
            None
        };

        Ok(DecodedKey {
            layer_type,
            input,
            output,
            params,
        })
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for LayerKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LayerKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for LayerKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Structural fields recovered from a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedKey {
    pub layer_type: String,
    pub input: Shape,
    pub output: Shape,
    pub params: Option<BlockParams>,
}

fn field_value<'a>(field: &'a str, name: &str) -> Option<&'a str> {
    field.strip_prefix(name)?.strip_prefix(':')
}

/// Encode a layer into its canonical key
///
/// `params` must be present for [`PARAMETRIZED_LAYER`] and absent for every
/// other type.
///
/// # Example
/// ```
/// use latency_lut::layer_key::{encode, BlockParams, Shape};
///
/// let key = encode(
///     "expanded_conv",
///     &Shape::hwc(20, 20, 16),
///     &Shape::hwc(20, 20, 16),
///     Some(&BlockParams { expand: 32, kernel: 3, stride: 1, id_skip: true }),
/// )
/// .unwrap();
/// assert_eq!(
///     key.as_str(),
///     "expanded_conv-input:20x20x16-output:20x20x16-expand:32-kernel:3-stride:1-idskip:1"
/// );
/// ```
pub fn encode(
    layer_type: &str,
    input: &Shape,
    output: &Shape,
    params: Option<&BlockParams>,
) -> Result<LayerKey> {
    let invalid = |reason: &str| LutError::InvalidKeyParams {
        layer_type: layer_type.to_string(),
        reason: reason.to_string(),
    };

    if layer_type.is_empty() || layer_type.contains(SEPARATOR) {
        return Err(invalid("layer type must be non-empty and free of separators"));
    }

    let mut infos = vec![
        layer_type.to_string(),
        format!("input:{}", input),
        format!("output:{}", output),
    ];

    match (layer_type == PARAMETRIZED_LAYER, params) {
        (true, Some(p)) => {
            infos.push(format!("expand:{}", p.expand));
            infos.push(format!("kernel:{}", p.kernel));
            infos.push(format!("stride:{}", p.stride));
            infos.push(format!("idskip:{}", u8::from(p.id_skip)));
        }
        (true, None) => return Err(invalid("block parameters are required")),
        (false, Some(_)) => return Err(invalid("block parameters are not accepted")),
        (false, None) => {}
    }

    Ok(LayerKey(infos.join(&SEPARATOR.to_string())))
}

/// Tag used to look up a key's operator decomposition
///
/// Parametrized blocks are disambiguated by stride and shortcut, except the
/// first one in a network, which always maps to [`FIRST_BLOCK_TAG`]: it cannot
/// carry a residual add.
pub fn decomposition_tag(key: &LayerKey, first_residual_block: bool) -> Result<String> {
    let decoded = key.decode()?;
    Ok(match decoded.params {
        Some(_) if first_residual_block => FIRST_BLOCK_TAG.to_string(),
        Some(p) => format!(
            "{}{sep}stride:{}{sep}idskip:{}",
            decoded.layer_type,
            p.stride,
            u8::from(p.id_skip),
            sep = SEPARATOR
        ),
        None => decoded.layer_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(expand: usize, kernel: usize, stride: usize, id_skip: bool) -> BlockParams {
        BlockParams {
            expand,
            kernel,
            stride,
            id_skip,
        }
    }

    #[test]
    fn test_encode_parametrized_field_order() {
        let key = encode(
            PARAMETRIZED_LAYER,
            &Shape::hwc(20, 20, 16),
            &Shape::hwc(20, 20, 16),
            Some(&block(32, 3, 1, true)),
        )
        .unwrap();
        assert_eq!(
            key.as_str(),
            "expanded_conv-input:20x20x16-output:20x20x16-expand:32-kernel:3-stride:1-idskip:1"
        );
    }

    #[test]
    fn test_encode_flat_output() {
        let key = encode("Logits", &Shape::hwc(1, 1, 1280), &Shape::flat(1000), None).unwrap();
        assert_eq!(key.as_str(), "Logits-input:1x1x1280-output:1000");
    }

    #[test]
    fn test_encode_rejects_missing_params() {
        let err = encode(PARAMETRIZED_LAYER, &Shape::hwc(1, 1, 1), &Shape::hwc(1, 1, 1), None);
        assert!(matches!(err, Err(LutError::InvalidKeyParams { .. })));
    }

    #[test]
    fn test_encode_rejects_unexpected_params() {
        let err = encode(
            "Conv",
            &Shape::hwc(1, 1, 1),
            &Shape::hwc(1, 1, 1),
            Some(&block(1, 1, 1, false)),
        );
        assert!(matches!(err, Err(LutError::InvalidKeyParams { .. })));
    }

    #[test]
    fn test_encode_rejects_separator_in_type() {
        let err = encode("Conv-1", &Shape::flat(1), &Shape::flat(1), None);
        assert!(matches!(err, Err(LutError::InvalidKeyParams { .. })));
    }

    #[test]
    fn test_decode_recovers_fields() {
        let params = block(96, 5, 2, false);
        let key = encode(
            PARAMETRIZED_LAYER,
            &Shape::hwc(40, 40, 24),
            &Shape::hwc(20, 20, 32),
            Some(&params),
        )
        .unwrap();
        let decoded = key.decode().unwrap();
        assert_eq!(decoded.layer_type, PARAMETRIZED_LAYER);
        assert_eq!(decoded.input, Shape::hwc(40, 40, 24));
        assert_eq!(decoded.output, Shape::hwc(20, 20, 32));
        assert_eq!(decoded.params, Some(params));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        for raw in ["", "Conv", "Conv-input:axb-output:1", "Conv-input:1-output:1-extra:2"] {
            let key = LayerKey::from(raw);
            assert!(
                matches!(key.decode(), Err(LutError::MalformedKey { .. })),
                "{:?} should not decode",
                raw
            );
        }
    }

    #[test]
    fn test_decode_rejects_bad_idskip() {
        let key = LayerKey::from(
            "expanded_conv-input:8x8x8-output:8x8x8-expand:8-kernel:3-stride:1-idskip:2",
        );
        assert!(key.decode().is_err());
    }

    #[test]
    fn test_decomposition_tags() {
        let p = block(32, 3, 2, false);
        let key = encode(
            PARAMETRIZED_LAYER,
            &Shape::hwc(20, 20, 16),
            &Shape::hwc(10, 10, 24),
            Some(&p),
        )
        .unwrap();
        assert_eq!(decomposition_tag(&key, true).unwrap(), FIRST_BLOCK_TAG);
        assert_eq!(
            decomposition_tag(&key, false).unwrap(),
            "expanded_conv-stride:2-idskip:0"
        );

        let pool = encode("AvgPool2D", &Shape::hwc(5, 5, 320), &Shape::hwc(1, 1, 320), None)
            .unwrap();
        assert_eq!(decomposition_tag(&pool, false).unwrap(), "AvgPool2D");
        assert_eq!(pool.layer_type(), "AvgPool2D");
    }
}
