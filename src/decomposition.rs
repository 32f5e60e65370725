use crate::error::{LutError, Result};
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Registry of per-layer-type operator decompositions
///
/// Maps a decomposition tag (see [`crate::layer_key::decomposition_tag`]) to
/// the ordered operator names the hardware runtime emits for that layer.
/// Built once per architecture family, read-only afterwards.
///
/// # Example TOML
/// ```toml
/// family = "mobilenetv2"
///
/// [decompositions]
/// Conv = ["Conv2D", "Pad"]
/// block0 = ["Conv2D", "Conv2D"]
/// "expanded_conv-stride:1-idskip:1" = ["Conv2D", "Conv2D", "Conv2D", "Eltwise"]
/// ```
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    family: String,
    decompositions: HashMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct RegistryFile {
    family: Option<String>,
    decompositions: HashMap<String, Vec<String>>,
}

impl OperatorRegistry {
    /// Build a registry from `(tag, operators)` pairs
    pub fn new<I, T, O>(family: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (T, Vec<O>)>,
        T: Into<String>,
        O: Into<String>,
    {
        let decompositions = entries
            .into_iter()
            .map(|(tag, ops)| (tag.into(), ops.into_iter().map(Into::into).collect()))
            .collect();
        Self {
            family: family.into(),
            decompositions,
        }
    }

    /// STM32 runtime decompositions for the MobileNetV2 search space
    pub fn mobilenetv2() -> Self {
        Self::new(
            "mobilenetv2",
            [
                ("Conv", vec!["Conv2D", "Pad"]),
                ("block0", vec!["Conv2D", "Conv2D"]),
                (
                    "expanded_conv-stride:1-idskip:0",
                    vec!["Conv2D", "Conv2D", "Conv2D"],
                ),
                (
                    "expanded_conv-stride:2-idskip:0",
                    vec!["Conv2D", "Conv2D", "Conv2D"],
                ),
                (
                    "expanded_conv-stride:1-idskip:1",
                    vec!["Conv2D", "Conv2D", "Conv2D", "Eltwise"],
                ),
                ("Conv_1", vec!["Conv2D"]),
                ("AvgPool2D", vec!["Pool"]),
                ("Logits", vec!["Conv2D"]),
            ],
        )
    }

    /// Load a registry from a TOML document
    ///
    /// # Errors
    /// Fails on invalid TOML or when any tag maps to an empty operator list.
    pub fn from_toml_str(content: &str, default_family: &str) -> anyhow::Result<Self> {
        let file: RegistryFile =
            toml::from_str(content).context("Failed to parse operator registry TOML")?;

        if let Some((tag, _)) = file.decompositions.iter().find(|(_, ops)| ops.is_empty()) {
            anyhow::bail!("Decomposition for '{}' has no operators", tag);
        }

        Ok(Self {
            family: file.family.unwrap_or_else(|| default_family.to_string()),
            decompositions: file.decompositions,
        })
    }

    /// Load a registry from a TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P, default_family: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!(
                "Failed to read operator registry: {}",
                path.as_ref().display()
            )
        })?;
        Self::from_toml_str(&content, default_family)
    }

    /// Ordered operator names expected for `tag`
    pub fn decomposition_for(&self, tag: &str) -> Result<&[String]> {
        self.decompositions
            .get(tag)
            .map(Vec::as_slice)
            .ok_or_else(|| LutError::UnknownLayerType {
                tag: tag.to_string(),
            })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn len(&self) -> usize {
        self.decompositions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decompositions.is_empty()
    }
}
