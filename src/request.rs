//! Allocation request documents.
//!
//! A request bundles everything one strategy invocation needs: the strategy
//! name, the pool properties, the currently allocated resources and the
//! user input. Files ending in `.yaml` / `.yml` are read as YAML, anything
//! else as JSON.

use crate::error::Result;
use crate::props::{AllocatedResource, PropertyBag};
use crate::strategy::{AllocationStrategy, StrategyContext, StrategyKind};
use color_eyre::eyre::WrapErr;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One strategy invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRequest {
    pub strategy: String,
    #[serde(default, alias = "resourcePoolProperties")]
    pub pool_properties: PropertyBag,
    #[serde(default)]
    pub current_resources: Vec<AllocatedResource>,
    #[serde(default)]
    pub user_input: PropertyBag,
}

impl AllocationRequest {
    /// Resolve the strategy name
    pub fn kind(&self) -> Result<StrategyKind> {
        self.strategy.parse()
    }

    pub fn into_context(self) -> StrategyContext {
        StrategyContext::new(self.pool_properties, self.current_resources, self.user_input)
    }

    /// Build the named strategy over this request
    pub fn build(self) -> Result<Box<dyn AllocationStrategy>> {
        let kind = self.kind()?;
        kind.build(self.into_context())
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

/// Load and validate a request file
pub fn load_request(path: &Path) -> color_eyre::Result<AllocationRequest> {
    info!("Loading allocation request from: {:?}", path);

    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read request file {:?}", path))?;

    let request: AllocationRequest = if is_yaml(path) {
        serde_yaml::from_str(&content).wrap_err("Failed to parse YAML request")?
    } else {
        serde_json::from_str(&content).wrap_err("Failed to parse JSON request")?
    };

    let kind = request.kind()?;
    info!(
        "Request for {} strategy with {} allocated resources",
        kind,
        request.current_resources.len()
    );

    Ok(request)
}
