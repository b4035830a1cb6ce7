//! Shared fixtures for vellum tests: asset descriptions, a scripted in-memory
//! engine, and a manually-driven host.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;

pub mod harness;
pub mod mock;

pub use harness::{Harness, ManualHost};
pub use mock::{
    AssetDoc, Journal, MockCanvas, MockFetcher, MockLoader, MockRuntime, RecordingRenderer,
};

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    assets: HashMap<String, String>,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn lookup<'a>(map: &'a HashMap<String, String>, kind: &str, name: &str) -> Result<&'a String> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

pub mod assets {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.assets.keys().cloned().collect()
    }

    /// Raw asset bytes, as a fetcher would return them.
    pub fn bytes(name: &str) -> Result<Vec<u8>> {
        let rel = lookup(&MANIFEST.assets, "asset", name)?;
        let path = resolve_path(rel);
        fs::read(&path).with_context(|| format!("failed to read fixture at {}", path.display()))
    }

    /// Parsed asset description.
    pub fn doc(name: &str) -> Result<AssetDoc> {
        let raw = bytes(name)?;
        serde_json::from_slice(&raw).with_context(|| format!("failed to parse asset fixture {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_manifest_asset_parses() {
        for key in assets::keys() {
            let doc = assets::doc(&key).unwrap_or_else(|e| panic!("{key}: {e:#}"));
            assert!(!doc.artboards.is_empty(), "{key} has no artboards");
        }
    }

    #[test]
    fn unknown_asset_is_an_error() {
        assert!(assets::bytes("does-not-exist").is_err());
    }
}
