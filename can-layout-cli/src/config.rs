//! Layout description loading and parsing

use anyhow::{Context, Result};
use can_layout::{Endianness, LayoutConfig, SignalTypeKind, SignalUnitKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Layout description (loaded from a TOML file)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Engine settings shared by every message
    #[serde(default)]
    pub engine: LayoutConfig,
    #[serde(default)]
    pub types: Vec<TypeConfig>,
    #[serde(default)]
    pub units: Vec<UnitConfig>,
    #[serde(default)]
    pub enums: Vec<EnumConfig>,
    #[serde(default)]
    pub messages: Vec<MessageConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TypeConfig {
    pub name: String,
    pub kind: SignalTypeKind,
    /// Ignored for flags
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default)]
    pub signed: bool,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(default)]
    pub desc: String,
}

fn default_size() -> usize {
    8
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnitConfig {
    pub name: String,
    #[serde(default)]
    pub kind: SignalUnitKind,
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnumConfig {
    pub name: String,
    /// Pin the enum to this many bits instead of deriving it from the values
    pub fixed_size: Option<usize>,
    #[serde(default)]
    pub values: Vec<EnumValueConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnumValueConfig {
    pub index: u64,
    pub name: String,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageConfig {
    pub name: String,
    pub can_id: u32,
    pub size_byte: usize,
    #[serde(default = "default_bus")]
    pub bus: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub signals: Vec<SignalConfig>,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

fn default_bus() -> String {
    "default".to_string()
}

/// A standard signal (`type`) or an enum signal (`enum`)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SignalConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub signal_type: Option<String>,
    #[serde(rename = "enum")]
    pub signal_enum: Option<String>,
    pub unit: Option<String>,
    pub start_pos: Option<usize>,
    /// DBC sawtooth start bit, converted to `start_pos`
    pub big_endian_start_bit: Option<usize>,
    #[serde(default)]
    pub endianness: Endianness,
    /// Raw value used when encoding
    pub value: Option<u64>,
    /// Sub-layouts of the enclosing layer; empty means all of them
    #[serde(default)]
    pub layouts: Vec<usize>,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayerConfig {
    pub muxor: String,
    pub start_pos: usize,
    pub layout_count: usize,
    /// Sub-layout of the enclosing layer the muxor is placed in
    pub layout: Option<usize>,
    /// Muxor value used when encoding
    pub value: Option<u64>,
    #[serde(default)]
    pub signals: Vec<SignalConfig>,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

/// Load a layout description from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    log::debug!(
        "Loaded {} types, {} units, {} enums, {} messages from {:?}",
        config.types.len(),
        config.units.len(),
        config.enums.len(),
        config.messages.len(),
        path
    );
    Ok(config)
}
