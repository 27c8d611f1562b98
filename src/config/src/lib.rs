// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Layered configuration for the processing engine.
//!
//! Values are supplied programmatically or loaded from a TOML document; this
//! crate never reads argv or an environment file itself — that wiring is the
//! embedding binary's job.

use serde::{Deserialize, Serialize};

// constants to define default values
const COLLECTIVE_WRITE_THRESHOLD: f64 = 0.5;
const TICK_INTERVAL_MS: u64 = 10;
const MAX_BUFFER_BYTES: usize = 512 * 1024 * 1024;
const SIZE_SAFETY_MARGIN: f64 = 0.01;
const COMPRESSION_LEVEL: u32 = 3;

// helper functions
fn collective_write_threshold() -> f64 {
    COLLECTIVE_WRITE_THRESHOLD
}

fn tick_interval_ms() -> u64 {
    TICK_INTERVAL_MS
}

fn max_buffer_bytes() -> usize {
    MAX_BUFFER_BYTES
}

fn size_safety_margin() -> f64 {
    SIZE_SAFETY_MARGIN
}

fn compression_codec() -> CompressionCodec {
    CompressionCodec::Gzip
}

fn compression_level() -> u32 {
    COMPRESSION_LEVEL
}

fn fork_safety() -> ForkSafetyOverride {
    ForkSafetyOverride::Auto
}

fn numerical_library() -> NumericalLibrary {
    NumericalLibrary::Auto
}

/// Top-level configuration for a single `process()` invocation.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub buffer: Buffer,
    #[serde(default)]
    pub store: Store,
    #[serde(default)]
    pub local: Local,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct General {
    /// Fraction of the fleet that must be waiting to write before the
    /// master enters the collective phase. See the distributed scheduler's
    /// half-fleet rationale.
    #[serde(default = "collective_write_threshold")]
    collective_write_threshold: f64,
    /// How long the master/worker loops sleep between ticks.
    #[serde(default = "tick_interval_ms")]
    tick_interval_ms: u64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Buffer {
    /// Upper bound on a worker's `StreamBuffer` before it requests a write.
    #[serde(default = "max_buffer_bytes")]
    max_bytes: usize,
    /// Safety margin applied on top of the raw byte estimate.
    #[serde(default = "size_safety_margin")]
    size_safety_margin: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    None,
    Gzip,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CompressionPolicy {
    #[serde(default = "compression_codec")]
    pub codec: CompressionCodec,
    #[serde(default = "compression_level")]
    pub level: u32,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            codec: compression_codec(),
            level: compression_level(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Store {
    #[serde(default)]
    pub compression: CompressionPolicy,
}

/// Escape hatch for the fork-safety seam described in the local scheduler.
/// `Auto` defers to `ForkSafety::detect()`; the explicit variants let an
/// embedder override that decision when it knows better.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ForkSafetyOverride {
    Auto,
    Safe,
    Unsafe,
}

/// Which numerical library, if any, the embedder's transform is known to
/// link against. There is no portable way for this crate to inspect that
/// on its own, so the default is `Auto`, which the local scheduler treats
/// as "unknown" rather than guessing `OpenBlas` — `OPENBLAS_NUM_THREADS`
/// is only ever forced when an embedder opts in explicitly.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NumericalLibrary {
    Auto,
    OpenBlas,
    Other,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Local {
    /// Pool size for the local scheduler. `None` defers to
    /// `std::thread::available_parallelism()`.
    pub worker_threads: Option<usize>,
    #[serde(default = "fork_safety")]
    pub fork_safety: ForkSafetyOverride,
    /// Drives whether the local scheduler forces `OPENBLAS_NUM_THREADS=1`
    /// at startup (§6: "when the configured ForkSafety profile names
    /// OpenBLAS as the linked numerical library").
    #[serde(default = "numerical_library")]
    pub numerical_library: NumericalLibrary,
}

// trait implementations
impl Default for General {
    fn default() -> Self {
        Self {
            collective_write_threshold: collective_write_threshold(),
            tick_interval_ms: tick_interval_ms(),
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self {
            max_bytes: max_buffer_bytes(),
            size_safety_margin: size_safety_margin(),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self {
            compression: CompressionPolicy::default(),
        }
    }
}

impl Default for Local {
    fn default() -> Self {
        Self {
            worker_threads: None,
            fork_safety: fork_safety(),
            numerical_library: numerical_library(),
        }
    }
}

// accessors
impl General {
    pub fn collective_write_threshold(&self) -> f64 {
        self.collective_write_threshold
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }
}

impl Buffer {
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn size_safety_margin(&self) -> f64 {
        self.size_safety_margin
    }
}

impl Local {
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
    }
}

// trait seams, mirroring the one-trait-per-section shape used elsewhere in
// this codebase's config crates.
pub trait GeneralConfig {
    fn general(&self) -> &General;
}

pub trait BufferConfig {
    fn buffer(&self) -> &Buffer;
}

pub trait StoreConfig {
    fn store(&self) -> &Store;
}

pub trait LocalConfig {
    fn local(&self) -> &Local;
}

impl GeneralConfig for EngineConfig {
    fn general(&self) -> &General {
        &self.general
    }
}

impl BufferConfig for EngineConfig {
    fn buffer(&self) -> &Buffer {
        &self.buffer
    }
}

impl StoreConfig for EngineConfig {
    fn store(&self) -> &Store {
        &self.store
    }
}

impl LocalConfig for EngineConfig {
    fn local(&self) -> &Local {
        &self.local
    }
}

impl EngineConfig {
    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
