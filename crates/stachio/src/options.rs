/*
 * options.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Parse and render options.
//!
//! [`RenderSettings`] is plain, serializable configuration. [`ParserOptions`]
//! bundles the settings with the host collaborators (value resolver,
//! formatter registry, partial store, custom providers, observer) and is
//! shared read-only by every render of a template.

use crate::context::{ExpectedKind, ValueResolver};
use crate::custom::CustomDocumentItemProvider;
use crate::formatter::FormatterRegistry;
use crate::partials::{NullPartialStore, PartialStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Byte encoding of rendered output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Encoding::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }

    /// Number of bytes `text` occupies once encoded.
    pub fn encoded_len(&self, text: &str) -> usize {
        match self {
            Encoding::Utf8 => text.len(),
            Encoding::Utf16Le | Encoding::Utf16Be => text.encode_utf16().count() * 2,
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Utf16Le => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
            Encoding::Utf16Be => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
        }
    }
}

/// What to do when partial inclusion exceeds the stack size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartialStackOverflowBehavior {
    /// Abort the render with a stack overflow error.
    #[default]
    FailWithError,
    /// Skip the offending reference and keep rendering.
    FailSilent,
}

/// Serializable render configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub encoding: Encoding,

    /// Text written for absent and null values.
    pub null_value: String,

    /// Maximum output size in bytes; 0 disables the cap.
    pub max_size: usize,

    /// Wall-clock budget for one render.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Maximum partial nesting depth.
    pub partial_stack_size: usize,

    pub stack_overflow_behavior: PartialStackOverflowBehavior,

    /// Turns off HTML escaping of `{{expr}}` output.
    pub disable_content_escaping: bool,

    /// Record the paths a template references while parsing.
    pub infer_model: bool,

    /// Record per-section timing samples while rendering.
    pub profile: bool,

    pub open_delimiter: String,
    pub close_delimiter: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            encoding: Encoding::Utf8,
            null_value: String::new(),
            max_size: 0,
            timeout_ms: None,
            partial_stack_size: 255,
            stack_overflow_behavior: PartialStackOverflowBehavior::FailWithError,
            disable_content_escaping: false,
            infer_model: false,
            profile: false,
            open_delimiter: "{{".to_string(),
            close_delimiter: "}}".to_string(),
        }
    }
}

impl RenderSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_null_value(mut self, null_value: impl Into<String>) -> Self {
        self.null_value = null_value.into();
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_partial_stack_size(mut self, size: usize) -> Self {
        self.partial_stack_size = size;
        self
    }

    pub fn with_stack_overflow_behavior(mut self, behavior: PartialStackOverflowBehavior) -> Self {
        self.stack_overflow_behavior = behavior;
        self
    }

    pub fn with_content_escaping(mut self, enabled: bool) -> Self {
        self.disable_content_escaping = !enabled;
        self
    }

    pub fn with_model_inference(mut self, enabled: bool) -> Self {
        self.infer_model = enabled;
        self
    }

    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.profile = enabled;
        self
    }

    pub fn with_delimiters(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.open_delimiter = open.into();
        self.close_delimiter = close.into();
        self
    }
}

/// Callback invoked with the path text whenever resolution finds nothing.
pub type UnresolvedPathObserver = Arc<dyn Fn(&str, ExpectedKind) + Send + Sync>;

/// Settings plus host collaborators.
#[derive(Clone)]
pub struct ParserOptions {
    pub settings: RenderSettings,
    pub value_resolver: Option<Arc<dyn ValueResolver>>,
    pub formatters: Arc<FormatterRegistry>,
    pub partials: Arc<dyn PartialStore>,
    /// Consulted in order before built-in handling; first acceptance wins.
    pub providers: Vec<Arc<dyn CustomDocumentItemProvider>>,
    pub unresolved_observer: Option<UnresolvedPathObserver>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            settings: RenderSettings::default(),
            value_resolver: None,
            formatters: Arc::new(FormatterRegistry::with_builtins()),
            partials: Arc::new(NullPartialStore),
            providers: Vec::new(),
            unresolved_observer: None,
        }
    }
}

impl ParserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_value_resolver(mut self, resolver: impl ValueResolver + 'static) -> Self {
        self.value_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_formatters(mut self, formatters: FormatterRegistry) -> Self {
        self.formatters = Arc::new(formatters);
        self
    }

    pub fn with_partials(mut self, partials: Arc<dyn PartialStore>) -> Self {
        self.partials = partials;
        self
    }

    pub fn with_provider(mut self, provider: impl CustomDocumentItemProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn on_unresolved_path(
        mut self,
        observer: impl Fn(&str, ExpectedKind) + Send + Sync + 'static,
    ) -> Self {
        self.unresolved_observer = Some(Arc::new(observer));
        self
    }

    pub fn provider(&self, name: &str) -> Option<&Arc<dyn CustomDocumentItemProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }
}

impl fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("ParserOptions")
            .field("settings", &self.settings)
            .field("value_resolver", &self.value_resolver.is_some())
            .field("formatters", &self.formatters.len())
            .field("providers", &providers)
            .field("unresolved_observer", &self.unresolved_observer.is_some())
            .finish_non_exhaustive()
    }
}
