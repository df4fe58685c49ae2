// Node definitions - the typed units of a workflow graph

//! # Workflow Nodes
//!
//! A node is one behavioral unit in a workflow graph. Its kind is closed:
//!
//! - **genai-intent**: classifies the customer's message with a GenAI model
//! - **router**: maps the detected intent to a module node
//! - **module**: runs a business capability (tracking, refund, ...)
//! - **response**: terminal node that formats whatever payload is live
//!
//! The kind and its configuration travel together in [`NodeConfig`], a tagged
//! union, so there is no way to build a router node that carries GenAI settings.
//!
//! ## Rust Learning Notes:
//!
//! ### Adjacently Tagged Enums
//! `#[serde(tag = "type", content = "config")]` serializes a variant as
//! `{"type": "router", "config": {...}}`, which matches the shape the visual
//! builder stores.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default timeout applied to module API bindings, in milliseconds
pub const DEFAULT_API_TIMEOUT_MS: u64 = 10_000;

/// Node kind without configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "genai-intent")]
    GenAIIntent,
    #[serde(rename = "router")]
    Router,
    #[serde(rename = "module")]
    Module,
    #[serde(rename = "response")]
    Response,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::GenAIIntent => "genai-intent",
            NodeType::Router => "router",
            NodeType::Module => "module",
            NodeType::Response => "response",
        }
    }

    /// Static type-compatibility table for edges
    ///
    /// `genai-intent → router`, `router → module`, `module → module | response`.
    /// Response nodes have no outgoing edges.
    pub fn can_connect_to(&self, target: NodeType) -> bool {
        matches!(
            (self, target),
            (NodeType::GenAIIntent, NodeType::Router)
                | (NodeType::Router, NodeType::Module)
                | (NodeType::Module, NodeType::Module)
                | (NodeType::Module, NodeType::Response)
        )
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business capability implemented by a module node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleType {
    Tracking,
    Cancellation,
    Refund,
    ModifyOrder,
    Faq,
}

impl ModuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleType::Tracking => "tracking",
            ModuleType::Cancellation => "cancellation",
            ModuleType::Refund => "refund",
            ModuleType::ModifyOrder => "modify-order",
            ModuleType::Faq => "faq",
        }
    }

    /// API binding aliases a module of this type must have before it counts as configured
    pub fn required_api_aliases(&self) -> &'static [&'static str] {
        match self {
            ModuleType::Tracking => &["shipment_status"],
            ModuleType::Cancellation => &["order_lookup", "cancel_order"],
            ModuleType::Refund => &["order_lookup", "create_refund"],
            ModuleType::ModifyOrder => &["order_lookup", "update_order"],
            ModuleType::Faq => &[],
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GenAI model and credential for an intent node
///
/// `api_key` holds plaintext only after the config resolver has decrypted it;
/// in storage it is ciphertext.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenAIConfig {
    /// Model identifier, must be on the supported allow-list
    #[serde(default)]
    pub model: String,
    /// Provider API key
    #[serde(default)]
    pub api_key: String,
    /// Sampling temperature override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Extra instructions appended to the classifier prompt (store tone, policies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Set at save time once the credential/model pair answered a test call
    #[serde(default)]
    pub api_key_validated: bool,
}

impl GenAIConfig {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.model.trim().is_empty() && !self.api_key.trim().is_empty() && self.api_key_validated
    }

    /// Masked form of the API key, safe to log
    pub fn masked_api_key(&self) -> String {
        mask_secret(&self.api_key)
    }
}

impl fmt::Debug for GenAIConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenAIConfig")
            .field("model", &self.model)
            .field("api_key", &self.masked_api_key())
            .field("temperature", &self.temperature)
            .field("api_key_validated", &self.api_key_validated)
            .finish()
    }
}

/// Router configuration: detected intent → target module node id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// BTreeMap keeps serialization and iteration order deterministic
    #[serde(default)]
    pub intent_mappings: BTreeMap<String, String>,
}

impl RouterConfig {
    pub fn target_for(&self, intent: &str) -> Option<&str> {
        self.intent_mappings.get(intent).map(String::as_str)
    }

    pub fn with_mapping(mut self, intent: impl Into<String>, target: impl Into<String>) -> Self {
        self.intent_mappings.insert(intent.into(), target.into());
        self
    }
}

/// HTTP verb used by a module API binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A named external API binding used by module nodes
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Alias the module looks the binding up by (e.g. `order_lookup`)
    pub alias: String,
    /// Endpoint URL; `{order_id}` placeholders are substituted at call time
    pub base_url: String,
    #[serde(default)]
    pub method: HttpMethod,
    /// Bearer credential; ciphertext in storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_API_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

impl ApiConfig {
    pub fn new(alias: impl Into<String>, base_url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            alias: alias.into(),
            base_url: base_url.into(),
            method,
            credential: None,
            timeout_ms: DEFAULT_API_TIMEOUT_MS,
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("alias", &self.alias)
            .field("base_url", &self.base_url)
            .field("method", &self.method)
            .field("credential", &self.credential.as_deref().map(mask_secret))
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Configuration of a module node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub module_type: ModuleType,
    #[serde(default)]
    pub apis: Vec<ApiConfig>,
    /// When false, an external API failure fails the run instead of degrading
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
    /// Overrides the built-in apologetic fallback text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_message: Option<String>,
}

impl ModuleConfig {
    pub fn new(module_type: ModuleType) -> Self {
        Self {
            module_type,
            apis: Vec::new(),
            fallback_enabled: true,
            fallback_message: None,
        }
    }

    pub fn with_api(mut self, api: ApiConfig) -> Self {
        self.apis.push(api);
        self
    }

    pub fn api(&self, alias: &str) -> Option<&ApiConfig> {
        self.apis.iter().find(|api| api.alias == alias)
    }

    /// Required aliases that are absent or have an empty URL
    pub fn missing_api_aliases(&self) -> Vec<&'static str> {
        self.module_type
            .required_api_aliases()
            .iter()
            .copied()
            .filter(|alias| {
                self.api(alias)
                    .map(|api| api.base_url.trim().is_empty())
                    .unwrap_or(true)
            })
            .collect()
    }

    /// Fallback text for a failed external call, or `None` if degradation is disabled
    pub fn fallback_text(&self, default: &str) -> Option<String> {
        if !self.fallback_enabled {
            return None;
        }
        Some(
            self.fallback_message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default.to_string()),
        )
    }
}

/// Tagged union over the four node kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config")]
pub enum NodeConfig {
    #[serde(rename = "genai-intent")]
    GenAIIntent(GenAIConfig),
    #[serde(rename = "router")]
    Router(RouterConfig),
    #[serde(rename = "module")]
    Module(ModuleConfig),
    #[serde(rename = "response")]
    Response,
}

impl NodeConfig {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeConfig::GenAIIntent(_) => NodeType::GenAIIntent,
            NodeConfig::Router(_) => NodeType::Router,
            NodeConfig::Module(_) => NodeType::Module,
            NodeConfig::Response => NodeType::Response,
        }
    }

    /// Derived `isConfigured` flag
    pub fn is_configured(&self) -> bool {
        match self {
            NodeConfig::GenAIIntent(config) => config.is_configured(),
            NodeConfig::Router(config) => !config.intent_mappings.is_empty(),
            NodeConfig::Module(config) => config.missing_api_aliases().is_empty(),
            NodeConfig::Response => true,
        }
    }

    /// Rewrite every secret field with `transform`
    ///
    /// Used with an encryptor on the save path and a decryptor on the load path.
    /// The original value is left untouched; a new configuration is returned.
    pub fn map_secrets<F, E>(&self, mut transform: F) -> Result<NodeConfig, E>
    where
        F: FnMut(&str) -> Result<String, E>,
    {
        let mut copy = self.clone();
        match &mut copy {
            NodeConfig::GenAIIntent(config) => {
                if !config.api_key.is_empty() {
                    config.api_key = transform(&config.api_key)?;
                }
            }
            NodeConfig::Module(config) => {
                for api in &mut config.apis {
                    if let Some(credential) = api.credential.as_mut() {
                        if !credential.is_empty() {
                            *credential = transform(credential)?;
                        }
                    }
                }
            }
            NodeConfig::Router(_) | NodeConfig::Response => {}
        }
        Ok(copy)
    }
}

/// One node in a workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub config: NodeConfig,
}

impl Node {
    pub fn new(id: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id: id.into(),
            label: None,
            config,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.config.node_type()
    }

    pub fn module_type(&self) -> Option<ModuleType> {
        match &self.config {
            NodeConfig::Module(config) => Some(config.module_type),
            _ => None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub fn genai_config(&self) -> Option<&GenAIConfig> {
        match &self.config {
            NodeConfig::GenAIIntent(config) => Some(config),
            _ => None,
        }
    }

    pub fn router_config(&self) -> Option<&RouterConfig> {
        match &self.config {
            NodeConfig::Router(config) => Some(config),
            _ => None,
        }
    }

    pub fn module_config(&self) -> Option<&ModuleConfig> {
        match &self.config {
            NodeConfig::Module(config) => Some(config),
            _ => None,
        }
    }
}

/// Keep the first four characters of a secret and mask the rest
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_compatibility_table() {
        assert!(NodeType::GenAIIntent.can_connect_to(NodeType::Router));
        assert!(NodeType::Router.can_connect_to(NodeType::Module));
        assert!(NodeType::Module.can_connect_to(NodeType::Module));
        assert!(NodeType::Module.can_connect_to(NodeType::Response));

        assert!(!NodeType::GenAIIntent.can_connect_to(NodeType::Module));
        assert!(!NodeType::Router.can_connect_to(NodeType::Response));
        assert!(!NodeType::Response.can_connect_to(NodeType::Module));
        assert!(!NodeType::Response.can_connect_to(NodeType::Response));
    }

    #[test]
    fn test_genai_is_configured_requires_validation() {
        let mut config = GenAIConfig::new("gemini-1.5-flash", "AIza-test-key");
        assert!(!config.is_configured());

        config.api_key_validated = true;
        assert!(config.is_configured());

        config.api_key = "   ".to_string();
        assert!(!config.is_configured());
    }

    #[test]
    fn test_module_missing_aliases() {
        let config = ModuleConfig::new(ModuleType::Refund).with_api(ApiConfig::new(
            "order_lookup",
            "https://shop.example/orders/{order_id}",
            HttpMethod::Get,
        ));
        assert_eq!(config.missing_api_aliases(), vec!["create_refund"]);
        assert!(!NodeConfig::Module(config).is_configured());

        let faq = NodeConfig::Module(ModuleConfig::new(ModuleType::Faq));
        assert!(faq.is_configured());
    }

    #[test]
    fn test_fallback_text_respects_toggle() {
        let mut config = ModuleConfig::new(ModuleType::Tracking);
        assert_eq!(config.fallback_text("sorry").as_deref(), Some("sorry"));

        config.fallback_message = Some("We are looking into it".to_string());
        assert_eq!(config.fallback_text("sorry").as_deref(), Some("We are looking into it"));

        config.fallback_enabled = false;
        assert!(config.fallback_text("sorry").is_none());
    }

    #[test]
    fn test_map_secrets_leaves_original_untouched() {
        let original = NodeConfig::GenAIIntent(GenAIConfig::new("sonar", "secret-key"));
        let mapped = original
            .map_secrets(|s| Ok::<_, ()>(format!("enc({})", s)))
            .unwrap();

        assert_eq!(original.clone(), NodeConfig::GenAIIntent(GenAIConfig::new("sonar", "secret-key")));
        match mapped {
            NodeConfig::GenAIIntent(config) => assert_eq!(config.api_key, "enc(secret-key)"),
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_node_deserializes_builder_shape() {
        let node: Node = serde_json::from_value(json!({
            "id": "router-1",
            "type": "router",
            "config": { "intent_mappings": { "order_query": "tracking-1" } }
        }))
        .unwrap();

        assert_eq!(node.node_type(), NodeType::Router);
        assert_eq!(node.router_config().unwrap().target_for("order_query"), Some("tracking-1"));

        let response: Node = serde_json::from_value(json!({ "id": "out", "type": "response" })).unwrap();
        assert_eq!(response.node_type(), NodeType::Response);
    }

    #[test]
    fn test_debug_masks_api_key() {
        let config = GenAIConfig::new("sonar", "pplx-very-secret");
        let printed = format!("{:?}", config);
        assert!(printed.contains("pplx****"));
        assert!(!printed.contains("very-secret"));
    }
}
