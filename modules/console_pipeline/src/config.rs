use serde::{Deserialize, Serialize};

use crate::domain::notifications::MarkReadScope;
use crate::domain::service::{DenialPolicy, ServiceConfig};

/// Configuration for the console_pipeline module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsolePipelineConfig {
    #[serde(default)]
    pub denial_policy: DenialPolicy,
    #[serde(default)]
    pub mark_read_scope: MarkReadScope,
    #[serde(default)]
    pub discard_stale_responses: bool,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ConsolePipelineConfig {
    fn default() -> Self {
        Self {
            denial_policy: DenialPolicy::default(),
            mark_read_scope: MarkReadScope::default(),
            discard_stale_responses: false,
            api_base_url: default_api_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl ConsolePipelineConfig {
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            denial_policy: self.denial_policy,
            mark_read_scope: self.mark_read_scope,
            discard_stale_responses: self.discard_stale_responses,
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8087".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_event_buffer() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_section_uses_defaults() {
        let cfg: ConsolePipelineConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(cfg.denial_policy, DenialPolicy::Outcome);
        assert_eq!(cfg.mark_read_scope, MarkReadScope::Visible);
        assert!(!cfg.discard_stale_responses);
        assert_eq!(cfg.api_base_url, "http://localhost:8087");
        assert_eq!(cfg.request_timeout_ms, 10_000);
        assert_eq!(cfg.event_buffer, 256);
    }

    #[test]
    fn yaml_overrides_are_applied() {
        let cfg: ConsolePipelineConfig = serde_yaml::from_str(
            "denial_policy: error\nmark_read_scope: global\ndiscard_stale_responses: true\n",
        )
        .unwrap();
        let service = cfg.service_config();
        assert_eq!(service.denial_policy, DenialPolicy::Error);
        assert_eq!(service.mark_read_scope, MarkReadScope::Global);
        assert!(service.discard_stale_responses);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<ConsolePipelineConfig, _> =
            serde_json::from_value(serde_json::json!({ "retry": 3 }));
        assert!(result.is_err());
    }
}
