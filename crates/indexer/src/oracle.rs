use alloy_rpc_types_eth::Log;
use serde_json::Value;
use tidewatch_primitives::ContractKind;

/// A log decoded by generated watcher code.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub event_name: String,
    /// Decoded arguments.
    pub event_info: Value,
    /// Raw log context kept alongside the decoded form.
    pub extra_info: Value,
}

/// Decodes raw logs for known contract kinds.
///
/// Supplied by external code generation. Unknown kinds (or logs the ABI does
/// not cover) return `None` and the log is skipped.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
pub trait AbiOracle: Send + Sync + 'static {
    fn parse_log(&self, kind: &ContractKind, log: &Log) -> Option<ParsedEvent>;
}

/// Fallback oracle for generic watchers: keeps the raw topics and data,
/// naming the event after its signature topic. Generated watchers replace it
/// with real ABI decoding.
#[derive(Debug, Clone, Default)]
pub struct RawLogOracle;

impl AbiOracle for RawLogOracle {
    fn parse_log(&self, _kind: &ContractKind, log: &Log) -> Option<ParsedEvent> {
        let topics = log.topics();
        let event_name = topics
            .first()
            .map(|topic| topic.to_string())
            .unwrap_or_else(|| "anonymous".to_owned());

        Some(ParsedEvent {
            event_name,
            event_info: serde_json::json!({
                "topics": topics.iter().map(|topic| topic.to_string()).collect::<Vec<_>>(),
                "data": log.data().data.to_string(),
            }),
            extra_info: serde_json::json!({
                "transactionIndex": log.transaction_index,
                "removed": log.removed,
            }),
        })
    }
}
