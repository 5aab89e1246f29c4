use serde::{Deserialize, Serialize};

/// Response to the relay chains request. Chain ids arrive as strings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RelayChainsResponse {
    /// The supported chain ids
    relays: Vec<String>,
}

impl RelayChainsResponse {
    /// Supported chain ids. Entries that are not decimal numbers are skipped
    pub(crate) fn relays(&self) -> Vec<u64> {
        self.relays
            .iter()
            .filter_map(|s| match s.parse() {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::warn!(entry = s.as_str(), "Non-numeric relay chain id");
                    None
                }
            })
            .collect()
    }
}
