//! Google People v1 client (contact search).

use serde_json::Value;
use tracing::debug;

use crate::error::ProviderResult;

use super::client::GoogleClient;

/// Person fields returned by a contact search.
pub const CONTACT_READ_MASK: &str = "names,emailAddresses,phoneNumbers";

#[derive(Debug, Clone)]
pub struct PeopleApi {
    client: GoogleClient,
}

impl PeopleApi {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }

    /// Searches the user's contacts; returns Google's `results` list.
    pub async fn search_contacts(&self, query: &str, max_results: u32) -> ProviderResult<Vec<Value>> {
        let params = [
            ("query", query.to_string()),
            ("pageSize", max_results.to_string()),
            ("readMask", CONTACT_READ_MASK.to_string()),
        ];
        let mut response = self.client.get("people:searchContacts", &params).await?;

        let results = match response.get_mut("results").map(Value::take) {
            Some(Value::Array(results)) => results,
            _ => Vec::new(),
        };
        debug!("contact search matched {} people", results.len());
        Ok(results)
    }
}
