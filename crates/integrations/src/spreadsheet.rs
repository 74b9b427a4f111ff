use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use landed_core::submission::{DeliveryError, SpreadsheetRow, SpreadsheetSink};

/// Appends order rows by POSTing `{ "values": [...] }` to a sheet webhook
/// (for example a Google Apps Script web app bound to the orders sheet).
pub struct WebhookSpreadsheetSink {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct AppendRow<'a> {
    values: &'a [String],
}

impl WebhookSpreadsheetSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl SpreadsheetSink for WebhookSpreadsheetSink {
    async fn append_row(&self, row: &SpreadsheetRow) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.url)
            .json(&AppendRow { values: &row.values })
            .send()
            .await
            .map_err(|error| DeliveryError::Request(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }
        debug!(event_name = "spreadsheet.row_appended", columns = row.values.len(), "row appended");
        Ok(())
    }
}
