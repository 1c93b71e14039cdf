//! `fetch-weather` - looks up a city on the configured weather API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::core::{Result, ToolchatError};
use crate::mcp::{CallToolResult, ToolDescriptor};
use crate::tools::hosted::HostedTool;

pub const WEATHER_TOOL_NAME: &str = "fetch-weather";

pub struct WeatherTool {
    client: Client,
    api_url: Url,
}

impl WeatherTool {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let api_url = Url::parse(api_url)
            .map_err(|e| ToolchatError::config(format!("Invalid weather API URL {}: {}", api_url, e)))?;
        if api_url.cannot_be_a_base() {
            return Err(ToolchatError::config(format!(
                "Weather API URL {} cannot take a path",
                api_url
            )));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_url })
    }

    /// `<api_url>/<city>` with the city percent-encoded as one path segment
    fn city_url(&self, city: &str) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(city);
        }
        url
    }
}

#[async_trait]
impl HostedTool for WeatherTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: WEATHER_TOOL_NAME.to_string(),
            title: Some("Weather Fetcher".to_string()),
            description: "Get weather data for a city".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "city": { "type": "string" }
                },
                "required": ["city"],
                "additionalProperties": false
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<CallToolResult> {
        let city = arguments
            .get("city")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolchatError::invalid_input("fetch-weather requires a string `city`"))?;

        let url = self.city_url(city);
        debug!(%url, "Fetching weather");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolchatError::tool(format!("Weather API unreachable: {}", e)))?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ToolchatError::tool(format!("Weather API returned {}: {}", status, body)));
        }

        Ok(CallToolResult::text(body))
    }
}
