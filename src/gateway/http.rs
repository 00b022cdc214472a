use super::sse::{SseBuffer, parse_event_data_pairs};
use super::{AgentEvent, AgentEventStream, AgentGateway, AgentInput, ExtraDatum, InvokeResponse};
use crate::catalog::AgentId;
use crate::error::GatewayError;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Header carrying the gateway api key.
const AGENT_KEY_HEADER: &str = "x-agent-key";

/// Gateway client speaking the agent hosting protocol: one endpoint per
/// agent at `{scheme}://{host}/{name}/{version}`, unary JSON responses, and
/// an `/sse` sibling endpoint for streamed invocations.
pub struct HttpAgentGateway {
    client: Client,
    host: String,
    secure: bool,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PartialFrame {
    #[serde(default)]
    output_partial: String,
}

#[derive(Debug, Deserialize)]
struct ExtraDataFrame {
    #[serde(default)]
    items: Vec<ExtraDatum>,
}

#[derive(Debug, Deserialize)]
struct ErrorFrame {
    status_code: u16,
    #[serde(default)]
    detail: String,
}

impl HttpAgentGateway {
    pub fn new(host: impl Into<String>, secure: bool, api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                .pool_max_idle_per_host(10)
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_else(|_| Client::new()),
            host: host.into(),
            secure,
            api_key,
        }
    }

    fn endpoint(&self, agent: &AgentId) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!(
            "{scheme}://{host}/{name}/{version}",
            host = self.host,
            name = agent.name,
            version = agent.version
        )
    }

    fn sse_endpoint(&self, agent: &AgentId) -> String {
        format!("{}/sse", self.endpoint(agent))
    }

    async fn post(
        &self,
        endpoint: &str,
        agent: &AgentId,
        input: &AgentInput,
    ) -> Result<reqwest::Response, GatewayError> {
        let mut request = self.client.post(endpoint).json(input);
        if let Some(key) = &self.api_key {
            request = request.header(AGENT_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| GatewayError::Request {
            agent: agent.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                agent: agent.to_string(),
                status_code: status.as_u16(),
                detail,
            });
        }

        Ok(response)
    }
}

fn decode_wire_event(event_name: &str, data: &str) -> Result<Option<AgentEvent>, GatewayError> {
    let decode_err = |e: serde_json::Error| GatewayError::Decode(e.to_string());
    match event_name {
        "invoke-stream" => Ok(Some(AgentEvent::StreamStart)),
        "partial-response" => {
            let frame: PartialFrame = serde_json::from_str(data).map_err(decode_err)?;
            Ok(Some(AgentEvent::Partial {
                text: frame.output_partial,
            }))
        }
        "extra-data" => {
            let frame: ExtraDataFrame = serde_json::from_str(data).map_err(decode_err)?;
            Ok(Some(AgentEvent::ExtraData { items: frame.items }))
        }
        "final-response" => {
            let response: InvokeResponse = serde_json::from_str(data).map_err(decode_err)?;
            Ok(Some(AgentEvent::Final { response }))
        }
        "error" => {
            let frame: ErrorFrame = serde_json::from_str(data).map_err(decode_err)?;
            Ok(Some(AgentEvent::Error {
                status_code: frame.status_code,
                detail: frame.detail,
            }))
        }
        other => {
            tracing::warn!(event = other, "skipping unknown stream event");
            Ok(None)
        }
    }
}

#[async_trait]
impl AgentGateway for HttpAgentGateway {
    async fn invoke(
        &self,
        agent: &AgentId,
        input: &AgentInput,
    ) -> Result<InvokeResponse, GatewayError> {
        let response = self.post(&self.endpoint(agent), agent, input).await?;
        response
            .json::<InvokeResponse>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn invoke_stream(
        &self,
        agent: &AgentId,
        input: &AgentInput,
    ) -> Result<AgentEventStream, GatewayError> {
        let response = self.post(&self.sse_endpoint(agent), agent, input).await?;
        let mut body = response.bytes_stream();

        let stream = async_stream::try_stream! {
            let mut buffer = SseBuffer::new();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| GatewayError::Stream(e.to_string()))?;
                buffer.push_chunk(&chunk);
                while let Some(frame) = buffer.next_frame() {
                    for (event_name, data) in parse_event_data_pairs(&frame) {
                        let Some(event) = decode_wire_event(event_name, data)? else {
                            continue;
                        };
                        let terminal =
                            matches!(event, AgentEvent::Final { .. } | AgentEvent::Error { .. });
                        yield event;
                        if terminal {
                            return;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream) as AgentEventStream)
    }
}
