//! Small HTTP helper shared by the LLM-backed evaluators.

use localrouter_core::{GatewayError, GatewayResult};
use tracing::trace;

/// POST a JSON body and return the response bytes after a status check.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    evaluator: &str,
    endpoint: &str,
    body: &serde_json::Value,
) -> GatewayResult<Vec<u8>> {
    trace!(evaluator, request = %body, "evaluator request");

    let response = client.post(endpoint).json(body).send().await?;
    let status = response.status();
    let bytes = response.bytes().await?;

    if status != reqwest::StatusCode::OK {
        return Err(GatewayError::upstream_status(
            evaluator,
            status.as_u16(),
            String::from_utf8_lossy(&bytes).into_owned(),
        ));
    }

    trace!(evaluator, response = %String::from_utf8_lossy(&bytes), "evaluator response");
    Ok(bytes.to_vec())
}
