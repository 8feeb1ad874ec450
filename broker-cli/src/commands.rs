use anyhow::{anyhow, Context, Result};
use broker_core::token::{TokenAuthority, TokenSecret, SCOPE_WILDCARD};
use serde_json::Value;
use std::time::Duration;

fn token_secret_from_env() -> Result<Vec<u8>> {
    std::env::var("TOKEN_SECRET")
        .map(String::into_bytes)
        .context("TOKEN_SECRET environment variable is required")
}

/// Issue a session token locally. Token issuance needs only the shared
/// secret, so this runs entirely in-process without a running server —
/// the token format is independent of any server-side state (spec.md §5,
/// "Resource lifetimes").
pub fn issue_token(
    user_id: &str,
    conversation_id: &str,
    sandbox_id: &str,
    scopes: Vec<String>,
) -> Result<()> {
    let secret = TokenSecret::new(token_secret_from_env()?).map_err(|e| anyhow!(e))?;
    let authority = TokenAuthority::new(secret, Duration::from_secs(300), "dynamiq-broker");

    let scopes = if scopes.is_empty() {
        vec![SCOPE_WILDCARD.to_string()]
    } else {
        scopes
    };
    let scope_refs: Vec<&str> = scopes.iter().map(String::as_str).collect();

    let (token, expires_at) = authority
        .issue(user_id, conversation_id, sandbox_id, &scope_refs)
        .map_err(|e| anyhow!(e))?;

    log::debug!("issued token for user={user_id} conversation={conversation_id} scopes={scopes:?}");
    println!("{token}");
    eprintln!("expires_at: {expires_at}");
    Ok(())
}

pub async fn list_providers(base_url: &str) -> Result<()> {
    let response = reqwest::get(format!("{base_url}/providers"))
        .await
        .context("listing providers")?;
    print_response(response).await
}

pub async fn call_tool(base_url: &str, token: &str, app: &str, tool: &str, input: &str) -> Result<()> {
    let input: Value = serde_json::from_str(input).context("parsing --input as JSON")?;
    let body = serde_json::json!({
        "method": "call_tool",
        "app": app,
        "tool": tool,
        "input": input,
    });

    let response = reqwest::Client::new()
        .post(format!("{base_url}/proxy"))
        .header("x-dynamiq-session-token", token)
        .json(&body)
        .send()
        .await
        .context("calling tool via proxy")?;
    print_response(response).await
}

#[allow(clippy::too_many_arguments)]
pub async fn vend_cloud_credential(
    base_url: &str,
    token: &str,
    role_arn: Option<String>,
    external_id: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    region: Option<String>,
    duration_seconds: Option<u32>,
) -> Result<()> {
    let body = serde_json::json!({
        "role_arn": role_arn,
        "external_id": external_id,
        "access_key_id": access_key_id,
        "secret_access_key": secret_access_key,
        "region": region,
        "duration_seconds": duration_seconds,
    });

    let response = reqwest::Client::new()
        .post(format!("{base_url}/cloud/vend"))
        .header("x-dynamiq-session-token", token)
        .json(&body)
        .send()
        .await
        .context("vending cloud credentials")?;
    print_response(response).await
}

pub async fn whoami(base_url: &str, token: &str) -> Result<()> {
    let response = reqwest::Client::new()
        .get(format!("{base_url}/cloud/whoami"))
        .header("x-dynamiq-session-token", token)
        .send()
        .await
        .context("resolving caller identity")?;
    print_response(response).await
}

async fn print_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let body: Value = response.json().await.context("decoding response body")?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        return Err(anyhow!("request failed: {status}"));
    }
    Ok(())
}
