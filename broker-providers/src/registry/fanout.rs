//! Concurrent fan-out of `list_connected_apps` across every registered
//! adapter (spec.md §4.4, "ListConnectedApps fan-out"; §8, scenario 6).

use std::sync::Arc;

use broker_core::error::{BrokerError, BrokerResult};
use broker_core::types::ConnectedApp;
use futures::future::join_all;

use super::super::adapter::ProviderAdapter;

/// Query every adapter concurrently. Tag each result with its source
/// provider and prefix the display name with `[provider-name]`. Errors
/// from individual adapters are logged and dropped as long as at least
/// one adapter succeeded; if every adapter failed, the combined error
/// carries each adapter's failure reason.
pub async fn list_connected_apps_fanout(
    adapters: Vec<(String, Arc<dyn ProviderAdapter>)>,
    user_id: &str,
) -> BrokerResult<Vec<ConnectedApp>> {
    let futures = adapters.into_iter().map(|(name, adapter)| {
        let user_id = user_id.to_string();
        async move {
            let result = adapter.list_connected_apps(&user_id).await;
            (name, result)
        }
    });

    let results = join_all(futures).await;

    let mut apps = Vec::new();
    let mut failures = Vec::new();
    let mut any_succeeded = false;

    for (name, result) in results {
        match result {
            Ok(connected) => {
                any_succeeded = true;
                for mut app in connected {
                    app.display_name = format!("[{name}] {}", app.display_name);
                    apps.push(app);
                }
            }
            Err(err) => {
                log::warn!("provider {name} failed list_connected_apps: {err}");
                failures.push(format!("{name}: {err}"));
            }
        }
    }

    if any_succeeded || failures.is_empty() {
        Ok(apps)
    } else {
        Err(BrokerError::UpstreamFailed(format!(
            "all providers failed: {}",
            failures.join("; ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use broker_core::types::{ConnectToken, ToolCallOutcome, ToolDescriptor};
    use serde_json::Value;

    struct StubAdapter {
        apps: BrokerResult<Vec<ConnectedApp>>,
    }

    fn err_clone(err: &BrokerError) -> BrokerError {
        BrokerError::UpstreamFailed(err.to_string())
    }

    #[async_trait]
    impl ProviderAdapter for StubAdapter {
        fn info(&self) -> crate::adapter::ProviderInfo {
            unimplemented!()
        }
        async fn list_tools(&self, _: &str, _: &str) -> BrokerResult<Vec<ToolDescriptor>> {
            unimplemented!()
        }
        async fn call_tool(&self, _: &str, _: &str, _: &str, _: Value) -> BrokerResult<ToolCallOutcome> {
            unimplemented!()
        }
        async fn get_connect_token(
            &self,
            _: &str,
            _: Option<&str>,
            _: Option<&str>,
        ) -> BrokerResult<ConnectToken> {
            unimplemented!()
        }
        async fn list_connected_apps(&self, _: &str) -> BrokerResult<Vec<ConnectedApp>> {
            match &self.apps {
                Ok(apps) => Ok(apps.clone()),
                Err(e) => Err(err_clone(e)),
            }
        }
    }

    fn app(slug: &str) -> ConnectedApp {
        ConnectedApp {
            provider: "ignored".to_string(),
            app_slug: slug.to_string(),
            remote_account_id: "acct-1".to_string(),
            display_name: "Gmail".to_string(),
        }
    }

    #[tokio::test]
    async fn union_of_successful_adapters_tagged_with_source() {
        let adapters: Vec<(String, std::sync::Arc<dyn ProviderAdapter>)> = vec![
            (
                "aggA".to_string(),
                std::sync::Arc::new(StubAdapter {
                    apps: Ok(vec![app("gmail")]),
                }),
            ),
            (
                "aggB".to_string(),
                std::sync::Arc::new(StubAdapter {
                    apps: Err(BrokerError::UpstreamFailed("down".to_string())),
                }),
            ),
        ];

        let result = list_connected_apps_fanout(adapters, "user-1").await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].display_name, "[aggA] Gmail");
    }

    #[tokio::test]
    async fn all_failing_surfaces_combined_error() {
        let adapters: Vec<(String, std::sync::Arc<dyn ProviderAdapter>)> = vec![(
            "aggA".to_string(),
            std::sync::Arc::new(StubAdapter {
                apps: Err(BrokerError::UpstreamFailed("down".to_string())),
            }),
        )];

        let err = list_connected_apps_fanout(adapters, "user-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "upstream-failed");
        assert!(err.to_string().contains("aggA"));
    }
}
