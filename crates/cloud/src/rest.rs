//! Blocking [`SessionProvider`] over the compute service's REST API.
//!
//! Wraps the async [`HttpClient`] with a Tokio runtime so the engine can stay
//! synchronous. Not usable from inside another Tokio runtime.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use geoclass_core::SourceValue;

use crate::auth::CloudAuth;
use crate::error::{CloudError, Result};
use crate::http::HttpClient;
use crate::payload::{
    distinct_values, histogram_keys, AssetInfo, ComputeRequest, ComputeResponse, ExportRequest,
    Expression, ExpressionResponse, ListAssetsResponse, Operation,
};
use crate::session::{
    AssetHandle, AssetKind, ExportOptions, JobReference, JobStatus, LookupExpression, SessionProvider,
};

/// Timeouts and retry policy for remote round trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Limit for histogram / distinct-value requests (default 30 s).
    pub enumerate_timeout: Duration,
    /// Limit for remap, map and export submissions (default 120 s).
    pub submit_timeout: Duration,
    /// Limit for catalog lookups and job polling (default 30 s).
    pub status_timeout: Duration,
    /// Maximum retries on transient failures (default 3).
    pub max_retries: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            enumerate_timeout: Duration::from_secs(30),
            submit_timeout: Duration::from_secs(120),
            status_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Run `fut`, failing with [`CloudError::Timeout`] once `limit` elapses.
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(CloudError::Timeout {
            operation: operation.to_string(),
            timeout: limit,
        }),
    }
}

/// Session backed by HTTP calls to `endpoint`.
pub struct RestSession {
    rt: tokio::runtime::Runtime,
    http: HttpClient,
    endpoint: String,
    auth: Box<dyn CloudAuth>,
    options: SessionOptions,
}

impl std::fmt::Debug for RestSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestSession")
            .field("endpoint", &self.endpoint)
            .field("options", &self.options)
            .finish()
    }
}

impl RestSession {
    /// Connect to `endpoint` (e.g. `https://compute.example.com/v1/projects/demo`).
    pub fn new(endpoint: impl Into<String>, auth: Box<dyn CloudAuth>, options: SessionOptions) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CloudError::Network(e.to_string()))?;

        let request_timeout = options
            .submit_timeout
            .max(options.enumerate_timeout)
            .max(options.status_timeout);
        let http = HttpClient::new(request_timeout, options.max_retries)?;

        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(CloudError::Network("empty endpoint".into()));
        }

        Ok(Self {
            rt,
            http,
            endpoint,
            auth,
            options,
        })
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    fn call<T, F>(&self, operation: &str, limit: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tracing::debug!(operation, ?limit, "remote call");
        self.rt.block_on(with_timeout(operation, limit, fut))
    }

    fn asset_info(&self, asset_id: &str) -> Result<AssetInfo> {
        let url = self.url(&format!("assets/{asset_id}"));
        self.call(
            "asset lookup",
            self.options.status_timeout,
            self.http.get_json(&url, self.auth.as_ref()),
        )
        .map_err(|e| match e {
            CloudError::NotFound(_) => CloudError::NotFound(asset_id.to_string()),
            other => other,
        })
    }

    fn compute(&self, operation: &str, expression: &Expression) -> Result<serde_json::Value> {
        let url = self.url("value:compute");
        let body = ComputeRequest { expression };
        let resp: ComputeResponse = self.call(
            operation,
            self.options.enumerate_timeout,
            self.http.post_json(&url, &body, self.auth.as_ref()),
        )?;
        Ok(resp.result)
    }

    fn register(&self, operation: &str, expression: &Expression) -> Result<AssetHandle> {
        let url = self.url("expressions");
        let body = ComputeRequest { expression };
        let resp: ExpressionResponse = self.call(
            operation,
            self.options.submit_timeout,
            self.http.post_json(&url, &body, self.auth.as_ref()),
        )?;
        Ok(AssetHandle {
            id: resp.name,
            nominal_scale: resp.nominal_scale,
        })
    }
}

impl SessionProvider for RestSession {
    fn asset_kind(&self, asset_id: &str) -> Result<AssetKind> {
        Ok(AssetKind::from_type_name(&self.asset_info(asset_id)?.kind))
    }

    fn list_bands(&self, asset_id: &str) -> Result<Vec<String>> {
        let info = self.asset_info(asset_id)?;
        match AssetKind::from_type_name(&info.kind) {
            AssetKind::Image => Ok(info.bands.into_iter().map(|b| b.id).collect()),
            AssetKind::Table => Ok(info.columns),
            _ => Err(CloudError::UnknownAssetType {
                asset_id: asset_id.to_string(),
                kind: info.kind,
            }),
        }
    }

    fn enumerate_remote(&self, asset_id: &str, band_or_column: &str) -> Result<BTreeSet<SourceValue>> {
        match self.asset_kind(asset_id)? {
            AssetKind::Image => {
                let expr = Expression::FrequencyHistogram {
                    asset: asset_id.to_string(),
                    band: band_or_column.to_string(),
                    max_pixels: 1e13,
                };
                histogram_keys(&self.compute("frequency histogram", &expr)?)
            }
            AssetKind::Table => {
                let expr = Expression::AggregateDistinct {
                    asset: asset_id.to_string(),
                    column: band_or_column.to_string(),
                };
                distinct_values(&self.compute("aggregate distinct", &expr)?)
            }
            other => Err(CloudError::UnknownAssetType {
                asset_id: asset_id.to_string(),
                kind: other.to_string(),
            }),
        }
    }

    fn remap_remote_image(
        &self,
        asset_id: &str,
        band: &str,
        from: &[i64],
        to: &[i64],
        default_value: i64,
    ) -> Result<AssetHandle> {
        let expr = Expression::Remap {
            asset: asset_id.to_string(),
            band: band.to_string(),
            from: from.to_vec(),
            to: to.to_vec(),
            default_value,
        };
        self.register("remap", &expr)
    }

    fn set_image_properties(
        &self,
        image: &AssetHandle,
        properties: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<AssetHandle> {
        let expr = Expression::SetProperties {
            input: image.id.clone(),
            properties: properties.clone(),
        };
        let mut handle = self.register("set properties", &expr)?;
        handle.nominal_scale = handle.nominal_scale.or(image.nominal_scale);
        Ok(handle)
    }

    fn map_remote_collection(
        &self,
        asset_id: &str,
        column: &str,
        expression: &LookupExpression,
    ) -> Result<AssetHandle> {
        let expr = Expression::MapLookup {
            asset: asset_id.to_string(),
            column: column.to_string(),
            output_column: expression.output_column.clone(),
            from: expression.from.clone(),
            to: expression.to.clone(),
            default_value: expression.default_value,
        };
        self.register("map collection", &expr)
    }

    fn export(&self, asset: &AssetHandle, destination: &str, options: &ExportOptions) -> Result<JobReference> {
        let url = self.url("exports");
        let body = ExportRequest::new(&asset.id, destination, options);
        let op: Operation = self.call(
            "export submission",
            self.options.submit_timeout,
            self.http.post_json(&url, &body, self.auth.as_ref()),
        )?;
        let mut job = op.job_reference();
        if job.destination.is_empty() {
            job.destination = destination.to_string();
        }
        if job.description.is_empty() {
            job.description = options.description.clone();
        }
        tracing::info!(job = %job.id, destination, "export submitted");
        Ok(job)
    }

    fn job_status(&self, job: &JobReference) -> Result<JobStatus> {
        let url = self.url(&job.id);
        let op: Operation = self.call(
            "job status",
            self.options.status_timeout,
            self.http.get_json(&url, self.auth.as_ref()),
        )?;
        op.status()
    }

    fn cancel(&self, job: &JobReference) -> Result<()> {
        let url = self.url(&format!("{}:cancel", job.id));
        let _: serde_json::Value = self.call(
            "job cancel",
            self.options.status_timeout,
            self.http
                .post_json(&url, &serde_json::json!({}), self.auth.as_ref()),
        )?;
        Ok(())
    }

    fn list_assets(&self, folder: &str) -> Result<Vec<String>> {
        let url = self.url(&format!("assets/{}:listAssets", folder.trim_end_matches('/')));
        let resp: ListAssetsResponse = self.call(
            "list assets",
            self.options.status_timeout,
            self.http.get_json(&url, self.auth.as_ref()),
        )?;
        Ok(resp.assets.into_iter().map(|a| a.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoAuth;

    #[tokio::test]
    async fn test_with_timeout_reports_operation() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, CloudError>(())
        };
        let err = with_timeout("frequency histogram", Duration::from_millis(10), slow)
            .await
            .unwrap_err();
        match err {
            CloudError::Timeout { operation, timeout } => {
                assert_eq!(operation, "frequency histogram");
                assert_eq!(timeout, Duration::from_millis(10));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result() {
        let value = with_timeout("x", Duration::from_secs(1), async { Ok::<_, CloudError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_default_options() {
        let opts = SessionOptions::default();
        assert_eq!(opts.enumerate_timeout, Duration::from_secs(30));
        assert_eq!(opts.submit_timeout, Duration::from_secs(120));
        assert_eq!(opts.max_retries, 3);
    }

    #[test]
    fn test_endpoint_normalized() {
        let session = RestSession::new("https://compute.example.com/v1/", Box::new(NoAuth), SessionOptions::default())
            .unwrap();
        assert_eq!(
            session.url("/assets/users/me/lc"),
            "https://compute.example.com/v1/assets/users/me/lc"
        );
        assert!(RestSession::new("", Box::new(NoAuth), SessionOptions::default()).is_err());
    }

    #[test]
    fn test_unreachable_backend_is_an_error() {
        let opts = SessionOptions {
            max_retries: 0,
            status_timeout: Duration::from_secs(2),
            ..SessionOptions::default()
        };
        let session = RestSession::new("http://127.0.0.1:9", Box::new(NoAuth), opts).unwrap();
        let err = session.asset_kind("users/me/lc").unwrap_err();
        let core: geoclass_core::Error = err.into();
        assert!(matches!(
            core,
            geoclass_core::Error::BackendUnavailable(_) | geoclass_core::Error::BackendTimeout { .. }
        ));
    }
}
