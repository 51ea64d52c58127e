//! Athena query engine over the JSON HTTP API
//!
//! Submits a statement with `StartQueryExecution`, polls
//! `GetQueryExecution` until it finishes, then pages through
//! `GetQueryResults`. Requests are signed with SigV4 using the credential
//! chain of the S3 client.

use super::engine::{QueryEngine, QueryResult};
use crate::config::TargetConfig;
use crate::error::{Error, Result};
use crate::output::build_s3;
use async_trait::async_trait;
use object_store::aws::{AwsAuthorizer, AwsCredentialProvider};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "AmazonAthena";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Athena client
#[derive(Debug)]
pub struct AthenaClient {
    http: Client,
    credentials: AwsCredentialProvider,
    region: String,
    endpoint: String,
    output_location: String,
    workgroup: Option<String>,
    poll_interval: Duration,
}

impl AthenaClient {
    /// Create a client from the target configuration
    pub fn from_config(config: &TargetConfig) -> Result<Self> {
        let s3 = build_s3(config)?;
        let region = config.region();
        Ok(Self {
            http: Client::builder()
                .user_agent(format!("target-athena/{}", env!("CARGO_PKG_VERSION")))
                .build()?,
            credentials: Arc::clone(s3.credentials()),
            endpoint: format!("https://athena.{region}.amazonaws.com/"),
            region,
            output_location: config.staging_dir(),
            workgroup: config.athena_workgroup.clone(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Set the interval between status polls
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the API endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn call(&self, action: &str, body: &Value) -> Result<Value> {
        let credential = self.credentials.get_credential().await?;

        let mut request = self
            .http
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{action}"))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(serde_json::to_vec(body)?)
            .build()?;
        AwsAuthorizer::new(&credential, "athena", &self.region).authorize(&mut request, None);

        let response = self.http.execute(request).await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::http_status(status.as_u16(), text));
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn start_request(&self, sql: &str) -> Value {
        // Statements are fully qualified, so the database may not exist yet
        let mut request = json!({
            "QueryString": sql,
            "ResultConfiguration": {"OutputLocation": self.output_location},
        });
        if let Some(workgroup) = &self.workgroup {
            request["WorkGroup"] = json!(workgroup);
        }
        request
    }

    async fn start(&self, sql: &str) -> Result<String> {
        let response = self
            .call("StartQueryExecution", &self.start_request(sql))
            .await
            .map_err(|e| Error::remote(sql, e.to_string()))?;
        response["QueryExecutionId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::remote(sql, "Response carries no QueryExecutionId"))
    }

    async fn wait(&self, execution_id: &str, sql: &str) -> Result<()> {
        let request = json!({"QueryExecutionId": execution_id});
        loop {
            let response = self.call("GetQueryExecution", &request).await?;
            let status = &response["QueryExecution"]["Status"];
            match status["State"].as_str().unwrap_or_default() {
                "SUCCEEDED" => return Ok(()),
                state @ ("FAILED" | "CANCELLED") => {
                    let reason = status["StateChangeReason"]
                        .as_str()
                        .unwrap_or("no reason given");
                    return Err(Error::remote(sql, format!("{state}: {reason}")));
                }
                state => {
                    debug!("Query {execution_id} is {state}");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn results(&self, execution_id: &str) -> Result<QueryResult> {
        let mut rows = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut request = json!({"QueryExecutionId": execution_id});
            if let Some(token) = &next_token {
                request["NextToken"] = json!(token);
            }
            let response = self.call("GetQueryResults", &request).await?;
            rows.extend(parse_rows(&response));

            next_token = response["NextToken"].as_str().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(QueryResult::new(rows))
    }
}

/// Cell texts of a `GetQueryResults` response
fn parse_rows(response: &Value) -> Vec<Vec<String>> {
    let Some(rows) = response["ResultSet"]["Rows"].as_array() else {
        warn!("GetQueryResults response without a result set");
        return Vec::new();
    };
    rows.iter()
        .map(|row| {
            row["Data"]
                .as_array()
                .map(|cells| {
                    cells
                        .iter()
                        .map(|cell| cell["VarCharValue"].as_str().unwrap_or_default().to_string())
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect()
}

#[async_trait]
impl QueryEngine for AthenaClient {
    fn name(&self) -> &str {
        "athena"
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        let execution_id = self.start(sql).await?;
        debug!("Started query {execution_id}");
        self.wait(&execution_id, sql).await?;
        self.results(&execution_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> AthenaClient {
        let mut config = TargetConfig::new("lake", "analytics");
        config.aws_region = Some("eu-west-1".to_string());
        config.aws_access_key_id = Some("AKIDEXAMPLE".to_string());
        config.aws_secret_access_key = Some("secret".to_string());
        config.s3_staging_dir = Some("s3://lake/results/".to_string());
        AthenaClient::from_config(&config).unwrap()
    }

    #[test]
    fn test_endpoint_from_region() {
        let client = client();
        assert_eq!(client.endpoint, "https://athena.eu-west-1.amazonaws.com/");
        assert_eq!(client.name(), "athena");
    }

    #[test]
    fn test_start_request() {
        let mut client = client();
        let request = client.start_request("SHOW TABLES IN analytics 'users';");
        assert_eq!(request["QueryString"], "SHOW TABLES IN analytics 'users';");
        assert!(request.get("QueryExecutionContext").is_none());
        assert_eq!(
            request["ResultConfiguration"]["OutputLocation"],
            "s3://lake/results/"
        );
        assert!(request.get("WorkGroup").is_none());

        client.workgroup = Some("etl".to_string());
        assert_eq!(client.start_request("SELECT 1")["WorkGroup"], "etl");
    }

    #[test]
    fn test_parse_rows() {
        let response = json!({
            "ResultSet": {
                "Rows": [
                    {"Data": [{"VarCharValue": "users"}]},
                    {"Data": [{"VarCharValue": "orders"}, {}]}
                ]
            }
        });
        assert_eq!(
            parse_rows(&response),
            vec![
                vec!["users".to_string()],
                vec!["orders".to_string(), String::new()]
            ]
        );
        assert!(parse_rows(&json!({})).is_empty());
    }

    // ========================================================================
    // Execution against a mock endpoint
    // ========================================================================

    fn mock_client(server: &MockServer) -> AthenaClient {
        client()
            .with_endpoint(format!("{}/", server.uri()))
            .with_poll_interval(Duration::from_millis(1))
    }

    fn action(name: &str) -> wiremock::MockBuilder {
        Mock::given(method("POST")).and(header("X-Amz-Target", format!("AmazonAthena.{name}")))
    }

    fn state(state: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "QueryExecution": {"Status": {"State": state, "StateChangeReason": "line 1:8 mismatched input"}}
        }))
    }

    async fn mount_start(server: &MockServer) {
        action("StartQueryExecution")
            .and(body_partial_json(json!({"QueryString": "SHOW TABLES IN analytics 'users';"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"QueryExecutionId": "q-1"})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_execute_polls_until_succeeded_and_pages_results() {
        let server = MockServer::start().await;
        mount_start(&server).await;

        action("GetQueryExecution")
            .respond_with(state("RUNNING"))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        action("GetQueryExecution")
            .respond_with(state("SUCCEEDED"))
            .expect(1)
            .mount(&server)
            .await;

        action("GetQueryResults")
            .and(body_partial_json(json!({"QueryExecutionId": "q-1", "NextToken": "page-2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ResultSet": {"Rows": [{"Data": [{"VarCharValue": "users_archive"}]}]}
            })))
            .expect(1)
            .mount(&server)
            .await;
        action("GetQueryResults")
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ResultSet": {"Rows": [{"Data": [{"VarCharValue": "users"}]}]},
                "NextToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let rows = mock_client(&server)
            .execute("SHOW TABLES IN analytics 'users';")
            .await
            .unwrap()
            .fetch_all();

        assert_eq!(
            rows,
            vec![vec!["users".to_string()], vec!["users_archive".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_failed_and_cancelled_queries_are_remote_errors() {
        for final_state in ["FAILED", "CANCELLED"] {
            let server = MockServer::start().await;
            mount_start(&server).await;
            action("GetQueryExecution")
                .respond_with(state(final_state))
                .mount(&server)
                .await;
            action("GetQueryResults")
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
                .expect(0)
                .mount(&server)
                .await;

            let err = mock_client(&server)
                .execute("SHOW TABLES IN analytics 'users';")
                .await
                .unwrap_err();

            match err {
                Error::RemoteExecution { statement, message } => {
                    assert_eq!(statement, "SHOW TABLES IN analytics 'users';");
                    assert_eq!(message, format!("{final_state}: line 1:8 mismatched input"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_rejected_start_is_remote_error() {
        let server = MockServer::start().await;
        action("StartQueryExecution")
            .respond_with(ResponseTemplate::new(400).set_body_string("InvalidRequestException"))
            .mount(&server)
            .await;

        let err = mock_client(&server)
            .execute("CREATE DATABASE IF NOT EXISTS analytics;")
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::RemoteExecution { ref message, .. } if message.contains("InvalidRequestException")),
            "{err}"
        );
    }
}
