use anyhow::{Context, Result};
use aws_config::imds::client::Client as ImdsClient;
use aws_config::SdkConfig;
use tracing::{debug, info};

const INSTANCE_ID_PATH: &str = "/latest/meta-data/instance-id";

/// Look up the id of the instance this process runs on and ask EC2 to
/// terminate it.
pub async fn terminate_current(config: &SdkConfig) -> Result<()> {
    let imds = ImdsClient::builder()
        .build()
        .await
        .context("could not reach the instance metadata service")?;

    let instance_id = instance_id(&imds).await?;

    info!("requesting termination of {}", instance_id);

    terminate(&aws_sdk_ec2::Client::new(config), &instance_id).await
}

async fn instance_id(imds: &ImdsClient) -> Result<String> {
    imds.get(INSTANCE_ID_PATH)
        .await
        .context("could not read the instance id from instance metadata")
}

/// Last action of the process: returns once EC2 has accepted the
/// request, not once the instance is gone. The instance being
/// terminated is the one hosting this process, so nothing after this
/// call is guaranteed to run.
pub async fn terminate(ec2: &aws_sdk_ec2::Client, instance_id: &str) -> Result<()> {
    let resp = ec2
        .terminate_instances()
        .instance_ids(instance_id)
        .send()
        .await
        .with_context(|| format!("termination request for {instance_id} was not accepted"))?;

    debug!("instance state changes: {:?}", resp.terminating_instances());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_config::retry::RetryConfig;
    use aws_sdk_ec2::{Credentials, Region};
    use http::Uri;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const INSTANCE_ID: &str = "i-1234567890abcdef0";

    #[tokio::test]
    async fn test_instance_id_from_metadata() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/latest/api/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-aws-ec2-metadata-token-ttl-seconds", "21600")
                    .set_body_string("imds-token"),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(INSTANCE_ID_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(INSTANCE_ID))
            .expect(1)
            .mount(&server)
            .await;

        let imds = ImdsClient::builder()
            .endpoint(server.uri().parse::<Uri>().unwrap())
            .build()
            .await
            .unwrap();

        assert_eq!(instance_id(&imds).await.unwrap(), INSTANCE_ID);
    }

    #[tokio::test]
    async fn test_terminate_requests_exactly_one_instance() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_string_contains("Action=TerminateInstances"))
            .and(body_string_contains(format!("InstanceId.1={INSTANCE_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                format!(
                    "<TerminateInstancesResponse xmlns=\"http://ec2.amazonaws.com/doc/2016-11-15/\">\
                     <requestId>59dbff89-35bd-4eac-99ed-be587EXAMPLE</requestId>\
                     <instancesSet><item>\
                     <instanceId>{INSTANCE_ID}</instanceId>\
                     <currentState><code>32</code><name>shutting-down</name></currentState>\
                     <previousState><code>16</code><name>running</name></previousState>\
                     </item></instancesSet>\
                     </TerminateInstancesResponse>"
                ),
                "text/xml",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let config = aws_config::from_env()
            .endpoint_url(server.uri())
            .region(Region::new("us-east-2"))
            .credentials_provider(Credentials::new("akid", "secret", None, None, "test"))
            .retry_config(RetryConfig::disabled())
            .load()
            .await;

        terminate(&aws_sdk_ec2::Client::new(&config), INSTANCE_ID)
            .await
            .unwrap();
    }
}
