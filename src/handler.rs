use std::fmt;

use aws_config::SdkConfig;
use aws_sdk_sns::error::{CreateTopicError, PublishError};
use aws_sdk_sns::types::SdkError;
use chrono::Utc;
use derive_builder::Builder;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_TOPIC: &str = "test";

/// What one invocation reports back to the wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("Succeeded"),
            Self::Failed => f.write_str("Failed"),
        }
    }
}

/// Faults that keep the handler from reaching a verdict. A publish the
/// service answered with a non-200 is not a fault; it comes back as
/// `Outcome::Failed`.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("could not resolve topic {name:?}")]
    Topic {
        name: String,
        #[source]
        source: SdkError<CreateTopicError>,
    },

    #[error("topic {name:?} resolved without an ARN")]
    TopicArnMissing { name: String },

    #[error("publish request got no answer from the notification service")]
    Transport(#[source] SdkError<PublishError>),
}

#[derive(Builder)]
pub struct Handler {
    sns: aws_sdk_sns::Client,
    #[builder(setter(into), default = "DEFAULT_TOPIC.to_string()")]
    topic_name: String,
}

impl Handler {
    /// Handler wired to the caller-provided AWS configuration. Use
    /// [`HandlerBuilder`] to swap in a custom client or topic name.
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            sns: aws_sdk_sns::Client::new(config),
            topic_name: DEFAULT_TOPIC.to_string(),
        }
    }

    pub async fn handle(&self, input: &str) -> Result<Outcome, HandlerError> {
        let topic_arn = self.ensure_topic().await?;

        let message = format!(
            "Published from Lambda-like ECS task: \nInput: {}\n{}",
            input,
            Utc::now()
        );

        match self
            .sns
            .publish()
            .topic_arn(topic_arn)
            .message(message)
            .send()
            .await
        {
            Ok(resp) => {
                debug!("published message {:?}", resp.message_id());
                Ok(Outcome::Succeeded)
            }
            // The service answered with a non-200; the handler declined.
            Err(SdkError::ServiceError(_)) => Ok(Outcome::Failed),
            Err(err) => Err(HandlerError::Transport(err)),
        }
    }

    /// Create-or-get: SNS returns the ARN of an existing topic with the
    /// same name instead of failing.
    async fn ensure_topic(&self) -> Result<String, HandlerError> {
        let resp = self
            .sns
            .create_topic()
            .name(&self.topic_name)
            .send()
            .await
            .map_err(|source| HandlerError::Topic {
                name: self.topic_name.clone(),
                source,
            })?;

        let topic_arn = resp
            .topic_arn()
            .map(str::to_string)
            .ok_or_else(|| HandlerError::TopicArnMissing {
                name: self.topic_name.clone(),
            })?;

        info!("resolved topic {}", topic_arn);

        Ok(topic_arn)
    }
}
