//! Delivery of calculation results to a mail-sending endpoint.
//!
//! The endpoint receives a JSON document and answers with a status code.
//! Each send is a single request: no retry, no backoff, no queue.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::domain::Estimate;
use crate::error::DeliveryError;

/// Configuration for the HTTP mail sender.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// URL the payload is posted to.
    pub endpoint: String,
    /// Request timeout (default: 10 seconds).
    pub timeout: Duration,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8888/.netlify/functions/send-email".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// A percentage row as sent by email, weight already formatted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentageLine {
    pub percentage: u32,
    pub weight: String,
}

/// JSON document posted to the mail endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailPayload {
    pub name: String,
    pub email: String,
    #[serde(rename = "oneRM")]
    pub one_rm: String,
    pub percentages: Vec<PercentageLine>,
    pub weight: f64,
    pub reps: u32,
    pub formula: String,
    pub exercise: String,
}

impl EmailPayload {
    pub fn new(name: &str, email: &str, exercise: &str, estimate: &Estimate) -> Self {
        let percentages = estimate
            .percentages
            .iter()
            .map(|p| PercentageLine {
                percentage: p.percentage,
                weight: p.display_weight(),
            })
            .collect();

        Self {
            name: name.to_string(),
            email: email.to_string(),
            one_rm: estimate.display_one_rm(),
            percentages,
            weight: estimate.input.weight_kg(),
            reps: estimate.input.reps(),
            formula: estimate.input.formula().name().to_string(),
            exercise: exercise.to_string(),
        }
    }
}

/// Sends a payload to whoever delivers the email.
pub trait EmailSender: Send + Sync + 'static {
    fn send(&self, payload: &EmailPayload)
    -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Posts the payload as JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEmailSender {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEmailSender {
    pub fn new(config: &MailerConfig) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl EmailSender for HttpEmailSender {
    async fn send(&self, payload: &EmailPayload) -> Result<(), DeliveryError> {
        let response = self.client.post(&self.endpoint).json(payload).send().await?;

        let status = response.status();
        if status.is_success() {
            log::info!("Email with 1RM {} kg sent to {}", payload.one_rm, payload.email);
            Ok(())
        } else {
            log::warn!("Mail endpoint answered {}", status);
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
