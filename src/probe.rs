//! Challenge probing: the unpaid request and the HTTP plumbing shared with the paid retry.

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::Instrument;
use url::Url;
use x402_types::proto::{ACCESS_CONTROL_EXPOSE_HEADERS, X_PAYMENT_HEADER, X_PAYMENT_RESPONSE_HEADER};

/// A response body, kept both raw and parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseBody {
    pub text: String,
    /// `None` for an empty body, the JSON value when the body parses, the text otherwise.
    pub parsed: Option<Value>,
}

impl ResponseBody {
    pub fn from_text(text: String) -> Self {
        let parsed = if text.is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.clone())))
        };
        Self { text, parsed }
    }
}

/// What came back for one request.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub status: StatusCode,
    pub body: ResponseBody,
    /// Raw `X-PAYMENT-RESPONSE` header value, if the server sent one.
    pub payment_response: Option<String>,
}

/// The unpaid request either completed or asked for payment.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Completed(Exchange),
    PaymentRequired(Exchange),
}

/// Sends the configured request to the paid resource.
#[derive(Debug, Clone)]
pub struct ResourceClient {
    client: Client,
    url: Url,
    method: Method,
}

impl ResourceClient {
    pub fn new(client: Client, url: Url, method: Method) -> Self {
        Self {
            client,
            url,
            method,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Sends the request, with `payment` as the `X-PAYMENT` header when given.
    ///
    /// Only transport failures are errors. Any status, 402 included, is an [`Exchange`].
    pub async fn send(&self, payment: Option<HeaderValue>) -> Result<Exchange, reqwest::Error> {
        let mut headers = HeaderMap::new();
        let paid = payment.is_some();
        if let Some(payment) = payment {
            headers.insert(X_PAYMENT_HEADER, payment);
            headers.insert(
                ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_static(X_PAYMENT_RESPONSE_HEADER),
            );
        }
        let span = tracing::info_span!(
            "resource_request",
            method = %self.method,
            url = %self.url,
            paid,
            otel.kind = "client"
        );
        let response = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(headers)
            .send()
            .instrument(span)
            .await?;

        let status = response.status();
        let payment_response = response
            .headers()
            .get(X_PAYMENT_RESPONSE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, %status, "Unable to read response body");
                String::new()
            }
        };
        Ok(Exchange {
            status,
            body: ResponseBody::from_text(text),
            payment_response,
        })
    }

    /// Sends the unpaid request.
    pub async fn probe(&self) -> Result<ProbeOutcome, reqwest::Error> {
        let exchange = self.send(None).await?;
        if exchange.status == StatusCode::PAYMENT_REQUIRED {
            tracing::debug!(url = %self.url, "Received payment challenge");
            Ok(ProbeOutcome::PaymentRequired(exchange))
        } else {
            Ok(ProbeOutcome::Completed(exchange))
        }
    }
}
