use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

type HmacSha1 = Hmac<Sha1>;

/// Response fields we care about when placing a call.
#[derive(Debug, Deserialize)]
pub struct TwilioCallStatus {
    pub sid: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct SendSmsResponse {
    sid: String,
}

#[derive(Debug, Clone)]
pub struct TwilioClient {
    client: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioClient {
    pub fn new(account_sid: &str, auth_token: &str, from_number: &str) -> Self {
        Self {
            client: Client::new(),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            from_number: from_number.to_string(),
        }
    }

    /// Place an outbound PSTN call.
    ///
    /// `voice_url` serves the call's TwiML (the AI voice agent bridge);
    /// `status_callback` receives lifecycle status updates including the
    /// terminal one that drives settlement.
    pub async fn place_call(
        &self,
        to: &str,
        voice_url: &str,
        status_callback: &str,
    ) -> Result<TwilioCallStatus> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Calls.json",
            self.account_sid
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", to),
                ("From", self.from_number.as_str()),
                ("Url", voice_url),
                ("StatusCallback", status_callback),
                ("StatusCallbackEvent", "completed"),
                ("StatusCallbackMethod", "POST"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Twilio API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("Twilio API error: {}", error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Twilio response: {}", e)))
    }

    /// Send an SMS (verification codes).
    pub async fn send_sms(&self, to: &str, body: &str) -> Result<String> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Twilio API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("Twilio API error: {}", error_text)));
        }

        let message: SendSmsResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Twilio response: {}", e)))?;

        Ok(message.sid)
    }

    /// Validate an `X-Twilio-Signature` header.
    ///
    /// Twilio signs the full callback URL followed by each POSTed form
    /// parameter, sorted by name, as `name` then `value` with no separators.
    /// The HMAC-SHA1 digest is base64 encoded.
    pub fn validate_signature(
        &self,
        url: &str,
        params: &[(String, String)],
        signature: &str,
    ) -> Result<bool> {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut data = String::from(url);
        for (name, value) in sorted {
            data.push_str(name);
            data.push_str(value);
        }

        let mut mac = HmacSha1::new_from_slice(self.auth_token.as_bytes())
            .map_err(|_| AppError::Internal("Invalid Twilio auth token".into()))?;
        mac.update(data.as_bytes());
        let expected = BASE64.encode(mac.finalize().into_bytes());

        let expected_bytes = expected.as_bytes();
        let provided_bytes = signature.as_bytes();

        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }

        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(auth_token: &str, url: &str, params: &[(&str, &str)]) -> String {
        let mut sorted: Vec<_> = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let mut data = String::from(url);
        for (name, value) in sorted {
            data.push_str(name);
            data.push_str(value);
        }
        let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes()).unwrap();
        mac.update(data.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    fn client() -> TwilioClient {
        TwilioClient::new("AC123", "secret-token", "+15550001111")
    }

    #[test]
    fn accepts_valid_signature() {
        let url = "https://api.example.com/webhooks/twilio/call-status?call_id=abc";
        let params = vec![
            ("CallSid".to_string(), "CA123".to_string()),
            ("CallStatus".to_string(), "completed".to_string()),
        ];
        let header = sign(
            "secret-token",
            url,
            &[("CallSid", "CA123"), ("CallStatus", "completed")],
        );

        assert!(client().validate_signature(url, &params, &header).unwrap());
    }

    #[test]
    fn rejects_tampered_params() {
        let url = "https://api.example.com/webhooks/twilio/call-status?call_id=abc";
        let header = sign("secret-token", url, &[("CallStatus", "completed")]);
        let tampered = vec![("CallStatus".to_string(), "failed".to_string())];

        assert!(!client().validate_signature(url, &tampered, &header).unwrap());
    }

    #[test]
    fn rejects_wrong_token() {
        let url = "https://api.example.com/webhooks/twilio/call-status?call_id=abc";
        let params = vec![("CallStatus".to_string(), "completed".to_string())];
        let header = sign("other-token", url, &[("CallStatus", "completed")]);

        assert!(!client().validate_signature(url, &params, &header).unwrap());
    }
}
