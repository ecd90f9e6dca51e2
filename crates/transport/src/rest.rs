//! REST telephony control plane (spec section 4.2): place-call and hangup
//! against the carrier's documented call-control API.

use async_trait::async_trait;
use serde::Deserialize;

use michael_core::traits::{CallHandle, PlaceCallRequest, TelephonyAdapter};
use michael_core::Result;

use crate::error::TransportError;

#[derive(Debug, Clone)]
pub struct TelephonySettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub base_url: String,
}

pub struct RestTelephonyAdapter {
    settings: TelephonySettings,
    client: reqwest::Client,
}

impl RestTelephonyAdapter {
    pub fn new(settings: TelephonySettings) -> Self {
        Self { settings, client: reqwest::Client::new() }
    }

    fn calls_url(&self) -> String {
        format!("{}/Accounts/{}/Calls.json", self.settings.base_url, self.settings.account_sid)
    }

    fn call_url(&self, call_sid: &str) -> String {
        format!(
            "{}/Accounts/{}/Calls/{}.json",
            self.settings.base_url, self.settings.account_sid, call_sid
        )
    }
}

#[derive(Deserialize)]
struct PlaceCallResponse {
    sid: String,
}

#[async_trait]
impl TelephonyAdapter for RestTelephonyAdapter {
    async fn place_call(&self, req: PlaceCallRequest) -> Result<CallHandle> {
        let form: Vec<(&str, String)> = vec![
            ("To", req.to),
            ("From", self.settings.from_number.clone()),
            ("Url", req.answer_url),
            ("StatusCallback", req.status_url),
            ("StatusCallbackEvent", "initiated ringing answered completed".to_string()),
            ("MachineDetection", req.machine_detection_mode),
            ("MachineDetectionCallback", req.amd_url),
            ("AsyncAmd", req.async_amd.to_string()),
            ("Timeout", req.timeout_seconds.to_string()),
        ];

        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::VendorRejected { status: status.as_u16(), body }.into());
        }

        let body: PlaceCallResponse = response.json().await.map_err(TransportError::from)?;

        Ok(CallHandle { call_sid: body.sid })
    }

    async fn hangup(&self, call_sid: &str) -> Result<()> {
        let response = self
            .client
            .post(self.call_url(call_sid))
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&[("Status", "completed")])
            .send()
            .await
            .map_err(TransportError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::VendorRejected { status: status.as_u16(), body }.into());
        }
        Ok(())
    }
}
