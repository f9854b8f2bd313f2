// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::parsing::{de_u64_lenient, de_vec_u64_lenient};
use crate::domain::error::AppError;
use crate::domain::types::{LoopOutRequest, LoopOutResponse, SwapQuote, SwapState, SwapStatus};
use crate::infrastructure::network::http::{MACAROON_HEADER, build_client, decode_json, join_url};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const SERVICE: &str = "loop";

/// Swap daemon operations.
#[async_trait]
pub trait SwapService: Send + Sync {
    async fn quote_out(&self, amount_sat: u64, conf_target: u32) -> Result<SwapQuote, AppError>;
    async fn loop_out(&self, request: &LoopOutRequest) -> Result<LoopOutResponse, AppError>;
    /// Loop-out swaps initiated at or after `since_ns` (unix nanoseconds).
    async fn list_swaps(&self, since_ns: u64) -> Result<Vec<SwapStatus>, AppError>;
}

#[derive(Clone)]
pub struct LoopRestClient {
    client: Client,
    base_url: String,
    macaroon_hex: String,
}

impl LoopRestClient {
    pub fn new(
        base_url: &str,
        macaroon_hex: String,
        tls_cert_path: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(tls_cert_path, timeout)?,
            base_url: base_url.to_string(),
            macaroon_hex,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, join_url(&self.base_url, path))
            .header(MACAROON_HEADER, &self.macaroon_hex)
    }
}

#[derive(Deserialize)]
struct QuoteWire {
    #[serde(default, deserialize_with = "de_u64_lenient")]
    swap_fee_sat: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    prepay_amt_sat: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    htlc_sweep_fee_sat: u64,
}

#[derive(Deserialize)]
struct LoopOutWire {
    #[serde(default)]
    id: String,
    #[serde(default)]
    htlc_address: String,
    #[serde(default)]
    server_message: String,
}

#[derive(Deserialize)]
struct SwapWire {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "type")]
    swap_type: String,
    #[serde(default = "unknown_state")]
    state: SwapState,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    amt: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    initiation_time: u64,
    #[serde(default, deserialize_with = "de_vec_u64_lenient")]
    outgoing_chan_set: Vec<u64>,
}

fn unknown_state() -> SwapState {
    SwapState::Unknown
}

#[derive(Deserialize)]
struct ListSwapsWire {
    #[serde(default)]
    swaps: Vec<SwapWire>,
}

fn to_status(wire: SwapWire) -> SwapStatus {
    SwapStatus {
        loop_out: wire.swap_type == "LOOP_OUT",
        id: wire.id,
        state: wire.state,
        amount_sat: wire.amt,
        initiation_time_ns: wire.initiation_time,
        outgoing_chan_set: wire.outgoing_chan_set,
    }
}

#[async_trait]
impl SwapService for LoopRestClient {
    async fn quote_out(&self, amount_sat: u64, conf_target: u32) -> Result<SwapQuote, AppError> {
        let resp = self
            .request(Method::GET, &format!("/v1/loop/out/quote/{amount_sat}"))
            .query(&[("conf_target", conf_target.to_string())])
            .send()
            .await?;
        let wire: QuoteWire = decode_json(SERVICE, resp).await?;
        Ok(SwapQuote {
            amount_sat,
            swap_fee_sat: wire.swap_fee_sat,
            prepay_amt_sat: wire.prepay_amt_sat,
            htlc_sweep_fee_sat: wire.htlc_sweep_fee_sat,
        })
    }

    async fn loop_out(&self, request: &LoopOutRequest) -> Result<LoopOutResponse, AppError> {
        let body = json!({
            "amt": request.amount_sat.to_string(),
            "outgoing_chan_set": request
                .outgoing_chan_set
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>(),
            "sweep_conf_target": request.sweep_conf_target,
            "max_swap_fee": request.max_swap_fee_sat.to_string(),
            "max_prepay_amt": request.max_prepay_amt_sat.to_string(),
            "max_swap_routing_fee": request.max_swap_routing_fee_sat.to_string(),
            "max_prepay_routing_fee": request.max_prepay_routing_fee_sat.to_string(),
        });
        let resp = self
            .request(Method::POST, "/v1/loop/out")
            .json(&body)
            .send()
            .await?;
        let wire: LoopOutWire = decode_json(SERVICE, resp).await?;
        tracing::info!(target: "loop", id = %wire.id, amount = request.amount_sat, "loop out initiated");
        Ok(LoopOutResponse {
            id: wire.id,
            htlc_address: wire.htlc_address,
            server_message: wire.server_message,
        })
    }

    async fn list_swaps(&self, since_ns: u64) -> Result<Vec<SwapStatus>, AppError> {
        let resp = self
            .request(Method::GET, "/v1/loop/swaps")
            .query(&[
                ("list_swap_filter.swap_type", "LOOP_OUT".to_string()),
                ("list_swap_filter.start_timestamp_ns", since_ns.to_string()),
            ])
            .send()
            .await?;
        let wire: ListSwapsWire = decode_json(SERVICE, resp).await?;
        Ok(wire
            .swaps
            .into_iter()
            .map(to_status)
            .filter(|s| s.loop_out && s.initiation_time_ns >= since_ns)
            .collect())
    }
}
