// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::parsing::{de_u32_lenient, de_u64_lenient};
use crate::domain::error::AppError;
use crate::domain::types::{
    Channel, ChannelAllocation, ChannelBalance, ChannelEdge, ChannelFeePolicy, ChannelId,
    ForwardingEvent, Invoice, NodeInfo, PaymentAttempt, PendingOpen, Peer, QueriedRoute,
    WalletBalance,
};
use crate::infrastructure::network::http::{MACAROON_HEADER, build_client, decode_json, join_url};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

const SERVICE: &str = "lnd";
const FORWARDING_PAGE_SIZE: u64 = 10_000;
const DEFAULT_TIME_LOCK_DELTA: u32 = 80;

/// Node daemon operations used by the agent.
#[async_trait]
pub trait ChannelManager: Send + Sync {
    async fn node_info(&self) -> Result<NodeInfo, AppError>;
    async fn wallet_balance(&self) -> Result<WalletBalance, AppError>;
    async fn channel_balance(&self) -> Result<ChannelBalance, AppError>;
    async fn list_channels(&self) -> Result<Vec<Channel>, AppError>;
    async fn list_peers(&self) -> Result<Vec<Peer>, AppError>;
    async fn connect_peer(&self, pubkey: &str, host: &str) -> Result<(), AppError>;
    async fn open_channel(
        &self,
        pubkey: &str,
        amount_sat: u64,
        sat_per_vbyte: Option<u64>,
    ) -> Result<PendingOpen, AppError>;
    async fn batch_open_channel(
        &self,
        channels: &[ChannelAllocation],
        sat_per_vbyte: Option<u64>,
    ) -> Result<Vec<PendingOpen>, AppError>;
    async fn set_fee_policy(
        &self,
        channel_point: &str,
        base_fee_msat: u64,
        fee_rate_ppm: u64,
    ) -> Result<(), AppError>;
    /// Returns the closing txid once the daemon reports the close as pending.
    async fn close_channel(
        &self,
        channel_point: &str,
        force: bool,
        sat_per_vbyte: Option<u64>,
    ) -> Result<Option<String>, AppError>;
    async fn forwarding_history(&self, window: Duration) -> Result<Vec<ForwardingEvent>, AppError>;
    async fn channel_info(&self, chan_id: ChannelId) -> Result<ChannelEdge, AppError>;
    async fn node_alias(&self, pubkey: &str) -> Result<Option<String>, AppError>;
    async fn fee_report(&self) -> Result<Vec<ChannelFeePolicy>, AppError>;
    async fn query_route(
        &self,
        destination: &str,
        amt_msat: u64,
        outgoing_chan_id: ChannelId,
        last_hop_pubkey: &str,
        fee_limit_msat: u64,
    ) -> Result<Option<QueriedRoute>, AppError>;
    async fn add_invoice(&self, value_msat: u64, memo: &str) -> Result<Invoice, AppError>;
    async fn send_to_route(
        &self,
        payment_hash: &str,
        payment_addr: &str,
        total_amt_msat: u64,
        route: &QueriedRoute,
    ) -> Result<PaymentAttempt, AppError>;
}

#[derive(Clone)]
pub struct LndRestClient {
    client: Client,
    base_url: String,
    macaroon_hex: String,
}

impl LndRestClient {
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

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let resp = self.request(Method::GET, path).send().await?;
        decode_json(SERVICE, resp).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, AppError> {
        let resp = self.request(Method::POST, path).json(body).send().await?;
        decode_json(SERVICE, resp).await
    }
}

/// Hex node pubkey to the base64 bytes the REST proxy expects.
pub fn pubkey_to_base64(pubkey: &str) -> Result<String, AppError> {
    let bytes = hex::decode(pubkey.trim())
        .map_err(|e| AppError::validation("node_pubkey", format!("not hex: {e}")))?;
    if bytes.len() != 33 {
        return Err(AppError::validation(
            "node_pubkey",
            format!("expected 33 bytes, got {}", bytes.len()),
        ));
    }
    Ok(B64.encode(bytes))
}

/// Funding txid bytes come back little-endian; display order is reversed.
pub fn txid_from_base64(raw: &str) -> Result<String, AppError> {
    let mut bytes = B64
        .decode(raw.trim())
        .map_err(|e| AppError::collaborator(SERVICE, format!("invalid txid encoding: {e}")))?;
    bytes.reverse();
    Ok(hex::encode(bytes))
}

fn split_channel_point(channel_point: &str) -> Result<(&str, u32), AppError> {
    let (txid, index) = channel_point
        .split_once(':')
        .ok_or_else(|| AppError::validation("channel_point", "expected txid:index"))?;
    let index = index
        .parse()
        .map_err(|_| AppError::validation("channel_point", "output index is not a number"))?;
    Ok((txid, index))
}

// ---- wire shapes ----

#[derive(Deserialize)]
struct GetInfoWire {
    #[serde(default)]
    identity_pubkey: String,
    #[serde(default)]
    alias: String,
    #[serde(default, deserialize_with = "de_u32_lenient")]
    num_active_channels: u32,
    #[serde(default, deserialize_with = "de_u32_lenient")]
    num_pending_channels: u32,
    #[serde(default, deserialize_with = "de_u32_lenient")]
    num_peers: u32,
    #[serde(default, deserialize_with = "de_u32_lenient")]
    block_height: u32,
    #[serde(default)]
    synced_to_chain: bool,
    #[serde(default)]
    synced_to_graph: bool,
}

#[derive(Deserialize)]
struct WalletBalanceWire {
    #[serde(default, deserialize_with = "de_u64_lenient")]
    total_balance: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    confirmed_balance: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    unconfirmed_balance: u64,
}

#[derive(Deserialize, Default)]
struct AmountWire {
    #[serde(default, deserialize_with = "de_u64_lenient")]
    sat: u64,
}

#[derive(Deserialize)]
struct ChannelBalanceWire {
    #[serde(default)]
    local_balance: Option<AmountWire>,
    #[serde(default)]
    remote_balance: Option<AmountWire>,
}

#[derive(Deserialize)]
struct ChannelWire {
    #[serde(default)]
    active: bool,
    #[serde(default)]
    remote_pubkey: String,
    #[serde(default)]
    channel_point: String,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    chan_id: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    capacity: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    local_balance: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    remote_balance: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    lifetime: u64,
    #[serde(default)]
    peer_alias: Option<String>,
}

#[derive(Deserialize)]
struct ListChannelsWire {
    #[serde(default)]
    channels: Vec<ChannelWire>,
}

#[derive(Deserialize)]
struct PeerWire {
    #[serde(default)]
    pub_key: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    inbound: bool,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    sat_sent: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    sat_recv: u64,
}

#[derive(Deserialize)]
struct ListPeersWire {
    #[serde(default)]
    peers: Vec<PeerWire>,
}

#[derive(Deserialize)]
struct ChannelPointWire {
    #[serde(default)]
    funding_txid_bytes: Option<String>,
    #[serde(default)]
    funding_txid_str: Option<String>,
    #[serde(default, deserialize_with = "de_u32_lenient")]
    output_index: u32,
}

#[derive(Deserialize)]
struct PendingUpdateWire {
    #[serde(default)]
    txid: String,
    #[serde(default, deserialize_with = "de_u32_lenient")]
    output_index: u32,
}

#[derive(Deserialize)]
struct BatchOpenWire {
    #[serde(default)]
    pending_channels: Vec<PendingUpdateWire>,
}

#[derive(Deserialize)]
struct PolicyUpdateWire {
    #[serde(default)]
    failed_updates: Vec<Value>,
}

#[derive(Deserialize)]
struct ForwardingEventWire {
    #[serde(default, deserialize_with = "de_u64_lenient")]
    timestamp: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    chan_id_in: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    chan_id_out: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    amt_in_msat: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    amt_out_msat: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    fee_msat: u64,
}

#[derive(Deserialize)]
struct ForwardingHistoryWire {
    #[serde(default)]
    forwarding_events: Vec<ForwardingEventWire>,
    #[serde(default, deserialize_with = "de_u32_lenient")]
    last_offset_index: u32,
}

#[derive(Deserialize)]
struct ChannelEdgeWire {
    #[serde(default, deserialize_with = "de_u64_lenient")]
    channel_id: u64,
    #[serde(default)]
    node1_pub: String,
    #[serde(default)]
    node2_pub: String,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    capacity: u64,
}

#[derive(Deserialize)]
struct LightningNodeWire {
    #[serde(default)]
    alias: Option<String>,
}

#[derive(Deserialize)]
struct NodeInfoWire {
    #[serde(default)]
    node: Option<LightningNodeWire>,
}

#[derive(Deserialize)]
struct ChannelFeeWire {
    #[serde(default, deserialize_with = "de_u64_lenient")]
    chan_id: u64,
    #[serde(default)]
    channel_point: String,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    base_fee_msat: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    fee_per_mil: u64,
}

#[derive(Deserialize)]
struct FeeReportWire {
    #[serde(default)]
    channel_fees: Vec<ChannelFeeWire>,
}

#[derive(Deserialize)]
struct QueryRoutesWire {
    #[serde(default)]
    routes: Vec<Value>,
}

#[derive(Deserialize)]
struct AddInvoiceWire {
    #[serde(default)]
    r_hash: String,
    #[serde(default)]
    payment_addr: String,
}

#[derive(Deserialize)]
struct HtlcAttemptWire {
    #[serde(default)]
    status: String,
    #[serde(default)]
    failure: Option<Value>,
}

fn route_summary(raw: Value) -> QueriedRoute {
    let read = |key: &str| {
        raw.get(key)
            .and_then(|v| {
                v.as_u64()
                    .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
            })
            .unwrap_or(0)
    };
    QueriedRoute {
        total_amt_msat: read("total_amt_msat"),
        total_fees_msat: read("total_fees_msat"),
        hop_count: raw
            .get("hops")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0),
        raw,
    }
}

/// Final hop needs the MPP record so the receiver accepts the payment.
fn attach_mpp_record(route: &QueriedRoute, payment_addr: &str, total_amt_msat: u64) -> Value {
    let mut raw = route.raw.clone();
    if let Some(last) = raw
        .get_mut("hops")
        .and_then(Value::as_array_mut)
        .and_then(|hops| hops.last_mut())
        && let Some(obj) = last.as_object_mut()
    {
        obj.insert(
            "mpp_record".to_string(),
            json!({
                "payment_addr": payment_addr,
                "total_amt_msat": total_amt_msat.to_string(),
            }),
        );
    }
    raw
}

#[async_trait]
impl ChannelManager for LndRestClient {
    async fn node_info(&self) -> Result<NodeInfo, AppError> {
        let wire: GetInfoWire = self.get("/v1/getinfo").await?;
        Ok(NodeInfo {
            identity_pubkey: wire.identity_pubkey,
            alias: wire.alias,
            num_active_channels: wire.num_active_channels,
            num_pending_channels: wire.num_pending_channels,
            num_peers: wire.num_peers,
            block_height: wire.block_height,
            synced_to_chain: wire.synced_to_chain,
            synced_to_graph: wire.synced_to_graph,
        })
    }

    async fn wallet_balance(&self) -> Result<WalletBalance, AppError> {
        let wire: WalletBalanceWire = self.get("/v1/balance/blockchain").await?;
        Ok(WalletBalance {
            total_balance: wire.total_balance,
            confirmed_balance: wire.confirmed_balance,
            unconfirmed_balance: wire.unconfirmed_balance,
        })
    }

    async fn channel_balance(&self) -> Result<ChannelBalance, AppError> {
        let wire: ChannelBalanceWire = self.get("/v1/balance/channels").await?;
        Ok(ChannelBalance {
            local_balance_sat: wire.local_balance.unwrap_or_default().sat,
            remote_balance_sat: wire.remote_balance.unwrap_or_default().sat,
        })
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, AppError> {
        let wire: ListChannelsWire = self.get("/v1/channels?peer_alias_lookup=true").await?;
        Ok(wire
            .channels
            .into_iter()
            .map(|c| Channel {
                chan_id: c.chan_id,
                remote_pubkey: c.remote_pubkey,
                channel_point: c.channel_point,
                capacity: c.capacity,
                local_balance: c.local_balance,
                remote_balance: c.remote_balance,
                lifetime_secs: c.lifetime,
                active: c.active,
                peer_alias: c.peer_alias.filter(|a| !a.is_empty()),
            })
            .collect())
    }

    async fn list_peers(&self) -> Result<Vec<Peer>, AppError> {
        let wire: ListPeersWire = self.get("/v1/peers").await?;
        Ok(wire
            .peers
            .into_iter()
            .map(|p| Peer {
                pub_key: p.pub_key,
                address: p.address,
                inbound: p.inbound,
                sat_sent: p.sat_sent,
                sat_recv: p.sat_recv,
            })
            .collect())
    }

    async fn connect_peer(&self, pubkey: &str, host: &str) -> Result<(), AppError> {
        let body = json!({
            "addr": { "pubkey": pubkey, "host": host },
            "perm": false,
            "timeout": "30",
        });
        let resp = self.request(Method::POST, "/v1/peers").json(&body).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        let message = crate::infrastructure::network::http::error_message(&text);
        // Reconnecting to a known peer is not a failure.
        if message.contains("already connected") {
            tracing::debug!(target: "lnd", pubkey, "peer already connected");
            return Ok(());
        }
        Err(AppError::collaborator(
            SERVICE,
            format!("status {}: {message}", status.as_u16()),
        ))
    }

    async fn open_channel(
        &self,
        pubkey: &str,
        amount_sat: u64,
        sat_per_vbyte: Option<u64>,
    ) -> Result<PendingOpen, AppError> {
        let mut body = json!({
            "node_pubkey": pubkey_to_base64(pubkey)?,
            "local_funding_amount": amount_sat.to_string(),
        });
        if let Some(rate) = sat_per_vbyte {
            body["sat_per_vbyte"] = json!(rate.to_string());
        }
        let wire: ChannelPointWire = self.post("/v1/channels", &body).await?;
        let funding_txid = match (wire.funding_txid_str, wire.funding_txid_bytes) {
            (Some(txid), _) if !txid.is_empty() => txid,
            (_, Some(bytes)) => txid_from_base64(&bytes)?,
            _ => {
                return Err(AppError::collaborator(
                    SERVICE,
                    "open response carried no funding txid",
                ));
            }
        };
        Ok(PendingOpen {
            funding_txid,
            output_index: wire.output_index,
        })
    }

    async fn batch_open_channel(
        &self,
        channels: &[ChannelAllocation],
        sat_per_vbyte: Option<u64>,
    ) -> Result<Vec<PendingOpen>, AppError> {
        let entries = channels
            .iter()
            .map(|c| {
                Ok(json!({
                    "node_pubkey": pubkey_to_base64(&c.node_pubkey)?,
                    "local_funding_amount": c.local_funding_amount_sat.to_string(),
                }))
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        let mut body = json!({ "channels": entries });
        if let Some(rate) = sat_per_vbyte {
            body["sat_per_vbyte"] = json!(rate.to_string());
        }
        let wire: BatchOpenWire = self.post("/v1/channels/batch", &body).await?;
        wire.pending_channels
            .into_iter()
            .map(|p| {
                Ok(PendingOpen {
                    funding_txid: txid_from_base64(&p.txid)?,
                    output_index: p.output_index,
                })
            })
            .collect()
    }

    async fn set_fee_policy(
        &self,
        channel_point: &str,
        base_fee_msat: u64,
        fee_rate_ppm: u64,
    ) -> Result<(), AppError> {
        let (txid, index) = split_channel_point(channel_point)?;
        let body = json!({
            "chan_point": { "funding_txid_str": txid, "output_index": index },
            "base_fee_msat": base_fee_msat.to_string(),
            "fee_rate_ppm": fee_rate_ppm,
            "time_lock_delta": DEFAULT_TIME_LOCK_DELTA,
        });
        let wire: PolicyUpdateWire = self.post("/v1/chanpolicy", &body).await?;
        if let Some(failed) = wire.failed_updates.first() {
            return Err(AppError::collaborator(
                SERVICE,
                format!("policy update failed: {failed}"),
            ));
        }
        Ok(())
    }

    async fn close_channel(
        &self,
        channel_point: &str,
        force: bool,
        sat_per_vbyte: Option<u64>,
    ) -> Result<Option<String>, AppError> {
        let (txid, index) = split_channel_point(channel_point)?;
        let mut req = self
            .request(Method::DELETE, &format!("/v1/channels/{txid}/{index}"))
            .query(&[("force", force.to_string())]);
        if let Some(rate) = sat_per_vbyte {
            req = req.query(&[("sat_per_vbyte", rate.to_string())]);
        }
        let mut resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::collaborator(
                SERVICE,
                format!(
                    "status {}: {}",
                    status.as_u16(),
                    crate::infrastructure::network::http::error_message(&text)
                ),
            ));
        }
        // Streaming endpoint: newline-delimited updates, the first carries the
        // pending close. Chunk boundaries do not follow line boundaries.
        let mut buf = Vec::new();
        let line = loop {
            if let Some(line) = take_update_line(&mut buf) {
                break line;
            }
            match resp.chunk().await? {
                Some(chunk) => buf.extend_from_slice(&chunk),
                None if buf.iter().all(u8::is_ascii_whitespace) => return Ok(None),
                None => break std::mem::take(&mut buf),
            }
        };
        parse_close_update(&line)
    }

    async fn forwarding_history(&self, window: Duration) -> Result<Vec<ForwardingEvent>, AppError> {
        let end_time = chrono::Utc::now().timestamp().max(0) as u64;
        let start_time = end_time.saturating_sub(window.as_secs());
        let mut events = Vec::new();
        let mut offset: u32 = 0;
        loop {
            let body = json!({
                "start_time": start_time.to_string(),
                "end_time": end_time.to_string(),
                "index_offset": offset,
                "num_max_events": FORWARDING_PAGE_SIZE,
            });
            let page: ForwardingHistoryWire = self.post("/v1/switch", &body).await?;
            let count = page.forwarding_events.len() as u64;
            events.extend(page.forwarding_events.into_iter().map(|e| ForwardingEvent {
                timestamp: e.timestamp,
                chan_id_in: e.chan_id_in,
                chan_id_out: e.chan_id_out,
                amt_in_msat: e.amt_in_msat,
                amt_out_msat: e.amt_out_msat,
                fee_msat: e.fee_msat,
            }));
            if count < FORWARDING_PAGE_SIZE || page.last_offset_index <= offset {
                break;
            }
            offset = page.last_offset_index;
        }
        tracing::debug!(target: "lnd", events = events.len(), "forwarding history fetched");
        Ok(events)
    }

    async fn channel_info(&self, chan_id: ChannelId) -> Result<ChannelEdge, AppError> {
        let wire: ChannelEdgeWire = self
            .get(&format!("/v1/graph/edge/{chan_id}"))
            .await
            .map_err(|e| match e {
                AppError::Collaborator { message, .. } if message.contains("not found") => {
                    AppError::NotFound(format!("Channel {chan_id} not found in graph"))
                }
                other => other,
            })?;
        Ok(ChannelEdge {
            channel_id: wire.channel_id,
            node1_pub: wire.node1_pub,
            node2_pub: wire.node2_pub,
            capacity: wire.capacity,
        })
    }

    async fn node_alias(&self, pubkey: &str) -> Result<Option<String>, AppError> {
        let wire: NodeInfoWire = self
            .get(&format!("/v1/graph/node/{pubkey}?include_channels=false"))
            .await?;
        Ok(wire.node.and_then(|n| n.alias).filter(|a| !a.is_empty()))
    }

    async fn fee_report(&self) -> Result<Vec<ChannelFeePolicy>, AppError> {
        let wire: FeeReportWire = self.get("/v1/fees").await?;
        Ok(wire
            .channel_fees
            .into_iter()
            .map(|f| ChannelFeePolicy {
                chan_id: f.chan_id,
                channel_point: f.channel_point,
                base_fee_msat: f.base_fee_msat,
                fee_rate_ppm: f.fee_per_mil,
            })
            .collect())
    }

    async fn query_route(
        &self,
        destination: &str,
        amt_msat: u64,
        outgoing_chan_id: ChannelId,
        last_hop_pubkey: &str,
        fee_limit_msat: u64,
    ) -> Result<Option<QueriedRoute>, AppError> {
        let amt_sat = amt_msat / crate::domain::constants::MSAT_PER_SAT;
        let resp = self
            .request(Method::GET, &format!("/v1/graph/routes/{destination}/{amt_sat}"))
            .query(&[
                ("outgoing_chan_id", outgoing_chan_id.to_string()),
                ("last_hop_pubkey", pubkey_to_base64(last_hop_pubkey)?),
                ("fee_limit.fixed_msat", fee_limit_msat.to_string()),
                ("allow_self_payment", "true".to_string()),
            ])
            .send()
            .await?;
        let wire: QueryRoutesWire = decode_json(SERVICE, resp).await?;
        Ok(wire.routes.into_iter().next().map(route_summary))
    }

    async fn add_invoice(&self, value_msat: u64, memo: &str) -> Result<Invoice, AppError> {
        let body = json!({ "value_msat": value_msat.to_string(), "memo": memo });
        let wire: AddInvoiceWire = self.post("/v1/invoices", &body).await?;
        if wire.r_hash.is_empty() || wire.payment_addr.is_empty() {
            return Err(AppError::collaborator(
                SERVICE,
                "Could not get payment hash or payment address from invoice.",
            ));
        }
        Ok(Invoice {
            r_hash: wire.r_hash,
            payment_addr: wire.payment_addr,
        })
    }

    async fn send_to_route(
        &self,
        payment_hash: &str,
        payment_addr: &str,
        total_amt_msat: u64,
        route: &QueriedRoute,
    ) -> Result<PaymentAttempt, AppError> {
        let body = json!({
            "payment_hash": payment_hash,
            "route": attach_mpp_record(route, payment_addr, total_amt_msat),
        });
        let wire: HtlcAttemptWire = self.post("/v2/router/route/send", &body).await?;
        Ok(PaymentAttempt {
            status: wire.status,
            failure: wire
                .failure
                .filter(|f| !f.is_null())
                .map(|f| {
                    f.get("code")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| f.to_string())
                }),
        })
    }
}

/// Pops the first non-blank line from a newline-delimited stream buffer.
fn take_update_line(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buf.drain(..=pos).collect();
        if !line.iter().all(u8::is_ascii_whitespace) {
            return Some(line);
        }
    }
    None
}

fn parse_close_update(line: &[u8]) -> Result<Option<String>, AppError> {
    let update: Value = serde_json::from_slice(line)?;
    if let Some(err) = update.get("error") {
        return Err(AppError::collaborator(SERVICE, err.to_string()));
    }
    match update
        .pointer("/result/close_pending/txid")
        .and_then(Value::as_str)
    {
        Some(raw) => Ok(Some(txid_from_base64(raw)?)),
        None => Ok(None),
    }
}
