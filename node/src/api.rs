//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the vault node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                   | Description                          |
//! |--------|------------------------|--------------------------------------|
//! | GET    | `/health`              | Liveness probe                       |
//! | GET    | `/status`              | Vault status summary                 |
//! | POST   | `/rpc`                 | JSON-RPC 2.0 gateway                 |
//! | GET    | `/ws`                  | WebSocket stream of vault events     |
//! | GET    | `/accounts/:address`   | Position of one holder               |
//! | GET    | `/withdrawals/:id`     | One withdrawal request               |
//! | GET    | `/withdrawals`         | Filtered withdrawal requests         |
//! | GET    | `/governance`          | Signers, whitelist, open proposals   |
//!
//! The node performs no caller authentication. Every state-changing RPC
//! method names its `caller` explicitly and the vault checks that address's
//! capabilities; the node is meant to sit behind something that does.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use meridian_contracts::errors::ErrorKind;
use meridian_contracts::events::VaultEvent;
use meridian_contracts::governance::SignerAction;
use meridian_contracts::quorum::ApprovalOutcome;
use meridian_contracts::withdrawal_queue::{RequestFilter, RequestStatus, WithdrawalRequest};
use meridian_contracts::{Vault, VaultError, VaultService, VaultStatus};
use meridian_protocol::ledger::InMemoryLedger;
use meridian_protocol::types::{amount_serde, Address, Amount, RequestId};

use crate::metrics::SharedMetrics;

/// The vault as the node runs it.
pub type NodeVault = Vault<InMemoryLedger>;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The vault.
    pub service: Arc<VaultService<InMemoryLedger>>,
    /// Broadcast channel feeding WebSocket subscribers.
    pub event_tx: broadcast::Sender<VaultEvent>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Runs one vault command through the service, then logs, counts and
    /// broadcasts whatever it emitted.
    pub fn execute<T, F>(&self, method: &str, command: F) -> Result<T, VaultError>
    where
        F: FnOnce(&mut NodeVault) -> Result<T, VaultError>,
    {
        let timer = self.metrics.command_latency_seconds.start_timer();
        let result = self.service.execute(command);
        timer.observe_duration();

        match result {
            Ok(committed) => {
                for event in &committed.events {
                    tracing::info!(
                        method,
                        version = committed.version,
                        event = event.name(),
                        "vault event"
                    );
                    self.metrics.observe_event(event);
                    // No subscribers is not an error.
                    let _ = self.event_tx.send(event.clone());
                }
                let pending = self.service.snapshot().pending_withdrawal_count();
                self.metrics.observe_state(pending, committed.version);
                Ok(committed.value)
            }
            Err(err) => {
                self.metrics.observe_rejection(err.kind());
                tracing::warn!(method, error = %err, kind = %err.kind(), "command rejected");
                Err(err)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/rpc", post(rpc_handler))
        .route("/ws", get(ws_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/withdrawals", get(withdrawals_handler))
        .route("/withdrawals/:id", get(withdrawal_by_id_handler))
        .route("/governance", get(governance_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// Method not found.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Malformed or missing parameters.
pub const INVALID_PARAMS: i32 = -32602;
/// Anything the vault did not cause.
pub const INTERNAL_ERROR: i32 = -32603;
/// Malformed envelope.
pub const INVALID_REQUEST: i32 = -32600;

/// JSON-RPC error code for a vault error class.
pub fn error_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Authorization => -32010,
        ErrorKind::Validation => -32020,
        ErrorKind::State => -32030,
        ErrorKind::Arithmetic => -32040,
    }
}

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    /// The method to invoke.
    pub method: String,
    /// Named parameters.
    pub params: Option<Value>,
    /// Request identifier. Echoed back in the response.
    pub id: Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version. Always "2.0".
    pub jsonrpc: String,
    /// The result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier, echoed from the request.
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Short human-readable error description.
    pub message: String,
    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<VaultError> for JsonRpcError {
    fn from(err: VaultError) -> Self {
        let kind = err.kind();
        Self {
            code: error_code(kind),
            message: err.to_string(),
            data: Some(json!({ "kind": kind })),
        }
    }
}

impl From<serde_json::Error> for JsonRpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(INTERNAL_ERROR, format!("Internal error: {}", err))
    }
}

// ---------------------------------------------------------------------------
// RPC Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SetRateParams {
    caller: Address,
    #[serde(with = "amount_serde")]
    rate: u128,
}

#[derive(Debug, Deserialize)]
struct DepositParams {
    caller: Address,
    #[serde(with = "amount_serde")]
    assets: Amount,
    receiver: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct MintParams {
    caller: Address,
    #[serde(with = "amount_serde")]
    shares: Amount,
    receiver: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct RequestWithdrawalParams {
    caller: Address,
    #[serde(with = "amount_serde")]
    shares: Amount,
    receiver: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct ClaimParams {
    caller: Address,
    id: RequestId,
}

#[derive(Debug, Deserialize)]
struct BatchClaimParams {
    caller: Address,
    ids: Vec<RequestId>,
}

#[derive(Debug, Deserialize)]
struct TransferParams {
    caller: Address,
    to: Address,
    #[serde(with = "amount_serde")]
    shares: Amount,
}

#[derive(Debug, Deserialize)]
struct ProtocolWithdrawParams {
    caller: Address,
    /// Defaults to the vault's underlying asset.
    asset: Option<Address>,
    #[serde(with = "amount_serde")]
    amount: Amount,
    destination: Address,
}

#[derive(Debug, Deserialize)]
struct WhitelistChangeParams {
    caller: Address,
    id: u64,
    target: Address,
    allow: bool,
}

#[derive(Debug, Deserialize)]
struct SignerChangeParams {
    caller: Address,
    action: SignerAction,
    target: Address,
}

#[derive(Debug, Deserialize)]
struct CapChangeParams {
    caller: Address,
    #[serde(with = "amount_serde")]
    cap: Amount,
}

#[derive(Debug, Deserialize)]
struct SecondsParams {
    caller: Address,
    seconds: u64,
}

#[derive(Debug, Deserialize)]
struct AmountParams {
    caller: Address,
    #[serde(with = "amount_serde")]
    amount: Amount,
}

#[derive(Debug, Deserialize)]
struct TreasuryParams {
    caller: Address,
    treasury: Address,
}

#[derive(Debug, Deserialize)]
struct FeeParams {
    caller: Address,
    bps: u16,
}

#[derive(Debug, Deserialize)]
struct AddressParams {
    address: Address,
}

#[derive(Debug, Deserialize)]
struct IdParams {
    id: RequestId,
}

#[derive(Debug, Deserialize)]
struct RangeParams {
    from: RequestId,
    to: RequestId,
}

#[derive(Debug, Deserialize)]
struct AssetsParams {
    #[serde(with = "amount_serde")]
    assets: Amount,
}

#[derive(Debug, Deserialize)]
struct SharesParams {
    #[serde(with = "amount_serde")]
    shares: Amount,
}

#[derive(Debug, Deserialize)]
struct PreviewWithdrawalParams {
    owner: Address,
    #[serde(with = "amount_serde")]
    shares: Amount,
}

/// Decodes named parameters. A missing `params` reads as `{}`.
fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    let value = match params {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(v) => v,
    };
    serde_json::from_value(value)
        .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {}", e)))
}

fn amount(value: Amount) -> Value {
    Value::String(value.to_string())
}

/// Renders a quorum approval outcome, mapping an executed payload through
/// `payload`.
fn outcome_json<T>(outcome: ApprovalOutcome<T>, payload: impl FnOnce(T) -> Value) -> Value {
    match outcome {
        ApprovalOutcome::Pending { approvals, required } => json!({
            "status": "pending",
            "approvals": approvals,
            "required": required,
        }),
        ApprovalOutcome::Executed(value) => json!({
            "status": "executed",
            "payload": payload(value),
        }),
    }
}

// ---------------------------------------------------------------------------
// RPC Dispatch
// ---------------------------------------------------------------------------

/// Routes one JSON-RPC call. Command methods go through the vault service;
/// query methods read a snapshot.
pub fn dispatch(state: &AppState, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
    match method {
        // -- Commands -------------------------------------------------------
        "vault_setExchangeRate" => {
            let p: SetRateParams = parse_params(params)?;
            let previous = state.execute(method, |v| v.set_exchange_rate(p.caller, p.rate))?;
            Ok(json!({ "previous": amount(previous), "current": amount(p.rate) }))
        }
        "vault_deposit" => {
            let p: DepositParams = parse_params(params)?;
            let receiver = p.receiver.unwrap_or(p.caller);
            let shares = state.execute(method, |v| v.deposit(p.caller, p.assets, receiver))?;
            Ok(json!({ "shares": amount(shares) }))
        }
        "vault_mint" => {
            let p: MintParams = parse_params(params)?;
            let receiver = p.receiver.unwrap_or(p.caller);
            let assets = state.execute(method, |v| v.mint(p.caller, p.shares, receiver))?;
            Ok(json!({ "assets": amount(assets) }))
        }
        "vault_requestWithdrawal" => {
            let p: RequestWithdrawalParams = parse_params(params)?;
            let receiver = p.receiver.unwrap_or(p.caller);
            let id = state.execute(method, |v| v.request_withdrawal(p.caller, p.shares, receiver))?;
            Ok(json!({ "id": id }))
        }
        "vault_claimWithdrawal" => {
            let p: ClaimParams = parse_params(params)?;
            let request = state.execute(method, |v| v.claim_withdrawal(p.caller, p.id))?;
            Ok(serde_json::to_value(request)?)
        }
        "vault_batchClaimWithdrawal" => {
            let p: BatchClaimParams = parse_params(params)?;
            let requests = state.execute(method, |v| v.batch_claim_withdrawal(p.caller, &p.ids))?;
            Ok(serde_json::to_value(requests)?)
        }
        "vault_transfer" => {
            let p: TransferParams = parse_params(params)?;
            let principal = state.execute(method, |v| v.transfer_shares(p.caller, p.to, p.shares))?;
            Ok(json!({ "principal_moved": amount(principal) }))
        }
        "vault_protocolWithdraw" => {
            let p: ProtocolWithdrawParams = parse_params(params)?;
            state.execute(method, |v| {
                let asset = p.asset.unwrap_or_else(|| v.asset());
                v.protocol_withdraw(p.caller, asset, p.amount, p.destination)
            })?;
            Ok(json!({ "withdrawn": amount(p.amount) }))
        }
        "vault_whitelistChange" => {
            let p: WhitelistChangeParams = parse_params(params)?;
            let outcome = state.execute(method, |v| v.whitelist_change(p.caller, p.target, p.allow, p.id))?;
            Ok(outcome_json(outcome, |change| {
                json!({ "target": change.target, "allow": change.allow })
            }))
        }
        "vault_signerChange" => {
            let p: SignerChangeParams = parse_params(params)?;
            let outcome = state.execute(method, |v| v.signer_change(p.caller, p.action, p.target))?;
            Ok(outcome_json(outcome, |change| {
                json!({ "action": change.action, "target": change.target })
            }))
        }
        "vault_assetsCapChange" => {
            let p: CapChangeParams = parse_params(params)?;
            let outcome = state.execute(method, |v| v.assets_cap_change(p.caller, p.cap))?;
            Ok(outcome_json(outcome, amount))
        }
        "vault_setRedemptionPeriod" => {
            let p: SecondsParams = parse_params(params)?;
            let previous = state.execute(method, |v| v.set_redemption_period(p.caller, p.seconds))?;
            Ok(json!({ "previous": previous, "current": p.seconds }))
        }
        "vault_setExpireInterval" => {
            let p: SecondsParams = parse_params(params)?;
            let previous = state.execute(method, |v| v.set_expire_interval(p.caller, p.seconds))?;
            Ok(json!({ "previous": previous, "current": p.seconds }))
        }
        "vault_setMinDeposit" => {
            let p: AmountParams = parse_params(params)?;
            let previous = state.execute(method, |v| v.set_min_deposit(p.caller, p.amount))?;
            Ok(json!({ "previous": amount(previous), "current": amount(p.amount) }))
        }
        "vault_setMinWithdrawal" => {
            let p: AmountParams = parse_params(params)?;
            let previous = state.execute(method, |v| v.set_min_withdrawal(p.caller, p.amount))?;
            Ok(json!({ "previous": amount(previous), "current": amount(p.amount) }))
        }
        "vault_setTreasury" => {
            let p: TreasuryParams = parse_params(params)?;
            let previous = state.execute(method, |v| v.set_treasury(p.caller, p.treasury))?;
            Ok(json!({ "previous": previous, "current": p.treasury }))
        }
        "vault_setFeeBps" => {
            let p: FeeParams = parse_params(params)?;
            let previous = state.execute(method, |v| v.set_fee_bps(p.caller, p.bps))?;
            Ok(json!({ "previous": previous, "current": p.bps }))
        }

        // -- Queries --------------------------------------------------------
        "vault_status" => {
            let vault = state.service.snapshot();
            Ok(serde_json::to_value(vault.status()?)?)
        }
        "vault_version" => Ok(json!({
            "node": state.version,
            "state_version": state.service.version(),
        })),
        "vault_account" => {
            let p: AddressParams = parse_params(params)?;
            let vault = state.service.snapshot();
            Ok(serde_json::to_value(vault.account(&p.address)?)?)
        }
        "vault_getWithdrawalRequest" => {
            let p: IdParams = parse_params(params)?;
            let vault = state.service.snapshot();
            match WithdrawalResponse::lookup(&vault, p.id) {
                Some(resp) => Ok(serde_json::to_value(resp)?),
                None => Ok(Value::Null),
            }
        }
        "vault_filterWithdrawalRequests" => {
            let filter: RequestFilter = parse_params(params)?;
            let vault = state.service.snapshot();
            Ok(serde_json::to_value(vault.filter_withdrawal_requests(&filter))?)
        }
        "vault_aggregateWithdrawals" => {
            let p: RangeParams = parse_params(params)?;
            let vault = state.service.snapshot();
            Ok(serde_json::to_value(vault.aggregate_withdrawals(p.from, p.to)?)?)
        }
        "vault_governance" => {
            let vault = state.service.snapshot();
            Ok(serde_json::to_value(vault.governance_snapshot())?)
        }
        "vault_previewDeposit" => {
            let p: AssetsParams = parse_params(params)?;
            let shares = state.service.snapshot().preview_deposit(p.assets)?;
            Ok(json!({ "shares": amount(shares) }))
        }
        "vault_previewMint" => {
            let p: SharesParams = parse_params(params)?;
            let assets = state.service.snapshot().preview_mint(p.shares)?;
            Ok(json!({ "assets": amount(assets) }))
        }
        "vault_previewRedeem" => {
            let p: SharesParams = parse_params(params)?;
            let assets = state.service.snapshot().preview_redeem(p.shares)?;
            Ok(json!({ "assets": amount(assets) }))
        }
        "vault_previewWithdrawal" => {
            let p: PreviewWithdrawalParams = parse_params(params)?;
            let quote = state.service.snapshot().preview_withdrawal(&p.owner, p.shares)?;
            Ok(serde_json::to_value(quote)?)
        }
        "vault_maxDeposit" => {
            let vault = state.service.snapshot();
            Ok(json!({
                "assets": amount(vault.max_deposit()?),
                "shares": amount(vault.max_mint()?),
            }))
        }
        _ => Err(JsonRpcError::new(
            METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )),
    }
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Number of commands committed since start-up.
    pub state_version: u64,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
    /// The vault itself.
    pub vault: VaultStatus,
}

/// Response payload for `GET /withdrawals/:id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawalResponse {
    pub request: WithdrawalRequest,
    pub status: RequestStatus,
    /// Seconds left until claimable; `None` once claimed.
    pub time_until_claimable: Option<u64>,
}

impl WithdrawalResponse {
    fn lookup(vault: &NodeVault, id: RequestId) -> Option<Self> {
        let request = vault.get_withdrawal_request(id)?.clone();
        Some(Self {
            request,
            status: vault.withdrawal_status(id)?,
            time_until_claimable: vault.time_until_claimable(id),
        })
    }
}

/// Query string of `GET /withdrawals`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WithdrawalQuery {
    pub owner: Option<Address>,
    pub receiver: Option<Address>,
    pub claimed: Option<bool>,
    /// Earliest request time, inclusive.
    pub from: Option<u64>,
    /// Latest request time, inclusive.
    pub to: Option<u64>,
}

impl From<WithdrawalQuery> for RequestFilter {
    fn from(q: WithdrawalQuery) -> Self {
        RequestFilter {
            owner: q.owner,
            receiver: q.receiver,
            claimed: q.claimed,
            requested_from: q.from,
            requested_to: q.to,
        }
    }
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

fn error_response(status: StatusCode, error: String, kind: Option<ErrorKind>) -> Response {
    (status, Json(ErrorResponse { error, kind })).into_response()
}

fn vault_error_response(err: VaultError) -> Response {
    let kind = err.kind();
    let status = match kind {
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::State => StatusCode::CONFLICT,
        ErrorKind::Arithmetic => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string(), Some(kind))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `GET /status`: vault status summary.
async fn status_handler(State(state): State<AppState>) -> Response {
    let vault = state.service.snapshot();
    match vault.status() {
        Ok(status) => Json(StatusResponse {
            version: state.version.clone(),
            state_version: state.service.version(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            vault: status,
        })
        .into_response(),
        Err(e) => vault_error_response(e),
    }
}

/// `POST /rpc`: JSON-RPC 2.0 gateway.
async fn rpc_handler(State(state): State<AppState>, Json(req): Json<JsonRpcRequest>) -> impl IntoResponse {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError::new(
                INVALID_REQUEST,
                "Invalid Request: jsonrpc must be \"2.0\"",
            )),
            id: req.id,
        });
    }

    let (result, error) = match dispatch(&state, &req.method, req.params) {
        Ok(value) => (Some(value), None),
        Err(e) => (None, Some(e)),
    };

    Json(JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id: req.id,
    })
}

/// `GET /ws`: upgrades to a WebSocket that pushes every committed
/// [`VaultEvent`] as a JSON text frame.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding broadcast events
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    // Push-only channel; client frames are ignored.
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// `GET /accounts/:address`: one holder's position.
async fn account_handler(Path(address): Path<String>, State(state): State<AppState>) -> Response {
    let address: Address = match address.parse() {
        Ok(a) => a,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid address {}: {}", address, e),
                None,
            )
        }
    };
    match state.service.snapshot().account(&address) {
        Ok(view) => Json(view).into_response(),
        Err(e) => vault_error_response(e),
    }
}

/// `GET /withdrawals/:id`: one request with its derived status.
async fn withdrawal_by_id_handler(Path(id): Path<RequestId>, State(state): State<AppState>) -> Response {
    let vault = state.service.snapshot();
    match WithdrawalResponse::lookup(&vault, id) {
        Some(resp) => Json(resp).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Withdrawal request {} not found", id),
            None,
        ),
    }
}

/// `GET /withdrawals?owner=&receiver=&claimed=&from=&to=`
async fn withdrawals_handler(Query(query): Query<WithdrawalQuery>, State(state): State<AppState>) -> Response {
    let filter = RequestFilter::from(query);
    Json(state.service.snapshot().filter_withdrawal_requests(&filter)).into_response()
}

/// `GET /governance`: signers, thresholds, whitelist and open proposals.
async fn governance_handler(State(state): State<AppState>) -> Response {
    Json(state.service.snapshot().governance_snapshot()).into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
