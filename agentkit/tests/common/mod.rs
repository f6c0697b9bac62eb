//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use agentkit::wallet::PollPolicy;
use serde_json::{Value, json};
use wiremock::{Request, Respond, ResponseTemplate};

/// Anvil development account 0.
pub const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const RECIPIENT: &str = "0x5154eae861cac3aa757d6016babaf972341354cf";
pub const TX_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

pub fn fast_poll() -> PollPolicy {
    PollPolicy::new(Duration::from_millis(5), 20)
}

/// Answers JSON-RPC requests by method name, echoing the request id.
#[derive(Debug, Clone, Default)]
pub struct RpcResponder {
    results: HashMap<String, Value>,
}

impl RpcResponder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on(mut self, method: &str, result: Value) -> Self {
        self.results.insert(method.to_owned(), result);
        self
    }
}

impl Respond for RpcResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = request.body_json().unwrap_or_default();
        let id = body.get("id").cloned().unwrap_or(Value::Null);
        let method = body.get("method").and_then(Value::as_str).unwrap_or_default();
        let reply = match self.results.get(method) {
            Some(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            None => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("method {method} not mocked") },
            }),
        };
        ResponseTemplate::new(200).set_body_json(reply)
    }
}

/// A mined receipt in node JSON form.
pub fn receipt_json(hash: &str, success: bool) -> Value {
    let status = if success { "0x1" } else { "0x0" };
    json!({
        "type": "0x2",
        "status": status,
        "cumulativeGasUsed": "0x5208",
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": format!("0x{}", "22".repeat(32)),
        "blockNumber": "0x1",
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x1",
        "from": DEV_ADDRESS,
        "to": RECIPIENT,
        "contractAddress": null,
    })
}

/// A 32-byte ABI word holding `value`.
pub fn abi_word(value: u8) -> String {
    format!("0x{}{:02x}", "00".repeat(31), value)
}
