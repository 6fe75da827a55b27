//! Inbound transaction feeds.

use super::models::DepositCandidate;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of recent inbound transactions for the deposit wallet.
#[async_trait]
pub trait DepositFeed: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<Vec<DepositCandidate>>;
}

/// Chain API feed for a TON wallet address.
///
/// The API's transaction shape varies between versions, so extraction is
/// deliberately tolerant: the id may be `hash` or `transaction_id`, the memo
/// may live in `in_msg.message` or `in_msg.msg_data.text`, and the value may
/// be a string or an integer. Entries with no usable id are dropped here;
/// everything else is the reconciler's call.
pub struct TonFeed {
    client: reqwest::Client,
    url: String,
}

impl TonFeed {
    pub fn new(address: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("https://tonapi.io/v2/blockchain/accounts/{address}/transactions?limit=50"),
        }
    }

    fn candidate(tx: &Value) -> Option<DepositCandidate> {
        let tx_id = tx
            .get("hash")
            .or_else(|| tx.get("transaction_id"))
            .and_then(Value::as_str)?
            .to_string();

        let in_msg = tx
            .get("in_msg")
            .or_else(|| tx.get("in_message"))
            .unwrap_or(&Value::Null);

        let memo = in_msg
            .pointer("/msg_data/text")
            .or_else(|| in_msg.get("message"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let value_nano = match in_msg.get("value") {
            Some(Value::String(s)) => s.parse().unwrap_or(0),
            Some(v) => v.as_i64().unwrap_or(0),
            None => 0,
        };

        Some(DepositCandidate {
            tx_id,
            memo,
            value_nano,
        })
    }
}

#[async_trait]
impl DepositFeed for TonFeed {
    async fn fetch(&self) -> anyhow::Result<Vec<DepositCandidate>> {
        let body: Value = self
            .client
            .get(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let txs = body
            .get("transactions")
            .or_else(|| body.get("data"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(txs.iter().filter_map(Self::candidate).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn candidate_reads_the_modern_shape() {
        let tx = json!({
            "hash": "abc123",
            "in_msg": { "message": "ID12345", "value": "2000000000" }
        });
        let c = TonFeed::candidate(&tx).unwrap();
        assert_eq!(c.tx_id, "abc123");
        assert_eq!(c.memo, "ID12345");
        assert_eq!(c.value_nano, 2_000_000_000);
    }

    #[test]
    fn candidate_reads_the_legacy_shape() {
        let tx = json!({
            "transaction_id": "legacy",
            "in_message": {
                "msg_data": { "text": "ID67890" },
                "value": 500_000_000
            }
        });
        let c = TonFeed::candidate(&tx).unwrap();
        assert_eq!(c.tx_id, "legacy");
        assert_eq!(c.memo, "ID67890");
        assert_eq!(c.value_nano, 500_000_000);
    }

    #[test]
    fn msg_data_text_wins_over_message() {
        let tx = json!({
            "hash": "h",
            "in_msg": {
                "message": "outer",
                "msg_data": { "text": "inner" },
                "value": 1
            }
        });
        assert_eq!(TonFeed::candidate(&tx).unwrap().memo, "inner");
    }

    #[test]
    fn missing_id_drops_the_entry() {
        assert!(TonFeed::candidate(&json!({ "in_msg": {} })).is_none());
    }

    #[test]
    fn garbage_value_and_memo_default_to_empty() {
        let tx = json!({ "hash": "h", "in_msg": { "value": "notanumber" } });
        let c = TonFeed::candidate(&tx).unwrap();
        assert_eq!(c.memo, "");
        assert_eq!(c.value_nano, 0);
    }
}
