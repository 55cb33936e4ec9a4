use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A caller-submitted key/value pair
///
/// Immutable once created. Key and value are validated at the HTTP
/// boundary, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub key: String,
    pub value: String,
    /// Creation time, seconds since the Unix epoch (UTC)
    pub timestamp: i64,
}

impl Transaction {
    /// Create a transaction with a fresh identifier and the current UTC time
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            key: key.into(),
            value: value.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// A chain-linked group of transactions flushed to disk as one line
///
/// `hash` is a random identifier, not a digest of the contents. The first
/// block of a chain has an empty `prev_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "prev-block-hash")]
    pub prev_hash: String,
    #[serde(rename = "block-hash")]
    pub hash: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Start a block linked to `prev_hash`
    pub fn new(prev_hash: impl Into<String>) -> Self {
        Self {
            prev_hash: prev_hash.into(),
            hash: Uuid::new_v4().to_string(),
            transactions: Vec::new(),
        }
    }

    /// Add a transaction at the end of the block
    pub fn append(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Allocate the next block of the chain
    pub fn continuation(&self) -> Block {
        Block::new(self.hash.clone())
    }

    /// Turn this block into its own continuation in place
    ///
    /// Links to the current hash, draws a new one and drops the
    /// transactions while keeping the allocation. The resulting links are
    /// the same as with [`Block::continuation`].
    pub fn advance(&mut self) {
        let next_hash = Uuid::new_v4().to_string();
        self.prev_hash = std::mem::replace(&mut self.hash, next_hash);
        self.transactions.clear();
    }
}

// Blocks written by older writers encode an empty block as `null`
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Transaction>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Transaction>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Acknowledgement returned to a caller whose transaction was accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub timestamp: i64,
}

impl From<&Transaction> for Receipt {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.clone(),
            timestamp: tx.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_ids_are_unique() {
        let a = Transaction::new("k", "v");
        let b = Transaction::new("k", "v");
        assert_ne!(a.id, b.id);
        assert!(a.timestamp > 0);
    }

    #[test]
    fn test_first_block_has_empty_prev_hash() {
        let block = Block::new("");
        assert_eq!(block.prev_hash, "");
        assert!(!block.hash.is_empty());
        assert!(block.is_empty());
    }

    #[test]
    fn test_append_keeps_arrival_order() {
        let mut block = Block::new("");
        block.append(Transaction::new("a", "1"));
        block.append(Transaction::new("b", "2"));
        block.append(Transaction::new("c", "3"));

        let keys: Vec<_> = block.transactions.iter().map(|tx| tx.key.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(block.len(), 3);
    }

    #[test]
    fn test_continuation_links_to_previous_hash() {
        let mut block = Block::new("");
        block.append(Transaction::new("a", "1"));

        let next = block.continuation();
        assert_eq!(next.prev_hash, block.hash);
        assert_ne!(next.hash, block.hash);
        assert!(next.is_empty());
    }

    #[test]
    fn test_advance_matches_continuation_links() {
        let mut block = Block::new("");
        block.append(Transaction::new("a", "1"));
        let old_hash = block.hash.clone();

        block.advance();

        assert_eq!(block.prev_hash, old_hash);
        assert_ne!(block.hash, old_hash);
        assert!(block.is_empty());
    }

    #[test]
    fn test_block_wire_format() {
        let mut block = Block::new("");
        block.append(Transaction {
            id: "id-1".to_string(),
            key: "test_key".to_string(),
            value: "test_value".to_string(),
            timestamp: 1_700_000_000,
        });

        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["prev-block-hash"], "");
        assert_eq!(json["block-hash"], block.hash.as_str());
        assert_eq!(json["transactions"][0]["id"], "id-1");
        assert_eq!(json["transactions"][0]["key"], "test_key");
        assert_eq!(json["transactions"][0]["value"], "test_value");
        assert_eq!(json["transactions"][0]["timestamp"], 1_700_000_000);
    }

    #[test]
    fn test_null_transactions_decode_as_empty() {
        let raw = r#"{"prev-block-hash":"","block-hash":"abc","transactions":null}"#;
        let block: Block = serde_json::from_str(raw).unwrap();
        assert!(block.is_empty());
        assert_eq!(block.hash, "abc");
    }
}
