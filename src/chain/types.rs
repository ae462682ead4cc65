//! Typed JSON-RPC response schemas
//!
//! Every upstream payload is deserialized into one of these structs at the
//! gateway boundary; nothing above `chain` sees raw JSON.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// `{ context, value }` wrapper used by most account queries
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse<T> {
    pub value: T,
}

/// Entry of `getTokenAccountsByOwner` with `jsonParsed` encoding
#[derive(Debug, Clone, Deserialize)]
pub struct RpcKeyedAccount {
    pub pubkey: String,
    pub account: RpcParsedAccount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcParsedAccount {
    pub data: ParsedAccountData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedAccountData {
    pub program: String,
    pub parsed: ParsedTokenAccount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedTokenAccount {
    #[serde(rename = "type")]
    pub kind: String,
    pub info: TokenAccountInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAccountInfo {
    pub mint: String,
    pub owner: String,
    pub token_amount: UiTokenAmount,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    /// Raw base units as a decimal string
    pub amount: String,
    pub decimals: u8,
    #[serde(default)]
    pub ui_amount: Option<f64>,
}

/// A token account owned by the wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHolding {
    #[serde(with = "pubkey_string")]
    pub mint: Pubkey,
    #[serde(with = "pubkey_string")]
    pub token_account: Pubkey,
    /// Balance in base units
    pub amount: u64,
    pub decimals: u8,
    pub ui_balance: f64,
}

impl TryFrom<RpcKeyedAccount> for TokenHolding {
    type Error = crate::Error;

    fn try_from(keyed: RpcKeyedAccount) -> crate::Result<Self> {
        let info = keyed.account.data.parsed.info;
        let parse_key = |field: &str, value: &str| {
            value.parse::<Pubkey>().map_err(|e| {
                crate::Error::ChainRequest(format!("invalid {} in token account: {}", field, e))
            })
        };
        let amount = info.token_amount.amount.parse::<u64>().map_err(|e| {
            crate::Error::ChainRequest(format!("invalid token amount: {}", e))
        })?;
        let decimals = info.token_amount.decimals;

        Ok(Self {
            mint: parse_key("mint", &info.mint)?,
            token_account: parse_key("pubkey", &keyed.pubkey)?,
            amount,
            decimals,
            ui_balance: crate::tokens::to_ui_amount(amount, decimals),
        })
    }
}

/// Native and token balances of one owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBalances {
    pub lamports: u64,
    /// Lamports scaled to SOL
    pub native_balance: f64,
    pub token_holdings: Vec<TokenHolding>,
}

/// Entry of `getSignaturesForAddress`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub confirmation_status: Option<String>,
}

impl SignatureInfo {
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self.confirmation_status.as_deref(),
            Some("confirmed") | Some("finalized")
        )
    }
}

/// `getTransaction` result with `jsonParsed` encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransaction {
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
    pub transaction: TransactionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    pub fee: u64,
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionBody {
    pub signatures: Vec<String>,
    pub message: ParsedMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMessage {
    pub account_keys: Vec<AccountKey>,
    #[serde(default)]
    pub instructions: Vec<ParsedInstruction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountKey {
    pub pubkey: String,
    #[serde(default)]
    pub signer: bool,
    #[serde(default)]
    pub writable: bool,
}

/// An instruction the node could decode, or one it left as raw data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParsedInstruction {
    #[serde(rename_all = "camelCase")]
    Parsed {
        program: String,
        program_id: String,
        parsed: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    PartiallyDecoded {
        program_id: String,
        #[serde(default)]
        accounts: Vec<String>,
        data: String,
    },
}

/// A confirmed transaction touching the wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub detail: ParsedTransaction,
}

impl TransactionRecord {
    /// Whether the transaction landed with an error
    pub fn failed(&self) -> bool {
        self.detail
            .meta
            .as_ref()
            .map(|m| m.err.is_some())
            .unwrap_or(false)
    }

    pub fn fee_lamports(&self) -> Option<u64> {
        self.detail.meta.as_ref().map(|m| m.fee)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestBlockhash {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

/// Entry of `getSignatureStatuses`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub confirmation_status: Option<crate::config::Commitment>,
}

mod pubkey_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(key)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
