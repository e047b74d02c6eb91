//! Stark-curve settlement signatures for Extended orders and withdrawals.
//!
//! Messages are hashed as SNIP-12 (revision 1) typed data: every struct is
//! the Poseidon hash of its type hash followed by its members, and the final
//! message binds the domain and the signer's public key.

use crate::core::schema::extended::{L2Config, OrderSide, StarkSignature};
use anyhow::{Context, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sha3::{Digest, Keccak256};
use starknet_crypto::{get_public_key, poseidon_hash_many, rfc6979_generate_k, sign, Felt};

const DOMAIN_NAME: &str = "Perpetuals";
const DOMAIN_VERSION: &str = "v0";
const MESSAGE_PREFIX: &str = "StarkNet Message";

const DOMAIN_TYPE: &str = r#""StarknetDomain"("name":"shortstring","version":"shortstring","chainId":"shortstring","revision":"shortstring")"#;
const POSITION_ID_TYPE: &str = r#""PositionId"("value":"u32")"#;
const ASSET_ID_TYPE: &str = r#""AssetId"("value":"felt")"#;
const TIMESTAMP_TYPE: &str = r#""Timestamp"("seconds":"u64")"#;
const ORDER_TYPE: &str = r#""Order"("position_id":"PositionId","base_asset_id":"AssetId","base_amount":"i64","quote_asset_id":"AssetId","quote_amount":"i64","fee_asset_id":"AssetId","fee_amount":"u64","expiration":"Timestamp","salt":"felt")"#;
const WITHDRAW_TYPE: &str = r#""WithdrawArgs"("recipient":"ContractAddress","position_id":"PositionId","collateral_id":"AssetId","amount":"u64","expiration":"Timestamp","salt":"felt")"#;

/// Keccak-256 truncated to 250 bits.
pub fn starknet_keccak(data: &[u8]) -> Felt {
    let mut bytes: [u8; 32] = Keccak256::digest(data).into();
    bytes[0] &= 0x03;
    Felt::from_bytes_be(&bytes)
}

/// Cairo short string: ASCII packed big-endian, at most 31 characters.
pub fn short_string(s: &str) -> Result<Felt> {
    if s.len() > 31 || !s.is_ascii() {
        anyhow::bail!("{:?} is not a Cairo short string", s);
    }
    Ok(Felt::from_bytes_be_slice(s.as_bytes()))
}

pub fn parse_felt(name: &str, raw: &str) -> Result<Felt> {
    let raw = raw.trim();
    let parsed = if raw.starts_with("0x") || raw.starts_with("0X") {
        Felt::from_hex(raw)
    } else {
        Felt::from_dec_str(raw)
    };
    parsed.map_err(|e| anyhow::anyhow!("{} {:?} is not a field element: {}", name, raw, e))
}

pub fn public_key_hex(private_key: &str) -> Result<String> {
    let key = parse_felt("private_key", private_key)?;
    Ok(format!("{:#x}", get_public_key(&key)))
}

fn type_hash(type_string: &str, nested: &[&str]) -> Felt {
    let mut encoded = type_string.to_string();
    for n in nested {
        encoded.push_str(n);
    }
    starknet_keccak(encoded.as_bytes())
}

fn wrapped(type_string: &str, value: Felt) -> Felt {
    poseidon_hash_many(&[type_hash(type_string, &[]), value])
}

pub fn domain_hash(chain_id: &str) -> Result<Felt> {
    Ok(poseidon_hash_many(&[
        type_hash(DOMAIN_TYPE, &[]),
        short_string(DOMAIN_NAME)?,
        short_string(DOMAIN_VERSION)?,
        short_string(chain_id)?,
        Felt::ONE,
    ]))
}

/// Integer settlement amounts of one order, in Stark units.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderMessage {
    pub position_id: u32,
    pub base_asset_id: Felt,
    pub base_amount: i64,
    pub quote_asset_id: Felt,
    pub quote_amount: i64,
    pub fee_asset_id: Felt,
    pub fee_amount: u64,
    pub expiration: u64,
    pub salt: u64,
}

impl OrderMessage {
    /// Buys receive synthetic and pay collateral; sells the reverse. Collateral
    /// rounds against the trader and the fee always rounds up.
    #[allow(clippy::too_many_arguments)]
    pub fn for_trade(
        l2: &L2Config,
        side: OrderSide,
        qty: Decimal,
        price: Decimal,
        fee_rate: Decimal,
        position_id: u32,
        expiration: u64,
        salt: u64,
    ) -> Result<Self> {
        let rounding = match side {
            OrderSide::Buy => RoundingStrategy::AwayFromZero,
            OrderSide::Sell => RoundingStrategy::ToZero,
        };
        if qty <= Decimal::ZERO || price <= Decimal::ZERO {
            anyhow::bail!("order amount {} and price {} must be positive", qty, price);
        }
        let synthetic = to_units(product(qty, Decimal::from(l2.synthetic_resolution))?, rounding)?;
        let notional = product(product(qty, price)?, Decimal::from(l2.collateral_resolution))?;
        let collateral = to_units(notional, rounding)?;
        let fee = to_units(product(Decimal::from(collateral), fee_rate)?, RoundingStrategy::AwayFromZero)?;
        let fee_amount = u64::try_from(fee).map_err(|_| anyhow::anyhow!("fee {} must not be negative", fee))?;

        let (base_amount, quote_amount) = match side {
            OrderSide::Buy => (synthetic, -collateral),
            OrderSide::Sell => (-synthetic, collateral),
        };
        let collateral_id = parse_felt("collateral_id", &l2.collateral_id)?;

        Ok(Self {
            position_id,
            base_asset_id: parse_felt("synthetic_id", &l2.synthetic_id)?,
            base_amount,
            quote_asset_id: collateral_id,
            quote_amount,
            fee_asset_id: collateral_id,
            fee_amount,
            expiration,
            salt,
        })
    }

    pub fn struct_hash(&self) -> Felt {
        poseidon_hash_many(&[
            type_hash(ORDER_TYPE, &[POSITION_ID_TYPE, ASSET_ID_TYPE, TIMESTAMP_TYPE]),
            wrapped(POSITION_ID_TYPE, Felt::from(self.position_id)),
            wrapped(ASSET_ID_TYPE, self.base_asset_id),
            Felt::from(self.base_amount),
            wrapped(ASSET_ID_TYPE, self.quote_asset_id),
            Felt::from(self.quote_amount),
            wrapped(ASSET_ID_TYPE, self.fee_asset_id),
            Felt::from(self.fee_amount),
            wrapped(TIMESTAMP_TYPE, Felt::from(self.expiration)),
            Felt::from(self.salt),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalMessage {
    pub recipient: Felt,
    pub position_id: u32,
    pub collateral_id: Felt,
    pub amount: u64,
    pub expiration: u64,
    pub salt: u64,
}

impl WithdrawalMessage {
    pub fn struct_hash(&self) -> Felt {
        poseidon_hash_many(&[
            type_hash(WITHDRAW_TYPE, &[POSITION_ID_TYPE, ASSET_ID_TYPE, TIMESTAMP_TYPE]),
            self.recipient,
            wrapped(POSITION_ID_TYPE, Felt::from(self.position_id)),
            wrapped(ASSET_ID_TYPE, self.collateral_id),
            Felt::from(self.amount),
            wrapped(TIMESTAMP_TYPE, Felt::from(self.expiration)),
            Felt::from(self.salt),
        ])
    }
}

/// `a * b`, failing instead of overflowing.
pub fn product(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| anyhow::anyhow!("{} * {} overflows", a, b))
}

pub fn to_units(value: Decimal, rounding: RoundingStrategy) -> Result<i64> {
    value
        .round_dp_with_strategy(0, rounding)
        .to_i64()
        .ok_or_else(|| anyhow::anyhow!("{} does not fit a settlement amount", value))
}

pub struct StarkSigner {
    private_key: Felt,
    public_key: Felt,
    domain: Felt,
}

impl StarkSigner {
    pub fn from_hex(private_key: &str, chain_id: &str) -> Result<Self> {
        let private_key = parse_felt("private_key", private_key)?;
        if private_key == Felt::ZERO {
            anyhow::bail!("private_key must not be zero");
        }
        Ok(Self {
            public_key: get_public_key(&private_key),
            private_key,
            domain: domain_hash(chain_id)?,
        })
    }

    pub fn public_key(&self) -> Felt {
        self.public_key
    }

    pub fn public_key_hex(&self) -> String {
        format!("{:#x}", self.public_key)
    }

    pub fn message_hash(&self, struct_hash: Felt) -> Result<Felt> {
        Ok(poseidon_hash_many(&[
            short_string(MESSAGE_PREFIX)?,
            self.domain,
            self.public_key,
            struct_hash,
        ]))
    }

    pub fn sign_order(&self, order: &OrderMessage) -> Result<StarkSignature> {
        self.sign_hash(self.message_hash(order.struct_hash())?)
    }

    pub fn sign_withdrawal(&self, withdrawal: &WithdrawalMessage) -> Result<StarkSignature> {
        self.sign_hash(self.message_hash(withdrawal.struct_hash())?)
    }

    fn sign_hash(&self, hash: Felt) -> Result<StarkSignature> {
        let k = rfc6979_generate_k(&hash, &self.private_key, None);
        let sig = sign(&self.private_key, &hash, &k)
            .map_err(|e| anyhow::anyhow!("{:?}", e))
            .context("Stark signing failed")?;
        Ok(StarkSignature {
            r: format!("{:#x}", sig.r),
            s: format!("{:#x}", sig.s),
        })
    }
}
