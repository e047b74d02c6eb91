//! EIP-712 signatures for GRVT orders, transfers and vault moves.

use crate::core::schema::grvt::{Instrument, Order, Signature};
use anyhow::{Context, Result};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rust_decimal::Decimal;
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::str::FromStr;

const DOMAIN_NAME: &str = "GRVT Exchange";
const DOMAIN_VERSION: &str = "0";
const PRICE_DECIMALS: u32 = 9;
const TOKEN_DECIMALS: u32 = 6;

const DOMAIN_TYPE: &str = "EIP712Domain(string name,string version,uint256 chainId)";
const ORDER_TYPE: &str = "Order(uint64 subAccountID,bool isMarket,uint8 timeInForce,bool postOnly,bool reduceOnly,OrderLeg[] legs,uint32 nonce,int64 expiration)OrderLeg(uint256 assetID,uint64 contractSize,uint64 limitPrice,bool isBuyingContract)";
const ORDER_LEG_TYPE: &str = "OrderLeg(uint256 assetID,uint64 contractSize,uint64 limitPrice,bool isBuyingContract)";
const TRANSFER_TYPE: &str = "Transfer(address fromAccount,uint64 fromSubAccount,address toAccount,uint64 toSubAccount,uint8 tokenCurrency,uint64 numTokens,uint32 nonce,int64 expiration)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultAction {
    Invest,
    Redeem,
}

impl VaultAction {
    fn type_string(self) -> &'static str {
        match self {
            VaultAction::Invest => "VaultInvest(address mainAccountID,uint64 vaultID,uint8 tokenCurrency,uint64 numTokens,uint32 nonce,int64 expiration)",
            VaultAction::Redeem => "VaultRedeem(address mainAccountID,uint64 vaultID,uint8 tokenCurrency,uint64 numTokens,uint32 nonce,int64 expiration)",
        }
    }
}

/// Token currency ids: USDC is 4, everything else is treated as USDT (3).
pub fn currency_id(currency: &str) -> u8 {
    if currency == "USDC" {
        4
    } else {
        3
    }
}

pub struct TransferFields<'a> {
    pub from_account: &'a str,
    pub from_sub_account: &'a str,
    pub to_account: &'a str,
    pub to_sub_account: &'a str,
    pub currency: &'a str,
    pub num_tokens: Decimal,
}

pub struct VaultFields<'a> {
    pub main_account: &'a str,
    pub vault_id: u64,
    pub currency: &'a str,
    pub num_tokens: Decimal,
}

pub struct Eip712Signer {
    key: SigningKey,
    address: String,
    chain_id: u64,
}

impl Eip712Signer {
    pub fn from_hex(private_key: &str, chain_id: u64) -> Result<Self> {
        let bytes = hex::decode(private_key.trim().trim_start_matches("0x"))
            .context("private key is not valid hex")?;
        let key = SigningKey::from_slice(&bytes).context("private key is not a valid secp256k1 scalar")?;
        let address = address_of(&key);
        Ok(Self {
            key,
            address,
            chain_id,
        })
    }

    /// Lower-case `0x` address of the signing key.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn sign_order(
        &self,
        order: &Order,
        instruments: &HashMap<String, Instrument>,
    ) -> Result<Signature> {
        let mut leg_hashes = Vec::with_capacity(order.legs.len() * 32);
        for leg in &order.legs {
            let inst = instruments
                .get(&leg.instrument)
                .ok_or_else(|| anyhow::anyhow!("Unknown instrument: {}", leg.instrument))?;
            let size = parse_decimal("size", &leg.size)?;
            let price = parse_decimal("limit_price", &leg.limit_price)?;

            let mut enc = Vec::with_capacity(32 * 5);
            enc.extend_from_slice(&keccak(ORDER_LEG_TYPE.as_bytes()));
            enc.extend_from_slice(&hex_word(&inst.instrument_hash)?);
            enc.extend_from_slice(&uint_word(scaled(size, inst.base_decimals)?));
            enc.extend_from_slice(&uint_word(scaled(price, PRICE_DECIMALS)?));
            enc.extend_from_slice(&bool_word(leg.is_buying_asset));
            leg_hashes.extend_from_slice(&keccak(&enc));
        }

        let sub_account: u64 = order
            .sub_account_id
            .parse()
            .context("sub_account_id must be numeric")?;
        let expiration = parse_i64("expiration", &order.signature.expiration)?;

        let mut enc = Vec::with_capacity(32 * 9);
        enc.extend_from_slice(&keccak(ORDER_TYPE.as_bytes()));
        enc.extend_from_slice(&uint_word(sub_account));
        enc.extend_from_slice(&bool_word(order.is_market));
        enc.extend_from_slice(&uint_word(order.time_in_force.code() as u64));
        enc.extend_from_slice(&bool_word(order.post_only));
        enc.extend_from_slice(&bool_word(order.reduce_only));
        enc.extend_from_slice(&keccak(&leg_hashes));
        enc.extend_from_slice(&uint_word(order.signature.nonce as u64));
        enc.extend_from_slice(&int_word(expiration));

        self.finish(keccak(&enc), expiration, order.signature.nonce)
    }

    pub fn sign_transfer(&self, fields: &TransferFields<'_>, expiration: i64, nonce: u32) -> Result<Signature> {
        let mut enc = Vec::with_capacity(32 * 9);
        enc.extend_from_slice(&keccak(TRANSFER_TYPE.as_bytes()));
        enc.extend_from_slice(&address_word(fields.from_account)?);
        enc.extend_from_slice(&uint_word(parse_u64("from_sub_account", fields.from_sub_account)?));
        enc.extend_from_slice(&address_word(fields.to_account)?);
        enc.extend_from_slice(&uint_word(parse_u64("to_sub_account", fields.to_sub_account)?));
        enc.extend_from_slice(&uint_word(currency_id(fields.currency) as u64));
        enc.extend_from_slice(&uint_word(scaled(fields.num_tokens, TOKEN_DECIMALS)?));
        enc.extend_from_slice(&uint_word(nonce as u64));
        enc.extend_from_slice(&int_word(expiration));

        self.finish(keccak(&enc), expiration, nonce)
    }

    pub fn sign_vault(&self, action: VaultAction, fields: &VaultFields<'_>, expiration: i64, nonce: u32) -> Result<Signature> {
        let mut enc = Vec::with_capacity(32 * 7);
        enc.extend_from_slice(&keccak(action.type_string().as_bytes()));
        enc.extend_from_slice(&address_word(fields.main_account)?);
        enc.extend_from_slice(&uint_word(fields.vault_id));
        enc.extend_from_slice(&uint_word(currency_id(fields.currency) as u64));
        enc.extend_from_slice(&uint_word(scaled(fields.num_tokens, TOKEN_DECIMALS)?));
        enc.extend_from_slice(&uint_word(nonce as u64));
        enc.extend_from_slice(&int_word(expiration));

        self.finish(keccak(&enc), expiration, nonce)
    }

    fn finish(&self, struct_hash: [u8; 32], expiration: i64, nonce: u32) -> Result<Signature> {
        let digest = typed_data_digest(self.chain_id, &struct_hash);
        let (sig, recovery) = self
            .key
            .sign_prehash_recoverable(&digest)
            .context("signing failed")?;
        let bytes = sig.to_bytes();
        Ok(Signature {
            signer: self.address.clone(),
            r: format!("0x{}", hex::encode(&bytes[..32])),
            s: format!("0x{}", hex::encode(&bytes[32..])),
            v: recovery.to_byte() + 27,
            expiration: expiration.to_string(),
            nonce,
        })
    }
}

pub fn typed_data_digest(chain_id: u64, struct_hash: &[u8; 32]) -> [u8; 32] {
    let mut enc = Vec::with_capacity(2 + 64);
    enc.extend_from_slice(&[0x19, 0x01]);
    enc.extend_from_slice(&domain_separator(chain_id));
    enc.extend_from_slice(struct_hash);
    keccak(&enc)
}

pub fn domain_separator(chain_id: u64) -> [u8; 32] {
    let mut enc = Vec::with_capacity(32 * 4);
    enc.extend_from_slice(&keccak(DOMAIN_TYPE.as_bytes()));
    enc.extend_from_slice(&keccak(DOMAIN_NAME.as_bytes()));
    enc.extend_from_slice(&keccak(DOMAIN_VERSION.as_bytes()));
    enc.extend_from_slice(&uint_word(chain_id));
    keccak(&enc)
}

fn address_of(key: &SigningKey) -> String {
    let point = key.verifying_key().to_encoded_point(false);
    let hash = keccak(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

fn keccak(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

fn uint_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn int_word(value: i64) -> [u8; 32] {
    let fill = if value < 0 { 0xff } else { 0x00 };
    let mut word = [fill; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn bool_word(value: bool) -> [u8; 32] {
    uint_word(value as u64)
}

fn hex_word(raw: &str) -> Result<[u8; 32]> {
    let digits = raw.trim().trim_start_matches("0x");
    let padded = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };
    let bytes = hex::decode(&padded).with_context(|| format!("{:?} is not hex", raw))?;
    if bytes.len() > 32 {
        anyhow::bail!("{:?} does not fit in 32 bytes", raw);
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

fn address_word(raw: &str) -> Result<[u8; 32]> {
    let digits = raw.trim().trim_start_matches("0x");
    if digits.len() != 40 {
        anyhow::bail!("{:?} is not a 20-byte address", raw);
    }
    hex_word(digits)
}

/// `value * 10^decimals`, truncated toward zero.
fn scaled(value: Decimal, decimals: u32) -> Result<u64> {
    if value.is_sign_negative() {
        anyhow::bail!("{} must not be negative", value);
    }
    let factor = Decimal::from(10u64.pow(decimals));
    let product = value
        .checked_mul(factor)
        .ok_or_else(|| anyhow::anyhow!("{} overflows at {} decimals", value, decimals))?;
    u64::try_from(product.trunc()).map_err(|_| anyhow::anyhow!("{} overflows u64", product))
}

fn parse_decimal(name: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).with_context(|| format!("{} {:?} is not a decimal", name, raw))
}

fn parse_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim().parse().with_context(|| format!("{} {:?} is not an integer", name, raw))
}

fn parse_i64(name: &str, raw: &str) -> Result<i64> {
    raw.trim().parse().with_context(|| format!("{} {:?} is not an integer", name, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::grvt::{OrderLeg, OrderMetadata, TimeInForce};
    use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn instrument() -> Instrument {
        serde_json::from_value(serde_json::json!({
            "instrument": "BTC_USDT_Perp",
            "instrument_hash": "0x030501",
            "base_decimals": 9,
            "quote_decimals": 6
        }))
        .unwrap()
    }

    fn recover(sig: &Signature, digest: &[u8; 32]) -> String {
        let mut raw = hex::decode(sig.r.trim_start_matches("0x")).unwrap();
        raw.extend(hex::decode(sig.s.trim_start_matches("0x")).unwrap());
        let ecdsa = EcdsaSignature::from_slice(&raw).unwrap();
        let recid = RecoveryId::from_byte(sig.v - 27).unwrap();
        let key = VerifyingKey::recover_from_prehash(digest, &ecdsa, recid).unwrap();
        let point = key.to_encoded_point(false);
        format!("0x{}", hex::encode(&keccak(&point.as_bytes()[1..])[12..]))
    }

    #[test]
    fn address_matches_known_vector() {
        let signer = Eip712Signer::from_hex(KEY, 326).unwrap();
        assert_eq!(signer.address(), "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23");
    }

    #[test]
    fn rejects_garbage_keys() {
        assert!(Eip712Signer::from_hex("0xzz", 326).is_err());
        assert!(Eip712Signer::from_hex("0x00", 326).is_err());
    }

    #[test]
    fn words_are_abi_encoded() {
        assert_eq!(uint_word(1)[31], 1);
        assert_eq!(int_word(-1), [0xff; 32]);
        assert_eq!(hex_word("0x030501").unwrap()[29..], [0x03, 0x05, 0x01]);
        assert_eq!(hex_word("0x1").unwrap()[31], 1);
        assert!(address_word("0x1234").is_err());
    }

    #[test]
    fn scaling_truncates() {
        assert_eq!(scaled(Decimal::from_str("0.0015").unwrap(), 3).unwrap(), 1);
        assert_eq!(scaled(Decimal::from_str("65000.5").unwrap(), 9).unwrap(), 65_000_500_000_000);
        assert!(scaled(Decimal::from_str("-1").unwrap(), 6).is_err());
    }

    #[test]
    fn domain_depends_on_chain() {
        assert_ne!(domain_separator(325), domain_separator(326));
    }

    #[test]
    fn vault_signature_recovers_to_signer() {
        let signer = Eip712Signer::from_hex(KEY, 326).unwrap();
        let fields = VaultFields {
            main_account: signer.address(),
            vault_id: 42,
            currency: "USDC",
            num_tokens: Decimal::from_str("12.5").unwrap(),
        };
        let sig = signer.sign_vault(VaultAction::Invest, &fields, 1_700_000_000_000_000_000, 7).unwrap();

        let mut enc = Vec::new();
        enc.extend_from_slice(&keccak(VaultAction::Invest.type_string().as_bytes()));
        enc.extend_from_slice(&address_word(signer.address()).unwrap());
        enc.extend_from_slice(&uint_word(42));
        enc.extend_from_slice(&uint_word(4));
        enc.extend_from_slice(&uint_word(12_500_000));
        enc.extend_from_slice(&uint_word(7));
        enc.extend_from_slice(&int_word(1_700_000_000_000_000_000));
        let digest = typed_data_digest(326, &keccak(&enc));

        assert_eq!(recover(&sig, &digest), signer.address());
        assert_eq!(sig.signer, signer.address());
        assert_eq!(sig.nonce, 7);
        assert!(sig.v == 27 || sig.v == 28);
    }

    #[test]
    fn order_signing_needs_instrument_metadata() {
        let signer = Eip712Signer::from_hex(KEY, 326).unwrap();
        let order = Order {
            sub_account_id: "123".into(),
            is_market: false,
            time_in_force: TimeInForce::GoodTillTime,
            post_only: false,
            reduce_only: false,
            legs: vec![OrderLeg {
                instrument: "BTC_USDT_Perp".into(),
                size: "0.01".into(),
                limit_price: "65000".into(),
                is_buying_asset: true,
            }],
            signature: Signature::unsigned(1_700_000_000_000_000_000, 9),
            metadata: OrderMetadata {
                client_order_id: "1".into(),
            },
        };

        let err = signer.sign_order(&order, &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("Unknown instrument"));

        let instruments = HashMap::from([("BTC_USDT_Perp".to_string(), instrument())]);
        let sig = signer.sign_order(&order, &instruments).unwrap();
        assert_eq!(sig.expiration, "1700000000000000000");
        assert_eq!(sig.r.len(), 66);
        assert_eq!(sig.s.len(), 66);
    }

    #[test]
    fn transfer_requires_addresses() {
        let signer = Eip712Signer::from_hex(KEY, 326).unwrap();
        let fields = TransferFields {
            from_account: "not-an-address",
            from_sub_account: "0",
            to_account: signer.address(),
            to_sub_account: "5",
            currency: "USDC",
            num_tokens: Decimal::ONE,
        };
        assert!(signer.sign_transfer(&fields, 1, 1).is_err());
    }
}
