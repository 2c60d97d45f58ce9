//! Per-chain constants for the attestation service contracts and the issuer
//! trust anchors.

use alloy::primitives::{address, b256, Address, B256};

pub const MAINNET_ID: u64 = 1;
pub const ARBITRUM_MAIN_ID: u64 = 42161;
pub const SEPOLIA_TESTNET_ID: u64 = 11155111;

/// Chains whose assets carry real value. Everything else is treated as a
/// test or development network.
const REAL_VALUE_CHAINS: &[u64] = &[
    MAINNET_ID,
    100,         // gnosis
    137,         // polygon
    30,          // rootstock
    61,          // classic
    59144,       // linea
    8453,        // base
    5000,        // mantle
    185,         // mint
    56,          // binance
    43114,       // avalanche
    250,         // fantom
    10,          // optimism
    25,          // cronos
    ARBITRUM_MAIN_ID,
    11297108109, // palm
    8217,        // klaytn
    4689,        // iotex
    1313161554,  // aurora
    2001,        // milkomeda c1
    66,          // okx
];

const ROOT_ISSUERS: &[Address] = &[
    address!("0x715e50699db0a553119a4eb1cd13808eedc2910d"),
    address!("0xa20efc4b9537d27acfd052003e311f762620642d"),
];

const DEV_ROOT_ISSUER: Address = address!("0x4461110869a5d65df76b85e2cd8bbfdda2ca6e4d");

pub fn has_real_value(chain_id: u64) -> bool {
    REAL_VALUE_CHAINS.contains(&chain_id)
}

/// The EAS contract named as `verifyingContract` in the signing domain.
pub fn eas_contract(chain_id: u64) -> Option<Address> {
    match chain_id {
        MAINNET_ID => Some(address!("0xA1207F3BBa224E2c9c3c6D5aF63D0eb1582Ce587")),
        ARBITRUM_MAIN_ID => Some(address!("0xbD75f629A22Dc1ceD33dDA0b68c546A1c035c458")),
        SEPOLIA_TESTNET_ID => Some(address!("0xC2679fBD37d54388Ce493F1DB75320D236e1815e")),
        _ => None,
    }
}

pub fn schema_registry_contract(chain_id: u64) -> Option<Address> {
    match chain_id {
        MAINNET_ID => Some(address!("0xA7b39296258348C78294F95B872b282326A97BDF")),
        ARBITRUM_MAIN_ID => Some(address!("0xA310da9c5B885E7fb3fbA9D66E9Ba6Df512b78eB")),
        SEPOLIA_TESTNET_ID => Some(address!("0x0a7E2Ff54e76B8E6659aedc9103FB21c038050D0")),
        _ => None,
    }
}

/// Schema whose resolver answers `validateSignature` for delegated issuers.
pub fn key_schema_uid(chain_id: u64) -> Option<B256> {
    match chain_id {
        ARBITRUM_MAIN_ID => Some(b256!(
            "0x5f0437f7c1db1f8e575732ca52cc8ad899b3c9fe38b78b67ff4ba7c37a8bf3b4"
        )),
        SEPOLIA_TESTNET_ID => Some(b256!(
            "0x4455598d3ec459c4af59335f7729fea0f50ced46cb1cd67914f5349d44142ec1"
        )),
        _ => None,
    }
}

pub fn root_key_uid(chain_id: u64) -> Option<B256> {
    match chain_id {
        ARBITRUM_MAIN_ID => Some(b256!(
            "0xe5c2bfd98a1b35573610b4e5a367bbcb5c736e42508a33fd6046bad63eaf18f9"
        )),
        SEPOLIA_TESTNET_ID => Some(b256!(
            "0xee99de42f544fa9a47caaf8d4a4426c1104b6d7a9df7f661f892730f1b5b1e23"
        )),
        _ => None,
    }
}

/// Static allow-list of root issuers, extendable for private deployments.
#[derive(Debug, Clone, Default)]
pub struct RootIssuers {
    extra: Vec<Address>,
}

impl RootIssuers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issuer(mut self, issuer: Address) -> Self {
        self.extra.push(issuer);
        self
    }

    pub fn for_chain(&self, chain_id: u64) -> Vec<Address> {
        let mut issuers = ROOT_ISSUERS.to_vec();
        if !has_real_value(chain_id) {
            issuers.push(DEV_ROOT_ISSUER);
        }
        issuers.extend(self.extra.iter().copied());
        issuers
    }

    /// Case-insensitive membership; an unparsable signer is never a member.
    pub fn contains(&self, chain_id: u64, signer: &str) -> bool {
        match signer.trim().parse::<Address>() {
            Ok(addr) => self.for_chain(chain_id).contains(&addr),
            Err(_) => false,
        }
    }
}
