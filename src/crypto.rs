//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::LazyLock as Lazy;

use hmac::Hmac;
use hmac::digest::block_buffer::Eager;
use hmac::digest::core_api::{
    BlockSizeUser, BufferKindUser, CoreProxy, FixedOutputCore, UpdateCore,
};
use hmac::digest::typenum::{IsLess, Le, NonZero, U256};
use hmac::digest::{HashMarker, Mac, OutputSizeUser};
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use whirlpool::Whirlpool;

/// Authentication/digest algorithms supported by the Authenticator
/// collaborator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum CryptoAlgo {
    /// No authentication.
    ClearText,
    /// Keyed-MD5, RFC 2082.
    Md5,
    HmacSha1,
    HmacSha256,
    HmacSha384,
    HmacSha512,
    HmacRipemd160,
    HmacWhirlpool,
}

impl CryptoAlgo {
    pub fn digest_size(&self) -> u8 {
        match self {
            CryptoAlgo::ClearText => 16,
            CryptoAlgo::Md5 => 16,
            CryptoAlgo::HmacSha1 => 20,
            CryptoAlgo::HmacSha256 => 32,
            CryptoAlgo::HmacSha384 => 48,
            CryptoAlgo::HmacSha512 => 64,
            CryptoAlgo::HmacRipemd160 => 20,
            CryptoAlgo::HmacWhirlpool => 64,
        }
    }
}

// Apad is the hexadecimal value 0x878FE1F3 repeated (L/4) times, where L is
// the length of the hash, measured in bytes (RFC 4822 Section 3.3). Sized to
// accommodate the largest supported digest (64 bytes, SHA-512/Whirlpool).
pub static HMAC_APAD: Lazy<Vec<u8>> = Lazy::new(|| {
    [0x87, 0x8F, 0xE1, 0xF3].into_iter().cycle().take(64).collect()
});

/// The authentication key needs to be 16 bytes long for Keyed-MD5 (RFC 2082
/// Section 2).
fn keyed_md5_digest(data: &[u8], key: &[u8]) -> [u8; 16] {
    let mut key = key.to_vec();
    key.resize(16, 0);

    let mut ctx = md5::Context::new();
    ctx.consume(data);
    ctx.consume(&key);
    *ctx.compute()
}

/// Computes an RFC 4822 HMAC digest over `data` using key `key`, appending
/// Apad (no protocol-id or source-address prefix, unlike OSPFv2/OSPFv3's
/// variant of the same construction).
fn hmac_digest<H>(data: &[u8], key: &[u8]) -> Vec<u8>
where
    H: CoreProxy,
    H::Core: HashMarker
        + UpdateCore
        + FixedOutputCore
        + BufferKindUser<BufferKind = Eager>
        + Default
        + Clone,
    <H::Core as BlockSizeUser>::BlockSize: IsLess<U256>,
    Le<<H::Core as BlockSizeUser>::BlockSize, U256>: NonZero,
{
    let mut mac = Hmac::<H>::new_from_slice(key).unwrap();
    mac.update(data);
    let digest_size = H::Core::output_size();
    mac.update(&HMAC_APAD[..digest_size]);
    let digest = mac.finalize();
    digest.into_bytes().to_vec()
}

/// Computes the message digest for `algo` over `data` using `key`.
/// `ClearText` has no digest; callers must special-case it.
pub fn message_digest(data: &[u8], algo: CryptoAlgo, key: &[u8]) -> Vec<u8> {
    match algo {
        CryptoAlgo::ClearText => {
            let mut padded = key.to_vec();
            padded.resize(16, 0);
            padded
        }
        CryptoAlgo::Md5 => keyed_md5_digest(data, key).to_vec(),
        CryptoAlgo::HmacSha1 => hmac_digest::<Sha1>(data, key),
        CryptoAlgo::HmacSha256 => hmac_digest::<Sha256>(data, key),
        CryptoAlgo::HmacSha384 => hmac_digest::<Sha384>(data, key),
        CryptoAlgo::HmacSha512 => hmac_digest::<Sha512>(data, key),
        CryptoAlgo::HmacRipemd160 => hmac_digest::<Ripemd160>(data, key),
        CryptoAlgo::HmacWhirlpool => hmac_digest::<Whirlpool>(data, key),
    }
}
