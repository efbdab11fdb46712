//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::crypto::CryptoAlgo;

pub type Keychains = BTreeMap<String, Arc<Keychain>>;

/// Authentication key-chain: an ordered set of rotating keys.
#[derive(Clone, Debug, Deserialize, Serialize, new)]
pub struct Keychain {
    pub name: String,
    #[new(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[new(default)]
    pub keys: BTreeMap<u16, KeychainKey>,
}

#[derive(Clone, Debug, Deserialize, Serialize, new)]
pub struct KeychainKey {
    pub data: Key,
    #[new(default)]
    pub send_lifetime: KeyLifetime,
    #[new(default)]
    pub accept_lifetime: KeyLifetime,
}

#[derive(Clone, Debug, Deserialize, Serialize, new)]
pub struct Key {
    pub id: u16,
    pub algo: CryptoAlgo,
    pub string: Vec<u8>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct KeyLifetime {
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
}

impl Keychain {
    /// Outbound key selection: among keys with an active send lifetime,
    /// pick the one with the most recent (latest) window start.
    /// A key with no configured start is treated as "always has been
    /// active" and only wins if no bounded key is active.
    pub fn key_lookup_send(&self) -> Option<&Key> {
        self.keys
            .values()
            .filter(|key| key.send_lifetime.is_active())
            .max_by_key(|key| key.send_lifetime.start)
            .map(|key| &key.data)
    }

    /// Inbound key selection: the key whose id matches AND whose accept
    /// window contains "now"; fail-close (`None`) otherwise.
    pub fn key_lookup_accept(&self, key_id: u16) -> Option<&Key> {
        self.keys
            .get(&key_id)
            .filter(|key| key.accept_lifetime.is_active())
            .map(|key| &key.data)
    }

    /// Used by schemes without an on-wire key-id (simple cleartext).
    pub fn key_lookup_accept_any(&self) -> Option<&Key> {
        self.keys
            .values()
            .filter(|key| key.accept_lifetime.is_active())
            .map(|key| &key.data)
            .next()
    }
}

impl KeyLifetime {
    pub fn is_active(&self) -> bool {
        let now = Utc::now();

        if let Some(start) = self.start {
            if now < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if now > end {
                return false;
            }
        }

        true
    }
}

/// An interface's authentication configuration.
#[derive(Clone, Debug, Default)]
pub enum AuthMethod {
    #[default]
    None,
    /// Simple cleartext passphrase (v2 only).
    Cleartext(Vec<u8>),
    /// A single static key (no rotation).
    ManualKey(Key),
    /// A rotating keychain, referenced by name.
    Keychain(Arc<Keychain>),
}
