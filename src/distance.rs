//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::policy::{AccessList, Verdict};
use crate::route::DISTANCE_DEFAULT;

/// A `distance <value> [source-prefix [access-list]]` rule. Source
/// prefixes are matched longest-first against the advertising
/// neighbor's address, grounded on the original daemon's `rip_distance_apply`
/// (a `/32`-keyed lookup against a prefix table of the neighbor's address).
#[derive(Clone, Debug)]
pub struct DistanceRule {
    pub source: Ipv4Network,
    pub distance: u8,
    pub access_list: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct DistanceTable {
    pub rules: Vec<DistanceRule>,
    /// `distance <value>` with no source prefix; instance-wide fallback.
    pub default: Option<u8>,
}

impl DistanceTable {
    /// Computes the administrative distance that would apply to a route
    /// learned from `from`, advertising `dest_prefix`. Falls through to
    /// the instance default, then to the protocol-wide default (120) for
    /// RIP-learned routes.
    pub fn apply(
        &self,
        from: Ipv4Addr,
        dest_prefix: &Ipv4Network,
        acl: &impl AccessList,
    ) -> u8 {
        let best = self
            .rules
            .iter()
            .filter(|rule| rule.source.contains(from))
            .max_by_key(|rule| rule.source.prefix());

        let raw = match best {
            Some(rule) => match &rule.access_list {
                Some(name) => match acl.apply(name, dest_prefix) {
                    Some(Verdict::Permit) => rule.distance,
                    // Unresolvable or denying access-list: the rule is
                    // treated as present but inapplicable, which the
                    // original implementation represents as 0 (unset) —
                    // NOT a fall-through to the instance-wide default.
                    Some(Verdict::Deny) | None => 0,
                },
                None => rule.distance,
            },
            // No source-prefix rule matches at all: fall back to the
            // instance-wide default.
            None => self.default.unwrap_or(0),
        };

        if raw == 0 { DISTANCE_DEFAULT } else { raw }
    }
}
