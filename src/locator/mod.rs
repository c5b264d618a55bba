//! Azure NetApp Files resource identifiers.
//!
//! A [`ResourceLocator`] is the ARM id of a resource in the
//! account → capacity pool → volume → snapshot containment chain:
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.NetApp/
//!     netAppAccounts/{account}/capacityPools/{pool}/volumes/{volume}/snapshots/{snapshot}
//! ```
//!
//! Parsing happens once, up front. Afterwards the level of the locator and
//! the names of all of its ancestors are available without further string
//! work, and [`ResourceLocator::key`] yields the decomposed form expected by
//! the level-specific remote calls.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const SUBSCRIPTIONS: &str = "subscriptions";
const RESOURCE_GROUPS: &str = "resourceGroups";
const PROVIDERS: &str = "providers";
const NETAPP_NAMESPACE: &str = "Microsoft.NetApp";
const ACCOUNTS: &str = "netAppAccounts";
const POOLS: &str = "capacityPools";
const VOLUMES: &str = "volumes";
const SNAPSHOTS: &str = "snapshots";

/// Errors raised while parsing or decomposing a locator.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LocatorError {
    /// The locator does not describe the requested resource.
    #[error("malformed resource id '{locator}': {reason}")]
    Malformed {
        /// Locator text as supplied by the caller.
        locator: String,
        /// What was missing or unexpected.
        reason: String,
    },
}

impl LocatorError {
    fn malformed(locator: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            locator: locator.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Depth of a resource in the NetApp containment hierarchy.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ResourceLevel {
    /// `netAppAccounts/{account}`
    Account,
    /// `.../capacityPools/{pool}`
    Pool,
    /// `.../volumes/{volume}`
    Volume,
    /// `.../snapshots/{snapshot}`
    Snapshot,
}

impl ResourceLevel {
    /// Human readable label used in logs and error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Pool => "capacity pool",
            Self::Volume => "volume",
            Self::Snapshot => "snapshot",
        }
    }

    const fn segment(self) -> &'static str {
        match self {
            Self::Account => ACCOUNTS,
            Self::Pool => POOLS,
            Self::Volume => VOLUMES,
            Self::Snapshot => SNAPSHOTS,
        }
    }
}

impl fmt::Display for ResourceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decomposed form of a locator: the resource group plus every ancestor name
/// required to address a resource at its level.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResourceKey<'a> {
    /// A NetApp account.
    Account {
        /// Resource group holding the account.
        resource_group: &'a str,
        /// Account name.
        account: &'a str,
    },
    /// A capacity pool inside an account.
    Pool {
        /// Resource group holding the account.
        resource_group: &'a str,
        /// Account name.
        account: &'a str,
        /// Pool name.
        pool: &'a str,
    },
    /// A volume inside a capacity pool.
    Volume {
        /// Resource group holding the account.
        resource_group: &'a str,
        /// Account name.
        account: &'a str,
        /// Pool name.
        pool: &'a str,
        /// Volume name.
        volume: &'a str,
    },
    /// A snapshot of a volume.
    Snapshot {
        /// Resource group holding the account.
        resource_group: &'a str,
        /// Account name.
        account: &'a str,
        /// Pool name.
        pool: &'a str,
        /// Volume name.
        volume: &'a str,
        /// Snapshot name.
        snapshot: &'a str,
    },
}

impl ResourceKey<'_> {
    /// Level addressed by this key.
    #[must_use]
    pub const fn level(&self) -> ResourceLevel {
        match self {
            Self::Account { .. } => ResourceLevel::Account,
            Self::Pool { .. } => ResourceLevel::Pool,
            Self::Volume { .. } => ResourceLevel::Volume,
            Self::Snapshot { .. } => ResourceLevel::Snapshot,
        }
    }

    /// Resource group shared by every level.
    #[must_use]
    pub const fn resource_group(&self) -> &str {
        match self {
            Self::Account { resource_group, .. }
            | Self::Pool { resource_group, .. }
            | Self::Volume { resource_group, .. }
            | Self::Snapshot { resource_group, .. } => *resource_group,
        }
    }

    /// Provider-relative path, e.g.
    /// `netAppAccounts/a/capacityPools/p`.
    #[must_use]
    pub fn provider_path(&self) -> String {
        match self {
            Self::Account { account, .. } => format!("{ACCOUNTS}/{account}"),
            Self::Pool { account, pool, .. } => {
                format!("{ACCOUNTS}/{account}/{POOLS}/{pool}")
            }
            Self::Volume {
                account,
                pool,
                volume,
                ..
            } => format!("{ACCOUNTS}/{account}/{POOLS}/{pool}/{VOLUMES}/{volume}"),
            Self::Snapshot {
                account,
                pool,
                volume,
                snapshot,
                ..
            } => format!(
                "{ACCOUNTS}/{account}/{POOLS}/{pool}/{VOLUMES}/{volume}/{SNAPSHOTS}/{snapshot}"
            ),
        }
    }

    /// Full ARM id of the resource in `subscription`.
    #[must_use]
    pub fn resource_id(&self, subscription: &str) -> String {
        format!(
            "/{SUBSCRIPTIONS}/{subscription}/{RESOURCE_GROUPS}/{}/{PROVIDERS}/{NETAPP_NAMESPACE}/{}",
            self.resource_group(),
            self.provider_path()
        )
    }
}

impl fmt::Display for ResourceKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_group(), self.provider_path())
    }
}

/// Parsed ARM id of an Azure NetApp Files resource.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ResourceLocator {
    raw: String,
    subscription: String,
    resource_group: String,
    // account, then pool, volume, snapshot as present
    names: Vec<String>,
}

impl ResourceLocator {
    /// Parses an ARM resource id.
    ///
    /// Segment keys are matched ASCII case-insensitively and a single
    /// trailing slash is tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::Malformed`] when the id is not a NetApp
    /// account, pool, volume, or snapshot id.
    pub fn parse(locator: &str) -> Result<Self, LocatorError> {
        let trimmed = locator.trim();
        let body = trimmed
            .strip_prefix('/')
            .ok_or_else(|| LocatorError::malformed(trimmed, "resource id must start with '/'"))?;
        let path = body.strip_suffix('/').unwrap_or(body);
        let segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(LocatorError::malformed(trimmed, "empty path segment"));
        }
        if let Some(found) = segments.iter().find_map(|segment| reserved_char(segment)) {
            return Err(LocatorError::malformed(
                trimmed,
                format!("'{found}' is not allowed in a resource id"),
            ));
        }

        let mut pairs = segments.chunks(2);
        let subscription = expect_pair(trimmed, pairs.next(), SUBSCRIPTIONS)?;
        let resource_group = expect_pair(trimmed, pairs.next(), RESOURCE_GROUPS)?;
        let namespace = expect_pair(trimmed, pairs.next(), PROVIDERS)?;
        if !namespace.eq_ignore_ascii_case(NETAPP_NAMESPACE) {
            return Err(LocatorError::malformed(
                trimmed,
                format!("expected provider {NETAPP_NAMESPACE}, found {namespace}"),
            ));
        }

        let levels = [
            ResourceLevel::Account,
            ResourceLevel::Pool,
            ResourceLevel::Volume,
            ResourceLevel::Snapshot,
        ];
        let mut names = Vec::with_capacity(levels.len());
        for level in levels {
            match pairs.next() {
                Some(pair) => {
                    names.push(expect_pair(trimmed, Some(pair), level.segment())?.to_owned());
                }
                None if names.is_empty() => {
                    return Err(LocatorError::malformed(
                        trimmed,
                        format!("missing {ACCOUNTS} segment"),
                    ));
                }
                None => break,
            }
        }
        if pairs.next().is_some() {
            return Err(LocatorError::malformed(
                trimmed,
                "unexpected segments after snapshot name",
            ));
        }

        Ok(Self {
            raw: trimmed.to_owned(),
            subscription: subscription.to_owned(),
            resource_group: resource_group.to_owned(),
            names,
        })
    }

    /// Level named by this locator.
    #[must_use]
    pub fn level(&self) -> ResourceLevel {
        match self.names.len() {
            0 | 1 => ResourceLevel::Account,
            2 => ResourceLevel::Pool,
            3 => ResourceLevel::Volume,
            _ => ResourceLevel::Snapshot,
        }
    }

    /// Returns `true` for account ids.
    #[must_use]
    pub fn is_account(&self) -> bool {
        self.level() == ResourceLevel::Account
    }

    /// Returns `true` for capacity pool ids.
    #[must_use]
    pub fn is_pool(&self) -> bool {
        self.level() == ResourceLevel::Pool
    }

    /// Returns `true` for volume ids.
    #[must_use]
    pub fn is_volume(&self) -> bool {
        self.level() == ResourceLevel::Volume
    }

    /// Returns `true` for snapshot ids.
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        self.level() == ResourceLevel::Snapshot
    }

    /// Subscription the resource belongs to.
    #[must_use]
    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    /// Resource group holding the account.
    #[must_use]
    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    /// Account name; present at every level.
    #[must_use]
    pub fn account(&self) -> &str {
        self.names.first().map_or("", String::as_str)
    }

    /// Capacity pool name.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::Malformed`] for account ids.
    pub fn pool(&self) -> Result<&str, LocatorError> {
        self.name_at(ResourceLevel::Pool)
    }

    /// Volume name.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::Malformed`] for account and pool ids.
    pub fn volume(&self) -> Result<&str, LocatorError> {
        self.name_at(ResourceLevel::Volume)
    }

    /// Snapshot name.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::Malformed`] unless this is a snapshot id.
    pub fn snapshot(&self) -> Result<&str, LocatorError> {
        self.name_at(ResourceLevel::Snapshot)
    }

    /// Simple name of the resource itself (the last path segment).
    #[must_use]
    pub fn name(&self) -> &str {
        self.names.last().map_or("", String::as_str)
    }

    /// Original id text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Decomposes the locator into the key for its level.
    #[must_use]
    pub fn key(&self) -> ResourceKey<'_> {
        let resource_group = self.resource_group.as_str();
        match self.names.as_slice() {
            [account, pool, volume, snapshot, ..] => ResourceKey::Snapshot {
                resource_group,
                account,
                pool,
                volume,
                snapshot,
            },
            [account, pool, volume] => ResourceKey::Volume {
                resource_group,
                account,
                pool,
                volume,
            },
            [account, pool] => ResourceKey::Pool {
                resource_group,
                account,
                pool,
            },
            [account] => ResourceKey::Account {
                resource_group,
                account,
            },
            [] => ResourceKey::Account {
                resource_group,
                account: "",
            },
        }
    }

    fn name_at(&self, level: ResourceLevel) -> Result<&str, LocatorError> {
        let depth = match level {
            ResourceLevel::Account => 0,
            ResourceLevel::Pool => 1,
            ResourceLevel::Volume => 2,
            ResourceLevel::Snapshot => 3,
        };
        self.names.get(depth).map(String::as_str).ok_or_else(|| {
            LocatorError::malformed(
                &self.raw,
                format!("{} id has no {} segment", self.level(), level.segment()),
            )
        })
    }
}

impl FromStr for ResourceLocator {
    type Err = LocatorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Strips a hierarchical display name such as `account/pool/volume` down to
/// its last segment.
///
/// The control plane reports child resource names relative to their
/// account; calls that address the resource by name need only the leaf.
#[must_use]
pub fn leaf_name(name: &str) -> &str {
    let trimmed = name.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Characters that change the shape of a resource id or its URL when they
/// appear inside a name.
pub const RESERVED_NAME_CHARS: [char; 3] = ['/', '?', '#'];

/// First character of `name` that cannot appear in a single id segment.
#[must_use]
pub fn reserved_char(name: &str) -> Option<char> {
    name.chars().find(|found| RESERVED_NAME_CHARS.contains(found))
}

fn expect_pair<'a>(
    locator: &str,
    pair: Option<&[&'a str]>,
    key: &str,
) -> Result<&'a str, LocatorError> {
    match pair {
        Some([found, value]) if found.eq_ignore_ascii_case(key) => Ok(value),
        Some([found, _]) => Err(LocatorError::malformed(
            locator,
            format!("expected '{key}' segment, found '{found}'"),
        )),
        Some(_) => Err(LocatorError::malformed(
            locator,
            format!("'{key}' segment has no name"),
        )),
        None => Err(LocatorError::malformed(
            locator,
            format!("missing '{key}' segment"),
        )),
    }
}
