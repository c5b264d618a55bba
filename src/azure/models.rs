//! ARM wire representations of NetApp resources.

use serde::{Deserialize, Serialize};

use crate::backend::{
    AccountRequest, ExportPolicyRule, NetAppResource, PoolRequest, Tags, VolumeRequest,
};

fn no_tags(tags: &&Tags) -> bool {
    tags.is_empty()
}

#[derive(Debug, Serialize)]
pub(super) struct AccountBody<'a> {
    location: &'a str,
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a Tags,
    properties: EmptyProperties,
}

#[derive(Debug, Serialize)]
struct EmptyProperties {}

impl<'a> From<&'a AccountRequest> for AccountBody<'a> {
    fn from(request: &'a AccountRequest) -> Self {
        Self {
            location: &request.location,
            tags: &request.tags,
            properties: EmptyProperties {},
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct PoolBody<'a> {
    location: &'a str,
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a Tags,
    properties: PoolProperties<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PoolProperties<'a> {
    service_level: &'a str,
    size: u64,
}

impl<'a> From<&'a PoolRequest> for PoolBody<'a> {
    fn from(request: &'a PoolRequest) -> Self {
        Self {
            location: &request.location,
            tags: &request.tags,
            properties: PoolProperties {
                service_level: request.service_level.as_str(),
                size: request.size_bytes,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct VolumeBody<'a> {
    location: &'a str,
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a Tags,
    properties: VolumeProperties<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VolumeProperties<'a> {
    creation_token: &'a str,
    service_level: &'a str,
    usage_threshold: u64,
    subnet_id: &'a str,
    protocol_types: &'a [String],
    export_policy: ExportPolicy<'a>,
}

#[derive(Debug, Serialize)]
struct ExportPolicy<'a> {
    rules: Vec<ExportRuleBody<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportRuleBody<'a> {
    rule_index: u32,
    allowed_clients: &'a str,
    unix_read_only: bool,
    unix_read_write: bool,
    cifs: bool,
    nfsv3: bool,
    nfsv41: bool,
}

impl<'a> From<&'a ExportPolicyRule> for ExportRuleBody<'a> {
    fn from(rule: &'a ExportPolicyRule) -> Self {
        Self {
            rule_index: rule.rule_index,
            allowed_clients: &rule.allowed_clients,
            unix_read_only: rule.unix_read_only,
            unix_read_write: rule.unix_read_write,
            cifs: rule.cifs,
            nfsv3: rule.nfsv3,
            nfsv41: rule.nfsv41,
        }
    }
}

impl<'a> From<&'a VolumeRequest> for VolumeBody<'a> {
    fn from(request: &'a VolumeRequest) -> Self {
        Self {
            location: &request.location,
            tags: &request.tags,
            properties: VolumeProperties {
                creation_token: &request.creation_token,
                service_level: request.service_level.as_str(),
                usage_threshold: request.usage_threshold_bytes,
                subnet_id: &request.subnet_id,
                protocol_types: &request.protocol_types,
                export_policy: ExportPolicy {
                    rules: request.export_rules.iter().map(ExportRuleBody::from).collect(),
                },
            },
        }
    }
}

/// Subset of a resource response shared by accounts, pools and volumes.
#[derive(Clone, Debug, Deserialize)]
pub(super) struct ResourceEnvelope {
    id: String,
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    properties: Option<ProvisioningProperties>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisioningProperties {
    #[serde(default)]
    provisioning_state: Option<String>,
}

impl ResourceEnvelope {
    pub(super) fn provisioning_state(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|props| props.provisioning_state.as_deref())
    }
}

impl From<ResourceEnvelope> for NetAppResource {
    fn from(envelope: ResourceEnvelope) -> Self {
        let provisioning_state = envelope.provisioning_state().map(str::to_owned);
        Self {
            id: envelope.id,
            name: envelope.name,
            location: envelope.location,
            provisioning_state,
        }
    }
}

/// Body returned by an `Azure-AsyncOperation` status URL.
#[derive(Clone, Debug, Deserialize)]
pub(super) struct OperationStatus {
    pub(super) status: String,
    #[serde(default)]
    pub(super) error: Option<ArmErrorDetail>,
}

/// `{"error": {...}}` envelope used by ARM failures.
#[derive(Clone, Debug, Deserialize)]
pub(super) struct ArmErrorBody {
    pub(super) error: ArmErrorDetail,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(super) struct ArmErrorDetail {
    #[serde(default)]
    pub(super) code: String,
    #[serde(default)]
    pub(super) message: String,
}

/// Token endpoint response.
#[derive(Clone, Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub(super) access_token: String,
    #[serde(default)]
    pub(super) expires_in: Option<Seconds>,
}

/// The v1 token endpoint reports lifetimes as strings, v2 as numbers.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum Seconds {
    Number(u64),
    Text(String),
}

impl Seconds {
    pub(super) fn as_secs(&self) -> Option<u64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ServiceLevel;

    #[test]
    fn pool_body_uses_arm_field_names() {
        let request = PoolRequest {
            resource_group: String::from("rg"),
            account: String::from("acct"),
            name: String::from("Pool01"),
            location: String::from("eastus"),
            service_level: ServiceLevel::Standard,
            size_bytes: 4_398_046_511_104,
            tags: Tags::new(),
        };

        let json = serde_json::to_value(PoolBody::from(&request))
            .unwrap_or_else(|err| panic!("serialise pool body: {err}"));

        assert_eq!(
            json,
            serde_json::json!({
                "location": "eastus",
                "properties": {"serviceLevel": "Standard", "size": 4_398_046_511_104_u64}
            })
        );
    }

    #[test]
    fn volume_body_carries_export_policy() {
        let request = VolumeRequest::builder()
            .resource_group("rg")
            .account("acct")
            .pool("Pool01")
            .name("vol1")
            .location("eastus")
            .usage_threshold_bytes(107_374_182_400)
            .subnet_id("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/v/subnets/anf-sn")
            .build()
            .unwrap_or_else(|err| panic!("volume request: {err}"));

        let json = serde_json::to_value(VolumeBody::from(&request))
            .unwrap_or_else(|err| panic!("serialise volume body: {err}"));

        assert_eq!(json["properties"]["creationToken"], "vol1");
        assert_eq!(json["properties"]["usageThreshold"], 107_374_182_400_u64);
        assert_eq!(json["properties"]["protocolTypes"][0], "NFSv4.1");
        assert_eq!(
            json["properties"]["exportPolicy"]["rules"][0]["allowedClients"],
            "0.0.0.0/0"
        );
        assert_eq!(json["properties"]["exportPolicy"]["rules"][0]["nfsv41"], true);
    }

    #[test]
    fn account_body_includes_tags_when_present() {
        let mut tags = Tags::new();
        tags.insert(String::from("dept"), String::from("IT"));
        let request = AccountRequest {
            resource_group: String::from("rg"),
            name: String::from("acct"),
            location: String::from("eastus"),
            tags,
        };

        let json = serde_json::to_value(AccountBody::from(&request))
            .unwrap_or_else(|err| panic!("serialise account body: {err}"));

        assert_eq!(json["tags"]["dept"], "IT");
        assert_eq!(json["properties"], serde_json::json!({}));
    }

    #[test]
    fn envelope_extracts_provisioning_state() {
        let envelope: ResourceEnvelope = serde_json::from_str(
            r#"{"id":"/x","name":"acct/Pool01","location":"eastus","properties":{"provisioningState":"Creating"}}"#,
        )
        .unwrap_or_else(|err| panic!("parse envelope: {err}"));

        assert_eq!(envelope.provisioning_state(), Some("Creating"));
        let resource = NetAppResource::from(envelope);
        assert_eq!(resource.name, "acct/Pool01");
    }

    #[test]
    fn token_lifetime_accepts_numbers_and_strings() {
        let numeric: TokenResponse =
            serde_json::from_str(r#"{"access_token":"t","expires_in":3599}"#)
                .unwrap_or_else(|err| panic!("numeric token: {err}"));
        let textual: TokenResponse =
            serde_json::from_str(r#"{"access_token":"t","expires_in":"3599"}"#)
                .unwrap_or_else(|err| panic!("textual token: {err}"));

        assert_eq!(numeric.expires_in.and_then(|s| s.as_secs()), Some(3599));
        assert_eq!(textual.expires_in.and_then(|s| s.as_secs()), Some(3599));
    }
}
