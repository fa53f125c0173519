//! Network rule modes, value types and their compatibility table

use thiserror::Error;

/// Direction and scope of a network rule
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::VariantArray,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkMode {
    #[default]
    #[strum(serialize = "INGRESS")]
    Ingress,
    #[strum(serialize = "INTERNAL_STAGE")]
    InternalStage,
    #[strum(serialize = "EGRESS")]
    Egress,
    #[strum(serialize = "POSTGRES_INGRESS")]
    PostgresIngress,
    #[strum(serialize = "POSTGRES_EGRESS")]
    PostgresEgress,
}

/// Kind of value stored in a network rule's VALUE_LIST
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::VariantArray,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkType {
    #[default]
    #[strum(serialize = "IPV4")]
    Ipv4,
    #[strum(serialize = "HOST_PORT")]
    HostPort,
    #[strum(serialize = "PRIVATE_HOST_PORT")]
    PrivateHostPort,
    #[strum(serialize = "AWSVPCEID")]
    AwsVpceId,
}

/// A mode was paired with a value type it does not accept
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid type '{value_type}' for mode '{mode}'. Allowed types: {}", allowed_list(.mode))]
pub struct InvalidModeType {
    pub mode: NetworkMode,
    pub value_type: NetworkType,
}

fn allowed_list(mode: &NetworkMode) -> String {
    mode.allowed_types()
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}

impl NetworkMode {
    /// Value types accepted by this mode
    pub fn allowed_types(self) -> &'static [NetworkType] {
        match self {
            NetworkMode::Ingress | NetworkMode::InternalStage | NetworkMode::PostgresIngress => {
                &[NetworkType::Ipv4, NetworkType::AwsVpceId]
            }
            NetworkMode::Egress | NetworkMode::PostgresEgress => {
                &[NetworkType::Ipv4, NetworkType::HostPort]
            }
        }
    }

    /// Check whether this mode accepts `value_type`
    pub fn accepts(self, value_type: NetworkType) -> bool {
        self.allowed_types().contains(&value_type)
    }
}

/// Validate a mode/type pair before any SQL is generated
pub fn validate_mode_type(mode: NetworkMode, value_type: NetworkType) -> Result<(), InvalidModeType> {
    if mode.accepts(value_type) {
        Ok(())
    } else {
        Err(InvalidModeType { mode, value_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::VariantArray;

    #[test]
    fn test_compatibility_table() {
        let expected = [
            (NetworkMode::Ingress, vec![NetworkType::Ipv4, NetworkType::AwsVpceId]),
            (NetworkMode::InternalStage, vec![NetworkType::Ipv4, NetworkType::AwsVpceId]),
            (NetworkMode::PostgresIngress, vec![NetworkType::Ipv4, NetworkType::AwsVpceId]),
            (NetworkMode::Egress, vec![NetworkType::Ipv4, NetworkType::HostPort]),
            (NetworkMode::PostgresEgress, vec![NetworkType::Ipv4, NetworkType::HostPort]),
        ];

        for (mode, allowed) in expected {
            for value_type in NetworkType::VARIANTS {
                let result = validate_mode_type(mode, *value_type);
                assert_eq!(
                    result.is_ok(),
                    allowed.contains(value_type),
                    "{mode} with {value_type} should be {}",
                    if allowed.contains(value_type) { "accepted" } else { "rejected" }
                );
            }
        }
    }

    #[test]
    fn test_private_host_port_rejected_everywhere() {
        for mode in NetworkMode::VARIANTS {
            assert!(!mode.accepts(NetworkType::PrivateHostPort));
        }
    }

    #[test]
    fn test_error_names_allowed_types() {
        let err = validate_mode_type(NetworkMode::Egress, NetworkType::AwsVpceId).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid type 'AWSVPCEID' for mode 'EGRESS'. Allowed types: IPV4, HOST_PORT"
        );
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("ingress".parse::<NetworkMode>().unwrap(), NetworkMode::Ingress);
        assert_eq!(
            "postgres_egress".parse::<NetworkMode>().unwrap(),
            NetworkMode::PostgresEgress
        );
        assert_eq!("awsvpceid".parse::<NetworkType>().unwrap(), NetworkType::AwsVpceId);
        assert!("SIDEWAYS".parse::<NetworkMode>().is_err());
    }
}
