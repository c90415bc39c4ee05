//! Conversions between SDK shapes and the clusterflow model

use crate::error::{AwsError, Result};
use aws_sdk_ec2::types::{self as ec2, InstanceStateName};
use clusterflow_cloud::{IngressRule, Instance, InstanceBatch, InstanceState, SecurityGroup};
use std::collections::BTreeSet;

/// Region of an availability zone ("us-east-1b" -> "us-east-1").
/// Local and Wavelength zones ("us-west-2-lax-1a") map to their parent region.
pub fn region_for_zone(zone: &str) -> Result<String> {
    let invalid = || AwsError::InvalidZone(zone.to_string());

    if !zone.ends_with(|c: char| c.is_ascii_lowercase()) {
        return Err(invalid());
    }
    let name = &zone[..zone.len() - 1];

    // the region ends at its first all-digit segment
    let mut end = 0;
    for (index, part) in name.split('-').enumerate() {
        end += part.len();
        if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
            return if index > 0 {
                Ok(name[..end].to_string())
            } else {
                Err(invalid())
            };
        }
        end += 1;
    }
    Err(invalid())
}

pub(crate) fn instance_state(name: &InstanceStateName) -> InstanceState {
    match name {
        InstanceStateName::Pending => InstanceState::Pending,
        InstanceStateName::Running => InstanceState::Running,
        InstanceStateName::Stopping => InstanceState::Stopping,
        InstanceStateName::Stopped => InstanceState::Stopped,
        InstanceStateName::ShuttingDown => InstanceState::ShuttingDown,
        InstanceStateName::Terminated => InstanceState::Terminated,
        other => {
            tracing::warn!("Unrecognised EC2 instance state {:?}, treating as pending", other);
            InstanceState::Pending
        }
    }
}

pub(crate) fn instance(raw: &ec2::Instance) -> Instance {
    let state = raw
        .state()
        .and_then(|s| s.name())
        .map(instance_state)
        .unwrap_or(InstanceState::Pending);

    Instance {
        id: raw.instance_id().unwrap_or_default().to_string(),
        state,
        public_address: raw
            .public_dns_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string),
    }
}

pub(crate) fn batch(reservation: &ec2::Reservation) -> InstanceBatch {
    let mut group_names: BTreeSet<String> = reservation
        .groups()
        .iter()
        .filter_map(|g| g.group_name())
        .map(str::to_string)
        .collect();

    // VPC launches report groups per instance, not per reservation
    if group_names.is_empty() {
        group_names = reservation
            .instances()
            .iter()
            .flat_map(|i| i.security_groups())
            .filter_map(|g| g.group_name())
            .map(str::to_string)
            .collect();
    }

    InstanceBatch {
        id: reservation.reservation_id().unwrap_or_default().to_string(),
        instances: reservation.instances().iter().map(instance).collect(),
        group_names,
    }
}

pub(crate) fn security_group(raw: &ec2::SecurityGroup) -> SecurityGroup {
    let mut rules = Vec::new();

    for permission in raw.ip_permissions() {
        for pair in permission.user_id_group_pairs() {
            rules.push(IngressRule::FromGroup {
                group_id: pair.group_id().unwrap_or_default().to_string(),
                group_name: pair.group_name().unwrap_or_default().to_string(),
            });
        }

        let from_port = port(permission.from_port());
        let to_port = port(permission.to_port());
        for range in permission.ip_ranges() {
            rules.push(IngressRule::Tcp {
                from_port,
                to_port,
                cidr: range.cidr_ip().unwrap_or_default().to_string(),
            });
        }
    }

    SecurityGroup {
        id: raw.group_id().unwrap_or_default().to_string(),
        name: raw.group_name().unwrap_or_default().to_string(),
        rules,
    }
}

/// EC2 reports "all ports" as -1 or omits the field
fn port(raw: Option<i32>) -> u16 {
    raw.and_then(|p| u16::try_from(p).ok()).unwrap_or(0)
}

pub(crate) fn permission(rule: &IngressRule) -> ec2::IpPermission {
    match rule {
        IngressRule::FromGroup { group_id, .. } => ec2::IpPermission::builder()
            .ip_protocol("-1")
            .user_id_group_pairs(ec2::UserIdGroupPair::builder().group_id(group_id).build())
            .build(),
        IngressRule::Tcp {
            from_port,
            to_port,
            cidr,
        } => ec2::IpPermission::builder()
            .ip_protocol("tcp")
            .from_port(i32::from(*from_port))
            .to_port(i32::from(*to_port))
            .ip_ranges(ec2::IpRange::builder().cidr_ip(cidr).build())
            .build(),
    }
}
