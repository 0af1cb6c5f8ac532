//! Supported resource types
//!
//! Each entry mirrors the behaviour of the matching EC2 resource: which
//! properties it needs, which ones cannot change in place and whether a
//! replacement may exist next to the old instance.

use crate::error::{Result, SimError};
use plinth_engine::{ResolvedProperties, ResourceSchema};
use serde_json::Value;

/// Description of one simulated resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSpec {
    pub resource_type: &'static str,

    /// Id prefix (e.g. "vpc" for "vpc-0a1b...")
    pub prefix: &'static str,

    /// ARN resource kind
    pub arn_kind: &'static str,

    pub required: &'static [&'static str],

    /// Properties whose change forces a replacement
    pub replace_on: &'static [&'static str],

    pub create_before_delete: bool,
}

impl TypeSpec {
    pub fn schema(&self) -> ResourceSchema {
        ResourceSchema::new()
            .with_replace_on(self.replace_on.iter().copied())
            .with_create_before_delete(self.create_before_delete)
    }

    /// Check required properties and CIDR notation
    pub fn validate(&self, properties: &ResolvedProperties) -> Result<()> {
        for property in self.required {
            match properties.get(*property) {
                None | Some(Value::Null) => {
                    return Err(SimError::MissingProperty {
                        property: property.to_string(),
                    });
                }
                Some(_) => {}
            }
        }

        for (key, value) in properties {
            if key == "cidr_block" || key.ends_with("_cidr_block") {
                let text = value.as_str().unwrap_or_default();
                if !is_cidr(text) {
                    return Err(SimError::InvalidProperty {
                        property: key.clone(),
                        message: format!("'{text}' is not an IPv4 CIDR block"),
                    });
                }
            }
        }
        Ok(())
    }
}

pub const CATALOG: &[TypeSpec] = &[
    TypeSpec {
        resource_type: "aws:ec2:Vpc",
        prefix: "vpc",
        arn_kind: "vpc",
        required: &["cidr_block"],
        replace_on: &["cidr_block"],
        create_before_delete: false,
    },
    TypeSpec {
        resource_type: "aws:ec2:Subnet",
        prefix: "subnet",
        arn_kind: "subnet",
        required: &["vpc_id", "cidr_block"],
        replace_on: &["vpc_id", "cidr_block", "availability_zone"],
        create_before_delete: true,
    },
    TypeSpec {
        resource_type: "aws:ec2:InternetGateway",
        prefix: "igw",
        arn_kind: "internet-gateway",
        required: &["vpc_id"],
        replace_on: &["vpc_id"],
        create_before_delete: true,
    },
    TypeSpec {
        resource_type: "aws:ec2:RouteTable",
        prefix: "rtb",
        arn_kind: "route-table",
        required: &["vpc_id"],
        replace_on: &["vpc_id"],
        create_before_delete: true,
    },
    TypeSpec {
        resource_type: "aws:ec2:Route",
        prefix: "r",
        arn_kind: "route",
        required: &["route_table_id", "destination_cidr_block"],
        replace_on: &["route_table_id", "destination_cidr_block"],
        create_before_delete: false,
    },
    TypeSpec {
        resource_type: "aws:ec2:RouteTableAssociation",
        prefix: "rtbassoc",
        arn_kind: "route-table-association",
        required: &["subnet_id", "route_table_id"],
        replace_on: &["subnet_id", "route_table_id"],
        create_before_delete: false,
    },
    TypeSpec {
        resource_type: "aws:ec2:SecurityGroup",
        prefix: "sg",
        arn_kind: "security-group",
        required: &["vpc_id"],
        replace_on: &["vpc_id", "name", "description"],
        create_before_delete: true,
    },
    TypeSpec {
        resource_type: "aws:ec2:Instance",
        prefix: "i",
        arn_kind: "instance",
        required: &["ami", "instance_type", "subnet_id"],
        replace_on: &["ami", "subnet_id", "availability_zone", "key_name", "user_data"],
        create_before_delete: true,
    },
];

pub fn lookup(resource_type: &str) -> Option<&'static TypeSpec> {
    CATALOG.iter().find(|spec| spec.resource_type == resource_type)
}

fn is_cidr(text: &str) -> bool {
    let Some((address, prefix)) = text.split_once('/') else {
        return false;
    };
    let octets: Vec<&str> = address.split('.').collect();
    octets.len() == 4
        && octets.iter().all(|o| o.parse::<u8>().is_ok())
        && prefix.parse::<u8>().is_ok_and(|p| p <= 32)
}
