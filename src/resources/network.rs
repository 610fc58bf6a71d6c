//! Network stack: VPC, subnets, shared security group and endpoints.
//!
//! Two availability zones, each with one public and one private subnet. The
//! VPC block is split into four equal subnets with `Fn::Cidr`: public subnets
//! take indices 0 and 1, private subnets 2 and 3.

use super::add_cross_stack_output;
use crate::core::error::Result;
use crate::core::naming::{validate_vpc_cidr, Naming};
use crate::core::resolver::{DeploymentConfig, ResolvedEnvironment};
use crate::core::template::{cidr, get_att, get_azs, join, ref_, select, sub, CfnResource, Stack};
use crate::core::types::{Environment, OutputKey};
use serde_json::{json, Value};

pub const AZ_COUNT: usize = 2;
const SUBNET_COUNT: u32 = 4;

/// Gateway endpoints attached to the private route tables.
const GATEWAY_ENDPOINTS: &[(&str, &str)] = &[("S3", "s3"), ("Dynamo", "dynamodb")];

/// Interface endpoints placed in the private subnets.
const INTERFACE_ENDPOINTS: &[(&str, &str)] = &[
    ("Glue", "glue"),
    ("Kms", "kms"),
    ("Ssm", "ssm"),
    ("SecretsManager", "secretsmanager"),
    ("StepFunctions", "states"),
];

/// Host bits of each of the four subnets carved from a /`prefix_len` block.
pub fn subnet_host_bits(prefix_len: u8) -> u8 {
    32 - (prefix_len + 2)
}

struct Ids<'a> {
    naming: &'a Naming,
    environment: Environment,
}

impl Ids<'_> {
    fn id(&self, suffix: &str) -> String {
        self.naming.logical_id(self.environment, suffix)
    }
}

pub fn network_stack(target: &ResolvedEnvironment, config: &DeploymentConfig) -> Result<Stack> {
    let env = target.environment;
    let naming = &config.naming;
    let ids = Ids {
        naming,
        environment: env,
    };
    let prefix_len = validate_vpc_cidr(env, target.vpc_cidr())?;
    let host_bits = subnet_host_bits(prefix_len);

    let mut stack = Stack::new(
        naming.stack_name(env, "Vpc"),
        env,
        Some(target.account_id()),
        Some(target.region()),
        "Data lake network: VPC, subnets, shared security group and endpoints",
    );

    let vpc = ids.id("Vpc");
    let vpc_name = stack.name.clone();
    stack.add_resource(
        &vpc,
        CfnResource::new(
            "AWS::EC2::VPC",
            json!({
                "CidrBlock": target.vpc_cidr(),
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": [{ "Key": "Name", "Value": vpc_name }],
            }),
        ),
    )?;

    let igw = ids.id("InternetGateway");
    let attachment = ids.id("VpcGatewayAttachment");
    stack.add_resource(&igw, CfnResource::new("AWS::EC2::InternetGateway", json!({})))?;
    stack.add_resource(
        &attachment,
        CfnResource::new(
            "AWS::EC2::VPCGatewayAttachment",
            json!({ "VpcId": ref_(&vpc), "InternetGatewayId": ref_(&igw) }),
        ),
    )?;

    let subnet_blocks = cidr(get_att(&vpc, "CidrBlock"), SUBNET_COUNT, host_bits);
    let mut private_subnets = Vec::with_capacity(AZ_COUNT);
    let mut private_route_tables = Vec::with_capacity(AZ_COUNT);

    for az in 0..AZ_COUNT {
        let n = az + 1;
        let public_subnet = ids.id(&format!("PublicSubnet{n}"));
        let public_rt = ids.id(&format!("PublicRouteTable{n}"));
        let eip = ids.id(&format!("NatEip{n}"));
        let nat = ids.id(&format!("NatGateway{n}"));
        let private_subnet = ids.id(&format!("PrivateSubnet{n}"));
        let private_rt = ids.id(&format!("PrivateRouteTable{n}"));

        stack.add_resource(
            &public_subnet,
            subnet(&vpc, &subnet_blocks, az, az, true),
        )?;
        stack.add_resource(
            &public_rt,
            CfnResource::new("AWS::EC2::RouteTable", json!({ "VpcId": ref_(&vpc) })),
        )?;
        stack.add_resource(
            &ids.id(&format!("PublicSubnetRouteTableAssociation{n}")),
            association(&public_subnet, &public_rt),
        )?;
        stack.add_resource(
            &ids.id(&format!("PublicDefaultRoute{n}")),
            CfnResource::new(
                "AWS::EC2::Route",
                json!({
                    "RouteTableId": ref_(&public_rt),
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "GatewayId": ref_(&igw),
                }),
            )
            .depends_on(&attachment),
        )?;
        stack.add_resource(
            &eip,
            CfnResource::new("AWS::EC2::EIP", json!({ "Domain": "vpc" })).depends_on(&attachment),
        )?;
        stack.add_resource(
            &nat,
            CfnResource::new(
                "AWS::EC2::NatGateway",
                json!({
                    "SubnetId": ref_(&public_subnet),
                    "AllocationId": get_att(&eip, "AllocationId"),
                }),
            ),
        )?;

        stack.add_resource(
            &private_subnet,
            subnet(&vpc, &subnet_blocks, az, AZ_COUNT + az, false),
        )?;
        stack.add_resource(
            &private_rt,
            CfnResource::new("AWS::EC2::RouteTable", json!({ "VpcId": ref_(&vpc) })),
        )?;
        stack.add_resource(
            &ids.id(&format!("PrivateSubnetRouteTableAssociation{n}")),
            association(&private_subnet, &private_rt),
        )?;
        stack.add_resource(
            &ids.id(&format!("PrivateDefaultRoute{n}")),
            CfnResource::new(
                "AWS::EC2::Route",
                json!({
                    "RouteTableId": ref_(&private_rt),
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "NatGatewayId": ref_(&nat),
                }),
            ),
        )?;

        private_subnets.push(private_subnet);
        private_route_tables.push(private_rt);
    }

    let sg_name = ids.id("SharedIngressSecurityGroup");
    stack.add_resource(
        &sg_name,
        CfnResource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": "Shared Security Group for Data Lake resources with self-referencing ingress rule.",
                "GroupName": sg_name.clone(),
                "VpcId": ref_(&vpc),
                "SecurityGroupEgress": [{
                    "CidrIp": "0.0.0.0/0",
                    "IpProtocol": "-1",
                    "Description": "Allow all outbound traffic by default",
                }],
            }),
        ),
    )?;
    // The only ingress rule: traffic from members of the same group.
    stack.add_resource(
        &ids.id("SharedIngressSecurityGroupSelfIngress"),
        CfnResource::new(
            "AWS::EC2::SecurityGroupIngress",
            json!({
                "GroupId": get_att(&sg_name, "GroupId"),
                "SourceSecurityGroupId": get_att(&sg_name, "GroupId"),
                "IpProtocol": "-1",
                "Description": "Self-referencing ingress rule",
            }),
        ),
    )?;

    let route_table_refs: Vec<Value> = private_route_tables.iter().map(|id| ref_(id)).collect();
    let subnet_refs: Vec<Value> = private_subnets.iter().map(|id| ref_(id)).collect();

    for (name, service) in GATEWAY_ENDPOINTS {
        stack.add_resource(
            &ids.id(&format!("{name}Endpoint")),
            CfnResource::new(
                "AWS::EC2::VPCEndpoint",
                json!({
                    "ServiceName": sub(&format!("com.amazonaws.${{AWS::Region}}.{service}")),
                    "VpcEndpointType": "Gateway",
                    "VpcId": ref_(&vpc),
                    "RouteTableIds": route_table_refs,
                }),
            ),
        )?;
    }
    for (name, service) in INTERFACE_ENDPOINTS {
        stack.add_resource(
            &ids.id(&format!("{name}Endpoint")),
            CfnResource::new(
                "AWS::EC2::VPCEndpoint",
                json!({
                    "ServiceName": sub(&format!("com.amazonaws.${{AWS::Region}}.{service}")),
                    "VpcEndpointType": "Interface",
                    "VpcId": ref_(&vpc),
                    "PrivateDnsEnabled": true,
                    "SubnetIds": subnet_refs,
                    "SecurityGroupIds": [get_att(&sg_name, "GroupId")],
                }),
            ),
        )?;
    }

    add_cross_stack_output(&mut stack, naming, env, OutputKey::VpcId, ref_(&vpc))?;
    add_cross_stack_output(
        &mut stack,
        naming,
        env,
        OutputKey::AvailabilityZones,
        join(
            ",",
            private_subnets
                .iter()
                .map(|id| get_att(id, "AvailabilityZone"))
                .collect(),
        ),
    )?;
    add_cross_stack_output(
        &mut stack,
        naming,
        env,
        OutputKey::SubnetIds,
        join(",", subnet_refs),
    )?;
    add_cross_stack_output(
        &mut stack,
        naming,
        env,
        OutputKey::RouteTables,
        join(",", route_table_refs),
    )?;
    add_cross_stack_output(
        &mut stack,
        naming,
        env,
        OutputKey::SharedSecurityGroupId,
        get_att(&sg_name, "GroupId"),
    )?;

    Ok(stack)
}

fn subnet(vpc: &str, blocks: &Value, az: usize, index: usize, public: bool) -> CfnResource {
    CfnResource::new(
        "AWS::EC2::Subnet",
        json!({
            "VpcId": ref_(vpc),
            "AvailabilityZone": select(az, get_azs()),
            "CidrBlock": select(index, blocks.clone()),
            "MapPublicIpOnLaunch": public,
        }),
    )
}

fn association(subnet: &str, route_table: &str) -> CfnResource {
    CfnResource::new(
        "AWS::EC2::SubnetRouteTableAssociation",
        json!({ "SubnetId": ref_(subnet), "RouteTableId": ref_(route_table) }),
    )
}
