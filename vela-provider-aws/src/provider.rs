//! AWS Cloud Control Provider implementation
//!
//! Communicates with the AWS Cloud Control API to manage resources: one
//! generic create/read/update/delete surface plus request-status polling.
//! Kind-specific payload shapes live in the build/map functions below,
//! which are pure and unit-tested.

use std::collections::HashMap;
use std::time::Duration;

use aws_config::Region;
use aws_sdk_cloudcontrol::Client as CloudControlClient;
use aws_sdk_cloudcontrol::types::OperationStatus;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde_json::json;

use vela_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult};
use vela_core::resource::{RemoteState, Resource, ResourceId, Value};

use crate::convert::{contains_ref, json_to_value, value_to_json};
use crate::resources::{ResourceConfig, get_resource_config};

/// AWS Cloud Control Provider
pub struct AwsProvider {
    client: CloudControlClient,
    region: String,
}

impl AwsProvider {
    /// Create a new AwsProvider for the specified region
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: CloudControlClient::new(&config),
            region: region.to_string(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    // =========================================================================
    // Cloud Control API Methods
    // =========================================================================

    /// Get a resource by identifier using Cloud Control API
    async fn cc_get_resource(
        &self,
        type_name: &str,
        identifier: &str,
    ) -> ProviderResult<Option<serde_json::Value>> {
        log::debug!("cloudcontrol get {} {}", type_name, identifier);
        let result = self
            .client
            .get_resource()
            .type_name(type_name)
            .identifier(identifier)
            .send()
            .await;

        match result {
            Ok(response) => {
                if let Some(desc) = response.resource_description()
                    && let Some(props_str) = desc.properties()
                {
                    let props: serde_json::Value =
                        serde_json::from_str(props_str).unwrap_or_default();
                    Ok(Some(props))
                } else {
                    Ok(None)
                }
            }
            Err(e) => {
                let err_str = format!("{:?}", e);
                if err_str.contains("ResourceNotFound") || err_str.contains("NotFound") {
                    Ok(None)
                } else {
                    Err(ProviderError::new(format!("Failed to get resource: {:?}", e)))
                }
            }
        }
    }

    /// List all resources of a type using Cloud Control API
    async fn cc_list_resources(
        &self,
        type_name: &str,
    ) -> ProviderResult<Vec<(String, serde_json::Value)>> {
        log::debug!("cloudcontrol list {}", type_name);
        let mut resources = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = self.client.list_resources().type_name(type_name);
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| ProviderError::new(format!("Failed to list resources: {:?}", e)))?;

            for desc in response.resource_descriptions() {
                if let (Some(identifier), Some(props_str)) = (desc.identifier(), desc.properties())
                {
                    let props: serde_json::Value =
                        serde_json::from_str(props_str).unwrap_or_default();
                    resources.push((identifier.to_string(), props));
                }
            }

            next_token = response.next_token().map(String::from);
            if next_token.is_none() {
                break;
            }
        }

        Ok(resources)
    }

    /// Create a resource using Cloud Control API
    async fn cc_create_resource(
        &self,
        type_name: &str,
        desired_state: serde_json::Value,
    ) -> ProviderResult<String> {
        log::debug!("cloudcontrol create {}", type_name);
        let result = self
            .client
            .create_resource()
            .type_name(type_name)
            .desired_state(desired_state.to_string())
            .send()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to create resource: {:?}", e)))?;

        let request_token = result
            .progress_event()
            .and_then(|p| p.request_token())
            .ok_or_else(|| ProviderError::new("No request token returned"))?;

        self.wait_for_operation(request_token).await
    }

    /// Update a resource using Cloud Control API
    async fn cc_update_resource(
        &self,
        type_name: &str,
        identifier: &str,
        patch_ops: Vec<serde_json::Value>,
    ) -> ProviderResult<()> {
        if patch_ops.is_empty() {
            return Ok(());
        }

        log::debug!("cloudcontrol update {} {}", type_name, identifier);
        let patch_document = serde_json::to_string(&patch_ops)
            .map_err(|e| ProviderError::new(format!("Failed to build patch: {}", e)))?;

        let result = self
            .client
            .update_resource()
            .type_name(type_name)
            .identifier(identifier)
            .patch_document(patch_document)
            .send()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to update resource: {:?}", e)))?;

        if let Some(request_token) = result.progress_event().and_then(|p| p.request_token()) {
            self.wait_for_operation(request_token).await?;
        }

        Ok(())
    }

    /// Delete a resource using Cloud Control API
    async fn cc_delete_resource(&self, type_name: &str, identifier: &str) -> ProviderResult<()> {
        log::debug!("cloudcontrol delete {} {}", type_name, identifier);
        let result = self
            .client
            .delete_resource()
            .type_name(type_name)
            .identifier(identifier)
            .send()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to delete resource: {:?}", e)))?;

        if let Some(request_token) = result.progress_event().and_then(|p| p.request_token()) {
            self.wait_for_operation(request_token).await?;
        }

        Ok(())
    }

    /// Wait for a Cloud Control operation to complete
    async fn wait_for_operation(&self, request_token: &str) -> ProviderResult<String> {
        let max_attempts = 120;
        let delay = Duration::from_secs(5);

        for _ in 0..max_attempts {
            let status = self
                .client
                .get_resource_request_status()
                .request_token(request_token)
                .send()
                .await
                .map_err(|e| {
                    ProviderError::new(format!("Failed to get operation status: {:?}", e))
                })?;

            if let Some(progress) = status.progress_event() {
                match progress.operation_status() {
                    Some(OperationStatus::Success) => {
                        return Ok(progress.identifier().unwrap_or("").to_string());
                    }
                    Some(OperationStatus::Failed) => {
                        let msg = progress.status_message().unwrap_or("Unknown error");
                        return Err(ProviderError::new(format!("Operation failed: {}", msg)));
                    }
                    Some(OperationStatus::CancelComplete) => {
                        return Err(ProviderError::new("Operation was cancelled"));
                    }
                    _ => {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(ProviderError::new("Operation timed out"))
    }

    // =========================================================================
    // Data Source Lookups
    // =========================================================================

    /// Look up the account's default network
    async fn read_default_vpc(&self, resource: &Resource) -> ProviderResult<RemoteState> {
        let vpcs = self.cc_list_resources("AWS::EC2::VPC").await?;

        for (identifier, props) in vpcs {
            if props.get("IsDefault").and_then(|v| v.as_bool()) == Some(true) {
                let mut attributes = HashMap::new();
                attributes.insert("id".to_string(), Value::String(identifier.clone()));
                attributes.insert("default".to_string(), Value::Bool(true));
                return Ok(RemoteState::existing(resource.id.clone(), attributes)
                    .with_identifier(identifier));
            }
        }

        Err(ProviderError::new("No default network found in this region")
            .for_resource(resource.id.clone()))
    }

    /// Look up the subnets of a network
    ///
    /// The vpc_id attribute must already be resolved to a literal id.
    async fn read_subnets(&self, resource: &Resource) -> ProviderResult<RemoteState> {
        let vpc_id = match resource.attribute("vpc_id") {
            Some(Value::String(id)) => id.clone(),
            _ => {
                return Err(
                    ProviderError::new("subnets lookup requires a resolved vpc_id")
                        .for_resource(resource.id.clone()),
                );
            }
        };

        let subnets = self.cc_list_resources("AWS::EC2::Subnet").await?;
        let mut subnet_ids: Vec<String> = subnets
            .into_iter()
            .filter(|(_, props)| {
                props.get("VpcId").and_then(|v| v.as_str()) == Some(vpc_id.as_str())
            })
            .map(|(identifier, _)| identifier)
            .collect();
        subnet_ids.sort();
        let ids: Vec<Value> = subnet_ids.into_iter().map(Value::String).collect();

        if ids.is_empty() {
            return Err(
                ProviderError::new(format!("Network {} has no subnets", vpc_id))
                    .for_resource(resource.id.clone()),
            );
        }

        let mut attributes = HashMap::new();
        attributes.insert("vpc_id".to_string(), Value::String(vpc_id.clone()));
        attributes.insert("ids".to_string(), Value::List(ids));
        Ok(RemoteState::existing(resource.id.clone(), attributes).with_identifier(vpc_id))
    }

    // =========================================================================
    // Secret Version Handling
    // =========================================================================

    /// "Creating" a secret version patches SecretString on the referenced
    /// secret; the store owns version history.
    async fn put_secret_version(&self, resource: &Resource) -> ProviderResult<RemoteState> {
        let secret_arn = match resource.attribute("secret_id") {
            Some(Value::String(arn)) => arn.clone(),
            _ => {
                return Err(
                    ProviderError::new("secret_version requires a resolved secret_id")
                        .for_resource(resource.id.clone()),
                );
            }
        };

        let secret_string = secret_string_payload(resource)
            .map_err(|e| e.for_resource(resource.id.clone()))?;

        let patch_ops = vec![json!({
            "op": "replace",
            "path": "/SecretString",
            "value": secret_string
        })];

        self.cc_update_resource("AWS::SecretsManager::Secret", &secret_arn, patch_ops)
            .await
            .map_err(|e| e.for_resource(resource.id.clone()))?;

        let mut attributes = resource.attributes.clone();
        attributes.insert("secret_id".to_string(), Value::String(secret_arn.clone()));
        Ok(RemoteState::existing(resource.id.clone(), attributes).with_identifier(secret_arn))
    }
}

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn read(
        &self,
        resource: &Resource,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<RemoteState>> {
        let resource = resource.clone();
        let identifier = identifier.map(String::from);

        Box::pin(async move {
            match resource.id.kind.as_str() {
                "vpc" => return self.read_default_vpc(&resource).await,
                "subnets" => return self.read_subnets(&resource).await,
                _ => {}
            }

            let config = config_for(&resource.id)?;

            let Some(identifier) = identifier else {
                return Ok(RemoteState::not_found(resource.id.clone()));
            };

            let props = match self
                .cc_get_resource(config.aws_type_name, &identifier)
                .await
                .map_err(|e| e.for_resource(resource.id.clone()))?
            {
                Some(props) => props,
                None => return Ok(RemoteState::not_found(resource.id.clone())),
            };

            let attributes = map_observed_attributes(&resource, config, &props, &identifier);
            Ok(RemoteState::existing(resource.id.clone(), attributes)
                .with_identifier(identifier))
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<RemoteState>> {
        let resource = resource.clone();

        Box::pin(async move {
            if resource.id.kind == "secret_version" {
                return self.put_secret_version(&resource).await;
            }

            let config = config_for(&resource.id)?;
            let desired_state =
                build_desired_state(&resource).map_err(|e| e.for_resource(resource.id.clone()))?;

            let identifier = self
                .cc_create_resource(config.aws_type_name, desired_state)
                .await
                .map_err(|e| e.for_resource(resource.id.clone()))?;

            self.read(&resource, Some(&identifier)).await
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &RemoteState,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<RemoteState>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();

        Box::pin(async move {
            if to.id.kind == "secret_version" {
                return self.put_secret_version(&to).await;
            }

            let config = config_for(&id)?;
            if !config.supports_update {
                return Err(ProviderError::new(format!(
                    "Update not supported for {}, delete and recreate",
                    id.kind
                ))
                .for_resource(id));
            }

            let patch_ops =
                build_patch_ops(config, &from, &to).map_err(|e| e.for_resource(id.clone()))?;

            self.cc_update_resource(config.aws_type_name, &identifier, patch_ops)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;

            self.read(&to, Some(&identifier)).await
        })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();

        Box::pin(async move {
            // Version history belongs to the secret store; deleting the
            // secret itself removes it.
            if id.kind == "secret_version" {
                log::debug!("skipping delete of secret_version {}", id.name);
                return Ok(());
            }

            let config = config_for(&id)?;
            self.cc_delete_resource(config.aws_type_name, &identifier)
                .await
                .map_err(|e| e.for_resource(id))
        })
    }
}

fn config_for(id: &ResourceId) -> ProviderResult<&'static ResourceConfig> {
    get_resource_config(&id.kind).ok_or_else(|| {
        ProviderError::new(format!("Unknown resource kind: {}", id.kind))
            .for_resource(id.clone())
    })
}

// =============================================================================
// Desired State Builders (pure)
// =============================================================================

/// Build the Cloud Control desired-state document for a resource
pub fn build_desired_state(resource: &Resource) -> ProviderResult<serde_json::Value> {
    let config = config_for(&resource.id)?;

    for (name, value) in &resource.attributes {
        if contains_ref(value) {
            return Err(ProviderError::new(format!(
                "Attribute '{}' still contains an unresolved reference",
                name
            )));
        }
    }

    let mut desired = serde_json::Map::new();

    for (vela_name, aws_name) in config.attributes {
        if let Some(value) = resource.attribute(vela_name)
            && let Some(j) = value_to_json(value)
        {
            desired.insert((*aws_name).to_string(), j);
        }
    }

    build_special_attributes(resource, &mut desired)?;

    Ok(serde_json::Value::Object(desired))
}

fn build_special_attributes(
    resource: &Resource,
    desired: &mut serde_json::Map<String, serde_json::Value>,
) -> ProviderResult<()> {
    let name = resource.id.name.clone();

    match resource.id.kind.as_str() {
        "security_group" => {
            desired.insert("GroupName".to_string(), json!(name));
            if let Some(rules) = resource.attribute("ingress") {
                desired.insert(
                    "SecurityGroupIngress".to_string(),
                    firewall_rules_to_aws(rules)?,
                );
            }
            if let Some(rules) = resource.attribute("egress") {
                desired.insert(
                    "SecurityGroupEgress".to_string(),
                    firewall_rules_to_aws(rules)?,
                );
            }
        }
        "rds_instance" => {
            desired.insert("DBInstanceIdentifier".to_string(), json!(name));
            // CloudFormation models these two as strings
            if let Some(Value::Int(storage)) = resource.attribute("allocated_storage") {
                desired.insert("AllocatedStorage".to_string(), json!(storage.to_string()));
            }
            if let Some(Value::Int(port)) = resource.attribute("port") {
                desired.insert("Port".to_string(), json!(port.to_string()));
            }
        }
        "secret" => {
            desired.insert("Name".to_string(), json!(name));
        }
        "iam_role" => {
            let service = resource
                .attribute("assume_role_service")
                .and_then(Value::as_str)
                .ok_or_else(|| ProviderError::new("iam_role requires assume_role_service"))?;
            desired.insert("RoleName".to_string(), json!(name));
            desired.insert(
                "AssumeRolePolicyDocument".to_string(),
                assume_role_policy(service),
            );
        }
        "iam_role_policy" => {
            let role = resource
                .attribute("role")
                .and_then(Value::as_str)
                .ok_or_else(|| ProviderError::new("iam_role_policy requires role"))?;
            desired.insert("PolicyName".to_string(), json!(name));
            desired.insert("RoleName".to_string(), json!(role));
            desired.insert("PolicyDocument".to_string(), policy_document(resource)?);
        }
        "iam_instance_profile" => {
            let role = resource
                .attribute("role")
                .and_then(Value::as_str)
                .ok_or_else(|| ProviderError::new("iam_instance_profile requires role"))?;
            desired.insert("InstanceProfileName".to_string(), json!(name));
            desired.insert("Roles".to_string(), json!([role]));
        }
        "load_balancer" => {
            desired.insert("Name".to_string(), json!(name));
            desired.insert("Type".to_string(), json!("application"));
            desired.insert("Scheme".to_string(), json!("internet-facing"));
        }
        "target_group" => {
            let matcher = resource
                .attribute("matcher")
                .and_then(Value::as_str)
                .unwrap_or("200");
            desired.insert("Name".to_string(), json!(name));
            desired.insert("TargetType".to_string(), json!("instance"));
            desired.insert("Matcher".to_string(), json!({ "HttpCode": matcher }));
            desired.insert("HealthCheckEnabled".to_string(), json!(true));
        }
        "listener" => {
            let tg_arn = resource
                .attribute("default_target_group_arn")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ProviderError::new("listener requires default_target_group_arn")
                })?;
            desired.insert(
                "DefaultActions".to_string(),
                json!([{ "Type": "forward", "TargetGroupArn": tg_arn }]),
            );
        }
        "launch_template" => {
            desired.insert("LaunchTemplateName".to_string(), json!(name));
            desired.insert(
                "LaunchTemplateData".to_string(),
                launch_template_data(resource)?,
            );
        }
        "autoscaling_group" => {
            let lt_id = resource
                .attribute("launch_template_id")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ProviderError::new("autoscaling_group requires launch_template_id")
                })?;
            desired.insert("AutoScalingGroupName".to_string(), json!(name));
            desired.insert(
                "LaunchTemplate".to_string(),
                json!({ "LaunchTemplateId": lt_id, "Version": "$Latest" }),
            );
            if let Some(subnet_ids) = resource.attribute("subnet_ids")
                && let Some(j) = value_to_json(subnet_ids)
            {
                desired.insert("VPCZoneIdentifier".to_string(), j);
            }
        }
        _ => {}
    }

    Ok(())
}

/// The trust policy restricting who may assume the compute role
fn assume_role_policy(service: &str) -> serde_json::Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": service },
            "Action": "sts:AssumeRole"
        }]
    })
}

/// Render the statements attribute into an IAM policy document
fn policy_document(resource: &Resource) -> ProviderResult<serde_json::Value> {
    let Some(Value::List(statements)) = resource.attribute("statements") else {
        return Err(ProviderError::new("iam_role_policy requires statements"));
    };

    let mut rendered = Vec::new();
    for statement in statements {
        let Value::Map(fields) = statement else {
            return Err(ProviderError::new("policy statement must be a map"));
        };
        let actions = fields
            .get("actions")
            .and_then(value_to_json)
            .ok_or_else(|| ProviderError::new("policy statement requires actions"))?;
        let resources = fields
            .get("resources")
            .and_then(value_to_json)
            .ok_or_else(|| ProviderError::new("policy statement requires resources"))?;

        rendered.push(json!({
            "Effect": "Allow",
            "Action": actions,
            "Resource": resources
        }));
    }

    Ok(json!({ "Version": "2012-10-17", "Statement": rendered }))
}

fn launch_template_data(resource: &Resource) -> ProviderResult<serde_json::Value> {
    let mut data = serde_json::Map::new();

    for (vela_name, aws_name) in [
        ("image_id", "ImageId"),
        ("instance_type", "InstanceType"),
    ] {
        if let Some(value) = resource.attribute(vela_name)
            && let Some(j) = value_to_json(value)
        {
            data.insert(aws_name.to_string(), j);
        }
    }

    if let Some(profile_arn) = resource.attribute("instance_profile").and_then(Value::as_str) {
        data.insert(
            "IamInstanceProfile".to_string(),
            json!({ "Arn": profile_arn }),
        );
    }
    if let Some(sg_ids) = resource.attribute("security_group_ids")
        && let Some(j) = value_to_json(sg_ids)
    {
        data.insert("SecurityGroupIds".to_string(), j);
    }
    if let Some(user_data) = resource.attribute("user_data").and_then(Value::as_str) {
        data.insert(
            "UserData".to_string(),
            json!(BASE64_STANDARD.encode(user_data)),
        );
    }

    Ok(serde_json::Value::Object(data))
}

/// Render the secret_string map into the JSON payload stored in the secret
fn secret_string_payload(resource: &Resource) -> ProviderResult<String> {
    let secret_string = resource
        .attribute("secret_string")
        .and_then(value_to_json)
        .ok_or_else(|| ProviderError::new("secret_version requires a resolved secret_string"))?;

    serde_json::to_string(&secret_string)
        .map_err(|e| ProviderError::new(format!("Failed to render secret string: {}", e)))
}

/// Translate firewall rules into Cloud Control rule objects
fn firewall_rules_to_aws(rules: &Value) -> ProviderResult<serde_json::Value> {
    let Value::List(rules) = rules else {
        return Err(ProviderError::new("firewall rules must be a list"));
    };

    let mut rendered = Vec::new();
    for rule in rules {
        let Value::Map(fields) = rule else {
            return Err(ProviderError::new("firewall rule must be a map"));
        };

        let mut obj = serde_json::Map::new();
        if let Some(Value::String(protocol)) = fields.get("protocol") {
            let ip_protocol = if protocol == "all" { "-1" } else { protocol };
            obj.insert("IpProtocol".to_string(), json!(ip_protocol));
        }
        for (vela_name, aws_name) in [("from_port", "FromPort"), ("to_port", "ToPort")] {
            if let Some(Value::Int(port)) = fields.get(vela_name) {
                obj.insert(aws_name.to_string(), json!(port));
            }
        }
        if let Some(Value::String(cidr)) = fields.get("cidr") {
            obj.insert("CidrIp".to_string(), json!(cidr));
        }
        if let Some(Value::String(group)) = fields.get("source_security_group_id") {
            obj.insert("SourceSecurityGroupId".to_string(), json!(group));
        }

        rendered.push(serde_json::Value::Object(obj));
    }

    Ok(serde_json::Value::Array(rendered))
}

/// Translate Cloud Control rule objects back into firewall rules
fn aws_to_firewall_rules(rules: &serde_json::Value) -> Option<Value> {
    let rules = rules.as_array()?;

    let mut out = Vec::new();
    for rule in rules {
        let mut fields = HashMap::new();
        if let Some(protocol) = rule.get("IpProtocol").and_then(|v| v.as_str()) {
            let protocol = if protocol == "-1" { "all" } else { protocol };
            fields.insert("protocol".to_string(), Value::string(protocol));
        }
        for (aws_name, vela_name) in [("FromPort", "from_port"), ("ToPort", "to_port")] {
            if let Some(port) = rule.get(aws_name).and_then(|v| v.as_i64()) {
                fields.insert(vela_name.to_string(), Value::Int(port));
            }
        }
        if let Some(cidr) = rule.get("CidrIp").and_then(|v| v.as_str()) {
            fields.insert("cidr".to_string(), Value::string(cidr));
        }
        if let Some(group) = rule.get("SourceSecurityGroupId").and_then(|v| v.as_str()) {
            fields.insert(
                "source_security_group_id".to_string(),
                Value::string(group),
            );
        }
        out.push(Value::Map(fields));
    }

    Some(Value::List(out))
}

// =============================================================================
// Observed State Mapping (pure)
// =============================================================================

/// Map Cloud Control properties back into vela attributes
pub fn map_observed_attributes(
    resource: &Resource,
    config: &ResourceConfig,
    props: &serde_json::Value,
    identifier: &str,
) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();

    for (vela_name, aws_name) in config.attributes {
        if let Some(value) = props.get(aws_name)
            && let Some(v) = json_to_value(value)
        {
            attributes.insert((*vela_name).to_string(), v);
        }
    }

    // Every resource exposes its identifier as "id"; ARN-identified kinds
    // also expose it as "arn" for references.
    attributes.insert("id".to_string(), Value::string(identifier));
    if matches!(
        resource.id.kind.as_str(),
        "secret" | "load_balancer" | "target_group" | "listener"
    ) {
        attributes.insert("arn".to_string(), Value::string(identifier));
    }

    match resource.id.kind.as_str() {
        "security_group" => {
            if let Some(rules) = props.get("SecurityGroupIngress")
                && let Some(v) = aws_to_firewall_rules(rules)
            {
                attributes.insert("ingress".to_string(), v);
            }
            if let Some(rules) = props.get("SecurityGroupEgress")
                && let Some(v) = aws_to_firewall_rules(rules)
            {
                attributes.insert("egress".to_string(), v);
            }
        }
        "rds_instance" => {
            if let Some(address) = props
                .pointer("/Endpoint/Address")
                .and_then(|v| v.as_str())
            {
                attributes.insert("address".to_string(), Value::string(address));
            }
            // Undo the string modeling of numeric properties
            for (aws_name, vela_name) in
                [("AllocatedStorage", "allocated_storage"), ("Port", "port")]
            {
                if let Some(n) = props
                    .get(aws_name)
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse::<i64>().ok())
                {
                    attributes.insert(vela_name.to_string(), Value::Int(n));
                }
            }
        }
        "load_balancer" => {
            if let Some(dns) = props.get("DNSName").and_then(|v| v.as_str()) {
                attributes.insert("dns_name".to_string(), Value::string(dns));
            }
        }
        "target_group" => {
            if let Some(matcher) = props.pointer("/Matcher/HttpCode").and_then(|v| v.as_str()) {
                attributes.insert("matcher".to_string(), Value::string(matcher));
            }
        }
        "listener" => {
            if let Some(tg_arn) = props
                .pointer("/DefaultActions/0/TargetGroupArn")
                .and_then(|v| v.as_str())
            {
                attributes.insert(
                    "default_target_group_arn".to_string(),
                    Value::string(tg_arn),
                );
            }
        }
        "iam_role" => {
            if let Some(arn) = props.get("Arn").and_then(|v| v.as_str()) {
                attributes.insert("arn".to_string(), Value::string(arn));
            }
            if let Some(service) = props
                .pointer("/AssumeRolePolicyDocument/Statement/0/Principal/Service")
                .and_then(|v| v.as_str())
            {
                attributes.insert("assume_role_service".to_string(), Value::string(service));
            }
        }
        "iam_instance_profile" => {
            if let Some(arn) = props.get("Arn").and_then(|v| v.as_str()) {
                attributes.insert("arn".to_string(), Value::string(arn));
            }
            if let Some(roles) = props.get("Roles").and_then(|v| v.as_array())
                && let Some(role) = roles.first().and_then(|v| v.as_str())
            {
                attributes.insert("role".to_string(), Value::string(role));
            }
        }
        "iam_role_policy" => {
            if let Some(role) = props.get("RoleName").and_then(|v| v.as_str()) {
                attributes.insert("role".to_string(), Value::string(role));
            }
            if let Some(statements) = statements_from_policy(props.get("PolicyDocument")) {
                attributes.insert("statements".to_string(), statements);
            }
        }
        "launch_template" => {
            if let Some(data) = props.get("LaunchTemplateData") {
                for (aws_name, vela_name) in
                    [("ImageId", "image_id"), ("InstanceType", "instance_type")]
                {
                    if let Some(v) = data.get(aws_name).and_then(|v| v.as_str()) {
                        attributes.insert(vela_name.to_string(), Value::string(v));
                    }
                }
                if let Some(arn) = data
                    .pointer("/IamInstanceProfile/Arn")
                    .and_then(|v| v.as_str())
                {
                    attributes.insert("instance_profile".to_string(), Value::string(arn));
                }
                if let Some(sg_ids) = data.get("SecurityGroupIds")
                    && let Some(v) = json_to_value(sg_ids)
                {
                    attributes.insert("security_group_ids".to_string(), v);
                }
                if let Some(user_data) = data.get("UserData").and_then(|v| v.as_str())
                    && let Ok(decoded) = BASE64_STANDARD.decode(user_data)
                    && let Ok(script) = String::from_utf8(decoded)
                {
                    attributes.insert("user_data".to_string(), Value::String(script));
                }
            }
        }
        "autoscaling_group" => {
            if let Some(lt_id) = props
                .pointer("/LaunchTemplate/LaunchTemplateId")
                .and_then(|v| v.as_str())
            {
                attributes.insert("launch_template_id".to_string(), Value::string(lt_id));
            }
            if let Some(subnets) = props.get("VPCZoneIdentifier")
                && let Some(v) = json_to_value(subnets)
            {
                attributes.insert("subnet_ids".to_string(), v);
            }
        }
        _ => {}
    }

    // Write-only attributes are never readable; echo the declared value so
    // diffs stay clean.
    for name in config.write_only {
        if let Some(value) = resource.attribute(name) {
            attributes.insert((*name).to_string(), value.clone());
        }
    }

    attributes
}

/// Recover the statements attribute from an IAM policy document
///
/// Action/Resource may come back as a single string; normalize to lists so
/// read-back matches the declared shape.
fn statements_from_policy(doc: Option<&serde_json::Value>) -> Option<Value> {
    let statements = doc?.get("Statement")?.as_array()?;

    let mut out = Vec::new();
    for statement in statements {
        let mut fields = HashMap::new();
        for (aws_name, vela_name) in [("Action", "actions"), ("Resource", "resources")] {
            let list = match statement.get(aws_name) {
                Some(serde_json::Value::String(s)) => Value::List(vec![Value::string(s)]),
                Some(value) => json_to_value(value)?,
                None => return None,
            };
            fields.insert(vela_name.to_string(), list);
        }
        out.push(Value::Map(fields));
    }

    Some(Value::List(out))
}

// =============================================================================
// Patch Building (pure)
// =============================================================================

/// Build JSON-patch operations for the attributes that changed
pub fn build_patch_ops(
    config: &ResourceConfig,
    from: &RemoteState,
    to: &Resource,
) -> ProviderResult<Vec<serde_json::Value>> {
    let mut patch_ops = Vec::new();

    for (vela_name, aws_name) in config.attributes {
        let Some(desired) = to.attribute(vela_name) else {
            continue;
        };
        if contains_ref(desired) {
            continue;
        }
        if from.attributes.get(*vela_name) == Some(desired) {
            continue;
        }
        if let Some(value) = value_to_json(desired) {
            patch_ops.push(json!({
                "op": "replace",
                "path": format!("/{}", aws_name),
                "value": value
            }));
        }
    }

    // Rule sets patch as whole documents
    if to.id.kind == "security_group" {
        for (vela_name, aws_name) in
            [("ingress", "SecurityGroupIngress"), ("egress", "SecurityGroupEgress")]
        {
            if let Some(desired) = to.attribute(vela_name)
                && from.attributes.get(vela_name) != Some(desired)
                && !contains_ref(desired)
            {
                patch_ops.push(json!({
                    "op": "replace",
                    "path": format!("/{}", aws_name),
                    "value": firewall_rules_to_aws(desired)?
                }));
            }
        }
    }

    Ok(patch_ops)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sg_resource() -> Resource {
        Resource::new("security_group", "myapp-edge")
            .with_binding("edge_sg")
            .with_attribute("description", Value::string("edge tier"))
            .with_attribute("vpc_id", Value::string("vpc-123"))
            .with_attribute(
                "ingress",
                Value::List(vec![Value::Map(HashMap::from([
                    ("protocol".to_string(), Value::string("tcp")),
                    ("from_port".to_string(), Value::Int(80)),
                    ("to_port".to_string(), Value::Int(80)),
                    ("cidr".to_string(), Value::string("0.0.0.0/0")),
                ]))]),
            )
    }

    #[test]
    fn security_group_desired_state() {
        let desired = build_desired_state(&sg_resource()).unwrap();

        assert_eq!(desired["GroupName"], json!("myapp-edge"));
        assert_eq!(desired["GroupDescription"], json!("edge tier"));
        assert_eq!(desired["VpcId"], json!("vpc-123"));
        assert_eq!(
            desired["SecurityGroupIngress"],
            json!([{
                "IpProtocol": "tcp",
                "FromPort": 80,
                "ToPort": 80,
                "CidrIp": "0.0.0.0/0"
            }])
        );
    }

    #[test]
    fn unresolved_reference_is_an_error() {
        let resource = sg_resource().with_attribute(
            "ingress",
            Value::List(vec![Value::Map(HashMap::from([(
                "source_security_group_id".to_string(),
                Value::reference("edge_sg", "id"),
            )]))]),
        );

        let err = build_desired_state(&resource).unwrap_err();
        assert!(err.message.contains("unresolved reference"));
    }

    #[test]
    fn all_protocol_maps_to_minus_one_and_back() {
        let rules = Value::List(vec![Value::Map(HashMap::from([
            ("protocol".to_string(), Value::string("all")),
            ("from_port".to_string(), Value::Int(0)),
            ("to_port".to_string(), Value::Int(0)),
            ("cidr".to_string(), Value::string("0.0.0.0/0")),
        ]))]);

        let aws = firewall_rules_to_aws(&rules).unwrap();
        assert_eq!(aws[0]["IpProtocol"], json!("-1"));

        let back = aws_to_firewall_rules(&aws).unwrap();
        assert_eq!(back, rules);
    }

    #[test]
    fn iam_role_gets_trust_policy() {
        let resource = Resource::new("iam_role", "myapp-app")
            .with_attribute("assume_role_service", Value::string("ec2.amazonaws.com"));

        let desired = build_desired_state(&resource).unwrap();
        assert_eq!(desired["RoleName"], json!("myapp-app"));
        assert_eq!(
            desired["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            json!("ec2.amazonaws.com")
        );
    }

    #[test]
    fn role_policy_renders_statements() {
        let resource = Resource::new("iam_role_policy", "myapp-app-secret")
            .with_attribute("role", Value::string("myapp-app"))
            .with_attribute(
                "statements",
                Value::List(vec![Value::Map(HashMap::from([
                    (
                        "actions".to_string(),
                        Value::List(vec![Value::string("secretsmanager:GetSecretValue")]),
                    ),
                    (
                        "resources".to_string(),
                        Value::List(vec![Value::string("arn:aws:secretsmanager:...:myapp/database")]),
                    ),
                ]))]),
            );

        let desired = build_desired_state(&resource).unwrap();
        let doc = &desired["PolicyDocument"];
        assert_eq!(doc["Version"], json!("2012-10-17"));
        assert_eq!(
            doc["Statement"][0]["Action"],
            json!(["secretsmanager:GetSecretValue"])
        );
        assert_eq!(doc["Statement"][0]["Effect"], json!("Allow"));
    }

    #[test]
    fn policy_statements_read_back_in_declared_shape() {
        let doc = json!({
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Effect": "Allow",
                    "Action": ["secretsmanager:GetSecretValue"],
                    "Resource": ["arn:secret"]
                },
                { "Effect": "Allow", "Action": "ec2:DescribeTags", "Resource": "*" }
            ]
        });

        let statements = statements_from_policy(Some(&doc)).unwrap();
        let Value::List(items) = &statements else {
            panic!("expected a list of statements");
        };
        assert_eq!(items.len(), 2);

        // String-form Action/Resource normalize to lists
        let Value::Map(second) = &items[1] else {
            panic!("expected a statement map");
        };
        assert_eq!(
            second.get("actions"),
            Some(&Value::List(vec![Value::string("ec2:DescribeTags")]))
        );
        assert_eq!(
            second.get("resources"),
            Some(&Value::List(vec![Value::string("*")]))
        );
    }

    #[test]
    fn trust_policy_service_reads_back() {
        let resource = Resource::new("iam_role", "myapp-app")
            .with_attribute("assume_role_service", Value::string("ec2.amazonaws.com"));

        let desired = build_desired_state(&resource).unwrap();
        let config = get_resource_config("iam_role").unwrap();
        let attrs = map_observed_attributes(&resource, config, &desired, "myapp-app");
        assert_eq!(
            attrs.get("assume_role_service"),
            Some(&Value::string("ec2.amazonaws.com"))
        );
    }

    #[test]
    fn launch_template_encodes_user_data() {
        let resource = Resource::new("launch_template", "myapp-lt")
            .with_attribute("image_id", Value::string("ami-111"))
            .with_attribute("instance_type", Value::string("t3.micro"))
            .with_attribute("instance_profile", Value::string("arn:aws:iam::123:instance-profile/myapp-app"))
            .with_attribute(
                "security_group_ids",
                Value::List(vec![Value::string("sg-123")]),
            )
            .with_attribute("user_data", Value::string("#!/bin/bash\necho ok\n"));

        let desired = build_desired_state(&resource).unwrap();
        let data = &desired["LaunchTemplateData"];
        assert_eq!(data["ImageId"], json!("ami-111"));
        assert_eq!(
            data["UserData"],
            json!(BASE64_STANDARD.encode("#!/bin/bash\necho ok\n"))
        );

        // Read-back decodes it again
        let config = get_resource_config("launch_template").unwrap();
        let attrs = map_observed_attributes(&resource, config, &desired, "lt-0abc");
        assert_eq!(
            attrs.get("user_data"),
            Some(&Value::string("#!/bin/bash\necho ok\n"))
        );
    }

    #[test]
    fn autoscaling_group_desired_state() {
        let resource = Resource::new("autoscaling_group", "myapp-asg")
            .with_attribute("min_size", Value::Int(1))
            .with_attribute("max_size", Value::Int(3))
            .with_attribute("desired_capacity", Value::Int(1))
            .with_attribute("launch_template_id", Value::string("lt-0abc"))
            .with_attribute(
                "subnet_ids",
                Value::List(vec![Value::string("subnet-1"), Value::string("subnet-2")]),
            )
            .with_attribute(
                "target_group_arns",
                Value::List(vec![Value::string("arn:tg")]),
            )
            .with_attribute("health_check_type", Value::string("ELB"))
            .with_attribute("health_check_grace_period", Value::Int(300));

        let desired = build_desired_state(&resource).unwrap();
        assert_eq!(desired["MinSize"], json!(1));
        assert_eq!(desired["HealthCheckType"], json!("ELB"));
        assert_eq!(desired["HealthCheckGracePeriod"], json!(300));
        assert_eq!(
            desired["LaunchTemplate"],
            json!({ "LaunchTemplateId": "lt-0abc", "Version": "$Latest" })
        );
        assert_eq!(
            desired["VPCZoneIdentifier"],
            json!(["subnet-1", "subnet-2"])
        );
    }

    #[test]
    fn rds_numeric_properties_are_modeled_as_strings() {
        let resource = Resource::new("rds_instance", "myapp-db")
            .with_attribute("engine", Value::string("mysql"))
            .with_attribute("allocated_storage", Value::Int(20))
            .with_attribute("port", Value::Int(3306))
            .with_attribute("password", Value::string("p"));

        let desired = build_desired_state(&resource).unwrap();
        assert_eq!(desired["AllocatedStorage"], json!("20"));
        assert_eq!(desired["Port"], json!("3306"));

        // Reading back restores the integer attributes
        let config = get_resource_config("rds_instance").unwrap();
        let attrs = map_observed_attributes(&resource, config, &desired, "myapp-db");
        assert_eq!(attrs.get("allocated_storage"), Some(&Value::Int(20)));
        assert_eq!(attrs.get("port"), Some(&Value::Int(3306)));
    }

    #[test]
    fn write_only_attributes_echo_the_declared_value() {
        let resource = Resource::new("rds_instance", "myapp-db")
            .with_attribute("engine", Value::string("mysql"))
            .with_attribute("password", Value::string("kept-secret"));

        let config = get_resource_config("rds_instance").unwrap();
        // Observed properties never include the password
        let props = json!({ "Engine": "mysql", "Endpoint": { "Address": "db.internal" } });

        let attrs = map_observed_attributes(&resource, config, &props, "myapp-db");
        assert_eq!(attrs.get("password"), Some(&Value::string("kept-secret")));
        assert_eq!(attrs.get("address"), Some(&Value::string("db.internal")));
    }

    #[test]
    fn patch_ops_only_cover_changed_attributes() {
        let config = get_resource_config("autoscaling_group").unwrap();

        let id = ResourceId::new("autoscaling_group", "myapp-asg");
        let mut from_attrs = HashMap::new();
        from_attrs.insert("min_size".to_string(), Value::Int(1));
        from_attrs.insert("max_size".to_string(), Value::Int(3));
        from_attrs.insert("desired_capacity".to_string(), Value::Int(1));
        let from = RemoteState::existing(id, from_attrs);

        let to = Resource::new("autoscaling_group", "myapp-asg")
            .with_attribute("min_size", Value::Int(1))
            .with_attribute("max_size", Value::Int(3))
            .with_attribute("desired_capacity", Value::Int(2));

        let ops = build_patch_ops(config, &from, &to).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0]["path"], json!("/DesiredCapacity"));
        assert_eq!(ops[0]["value"], json!(2));
    }

    #[test]
    fn secret_string_payload_renders_json() {
        let resource = Resource::new("secret_version", "myapp-current")
            .with_attribute("secret_id", Value::string("arn:secret"))
            .with_attribute(
                "secret_string",
                Value::Map(HashMap::from([
                    ("DB_HOST".to_string(), Value::string("db.internal")),
                    ("DB_NAME".to_string(), Value::string("appdb")),
                ])),
            );

        let payload = secret_string_payload(&resource).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["DB_HOST"], json!("db.internal"));
        assert_eq!(parsed["DB_NAME"], json!("appdb"));
    }
}
