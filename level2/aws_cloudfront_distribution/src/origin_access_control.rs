use aws_cfn_stack::{CfnResource, Resource};
use serde::Serialize;
use serde_json::Value;

use super::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SigningProtocol {
    #[serde(rename = "sigv4")]
    SigV4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigningBehavior {
    Always,
    Never,
    NoOverride,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OriginAccessControlConfig {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub origin_access_control_origin_type: String,
    pub signing_behavior: SigningBehavior,
    pub signing_protocol: SigningProtocol,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnOriginAccessControl {
    pub origin_access_control_config: OriginAccessControlConfig,
}

impl CfnResource for CfnOriginAccessControl {
    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::OriginAccessControl"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
    fn validate(&self) -> Result<(), String> {
        validate_oac_name(&self.origin_access_control_config.name).map_err(|e| e.to_string())
    }
}

/// An origin access control lets cloudfront sign its requests to an S3 origin,
/// so the bucket can stay private.
pub struct OriginAccessControl {
    pub logical_id: String,
    /// must be unique within the account. at most 64 characters.
    pub name: String,
    pub description: String,
    pub signing_protocol: SigningProtocol,
    pub signing_behavior: SigningBehavior,
}

impl Default for OriginAccessControl {
    fn default() -> Self {
        Self {
            logical_id: "OAC".to_string(),
            name: String::new(),
            description: String::new(),
            signing_protocol: SigningProtocol::SigV4,
            signing_behavior: SigningBehavior::Always,
        }
    }
}

pub fn validate_oac_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.len() > 64 {
        return Err(Error::InvalidOriginAccessControlName(name.to_string()));
    }
    Ok(())
}

/// pushes the origin access control and returns its logical id.
pub fn add_origin_access_control(oac: &OriginAccessControl, stackinp: &mut aws_cfn_stack::Input) -> Result<String, Error> {
    validate_oac_name(&oac.name)?;
    let resource = CfnOriginAccessControl {
        origin_access_control_config: OriginAccessControlConfig {
            name: oac.name.clone(),
            description: oac.description.clone(),
            origin_access_control_origin_type: "s3".to_string(),
            signing_behavior: oac.signing_behavior,
            signing_protocol: oac.signing_protocol,
        },
    };
    stackinp.push(Resource::new(&oac.logical_id, resource));
    Ok(oac.logical_id.clone())
}
