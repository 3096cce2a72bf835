//! This module defines and creates an AWS ACM certificate. This module only works if the following is true:
//! - The domain you'd like to get a certificate for is hosted in Amazon Route 53
//! - The domain resides in your AWS account.
//! - You are using DNS validation.

use aws_cfn_stack::{get_ref, CfnResource, Resource};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// certificates attached to a cloudfront distribution must live here.
pub const CLOUDFRONT_CERT_REGION: &str = "us-east-1";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Must provide a domain name")]
    MissingDomainName,
    #[error("Invalid domain name {0}: {1}")]
    InvalidDomainName(String, &'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainValidationOption {
    pub domain_name: String,
    pub hosted_zone_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnCertificate {
    pub domain_name: String,
    pub validation_method: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub domain_validation_options: Vec<DomainValidationOption>,
}

impl CfnResource for CfnCertificate {
    fn type_string(&self) -> &'static str {
        "AWS::CertificateManager::Certificate"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
    fn validate(&self) -> Result<(), String> {
        validate_domain_name(&self.domain_name).map_err(|e| e.to_string())
    }
}

#[derive(Default)]
pub struct Input {
    pub logical_id: String,
    /// the domain you're requesting a certificate for. Must be fully qualified. Can have 1 optional wildcard.
    /// Examples of valid values:
    /// - www.mysite.com
    /// - multiple.sub.domains.mysite.com
    /// - mysite.com
    /// - *.mysite.com
    /// Examples of invalid values:
    /// - *.something.*.mysite.com
    /// - cannotendwithdot.com.
    pub domain_name: String,

    /// The hosted zone ID of where your domain is hosted in Route53.
    /// When provided, cloudformation creates the validation record
    /// itself and the stack waits until the certificate is issued.
    pub hosted_zone_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outputs {
    /// this is the logical name in cloudformation for your cert.
    /// Reference this name in other resources that rely on it,
    /// for example, perhaps a cloudfront distribution that wants to reference the cert ARN.
    pub logical_cert_name: String,
}

impl Outputs {
    /// `Ref` on a certificate resolves to its ARN.
    pub fn certificate_arn(&self) -> Value {
        get_ref(&self.logical_cert_name)
    }
}

pub fn validate_domain_name(domain_name: &str) -> Result<(), Error> {
    let invalid = |reason| Err(Error::InvalidDomainName(domain_name.to_string(), reason));
    if domain_name.is_empty() {
        return Err(Error::MissingDomainName);
    }
    if domain_name.ends_with('.') {
        return invalid("must not end with a dot");
    }
    if domain_name.len() > 253 {
        return invalid("must be at most 253 characters");
    }
    if domain_name.matches('*').count() > 1 {
        return invalid("must only provide 1 wildcard");
    }
    if domain_name.contains('*') && !domain_name.starts_with("*.") {
        return invalid("if using a wildcard, it must be the first component of your domain, eg: \"*.something.com\"");
    }
    let labels: Vec<&str> = domain_name.split('.').collect();
    if labels.len() < 2 {
        return invalid("must be fully qualified");
    }
    for (i, label) in labels.iter().enumerate() {
        if i == 0 && *label == "*" {
            continue;
        }
        if label.is_empty() || label.len() > 63 {
            return invalid("every label must be between 1 and 63 characters");
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return invalid("labels may only contain letters, digits and hyphens");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return invalid("labels must not begin or end with a hyphen");
        }
    }
    Ok(())
}

/// warns when the stack targets a region cloudfront cannot read certificates from.
pub fn config(self_input: &Input, stackinp: &mut aws_cfn_stack::Input) -> Result<Outputs, Error> {
    validate_domain_name(&self_input.domain_name)?;
    if let Some(region) = &stackinp.region {
        if region != CLOUDFRONT_CERT_REGION {
            warn!(
                region = %region,
                domain = %self_input.domain_name,
                "cloudfront only accepts certificates from {CLOUDFRONT_CERT_REGION}; deploy this stack there"
            );
        }
    }
    let domain_validation_options = match &self_input.hosted_zone_id {
        Some(zone_id) => vec![DomainValidationOption {
            domain_name: self_input.domain_name.clone(),
            hosted_zone_id: zone_id.clone(),
        }],
        None => vec![],
    };
    let cert = CfnCertificate {
        domain_name: self_input.domain_name.clone(),
        validation_method: "DNS".to_string(),
        domain_validation_options,
    };
    let logical_cert_name = if self_input.logical_id.is_empty() {
        aws_cfn_stack::logical_id(&["Cert", &self_input.domain_name])
    } else {
        self_input.logical_id.clone()
    };
    info!(cert = %logical_cert_name, domain = %self_input.domain_name, "requesting DNS validated certificate");
    stackinp.push(Resource::new(&logical_cert_name, cert));
    Ok(Outputs { logical_cert_name })
}
