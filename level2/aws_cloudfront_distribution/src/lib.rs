use aws_cfn_stack::{sub, CfnResource, Resource, PSEUDO_ACCOUNT_ID, PSEUDO_PARTITION};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

mod origin_access_control;
pub use origin_access_control::*;
mod s3_origin;
pub use s3_origin::*;

/// error codes cloudfront lets you customize the response for.
pub const CUSTOMIZABLE_ERROR_CODES: &[u16] = &[400, 403, 404, 405, 414, 416, 500, 501, 502, 503, 504];
/// response codes a custom error response may answer with.
pub const ALLOWED_RESPONSE_CODES: &[u16] = &[200, 400, 403, 404, 405, 414, 416, 500, 501, 502, 503, 504];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Origin access control name '{0}' must be between 1 and 64 characters")]
    InvalidOriginAccessControlName(String),
    #[error("Distribution '{0}' uses custom domain names but has no certificate")]
    DomainNamesWithoutCertificate(String),
    #[error("Distribution '{0}' needs a default origin")]
    MissingOrigin(String),
    #[error("Invalid error response: {0}")]
    InvalidErrorResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewerProtocolPolicy {
    AllowAll,
    HttpsOnly,
    RedirectToHttps,
}

/// managed cache policies.
/// https://docs.aws.amazon.com/AmazonCloudFront/latest/DeveloperGuide/using-managed-cache-policies.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachePolicy {
    CachingOptimized,
    CachingDisabled,
    Custom(String),
}

impl CachePolicy {
    pub fn id(&self) -> &str {
        match self {
            CachePolicy::CachingOptimized => "658327ea-f89d-4fab-a63d-7e88639e58f6",
            CachePolicy::CachingDisabled => "4135ea2d-6df8-44a3-9df3-4b5a84be39ad",
            CachePolicy::Custom(id) => id,
        }
    }
}

/// how cloudfront answers when the origin returns an error status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorResponse {
    pub http_status: u16,
    pub response_http_status: Option<u16>,
    /// must begin with `/`
    pub response_page_path: Option<String>,
    /// minimum time, in seconds, the error response stays cached.
    pub ttl_seconds: Option<u64>,
}

impl ErrorResponse {
    pub fn validate(&self) -> Result<(), Error> {
        if !CUSTOMIZABLE_ERROR_CODES.contains(&self.http_status) {
            return Err(Error::InvalidErrorResponse(format!("{} is not a customizable error code", self.http_status)));
        }
        if let Some(code) = self.response_http_status {
            if !ALLOWED_RESPONSE_CODES.contains(&code) {
                return Err(Error::InvalidErrorResponse(format!("{code} is not an allowed response code")));
            }
        }
        if let Some(path) = &self.response_page_path {
            if !path.starts_with('/') {
                return Err(Error::InvalidErrorResponse(format!("response page path '{path}' must begin with '/'")));
            }
            if self.response_http_status.is_none() {
                return Err(Error::InvalidErrorResponse(format!("response page path '{path}' requires a response http status")));
            }
        }
        if self.response_http_status.is_some() && self.response_page_path.is_none() {
            return Err(Error::InvalidErrorResponse(format!(
                "error response for {} sets a response http status without a response page path", self.http_status
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomErrorResponse {
    #[serde(rename = "ErrorCode")]
    pub error_code: u16,
    #[serde(rename = "ResponseCode", skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
    #[serde(rename = "ResponsePagePath", skip_serializing_if = "Option::is_none")]
    pub response_page_path: Option<String>,
    #[serde(rename = "ErrorCachingMinTTL", skip_serializing_if = "Option::is_none")]
    pub error_caching_min_ttl: Option<u64>,
}

impl From<&ErrorResponse> for CustomErrorResponse {
    fn from(value: &ErrorResponse) -> Self {
        Self {
            error_code: value.http_status,
            response_code: value.response_http_status,
            response_page_path: value.response_page_path.clone(),
            error_caching_min_ttl: value.ttl_seconds,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3OriginConfig {
    /// left empty when an origin access control is used.
    pub origin_access_identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Origin {
    pub id: String,
    pub domain_name: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_origin_config: Option<S3OriginConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_access_control_id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DefaultCacheBehavior {
    pub target_origin_id: String,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub cache_policy_id: String,
    pub compress: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ViewerCertificate {
    pub acm_certificate_arn: Value,
    pub ssl_support_method: String,
    pub minimum_protocol_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DistributionConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default_root_object: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_certificate: Option<ViewerCertificate>,
    pub origins: Vec<Origin>,
    pub default_cache_behavior: DefaultCacheBehavior,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_error_responses: Vec<CustomErrorResponse>,
    pub http_version: String,
    #[serde(rename = "IPV6Enabled")]
    pub ipv6_enabled: bool,
    pub price_class: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnDistribution {
    pub distribution_config: DistributionConfig,
}

impl CfnResource for CfnDistribution {
    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::Distribution"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
    fn validate(&self) -> Result<(), String> {
        let config = &self.distribution_config;
        if !config.aliases.is_empty() && config.viewer_certificate.is_none() {
            return Err("Aliases require a viewer certificate".to_string());
        }
        let target = &config.default_cache_behavior.target_origin_id;
        if !config.origins.iter().any(|o| &o.id == target) {
            return Err(format!("Default cache behavior targets unknown origin '{target}'"));
        }
        Ok(())
    }
}

pub struct Input {
    pub logical_id: String,
    pub comment: String,
    /// by default we create the distribution enabled and ready to use.
    pub enabled: bool,
    /// object returned for requests to the root url, eg: index.html
    pub default_root_object: String,
    /// alternate domain names. every entry must be covered by the certificate.
    pub domain_names: Vec<String>,
    /// usually a `Ref` to a certificate in the same stack.
    pub certificate_arn: Option<Value>,
    pub minimum_protocol_version: String,
    pub default_origin: Option<Origin>,
    /// By default set to allow-all.
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub cache_policy: CachePolicy,
    pub error_responses: Vec<ErrorResponse>,
    pub http_version: String,
    pub ipv6_enabled: bool,
    pub price_class: String,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            logical_id: "Distribution".to_string(),
            comment: String::new(),
            enabled: true,
            default_root_object: String::new(),
            domain_names: vec![],
            certificate_arn: None,
            minimum_protocol_version: "TLSv1.2_2021".to_string(),
            default_origin: None,
            viewer_protocol_policy: ViewerProtocolPolicy::AllowAll,
            cache_policy: CachePolicy::CachingOptimized,
            error_responses: vec![],
            http_version: "http2".to_string(),
            ipv6_enabled: true,
            price_class: "PriceClass_All".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outputs {
    pub logical_distr_name: String,
}

/// `arn:aws:cloudfront::<account>:distribution/<distribution id>`.
/// when the account is not known ahead of time, the AWS::AccountId
/// pseudo parameter is substituted at deploy time instead.
pub fn distribution_arn(account: Option<&str>, logical_distr_name: &str) -> Value {
    let account = match account {
        Some(a) => a.to_string(),
        None => format!("${{{PSEUDO_ACCOUNT_ID}}}"),
    };
    sub(format!("arn:${{{PSEUDO_PARTITION}}}:cloudfront::{account}:distribution/${{{logical_distr_name}}}"))
}

pub fn config(myinput: &Input, stackinp: &mut aws_cfn_stack::Input) -> Result<Outputs, Error> {
    let logical_distr_name = myinput.logical_id.clone();
    let default_origin = myinput.default_origin.clone()
        .ok_or_else(|| Error::MissingOrigin(logical_distr_name.clone()))?;
    if !myinput.domain_names.is_empty() && myinput.certificate_arn.is_none() {
        return Err(Error::DomainNamesWithoutCertificate(logical_distr_name));
    }
    for response in myinput.error_responses.iter() {
        response.validate()?;
    }
    let viewer_certificate = myinput.certificate_arn.clone().map(|arn| ViewerCertificate {
        acm_certificate_arn: arn,
        ssl_support_method: "sni-only".to_string(),
        minimum_protocol_version: myinput.minimum_protocol_version.clone(),
    });
    let distribution = CfnDistribution {
        distribution_config: DistributionConfig {
            enabled: myinput.enabled,
            comment: myinput.comment.clone(),
            default_root_object: myinput.default_root_object.clone(),
            aliases: myinput.domain_names.clone(),
            viewer_certificate,
            default_cache_behavior: DefaultCacheBehavior {
                target_origin_id: default_origin.id.clone(),
                viewer_protocol_policy: myinput.viewer_protocol_policy,
                cache_policy_id: myinput.cache_policy.id().to_string(),
                compress: true,
            },
            origins: vec![default_origin],
            custom_error_responses: myinput.error_responses.iter().map(CustomErrorResponse::from).collect(),
            http_version: myinput.http_version.clone(),
            ipv6_enabled: myinput.ipv6_enabled,
            price_class: myinput.price_class.clone(),
        },
    };
    info!(distribution = %logical_distr_name, aliases = ?myinput.domain_names, "configured distribution");
    stackinp.push(Resource::new(&logical_distr_name, distribution));
    Ok(Outputs { logical_distr_name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn site_input() -> Input {
        Input {
            logical_id: "SiteDistribution".into(),
            default_root_object: "index.html".into(),
            domain_names: vec!["blog.example.com".into()],
            certificate_arn: Some(aws_cfn_stack::get_ref("SiteCert")),
            default_origin: Some(s3_bucket_origin("SiteBucket", "OAC")),
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
            cache_policy: CachePolicy::CachingDisabled,
            error_responses: vec![ErrorResponse {
                http_status: 404,
                response_http_status: Some(200),
                response_page_path: Some("/index.html".into()),
                ttl_seconds: Some(60),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn distribution_config_serializes() {
        let mut stack = aws_cfn_stack::Input::new("test");
        let outputs = config(&site_input(), &mut stack).unwrap();
        let template = stack.into_template().unwrap();
        let config = &template.resources[&outputs.logical_distr_name].properties["DistributionConfig"];
        assert_eq!(config["DefaultRootObject"], "index.html");
        assert_eq!(config["Aliases"], json!(["blog.example.com"]));
        assert_eq!(config["ViewerCertificate"], json!({
            "AcmCertificateArn": { "Ref": "SiteCert" },
            "SslSupportMethod": "sni-only",
            "MinimumProtocolVersion": "TLSv1.2_2021",
        }));
        assert_eq!(config["DefaultCacheBehavior"], json!({
            "TargetOriginId": "SiteBucketOrigin",
            "ViewerProtocolPolicy": "redirect-to-https",
            "CachePolicyId": "4135ea2d-6df8-44a3-9df3-4b5a84be39ad",
            "Compress": true,
        }));
        assert_eq!(config["CustomErrorResponses"], json!([{
            "ErrorCode": 404,
            "ResponseCode": 200,
            "ResponsePagePath": "/index.html",
            "ErrorCachingMinTTL": 60,
        }]));
        assert_eq!(config["IPV6Enabled"], true);
        assert_eq!(config["Enabled"], true);
    }

    #[test]
    fn domain_names_need_a_certificate() {
        let mut stack = aws_cfn_stack::Input::new("test");
        let input = Input { certificate_arn: None, ..site_input() };
        assert!(matches!(config(&input, &mut stack), Err(Error::DomainNamesWithoutCertificate(_))));
    }

    #[test]
    fn needs_an_origin() {
        let mut stack = aws_cfn_stack::Input::new("test");
        let input = Input { default_origin: None, ..site_input() };
        assert!(matches!(config(&input, &mut stack), Err(Error::MissingOrigin(_))));
    }

    #[test]
    fn error_responses_are_checked() {
        let bad_path = ErrorResponse {
            http_status: 404,
            response_http_status: Some(200),
            response_page_path: Some("index.html".into()),
            ttl_seconds: None,
        };
        assert!(bad_path.validate().is_err());
        let no_status = ErrorResponse {
            http_status: 404,
            response_page_path: Some("/index.html".into()),
            ..Default::default()
        };
        assert!(no_status.validate().is_err());
        let bad_code = ErrorResponse { http_status: 418, ..Default::default() };
        assert!(bad_code.validate().is_err());
        let ttl_only = ErrorResponse { http_status: 503, ttl_seconds: Some(0), ..Default::default() };
        assert!(ttl_only.validate().is_ok());
    }

    #[test]
    fn source_arn_falls_back_to_account_pseudo_parameter() {
        assert_eq!(
            distribution_arn(None, "SiteDistribution"),
            json!({ "Fn::Sub": "arn:${AWS::Partition}:cloudfront::${AWS::AccountId}:distribution/${SiteDistribution}" })
        );
        assert_eq!(
            distribution_arn(Some("123456789012"), "SiteDistribution"),
            json!({ "Fn::Sub": "arn:${AWS::Partition}:cloudfront::123456789012:distribution/${SiteDistribution}" })
        );
    }
}
