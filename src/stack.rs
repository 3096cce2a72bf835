use aws_cfn_stack::{DeletionPolicy, PolicyStatement, ResourceOutput, SynthesizedStack};
use aws_cloudfront_distribution::{
    CachePolicy, ErrorResponse, OriginAccessControl, SigningBehavior, SigningProtocol, ViewerProtocolPolicy,
};
use aws_route53::{ARecord, HostedZone, RecordTarget};
use serde_json::json;
use tracing::info;

use super::{Error, Result, StaticSiteProps};

pub const BUCKET_ID: &str = "SiteBucket";
pub const OAC_ID: &str = "OAC";
pub const CERT_ID: &str = "SiteCert";
pub const DISTRIBUTION_ID: &str = "SiteDistribution";
pub const RECORD_ID: &str = "AliasRecord";

pub const BUCKET_NAME_OUTPUT: &str = "BucketNameOutput";
pub const CLOUDFRONT_ID_OUTPUT: &str = "CloudFrontIdOutput";
pub const SITE_URL_OUTPUT: &str = "SiteUrlOutput";

pub const INDEX_DOCUMENT: &str = "index.html";

/// the stack every static site deploys into.
pub fn stack_name(repo_name: &str) -> String {
    format!("{repo_name}-static-site")
}

/// the stack name for a repo, after checking the repo name.
pub fn checked_stack_name(repo_name: &str) -> Result<String> {
    validate_repo_name(repo_name)?;
    Ok(stack_name(repo_name))
}

/// the suffix of a bucket named by `StaticSiteStack` for this repo.
pub fn bucket_suffix<'a>(repo_name: &str, bucket_name: &'a str) -> Option<&'a str> {
    bucket_name
        .strip_prefix(&format!("{}-", stack_name(repo_name)))
        .filter(|suffix| !suffix.is_empty())
}

/// repo names end up in the bucket name, the stack name and the DNS record,
/// so they are limited to lowercase DNS label characters.
pub fn validate_repo_name(repo_name: &str) -> Result<()> {
    let valid = !repo_name.is_empty()
        && repo_name.len() <= 63
        && repo_name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && repo_name.starts_with(|c: char| c.is_ascii_lowercase())
        && !repo_name.ends_with('-');
    if !valid {
        return Err(Error::InvalidRepoName(repo_name.to_string()));
    }
    Ok(())
}

/// bucket, origin access control, certificate, distribution, bucket policy
/// and alias record for one static site.
pub struct StaticSiteStack {
    stack: aws_cfn_stack::Input,
    domain_name: String,
    bucket_name: String,
    record_name: String,
}

impl StaticSiteStack {
    pub fn new(props: &StaticSiteProps) -> Result<Self> {
        let suffix = uuid::Uuid::new_v4().to_string();
        Self::with_bucket_suffix(props, &suffix)
    }

    /// same as `new`, but with a fixed bucket name suffix instead of a random uuid.
    pub fn with_bucket_suffix(props: &StaticSiteProps, bucket_suffix: &str) -> Result<Self> {
        let repo_name = props.repo_name.as_str();
        validate_repo_name(repo_name)?;

        let hosted_zone = HostedZone::from_hosted_zone_attributes(&props.hosted_zone_id, &props.hosted_zone_name)?;
        // an explicit domain must already live inside the hosted zone
        let (domain_name, record_name) = match &props.domain_name {
            Some(domain) => {
                let fqdn = hosted_zone.qualify(&format!("{}.", domain.trim_end_matches('.')))?;
                (fqdn.trim_end_matches('.').to_string(), fqdn)
            }
            None => (format!("{repo_name}.{}", hosted_zone.zone_name), repo_name.to_string()),
        };

        let mut stack = aws_cfn_stack::Input::new(stack_name(repo_name));
        stack.description = format!("Static site for {domain_name}");
        stack.region = props.region.clone();

        let bucket_name = format!("{repo_name}-static-site-{bucket_suffix}");
        let bucket = aws_s3::config(&aws_s3::Input {
            logical_id: BUCKET_ID.to_string(),
            bucket_name: bucket_name.clone(),
            block_public_access: Some(aws_s3::BlockPublicAccess::BLOCK_ALL),
            removal_policy: DeletionPolicy::Delete,
            auto_delete_objects: true,
        }, &mut stack)?;

        let mut oac_name = format!("{}-oac", stack.stack_name);
        oac_name.truncate(64);
        let oac_id = aws_cloudfront_distribution::add_origin_access_control(&OriginAccessControl {
            logical_id: OAC_ID.to_string(),
            name: oac_name,
            description: format!("OAC for {repo_name} site"),
            signing_protocol: SigningProtocol::SigV4,
            signing_behavior: SigningBehavior::Always,
        }, &mut stack)?;

        let cert = aws_acm_cert::config(&aws_acm_cert::Input {
            logical_id: CERT_ID.to_string(),
            domain_name: domain_name.clone(),
            hosted_zone_id: Some(hosted_zone.hosted_zone_id.clone()),
        }, &mut stack)?;

        let distribution = aws_cloudfront_distribution::config(&aws_cloudfront_distribution::Input {
            logical_id: DISTRIBUTION_ID.to_string(),
            default_root_object: INDEX_DOCUMENT.to_string(),
            domain_names: vec![domain_name.clone()],
            certificate_arn: Some(cert.certificate_arn()),
            default_origin: Some(aws_cloudfront_distribution::s3_bucket_origin(&bucket.logical_bucket_name, &oac_id)),
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
            cache_policy: CachePolicy::CachingDisabled,
            // single page apps route client side, so unknown paths serve the index
            error_responses: vec![ErrorResponse {
                http_status: 404,
                response_http_status: Some(200),
                response_page_path: Some(format!("/{INDEX_DOCUMENT}")),
                ttl_seconds: Some(60),
            }],
            ..Default::default()
        }, &mut stack)?;

        let read_statement = PolicyStatement::allow()
            .action("s3:GetObject")
            .resource(aws_s3::arn_for_objects(&bucket.logical_bucket_name, "*"))
            .service_principal("cloudfront.amazonaws.com")
            .condition(
                "StringEquals",
                "AWS:SourceArn",
                aws_cloudfront_distribution::distribution_arn(props.account.as_deref(), &distribution.logical_distr_name),
            );
        aws_s3::add_to_resource_policy(&bucket.logical_bucket_name, &[read_statement], &mut stack)?;

        let record = aws_route53::config(&ARecord {
            logical_id: RECORD_ID.to_string(),
            zone: hosted_zone,
            record_name,
            target: RecordTarget::CloudFrontTarget(distribution.logical_distr_name.clone()),
        }, &mut stack)?;

        stack.add_output(
            BUCKET_NAME_OUTPUT,
            ResourceOutput::new(aws_cfn_stack::get_ref(&bucket.logical_bucket_name))
                .export_name(format!("{repo_name}-bucket-name")),
        );
        stack.add_output(
            CLOUDFRONT_ID_OUTPUT,
            ResourceOutput::new(aws_cfn_stack::get_ref(&distribution.logical_distr_name))
                .export_name(format!("{repo_name}-cloudfront-id")),
        );
        stack.add_output(SITE_URL_OUTPUT, ResourceOutput::new(json!(format!("https://{domain_name}"))));

        info!(stack = %stack.stack_name, domain = %domain_name, bucket = %bucket_name, "static site stack assembled");
        Ok(Self {
            stack,
            domain_name,
            bucket_name,
            record_name: record.record_name,
        })
    }

    pub fn stack_name(&self) -> &str {
        &self.stack.stack_name
    }

    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// fully qualified, with trailing dot
    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    pub fn synth(self) -> Result<SynthesizedStack> {
        Ok(aws_cfn_stack::synth(self.stack)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> StaticSiteProps {
        StaticSiteProps {
            repo_name: "blog".into(),
            hosted_zone_name: "example.com".into(),
            hosted_zone_id: "Z0123".into(),
            domain_name: None,
            account: None,
            region: Some("us-east-1".into()),
        }
    }

    #[test]
    fn repo_names_must_be_dns_labels() {
        assert!(validate_repo_name("blog").is_ok());
        assert!(validate_repo_name("my-blog2").is_ok());
        assert!(validate_repo_name("Blog").is_err());
        assert!(validate_repo_name("2blog").is_err());
        assert!(validate_repo_name("blog-").is_err());
        assert!(validate_repo_name("my_blog").is_err());
        assert!(validate_repo_name("").is_err());
    }

    #[test]
    fn stack_names_are_checked() {
        assert_eq!(checked_stack_name("blog").unwrap(), "blog-static-site");
        assert!(matches!(checked_stack_name("My_Blog"), Err(Error::InvalidRepoName(_))));
    }

    #[test]
    fn names_derive_from_repo_and_zone() {
        let site = StaticSiteStack::with_bucket_suffix(&props(), "abc").unwrap();
        assert_eq!(site.stack_name(), "blog-static-site");
        assert_eq!(site.domain_name(), "blog.example.com");
        assert_eq!(site.bucket_name(), "blog-static-site-abc");
        assert_eq!(site.record_name(), "blog.example.com.");
    }

    #[test]
    fn suffix_is_recovered_from_bucket_name() {
        let site = StaticSiteStack::with_bucket_suffix(&props(), "abc").unwrap();
        assert_eq!(bucket_suffix("blog", site.bucket_name()), Some("abc"));
        assert_eq!(bucket_suffix("docs", site.bucket_name()), None);
        assert_eq!(bucket_suffix("blog", "blog-static-site-"), None);
    }

    #[test]
    fn random_suffix_is_a_uuid() {
        let site = StaticSiteStack::new(&props()).unwrap();
        let suffix = site.bucket_name().trim_start_matches("blog-static-site-");
        assert!(uuid::Uuid::parse_str(suffix).is_ok());
    }

    #[test]
    fn domain_override_must_be_in_zone() {
        let inside = StaticSiteProps { domain_name: Some("www.example.com".into()), ..props() };
        let site = StaticSiteStack::with_bucket_suffix(&inside, "abc").unwrap();
        assert_eq!(site.domain_name(), "www.example.com");
        assert_eq!(site.record_name(), "www.example.com.");

        let outside = StaticSiteProps { domain_name: Some("www.other.org".into()), ..props() };
        assert!(matches!(
            StaticSiteStack::with_bucket_suffix(&outside, "abc"),
            Err(Error::Dns(aws_route53::Error::OutsideZone { .. }))
        ));
    }

    #[test]
    fn long_repo_names_overflow_the_bucket_name() {
        let long = StaticSiteProps { repo_name: "a-very-long-repository".into(), ..props() };
        assert!(matches!(StaticSiteStack::new(&long), Err(Error::Bucket(aws_s3::Error::InvalidBucketName { .. }))));
    }
}
