use serde_json::{json, Value};
use static_site::{StaticSiteProps, StaticSiteStack};

fn props() -> StaticSiteProps {
    StaticSiteProps {
        repo_name: "blog".into(),
        hosted_zone_name: "example.com".into(),
        hosted_zone_id: "Z0123456789".into(),
        domain_name: None,
        account: Some("123456789012".into()),
        region: Some("us-east-1".into()),
    }
}

fn synth_template() -> Value {
    let site = StaticSiteStack::with_bucket_suffix(&props(), "0000").unwrap();
    let stack = site.synth().unwrap();
    assert_eq!(stack.stack_name, "blog-static-site");
    serde_json::from_str(&stack.to_json_pretty().unwrap()).unwrap()
}

#[test]
fn template_contains_every_site_resource() {
    let template = synth_template();
    let mut types: Vec<(&str, &str)> = template["Resources"].as_object().unwrap()
        .iter()
        .map(|(id, r)| (id.as_str(), r["Type"].as_str().unwrap()))
        .collect();
    types.sort();
    assert_eq!(types, vec![
        ("AliasRecord", "AWS::Route53::RecordSet"),
        ("OAC", "AWS::CloudFront::OriginAccessControl"),
        ("SiteBucket", "AWS::S3::Bucket"),
        ("SiteBucketAutoDeleteFunction", "AWS::Lambda::Function"),
        ("SiteBucketAutoDeleteObjects", "Custom::S3AutoDeleteObjects"),
        ("SiteBucketAutoDeleteRole", "AWS::IAM::Role"),
        ("SiteBucketPolicy", "AWS::S3::BucketPolicy"),
        ("SiteCert", "AWS::CertificateManager::Certificate"),
        ("SiteDistribution", "AWS::CloudFront::Distribution"),
    ]);
    assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
    assert_eq!(template["Description"], "Static site for blog.example.com");
}

#[test]
fn bucket_is_private_and_destroyed_with_the_stack() {
    let template = synth_template();
    let bucket = &template["Resources"]["SiteBucket"];
    assert_eq!(bucket["Properties"]["BucketName"], "blog-static-site-0000");
    assert_eq!(bucket["Properties"]["PublicAccessBlockConfiguration"], json!({
        "BlockPublicAcls": true,
        "BlockPublicPolicy": true,
        "IgnorePublicAcls": true,
        "RestrictPublicBuckets": true,
    }));
    assert_eq!(bucket["DeletionPolicy"], "Delete");
    assert_eq!(bucket["UpdateReplacePolicy"], "Delete");
}

#[test]
fn only_the_distribution_may_read_the_bucket() {
    let template = synth_template();
    let policy = &template["Resources"]["SiteBucketPolicy"]["Properties"];
    assert_eq!(policy["Bucket"], json!({ "Ref": "SiteBucket" }));
    assert_eq!(policy["PolicyDocument"], json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "cloudfront.amazonaws.com" },
            "Action": "s3:GetObject",
            "Resource": { "Fn::Sub": "arn:${AWS::Partition}:s3:::${SiteBucket}/*" },
            "Condition": {
                "StringEquals": {
                    "AWS:SourceArn": {
                        "Fn::Sub": "arn:${AWS::Partition}:cloudfront::123456789012:distribution/${SiteDistribution}"
                    }
                }
            },
        }],
    }));
}

#[test]
fn distribution_serves_the_bucket_over_https() {
    let template = synth_template();
    let config = &template["Resources"]["SiteDistribution"]["Properties"]["DistributionConfig"];
    assert_eq!(config["DefaultRootObject"], "index.html");
    assert_eq!(config["Aliases"], json!(["blog.example.com"]));
    assert_eq!(config["ViewerCertificate"]["AcmCertificateArn"], json!({ "Ref": "SiteCert" }));
    assert_eq!(config["Origins"], json!([{
        "Id": "SiteBucketOrigin",
        "DomainName": { "Fn::GetAtt": ["SiteBucket", "RegionalDomainName"] },
        "S3OriginConfig": { "OriginAccessIdentity": "" },
        "OriginAccessControlId": { "Fn::GetAtt": ["OAC", "Id"] },
    }]));
    assert_eq!(config["DefaultCacheBehavior"]["ViewerProtocolPolicy"], "redirect-to-https");
    assert_eq!(config["DefaultCacheBehavior"]["CachePolicyId"], "4135ea2d-6df8-44a3-9df3-4b5a84be39ad");
    assert_eq!(config["CustomErrorResponses"], json!([{
        "ErrorCode": 404,
        "ResponseCode": 200,
        "ResponsePagePath": "/index.html",
        "ErrorCachingMinTTL": 60,
    }]));

    let oac = &template["Resources"]["OAC"]["Properties"]["OriginAccessControlConfig"];
    assert_eq!(oac["Description"], "OAC for blog site");
    assert_eq!(oac["SigningProtocol"], "sigv4");
    assert_eq!(oac["SigningBehavior"], "always");
}

#[test]
fn certificate_and_record_use_the_hosted_zone() {
    let template = synth_template();
    assert_eq!(template["Resources"]["SiteCert"]["Properties"], json!({
        "DomainName": "blog.example.com",
        "ValidationMethod": "DNS",
        "DomainValidationOptions": [{ "DomainName": "blog.example.com", "HostedZoneId": "Z0123456789" }],
    }));
    assert_eq!(template["Resources"]["AliasRecord"]["Properties"], json!({
        "HostedZoneId": "Z0123456789",
        "Name": "blog.example.com.",
        "Type": "A",
        "AliasTarget": {
            "DNSName": { "Fn::GetAtt": ["SiteDistribution", "DomainName"] },
            "HostedZoneId": "Z2FDTNDATAQYW2",
        },
    }));
}

#[test]
fn outputs_are_exported_per_repo() {
    let template = synth_template();
    assert_eq!(template["Outputs"], json!({
        "BucketNameOutput": {
            "Value": { "Ref": "SiteBucket" },
            "Export": { "Name": "blog-bucket-name" },
        },
        "CloudFrontIdOutput": {
            "Value": { "Ref": "SiteDistribution" },
            "Export": { "Name": "blog-cloudfront-id" },
        },
        "SiteUrlOutput": {
            "Value": "https://blog.example.com",
        },
    }));
}

#[test]
fn unknown_account_falls_back_to_pseudo_parameter() {
    let props = StaticSiteProps { account: None, ..props() };
    let stack = StaticSiteStack::with_bucket_suffix(&props, "0000").unwrap().synth().unwrap();
    let template = serde_json::to_value(&stack.template).unwrap();
    let condition = &template["Resources"]["SiteBucketPolicy"]["Properties"]["PolicyDocument"]["Statement"][0]["Condition"];
    assert_eq!(
        condition["StringEquals"]["AWS:SourceArn"],
        json!({ "Fn::Sub": "arn:${AWS::Partition}:cloudfront::${AWS::AccountId}:distribution/${SiteDistribution}" })
    );
}

#[test]
fn synth_writes_template_file() {
    let dir = tempfile::tempdir().unwrap();
    let stack = StaticSiteStack::with_bucket_suffix(&props(), "0000").unwrap().synth().unwrap();
    let path = stack.write_to_dir(dir.path()).unwrap();
    assert_eq!(path, dir.path().join("blog-static-site.template.json"));
}
