use aws_cfn_stack::get_att;

use super::{Origin, S3OriginConfig};

/// an origin that reads from a private S3 bucket through an origin access control.
/// the origin domain is the bucket's regional domain name, which avoids the
/// redirects cloudfront would otherwise hit right after the bucket is created.
pub fn s3_bucket_origin(logical_bucket_name: &str, logical_oac_name: &str) -> Origin {
    Origin {
        id: format!("{logical_bucket_name}Origin"),
        domain_name: get_att(logical_bucket_name, "RegionalDomainName"),
        s3_origin_config: Some(S3OriginConfig::default()),
        origin_access_control_id: Some(get_att(logical_oac_name, "Id")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn s3_origin_uses_oac_not_oai() {
        let origin = s3_bucket_origin("SiteBucket", "OAC");
        assert_eq!(serde_json::to_value(&origin).unwrap(), json!({
            "Id": "SiteBucketOrigin",
            "DomainName": { "Fn::GetAtt": ["SiteBucket", "RegionalDomainName"] },
            "S3OriginConfig": { "OriginAccessIdentity": "" },
            "OriginAccessControlId": { "Fn::GetAtt": ["OAC", "Id"] },
        }));
    }
}
