use aws_cfn_stack::{CfnResource, Resource};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// this is static for all of AWS for aliases to CloudFront
/// see https://docs.aws.amazon.com/AWSCloudFormation/latest/UserGuide/aws-properties-route53-aliastarget.html#cfn-route53-aliastarget-hostedzoneid
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Hosted zone needs both an id and a name, got id='{id}' name='{name}'")]
    IncompleteHostedZone { id: String, name: String },
    #[error("Route53 record must have a name. Example: mysubdomain or mysubdomain.mywebsite.com")]
    MissingRecordName,
    #[error("Record {record} is not inside hosted zone {zone}")]
    OutsideZone { record: String, zone: String },
}

/// a hosted zone that already exists. Looking one up this way never
/// creates a resource, it only records the attributes other resources need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    pub hosted_zone_id: String,
    /// without the trailing dot, eg: example.com
    pub zone_name: String,
}

impl HostedZone {
    pub fn from_hosted_zone_attributes(hosted_zone_id: &str, zone_name: &str) -> Result<Self, Error> {
        let id = hosted_zone_id.trim().trim_start_matches("/hostedzone/");
        let name = zone_name.trim().trim_end_matches('.');
        if id.is_empty() || name.is_empty() {
            return Err(Error::IncompleteHostedZone {
                id: hosted_zone_id.to_string(),
                name: zone_name.to_string(),
            });
        }
        Ok(Self {
            hosted_zone_id: id.to_string(),
            zone_name: name.to_ascii_lowercase(),
        })
    }

    /// turns a relative label (`blog`) or a name inside this zone
    /// (`blog.example.com`) into the fully qualified `blog.example.com.`
    pub fn qualify(&self, record_name: &str) -> Result<String, Error> {
        let name = record_name.trim().trim_end_matches('.').to_ascii_lowercase();
        if name.is_empty() {
            return Err(Error::MissingRecordName);
        }
        if name == self.zone_name || name.ends_with(&format!(".{}", self.zone_name)) {
            return Ok(format!("{name}."));
        }
        if record_name.trim().ends_with('.') {
            // an explicit fqdn that does not belong to this zone
            return Err(Error::OutsideZone { record: record_name.to_string(), zone: self.zone_name.clone() });
        }
        Ok(format!("{name}.{}.", self.zone_name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordTarget {
    /// alias to a cloudfront distribution in the same stack
    CloudFrontTarget(String),
}

impl RecordTarget {
    fn alias_target(&self) -> AliasTarget {
        match self {
            RecordTarget::CloudFrontTarget(logical_distr_name) => AliasTarget {
                dns_name: aws_cfn_stack::get_att(logical_distr_name, "DomainName"),
                hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AliasTarget {
    #[serde(rename = "DNSName")]
    pub dns_name: Value,
    #[serde(rename = "HostedZoneId")]
    pub hosted_zone_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnRecordSet {
    pub hosted_zone_id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    pub alias_target: AliasTarget,
}

impl CfnResource for CfnRecordSet {
    fn type_string(&self) -> &'static str {
        "AWS::Route53::RecordSet"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

pub struct ARecord {
    pub logical_id: String,
    pub zone: HostedZone,
    /// either relative to the zone (`blog`) or a name inside it (`blog.example.com`)
    pub record_name: String,
    pub target: RecordTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outputs {
    /// fully qualified, with trailing dot
    pub record_name: String,
}

pub fn config(record: &ARecord, stackinp: &mut aws_cfn_stack::Input) -> Result<Outputs, Error> {
    let record_name = record.zone.qualify(&record.record_name)?;
    let record_set = CfnRecordSet {
        hosted_zone_id: record.zone.hosted_zone_id.clone(),
        name: record_name.clone(),
        record_type: "A".to_string(),
        alias_target: record.target.alias_target(),
    };
    info!(record = %record_name, zone = %record.zone.zone_name, "adding alias record");
    stackinp.push(Resource::new(&record.logical_id, record_set));
    Ok(Outputs { record_name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn zone() -> HostedZone {
        HostedZone::from_hosted_zone_attributes("/hostedzone/Z0123", "Example.com.").unwrap()
    }

    #[test]
    fn zone_attributes_are_normalized() {
        let zone = zone();
        assert_eq!(zone.hosted_zone_id, "Z0123");
        assert_eq!(zone.zone_name, "example.com");
        assert!(HostedZone::from_hosted_zone_attributes("", "example.com").is_err());
        assert!(HostedZone::from_hosted_zone_attributes("Z1", "").is_err());
    }

    #[test]
    fn record_names_are_qualified() {
        let zone = zone();
        assert_eq!(zone.qualify("blog").unwrap(), "blog.example.com.");
        assert_eq!(zone.qualify("blog.example.com").unwrap(), "blog.example.com.");
        assert_eq!(zone.qualify("blog.example.com.").unwrap(), "blog.example.com.");
        assert_eq!(zone.qualify("example.com").unwrap(), "example.com.");
        assert!(matches!(zone.qualify("blog.other.org."), Err(Error::OutsideZone { .. })));
        assert!(matches!(zone.qualify(""), Err(Error::MissingRecordName)));
    }

    #[test]
    fn alias_record_points_at_distribution() {
        let mut stack = aws_cfn_stack::Input::new("test");
        let record = ARecord {
            logical_id: "AliasRecord".into(),
            zone: zone(),
            record_name: "blog".into(),
            target: RecordTarget::CloudFrontTarget("SiteDistribution".into()),
        };
        let outputs = config(&record, &mut stack).unwrap();
        assert_eq!(outputs.record_name, "blog.example.com.");
        let template = stack.into_template().unwrap();
        assert_eq!(template.resources["AliasRecord"].properties, json!({
            "HostedZoneId": "Z0123",
            "Name": "blog.example.com.",
            "Type": "A",
            "AliasTarget": {
                "DNSName": { "Fn::GetAtt": ["SiteDistribution", "DomainName"] },
                "HostedZoneId": "Z2FDTNDATAQYW2",
            },
        }));
    }
}
