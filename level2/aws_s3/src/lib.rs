//! this is a higher level module for creating S3 buckets that back a website
//! served through cloudfront. The bucket itself is never public; read access
//! is granted with bucket policy statements instead.
//!
//! In addition to creating an S3 bucket, by default we create custom cloudformation resources
//! for cleanup. That is: a lambda function will be created that will delete the contents
//! of this S3 bucket when the cloudformation stack gets deleted. This enables easy teardown.
//! See the input section to customize this behavior.

use aws_cfn_stack::{get_att, sub, CfnResource, DeletionPolicy, PolicyStatement, Resource, PSEUDO_PARTITION};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

mod cleanup;
pub use cleanup::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid S3 bucket name '{name}': {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("Cannot use auto_delete_objects on bucket '{0}' unless its removal policy is Delete")]
    AutoDeleteRequiresDestroy(String),
    #[error("Bucket policy for '{0}' needs at least one statement")]
    EmptyPolicy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockPublicAccess {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

impl BlockPublicAccess {
    pub const BLOCK_ALL: BlockPublicAccess = BlockPublicAccess {
        block_public_acls: true,
        block_public_policy: true,
        ignore_public_acls: true,
        restrict_public_buckets: true,
    };
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnBucket {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_access_block_configuration: Option<BlockPublicAccess>,
}

impl CfnResource for CfnBucket {
    fn type_string(&self) -> &'static str {
        "AWS::S3::Bucket"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
    fn validate(&self) -> Result<(), String> {
        match &self.bucket_name {
            Some(name) => validate_bucket_name(name).map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnBucketPolicy {
    pub bucket: Value,
    pub policy_document: Value,
}

impl CfnResource for CfnBucketPolicy {
    fn type_string(&self) -> &'static str {
        "AWS::S3::BucketPolicy"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

pub struct Input {
    /// the logical id of the bucket within the template.
    pub logical_id: String,
    /// the physical bucket name. if left empty, cloudformation
    /// generates one based on the logical id.
    pub bucket_name: String,
    /// by default every form of public access is blocked.
    pub block_public_access: Option<BlockPublicAccess>,
    /// By default, buckets are retained when the stack is deleted,
    /// matching cloudformation's own default.
    pub removal_policy: DeletionPolicy,
    /// creates a cleanup resource that empties the bucket on stack deletion.
    /// this includes:
    /// - a cloudformation custom resource
    /// - a lambda function that will perform the cleanup
    /// - a role for the lambda function that allows it to cleanup the S3 bucket.
    ///
    /// Without a cleanup resource, deleting a stack with an S3 bucket that is not empty will fail.
    /// Requires removal_policy to be Delete.
    pub auto_delete_objects: bool,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            logical_id: "Bucket".to_string(),
            bucket_name: String::new(),
            block_public_access: Some(BlockPublicAccess::BLOCK_ALL),
            removal_policy: DeletionPolicy::Retain,
            auto_delete_objects: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outputs {
    /// the logical name of the resource in cloudformation.
    /// Reference this value in other modules, for example
    /// pointing a cloudfront distribution to this bucket.
    pub logical_bucket_name: String,
    /// logical id of the cleanup custom resource, if one was created.
    pub logical_cleanup_name: Option<String>,
}

/// bucket naming rules from
/// https://docs.aws.amazon.com/AmazonS3/latest/userguide/bucketnamingrules.html
pub fn validate_bucket_name(name: &str) -> Result<(), Error> {
    let invalid = |reason: &str| Err(Error::InvalidBucketName {
        name: name.to_string(),
        reason: reason.to_string(),
    });
    if name.len() < 3 || name.len() > 63 {
        return invalid("must be between 3 and 63 characters long");
    }
    if !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-') {
        return invalid("may only contain lowercase letters, digits, periods and hyphens");
    }
    let is_edge_ok = |c: Option<char>| matches!(c, Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit());
    if !is_edge_ok(name.chars().next()) || !is_edge_ok(name.chars().last()) {
        return invalid("must begin and end with a letter or number");
    }
    if name.contains("..") {
        return invalid("must not contain two adjacent periods");
    }
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() == 4 && parts.iter().all(|p| p.parse::<u8>().is_ok()) {
        return invalid("must not be formatted as an IP address");
    }
    Ok(())
}

/// `arn:<partition>:s3:::<bucket>/<pattern>`
pub fn arn_for_objects(logical_bucket_name: &str, pattern: &str) -> Value {
    sub(format!("arn:${{{PSEUDO_PARTITION}}}:s3:::${{{logical_bucket_name}}}/{pattern}"))
}

pub fn bucket_arn(logical_bucket_name: &str) -> Value {
    get_att(logical_bucket_name, "Arn")
}

pub fn config(myinput: &Input, stackinp: &mut aws_cfn_stack::Input) -> Result<Outputs, Error> {
    let logical_bucket_name = myinput.logical_id.clone();
    let bucket_name = if myinput.bucket_name.is_empty() {
        None
    } else {
        validate_bucket_name(&myinput.bucket_name)?;
        Some(myinput.bucket_name.clone())
    };
    if myinput.auto_delete_objects && myinput.removal_policy != DeletionPolicy::Delete {
        return Err(Error::AutoDeleteRequiresDestroy(logical_bucket_name));
    }
    let bucket = CfnBucket {
        bucket_name,
        public_access_block_configuration: myinput.block_public_access,
    };
    stackinp.push(Resource::new(&logical_bucket_name, bucket).removal_policy(myinput.removal_policy));

    let logical_cleanup_name = if myinput.auto_delete_objects {
        Some(add_cleanup_resources(&logical_bucket_name, stackinp))
    } else {
        None
    };
    Ok(Outputs { logical_bucket_name, logical_cleanup_name })
}

/// attaches a bucket policy holding the given statements to the bucket.
/// Returns the logical id of the policy.
pub fn add_to_resource_policy(
    logical_bucket_name: &str,
    statements: &[PolicyStatement],
    stackinp: &mut aws_cfn_stack::Input,
) -> Result<String, Error> {
    if statements.is_empty() {
        return Err(Error::EmptyPolicy(logical_bucket_name.to_string()));
    }
    let bucket_policy = CfnBucketPolicy {
        bucket: aws_cfn_stack::get_ref(logical_bucket_name),
        policy_document: aws_cfn_stack::create_policy_doc(statements),
    };
    let logical_policy_name = format!("{logical_bucket_name}Policy");
    info!(bucket = %logical_bucket_name, statements = statements.len(), "adding bucket policy");
    stackinp.push(Resource::new(&logical_policy_name, bucket_policy));
    Ok(logical_policy_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bucket_names_follow_s3_rules() {
        assert!(validate_bucket_name("my-site-static-site-1234").is_ok());
        assert!(validate_bucket_name("a.b.c").is_ok());
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name(&"a".repeat(64)).is_err());
        assert!(validate_bucket_name("MySite").is_err());
        assert!(validate_bucket_name("-site").is_err());
        assert!(validate_bucket_name("site-").is_err());
        assert!(validate_bucket_name("my..site").is_err());
        assert!(validate_bucket_name("my_site").is_err());
        assert!(validate_bucket_name("192.168.5.4").is_err());
    }

    #[test]
    fn private_bucket_with_removal_policy() {
        let mut stack = aws_cfn_stack::Input::new("test");
        let input = Input {
            logical_id: "SiteBucket".into(),
            bucket_name: "site-bucket".into(),
            removal_policy: DeletionPolicy::Delete,
            ..Default::default()
        };
        let outputs = config(&input, &mut stack).unwrap();
        assert_eq!(outputs.logical_bucket_name, "SiteBucket");
        assert_eq!(outputs.logical_cleanup_name, None);
        let template = stack.into_template().unwrap();
        let bucket = &template.resources["SiteBucket"];
        assert_eq!(bucket.ty, "AWS::S3::Bucket");
        assert_eq!(bucket.deletion_policy, Some(DeletionPolicy::Delete));
        assert_eq!(bucket.properties, json!({
            "BucketName": "site-bucket",
            "PublicAccessBlockConfiguration": {
                "BlockPublicAcls": true,
                "BlockPublicPolicy": true,
                "IgnorePublicAcls": true,
                "RestrictPublicBuckets": true,
            }
        }));
    }

    #[test]
    fn auto_delete_needs_delete_policy() {
        let mut stack = aws_cfn_stack::Input::new("test");
        let input = Input { auto_delete_objects: true, ..Default::default() };
        assert!(matches!(config(&input, &mut stack), Err(Error::AutoDeleteRequiresDestroy(_))));
    }

    #[test]
    fn auto_delete_adds_cleanup_trio() {
        let mut stack = aws_cfn_stack::Input::new("test");
        let input = Input {
            logical_id: "SiteBucket".into(),
            removal_policy: DeletionPolicy::Delete,
            auto_delete_objects: true,
            ..Default::default()
        };
        let outputs = config(&input, &mut stack).unwrap();
        let cleanup_name = outputs.logical_cleanup_name.unwrap();
        let template = stack.into_template().unwrap();
        assert_eq!(template.resources.len(), 4);
        let cleanup = &template.resources[&cleanup_name];
        assert_eq!(cleanup.ty, "Custom::S3AutoDeleteObjects");
        assert_eq!(cleanup.properties["BucketName"], json!({ "Ref": "SiteBucket" }));
        assert_eq!(cleanup.depends_on, vec!["SiteBucket".to_string()]);
    }

    #[test]
    fn resource_policy_targets_bucket() {
        let mut stack = aws_cfn_stack::Input::new("test");
        let stmt = PolicyStatement::allow()
            .action("s3:GetObject")
            .resource(arn_for_objects("SiteBucket", "*"));
        let name = add_to_resource_policy("SiteBucket", &[stmt], &mut stack).unwrap();
        assert_eq!(name, "SiteBucketPolicy");
        let template = stack.into_template().unwrap();
        let policy = &template.resources["SiteBucketPolicy"];
        assert_eq!(policy.properties["Bucket"], json!({ "Ref": "SiteBucket" }));
        assert_eq!(
            policy.properties["PolicyDocument"]["Statement"][0]["Resource"],
            json!({ "Fn::Sub": "arn:${AWS::Partition}:s3:::${SiteBucket}/*" })
        );
        assert!(add_to_resource_policy("SiteBucket", &[], &mut aws_cfn_stack::Input::new("x")).is_err());
    }
}
