use aws_cfn_stack::{create_policy_doc, get_att, get_ref, CfnResource, PolicyStatement, Resource};
use serde::Serialize;
use serde_json::{json, Value};

use super::{arn_for_objects, bucket_arn};

/// managed policy that lets a lambda write its own logs.
pub const BASIC_EXECUTION_ROLE_ARN: &str = "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// empties the bucket when cloudformation sends a Delete request.
/// every other request type is acknowledged without doing anything.
const CLEANUP_HANDLER: &str = r#"import boto3
import cfnresponse

def handler(event, context):
    status = cfnresponse.SUCCESS
    if event['RequestType'] == 'Delete':
        try:
            bucket = boto3.resource('s3').Bucket(event['ResourceProperties']['BucketName'])
            bucket.objects.all().delete()
        except Exception as err:
            print(f'Error deleting objects from S3 bucket: {err}')
            status = cfnresponse.FAILED
    cfnresponse.send(event, context, status, {})
"#;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RolePolicy {
    pub policy_name: String,
    pub policy_document: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnRole {
    pub description: String,
    pub assume_role_policy_document: Value,
    pub managed_policy_arns: Vec<String>,
    pub policies: Vec<RolePolicy>,
}

impl CfnResource for CfnRole {
    fn type_string(&self) -> &'static str {
        "AWS::IAM::Role"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionCode {
    pub zip_file: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnFunction {
    pub description: String,
    pub runtime: String,
    pub handler: String,
    pub role: Value,
    pub timeout: u32,
    pub code: FunctionCode,
}

impl CfnResource for CfnFunction {
    fn type_string(&self) -> &'static str {
        "AWS::Lambda::Function"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

pub struct CleanupResource {
    pub lambda_logical_id: String,
    pub bucket_logical_id: String,
}

impl CfnResource for CleanupResource {
    fn type_string(&self) -> &'static str {
        "Custom::S3AutoDeleteObjects"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        Ok(json!({
            "ServiceToken": get_att(&self.lambda_logical_id, "Arn"),
            "BucketName": get_ref(&self.bucket_logical_id),
        }))
    }
}

pub fn create_assume_role_policy_doc() -> Value {
    let statement = PolicyStatement::allow()
        .action("sts:AssumeRole")
        .service_principal("lambda.amazonaws.com");
    create_policy_doc(&[statement])
}

/// pushes the role, function and custom resource that empty the bucket
/// before cloudformation deletes it. Returns the custom resource's logical id.
pub fn add_cleanup_resources(logical_bucket_name: &str, stackinp: &mut aws_cfn_stack::Input) -> String {
    let logical_role_name = format!("{logical_bucket_name}AutoDeleteRole");
    let logical_fn_name = format!("{logical_bucket_name}AutoDeleteFunction");
    let logical_cleanup_resource_name = format!("{logical_bucket_name}AutoDeleteObjects");

    let policy = RolePolicy {
        policy_name: format!("{logical_bucket_name}-auto-delete"),
        policy_document: create_policy_doc(&[
            PolicyStatement::allow()
                .action("s3:ListBucket")
                .resource(bucket_arn(logical_bucket_name)),
            PolicyStatement::allow()
                .action("s3:DeleteObject")
                .resource(arn_for_objects(logical_bucket_name, "*")),
        ]),
    };
    let role = CfnRole {
        description: format!("auto generated cleanup role for {logical_bucket_name}"),
        assume_role_policy_document: create_assume_role_policy_doc(),
        managed_policy_arns: vec![BASIC_EXECUTION_ROLE_ARN.to_string()],
        policies: vec![policy],
    };
    let cleanup_function = CfnFunction {
        description: format!("Empties {logical_bucket_name} when the stack is deleted"),
        runtime: "python3.12".to_string(),
        handler: "index.handler".to_string(),
        role: get_att(&logical_role_name, "Arn"),
        timeout: 900,
        code: FunctionCode { zip_file: CLEANUP_HANDLER.to_string() },
    };
    let cleanup = CleanupResource {
        lambda_logical_id: logical_fn_name.clone(),
        bucket_logical_id: logical_bucket_name.to_string(),
    };

    stackinp.push(Resource::new(&logical_role_name, role));
    stackinp.push(Resource::new(&logical_fn_name, cleanup_function));
    stackinp.push(Resource::new(&logical_cleanup_resource_name, cleanup).depends_on(logical_bucket_name));
    logical_cleanup_resource_name
}
