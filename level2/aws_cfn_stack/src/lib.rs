use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

mod intrinsics;
pub use intrinsics::*;
mod runtime;
pub use runtime::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid stack name {name}\n{reason}")]
    InvalidStackName { name: String, reason: &'static str },
    #[error("Validation failed on resource '{resource}'\n{reason}")]
    Validation { resource: String, reason: String },
    #[error("Invalid resource name {name:?}\n{reason}")]
    InvalidLogicalId { name: String, reason: &'static str },
    #[error("Resource '{0}' was defined more than once")]
    DuplicateResource(String),
    #[error("Output '{0}' was defined more than once")]
    DuplicateOutput(String),
    #[error("Resource '{resource}' depends on '{missing}' which is not part of the stack")]
    UnknownDependency { resource: String, missing: String },
    #[error("Failed to serialize template")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write {path:?}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("Failed to deploy stack {stack}\n{reason}")]
    Deploy { stack: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// anything that can be placed in the Resources section of a template.
pub trait CfnResource {
    /// the cloudformation type, eg: `AWS::S3::Bucket`
    fn type_string(&self) -> &'static str;
    fn properties(&self) -> serde_json::Result<Value>;
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

pub struct Resource {
    pub name: String,
    pub properties: Box<dyn CfnResource>,
    pub deletion_policy: Option<DeletionPolicy>,
    pub update_replace_policy: Option<DeletionPolicy>,
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new<S: Into<String>, R: CfnResource + 'static>(name: S, properties: R) -> Self {
        Self {
            name: name.into(),
            properties: Box::new(properties) as _,
            deletion_policy: None,
            update_replace_policy: None,
            depends_on: vec![],
        }
    }

    /// sets both the DeletionPolicy and the UpdateReplacePolicy.
    pub fn removal_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self.update_replace_policy = Some(policy);
        self
    }

    pub fn depends_on<S: Into<String>>(mut self, logical_id: S) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedResource {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(rename = "DeletionPolicy", default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    #[serde(rename = "UpdateReplacePolicy", default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<DeletionPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputExport {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOutput {
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Value")]
    pub value: Value,
    #[serde(rename = "Export", default, skip_serializing_if = "Option::is_none")]
    pub export: Option<OutputExport>,
}

impl ResourceOutput {
    pub fn new(value: Value) -> Self {
        Self { description: None, value, export: None }
    }

    pub fn export_name<S: Into<String>>(mut self, name: S) -> Self {
        self.export = Some(OutputExport { name: name.into() });
        self
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedTemplate {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, SavedResource>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, ResourceOutput>,
}

impl Default for SavedTemplate {
    fn default() -> Self {
        Self {
            version: "2010-09-09".to_string(),
            description: None,
            resources: Default::default(),
            outputs: Default::default(),
        }
    }
}

#[derive(Default)]
pub struct Input {
    pub stack_name: String,
    /// optional template description.
    pub description: String,
    pub resources: Vec<Resource>,
    pub outputs: Vec<(String, ResourceOutput)>,
    /// the region the stack is meant for, if known.
    /// modules can use this to warn about region specific requirements.
    pub region: Option<String>,
}

impl Input {
    pub fn new<S: Into<String>>(stack_name: S) -> Self {
        Self {
            stack_name: stack_name.into(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, resource: Resource) {
        info!(logical_id = %resource.name, ty = resource.properties.type_string(), "adding resource");
        self.resources.push(resource);
    }

    pub fn add_output<S: Into<String>>(&mut self, name: S, output: ResourceOutput) {
        self.outputs.push((name.into(), output));
    }

    pub fn into_template(self) -> Result<SavedTemplate> {
        let mut out_template = SavedTemplate::default();
        if !self.description.is_empty() {
            out_template.description = Some(self.description);
        }
        let known: HashSet<&str> = self.resources.iter().map(|r| r.name.as_str()).collect();
        for resource in self.resources.iter() {
            validate_logical_id(&resource.name)?;
            resource.properties.validate().map_err(|reason| Error::Validation {
                resource: resource.name.clone(),
                reason,
            })?;
            if let Some(missing) = resource.depends_on.iter().find(|d| !known.contains(d.as_str())) {
                return Err(Error::UnknownDependency {
                    resource: resource.name.clone(),
                    missing: missing.clone(),
                });
            }
            let saved_resource = SavedResource {
                ty: resource.properties.type_string().to_string(),
                properties: resource.properties.properties()?,
                depends_on: resource.depends_on.clone(),
                deletion_policy: resource.deletion_policy,
                update_replace_policy: resource.update_replace_policy,
            };
            if out_template.resources.insert(resource.name.clone(), saved_resource).is_some() {
                return Err(Error::DuplicateResource(resource.name.clone()));
            }
        }
        for (name, output) in self.outputs {
            if out_template.outputs.contains_key(&name) {
                return Err(Error::DuplicateOutput(name));
            }
            out_template.outputs.insert(name, output);
        }
        Ok(out_template)
    }
}

/// logical ids are 1 to 255 alphanumeric characters.
pub fn validate_logical_id(name: &str) -> Result<()> {
    let invalid = |reason| Err(Error::InvalidLogicalId { name: name.to_string(), reason });
    if name.is_empty() {
        return invalid("Must contain at least 1 character");
    }
    if name.len() > 255 {
        return invalid("must be less than 255 characters");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return invalid("Must contain only alphanumeric characters [A-Za-z0-9]");
    }
    Ok(())
}

/// A stack name can contain only alphanumeric characters (case sensitive) and hyphens.
/// It must start with an alphabetical character and can't be longer than 128 characters.
pub fn validate_stack_name(stack_name: &str) -> Result<String> {
    let restriction = "Must only consist of alphanumeric characters and hyphens, Must start with an alphabetical character, and cannot be longer than 128 characters.";
    let invalid = || Error::InvalidStackName { name: stack_name.to_string(), reason: restriction };
    if stack_name.is_empty() || stack_name.len() > 128 {
        return Err(invalid());
    }
    for (i, c) in stack_name.chars().enumerate() {
        if i == 0 && !c.is_ascii_alphabetic() {
            return Err(invalid());
        }
        if !c.is_ascii_alphanumeric() && c != '-' {
            return Err(invalid());
        }
    }
    Ok(stack_name.to_string())
}

#[derive(Debug)]
pub struct SynthesizedStack {
    pub stack_name: String,
    pub region: Option<String>,
    pub template: SavedTemplate,
}

impl SynthesizedStack {
    /// we make it pretty so if a user needs to look at the stack in Cfn console, it looks nice
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.template)?)
    }

    pub fn template_file_name(&self) -> String {
        format!("{}.template.json", self.stack_name)
    }

    /// writes `<dir>/<stack_name>.template.json`, creating `dir` if needed.
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| Error::Io { path: dir.to_path_buf(), source })?;
        let path = dir.join(self.template_file_name());
        let body = self.to_json_pretty()?;
        std::fs::write(&path, body).map_err(|source| Error::Io { path: path.clone(), source })?;
        info!(path = %path.display(), "wrote template");
        Ok(path)
    }
}

pub fn synth(input: Input) -> Result<SynthesizedStack> {
    let stack_name = validate_stack_name(&input.stack_name)?;
    let region = input.region.clone();
    let template = input.into_template()?;
    debug!(stack_name = %stack_name, resources = template.resources.len(), "synthesized template");
    Ok(SynthesizedStack { stack_name, region, template })
}
