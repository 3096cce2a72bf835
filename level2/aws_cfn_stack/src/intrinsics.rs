use serde_json::{json, Map, Value};

pub const PSEUDO_ACCOUNT_ID: &str = "AWS::AccountId";
pub const PSEUDO_PARTITION: &str = "AWS::Partition";

/// `{ "Ref": logical_id }`
pub fn get_ref(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{ "Fn::GetAtt": [logical_id, attribute] }`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{ "Fn::Sub": template }`. Variables are written as `${LogicalId}`
/// or `${AWS::AccountId}` inside the template string.
pub fn sub<S: AsRef<str>>(template: S) -> Value {
    json!({ "Fn::Sub": template.as_ref() })
}

pub fn join<S: AsRef<str>>(separator: S, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [separator.as_ref(), parts] })
}

/// cloudformation logical ids may only contain alphanumeric characters.
/// concatenates the given parts and drops everything else.
pub fn logical_id(parts: &[&str]) -> String {
    parts.iter()
        .flat_map(|p| p.chars())
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// A single IAM policy statement. Actions and resources serialize as a plain
/// string when there is exactly one, and as a list otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub effect: String,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
    pub principal: Option<Value>,
    pub condition: Option<Value>,
}

impl Default for PolicyStatement {
    fn default() -> Self {
        Self {
            effect: "Allow".to_string(),
            actions: vec![],
            resources: vec![],
            principal: None,
            condition: None,
        }
    }
}

impl PolicyStatement {
    pub fn allow() -> Self {
        Self::default()
    }

    pub fn action<S: Into<String>>(mut self, action: S) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn resource(mut self, resource: Value) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn service_principal<S: AsRef<str>>(mut self, service: S) -> Self {
        self.principal = Some(json!({ "Service": service.as_ref() }));
        self
    }

    pub fn condition(mut self, operator: &str, key: &str, value: Value) -> Self {
        let condition = self.condition.get_or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(operators) = condition {
            let entry = operators.entry(operator.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(keys) = entry {
                keys.insert(key.to_string(), value);
            }
        }
        self
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("Effect".to_string(), Value::String(self.effect.clone()));
        if let Some(principal) = &self.principal {
            map.insert("Principal".to_string(), principal.clone());
        }
        map.insert("Action".to_string(), one_or_many(self.actions.iter().map(|a| Value::String(a.clone())).collect()));
        // trust policies carry no Resource element
        if !self.resources.is_empty() {
            map.insert("Resource".to_string(), one_or_many(self.resources.clone()));
        }
        if let Some(condition) = &self.condition {
            map.insert("Condition".to_string(), condition.clone());
        }
        Value::Object(map)
    }
}

fn one_or_many(mut values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(values)
    }
}

pub fn create_policy_doc(statements: &[PolicyStatement]) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": statements.iter().map(|s| s.to_value()).collect::<Vec<_>>(),
    })
}
