//! IAM policy documents.

use serde::Serialize;
use serde_json::Value;

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Principal of a resource or trust policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Principal {
    #[serde(rename = "AWS")]
    Aws(Value),
    Service(String),
    #[serde(untagged)]
    Anyone(&'static str),
}

impl Principal {
    /// `arn:aws:iam::{account}:root`
    pub fn account_root(account_id: &str) -> Self {
        Self::Aws(Value::String(format!("arn:aws:iam::{}:root", account_id)))
    }

    pub fn service(name: &str) -> Self {
        Self::Service(name.to_string())
    }

    pub fn any() -> Self {
        Self::Anyone("*")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

impl Statement {
    pub fn allow<S: AsRef<str>>(actions: &[S]) -> Self {
        Self::new(Effect::Allow, actions)
    }

    pub fn deny<S: AsRef<str>>(actions: &[S]) -> Self {
        Self::new(Effect::Deny, actions)
    }

    fn new<S: AsRef<str>>(effect: Effect, actions: &[S]) -> Self {
        Self {
            sid: None,
            effect,
            principal: None,
            action: actions.iter().map(|a| a.as_ref().to_string()).collect(),
            resource: Vec::new(),
            condition: None,
        }
    }

    pub fn sid(mut self, sid: &str) -> Self {
        self.sid = Some(sid.to_string());
        self
    }

    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn resource(mut self, resource: impl Into<Value>) -> Self {
        self.resource.push(resource.into());
        self
    }

    pub fn condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: &'static str,
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION,
            statement,
        }
    }

    /// JSON form for a template property.
    pub fn to_value(&self) -> Value {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trust_policy_shape() {
        let doc = PolicyDocument::new(vec![Statement::allow(&["sts:AssumeRole"])
            .principal(Principal::account_root("999"))]);
        assert_eq!(
            doc.to_value(),
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "AWS": "arn:aws:iam::999:root" },
                    "Action": ["sts:AssumeRole"]
                }]
            })
        );
    }

    #[test]
    fn test_service_and_any_principals() {
        let svc = serde_json::to_value(Principal::service("codebuild.amazonaws.com")).unwrap();
        assert_eq!(svc, json!({ "Service": "codebuild.amazonaws.com" }));
        assert_eq!(serde_json::to_value(Principal::any()).unwrap(), json!("*"));
    }

    #[test]
    fn test_statement_with_condition() {
        let st = Statement::deny(&["s3:*"])
            .sid("DenyInsecureTransport")
            .principal(Principal::any())
            .resource("arn:aws:s3:::b/*")
            .condition(json!({ "Bool": { "aws:SecureTransport": "false" } }));
        let v = serde_json::to_value(&st).unwrap();
        assert_eq!(v["Sid"], "DenyInsecureTransport");
        assert_eq!(v["Effect"], "Deny");
        assert_eq!(v["Resource"][0], "arn:aws:s3:::b/*");
        assert_eq!(v["Condition"]["Bool"]["aws:SecureTransport"], "false");
    }
}
