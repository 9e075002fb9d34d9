use crate::db::EntityStore;
use crate::notify::Notifier;
use crate::types::{ActionInfo, AppError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// What a handler knows about the step it runs for
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub execution_id: String,
    pub scope_id: String,
    pub step_id: String,
    pub variables: HashMap<String, Value>,
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The `action_type` this handler answers to
    fn action_type(&self) -> &str;
    fn description(&self) -> &str;
    async fn execute(&self, ctx: &ActionContext, params: &HashMap<String, Value>)
        -> Result<Value>;
}

pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
    strict: bool,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            strict: false,
        }
    }

    /// Create a registry with the built-in handlers
    pub fn with_default_actions(
        entities: Arc<dyn EntityStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        use super::builtin::{
            AddTagAction, ArchiveDocumentAction, CreateTaskAction, SendNotificationAction,
            SetVariableAction,
        };

        let mut registry = Self::new();
        registry.register(Arc::new(CreateTaskAction::new(entities.clone())));
        registry.register(Arc::new(SendNotificationAction::new(notifier)));
        registry.register(Arc::new(AddTagAction::new(entities.clone())));
        registry.register(Arc::new(ArchiveDocumentAction::new(entities)));
        registry.register(Arc::new(SetVariableAction));
        registry
    }

    /// Reject unknown action types instead of treating them as successful
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        self.handlers
            .insert(handler.action_type().to_string(), handler);
    }

    /// Run the handler for `action_type` with templated parameters.
    ///
    /// An unregistered type succeeds with `{"executed": true}` unless the
    /// registry is strict.
    pub async fn execute(
        &self,
        action_type: &str,
        ctx: &ActionContext,
        params: &HashMap<String, Value>,
    ) -> Result<Value> {
        let Some(handler) = self.handlers.get(action_type) else {
            if self.strict {
                return Err(AppError::ActionExecution(format!(
                    "Unknown action type: {}",
                    action_type
                )));
            }
            tracing::debug!(action_type, step_id = %ctx.step_id, "No handler registered, skipping");
            return Ok(json!({ "executed": true }));
        };

        let params = render_params(params, &ctx.variables);
        handler.execute(ctx, &params).await
    }

    /// Get a list of all registered action types
    pub fn action_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Registered handlers with their descriptions, sorted by type
    pub fn describe(&self) -> Vec<ActionInfo> {
        let mut infos: Vec<ActionInfo> = self
            .handlers
            .values()
            .map(|h| ActionInfo {
                action_type: h.action_type().to_string(),
                description: h.description().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.action_type.cmp(&b.action_type));
        infos
    }

    pub fn has_action(&self, action_type: &str) -> bool {
        self.handlers.contains_key(action_type)
    }
}

// ============= Parameter templating =============

/// Substitute `{{name}}` placeholders in every string parameter
pub fn render_params(
    params: &HashMap<String, Value>,
    variables: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    params
        .iter()
        .map(|(k, v)| (k.clone(), render_value(v, variables)))
        .collect()
}

fn render_value(value: &Value, variables: &HashMap<String, Value>) -> Value {
    match value {
        Value::String(s) => render_string(s, variables),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, variables)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn render_string(template: &str, variables: &HashMap<String, Value>) -> Value {
    // A string that is exactly one placeholder takes the variable's JSON value
    if let Some(name) = whole_placeholder(template) {
        if let Some(v) = variables.get(name) {
            return v.clone();
        }
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return Value::String(out);
        };
        let name = after[..end].trim();
        match variables.get(name) {
            Some(Value::String(s)) => out.push_str(s),
            Some(v) => out.push_str(&v.to_string()),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Value::String(out)
}

fn whole_placeholder(template: &str) -> Option<&str> {
    let inner = template.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ActionHandler for Echo {
        fn action_type(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Returns its parameters"
        }
        async fn execute(
            &self,
            _ctx: &ActionContext,
            params: &HashMap<String, Value>,
        ) -> Result<Value> {
            Ok(json!(params))
        }
    }

    fn ctx(vars: Value) -> ActionContext {
        ActionContext {
            execution_id: "exec-1".to_string(),
            scope_id: "doc-1".to_string(),
            step_id: "s1".to_string(),
            variables: serde_json::from_value(vars).unwrap(),
        }
    }

    #[test]
    fn test_registry_creation() {
        let registry = ActionRegistry::new();
        assert!(registry.action_types().is_empty());
        assert!(!registry.is_strict());
    }

    #[tokio::test]
    async fn test_unknown_action_is_permissive() {
        let registry = ActionRegistry::new();
        let result = registry
            .execute("launch_rocket", &ctx(json!({})), &HashMap::new())
            .await
            .unwrap();
        assert_eq!(result, json!({ "executed": true }));
    }

    #[tokio::test]
    async fn test_unknown_action_fails_when_strict() {
        let registry = ActionRegistry::new().strict(true);
        let result = registry
            .execute("launch_rocket", &ctx(json!({})), &HashMap::new())
            .await;
        assert!(matches!(result, Err(AppError::ActionExecution(_))));
    }

    #[tokio::test]
    async fn test_params_are_templated_before_dispatch() {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(Echo));
        assert!(registry.has_action("echo"));

        let params: HashMap<String, Value> = serde_json::from_value(json!({
            "title": "Review {{doc}} for {{owner}}",
            "amount": "{{amount}}",
            "missing": "{{nope}}",
            "fixed": 3
        }))
        .unwrap();

        let out = registry
            .execute(
                "echo",
                &ctx(json!({"doc": "Q3 report", "owner": "bob", "amount": 1200})),
                &params,
            )
            .await
            .unwrap();

        assert_eq!(out["title"], "Review Q3 report for bob");
        assert_eq!(out["amount"], 1200);
        assert_eq!(out["missing"], "{{nope}}");
        assert_eq!(out["fixed"], 3);
    }

    #[test]
    fn test_render_handles_unterminated_placeholder() {
        let vars: HashMap<String, Value> = HashMap::new();
        assert_eq!(render_string("a {{b", &vars), json!("a {{b"));
        assert_eq!(render_string("no placeholders", &vars), json!("no placeholders"));
    }
}
