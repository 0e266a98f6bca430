// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by adapter traits and the Crambot components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Intent parameters as extracted by the classifier.
pub type Params = serde_json::Map<String, Value>;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Transport,
    Storage,
    Cache,
    Classifier,
    BusinessApi,
    Observability,
}

// --- Inbound messages ---

/// Which bot persona an event belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Admin,
    Parent,
}

/// Messaging platform an event arrived from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Telegram,
}

/// Kind of chat the event happened in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
}

/// Whether the event carries free text or a button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Callback,
}

/// Transport-agnostic envelope for one inbound event.
///
/// Built once by the platform adapter and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedMessage {
    pub platform: Platform,
    pub persona: Persona,
    pub user_id: String,
    pub user_name: String,
    pub chat_id: String,
    pub chat_type: ChatType,
    pub kind: MessageKind,
    /// Message text, or the callback data for button presses.
    pub content: String,
    /// Correlation id that must be passed to `answer_callback`.
    pub callback_id: Option<String>,
    /// Id of the message a callback button was attached to.
    pub reply_to_message_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl UnifiedMessage {
    /// Returns the trimmed text content.
    pub fn text(&self) -> &str {
        self.content.trim()
    }

    pub fn is_callback(&self) -> bool {
        self.kind == MessageKind::Callback
    }
}

// --- Outbound messages ---

/// A single inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: data.into(),
        }
    }
}

/// Text formatting mode for outbound messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    #[default]
    Html,
    Plain,
}

/// Options accompanying an outbound send or edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    #[serde(default)]
    pub parse_mode: ParseMode,
    /// Rows of inline buttons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<Vec<Vec<InlineButton>>>,
    /// Give up after the first failure instead of retrying transient errors.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub single_attempt: bool,
}

impl SendOptions {
    pub fn with_keyboard(rows: Vec<Vec<InlineButton>>) -> Self {
        Self {
            keyboard: Some(rows),
            ..Self::default()
        }
    }

    pub fn without_retry(mut self) -> Self {
        self.single_attempt = true;
        self
    }
}

/// Id of a message delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef(pub String);

// --- Tenant cache ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub class_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseRef {
    pub id: String,
    pub name: String,
}

/// Per-tenant reference data fed to intent classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantSnapshot {
    #[serde(default)]
    pub students: Vec<StudentRef>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub items: Vec<ItemRef>,
    #[serde(default)]
    pub warehouses: Vec<WarehouseRef>,
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(default)]
    pub tenant_address: Option<String>,
    pub last_synced_at: DateTime<Utc>,
}

// --- Pending actions ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl ActionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ActionStatus::Pending)
    }
}

/// A write intent waiting for the user to confirm or cancel it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: String,
    pub user_id: String,
    pub chat_id: String,
    pub tenant_id: String,
    pub tenant_name: String,
    pub intent: String,
    pub params: Params,
    pub status: ActionStatus,
    pub confirm_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingAction {
    /// True when the action is still pending but its deadline has passed.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ActionStatus::Pending && now > self.expires_at
    }
}

// --- Cross-bot requests ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CrossBotKind {
    LeaveRequest,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// Fields supplied by the requesting persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCrossBotRequest {
    pub kind: CrossBotKind,
    pub from: Persona,
    pub to: Persona,
    pub tenant_id: String,
    pub student_id: String,
    pub student_name: String,
    pub requester_user_id: String,
    pub requester_chat_id: String,
    pub data: Value,
}

/// Durable correlation record between a requester and a responder persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossBotRequest {
    pub id: String,
    pub kind: CrossBotKind,
    pub from: Persona,
    pub to: Persona,
    pub tenant_id: String,
    pub student_id: String,
    pub student_name: String,
    pub requester_user_id: String,
    pub requester_chat_id: String,
    pub responder_chat_id: Option<String>,
    pub data: Value,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CrossBotRequest {
    /// Reads a string field from the opaque data payload.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

// --- Broadcast jobs ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastProgress {
    pub total: u32,
    pub succeeded: u32,
    pub failed: u32,
}

impl BroadcastProgress {
    pub fn processed(&self) -> u32 {
        self.succeeded + self.failed
    }
}

/// An operator-submitted bulk send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastJob {
    pub id: String,
    pub chat_ids: Vec<String>,
    pub message: String,
    pub options: SendOptions,
    pub status: JobStatus,
    pub progress: BroadcastProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// --- Audit log ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Confirmed,
    Cancelled,
    Error,
}

/// One row of the operation audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub intent: String,
    pub params: Params,
    pub status: AuditStatus,
    pub api_response: Option<Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One question-and-answer turn of the parent bot, kept for staff review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: String,
    pub tenant_id: String,
    pub parent_user_id: String,
    pub parent_name: String,
    pub chat_type: ChatType,
    pub user_message: String,
    pub bot_response: String,
    pub intent: String,
    pub created_at: DateTime<Utc>,
}

// --- Bindings ---

/// One tenant an admin user may operate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantBinding {
    pub tenant_id: String,
    pub tenant_name: String,
    pub role: String,
}

/// All tenant bindings of an admin-bot user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBinding {
    pub user_id: String,
    pub bindings: Vec<TenantBinding>,
    pub active_tenant_id: String,
    pub active_tenant_name: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl UserBinding {
    /// Resolves the authorization context for the active tenant.
    pub fn active_context(&self) -> Option<AuthContext> {
        self.context_for(&self.active_tenant_id)
    }

    /// Resolves the authorization context for a specific tenant, if bound.
    pub fn context_for(&self, tenant_id: &str) -> Option<AuthContext> {
        self.bindings
            .iter()
            .find(|b| b.tenant_id == tenant_id)
            .map(|b| AuthContext {
                user_id: self.user_id.clone(),
                tenant_id: b.tenant_id.clone(),
                tenant_name: b.tenant_name.clone(),
                role: b.role.clone(),
            })
    }
}

/// Authorization context resolved from a binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: String,
    pub tenant_id: String,
    pub tenant_name: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentChild {
    pub student_id: String,
    pub student_name: String,
    pub relation: String,
}

/// Binding of a parent-bot user to their children at one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentBinding {
    pub user_id: String,
    pub tenant_id: String,
    pub parent_name: String,
    pub children: Vec<ParentChild>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BindKind {
    Admin,
    Parent,
}

/// A single-use code that binds a chat user to a tenant (and, for parents, a student).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindCode {
    pub code: String,
    pub kind: BindKind,
    pub tenant_id: String,
    pub tenant_name: String,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub used_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// --- Usage ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    AiCalls,
    ApiCalls,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub day: String,
    pub ai_calls: u64,
    pub api_calls: u64,
}

/// Monthly usage counters for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub tenant_id: String,
    /// `YYYY-MM`.
    pub month: String,
    pub ai_calls: u64,
    pub api_calls: u64,
    pub daily: Vec<DailyUsage>,
}

// --- Rate limiting ---

/// Persisted token-bucket state used to reconcile fallback buckets across instances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketState {
    pub tokens: f64,
    pub updated_at: DateTime<Utc>,
}

// --- Intents and downstream APIs ---

/// Structured result of classifying one user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub need_clarification: bool,
    #[serde(default)]
    pub clarification_question: Option<String>,
    /// Optional natural-language reply fragment.
    #[serde(default)]
    pub reply: Option<String>,
}

impl IntentResult {
    pub const UNKNOWN: &'static str = "unknown";

    /// The downgraded result used when classification fails.
    pub fn unknown(question: impl Into<String>) -> Self {
        Self {
            intent: Self::UNKNOWN.to_string(),
            confidence: 0.0,
            params: Params::new(),
            need_clarification: true,
            clarification_question: Some(question.into()),
            reply: None,
        }
    }

    /// Reads a string parameter, accepting numbers as well.
    pub fn param_str(&self, key: &str) -> Option<String> {
        param_str(&self.params, key)
    }
}

/// Reads a string parameter from a params map, accepting numbers as well.
pub fn param_str(params: &Params, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Downstream business module.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BusinessModule {
    Manage,
    Inclass,
    Stock,
}

/// Which endpoint family of a business module is being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiScope {
    /// Staff operations on behalf of the admin bot.
    Bot,
    /// Read-mostly parent operations, tenant passed as a header.
    Parent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiMethod {
    Get,
    Post,
}

/// A call to one downstream business endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub module: BusinessModule,
    pub scope: ApiScope,
    pub method: ApiMethod,
    pub path: String,
    pub tenant_id: String,
    pub body: Params,
}

impl ApiRequest {
    /// A bot-scope POST whose body is `{tenant_id, ...params}`.
    pub fn bot(module: BusinessModule, path: &str, tenant_id: &str, params: &Params) -> Self {
        let mut body = Params::new();
        body.insert("tenant_id".into(), Value::String(tenant_id.to_string()));
        for (k, v) in params {
            body.insert(k.clone(), v.clone());
        }
        Self {
            module,
            scope: ApiScope::Bot,
            method: ApiMethod::Post,
            path: path.to_string(),
            tenant_id: tenant_id.to_string(),
            body,
        }
    }

    /// A parent-scope call.
    pub fn parent(
        module: BusinessModule,
        method: ApiMethod,
        path: &str,
        tenant_id: &str,
        body: Params,
    ) -> Self {
        Self {
            module,
            scope: ApiScope::Parent,
            method,
            path: path.to_string(),
            tenant_id: tenant_id.to_string(),
            body,
        }
    }
}

/// Response of a downstream business API, as a closed union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApiResponse {
    Success {
        message: Option<String>,
        data: Option<Value>,
    },
    Failure {
        error: String,
        message: Option<String>,
        suggestions: Vec<Params>,
    },
}

impl ApiResponse {
    pub fn failure(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            message: Some(message.into()),
            suggestions: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApiResponse::Success { .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ApiResponse::Success { message, .. } | ApiResponse::Failure { message, .. } => {
                message.as_deref()
            }
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            ApiResponse::Success { data, .. } => data.as_ref(),
            ApiResponse::Failure { .. } => None,
        }
    }
}

/// The loose wire shape `{ success, message?, data?, error?, suggestions? }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireApiResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub suggestions: Option<Vec<Params>>,
}

impl From<WireApiResponse> for ApiResponse {
    fn from(wire: WireApiResponse) -> Self {
        if wire.success {
            ApiResponse::Success {
                message: wire.message,
                data: wire.data,
            }
        } else {
            ApiResponse::Failure {
                error: wire.error.unwrap_or_else(|| "api_error".to_string()),
                message: wire.message,
                suggestions: wire.suggestions.unwrap_or_default(),
            }
        }
    }
}
