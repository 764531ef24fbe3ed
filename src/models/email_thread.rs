use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailThreadStatus {
    Draft,
    Sent,
    WaitingResponse,
    ResponseReceived,
    FollowUpNeeded,
    Completed,
    ConvertedToOrder,
    Cancelled,
}

impl EmailThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailThreadStatus::Draft => "DRAFT",
            EmailThreadStatus::Sent => "SENT",
            EmailThreadStatus::WaitingResponse => "WAITING_RESPONSE",
            EmailThreadStatus::ResponseReceived => "RESPONSE_RECEIVED",
            EmailThreadStatus::FollowUpNeeded => "FOLLOW_UP_NEEDED",
            EmailThreadStatus::Completed => "COMPLETED",
            EmailThreadStatus::ConvertedToOrder => "CONVERTED_TO_ORDER",
            EmailThreadStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(EmailThreadStatus::Draft),
            "SENT" => Some(EmailThreadStatus::Sent),
            "WAITING_RESPONSE" => Some(EmailThreadStatus::WaitingResponse),
            "RESPONSE_RECEIVED" => Some(EmailThreadStatus::ResponseReceived),
            "FOLLOW_UP_NEEDED" => Some(EmailThreadStatus::FollowUpNeeded),
            "COMPLETED" => Some(EmailThreadStatus::Completed),
            "CONVERTED_TO_ORDER" => Some(EmailThreadStatus::ConvertedToOrder),
            "CANCELLED" => Some(EmailThreadStatus::Cancelled),
            _ => None,
        }
    }
}

/// Per-supplier sub-state on the junction row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadLinkStatus {
    Sent,
    Responded,
    Accepted,
    Rejected,
}

impl ThreadLinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadLinkStatus::Sent => "SENT",
            ThreadLinkStatus::Responded => "RESPONDED",
            ThreadLinkStatus::Accepted => "ACCEPTED",
            ThreadLinkStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SENT" => Some(ThreadLinkStatus::Sent),
            "RESPONDED" => Some(ThreadLinkStatus::Responded),
            "ACCEPTED" => Some(ThreadLinkStatus::Accepted),
            "REJECTED" => Some(ThreadLinkStatus::Rejected),
            _ => None,
        }
    }

    /// ACCEPTED/REJECTED are set at conversion time and never revisited by
    /// the status-promotion pass.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ThreadLinkStatus::Accepted | ThreadLinkStatus::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    Outbound,
    Inbound,
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageDirection::Outbound => "OUTBOUND",
            MessageDirection::Inbound => "INBOUND",
        }
    }
}

/// One conversation with one supplier. `quote_request_id` is nullable:
/// unlinked threads are "orphaned" until reconciliation assigns them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmailThread {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub quote_request_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub external_thread_id: Option<String>,
    pub subject: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailThread {
    pub fn status(&self) -> EmailThreadStatus {
        EmailThreadStatus::parse(&self.status).unwrap_or(EmailThreadStatus::Draft)
    }

    pub fn is_orphaned(&self) -> bool {
        self.quote_request_id.is_none()
    }
}

/// Attachment metadata carried inside the message's JSONB column. Payload
/// storage is out of scope; only metadata and any extracted text survive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub storage_path: Option<String>,
    pub extracted_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmailMessage {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub direction: String,
    pub from_address: String,
    pub to_address: String,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub body_html: Option<String>,
    pub external_message_id: Option<String>,
    pub attachments: Json<Vec<EmailAttachment>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Junction row correlating one supplier's thread to one quote request.
/// Unique on (quote_request_id, supplier_id).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuoteRequestEmailThread {
    pub id: Uuid,
    pub quote_request_id: Uuid,
    pub supplier_id: Uuid,
    pub email_thread_id: Uuid,
    pub status: String,
    pub is_primary: bool,
    pub quoted_amount: Option<Decimal>,
    pub response_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuoteRequestEmailThread {
    pub fn status(&self) -> ThreadLinkStatus {
        ThreadLinkStatus::parse(&self.status).unwrap_or(ThreadLinkStatus::Sent)
    }
}

#[derive(Debug, Serialize)]
pub struct EmailThreadResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub quote_request_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub external_thread_id: Option<String>,
    pub subject: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<EmailMessage>>,
}

impl From<EmailThread> for EmailThreadResponse {
    fn from(thread: EmailThread) -> Self {
        Self {
            id: thread.id,
            organization_id: thread.organization_id,
            supplier_id: thread.supplier_id,
            quote_request_id: thread.quote_request_id,
            order_id: thread.order_id,
            external_thread_id: thread.external_thread_id,
            subject: thread.subject,
            status: thread.status,
            created_at: thread.created_at,
            updated_at: thread.updated_at,
            messages: None,
        }
    }
}
