pub mod orders;
pub mod processed_events;

use std::fmt;

/// Status of a local order.
///
/// Known statuses have their own variant; anything else the processor reports
/// is kept verbatim (upper-cased) in [`OrderStatus::Other`]. Stored as `TEXT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Draft,
    Open,
    Paid,
    PaymentFailed,
    Canceled,
    Completed,
    Other(String),
}

impl OrderStatus {
    /// Interpret a status string. Matching is case-insensitive; an empty
    /// string maps to `Pending`.
    pub fn from_raw(raw: &str) -> Self {
        let upper = raw.trim().to_ascii_uppercase();
        match upper.as_str() {
            "" | "PENDING" => OrderStatus::Pending,
            "DRAFT" => OrderStatus::Draft,
            "OPEN" => OrderStatus::Open,
            "PAID" => OrderStatus::Paid,
            "PAYMENT_FAILED" => OrderStatus::PaymentFailed,
            "CANCELED" => OrderStatus::Canceled,
            "COMPLETED" => OrderStatus::Completed,
            _ => OrderStatus::Other(upper),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Draft => "DRAFT",
            OrderStatus::Open => "OPEN",
            OrderStatus::Paid => "PAID",
            OrderStatus::PaymentFailed => "PAYMENT_FAILED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Other(raw) => raw,
        }
    }

    /// Terminal statuses are never replaced by a non-terminal one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Canceled | OrderStatus::Completed
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for OrderStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for OrderStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(OrderStatus::from_raw(&s))
    }
}
