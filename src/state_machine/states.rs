use serde::{Deserialize, Serialize};
use std::fmt;

/// Report/offer lifecycle statuses.
///
/// Early versions of the platform stored `pending` for an offer awaiting a
/// customer response; that string parses as [`OfferStatus::OfferSent`], so
/// every read path sees exactly one spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    /// Report being drafted by an inspector.
    Draft,
    /// Inspection report finished, not yet delivered.
    Completed,
    /// Report delivered to the customer.
    Sent,
    /// Report shared via a public link.
    Shared,
    /// Terminal archive state; applies to reports and offers alike.
    Archived,
    /// Offer delivered, customer response pending.
    #[serde(alias = "pending")]
    OfferSent,
    /// One or more follow-ups sent, still waiting on the customer.
    AwaitingResponse,
    /// Customer accepted the offer.
    OfferAccepted,
    /// Customer rejected the offer.
    OfferRejected,
    /// Validity period elapsed without a response.
    #[serde(alias = "expired")]
    OfferExpired,
}

impl OfferStatus {
    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Archived | Self::OfferAccepted | Self::OfferRejected | Self::OfferExpired
        )
    }

    /// Stored spellings that read back as this status. Queries filtering on
    /// raw status strings must match legacy documents too.
    pub fn wire_aliases(&self) -> &'static [&'static str] {
        match self {
            Self::OfferSent => &["offer_sent", "pending"],
            Self::OfferExpired => &["offer_expired", "expired"],
            Self::Draft => &["draft"],
            Self::Completed => &["completed"],
            Self::Sent => &["sent"],
            Self::Shared => &["shared"],
            Self::Archived => &["archived"],
            Self::AwaitingResponse => &["awaiting_response"],
            Self::OfferAccepted => &["offer_accepted"],
            Self::OfferRejected => &["offer_rejected"],
        }
    }

    /// Whether this status denotes an offer (as opposed to a plain report).
    pub fn is_offer(&self) -> bool {
        matches!(
            self,
            Self::OfferSent
                | Self::AwaitingResponse
                | Self::OfferAccepted
                | Self::OfferRejected
                | Self::OfferExpired
        )
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Completed => "completed",
            Self::Sent => "sent",
            Self::Shared => "shared",
            Self::Archived => "archived",
            Self::OfferSent => "offer_sent",
            Self::AwaitingResponse => "awaiting_response",
            Self::OfferAccepted => "offer_accepted",
            Self::OfferRejected => "offer_rejected",
            Self::OfferExpired => "offer_expired",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "completed" => Ok(Self::Completed),
            "sent" => Ok(Self::Sent),
            "shared" => Ok(Self::Shared),
            "archived" => Ok(Self::Archived),
            // Legacy spelling normalized at the boundary.
            "offer_sent" | "pending" => Ok(Self::OfferSent),
            "awaiting_response" => Ok(Self::AwaitingResponse),
            "offer_accepted" => Ok(Self::OfferAccepted),
            "offer_rejected" => Ok(Self::OfferRejected),
            "offer_expired" | "expired" => Ok(Self::OfferExpired),
            _ => Err(format!("invalid offer status: {s}")),
        }
    }
}
