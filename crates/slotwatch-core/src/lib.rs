//! Core domain for the visa slot watch tracker.
//!
//! Pure types and logic only: the alert record, its closed enumerations,
//! draft validation, the query engine (filter, sort, paginate), the
//! lifecycle service over an injected [`AlertStore`], and the
//! [`TextSummarizer`] capability boundary. All I/O lives in the store and
//! insights crates.

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};
use ulid::Ulid;

/// Fixed page size for paginated listings.
pub const PAGE_SIZE: usize = 5;

/// Returned by [`summarize_alerts`] when there is nothing to analyze.
pub const NO_DATA_MESSAGE: &str = "No visa data available for analysis yet.";

/// Returned by [`summarize_alerts`] whenever the summarizer fails.
pub const INSIGHTS_FALLBACK_MESSAGE: &str =
    "The AI assistant is currently unavailable to analyze trends. Please check back later.";

const MSG_COUNTRY_TOO_SHORT: &str = "Country name too short";
const MSG_CITY_TOO_SHORT: &str = "City name too short";
const MSG_INVALID_VISA_TYPE: &str = "Invalid visa type";

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum AlertError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("alert not found: {0}")]
    NotFound(String),
    #[error("storage read failed: {0}")]
    StorageRead(String),
    #[error("stored alerts are corrupt: {0}")]
    StorageCorrupt(String),
    #[error("storage write failed: {0}")]
    StorageWrite(String),
    #[error("insight service failed: {0}")]
    ExternalService(String),
}

/// Visa category of an alert. Immutable once the alert is created.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum VisaType {
    Tourist,
    Business,
    Student,
}

impl VisaType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tourist => "Tourist",
            Self::Business => "Business",
            Self::Student => "Student",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Tourist" => Some(Self::Tourist),
            "Business" => Some(Self::Business),
            "Student" => Some(Self::Student),
            _ => None,
        }
    }
}

/// Lifecycle status of an alert. Any status may transition to any other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum AlertStatus {
    Active,
    Booked,
    Expired,
}

impl AlertStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Booked => "Booked",
            Self::Expired => "Expired",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Active" => Some(Self::Active),
            "Booked" => Some(Self::Booked),
            "Expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// A tracked visa slot watch entry.
///
/// Serializes to the persisted wire shape:
/// `{id, country, city, visaType, status, createdAt}` with `createdAt`
/// as an RFC3339 string.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisaAlert {
    pub id: String,
    pub country: String,
    pub city: String,
    pub visa_type: VisaType,
    pub status: AlertStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Client-supplied fields for a new alert, before validation.
///
/// `visa_type` is `None` when the supplied category was not a member of
/// the closed enumeration.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct AlertDraft {
    pub country: String,
    pub city: String,
    pub visa_type: Option<VisaType>,
}

impl AlertDraft {
    /// Checks the draft fields in order; the first failing rule wins.
    ///
    /// # Errors
    /// Returns [`AlertError::Validation`] with a user-facing reason when
    /// a field is missing, too short after trimming, or not a member of
    /// the visa type enumeration.
    pub fn validate(&self) -> Result<(), AlertError> {
        if self.country.trim().chars().count() < 2 {
            return Err(AlertError::Validation(MSG_COUNTRY_TOO_SHORT.to_string()));
        }
        if self.city.trim().chars().count() < 2 {
            return Err(AlertError::Validation(MSG_CITY_TOO_SHORT.to_string()));
        }
        if self.visa_type.is_none() {
            return Err(AlertError::Validation(MSG_INVALID_VISA_TYPE.to_string()));
        }
        Ok(())
    }
}

/// Filter predicate pair applied before sorting and pagination.
///
/// Both predicates are ANDed. An absent or empty country filter matches
/// everything; an absent status matches every status.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct AlertFilters {
    pub country: Option<String>,
    pub status: Option<AlertStatus>,
}

impl AlertFilters {
    #[must_use]
    pub fn matches(&self, alert: &VisaAlert) -> bool {
        let country_ok = match self.country.as_deref() {
            None => true,
            Some(needle) => {
                needle.is_empty()
                    || alert.country.to_lowercase().contains(&needle.to_lowercase())
            }
        };
        let status_ok = match self.status {
            None => true,
            Some(status) => alert.status == status,
        };
        country_ok && status_ok
    }
}

/// Filters and orders alerts newest-first.
///
/// The sort is stable, so alerts sharing a coarse timestamp keep their
/// store order.
#[must_use]
pub fn query_alerts(alerts: &[VisaAlert], filters: &AlertFilters) -> Vec<VisaAlert> {
    let mut matched: Vec<VisaAlert> = alerts
        .iter()
        .filter(|alert| filters.matches(alert))
        .cloned()
        .collect();
    matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    matched
}

/// Returns the 1-based page of an already-filtered, already-sorted list.
///
/// Pages are [`PAGE_SIZE`] long and clamped to the available range; an
/// out-of-range page yields an empty slice, never an error. Page 0 is
/// treated as page 1.
#[must_use]
pub fn page_slice(alerts: &[VisaAlert], page_number: usize) -> &[VisaAlert] {
    let start = page_number
        .saturating_sub(1)
        .saturating_mul(PAGE_SIZE);
    let end = start.saturating_add(PAGE_SIZE).min(alerts.len());
    alerts.get(start..end).unwrap_or(&[])
}

/// Number of [`PAGE_SIZE`]-long pages needed for `total` alerts.
#[must_use]
pub fn page_count(total: usize) -> usize {
    total.div_ceil(PAGE_SIZE)
}

#[must_use]
pub fn new_alert_id() -> String {
    format!("visa-{}", Ulid::new())
}

/// Record store boundary: the persisted collection as a whole.
///
/// Every read loads everything and every write replaces everything. This
/// is a deliberate simplification for small record counts; an indexed
/// store can be substituted behind this trait without changing callers.
pub trait AlertStore {
    /// Deserializes the entire persisted collection; empty when nothing
    /// has been persisted yet.
    ///
    /// # Errors
    /// Returns [`AlertError::StorageRead`] when the backing storage is
    /// unreadable and [`AlertError::StorageCorrupt`] when the persisted
    /// bytes are not well-formed.
    fn load(&self) -> Result<Vec<VisaAlert>, AlertError>;

    /// Atomically replaces the persisted collection.
    ///
    /// # Errors
    /// Returns [`AlertError::StorageWrite`] when persistence fails; the
    /// failure is propagated, not retried.
    fn save(&mut self, alerts: &[VisaAlert]) -> Result<(), AlertError>;
}

/// In-process store substitute for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryAlertStore {
    alerts: Vec<VisaAlert>,
}

impl MemoryAlertStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_alerts(alerts: Vec<VisaAlert>) -> Self {
        Self { alerts }
    }
}

impl AlertStore for MemoryAlertStore {
    fn load(&self) -> Result<Vec<VisaAlert>, AlertError> {
        Ok(self.alerts.clone())
    }

    fn save(&mut self, alerts: &[VisaAlert]) -> Result<(), AlertError> {
        self.alerts = alerts.to_vec();
        Ok(())
    }
}

/// Lifecycle service enforcing the alert contract over an injected store.
///
/// All mutations run a full load-mutate-save cycle against the store.
/// Concurrent writers racing on that cycle lose updates (last write wins
/// on the whole blob); acceptable for the single-user scope.
pub struct AlertService<S> {
    store: S,
}

impl<S: AlertStore> AlertService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads, filters, and orders the current record set.
    ///
    /// # Errors
    /// Propagates store read errors.
    pub fn list(&self, filters: &AlertFilters) -> Result<Vec<VisaAlert>, AlertError> {
        Ok(query_alerts(&self.store.load()?, filters))
    }

    /// Validates the draft and persists a new `Active` alert with a fresh
    /// id and a server-side creation timestamp.
    ///
    /// # Errors
    /// Returns [`AlertError::Validation`] on invalid input and
    /// [`AlertError::StorageWrite`] when persistence fails; in both cases
    /// the record is not created.
    pub fn create(&mut self, draft: &AlertDraft) -> Result<VisaAlert, AlertError> {
        draft.validate()?;
        let visa_type = draft
            .visa_type
            .ok_or_else(|| AlertError::Validation(MSG_INVALID_VISA_TYPE.to_string()))?;

        let mut alerts = self.store.load()?;
        // Display strings are persisted as supplied; trimming applies to
        // validation only.
        let alert = VisaAlert {
            id: new_alert_id(),
            country: draft.country.clone(),
            city: draft.city.clone(),
            visa_type,
            status: AlertStatus::Active,
            created_at: now_utc(),
        };
        alerts.push(alert.clone());
        self.store.save(&alerts)?;
        Ok(alert)
    }

    /// Overwrites the status of the alert with the given id. No
    /// transition restrictions: every status is reachable from every
    /// other.
    ///
    /// # Errors
    /// Returns [`AlertError::NotFound`] when no alert has that id; the
    /// store is left unchanged.
    pub fn set_status(&mut self, id: &str, status: AlertStatus) -> Result<VisaAlert, AlertError> {
        let mut alerts = self.store.load()?;
        let Some(alert) = alerts.iter_mut().find(|alert| alert.id == id) else {
            return Err(AlertError::NotFound(id.to_string()));
        };
        alert.status = status;
        let updated = alert.clone();
        self.store.save(&alerts)?;
        Ok(updated)
    }

    /// Removes the alert with the given id and persists the reduced
    /// collection.
    ///
    /// # Errors
    /// Returns [`AlertError::NotFound`] when no alert has that id.
    pub fn delete(&mut self, id: &str) -> Result<(), AlertError> {
        let mut alerts = self.store.load()?;
        let before = alerts.len();
        alerts.retain(|alert| alert.id != id);
        if alerts.len() == before {
            return Err(AlertError::NotFound(id.to_string()));
        }
        self.store.save(&alerts)?;
        Ok(())
    }
}

/// Derived view sent to the summarizer: country, category, and status
/// only. Ids, cities, and timestamps never leave the process.
#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct AlertDigest {
    pub country: String,
    #[serde(rename = "type")]
    pub visa_type: VisaType,
    pub status: AlertStatus,
}

#[must_use]
pub fn digest_alerts(alerts: &[VisaAlert]) -> Vec<AlertDigest> {
    alerts
        .iter()
        .map(|alert| AlertDigest {
            country: alert.country.clone(),
            visa_type: alert.visa_type,
            status: alert.status,
        })
        .collect()
}

/// External text-generation collaborator.
pub trait TextSummarizer {
    /// Produces a human-readable trend summary from the digest.
    ///
    /// # Errors
    /// Returns [`AlertError::ExternalService`] when the backing service
    /// is unreachable, errors, or returns an unusable response.
    fn summarize(&self, digest: &[AlertDigest]) -> Result<String, AlertError>;
}

/// Best-effort summary of the current record set.
///
/// An empty set returns [`NO_DATA_MESSAGE`] without invoking the
/// summarizer; any summarizer failure is absorbed and replaced by
/// [`INSIGHTS_FALLBACK_MESSAGE`]. Never errors outward and has no effect
/// on stored data.
#[must_use]
pub fn summarize_alerts(alerts: &[VisaAlert], summarizer: &dyn TextSummarizer) -> String {
    if alerts.is_empty() {
        return NO_DATA_MESSAGE.to_string();
    }
    match summarizer.summarize(&digest_alerts(alerts)) {
        Ok(text) => text,
        Err(_) => INSIGHTS_FALLBACK_MESSAGE.to_string(),
    }
}

/// Parses an RFC3339 timestamp and requires UTC (`Z`) offset.
///
/// # Errors
/// Returns [`AlertError::Validation`] when parsing fails or the input is
/// not UTC.
pub fn parse_rfc3339_utc(value: &str) -> Result<OffsetDateTime, AlertError> {
    let parsed = OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .map_err(|err| AlertError::Validation(format!("invalid RFC3339 timestamp: {err}")))?;

    if parsed.offset() != UtcOffset::UTC {
        return Err(AlertError::Validation(
            "timestamp MUST use UTC offset Z".to_string(),
        ));
    }

    Ok(parsed)
}

/// Formats a timestamp as RFC3339 after normalizing to UTC.
///
/// # Errors
/// Returns [`AlertError::Validation`] when formatting fails.
pub fn format_rfc3339(value: OffsetDateTime) -> Result<String, AlertError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|err| AlertError::Validation(format!("failed to format RFC3339 timestamp: {err}")))
}

#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(UtcOffset::UTC)
}
