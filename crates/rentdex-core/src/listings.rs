use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Number of failed attempts after which a queue item is finalized as done.
pub const MAX_QUEUE_ATTEMPTS: i32 = 3;

/// Residential property type. Non-residential listings never get one; they
/// are rejected at classification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    Penthouse,
    ServicedApartment,
    Townhouse,
    Villa,
    House,
    Condo,
    Apartment,
}

impl PropertyType {
    /// Every variant, most specific first. Classification scans in this order.
    pub const BY_SPECIFICITY: [PropertyType; 7] = [
        PropertyType::Penthouse,
        PropertyType::ServicedApartment,
        PropertyType::Townhouse,
        PropertyType::Villa,
        PropertyType::House,
        PropertyType::Condo,
        PropertyType::Apartment,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::Penthouse => "PENTHOUSE",
            PropertyType::ServicedApartment => "SERVICED_APARTMENT",
            PropertyType::Townhouse => "TOWNHOUSE",
            PropertyType::Villa => "VILLA",
            PropertyType::House => "HOUSE",
            PropertyType::Condo => "CONDO",
            PropertyType::Apartment => "APARTMENT",
        }
    }

    /// Position in [`Self::BY_SPECIFICITY`]; lower is more specific.
    #[must_use]
    pub fn specificity_rank(self) -> usize {
        Self::BY_SPECIFICITY
            .iter()
            .position(|t| *t == self)
            .unwrap_or(Self::BY_SPECIFICITY.len())
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        PropertyType::BY_SPECIFICITY
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownPropertyType(s.to_string()))
    }
}

/// Lifecycle of a scrape queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Retry,
    Done,
}

impl QueueStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Retry => "retry",
            QueueStatus::Done => "done",
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "processing" => Ok(QueueStatus::Processing),
            "retry" => Ok(QueueStatus::Retry),
            "done" => Ok(QueueStatus::Done),
            other => Err(CoreError::UnknownQueueStatus(other.to_string())),
        }
    }
}

/// Kind of pipeline invocation recorded in `job_runs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Discover,
    ProcessQueue,
    MarkStale,
    BuildDailyIndex,
    BuildMonthlyIndex,
}

impl JobType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Discover => "discover",
            JobType::ProcessQueue => "process_queue",
            JobType::MarkStale => "mark_stale",
            JobType::BuildDailyIndex => "build_daily_index",
            JobType::BuildMonthlyIndex => "build_monthly_index",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discover" => Ok(JobType::Discover),
            "process_queue" => Ok(JobType::ProcessQueue),
            "mark_stale" => Ok(JobType::MarkStale),
            "build_daily_index" => Ok(JobType::BuildDailyIndex),
            "build_monthly_index" => Ok(JobType::BuildMonthlyIndex),
            other => Err(CoreError::UnknownJobType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

/// A listing as returned by a source adapter, before classification,
/// price normalization and location validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapedListing {
    pub title: String,
    pub description: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// The adapter's own guess. Text classification may refine it.
    pub property_type: Option<PropertyType>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    /// Boundary note: persisted as `NUMERIC(10,2)`.
    pub size_sqm: Option<f64>,
    /// Price exactly as advertised, in `currency`.
    pub price_original: Option<f64>,
    /// Monthly rent in USD when the source states it directly.
    pub price_monthly_usd: Option<f64>,
    /// ISO 4217 code as advertised (e.g. `"USD"`, `"KHR"`).
    pub currency: Option<String>,
    pub image_urls: Vec<String>,
    pub amenities: Vec<String>,
    pub posted_at: Option<DateTime<Utc>>,
    /// Stable listing ID native to the source site, when it exposes one.
    pub source_listing_id: Option<String>,
}

impl ScrapedListing {
    #[must_use]
    pub fn first_image_url(&self) -> Option<&str> {
        self.image_urls.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_type_round_trips_through_str() {
        for t in PropertyType::BY_SPECIFICITY {
            assert_eq!(t.as_str().parse::<PropertyType>().unwrap(), t);
        }
    }

    #[test]
    fn property_type_parse_accepts_loose_spelling() {
        assert_eq!(
            "serviced apartment".parse::<PropertyType>().unwrap(),
            PropertyType::ServicedApartment
        );
        assert_eq!("condo".parse::<PropertyType>().unwrap(), PropertyType::Condo);
        assert!("warehouse".parse::<PropertyType>().is_err());
    }

    #[test]
    fn penthouse_is_most_specific() {
        assert_eq!(PropertyType::Penthouse.specificity_rank(), 0);
        assert!(
            PropertyType::Villa.specificity_rank() < PropertyType::House.specificity_rank()
        );
        assert_eq!(PropertyType::Apartment.specificity_rank(), 6);
    }

    #[test]
    fn queue_status_parse_rejects_unknown() {
        assert_eq!("retry".parse::<QueueStatus>().unwrap(), QueueStatus::Retry);
        assert!("claimed".parse::<QueueStatus>().is_err());
    }

    #[test]
    fn scraped_listing_serializes_property_type_screaming_case() {
        let listing = ScrapedListing {
            title: "2BR condo".to_string(),
            property_type: Some(PropertyType::ServicedApartment),
            ..ScrapedListing::default()
        };
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["property_type"], "SERVICED_APARTMENT");
    }
}
