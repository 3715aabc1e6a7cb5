// src/models/review.rs
use bson::oid::ObjectId;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Star rating in the inclusive range 1.0..=5.0. Half stars are allowed.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Rating(f64);

impl Rating {
    pub const MIN: f64 = 1.0;
    pub const MAX: f64 = 5.0;

    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::RatingNotNumeric);
        }
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ValidationError::RatingOutOfRange(value));
        }
        Ok(Rating(value))
    }

    /// Reads a rating from loosely typed input: a JSON number or a numeric string.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        match value {
            Value::Null => Err(ValidationError::MissingField("rating")),
            Value::Number(n) => Rating::new(n.as_f64().ok_or(ValidationError::RatingNotNumeric)?),
            Value::String(s) => {
                let parsed = s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| ValidationError::RatingNotNumeric)?;
                Rating::new(parsed)
            }
            _ => Err(ValidationError::RatingNotNumeric),
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Rating {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Rating::new(value)
    }
}

impl From<Rating> for f64 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

// Ids travel as plain 24-hex strings rather than extended JSON `{"$oid": ..}`
mod hex_object_id {
    use bson::oid::ObjectId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &ObjectId, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ObjectId, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ObjectId::parse_str(&raw).map_err(serde::de::Error::custom)
    }
}

/// Raw review input as it arrives from a request body. Nothing is checked yet.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ReviewFields {
    pub service_id: Option<Value>,
    pub user_id: Option<Value>,
    pub rating: Option<Value>,
    pub comment: Option<String>,
}

/// A validated review that has not been stored yet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewReview {
    #[serde(with = "hex_object_id")]
    pub service_id: ObjectId, // service being reviewed
    #[serde(with = "hex_object_id")]
    pub user_id: ObjectId, // user who submitted the review
    pub rating: Rating,
    pub comment: Option<String>,
}

impl NewReview {
    pub fn new(
        service_id: ObjectId,
        user_id: ObjectId,
        rating: Rating,
        comment: Option<String>,
    ) -> Self {
        NewReview {
            service_id,
            user_id,
            rating,
            comment,
        }
    }
}

fn required_id(field: &'static str, value: Option<&Value>) -> Result<ObjectId, ValidationError> {
    let raw = match value {
        None | Some(Value::Null) => return Err(ValidationError::MissingField(field)),
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(ValidationError::MissingField(field))
        }
        Some(Value::String(s)) => s.trim(),
        Some(other) => {
            return Err(ValidationError::MalformedId {
                field,
                value: other.to_string(),
            })
        }
    };
    ObjectId::parse_str(raw).map_err(|_| ValidationError::MalformedId {
        field,
        value: raw.to_string(),
    })
}

impl TryFrom<ReviewFields> for NewReview {
    type Error = ValidationError;

    fn try_from(fields: ReviewFields) -> Result<Self, Self::Error> {
        let service_id = required_id("service_id", fields.service_id.as_ref())?;
        let user_id = required_id("user_id", fields.user_id.as_ref())?;
        let rating = match fields.rating {
            Some(value) => Rating::from_json(&value)?,
            None => return Err(ValidationError::MissingField("rating")),
        };
        Ok(NewReview::new(service_id, user_id, rating, fields.comment))
    }
}

/// A stored review. Timestamps are owned by the store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Review {
    #[serde(with = "hex_object_id")]
    pub id: ObjectId,
    #[serde(with = "hex_object_id")]
    pub service_id: ObjectId,
    #[serde(with = "hex_object_id")]
    pub user_id: ObjectId,
    pub rating: Rating,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// The caller-supplied part of the record.
    pub fn fields(&self) -> NewReview {
        NewReview::new(
            self.service_id,
            self.user_id,
            self.rating,
            self.comment.clone(),
        )
    }

    pub fn apply(&mut self, update: &ReviewUpdate) {
        if let Some(rating) = update.rating {
            self.rating = rating;
        }
        if let Some(comment) = &update.comment {
            self.comment = Some(comment.clone());
        }
    }
}

/// Raw partial edit, mirroring [`ReviewFields`].
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ReviewUpdateFields {
    pub rating: Option<Value>,
    pub comment: Option<String>,
}

/// Validated partial edit of a stored review.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReviewUpdate {
    pub rating: Option<Rating>,
    pub comment: Option<String>,
}

impl ReviewUpdate {
    pub fn new(rating: Option<Rating>, comment: Option<String>) -> Result<Self, ValidationError> {
        if rating.is_none() && comment.is_none() {
            return Err(ValidationError::EmptyUpdate);
        }
        Ok(ReviewUpdate { rating, comment })
    }
}

impl TryFrom<ReviewUpdateFields> for ReviewUpdate {
    type Error = ValidationError;

    fn try_from(fields: ReviewUpdateFields) -> Result<Self, Self::Error> {
        let rating = fields.rating.as_ref().map(Rating::from_json).transpose()?;
        ReviewUpdate::new(rating, fields.comment)
    }
}

/// Current time at the precision the store keeps.
pub(crate) fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A write timestamp strictly after `previous`, even when the clock has not moved.
pub(crate) fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = timestamp_now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
