use serde_json::json;
use timebank_reviews::{
    Database, NewReview, ObjectId, PersistenceError, Review, ReviewError, ReviewFields,
    ReviewUpdate, ReviewUpdateFields, StoreConfig, ValidationError,
};

const SERVICE: &str = "65a1f0c2b3d4e5f60718293a";
const USER: &str = "65a1f0c2b3d4e5f60718293b";

async fn create_test_db() -> Database {
    let db = Database::open(&StoreConfig::in_memory()).unwrap();
    db.create_schema().await.unwrap();
    db
}

// What a caller's request handler would do with a JSON body
async fn submit(db: &Database, body: serde_json::Value) -> Result<Review, ReviewError> {
    let fields: ReviewFields = serde_json::from_value(body).unwrap();
    let review = NewReview::try_from(fields)?;
    Ok(db.create_review(&review).await?)
}

#[tokio::test]
async fn test_full_review_lifecycle() {
    let db = create_test_db().await;

    let created = submit(
        &db,
        json!({
            "service_id": SERVICE,
            "user_id": USER,
            "rating": 4,
            "comment": "Punctual and friendly"
        }),
    )
    .await
    .unwrap();
    assert_eq!(created.service_id.to_string(), SERVICE);
    assert_eq!(created.user_id.to_string(), USER);
    assert_eq!(created.rating.value(), 4.0);
    assert_eq!(created.comment.as_deref(), Some("Punctual and friendly"));
    assert_eq!(created.created_at, created.updated_at);

    let fetched = db.get_review(&created.id).await.unwrap().unwrap();
    assert_eq!(fetched, created);

    let update = ReviewUpdate::try_from(ReviewUpdateFields {
        rating: None,
        comment: Some("Punctual, friendly, brought tools".into()),
    })
    .unwrap();
    let updated = db.update_review(&created.id, &update).await.unwrap();
    assert_eq!(updated.rating.value(), 4.0);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);

    let service = ObjectId::parse_str(SERVICE).unwrap();
    assert_eq!(db.reviews_for_service(&service).await.unwrap(), vec![updated]);

    db.delete_review(&created.id).await.unwrap();
    assert!(db.reviews_for_service(&service).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_input_never_reaches_the_store() {
    let db = create_test_db().await;
    let user = ObjectId::parse_str(USER).unwrap();

    let err = submit(&db, json!({ "service_id": SERVICE, "user_id": USER, "rating": 6 }))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReviewError::Validation(ValidationError::RatingOutOfRange(r)) if r == 6.0
    ));

    let err = submit(&db, json!({ "user_id": USER, "rating": 3 }))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReviewError::Validation(ValidationError::MissingField("service_id"))
    ));

    assert!(db.reviews_by_user(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_half_star_rating_is_accepted_and_stored() {
    let db = create_test_db().await;
    let created = submit(&db, json!({ "service_id": SERVICE, "user_id": USER, "rating": 4.5 }))
        .await
        .unwrap();
    assert_eq!(created.rating.value(), 4.5);
    assert_eq!(db.get_review(&created.id).await.unwrap().unwrap(), created);
}

#[tokio::test]
async fn test_non_string_id_is_rejected_as_validation_error() {
    let db = create_test_db().await;
    let err = submit(&db, json!({ "service_id": 123, "user_id": USER, "rating": 3 }))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReviewError::Validation(ValidationError::MalformedId { field: "service_id", .. })
    ));
}

#[tokio::test]
async fn test_comment_may_be_omitted() {
    let db = create_test_db().await;
    let created = submit(&db, json!({ "service_id": SERVICE, "user_id": USER, "rating": 1 }))
        .await
        .unwrap();
    assert_eq!(created.comment, None);
    assert_eq!(db.get_review(&created.id).await.unwrap().unwrap().comment, None);
}

#[tokio::test]
async fn test_persisted_shape_serializes_like_a_document() {
    let db = create_test_db().await;
    let created = submit(&db, json!({ "service_id": SERVICE, "user_id": USER, "rating": 5 }))
        .await
        .unwrap();

    let doc = serde_json::to_value(&created).unwrap();
    assert_eq!(doc["id"], json!(created.id.to_string()));
    assert_eq!(doc["service_id"], json!(SERVICE));
    assert_eq!(doc["rating"], json!(5.0));
    assert!(doc["created_at"].is_string());
    assert!(doc["updated_at"].is_string());

    let back: Review = serde_json::from_value(doc).unwrap();
    assert_eq!(back, created);
}

#[tokio::test]
async fn test_missing_review_errors() {
    let db = create_test_db().await;
    let missing = ObjectId::new();
    let err: ReviewError = db.delete_review(&missing).await.unwrap_err().into();
    assert!(matches!(
        err,
        ReviewError::Persistence(PersistenceError::NotFound(id)) if id == missing
    ));
    assert_eq!(err.to_string(), format!("review {missing} does not exist"));
}
