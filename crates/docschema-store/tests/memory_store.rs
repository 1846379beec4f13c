use docschema_store::{
    Collection, Document, FindOptions, IndexSpec, MemoryStore, SortDirection, Store, StoreError,
};
use serde_json::{Value, json};

fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("object")
}

#[tokio::test]
async fn create_collection_is_idempotent() {
    let store = MemoryStore::new();
    let first = store.create_collection("posts").await.unwrap();
    first.insert_many(vec![doc(json!({"slug": "a"}))]).await.unwrap();

    let second = store.create_collection("posts").await.unwrap();
    assert_eq!(second.count(&Document::new()).await.unwrap(), 1);
    assert_eq!(store.list_collections().await.unwrap(), vec!["posts"]);
    assert!(store.collection("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn insert_assigns_ids_in_order() {
    let store = MemoryStore::new();
    let posts = store.create_collection("posts").await.unwrap();
    let ids = posts
        .insert_many(vec![doc(json!({"n": 1})), doc(json!({"n": 2}))])
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);

    let first = posts
        .find_one(&doc(json!({"_id": ids[0].to_value()})), None)
        .await
        .unwrap()
        .expect("first document");
    assert_eq!(first["n"], json!(1));
}

#[tokio::test]
async fn unique_index_rejects_whole_batch() {
    let store = MemoryStore::new();
    let posts = store.create_collection("posts").await.unwrap();
    posts
        .create_index(IndexSpec::unique(vec!["slug".to_string()]))
        .await
        .unwrap();
    posts.insert_many(vec![doc(json!({"slug": "a"}))]).await.unwrap();

    let err = posts
        .insert_many(vec![doc(json!({"slug": "b"})), doc(json!({"slug": "a"}))])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));
    assert_eq!(posts.count(&Document::new()).await.unwrap(), 1);

    let err = posts
        .insert_many(vec![doc(json!({"slug": "c"})), doc(json!({"slug": "c"}))])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));
}

#[tokio::test]
async fn unique_index_scoped_by_indexer_fields() {
    let store = MemoryStore::new();
    let comments = store.create_collection("comments").await.unwrap();
    comments
        .create_index(IndexSpec::unique(vec!["post".to_string(), "slug".to_string()]))
        .await
        .unwrap();
    comments
        .insert_many(vec![
            doc(json!({"post": "p1", "slug": "a"})),
            doc(json!({"post": "p2", "slug": "a"})),
        ])
        .await
        .unwrap();
    let err = comments
        .update_one(&doc(json!({"post": "p2"})), &doc(json!({"$set": {"post": "p1"}})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));
}

#[tokio::test]
async fn find_sorts_skips_limits_and_projects() {
    let store = MemoryStore::new();
    let posts = store.create_collection("posts").await.unwrap();
    posts
        .insert_many(
            (1..=5)
                .map(|n| doc(json!({"n": n, "body": "x"})))
                .collect(),
        )
        .await
        .unwrap();

    let options = FindOptions::default()
        .sort_by("n", SortDirection::Descending)
        .skip(1)
        .limit(2)
        .projection(doc(json!({"n": 1, "_id": 0})));
    let found = posts.find(&Document::new(), &options).await.unwrap();
    let found: Vec<Value> = found.into_iter().map(Value::Object).collect();
    assert_eq!(found, vec![json!({"n": 4}), json!({"n": 3})]);
}

#[tokio::test]
async fn update_and_delete_report_counts() {
    let store = MemoryStore::new();
    let posts = store.create_collection("posts").await.unwrap();
    posts
        .insert_many(vec![
            doc(json!({"draft": true})),
            doc(json!({"draft": true})),
            doc(json!({"draft": false})),
        ])
        .await
        .unwrap();

    let outcome = posts
        .update_many(&doc(json!({"draft": true})), &doc(json!({"$set": {"draft": false}})))
        .await
        .unwrap();
    assert_eq!(outcome.matched, 2);
    assert_eq!(outcome.modified, 2);

    assert_eq!(posts.delete_many(&doc(json!({"draft": false}))).await.unwrap(), 3);
    assert_eq!(posts.count(&Document::new()).await.unwrap(), 0);
}
