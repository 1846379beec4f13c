use std::sync::Arc;

use docschema_core::{
    DependencyKind, Document, Error, ForeignKey, IdArray, JsonOptions, ObjectId, Schema,
    SchemaItem, StoreError, Text,
};
use docschema_model::{DeletePolicy, Model, ModelInstance, ModelRegistry};
use docschema_store::{Collection, MemoryStore, Store};
use serde_json::{Value, json};

fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("object")
}

struct Blog {
    store: MemoryStore,
    registry: ModelRegistry,
    users: Arc<Model>,
    posts: Arc<Model>,
    comments: Arc<Model>,
}

/// users <- posts.author (required), posts.editor (optional), posts.readers (ids)
/// posts <- comments.post (required)
async fn blog() -> Blog {
    let registry = ModelRegistry::new();
    let users = registry.register(Model::new(
        "users",
        Schema::from_items([
            SchemaItem::new("name", Text::new(1, 50)).unique(),
            SchemaItem::new("favourite", ForeignKey::new("posts", true)),
        ])
        .unwrap(),
    ));
    let posts = registry.register(Model::new(
        "posts",
        Schema::from_items([
            SchemaItem::new("title", Text::new(1, 100)),
            SchemaItem::new("author", ForeignKey::new("users", false)),
            SchemaItem::new("editor", ForeignKey::new("users", true)),
            SchemaItem::new("readers", IdArray::default().targeting("users")),
        ])
        .unwrap(),
    ));
    let comments = registry.register(Model::new(
        "comments",
        Schema::from_items([
            SchemaItem::new("body", Text::new(1, 500)),
            SchemaItem::new("post", ForeignKey::new("posts", false)),
        ])
        .unwrap(),
    ));
    let store = MemoryStore::new();
    registry
        .initialize_all(&store)
        .await
        .expect("initialize blog");
    Blog {
        store,
        registry,
        users,
        posts,
        comments,
    }
}

async fn user(blog: &Blog, name: &str) -> ModelInstance {
    blog.users
        .create_instance(&doc(json!({"name": name})))
        .await
        .expect("create user")
}

fn hex(instance: &ModelInstance) -> String {
    instance.id().expect("stored").to_hex()
}

async fn reload(model: &Arc<Model>, instance: &ModelInstance) -> ModelInstance {
    model
        .find_by_id(instance.id().expect("stored"))
        .await
        .unwrap()
        .expect("still stored")
}

#[tokio::test]
async fn required_reference_must_exist() {
    let blog = blog().await;
    let err = blog
        .posts
        .create_instance(&doc(json!({"title": "Orphan", "author": ObjectId::new().to_hex()})))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "'author' does not exist");

    let err = blog
        .posts
        .create_instance(&doc(json!({"title": "Anonymous"})))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "'author' does not exist");
    assert_eq!(blog.posts.count(&Document::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn missing_optional_targets_are_cleared() {
    let blog = blog().await;
    let ada = user(&blog, "ada").await;
    let ghost = ObjectId::new().to_hex();

    let post = blog
        .posts
        .create_instance(&doc(json!({
            "title": "Hello",
            "author": hex(&ada),
            "editor": ghost,
            "readers": [hex(&ada), ObjectId::new().to_hex()],
        })))
        .await
        .expect("create post");

    assert_eq!(post.schema().get("editor").unwrap().db_value(), &Value::Null);
    assert_eq!(
        post.schema().get("readers").unwrap().db_value(),
        &json!([ada.id().unwrap().to_value()])
    );
}

#[tokio::test]
async fn unknown_target_collection_is_reported() {
    let registry = ModelRegistry::new();
    let notes = registry.register(Model::new(
        "notes",
        Schema::from_items([SchemaItem::new("owner", ForeignKey::new("accounts", true))]).unwrap(),
    ));
    notes.initialize(&MemoryStore::new()).await.unwrap();

    let err = notes
        .create_instance(&doc(json!({"owner": ObjectId::new().to_hex()})))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "'owner' references a foreign key 'accounts' which doesn't seem to exist"
    );
}

#[tokio::test]
async fn references_leave_dependency_records() {
    let blog = blog().await;
    let ada = user(&blog, "ada").await;
    let bob = user(&blog, "bob").await;

    let post = blog
        .posts
        .create_instance(&doc(json!({
            "title": "Hello",
            "author": hex(&ada),
            "editor": hex(&bob),
            "readers": [hex(&bob)],
        })))
        .await
        .unwrap();

    let ada = reload(&blog.users, &ada).await;
    let required = ada.dependencies(DependencyKind::Required);
    assert_eq!(required.len(), 1);
    assert_eq!(required[0].collection, "posts");
    assert_eq!(required[0].property_name.as_deref(), Some("author"));
    assert_eq!(Some(required[0].id), post.id());

    let bob = reload(&blog.users, &bob).await;
    assert_eq!(bob.dependencies(DependencyKind::Optional).len(), 1);
    assert_eq!(bob.dependencies(DependencyKind::Array).len(), 1);
    assert!(bob.dependencies(DependencyKind::Required).is_empty());
}

#[tokio::test]
async fn updating_a_reference_moves_its_record() {
    let blog = blog().await;
    let ada = user(&blog, "ada").await;
    let bob = user(&blog, "bob").await;
    let post = blog
        .posts
        .create_instance(&doc(json!({"title": "Hello", "author": hex(&ada)})))
        .await
        .unwrap();

    blog.posts
        .update_by_id(post.id().unwrap(), &doc(json!({"author": hex(&bob)})))
        .await
        .expect("change author");

    let ada = reload(&blog.users, &ada).await;
    let bob = reload(&blog.users, &bob).await;
    assert!(ada.dependencies(DependencyKind::Required).is_empty());
    assert_eq!(bob.dependencies(DependencyKind::Required).len(), 1);
}

#[tokio::test]
async fn restrict_refuses_to_orphan_dependents() {
    let blog = blog().await;
    let ada = user(&blog, "ada").await;
    blog.posts
        .create_instance(&doc(json!({"title": "Hello", "author": hex(&ada)})))
        .await
        .unwrap();

    let err = blog
        .users
        .remove_instances(&doc(json!({"name": "ada"})), DeletePolicy::Restrict)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(blog.users.count(&Document::new()).await.unwrap(), 1);
    assert_eq!(blog.posts.count(&Document::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn cascade_removes_dependents_and_detaches_the_rest() {
    let blog = blog().await;
    let ada = user(&blog, "ada").await;
    let bob = user(&blog, "bob").await;
    let carol = user(&blog, "carol").await;

    let by_ada = blog
        .posts
        .create_instance(&doc(json!({"title": "By Ada", "author": hex(&ada)})))
        .await
        .unwrap();
    blog.comments
        .create_instance(&doc(json!({"body": "Nice", "post": hex(&by_ada)})))
        .await
        .unwrap();
    let by_bob = blog
        .posts
        .create_instance(&doc(json!({
            "title": "By Bob",
            "author": hex(&bob),
            "editor": hex(&ada),
            "readers": [hex(&ada), hex(&carol)],
        })))
        .await
        .unwrap();

    let removed = blog
        .users
        .remove_instances(&doc(json!({"name": "ada"})), DeletePolicy::Cascade)
        .await
        .expect("cascade");
    assert_eq!(removed, 3);
    assert_eq!(blog.comments.count(&Document::new()).await.unwrap(), 0);
    assert_eq!(blog.posts.count(&Document::new()).await.unwrap(), 1);

    let by_bob = reload(&blog.posts, &by_bob).await;
    assert_eq!(by_bob.schema().get("editor").unwrap().db_value(), &Value::Null);
    assert_eq!(
        by_bob.schema().get("readers").unwrap().db_value(),
        &json!([carol.id().unwrap().to_value()])
    );
}

#[tokio::test]
async fn removing_a_dependent_pulls_its_records() {
    let blog = blog().await;
    let ada = user(&blog, "ada").await;
    blog.posts
        .create_instance(&doc(json!({"title": "Short lived", "author": hex(&ada)})))
        .await
        .unwrap();

    let removed = blog
        .posts
        .remove_instances(&Document::new(), DeletePolicy::Restrict)
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let ada = reload(&blog.users, &ada).await;
    assert!(ada.dependencies(DependencyKind::Required).is_empty());
    blog.users
        .remove_instances(&Document::new(), DeletePolicy::Restrict)
        .await
        .expect("nothing depends on ada any more");
}

#[tokio::test]
async fn expansion_follows_keys_up_to_depth() {
    let blog = blog().await;
    let ada = user(&blog, "ada").await;
    let post = blog
        .posts
        .create_instance(&doc(json!({"title": "Hello", "author": hex(&ada)})))
        .await
        .unwrap();
    let comment = blog
        .comments
        .create_instance(&doc(json!({"body": "Nice", "post": hex(&post)})))
        .await
        .unwrap();

    let flat = comment.to_json(&JsonOptions::default()).await.unwrap();
    assert_eq!(flat["post"], json!(hex(&post)));

    let one = comment.to_json(&JsonOptions::expanded(1)).await.unwrap();
    assert_eq!(one["post"]["title"], json!("Hello"));
    assert_eq!(one["post"]["author"], json!(hex(&ada)));

    let two = comment.to_json(&JsonOptions::expanded(2)).await.unwrap();
    assert_eq!(two["post"]["author"]["name"], json!("ada"));

    let blacklisted = comment
        .to_json(&JsonOptions::expanded(2).with_blacklist(["users"]))
        .await
        .unwrap();
    assert_eq!(blacklisted["post"]["author"], json!(hex(&ada)));
}

#[tokio::test]
async fn expansion_stops_at_cycles() {
    let blog = blog().await;
    let ada = user(&blog, "ada").await;
    let post = blog
        .posts
        .create_instance(&doc(json!({"title": "Hello", "author": hex(&ada)})))
        .await
        .unwrap();
    let ada = blog
        .users
        .update_by_id(ada.id().unwrap(), &doc(json!({"favourite": hex(&post)})))
        .await
        .unwrap();

    let rendered = ada.to_json(&JsonOptions::expanded(10)).await.unwrap();
    assert_eq!(rendered["favourite"]["title"], json!("Hello"));
    assert_eq!(rendered["favourite"]["author"], json!(hex(&ada)));
}

#[tokio::test]
async fn expansion_of_a_vanished_target_is_null() {
    let blog = blog().await;
    let ada = user(&blog, "ada").await;
    let post = blog
        .posts
        .create_instance(&doc(json!({"title": "Hello", "author": hex(&ada)})))
        .await
        .unwrap();
    blog.users.delete_instances(&Document::new()).await.unwrap();

    let rendered = post.to_json(&JsonOptions::expanded(1)).await.unwrap();
    assert_eq!(rendered["author"], Value::Null);
}

#[tokio::test]
async fn id_lists_expand_to_documents_still_present() {
    let blog = blog().await;
    let ada = user(&blog, "ada").await;
    let bob = user(&blog, "bob").await;
    let post = blog
        .posts
        .create_instance(&doc(json!({
            "title": "Hello",
            "author": hex(&ada),
            "readers": [hex(&ada), hex(&bob)],
        })))
        .await
        .unwrap();

    let rendered = post.to_json(&JsonOptions::expanded(1)).await.unwrap();
    assert_eq!(rendered["readers"][0]["name"], json!("ada"));
    assert_eq!(rendered["readers"][1]["name"], json!("bob"));

    blog.users
        .delete_instances(&doc(json!({"name": "bob"})))
        .await
        .unwrap();
    let rendered = post.to_json(&JsonOptions::expanded(1)).await.unwrap();
    assert_eq!(rendered["readers"].as_array().map(Vec::len), Some(1));
    assert_eq!(rendered["readers"][0]["name"], json!("ada"));
}

#[tokio::test]
async fn failed_dependency_writes_undo_the_insert() {
    let blog = blog().await;
    let raw = blog
        .store
        .collection("users")
        .await
        .unwrap()
        .expect("users collection");
    let ids = raw
        .insert_many(vec![doc(json!({
            "name": "mallory",
            "favourite": null,
            "_requiredDependencies": "not a list",
        }))])
        .await
        .unwrap();

    let err = blog
        .posts
        .create_instance(&doc(json!({"title": "Hello", "author": ids[0].to_hex()})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Store(StoreError::InvalidUpdate(_))));
    assert_eq!(blog.posts.count(&Document::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn models_outliving_their_registry_fail_loudly() {
    let Blog {
        store: _store,
        registry,
        users,
        posts,
        comments: _comments,
    } = blog().await;
    let ada = users
        .create_instance(&doc(json!({"name": "ada"})))
        .await
        .unwrap();
    let post = posts
        .create_instance(&doc(json!({"title": "Hello", "author": hex(&ada)})))
        .await
        .unwrap();
    drop(registry);

    let err = posts
        .create_instance(&doc(json!({"title": "Again", "author": hex(&ada)})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Detached(ref name) if name == "posts"));
    assert_eq!(err.to_string(), "model 'posts' has outlived its registry");
    assert_eq!(posts.count(&Document::new()).await.unwrap(), 1);

    let err = users
        .remove_instances(&doc(json!({"name": "ada"})), DeletePolicy::Cascade)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Detached(_)));
    assert_eq!(users.count(&Document::new()).await.unwrap(), 1);
    assert_eq!(posts.count(&Document::new()).await.unwrap(), 1);

    assert!(matches!(
        post.to_json(&JsonOptions::expanded(1)).await,
        Err(Error::Detached(_))
    ));

    users
        .create_instance(&doc(json!({"name": "bob"})))
        .await
        .expect("no references to follow");
}
