//! Document-store backend (spec.md §4.7 "Backends: document store"):
//! operators pass through to MongoDB's own query language with a thin
//! renaming, rather than being compiled to a string like the SQL backends.

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document as BsonDocument};
use mongodb::options::FindOptions as MongoFindOptions;
use mongodb::Collection;

use deployd_core::{Document, EngineError, Value};

use crate::filter::{CompareOp, Condition, Filter, FindOptions, UpdateOp, UpdateSpec};
use crate::store::{DeleteResult, Store, UpdateResult};

pub struct MongoStore {
    collection: Collection<BsonDocument>,
}

impl MongoStore {
    pub fn new(collection: Collection<BsonDocument>) -> Self {
        MongoStore { collection }
    }
}

fn value_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => Bson::Double(*n),
        Value::String(s) => Bson::String(s.clone()),
        Value::Date(d) => Bson::DateTime(mongodb::bson::DateTime::from_chrono(*d)),
        Value::Array(items) => Bson::Array(items.iter().map(value_to_bson).collect()),
        Value::Object(doc) => Bson::Document(document_to_bson(doc)),
    }
}

fn bson_to_value(bson: &Bson) -> Value {
    match bson {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Double(n) => Value::Number(*n),
        Bson::Int32(n) => Value::Number(*n as f64),
        Bson::Int64(n) => Value::Number(*n as f64),
        Bson::String(s) => Value::String(s.clone()),
        Bson::DateTime(d) => Value::Date(d.to_chrono()),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_value).collect()),
        Bson::Document(doc) => Value::Object(bson_to_document(doc)),
        other => Value::String(other.to_string()),
    }
}

fn document_to_bson(document: &Document) -> BsonDocument {
    let mut out = BsonDocument::new();
    for (key, value) in document.iter() {
        out.insert(key.clone(), value_to_bson(value));
    }
    out
}

fn bson_to_document(bson: &BsonDocument) -> Document {
    let mut out = Document::new();
    for (key, value) in bson.iter() {
        out.insert(key.clone(), bson_to_value(value));
    }
    out
}

fn filter_to_bson(filter: &Filter) -> BsonDocument {
    let mut out = BsonDocument::new();
    for (field, condition) in filter.iter() {
        let clause = match condition {
            Condition::Compare(CompareOp::Eq, value) => value_to_bson(value),
            Condition::Compare(op, value) => {
                let op_name = match op {
                    CompareOp::Ne => "$ne",
                    CompareOp::Lt => "$lt",
                    CompareOp::Lte => "$lte",
                    CompareOp::Gt => "$gt",
                    CompareOp::Gte => "$gte",
                    CompareOp::Eq => unreachable!(),
                };
                Bson::Document(doc! { op_name: value_to_bson(value) })
            }
            Condition::In(values) => Bson::Document(doc! { "$in": values.iter().map(value_to_bson).collect::<Vec<_>>() }),
            Condition::NotIn(values) => Bson::Document(doc! { "$nin": values.iter().map(value_to_bson).collect::<Vec<_>>() }),
            Condition::Regex(pattern) => Bson::Document(doc! { "$regex": pattern.clone() }),
            Condition::Exists(present) => Bson::Document(doc! { "$exists": *present }),
        };
        out.insert(field.clone(), clause);
    }
    out
}

fn update_to_bson(spec: &UpdateSpec) -> BsonDocument {
    let mut set_doc = BsonDocument::new();
    let mut inc_doc = BsonDocument::new();
    let mut unset_doc = BsonDocument::new();
    let mut push_doc = BsonDocument::new();
    let mut pull_doc = BsonDocument::new();
    let mut add_to_set_doc = BsonDocument::new();

    for (field, op) in spec.iter() {
        match op {
            UpdateOp::Set(value) => {
                set_doc.insert(field.clone(), value_to_bson(value));
            }
            UpdateOp::Inc(amount) => {
                inc_doc.insert(field.clone(), Bson::Double(*amount));
            }
            UpdateOp::Unset => {
                unset_doc.insert(field.clone(), Bson::String(String::new()));
            }
            UpdateOp::Push(value) => {
                push_doc.insert(field.clone(), value_to_bson(value));
            }
            UpdateOp::Pull(value) => {
                pull_doc.insert(field.clone(), value_to_bson(value));
            }
            UpdateOp::AddToSet(value) => {
                add_to_set_doc.insert(field.clone(), value_to_bson(value));
            }
        }
    }

    let mut out = BsonDocument::new();
    if !set_doc.is_empty() {
        out.insert("$set", set_doc);
    }
    if !inc_doc.is_empty() {
        out.insert("$inc", inc_doc);
    }
    if !unset_doc.is_empty() {
        out.insert("$unset", unset_doc);
    }
    if !push_doc.is_empty() {
        out.insert("$push", push_doc);
    }
    if !pull_doc.is_empty() {
        out.insert("$pull", pull_doc);
    }
    if !add_to_set_doc.is_empty() {
        out.insert("$addToSet", add_to_set_doc);
    }
    out
}

#[async_trait]
impl Store for MongoStore {
    async fn insert(&self, mut document: Document) -> Result<Document, EngineError> {
        let id = document.id().map(str::to_string).unwrap_or_else(|| self.create_unique_identifier());
        document.insert("id", Value::from(id));
        self.collection
            .insert_one(document_to_bson(&document))
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(document)
    }

    async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>, EngineError> {
        let mut mongo_options = MongoFindOptions::default();
        if !options.sort.is_empty() {
            let mut sort_doc = BsonDocument::new();
            for (field, ascending) in &options.sort {
                sort_doc.insert(field.clone(), if *ascending { 1 } else { -1 });
            }
            mongo_options.sort = Some(sort_doc);
        }
        mongo_options.limit = options.limit.map(|n| n as i64);
        mongo_options.skip = options.skip;

        let mut cursor = self
            .collection
            .find(filter_to_bson(filter))
            .with_options(mongo_options)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(result) = futures::StreamExt::next(&mut cursor).await {
            let bson_doc = result.map_err(|e| EngineError::Store(e.to_string()))?;
            out.push(bson_to_document(&bson_doc));
        }
        Ok(out)
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, EngineError> {
        let result = self
            .collection
            .find_one(filter_to_bson(filter))
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(result.map(|doc| bson_to_document(&doc)))
    }

    async fn update(&self, filter: &Filter, update_spec: &UpdateSpec) -> Result<UpdateResult, EngineError> {
        let result = self
            .collection
            .update_many(filter_to_bson(filter), update_to_bson(update_spec))
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(UpdateResult {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn update_one(&self, filter: &Filter, update_spec: &UpdateSpec) -> Result<UpdateResult, EngineError> {
        let result = self
            .collection
            .update_one(filter_to_bson(filter), update_to_bson(update_spec))
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(UpdateResult {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn remove(&self, filter: &Filter) -> Result<DeleteResult, EngineError> {
        let result = self
            .collection
            .delete_many(filter_to_bson(filter))
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(DeleteResult {
            deleted: result.deleted_count,
        })
    }

    async fn count(&self, filter: &Filter) -> Result<u64, EngineError> {
        self.collection
            .count_documents(filter_to_bson(filter))
            .await
            .map_err(|e| EngineError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_condition_renders_as_bare_value() {
        let filter = Filter::new().eq("title", Value::from("milk"));
        let bson = filter_to_bson(&filter);
        assert_eq!(bson.get("title"), Some(&Bson::String("milk".to_string())));
    }

    #[test]
    fn comparison_condition_renders_as_operator_document() {
        let filter = Filter::new().where_cond("priority", Condition::Compare(CompareOp::Gt, Value::Number(2.0)));
        let bson = filter_to_bson(&filter);
        let nested = bson.get_document("priority").unwrap();
        assert_eq!(nested.get("$gt"), Some(&Bson::Double(2.0)));
    }

    #[test]
    fn update_spec_groups_by_operator() {
        let spec = UpdateSpec::new().set("title", Value::from("milk")).inc("count", 1.0);
        let bson = update_to_bson(&spec);
        assert!(bson.contains_key("$set"));
        assert!(bson.contains_key("$inc"));
    }
}
