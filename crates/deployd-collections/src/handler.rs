//! The Collection Handler (spec.md §4.3): implements the four verbs
//! uniformly against a [`CollectionConfig`] and a [`Store`].

use std::sync::Arc;

use deployd_core::{Document, EngineError, EventContext, Identity, Method};
use deployd_pipeline::{list_get_outcome, skip_events_applies, HookSpec, ListGetOutcome, Pipeline};
use deployd_schema::{apply_defaults, coerce_document, validate, CollectionConfig, HookKind};
use deployd_storage::{sanitize_filter, DeleteResult, Filter, Store, UpdateSpec};

use crate::hook_sources::HookSources;
use crate::operator_update::{is_command_update, parse_update_spec};
use crate::query_options::{apply_projection, extract_skip_events, parse_find_options};

pub struct CollectionService {
    config: CollectionConfig,
    store: Arc<dyn Store>,
    pipeline: Arc<Pipeline>,
    hook_sources: HookSources,
}

impl CollectionService {
    pub fn new(config: CollectionConfig, store: Arc<dyn Store>, pipeline: Arc<Pipeline>, hook_sources: HookSources) -> Self {
        CollectionService {
            config,
            store,
            pipeline,
            hook_sources,
        }
    }

    fn hook_spec(&self, hook: HookKind) -> HookSpec<'_> {
        HookSpec {
            collection: &self.config.name,
            hook,
            runtime: self.config.runtime_for(hook),
            source: self.hook_sources.get(hook),
        }
    }

    fn cancel_error(ctx: &EventContext) -> EngineError {
        let cancellation = ctx.cancellation().expect("caller checked is_cancelled");
        EngineError::Cancel {
            message: cancellation.message.clone(),
            status: cancellation.status,
        }
    }

    fn schedule_after_commit(&self, ctx: EventContext) {
        deployd_pipeline::after_commit::schedule(
            self.pipeline.clone(),
            self.config.name.clone(),
            self.config.runtime_for(HookKind::AfterCommit),
            self.hook_sources.get(HookKind::AfterCommit).map(str::to_string),
            ctx,
        );
    }

    pub async fn get_by_id(&self, id: &str, raw_query: &Document, identity: Option<Identity>) -> Result<Document, EngineError> {
        let document = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("no document with id {id:?}")))?;

        let mut ctx = EventContext::new(Method::Get, document, raw_query.clone(), identity);
        self.pipeline.execute(self.hook_spec(HookKind::BeforeRequest), &mut ctx).await?;
        if ctx.is_cancelled() {
            return Err(Self::cancel_error(&ctx));
        }

        self.pipeline.execute(self.hook_spec(HookKind::Get), &mut ctx).await?;
        if ctx.is_cancelled() {
            return Err(Self::cancel_error(&ctx));
        }
        Ok(ctx.visible_document())
    }

    pub async fn get_list(&self, raw_query: &Document, identity: Option<Identity>) -> Result<Vec<Document>, EngineError> {
        let mut before_ctx = EventContext::new(Method::Get, Document::new(), raw_query.clone(), identity.clone());
        self.pipeline
            .execute(self.hook_spec(HookKind::BeforeRequest), &mut before_ctx)
            .await?;
        if before_ctx.is_cancelled() {
            return Err(Self::cancel_error(&before_ctx));
        }

        let skip_events = skip_events_applies(
            extract_skip_events(raw_query),
            identity.as_ref().is_some_and(|i| i.is_root),
        );
        let options = parse_find_options(raw_query);
        let filter = sanitize_filter(&self.config, raw_query);
        let documents = self.store.find(&filter, &options).await?;

        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            let visible = if skip_events {
                document
            } else {
                let mut ctx = EventContext::new(Method::Get, document, raw_query.clone(), identity.clone());
                self.pipeline.execute(self.hook_spec(HookKind::Get), &mut ctx).await?;
                match list_get_outcome(&ctx) {
                    ListGetOutcome::Drop => continue,
                    ListGetOutcome::Keep => ctx.visible_document(),
                }
            };
            results.push(apply_projection(visible, options.fields.as_deref()));
        }
        Ok(results)
    }

    pub async fn post(&self, body: Document, identity: Option<Identity>) -> Result<Document, EngineError> {
        let mut document = body;
        coerce_document(&self.config, &mut document);
        let schema_errors = validate(&self.config, &document, true);
        apply_defaults(&self.config, &mut document);

        let mut ctx = EventContext::new(Method::Post, document, Document::new(), identity);
        for (field, message) in schema_errors {
            ctx.error(field, message);
        }

        self.pipeline.execute(self.hook_spec(HookKind::BeforeRequest), &mut ctx).await?;
        if ctx.is_cancelled() {
            return Err(Self::cancel_error(&ctx));
        }

        self.pipeline.execute(self.hook_spec(HookKind::Validate), &mut ctx).await?;
        if ctx.is_cancelled() {
            return Err(Self::cancel_error(&ctx));
        }
        if ctx.has_errors() {
            return Err(EngineError::Validation(ctx.errors().clone()));
        }

        self.pipeline.execute(self.hook_spec(HookKind::Post), &mut ctx).await?;
        if ctx.is_cancelled() {
            return Err(Self::cancel_error(&ctx));
        }

        let hidden = ctx.hidden_fields().clone();
        let inserted = if self.config.no_store {
            ctx.document.clone()
        } else {
            self.store.insert(ctx.document.clone()).await?
        };

        let response = inserted.without_hidden(&hidden);
        ctx.document = inserted;
        self.schedule_after_commit(ctx);
        Ok(response)
    }

    pub async fn put(
        &self,
        id: &str,
        raw_query: &Document,
        body: Document,
        identity: Option<Identity>,
    ) -> Result<Document, EngineError> {
        let previous = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("no document with id {id:?}")))?;

        if is_command_update(&body) {
            self.put_command(id, raw_query, previous, &body, identity).await
        } else {
            self.put_merge(id, raw_query, previous, body, identity).await
        }
    }

    async fn put_merge(
        &self,
        id: &str,
        raw_query: &Document,
        previous: Document,
        mut body: Document,
        identity: Option<Identity>,
    ) -> Result<Document, EngineError> {
        coerce_document(&self.config, &mut body);
        let merged = previous.merge_over(&body);
        let schema_errors = validate(&self.config, &merged, false);

        let mut ctx = EventContext::new(Method::Put, merged, raw_query.clone(), identity);
        for (field, message) in schema_errors {
            ctx.error(field, message);
        }

        self.pipeline.execute(self.hook_spec(HookKind::BeforeRequest), &mut ctx).await?;
        if ctx.is_cancelled() {
            return Err(Self::cancel_error(&ctx));
        }

        self.pipeline.execute(self.hook_spec(HookKind::Validate), &mut ctx).await?;
        if ctx.is_cancelled() {
            return Err(Self::cancel_error(&ctx));
        }
        if ctx.has_errors() {
            return Err(EngineError::Validation(ctx.errors().clone()));
        }

        self.pipeline.execute(self.hook_spec(HookKind::Put), &mut ctx).await?;
        if ctx.is_cancelled() {
            return Err(Self::cancel_error(&ctx));
        }

        let hidden = ctx.hidden_fields().clone();
        if !self.config.no_store {
            let spec = UpdateSpec::from_full_document(&ctx.document);
            self.store.update_one(&id_filter(id), &spec).await?;
        }
        let response = ctx.document.without_hidden(&hidden);
        self.schedule_after_commit(ctx);
        Ok(response)
    }

    async fn put_command(
        &self,
        id: &str,
        raw_query: &Document,
        previous: Document,
        body: &Document,
        identity: Option<Identity>,
    ) -> Result<Document, EngineError> {
        let spec = parse_update_spec(body);
        let mut preview = previous;
        deployd_storage::update::apply(&mut preview, &spec);

        let mut ctx = EventContext::new(Method::Put, preview, raw_query.clone(), identity);

        self.pipeline.execute(self.hook_spec(HookKind::BeforeRequest), &mut ctx).await?;
        if ctx.is_cancelled() {
            return Err(Self::cancel_error(&ctx));
        }

        self.pipeline.execute(self.hook_spec(HookKind::Validate), &mut ctx).await?;
        if ctx.is_cancelled() {
            return Err(Self::cancel_error(&ctx));
        }
        if ctx.has_errors() {
            return Err(EngineError::Validation(ctx.errors().clone()));
        }

        self.pipeline.execute(self.hook_spec(HookKind::Put), &mut ctx).await?;
        if ctx.is_cancelled() {
            return Err(Self::cancel_error(&ctx));
        }

        if !self.config.no_store {
            self.store.update_one(&id_filter(id), &spec).await?;
        }
        let final_document = self
            .store
            .find_by_id(id)
            .await?
            .unwrap_or_else(|| ctx.document.clone());
        let response = final_document.without_hidden(ctx.hidden_fields());
        ctx.document = final_document;
        self.schedule_after_commit(ctx);
        Ok(response)
    }

    pub async fn delete(&self, id: &str, raw_query: &Document, identity: Option<Identity>) -> Result<DeleteResult, EngineError> {
        let document = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("no document with id {id:?}")))?;

        let mut ctx = EventContext::new(Method::Delete, document, raw_query.clone(), identity);
        self.pipeline.execute(self.hook_spec(HookKind::BeforeRequest), &mut ctx).await?;
        if ctx.is_cancelled() {
            return Err(Self::cancel_error(&ctx));
        }

        self.pipeline.execute(self.hook_spec(HookKind::Delete), &mut ctx).await?;
        if ctx.is_cancelled() {
            return Err(Self::cancel_error(&ctx));
        }

        let result = if self.config.no_store {
            DeleteResult { deleted: 1 }
        } else {
            self.store.remove(&id_filter(id)).await?
        };
        self.schedule_after_commit(ctx);
        Ok(result)
    }

    pub async fn count(&self, raw_query: &Document) -> Result<u64, EngineError> {
        let filter = sanitize_filter(&self.config, raw_query);
        self.store.count(&filter).await
    }
}

fn id_filter(id: &str) -> Filter {
    Filter::new().eq("id", deployd_core::Value::from(id))
}
