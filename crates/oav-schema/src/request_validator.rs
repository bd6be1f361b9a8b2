//! # Request Validator
//!
//! [`RequestValidator`] is the public entry point. It owns the operation
//! source (a live document or a loaded artifact), the options, the schema
//! engine, and two caches:
//!
//! - the validator cache, `OperationKey -> Option<Arc<Validator>>`, where
//!   `None` is the pass-through entry for unknown routes;
//! - the compiled-schema cache, `SchemaFingerprint -> Arc<CompiledSchema>`,
//!   so equivalent schemas share one compiled predicate.
//!
//! ## Concurrency
//!
//! Each key owns a [`CacheSlot`] holding a `tokio::sync::OnceCell`. The slot
//! map is a `parking_lot::Mutex` held only while looking up or inserting a
//! slot, never across an `.await`. Concurrent first requests for one key
//! await the same initialization, so a key is compiled at most once. A failed
//! compilation leaves the cell empty and the key returns to
//! [`CompileState::Uncompiled`].
//!
//! Both caches are append-only. The key includes the request's media type,
//! so every distinct Content-Type a client sends to a declared route adds a
//! slot and a [`Validator`]; the slot map is unbounded. Keys whose media
//! types negotiate to the same body share one compiled predicate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use oav_core::{
    fingerprint, ContentType, NormalizedRequest, OpenApiRequest, OperationKey,
    RequestValidationError, SchemaFingerprint, ValidatorOptions,
};

use crate::artifact::LoadedArtifact;
use crate::body::negotiate;
use crate::document::ApiDocument;
use crate::engine::{CompiledSchema, SchemaEngine};
use crate::node::SchemaResolver;
use crate::parameters::ParameterDescriptor;
use crate::plan::OperationPlan;
use crate::validation_schema::ValidationSchema;
use crate::validator::{Validator, ValidatorOrigin, ValidatorParts};

/// Compilation progress of one operation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileState {
    /// Never requested, or the last attempt failed.
    Uncompiled,
    /// A compilation is in progress.
    Compiling,
    /// Compiled (or resolved to a pass-through); terminal.
    Ready,
}

#[derive(Debug, Default)]
struct CacheSlot {
    cell: OnceCell<Option<Arc<Validator>>>,
    compiling: AtomicBool,
}

#[derive(Debug)]
enum OperationSource {
    Live(ApiDocument),
    Artifact(LoadedArtifact),
}

/// Validates requests against the operations of one OpenAPI document.
#[derive(Debug)]
pub struct RequestValidator {
    source: OperationSource,
    options: ValidatorOptions,
    engine: SchemaEngine,
    /// `{"components": ...}`; the root every schema reference resolves in.
    components_root: Value,
    slots: Mutex<HashMap<OperationKey, Arc<CacheSlot>>>,
    compiled: Mutex<HashMap<SchemaFingerprint, Arc<CompiledSchema>>>,
}

impl RequestValidator {
    /// A validator that assembles schemas from `document` on first use.
    pub fn from_document(document: ApiDocument, options: ValidatorOptions) -> Self {
        let components_root = json!({ "components": document.components() });
        Self {
            engine: SchemaEngine::new(&options),
            source: OperationSource::Live(document),
            options,
            components_root,
            slots: Mutex::new(HashMap::new()),
            compiled: Mutex::new(HashMap::new()),
        }
    }

    /// A validator backed by a loaded artifact. Its precompiled schemas seed
    /// the compiled-schema cache.
    pub(crate) fn from_artifact(
        artifact: LoadedArtifact,
        compiled: HashMap<SchemaFingerprint, Arc<CompiledSchema>>,
        engine: SchemaEngine,
        options: ValidatorOptions,
    ) -> Self {
        let components_root = json!({ "components": artifact.components().clone() });
        Self {
            source: OperationSource::Artifact(artifact),
            options,
            engine,
            components_root,
            slots: Mutex::new(HashMap::new()),
            compiled: Mutex::new(compiled),
        }
    }

    /// The options this validator was built with.
    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    /// Validate `request` and return its normalized form.
    ///
    /// Requests for routes or methods the document does not declare pass
    /// through with only header names lower-cased.
    ///
    /// # Errors
    ///
    /// [`RequestValidationError::BadRequest`] for non-conforming requests;
    /// [`RequestValidationError::StructuralSpec`] when the operation's
    /// declaration cannot be compiled.
    pub async fn validate(
        &self,
        request: OpenApiRequest,
    ) -> Result<NormalizedRequest, RequestValidationError> {
        let content_type = ContentType::from_headers(request.headers.as_ref());
        let key = OperationKey::new(&request.method, &request.route, &content_type);
        tracing::trace!(%key, "derived operation key");

        match self
            .validator_for(&key, &request.method, &request.route, &content_type)
            .await?
        {
            Some(validator) => validator.validate(&request, &self.options),
            None => Ok(NormalizedRequest::from_request(&request)),
        }
    }

    /// The cached validator for `key`, compiling it on first use. `None`
    /// means the route or method is not declared.
    pub async fn validator_for(
        &self,
        key: &OperationKey,
        method: &str,
        route: &str,
        content_type: &ContentType,
    ) -> Result<Option<Arc<Validator>>, RequestValidationError> {
        let slot = self.slot(key);
        let entry = slot
            .cell
            .get_or_try_init(|| async {
                slot.compiling.store(true, Ordering::Release);
                let built = self.build(key, method, route, content_type);
                slot.compiling.store(false, Ordering::Release);
                built.map(|validator| validator.map(Arc::new))
            })
            .await?;
        Ok(entry.clone())
    }

    /// Compilation progress of `key`.
    pub fn compile_state(&self, key: &OperationKey) -> CompileState {
        let Some(slot) = self.slots.lock().get(key).cloned() else {
            return CompileState::Uncompiled;
        };
        if slot.cell.initialized() {
            CompileState::Ready
        } else if slot.compiling.load(Ordering::Acquire) {
            CompileState::Compiling
        } else {
            CompileState::Uncompiled
        }
    }

    /// The validator cached for `key`, without compiling.
    pub fn cached(&self, key: &OperationKey) -> Option<Arc<Validator>> {
        let slot = self.slots.lock().get(key).cloned()?;
        slot.cell.get().cloned().flatten()
    }

    /// Keys whose slot has been initialized, sorted.
    pub fn cached_keys(&self) -> Vec<OperationKey> {
        let mut keys: Vec<OperationKey> = self
            .slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.cell.initialized())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of distinct compiled predicates.
    pub fn compiled_schema_count(&self) -> usize {
        self.compiled.lock().len()
    }

    fn slot(&self, key: &OperationKey) -> Arc<CacheSlot> {
        let mut slots = self.slots.lock();
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn build(
        &self,
        key: &OperationKey,
        method: &str,
        route: &str,
        content_type: &ContentType,
    ) -> Result<Option<Validator>, RequestValidationError> {
        let resolver = SchemaResolver::new(&self.components_root);
        let content_class = content_type.key_class();

        let (record, origin) = match &self.source {
            OperationSource::Live(document) => {
                let Some(op) = document.operation(method, route) else {
                    tracing::debug!(%key, "no declared operation; passing through");
                    return Ok(None);
                };
                let plan = OperationPlan::assemble(
                    document,
                    &op,
                    resolver,
                    self.options.allow_unknown_query_parameters,
                )?;
                let (schema, media_type) = plan.schema_for(resolver, content_type);
                let fp = schema_fingerprint(route, &schema)?;
                (
                    Assembled {
                        method: plan.method,
                        route: plan.route,
                        media_type,
                        descriptors: plan.descriptors,
                        schema,
                        fingerprint: fp,
                    },
                    ValidatorOrigin::Live,
                )
            }
            OperationSource::Artifact(artifact) => {
                let Some(operation) = artifact.operation(method, route) else {
                    tracing::debug!(%key, "no compiled operation; passing through");
                    return Ok(None);
                };
                let selected = negotiate(&operation.media_types, content_type).map(str::to_string);
                let fp = artifact
                    .fingerprint_for(key)
                    .or_else(|| operation.variants.get(selected.as_deref().unwrap_or_default()))
                    .cloned()
                    .ok_or_else(|| {
                        RequestValidationError::artifact(
                            artifact.path().display(),
                            format!("no schema variant for key '{key}'"),
                        )
                    })?;
                let schema = artifact.schema(&fp).cloned().ok_or_else(|| {
                    RequestValidationError::artifact(
                        artifact.path().display(),
                        format!("missing schema '{fp}'"),
                    )
                })?;
                (
                    Assembled {
                        method: operation.method.clone(),
                        route: operation.route.clone(),
                        media_type: selected,
                        descriptors: operation.parameters.clone(),
                        schema,
                        fingerprint: fp,
                    },
                    ValidatorOrigin::Artifact,
                )
            }
        };

        let compiled = self.compiled_schema(&record.route, &record.fingerprint, &record.schema)?;
        tracing::debug!(
            %key,
            fingerprint = %record.fingerprint,
            origin = ?origin,
            "compiled operation validator"
        );
        Ok(Some(Validator::new(ValidatorParts {
            key: key.clone(),
            method: record.method,
            route: record.route,
            content_class,
            media_type: record.media_type,
            origin,
            descriptors: record.descriptors,
            schema: record.schema,
            fingerprint: record.fingerprint,
            compiled,
        })))
    }

    /// The shared predicate for `fp`. Compilation runs outside the cache
    /// lock; when two keys race on one fingerprint the first insert wins.
    fn compiled_schema(
        &self,
        route: &str,
        fp: &SchemaFingerprint,
        schema: &ValidationSchema,
    ) -> Result<Arc<CompiledSchema>, RequestValidationError> {
        if let Some(existing) = self.compiled.lock().get(fp) {
            return Ok(Arc::clone(existing));
        }
        let components = self
            .components_root
            .get("components")
            .cloned()
            .unwrap_or_else(|| json!({}));
        let predicate = self
            .engine
            .compile(schema.to_engine_schema(&components))
            .map_err(|e| RequestValidationError::structural(route, e.to_string()))?;
        let mut compiled = self.compiled.lock();
        let shared = compiled
            .entry(fp.clone())
            .or_insert_with(|| Arc::new(predicate));
        Ok(Arc::clone(shared))
    }
}

struct Assembled {
    method: String,
    route: String,
    media_type: Option<String>,
    descriptors: Vec<ParameterDescriptor>,
    schema: ValidationSchema,
    fingerprint: SchemaFingerprint,
}

pub(crate) fn schema_fingerprint(
    route: &str,
    schema: &ValidationSchema,
) -> Result<SchemaFingerprint, RequestValidationError> {
    fingerprint(schema).map_err(|e| RequestValidationError::structural(route, e.to_string()))
}
