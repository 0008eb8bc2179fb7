//! Verb handlers of model backed resources.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::database::model::Visibility;
use crate::database::{ModelDef, Object, Query, Relationship, Session, ID};
use crate::error::ApiError;
use crate::filter::{apply_filters, FilterScope, QueryFilterError};
use crate::middleware::{ApiResponse, ApiResult};
use crate::resource::base::{ResourceDef, ResourceRequest};
use crate::resource::registry::ResourceRegistry;
use crate::resource::route::{RequestMethod, RouteType};
use crate::resource::{CollectionMode, Handler};
use crate::schemas::{Mode, Schema, ValidationError};
use crate::security::Identity;

/// How included related objects are serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IncludeMode {
    /// Primary keys only
    Pk,
    /// Complete objects
    Full,
}

/// A resource bound to one request.
///
/// Created by the route directive for every call with the request's
/// transaction; the verb handlers and actions run against it.
pub struct ModelResource {
    def: Arc<ResourceDef>,
    request: ResourceRequest,
    identity: Identity,
    session: Session,
    config: Arc<AppConfig>,
    registry: Arc<ResourceRegistry>,
}

impl ModelResource {
    pub fn new(
        def: Arc<ResourceDef>,
        request: ResourceRequest,
        identity: Identity,
        session: Session,
        config: Arc<AppConfig>,
        registry: Arc<ResourceRegistry>,
    ) -> Self {
        Self {
            def,
            request,
            identity,
            session,
            config,
            registry,
        }
    }

    /// Give back the session so the caller can commit or roll back
    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn def(&self) -> &ResourceDef {
        &self.def
    }

    pub fn request(&self) -> &ResourceRequest {
        &self.request
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn model(&self) -> &'static ModelDef {
        self.def.model
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn collection_mode(&self) -> CollectionMode {
        self.request.collection_mode(self.config.api.collection_mode)
    }

    pub fn filter_scope(&self) -> FilterScope<'_> {
        FilterScope::new(&self.request, &self.identity, &self.config)
    }

    /// Run every applicable query filter, in declaration order
    pub fn apply_filters(&self, query: Query) -> Result<Query, QueryFilterError> {
        apply_filters(&self.def.query_filters, query, &self.filter_scope())
    }

    /// Restrict a query over the target of `relationship` with the filters of
    /// the resource registered for the target model.
    ///
    /// The target filters see a related request on `parent_id` made with
    /// `method`; targets without a registered resource are not filtered.
    fn scope_related(
        &self,
        relationship: &Relationship,
        parent_id: i64,
        method: RequestMethod,
        query: Query,
    ) -> Result<Query, QueryFilterError> {
        let Some(target) = self.registry.for_model(relationship.target) else {
            return Ok(query);
        };
        let request = ResourceRequest::new(method, RouteType::Related).with_path(
            Some(parent_id.to_string()),
            Some(relationship.name.to_string()),
            None,
        );
        let scope = FilterScope::new(&request, &self.identity, &self.config);
        apply_filters(&target.def().query_filters, query, &scope)
    }

    /// Related objects of `id` visible through the target resource
    pub async fn related_objects(
        &mut self,
        model: &'static ModelDef,
        relationship: &'static Relationship,
        id: i64,
    ) -> Result<Vec<Object>, ApiError> {
        let query = self.scope_related(relationship, id, RequestMethod::Get, relationship.query(model, id))?;
        Ok(self.session.all(&query).await?)
    }

    /// Ids among `ids` the current user may link to or unlink from `id`
    pub async fn related_targets(
        &mut self,
        relationship: &'static Relationship,
        id: i64,
        ids: Vec<i64>,
    ) -> Result<Vec<i64>, ApiError> {
        let query = self.scope_related(relationship, id, self.request.method, relationship.target.query().ids(&ids))?;
        let allowed: HashSet<i64> = self.session.ids(&query).await?.into_iter().collect();
        Ok(ids.into_iter().filter(|id| allowed.contains(id)).collect())
    }

    /// Filtered query over the resource model
    pub fn filtered_query(&self) -> Result<Query, QueryFilterError> {
        self.apply_filters(self.model().query())
    }

    /// Object addressed by the `pk` of a member or related request
    pub async fn get_object(&mut self) -> Result<Object, ApiError> {
        let model = self.model();
        let pk = self
            .request
            .pk_value()
            .ok_or_else(|| ApiError::not_found(format!("{} not found", model.name)))?;

        let query = self.filtered_query()?.ids(&[pk]);
        self.session
            .first(&query)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("{} with id {} not found", model.name, pk)))
    }

    /// Validated request body items.
    ///
    /// Lists are accepted in any mode; a single object only in permissive mode.
    /// The flag tells whether a single object was submitted.
    fn submitted_items(&self) -> Result<(Vec<Value>, bool), ApiError> {
        match self.request.request_data()? {
            Value::Array(items) => Ok((items.clone(), false)),
            data @ Value::Object(_) if self.collection_mode() == CollectionMode::Permissive => {
                Ok((vec![data.clone()], true))
            }
            _ => Err(ApiError::CollectionExpected),
        }
    }

    /// Deserialize items with a schema, prefixing error fields with the item
    /// index for list submissions
    fn deserialize_items(
        &self,
        schema: &Schema,
        items: &[Value],
        mode: Mode,
        single: bool,
    ) -> Result<Vec<Object>, ValidationError> {
        let mut errors = ValidationError::new();
        let mut objects = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            match schema.deserialize(item, mode, &self.identity) {
                Ok(object) => objects.push(object),
                Err(e) => {
                    for (field, message) in e.fields {
                        errors.add(item_key(index, &field, single), message);
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(objects)
        } else {
            Err(errors)
        }
    }

    /// Fill the owner column with the current user when it was not submitted
    fn default_owner(&self, values: &mut Object) {
        let (Some(column), Some(user_id)) = (self.model().owner_column, self.identity.user_id()) else {
            return;
        };
        let missing = values.get(column).map(Value::is_null).unwrap_or(true);
        if missing {
            values.insert(column.to_string(), Value::from(user_id));
        }
    }

    fn paginate(&self, query: Query) -> Result<Query, QueryFilterError> {
        let limit = window_param(&self.request, "limit")?;
        let offset = window_param(&self.request, "offset")?;

        let limit = match (limit, self.config.filter.max_limit) {
            (Some(limit), Some(max)) if limit > max => {
                warn!("Requested limit {} exceeds maximum, using {}", limit, max);
                Some(max)
            }
            (None, max) => max,
            (limit, _) => limit,
        };

        Ok(match (limit, offset) {
            (Some(limit), offset) => query.limit(limit, offset),
            (None, Some(offset)) => query.offset(offset),
            (None, None) => query,
        })
    }

    /// Relationship named by the related request, when the model declares it
    fn relationship(&self) -> Result<&'static Relationship, ApiError> {
        let model = self.model();
        let name = self.request.related_name().unwrap_or_default();
        model
            .relationship(name)
            .ok_or_else(|| ApiError::not_found(format!("{} has no related '{}'", model.name, name)))
    }

    /// Parse the body of a related mutation into primary keys
    fn related_ids(&self) -> Result<Vec<i64>, ApiError> {
        let Value::Array(items) = self.request.request_data()? else {
            return Err(ApiError::CollectionExpected);
        };
        parse_ids(items)
    }

    fn include_specs(&self, model: &'static ModelDef) -> Vec<(&'static Relationship, IncludeMode)> {
        let mut specs = vec![];
        for include in self.request.includes() {
            let (name, mode) = include.split_once("__").unwrap_or((include, "full"));
            let mode = match mode {
                "pk" => IncludeMode::Pk,
                "full" => IncludeMode::Full,
                other => {
                    warn!("Ignoring unknown include mode '{}' for '{}'", other, name);
                    continue;
                }
            };
            match model.relationship(name) {
                Some(relationship) => specs.push((relationship, mode)),
                None => warn!("Ignoring include of unknown related '{}' on {}", name, model.name),
            }
        }
        specs
    }

    /// Columns of an object the current user may see
    fn expose(&self, model: &ModelDef, object: &Object, projection: Option<&[String]>) -> Map<String, Value> {
        let mut output = Map::new();
        for column in model.columns {
            let visible = match column.visibility {
                Visibility::Public => true,
                Visibility::Private => false,
                Visibility::Permission(permission) => self.identity.has_permission(permission),
            };
            let projected = column.name == ID
                || projection
                    .map(|fields| fields.iter().any(|f| f == column.name))
                    .unwrap_or(true);

            if visible && projected {
                if let Some(value) = object.get(column.name) {
                    output.insert(column.name.to_string(), value.clone());
                }
            }
        }
        output
    }

    /// Serialize objects of `model` honouring field projection and includes
    pub async fn serialize_all(&mut self, model: &'static ModelDef, objects: Vec<Object>) -> Result<Vec<Value>, ApiError> {
        let projection = self.request.field_projection();
        let includes = self.include_specs(model);
        let mut output = Vec::with_capacity(objects.len());

        for object in objects {
            let mut data = self.expose(model, &object, projection.as_deref());
            let Some(id) = object.get(ID).and_then(Value::as_i64) else {
                output.push(Value::Object(data));
                continue;
            };

            for (relationship, mode) in &includes {
                let related = self.related_objects(model, *relationship, id).await?;
                let mut values: Vec<Value> = related
                    .iter()
                    .map(|r| match mode {
                        IncludeMode::Pk => r.get(ID).cloned().unwrap_or(Value::Null),
                        IncludeMode::Full => Value::Object(self.expose(relationship.target, r, None)),
                    })
                    .collect();

                let value = if relationship.is_list() {
                    Value::Array(values)
                } else if values.is_empty() {
                    Value::Null
                } else {
                    values.swap_remove(0)
                };
                data.insert(relationship.name.to_string(), value);
            }

            output.push(Value::Object(data));
        }

        Ok(output)
    }

    pub async fn serialize(&mut self, model: &'static ModelDef, object: Object) -> Result<Value, ApiError> {
        let mut values = self.serialize_all(model, vec![object]).await?;
        Ok(values.pop().unwrap_or(Value::Null))
    }

    /// GET `/{name}/`: filtered, paginated list
    pub async fn get_collection(&mut self) -> ApiResult {
        let model = self.model();
        let query = self.filtered_query()?;
        let query = self.paginate(query)?;
        let objects = self.session.all(&query).await?;
        debug!("Listing {} {} objects", objects.len(), model.name);
        let data = self.serialize_all(model, objects).await?;
        Ok(ApiResponse::success(Value::Array(data)))
    }

    /// POST `/{name}/`: create one or many objects
    pub async fn post_collection(&mut self) -> ApiResult {
        let model = self.model();
        let (items, single) = self.submitted_items()?;
        let schema = if single { self.def.schema } else { self.def.list_schema };
        let objects = self.deserialize_items(schema, &items, Mode::Full, single)?;

        let mut created = Vec::with_capacity(objects.len());
        for mut values in objects {
            self.default_owner(&mut values);
            if let Some(hook) = self.def.create_hook {
                hook(&mut values, &self.identity)?;
            }
            let id = self.session.insert(model, &values).await?;
            let object = self
                .session
                .get(model, id)
                .await?
                .ok_or_else(|| ApiError::internal_server_error("Created object could not be loaded"))?;
            created.push(object);
        }
        debug!("Created {} {} objects", created.len(), model.name);

        let mut data = self.serialize_all(model, created).await?;
        if single {
            return Ok(ApiResponse::success(data.pop().unwrap_or(Value::Null)));
        }
        Ok(ApiResponse::success(Value::Array(data)))
    }

    /// PUT `/{name}/`: update objects matched by the `id` of each item
    pub async fn put_collection(&mut self) -> ApiResult {
        let model = self.model();
        let (items, single) = self.submitted_items()?;
        let schema = if single { self.def.schema } else { self.def.list_schema };

        // Every item is validated before anything is written
        let mut errors = ValidationError::new();
        let mut updates: Vec<(i64, Object)> = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let id = item.get(ID).and_then(as_id);
            if id.is_none() {
                errors.add(item_key(index, ID, single), "Required");
            }
            match schema.deserialize(item, Mode::Partial, &self.identity) {
                Ok(values) => {
                    if let Some(id) = id {
                        updates.push((id, values));
                    }
                }
                Err(e) => {
                    for (field, message) in e.fields {
                        errors.add(item_key(index, &field, single), message);
                    }
                }
            }
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let ids: Vec<i64> = updates.iter().map(|(id, _)| *id).collect();
        let query = self.filtered_query()?.ids(&ids);
        let allowed: HashSet<i64> = self.session.ids(&query).await?.into_iter().collect();

        let mut updated = BTreeSet::new();
        for (id, mut values) in updates {
            if !allowed.contains(&id) {
                continue;
            }
            if let Some(hook) = self.def.update_hook {
                let Some(current) = self.session.get(model, id).await? else {
                    continue;
                };
                hook(&mut values, &current, &self.identity)?;
            }
            if self.session.update(model, id, &values).await? {
                updated.insert(id);
            }
        }
        debug!("Updated {} {} objects", updated.len(), model.name);

        if updated.is_empty() {
            let mut info = Map::new();
            info.insert("count".to_string(), json!(0));
            info.insert("code".to_string(), json!("NO_OBJECTS_UPDATED"));
            info.insert("message".to_string(), json!("No objects were updated"));
            return Ok(ApiResponse::info(info));
        }
        Ok(ApiResponse::count(updated.len() as u64))
    }

    /// DELETE `/{name}/`: delete the objects listed in the body
    pub async fn delete_collection(&mut self) -> ApiResult {
        let model = self.model();
        let Value::Array(items) = self.request.request_data()? else {
            return Err(ApiError::CollectionExpected);
        };
        let ids = parse_ids(items)?;

        let query = self.filtered_query()?.ids(&ids);
        let count = self.session.delete(&query).await?;
        debug!("Deleted {} {} objects", count, model.name);
        Ok(ApiResponse::count(count))
    }

    /// GET `/{name}/{pk}/`
    pub async fn get_member(&mut self) -> ApiResult {
        let model = self.model();
        let object = self.get_object().await?;
        let data = self.serialize(model, object).await?;
        Ok(ApiResponse::success(data))
    }

    /// PUT `/{name}/{pk}/`: partial update of one object
    pub async fn put_member(&mut self) -> ApiResult {
        let model = self.model();
        let data = self.request.request_data()?.clone();
        if data.is_array() {
            return Err(ApiError::CollectionNotAllowed);
        }

        let object = self.get_object().await?;
        let mut values = self.def.schema.deserialize(&data, Mode::Partial, &self.identity)?;
        if let Some(hook) = self.def.update_hook {
            hook(&mut values, &object, &self.identity)?;
        }
        let id = object_id(&object)?;
        self.session.update(model, id, &values).await?;

        let object = self
            .session
            .get(model, id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("{} with id {} not found", model.name, id)))?;
        let data = self.serialize(model, object).await?;
        Ok(ApiResponse::success(data))
    }

    /// DELETE `/{name}/{pk}/`: answers with the object as it was before deletion
    pub async fn delete_member(&mut self) -> ApiResult {
        let model = self.model();
        let object = self.get_object().await?;
        let id = object_id(&object)?;
        let snapshot = self.serialize(model, object).await?;

        self.session.delete(&model.query().ids(&[id])).await?;
        debug!("Deleted {} {}", model.name, id);
        Ok(ApiResponse::success(snapshot))
    }

    /// GET `/{name}/{pk}/{related_name}/`
    pub async fn get_related(&mut self) -> ApiResult {
        let model = self.model();
        let relationship = self.relationship()?;
        let object = self.get_object().await?;
        let id = object_id(&object)?;

        let related = self.related_objects(model, relationship, id).await?;
        let mut data = self.serialize_all(relationship.target, related).await?;
        if relationship.is_list() {
            return Ok(ApiResponse::success(Value::Array(data)));
        }
        match data.pop() {
            Some(value) => Ok(ApiResponse::success(value)),
            None => Err(ApiError::not_found(format!(
                "{} {} has no {}",
                model.name, id, relationship.name
            ))),
        }
    }

    /// PUT `/{name}/{pk}/{related_name}/`: append existing objects by id
    pub async fn put_related(&mut self) -> ApiResult {
        let relationship = self.relationship()?;
        if !relationship.is_list() {
            return Err(ApiError::ObjectNotAllowed);
        }
        let object = self.get_object().await?;
        let id = object_id(&object)?;

        let ids = self.related_ids()?;
        let mut count = 0;
        for target_id in self.related_targets(relationship, id, ids).await? {
            if self.session.append_related(relationship, id, target_id).await? {
                count += 1;
            }
        }
        debug!("Appended {} objects to {}", count, relationship.name);
        Ok(ApiResponse::count(count))
    }

    /// DELETE `/{name}/{pk}/{related_name}/`: remove objects from the relationship
    pub async fn delete_related(&mut self) -> ApiResult {
        let relationship = self.relationship()?;
        if !relationship.is_list() {
            return Err(ApiError::ObjectNotAllowed);
        }
        let object = self.get_object().await?;
        let id = object_id(&object)?;

        let ids = self.related_ids()?;
        let mut count = 0;
        for target_id in self.related_targets(relationship, id, ids).await? {
            if self.session.remove_related(relationship, id, target_id).await? {
                count += 1;
            }
        }
        debug!("Removed {} objects from {}", count, relationship.name);
        Ok(ApiResponse::count(count))
    }
}

fn item_key(index: usize, field: &str, single: bool) -> String {
    if single {
        field.to_string()
    } else {
        format!("{}.{}", index, field)
    }
}

/// Integer id, either a number or a numeric string
fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse a list of ids or `{"id": ...}` objects, dropping repeated ids
pub(crate) fn parse_ids(items: &[Value]) -> Result<Vec<i64>, ApiError> {
    let mut errors = ValidationError::new();
    let mut ids = vec![];
    let mut seen = HashSet::new();

    for (index, item) in items.iter().enumerate() {
        let id = match item {
            Value::Object(object) => object.get(ID).and_then(as_id),
            other => as_id(other),
        };
        match id {
            Some(id) => {
                if seen.insert(id) {
                    ids.push(id);
                }
            }
            None => errors.add(format!("{}.{}", index, ID), "Invalid ID value"),
        }
    }

    if errors.is_empty() {
        Ok(ids)
    } else {
        Err(errors.into())
    }
}

fn object_id(object: &Object) -> Result<i64, ApiError> {
    object
        .get(ID)
        .and_then(Value::as_i64)
        .ok_or_else(|| ApiError::internal_server_error("Object has no primary key"))
}

fn window_param(request: &ResourceRequest, name: &str) -> Result<Option<i64>, QueryFilterError> {
    match request.query_param(name).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|n| *n >= 0)
            .map(Some)
            .ok_or_else(|| QueryFilterError::with_message(name, format!("Invalid {} value", name))),
    }
}

mod views {
    use super::*;

    macro_rules! verb_views {
        ($($name:ident),* $(,)?) => {
            $(
                pub fn $name(resource: &mut ModelResource) -> BoxFuture<'_, ApiResult> {
                    resource.$name().boxed()
                }
            )*
        };
    }

    verb_views!(
        get_collection,
        post_collection,
        put_collection,
        delete_collection,
        get_member,
        put_member,
        delete_member,
        get_related,
        put_related,
        delete_related,
    );

    /// `@describe` collection action
    pub fn describe(resource: &mut ModelResource) -> BoxFuture<'_, ApiResult> {
        describe_resource(resource).boxed()
    }

    async fn describe_resource(resource: &mut ModelResource) -> ApiResult {
        Ok(ApiResponse::success(resource.def().describe()))
    }
}

pub use views::describe;

/// Verb views every model resource starts with
pub fn default_handlers() -> HashMap<(RequestMethod, RouteType), Handler> {
    use RequestMethod::*;
    use RouteType::*;

    let handlers: [(RequestMethod, RouteType, Handler); 10] = [
        (Get, Collection, views::get_collection),
        (Post, Collection, views::post_collection),
        (Put, Collection, views::put_collection),
        (Delete, Collection, views::delete_collection),
        (Get, Member, views::get_member),
        (Put, Member, views::put_member),
        (Delete, Member, views::delete_member),
        (Get, Related, views::get_related),
        (Put, Related, views::put_related),
        (Delete, Related, views::delete_related),
    ];

    handlers
        .into_iter()
        .map(|(method, route_type, handler)| ((method, route_type), handler))
        .collect()
}
