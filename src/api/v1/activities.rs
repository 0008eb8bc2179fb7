use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use crate::error::ApiError;
use crate::filter::{ByCurrentUser, ByDateRange, BySearchFields, CollectionByPrimaryKey, FilterOp, SearchField};
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{ACTIVITY, TAG};
use crate::resource::model::parse_ids;
use crate::resource::{ActionDescriptor, ConfigurationError, ModelResource, RequestMethod, ResourceDef};
use crate::schemas::definitions::ACTIVITY_SCHEMA;
use crate::schemas::FieldType;

pub fn resource() -> Result<ResourceDef, ConfigurationError> {
    let search = BySearchFields::new()
        .field(
            "description",
            SearchField::with_ops(FieldType::String, &[FilterOp::Eq, FilterOp::Contains]),
        )
        .field(
            "activity_type",
            SearchField::with_ops(FieldType::String, &[FilterOp::Eq, FilterOp::Neq, FilterOp::In]),
        )
        .field(
            "project_id",
            SearchField::with_ops(FieldType::Integer, &[FilterOp::Eq, FilterOp::In, FilterOp::Null]),
        )
        .field(
            "task_id",
            SearchField::with_ops(FieldType::Integer, &[FilterOp::Eq, FilterOp::In, FilterOp::Null]),
        )
        .field("end", SearchField::with_ops(FieldType::DateTime, &[FilterOp::Null, FilterOp::NotNull]));

    let update = ACTIVITY.get_permission("update");

    ResourceDef::builder("activities", &ACTIVITY, &ACTIVITY_SCHEMA)
        .doc("Time spent working, on breaks or away")
        .filter(CollectionByPrimaryKey)
        .filter(ByCurrentUser::new().filter_nulls())
        .filter(ByDateRange::new("start"))
        .filter(search)
        .action(
            ActionDescriptor::member("add_tags", add_tags)
                .methods(&[RequestMethod::Post])
                .permission(update.clone())
                .doc("Attach tags, by id, to the activity"),
        )
        .action(
            ActionDescriptor::member("remove_tags", remove_tags)
                .methods(&[RequestMethod::Delete])
                .permission(update)
                .doc("Detach tags, by id, from the activity"),
        )
        .build()
}

fn add_tags(resource: &mut ModelResource) -> BoxFuture<'_, ApiResult> {
    change_tags(resource, true).boxed()
}

fn remove_tags(resource: &mut ModelResource) -> BoxFuture<'_, ApiResult> {
    change_tags(resource, false).boxed()
}

/// Link or unlink tags and answer with the activity's tags
async fn change_tags(resource: &mut ModelResource, add: bool) -> ApiResult {
    let relationship = ACTIVITY
        .relationship("tags")
        .ok_or_else(|| ApiError::internal_server_error("Activity has no tags relationship"))?;

    let activity = resource.get_object().await?;
    let id = activity
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| ApiError::internal_server_error("Activity has no primary key"))?;

    let Value::Array(items) = resource.request().request_data()?.clone() else {
        return Err(ApiError::CollectionExpected);
    };
    let tag_ids = parse_ids(&items)?;
    let tag_ids = resource.related_targets(relationship, id, tag_ids).await?;

    for tag_id in tag_ids {
        let session = resource.session_mut();
        if add {
            session.append_related(relationship, id, tag_id).await?;
        } else {
            session.remove_related(relationship, id, tag_id).await?;
        }
    }

    let tags = resource.related_objects(&ACTIVITY, relationship, id).await?;
    let tags = resource.serialize_all(&TAG, tags).await?;
    Ok(ApiResponse::success(Value::Array(tags)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::RouteType;

    #[test]
    fn tag_actions_are_member_actions() {
        let def = resource().unwrap();
        let names: Vec<&str> = def
            .get_actions_by_type(RouteType::Member)
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["add-tags", "remove-tags"]);
        assert_eq!(def.actions[1].get_permission(def.model), "time_activity_update");
        assert_eq!(def.query_filters.len(), 4);
    }
}
